use burn::tensor::{backend::Backend, Tensor};

/// Total spherical-harmonics coefficients: 9 per RGB channel, channel-major.
pub const SH_COEFFICIENTS: usize = 27;
/// Basis functions per channel (bands 0..2).
pub const SH_BASIS: usize = 9;

// Band constants for the closed-form irradiance formula.
const C1: f64 = 0.8862269254527579;
const C2: f64 = 1.0233267079464883;
const C3: f64 = 0.24770795610037571;
const C4: f64 = 0.8580855308097834;
const C5: f64 = 0.4290427654048917;

/// Per-pixel surface normals in the network/dataset representation, with
/// components in [0, 1]. Shape `[batch, 3, height, width]`.
#[derive(Clone, Debug)]
pub struct NormalizedNormals<B: Backend>(Tensor<B, 4>);

impl<B: Backend> NormalizedNormals<B> {
    pub fn new(tensor: Tensor<B, 4>) -> Self {
        assert_eq!(tensor.dims()[1], 3, "normals must have 3 components");
        Self(tensor)
    }

    pub fn tensor(&self) -> Tensor<B, 4> {
        self.0.clone()
    }

    /// Map into physical [-1, 1] components: `world = 2n - 1`.
    pub fn to_world(&self) -> WorldNormals<B> {
        WorldNormals(self.0.clone().mul_scalar(2.0).sub_scalar(1.0))
    }
}

/// Per-pixel surface normals with physical components in [-1, 1]. Only this
/// form is accepted by shading renderers.
#[derive(Clone, Debug)]
pub struct WorldNormals<B: Backend>(Tensor<B, 4>);

impl<B: Backend> WorldNormals<B> {
    pub fn tensor(&self) -> Tensor<B, 4> {
        self.0.clone()
    }
}

/// Turns world-space normals and per-channel SH coefficients into a shading
/// map. Implementations hold no learned state.
pub trait ShadingRenderer {
    fn render<B: Backend>(&self, normals: &WorldNormals<B>, sh: Tensor<B, 2>) -> Tensor<B, 4>;
}

/// Closed-form irradiance from the first three SH bands.
#[derive(Clone, Copy, Debug, Default)]
pub struct SphericalHarmonics;

impl ShadingRenderer for SphericalHarmonics {
    fn render<B: Backend>(&self, normals: &WorldNormals<B>, sh: Tensor<B, 2>) -> Tensor<B, 4> {
        let n = normals.tensor();
        let device = n.device();
        let [batch, components, height, width] = n.dims();
        assert_eq!(components, 3, "normals must have 3 components");
        assert_eq!(
            sh.dims(),
            [batch, SH_COEFFICIENTS],
            "SH coefficients must be [batch, 27]"
        );

        let nx = n.clone().slice([0..batch, 0..1, 0..height, 0..width]);
        let ny = n.clone().slice([0..batch, 1..2, 0..height, 0..width]);
        let nz = n.slice([0..batch, 2..3, 0..height, 0..width]);

        let nx2 = nx.clone() * nx.clone();
        let ny2 = ny.clone() * ny.clone();
        let nz2 = nz.clone() * nz.clone();

        let y1 = Tensor::ones([batch, 1, height, width], &device).mul_scalar(C1);
        let y2 = nz.clone().mul_scalar(C2);
        let y3 = nx.clone().mul_scalar(C2);
        let y4 = ny.clone().mul_scalar(C2);
        let y5 = (nz2.mul_scalar(2.0) - nx2.clone() - ny2.clone()).mul_scalar(C3);
        let y6 = (nx.clone() * nz.clone()).mul_scalar(C4);
        let y7 = (ny.clone() * nz).mul_scalar(C4);
        let y8 = (nx2 - ny2).mul_scalar(C5);
        let y9 = (nx * ny).mul_scalar(C4);

        // [batch, height*width, 9] so each channel is one batched matmul
        // against its 9 coefficients.
        let basis = Tensor::cat(vec![y1, y2, y3, y4, y5, y6, y7, y8, y9], 1)
            .reshape([batch, SH_BASIS, height * width])
            .swap_dims(1, 2);

        let mut channels = Vec::with_capacity(3);
        for channel in 0..3 {
            let start = channel * SH_BASIS;
            let coefficients = sh
                .clone()
                .slice([0..batch, start..start + SH_BASIS])
                .reshape([batch, SH_BASIS, 1]);
            let shaded = basis
                .clone()
                .matmul(coefficients)
                .reshape([batch, 1, height, width]);
            channels.push(shaded);
        }

        Tensor::cat(channels, 1)
    }
}

/// Test double that shades every pixel with a fixed value.
#[derive(Clone, Copy, Debug)]
pub struct ConstantShading {
    pub value: f64,
}

impl ShadingRenderer for ConstantShading {
    fn render<B: Backend>(&self, normals: &WorldNormals<B>, sh: Tensor<B, 2>) -> Tensor<B, 4> {
        let n = normals.tensor();
        let device = n.device();
        let [batch, _, height, width] = n.dims();
        assert_eq!(sh.dims()[1], SH_COEFFICIENTS);
        Tensor::ones([batch, 3, height, width], &device).mul_scalar(self.value)
    }
}

/// Pixelwise image formation: `face = albedo * shading`.
pub fn compose_face<B: Backend>(albedo: Tensor<B, 4>, shading: Tensor<B, 4>) -> Tensor<B, 4> {
    albedo * shading
}

/// Render a face from explicit lighting, normals and albedo. Used for the
/// diagnostic ground-truth-lighting dumps, never inside a loss.
pub fn render_face<B: Backend, R: ShadingRenderer>(
    renderer: &R,
    sh: Tensor<B, 2>,
    normals: &NormalizedNormals<B>,
    albedo: Tensor<B, 4>,
) -> Tensor<B, 4> {
    let shading = renderer.render(&normals.to_world(), sh);
    compose_face(albedo, shading)
}
