//! The decomposition network: a composite module built from explicit stage
//! sub-modules, run in fixed order by [`DecompositionNet::forward`]. The
//! shading stage itself is not learned and is passed in as a
//! [`ShadingRenderer`] so it can be swapped out under test.

mod blocks;
mod estimators;

pub use blocks::{ConvBlock, FeatureExtractor, GenerationHead, ResBlock, ResidualStack};
pub use estimators::{LatentLightEmbedding, LightEstimator, ShadingCorrector};

use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::shading::{compose_face, NormalizedNormals, ShadingRenderer};

/// Everything one forward pass produces.
#[derive(Clone, Debug)]
pub struct PipelineOutput<B: Backend> {
    pub normal: NormalizedNormals<B>,
    pub albedo: Tensor<B, 4>,
    pub sh: Tensor<B, 2>,
    pub shading: Tensor<B, 4>,
    pub shading_residual: Tensor<B, 4>,
    pub updated_shading: Tensor<B, 4>,
    pub reconstruction: Tensor<B, 4>,
}

/// Hyperparameters of the decomposition network.
#[derive(Config)]
pub struct DecompositionNetConfig {
    /// Channel width of the trunk features.
    #[config(default = 128)]
    pub base_width: usize,
    /// Residual blocks in each of the normal and albedo branches.
    #[config(default = 5)]
    pub residual_blocks: usize,
    /// Channels of the spatial lighting code fed to the corrector.
    #[config(default = 32)]
    pub latent_light_channels: usize,
}

impl DecompositionNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecompositionNet<B> {
        let width = self.base_width;
        DecompositionNet {
            features: FeatureExtractor::new(width, device),
            normal_residuals: ResidualStack::new(width, self.residual_blocks, device),
            albedo_residuals: ResidualStack::new(width, self.residual_blocks, device),
            normal_head: GenerationHead::new(width, device),
            albedo_head: GenerationHead::new(width, device),
            light_estimator: LightEstimator::new(width, device),
            light_embedding: LatentLightEmbedding::new(self.latent_light_channels, device),
            corrector: ShadingCorrector::new(width, self.latent_light_channels, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct DecompositionNet<B: Backend> {
    features: FeatureExtractor<B>,
    normal_residuals: ResidualStack<B>,
    albedo_residuals: ResidualStack<B>,
    normal_head: GenerationHead<B>,
    albedo_head: GenerationHead<B>,
    light_estimator: LightEstimator<B>,
    light_embedding: LatentLightEmbedding<B>,
    corrector: ShadingCorrector<B>,
}

impl<B: Backend> DecompositionNet<B> {
    /// Decompose a batch of faces.
    ///
    /// Stage order is fixed: trunk features, normal and albedo branches,
    /// lighting from the fused features, analytic shading, learned residual
    /// correction, multiplicative reconstruction. The corrected shading is
    /// `shading + residual`, which the losses assume.
    pub fn forward<R: ShadingRenderer>(
        &self,
        faces: Tensor<B, 4>,
        renderer: &R,
    ) -> PipelineOutput<B> {
        let features = self.features.forward(faces);
        let normal_features = self.normal_residuals.forward(features.clone());
        let albedo_features = self.albedo_residuals.forward(features.clone());

        let normal = NormalizedNormals::new(self.normal_head.forward(normal_features.clone()));
        let albedo = self.albedo_head.forward(albedo_features.clone());

        let fused = Tensor::cat(vec![features, normal_features, albedo_features], 1);
        let sh = self.light_estimator.forward(fused);

        let shading = renderer.render(&normal.to_world(), sh.clone());
        let [_, _, height, width] = shading.dims();
        let light_code = self.light_embedding.forward(sh.clone(), height, width);
        let shading_residual = self.corrector.forward(shading.clone(), light_code);
        let updated_shading = shading.clone() + shading_residual.clone();
        let reconstruction = compose_face(albedo.clone(), updated_shading.clone());

        PipelineOutput {
            normal,
            albedo,
            sh,
            shading,
            shading_residual,
            updated_shading,
            reconstruction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::{ConstantShading, SphericalHarmonics, SH_COEFFICIENTS};
    use approx::assert_relative_eq;
    use burn_candle::{Candle, CandleDevice};

    type TestBackend = Candle<f32, i64>;

    fn tiny_net() -> DecompositionNet<TestBackend> {
        DecompositionNetConfig::new()
            .with_base_width(8)
            .with_residual_blocks(1)
            .with_latent_light_channels(4)
            .init(&CandleDevice::Cpu)
    }

    fn to_vec(tensor: Tensor<TestBackend, 4>) -> Vec<f32> {
        tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn forward_produces_the_full_decomposition_at_input_resolution() {
        let net = tiny_net();
        let faces = Tensor::ones([2, 3, 16, 16], &CandleDevice::Cpu).mul_scalar(0.5);
        let output = net.forward(faces, &SphericalHarmonics);

        assert_eq!(output.normal.tensor().dims(), [2, 3, 16, 16]);
        assert_eq!(output.albedo.dims(), [2, 3, 16, 16]);
        assert_eq!(output.sh.dims(), [2, SH_COEFFICIENTS]);
        assert_eq!(output.shading.dims(), [2, 3, 16, 16]);
        assert_eq!(output.shading_residual.dims(), [2, 3, 16, 16]);
        assert_eq!(output.updated_shading.dims(), [2, 3, 16, 16]);
        assert_eq!(output.reconstruction.dims(), [2, 3, 16, 16]);
    }

    #[test]
    fn normal_and_albedo_maps_stay_inside_the_unit_interval() {
        let net = tiny_net();
        let faces = Tensor::ones([1, 3, 16, 16], &CandleDevice::Cpu).mul_scalar(0.3);
        let output = net.forward(faces, &SphericalHarmonics);

        for value in to_vec(output.normal.tensor())
            .into_iter()
            .chain(to_vec(output.albedo))
        {
            assert!((0.0..=1.0).contains(&value), "value {value} out of range");
        }
    }

    #[test]
    fn correction_is_additive_and_reconstruction_is_multiplicative() {
        let net = tiny_net();
        let faces = Tensor::ones([1, 3, 16, 16], &CandleDevice::Cpu).mul_scalar(0.7);
        let output = net.forward(faces, &ConstantShading { value: 1.0 });

        let shading = to_vec(output.shading);
        let residual = to_vec(output.shading_residual);
        let updated = to_vec(output.updated_shading);
        let albedo = to_vec(output.albedo);
        let reconstruction = to_vec(output.reconstruction);

        for i in 0..shading.len() {
            assert_relative_eq!(updated[i], shading[i] + residual[i], epsilon = 1e-5);
            assert_relative_eq!(reconstruction[i], albedo[i] * updated[i], epsilon = 1e-5);
        }
    }
}
