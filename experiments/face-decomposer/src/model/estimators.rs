use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::blocks::ConvBlock;
use crate::shading::SH_COEFFICIENTS;

/// Regresses the 27 lighting coefficients from the trunk features fused
/// with both branch features.
#[derive(Module, Debug)]
pub struct LightEstimator<B: Backend> {
    conv: ConvBlock<B>,
    pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> LightEstimator<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            conv: ConvBlock::new([3 * width, width], 1, 0, device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(width, SH_COEFFICIENTS).init(device),
        }
    }

    /// `[batch, 3*width, h, w]` -> `[batch, 27]`.
    pub fn forward(&self, fused: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.pool.forward(self.conv.forward(fused));
        let [batch, channels, _, _] = pooled.dims();
        self.fc.forward(pooled.reshape([batch, channels]))
    }
}

/// Lifts the predicted lighting vector into a spatial code for the
/// corrector, constant over the image extent.
#[derive(Module, Debug)]
pub struct LatentLightEmbedding<B: Backend> {
    fc: Linear<B>,
}

impl<B: Backend> LatentLightEmbedding<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            fc: LinearConfig::new(SH_COEFFICIENTS, channels).init(device),
        }
    }

    /// `[batch, 27]` -> `[batch, channels, height, width]`.
    pub fn forward(&self, sh: Tensor<B, 2>, height: usize, width: usize) -> Tensor<B, 4> {
        let code = relu(self.fc.forward(sh));
        let [batch, channels] = code.dims();
        let device = code.device();
        code.reshape([batch, channels, 1])
            .matmul(Tensor::ones([batch, 1, height * width], &device))
            .reshape([batch, channels, height, width])
    }
}

/// Predicts the correction added to the analytic shading to compensate for
/// its image-formation mismatch. The output is unbounded.
#[derive(Module, Debug)]
pub struct ShadingCorrector<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    output: Conv2d<B>,
}

impl<B: Backend> ShadingCorrector<B> {
    pub fn new(width: usize, latent_channels: usize, device: &B::Device) -> Self {
        let half = width / 2;
        Self {
            conv1: ConvBlock::new([3 + latent_channels, half], 3, 1, device),
            conv2: ConvBlock::new([half, half], 3, 1, device),
            output: Conv2dConfig::new([half, 3], [1, 1]).init(device),
        }
    }

    pub fn forward(&self, shading: Tensor<B, 4>, light_code: Tensor<B, 4>) -> Tensor<B, 4> {
        let fused = Tensor::cat(vec![shading, light_code], 1);
        self.output
            .forward(self.conv2.forward(self.conv1.forward(fused)))
    }
}
