use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{
        activation::{relu, sigmoid},
        backend::Backend,
        Tensor,
    },
};

/// Convolution followed by batch norm and ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(channels: [usize; 2], kernel: usize, padding: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new(channels, [kernel, kernel])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .init(device),
            norm: BatchNormConfig::new(channels[1]).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.conv.forward(input)))
    }
}

/// Shared trunk. Halves the spatial resolution once, so inputs need even
/// height and width for the generation heads to restore them exactly.
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    downsample: Conv2d<B>,
}

impl<B: Backend> FeatureExtractor<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            conv1: ConvBlock::new([3, width / 2], 7, 3, device),
            conv2: ConvBlock::new([width / 2, width], 3, 1, device),
            downsample: Conv2dConfig::new([width, width], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
        }
    }

    /// `[batch, 3, h, w]` -> `[batch, width, h/2, w/2]`.
    pub fn forward(&self, faces: Tensor<B, 4>) -> Tensor<B, 4> {
        self.downsample
            .forward(self.conv2.forward(self.conv1.forward(faces)))
    }
}

/// Pre-activation residual block at constant width.
#[derive(Module, Debug)]
pub struct ResBlock<B: Backend> {
    norm1: BatchNorm<B, 2>,
    conv1: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
}

impl<B: Backend> ResBlock<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            norm1: BatchNormConfig::new(width).init(device),
            conv1: Conv2dConfig::new([width, width], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm2: BatchNormConfig::new(width).init(device),
            conv2: Conv2dConfig::new([width, width], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = relu(self.norm1.forward(input.clone()));
        let residual = self.conv1.forward(residual);
        let residual = relu(self.norm2.forward(residual));
        input + self.conv2.forward(residual)
    }
}

/// A chain of residual blocks closed by a final norm and activation.
#[derive(Module, Debug)]
pub struct ResidualStack<B: Backend> {
    blocks: Vec<ResBlock<B>>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ResidualStack<B> {
    pub fn new(width: usize, depth: usize, device: &B::Device) -> Self {
        let blocks = (0..depth).map(|_| ResBlock::new(width, device)).collect();
        Self {
            blocks,
            norm: BatchNormConfig::new(width).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for block in &self.blocks {
            x = block.forward(x);
        }
        relu(self.norm.forward(x))
    }
}

/// Decodes branch features back to a full-resolution 3-channel map in [0, 1].
#[derive(Module, Debug)]
pub struct GenerationHead<B: Backend> {
    upsample: ConvTranspose2d<B>,
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    output: Conv2d<B>,
}

impl<B: Backend> GenerationHead<B> {
    pub fn new(width: usize, device: &B::Device) -> Self {
        Self {
            upsample: ConvTranspose2dConfig::new([width, width], [4, 4])
                .with_stride([2, 2])
                .with_padding([1, 1])
                .init(device),
            conv1: ConvBlock::new([width, width], 1, 0, device),
            conv2: ConvBlock::new([width, width / 2], 3, 1, device),
            output: Conv2dConfig::new([width / 2, 3], [1, 1]).init(device),
        }
    }

    /// `[batch, width, h, w]` -> `[batch, 3, 2h, 2w]`.
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample.forward(features);
        let x = self.conv2.forward(self.conv1.forward(x));
        sigmoid(self.output.forward(x))
    }
}
