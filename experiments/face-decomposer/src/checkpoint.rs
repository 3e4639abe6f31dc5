//! Whole-pipeline checkpointing. One file per run, overwritten on every
//! save; there is no best-model selection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;

use crate::model::{DecompositionNet, DecompositionNetConfig};

/// Checkpoint file stem; the recorder appends its own extension.
pub const CHECKPOINT_FILE: &str = "sfs_net_model";

pub fn save<B: Backend>(net: &DecompositionNet<B>, dir: &Path) -> Result<PathBuf> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let path = dir.join(CHECKPOINT_FILE);
    net.clone()
        .save_file(path.clone(), &recorder)
        .with_context(|| format!("failed to save checkpoint to {}", path.display()))?;
    Ok(path.with_extension("mpk"))
}

pub fn load<B: Backend>(
    config: &DecompositionNetConfig,
    dir: &Path,
    device: &B::Device,
) -> Result<DecompositionNet<B>> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let path = dir.join(CHECKPOINT_FILE);
    config
        .init::<B>(device)
        .load_file(path.clone(), &recorder, device)
        .with_context(|| format!("failed to load checkpoint from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::ConstantShading;
    use approx::assert_relative_eq;
    use burn::tensor::Tensor;
    use burn_candle::{Candle, CandleDevice};

    type TestBackend = Candle<f32, i64>;

    fn tiny_config() -> DecompositionNetConfig {
        DecompositionNetConfig::new()
            .with_base_width(8)
            .with_residual_blocks(1)
            .with_latent_light_channels(4)
    }

    #[test]
    fn saved_parameters_reproduce_the_same_outputs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let device = CandleDevice::Cpu;
        let config = tiny_config();
        let net = config.init::<TestBackend>(&device);

        let path = save(&net, dir.path())?;
        assert!(path.exists());

        let restored = load::<TestBackend>(&config, dir.path(), &device)?;

        let faces = Tensor::ones([1, 3, 16, 16], &device).mul_scalar(0.4);
        let renderer = ConstantShading { value: 1.0 };
        let original = net.forward(faces.clone(), &renderer);
        let reloaded = restored.forward(faces, &renderer);

        let a = original
            .reconstruction
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        let b = reloaded
            .reconstruction
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn loading_a_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            load::<TestBackend>(&tiny_config(), dir.path(), &CandleDevice::Cpu).unwrap_err();
        assert!(err.to_string().contains("failed to load checkpoint"));
    }
}
