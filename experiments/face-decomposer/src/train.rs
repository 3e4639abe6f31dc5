//! The training loop controller.
//!
//! One controller drives every run variant; the loss configuration is the
//! only thing that differs between them. Per epoch it walks shuffled
//! training batches, then at the configured cadences runs the labeled
//! validation pass (always followed by a checkpoint), the unlabeled
//! real-photo pass when that split exists, and the held-out test pass.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::module::{AutodiffModule, Module};
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn_dataset::Dataset;
use serde::Serialize;

use faceshade_core::{
    derive_rng, EpochRecord, ImageArtifact, LossAccumulator, LossTerms, RunLogger,
};

use crate::artifacts::dump_labeled_outputs;
use crate::checkpoint;
use crate::data::{
    assemble_labeled, shuffled_batches, LabeledSample, SplitBundle, UnlabeledSample,
};
use crate::eval::{evaluate_labeled, evaluate_unlabeled, EvalContext};
use crate::loss::{self, LossConfig};
use crate::model::DecompositionNet;
use crate::shading::ShadingRenderer;

/// Knobs of one training run.
#[derive(Clone, Copy, Debug)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub seed: u64,
    /// Validate (and checkpoint) every this many epochs.
    pub validate_every: usize,
    /// Evaluate the held-out test split every this many epochs.
    pub test_every: usize,
    pub dump_all_images: bool,
    pub train_loss: LossConfig,
    pub eval_loss: LossConfig,
}

/// Output directories of one run, all under the log directory.
#[derive(Clone, Debug)]
pub struct RunDirs {
    pub checkpoints: PathBuf,
    pub train_images: PathBuf,
    pub val_images: PathBuf,
    pub test_images: PathBuf,
    pub real_images: PathBuf,
}

impl RunDirs {
    pub fn create(log_dir: &Path) -> Result<Self> {
        let images = log_dir.join("out_images");
        let dirs = Self {
            checkpoints: log_dir.join("checkpoints"),
            train_images: images.join("train"),
            val_images: images.join("val"),
            test_images: images.join("test"),
            real_images: images.join("real"),
        };
        for dir in [
            &dirs.checkpoints,
            &dirs.train_images,
            &dirs.val_images,
            &dirs.test_images,
            &dirs.real_images,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(dirs)
    }
}

/// What one run produced, for the final report.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub epochs: Vec<EpochRecord>,
    pub validations: usize,
    pub checkpoints: usize,
    pub tests: usize,
    pub final_validation: Option<LossTerms>,
    pub final_test: Option<LossTerms>,
    /// Last epoch's training dump.
    pub train_samples: Vec<ImageArtifact>,
    /// Last validation dump.
    pub validation_samples: Vec<ImageArtifact>,
}

pub fn run<B, D, U, R>(
    mut net: DecompositionNet<B>,
    renderer: &R,
    data: &SplitBundle<D, U>,
    options: &TrainingOptions,
    dirs: &RunDirs,
    logger: &mut dyn RunLogger,
    device: &B::Device,
) -> Result<(DecompositionNet<B>, RunSummary)>
where
    B: AutodiffBackend,
    D: Dataset<LabeledSample>,
    U: Dataset<UnlabeledSample>,
    R: ShadingRenderer,
{
    if options.epochs == 0 {
        bail!("epoch count must be positive");
    }
    if options.validate_every == 0 || options.test_every == 0 {
        bail!("validation and test cadences must be positive");
    }
    if data.train.is_empty() {
        bail!("cannot train on an empty split");
    }

    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(f64::from(options.weight_decay))))
        .init();
    let mut shuffle_rng = derive_rng(options.seed, 1);

    logger.watch(net.num_params())?;

    let mut summary = RunSummary {
        epochs: Vec::with_capacity(options.epochs),
        validations: 0,
        checkpoints: 0,
        tests: 0,
        final_validation: None,
        final_test: None,
        train_samples: Vec::new(),
        validation_samples: Vec::new(),
    };

    for epoch in 1..=options.epochs {
        let mut accumulator = LossAccumulator::new();
        let mut last_batch = None;

        for indices in shuffled_batches(data.train.len(), options.batch_size, &mut shuffle_rng) {
            let batch = assemble_labeled::<B>(device, &data.train, &indices);
            let output = net.forward(batch.face.clone(), renderer);
            let breakdown = loss::compose(&options.train_loss, &output, &batch, renderer);
            accumulator.add(&breakdown.terms);

            let grads = breakdown.total.backward();
            let grads = GradientsParams::from_grads(grads, &net);
            net = optimizer.step(options.learning_rate, net, grads);

            last_batch = Some((batch, output));
        }

        let terms = accumulator.average();
        println!(
            "epoch {:03}: train total {:.4}, recon {:.4}",
            epoch, terms.total, terms.recon
        );
        logger.log_epoch("train", epoch, &terms)?;
        summary.epochs.push(EpochRecord { epoch, terms });

        if let Some((batch, output)) = &last_batch {
            let dumped = dump_labeled_outputs(
                &dirs.train_images,
                "train",
                epoch,
                None,
                batch,
                output,
                renderer,
            )?;
            for artifact in &dumped {
                logger.log_image("train", epoch, artifact)?;
            }
            summary.train_samples = dumped;
        }

        if epoch % options.validate_every == 0 {
            let frozen = net.valid();

            let ctx = EvalContext {
                image_dir: &dirs.val_images,
                split: "val",
                epoch,
                batch_size: options.batch_size,
                dump_all_images: options.dump_all_images,
            };
            let (val_terms, dumped) = evaluate_labeled(
                &frozen,
                renderer,
                &data.validation,
                &options.eval_loss,
                &ctx,
                device,
            )?;
            println!("epoch {:03}: val total {:.4}", epoch, val_terms.total);
            logger.log_epoch("val", epoch, &val_terms)?;
            for artifact in &dumped {
                logger.log_image("val", epoch, artifact)?;
            }
            summary.validation_samples = dumped;
            summary.final_validation = Some(val_terms);
            summary.validations += 1;

            checkpoint::save(&net, &dirs.checkpoints)?;
            summary.checkpoints += 1;

            if let Some(real) = &data.real {
                let ctx = EvalContext {
                    image_dir: &dirs.real_images,
                    split: "real",
                    epoch,
                    batch_size: options.batch_size,
                    dump_all_images: options.dump_all_images,
                };
                let (real_terms, dumped) =
                    evaluate_unlabeled(&frozen, renderer, real, &ctx, device)?;
                println!(
                    "epoch {:03}: real recon {:.4}",
                    epoch, real_terms.total
                );
                logger.log_epoch("real", epoch, &real_terms)?;
                for artifact in &dumped {
                    logger.log_image("real", epoch, artifact)?;
                }
            }
        }

        if epoch % options.test_every == 0 {
            let frozen = net.valid();
            let ctx = EvalContext {
                image_dir: &dirs.test_images,
                split: "test",
                epoch,
                batch_size: options.batch_size,
                dump_all_images: options.dump_all_images,
            };
            let (test_terms, dumped) = evaluate_labeled(
                &frozen,
                renderer,
                &data.test,
                &options.eval_loss,
                &ctx,
                device,
            )?;
            println!("epoch {:03}: test total {:.4}", epoch, test_terms.total);
            logger.log_epoch("test", epoch, &test_terms)?;
            for artifact in &dumped {
                logger.log_image("test", epoch, artifact)?;
            }
            summary.final_test = Some(test_terms);
            summary.tests += 1;
        }
    }

    Ok((net, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PixelImage, RealFaceDataset};
    use crate::shading::{ConstantShading, SH_COEFFICIENTS};
    use burn_autodiff::Autodiff;
    use burn_candle::{Candle, CandleDevice};
    use burn_dataset::InMemDataset;
    use faceshade_core::NullLogger;

    type TrainingBackend = Autodiff<Candle<f32, i64>>;

    fn tiny_net() -> DecompositionNet<TrainingBackend> {
        crate::model::DecompositionNetConfig::new()
            .with_base_width(8)
            .with_residual_blocks(1)
            .with_latent_light_channels(4)
            .init(&CandleDevice::Cpu)
    }

    fn labeled_fixture(count: usize) -> InMemDataset<LabeledSample> {
        let samples = (0..count)
            .map(|i| {
                let value = 0.2 + 0.05 * i as f32;
                let image = |v: f32| PixelImage::new(3, 8, 8, vec![v; 3 * 64]);
                LabeledSample {
                    face: image(value),
                    albedo: image(value * 0.5),
                    normal: image(0.5),
                    mask: PixelImage::new(1, 8, 8, vec![1.0; 64]),
                    sh: vec![0.1; SH_COEFFICIENTS],
                }
            })
            .collect();
        InMemDataset::new(samples)
    }

    fn options(epochs: usize) -> TrainingOptions {
        TrainingOptions {
            epochs,
            batch_size: 2,
            learning_rate: 1e-3,
            weight_decay: 5e-4,
            seed: 1,
            validate_every: 1,
            test_every: 5,
            dump_all_images: false,
            train_loss: LossConfig::base(),
            eval_loss: LossConfig::evaluation(),
        }
    }

    fn bundle(
        train: usize,
        validation: usize,
        test: usize,
    ) -> SplitBundle<InMemDataset<LabeledSample>, RealFaceDataset> {
        SplitBundle {
            train: labeled_fixture(train),
            validation: labeled_fixture(validation),
            test: labeled_fixture(test),
            real: None,
        }
    }

    #[test]
    fn one_epoch_trains_validates_and_checkpoints() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let dirs = RunDirs::create(dir.path())?;
        let mut logger = NullLogger;

        let (_, summary) = run(
            tiny_net(),
            &ConstantShading { value: 1.0 },
            &bundle(4, 2, 2),
            &options(1),
            &dirs,
            &mut logger,
            &CandleDevice::Cpu,
        )?;

        assert_eq!(summary.epochs.len(), 1);
        assert_eq!(summary.validations, 1);
        assert_eq!(summary.checkpoints, 1);
        assert_eq!(summary.tests, 0);
        assert!(summary.final_validation.is_some());
        assert!(summary.final_test.is_none());
        assert!(dirs.checkpoints.join("sfs_net_model.mpk").exists());
        assert!(!summary.train_samples.is_empty());
        Ok(())
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = RunDirs::create(dir.path()).unwrap();
        let mut logger = NullLogger;
        let mut bad = options(1);
        bad.validate_every = 0;

        let err = run(
            tiny_net(),
            &ConstantShading { value: 1.0 },
            &bundle(2, 1, 1),
            &bad,
            &dirs,
            &mut logger,
            &CandleDevice::Cpu,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cadence"));
    }
}
