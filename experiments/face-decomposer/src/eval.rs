//! Evaluation passes over labeled and unlabeled splits.
//!
//! Both walk the split in dataset order with no parameter updates, so two
//! passes with frozen parameters produce identical averages. Run them on a
//! non-autodiff module (`valid()` on the training network) so the norm
//! layers use their running statistics.

use std::path::Path;

use anyhow::{bail, Result};
use burn::tensor::{backend::Backend, ElementConversion};
use burn_dataset::Dataset;

use faceshade_core::{ImageArtifact, LossAccumulator, LossTerms};

use crate::artifacts::{dump_labeled_outputs, dump_unlabeled_outputs};
use crate::data::{
    assemble_labeled, assemble_unlabeled, sequential_batches, LabeledSample, UnlabeledSample,
};
use crate::loss::{self, l1_distance, LossConfig};
use crate::model::DecompositionNet;
use crate::shading::ShadingRenderer;

/// Where and how an evaluation pass dumps its images.
pub struct EvalContext<'a> {
    pub image_dir: &'a Path,
    pub split: &'a str,
    pub epoch: usize,
    pub batch_size: usize,
    pub dump_all_images: bool,
}

/// Average the configured loss terms over a labeled split and dump the
/// decomposition image set for the first batch (or all of them).
pub fn evaluate_labeled<B, D, R>(
    net: &DecompositionNet<B>,
    renderer: &R,
    dataset: &D,
    config: &LossConfig,
    ctx: &EvalContext<'_>,
    device: &B::Device,
) -> Result<(LossTerms, Vec<ImageArtifact>)>
where
    B: Backend,
    D: Dataset<LabeledSample>,
    R: ShadingRenderer,
{
    if dataset.is_empty() {
        bail!("cannot evaluate the {} split: it is empty", ctx.split);
    }

    let mut accumulator = LossAccumulator::new();
    let mut artifacts = Vec::new();

    let plan = sequential_batches(dataset.len(), ctx.batch_size);
    for (batch_index, indices) in plan.iter().enumerate() {
        let batch = assemble_labeled::<B>(device, dataset, indices);
        let output = net.forward(batch.face.clone(), renderer);
        let breakdown = loss::compose(config, &output, &batch, renderer);
        accumulator.add(&breakdown.terms);

        if batch_index == 0 || ctx.dump_all_images {
            artifacts.extend(dump_labeled_outputs(
                ctx.image_dir,
                ctx.split,
                ctx.epoch,
                Some(batch_index),
                &batch,
                &output,
                renderer,
            )?);
        }
    }

    Ok((accumulator.average(), artifacts))
}

/// Average an L1 reconstruction loss against the input faces themselves;
/// real photographs carry no decomposition ground truth.
pub fn evaluate_unlabeled<B, D, R>(
    net: &DecompositionNet<B>,
    renderer: &R,
    dataset: &D,
    ctx: &EvalContext<'_>,
    device: &B::Device,
) -> Result<(LossTerms, Vec<ImageArtifact>)>
where
    B: Backend,
    D: Dataset<UnlabeledSample>,
    R: ShadingRenderer,
{
    if dataset.is_empty() {
        bail!("cannot evaluate the {} split: it is empty", ctx.split);
    }

    let mut accumulator = LossAccumulator::new();
    let mut artifacts = Vec::new();

    let plan = sequential_batches(dataset.len(), ctx.batch_size);
    for (batch_index, indices) in plan.iter().enumerate() {
        let batch = assemble_unlabeled::<B>(device, dataset, indices);
        let output = net.forward(batch.face.clone(), renderer);
        let recon = l1_distance(output.reconstruction.clone(), batch.face.clone())
            .into_scalar()
            .elem::<f32>();
        accumulator.add(&LossTerms {
            total: recon,
            recon,
            albedo: None,
            shading: None,
        });

        if batch_index == 0 || ctx.dump_all_images {
            artifacts.extend(dump_unlabeled_outputs(
                ctx.image_dir,
                ctx.split,
                ctx.epoch,
                Some(batch_index),
                &batch,
                &output,
            )?);
        }
    }

    Ok((accumulator.average(), artifacts))
}
