//! Weighted multi-term losses over the pipeline output.
//!
//! The composer is a pure function of its inputs; every weight and kernel
//! choice comes from [`LossConfig`], never from the call site. Ground-truth
//! shading is rendered on demand from the batch's normals and lighting, not
//! stored.

use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use faceshade_core::LossTerms;

use crate::data::LabeledBatch;
use crate::model::PipelineOutput;
use crate::shading::ShadingRenderer;

/// Regression kernel for one loss term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    SmoothL1,
    SquaredError,
}

/// Supervision of the corrected shading, when enabled.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ShadingTerm {
    pub weight: f64,
    pub kind: LossKind,
}

/// Weighted loss composition for one run variant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LossConfig {
    pub recon_weight: f64,
    pub recon_kind: LossKind,
    pub albedo_weight: f64,
    pub albedo_kind: LossKind,
    pub shading: Option<ShadingTerm>,
}

impl LossConfig {
    /// Reconstruction and albedo supervision only.
    pub fn base() -> Self {
        Self {
            recon_weight: 1.0,
            recon_kind: LossKind::SquaredError,
            albedo_weight: 0.5,
            albedo_kind: LossKind::SmoothL1,
            shading: None,
        }
    }

    /// Adds supervision of the corrected shading against shading rendered
    /// from ground-truth normals and lighting.
    pub fn shading_residue() -> Self {
        Self {
            recon_weight: 0.3,
            recon_kind: LossKind::SmoothL1,
            albedo_weight: 0.5,
            albedo_kind: LossKind::SmoothL1,
            shading: Some(ShadingTerm {
                weight: 0.7,
                kind: LossKind::SmoothL1,
            }),
        }
    }

    /// The weighting used to report validation and test losses.
    pub fn evaluation() -> Self {
        Self {
            recon_weight: 0.5,
            recon_kind: LossKind::SmoothL1,
            albedo_weight: 0.5,
            albedo_kind: LossKind::SmoothL1,
            shading: None,
        }
    }
}

/// Mean squared error over all elements.
pub fn squared_error<B: Backend>(prediction: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    let difference = prediction - target;
    (difference.clone() * difference).mean()
}

/// Smooth L1: quadratic inside the unit ball, linear outside.
pub fn smooth_l1<B: Backend>(prediction: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    let difference = prediction - target;
    let magnitude = difference.clone().abs();
    let quadratic = (difference.clone() * difference).mul_scalar(0.5);
    let linear = magnitude.clone().sub_scalar(0.5);
    let inside = magnitude.lower_elem(1.0);
    linear.mask_where(inside, quadratic).mean()
}

/// Mean absolute difference.
pub fn l1_distance<B: Backend>(prediction: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    (prediction - target).abs().mean()
}

fn regression<B: Backend>(
    kind: LossKind,
    prediction: Tensor<B, 4>,
    target: Tensor<B, 4>,
) -> Tensor<B, 1> {
    match kind {
        LossKind::SmoothL1 => smooth_l1(prediction, target),
        LossKind::SquaredError => squared_error(prediction, target),
    }
}

/// The weighted total, kept as a tensor for backpropagation, plus the raw
/// per-term values for logging.
#[derive(Debug)]
pub struct LossBreakdown<B: Backend> {
    pub total: Tensor<B, 1>,
    pub terms: LossTerms,
}

pub fn compose<B: Backend, R: ShadingRenderer>(
    config: &LossConfig,
    output: &PipelineOutput<B>,
    batch: &LabeledBatch<B>,
    renderer: &R,
) -> LossBreakdown<B> {
    let recon = regression(
        config.recon_kind,
        output.reconstruction.clone(),
        batch.face.clone(),
    );
    let albedo = regression(
        config.albedo_kind,
        output.albedo.clone(),
        batch.albedo.clone(),
    );

    let mut total = recon.clone().mul_scalar(config.recon_weight)
        + albedo.clone().mul_scalar(config.albedo_weight);

    let mut shading_term = None;
    if let Some(term) = &config.shading {
        let gt_shading = renderer.render(&batch.normal.to_world(), batch.sh.clone());
        let shading = regression(term.kind, output.updated_shading.clone(), gt_shading);
        total = total + shading.clone().mul_scalar(term.weight);
        shading_term = Some(shading.into_scalar().elem::<f32>());
    }

    let terms = LossTerms {
        total: total.clone().into_scalar().elem::<f32>(),
        recon: recon.into_scalar().elem::<f32>(),
        albedo: Some(albedo.into_scalar().elem::<f32>()),
        shading: shading_term,
    };

    LossBreakdown { total, terms }
}
