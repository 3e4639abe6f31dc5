//! Decomposition image dumps for visual inspection.
//!
//! Each dump writes the first sample of a batch as PNGs and returns the
//! artifacts for the logger. Labeled dumps include the two diagnostic
//! renders under ground-truth lighting; they are display-only and never fed
//! back into a loss.

use std::path::Path;

use anyhow::{anyhow, Result};
use burn::tensor::{backend::Backend, Tensor};

use faceshade_core::visualization::write_rgb_png;
use faceshade_core::ImageArtifact;

use crate::data::{LabeledBatch, UnlabeledBatch};
use crate::model::PipelineOutput;
use crate::shading::{render_face, ShadingRenderer};

/// Extract the first sample as interleaved RGB rows.
fn rgb_pixels<B: Backend>(tensor: Tensor<B, 4>) -> Result<(u32, u32, Vec<f32>)> {
    let [_, channels, height, width] = tensor.dims();
    let values = tensor
        .slice([0..1])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow!("failed to decode image tensor: {err:?}"))?;

    let plane = height * width;
    let mut pixels = Vec::with_capacity(plane * channels);
    for offset in 0..plane {
        for channel in 0..channels {
            pixels.push(values[channel * plane + offset]);
        }
    }
    Ok((width as u32, height as u32, pixels))
}

fn apply_mask<B: Backend>(image: Tensor<B, 4>, mask: &Tensor<B, 4>) -> Tensor<B, 4> {
    image * Tensor::cat(vec![mask.clone(), mask.clone(), mask.clone()], 1)
}

fn file_name(split: &str, epoch: usize, batch_index: Option<usize>, name: &str) -> String {
    match batch_index {
        Some(batch) => format!("{split}_{epoch}_{batch}_{name}.png"),
        None => format!("{split}_{epoch}_{name}.png"),
    }
}

fn write_set<B: Backend>(
    dir: &Path,
    split: &str,
    epoch: usize,
    batch_index: Option<usize>,
    images: Vec<(&str, Tensor<B, 4>)>,
) -> Result<Vec<ImageArtifact>> {
    let mut artifacts = Vec::with_capacity(images.len());
    for (name, image) in images {
        let path = dir.join(file_name(split, epoch, batch_index, name));
        let (width, height, pixels) = rgb_pixels(image)?;
        write_rgb_png(&path, width, height, &pixels)?;
        artifacts.push(ImageArtifact {
            caption: name.to_string(),
            path,
        });
    }
    Ok(artifacts)
}

/// Dump the full decomposition for a labeled batch, mask applied for
/// display.
pub fn dump_labeled_outputs<B: Backend, R: ShadingRenderer>(
    dir: &Path,
    split: &str,
    epoch: usize,
    batch_index: Option<usize>,
    batch: &LabeledBatch<B>,
    output: &PipelineOutput<B>,
    renderer: &R,
) -> Result<Vec<ImageArtifact>> {
    // Predicted decomposition re-lit by the ground-truth lighting, and the
    // fully synthetic face formed from ground truth alone.
    let real_sh_face = render_face(
        renderer,
        batch.sh.clone(),
        &output.normal,
        output.albedo.clone(),
    );
    let syn_gt_face = render_face(
        renderer,
        batch.sh.clone(),
        &batch.normal,
        batch.albedo.clone(),
    );

    let images = vec![
        ("predicted_normal", output.normal.tensor()),
        ("predicted_albedo", output.albedo.clone()),
        ("predicted_shading", output.shading.clone()),
        ("shading_residual", output.shading_residual.clone()),
        ("updated_shading", output.updated_shading.clone()),
        ("predicted_face", output.reconstruction.clone()),
        ("gt_face", batch.face.clone()),
        ("gt_normal", batch.normal.tensor()),
        ("gt_albedo", batch.albedo.clone()),
        ("real_sh_face", real_sh_face),
        ("syn_gt_face", syn_gt_face),
    ];
    let images = images
        .into_iter()
        .map(|(name, image)| (name, apply_mask(image, &batch.mask)))
        .collect();

    write_set(dir, split, epoch, batch_index, images)
}

/// Dump the predicted decomposition for an unlabeled batch.
pub fn dump_unlabeled_outputs<B: Backend>(
    dir: &Path,
    split: &str,
    epoch: usize,
    batch_index: Option<usize>,
    batch: &UnlabeledBatch<B>,
    output: &PipelineOutput<B>,
) -> Result<Vec<ImageArtifact>> {
    let images = vec![
        ("predicted_normal", output.normal.tensor()),
        ("predicted_albedo", output.albedo.clone()),
        ("predicted_shading", output.shading.clone()),
        ("shading_residual", output.shading_residual.clone()),
        ("updated_shading", output.updated_shading.clone()),
        ("predicted_face", output.reconstruction.clone()),
        ("input_face", batch.face.clone()),
    ];
    write_set(dir, split, epoch, batch_index, images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LabeledSample, PixelImage};
    use crate::shading::{ConstantShading, NormalizedNormals, SH_COEFFICIENTS};
    use burn_candle::{Candle, CandleDevice};

    type TestBackend = Candle<f32, i64>;

    fn filled(value: f32, shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::ones(shape, &CandleDevice::Cpu).mul_scalar(value)
    }

    fn test_batch(mask_value: f32) -> LabeledBatch<TestBackend> {
        let image = |v: f32| PixelImage::new(3, 4, 4, vec![v; 48]);
        let sample = LabeledSample {
            face: image(1.0),
            albedo: image(0.5),
            normal: image(0.5),
            mask: PixelImage::new(1, 4, 4, vec![mask_value; 16]),
            sh: vec![0.0; SH_COEFFICIENTS],
        };
        LabeledBatch::from_samples(&CandleDevice::Cpu, &[sample])
    }

    fn test_output() -> PipelineOutput<TestBackend> {
        let shape = [1, 3, 4, 4];
        PipelineOutput {
            normal: NormalizedNormals::new(filled(0.5, shape)),
            albedo: filled(0.5, shape),
            sh: Tensor::zeros([1, SH_COEFFICIENTS], &CandleDevice::Cpu),
            shading: filled(1.0, shape),
            shading_residual: filled(0.0, shape),
            updated_shading: filled(1.0, shape),
            reconstruction: filled(0.5, shape),
        }
    }

    #[test]
    fn labeled_dump_writes_the_full_image_set() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = dump_labeled_outputs(
            dir.path(),
            "val",
            3,
            Some(0),
            &test_batch(1.0),
            &test_output(),
            &ConstantShading { value: 1.0 },
        )?;

        assert_eq!(artifacts.len(), 11);
        for artifact in &artifacts {
            assert!(artifact.path.exists(), "missing {}", artifact.path.display());
        }
        assert!(dir.path().join("val_3_0_predicted_face.png").exists());
        assert!(dir.path().join("val_3_0_syn_gt_face.png").exists());

        let decoded = image::open(dir.path().join("val_3_0_gt_face.png"))?.to_rgb8();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
        Ok(())
    }

    #[test]
    fn zero_mask_blacks_out_the_display() -> Result<()> {
        let dir = tempfile::tempdir()?;
        dump_labeled_outputs(
            dir.path(),
            "train",
            1,
            None,
            &test_batch(0.0),
            &test_output(),
            &ConstantShading { value: 1.0 },
        )?;

        let decoded = image::open(dir.path().join("train_1_gt_face.png"))?.to_rgb8();
        assert!(decoded.pixels().all(|pixel| pixel[0] == 0 && pixel[1] == 0 && pixel[2] == 0));
        Ok(())
    }

    #[test]
    fn unlabeled_dump_skips_ground_truth_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let batch = UnlabeledBatch {
            face: filled(0.6, [1, 3, 4, 4]),
        };
        let artifacts =
            dump_unlabeled_outputs(dir.path(), "real", 2, Some(1), &batch, &test_output())?;

        assert_eq!(artifacts.len(), 7);
        assert!(dir.path().join("real_2_1_input_face.png").exists());
        assert!(!dir.path().join("real_2_1_gt_face.png").exists());
        Ok(())
    }
}
