//! Dataset indices, image decoding and batch assembly.
//!
//! A data root holds `train.csv` and `test.csv`, each row naming the face,
//! albedo, normal and mask images plus a text file of 27 lighting
//! coefficients, all relative to the root. Images decode lazily per index
//! and are resized to the configured square size; the paths themselves are
//! checked once when the splits are loaded.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use burn_dataset::Dataset;
use image::imageops::FilterType;
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::Deserialize;

use crate::shading::{NormalizedNormals, SH_COEFFICIENTS};

const TRAIN_INDEX: &str = "train.csv";
const TEST_INDEX: &str = "test.csv";

/// Decoded image planes in channel-major order, values in [0, 1].
#[derive(Clone, Debug)]
pub struct PixelImage {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl PixelImage {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            channels * height * width,
            "pixel buffer does not match dimensions"
        );
        Self {
            channels,
            height,
            width,
            data,
        }
    }
}

/// A fully supervised sample: input face plus its decomposition targets.
#[derive(Clone, Debug)]
pub struct LabeledSample {
    pub face: PixelImage,
    pub albedo: PixelImage,
    pub normal: PixelImage,
    pub mask: PixelImage,
    pub sh: Vec<f32>,
}

/// A face photograph without decomposition targets.
#[derive(Clone, Debug)]
pub struct UnlabeledSample {
    pub face: PixelImage,
}

#[derive(Debug, Deserialize)]
struct LabeledRow {
    face: String,
    albedo: String,
    normal: String,
    mask: String,
    sh: String,
}

#[derive(Debug, Deserialize)]
struct UnlabeledRow {
    face: String,
}

/// The on-disk files backing one labeled sample.
#[derive(Clone, Debug)]
pub struct SampleLocator {
    pub face: PathBuf,
    pub albedo: PathBuf,
    pub normal: PathBuf,
    pub mask: PathBuf,
    pub sh: PathBuf,
}

impl SampleLocator {
    fn paths(&self) -> [&PathBuf; 5] {
        [&self.face, &self.albedo, &self.normal, &self.mask, &self.sh]
    }
}

fn read_labeled_index(root: &Path, file_name: &str) -> Result<Vec<SampleLocator>> {
    let path = root.join(file_name);
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("failed to open index {}", path.display()))?;

    let mut locators = Vec::new();
    for row in reader.deserialize() {
        let row: LabeledRow =
            row.with_context(|| format!("malformed row in {}", path.display()))?;
        locators.push(SampleLocator {
            face: root.join(&row.face),
            albedo: root.join(&row.albedo),
            normal: root.join(&row.normal),
            mask: root.join(&row.mask),
            sh: root.join(&row.sh),
        });
    }
    Ok(locators)
}

fn read_unlabeled_index(root: &Path, file_name: &str) -> Result<Vec<PathBuf>> {
    let path = root.join(file_name);
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("failed to open index {}", path.display()))?;

    let mut faces = Vec::new();
    for row in reader.deserialize() {
        let row: UnlabeledRow =
            row.with_context(|| format!("malformed row in {}", path.display()))?;
        faces.push(root.join(&row.face));
    }
    Ok(faces)
}

pub fn load_rgb(path: &Path, image_size: u32) -> Result<PixelImage> {
    let mut img = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgb8();
    if img.dimensions() != (image_size, image_size) {
        img = image::imageops::resize(&img, image_size, image_size, FilterType::Triangle);
    }
    let (width, height) = (img.width() as usize, img.height() as usize);
    let plane = height * width;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * width + x as usize;
        data[offset] = pixel[0] as f32 / 255.0;
        data[plane + offset] = pixel[1] as f32 / 255.0;
        data[2 * plane + offset] = pixel[2] as f32 / 255.0;
    }
    Ok(PixelImage::new(3, height, width, data))
}

pub fn load_mask(path: &Path, image_size: u32) -> Result<PixelImage> {
    let mut img = image::open(path)
        .with_context(|| format!("failed to open mask {}", path.display()))?
        .to_luma8();
    if img.dimensions() != (image_size, image_size) {
        img = image::imageops::resize(&img, image_size, image_size, FilterType::Triangle);
    }
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut data = vec![0.0f32; height * width];
    for (x, y, pixel) in img.enumerate_pixels() {
        data[y as usize * width + x as usize] = pixel[0] as f32 / 255.0;
    }
    Ok(PixelImage::new(1, height, width, data))
}

/// Parse a lighting file: 27 floats separated by whitespace or commas.
pub fn load_sh(path: &Path) -> Result<Vec<f32>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read lighting file {}", path.display()))?;
    let values = contents
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f32>().with_context(|| {
                format!("bad lighting coefficient {:?} in {}", token, path.display())
            })
        })
        .collect::<Result<Vec<f32>>>()?;
    if values.len() != SH_COEFFICIENTS {
        bail!(
            "{} holds {} lighting coefficients, expected {}",
            path.display(),
            values.len(),
            SH_COEFFICIENTS
        );
    }
    Ok(values)
}

fn load_labeled(locator: &SampleLocator, image_size: u32) -> Result<LabeledSample> {
    Ok(LabeledSample {
        face: load_rgb(&locator.face, image_size)?,
        albedo: load_rgb(&locator.albedo, image_size)?,
        normal: load_rgb(&locator.normal, image_size)?,
        mask: load_mask(&locator.mask, image_size)?,
        sh: load_sh(&locator.sh)?,
    })
}

/// Labeled decomposition dataset backed by on-disk files.
#[derive(Debug)]
pub struct SfsDataset {
    locators: Vec<SampleLocator>,
    image_size: u32,
}

impl SfsDataset {
    pub fn new(locators: Vec<SampleLocator>, image_size: u32) -> Self {
        Self {
            locators,
            image_size,
        }
    }
}

impl Dataset<LabeledSample> for SfsDataset {
    fn get(&self, index: usize) -> Option<LabeledSample> {
        let locator = self.locators.get(index)?;
        // The trait cannot surface IO errors; paths were checked at load
        // time, so a failure here is a corrupt or vanished file.
        let sample = load_labeled(locator, self.image_size)
            .unwrap_or_else(|err| panic!("sample {}: {err:#}", locator.face.display()));
        Some(sample)
    }

    fn len(&self) -> usize {
        self.locators.len()
    }
}

/// Unlabeled face photographs backed by on-disk files.
#[derive(Debug)]
pub struct RealFaceDataset {
    faces: Vec<PathBuf>,
    image_size: u32,
}

impl RealFaceDataset {
    pub fn new(faces: Vec<PathBuf>, image_size: u32) -> Self {
        Self { faces, image_size }
    }
}

impl Dataset<UnlabeledSample> for RealFaceDataset {
    fn get(&self, index: usize) -> Option<UnlabeledSample> {
        let path = self.faces.get(index)?;
        let face = load_rgb(path, self.image_size)
            .unwrap_or_else(|err| panic!("sample {}: {err:#}", path.display()));
        Some(UnlabeledSample { face })
    }

    fn len(&self) -> usize {
        self.faces.len()
    }
}

/// Where the data sources live on disk.
#[derive(Clone, Debug)]
pub struct DataRoots {
    pub synthetic: PathBuf,
    pub celeba: Option<PathBuf>,
    pub real: Option<PathBuf>,
}

/// The datasets a single run trains and evaluates on.
#[derive(Debug)]
pub struct SplitBundle<D, U> {
    pub train: D,
    pub validation: D,
    pub test: D,
    pub real: Option<U>,
}

/// Read the indices and carve out the splits.
///
/// Pseudo-labeled celeba rows merge into the synthetic train and test rows
/// before anything else. The validation split is then drawn from the merged
/// training rows with `rng`, and the merged test rows are truncated to
/// `read_first_test`. `read_first` caps each training index at read time.
pub fn load_splits(
    roots: &DataRoots,
    read_first: Option<usize>,
    read_first_test: Option<usize>,
    validation_percent: usize,
    image_size: u32,
    rng: &mut StdRng,
) -> Result<SplitBundle<SfsDataset, RealFaceDataset>> {
    let mut train_rows = read_labeled_index(&roots.synthetic, TRAIN_INDEX)?;
    truncate(&mut train_rows, read_first);
    let mut test_rows = read_labeled_index(&roots.synthetic, TEST_INDEX)?;

    if let Some(celeba) = &roots.celeba {
        let mut celeba_rows = read_labeled_index(celeba, TRAIN_INDEX)?;
        truncate(&mut celeba_rows, read_first);
        train_rows.append(&mut celeba_rows);
        test_rows.append(&mut read_labeled_index(celeba, TEST_INDEX)?);
    }
    truncate(&mut test_rows, read_first_test);

    train_rows.shuffle(rng);
    let validation_len = train_rows.len() * validation_percent / 100;
    let validation_rows: Vec<SampleLocator> = train_rows.drain(..validation_len).collect();

    if validation_rows.is_empty() {
        bail!(
            "validation split is empty ({} training rows at {} percent)",
            train_rows.len(),
            validation_percent
        );
    }
    if train_rows.is_empty() {
        bail!("no training rows left after the validation split");
    }
    if test_rows.is_empty() {
        bail!("test index is empty");
    }

    validate_locators(&train_rows)?;
    validate_locators(&validation_rows)?;
    validate_locators(&test_rows)?;

    let real = match &roots.real {
        Some(root) => {
            let mut faces = read_unlabeled_index(root, TEST_INDEX)?;
            truncate(&mut faces, read_first_test);
            for path in &faces {
                if !path.exists() {
                    bail!("indexed file {} does not exist", path.display());
                }
            }
            Some(RealFaceDataset::new(faces, image_size))
        }
        None => None,
    };

    Ok(SplitBundle {
        train: SfsDataset::new(train_rows, image_size),
        validation: SfsDataset::new(validation_rows, image_size),
        test: SfsDataset::new(test_rows, image_size),
        real,
    })
}

fn truncate<T>(rows: &mut Vec<T>, limit: Option<usize>) {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
}

fn validate_locators(rows: &[SampleLocator]) -> Result<()> {
    for locator in rows {
        for path in locator.paths() {
            if !path.exists() {
                bail!("indexed file {} does not exist", path.display());
            }
        }
    }
    Ok(())
}

/// One labeled batch on the device. Image tensors are NCHW with values in
/// [0, 1]; lighting is `[batch, 27]`.
#[derive(Clone, Debug)]
pub struct LabeledBatch<B: Backend> {
    pub face: Tensor<B, 4>,
    pub albedo: Tensor<B, 4>,
    pub normal: NormalizedNormals<B>,
    pub mask: Tensor<B, 4>,
    pub sh: Tensor<B, 2>,
}

impl<B: Backend> LabeledBatch<B> {
    pub fn from_samples(device: &B::Device, samples: &[LabeledSample]) -> Self {
        assert!(!samples.is_empty(), "cannot assemble an empty batch");
        let count = samples.len();
        let height = samples[0].face.height;
        let width = samples[0].face.width;
        let plane = height * width;

        let mut faces = Vec::with_capacity(count * 3 * plane);
        let mut albedos = Vec::with_capacity(count * 3 * plane);
        let mut normals = Vec::with_capacity(count * 3 * plane);
        let mut masks = Vec::with_capacity(count * plane);
        let mut sh = Vec::with_capacity(count * SH_COEFFICIENTS);

        for sample in samples {
            extend_checked(&mut faces, &sample.face, 3, height, width);
            extend_checked(&mut albedos, &sample.albedo, 3, height, width);
            extend_checked(&mut normals, &sample.normal, 3, height, width);
            extend_checked(&mut masks, &sample.mask, 1, height, width);
            assert_eq!(
                sample.sh.len(),
                SH_COEFFICIENTS,
                "sample lighting does not hold 27 coefficients"
            );
            sh.extend_from_slice(&sample.sh);
        }

        let face = Tensor::<B, 4>::from_floats(
            TensorData::new(faces, [count, 3, height, width]),
            device,
        );
        let albedo = Tensor::<B, 4>::from_floats(
            TensorData::new(albedos, [count, 3, height, width]),
            device,
        );
        let normal = Tensor::<B, 4>::from_floats(
            TensorData::new(normals, [count, 3, height, width]),
            device,
        );
        let mask = Tensor::<B, 4>::from_floats(
            TensorData::new(masks, [count, 1, height, width]),
            device,
        );
        let sh = Tensor::<B, 2>::from_floats(
            TensorData::new(sh, [count, SH_COEFFICIENTS]),
            device,
        );

        Self {
            face,
            albedo,
            normal: NormalizedNormals::new(normal),
            mask,
            sh,
        }
    }
}

/// One unlabeled batch: input faces only.
#[derive(Clone, Debug)]
pub struct UnlabeledBatch<B: Backend> {
    pub face: Tensor<B, 4>,
}

impl<B: Backend> UnlabeledBatch<B> {
    pub fn from_samples(device: &B::Device, samples: &[UnlabeledSample]) -> Self {
        assert!(!samples.is_empty(), "cannot assemble an empty batch");
        let count = samples.len();
        let height = samples[0].face.height;
        let width = samples[0].face.width;

        let mut faces = Vec::with_capacity(count * 3 * height * width);
        for sample in samples {
            extend_checked(&mut faces, &sample.face, 3, height, width);
        }

        Self {
            face: Tensor::<B, 4>::from_floats(
                TensorData::new(faces, [count, 3, height, width]),
                device,
            ),
        }
    }
}

fn extend_checked(
    buffer: &mut Vec<f32>,
    image: &PixelImage,
    channels: usize,
    height: usize,
    width: usize,
) {
    assert_eq!(
        (image.channels, image.height, image.width),
        (channels, height, width),
        "sample image dimensions do not match the batch"
    );
    buffer.extend_from_slice(&image.data);
}

pub fn assemble_labeled<B: Backend>(
    device: &B::Device,
    dataset: &impl Dataset<LabeledSample>,
    indices: &[usize],
) -> LabeledBatch<B> {
    let items: Vec<LabeledSample> = indices
        .iter()
        .map(|&index| dataset.get(index).unwrap())
        .collect();
    LabeledBatch::from_samples(device, &items)
}

pub fn assemble_unlabeled<B: Backend>(
    device: &B::Device,
    dataset: &impl Dataset<UnlabeledSample>,
    indices: &[usize],
) -> UnlabeledBatch<B> {
    let items: Vec<UnlabeledSample> = indices
        .iter()
        .map(|&index| dataset.get(index).unwrap())
        .collect();
    UnlabeledBatch::from_samples(device, &items)
}

/// Index batches in shuffled order. The trailing partial batch is kept.
pub fn shuffled_batches(len: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    assert!(batch_size > 0, "batch size must be positive");
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Index batches in dataset order, for deterministic evaluation.
pub fn sequential_batches(len: usize, batch_size: usize) -> Vec<Vec<usize>> {
    assert!(batch_size > 0, "batch size must be positive");
    let indices: Vec<usize> = (0..len).collect();
    indices
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_candle::{Candle, CandleDevice};
    use faceshade_core::rng::seeded_rng;
    use faceshade_core::visualization::{write_luma_png, write_rgb_png};
    use std::fmt::Write as _;

    type TestBackend = Candle<f32, i64>;

    fn flat_sample(value: f32, height: usize, width: usize) -> LabeledSample {
        let rgb = PixelImage::new(3, height, width, vec![value; 3 * height * width]);
        let mask = PixelImage::new(1, height, width, vec![1.0; height * width]);
        LabeledSample {
            face: rgb.clone(),
            albedo: rgb.clone(),
            normal: rgb,
            mask,
            sh: vec![0.0; SH_COEFFICIENTS],
        }
    }

    fn write_fixture_sample(root: &Path, stem: &str) -> Result<String> {
        let pixels = vec![0.5f32; 4 * 4 * 3];
        let mask = vec![1.0f32; 4 * 4];
        write_rgb_png(&root.join(format!("{stem}_face.png")), 4, 4, &pixels)?;
        write_rgb_png(&root.join(format!("{stem}_albedo.png")), 4, 4, &pixels)?;
        write_rgb_png(&root.join(format!("{stem}_normal.png")), 4, 4, &pixels)?;
        write_luma_png(&root.join(format!("{stem}_mask.png")), 4, 4, &mask)?;
        let coefficients = (0..SH_COEFFICIENTS)
            .map(|i| format!("{:.3}", i as f32 * 0.1))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(root.join(format!("{stem}_light.txt")), coefficients)?;
        Ok(format!(
            "{stem}_face.png,{stem}_albedo.png,{stem}_normal.png,{stem}_mask.png,{stem}_light.txt"
        ))
    }

    fn write_fixture_root(root: &Path, train: usize, test: usize) -> Result<()> {
        fs::create_dir_all(root)?;
        let mut train_index = String::from("face,albedo,normal,mask,sh\n");
        for i in 0..train {
            let row = write_fixture_sample(root, &format!("train{i}"))?;
            writeln!(train_index, "{row}")?;
        }
        let mut test_index = String::from("face,albedo,normal,mask,sh\n");
        for i in 0..test {
            let row = write_fixture_sample(root, &format!("test{i}"))?;
            writeln!(test_index, "{row}")?;
        }
        fs::write(root.join(TRAIN_INDEX), train_index)?;
        fs::write(root.join(TEST_INDEX), test_index)?;
        Ok(())
    }

    #[test]
    fn shuffled_plan_is_seeded_and_covers_every_index() {
        let first = shuffled_batches(11, 4, &mut seeded_rng(9));
        let second = shuffled_batches(11, 4, &mut seeded_rng(9));
        assert_eq!(first, second);

        let sizes: Vec<usize> = first.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 3]);

        let mut seen: Vec<usize> = first.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..11).collect::<Vec<usize>>());
    }

    #[test]
    fn sequential_plan_preserves_dataset_order() {
        let plan = sequential_batches(5, 2);
        assert_eq!(plan, vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert!(sequential_batches(0, 3).is_empty());
    }

    #[test]
    fn lighting_file_parses_whitespace_and_commas() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("light.txt");
        let mut contents = String::new();
        for i in 0..SH_COEFFICIENTS {
            let separator = if i % 3 == 2 { "\n" } else { ", " };
            write!(contents, "{}{}", i as f32 * 0.5, separator)?;
        }
        fs::write(&path, contents)?;

        let values = load_sh(&path)?;
        assert_eq!(values.len(), SH_COEFFICIENTS);
        assert_eq!(values[2], 1.0);
        Ok(())
    }

    #[test]
    fn lighting_file_with_wrong_arity_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("light.txt");
        fs::write(&path, "0.1 0.2 0.3")?;
        let err = load_sh(&path).unwrap_err();
        assert!(err.to_string().contains("expected 27"));
        Ok(())
    }

    #[test]
    fn splits_merge_carve_and_truncate() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        let celeba = dir.path().join("celeba");
        write_fixture_root(&synthetic, 8, 3)?;
        write_fixture_root(&celeba, 2, 2)?;

        let roots = DataRoots {
            synthetic,
            celeba: Some(celeba),
            real: None,
        };
        let splits = load_splits(&roots, None, Some(4), 20, 4, &mut seeded_rng(1))?;

        // 8 + 2 merged rows, 20 percent carved off for validation.
        assert_eq!(splits.validation.len(), 2);
        assert_eq!(splits.train.len(), 8);
        // 3 + 2 merged test rows truncated to 4.
        assert_eq!(splits.test.len(), 4);
        assert!(splits.real.is_none());

        let sample = splits.train.get(0).unwrap();
        assert_eq!(sample.face.height, 4);
        assert_eq!(sample.sh.len(), SH_COEFFICIENTS);
        Ok(())
    }

    #[test]
    fn loaded_images_are_resized_to_the_configured_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        write_fixture_root(&synthetic, 5, 1)?;

        let roots = DataRoots {
            synthetic,
            celeba: None,
            real: None,
        };
        let splits = load_splits(&roots, None, None, 20, 2, &mut seeded_rng(1))?;

        let sample = splits.train.get(0).unwrap();
        assert_eq!((sample.face.height, sample.face.width), (2, 2));
        assert_eq!((sample.mask.height, sample.mask.width), (2, 2));
        assert!(sample.mask.data.iter().all(|&value| value == 1.0));
        Ok(())
    }

    #[test]
    fn read_first_caps_each_training_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        let celeba = dir.path().join("celeba");
        write_fixture_root(&synthetic, 6, 2)?;
        write_fixture_root(&celeba, 6, 1)?;

        let roots = DataRoots {
            synthetic,
            celeba: Some(celeba),
            real: None,
        };
        let splits = load_splits(&roots, Some(5), None, 20, 4, &mut seeded_rng(1))?;

        // 5 + 5 capped rows, 2 carved off for validation.
        assert_eq!(splits.train.len() + splits.validation.len(), 10);
        assert_eq!(splits.validation.len(), 2);
        assert_eq!(splits.test.len(), 3);
        Ok(())
    }

    #[test]
    fn real_root_is_truncated_like_the_test_split() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        write_fixture_root(&synthetic, 5, 1)?;

        let real = dir.path().join("real");
        fs::create_dir_all(&real)?;
        let mut index = String::from("face\n");
        for i in 0..3 {
            let name = format!("photo{i}.png");
            write_rgb_png(&real.join(&name), 4, 4, &vec![0.5f32; 48])?;
            writeln!(index, "{name}")?;
        }
        fs::write(real.join(TEST_INDEX), index)?;

        let roots = DataRoots {
            synthetic,
            celeba: None,
            real: Some(real),
        };
        let splits = load_splits(&roots, None, Some(2), 20, 4, &mut seeded_rng(1))?;

        let real_split = splits.real.expect("real split is present");
        assert_eq!(real_split.len(), 2);
        assert_eq!(real_split.get(0).unwrap().face.channels, 3);
        Ok(())
    }

    #[test]
    fn missing_indexed_file_fails_the_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        write_fixture_root(&synthetic, 5, 1)?;
        fs::remove_file(synthetic.join("train2_albedo.png"))?;

        let roots = DataRoots {
            synthetic,
            celeba: None,
            real: None,
        };
        let err = load_splits(&roots, None, None, 20, 4, &mut seeded_rng(1)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        Ok(())
    }

    #[test]
    fn empty_validation_split_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synthetic = dir.path().join("syn");
        write_fixture_root(&synthetic, 3, 1)?;

        let roots = DataRoots {
            synthetic,
            celeba: None,
            real: None,
        };
        // 3 rows at 20 percent rounds down to zero validation rows.
        let err = load_splits(&roots, None, None, 20, 4, &mut seeded_rng(1)).unwrap_err();
        assert!(err.to_string().contains("validation split is empty"));
        Ok(())
    }

    #[test]
    fn labeled_batch_has_the_expected_shapes() {
        let samples = vec![flat_sample(0.2, 4, 6), flat_sample(0.8, 4, 6)];
        let batch = LabeledBatch::<TestBackend>::from_samples(&CandleDevice::Cpu, &samples);

        assert_eq!(batch.face.dims(), [2, 3, 4, 6]);
        assert_eq!(batch.albedo.dims(), [2, 3, 4, 6]);
        assert_eq!(batch.normal.tensor().dims(), [2, 3, 4, 6]);
        assert_eq!(batch.mask.dims(), [2, 1, 4, 6]);
        assert_eq!(batch.sh.dims(), [2, SH_COEFFICIENTS]);
    }

    #[test]
    #[should_panic(expected = "dimensions do not match")]
    fn mixed_resolutions_cannot_share_a_batch() {
        let samples = vec![flat_sample(0.2, 4, 4), flat_sample(0.8, 8, 8)];
        let _ = LabeledBatch::<TestBackend>::from_samples(&CandleDevice::Cpu, &samples);
    }
}
