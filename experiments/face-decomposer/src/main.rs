use std::{
    env,
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use burn_autodiff::Autodiff;
use burn_candle::{Candle, CandleDevice};
use burn_dataset::Dataset;
use serde::{Deserialize, Serialize};

use faceshade_core::{
    derive_rng, encode_png_file_data_url, ensure_report_file, load_or_init, save_json,
    update_sections, FileLogger, ImageArtifact, ReportSection, DEFAULT_REPORT_TEMPLATE,
};
use faceshade_experiment_decomposer::checkpoint;
use faceshade_experiment_decomposer::data::{load_splits, DataRoots};
use faceshade_experiment_decomposer::loss::LossConfig;
use faceshade_experiment_decomposer::model::DecompositionNetConfig;
use faceshade_experiment_decomposer::shading::SphericalHarmonics;
use faceshade_experiment_decomposer::train::{self, RunDirs, RunSummary, TrainingOptions};

type TrainingBackend = Autodiff<Candle<f32, i64>>;

// Streams of the run seed: dataset splitting and epoch shuffling must not
// share a generator.
const SPLIT_RNG_STREAM: u64 = 0;

/// Persisted run hyperparameters. Command-line flags override individual
/// fields and the effective values are written back next to the run.
#[derive(Debug, Serialize, Deserialize)]
struct RunConfig {
    batch_size: usize,
    epochs: usize,
    learning_rate: f64,
    weight_decay: f32,
    seed: u64,
    read_first: Option<usize>,
    read_first_test: Option<usize>,
    validation_split_percent: usize,
    image_size: usize,
    base_width: usize,
    residual_blocks: usize,
    latent_light_channels: usize,
    validate_every: usize,
    test_every: usize,
    train_loss: LossConfig,
    eval_loss: LossConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            epochs: 10,
            learning_rate: 1e-3,
            weight_decay: 5e-4,
            seed: 1,
            read_first: None,
            read_first_test: Some(100),
            validation_split_percent: 2,
            image_size: 128,
            base_width: 128,
            residual_blocks: 5,
            latent_light_channels: 32,
            validate_every: 1,
            test_every: 5,
            train_loss: LossConfig::base(),
            eval_loss: LossConfig::evaluation(),
        }
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    batch_size: Option<usize>,
    epochs: Option<usize>,
    learning_rate: Option<f64>,
    weight_decay: Option<f32>,
    seed: Option<u64>,
    read_first: Option<i64>,
    image_size: Option<usize>,
    details: Option<String>,
    syn_data: Option<PathBuf>,
    celeba_data: Option<PathBuf>,
    real_data: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    load_model: Option<PathBuf>,
    loss_variant: Option<String>,
    dump_all_images: bool,
    no_cuda: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = env::args().skip(1);

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };

            match flag.as_str() {
                "--batch-size" => {
                    parsed.batch_size = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--epochs" => {
                    parsed.epochs = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--lr" => {
                    parsed.learning_rate = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--wt-decay" => {
                    parsed.weight_decay = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--seed" => parsed.seed = Some(number(&flag, &value(&flag, inline, &mut args)?)?),
                "--read-first" => {
                    parsed.read_first = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--image-size" => {
                    parsed.image_size = Some(number(&flag, &value(&flag, inline, &mut args)?)?)
                }
                "--details" => parsed.details = Some(value(&flag, inline, &mut args)?),
                "--syn-data" => {
                    parsed.syn_data = Some(PathBuf::from(value(&flag, inline, &mut args)?))
                }
                "--celeba-data" => {
                    parsed.celeba_data = Some(PathBuf::from(value(&flag, inline, &mut args)?))
                }
                "--real-data" => {
                    parsed.real_data = Some(PathBuf::from(value(&flag, inline, &mut args)?))
                }
                "--log-dir" => {
                    parsed.log_dir = Some(PathBuf::from(value(&flag, inline, &mut args)?))
                }
                "--load-model" => {
                    parsed.load_model = Some(PathBuf::from(value(&flag, inline, &mut args)?))
                }
                "--loss" => parsed.loss_variant = Some(value(&flag, inline, &mut args)?),
                "--dump-all-images" => parsed.dump_all_images = true,
                "--no-cuda" => parsed.no_cuda = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => {
                    return Err(anyhow!("unexpected argument: {}", arg));
                }
            }
        }

        Ok(parsed)
    }

    fn apply(&self, config: &mut RunConfig) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(weight_decay) = self.weight_decay {
            config.weight_decay = weight_decay;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(read_first) = self.read_first {
            // Negative means the whole index, as in --read-first -1.
            config.read_first = usize::try_from(read_first).ok();
        }
        if let Some(image_size) = self.image_size {
            config.image_size = image_size;
        }
    }
}

fn value(flag: &str, inline: Option<String>, args: &mut impl Iterator<Item = String>) -> Result<String> {
    match inline {
        Some(value) => Ok(value),
        None => args
            .next()
            .ok_or_else(|| anyhow!("expected value after {}", flag)),
    }
}

fn number<T>(flag: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| anyhow!("invalid value for {}: {}", flag, err))
}

fn print_usage() {
    println!("Usage: cargo run -p faceshade-experiment-decomposer -- --syn-data <dir> [options]");
    println!();
    println!("Options:");
    println!("  --syn-data <dir>       labeled synthetic dataset root (train.csv, test.csv)");
    println!("  --celeba-data <dir>    pseudo-labeled celeba root, merged into train and test");
    println!("  --real-data <dir>      unlabeled real-photo root (test.csv with face paths)");
    println!("  --log-dir <dir>        run output directory (default ./results)");
    println!("  --load-model <dir>     resume from the checkpoint in this directory");
    println!("  --loss <base|shading>  training loss variant (default base)");
    println!("  --batch-size <n>       samples per batch (default 8)");
    println!("  --epochs <n>           training epochs (default 10)");
    println!("  --lr <f>               learning rate (default 1e-3)");
    println!("  --wt-decay <f>         weight decay (default 5e-4)");
    println!("  --seed <n>             run seed (default 1)");
    println!("  --read-first <n>       cap each training index; -1 reads everything");
    println!("  --image-size <n>       square side images are resized to (default 128, must be even)");
    println!("  --details <text>       free-form run note, written to details.txt");
    println!("  --dump-all-images      dump every evaluation batch instead of the first");
    println!("  --no-cuda              train on the CPU");
}

fn main() -> Result<()> {
    let args = CliArgs::parse()?;

    let log_dir = args
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./results"));
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let config_path = log_dir.join("config.json");
    let mut config: RunConfig = load_or_init(&config_path, RunConfig::default)?;
    args.apply(&mut config);
    if let Some(variant) = args.loss_variant.as_deref() {
        config.train_loss = match variant {
            "base" => LossConfig::base(),
            "shading" => LossConfig::shading_residue(),
            other => bail!("invalid loss variant: {}", other),
        };
    }
    // The network halves and then doubles the spatial resolution.
    if config.image_size % 2 != 0 {
        bail!("image size must be even, got {}", config.image_size);
    }
    save_json(&config_path, &config)?;

    let syn_data = args
        .syn_data
        .clone()
        .ok_or_else(|| anyhow!("--syn-data is required"))?;

    fs::write(
        log_dir.join("details.txt"),
        args.details.clone().unwrap_or_default(),
    )
    .with_context(|| "failed to write details.txt".to_string())?;

    let report_path = log_dir.join("report.md");
    ensure_report_file(&report_path, DEFAULT_REPORT_TEMPLATE)?;

    let device = if args.no_cuda {
        CandleDevice::Cpu
    } else {
        CandleDevice::Cuda(0)
    };

    let dirs = RunDirs::create(&log_dir)?;

    let roots = DataRoots {
        synthetic: syn_data,
        celeba: args.celeba_data.clone(),
        real: args.real_data.clone(),
    };
    let mut split_rng = derive_rng(config.seed, SPLIT_RNG_STREAM);
    let data = load_splits(
        &roots,
        config.read_first,
        config.read_first_test,
        config.validation_split_percent,
        config.image_size as u32,
        &mut split_rng,
    )?;
    println!(
        "loaded {} training, {} validation, {} test samples",
        data.train.len(),
        data.validation.len(),
        data.test.len()
    );

    let net_config = DecompositionNetConfig::new()
        .with_base_width(config.base_width)
        .with_residual_blocks(config.residual_blocks)
        .with_latent_light_channels(config.latent_light_channels);
    let net = match &args.load_model {
        Some(dir) => {
            println!("resuming from checkpoint in {}", dir.display());
            checkpoint::load::<TrainingBackend>(&net_config, dir, &device)?
        }
        None => net_config.init::<TrainingBackend>(&device),
    };

    let options = TrainingOptions {
        epochs: config.epochs,
        batch_size: config.batch_size,
        learning_rate: config.learning_rate,
        weight_decay: config.weight_decay,
        seed: config.seed,
        validate_every: config.validate_every,
        test_every: config.test_every,
        dump_all_images: args.dump_all_images,
        train_loss: config.train_loss,
        eval_loss: config.eval_loss,
    };

    let mut logger = FileLogger::create(&log_dir)?;
    let renderer = SphericalHarmonics;

    let (_, summary) = train::run(
        net,
        &renderer,
        &data,
        &options,
        &dirs,
        &mut logger,
        &device,
    )?;

    write_summary(&log_dir.join("summary.json"), &summary)?;
    write_report(&report_path, &config, &options, &summary)?;

    println!("run artifacts written to {}", log_dir.display());
    Ok(())
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let serialized = serde_json::to_string_pretty(summary)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write summary to {}", path.display()))?;
    Ok(())
}

fn write_report(
    report_path: &Path,
    config: &RunConfig,
    options: &TrainingOptions,
    summary: &RunSummary,
) -> Result<()> {
    let sections = [
        ReportSection::new(
            "configuration",
            render_configuration_section(config, options),
        ),
        ReportSection::new("metrics", render_metrics_section(summary)),
        ReportSection::new(
            "samples-train",
            render_samples_section("Training split, last epoch", &summary.train_samples)?,
        ),
        ReportSection::new(
            "samples-validation",
            render_samples_section("Validation split, last pass", &summary.validation_samples)?,
        ),
    ];

    update_sections(report_path, &sections)
}

fn render_configuration_section(config: &RunConfig, options: &TrainingOptions) -> String {
    let loss = match options.train_loss.shading {
        Some(term) => format!(
            "recon {} + albedo {} + shading {}",
            options.train_loss.recon_weight, options.train_loss.albedo_weight, term.weight
        ),
        None => format!(
            "recon {} + albedo {}",
            options.train_loss.recon_weight, options.train_loss.albedo_weight
        ),
    };
    format!(
        "- Seed: {}\n- Batch size: {}\n- Image size: {}\n- Epochs: {}\n- Learning rate: {}\n- Weight decay: {}\n- Validation split: {}%\n- Training loss: {}\n- Network width: {} ({} residual blocks, {} latent light channels)\n",
        config.seed,
        config.batch_size,
        config.image_size,
        config.epochs,
        config.learning_rate,
        config.weight_decay,
        config.validation_split_percent,
        loss,
        config.base_width,
        config.residual_blocks,
        config.latent_light_channels
    )
}

fn render_metrics_section(summary: &RunSummary) -> String {
    let mut output = String::new();

    if let Some(terms) = &summary.final_validation {
        let _ = writeln!(
            &mut output,
            "- Final validation total: {:.4} (recon {:.4})",
            terms.total, terms.recon
        );
    }
    if let Some(terms) = &summary.final_test {
        let _ = writeln!(
            &mut output,
            "- Final test total: {:.4} (recon {:.4})",
            terms.total, terms.recon
        );
    }
    let _ = writeln!(
        &mut output,
        "- Validation passes: {} ({} checkpoints)\n- Test passes: {}\n",
        summary.validations, summary.checkpoints, summary.tests
    );

    if !summary.epochs.is_empty() {
        let _ = writeln!(
            &mut output,
            "| Epoch | Train Total | Train Recon | Train Albedo | Train Shading |"
        );
        let _ = writeln!(&mut output, "| --- | --- | --- | --- | --- |");
        for record in &summary.epochs {
            let albedo = record
                .terms
                .albedo
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "-".to_string());
            let shading = record
                .terms
                .shading
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                &mut output,
                "| {} | {:.4} | {:.4} | {} | {} |",
                record.epoch, record.terms.total, record.terms.recon, albedo, shading
            );
        }
    }

    output
}

fn render_samples_section(title: &str, artifacts: &[ImageArtifact]) -> Result<String> {
    if artifacts.is_empty() {
        return Ok(format!(
            "### {}\n\nNo images were dumped for this split.",
            title
        ));
    }

    let mut output = String::new();
    let _ = writeln!(&mut output, "### {}\n", title);
    for artifact in artifacts {
        let data_url = encode_png_file_data_url(&artifact.path)?;
        let _ = writeln!(&mut output, "![{}]({})\n", artifact.caption, data_url);
    }

    Ok(output)
}
