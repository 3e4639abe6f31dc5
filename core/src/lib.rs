pub mod config;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod rng;
pub mod visualization;

pub use config::{load_or_init, save_json};
pub use logging::{FileLogger, ImageArtifact, NullLogger, RunLogger};
pub use metrics::{EpochRecord, LossAccumulator, LossTerms};
pub use report::{ensure_report_file, update_sections, ReportSection, DEFAULT_REPORT_TEMPLATE};
pub use rng::{derive_rng, seeded_rng};
pub use visualization::{
    encode_luma_png_data_url, encode_png_file_data_url, encode_rgb_png_data_url, write_luma_png,
    write_rgb_png,
};
