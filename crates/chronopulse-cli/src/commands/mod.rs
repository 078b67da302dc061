pub mod analyze;
pub mod epoch;
pub mod mixer;
pub mod stream;

use chronopulse_core::config::PipelineConfig;

/// Load a pipeline config from `--config`, or fall back to defaults.
/// A bad config file is a hard error, not a silent fallback.
pub fn load_pipeline_config(path: Option<&str>) -> PipelineConfig {
    match path {
        Some(path) => match PipelineConfig::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Failed to load config {path}: {err}");
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    }
}
