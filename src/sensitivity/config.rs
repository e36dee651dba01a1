//! The sensitivity analysis configuration file.
use crate::input::read_toml;
use crate::model::SourceID;
use anyhow::{Result, ensure};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::{Path, PathBuf};

/// The default file name for a sensitivity analysis configuration
pub const SENSITIVITY_FILE_NAME: &str = "sensitivity.toml";

/// How parameter values are sampled
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq)]
pub enum Sampler {
    /// Saltelli's extension of the Sobol' sequence, for variance decomposition
    #[string = "saltelli"]
    Saltelli,
    /// Latin hypercube sampling
    #[string = "lhs"]
    Lhs,
}

/// A model parameter to vary, with the range over which to vary it
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterRange {
    /// Name used for this parameter in output files
    pub name: String,
    /// Path to the value in the model file, e.g. `["parameters", "co2_per_mwh", "oil"]`
    pub key_path: Vec<String>,
    /// Lower and upper bounds
    pub bounds: [f64; 2],
}

fn default_baseline_model_config() -> PathBuf {
    PathBuf::from(crate::model::MODEL_FILE_NAME)
}

const fn default_num_resamples() -> usize {
    100
}

const fn default_conf_level() -> f64 {
    0.95
}

/// Settings for a sensitivity analysis
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SensitivityConfig {
    /// How to sample parameter values
    pub sampler: Sampler,
    /// Number of base samples
    pub num_samples: usize,
    /// Whether to calculate second-order Sobol' indices
    #[serde(default)]
    pub calc_second_order: bool,
    /// Path to the baseline model file, relative to the configuration file
    #[serde(default = "default_baseline_model_config")]
    pub baseline_model_config: PathBuf,
    /// The energy source whose share is analysed
    pub metric: SourceID,
    /// The timestep at which the metric is taken (defaults to the final timestep)
    pub metric_timestep: Option<u32>,
    /// Where to write results (overridden by the command line)
    pub output_dir: Option<PathBuf>,
    /// Seed for random number generation
    #[serde(default)]
    pub seed: u64,
    /// Number of bootstrap resamples used for confidence intervals
    #[serde(default = "default_num_resamples")]
    pub num_resamples: usize,
    /// Confidence level for the confidence intervals
    #[serde(default = "default_conf_level")]
    pub conf_level: f64,
    /// The parameters to vary
    pub pars_to_vary: Vec<ParameterRange>,
}

impl SensitivityConfig {
    /// Read and check a sensitivity configuration file.
    ///
    /// The path to the baseline model is resolved relative to the folder containing the file.
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let mut config: SensitivityConfig = read_toml(file_path)?;
        config.check()?;

        if let Some(dir) = file_path.parent() {
            config.baseline_model_config = dir.join(&config.baseline_model_config);
        }

        Ok(config)
    }

    /// Check the settings which don't depend on the sampler or baseline model
    fn check(&self) -> Result<()> {
        ensure!(
            self.conf_level > 0.0 && self.conf_level < 1.0,
            "conf_level must be between 0 and 1 (got {})",
            self.conf_level
        );
        ensure!(
            self.num_resamples >= 2,
            "num_resamples must be at least 2 (got {})",
            self.num_resamples
        );

        Ok(())
    }

    /// The names of the varied parameters
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.pars_to_vary.iter().map(|param| param.name.as_str())
    }
}
