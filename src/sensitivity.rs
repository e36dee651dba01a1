//! Sensitivity analysis over many independent runs of a baseline model.
//!
//! Parameter values are sampled within user-given bounds, written into copies of the baseline model
//! file and each resulting model is simulated. For Saltelli samples, the share of one energy source
//! at one timestep is then decomposed into Sobol' indices.
use crate::input::{input_err_msg, read_toml_table};
use crate::model::Model;
use crate::output::sensitivity::{write_indices, write_outputs, write_parameters};
use crate::simulation::{SimulationResults, simulate};
use anyhow::{Context, Result, ensure};
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub mod analysis;
use analysis::{AnalysisOptions, SobolIndices, analyse};
pub mod config;
pub use config::{ParameterRange, SENSITIVITY_FILE_NAME, Sampler, SensitivityConfig};
pub mod inject;
use inject::apply_sample;
pub mod sample;
use sample::generate_samples;
pub mod sobol_sequence;

/// How many completed model runs between progress messages
const PROGRESS_INTERVAL: usize = 1000;

/// A sensitivity analysis whose configuration and baseline model have been validated
#[derive(Debug, Clone)]
pub struct SensitivityAnalysis {
    config: SensitivityConfig,
    baseline: toml::Table,
    metric_timestep: u32,
}

impl SensitivityAnalysis {
    /// Read the configuration file and the baseline model it refers to.
    ///
    /// The baseline is validated before any samples are drawn.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = SensitivityConfig::from_path(config_path)?;

        let baseline_path = &config.baseline_model_config;
        let baseline = read_toml_table(baseline_path)?;
        let model =
            Model::from_table(baseline.clone()).with_context(|| input_err_msg(baseline_path))?;

        ensure!(
            model.sources.contains_key(&config.metric),
            "Metric {} is not one of the baseline model's energy sources",
            config.metric
        );
        let metric_timestep = config.metric_timestep.unwrap_or(model.n_steps);
        ensure!(
            metric_timestep <= model.n_steps,
            "metric_timestep ({metric_timestep}) is beyond the final timestep ({})",
            model.n_steps
        );

        Ok(Self {
            config,
            baseline,
            metric_timestep,
        })
    }

    /// The analysis configuration
    pub fn config(&self) -> &SensitivityConfig {
        &self.config
    }

    /// Sample the parameters, run every model instance and write the results.
    ///
    /// # Arguments
    ///
    /// * `output_path` - The folder to which output files will be written
    ///
    /// # Returns
    ///
    /// Sobol' indices if the Saltelli sampler was used, otherwise `None`.
    pub fn run(&self, output_path: &Path) -> Result<Option<SobolIndices>> {
        let samples =
            generate_samples(&self.config).context("Failed to generate parameter samples")?;
        let names: Vec<&str> = self.config.parameter_names().collect();
        info!(
            "Running {} model instances varying {} parameters",
            samples.len(),
            names.len()
        );
        write_parameters(output_path, &names, &samples)?;

        let results = self.run_samples(&samples)?;
        write_outputs(output_path, &results)?;

        if self.config.sampler != Sampler::Saltelli {
            info!("Sobol' indices are only calculated for the Saltelli sampler");
            return Ok(None);
        }

        let y = self.metric_values(&results)?;
        let options = AnalysisOptions {
            calc_second_order: self.config.calc_second_order,
            num_resamples: self.config.num_resamples,
            conf_level: self.config.conf_level,
            seed: self.config.seed,
        };
        let indices = analyse(&y, names.len(), &options).context("Sobol analysis failed")?;
        write_indices(output_path, &names, &indices)?;

        for ((name, s1), st) in names
            .iter()
            .zip(&indices.first_order)
            .zip(&indices.total_order)
        {
            info!("{name}: S1 = {:.3}, ST = {:.3}", s1.value, st.value);
        }

        Ok(Some(indices))
    }

    /// Simulate the model for each sample row, keeping results in sample order
    fn run_samples(&self, samples: &[Vec<f64>]) -> Result<Vec<SimulationResults>> {
        let total = samples.len();
        let completed = AtomicUsize::new(0);
        let run_one = |values: &Vec<f64>| -> Result<SimulationResults> {
            let table = apply_sample(&self.baseline, &self.config.pars_to_vary, values)?;
            let model = Model::from_table(table)?;
            let results = simulate(&model)?;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_INTERVAL == 0 {
                info!("Completed {done} of {total} model runs");
            }

            Ok(results)
        };

        #[cfg(feature = "parallel")]
        let results: Vec<_> = samples.par_iter().map(run_one).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = samples.iter().map(run_one).collect();

        // The first error in sample order is the one reported
        results
            .into_iter()
            .enumerate()
            .map(|(i, result)| result.with_context(|| format!("Simulation failed for sample {i}")))
            .collect()
    }

    /// The share of the metric source at the metric timestep, for each run
    fn metric_values(&self, results: &[SimulationResults]) -> Result<Vec<f64>> {
        results
            .iter()
            .map(|results| {
                results
                    .share_at(&self.config.metric.0, self.metric_timestep)
                    .with_context(|| {
                        format!(
                            "No share for {} at timestep {}",
                            self.config.metric, self.metric_timestep
                        )
                    })
            })
            .collect()
    }
}
