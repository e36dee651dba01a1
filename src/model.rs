//! The model represents the static input data provided by the user.
use crate::input::{input_err_msg, read_toml};
use crate::units::MoneyPerCO2;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use log::info;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

pub mod nesting;
pub use nesting::{LogitExponents, NestedLogitTree};
pub mod price_curve;
pub use price_curve::PriceCurve;
pub mod source;
pub use source::{
    EnergySource, EnergySourceMap, SectorID, SourceID, SourceParameters, SubsectorID,
};

/// The name of the model file inside a model directory
pub const MODEL_FILE_NAME: &str = "model.toml";

/// Which share-allocation rule the model uses
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Default)]
pub enum SystemType {
    /// Two-level (sector/subsector) modified logit
    #[default]
    #[string = "nestedlogit"]
    NestedLogit,
    /// Single-level modified logit with one global exponent
    #[string = "logit"]
    Logit,
}

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    #[serde(default)]
    system_type: SystemType,
    start_yr: u32,
    timestep_yr: u32,
    n_steps: u32,
    energy_sources: Vec<SourceID>,
    energy_demand_growth_rate_per_timestep: f64,
    usd_per_tco2: Option<Vec<f64>>,
    price_curve: Option<PriceCurve>,
    parameters: SourceParameters,
    logit_exponents: Option<LogitExponents>,
    logit_exponent: Option<f64>,
}

/// The rule by which new capacity is allocated between energy sources
#[derive(Debug, Clone, PartialEq)]
pub enum ShareModel {
    /// Flat modified logit with a single exponent
    Logit {
        /// The exponent applied to every source's price
        exponent: f64,
    },
    /// Nested modified logit
    NestedLogit(NestedLogitTree),
}

/// Model definition
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// The calendar year of timestep 0
    pub start_yr: u32,
    /// The length of each timestep in years
    pub timestep_yr: u32,
    /// The number of transitions to simulate
    pub n_steps: u32,
    /// Calendar year for each timestep
    pub years: Vec<u32>,
    /// Growth in total energy demand per timestep
    pub demand_growth_rate: f64,
    /// The energy sources, in the order given in the model file
    pub sources: EnergySourceMap,
    /// Carbon price for each timestep
    pub carbon_price: Vec<MoneyPerCO2>,
    /// How new capacity is allocated
    pub share_model: ShareModel,
}

/// Check that the starting shares sum to one
fn check_starting_shares(sources: &EnergySourceMap) -> Result<()> {
    let total: f64 = sources.values().map(|source| source.starting_share).sum();
    ensure!(
        (total - 1.0).abs() <= crate::simulation::SHARE_SUM_TOLERANCE,
        "Starting shares must sum to one (got {total})"
    );

    Ok(())
}

/// Get the carbon price for each timestep from either an explicit list or a generating curve
fn carbon_price_path(
    usd_per_tco2: Option<Vec<f64>>,
    price_curve: Option<&PriceCurve>,
    n_steps: u32,
) -> Result<Vec<f64>> {
    let prices = match (usd_per_tco2, price_curve) {
        (Some(_), Some(_)) => bail!("Only one of usd_per_tco2 and price_curve may be given"),
        (Some(prices), None) => {
            ensure!(
                prices.len() == n_steps as usize + 1,
                "usd_per_tco2 must have n_steps + 1 ({}) values (got {})",
                n_steps + 1,
                prices.len()
            );
            ensure!(
                prices.iter().all(|p| p.is_finite()),
                "usd_per_tco2 must only contain finite values"
            );
            prices
        }
        (None, Some(curve)) => curve.evaluate(n_steps)?,
        (None, None) => {
            info!("No CO2 price information provided. Assuming price is $0/tCO2");
            vec![0.0; n_steps as usize + 1]
        }
    };

    Ok(prices)
}

impl ModelFile {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelFile> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        read_toml(&file_path)
    }

    /// Convert a generic TOML document (e.g. with sampled parameters injected) into a model file
    pub fn from_table(table: toml::Table) -> Result<ModelFile> {
        toml::Value::Table(table)
            .try_into()
            .context("Could not parse model configuration")
    }

    /// Validate the model file and convert it into a [`Model`]
    pub fn into_model(self) -> Result<Model> {
        ensure!(self.n_steps > 0, "n_steps must be greater than zero");
        ensure!(self.timestep_yr > 0, "timestep_yr must be greater than zero");
        ensure!(
            !self.energy_sources.is_empty(),
            "At least one energy source must be given"
        );
        ensure!(
            self.energy_demand_growth_rate_per_timestep.is_finite()
                && self.energy_demand_growth_rate_per_timestep > -1.0,
            "energy_demand_growth_rate_per_timestep must be finite and greater than -1 (got {})",
            self.energy_demand_growth_rate_per_timestep
        );

        let mut source_ids = IndexSet::new();
        for id in self.energy_sources {
            ensure!(
                !source_ids.contains(&id),
                "Energy source {id} is listed more than once"
            );
            source_ids.insert(id);
        }

        let sources = self
            .parameters
            .into_sources(&source_ids, self.timestep_yr)?;
        check_starting_shares(&sources)?;

        let carbon_price =
            carbon_price_path(self.usd_per_tco2, self.price_curve.as_ref(), self.n_steps)
                .context("Invalid carbon price")?
                .into_iter()
                .map(MoneyPerCO2)
                .collect();

        let share_model = match self.system_type {
            SystemType::Logit => {
                let exponent = self
                    .logit_exponent
                    .context("logit_exponent must be given when system_type is \"logit\"")?;
                nesting::check_logit_exponent("all energy sources", exponent)?;
                ShareModel::Logit { exponent }
            }
            SystemType::NestedLogit => {
                let exponents = self.logit_exponents.as_ref().context(
                    "logit_exponents must be given when system_type is \"nestedlogit\"",
                )?;
                ShareModel::NestedLogit(NestedLogitTree::new(&sources, exponents)?)
            }
        };

        let years = (0..=self.n_steps)
            .map(|step| self.start_yr + step * self.timestep_yr)
            .collect();

        Ok(Model {
            start_yr: self.start_yr,
            timestep_yr: self.timestep_yr,
            n_steps: self.n_steps,
            years,
            demand_growth_rate: self.energy_demand_growth_rate_per_timestep,
            sources,
            carbon_price,
            share_model,
        })
    }
}

impl Model {
    /// Read and validate a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing the model file
    ///
    /// # Returns
    ///
    /// The validated [`Model`] or an error if the file is missing or invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        ModelFile::from_path(model_dir)?
            .into_model()
            .with_context(|| input_err_msg(file_path))
    }

    /// Build a validated model from a generic TOML document
    pub fn from_table(table: toml::Table) -> Result<Model> {
        ModelFile::from_table(table)?
            .into_model()
            .context("Invalid model configuration")
    }

    /// Iterate over the model's timesteps, including the initial one
    pub fn iter_timesteps(&self) -> std::ops::RangeInclusive<u32> {
        0..=self.n_steps
    }

    /// The length of a timestep as a [`crate::units::Year`]
    pub fn timestep_length(&self) -> crate::units::Year {
        crate::units::Year(f64::from(self.timestep_yr))
    }
}
