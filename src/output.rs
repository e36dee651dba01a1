//! The module responsible for writing output data to disk.
use crate::model::SourceID;
use crate::simulation::{PriceComponent, SimulationResults};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

pub mod metadata;
pub mod sensitivity;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "iamsim_results";

/// The output file name for market shares
const SHARES_FILE_NAME: &str = "shares.csv";

/// The output file name for prices
const PRICES_FILE_NAME: &str = "prices.csv";

/// The output file name for per-source carbon flows
const CARBON_FILE_NAME: &str = "carbon.csv";

/// The output file name for cumulative carbon reservoir balances
const CARBON_RESERVOIRS_FILE_NAME: &str = "carbon_reservoirs.csv";

/// The output file name for details of each share transition
const ALLOCATION_FILE_NAME: &str = "debug_allocation.csv";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Get the default output directory for a sensitivity analysis.
///
/// This is named after the folder containing the sensitivity configuration file.
pub fn get_sensitivity_output_dir(config_path: &Path) -> Result<PathBuf> {
    let config_path = config_path
        .canonicalize()
        .context("Could not resolve path to sensitivity configuration")?;
    let config_dir = config_path
        .parent()
        .context("Invalid path to sensitivity configuration")?;

    let mut output_dir = get_output_dir(config_dir)?;
    output_dir.as_mut_os_string().push("_sensitivity");

    Ok(output_dir)
}

/// Create a new output directory, deleting the old one if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing, non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the shares CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ShareRow {
    energy_source: SourceID,
    timestep: u32,
    year: u32,
    share: f64,
}

/// Represents a row in the prices CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PriceRow {
    energy_source: SourceID,
    timestep: u32,
    year: u32,
    component: PriceComponent,
    usd_per_mwh: f64,
}

/// Represents a row in the carbon flows CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CarbonRow {
    energy_source: SourceID,
    timestep: u32,
    year: u32,
    emitted_tco2_per_mwh: f64,
    captured_tco2_per_mwh: f64,
}

/// Represents a row in the carbon reservoirs CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CarbonReservoirRow {
    timestep: u32,
    year: u32,
    atmosphere_tco2_per_mwh: f64,
    storage_tco2_per_mwh: f64,
}

/// Represents a row in the allocation debug CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AllocationRow {
    timestep: u32,
    energy_source: SourceID,
    retired: f64,
    remaining: f64,
    frac_for_allocation: f64,
    share_of_new: f64,
}

/// An object for writing simulation results to file
pub struct DataWriter {
    shares_writer: csv::Writer<File>,
    prices_writer: csv::Writer<File>,
    carbon_writer: csv::Writer<File>,
    reservoirs_writer: csv::Writer<File>,
    debug_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            Some(new_writer(ALLOCATION_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            shares_writer: new_writer(SHARES_FILE_NAME)?,
            prices_writer: new_writer(PRICES_FILE_NAME)?,
            carbon_writer: new_writer(CARBON_FILE_NAME)?,
            reservoirs_writer: new_writer(CARBON_RESERVOIRS_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write market shares to a CSV file
    pub fn write_shares(&mut self, results: &SimulationResults) -> Result<()> {
        for (energy_source, timestep, year, share) in results.iter_shares() {
            let row = ShareRow {
                energy_source: energy_source.clone(),
                timestep,
                year,
                share,
            };
            self.shares_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write every price component to a CSV file
    pub fn write_prices(&mut self, results: &SimulationResults) -> Result<()> {
        for (timestep, energy_source, prices) in results.prices.iter() {
            for component in PriceComponent::iter() {
                let row = PriceRow {
                    energy_source: energy_source.clone(),
                    timestep,
                    year: results.years[timestep as usize],
                    component,
                    usd_per_mwh: prices.get(component).value(),
                };
                self.prices_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write carbon flows and reservoir balances to CSV files
    pub fn write_carbon(&mut self, results: &SimulationResults) -> Result<()> {
        let carbon = &results.carbon;
        for (timestep, energy_source, flows) in carbon.iter_flows() {
            let row = CarbonRow {
                energy_source: energy_source.clone(),
                timestep,
                year: results.years[timestep as usize],
                emitted_tco2_per_mwh: flows.emitted,
                captured_tco2_per_mwh: flows.captured,
            };
            self.carbon_writer.serialize(row)?;
        }

        for (timestep, (atmosphere, storage)) in
            carbon.atmosphere.iter().zip(&carbon.storage).enumerate()
        {
            let row = CarbonReservoirRow {
                timestep: timestep as u32,
                year: results.years[timestep],
                atmosphere_tco2_per_mwh: *atmosphere,
                storage_tco2_per_mwh: *storage,
            };
            self.reservoirs_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write details of each share transition, if debug output is enabled
    pub fn write_debug_info(&mut self, results: &SimulationResults) -> Result<()> {
        let Some(ref mut writer) = self.debug_writer else {
            return Ok(());
        };

        for transition in &results.transitions {
            for (energy_source, retired) in &transition.retired {
                let row = AllocationRow {
                    timestep: transition.timestep,
                    energy_source: energy_source.clone(),
                    retired: *retired,
                    remaining: transition.remaining[energy_source],
                    frac_for_allocation: transition.frac_for_allocation,
                    share_of_new: transition.share_of_new[energy_source],
                };
                writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.shares_writer.flush()?;
        self.prices_writer.flush()?;
        self.carbon_writer.flush()?;
        self.reservoirs_writer.flush()?;
        if let Some(ref mut writer) = self.debug_writer {
            writer.flush()?;
        }

        Ok(())
    }
}
