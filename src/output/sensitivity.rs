//! Writing the results of a sensitivity analysis to CSV files.
use crate::model::SourceID;
use crate::sensitivity::analysis::{IndexEstimate, SecondOrderIndices, SobolIndices};
use crate::simulation::SimulationResults;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The output file name for the sampled parameter values
pub const PARAMETERS_FILE_NAME: &str = "simulation_parameters.csv";

/// The output file name for the shares from every run
pub const OUTPUTS_FILE_NAME: &str = "simulation_outputs.csv";

/// The output file name for first-order indices
pub const FIRST_ORDER_FILE_NAME: &str = "s1_results.csv";

/// The output file name for total-order indices
pub const TOTAL_ORDER_FILE_NAME: &str = "s_total_results.csv";

/// The output file name for second-order indices
pub const SECOND_ORDER_FILE_NAME: &str = "s2_results.csv";

/// The output file name for confidence intervals of second-order indices
pub const SECOND_ORDER_CONF_FILE_NAME: &str = "s2_conf_results.csv";

/// Represents a row in the simulation outputs CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct OutputRow {
    /// The energy source
    pub energy_source: SourceID,
    /// The timestep
    pub timestep: u32,
    /// The calendar year
    pub year: u32,
    /// Share of the energy source
    pub share: f64,
    /// Index of the sample row
    pub iteration: usize,
}

#[derive(Serialize, Debug, PartialEq)]
struct FirstOrderRow<'a> {
    parameter: &'a str,
    #[serde(rename = "S1")]
    s1: f64,
    #[serde(rename = "S1_conf")]
    s1_conf: f64,
}

#[derive(Serialize, Debug, PartialEq)]
struct TotalOrderRow<'a> {
    parameter: &'a str,
    #[serde(rename = "ST")]
    st: f64,
    #[serde(rename = "ST_conf")]
    st_conf: f64,
}

/// Write the sampled parameter values, one row per model run and one column per parameter.
///
/// Rows are in sample order, so the row number matches `iteration` in the outputs file.
pub fn write_parameters(output_path: &Path, names: &[&str], samples: &[Vec<f64>]) -> Result<()> {
    let file_path = output_path.join(PARAMETERS_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;

    writer.write_record(names)?;
    for row in samples {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the shares of every energy source for every model run
pub fn write_outputs(output_path: &Path, results: &[SimulationResults]) -> Result<()> {
    let file_path = output_path.join(OUTPUTS_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;

    for (iteration, results) in results.iter().enumerate() {
        for (energy_source, timestep, year, share) in results.iter_shares() {
            let row = OutputRow {
                energy_source: energy_source.clone(),
                timestep,
                year,
                share,
                iteration,
            };
            writer.serialize(row)?;
        }
    }
    writer.flush()?;

    Ok(())
}

/// Write a square matrix of second-order values, with undefined cells written as zero
fn write_matrix<F>(file_path: &Path, names: &[&str], s2: &SecondOrderIndices, get: F) -> Result<()>
where
    F: Fn(IndexEstimate) -> f64,
{
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;

    writer.write_record(std::iter::once("parameter").chain(names.iter().copied()))?;
    for (j, &name) in names.iter().enumerate() {
        let values = (0..names.len()).map(|k| s2.get(j, k).map_or(0.0, &get).to_string());
        writer.write_record(std::iter::once(name.to_string()).chain(values))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write Sobol' indices to CSV files
pub fn write_indices(output_path: &Path, names: &[&str], indices: &SobolIndices) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path.join(FIRST_ORDER_FILE_NAME))?;
    for (&parameter, s1) in names.iter().zip(&indices.first_order) {
        writer.serialize(FirstOrderRow {
            parameter,
            s1: s1.value,
            s1_conf: s1.conf,
        })?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(output_path.join(TOTAL_ORDER_FILE_NAME))?;
    for (&parameter, st) in names.iter().zip(&indices.total_order) {
        writer.serialize(TotalOrderRow {
            parameter,
            st: st.value,
            st_conf: st.conf,
        })?;
    }
    writer.flush()?;

    if let Some(s2) = &indices.second_order {
        write_matrix(
            &output_path.join(SECOND_ORDER_FILE_NAME),
            names,
            s2,
            |s| s.value,
        )?;
        write_matrix(
            &output_path.join(SECOND_ORDER_CONF_FILE_NAME),
            names,
            s2,
            |s| s.conf,
        )?;
    }

    Ok(())
}
