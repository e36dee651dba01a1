//! Functionality for running the simulation.
use crate::model::{Model, SourceID};
use crate::output::DataWriter;
use anyhow::Result;
use derive_more::{Display, Error};
use indexmap::IndexMap;
use log::{debug, info};
use std::path::Path;

pub mod allocation;
pub use allocation::Allocation;
pub mod carbon;
pub use carbon::{CarbonFlows, CarbonLedger};
pub mod prices;
pub use prices::{PriceComponent, PriceTable, SourcePrices};
pub mod shares;
pub use shares::{ShareEngine, ShareState, Transition};

/// Maximum allowed deviation of the sum of shares from one
pub const SHARE_SUM_TOLERANCE: f64 = 1e-9;

/// An error which occurs while advancing the simulation
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum SimulationError {
    /// A calculation produced an undefined or inconsistent result
    #[display("Numerical instability at timestep {timestep}: {message}")]
    Numeric {
        /// The timestep at which the problem occurred
        timestep: u32,
        /// Description of the problem
        message: String,
    },
    /// An attempt was made to advance beyond the final timestep
    #[display("Cannot advance beyond the final timestep ({n_steps})")]
    EndOfHorizon {
        /// The number of timesteps in the model
        n_steps: u32,
    },
}

/// The complete output of a single simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResults {
    /// Calendar year for each timestep
    pub years: Vec<u32>,
    /// Prices for every source and timestep
    pub prices: PriceTable,
    /// Market shares for every timestep
    pub shares: Vec<ShareState>,
    /// Intermediate values for every transition
    pub transitions: Vec<Transition>,
    /// Carbon flows and reservoir balances
    pub carbon: CarbonLedger,
}

impl SimulationResults {
    /// Get the shares as a nested map of timestep → source → share
    pub fn share_map(&self) -> IndexMap<u32, IndexMap<SourceID, f64>> {
        self.shares
            .iter()
            .map(|state| {
                let shares = state.iter().map(|(id, share)| (id.clone(), *share)).collect();
                (state.timestep(), shares)
            })
            .collect()
    }

    /// Iterate over the shares in long format.
    ///
    /// # Returns
    ///
    /// An iterator of tuples containing source ID, timestep, year and share.
    pub fn iter_shares(&self) -> impl Iterator<Item = (&SourceID, u32, u32, f64)> {
        self.shares.iter().flat_map(|state| {
            let timestep = state.timestep();
            let year = self.years[timestep as usize];
            state.iter().map(move |(id, share)| (id, timestep, year, *share))
        })
    }

    /// Get the share of a source at the given timestep
    pub fn share_at(&self, source_id: &str, timestep: u32) -> Option<f64> {
        self.shares.get(timestep as usize)?.get(source_id)
    }
}

/// Simulate market shares for every timestep in the model.
///
/// # Arguments
///
/// * `model` - The model to simulate
///
/// # Returns
///
/// The shares, prices and carbon flows, or an error if a numerical problem occurred.
pub fn simulate(model: &Model) -> Result<SimulationResults, SimulationError> {
    let prices = PriceTable::new(model);
    let mut engine = ShareEngine::new(model, &prices);
    while !engine.is_finished() {
        let shares = engine.step()?;
        debug!(
            "Shares for {}: {:?}",
            model.years[shares.timestep() as usize],
            shares
        );
    }

    let (shares, transitions) = engine.into_parts();
    let carbon = CarbonLedger::new(&model.sources, &shares);

    Ok(SimulationResults {
        years: model.years.clone(),
        prices,
        shares,
        transitions,
        carbon,
    })
}

/// Run the simulation and write the results to disk.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. allocation details) to CSV files
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<()> {
    let mut writer = DataWriter::create(output_path, debug_model)?;

    info!(
        "Simulating {} timesteps from {} to {}",
        model.n_steps,
        model.years[0],
        model.years[model.n_steps as usize]
    );
    let results = simulate(model)?;

    writer.write_shares(&results)?;
    writer.write_prices(&results)?;
    writer.write_carbon(&results)?;
    writer.write_debug_info(&results)?;
    writer.flush()?;

    for (id, share) in results.shares[model.n_steps as usize].iter() {
        info!("Final share of {id}: {share:.4}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_simulate(model: Model) {
        let results = simulate(&model).unwrap();
        assert_eq!(results.shares.len(), 3);
        assert_eq!(results.transitions.len(), 2);
        for state in &results.shares {
            assert_approx_eq!(f64, state.total(), 1.0, epsilon = SHARE_SUM_TOLERANCE);
        }

        // A is cheaper, so gains share
        let share_a = results.share_at("A", 2).unwrap();
        assert!(share_a > results.share_at("A", 1).unwrap());
        assert!(results.share_at("A", 1).unwrap() > 0.6);
        assert!(results.share_at("A", 3).is_none());
    }

    #[rstest]
    fn test_share_outputs(model: Model) {
        let results = simulate(&model).unwrap();

        let map = results.share_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&0]["B"], 0.4);

        let rows: Vec<_> = results.iter_shares().collect();
        assert_eq!(rows.len(), 6);
        let (id, timestep, year, share) = rows[5];
        assert_eq!(id, &SourceID::from("B"));
        assert_eq!((timestep, year), (2, 2030));
        assert_eq!(share, map[&2]["B"]);
    }

    #[test]
    fn test_error_display() {
        let err = SimulationError::Numeric {
            timestep: 3,
            message: "shares sum to 1.1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Numerical instability at timestep 3: shares sum to 1.1"
        );
    }
}
