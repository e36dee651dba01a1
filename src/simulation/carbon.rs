//! Accounting for carbon emitted to the atmosphere and captured into storage.
use super::shares::ShareState;
use crate::model::{EnergySourceMap, SourceID};
use indexmap::IndexMap;

/// Carbon flows for a single source at a single timestep, in tCO2 per MWh of total energy supplied
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarbonFlows {
    /// Carbon released into the atmosphere
    pub emitted: f64,
    /// Carbon captured and stored
    pub captured: f64,
}

/// Carbon flows and reservoir balances for a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonLedger {
    /// Flows for each source, indexed by timestep
    pub flows: Vec<IndexMap<SourceID, CarbonFlows>>,
    /// Cumulative carbon in the atmosphere at each timestep
    pub atmosphere: Vec<f64>,
    /// Cumulative carbon in storage at each timestep
    pub storage: Vec<f64>,
}

impl CarbonLedger {
    /// Calculate carbon flows from the share time series
    pub fn new(sources: &EnergySourceMap, states: &[ShareState]) -> Self {
        let flows: Vec<IndexMap<_, _>> = states
            .iter()
            .map(|state| {
                state
                    .iter()
                    .map(|(id, share)| {
                        let source = &sources[id];
                        let co2 = share * source.co2_per_mwh.value();
                        let capture = source.capture_fraction.0;
                        let flows = CarbonFlows {
                            emitted: co2 * (1.0 - capture),
                            captured: co2 * capture,
                        };
                        (id.clone(), flows)
                    })
                    .collect()
            })
            .collect();

        let cumulative = |get: fn(&CarbonFlows) -> f64| -> Vec<f64> {
            flows
                .iter()
                .scan(0.0, |total, flows| {
                    *total += flows.values().map(get).sum::<f64>();
                    Some(*total)
                })
                .collect()
        };
        let atmosphere = cumulative(|flows| flows.emitted);
        let storage = cumulative(|flows| flows.captured);

        Self {
            flows,
            atmosphere,
            storage,
        }
    }

    /// Iterate over the flows.
    ///
    /// # Returns
    ///
    /// An iterator of tuples containing timestep, source ID and flows.
    pub fn iter_flows(&self) -> impl Iterator<Item = (u32, &SourceID, &CarbonFlows)> {
        self.flows.iter().enumerate().flat_map(|(timestep, flows)| {
            flows
                .iter()
                .map(move |(id, flows)| (timestep as u32, id, flows))
        })
    }
}
