//! The share engine, which advances market shares from one timestep to the next.
use super::allocation::Allocation;
use super::{PriceTable, SHARE_SUM_TOLERANCE, SimulationError};
use crate::model::{EnergySource, EnergySourceMap, Model, SourceID};
use crate::units::Year;
use indexmap::IndexMap;
use log::debug;
use std::ops::Index;

/// The market share of every energy source at a single timestep
#[derive(Debug, Clone, PartialEq)]
pub struct ShareState {
    timestep: u32,
    shares: IndexMap<SourceID, f64>,
}

impl ShareState {
    /// The state at timestep 0, taken from the sources' starting shares
    pub fn initial(sources: &EnergySourceMap) -> Self {
        Self {
            timestep: 0,
            shares: sources
                .values()
                .map(|source| (source.id.clone(), source.starting_share))
                .collect(),
        }
    }

    /// The timestep to which these shares refer
    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    /// Get the share for the named source, if it exists
    pub fn get(&self, id: &str) -> Option<f64> {
        self.shares.get(id).copied()
    }

    /// Iterate over the sources and their shares
    pub fn iter(&self) -> indexmap::map::Iter<'_, SourceID, f64> {
        self.shares.iter()
    }

    /// Sum of all shares
    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }
}

impl Index<&SourceID> for ShareState {
    type Output = f64;

    fn index(&self, id: &SourceID) -> &f64 {
        &self.shares[id]
    }
}

/// Intermediate values calculated during one transition, kept for debugging
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The timestep the transition starts from
    pub timestep: u32,
    /// Share retired by each source
    pub retired: IndexMap<SourceID, f64>,
    /// Share remaining for each source after retirement and demand growth
    pub remaining: IndexMap<SourceID, f64>,
    /// The fraction of total share up for reallocation
    pub frac_for_allocation: f64,
    /// How new capacity is split between sources
    pub share_of_new: Allocation,
}

/// The share retired by a source during the transition out of `timestep`.
///
/// Units retire linearly over their lifespan once the retirement clock has started.
pub fn retired_share(
    source: &EnergySource,
    share: f64,
    timestep: u32,
    timestep_length: Year,
) -> f64 {
    if timestep < source.retire_timestep {
        return 0.0;
    }

    (timestep_length / source.lifespan).0 * share
}

/// Check that every share lies in [0, 1] and that shares sum to one
fn check_shares(shares: &IndexMap<SourceID, f64>, timestep: u32) -> Result<(), SimulationError> {
    let total: f64 = shares.values().sum();
    if (total - 1.0).abs() > SHARE_SUM_TOLERANCE || !total.is_finite() {
        return Err(SimulationError::Numeric {
            timestep,
            message: format!("shares sum to {total}"),
        });
    }

    let out_of_range = shares
        .iter()
        .find(|(_, share)| !(-SHARE_SUM_TOLERANCE..=1.0 + SHARE_SUM_TOLERANCE).contains(*share));
    if let Some((id, share)) = out_of_range {
        return Err(SimulationError::Numeric {
            timestep,
            message: format!("share of {id} is {share}, outside [0, 1]"),
        });
    }

    Ok(())
}

/// Steps market shares forward through the model's timesteps.
///
/// Every state produced is kept, so that the complete time series is available once the engine
/// reaches the final timestep.
pub struct ShareEngine<'a> {
    model: &'a Model,
    prices: &'a PriceTable,
    states: Vec<ShareState>,
    transitions: Vec<Transition>,
}

impl<'a> ShareEngine<'a> {
    /// Create a new engine at timestep 0
    pub fn new(model: &'a Model, prices: &'a PriceTable) -> Self {
        Self {
            model,
            prices,
            states: vec![ShareState::initial(&model.sources)],
            transitions: Vec::new(),
        }
    }

    /// The most recently calculated shares
    pub fn current(&self) -> &ShareState {
        self.states
            .last()
            .expect("Engine always holds the initial state")
    }

    /// Whether the engine has reached the final timestep
    pub fn is_finished(&self) -> bool {
        self.current().timestep >= self.model.n_steps
    }

    /// Advance shares by one timestep.
    ///
    /// # Returns
    ///
    /// The new shares, or an error if the final timestep has already been reached or a numerical
    /// problem occurred.
    pub fn step(&mut self) -> Result<&ShareState, SimulationError> {
        if self.is_finished() {
            return Err(SimulationError::EndOfHorizon {
                n_steps: self.model.n_steps,
            });
        }

        let current = self.current();
        let timestep = current.timestep;
        let timestep_length = self.model.timestep_length();
        let growth_factor = 1.0 + self.model.demand_growth_rate;
        if growth_factor == 0.0 {
            return Err(SimulationError::Numeric {
                timestep,
                message: "demand growth rate of -1 leaves no demand".into(),
            });
        }

        let retired: IndexMap<SourceID, f64> = self
            .model
            .sources
            .values()
            .map(|source| {
                let share = current[&source.id];
                let retired = retired_share(source, share, timestep, timestep_length);
                (source.id.clone(), retired)
            })
            .collect();
        let remaining: IndexMap<SourceID, f64> = current
            .iter()
            .map(|(id, share)| (id.clone(), (share - retired[id]) / growth_factor))
            .collect();
        let frac_for_allocation = 1.0 - remaining.values().sum::<f64>();

        let share_of_new = self
            .model
            .share_model
            .share_of_new(current, &self.prices.total_prices(timestep))?;

        let shares: IndexMap<SourceID, f64> = remaining
            .iter()
            .map(|(id, remaining)| {
                (
                    id.clone(),
                    remaining + frac_for_allocation * share_of_new[id],
                )
            })
            .collect();
        check_shares(&shares, timestep + 1)?;
        debug!(
            "Timestep {}: {frac_for_allocation} of total share reallocated",
            timestep + 1
        );

        self.transitions.push(Transition {
            timestep,
            retired,
            remaining,
            frac_for_allocation,
            share_of_new,
        });
        self.states.push(ShareState {
            timestep: timestep + 1,
            shares,
        });

        Ok(self.current())
    }

    /// Consume the engine, returning all states and transitions calculated so far
    pub fn into_parts(self) -> (Vec<ShareState>, Vec<Transition>) {
        (self.states, self.transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{energy_source, model};
    use crate::model::ShareModel;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0.25)]
    #[case(3, 2, 0.25)]
    #[case(1, 2, 0.0)]
    fn test_retired_share(
        mut energy_source: EnergySource,
        #[case] timestep: u32,
        #[case] retire_timestep: u32,
        #[case] expected_fraction: f64,
    ) {
        energy_source.retire_timestep = retire_timestep;
        let retired = retired_share(&energy_source, 0.6, timestep, Year(5.0));
        assert_approx_eq!(f64, retired, 0.6 * expected_fraction);
    }

    #[rstest]
    fn test_no_retirement_before_retire_timestep(mut energy_source: EnergySource) {
        energy_source.retire_timestep = 10;
        assert!((0..10).all(|t| retired_share(&energy_source, 1.0, t, Year(1.0)) == 0.0));
    }

    #[rstest]
    fn test_step(model: Model) {
        let prices = PriceTable::new(&model);
        let mut engine = ShareEngine::new(&model, &prices);
        assert_eq!(engine.current().timestep(), 0);

        // A 0.6 @ 50, B 0.4 @ 100, a quarter retires, exponent -1 gives A 3/4 of new capacity
        let shares = engine.step().unwrap();
        assert_eq!(shares.timestep(), 1);
        assert_approx_eq!(f64, shares.get("A").unwrap(), 0.45 + 0.25 * 0.75);
        assert_approx_eq!(f64, shares.get("B").unwrap(), 0.3 + 0.25 * 0.25);
        assert_approx_eq!(f64, shares.total(), 1.0);
    }

    #[rstest]
    fn test_step_past_end(model: Model) {
        let prices = PriceTable::new(&model);
        let mut engine = ShareEngine::new(&model, &prices);
        engine.step().unwrap();
        engine.step().unwrap();
        assert!(engine.is_finished());
        assert_eq!(
            engine.step().unwrap_err(),
            SimulationError::EndOfHorizon { n_steps: 2 }
        );

        let (states, transitions) = engine.into_parts();
        assert_eq!(states.len(), 3);
        assert_eq!(transitions.len(), 2);
    }

    #[rstest]
    fn test_step_with_demand_growth(mut model: Model) {
        model.demand_growth_rate = 0.25;
        model.share_model = ShareModel::Logit { exponent: -1.0 };
        let prices = PriceTable::new(&model);
        let mut engine = ShareEngine::new(&model, &prices);
        engine.step().unwrap();

        let (_, transitions) = engine.into_parts();
        let transition = &transitions[0];
        assert_approx_eq!(f64, transition.remaining["A"], 0.45 / 1.25);
        assert_approx_eq!(f64, transition.frac_for_allocation, 1.0 - 0.75 / 1.25);
    }

    #[test]
    fn test_check_shares() {
        let shares = |a: f64, b: f64| -> IndexMap<SourceID, f64> {
            [(SourceID::from("A"), a), (SourceID::from("B"), b)].into_iter().collect()
        };
        assert!(check_shares(&shares(0.6, 0.4), 1).is_ok());
        assert!(check_shares(&shares(1.0, 0.0), 1).is_ok());
        assert!(matches!(
            check_shares(&shares(0.6, 0.5), 1),
            Err(SimulationError::Numeric { timestep: 1, .. })
        ));
        assert_eq!(
            check_shares(&shares(1.5, -0.5), 2),
            Err(SimulationError::Numeric {
                timestep: 2,
                message: "share of A is 1.5, outside [0, 1]".into()
            })
        );
    }

    #[rstest]
    fn test_step_shrinking_demand_out_of_range(mut model: Model) {
        // Nothing retires and demand halves, so the share for allocation is negative and the cheap
        // source A gives up more than it holds
        model.demand_growth_rate = -0.5;
        model.share_model = ShareModel::Logit { exponent: -3.0 };
        for (id, share) in [("A", 0.1), ("B", 0.9)] {
            let source = model.sources.get_mut(id).unwrap();
            source.starting_share = share;
            source.retire_timestep = 10;
        }
        let prices = PriceTable::new(&model);
        let mut engine = ShareEngine::new(&model, &prices);
        assert!(matches!(
            engine.step(),
            Err(SimulationError::Numeric { timestep: 1, .. })
        ));
    }

    #[rstest]
    fn test_step_zero_growth_factor(mut model: Model) {
        model.demand_growth_rate = -1.0;
        let prices = PriceTable::new(&model);
        let mut engine = ShareEngine::new(&model, &prices);
        assert!(matches!(
            engine.step(),
            Err(SimulationError::Numeric { timestep: 0, .. })
        ));
    }
}
