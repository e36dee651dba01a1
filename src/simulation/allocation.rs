//! Allocation of the freed-up share between energy sources by modified logit competition.
use super::SimulationError;
use super::shares::ShareState;
use crate::model::nesting::NestedLogitTree;
use crate::model::{ShareModel, SourceID};
use indexmap::IndexMap;
use itertools::Itertools;

/// The fraction of new capacity assigned to each energy source
pub type Allocation = IndexMap<SourceID, f64>;

/// Calculate `w_i * p_i^e / Σ_j w_j * p_j^e` for every `i`.
///
/// Returns an error message if a price is non-positive, a term is non-finite or the denominator is
/// not a positive finite number.
fn modified_logit(weights: &[f64], prices: &[f64], exponent: f64) -> Result<Vec<f64>, String> {
    let terms: Vec<f64> = weights
        .iter()
        .zip(prices)
        .map(|(&weight, &price)| {
            if !(price.is_finite() && price > 0.0) {
                return Err(format!(
                    "price {price} cannot be raised to logit exponent {exponent}"
                ));
            }

            let term = weight * price.powf(exponent);
            if term.is_finite() {
                Ok(term)
            } else {
                Err(format!(
                    "price {price} raised to logit exponent {exponent} is not finite"
                ))
            }
        })
        .try_collect()?;

    let denominator: f64 = terms.iter().sum();
    if !(denominator.is_finite() && denominator > 0.0) {
        return Err(format!("logit denominator is {denominator}"));
    }

    Ok(terms.into_iter().map(|term| term / denominator).collect())
}

/// Single-level logit across all sources, weighted by current share
fn flat_logit(
    shares: &ShareState,
    prices: &IndexMap<SourceID, f64>,
    exponent: f64,
) -> Result<Allocation, String> {
    let weights = shares.iter().map(|(_, share)| *share).collect_vec();
    let prices = shares.iter().map(|(id, _)| prices[id]).collect_vec();
    let allocation = modified_logit(&weights, &prices, exponent)?;

    Ok(shares.iter().map(|(id, _)| id.clone()).zip(allocation).collect())
}

/// Two-tier logit: sources compete within subsectors, subsectors compete within sectors.
///
/// Sectors receive new capacity in proportion to their current share of the total.
fn nested_logit(
    tree: &NestedLogitTree,
    shares: &ShareState,
    prices: &IndexMap<SourceID, f64>,
) -> Result<Allocation, String> {
    let mut allocation: Allocation = shares.iter().map(|(id, _)| (id.clone(), 0.0)).collect();
    let total = shares.total();

    for (sector_id, sector) in &tree.sectors {
        let mut subsector_weights = Vec::new();
        let mut subsector_prices = Vec::new();
        let mut within_subsector = Vec::new();

        for (subsector_id, subsector) in &sector.subsectors {
            let subsector_shares = subsector.sources.iter().map(|id| shares[id]).collect_vec();
            let subsector_total: f64 = subsector_shares.iter().sum();
            if subsector_total <= 0.0 {
                // Nothing to compete for
                continue;
            }

            let share_of_subsector = subsector_shares
                .iter()
                .map(|share| share / subsector_total)
                .collect_vec();
            let source_prices = subsector.sources.iter().map(|id| prices[id]).collect_vec();
            let alloc = modified_logit(&share_of_subsector, &source_prices, subsector.exponent)
                .map_err(|msg| format!("subsector {subsector_id}: {msg}"))?;
            let average_price = alloc
                .iter()
                .zip(&source_prices)
                .map(|(alloc, price)| alloc * price)
                .sum();

            subsector_weights.push(subsector_total / total);
            subsector_prices.push(average_price);
            within_subsector.push((subsector, alloc));
        }

        if within_subsector.is_empty() {
            continue;
        }

        let sector_weight: f64 = subsector_weights.iter().sum();
        let sector_alloc = modified_logit(&subsector_weights, &subsector_prices, sector.exponent)
            .map_err(|msg| format!("sector {sector_id}: {msg}"))?;
        for ((subsector, alloc), subsector_frac) in within_subsector.into_iter().zip(sector_alloc) {
            for (id, source_frac) in subsector.sources.iter().zip(alloc) {
                allocation[id] = sector_weight * subsector_frac * source_frac;
            }
        }
    }

    Ok(allocation)
}

impl ShareModel {
    /// Work out how new capacity is split between energy sources.
    ///
    /// # Arguments
    ///
    /// * `shares` - Current market shares
    /// * `prices` - Total price of each source at the current timestep
    ///
    /// # Returns
    ///
    /// The fraction of new capacity for each source, summing to one.
    pub fn share_of_new(
        &self,
        shares: &ShareState,
        prices: &IndexMap<SourceID, f64>,
    ) -> Result<Allocation, SimulationError> {
        let allocation = match self {
            Self::Logit { exponent } => flat_logit(shares, prices, *exponent),
            Self::NestedLogit(tree) => nested_logit(tree, shares, prices),
        };

        allocation.map_err(|message| SimulationError::Numeric {
            timestep: shares.timestep(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{energy_source, sources};
    use crate::model::nesting::LogitExponents;
    use crate::model::{EnergySource, EnergySourceMap};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::{fixture, rstest};

    fn prices(values: &[(&str, f64)]) -> IndexMap<SourceID, f64> {
        values.iter().map(|(id, p)| ((*id).into(), *p)).collect()
    }

    fn nested(
        sources: &EnergySourceMap,
        sector: &[(&str, f64)],
        subsector: &[(&str, f64)],
    ) -> ShareModel {
        let exponents = LogitExponents {
            sector: sector.iter().map(|(id, e)| ((*id).into(), *e)).collect(),
            subsector: subsector.iter().map(|(id, e)| ((*id).into(), *e)).collect(),
        };
        ShareModel::NestedLogit(NestedLogitTree::new(sources, &exponents).unwrap())
    }

    /// Three sources: A and B in subsector "fossil", C in subsector "clean"
    #[fixture]
    fn three_sources(energy_source: EnergySource) -> EnergySourceMap {
        [("A", 0.3, "fossil"), ("B", 0.3, "fossil"), ("C", 0.4, "clean")]
            .into_iter()
            .map(|(id, share, subsector)| {
                let source = EnergySource {
                    id: id.into(),
                    starting_share: share,
                    subsector: subsector.into(),
                    ..energy_source.clone()
                };
                (source.id.clone(), source)
            })
            .collect()
    }

    #[test]
    fn test_modified_logit() {
        let alloc = modified_logit(&[0.6, 0.4], &[50.0, 100.0], -1.0).unwrap();
        assert_approx_eq!(f64, alloc[0], 0.75);
        assert_approx_eq!(f64, alloc[1], 0.25);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-10.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_modified_logit_bad_price(#[case] price: f64) {
        assert!(modified_logit(&[0.5, 0.5], &[price, 10.0], -1.0).is_err());
    }

    #[test]
    fn test_modified_logit_zero_weights() {
        assert!(modified_logit(&[0.0, 0.0], &[10.0, 10.0], -1.0).is_err());
    }

    #[rstest]
    fn test_flat_logit_favours_cheaper_source(sources: EnergySourceMap) {
        let model = ShareModel::Logit { exponent: -1.0 };
        let shares = ShareState::initial(&sources);
        let alloc = model
            .share_of_new(&shares, &prices(&[("A", 50.0), ("B", 100.0)]))
            .unwrap();
        assert!(alloc["A"] > alloc["B"]);
        assert_approx_eq!(f64, alloc.values().sum::<f64>(), 1.0);
    }

    #[rstest]
    fn test_nested_logit_single_subsector_matches_flat(sources: EnergySourceMap) {
        let shares = ShareState::initial(&sources);
        let prices = prices(&[("A", 50.0), ("B", 100.0)]);
        let flat = ShareModel::Logit { exponent: -1.0 }
            .share_of_new(&shares, &prices)
            .unwrap();
        let nested = nested(&sources, &[("energy", -2.0)], &[("all", -1.0)])
            .share_of_new(&shares, &prices)
            .unwrap();
        for id in ["A", "B"] {
            assert_approx_eq!(f64, flat[id], nested[id]);
        }
    }

    #[rstest]
    fn test_nested_logit_identical_prices_idempotent(three_sources: EnergySourceMap) {
        // Same price within each subsector, different prices between subsectors
        let model = nested(
            &three_sources,
            &[("energy", -1.0)],
            &[("fossil", -3.0), ("clean", -3.0)],
        );
        let shares = ShareState::initial(&three_sources);
        let alloc = model
            .share_of_new(&shares, &prices(&[("A", 40.0), ("B", 40.0), ("C", 80.0)]))
            .unwrap();

        // Within "fossil", A and B keep their prior share of the subsector (0.5 each)
        assert_approx_eq!(f64, alloc["A"] / (alloc["A"] + alloc["B"]), 0.5);
        assert_approx_eq!(f64, alloc["A"], alloc["B"]);

        // Subsector tier: fossil (weight 0.6, price 40) v clean (weight 0.4, price 80)
        let fossil = 0.6 / 40.0;
        let clean = 0.4 / 80.0;
        assert_approx_eq!(f64, alloc["C"], clean / (fossil + clean));
        assert_approx_eq!(f64, alloc.values().sum::<f64>(), 1.0);
    }

    #[rstest]
    fn test_nested_logit_empty_subsector_gets_nothing(mut three_sources: EnergySourceMap) {
        three_sources["A"].starting_share = 0.6;
        three_sources["C"].starting_share = 0.0;
        let model = nested(
            &three_sources,
            &[("energy", -1.0)],
            &[("fossil", -1.0), ("clean", -1.0)],
        );
        let shares = ShareState::initial(&three_sources);
        let alloc = model
            .share_of_new(&shares, &prices(&[("A", 40.0), ("B", 40.0), ("C", 1.0)]))
            .unwrap();
        assert_eq!(alloc["C"], 0.0);
        assert_approx_eq!(f64, alloc["A"] + alloc["B"], 1.0);
    }

    #[rstest]
    fn test_nested_logit_multiple_sectors(energy_source: EnergySource) {
        let sources: EnergySourceMap = [("oil", 0.5, "primary"), ("h2", 0.5, "secondary")]
            .into_iter()
            .map(|(id, share, sector)| {
                let source = EnergySource {
                    id: id.into(),
                    starting_share: share,
                    subsector: id.into(),
                    sector: Some(sector.into()),
                    ..energy_source.clone()
                };
                (source.id.clone(), source)
            })
            .collect();
        let model = nested(
            &sources,
            &[("primary", -1.0), ("secondary", -1.0)],
            &[("oil", -1.0), ("h2", -1.0)],
        );
        let shares = ShareState::initial(&sources);

        // Sectors keep their share of new capacity whatever the price difference
        let alloc = model
            .share_of_new(&shares, &prices(&[("oil", 10.0), ("h2", 1000.0)]))
            .unwrap();
        assert_eq!(alloc, indexmap! { "oil".into() => 0.5, "h2".into() => 0.5 });
    }

    #[rstest]
    fn test_share_of_new_reports_timestep(sources: EnergySourceMap) {
        let model = ShareModel::Logit { exponent: -1.0 };
        let shares = ShareState::initial(&sources);
        let err = model
            .share_of_new(&shares, &prices(&[("A", 0.0), ("B", 100.0)]))
            .unwrap_err();
        assert!(matches!(err, SimulationError::Numeric { timestep: 0, .. }));
    }
}
