//! The sector → subsector → source grouping used by the nested logit.
use super::source::{EnergySourceMap, SectorID, SourceID, SubsectorID};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::warn;
use serde::Deserialize;

/// Logit exponents for each nesting level, as they appear in the model file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogitExponents {
    /// Exponents governing competition between subsectors within a sector
    pub sector: IndexMap<SectorID, f64>,
    /// Exponents governing competition between sources within a subsector
    pub subsector: IndexMap<SubsectorID, f64>,
}

/// A group of subsectors competing under a single logit exponent
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    /// Logit exponent for choosing between this sector's subsectors
    pub exponent: f64,
    /// The subsectors in this sector
    pub subsectors: IndexMap<SubsectorID, Subsector>,
}

/// A group of energy sources competing under a single logit exponent
#[derive(Debug, Clone, PartialEq)]
pub struct Subsector {
    /// Logit exponent for choosing between this subsector's sources
    pub exponent: f64,
    /// The energy sources in this subsector
    pub sources: Vec<SourceID>,
}

/// The nesting structure for the nested logit share allocation
#[derive(Debug, Clone, PartialEq)]
pub struct NestedLogitTree {
    /// Sectors, in the order in which they were defined
    pub sectors: IndexMap<SectorID, Sector>,
}

/// Check that a logit exponent is usable.
///
/// Exponents are normally negative, so that cheaper sources gain share.
pub fn check_logit_exponent(name: &str, exponent: f64) -> Result<()> {
    ensure!(
        exponent.is_finite() && exponent != 0.0,
        "Logit exponent for {name} must be a finite, non-zero number (got {exponent})"
    );

    if exponent > 0.0 {
        warn!(
            "Logit exponent for {name} is positive ({exponent}): more expensive sources will gain \
            share"
        );
    }

    Ok(())
}

/// Work out which sector a source belongs to
fn sector_for_source(
    explicit: Option<&SectorID>,
    exponents: &IndexMap<SectorID, f64>,
    source_id: &SourceID,
) -> Result<SectorID> {
    if let Some(sector_id) = explicit {
        ensure!(
            exponents.contains_key(sector_id),
            "No sector logit exponent given for sector {sector_id} (energy source {source_id})"
        );
        return Ok(sector_id.clone());
    }

    let mut sector_ids = exponents.keys();
    match (sector_ids.next(), sector_ids.next()) {
        (Some(sector_id), None) => Ok(sector_id.clone()),
        (None, _) => bail!("At least one sector logit exponent must be provided"),
        (Some(_), Some(_)) => bail!(
            "Energy source {source_id} has no sector, but more than one sector is defined in \
            logit_exponents"
        ),
    }
}

impl NestedLogitTree {
    /// Build the nesting tree from the energy sources' subsector and sector memberships.
    ///
    /// # Arguments
    ///
    /// * `sources` - The validated energy sources
    /// * `exponents` - The logit exponents for sectors and subsectors
    pub fn new(sources: &EnergySourceMap, exponents: &LogitExponents) -> Result<Self> {
        for (sector_id, exponent) in &exponents.sector {
            check_logit_exponent(&format!("sector {sector_id}"), *exponent)?;
        }
        for (subsector_id, exponent) in &exponents.subsector {
            check_logit_exponent(&format!("subsector {subsector_id}"), *exponent)?;
        }

        let mut sectors: IndexMap<SectorID, Sector> = IndexMap::new();
        let mut subsector_sectors: IndexMap<SubsectorID, SectorID> = IndexMap::new();
        for source in sources.values() {
            let sector_id =
                sector_for_source(source.sector.as_ref(), &exponents.sector, &source.id)?;
            let subsector_exponent = *exponents
                .subsector
                .get(&source.subsector)
                .with_context(|| {
                    format!(
                        "No subsector logit exponent given for subsector {} (energy source {})",
                        source.subsector, source.id
                    )
                })?;

            // A subsector may only belong to a single sector
            match subsector_sectors.entry(source.subsector.clone()) {
                Entry::Occupied(entry) => ensure!(
                    *entry.get() == sector_id,
                    "Subsector {} is assigned to more than one sector ({} and {})",
                    source.subsector,
                    entry.get(),
                    sector_id
                ),
                Entry::Vacant(entry) => {
                    entry.insert(sector_id.clone());
                }
            }

            sectors
                .entry(sector_id.clone())
                .or_insert_with(|| Sector {
                    exponent: exponents.sector[&sector_id],
                    subsectors: IndexMap::new(),
                })
                .subsectors
                .entry(source.subsector.clone())
                .or_insert_with(|| Subsector {
                    exponent: subsector_exponent,
                    sources: Vec::new(),
                })
                .sources
                .push(source.id.clone());
        }

        for sector_id in exponents.sector.keys() {
            if !sectors.contains_key(sector_id) {
                warn!("Sector {sector_id} has a logit exponent but no energy sources");
            }
        }
        for subsector_id in exponents.subsector.keys() {
            if !subsector_sectors.contains_key(subsector_id) {
                warn!("Subsector {subsector_id} has a logit exponent but no energy sources");
            }
        }

        Ok(Self { sectors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, energy_source, sources};
    use crate::model::source::EnergySource;
    use map_macro::hash_map;
    use rstest::rstest;

    fn exponents(sector: &[(&str, f64)], subsector: &[(&str, f64)]) -> LogitExponents {
        LogitExponents {
            sector: sector.iter().map(|(id, e)| ((*id).into(), *e)).collect(),
            subsector: subsector.iter().map(|(id, e)| ((*id).into(), *e)).collect(),
        }
    }

    #[rstest]
    fn test_new_single_sector(sources: EnergySourceMap) {
        let tree = NestedLogitTree::new(&sources, &exponents(&[("energy", -2.0)], &[("all", -1.0)]))
            .unwrap();
        assert_eq!(tree.sectors.len(), 1);
        let sector = &tree.sectors["energy"];
        assert_eq!(sector.exponent, -2.0);
        assert_eq!(
            sector.subsectors["all"].sources,
            [SourceID::from("A"), SourceID::from("B")]
        );
    }

    #[rstest]
    fn test_new_multiple_sectors(energy_source: EnergySource) {
        let memberships = hash_map! {
            "oil" => ("fossil", "primary"),
            "coal" => ("fossil", "primary"),
            "solar" => ("clean", "primary"),
            "h2" => ("fuel", "secondary"),
        };
        let sources: EnergySourceMap = ["oil", "coal", "solar", "h2"]
            .into_iter()
            .map(|id| {
                let (subsector, sector) = memberships[id];
                let source = EnergySource {
                    id: id.into(),
                    subsector: subsector.into(),
                    sector: Some(sector.into()),
                    ..energy_source.clone()
                };
                (source.id.clone(), source)
            })
            .collect();
        let tree = NestedLogitTree::new(
            &sources,
            &exponents(
                &[("primary", -2.0), ("secondary", -1.0)],
                &[("fossil", -3.0), ("clean", -3.0), ("fuel", -1.0)],
            ),
        )
        .unwrap();

        assert_eq!(tree.sectors["primary"].subsectors.len(), 2);
        assert_eq!(
            tree.sectors["secondary"].subsectors["fuel"].sources,
            [SourceID::from("h2")]
        );
    }

    #[rstest]
    fn test_new_missing_subsector_exponent(sources: EnergySourceMap) {
        assert_error!(
            NestedLogitTree::new(&sources, &exponents(&[("energy", -2.0)], &[("other", -1.0)])),
            "No subsector logit exponent given for subsector all (energy source A)"
        );
    }

    #[rstest]
    fn test_new_ambiguous_sector(sources: EnergySourceMap) {
        assert_error!(
            NestedLogitTree::new(
                &sources,
                &exponents(&[("a", -2.0), ("b", -2.0)], &[("all", -1.0)])
            ),
            "Energy source A has no sector, but more than one sector is defined in logit_exponents"
        );
    }

    #[rstest]
    fn test_new_subsector_in_two_sectors(mut sources: EnergySourceMap) {
        sources["A"].sector = Some("a".into());
        sources["B"].sector = Some("b".into());
        assert_error!(
            NestedLogitTree::new(
                &sources,
                &exponents(&[("a", -2.0), ("b", -2.0)], &[("all", -1.0)])
            ),
            "Subsector all is assigned to more than one sector (a and b)"
        );
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(f64::NAN, false)]
    #[case(f64::NEG_INFINITY, false)]
    #[case(-1.0, true)]
    #[case(1.0, true)] // allowed, but a warning is emitted
    fn test_check_logit_exponent(#[case] exponent: f64, #[case] expected_valid: bool) {
        assert_eq!(check_logit_exponent("x", exponent).is_ok(), expected_valid);
    }
}
