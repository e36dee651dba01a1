//! Energy sources and their (non-time-varying) parameters.
use crate::id::{IDCollection, define_id_type};
use crate::input::{check_decay_fraction, check_non_negative, check_proportion};
use crate::units::{CO2PerEnergy, Dimensionless, MoneyPerEnergy, Year};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Deserialize;

define_id_type! {SourceID}
define_id_type! {SubsectorID}
define_id_type! {SectorID}

/// A map of [`EnergySource`]s, keyed by source ID, in the order given in the model file
pub type EnergySourceMap = IndexMap<SourceID, EnergySource>;

/// A category of primary energy (e.g. oil, natural gas, renewables)
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySource {
    /// Unique identifier for the source
    pub id: SourceID,
    /// Market share at the first timestep
    pub starting_share: f64,
    /// Price of generating energy at the first timestep
    pub starting_price: MoneyPerEnergy,
    /// Fractional decrease in generation cost per timestep (learning rate)
    pub generation_decay: Dimensionless,
    /// Price of carbon removal at the first timestep, as a fraction of `starting_price`
    pub starting_cdr_price_fraction: Dimensionless,
    /// Fractional decrease in carbon removal cost per timestep
    pub cdr_decay: Dimensionless,
    /// Carbon intensity of the source
    pub co2_per_mwh: CO2PerEnergy,
    /// Fraction of emitted CO2 which is captured and stored
    pub capture_fraction: Dimensionless,
    /// Nameplate lifespan of generating units
    pub lifespan: Year,
    /// Timestep from which units start to retire
    pub retire_timestep: u32,
    /// The subsector to which this source belongs (for the nested logit)
    pub subsector: SubsectorID,
    /// The sector to which this source's subsector belongs, if given explicitly
    pub sector: Option<SectorID>,
}

/// Per-source parameters as they appear in the model file.
///
/// Each field maps a source ID to the value of that parameter for the source.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceParameters {
    pub(crate) starting_share: IndexMap<SourceID, f64>,
    pub(crate) starting_energy_generation_price_usd_per_mwh: IndexMap<SourceID, f64>,
    pub(crate) frac_energy_generation_cost_decrease_per_timestep: IndexMap<SourceID, f64>,
    pub(crate) starting_carbon_removal_price_fraction: IndexMap<SourceID, f64>,
    pub(crate) frac_cdr_cost_decrease_per_timestep: IndexMap<SourceID, f64>,
    pub(crate) co2_per_mwh: IndexMap<SourceID, f64>,
    pub(crate) capture_fraction: IndexMap<SourceID, f64>,
    pub(crate) lifespan_yr: IndexMap<SourceID, f64>,
    pub(crate) retire_timestep: IndexMap<SourceID, u32>,
    pub(crate) subsector: IndexMap<SourceID, SubsectorID>,
    #[serde(default)]
    pub(crate) sector: IndexMap<SourceID, SectorID>,
}

/// Check that a parameter table has an entry for every source and no entries for unknown sources
fn check_parameter_sources<T>(
    name: &str,
    values: &IndexMap<SourceID, T>,
    source_ids: &IndexSet<SourceID>,
    required: bool,
) -> Result<()> {
    for id in values.keys() {
        source_ids
            .get_id(id)
            .with_context(|| format!("Parameter {name} given for unknown energy source"))?;
    }

    if required {
        let missing = source_ids
            .iter()
            .filter(|id| !values.contains_key(*id))
            .join(", ");
        ensure!(
            missing.is_empty(),
            "Parameter {name} missing for energy source(s): {missing}"
        );
    }

    Ok(())
}

/// Check that the values for an individual source are valid
fn check_source(source: &EnergySource, timestep_yr: u32) -> Result<()> {
    check_proportion("starting_share", source.starting_share)?;
    check_non_negative(
        "starting_energy_generation_price_usd_per_mwh",
        source.starting_price.value(),
    )?;
    check_decay_fraction(
        "frac_energy_generation_cost_decrease_per_timestep",
        source.generation_decay.0,
    )?;
    check_non_negative(
        "starting_carbon_removal_price_fraction",
        source.starting_cdr_price_fraction.0,
    )?;
    check_decay_fraction("frac_cdr_cost_decrease_per_timestep", source.cdr_decay.0)?;
    check_non_negative("co2_per_mwh", source.co2_per_mwh.value())?;
    check_proportion("capture_fraction", source.capture_fraction.0)?;

    let lifespan = source.lifespan.value();
    ensure!(
        lifespan.is_finite() && lifespan > 0.0,
        "lifespan_yr must be a finite number greater than zero (got {lifespan})"
    );
    ensure!(
        lifespan >= timestep_yr as f64,
        "lifespan_yr ({lifespan}) must be at least as long as timestep_yr ({timestep_yr})"
    );

    Ok(())
}

impl SourceParameters {
    /// Convert the per-parameter tables into validated [`EnergySource`]s.
    ///
    /// # Arguments
    ///
    /// * `source_ids` - The energy sources listed in the model file, in order
    /// * `timestep_yr` - The length of a timestep in years
    pub fn into_sources(
        mut self,
        source_ids: &IndexSet<SourceID>,
        timestep_yr: u32,
    ) -> Result<EnergySourceMap> {
        check_parameter_sources("starting_share", &self.starting_share, source_ids, true)?;
        check_parameter_sources(
            "starting_energy_generation_price_usd_per_mwh",
            &self.starting_energy_generation_price_usd_per_mwh,
            source_ids,
            true,
        )?;
        check_parameter_sources(
            "frac_energy_generation_cost_decrease_per_timestep",
            &self.frac_energy_generation_cost_decrease_per_timestep,
            source_ids,
            true,
        )?;
        check_parameter_sources(
            "starting_carbon_removal_price_fraction",
            &self.starting_carbon_removal_price_fraction,
            source_ids,
            true,
        )?;
        check_parameter_sources(
            "frac_cdr_cost_decrease_per_timestep",
            &self.frac_cdr_cost_decrease_per_timestep,
            source_ids,
            true,
        )?;
        check_parameter_sources("co2_per_mwh", &self.co2_per_mwh, source_ids, true)?;
        check_parameter_sources("capture_fraction", &self.capture_fraction, source_ids, true)?;
        check_parameter_sources("lifespan_yr", &self.lifespan_yr, source_ids, true)?;
        check_parameter_sources("retire_timestep", &self.retire_timestep, source_ids, true)?;
        check_parameter_sources("subsector", &self.subsector, source_ids, true)?;
        check_parameter_sources("sector", &self.sector, source_ids, false)?;

        // We've checked above that every source is present in the required tables
        source_ids
            .iter()
            .map(|id| {
                let source = EnergySource {
                    id: id.clone(),
                    starting_share: self.starting_share[id],
                    starting_price: MoneyPerEnergy(
                        self.starting_energy_generation_price_usd_per_mwh[id],
                    ),
                    generation_decay: Dimensionless(
                        self.frac_energy_generation_cost_decrease_per_timestep[id],
                    ),
                    starting_cdr_price_fraction: Dimensionless(
                        self.starting_carbon_removal_price_fraction[id],
                    ),
                    cdr_decay: Dimensionless(self.frac_cdr_cost_decrease_per_timestep[id]),
                    co2_per_mwh: CO2PerEnergy(self.co2_per_mwh[id]),
                    capture_fraction: Dimensionless(self.capture_fraction[id]),
                    lifespan: Year(self.lifespan_yr[id]),
                    retire_timestep: self.retire_timestep[id],
                    subsector: self.subsector[id].clone(),
                    sector: self.sector.swap_remove(id),
                };
                check_source(&source, timestep_yr)
                    .with_context(|| format!("Invalid parameters for energy source {id}"))?;

                Ok((id.clone(), source))
            })
            .try_collect()
    }
}
