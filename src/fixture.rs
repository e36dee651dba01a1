//! Fixtures for tests

use crate::model::{EnergySource, EnergySourceMap, Model, SourceID, SourceParameters};
use crate::units::{CO2PerEnergy, Dimensionless, MoneyPerEnergy, Year};
use indexmap::{IndexMap, indexmap};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Create a per-source parameter table with values for sources A and B
fn for_sources<T>(a: T, b: T) -> IndexMap<SourceID, T> {
    indexmap! { "A".into() => a, "B".into() => b }
}

#[fixture]
pub fn source_parameters() -> SourceParameters {
    SourceParameters {
        starting_share: for_sources(0.6, 0.4),
        starting_energy_generation_price_usd_per_mwh: for_sources(50.0, 100.0),
        frac_energy_generation_cost_decrease_per_timestep: for_sources(0.0, 0.0),
        starting_carbon_removal_price_fraction: for_sources(0.0, 0.0),
        frac_cdr_cost_decrease_per_timestep: for_sources(0.0, 0.0),
        co2_per_mwh: for_sources(0.5, 0.0),
        capture_fraction: for_sources(0.0, 0.0),
        lifespan_yr: for_sources(20.0, 20.0),
        retire_timestep: for_sources(0, 0),
        subsector: for_sources("all".into(), "all".into()),
        sector: IndexMap::new(),
    }
}

#[fixture]
pub fn energy_source() -> EnergySource {
    EnergySource {
        id: "A".into(),
        starting_share: 0.6,
        starting_price: MoneyPerEnergy(50.0),
        generation_decay: Dimensionless(0.0),
        starting_cdr_price_fraction: Dimensionless(0.0),
        cdr_decay: Dimensionless(0.0),
        co2_per_mwh: CO2PerEnergy(0.5),
        capture_fraction: Dimensionless(0.0),
        lifespan: Year(20.0),
        retire_timestep: 0,
        subsector: "all".into(),
        sector: None,
    }
}

#[fixture]
pub fn sources(energy_source: EnergySource) -> EnergySourceMap {
    let source_b = EnergySource {
        id: "B".into(),
        starting_share: 0.4,
        starting_price: MoneyPerEnergy(100.0),
        co2_per_mwh: CO2PerEnergy(0.0),
        ..energy_source.clone()
    };

    indexmap! {
        energy_source.id.clone() => energy_source,
        source_b.id.clone() => source_b,
    }
}

/// The contents of a valid model file with two sources in a single subsector
#[fixture]
pub fn model_toml() -> String {
    r#"system_type = "nestedlogit"
start_yr = 2020
timestep_yr = 5
n_steps = 2
energy_sources = ["A", "B"]
energy_demand_growth_rate_per_timestep = 0.0
usd_per_tco2 = [0.0, 10.0, 20.0]

[logit_exponents.sector]
energy = -1.0

[logit_exponents.subsector]
all = -1.0

[parameters.starting_share]
A = 0.6
B = 0.4

[parameters.starting_energy_generation_price_usd_per_mwh]
A = 50.0
B = 100.0

[parameters.frac_energy_generation_cost_decrease_per_timestep]
A = 0.0
B = 0.0

[parameters.starting_carbon_removal_price_fraction]
A = 0.0
B = 0.0

[parameters.frac_cdr_cost_decrease_per_timestep]
A = 0.0
B = 0.0

[parameters.co2_per_mwh]
A = 0.5
B = 0.0

[parameters.capture_fraction]
A = 0.0
B = 0.0

[parameters.lifespan_yr]
A = 20.0
B = 20.0

[parameters.retire_timestep]
A = 0
B = 0

[parameters.subsector]
A = "all"
B = "all"
"#
    .to_string()
}

#[fixture]
pub fn model(model_toml: String) -> Model {
    Model::from_table(toml::from_str(&model_toml).unwrap()).unwrap()
}
