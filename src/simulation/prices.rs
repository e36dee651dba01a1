//! Code for calculating the price of each energy source at every timestep.
use crate::model::{EnergySource, Model, SourceID};
use crate::units::{Dimensionless, MoneyPerCO2, MoneyPerEnergy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A component of an energy source's price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PriceComponent {
    /// Cost of generating the energy
    Generation,
    /// Cost of removing carbon
    CarbonRemoval,
    /// Carbon removal cost plus the carbon price paid on uncaptured emissions
    NetCarbon,
    /// Generation plus net carbon price
    Total,
}

/// The price components for one energy source at one timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePrices {
    /// Price of generating energy, following the learning curve
    pub generation: MoneyPerEnergy,
    /// Price of carbon dioxide removal
    pub carbon_removal: MoneyPerEnergy,
    /// Net price of carbon emissions
    pub net_carbon: MoneyPerEnergy,
    /// Total price used for share allocation
    pub total: MoneyPerEnergy,
}

impl SourcePrices {
    /// Get a single price component
    pub fn get(&self, component: PriceComponent) -> MoneyPerEnergy {
        match component {
            PriceComponent::Generation => self.generation,
            PriceComponent::CarbonRemoval => self.carbon_removal,
            PriceComponent::NetCarbon => self.net_carbon,
            PriceComponent::Total => self.total,
        }
    }
}

/// Price of generating energy at `timestep`, following an exponential learning curve
pub fn generation_price(source: &EnergySource, timestep: u32) -> MoneyPerEnergy {
    source.starting_price * (Dimensionless(1.0) - source.generation_decay).powi(timestep as i32)
}

/// Price of carbon removal at `timestep`
pub fn cdr_price(source: &EnergySource, timestep: u32) -> MoneyPerEnergy {
    source.starting_cdr_price_fraction
        * source.starting_price
        * (Dimensionless(1.0) - source.cdr_decay).powi(timestep as i32)
}

/// Net price of carbon emissions: carbon removal plus the carbon price on uncaptured emissions
pub fn net_carbon_price(
    source: &EnergySource,
    timestep: u32,
    carbon_price: MoneyPerCO2,
) -> MoneyPerEnergy {
    let uncaptured = Dimensionless(1.0) - source.capture_fraction;
    cdr_price(source, timestep) + carbon_price * source.co2_per_mwh * uncaptured
}

/// Calculate all price components for one source at one timestep
pub fn source_prices(
    source: &EnergySource,
    timestep: u32,
    carbon_price: MoneyPerCO2,
) -> SourcePrices {
    let generation = generation_price(source, timestep);
    let net_carbon = net_carbon_price(source, timestep, carbon_price);
    SourcePrices {
        generation,
        carbon_removal: cdr_price(source, timestep),
        net_carbon,
        total: generation + net_carbon,
    }
}

/// Prices for every energy source at every timestep.
///
/// Every transition of the share engine needs the full cross-section of prices, so these are all
/// calculated up front.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable(Vec<IndexMap<SourceID, SourcePrices>>);

impl PriceTable {
    /// Calculate prices for all energy sources and timesteps in the model
    pub fn new(model: &Model) -> Self {
        let table = model
            .iter_timesteps()
            .map(|timestep| {
                let carbon_price = model.carbon_price[timestep as usize];
                model
                    .sources
                    .values()
                    .map(|source| {
                        (
                            source.id.clone(),
                            source_prices(source, timestep, carbon_price),
                        )
                    })
                    .collect()
            })
            .collect();

        Self(table)
    }

    /// Get the prices for all sources at the given timestep
    pub fn at(&self, timestep: u32) -> &IndexMap<SourceID, SourcePrices> {
        &self.0[timestep as usize]
    }

    /// Get the total price of each source at the given timestep
    pub fn total_prices(&self, timestep: u32) -> IndexMap<SourceID, f64> {
        self.at(timestep)
            .iter()
            .map(|(id, prices)| (id.clone(), prices.total.value()))
            .collect()
    }

    /// Iterate over the table.
    ///
    /// # Returns
    ///
    /// An iterator of tuples containing timestep, source ID and prices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SourceID, &SourcePrices)> {
        self.0.iter().enumerate().flat_map(|(timestep, prices)| {
            prices
                .iter()
                .map(move |(id, prices)| (timestep as u32, id, prices))
        })
    }
}
