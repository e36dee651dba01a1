//! Common functionality for iamsim, a miniature integrated assessment model.
//!
//! The model simulates how market shares of primary energy sources evolve over time as existing
//! capacity retires and new capacity is allocated by a (nested) modified-logit competition on
//! price. A sensitivity driver wraps many independent runs to estimate Sobol' indices.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod sensitivity;
pub mod settings;
pub mod simulation;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder in which program-wide configuration (e.g. settings) is stored
pub fn get_iamsim_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir could be determined for this platform, so use the working directory
        return PathBuf::from(".");
    };
    config_dir.push("iamsim");

    config_dir
}
