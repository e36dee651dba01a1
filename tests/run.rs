//! Integration tests for the `run` command.
use float_cmp::approx_eq;
use iamsim::cli::{RunOpts, handle_run_command};
use iamsim::settings::Settings;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Sum the shares in `shares.csv` for each timestep
fn total_share_by_timestep(output_dir: &Path) -> BTreeMap<u32, f64> {
    let mut reader = csv::Reader::from_path(output_dir.join("shares.csv")).unwrap();
    let mut totals = BTreeMap::new();
    for record in reader.records() {
        let record = record.unwrap();
        let timestep: u32 = record[1].parse().unwrap();
        let share: f64 = record[3].parse().unwrap();
        *totals.entry(timestep).or_default() += share;
    }

    totals
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("IAMSIM_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    let file_names: Vec<_> = fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .sorted()
        .collect();
    assert_eq!(
        file_names,
        [
            "carbon.csv",
            "carbon_reservoirs.csv",
            "debug_allocation.csv",
            "iamsim_error.log",
            "iamsim_info.log",
            "metadata.toml",
            "prices.csv",
            "shares.csv",
        ]
    );

    // Shares are conserved at every timestep
    let totals = total_share_by_timestep(&output_dir);
    assert_eq!(totals.len(), 7);
    for total in totals.values() {
        assert!(approx_eq!(f64, *total, 1.0, epsilon = 1e-9));
    }

    // Running again into the same folder needs permission to overwrite
    let err = handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap_err();
    assert!(err.to_string().starts_with("Failed to create output directory"));

    let opts = RunOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
}
