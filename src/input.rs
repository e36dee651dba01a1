//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read the raw contents of a TOML file as a generic [`toml::Table`].
///
/// This is used where values need to be modified before the document is converted into a strongly
/// typed struct (e.g. when injecting sampled parameters).
pub fn read_toml_table(file_path: &Path) -> Result<toml::Table> {
    read_toml(file_path)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Check that a value is finite and lies within `[0, 1]`
pub fn check_proportion(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..=1.0).contains(&value),
        "{name} must be between 0 and 1 (got {value})"
    );

    Ok(())
}

/// Check that a value is finite and lies within `[0, 1)`.
///
/// Used for per-timestep decay fractions, for which a value of 1 would zero out a price.
pub fn check_decay_fraction(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..1.0).contains(&value),
        "{name} must be at least 0 and less than 1 (got {value})"
    );

    Ok(())
}

/// Check that a value is finite and not negative
pub fn check_non_negative(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero (got {value})"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        a: u32,
        b: String,
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "a = 1\nb = \"hello\"").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                a: 1,
                b: "hello".to_string()
            }
        );

        // Missing file
        assert!(read_toml::<Record>(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_read_toml_table() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        fs::write(&file_path, "[outer]\ninner = 2.5\n").unwrap();

        let table = read_toml_table(&file_path).unwrap();
        assert_eq!(table["outer"]["inner"].as_float(), Some(2.5));
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.1, false)]
    #[case(f64::NAN, false)]
    fn test_check_proportion(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(check_proportion("x", value).is_ok(), expected_valid);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.99, true)]
    #[case(1.0, false)]
    #[case(-0.01, false)]
    #[case(f64::INFINITY, false)]
    fn test_check_decay_fraction(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(check_decay_fraction("x", value).is_ok(), expected_valid);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(1e9, true)]
    #[case(-1e-10, false)]
    #[case(f64::NAN, false)]
    fn test_check_non_negative(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(check_non_negative("x", value).is_ok(), expected_valid);
    }
}
