//! Writing sampled parameter values into a copy of the baseline model file.
use super::config::ParameterRange;
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use toml::{Table, Value};

/// Set the value at `key_path` in `table`, creating intermediate tables as needed.
///
/// If the existing value is an integer, the value is rounded to the nearest integer.
pub fn set_value(table: &mut Table, key_path: &[String], value: f64) -> Result<()> {
    let (last, parents) = key_path.split_last().context("Key path is empty")?;

    let mut current = table;
    for key in parents {
        current = current
            .entry(key.as_str())
            .or_insert_with(|| Value::Table(Table::new()))
            .as_table_mut()
            .with_context(|| format!("{key} is not a table"))?;
    }

    let value = match current.get(last) {
        Some(Value::Integer(_)) => Value::Integer(value.round() as i64),
        Some(Value::Float(_)) | None => Value::Float(value),
        Some(other) => bail!("{last} is a {}, not a number", other.type_str()),
    };
    current.insert(last.clone(), value);

    Ok(())
}

/// Create a modified copy of the baseline document with one sample's values injected.
///
/// The baseline itself is left untouched.
pub fn apply_sample(baseline: &Table, params: &[ParameterRange], values: &[f64]) -> Result<Table> {
    ensure!(
        params.len() == values.len(),
        "Expected {} parameter values but got {}",
        params.len(),
        values.len()
    );

    let mut table = baseline.clone();
    for (param, value) in params.iter().zip(values) {
        set_value(&mut table, &param.key_path, *value).with_context(|| {
            format!(
                "Cannot set parameter {} at {}",
                param.name,
                param.key_path.iter().join(".")
            )
        })?;
    }

    Ok(table)
}
