//! Generation of parameter samples.
use super::config::{ParameterRange, Sampler, SensitivityConfig};
use super::sobol_sequence::{self, MAX_DIMENSIONS};
use anyhow::{Result, ensure};
use indexmap::IndexSet;
use log::warn;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// The number of model runs needed for a Saltelli sample
pub fn saltelli_sample_count(
    num_samples: usize,
    dimensions: usize,
    calc_second_order: bool,
) -> usize {
    if calc_second_order {
        num_samples * (2 * dimensions + 2)
    } else {
        num_samples * (dimensions + 2)
    }
}

/// Check that the parameters to vary are well defined
fn check_parameters(params: &[ParameterRange]) -> Result<()> {
    ensure!(!params.is_empty(), "At least one parameter must be varied");

    let mut names = IndexSet::new();
    for param in params {
        ensure!(
            names.insert(param.name.as_str()),
            "Parameter {} is given more than once",
            param.name
        );
        ensure!(
            !param.key_path.is_empty(),
            "key_path for parameter {} is empty",
            param.name
        );

        let [lower, upper] = param.bounds;
        ensure!(
            lower.is_finite() && upper.is_finite() && lower < upper,
            "Bounds for parameter {} must be finite, with the lower bound less than the upper \
            bound (got [{lower}, {upper}])",
            param.name
        );
    }

    Ok(())
}

/// Rescale a sample from the unit hypercube to the parameters' bounds
fn scale_to_bounds(mut row: Vec<f64>, params: &[ParameterRange]) -> Vec<f64> {
    for (value, param) in row.iter_mut().zip(params) {
        let [lower, upper] = param.bounds;
        *value = lower + *value * (upper - lower);
    }

    row
}

/// Generate a Saltelli sample in the unit hypercube.
///
/// For each base point, the rows are: A, then A with column `i` taken from B (for each `i`), then
/// (for second order) B with column `i` taken from A (for each `i`), then B.
pub fn saltelli(
    num_samples: usize,
    dimensions: usize,
    calc_second_order: bool,
) -> Result<Vec<Vec<f64>>> {
    ensure!(num_samples > 0, "num_samples must be greater than zero");
    ensure!(
        2 * dimensions <= MAX_DIMENSIONS,
        "At most {} parameters can be varied with the Saltelli sampler, as Sobol' direction \
        numbers are only available for {MAX_DIMENSIONS} dimensions (got {dimensions} parameters). \
        Use the lhs sampler for larger problems.",
        MAX_DIMENSIONS / 2
    );
    if !num_samples.is_power_of_two() {
        warn!(
            "The convergence properties of the Sobol' sequence are only valid if num_samples is a \
            power of two (got {num_samples})"
        );
    }

    // Skip the first points of the sequence, which are poorly distributed
    let skip = num_samples.next_power_of_two();
    let base = sobol_sequence::sample(num_samples + skip, 2 * dimensions)?;

    let mut rows = Vec::with_capacity(saltelli_sample_count(
        num_samples,
        dimensions,
        calc_second_order,
    ));
    for point in &base[skip..] {
        let (a, b) = point.split_at(dimensions);
        rows.push(a.to_vec());

        for i in 0..dimensions {
            let mut ab = a.to_vec();
            ab[i] = b[i];
            rows.push(ab);
        }

        if calc_second_order {
            for i in 0..dimensions {
                let mut ba = b.to_vec();
                ba[i] = a[i];
                rows.push(ba);
            }
        }

        rows.push(b.to_vec());
    }

    Ok(rows)
}

/// Generate a Latin hypercube sample in the unit hypercube.
///
/// Each dimension is split into `num_samples` equal intervals, each of which contains exactly one
/// point.
pub fn latin_hypercube(
    num_samples: usize,
    dimensions: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Vec<f64>>> {
    ensure!(num_samples > 0, "num_samples must be greater than zero");

    let n = num_samples as f64;
    let mut rows = vec![vec![0.0; dimensions]; num_samples];
    for d in 0..dimensions {
        let mut strata: Vec<usize> = (0..num_samples).collect();
        strata.shuffle(rng);
        for (row, stratum) in rows.iter_mut().zip(strata) {
            row[d] = (stratum as f64 + rng.random::<f64>()) / n;
        }
    }

    Ok(rows)
}

/// Generate parameter samples, scaled to the parameters' bounds
pub fn generate_samples(config: &SensitivityConfig) -> Result<Vec<Vec<f64>>> {
    let params = &config.pars_to_vary;
    check_parameters(params)?;

    let dimensions = params.len();
    let samples = match config.sampler {
        Sampler::Saltelli => saltelli(config.num_samples, dimensions, config.calc_second_order)?,
        Sampler::Lhs => {
            let mut rng = SmallRng::seed_from_u64(config.seed);
            latin_hypercube(config.num_samples, dimensions, &mut rng)?
        }
    };

    Ok(samples
        .into_iter()
        .map(|row| scale_to_bounds(row, params))
        .collect())
}
