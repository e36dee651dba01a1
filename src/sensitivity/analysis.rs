//! Variance-based (Sobol') sensitivity indices from the outputs of a Saltelli sample.
use super::sample::saltelli_sample_count;
use anyhow::{Result, ensure};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// An index together with the half-width of its confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndexEstimate {
    /// The estimated index
    pub value: f64,
    /// Half-width of the confidence interval
    pub conf: f64,
}

/// Second-order indices for every pair of parameters.
///
/// Only the upper triangle (`j < k`) is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondOrderIndices(Vec<Vec<Option<IndexEstimate>>>);

impl SecondOrderIndices {
    /// Get the index for parameters `j` and `k`, if defined
    pub fn get(&self, j: usize, k: usize) -> Option<IndexEstimate> {
        self.0.get(j)?.get(k).copied().flatten()
    }
}

/// Sobol' indices for every varied parameter
#[derive(Debug, Clone, PartialEq)]
pub struct SobolIndices {
    /// First-order indices
    pub first_order: Vec<IndexEstimate>,
    /// Total-order indices
    pub total_order: Vec<IndexEstimate>,
    /// Second-order indices, if calculated
    pub second_order: Option<SecondOrderIndices>,
}

/// Options for [`analyse`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Whether the sample includes the rows needed for second-order indices
    pub calc_second_order: bool,
    /// Number of bootstrap resamples
    pub num_resamples: usize,
    /// Confidence level for the intervals
    pub conf_level: f64,
    /// Seed for the bootstrap
    pub seed: u64,
}

/// Model outputs separated into the Saltelli matrices
struct SaltelliOutputs {
    a: Vec<f64>,
    b: Vec<f64>,
    /// `ab[j][i]`: output for base point `i` with column `j` taken from B
    ab: Vec<Vec<f64>>,
    /// `ba[j][i]`: output for base point `i` with column `j` taken from A
    ba: Vec<Vec<f64>>,
}

impl SaltelliOutputs {
    fn new(y: &[f64], dimensions: usize, calc_second_order: bool) -> Self {
        let step = if calc_second_order {
            2 * dimensions + 2
        } else {
            dimensions + 2
        };
        let column = |offset: usize| y.chunks(step).map(|block| block[offset]).collect();

        Self {
            a: column(0),
            b: column(step - 1),
            ab: (0..dimensions).map(|j| column(1 + j)).collect(),
            ba: if calc_second_order {
                (0..dimensions).map(|j| column(1 + dimensions + j)).collect()
            } else {
                Vec::new()
            },
        }
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len() as f64;
    values.sum::<f64>() / n
}

/// Population variance of the concatenation of A and B
fn variance(a: &[f64], b: &[f64]) -> f64 {
    let values = || a.iter().chain(b).copied();
    let n = (a.len() + b.len()) as f64;
    let mean = values().sum::<f64>() / n;
    values().map(|y| (y - mean).powi(2)).sum::<f64>() / n
}

/// First-order index (Saltelli et al., 2010)
fn first_order_index(a: &[f64], ab: &[f64], b: &[f64], idx: &[usize]) -> f64 {
    let (a, ab, b) = (select(a, idx), select(ab, idx), select(b, idx));
    let v = mean(b.iter().zip(&ab).zip(&a).map(|((b, ab), a)| b * (ab - a)));
    v / variance(&a, &b)
}

/// Total-order index (Jansen, 1999)
fn total_order_index(a: &[f64], ab: &[f64], b: &[f64], idx: &[usize]) -> f64 {
    let (a, ab, b) = (select(a, idx), select(ab, idx), select(b, idx));
    let v = 0.5 * mean(a.iter().zip(&ab).map(|(a, ab)| (a - ab).powi(2)));
    v / variance(&a, &b)
}

/// Second-order index (Saltelli, 2002)
fn second_order_index(y: &SaltelliOutputs, j: usize, k: usize, idx: &[usize]) -> f64 {
    let (a, b) = (select(&y.a, idx), select(&y.b, idx));
    let (ba_j, ab_k) = (select(&y.ba[j], idx), select(&y.ab[k], idx));
    let v_jk = mean(
        ba_j.iter()
            .zip(&ab_k)
            .zip(a.iter().zip(&b))
            .map(|((ba_j, ab_k), (a, b))| ba_j * ab_k - a * b),
    ) / variance(&a, &b);

    let s_j = first_order_index(&y.a, &y.ab[j], &y.b, idx);
    let s_k = first_order_index(&y.a, &y.ab[k], &y.b, idx);
    v_jk - s_j - s_k
}

/// Pick the values at the given indices
fn select(values: &[f64], idx: &[usize]) -> Vec<f64> {
    idx.iter().map(|i| values[*i]).collect()
}

/// Sample standard deviation (with one degree of freedom removed)
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

/// Calculate an index and a bootstrap confidence interval for it
fn estimate<F>(estimator: F, all: &[usize], resamples: &[Vec<usize>], z: f64) -> IndexEstimate
where
    F: Fn(&[usize]) -> f64,
{
    let bootstrap: Vec<f64> = resamples.iter().map(|idx| estimator(idx)).collect();
    IndexEstimate {
        value: estimator(all),
        conf: z * std_dev(&bootstrap),
    }
}

/// The inverse of the standard normal cumulative distribution function.
///
/// Uses Acklam's rational approximation, which has a relative error below 1.15e-9.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Calculate Sobol' indices from the outputs of a Saltelli sample.
///
/// # Arguments
///
/// * `y` - Model output for each sample row, in sample order
/// * `dimensions` - The number of varied parameters
/// * `options` - Analysis options
pub fn analyse(y: &[f64], dimensions: usize, options: &AnalysisOptions) -> Result<SobolIndices> {
    let step = saltelli_sample_count(1, dimensions, options.calc_second_order);
    ensure!(
        dimensions > 0 && !y.is_empty() && y.len() % step == 0,
        "Number of outputs ({}) is not a multiple of the Saltelli block size ({step}); check that \
        calc_second_order matches the sample",
        y.len()
    );
    ensure!(
        y.iter().all(|y| y.is_finite()),
        "Model outputs contain non-finite values"
    );

    // Standardise outputs
    let n = y.len() as f64;
    let y_mean = y.iter().sum::<f64>() / n;
    let y_std = (y.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n).sqrt();
    ensure!(
        y_std > 0.0,
        "Model outputs have zero variance, so sensitivity indices are undefined"
    );
    let y: Vec<f64> = y.iter().map(|y| (y - y_mean) / y_std).collect();
    let outputs = SaltelliOutputs::new(&y, dimensions, options.calc_second_order);
    let num_samples = outputs.a.len();
    ensure!(
        variance(&outputs.a, &outputs.b) > 0.0,
        "Model outputs for the base samples have zero variance, so sensitivity indices are \
        undefined"
    );

    let mut rng = SmallRng::seed_from_u64(options.seed);
    let resamples: Vec<Vec<usize>> = (0..options.num_resamples)
        .map(|_| {
            (0..num_samples)
                .map(|_| rng.random_range(0..num_samples))
                .collect()
        })
        .collect();
    let all: Vec<usize> = (0..num_samples).collect();
    let z = inverse_normal_cdf(0.5 + options.conf_level / 2.0);

    let first_order = (0..dimensions)
        .map(|j| {
            let estimator =
                |idx: &[usize]| first_order_index(&outputs.a, &outputs.ab[j], &outputs.b, idx);
            estimate(estimator, &all, &resamples, z)
        })
        .collect();
    let total_order = (0..dimensions)
        .map(|j| {
            let estimator =
                |idx: &[usize]| total_order_index(&outputs.a, &outputs.ab[j], &outputs.b, idx);
            estimate(estimator, &all, &resamples, z)
        })
        .collect();

    let second_order = options.calc_second_order.then(|| {
        SecondOrderIndices(
            (0..dimensions)
                .map(|j| {
                    (0..dimensions)
                        .map(|k| {
                            (j < k).then(|| {
                                let estimator =
                                    |idx: &[usize]| second_order_index(&outputs, j, k, idx);
                                estimate(estimator, &all, &resamples, z)
                            })
                        })
                        .collect()
                })
                .collect(),
        )
    });

    Ok(SobolIndices {
        first_order,
        total_order,
        second_order,
    })
}
