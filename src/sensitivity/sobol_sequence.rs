//! Generation of the (unscrambled) Sobol' low-discrepancy sequence.
//!
//! Direction numbers are taken from the Joe–Kuo `new-joe-kuo-6.21201` table.
use anyhow::{Result, ensure};

/// Number of bits of precision in each coordinate
const BITS: usize = 32;

/// Primitive polynomial data for dimensions 2 onwards: degree `s`, coefficients `a` and initial
/// direction numbers `m`
#[rustfmt::skip]
const DIRECTIONS: &[(u32, u32, &[u32])] = &[
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
    (6, 19, &[1, 1, 1, 15, 7, 5]),
    (6, 22, &[1, 3, 1, 15, 13, 25]),
    (6, 25, &[1, 1, 5, 5, 19, 61]),
    (7, 1, &[1, 3, 7, 11, 23, 15, 103]),
    (7, 4, &[1, 3, 7, 13, 13, 15, 69]),
    (7, 7, &[1, 1, 3, 13, 7, 35, 63]),
    (7, 8, &[1, 3, 5, 9, 1, 25, 53]),
    (7, 14, &[1, 3, 1, 13, 9, 35, 107]),
    (7, 19, &[1, 3, 1, 5, 27, 61, 31]),
    (7, 21, &[1, 1, 5, 11, 19, 41, 61]),
    (7, 28, &[1, 3, 5, 3, 3, 13, 69]),
    (7, 31, &[1, 1, 7, 13, 1, 19, 1]),
    (7, 32, &[1, 3, 7, 5, 13, 19, 59]),
    (7, 37, &[1, 1, 3, 9, 25, 29, 41]),
    (7, 41, &[1, 3, 5, 13, 23, 1, 55]),
    (7, 42, &[1, 3, 7, 3, 13, 59, 17]),
    (7, 50, &[1, 3, 1, 3, 5, 53, 69]),
    (7, 55, &[1, 1, 5, 5, 23, 33, 13]),
    (7, 56, &[1, 1, 7, 7, 1, 61, 123]),
    (7, 59, &[1, 1, 7, 9, 13, 61, 49]),
    (7, 62, &[1, 3, 3, 5, 3, 55, 33]),
    (8, 14, &[1, 3, 1, 15, 31, 13, 49, 245]),
    (8, 21, &[1, 3, 5, 15, 31, 59, 63, 97]),
    (8, 22, &[1, 3, 1, 11, 11, 11, 77, 249]),
];

/// The maximum number of dimensions for which direction numbers are available
pub const MAX_DIMENSIONS: usize = DIRECTIONS.len() + 1;

/// Calculate the direction numbers `V_1..V_BITS` for one dimension.
///
/// Index 0 of the returned array is unused.
fn direction_numbers(dimension: usize) -> [u32; BITS + 1] {
    let mut v = [0; BITS + 1];

    if dimension == 0 {
        // All m = 1
        for (i, v) in v.iter_mut().enumerate().skip(1) {
            *v = 1 << (BITS - i);
        }
        return v;
    }

    let (s, a, m) = DIRECTIONS[dimension - 1];
    let s = s as usize;
    for i in 1..=BITS {
        v[i] = if i <= s {
            m[i - 1] << (BITS - i)
        } else {
            let mut value = v[i - s] ^ (v[i - s] >> s);
            for k in 1..s {
                value ^= ((a >> (s - 1 - k)) & 1) * v[i - k];
            }
            value
        };
    }

    v
}

/// Generate the first `n` points of the Sobol' sequence in `dimensions` dimensions.
///
/// The first point is always the origin. Points are generated in Gray code order.
pub fn sample(n: usize, dimensions: usize) -> Result<Vec<Vec<f64>>> {
    ensure!(
        dimensions > 0 && dimensions <= MAX_DIMENSIONS,
        "Sobol' sequence dimension must be between 1 and {MAX_DIMENSIONS} (got {dimensions})"
    );
    ensure!(
        n < 1 << BITS,
        "Too many points requested from Sobol' sequence ({n})"
    );

    let directions: Vec<_> = (0..dimensions).map(direction_numbers).collect();
    let scale = (1u64 << BITS) as f64;

    let mut x = vec![0u32; dimensions];
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        if i > 0 {
            // Index of the lowest zero bit of i - 1
            let c = (i - 1).trailing_ones() as usize + 1;
            for (x, v) in x.iter_mut().zip(&directions) {
                *x ^= v[c];
            }
        }
        points.push(x.iter().map(|x| f64::from(*x) / scale).collect());
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_points() {
        let points = sample(8, 2).unwrap();
        let expected = [
            [0.0, 0.0],
            [0.5, 0.5],
            [0.75, 0.25],
            [0.25, 0.75],
            [0.375, 0.375],
            [0.875, 0.875],
            [0.625, 0.125],
            [0.125, 0.625],
        ];
        for (point, expected) in points.iter().zip(expected) {
            assert_eq!(point.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn test_third_dimension() {
        let points = sample(4, 3).unwrap();
        let third: Vec<_> = points.iter().map(|p| p[2]).collect();
        assert_eq!(third, [0.0, 0.5, 0.25, 0.75]);
    }

    #[test]
    fn test_stratification() {
        // Each block of 2^k points has exactly one point in each interval of width 2^-k
        let points = sample(16, MAX_DIMENSIONS).unwrap();
        for d in 0..MAX_DIMENSIONS {
            let mut bins: Vec<_> = points.iter().map(|p| (p[d] * 16.0) as usize).collect();
            bins.sort_unstable();
            assert_eq!(bins, (0..16).collect::<Vec<_>>(), "dimension {d}");
        }
    }

    #[test]
    fn test_bad_dimensions() {
        assert!(sample(4, 0).is_err());
        assert!(sample(4, MAX_DIMENSIONS + 1).is_err());
    }
}
