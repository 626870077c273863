// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mean and linear trend removal
//!
//! Both stages work in place on the preprocessing buffer. The trend is fitted
//! by ordinary least squares over the sample index `x = 0..N-1`:
//!
//! ```text
//! denom = N·Σx² - (Σx)²
//! k     = (N·Σxy - Σx·Σy) / denom
//! m     = (Σy·Σx² - Σx·Σxy) / denom
//! ```

use super::PreprocessingError;

/// Fitted line `y = k·x + m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Slope
    pub k: f64,
    /// Intercept
    pub m: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.k * x + self.m
    }
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Subtract the mean from every element and return it.
pub fn remove_mean(data: &mut [f64]) -> f64 {
    let mean = mean(data);
    for value in data.iter_mut() {
        *value -= mean;
    }
    mean
}

/// Least-squares fit of `data` against its indices.
///
/// Fails with [`PreprocessingError::DegenerateFit`] when the normal equations
/// have no unique solution, which only happens for fewer than two samples.
pub fn least_squares(data: &[f64]) -> Result<LinearFit, PreprocessingError> {
    let n = data.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in data.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return Err(PreprocessingError::DegenerateFit { samples: data.len() });
    }

    Ok(LinearFit {
        k: (n * sum_xy - sum_x * sum_y) / denom,
        m: (sum_y * sum_x2 - sum_x * sum_xy) / denom,
    })
}

/// Fit and subtract a line. On a degenerate fit the data is left untouched.
pub fn remove_linear_trend(data: &mut [f64]) -> Result<LinearFit, PreprocessingError> {
    let fit = least_squares(data)?;
    for (i, value) in data.iter_mut().enumerate() {
        *value -= fit.at(i as f64);
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_remove_mean_of_dc_is_zero() {
        let mut data = vec![3.25; 16];
        let mean = remove_mean(&mut data);
        assert_abs_diff_eq!(mean, 3.25);
        for value in data {
            assert_abs_diff_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_fit_recovers_line() {
        let (k, m) = (-0.75, 12.5);
        let mut data: Vec<f64> = (0..64).map(|x| k * x as f64 + m).collect();
        let fit = least_squares(&data).unwrap();
        assert_abs_diff_eq!(fit.k, k, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.m, m, epsilon = 1e-9);

        remove_linear_trend(&mut data).unwrap();
        for value in data {
            assert_abs_diff_eq!(value, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_trend_removal_keeps_oscillation() {
        let mut data: Vec<f64> = (0..8)
            .map(|x| 2.0 * x as f64 + if x % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        remove_linear_trend(&mut data).unwrap();
        assert!(data.iter().all(|v| v.abs() > 0.5));
    }

    #[test]
    fn test_degenerate_fit() {
        let mut data = vec![4.0];
        assert_eq!(
            remove_linear_trend(&mut data),
            Err(PreprocessingError::DegenerateFit { samples: 1 })
        );
        assert_eq!(data, vec![4.0]);
        assert!(least_squares(&[]).is_err());
    }

    #[test]
    fn test_mean_of_empty_slice() {
        let mut data: Vec<f64> = Vec::new();
        assert_eq!(remove_mean(&mut data), 0.0);
    }
}
