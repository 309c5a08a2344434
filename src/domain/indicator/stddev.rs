//! Rolling population standard deviation.
//!
//! STDDEV(n)[j] = sqrt(sum((v - mean)^2) / n) over `values[j..j + n]`.
//! Tail-aligned like [`super::sma::sma`].

pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    values
        .windows(period)
        .map(|window| {
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            variance.sqrt()
        })
        .collect()
}
