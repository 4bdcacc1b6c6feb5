//! Shared fixtures for the integration tests.
use alma_ta::utilities::data_loader::{read_candles_from_csv, Candles};
use std::error::Error;

pub struct TestData {
    pub candles: Candles,
}

impl TestData {
    /// Load the bundled sample bars.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let candles = read_candles_from_csv("src/data/sample_candles.csv")?;
        Ok(TestData { candles })
    }

    pub fn close_prices(&self) -> &[f64] {
        &self.candles.close
    }
}

/// Compare two arrays with a tolerance; `NaN` matches `NaN`.
#[allow(dead_code)]
pub fn assert_array_close(actual: &[f64], expected: &[f64], rtol: f64, atol: f64, name: &str) {
    assert_eq!(actual.len(), expected.len(),
        "{}: Length mismatch: actual {} vs expected {}", name, actual.len(), expected.len());

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a.is_nan() && e.is_nan() {
            continue;
        }

        let diff = (a - e).abs();
        let tol = atol + rtol * e.abs();

        assert!(diff <= tol,
            "{}: Value mismatch at index {}: actual {} vs expected {} (diff: {}, tol: {})",
            name, i, a, e, diff, tol);
    }
}

/// Drives a filter over `data`, mapping warm-up to `NaN`.
#[allow(dead_code)]
pub fn stream_all(filter: &mut alma_ta::AlmaFilter, data: &[f64]) -> Vec<f64> {
    data.iter()
        .map(|&x| filter.update(x).unwrap_or(f64::NAN))
        .collect()
}
