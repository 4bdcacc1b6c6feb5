// End-to-end checks of the streaming filter against whole-series evaluation.

mod common;

use alma_ta::{
    alma, alma_batch, AlmaBatchRange, AlmaFilter, AlmaInput, AlmaParams, AlmaRegistry,
    FilterState,
};
use common::{assert_array_close, stream_all, TestData};
use std::error::Error;

fn reference_alma(window: &[f64], n: usize, sigma: f64, offset: f64) -> f64 {
    let m = (offset * (n - 1) as f64).floor();
    let s = n as f64 / sigma;
    let mut agr = 0.0;
    let mut norm = 0.0;
    for i in 0..n {
        let w = (-((i as f64 - m) * (i as f64 - m)) / (2.0 * s * s)).exp();
        agr += w * window[i];
        norm += w;
    }
    agr / norm
}

#[test]
fn stream_matches_direct_formula() -> Result<(), Box<dyn Error>> {
    let data = TestData::load()?;
    let close = data.close_prices();
    let (n, sigma, offset) = (9, 6.0, 0.85);

    let mut filter = AlmaFilter::new(AlmaParams::new(n, sigma, offset));
    let streamed = stream_all(&mut filter, close);

    let mut expected = vec![f64::NAN; close.len()];
    for i in (n - 1)..close.len() {
        expected[i] = reference_alma(&close[i + 1 - n..=i], n, sigma, offset);
    }
    assert_array_close(&streamed, &expected, 0.0, 1e-9, "alma stream");
    Ok(())
}

#[test]
fn stream_matches_series_for_every_source() -> Result<(), Box<dyn Error>> {
    let data = TestData::load()?;
    for source in ["open", "close", "hl2", "hlc3", "ohlc4", "hlcc4"] {
        let params = AlmaParams::new(7, 3.0, 0.6);
        let series = alma(&AlmaInput::from_candles(&data.candles, source, params))?.values;
        let column = data.candles.select_candle_field(source)?;
        let mut filter = AlmaFilter::new(params);
        assert_array_close(&stream_all(&mut filter, column), &series, 0.0, 1e-9, source);
    }
    Ok(())
}

#[test]
fn even_window_behaves_like_next_odd() -> Result<(), Box<dyn Error>> {
    let data = TestData::load()?;
    let even = alma(&AlmaInput::from_slice(data.close_prices(), AlmaParams::new(10, 6.0, 0.5)))?;
    let odd = alma(&AlmaInput::from_slice(data.close_prices(), AlmaParams::new(11, 6.0, 0.5)))?;
    assert_array_close(&even.values, &odd.values, 0.0, 0.0, "even window");
    assert!(even.values[..10].iter().all(|v| v.is_nan()));
    assert!(even.values[10].is_finite());
    Ok(())
}

#[test]
fn constant_series_is_a_fixed_point() {
    let data = vec![42.5; 64];
    for n in [1, 5, 25, 51] {
        for sigma in [0.01, 1.0, 50.0] {
            let mut filter = AlmaFilter::new(AlmaParams::new(n, sigma, 0.85));
            for v in stream_all(&mut filter, &data).into_iter().filter(|v| !v.is_nan()) {
                assert!((v - 42.5).abs() < 1e-9, "n={} sigma={} gave {}", n, sigma, v);
            }
        }
    }
}

#[test]
fn reconfigure_mid_stream_restarts_warmup() -> Result<(), Box<dyn Error>> {
    let data = TestData::load()?;
    let close = data.close_prices();
    let mut filter = AlmaFilter::new(AlmaParams::new(5, 6.0, 0.5));
    for &x in &close[..20] {
        filter.update(x);
    }
    assert_eq!(filter.state(), FilterState::Steady);

    let params = AlmaParams::new(9, 6.0, 0.85);
    filter.configure(params);
    let resumed = stream_all(&mut filter, &close[20..]);

    let fresh = alma(&AlmaInput::from_slice(&close[20..], params))?.values;
    assert_array_close(&resumed, &fresh, 0.0, 1e-9, "reconfigured stream");
    assert!(resumed[..8].iter().all(|v| v.is_nan()));
    Ok(())
}

#[test]
fn registry_filters_track_batch_rows() -> Result<(), Box<dyn Error>> {
    let data = TestData::load()?;
    let close = data.close_prices();
    let sweep = AlmaBatchRange {
        window_size: (3, 15, 6),
        sigma: (6.0, 6.0, 0.0),
        sample_point: (0.25, 0.75, 0.5),
    };
    let batch = alma_batch(close, &sweep)?;
    assert_eq!(batch.rows, 6);

    let mut registry: AlmaRegistry<&str> = AlmaRegistry::new();
    for combo in &batch.combos {
        registry.get_or_insert("close", *combo);
    }
    assert_eq!(registry.len(), batch.rows);

    let mut streamed: Vec<Vec<f64>> = vec![Vec::with_capacity(close.len()); batch.rows];
    for &x in close {
        for (row, combo) in batch.combos.iter().enumerate() {
            let v = registry.get_or_insert("close", *combo).update(x);
            streamed[row].push(v.unwrap_or(f64::NAN));
        }
    }
    for (row, combo) in batch.combos.iter().enumerate() {
        let expected = batch.values_for(combo).ok_or("missing row")?;
        assert_array_close(&streamed[row], expected, 0.0, 1e-9, "registry row");
    }
    Ok(())
}
