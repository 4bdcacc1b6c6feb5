//! # Arnaud Legoux Moving Average (ALMA)
//!
//! A smooth yet responsive moving average that uses Gaussian weighting. The weight
//! vector is built once per parameter set and convolved with the most recent
//! `window_size` samples, normalized by the weight sum.
//!
//! ## Parameters
//! - **window_size**: Samples per output. Clamped to [1, 50], then rounded *up* to
//!   the next odd value when even (so 50 becomes 51). Defaults to 9.
//! - **sigma**: Gaussian width, clamped to [0.01, 50.0]. Defaults to 6.0.
//! - **sample_point**: Position of the Gaussian peak inside the window, clamped to
//!   [0.0, 1.0] (0 = oldest, 1 = newest). Defaults to 0.5.
//!
//! Out-of-range parameters are never rejected, only clamped.
//!
//! ## Errors
//! - **EmptyInputData**: alma: Input data slice is empty.
//! - **AllValuesNaN**: alma: All input data values are `NaN`.
//! - **UnknownSource**: alma: Candle source name not recognized.
//! - **InvalidRange**: alma: A sweep axis has `start > end`.
//! - **EmptyWeights**: alma: A raw weight vector has no elements.
//!
//! ## Returns
//! - **`AlmaFilter::update`** yields `None` until `window_size` samples were seen.
//! - **`alma`** returns a `Vec<f64>` matching the input length, `NaN` during warm-up.

use crate::utilities::data_loader::{source_type, Candles};
use crate::utilities::helpers::{alloc_with_nan_prefix, axis_f64, axis_usize, first_valid_index};
use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const DEFAULT_WINDOW_SIZE: usize = 9;
pub const DEFAULT_SIGMA: f64 = 6.0;
pub const DEFAULT_SAMPLE_POINT: f64 = 0.5;

pub const MIN_WINDOW_SIZE: usize = 1;
pub const MAX_WINDOW_SIZE: usize = 50;
pub const MIN_SIGMA: f64 = 0.01;
pub const MAX_SIGMA: f64 = 50.0;

#[derive(Debug, Clone)]
pub enum AlmaData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct AlmaOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlmaParams {
    #[serde(default, deserialize_with = "deserialize_window_size")]
    pub window_size: Option<usize>,
    pub sigma: Option<f64>,
    pub sample_point: Option<f64>,
}

impl Default for AlmaParams {
    fn default() -> Self {
        Self {
            window_size: Some(DEFAULT_WINDOW_SIZE),
            sigma: Some(DEFAULT_SIGMA),
            sample_point: Some(DEFAULT_SAMPLE_POINT),
        }
    }
}

impl AlmaParams {
    #[inline]
    pub fn new(window_size: usize, sigma: f64, sample_point: f64) -> Self {
        Self {
            window_size: Some(window_size),
            sigma: Some(sigma),
            sample_point: Some(sample_point),
        }
    }

    #[inline]
    pub fn get_window_size(&self) -> usize {
        clamp_window_size(self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE))
    }

    #[inline]
    pub fn get_sigma(&self) -> f64 {
        clamp_sigma(self.sigma.unwrap_or(DEFAULT_SIGMA))
    }

    #[inline]
    pub fn get_sample_point(&self) -> f64 {
        clamp_sample_point(self.sample_point.unwrap_or(DEFAULT_SAMPLE_POINT))
    }

    /// All three fields resolved and clamped in one step.
    pub fn clamped(&self) -> Self {
        let out = Self::new(
            self.get_window_size(),
            self.get_sigma(),
            self.get_sample_point(),
        );
        let requested_window = self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&requested_window) {
            debug!(
                "alma: window_size {} out of range, using {}",
                requested_window,
                out.get_window_size()
            );
        }
        if let Some(s) = self.sigma {
            if !(MIN_SIGMA..=MAX_SIGMA).contains(&s) {
                debug!("alma: sigma {} out of range, using {}", s, out.get_sigma());
            }
        }
        if let Some(t) = self.sample_point {
            if !(0.0..=1.0).contains(&t) {
                debug!(
                    "alma: sample_point {} out of range, using {}",
                    t,
                    out.get_sample_point()
                );
            }
        }
        out
    }
}

/// Accepts any integer; zero and negative sizes map to the minimum window.
fn deserialize_window_size<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.map(|n| usize::try_from(n.max(MIN_WINDOW_SIZE as i64)).unwrap_or(MAX_WINDOW_SIZE)))
}

/// Clamps to [1, 50], then bumps even sizes up to the next odd one.
#[inline]
pub fn clamp_window_size(n: usize) -> usize {
    let n = n.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE);
    if n & 1 == 0 {
        n + 1
    } else {
        n
    }
}

#[inline]
pub fn clamp_sigma(s: f64) -> f64 {
    if s.is_nan() {
        return DEFAULT_SIGMA;
    }
    s.clamp(MIN_SIGMA, MAX_SIGMA)
}

#[inline]
pub fn clamp_sample_point(t: f64) -> f64 {
    if t.is_nan() {
        return DEFAULT_SAMPLE_POINT;
    }
    t.clamp(0.0, 1.0)
}

/// Gaussian weights, oldest sample first. Weights are not normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct AlmaWeights {
    weights: Vec<f64>,
    center: Option<f64>,
    spread: Option<f64>,
}

impl AlmaWeights {
    pub fn build(params: &AlmaParams) -> Self {
        let period = params.get_window_size();
        let sigma = params.get_sigma();
        let offset = params.get_sample_point();

        let m = (offset * (period - 1) as f64).floor();
        let s = period as f64 / sigma;
        let s2 = 2.0 * s * s;

        let weights = (0..period)
            .map(|i| {
                let diff = i as f64 - m;
                (-(diff * diff) / s2).exp()
            })
            .collect();

        Self {
            weights,
            center: Some(m),
            spread: Some(s),
        }
    }

    /// Wraps an arbitrary weight vector, bypassing the parameter clamps.
    pub fn from_raw(weights: Vec<f64>) -> Result<Self, AlmaError> {
        if weights.is_empty() {
            return Err(AlmaError::EmptyWeights);
        }
        Ok(Self {
            weights,
            center: None,
            spread: None,
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Peak index `m`; `None` for raw weights.
    #[inline]
    pub fn center(&self) -> Option<f64> {
        self.center
    }

    /// Gaussian spread `s = N / sigma`; `None` for raw weights.
    #[inline]
    pub fn spread(&self) -> Option<f64> {
        self.spread
    }

    /// Weighted average of `window` (oldest first, same length as the weights).
    /// `None` when the weights sum to zero.
    #[inline]
    pub fn apply(&self, window: &[f64]) -> Option<f64> {
        debug_assert_eq!(window.len(), self.weights.len());
        let mut agr = 0.0;
        let mut norm = 0.0;
        for (&w, &x) in self.weights.iter().zip(window) {
            agr += w * x;
            norm += w;
        }
        if norm == 0.0 {
            None
        } else {
            Some(agr / norm)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    WarmingUp,
    Steady,
}

/// Streaming ALMA: one sample in, at most one value out.
#[derive(Debug, Clone)]
pub struct AlmaFilter {
    params: Option<AlmaParams>,
    weights: AlmaWeights,
    buffer: Vec<f64>,
    head: usize,
    seen: usize,
    last: Option<f64>,
}

impl Default for AlmaFilter {
    fn default() -> Self {
        Self::new(AlmaParams::default())
    }
}

impl AlmaFilter {
    pub fn new(params: AlmaParams) -> Self {
        let params = params.clamped();
        let weights = AlmaWeights::build(&params);
        let period = weights.len();
        Self {
            params: Some(params),
            weights,
            buffer: vec![f64::NAN; period],
            head: 0,
            seen: 0,
            last: None,
        }
    }

    /// Filter over an externally supplied weight vector. Such a filter has no
    /// parameters; `window_size()` is the weight count.
    pub fn with_weights(weights: AlmaWeights) -> Self {
        let period = weights.len();
        Self {
            params: None,
            weights,
            buffer: vec![f64::NAN; period],
            head: 0,
            seen: 0,
            last: None,
        }
    }

    /// Applies the clamp policy to all parameters at once, rebuilds the weights
    /// and restarts warm-up.
    pub fn configure(&mut self, params: AlmaParams) {
        let params = params.clamped();
        self.weights = AlmaWeights::build(&params);
        self.params = Some(params);
        self.reset();
        debug!(
            "alma: configured window_size={} sigma={} sample_point={}",
            params.get_window_size(),
            params.get_sigma(),
            params.get_sample_point()
        );
    }

    /// Swaps the weight vector in place. History is kept unless the length
    /// changes, in which case the filter restarts warm-up.
    pub fn replace_weights(&mut self, weights: AlmaWeights) {
        let resized = weights.len() != self.weights.len();
        self.weights = weights;
        self.params = None;
        if resized {
            self.reset();
        }
    }

    /// Drops sample history and the held output, keeping parameters.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.buffer.resize(self.weights.len(), f64::NAN);
        self.head = 0;
        self.seen = 0;
        self.last = None;
    }

    /// Effective clamped parameters; `None` once raw weights are installed.
    #[inline]
    pub fn params(&self) -> Option<&AlmaParams> {
        self.params.as_ref()
    }

    #[inline]
    pub fn weights(&self) -> &AlmaWeights {
        &self.weights
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn samples_seen(&self) -> usize {
        self.seen
    }

    #[inline]
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    #[inline]
    pub fn state(&self) -> FilterState {
        if self.seen >= self.window_size() {
            FilterState::Steady
        } else {
            FilterState::WarmingUp
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == FilterState::Steady
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        let period = self.window_size();
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % period;
        self.seen = self.seen.saturating_add(1);
        if self.seen < period {
            return None;
        }
        match self.dot_ring() {
            Some(v) => {
                self.last = Some(v);
                Some(v)
            }
            None => {
                trace!("alma: zero weight sum, holding previous output");
                self.last
            }
        }
    }

    /// `head` points at the oldest sample once the ring is full.
    #[inline(always)]
    fn dot_ring(&self) -> Option<f64> {
        let period = self.window_size();
        let mut agr = 0.0;
        let mut norm = 0.0;
        let mut idx = self.head;
        for &w in self.weights.as_slice() {
            agr += w * self.buffer[idx];
            norm += w;
            idx = (idx + 1) % period;
        }
        if norm == 0.0 {
            None
        } else {
            Some(agr / norm)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlmaInput<'a> {
    pub data: AlmaData<'a>,
    pub params: AlmaParams,
}

impl<'a> AlmaInput<'a> {
    #[inline]
    pub fn from_candles(c: &'a Candles, s: &'a str, p: AlmaParams) -> Self {
        Self {
            data: AlmaData::Candles {
                candles: c,
                source: s,
            },
            params: p,
        }
    }
    #[inline]
    pub fn from_slice(sl: &'a [f64], p: AlmaParams) -> Self {
        Self {
            data: AlmaData::Slice(sl),
            params: p,
        }
    }
    #[inline]
    pub fn with_default_candles(c: &'a Candles) -> Self {
        Self::from_candles(c, "close", AlmaParams::default())
    }
    #[inline]
    pub fn with_default_slice(sl: &'a [f64]) -> Self {
        Self::from_slice(sl, AlmaParams::default())
    }

    fn as_slice(&self) -> Result<&'a [f64], AlmaError> {
        match self.data {
            AlmaData::Slice(sl) => Ok(sl),
            AlmaData::Candles { candles, source } => {
                source_type(candles, source).ok_or_else(|| AlmaError::UnknownSource {
                    name: source.to_string(),
                })
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct AlmaBuilder {
    window_size: Option<usize>,
    sigma: Option<f64>,
    sample_point: Option<f64>,
}

impl AlmaBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }
    #[inline(always)]
    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = Some(n);
        self
    }
    #[inline(always)]
    pub fn sigma(mut self, s: f64) -> Self {
        self.sigma = Some(s);
        self
    }
    #[inline(always)]
    pub fn sample_point(mut self, t: f64) -> Self {
        self.sample_point = Some(t);
        self
    }

    #[inline(always)]
    fn params(&self) -> AlmaParams {
        AlmaParams {
            window_size: self.window_size,
            sigma: self.sigma,
            sample_point: self.sample_point,
        }
    }

    #[inline(always)]
    pub fn apply(self, c: &Candles) -> Result<AlmaOutput, AlmaError> {
        self.apply_candles(c, "close")
    }

    #[inline(always)]
    pub fn apply_candles(self, c: &Candles, source: &str) -> Result<AlmaOutput, AlmaError> {
        let i = AlmaInput::from_candles(c, source, self.params());
        alma(&i)
    }

    #[inline(always)]
    pub fn apply_slice(self, d: &[f64]) -> Result<AlmaOutput, AlmaError> {
        let i = AlmaInput::from_slice(d, self.params());
        alma(&i)
    }

    #[inline(always)]
    pub fn into_filter(self) -> AlmaFilter {
        AlmaFilter::new(self.params())
    }
}

#[derive(Debug, Error)]
pub enum AlmaError {
    #[error("alma: Input data slice is empty.")]
    EmptyInputData,

    #[error("alma: All values are NaN.")]
    AllValuesNaN,

    #[error("alma: Unknown candle source: {name}")]
    UnknownSource { name: String },

    #[error("alma: Invalid {axis} range: start = {start}, end = {end}, step = {step}")]
    InvalidRange {
        axis: &'static str,
        start: f64,
        end: f64,
        step: f64,
    },

    #[error("alma: Weight vector is empty.")]
    EmptyWeights,
}

/// Evaluates the whole series. Leading `NaN`s are skipped before warm-up starts;
/// series shorter than the warm-up produce all-`NaN` output.
pub fn alma(input: &AlmaInput) -> Result<AlmaOutput, AlmaError> {
    let data = input.as_slice()?;
    if data.is_empty() {
        return Err(AlmaError::EmptyInputData);
    }
    let first = first_valid_index(data).ok_or(AlmaError::AllValuesNaN)?;

    let weights = AlmaWeights::build(&input.params.clamped());
    let warm = first + weights.len() - 1;
    let mut out = alloc_with_nan_prefix(data.len(), warm);
    alma_into_slice(data, &weights, first, &mut out);

    Ok(AlmaOutput { values: out })
}

/// Writes outputs for indices `first + N - 1 ..` into `out`; earlier entries are
/// left untouched.
pub fn alma_into_slice(data: &[f64], weights: &AlmaWeights, first: usize, out: &mut [f64]) {
    assert!(
        out.len() >= data.len(),
        "`out` must be at least as long as `data`"
    );
    let period = weights.len();
    let warm = first + period - 1;
    let mut held = f64::NAN;

    for i in warm..data.len() {
        let start = i + 1 - period;
        out[i] = match weights.apply(&data[start..=i]) {
            Some(v) => {
                held = v;
                v
            }
            None => held,
        };
    }
}

#[derive(Clone, Debug)]
pub struct AlmaBatchRange {
    pub window_size: (usize, usize, usize),
    pub sigma: (f64, f64, f64),
    pub sample_point: (f64, f64, f64),
}

impl Default for AlmaBatchRange {
    fn default() -> Self {
        Self {
            window_size: (DEFAULT_WINDOW_SIZE, 49, 2),
            sigma: (DEFAULT_SIGMA, DEFAULT_SIGMA, 0.0),
            sample_point: (DEFAULT_SAMPLE_POINT, DEFAULT_SAMPLE_POINT, 0.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AlmaBatchBuilder {
    range: AlmaBatchRange,
    parallel: bool,
}

impl Default for AlmaBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AlmaBatchBuilder {
    pub fn new() -> Self {
        Self {
            range: AlmaBatchRange::default(),
            parallel: true,
        }
    }
    pub fn parallel(mut self, yes: bool) -> Self {
        self.parallel = yes;
        self
    }
    #[inline]
    pub fn window_size_range(mut self, start: usize, end: usize, step: usize) -> Self {
        self.range.window_size = (start, end, step);
        self
    }
    #[inline]
    pub fn window_size_static(mut self, n: usize) -> Self {
        self.range.window_size = (n, n, 0);
        self
    }
    #[inline]
    pub fn sigma_range(mut self, start: f64, end: f64, step: f64) -> Self {
        self.range.sigma = (start, end, step);
        self
    }
    #[inline]
    pub fn sigma_static(mut self, s: f64) -> Self {
        self.range.sigma = (s, s, 0.0);
        self
    }
    #[inline]
    pub fn sample_point_range(mut self, start: f64, end: f64, step: f64) -> Self {
        self.range.sample_point = (start, end, step);
        self
    }
    #[inline]
    pub fn sample_point_static(mut self, t: f64) -> Self {
        self.range.sample_point = (t, t, 0.0);
        self
    }
    pub fn apply_slice(self, data: &[f64]) -> Result<AlmaBatchOutput, AlmaError> {
        alma_batch_inner(data, &self.range, self.parallel)
    }
    pub fn apply_candles(self, c: &Candles, src: &str) -> Result<AlmaBatchOutput, AlmaError> {
        let slice = source_type(c, src).ok_or_else(|| AlmaError::UnknownSource {
            name: src.to_string(),
        })?;
        self.apply_slice(slice)
    }
    pub fn with_default_candles(c: &Candles) -> Result<AlmaBatchOutput, AlmaError> {
        AlmaBatchBuilder::new().apply_candles(c, "close")
    }
}

/// Row-major matrix: one row per parameter combination.
#[derive(Clone, Debug)]
pub struct AlmaBatchOutput {
    pub values: Vec<f64>,
    pub combos: Vec<AlmaParams>,
    pub rows: usize,
    pub cols: usize,
}

impl AlmaBatchOutput {
    /// First row whose clamped parameters match `p` after clamping.
    pub fn row_for_params(&self, p: &AlmaParams) -> Option<usize> {
        let p = p.clamped();
        self.combos.iter().position(|c| {
            c.get_window_size() == p.get_window_size()
                && (c.get_sigma() - p.get_sigma()).abs() < 1e-12
                && (c.get_sample_point() - p.get_sample_point()).abs() < 1e-12
        })
    }

    pub fn values_for(&self, p: &AlmaParams) -> Option<&[f64]> {
        self.row_for_params(p).map(|row| {
            let start = row * self.cols;
            &self.values[start..start + self.cols]
        })
    }
}

fn expand_grid(r: &AlmaBatchRange) -> Result<Vec<AlmaParams>, AlmaError> {
    let windows = axis_usize(r.window_size).ok_or(AlmaError::InvalidRange {
        axis: "window_size",
        start: r.window_size.0 as f64,
        end: r.window_size.1 as f64,
        step: r.window_size.2 as f64,
    })?;
    let sigmas = axis_f64(r.sigma).ok_or(AlmaError::InvalidRange {
        axis: "sigma",
        start: r.sigma.0,
        end: r.sigma.1,
        step: r.sigma.2,
    })?;
    let points = axis_f64(r.sample_point).ok_or(AlmaError::InvalidRange {
        axis: "sample_point",
        start: r.sample_point.0,
        end: r.sample_point.1,
        step: r.sample_point.2,
    })?;

    let mut out = Vec::with_capacity(windows.len() * sigmas.len() * points.len());
    for &n in &windows {
        for &s in &sigmas {
            for &t in &points {
                let p = AlmaParams::new(n, s, t).clamped();
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
    }
    Ok(out)
}

#[inline]
pub fn alma_batch(data: &[f64], sweep: &AlmaBatchRange) -> Result<AlmaBatchOutput, AlmaError> {
    alma_batch_inner(data, sweep, true)
}

#[inline]
pub fn alma_batch_serial(
    data: &[f64],
    sweep: &AlmaBatchRange,
) -> Result<AlmaBatchOutput, AlmaError> {
    alma_batch_inner(data, sweep, false)
}

fn alma_batch_inner(
    data: &[f64],
    sweep: &AlmaBatchRange,
    parallel: bool,
) -> Result<AlmaBatchOutput, AlmaError> {
    if data.is_empty() {
        return Err(AlmaError::EmptyInputData);
    }
    let first = first_valid_index(data).ok_or(AlmaError::AllValuesNaN)?;
    let combos = expand_grid(sweep)?;

    let rows = combos.len();
    let cols = data.len();
    let weights: Vec<AlmaWeights> = combos.iter().map(AlmaWeights::build).collect();
    let mut values = vec![f64::NAN; rows * cols];

    let do_row = |row: usize, out_row: &mut [f64]| {
        alma_into_slice(data, &weights[row], first, out_row);
    };

    if parallel {
        values
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, slice)| do_row(row, slice));
    } else {
        for (row, slice) in values.chunks_mut(cols).enumerate() {
            do_row(row, slice);
        }
    }

    Ok(AlmaBatchOutput {
        values,
        combos,
        rows,
        cols,
    })
}
