//! Memoized ALMA filters keyed by input stream and effective parameters.
//!
//! Requests are clamped before lookup, so parameters that clamp to the same
//! values share a single filter instance per stream.

use crate::indicators::moving_averages::alma::{AlmaFilter, AlmaParams};
use log::{debug, trace};
use std::collections::HashMap;
use std::hash::Hash;

/// Value-equality key over clamped parameters. Floats compare by bit pattern,
/// which is exact once clamping has removed `NaN` and `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlmaKey<S> {
    pub stream: S,
    pub window_size: usize,
    sigma_bits: u64,
    sample_point_bits: u64,
}

impl<S> AlmaKey<S> {
    pub fn new(stream: S, params: &AlmaParams) -> Self {
        let p = params.clamped();
        Self {
            stream,
            window_size: p.get_window_size(),
            sigma_bits: p.get_sigma().to_bits(),
            sample_point_bits: (p.get_sample_point() + 0.0).to_bits(),
        }
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        f64::from_bits(self.sigma_bits)
    }

    #[inline]
    pub fn sample_point(&self) -> f64 {
        f64::from_bits(self.sample_point_bits)
    }

    #[inline]
    pub fn params(&self) -> AlmaParams {
        AlmaParams::new(self.window_size, self.sigma(), self.sample_point())
    }
}

#[derive(Debug)]
pub struct AlmaRegistry<S> {
    filters: HashMap<AlmaKey<S>, AlmaFilter>,
}

impl<S> Default for AlmaRegistry<S> {
    fn default() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }
}

impl<S> AlmaRegistry<S>
where
    S: Hash + Eq + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the filter for `(stream, params)`, creating it on first use.
    pub fn get_or_insert(&mut self, stream: S, params: AlmaParams) -> &mut AlmaFilter {
        let key = AlmaKey::new(stream, &params);
        if self.filters.contains_key(&key) {
            trace!("alma registry: reusing filter for {:?}", key);
        } else {
            debug!("alma registry: new filter for {:?}", key);
        }
        self.filters
            .entry(key)
            .or_insert_with_key(|k| AlmaFilter::new(k.params()))
    }

    pub fn get(&self, stream: S, params: &AlmaParams) -> Option<&AlmaFilter> {
        self.filters.get(&AlmaKey::new(stream, params))
    }

    pub fn contains(&self, stream: S, params: &AlmaParams) -> bool {
        self.filters.contains_key(&AlmaKey::new(stream, params))
    }

    /// Drops every filter attached to `stream`; returns how many were removed.
    pub fn remove_stream(&mut self, stream: &S) -> usize {
        let before = self.filters.len();
        self.filters.retain(|k, _| &k.stream != stream);
        let removed = before - self.filters.len();
        if removed > 0 {
            debug!("alma registry: dropped {} filter(s) for {:?}", removed, stream);
        }
        removed
    }

    /// Feeds one sample to every filter of `stream`, in unspecified order.
    pub fn update_stream(&mut self, stream: &S, value: f64) -> Vec<(AlmaKey<S>, Option<f64>)> {
        self.filters
            .iter_mut()
            .filter(|(k, _)| &k.stream == stream)
            .map(|(k, f)| (k.clone(), f.update(value)))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }
}
