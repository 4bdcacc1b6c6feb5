/// Output buffer of `len` values whose first `warm` entries are `NaN`.
/// The remainder is zero-filled and expected to be overwritten.
#[inline]
pub fn alloc_with_nan_prefix(len: usize, warm: usize) -> Vec<f64> {
    let warm = warm.min(len);
    let mut out = vec![0.0; len];
    out[..warm].fill(f64::NAN);
    out
}

/// Index of the first non-`NaN` sample.
#[inline]
pub fn first_valid_index(data: &[f64]) -> Option<usize> {
    data.iter().position(|x| !x.is_nan())
}

/// Expands an inclusive `(start, end, step)` axis. A zero step or equal bounds
/// yields the single value `start`; `start > end` with a non-zero step is rejected.
pub fn axis_usize((start, end, step): (usize, usize, usize)) -> Option<Vec<usize>> {
    if step == 0 || start == end {
        return Some(vec![start]);
    }
    if start > end {
        return None;
    }
    Some((start..=end).step_by(step).collect())
}

pub fn axis_f64((start, end, step): (f64, f64, f64)) -> Option<Vec<f64>> {
    if step.abs() < 1e-12 || (start - end).abs() < 1e-12 {
        return Some(vec![start]);
    }
    if start > end || step < 0.0 || !step.is_finite() {
        return None;
    }
    let mut v = Vec::new();
    let mut x = start;
    while x <= end + 1e-12 {
        v.push(x);
        x += step;
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_prefix() {
        let out = alloc_with_nan_prefix(5, 2);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(&out[2..], &[0.0, 0.0, 0.0]);

        let short = alloc_with_nan_prefix(2, 9);
        assert!(short.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_first_valid() {
        assert_eq!(first_valid_index(&[f64::NAN, f64::NAN, 3.0]), Some(2));
        assert_eq!(first_valid_index(&[f64::NAN]), None);
        assert_eq!(first_valid_index(&[]), None);
    }

    #[test]
    fn test_axes() {
        assert_eq!(axis_usize((3, 9, 2)), Some(vec![3, 5, 7, 9]));
        assert_eq!(axis_usize((9, 9, 0)), Some(vec![9]));
        assert_eq!(axis_usize((9, 3, 2)), None);

        let sig = axis_f64((1.0, 2.0, 0.5)).unwrap();
        assert_eq!(sig, vec![1.0, 1.5, 2.0]);
        assert_eq!(axis_f64((0.5, 0.5, 0.0)), Some(vec![0.5]));
        assert_eq!(axis_f64((2.0, 1.0, 0.5)), None);
    }
}
