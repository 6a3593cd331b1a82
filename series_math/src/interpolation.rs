//! Gap filling for evenly spaced series

use crate::{MathError, Result};

/// Result of filling the missing slots of an evenly spaced series
#[derive(Debug, Clone, PartialEq)]
pub struct GapFill {
    /// Complete values, one per slot
    pub values: Vec<f64>,
    /// Slots filled by linear interpolation between two known neighbours
    pub interpolated: usize,
    /// Slots before the first or after the last known value
    pub extended: usize,
}

/// Fill missing slots.
///
/// Interior gaps are linearly interpolated between the known values on either
/// side. Leading and trailing gaps copy the nearest known value outward.
/// Non-finite values count as missing.
pub fn fill_gaps(slots: &[Option<f64>]) -> Result<GapFill> {
    let known: Vec<(usize, f64)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();

    let (first_idx, first_val) = *known
        .first()
        .ok_or_else(|| MathError::InsufficientData("No known values to fill from".to_string()))?;
    let (last_idx, last_val) = *known.last().unwrap_or(&(first_idx, first_val));

    let mut values = vec![0.0; slots.len()];
    let mut interpolated = 0;
    let extended = first_idx + (slots.len() - 1 - last_idx);

    values[..first_idx].fill(first_val);
    values[last_idx..].fill(last_val);

    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        values[i0] = v0;
        let span = (i1 - i0) as f64;
        for (offset, slot) in values[i0 + 1..i1].iter_mut().enumerate() {
            let w = (offset + 1) as f64 / span;
            *slot = v0 + w * (v1 - v0);
            interpolated += 1;
        }
    }

    Ok(GapFill {
        values,
        interpolated,
        extended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_gap_is_linear() {
        let filled = fill_gaps(&[Some(1.0), None, None, Some(4.0)]).unwrap();
        assert_eq!(filled.values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(filled.interpolated, 2);
        assert_eq!(filled.extended, 0);
    }

    #[test]
    fn test_edges_are_extended() {
        let filled = fill_gaps(&[None, Some(5.0), None, Some(7.0), None, None]).unwrap();
        assert_eq!(filled.values, vec![5.0, 5.0, 6.0, 7.0, 7.0, 7.0]);
        assert_eq!(filled.interpolated, 1);
        assert_eq!(filled.extended, 3);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let filled = fill_gaps(&[Some(2.0), Some(f64::NAN), Some(4.0)]).unwrap();
        assert_eq!(filled.values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_single_known_value() {
        let filled = fill_gaps(&[None, Some(3.0), None]).unwrap();
        assert_eq!(filled.values, vec![3.0, 3.0, 3.0]);
        assert_eq!(filled.extended, 2);
    }

    #[test]
    fn test_nothing_known() {
        assert!(fill_gaps(&[None, None]).is_err());
        assert!(fill_gaps(&[]).is_err());
    }
}
