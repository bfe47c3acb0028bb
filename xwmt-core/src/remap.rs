//! One dimensional conservative remapping
//!
//! Moves an extensive quantity defined on source cells onto target bins. The
//! source cells are bounded by values of the target coordinate at their
//! interfaces, so each cell covers a range `[min(θᵢ, θᵢ₊₁), max(θᵢ, θᵢ₊₁)]`
//! of the target coordinate. The cell's content is shared among the bins it
//! overlaps in proportion to the overlap. A cell whose range has zero width is
//! placed entirely in the bin containing it.
//!
//! Whenever every source range lies within the outer bin edges the sum over
//! the bins equals the sum over the source cells.

use num::Float;

/// Remap `phi` from source cells onto bins bounded by `edges`
///
/// * `phi` - extensive values of the `n` source cells
/// * `theta` - target coordinate at the `n + 1` source interfaces
/// * `edges` - the `m + 1` strictly increasing bin edges
/// * `out` - the `m` remapped values (overwritten)
///
/// NaN values of `phi` contribute nothing. If one interface value is NaN the
/// cell is treated as a zero width cell at the other value; if both are NaN the
/// cell is skipped.
pub fn remap_conservative<T: Float>(phi: &[T], theta: &[T], edges: &[T], out: &mut [T]) {
    assert_eq!(theta.len(), phi.len() + 1, "theta must have one more value than phi");
    assert_eq!(edges.len(), out.len() + 1, "edges must have one more value than out");

    for o in out.iter_mut() {
        *o = T::zero();
    }
    if out.is_empty() {
        return;
    }

    for (i, &value) in phi.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        let (a, b) = (theta[i], theta[i + 1]);
        let (lo, hi) = match (a.is_nan(), b.is_nan()) {
            (true, true) => continue,
            (true, false) => (b, b),
            (false, true) => (a, a),
            (false, false) => (a.min(b), a.max(b)),
        };

        if hi == lo {
            if let Some(j) = locate_bin(edges, lo) {
                out[j] = out[j] + value;
            }
            continue;
        }

        let span = hi - lo;
        for j in 0..out.len() {
            let (left, right) = (edges[j], edges[j + 1]);
            if right <= lo {
                continue;
            }
            if left >= hi {
                break;
            }
            let overlap = hi.min(right) - lo.max(left);
            if overlap > T::zero() {
                out[j] = out[j] + value * overlap / span;
            }
        }
    }
}

fn locate_bin<T: Float>(edges: &[T], value: T) -> Option<usize> {
    let last = edges.len() - 1;
    if !(value >= edges[0] && value <= edges[last]) {
        return None;
    }
    let upper = edges.partition_point(|e| *e <= value);
    Some(upper.saturating_sub(1).min(last - 1))
}
