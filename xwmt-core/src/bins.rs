//! Bin edges along the lambda coordinate
//!
//! Transformation rates are histograms over lambda. [`Bins`] holds the bin
//! edges and guarantees they are finite and strictly increasing.
//!
//! ```rust
//! use xwmt_core::bins::Bins;
//!
//! let bins = Bins::new(vec![-1.0, 0.0, 2.0]).unwrap();
//! assert_eq!(bins.len(), 2);
//! assert_eq!(bins.widths().to_vec(), vec![1.0, 2.0]);
//! assert_eq!(bins.centers().to_vec(), vec![-0.5, 1.0]);
//!
//! assert!(Bins::new(vec![0.0, 0.0, 1.0]).is_err());
//! ```

use crate::errors::{XwmtError, XwmtResult};
use crate::field::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Number of evenly spaced edges spanning the percentile range
pub const DEFAULT_PERCENTILE_EDGES: usize = 100;

/// Lower percentile used when deriving bins from a field
pub const DEFAULT_LOWER_PERCENTILE: FloatValue = 0.1;

/// Upper percentile used when deriving bins from a field
pub const DEFAULT_UPPER_PERCENTILE: FloatValue = 99.9;

/// Strictly increasing bin edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FloatValue>", into = "Vec<FloatValue>")]
pub struct Bins {
    edges: Vec<FloatValue>,
}

impl Bins {
    /// Create bins from their edges
    pub fn new(edges: Vec<FloatValue>) -> XwmtResult<Self> {
        if edges.len() < 2 {
            return Err(XwmtError::InvalidBins(format!(
                "at least two edges are required, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(XwmtError::InvalidBins(
                "edges must be finite".to_string(),
            ));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(XwmtError::InvalidBins(
                "edges must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { edges })
    }

    /// Evenly spaced bins of width `delta` whose centres run from `lmin` to `lmax`
    pub fn define(lmin: FloatValue, lmax: FloatValue, delta: FloatValue) -> XwmtResult<Self> {
        if !(delta > 0.0) || !(lmax >= lmin) {
            return Err(XwmtError::InvalidBins(format!(
                "cannot define bins from {lmin} to {lmax} with width {delta}"
            )));
        }
        let n_centers = ((lmax - lmin) / delta).round() as usize + 1;
        let start = lmin - delta / 2.0;
        Self::new(
            (0..=n_centers)
                .map(|k| start + k as FloatValue * delta)
                .collect(),
        )
    }

    /// Derive bins from the distribution of `values`
    ///
    /// Uses [`DEFAULT_PERCENTILE_EDGES`] edges between the 0.1 and 99.9 percentiles,
    /// extended by the minimum and maximum when they lie outside that range.
    /// Non-finite values are ignored.
    pub fn from_percentiles<'a, I>(values: I) -> XwmtResult<Self>
    where
        I: IntoIterator<Item = &'a FloatValue>,
    {
        Self::from_percentiles_with(
            values,
            DEFAULT_LOWER_PERCENTILE,
            DEFAULT_UPPER_PERCENTILE,
            DEFAULT_PERCENTILE_EDGES,
        )
    }

    /// Derive bins from the distribution of `values` using custom percentiles
    pub fn from_percentiles_with<'a, I>(
        values: I,
        lower: FloatValue,
        upper: FloatValue,
        count: usize,
    ) -> XwmtResult<Self>
    where
        I: IntoIterator<Item = &'a FloatValue>,
    {
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper
        {
            return Err(XwmtError::InvalidBins(format!(
                "invalid percentile range {lower}..{upper}"
            )));
        }
        if count < 2 {
            return Err(XwmtError::InvalidBins(format!(
                "at least two edges are required, got {count}"
            )));
        }

        let mut sorted: Vec<FloatValue> = values
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if sorted.is_empty() {
            return Err(XwmtError::InvalidBins(
                "no finite values to derive bins from".to_string(),
            ));
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let vmin = sorted[0];
        let vmax = sorted[sorted.len() - 1];
        let lo = percentile(&sorted, lower);
        let hi = percentile(&sorted, upper);

        if hi <= lo {
            log::debug!("Degenerate lambda distribution at {lo}, using a unit bin");
            let mut edges = vec![lo - 0.5, lo + 0.5];
            if vmin < edges[0] {
                edges.insert(0, vmin);
            }
            if vmax > edges[edges.len() - 1] {
                edges.push(vmax);
            }
            return Self::new(edges);
        }

        let step = (hi - lo) / (count - 1) as FloatValue;
        let mut edges = Vec::with_capacity(count + 2);
        if vmin < lo {
            edges.push(vmin);
        }
        edges.extend((0..count).map(|k| lo + k as FloatValue * step));
        // Pin the last edge so rounding cannot push it past the upper percentile
        if let Some(last) = edges.last_mut() {
            *last = hi;
        }
        if vmax > hi {
            edges.push(vmax);
        }
        edges.dedup_by(|b, a| *b <= *a);
        Self::new(edges)
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edges(&self) -> &[FloatValue] {
        &self.edges
    }

    pub fn first_edge(&self) -> FloatValue {
        self.edges[0]
    }

    pub fn last_edge(&self) -> FloatValue {
        self.edges[self.edges.len() - 1]
    }

    /// Width of each bin
    pub fn widths(&self) -> Array1<FloatValue> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Midpoint of each bin
    pub fn centers(&self) -> Array1<FloatValue> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Index of the bin whose centre is closest to `value`
    ///
    /// Ties resolve to the lower bin.
    pub fn nearest(&self, value: FloatValue) -> usize {
        let centers = self.centers();
        let mut best = 0;
        let mut best_distance = FloatValue::INFINITY;
        for (i, c) in centers.iter().enumerate() {
            let distance = (c - value).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        best
    }
}

impl TryFrom<Vec<FloatValue>> for Bins {
    type Error = XwmtError;

    fn try_from(value: Vec<FloatValue>) -> Result<Self, Self::Error> {
        Bins::new(value)
    }
}

impl From<Bins> for Vec<FloatValue> {
    fn from(value: Bins) -> Self {
        value.edges
    }
}

/// Percentile of sorted data using linear interpolation between closest ranks
fn percentile(sorted: &[FloatValue], q: FloatValue) -> FloatValue {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as FloatValue;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as FloatValue;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
