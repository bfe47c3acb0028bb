//! Time-mean transformation across lambda isosurfaces
//!
//! Bins of width `dl` are centred on the requested lambda values, the
//! transformation is evaluated on them and the bin nearest to each value is
//! averaged over time. Time steps are weighted by their length in days, taken
//! from the calendar or from the time bounds of the dataset (see
//! [`time_weights`]). When neither determines the lengths no mean is formed.

use crate::aggregate::{integrate_transformations, map_transformations, AggregateOptions};
use crate::output::Transformation;
use crate::transformation::WaterMassTransformations;
use chrono::NaiveDateTime;
use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use serde::{Deserialize, Serialize};
use xwmt_core::bins::Bins;
use xwmt_core::calendar::time_weights;
use xwmt_core::errors::{XwmtError, XwmtResult};
use xwmt_core::field::FloatValue;
use xwmt_core::taxonomy::{Lambda, Process};

/// Options of an isosurface mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsosurfaceOptions {
    /// Width of the lambda bins.
    /// Default: 0.1
    pub dl: FloatValue,

    /// First time included (inclusive)
    pub start: Option<NaiveDateTime>,

    /// End of the averaging period (exclusive)
    pub end: Option<NaiveDateTime>,

    /// Grouping of the results
    pub aggregate: AggregateOptions,
}

impl Default for IsosurfaceOptions {
    fn default() -> Self {
        Self {
            dl: 0.1,
            start: None,
            end: None,
            aggregate: AggregateOptions::default(),
        }
    }
}

/// Time-mean transformation of one result at the requested lambda values
#[derive(Debug, Clone, PartialEq)]
pub struct IsosurfaceMean {
    pub name: String,
    /// Name of the lambda coordinate
    pub coord: String,
    /// Requested lambda values
    pub values: Vec<FloatValue>,
    /// Mean with axes `[value, ...]`
    pub data: ArrayD<FloatValue>,
}

/// Time-mean area-integrated transformation at lambda `values`
///
/// Each entry of the result has shape `[values.len()]`.
pub fn isosurface_mean(
    wmt: &WaterMassTransformations,
    lambda: Lambda,
    process: Option<Process>,
    values: &[FloatValue],
    options: &IsosurfaceOptions,
) -> XwmtResult<Option<Vec<IsosurfaceMean>>> {
    let bins = isosurface_bins(values, options.dl)?;
    let result = integrate_transformations(wmt, lambda, process, Some(&bins), options.aggregate)?;
    time_mean(wmt, result, values, options)
}

/// Time-mean transformation map at lambda `values`
///
/// Each entry of the result has shape `[values.len(), y, x]`.
pub fn isosurface_mean_map(
    wmt: &WaterMassTransformations,
    lambda: Lambda,
    process: Option<Process>,
    values: &[FloatValue],
    options: &IsosurfaceOptions,
) -> XwmtResult<Option<Vec<IsosurfaceMean>>> {
    let bins = isosurface_bins(values, options.dl)?;
    let result = map_transformations(wmt, lambda, process, Some(&bins), options.aggregate)?;
    time_mean(wmt, result, values, options)
}

/// Bins of width `dl` centred from `min(values) - dl` to `max(values) + dl`
pub fn isosurface_bins(values: &[FloatValue], dl: FloatValue) -> XwmtResult<Bins> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return Err(XwmtError::InvalidConfig(
            "isosurface values must be finite and non-empty".to_string(),
        ));
    }
    let lmin = values.iter().copied().fold(FloatValue::INFINITY, FloatValue::min);
    let lmax = values.iter().copied().fold(FloatValue::NEG_INFINITY, FloatValue::max);
    Bins::define(lmin - dl, lmax + dl, dl)
}

fn time_mean(
    wmt: &WaterMassTransformations,
    result: Option<Transformation>,
    values: &[FloatValue],
    options: &IsosurfaceOptions,
) -> XwmtResult<Option<Vec<IsosurfaceMean>>> {
    let Some(result) = result else {
        return Ok(None);
    };
    let Some(weights) = time_weights(wmt.dataset()) else {
        return Ok(None);
    };
    let indices = wmt.dataset().time_indices(options.start, options.end);
    if indices.is_empty() {
        log::warn!(
            "No time steps between {:?} and {:?}",
            options.start,
            options.end
        );
        return Ok(None);
    }

    let mut means = Vec::new();
    for field in result.into_set() {
        let per_value: Vec<ArrayD<FloatValue>> = values
            .iter()
            .map(|v| weighted_mean(field.select_nearest(*v).view(), &indices, &weights))
            .collect();
        let views: Vec<ArrayViewD<FloatValue>> = per_value.iter().map(|a| a.view()).collect();
        let data = ndarray::stack(Axis(0), &views).map_err(|e| XwmtError::Error(e.to_string()))?;
        means.push(IsosurfaceMean {
            name: field.name().to_string(),
            coord: field.coord().to_string(),
            values: values.to_vec(),
            data,
        });
    }
    Ok(Some(means))
}

/// Weighted mean over the selected time steps of a `[time, ...]` array
///
/// NaN values do not contribute to the weighted sum.
fn weighted_mean(
    data: ArrayViewD<FloatValue>,
    indices: &[usize],
    weights: &[FloatValue],
) -> ArrayD<FloatValue> {
    let mut total = ArrayD::zeros(data.index_axis(Axis(0), 0).raw_dim());
    let mut weight_sum = 0.0;
    for &i in indices {
        let w = weights[i];
        weight_sum += w;
        Zip::from(&mut total)
            .and(&data.index_axis(Axis(0), i))
            .for_each(|acc, &x| {
                if !x.is_nan() {
                    *acc += w * x;
                }
            });
    }
    total.mapv_inplace(|v| v / weight_sum);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn bins_are_centred_on_values() {
        let bins = isosurface_bins(&[5.0, 5.3], 0.1).unwrap();
        assert_eq!(bins.len(), 6);
        assert_relative_eq!(bins.centers()[bins.nearest(5.0)], 5.0, epsilon = 1e-9);
        assert_relative_eq!(bins.centers()[bins.nearest(5.3)], 5.3, epsilon = 1e-9);
        assert!(isosurface_bins(&[], 0.1).is_err());
        assert!(isosurface_bins(&[1.0], 0.0).is_err());
    }

    #[test]
    fn options_fill_defaults() {
        let options: IsosurfaceOptions =
            serde_json::from_str(r#"{"start": "2001-03-01T00:00:00", "aggregate": {"group_processes": true}}"#)
                .unwrap();
        assert_eq!(options.dl, 0.1);
        assert_eq!(options.start.unwrap().to_string(), "2001-03-01 00:00:00");
        assert!(options.end.is_none());
        assert!(options.aggregate.sum_components);
        assert!(options.aggregate.group_processes);
    }

    #[test]
    fn weighted_mean_uses_selected_steps() {
        let data = array![[1.0, 10.0], [4.0, FloatValue::NAN], [100.0, 100.0]].into_dyn();
        let mean = weighted_mean(data.view(), &[0, 1], &[28.0, 31.0, 30.0]);
        assert_relative_eq!(mean[[0]], (28.0 * 1.0 + 31.0 * 4.0) / 59.0);
        assert_relative_eq!(mean[[1]], 28.0 * 10.0 / 59.0);
    }
}
