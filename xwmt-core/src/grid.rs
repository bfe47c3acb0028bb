//! Grid operations along the vertical axis
//!
//! The transformation pipeline only needs a handful of grid capabilities:
//! finite differences and interpolation between layer centres and layer
//! interfaces, a conservative remap from depth onto lambda bins, and the
//! thickness and area metrics. These are collected in the [`GridOps`] trait.
//! [`VerticalGrid`] implements it for a [`Dataset`] whose fields are laid out
//! as `(time, vertical, y, x)`.

use crate::bins::Bins;
use crate::dataset::Dataset;
use crate::errors::{XwmtError, XwmtResult};
use crate::field::{Field, FloatValue, Staggering};
use crate::remap::remap_conservative;
use ndarray::{s, Array2, Array4, Axis, Zip};

/// Name of the layer thickness field looked up in datasets
pub const THICKNESS_NAME: &str = "thkcello";

/// Name of the cell area array looked up in datasets
pub const AREA_NAME: &str = "areacello";

/// How values beyond the first and last layer are treated when interpolating
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Boundary {
    /// Repeat the outermost layer value
    Extend,
    /// Pad with a constant value
    Fill(FloatValue),
}

/// Axes along which a grid metric is defined
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetricAxes {
    /// Layer thickness (metres)
    Z,
    /// Horizontal cell area (square metres)
    XY,
}

/// A grid metric
#[derive(Clone, Debug, PartialEq)]
pub enum Metric {
    Thickness(Field),
    Area(Array2<FloatValue>),
}

/// Grid capabilities consumed by the transformation pipeline
pub trait GridOps {
    /// Difference across each layer, from interface values to layer centres
    ///
    /// The result at layer `k` is `field[k + 1] - field[k]`.
    fn diff(&self, field: &Field) -> XwmtResult<Field>;

    /// Interpolate between layer centres and interfaces
    fn interp(&self, field: &Field, boundary: Boundary) -> XwmtResult<Field>;

    /// Conservatively remap a layer-integrated field onto lambda bins
    ///
    /// `target_data` holds the lambda coordinate at the layer interfaces.
    /// The result is laid out as `(time, bin, y, x)`.
    fn transform(
        &self,
        field: &Field,
        target: &Bins,
        target_data: &Field,
    ) -> XwmtResult<Array4<FloatValue>>;

    /// Metric along the requested axes
    fn get_metric(&self, axes: MetricAxes) -> XwmtResult<Metric>;

    /// Layer thickness at layer centres
    fn thickness(&self) -> XwmtResult<Field> {
        match self.get_metric(MetricAxes::Z)? {
            Metric::Thickness(h) => Ok(h),
            Metric::Area(_) => Err(XwmtError::Error(
                "grid returned an area for the vertical metric".to_string(),
            )),
        }
    }

    /// Horizontal cell area
    fn area(&self) -> XwmtResult<Array2<FloatValue>> {
        match self.get_metric(MetricAxes::XY)? {
            Metric::Area(a) => Ok(a),
            Metric::Thickness(_) => Err(XwmtError::Error(
                "grid returned a thickness for the horizontal metric".to_string(),
            )),
        }
    }
}

/// Vertical grid built from a dataset's coordinates and metrics
///
/// Layer thickness is taken from the `thkcello` field when present, otherwise
/// it is derived from the spacing of `lev_outer` and broadcast over time and
/// the horizontal.
#[derive(Debug, Clone)]
pub struct VerticalGrid {
    thickness: Field,
    area: Option<Array2<FloatValue>>,
}

impl VerticalGrid {
    /// Create the vertical grid of a dataset
    pub fn from_dataset(dataset: &Dataset) -> XwmtResult<Self> {
        let thickness = match dataset.get(THICKNESS_NAME) {
            Some(h) if h.staggering() == Staggering::Center => h.clone(),
            Some(h) => {
                return Err(XwmtError::Error(format!(
                    "{} must be located at layer centres, found {:?}",
                    THICKNESS_NAME,
                    h.staggering()
                )))
            }
            None => {
                log::debug!(
                    "{} not found, deriving layer thickness from lev_outer",
                    THICKNESS_NAME
                );
                let outer = dataset.lev_outer();
                let mut data = Array4::zeros(dataset.center_shape());
                for (k, mut layer) in data.axis_iter_mut(Axis(1)).enumerate() {
                    layer.fill((outer[k + 1] - outer[k]).abs());
                }
                Field::center(THICKNESS_NAME, data)
            }
        };

        Ok(Self {
            thickness,
            area: dataset.horizontal(AREA_NAME).cloned(),
        })
    }

    /// Create a vertical grid from explicit metrics
    pub fn new(thickness: Field, area: Option<Array2<FloatValue>>) -> Self {
        Self { thickness, area }
    }
}

impl GridOps for VerticalGrid {
    fn diff(&self, field: &Field) -> XwmtResult<Field> {
        if field.staggering() != Staggering::Outer {
            return Err(XwmtError::Error(format!(
                "diff expects interface values, {} is {:?}",
                field.name(),
                field.staggering()
            )));
        }
        let data = field.data();
        let nz = field.nz() - 1;
        let upper = data.slice(s![.., 0..nz, .., ..]);
        let lower = data.slice(s![.., 1..nz + 1, .., ..]);
        Ok(Field::center(field.name(), &lower - &upper))
    }

    fn interp(&self, field: &Field, boundary: Boundary) -> XwmtResult<Field> {
        let data = field.data();
        let (nt, nz, ny, nx) = data.dim();
        match field.staggering() {
            Staggering::Center => {
                let mut out = Array4::zeros((nt, nz + 1, ny, nx));
                if nz == 0 {
                    return Ok(Field::outer(field.name(), out));
                }
                let (top, bottom) = match boundary {
                    Boundary::Extend => (
                        data.slice(s![.., 0, .., ..]).to_owned(),
                        data.slice(s![.., nz - 1, .., ..]).to_owned(),
                    ),
                    Boundary::Fill(value) => (
                        data.slice(s![.., 0, .., ..]).mapv(|v| 0.5 * (v + value)),
                        data.slice(s![.., nz - 1, .., ..]).mapv(|v| 0.5 * (v + value)),
                    ),
                };
                out.slice_mut(s![.., 0, .., ..]).assign(&top);
                out.slice_mut(s![.., nz, .., ..]).assign(&bottom);
                let upper = data.slice(s![.., 0..nz - 1, .., ..]);
                let lower = data.slice(s![.., 1..nz, .., ..]);
                Zip::from(out.slice_mut(s![.., 1..nz, .., ..]))
                    .and(&upper)
                    .and(&lower)
                    .for_each(|o, &a, &b| *o = 0.5 * (a + b));
                Ok(Field::outer(field.name(), out))
            }
            Staggering::Outer => {
                let upper = data.slice(s![.., 0..nz - 1, .., ..]);
                let lower = data.slice(s![.., 1..nz, .., ..]);
                let mut out = Array4::zeros((nt, nz - 1, ny, nx));
                Zip::from(&mut out)
                    .and(&upper)
                    .and(&lower)
                    .for_each(|o, &a, &b| *o = 0.5 * (a + b));
                Ok(Field::center(field.name(), out))
            }
            Staggering::Surface => Err(XwmtError::Error(format!(
                "cannot interpolate surface field {} along the vertical",
                field.name()
            ))),
        }
    }

    fn transform(
        &self,
        field: &Field,
        target: &Bins,
        target_data: &Field,
    ) -> XwmtResult<Array4<FloatValue>> {
        let [nt, nz, ny, nx] = field.shape();
        if field.staggering() != Staggering::Center {
            return Err(XwmtError::Error(format!(
                "conservative transform expects layer values, {} is {:?}",
                field.name(),
                field.staggering()
            )));
        }
        let expected = [nt, nz + 1, ny, nx];
        if target_data.shape() != expected || target_data.staggering() != Staggering::Outer {
            return Err(XwmtError::ShapeMismatch {
                name: target_data.name().to_string(),
                expected: expected.to_vec(),
                found: target_data.shape().to_vec(),
            });
        }

        let edges = target.edges();
        let mut out = Array4::zeros((nt, target.len(), ny, nx));
        let mut phi = vec![0.0; nz];
        let mut theta = vec![0.0; nz + 1];
        let mut binned = vec![0.0; target.len()];
        for t in 0..nt {
            for j in 0..ny {
                for i in 0..nx {
                    for (dst, src) in phi.iter_mut().zip(field.data().slice(s![t, .., j, i])) {
                        *dst = *src;
                    }
                    for (dst, src) in theta
                        .iter_mut()
                        .zip(target_data.data().slice(s![t, .., j, i]))
                    {
                        *dst = *src;
                    }
                    remap_conservative(&phi, &theta, edges, &mut binned);
                    for (dst, src) in out.slice_mut(s![t, .., j, i]).iter_mut().zip(&binned) {
                        *dst = *src;
                    }
                }
            }
        }
        Ok(out)
    }

    fn get_metric(&self, axes: MetricAxes) -> XwmtResult<Metric> {
        match axes {
            MetricAxes::Z => Ok(Metric::Thickness(self.thickness.clone())),
            MetricAxes::XY => self
                .area
                .clone()
                .map(Metric::Area)
                .ok_or_else(|| XwmtError::MissingVariable(AREA_NAME.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::{array, Array3};

    fn column_dataset() -> Dataset {
        let time = vec![NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()];
        Dataset::builder(time, array![5.0, 20.0, 45.0], array![0.0, 10.0, 30.0, 60.0])
            .with_field(Field::surface("tos", Array3::zeros((1, 1, 1))))
            .with_horizontal(AREA_NAME, Array2::from_elem((1, 1), 2.0))
            .build()
            .unwrap()
    }

    fn column(name: &str, values: &[FloatValue], staggering: Staggering) -> Field {
        let data = Array4::from_shape_vec((1, values.len(), 1, 1), values.to_vec()).unwrap();
        Field::new(name, staggering, data).unwrap()
    }

    #[test]
    fn thickness_derived_from_interfaces() {
        let grid = VerticalGrid::from_dataset(&column_dataset()).unwrap();
        let h = grid.thickness().unwrap();
        assert_eq!(h.data().iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
        assert_eq!(grid.area().unwrap()[[0, 0]], 2.0);
    }

    #[test]
    fn diff_goes_from_interfaces_to_centres() {
        let grid = VerticalGrid::from_dataset(&column_dataset()).unwrap();
        let flux = column("J", &[4.0, 1.0, 0.5, 0.0], Staggering::Outer);
        let d = grid.diff(&flux).unwrap();
        assert_eq!(d.staggering(), Staggering::Center);
        assert_eq!(d.data().iter().copied().collect::<Vec<_>>(), vec![-3.0, -0.5, -0.5]);

        let centred = column("c", &[1.0, 2.0, 3.0], Staggering::Center);
        assert!(grid.diff(&centred).is_err());
    }

    #[test]
    fn interp_extends_boundaries() {
        let grid = VerticalGrid::from_dataset(&column_dataset()).unwrap();
        let theta = column("thetao", &[10.0, 6.0, 2.0], Staggering::Center);
        let outer = grid.interp(&theta, Boundary::Extend).unwrap();
        assert_eq!(outer.staggering(), Staggering::Outer);
        assert_eq!(outer.name(), "thetao");
        assert_eq!(
            outer.data().iter().copied().collect::<Vec<_>>(),
            vec![10.0, 8.0, 4.0, 2.0]
        );

        let filled = grid.interp(&theta, Boundary::Fill(0.0)).unwrap();
        assert_eq!(
            filled.data().iter().copied().collect::<Vec<_>>(),
            vec![5.0, 8.0, 4.0, 1.0]
        );

        let back = grid.interp(&outer, Boundary::Extend).unwrap();
        assert_eq!(
            back.data().iter().copied().collect::<Vec<_>>(),
            vec![9.0, 6.0, 3.0]
        );
    }

    #[test]
    fn transform_conserves_column_integral() {
        let grid = VerticalGrid::from_dataset(&column_dataset()).unwrap();
        let hlamdot = column("hlamdot", &[1.0, 2.0, 3.0], Staggering::Center);
        let lam = column("thetao", &[10.0, 8.0, 4.0, 2.0], Staggering::Outer);
        let bins = Bins::new(vec![0.0, 5.0, 10.0]).unwrap();
        let out = grid.transform(&hlamdot, &bins, &lam).unwrap();
        assert_eq!(out.dim(), (1, 2, 1, 1));
        assert!((out.sum() - 6.0).abs() < 1e-12);
        // Layer 3 spans 2..4 and layer 2 spans 4..8 of which 4..5 falls in the first bin
        assert!((out[[0, 0, 0, 0]] - (3.0 + 2.0 * 0.25)).abs() < 1e-12);
    }
}
