//! Collections of fields sharing the model's coordinate axes
//!
//! A [`Dataset`] is built once through a [`DatasetBuilder`], which checks that
//! every field and horizontal array agrees with the coordinates. After that it
//! is read-only: transformations take their own copy and never modify it.

use crate::errors::{XwmtError, XwmtResult};
use crate::field::{Field, FloatValue, Staggering};
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Interval bounds of a single time step, `[start, end)`
pub type TimeBounds = (NaiveDateTime, NaiveDateTime);

/// In-memory dataset of ocean model output
#[derive(Debug, Clone)]
pub struct Dataset {
    time: Vec<NaiveDateTime>,
    time_attrs: BTreeMap<String, String>,
    time_bounds: BTreeMap<String, Vec<TimeBounds>>,
    lev: Array1<FloatValue>,
    lev_outer: Array1<FloatValue>,
    lat: Option<Array2<FloatValue>>,
    lon: Option<Array2<FloatValue>>,
    variables: BTreeMap<String, Field>,
    horizontal: BTreeMap<String, Array2<FloatValue>>,
    ny: usize,
    nx: usize,
}

impl Dataset {
    /// Start building a dataset from its time and vertical coordinates
    ///
    /// `lev` holds layer-centre depths and `lev_outer` the interface depths
    /// (positive downward, metres).
    pub fn builder(
        time: Vec<NaiveDateTime>,
        lev: Array1<FloatValue>,
        lev_outer: Array1<FloatValue>,
    ) -> DatasetBuilder {
        DatasetBuilder {
            time,
            lev,
            lev_outer,
            time_attrs: BTreeMap::new(),
            time_bounds: BTreeMap::new(),
            lat: None,
            lon: None,
            fields: Vec::new(),
            horizontal: Vec::new(),
        }
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.variables.get(name)
    }

    /// Look up a field that must be present
    pub fn require(&self, name: &str) -> XwmtResult<&Field> {
        self.get(name)
            .ok_or_else(|| XwmtError::MissingVariable(name.to_string()))
    }

    /// Test if the dataset contains a field or horizontal array with the given name
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.horizontal.contains_key(name)
    }

    /// Look up a `(y, x)` array such as the cell area
    pub fn horizontal(&self, name: &str) -> Option<&Array2<FloatValue>> {
        self.horizontal.get(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_str())
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    /// Attributes attached to the time coordinate (e.g. `calendar_type`)
    pub fn time_attrs(&self) -> &BTreeMap<String, String> {
        &self.time_attrs
    }

    /// Time bounds stored under `name` (e.g. `time_bounds` or `time_bnds`)
    pub fn time_bounds(&self, name: &str) -> Option<&[TimeBounds]> {
        self.time_bounds.get(name).map(|b| b.as_slice())
    }

    pub fn lev(&self) -> &Array1<FloatValue> {
        &self.lev
    }

    pub fn lev_outer(&self) -> &Array1<FloatValue> {
        &self.lev_outer
    }

    pub fn lat(&self) -> Option<&Array2<FloatValue>> {
        self.lat.as_ref()
    }

    pub fn lon(&self) -> Option<&Array2<FloatValue>> {
        self.lon.as_ref()
    }

    pub fn nt(&self) -> usize {
        self.time.len()
    }

    pub fn nz(&self) -> usize {
        self.lev.len()
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Shape of a centre-staggered field in this dataset
    pub fn center_shape(&self) -> (usize, usize, usize, usize) {
        (self.nt(), self.nz(), self.ny, self.nx)
    }

    /// Shape of an interface-staggered field in this dataset
    pub fn outer_shape(&self) -> (usize, usize, usize, usize) {
        (self.nt(), self.nz() + 1, self.ny, self.nx)
    }

    /// Indices of the time steps falling within `[start, end)`
    ///
    /// Missing limits are unbounded.
    pub fn time_indices(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Vec<usize> {
        self.time
            .iter()
            .enumerate()
            .filter(|(_, t)| start.map_or(true, |s| **t >= s) && end.map_or(true, |e| **t < e))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Builder for [`Dataset`]
#[derive(Debug)]
pub struct DatasetBuilder {
    time: Vec<NaiveDateTime>,
    lev: Array1<FloatValue>,
    lev_outer: Array1<FloatValue>,
    time_attrs: BTreeMap<String, String>,
    time_bounds: BTreeMap<String, Vec<TimeBounds>>,
    lat: Option<Array2<FloatValue>>,
    lon: Option<Array2<FloatValue>>,
    fields: Vec<Field>,
    horizontal: Vec<(String, Array2<FloatValue>)>,
}

impl DatasetBuilder {
    /// Add a field
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a `(y, x)` array such as `areacello`
    pub fn with_horizontal(mut self, name: &str, values: Array2<FloatValue>) -> Self {
        self.horizontal.push((name.to_string(), values));
        self
    }

    /// Set the geographic coordinates of the cell centres (degrees)
    pub fn with_lat_lon(mut self, lat: Array2<FloatValue>, lon: Array2<FloatValue>) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// Attach an attribute to the time coordinate
    pub fn with_time_attr(mut self, key: &str, value: &str) -> Self {
        self.time_attrs.insert(key.to_string(), value.to_string());
        self
    }

    /// Attach time bounds under the given name
    pub fn with_time_bounds(mut self, name: &str, bounds: Vec<TimeBounds>) -> Self {
        self.time_bounds.insert(name.to_string(), bounds);
        self
    }

    /// Validate the shapes and build the dataset
    pub fn build(self) -> XwmtResult<Dataset> {
        let nt = self.time.len();
        let nz = self.lev.len();
        if self.lev_outer.len() != nz + 1 {
            return Err(XwmtError::ShapeMismatch {
                name: "lev_outer".to_string(),
                expected: vec![nz + 1],
                found: vec![self.lev_outer.len()],
            });
        }

        let (ny, nx) = self
            .lat
            .as_ref()
            .map(|lat| lat.dim())
            .or_else(|| self.horizontal.first().map(|(_, v)| v.dim()))
            .or_else(|| self.fields.first().map(|f| (f.shape()[2], f.shape()[3])))
            .unwrap_or((0, 0));

        let mut horizontal_arrays: Vec<(&str, &Array2<FloatValue>)> = Vec::new();
        if let Some(lat) = &self.lat {
            horizontal_arrays.push(("lat", lat));
        }
        if let Some(lon) = &self.lon {
            horizontal_arrays.push(("lon", lon));
        }
        for (name, values) in self.horizontal.iter() {
            horizontal_arrays.push((name.as_str(), values));
        }
        for (name, values) in horizontal_arrays {
            if values.dim() != (ny, nx) {
                return Err(XwmtError::ShapeMismatch {
                    name: name.to_string(),
                    expected: vec![ny, nx],
                    found: values.shape().to_vec(),
                });
            }
        }

        for (name, bounds) in self.time_bounds.iter() {
            if bounds.len() != nt {
                return Err(XwmtError::ShapeMismatch {
                    name: name.clone(),
                    expected: vec![nt, 2],
                    found: vec![bounds.len(), 2],
                });
            }
        }

        let mut variables = BTreeMap::new();
        for field in self.fields {
            let levels = match field.staggering() {
                Staggering::Center => nz,
                Staggering::Outer => nz + 1,
                Staggering::Surface => 1,
            };
            let expected = [nt, levels, ny, nx];
            if field.shape() != expected {
                return Err(XwmtError::ShapeMismatch {
                    name: field.name().to_string(),
                    expected: expected.to_vec(),
                    found: field.shape().to_vec(),
                });
            }
            variables.insert(field.name().to_string(), field);
        }

        Ok(Dataset {
            time: self.time,
            time_attrs: self.time_attrs,
            time_bounds: self.time_bounds,
            lev: self.lev,
            lev_outer: self.lev_outer,
            lat: self.lat,
            lon: self.lon,
            variables,
            horizontal: self.horizontal.into_iter().collect(),
            ny,
            nx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::{array, Array3, Array4};

    fn month(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, m, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn build_validates_field_shapes() {
        let result = Dataset::builder(vec![month(1)], array![5.0, 15.0], array![0.0, 10.0, 20.0])
            .with_field(Field::center("thetao", Array4::zeros((1, 3, 1, 1))))
            .build();
        assert!(matches!(result, Err(XwmtError::ShapeMismatch { .. })));
    }

    #[test]
    fn build_rejects_inconsistent_interfaces() {
        let result = Dataset::builder(vec![month(1)], array![5.0, 15.0], array![0.0, 10.0])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn lookup_and_time_range() {
        let ds = Dataset::builder(
            vec![month(1), month(2), month(3)],
            array![5.0],
            array![0.0, 10.0],
        )
        .with_field(Field::surface("tos", Array3::zeros((3, 2, 2))))
        .with_horizontal("areacello", Array2::ones((2, 2)))
        .build()
        .unwrap();

        assert!(ds.contains("tos"));
        assert!(ds.contains("areacello"));
        assert!(ds.get("thetao").is_none());
        assert!(matches!(
            ds.require("thetao"),
            Err(XwmtError::MissingVariable(_))
        ));
        assert_eq!((ds.ny(), ds.nx()), (2, 2));
        assert_eq!(ds.time_indices(Some(month(2)), None), vec![1, 2]);
        assert_eq!(ds.time_indices(None, Some(month(3))), vec![0, 1]);
    }
}
