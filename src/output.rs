//! Containers for transformation results
//!
//! A [`BinnedField`] is a transformation rate on lambda bins with axes
//! `[time, lambda, ...]`: the trailing axes are `(y, x)` for spatial maps and
//! absent once integrated over area. Results for several processes or
//! components are gathered in a [`TransformationSet`].

use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};
use std::collections::BTreeMap;
use xwmt_core::bins::Bins;
use xwmt_core::errors::{XwmtError, XwmtResult};
use xwmt_core::field::FloatValue;

/// Transformation rate binned along a lambda coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedField {
    name: String,
    coord: String,
    bins: Bins,
    data: ArrayD<FloatValue>,
}

impl BinnedField {
    /// Create a binned field
    ///
    /// `data` must have at least two axes and as many entries along the
    /// second axis as there are bins.
    pub fn new(name: &str, coord: &str, bins: Bins, data: ArrayD<FloatValue>) -> XwmtResult<Self> {
        if data.ndim() < 2 || data.len_of(Axis(1)) != bins.len() {
            let mut expected = data.shape().to_vec();
            expected.resize(expected.len().max(2), 0);
            expected[1] = bins.len();
            return Err(XwmtError::ShapeMismatch {
                name: name.to_string(),
                expected,
                found: data.shape().to_vec(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            coord: coord.to_string(),
            bins,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the lambda coordinate
    pub fn coord(&self) -> &str {
        &self.coord
    }

    pub fn bins(&self) -> &Bins {
        &self.bins
    }

    pub fn data(&self) -> &ArrayD<FloatValue> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<FloatValue> {
        self.data
    }

    /// Number of time steps
    pub fn nt(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rename(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Values at the bin whose centre is nearest to `value`, with axes `[time, ...]`
    pub fn select_nearest(&self, value: FloatValue) -> ArrayD<FloatValue> {
        let index = self.bins.nearest(value);
        self.data.index_axis(Axis(1), index).to_owned()
    }

    /// Element-wise sum with a field on the same bins
    pub fn add(&self, other: &BinnedField) -> XwmtResult<Self> {
        if self.bins != other.bins || self.data.shape() != other.data.shape() {
            return Err(XwmtError::ShapeMismatch {
                name: format!("{} and {}", self.name, other.name),
                expected: self.data.shape().to_vec(),
                found: other.data.shape().to_vec(),
            });
        }
        Ok(Self {
            name: self.name.clone(),
            coord: self.coord.clone(),
            bins: self.bins.clone(),
            data: &self.data + &other.data,
        })
    }

    /// Multiply by the cell area and sum over the horizontal, skipping NaN
    ///
    /// Turns a `[time, lambda, y, x]` field into a `[time, lambda]` field.
    pub fn integrate_area(&self, area: &Array2<FloatValue>) -> XwmtResult<Self> {
        if self.data.ndim() != 4 || self.data.shape()[2..] != *area.shape() {
            let mut expected = self.data.shape()[..2.min(self.data.ndim())].to_vec();
            expected.extend_from_slice(area.shape());
            return Err(XwmtError::ShapeMismatch {
                name: self.name.clone(),
                expected,
                found: self.data.shape().to_vec(),
            });
        }
        let (nt, nbins) = (self.data.shape()[0], self.data.shape()[1]);
        let mut out = ArrayD::zeros(IxDyn(&[nt, nbins]));
        for t in 0..nt {
            for b in 0..nbins {
                let map = self
                    .data
                    .index_axis(Axis(0), t)
                    .index_axis_move(Axis(0), b)
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| XwmtError::Error(e.to_string()))?;
                out[[t, b]] = map
                    .iter()
                    .zip(area.iter())
                    .map(|(v, a)| v * a)
                    .filter(|v| !v.is_nan())
                    .sum();
            }
        }
        Ok(Self {
            name: self.name.clone(),
            coord: self.coord.clone(),
            bins: self.bins.clone(),
            data: out,
        })
    }
}

/// Named transformation results, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformationSet {
    fields: BTreeMap<String, BinnedField>,
}

impl TransformationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field under its own name, replacing any previous entry
    pub fn insert(&mut self, field: BinnedField) -> Option<BinnedField> {
        self.fields.insert(field.name().to_string(), field)
    }

    pub fn get(&self, name: &str) -> Option<&BinnedField> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<BinnedField> {
        self.fields.remove(name)
    }

    /// Remove and return the first entry by name
    pub fn pop_first(&mut self) -> Option<BinnedField> {
        self.fields.pop_first().map(|(_, field)| field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BinnedField> {
        self.fields.values()
    }

    /// Add all entries of `other`, replacing entries with the same name
    pub fn merge(&mut self, other: TransformationSet) {
        self.fields.extend(other.fields);
    }

    /// Apply `f` to every field
    pub fn try_map<F>(&self, f: F) -> XwmtResult<Self>
    where
        F: Fn(&BinnedField) -> XwmtResult<BinnedField>,
    {
        let mut out = Self::new();
        for field in self.iter() {
            out.insert(f(field)?);
        }
        Ok(out)
    }
}

impl FromIterator<BinnedField> for TransformationSet {
    fn from_iter<T: IntoIterator<Item = BinnedField>>(iter: T) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl IntoIterator for TransformationSet {
    type Item = BinnedField;
    type IntoIter = std::collections::btree_map::IntoValues<String, BinnedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_values()
    }
}

/// A single transformation or a named collection of them
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    Field(BinnedField),
    Set(TransformationSet),
}

impl Transformation {
    /// Wrap a set, unwrapping it when it holds a single field
    pub fn collapse(mut set: TransformationSet) -> Self {
        if set.len() == 1 {
            if let Some(field) = set.pop_first() {
                return Transformation::Field(field);
            }
        }
        Transformation::Set(set)
    }

    pub fn as_field(&self) -> Option<&BinnedField> {
        match self {
            Transformation::Field(f) => Some(f),
            Transformation::Set(_) => None,
        }
    }

    pub fn as_set(&self) -> Option<&TransformationSet> {
        match self {
            Transformation::Set(s) => Some(s),
            Transformation::Field(_) => None,
        }
    }

    /// Look up a result by name
    pub fn get(&self, name: &str) -> Option<&BinnedField> {
        match self {
            Transformation::Field(f) if f.name() == name => Some(f),
            Transformation::Field(_) => None,
            Transformation::Set(s) => s.get(name),
        }
    }

    /// All results as a set
    pub fn into_set(self) -> TransformationSet {
        match self {
            Transformation::Field(f) => std::iter::once(f).collect(),
            Transformation::Set(s) => s,
        }
    }
}
