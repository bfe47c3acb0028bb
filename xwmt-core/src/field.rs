//! Named fields on the ocean model grid
//!
//! Every [`Field`] stores its values in a four dimensional array laid out as
//! `(time, vertical, y, x)`. The [`Staggering`] records where along the
//! vertical axis the values live:
//!
//! - [`Staggering::Center`]: layer (cell) centres, `nz` levels (`lev`)
//! - [`Staggering::Outer`]: layer interfaces, `nz + 1` levels (`lev_outer`)
//! - [`Staggering::Surface`]: no vertical dimension, stored with a single level
//!
//! # Examples
//!
//! ```rust
//! use ndarray::Array4;
//! use xwmt_core::field::{Field, Staggering};
//!
//! let theta = Field::center("thetao", Array4::from_elem((2, 3, 1, 1), 10.0));
//! assert_eq!(theta.staggering(), Staggering::Center);
//! assert_eq!(theta.nz(), 3);
//!
//! let warmer = theta.map(|t| t + 1.0).rename("thetao_plus_one");
//! assert_eq!(warmer.data()[[0, 0, 0, 0]], 11.0);
//! ```

use crate::errors::{XwmtError, XwmtResult};
use ndarray::{Array3, Array4, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Floating point type used for all field values
pub type FloatValue = f64;

/// Vertical position of the values held by a field
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Staggering {
    /// Layer centres (`lev`)
    Center,
    /// Layer interfaces (`lev_outer`)
    Outer,
    /// Surface field without a vertical dimension
    Surface,
}

impl Staggering {
    /// Whether fields with this staggering have a vertical dimension
    pub fn has_vertical(&self) -> bool {
        !matches!(self, Staggering::Surface)
    }
}

/// A named `(time, vertical, y, x)` array
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    staggering: Staggering,
    data: Array4<FloatValue>,
}

impl Field {
    /// Create a new field
    ///
    /// Surface fields must have a vertical extent of exactly one level.
    pub fn new(
        name: &str,
        staggering: Staggering,
        data: Array4<FloatValue>,
    ) -> XwmtResult<Self> {
        if staggering == Staggering::Surface && data.len_of(Axis(1)) != 1 {
            let shape = data.shape();
            return Err(XwmtError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![shape[0], 1, shape[2], shape[3]],
                found: shape.to_vec(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            staggering,
            data,
        })
    }

    /// Create a field located at layer centres
    pub fn center(name: &str, data: Array4<FloatValue>) -> Self {
        Self {
            name: name.to_string(),
            staggering: Staggering::Center,
            data,
        }
    }

    /// Create a field located at layer interfaces
    pub fn outer(name: &str, data: Array4<FloatValue>) -> Self {
        Self {
            name: name.to_string(),
            staggering: Staggering::Outer,
            data,
        }
    }

    /// Create a surface field from a `(time, y, x)` array
    pub fn surface(name: &str, data: Array3<FloatValue>) -> Self {
        Self {
            name: name.to_string(),
            staggering: Staggering::Surface,
            data: data.insert_axis(Axis(1)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn staggering(&self) -> Staggering {
        self.staggering
    }

    pub fn has_vertical(&self) -> bool {
        self.staggering.has_vertical()
    }

    pub fn data(&self) -> &Array4<FloatValue> {
        &self.data
    }

    pub fn into_data(self) -> Array4<FloatValue> {
        self.data
    }

    /// Shape as `[time, vertical, y, x]`
    pub fn shape(&self) -> [usize; 4] {
        let (nt, nz, ny, nx) = self.data.dim();
        [nt, nz, ny, nx]
    }

    pub fn nt(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of vertical levels (1 for surface fields)
    pub fn nz(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// View of a surface field without its vertical axis
    pub fn surface_view(&self) -> XwmtResult<ArrayView3<'_, FloatValue>> {
        if self.staggering != Staggering::Surface {
            return Err(XwmtError::Error(format!(
                "{} is not a surface field",
                self.name
            )));
        }
        Ok(self.data.index_axis(Axis(1), 0))
    }

    /// Return the same field under a different name
    pub fn rename(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Apply `f` to every value
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(FloatValue) -> FloatValue,
    {
        Self {
            name: self.name.clone(),
            staggering: self.staggering,
            data: self.data.mapv(f),
        }
    }

    /// Multiply every value by a constant
    pub fn scale(&self, factor: FloatValue) -> Self {
        self.map(|v| v * factor)
    }

    /// Combine two fields of identical shape and staggering element by element
    ///
    /// The result keeps the name and staggering of `self`.
    pub fn zip_with<F>(&self, other: &Field, f: F) -> XwmtResult<Self>
    where
        F: Fn(FloatValue, FloatValue) -> FloatValue,
    {
        self.check_compatible(other)?;
        let mut data = self.data.clone();
        Zip::from(&mut data)
            .and(&other.data)
            .for_each(|a, &b| *a = f(*a, b));
        Ok(Self {
            name: self.name.clone(),
            staggering: self.staggering,
            data,
        })
    }

    /// Element-wise sum
    pub fn add(&self, other: &Field) -> XwmtResult<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise product
    pub fn mul(&self, other: &Field) -> XwmtResult<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise difference
    pub fn sub(&self, other: &Field) -> XwmtResult<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    fn check_compatible(&self, other: &Field) -> XwmtResult<()> {
        if self.shape() != other.shape() || self.staggering != other.staggering {
            return Err(XwmtError::ShapeMismatch {
                name: format!("{} ({:?}) and {}", self.name, self.staggering, other.name),
                expected: self.shape().to_vec(),
                found: other.shape().to_vec(),
            });
        }
        Ok(())
    }
}
