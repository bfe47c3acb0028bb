//! Memoized thermodynamic coefficients
//!
//! Density-based transformations need the thermal expansion coefficient α,
//! the haline contraction coefficient β and potential density on the model
//! grid. Each is resolved in order from
//!
//! 1. a constant given in the configuration (α and β only),
//! 2. a variable of the same name in the dataset (`alpha`, `beta`, `sigma0`, ...),
//! 3. the equation of state applied to the tracer fields,
//!
//! and is computed at most once per [`Thermodynamics`].
//!
//! The equation of state is always evaluated on the practical salinity and
//! potential temperature of the dataset, so potential density does not depend
//! on the TEOS-10 switch. With TEOS-10 enabled, α and β are taken with respect
//! to conservative temperature and absolute salinity instead (see
//! [`conservative_coefficients`]).

use crate::config::TransformationConfig;
use ndarray::{Array4, Zip};
use std::cell::OnceCell;
use xwmt_core::dataset::Dataset;
use xwmt_core::eos::{
    absolute_salinity_from_practical, conservative_coefficients,
    conservative_temperature_from_potential, pressure_from_depth, EquationOfState, SigmaLevel,
    Unesco1981,
};
use xwmt_core::errors::{XwmtError, XwmtResult};
use xwmt_core::field::{Field, FloatValue, Staggering};
use xwmt_core::taxonomy::Tracer;

/// Salinity and temperature state of the dataset
#[derive(Debug, Clone)]
pub struct StateVariables {
    pub salinity: Field,
    pub temperature: Field,
}

/// Lazily evaluated thermodynamic fields of a dataset
#[derive(Debug)]
pub struct Thermodynamics {
    eos: Box<dyn EquationOfState>,
    teos10: bool,
    alpha_constant: Option<FloatValue>,
    beta_constant: Option<FloatValue>,
    default_latitude: FloatValue,
    salinity_name: String,
    temperature_name: String,
    pressure: OnceCell<Field>,
    state: OnceCell<StateVariables>,
    alpha: OnceCell<Field>,
    beta: OnceCell<Field>,
    density: [OnceCell<Field>; 5],
}

impl Thermodynamics {
    pub fn new(config: &TransformationConfig) -> Self {
        Self {
            eos: Box::new(Unesco1981),
            teos10: config.teos10,
            alpha_constant: config.alpha,
            beta_constant: config.beta,
            default_latitude: config.default_latitude,
            salinity_name: config.taxonomy.scalar(Tracer::Salt).to_string(),
            temperature_name: config.taxonomy.scalar(Tracer::Heat).to_string(),
            pressure: OnceCell::new(),
            state: OnceCell::new(),
            alpha: OnceCell::new(),
            beta: OnceCell::new(),
            density: Default::default(),
        }
    }

    /// Replace the equation of state
    ///
    /// Must be called before any coefficient is evaluated.
    pub fn with_equation_of_state(mut self, eos: Box<dyn EquationOfState>) -> Self {
        self.eos = eos;
        self
    }

    /// Sea pressure (dbar) at layer centres
    pub fn pressure(&self, dataset: &Dataset) -> XwmtResult<&Field> {
        if let Some(p) = self.pressure.get() {
            return Ok(p);
        }
        let lat = dataset.lat();
        if lat.is_none() {
            log::debug!(
                "No latitude in dataset, evaluating pressure at {}°N",
                self.default_latitude
            );
        }
        let lev = dataset.lev();
        let mut data = Array4::zeros(dataset.center_shape());
        for ((_, k, j, i), p) in data.indexed_iter_mut() {
            let latitude = lat.map_or(self.default_latitude, |lat| lat[[j, i]]);
            *p = pressure_from_depth(lev[k], latitude);
        }
        Ok(self.pressure.get_or_init(|| Field::center("p", data)))
    }

    /// Salinity and temperature state variables
    ///
    /// With TEOS-10 enabled these are absolute salinity and conservative
    /// temperature, otherwise the practical salinity and potential temperature
    /// of the dataset.
    pub fn state(&self, dataset: &Dataset) -> XwmtResult<&StateVariables> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }
        let so = centred(dataset, &self.salinity_name)?;
        let thetao = centred(dataset, &self.temperature_name)?;
        let state = if self.teos10 {
            let sa = so.map(absolute_salinity_from_practical).rename("sa");
            let ct = sa
                .zip_with(thetao, conservative_temperature_from_potential)?
                .rename("ct");
            StateVariables {
                salinity: sa,
                temperature: ct,
            }
        } else {
            StateVariables {
                salinity: so.clone(),
                temperature: thetao.clone(),
            }
        };
        Ok(self.state.get_or_init(|| state))
    }

    /// Thermal expansion coefficient (1/K)
    pub fn alpha(&self, dataset: &Dataset) -> XwmtResult<&Field> {
        if let Some(alpha) = self.alpha.get() {
            return Ok(alpha);
        }
        let teos10 = self.teos10;
        let alpha = self.resolve_coefficient(dataset, "alpha", self.alpha_constant, |eos, s, t, p| {
            if teos10 {
                conservative_coefficients(eos, s, t, p).0
            } else {
                eos.alpha(s, t, p)
            }
        })?;
        Ok(self.alpha.get_or_init(|| alpha))
    }

    /// Haline contraction coefficient (kg/g)
    pub fn beta(&self, dataset: &Dataset) -> XwmtResult<&Field> {
        if let Some(beta) = self.beta.get() {
            return Ok(beta);
        }
        let teos10 = self.teos10;
        let beta = self.resolve_coefficient(dataset, "beta", self.beta_constant, |eos, s, t, p| {
            if teos10 {
                conservative_coefficients(eos, s, t, p).1
            } else {
                eos.beta(s, t, p)
            }
        })?;
        Ok(self.beta.get_or_init(|| beta))
    }

    /// Potential density anomaly (kg/m³) referenced to `level`
    pub fn potential_density(&self, dataset: &Dataset, level: SigmaLevel) -> XwmtResult<&Field> {
        let cell = &self.density[level.index()];
        if let Some(sigma) = cell.get() {
            return Ok(sigma);
        }
        let sigma = match dataset.get(level.name()) {
            Some(_) => centred(dataset, level.name())?.clone(),
            None => {
                log::debug!("Computing {} from the equation of state", level);
                let so = centred(dataset, &self.salinity_name)?;
                let thetao = centred(dataset, &self.temperature_name)?;
                let reference = level.pressure();
                so.zip_with(thetao, |s, t| self.eos.potential_density(s, t, reference))?
                    .rename(level.name())
            }
        };
        Ok(cell.get_or_init(|| sigma))
    }

    fn resolve_coefficient<F>(
        &self,
        dataset: &Dataset,
        name: &str,
        constant: Option<FloatValue>,
        f: F,
    ) -> XwmtResult<Field>
    where
        F: Fn(&dyn EquationOfState, FloatValue, FloatValue, FloatValue) -> FloatValue,
    {
        if let Some(value) = constant {
            return Ok(Field::center(
                name,
                Array4::from_elem(dataset.center_shape(), value),
            ));
        }
        if dataset.get(name).is_some() {
            return Ok(centred(dataset, name)?.clone());
        }

        log::debug!("Computing {} from the equation of state", name);
        let so = centred(dataset, &self.salinity_name)?;
        let thetao = centred(dataset, &self.temperature_name)?;
        let pressure = self.pressure(dataset)?;
        let eos = self.eos.as_ref();
        let mut data = Array4::zeros(dataset.center_shape());
        Zip::from(&mut data)
            .and(so.data())
            .and(thetao.data())
            .and(pressure.data())
            .for_each(|out, &s, &t, &p| *out = f(eos, s, t, p));
        Ok(Field::center(name, data))
    }
}

/// Look up a dataset field that must live at layer centres
fn centred<'a>(dataset: &'a Dataset, name: &str) -> XwmtResult<&'a Field> {
    let field = dataset.require(name)?;
    if field.staggering() != Staggering::Center {
        return Err(XwmtError::Error(format!(
            "{} must be located at layer centres, found {:?}",
            name,
            field.staggering()
        )));
    }
    Ok(field)
}
