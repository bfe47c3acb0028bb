//! Seawater thermodynamics
//!
//! Provides the thermodynamic functions needed to express heat and salt
//! tendencies as density tendencies:
//!
//! - pressure from depth and latitude
//! - absolute salinity and conservative temperature (TEOS-10 state variables)
//! - in-situ and potential density, thermal expansion and haline contraction
//!   coefficients through the [`EquationOfState`] trait
//!
//! The default equation of state, [`Unesco1981`], is the UNESCO EOS-80
//! formulation: the one-atmosphere density of Millero & Poisson (1981) with
//! the secant bulk modulus of Millero et al. (1980), the adiabatic lapse rate
//! of Bryden (1973) and the potential temperature integration of Fofonoff (1977).
//!
//! # Units
//!
//! - Salinity: practical salinity (PSS-78) or absolute salinity (g/kg)
//! - Temperature: °C
//! - Pressure: dbar (sea pressure, zero at the surface)
//! - Density: kg/m³
//!
//! # Examples
//!
//! ```rust
//! use xwmt_core::eos::{EquationOfState, SigmaLevel, Unesco1981};
//!
//! let eos = Unesco1981;
//! // UNESCO check value
//! let rho = eos.density(35.0, 5.0, 0.0);
//! assert!((rho - 1027.67547).abs() < 1e-5);
//!
//! let sigma2 = eos.potential_density(35.0, 5.0, SigmaLevel::Sigma2.pressure());
//! assert!(sigma2 > 35.0 && sigma2 < 38.0);
//! ```

use crate::errors::{XwmtError, XwmtResult};
use crate::field::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard Ocean Reference Salinity (g/kg)
pub const SSO: FloatValue = 35.16504;

/// Ratio of reference-composition absolute salinity to practical salinity (g/kg)
pub const UPS: FloatValue = SSO / 35.0;

/// Heat capacity used to define conservative temperature (J/kg/K)
pub const CP0: FloatValue = 3991.867_957_119_63;

/// Temperature step used for finite-difference derivatives (°C)
const TEMPERATURE_STEP: FloatValue = 1e-3;

/// Salinity step used for finite-difference derivatives
const SALINITY_STEP: FloatValue = 1e-3;

/// Reference pressures of the potential density variants
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigmaLevel {
    /// Referenced to the surface (0 dbar)
    Sigma0,
    /// Referenced to 1000 dbar
    Sigma1,
    /// Referenced to 2000 dbar
    Sigma2,
    /// Referenced to 3000 dbar
    Sigma3,
    /// Referenced to 4000 dbar
    Sigma4,
}

impl SigmaLevel {
    pub const ALL: [SigmaLevel; 5] = [
        SigmaLevel::Sigma0,
        SigmaLevel::Sigma1,
        SigmaLevel::Sigma2,
        SigmaLevel::Sigma3,
        SigmaLevel::Sigma4,
    ];

    /// Reference pressure (dbar)
    pub fn pressure(&self) -> FloatValue {
        self.index() as FloatValue * 1000.0
    }

    /// Position within [`SigmaLevel::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            SigmaLevel::Sigma0 => "sigma0",
            SigmaLevel::Sigma1 => "sigma1",
            SigmaLevel::Sigma2 => "sigma2",
            SigmaLevel::Sigma3 => "sigma3",
            SigmaLevel::Sigma4 => "sigma4",
        }
    }
}

impl fmt::Display for SigmaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SigmaLevel {
    type Err = XwmtError;

    fn from_str(s: &str) -> XwmtResult<Self> {
        SigmaLevel::ALL
            .into_iter()
            .find(|level| level.name() == s)
            .ok_or_else(|| XwmtError::UnsupportedReferencePressure(s.to_string()))
    }
}

/// Sea pressure (dbar) at `depth` metres below the surface
///
/// Saunders (1981), as used by the UNESCO algorithms.
pub fn pressure_from_depth(depth: FloatValue, latitude: FloatValue) -> FloatValue {
    let x = latitude.to_radians().sin().powi(2);
    let c1 = (5.92 + 5.25 * x) * 1e-3;
    ((1.0 - c1) - ((1.0 - c1).powi(2) - 8.84e-6 * depth).sqrt()) / 4.42e-6
}

/// Reference-composition absolute salinity (g/kg) from practical salinity
///
/// The regional salinity anomaly is not applied.
pub fn absolute_salinity_from_practical(practical_salinity: FloatValue) -> FloatValue {
    UPS * practical_salinity
}

/// Conservative temperature (°C) from absolute salinity and potential temperature
///
/// Potential enthalpy polynomial of TEOS-10 (IOC et al., 2010) divided by [`CP0`].
pub fn conservative_temperature_from_potential(
    absolute_salinity: FloatValue,
    potential_temperature: FloatValue,
) -> FloatValue {
    let sfac = 0.024_882_667_558_461_5;
    let x2 = sfac * absolute_salinity.max(0.0);
    let x = x2.sqrt();
    let y = potential_temperature * 0.025;

    let pot_enthalpy = 61.013_624_206_810_71
        + y * (168_776.461_380_480_15
            + y * (-2_735.278_560_511_962_5
                + y * (2_574.216_445_382_143_3
                    + y * (-1_536.664_443_497_754_3
                        + y * (545.734_049_793_162_9
                            + (-50.910_917_284_743_31 - 18.304_898_789_278_02 * y) * y)))))
        + x2 * (268.552_026_584_507_1
            + y * (-12_019.028_203_559_312
                + y * (3_734.858_026_725_145
                    + y * (-2_046.767_114_505_761_8
                        + y * (465.286_556_238_262_34
                            + (-0.637_082_030_237_635_9 - 10.650_848_542_359_153 * y) * y))))
            + x * (937.209_911_062_070_7
                + y * (588.180_281_217_010_8
                    + y * (248.394_765_229_712_85
                        + (-3.871_557_904_936_333 - 2.626_801_985_426_835_6 * y) * y))
                + x * (-1_687.914_374_187_449
                    + x * (246.959_888_878_137_7
                        + x * (123.595_765_824_579_64 - 48.589_106_902_540_9 * x))
                    + y * (936.320_654_446_033_6
                        + y * (-942.782_730_454_443_9
                            + y * (369.438_943_750_900_2
                                + (-33.836_649_478_952_48 - 9.987_880_382_780_322 * y) * y))))));

    pot_enthalpy / CP0
}

/// Thermal expansion and haline contraction coefficients in TEOS-10 variables
///
/// The equation of state is evaluated on its own variables, practical
/// salinity and potential temperature. Its derivatives are carried over to
/// conservative temperature and absolute salinity through the
/// potential-enthalpy polynomial, giving α with respect to Θ (1/K) and β with
/// respect to absolute salinity at constant Θ (kg/g).
pub fn conservative_coefficients<E>(
    eos: &E,
    practical_salinity: FloatValue,
    theta: FloatValue,
    pressure: FloatValue,
) -> (FloatValue, FloatValue)
where
    E: EquationOfState + ?Sized,
{
    let alpha_theta = eos.alpha(practical_salinity, theta, pressure);
    let beta_practical = eos.beta(practical_salinity, theta, pressure);

    let sa = absolute_salinity_from_practical(practical_salinity);
    let dt = TEMPERATURE_STEP;
    let dct_dtheta = (conservative_temperature_from_potential(sa, theta + dt)
        - conservative_temperature_from_potential(sa, theta - dt))
        / (2.0 * dt);
    let ds = SALINITY_STEP;
    let (sa_minus, span) = if sa >= ds { (sa - ds, 2.0 * ds) } else { (sa, ds) };
    let dct_dsa = (conservative_temperature_from_potential(sa + ds, theta)
        - conservative_temperature_from_potential(sa_minus, theta))
        / span;

    let alpha = alpha_theta / dct_dtheta;
    let beta = beta_practical / UPS + alpha_theta * dct_dsa / dct_dtheta;
    (alpha, beta)
}

/// Equation of state for seawater
///
/// Implementors provide the in-situ density and the adiabatic re-referencing
/// of temperature. Potential density and the expansion/contraction
/// coefficients follow from those.
pub trait EquationOfState: fmt::Debug {
    /// In-situ density (kg/m³)
    fn density(
        &self,
        salinity: FloatValue,
        temperature: FloatValue,
        pressure: FloatValue,
    ) -> FloatValue;

    /// Temperature of a parcel moved adiabatically from `pressure` to `reference_pressure`
    fn potential_temperature(
        &self,
        salinity: FloatValue,
        temperature: FloatValue,
        pressure: FloatValue,
        reference_pressure: FloatValue,
    ) -> FloatValue;

    /// Potential density anomaly (kg/m³ minus 1000) referenced to `reference_pressure`
    ///
    /// `theta` is the potential temperature referenced to the surface.
    fn potential_density(
        &self,
        salinity: FloatValue,
        theta: FloatValue,
        reference_pressure: FloatValue,
    ) -> FloatValue {
        let t_ref = self.potential_temperature(salinity, theta, 0.0, reference_pressure);
        self.density(salinity, t_ref, reference_pressure) - 1000.0
    }

    /// Density of a parcel with surface potential temperature `theta` at `pressure`
    fn density_from_theta(
        &self,
        salinity: FloatValue,
        theta: FloatValue,
        pressure: FloatValue,
    ) -> FloatValue {
        let t = self.potential_temperature(salinity, theta, 0.0, pressure);
        self.density(salinity, t, pressure)
    }

    /// Thermal expansion coefficient α = -(1/ρ) ∂ρ/∂θ (1/K)
    fn alpha(&self, salinity: FloatValue, theta: FloatValue, pressure: FloatValue) -> FloatValue {
        let dt = TEMPERATURE_STEP;
        let rho = self.density_from_theta(salinity, theta, pressure);
        let rho_plus = self.density_from_theta(salinity, theta + dt, pressure);
        let rho_minus = self.density_from_theta(salinity, theta - dt, pressure);
        -((rho_plus - rho_minus) / (2.0 * dt)) / rho
    }

    /// Haline contraction coefficient β = (1/ρ) ∂ρ/∂S (1/salinity unit)
    fn beta(&self, salinity: FloatValue, theta: FloatValue, pressure: FloatValue) -> FloatValue {
        let ds = SALINITY_STEP;
        let rho = self.density_from_theta(salinity, theta, pressure);
        let rho_plus = self.density_from_theta(salinity + ds, theta, pressure);
        // One-sided near fresh water, the formulation uses S^1.5
        let (rho_minus, span) = if salinity >= ds {
            (self.density_from_theta(salinity - ds, theta, pressure), 2.0 * ds)
        } else {
            (rho, ds)
        };
        ((rho_plus - rho_minus) / span) / rho
    }
}

/// UNESCO EOS-80 equation of state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Unesco1981;

impl Unesco1981 {
    /// Density of standard mean ocean water (kg/m³)
    fn smow(t: FloatValue) -> FloatValue {
        999.842594
            + (6.793952e-2
                + (-9.095290e-3 + (1.001685e-4 + (-1.120083e-6 + 6.536336e-9 * t) * t) * t) * t)
                * t
    }

    /// One-atmosphere density (kg/m³)
    pub fn density_surface(&self, salinity: FloatValue, temperature: FloatValue) -> FloatValue {
        let (s, t) = (salinity, temperature);
        let b = 8.24493e-1 + (-4.0899e-3 + (7.6438e-5 + (-8.2467e-7 + 5.3875e-9 * t) * t) * t) * t;
        let c = -5.72466e-3 + (1.0227e-4 - 1.6546e-6 * t) * t;
        let d = 4.8314e-4;
        Self::smow(t) + b * s + c * s * s.sqrt() + d * s * s
    }

    /// Secant bulk modulus (bar), pressure in dbar
    fn secant_bulk_modulus(s: FloatValue, t: FloatValue, pressure: FloatValue) -> FloatValue {
        let p = pressure / 10.0;
        let sr = s.sqrt();

        let kw = 19652.21 + (148.4206 + (-2.327105 + (1.360477e-2 - 5.155288e-5 * t) * t) * t) * t;
        let aw = 3.239908 + (1.43713e-3 + (1.16092e-4 - 5.77905e-7 * t) * t) * t;
        let bw = 8.50935e-5 + (-6.12293e-6 + 5.2787e-8 * t) * t;

        let k0 = kw
            + (54.6746 + (-0.603459 + (1.09987e-2 - 6.1670e-5 * t) * t) * t
                + (7.944e-2 + (1.6483e-2 - 5.3009e-4 * t) * t) * sr)
                * s;
        let a = aw + (2.2838e-3 + (-1.0981e-5 - 1.6078e-6 * t) * t + 1.91075e-4 * sr) * s;
        let b = bw + (-9.9348e-7 + (2.0816e-8 + 9.1697e-10 * t) * t) * s;

        k0 + (a + b * p) * p
    }

    /// Adiabatic lapse rate (K/dbar)
    pub fn adiabatic_lapse_rate(
        &self,
        salinity: FloatValue,
        temperature: FloatValue,
        pressure: FloatValue,
    ) -> FloatValue {
        let (t, p) = (temperature, pressure);
        let ds = salinity - 35.0;
        3.5803e-5
            + (8.5258e-6 + (-6.836e-8 + 6.6228e-10 * t) * t) * t
            + (1.8932e-6 - 4.2393e-8 * t) * ds
            + ((1.8741e-8 + (-6.7795e-10 + (8.733e-12 - 5.4481e-14 * t) * t) * t)
                + (-1.1351e-10 + 2.7759e-12 * t) * ds)
                * p
            + (-4.6206e-13 + (1.8676e-14 - 2.1687e-16 * t) * t) * p * p
    }
}

impl EquationOfState for Unesco1981 {
    fn density(
        &self,
        salinity: FloatValue,
        temperature: FloatValue,
        pressure: FloatValue,
    ) -> FloatValue {
        let rho_0 = self.density_surface(salinity, temperature);
        if pressure == 0.0 {
            return rho_0;
        }
        let k = Self::secant_bulk_modulus(salinity, temperature, pressure);
        rho_0 / (1.0 - (pressure / 10.0) / k)
    }

    fn potential_temperature(
        &self,
        salinity: FloatValue,
        temperature: FloatValue,
        pressure: FloatValue,
        reference_pressure: FloatValue,
    ) -> FloatValue {
        let s = salinity;
        let dp = reference_pressure - pressure;
        if dp == 0.0 {
            return temperature;
        }
        let r2 = std::f64::consts::SQRT_2;

        let mut dth = dp * self.adiabatic_lapse_rate(s, temperature, pressure);
        let mut th = temperature + 0.5 * dth;
        let mut q = dth;

        dth = dp * self.adiabatic_lapse_rate(s, th, pressure + 0.5 * dp);
        th += (1.0 - 1.0 / r2) * (dth - q);
        q = (2.0 - r2) * dth + (-2.0 + 3.0 / r2) * q;

        dth = dp * self.adiabatic_lapse_rate(s, th, pressure + 0.5 * dp);
        th += (1.0 + 1.0 / r2) * (dth - q);
        q = (2.0 + r2) * dth + (-2.0 - 3.0 / r2) * q;

        dth = dp * self.adiabatic_lapse_rate(s, th, pressure + dp);
        th + (dth - 2.0 * q) / 6.0
    }
}
