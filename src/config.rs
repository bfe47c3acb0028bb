//! Transformation configuration
//!
//! Physical constants, equation-of-state switches and the process taxonomy
//! used by [`WaterMassTransformations`](crate::transformation::WaterMassTransformations).
//! Every field has a default so a configuration file only needs the values it
//! changes:
//!
//! ```rust
//! use xwmt::config::TransformationConfig;
//!
//! let config = TransformationConfig::from_toml_str("rho_ref = 1025.0").unwrap();
//! assert_eq!(config.rho_ref, 1025.0);
//! assert_eq!(config.cp, 3992.0);
//! assert!(config.teos10);
//! ```

use serde::{Deserialize, Serialize};
use xwmt_core::errors::{XwmtError, XwmtResult};
use xwmt_core::field::FloatValue;
use xwmt_core::taxonomy::ProcessTaxonomy;

/// Names of the surface fields used by boundary forcing terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurfaceVariables {
    /// Surface mass flux of water into the ocean (kg/m²/s).
    /// Default: "wfo"
    pub mass_flux: String,

    /// Sea surface temperature (°C).
    /// Default: "tos"
    pub temperature: String,
}

impl Default for SurfaceVariables {
    fn default() -> Self {
        Self {
            mass_flux: "wfo".to_string(),
            temperature: "tos".to_string(),
        }
    }
}

/// Configuration of a water-mass transformation analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformationConfig {
    /// Specific heat capacity of seawater (J/kg/K).
    /// Default: 3992.0
    pub cp: FloatValue,

    /// Reference density of seawater (kg/m³).
    /// Default: 1035.0
    pub rho_ref: FloatValue,

    /// Convert to TEOS-10 state variables before evaluating the equation of state.
    /// Default: true
    pub teos10: bool,

    /// Constant thermal expansion coefficient (1/K).
    /// Derived from the dataset when not given.
    pub alpha: Option<FloatValue>,

    /// Constant haline contraction coefficient (kg/g).
    /// Derived from the dataset when not given.
    pub beta: Option<FloatValue>,

    /// Add the tracer flux carried by the surface mass flux to boundary forcing terms.
    /// Default: false
    pub mass_flux_correction: bool,

    /// Latitude (degrees north) used for pressure when the dataset has no `lat`.
    /// Default: 0.0
    pub default_latitude: FloatValue,

    /// Surface fields used by boundary forcing terms
    pub surface: SurfaceVariables,

    /// Dataset variable of each process tendency
    pub taxonomy: ProcessTaxonomy,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            cp: 3992.0,
            rho_ref: 1035.0,
            teos10: true,
            alpha: None,
            beta: None,
            mass_flux_correction: false,
            default_latitude: 0.0,
            surface: SurfaceVariables::default(),
            taxonomy: ProcessTaxonomy::mom6(),
        }
    }
}

impl TransformationConfig {
    /// Parse and validate a configuration from TOML
    pub fn from_toml_str(toml: &str) -> XwmtResult<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise the configuration to TOML
    pub fn to_toml_string(&self) -> XwmtResult<String> {
        toml::to_string_pretty(self).map_err(|e| XwmtError::InvalidConfig(e.to_string()))
    }

    pub fn with_taxonomy(mut self, taxonomy: ProcessTaxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_expansion_coefficients(
        mut self,
        alpha: Option<FloatValue>,
        beta: Option<FloatValue>,
    ) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    pub fn with_teos10(mut self, teos10: bool) -> Self {
        self.teos10 = teos10;
        self
    }

    pub fn with_mass_flux_correction(mut self, enabled: bool) -> Self {
        self.mass_flux_correction = enabled;
        self
    }

    /// Check the constants and the taxonomy
    pub fn validate(&self) -> XwmtResult<()> {
        for (name, value) in [("cp", self.cp), ("rho_ref", self.rho_ref)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(XwmtError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(XwmtError::InvalidConfig(format!(
                        "{name} must be finite, got {v}"
                    )));
                }
            }
        }
        if !(-90.0..=90.0).contains(&self.default_latitude) {
            return Err(XwmtError::InvalidConfig(format!(
                "default_latitude must lie within -90..90, got {}",
                self.default_latitude
            )));
        }
        if self.surface.mass_flux.trim().is_empty() || self.surface.temperature.trim().is_empty() {
            return Err(XwmtError::InvalidConfig(
                "surface variable names must not be empty".to_string(),
            ));
        }
        self.taxonomy.validate()
    }
}
