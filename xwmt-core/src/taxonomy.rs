//! Tracers, processes and lambda coordinates
//!
//! A [`ProcessTaxonomy`] maps each abstract [`Process`] to the name of the
//! dataset variable holding its tendency, separately for the heat and salt
//! [`Tracer`] components. Entries may be missing when a process does not act
//! on a tracer (there is no frazil salt tendency, for example).
//!
//! Taxonomies are plain configuration. They can be deserialised (unknown
//! processes are rejected) and are validated before use:
//!
//! ```rust
//! use xwmt_core::taxonomy::{Process, ProcessTaxonomy, Tracer};
//!
//! let taxonomy = ProcessTaxonomy::mom6();
//! assert_eq!(taxonomy.variable(Tracer::Heat, Process::VerticalDiffusion), Some("opottempdiff"));
//! assert_eq!(taxonomy.variable(Tracer::Salt, Process::FrazilIce), None);
//! assert!(taxonomy.validate().is_ok());
//! ```

use crate::eos::SigmaLevel;
use crate::errors::{XwmtError, XwmtResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Tracer component whose tendencies drive a transformation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracer {
    Heat,
    Salt,
}

impl Tracer {
    pub const ALL: [Tracer; 2] = [Tracer::Heat, Tracer::Salt];

    pub fn name(&self) -> &'static str {
        match self {
            Tracer::Heat => "heat",
            Tracer::Salt => "salt",
        }
    }
}

impl fmt::Display for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical process contributing to a tracer tendency
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Process {
    #[serde(rename = "Eulerian_tendency")]
    EulerianTendency,
    #[serde(rename = "horizontal_advection")]
    HorizontalAdvection,
    #[serde(rename = "vertical_advection")]
    VerticalAdvection,
    #[serde(rename = "boundary_forcing")]
    BoundaryForcing,
    #[serde(rename = "vertical_diffusion")]
    VerticalDiffusion,
    #[serde(rename = "neutral_diffusion")]
    NeutralDiffusion,
    #[serde(rename = "frazil_ice")]
    FrazilIce,
    #[serde(rename = "geothermal")]
    Geothermal,
}

impl Process {
    pub const ALL: [Process; 8] = [
        Process::EulerianTendency,
        Process::HorizontalAdvection,
        Process::VerticalAdvection,
        Process::BoundaryForcing,
        Process::VerticalDiffusion,
        Process::NeutralDiffusion,
        Process::FrazilIce,
        Process::Geothermal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Process::EulerianTendency => "Eulerian_tendency",
            Process::HorizontalAdvection => "horizontal_advection",
            Process::VerticalAdvection => "vertical_advection",
            Process::BoundaryForcing => "boundary_forcing",
            Process::VerticalDiffusion => "vertical_diffusion",
            Process::NeutralDiffusion => "neutral_diffusion",
            Process::FrazilIce => "frazil_ice",
            Process::Geothermal => "geothermal",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Process {
    type Err = XwmtError;

    fn from_str(s: &str) -> XwmtResult<Self> {
        Process::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| XwmtError::UnsupportedProcess(s.to_string()))
    }
}

/// Addends of a process category
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CategoryTerms {
    /// Sum of individual processes
    Processes(&'static [Process]),
    /// Sum of other categories
    Categories(&'static [ProcessCategory]),
}

/// Higher level grouping of processes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCategory {
    ExternalForcing,
    Diffusion,
    Advection,
    DiabaticForcing,
    TotalTendency,
}

impl ProcessCategory {
    /// Categories in an order where every category follows its addends
    pub const ALL: [ProcessCategory; 5] = [
        ProcessCategory::ExternalForcing,
        ProcessCategory::Diffusion,
        ProcessCategory::Advection,
        ProcessCategory::DiabaticForcing,
        ProcessCategory::TotalTendency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessCategory::ExternalForcing => "external_forcing",
            ProcessCategory::Diffusion => "diffusion",
            ProcessCategory::Advection => "advection",
            ProcessCategory::DiabaticForcing => "diabatic_forcing",
            ProcessCategory::TotalTendency => "total_tendency",
        }
    }

    pub fn terms(&self) -> CategoryTerms {
        match self {
            ProcessCategory::ExternalForcing => CategoryTerms::Processes(&[
                Process::BoundaryForcing,
                Process::FrazilIce,
                Process::Geothermal,
            ]),
            ProcessCategory::Diffusion => CategoryTerms::Processes(&[
                Process::VerticalDiffusion,
                Process::NeutralDiffusion,
            ]),
            ProcessCategory::Advection => CategoryTerms::Processes(&[
                Process::HorizontalAdvection,
                Process::VerticalAdvection,
            ]),
            ProcessCategory::DiabaticForcing => CategoryTerms::Categories(&[
                ProcessCategory::ExternalForcing,
                ProcessCategory::Diffusion,
            ]),
            ProcessCategory::TotalTendency => CategoryTerms::Categories(&[
                ProcessCategory::Advection,
                ProcessCategory::DiabaticForcing,
            ]),
        }
    }

    /// Name of the category restricted to one tracer component, e.g. `diffusion_heat`
    pub fn component_name(&self, tracer: Tracer) -> String {
        format!("{}_{}", self.name(), tracer.name())
    }
}

impl fmt::Display for ProcessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar coordinate against which water-mass transformation is computed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lambda {
    /// Potential temperature
    Theta,
    /// Salinity
    Salt,
    /// Potential density at a reference pressure
    Density(SigmaLevel),
}

impl Lambda {
    pub const ALL: [Lambda; 7] = [
        Lambda::Theta,
        Lambda::Salt,
        Lambda::Density(SigmaLevel::Sigma0),
        Lambda::Density(SigmaLevel::Sigma1),
        Lambda::Density(SigmaLevel::Sigma2),
        Lambda::Density(SigmaLevel::Sigma3),
        Lambda::Density(SigmaLevel::Sigma4),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Lambda::Theta => "theta",
            Lambda::Salt => "salt",
            Lambda::Density(level) => level.name(),
        }
    }

    /// Tracer components whose tendencies change this lambda
    pub fn tracers(&self) -> &'static [Tracer] {
        match self {
            Lambda::Theta => &[Tracer::Heat],
            Lambda::Salt => &[Tracer::Salt],
            Lambda::Density(_) => &Tracer::ALL,
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lambda {
    type Err = XwmtError;

    fn from_str(s: &str) -> XwmtResult<Self> {
        match s {
            "theta" | "temperature" => Ok(Lambda::Theta),
            "salt" | "salinity" => Ok(Lambda::Salt),
            other => other
                .parse::<SigmaLevel>()
                .map(Lambda::Density)
                .map_err(|_| XwmtError::UnsupportedLambda(other.to_string())),
        }
    }
}

/// Variables describing one tracer component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracerProcesses {
    /// Name of the scalar field of the tracer (e.g. `thetao`)
    pub scalar: String,
    /// Dataset variable holding each process tendency
    #[serde(default)]
    pub processes: BTreeMap<Process, String>,
}

impl TracerProcesses {
    pub fn new(scalar: &str, processes: &[(Process, &str)]) -> Self {
        Self {
            scalar: scalar.to_string(),
            processes: processes
                .iter()
                .map(|(p, v)| (*p, v.to_string()))
                .collect(),
        }
    }
}

/// Mapping from processes to dataset variables for each tracer component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessTaxonomy {
    pub heat: TracerProcesses,
    pub salt: TracerProcesses,
}

impl Default for ProcessTaxonomy {
    fn default() -> Self {
        Self::mom6()
    }
}

impl ProcessTaxonomy {
    /// Create and validate a taxonomy
    pub fn new(heat: TracerProcesses, salt: TracerProcesses) -> XwmtResult<Self> {
        let taxonomy = Self { heat, salt };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Diagnostic names written by the MOM6 ocean model
    pub fn mom6() -> Self {
        Self {
            heat: TracerProcesses::new(
                "thetao",
                &[
                    (Process::EulerianTendency, "opottemptend"),
                    (Process::HorizontalAdvection, "T_advection_xy"),
                    (Process::VerticalAdvection, "Th_tendency_vert_remap"),
                    (Process::BoundaryForcing, "boundary_forcing_heat_tendency"),
                    (Process::VerticalDiffusion, "opottempdiff"),
                    (Process::NeutralDiffusion, "opottemppmdiff"),
                    (Process::FrazilIce, "frazil_heat_tendency"),
                    (Process::Geothermal, "internal_heat_heat_tendency"),
                ],
            ),
            salt: TracerProcesses::new(
                "so",
                &[
                    (Process::EulerianTendency, "osalttend"),
                    (Process::HorizontalAdvection, "S_advection_xy"),
                    (Process::VerticalAdvection, "Sh_tendency_vert_remap"),
                    (Process::BoundaryForcing, "boundary_forcing_salt_tendency"),
                    (Process::VerticalDiffusion, "osaltdiff"),
                    (Process::NeutralDiffusion, "osaltpmdiff"),
                ],
            ),
        }
    }

    pub fn tracer(&self, tracer: Tracer) -> &TracerProcesses {
        match tracer {
            Tracer::Heat => &self.heat,
            Tracer::Salt => &self.salt,
        }
    }

    /// Dataset variable of a process tendency, if the process acts on the tracer
    pub fn variable(&self, tracer: Tracer, process: Process) -> Option<&str> {
        self.tracer(tracer)
            .processes
            .get(&process)
            .map(|v| v.as_str())
    }

    /// Name of the tracer's scalar field
    pub fn scalar(&self, tracer: Tracer) -> &str {
        &self.tracer(tracer).scalar
    }

    /// Processes mapped for at least one tracer, in canonical order
    pub fn processes(&self) -> Vec<Process> {
        Process::ALL
            .into_iter()
            .filter(|p| Tracer::ALL.iter().any(|t| self.variable(*t, *p).is_some()))
            .collect()
    }

    /// Check that every name is usable and that no variable is claimed twice
    pub fn validate(&self) -> XwmtResult<()> {
        let mut seen = BTreeSet::new();
        for tracer in Tracer::ALL {
            let entry = self.tracer(tracer);
            if entry.scalar.trim().is_empty() {
                return Err(XwmtError::InvalidTaxonomy(format!(
                    "scalar field of the {tracer} tracer is empty"
                )));
            }
            if !seen.insert(entry.scalar.as_str()) {
                return Err(XwmtError::InvalidTaxonomy(format!(
                    "variable {} is used more than once",
                    entry.scalar
                )));
            }
            for (process, variable) in entry.processes.iter() {
                if variable.trim().is_empty() {
                    return Err(XwmtError::InvalidTaxonomy(format!(
                        "{process} of the {tracer} tracer maps to an empty variable name"
                    )));
                }
                if !seen.insert(variable.as_str()) {
                    return Err(XwmtError::InvalidTaxonomy(format!(
                        "variable {variable} is used more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}
