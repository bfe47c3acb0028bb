//! Assembly of tracer tendencies from a dataset
//!
//! The [`TendencyAssembler`] resolves a (tracer, process) pair to the dataset
//! variable named by the process taxonomy and wraps it in a
//! [`TendencyRecord`] together with the tracer's scalar field. Surface fields
//! are boundary fluxes. They enter the ocean through the top interface and
//! carry the surface mass flux with them.

use crate::config::TransformationConfig;
use xwmt_core::convergence::{
    calc_hlamdot_tendency, expand_surface_to_3d, hlamdot_from_jlam,
    hlamdot_from_ldot_hlamdotmass, jlammass_from_qm_lm_l, TendencyForm,
};
use xwmt_core::dataset::Dataset;
use xwmt_core::errors::{XwmtError, XwmtResult};
use xwmt_core::field::{Field, FloatValue, Staggering};
use xwmt_core::grid::{Boundary, GridOps};
use xwmt_core::taxonomy::{Process, Tracer};

/// Salt tendencies are stored in kg/m²/s and converted to g/m²/s
pub const SALT_TENDENCY_FACTOR: FloatValue = 1000.0;

/// Mass flux accompanying a boundary tendency
#[derive(Debug, Clone, PartialEq)]
pub struct MassFlux {
    /// Flux through layer interfaces (heat: W/m²/K, salt: kg/m²/s)
    pub flux: Field,
    /// Whether `flux` is a mass flux
    pub mass: bool,
    /// Tracer value of the water carried by the flux, at layer interfaces
    pub scalar_in_mass: Field,
}

/// Tendency of one tracer due to one process
#[derive(Debug, Clone, PartialEq)]
pub struct TendencyRecord {
    pub tracer: Tracer,
    pub process: Process,
    /// Name of the dataset variable holding the tendency
    pub variable: String,
    /// Scalar field of the tracer (e.g. potential temperature)
    pub scalar: Field,
    pub tendency: TendencyForm,
    pub extensive: bool,
    /// Present exactly when the tendency is a boundary flux
    pub boundary: Option<MassFlux>,
}

impl TendencyRecord {
    pub fn is_boundary(&self) -> bool {
        self.boundary.is_some()
    }

    /// Layer-integrated tendency of the tracer
    ///
    /// With `mass_flux_correction` the convergence of the tracer flux carried
    /// by the boundary mass flux is added.
    pub fn hlamdot<G>(&self, grid: &G, mass_flux_correction: bool) -> XwmtResult<Field>
    where
        G: GridOps + ?Sized,
    {
        let ldot = calc_hlamdot_tendency(grid, &self.tendency)?;
        match (&self.boundary, mass_flux_correction) {
            (Some(boundary), true) => {
                let lam = grid.interp(&self.scalar, Boundary::Extend)?;
                let jlammass = jlammass_from_qm_lm_l(&boundary.flux, &boundary.scalar_in_mass, &lam)?;
                let hlamdotmass = hlamdot_from_jlam(grid, &jlammass)?;
                hlamdot_from_ldot_hlamdotmass(&ldot, Some(&hlamdotmass))
            }
            _ => hlamdot_from_ldot_hlamdotmass(&ldot, None),
        }
    }
}

/// Builds [`TendencyRecord`]s from a dataset
#[derive(Debug, Clone, Copy)]
pub struct TendencyAssembler<'a> {
    dataset: &'a Dataset,
    config: &'a TransformationConfig,
}

impl<'a> TendencyAssembler<'a> {
    pub fn new(dataset: &'a Dataset, config: &'a TransformationConfig) -> Self {
        Self { dataset, config }
    }

    /// Processes of the taxonomy
    ///
    /// With `check`, only processes whose every mapped variable is present in
    /// the dataset are listed.
    pub fn processes(&self, check: bool) -> Vec<Process> {
        let taxonomy = &self.config.taxonomy;
        taxonomy
            .processes()
            .into_iter()
            .filter(|process| {
                !check
                    || Tracer::ALL.iter().all(|tracer| {
                        taxonomy
                            .variable(*tracer, *process)
                            .map_or(true, |v| self.dataset.contains(v))
                    })
            })
            .collect()
    }

    /// Tendency of `tracer` due to `process`
    ///
    /// Returns `None` when the taxonomy has no variable for the pair or the
    /// variable is absent from the dataset.
    pub fn datadict(&self, tracer: Tracer, process: Process) -> XwmtResult<Option<TendencyRecord>> {
        let taxonomy = &self.config.taxonomy;
        let Some(variable) = taxonomy.variable(tracer, process) else {
            log::debug!("No {} variable mapped for {}", tracer, process);
            return Ok(None);
        };
        let Some(field) = self.dataset.get(variable) else {
            log::debug!("{} ({} {}) is not in the dataset", variable, tracer, process);
            return Ok(None);
        };

        let scalar = self.dataset.require(taxonomy.scalar(tracer))?.clone();
        let factor = match tracer {
            Tracer::Heat => 1.0,
            Tracer::Salt => SALT_TENDENCY_FACTOR,
        };

        let (tendency, boundary) = match field.staggering() {
            Staggering::Surface => {
                let flux = expand_surface_to_3d(field, self.nz_outer())?.scale(factor);
                let boundary = self.mass_flux(tracer)?;
                (TendencyForm::InterfacialFlux(flux), Some(boundary))
            }
            Staggering::Center => (TendencyForm::LayerIntegrated(field.scale(factor)), None),
            Staggering::Outer => (TendencyForm::InterfacialFlux(field.scale(factor)), None),
        };

        Ok(Some(TendencyRecord {
            tracer,
            process,
            variable: variable.to_string(),
            scalar,
            tendency,
            extensive: true,
            boundary,
        }))
    }

    fn nz_outer(&self) -> usize {
        self.dataset.nz() + 1
    }

    fn zeros_outer(&self, name: &str) -> Field {
        Field::outer(name, ndarray::Array4::zeros(self.dataset.outer_shape()))
    }

    /// Mass flux companion of a boundary tendency
    fn mass_flux(&self, tracer: Tracer) -> XwmtResult<MassFlux> {
        let surface = &self.config.surface;
        let flux = match self.dataset.get(&surface.mass_flux) {
            Some(wfo) => {
                let expanded = expand_surface_to_3d(wfo, self.nz_outer())?;
                match tracer {
                    Tracer::Heat => expanded.scale(self.config.cp),
                    Tracer::Salt => expanded,
                }
            }
            None => {
                log::debug!(
                    "{} is not in the dataset, boundary mass flux is zero",
                    surface.mass_flux
                );
                self.zeros_outer(&surface.mass_flux)
            }
        };

        let scalar_in_mass = match tracer {
            Tracer::Heat => match self.dataset.get(&surface.temperature) {
                Some(tos) => expand_surface_to_3d(tos, self.nz_outer())?,
                // Only needed when water actually crosses the surface
                None if flux.data().iter().all(|&v| v == 0.0) => {
                    self.zeros_outer(&surface.temperature)
                }
                None => return Err(XwmtError::MissingVariable(surface.temperature.clone())),
            },
            Tracer::Salt => self.zeros_outer("salt_in_mass"),
        };

        Ok(MassFlux {
            flux,
            mass: true,
            scalar_in_mass,
        })
    }
}
