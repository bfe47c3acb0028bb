//! Vertical convergence of tracer fluxes
//!
//! Tendencies reach the transformation either already integrated over each
//! layer (units of tracer content per unit area per second) or as fluxes
//! through layer interfaces. Fluxes are converted by taking the negative
//! vertical divergence, so a downward surface flux into the top interface
//! becomes a source in the top layer.

use crate::errors::XwmtResult;
use crate::field::{Field, FloatValue};
use crate::grid::GridOps;
use ndarray::{s, Array4};

/// Form in which a tendency is supplied
#[derive(Debug, Clone, PartialEq)]
pub enum TendencyForm {
    /// Layer-integrated tendency at layer centres
    LayerIntegrated(Field),
    /// Flux through layer interfaces
    InterfacialFlux(Field),
}

impl TendencyForm {
    pub fn field(&self) -> &Field {
        match self {
            TendencyForm::LayerIntegrated(f) | TendencyForm::InterfacialFlux(f) => f,
        }
    }

    pub fn is_flux(&self) -> bool {
        matches!(self, TendencyForm::InterfacialFlux(_))
    }

}

/// Layer-integrated tendency from the convergence of an interfacial flux
///
/// Computes `h * (-diff(jlam) / h)` where layers of zero thickness are masked
/// before the division and every undefined value is replaced by zero. Layers
/// without thickness therefore yield exactly zero.
pub fn hlamdot_from_jlam<G>(grid: &G, jlam: &Field) -> XwmtResult<Field>
where
    G: GridOps + ?Sized,
{
    let h = grid.thickness()?;
    let divergence = grid.diff(jlam)?;
    divergence.zip_with(&h, |d, h| {
        let h_filled = if h.is_nan() { 0.0 } else { h };
        let per_metre = if h == 0.0 { FloatValue::NAN } else { -d / h };
        let per_metre = if per_metre.is_nan() { 0.0 } else { per_metre };
        h_filled * per_metre
    })
}

/// Layer-integrated tendency for either form of tendency
pub fn calc_hlamdot_tendency<G>(grid: &G, tendency: &TendencyForm) -> XwmtResult<Field>
where
    G: GridOps + ?Sized,
{
    match tendency {
        TendencyForm::LayerIntegrated(field) => Ok(field.clone()),
        TendencyForm::InterfacialFlux(flux) => hlamdot_from_jlam(grid, flux),
    }
}

/// Place a surface field on the top interface of an interface-staggered field
///
/// All other interfaces are zero. `nz_outer` is the number of interfaces.
pub fn expand_surface_to_3d(surface: &Field, nz_outer: usize) -> XwmtResult<Field> {
    let values = surface.surface_view()?;
    let (nt, ny, nx) = values.dim();
    let mut data = Array4::zeros((nt, nz_outer, ny, nx));
    if nz_outer > 0 {
        data.slice_mut(s![.., 0, .., ..]).assign(&values);
    }
    Ok(Field::outer(surface.name(), data))
}

/// Advective flux of lambda carried by a mass flux
///
/// `qm` is the mass flux, `lm` the lambda value of the water carried by it and
/// `l` the lambda value at the interface. Returns `qm * (lm - l)`.
pub fn jlammass_from_qm_lm_l(qm: &Field, lm: &Field, l: &Field) -> XwmtResult<Field> {
    let excess = lm.sub(l)?;
    qm.mul(&excess)
}

/// Total layer-integrated tendency including the mass flux contribution
pub fn hlamdot_from_ldot_hlamdotmass(ldot: &Field, hlamdotmass: Option<&Field>) -> XwmtResult<Field> {
    match hlamdotmass {
        Some(mass) => ldot.add(mass),
        None => Ok(ldot.clone()),
    }
}
