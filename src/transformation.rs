//! Water-mass transformation in lambda space
//!
//! [`WaterMassTransformations`] ties a dataset to its vertical grid and
//! configuration. For a lambda and a process it forms the layer-integrated
//! lambda tendency (`hlamdot`), remaps it conservatively from depth onto lambda
//! bins and divides by the bin widths, giving the transformation rate per unit
//! lambda at every horizontal point. Integrating over area gives the
//! transformation rate G(λ, t).
//!
//! Unit conventions:
//!
//! - theta: heat tendency (W/m²) divided by `rho_ref * cp`, giving K m/s
//! - salt: salt tendency (g/m²/s) divided by `rho_ref`
//! - sigma: `-(alpha / cp)` times the heat tendency and `beta` times the salt
//!   tendency, each in kg/m²/s

use crate::config::TransformationConfig;
use crate::output::{BinnedField, TransformationSet};
use crate::tendency::{TendencyAssembler, TendencyRecord};
use crate::thermo::Thermodynamics;
use ndarray::Axis;
use xwmt_core::bins::Bins;
use xwmt_core::dataset::Dataset;
use xwmt_core::eos::EquationOfState;
use xwmt_core::errors::XwmtResult;
use xwmt_core::field::Field;
use xwmt_core::grid::{Boundary, GridOps, VerticalGrid};
use xwmt_core::taxonomy::{Lambda, Process, Tracer};

/// Layer-integrated lambda tendencies of one process and the lambda field
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaTendency {
    /// One tendency per contributing tracer, named after its dataset variable
    pub hlamdot: Vec<Field>,
    /// Lambda at layer centres
    pub lam: Field,
}

/// Water-mass transformation analysis of a dataset
pub struct WaterMassTransformations {
    dataset: Dataset,
    config: TransformationConfig,
    grid: Box<dyn GridOps>,
    thermo: Thermodynamics,
}

impl WaterMassTransformations {
    /// Set up an analysis on the vertical grid of `dataset`
    pub fn new(dataset: Dataset, config: TransformationConfig) -> XwmtResult<Self> {
        let grid = VerticalGrid::from_dataset(&dataset)?;
        Self::with_grid(dataset, config, Box::new(grid))
    }

    /// Set up an analysis on a custom grid
    pub fn with_grid(
        dataset: Dataset,
        config: TransformationConfig,
        grid: Box<dyn GridOps>,
    ) -> XwmtResult<Self> {
        config.validate()?;
        let thermo = Thermodynamics::new(&config);
        Ok(Self {
            dataset,
            config,
            grid,
            thermo,
        })
    }

    /// Use `eos` wherever coefficients or potential densities are computed
    pub fn with_equation_of_state(mut self, eos: Box<dyn EquationOfState>) -> Self {
        self.thermo = Thermodynamics::new(&self.config).with_equation_of_state(eos);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &TransformationConfig {
        &self.config
    }

    pub fn grid(&self) -> &dyn GridOps {
        self.grid.as_ref()
    }

    pub fn thermodynamics(&self) -> &Thermodynamics {
        &self.thermo
    }

    fn assembler(&self) -> TendencyAssembler<'_> {
        TendencyAssembler::new(&self.dataset, &self.config)
    }

    /// Processes of the taxonomy, optionally only those present in the dataset
    pub fn processes(&self, check: bool) -> Vec<Process> {
        self.assembler().processes(check)
    }

    /// Tendency record of a tracer and process
    pub fn datadict(&self, tracer: Tracer, process: Process) -> XwmtResult<Option<TendencyRecord>> {
        self.assembler().datadict(tracer, process)
    }

    fn tracer_hlamdot(&self, record: &TendencyRecord) -> XwmtResult<Field> {
        record.hlamdot(self.grid.as_ref(), self.config.mass_flux_correction)
    }

    /// Layer-integrated lambda tendencies and the lambda field
    ///
    /// Returns `None` when the process acts on none of the tracers that change
    /// `lambda`.
    pub fn calc_hlamdot_and_lambda(
        &self,
        lambda: Lambda,
        process: Process,
    ) -> XwmtResult<Option<LambdaTendency>> {
        let cp = self.config.cp;
        let rho_ref = self.config.rho_ref;
        match lambda {
            Lambda::Theta | Lambda::Salt => {
                let tracer = lambda.tracers()[0];
                let Some(record) = self.datadict(tracer, process)? else {
                    return Ok(None);
                };
                let scale = match tracer {
                    Tracer::Heat => 1.0 / (rho_ref * cp),
                    Tracer::Salt => 1.0 / rho_ref,
                };
                let hlamdot = self
                    .tracer_hlamdot(&record)?
                    .scale(scale)
                    .rename(&record.variable);
                Ok(Some(LambdaTendency {
                    hlamdot: vec![hlamdot],
                    lam: record.scalar,
                }))
            }
            Lambda::Density(level) => {
                let mut hlamdot = Vec::new();
                if let Some(record) = self.datadict(Tracer::Heat, process)? {
                    let alpha = self.thermo.alpha(&self.dataset)?;
                    let heat = self.tracer_hlamdot(&record)?;
                    hlamdot.push(
                        heat.zip_with(alpha, |h, a| -(a / cp) * h)?
                            .rename(&record.variable),
                    );
                }
                if let Some(record) = self.datadict(Tracer::Salt, process)? {
                    let beta = self.thermo.beta(&self.dataset)?;
                    let salt = self.tracer_hlamdot(&record)?;
                    hlamdot.push(salt.zip_with(beta, |s, b| b * s)?.rename(&record.variable));
                }
                if hlamdot.is_empty() {
                    return Ok(None);
                }
                let lam = self
                    .thermo
                    .potential_density(&self.dataset, level)?
                    .clone();
                Ok(Some(LambdaTendency { hlamdot, lam }))
            }
        }
    }

    /// Transformation rate per unit lambda at every horizontal point
    ///
    /// Fields have axes `[time, lambda, y, x]`. Without `bins`, bins are
    /// derived from the distribution of the lambda field.
    pub fn transform_hlamdot(
        &self,
        lambda: Lambda,
        process: Process,
        bins: Option<&Bins>,
    ) -> XwmtResult<Option<TransformationSet>> {
        let Some(LambdaTendency { hlamdot, lam }) = self.calc_hlamdot_and_lambda(lambda, process)?
        else {
            log::debug!("{} does not change {}", process, lambda);
            return Ok(None);
        };

        let bins = match bins {
            Some(bins) => bins.clone(),
            None => {
                let derived = Bins::from_percentiles(lam.data().iter())?;
                log::debug!(
                    "Derived {} bins for {} spanning {}..{}",
                    derived.len(),
                    lam.name(),
                    derived.first_edge(),
                    derived.last_edge()
                );
                derived
            }
        };

        let lam_i = self.grid.interp(&lam, Boundary::Extend)?;
        let widths = bins.widths();

        let mut set = TransformationSet::new();
        for field in hlamdot {
            let mut data = self.grid.transform(&field, &bins, &lam_i)?;
            for (mut slab, width) in data.axis_iter_mut(Axis(1)).zip(widths.iter()) {
                slab.mapv_inplace(|v| v / width);
            }
            set.insert(BinnedField::new(
                field.name(),
                lam.name(),
                bins.clone(),
                data.into_dyn(),
            )?);
        }
        Ok(Some(set))
    }

    /// Transformation rate G(λ, t) integrated over the horizontal
    ///
    /// Without a process, every process of the taxonomy is included.
    pub fn transform_hlamdot_and_integrate(
        &self,
        lambda: Lambda,
        process: Option<Process>,
        bins: Option<&Bins>,
    ) -> XwmtResult<Option<TransformationSet>> {
        let area = self.grid.area()?;
        let processes = match process {
            Some(process) => vec![process],
            None => self.processes(false),
        };

        let mut out = TransformationSet::new();
        for process in processes {
            if let Some(set) = self.transform_hlamdot(lambda, process, bins)? {
                out.merge(set.try_map(|f| f.integrate_area(&area))?);
            }
        }
        Ok((!out.is_empty()).then_some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use ndarray::{array, Array2, Array3, Array4};
    use xwmt_core::eos::SigmaLevel;
    use xwmt_core::field::FloatValue;
    use xwmt_core::grid::AREA_NAME;
    use xwmt_core::taxonomy::{ProcessTaxonomy, TracerProcesses};

    fn config() -> TransformationConfig {
        let heat = TracerProcesses::new(
            "thetao",
            &[
                (Process::BoundaryForcing, "hfds"),
                (Process::VerticalDiffusion, "opottempdiff"),
            ],
        );
        let salt = TracerProcesses::new("so", &[(Process::VerticalDiffusion, "osaltdiff")]);
        TransformationConfig::default()
            .with_taxonomy(ProcessTaxonomy::new(heat, salt).unwrap())
            .with_expansion_coefficients(Some(2e-4), Some(8e-4))
    }

    fn dataset() -> Dataset {
        let time = vec![NaiveDate::from_ymd_opt(2000, 1, 16)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()];
        Dataset::builder(time, array![5.0, 15.0], array![0.0, 10.0, 20.0])
            .with_horizontal(AREA_NAME, Array2::from_elem((1, 2), 2.0))
            .with_field(Field::center(
                "thetao",
                Array4::from_shape_vec((1, 2, 1, 2), vec![0.5, 0.5, 0.5, 0.5]).unwrap(),
            ))
            .with_field(Field::center("so", Array4::from_elem((1, 2, 1, 2), 35.0)))
            .with_field(Field::surface("hfds", Array3::from_elem((1, 1, 2), 100.0)))
            .with_field(Field::center("opottempdiff", Array4::from_elem((1, 2, 1, 2), 1.0)))
            .with_field(Field::center("osaltdiff", Array4::from_elem((1, 2, 1, 2), 1e-6)))
            .build()
            .unwrap()
    }

    #[test]
    fn theta_tendency_is_scaled_to_kelvin() {
        let wmt = WaterMassTransformations::new(dataset(), config()).unwrap();
        let result = wmt
            .calc_hlamdot_and_lambda(Lambda::Theta, Process::BoundaryForcing)
            .unwrap()
            .unwrap();
        assert_eq!(result.hlamdot.len(), 1);
        assert_eq!(result.hlamdot[0].name(), "hfds");
        assert_eq!(result.lam.name(), "thetao");
        assert_relative_eq!(result.hlamdot[0].data()[[0, 0, 0, 0]], 100.0 / (1035.0 * 3992.0));
        assert_eq!(result.hlamdot[0].data()[[0, 1, 0, 0]], 0.0);

        assert!(wmt
            .calc_hlamdot_and_lambda(Lambda::Salt, Process::BoundaryForcing)
            .unwrap()
            .is_none());
    }

    #[test]
    fn salinity_tendency_is_scaled_by_reference_density() {
        let wmt = WaterMassTransformations::new(dataset(), config()).unwrap();
        let result = wmt
            .calc_hlamdot_and_lambda(Lambda::Salt, Process::VerticalDiffusion)
            .unwrap()
            .unwrap();
        assert_eq!(result.hlamdot.len(), 1);
        assert_eq!(result.hlamdot[0].name(), "osaltdiff");
        assert_eq!(result.lam.name(), "so");
        assert_relative_eq!(result.hlamdot[0].data()[[0, 1, 0, 1]], 1e-6 * 1000.0 / 1035.0);
    }

    /// Density linear in salinity and temperature, independent of pressure
    #[derive(Debug)]
    struct LinearEos;

    impl EquationOfState for LinearEos {
        fn density(&self, salinity: FloatValue, temperature: FloatValue, _: FloatValue) -> FloatValue {
            1000.0 + 0.8 * salinity - 0.2 * temperature
        }

        fn potential_temperature(
            &self,
            _: FloatValue,
            temperature: FloatValue,
            _: FloatValue,
            _: FloatValue,
        ) -> FloatValue {
            temperature
        }
    }

    #[test]
    fn custom_equation_of_state() {
        let mut config = config();
        config.alpha = None;
        config.beta = None;
        config.teos10 = false;
        let wmt = WaterMassTransformations::new(dataset(), config)
            .unwrap()
            .with_equation_of_state(Box::new(LinearEos));
        let result = wmt
            .calc_hlamdot_and_lambda(Lambda::Density(SigmaLevel::Sigma0), Process::VerticalDiffusion)
            .unwrap()
            .unwrap();
        assert_relative_eq!(result.lam.data()[[0, 0, 0, 0]], 27.9, epsilon = 1e-9);
        let alpha = 0.2 / 1027.9;
        assert_relative_eq!(
            result.hlamdot[0].data()[[0, 0, 0, 0]],
            -(alpha / 3992.0),
            max_relative = 1e-6
        );
    }

    #[test]
    fn density_tendency_has_one_path_per_tracer() {
        let wmt = WaterMassTransformations::new(dataset(), config()).unwrap();
        let result = wmt
            .calc_hlamdot_and_lambda(Lambda::Density(SigmaLevel::Sigma0), Process::VerticalDiffusion)
            .unwrap()
            .unwrap();
        let names: Vec<&str> = result.hlamdot.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["opottempdiff", "osaltdiff"]);
        assert_relative_eq!(result.hlamdot[0].data()[[0, 0, 0, 0]], -(2e-4 / 3992.0));
        assert_relative_eq!(result.hlamdot[1].data()[[0, 0, 0, 0]], 8e-4 * 1e-3);
        assert_eq!(result.lam.name(), "sigma0");
    }

    #[test]
    fn binned_rate_matches_heat_input() {
        let wmt = WaterMassTransformations::new(dataset(), config()).unwrap();
        let bins = Bins::new(vec![-1.0, 0.0, 1.0]).unwrap();
        let set = wmt
            .transform_hlamdot(Lambda::Theta, Process::BoundaryForcing, Some(&bins))
            .unwrap()
            .unwrap();
        let field = set.get("hfds").unwrap();
        assert_eq!(field.coord(), "thetao");
        assert_eq!(field.data().shape(), &[1, 2, 1, 2]);
        assert_eq!(field.data()[[0, 0, 0, 1]], 0.0);
        assert_relative_eq!(field.data()[[0, 1, 0, 1]], 100.0 / (1035.0 * 3992.0));

        let integrated = wmt
            .transform_hlamdot_and_integrate(Lambda::Theta, Some(Process::BoundaryForcing), Some(&bins))
            .unwrap()
            .unwrap();
        let g = integrated.get("hfds").unwrap();
        assert_eq!(g.data().shape(), &[1, 2]);
        assert_relative_eq!(g.data()[[0, 1]], 2.0 * 2.0 * 100.0 / (1035.0 * 3992.0));
    }

    #[test]
    fn integrating_all_processes_merges_results() {
        let wmt = WaterMassTransformations::new(dataset(), config()).unwrap();
        let bins = Bins::new(vec![0.0, 1.0]).unwrap();
        let set = wmt
            .transform_hlamdot_and_integrate(Lambda::Density(SigmaLevel::Sigma0), None, None)
            .unwrap()
            .unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["hfds", "opottempdiff", "osaltdiff"]);

        assert!(wmt
            .transform_hlamdot_and_integrate(Lambda::Salt, Some(Process::BoundaryForcing), Some(&bins))
            .unwrap()
            .is_none());
    }
}
