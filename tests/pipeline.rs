//! End-to-end tests of the water-mass transformation pipeline.

use approx::assert_relative_eq;
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{array, Array2, Array3, Array4};
use xwmt::aggregate::{
    integrate_transformations, map_transformations, sum_components, AggregateOptions,
};
use xwmt::config::TransformationConfig;
use xwmt::isosurface::{isosurface_mean, isosurface_mean_map, IsosurfaceOptions};
use xwmt::output::Transformation;
use xwmt::transformation::WaterMassTransformations;
use xwmt_core::bins::Bins;
use xwmt_core::dataset::Dataset;
use xwmt_core::eos::SigmaLevel;
use xwmt_core::field::Field;
use xwmt_core::grid::AREA_NAME;
use xwmt_core::taxonomy::{Lambda, Process};

const RHO_REF: f64 = 1035.0;
const CP: f64 = 3992.0;

fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Single well-mixed column of two layers heated at the surface
///
/// `heating` holds the surface heat flux of each time step.
fn heated_column(time: Vec<NaiveDateTime>, heating: &[f64]) -> Dataset {
    let nt = time.len();
    let thetao = Array4::from_elem((nt, 2, 1, 1), 0.5);
    let hfds = Array3::from_shape_vec((nt, 1, 1), heating.to_vec()).unwrap();
    Dataset::builder(time, array![5.0, 15.0], array![0.0, 10.0, 20.0])
        .with_horizontal(AREA_NAME, Array2::ones((1, 1)))
        .with_field(Field::center("thetao", thetao))
        .with_field(Field::center("so", Array4::from_elem((nt, 2, 1, 1), 35.0)))
        .with_field(Field::surface("boundary_forcing_heat_tendency", hfds))
        .build()
        .unwrap()
}

/// Two columns with heat and salt tendencies for every diffusive process
fn diffusive_dataset() -> Dataset {
    let time = vec![date(2001, 1, 16), date(2001, 2, 15)];
    let thetao = Array4::from_shape_fn((2, 3, 1, 2), |(t, k, _, i)| {
        20.0 - 6.0 * k as f64 + 0.5 * t as f64 - 1.5 * i as f64
    });
    let so = Array4::from_shape_fn((2, 3, 1, 2), |(_, k, _, i)| 34.2 + 0.3 * k as f64 + 0.1 * i as f64);
    let heat = Array4::from_shape_fn((2, 3, 1, 2), |(t, k, _, i)| {
        [12.0, -4.0, -8.0][k] * (1.0 + 0.1 * t as f64 + 0.2 * i as f64)
    });
    let salt = Array4::from_shape_fn((2, 3, 1, 2), |(_, k, _, i)| {
        [2.0e-6, -1.0e-6, -1.0e-6][k] * (1.0 + i as f64)
    });
    let neutral = Array4::from_shape_fn((2, 3, 1, 2), |(_, k, _, _)| [1.0, 0.5, -1.5][k]);

    Dataset::builder(time, array![25.0, 100.0, 400.0], array![0.0, 50.0, 150.0, 650.0])
        .with_lat_lon(
            Array2::from_shape_vec((1, 2), vec![-30.0, 10.0]).unwrap(),
            Array2::from_shape_vec((1, 2), vec![150.0, 151.0]).unwrap(),
        )
        .with_horizontal(AREA_NAME, Array2::from_elem((1, 2), 1.0e8))
        .with_field(Field::center("thetao", thetao))
        .with_field(Field::center("so", so))
        .with_field(Field::center("opottempdiff", heat))
        .with_field(Field::center("osaltdiff", salt))
        .with_field(Field::center("opottemppmdiff", neutral))
        .build()
        .unwrap()
}

mod heated_column {
    use super::*;

    /// 100 W/m² of surface heating over one m² lands in the bin holding the surface temperature.
    #[test]
    fn test_surface_heating_transformation_rate() {
        let ds = heated_column(vec![date(2001, 1, 16)], &[100.0]);
        let wmt = WaterMassTransformations::new(ds, TransformationConfig::default()).unwrap();
        let bins = Bins::new(vec![-1.0, 0.0, 1.0]).unwrap();

        let g = integrate_transformations(
            &wmt,
            Lambda::Theta,
            Some(Process::BoundaryForcing),
            Some(&bins),
            AggregateOptions::default(),
        )
        .unwrap()
        .unwrap();
        let g = g.as_field().unwrap();
        assert_eq!(g.coord(), "thetao");
        assert_eq!(g.data().shape(), &[1, 2]);
        assert_eq!(g.data()[[0, 0]], 0.0);
        assert_relative_eq!(g.data()[[0, 1]], 100.0 / (RHO_REF * CP) / 1.0);
    }

    /// Processes without data give no result.
    #[test]
    fn test_missing_process_is_skipped() {
        let ds = heated_column(vec![date(2001, 1, 16)], &[100.0]);
        let wmt = WaterMassTransformations::new(ds, TransformationConfig::default()).unwrap();
        let result = integrate_transformations(
            &wmt,
            Lambda::Theta,
            Some(Process::FrazilIce),
            None,
            AggregateOptions::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    /// Unequal month lengths weight the time mean.
    #[test]
    fn test_isosurface_mean_weights_by_time_bounds() {
        let time = vec![date(2001, 2, 15), date(2001, 3, 16)];
        let bounds = vec![
            (date(2001, 2, 1), date(2001, 3, 1)),
            (date(2001, 3, 1), date(2001, 4, 1)),
        ];
        let ds = Dataset::builder(time.clone(), array![5.0, 15.0], array![0.0, 10.0, 20.0])
            .with_time_bounds("time_bounds", bounds);
        let column = heated_column(time, &[100.0, 200.0]);
        let ds = column
            .variable_names()
            .fold(ds, |builder, name| {
                builder.with_field(column.get(name).unwrap().clone())
            })
            .with_horizontal(AREA_NAME, Array2::ones((1, 1)))
            .build()
            .unwrap();

        let wmt = WaterMassTransformations::new(ds, TransformationConfig::default()).unwrap();
        let options = IsosurfaceOptions::default();
        let means = isosurface_mean(&wmt, Lambda::Theta, Some(Process::BoundaryForcing), &[0.5], &options)
            .unwrap()
            .unwrap();
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].values, vec![0.5]);

        let rate = |flux: f64| flux / (RHO_REF * CP) / options.dl;
        let expected = (28.0 * rate(100.0) + 31.0 * rate(200.0)) / 59.0;
        assert_eq!(means[0].data.shape(), &[1]);
        assert_relative_eq!(means[0].data[[0]], expected, max_relative = 1e-9);

        // Restricting the period to March leaves only the second step
        let march = IsosurfaceOptions {
            start: Some(date(2001, 3, 1)),
            ..IsosurfaceOptions::default()
        };
        let means = isosurface_mean(&wmt, Lambda::Theta, Some(Process::BoundaryForcing), &[0.5], &march)
            .unwrap()
            .unwrap();
        assert_relative_eq!(means[0].data[[0]], rate(200.0), max_relative = 1e-9);
    }

    /// Without calendar information no mean is formed.
    #[test]
    fn test_isosurface_mean_needs_calendar() {
        let ds = heated_column(vec![date(2001, 2, 15), date(2001, 3, 16)], &[100.0, 200.0]);
        let wmt = WaterMassTransformations::new(ds, TransformationConfig::default()).unwrap();
        let result = isosurface_mean(
            &wmt,
            Lambda::Theta,
            Some(Process::BoundaryForcing),
            &[0.5],
            &IsosurfaceOptions::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }
}

mod density_transformation {
    use super::*;

    /// Summing heat and salt paths does not depend on their order.
    #[test]
    fn test_component_sum_is_commutative() {
        let wmt = WaterMassTransformations::new(diffusive_dataset(), TransformationConfig::default())
            .unwrap();
        let lambda = Lambda::Density(SigmaLevel::Sigma2);
        let bins = Bins::define(30.0, 38.0, 0.25).unwrap();
        let raw = wmt
            .transform_hlamdot_and_integrate(lambda, Some(Process::VerticalDiffusion), Some(&bins))
            .unwrap()
            .unwrap();
        let heat = raw.get("opottempdiff").unwrap();
        let salt = raw.get("osaltdiff").unwrap();
        let heat_then_salt = heat.add(salt).unwrap();
        let salt_then_heat = salt.add(heat).unwrap();
        assert_eq!(heat_then_salt.data(), salt_then_heat.data());

        let mut summed = raw.clone();
        let taxonomy = &wmt.config().taxonomy;
        sum_components(&mut summed, taxonomy, &[Process::VerticalDiffusion], false).unwrap();
        assert_eq!(summed.len(), 1);
        assert_eq!(
            summed.get("vertical_diffusion").unwrap().data(),
            heat_then_salt.data()
        );
    }

    /// Heating lightens water and salting makes it denser.
    #[test]
    fn test_density_paths_have_expected_signs() {
        let wmt = WaterMassTransformations::new(diffusive_dataset(), TransformationConfig::default())
            .unwrap();
        let tendency = wmt
            .calc_hlamdot_and_lambda(Lambda::Density(SigmaLevel::Sigma0), Process::VerticalDiffusion)
            .unwrap()
            .unwrap();
        let heat = tendency.hlamdot[0].data();
        let salt = tendency.hlamdot[1].data();
        assert!(heat[[0, 0, 0, 0]] < 0.0);
        assert!(salt[[0, 0, 0, 0]] > 0.0);
        // Potential density increases downward in this stratification
        let sigma = tendency.lam.data();
        assert!(sigma[[0, 2, 0, 0]] > sigma[[0, 0, 0, 0]]);
    }

    /// Grouping and summing all processes gives a single total per category.
    #[test]
    fn test_grouped_map_transformations() {
        let wmt = WaterMassTransformations::new(diffusive_dataset(), TransformationConfig::default())
            .unwrap();
        let lambda = Lambda::Density(SigmaLevel::Sigma0);
        let bins = Bins::define(20.0, 30.0, 0.5).unwrap();
        let options = AggregateOptions {
            sum_components: false,
            group_processes: true,
        };
        let grouped = map_transformations(&wmt, lambda, None, Some(&bins), options)
            .unwrap()
            .unwrap();
        let grouped = grouped.as_set().unwrap();
        let diffusion_heat = grouped.get("diffusion_heat").unwrap();
        let expected = grouped
            .get("opottempdiff")
            .unwrap()
            .add(grouped.get("opottemppmdiff").unwrap())
            .unwrap();
        assert_eq!(diffusion_heat.data(), expected.data());
        assert_eq!(diffusion_heat.data().shape(), &[2, bins.len(), 1, 2]);
        assert!(grouped.get("diffusion_salt").is_some());
        assert!(grouped.get("advection_heat").is_none());

        let summed = map_transformations(
            &wmt,
            lambda,
            None,
            Some(&bins),
            AggregateOptions {
                sum_components: true,
                group_processes: true,
            },
        )
        .unwrap()
        .unwrap();
        let summed = summed.as_set().unwrap();
        assert!(summed.contains("diffusion"));
        assert!(!summed.contains("diffusion_heat"));
        assert!(summed.contains("vertical_diffusion"));
    }

    /// Monthly no-leap data is averaged with standard month lengths.
    #[test]
    fn test_isosurface_mean_map_on_noleap_calendar() {
        let ds = diffusive_dataset();
        let time = ds.time().to_vec();
        let ds = ds
            .variable_names()
            .fold(
                Dataset::builder(time, ds.lev().clone(), ds.lev_outer().clone())
                    .with_time_attr("calendar_type", "noleap")
                    .with_lat_lon(ds.lat().unwrap().clone(), ds.lon().unwrap().clone())
                    .with_horizontal(AREA_NAME, ds.horizontal(AREA_NAME).unwrap().clone()),
                |builder, name| builder.with_field(ds.get(name).unwrap().clone()),
            )
            .build()
            .unwrap();
        let wmt = WaterMassTransformations::new(ds, TransformationConfig::default()).unwrap();
        let options = IsosurfaceOptions {
            dl: 0.5,
            ..IsosurfaceOptions::default()
        };
        let means = isosurface_mean_map(
            &wmt,
            Lambda::Density(SigmaLevel::Sigma0),
            Some(Process::VerticalDiffusion),
            &[24.0, 26.0],
            &options,
        )
        .unwrap()
        .unwrap();
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].name, "vertical_diffusion");
        assert_eq!(means[0].coord, "sigma0");
        assert_eq!(means[0].data.shape(), &[2, 1, 2]);
        assert!(means[0].data.iter().all(|v| v.is_finite()));
    }
}

mod configuration {
    use super::*;

    /// A TOML configuration with a custom taxonomy drives the whole pipeline.
    #[test]
    fn test_toml_configuration() {
        let toml = r#"
            rho_ref = 1000.0
            cp = 4000.0

            [taxonomy.heat]
            scalar = "temp"
            [taxonomy.heat.processes]
            boundary_forcing = "hfds"

            [taxonomy.salt]
            scalar = "salt"
        "#;
        let config = TransformationConfig::from_toml_str(toml).unwrap();

        let source = heated_column(vec![date(2001, 1, 16)], &[100.0]);
        let ds = Dataset::builder(source.time().to_vec(), array![5.0, 15.0], array![0.0, 10.0, 20.0])
            .with_horizontal(AREA_NAME, Array2::ones((1, 1)))
            .with_field(source.get("thetao").unwrap().clone().rename("temp"))
            .with_field(source.get("so").unwrap().clone().rename("salt"))
            .with_field(
                source
                    .get("boundary_forcing_heat_tendency")
                    .unwrap()
                    .clone()
                    .rename("hfds"),
            )
            .build()
            .unwrap();

        let wmt = WaterMassTransformations::new(ds, config).unwrap();
        let bins = Bins::new(vec![0.0, 1.0]).unwrap();
        let g = integrate_transformations(&wmt, Lambda::Theta, None, Some(&bins), AggregateOptions::default())
            .unwrap()
            .unwrap();
        match g {
            Transformation::Field(field) => {
                assert_eq!(field.name(), "hfds");
                assert_eq!(field.coord(), "temp");
                assert_relative_eq!(field.data()[[0, 0]], 100.0 / (1000.0 * 4000.0));
            }
            Transformation::Set(set) => panic!("expected a single field, got {}", set.len()),
        }
    }

    /// Unknown lambda names are configuration errors.
    #[test]
    fn test_unknown_lambda() {
        assert!("sigma5".parse::<Lambda>().is_err());
        assert_eq!(
            "sigma4".parse::<Lambda>().unwrap(),
            Lambda::Density(SigmaLevel::Sigma4)
        );
    }
}
