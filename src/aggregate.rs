//! Grouping of transformation results
//!
//! Raw results are keyed by the dataset variable of each tracer tendency.
//! [`group_processes`] adds per-tracer category sums such as
//! `diffusion_heat`, and [`sum_components`] combines the heat and salt
//! contributions of a process (or category) into a single field named after
//! the process. [`map_transformations`] and [`integrate_transformations`]
//! apply both on top of the lambda-space transformation.

use crate::output::{BinnedField, Transformation, TransformationSet};
use crate::transformation::WaterMassTransformations;
use serde::{Deserialize, Serialize};
use xwmt_core::bins::Bins;
use xwmt_core::errors::XwmtResult;
use xwmt_core::taxonomy::{
    CategoryTerms, Lambda, Process, ProcessCategory, ProcessTaxonomy, Tracer,
};

/// Level of decomposition of aggregated results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Combine heat and salt contributions of each process.
    /// Default: true
    pub sum_components: bool,

    /// Add category sums (diffusion, advection, ...) of the processes.
    /// Default: false
    pub group_processes: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            sum_components: true,
            group_processes: false,
        }
    }
}

/// Sum of the fields of `set` named in `names`, ignoring absent names
///
/// Returns `None` if none of the names is present.
fn sum_terms<'a, I>(set: &TransformationSet, names: I, name: &str) -> XwmtResult<Option<BinnedField>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total: Option<BinnedField> = None;
    for term in names {
        if let Some(field) = set.get(term) {
            total = Some(match total {
                Some(acc) => acc.add(field)?,
                None => field.clone(),
            });
        }
    }
    Ok(total.map(|f| f.rename(name)))
}

/// Add per-tracer category sums to `set`
///
/// Categories are named `<category>_<tracer>`. Addends missing from `set` are
/// skipped and a category without any addend is not added. Sums are always
/// formed from the process fields, so repeated grouping gives the same result.
pub fn group_processes(set: &mut TransformationSet, taxonomy: &ProcessTaxonomy) -> XwmtResult<()> {
    for tracer in Tracer::ALL {
        for category in ProcessCategory::ALL {
            let name = category.component_name(tracer);
            let addends: Vec<String> = match category.terms() {
                CategoryTerms::Processes(processes) => processes
                    .iter()
                    .filter_map(|p| taxonomy.variable(tracer, *p))
                    .map(|v| v.to_string())
                    .collect(),
                CategoryTerms::Categories(categories) => categories
                    .iter()
                    .map(|c| c.component_name(tracer))
                    .collect(),
            };
            if let Some(sum) = sum_terms(set, addends.iter().map(|a| a.as_str()), &name)? {
                set.insert(sum);
            }
        }
    }
    Ok(())
}

/// Combine the heat and salt contributions in `set`
///
/// For every process in `processes` mapped for both tracers, the heat and
/// salt fields are replaced by their sum, named after the process. With
/// `grouped`, the per-tracer categories are combined the same way.
pub fn sum_components(
    set: &mut TransformationSet,
    taxonomy: &ProcessTaxonomy,
    processes: &[Process],
    grouped: bool,
) -> XwmtResult<()> {
    let mut groups: Vec<(String, Vec<String>)> = processes
        .iter()
        .filter_map(|process| {
            let variables: Option<Vec<String>> = Tracer::ALL
                .iter()
                .map(|t| taxonomy.variable(*t, *process).map(|v| v.to_string()))
                .collect();
            variables.map(|v| (process.name().to_string(), v))
        })
        .collect();
    if grouped {
        groups.extend(ProcessCategory::ALL.iter().map(|category| {
            (
                category.name().to_string(),
                Tracer::ALL
                    .iter()
                    .map(|t| category.component_name(*t))
                    .collect(),
            )
        }));
    }

    for (name, components) in groups {
        if let Some(sum) = sum_terms(set, components.iter().map(|c| c.as_str()), &name)? {
            for component in components.iter() {
                set.remove(component);
            }
            set.insert(sum);
        }
    }
    Ok(())
}

fn aggregate(
    wmt: &WaterMassTransformations,
    mut set: TransformationSet,
    options: AggregateOptions,
) -> XwmtResult<Option<Transformation>> {
    let taxonomy = &wmt.config().taxonomy;
    if options.group_processes {
        group_processes(&mut set, taxonomy)?;
    }
    if options.sum_components {
        sum_components(
            &mut set,
            taxonomy,
            &wmt.processes(true),
            options.group_processes,
        )?;
    }
    if set.is_empty() {
        return Ok(None);
    }
    Ok(Some(Transformation::collapse(set)))
}

/// Spatial maps of the transformation rate, `[time, lambda, y, x]`
///
/// Without a process, all processes of the taxonomy are included.
pub fn map_transformations(
    wmt: &WaterMassTransformations,
    lambda: Lambda,
    process: Option<Process>,
    bins: Option<&Bins>,
    options: AggregateOptions,
) -> XwmtResult<Option<Transformation>> {
    let processes = match process {
        Some(process) => vec![process],
        None => wmt.processes(false),
    };
    let mut set = TransformationSet::new();
    for process in processes {
        if let Some(result) = wmt.transform_hlamdot(lambda, process, bins)? {
            set.merge(result);
        }
    }
    aggregate(wmt, set, options)
}

/// Area-integrated transformation rate G(λ, t)
pub fn integrate_transformations(
    wmt: &WaterMassTransformations,
    lambda: Lambda,
    process: Option<Process>,
    bins: Option<&Bins>,
    options: AggregateOptions,
) -> XwmtResult<Option<Transformation>> {
    match wmt.transform_hlamdot_and_integrate(lambda, process, bins)? {
        Some(set) => aggregate(wmt, set, options),
        None => Ok(None),
    }
}
