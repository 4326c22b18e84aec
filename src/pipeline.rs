//! Concurrent multi-unit conversion pipeline.
//!
//! Each conversion unit is one independent splitter invocation with its own
//! input file and output directory; units share no state while running. A
//! fixed-size worker pool drives the units, and a sequential aggregation
//! step merges each unit's metadata (material map, shape names, a possible
//! single environment designation) into a global aggregate. Genuine
//! conflicts fail the aggregation rather than silently overwriting. There
//! is no cancellation: a unit runs to completion or its error aborts the
//! whole pipeline, and nothing is retried.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::splitter::{SplitConfig, Splitter};
use crate::writer::DEFAULT_FLUSH_WATERMARK;

/// One independent conversion unit, typically one top-level geometry
/// object. Deserialized from a JSON pipeline manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionUnit {
    /// Unit identity, used in diagnostics and conflict reports.
    pub name: String,
    /// Input mesh file.
    pub input: PathBuf,
    /// Output directory owned exclusively by this unit.
    pub out_dir: PathBuf,
    /// Materials known for this unit's mesh.
    #[serde(default)]
    pub materials: Vec<String>,
    /// Namespace for resolved material identifiers.
    #[serde(default)]
    pub namespace: String,
    /// Fallback key for empty `usemtl` tokens; defaults to the input file
    /// stem.
    #[serde(default)]
    pub fallback_key: Option<String>,
    /// Environment map this unit designates, if any. At most one unit per
    /// pipeline may carry one.
    #[serde(default)]
    pub environment: Option<String>,
}

impl ConversionUnit {
    fn fallback_key(&self) -> String {
        self.fallback_key.clone().unwrap_or_else(|| {
            self.input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.name.clone())
        })
    }
}

/// Metadata produced by one completed unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: String,
    /// Partition name to canonical material identifier.
    pub materials: BTreeMap<String, String>,
    /// Names of the partitions this unit wrote.
    pub shapes: BTreeSet<String>,
    pub environment: Option<String>,
}

/// The unique global environment designation and the unit that claimed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDesignation {
    pub unit: String,
    pub name: String,
}

/// Merged metadata across all units.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Aggregate {
    /// Partition name to canonical material identifier, across all units.
    pub materials: BTreeMap<String, String>,
    /// Shape (partition) name to the unit that produced it.
    pub shapes: BTreeMap<String, String>,
    pub environment: Option<EnvironmentDesignation>,
}

/// Run every unit on a fixed-size worker pool and merge their metadata.
///
/// `threads == 0` uses one worker per available core.
pub fn run_pipeline(units: &[ConversionUnit], threads: usize) -> Result<Aggregate> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SplitError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    let reports: Vec<Result<UnitReport>> =
        pool.install(|| units.par_iter().map(run_unit).collect());

    let mut aggregate = Aggregate::default();
    for report in reports {
        merge(&mut aggregate, report?)?;
    }
    Ok(aggregate)
}

fn run_unit(unit: &ConversionUnit) -> Result<UnitReport> {
    let wrap = |e: SplitError| SplitError::UnitFailed {
        unit: unit.name.clone(),
        source: Box::new(e),
    };
    info!("converting unit {:?} from {:?}", unit.name, unit.input);
    fs::create_dir_all(&unit.out_dir).map_err(|e| wrap(e.into()))?;
    let config = SplitConfig {
        out_dir: unit.out_dir.clone(),
        known_materials: unit.materials.iter().cloned().collect(),
        namespace: unit.namespace.clone(),
        fallback_key: unit.fallback_key(),
        flush_watermark: DEFAULT_FLUSH_WATERMARK,
    };
    let output = Splitter::new(config).split_file(&unit.input).map_err(wrap)?;
    let shapes = output
        .files
        .iter()
        .filter_map(|f| f.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    Ok(UnitReport {
        unit: unit.name.clone(),
        materials: output.materials,
        shapes,
        environment: unit.environment.clone(),
    })
}

fn merge(aggregate: &mut Aggregate, report: UnitReport) -> Result<()> {
    for shape in report.shapes {
        if let Some(first) = aggregate.shapes.get(&shape) {
            return Err(SplitError::ShapeConflict {
                shape,
                first: first.clone(),
                second: report.unit,
            });
        }
        aggregate.shapes.insert(shape, report.unit.clone());
    }
    aggregate.materials.extend(report.materials);
    if let Some(name) = report.environment {
        if let Some(existing) = &aggregate.environment {
            return Err(SplitError::EnvironmentConflict {
                first: existing.unit.clone(),
                second: report.unit,
            });
        }
        aggregate.environment = Some(EnvironmentDesignation {
            unit: report.unit,
            name,
        });
    }
    Ok(())
}
