//! # Mesh Splitter
//!
//! A streaming partitioner and re-indexer for Wavefront-style OBJ meshes.
//!
//! ## Overview
//!
//! This library takes a single large polygon-mesh file containing many named
//! sub-meshes interleaved with shared vertex data, and rewrites it into one
//! output file per distinct (named-group, material) partition, with all face
//! indices remapped to be valid within each partition in isolation. The
//! input is processed strictly forward: partitions buffer output up to a
//! line-count watermark and then append to disk, while declaration lines
//! are retained so shared vertex data can be carried into every partition
//! that references it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mesh_splitter::{SplitConfig, Splitter};
//!
//! let config = SplitConfig::new("out/", "cornell_box")
//!     .with_materials(vec!["white".to_string(), "red".to_string()])
//!     .with_namespace("cornell");
//! let output = Splitter::new(config).split_file("cornell_box.obj")?;
//!
//! // One file per (group, material) partition, plus the table the scene
//! // converter uses to bind shapes to materials.
//! for (partition, material) in &output.materials {
//!     println!("{partition} -> {material}");
//! }
//! ```
//!
//! ## Pipeline
//!
//! Many independent meshes can be converted concurrently with
//! [`run_pipeline`], which merges each unit's metadata into a global
//! aggregate and fails on genuine conflicts (duplicate shape names, two
//! units both designating the environment).

pub mod classify;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod reindex;
pub mod resolver;
pub mod splitter;
pub mod writer;

// Re-export main types for convenience
pub use classify::{classify, Directive};
pub use error::{Result, SplitError};
pub use ledger::{DeclPool, IndexKind, IndexLedger};
pub use pipeline::{run_pipeline, Aggregate, ConversionUnit, EnvironmentDesignation, UnitReport};
pub use reindex::reindex_face;
pub use resolver::{levenshtein, MaterialResolver};
pub use splitter::{SplitConfig, SplitOutput, Splitter};
pub use writer::{BufferedWriter, DEFAULT_FLUSH_WATERMARK};
