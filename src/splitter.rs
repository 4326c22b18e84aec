//! Streaming mesh partitioning and re-indexing.
//!
//! This module is the driver: it pulls one Wavefront-style record at a time
//! from a forward (non-seekable) stream, classifies it, routes it to an
//! output partition, rewrites face indices to be partition-local, and hands
//! the result to the buffered writer. One output file is produced per
//! distinct (named-group, material) partition, and the accumulated
//! partition-to-material table is returned to the caller.
//!
//! Routing rules:
//!
//! - Declarations and faces seen before any `g` marker accumulate in a
//!   provisional default partition, which is migrated wholesale into the
//!   first named group (declarations before any group belong to whichever
//!   group comes first).
//! - A group's content is provisionally homed under its bare group name
//!   until a `usemtl` marker claims it, then retroactively relocated to the
//!   deterministic `{group}_{material}` partition. Repeated appearances of
//!   the same (group, material) pair route to the same partition.
//! - Re-emitting the current group's marker is a section delimiter, not a
//!   new section: it neither creates a partition nor resets the ledger.
//! - Migrations always move whole buffers together with their ledger
//!   accounting, so a group's vertex pool is never split from its faces.
//! - A face referencing a declaration routed to another partition gets a
//!   copy of that declaration carried into its own partition (every output
//!   file must resolve its indices in isolation).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

use crate::classify::{classify, Directive};
use crate::error::{Result, SplitError};
use crate::ledger::{DeclPool, IndexKind, IndexLedger};
use crate::reindex::reindex_face;
use crate::resolver::MaterialResolver;
use crate::writer::{BufferedWriter, DEFAULT_FLUSH_WATERMARK};

/// Configuration for one split pass.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Directory receiving one `.obj` file per partition.
    pub out_dir: PathBuf,
    /// Materials known for this mesh, supplied by the caller's material
    /// table. Used to resolve `usemtl` tokens.
    pub known_materials: BTreeSet<String>,
    /// Namespace prefixed onto resolved material identifiers to avoid
    /// cross-mesh collisions. Empty disables prefixing.
    pub namespace: String,
    /// Key the resolver falls back to for empty `usemtl` tokens, and the
    /// output name used when a stream contains no group markers at all.
    /// Typically the mesh's own file stem.
    pub fallback_key: String,
    /// Buffered lines per partition before flushing to disk.
    pub flush_watermark: usize,
}

impl SplitConfig {
    pub fn new(out_dir: impl Into<PathBuf>, fallback_key: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            known_materials: BTreeSet::new(),
            namespace: String::new(),
            fallback_key: fallback_key.into(),
            flush_watermark: DEFAULT_FLUSH_WATERMARK,
        }
    }

    pub fn with_materials(mut self, materials: impl IntoIterator<Item = String>) -> Self {
        self.known_materials = materials.into_iter().collect();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_flush_watermark(mut self, watermark: usize) -> Self {
        self.flush_watermark = watermark;
        self
    }
}

/// Result of one split pass.
#[derive(Debug)]
pub struct SplitOutput {
    /// Partition name to canonical material identifier, one entry per
    /// partition that received at least one face and was claimed by a
    /// `usemtl` marker.
    pub materials: BTreeMap<String, String>,
    /// Every partition file written, sorted.
    pub files: Vec<PathBuf>,
}

/// The streaming mesh splitter.
pub struct Splitter {
    config: SplitConfig,
    resolver: MaterialResolver,
}

/// The router's current focus.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Focus {
    NoGroup,
    InGroup(String),
}

/// Group key used for content seen before any named group.
const DEFAULT_GROUP: &str = "";

impl Splitter {
    pub fn new(config: SplitConfig) -> Self {
        let resolver = MaterialResolver::new(
            config.known_materials.iter().cloned(),
            config.namespace.clone(),
            config.fallback_key.clone(),
        );
        Self { config, resolver }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Split a mesh file into per-partition files next to `out_dir`.
    pub fn split_file(&self, input: impl AsRef<Path>) -> Result<SplitOutput> {
        let reader = BufReader::new(File::open(input.as_ref())?);
        self.split(reader)
    }

    /// Split one forward stream of Wavefront-style records.
    pub fn split<R: BufRead>(&self, reader: R) -> Result<SplitOutput> {
        let mut pass = Pass {
            pool: DeclPool::new(),
            ledger: IndexLedger::new(),
            writer: BufferedWriter::new(&self.config.out_dir, self.config.flush_watermark),
            focus: Focus::NoGroup,
            group_partition: HashMap::new(),
            materials: BTreeMap::new(),
            face_counts: HashMap::new(),
            default_name: self.config.fallback_key.clone(),
            resolver: &self.resolver,
            line_no: 0,
        };
        for line in reader.lines() {
            let line = line?;
            pass.line_no += 1;
            pass.record(line.trim_end_matches('\r'))?;
        }
        pass.finish()
    }
}

/// State for one pass over one input stream.
struct Pass<'a> {
    pool: DeclPool,
    ledger: IndexLedger,
    writer: BufferedWriter,
    focus: Focus,
    /// Group name (as it appears in the source) to the partition currently
    /// responsible for it. [`DEFAULT_GROUP`] tracks pre-group content once a
    /// material claims it.
    group_partition: HashMap<String, String>,
    /// Partition name to claimed material identifier.
    materials: BTreeMap<String, String>,
    face_counts: HashMap<String, u64>,
    default_name: String,
    resolver: &'a MaterialResolver,
    line_no: u64,
}

impl Pass<'_> {
    fn record(&mut self, line: &str) -> Result<()> {
        match classify(line) {
            Directive::Group(name) => self.on_group(name, line),
            Directive::UseMaterial(token) => self.on_usemtl(token),
            Directive::Vertex(_) => self.on_declaration(IndexKind::Vertex, line),
            Directive::Texcoord(_) => self.on_declaration(IndexKind::Texcoord, line),
            Directive::Normal(_) => self.on_declaration(IndexKind::Normal, line),
            Directive::Face(rest) => self.on_face(rest),
            Directive::Other(_) => {
                // Verbatim pass-through preserves comment/metadata locality.
                let dest = self.active_partition();
                self.writer.append(&dest, line)
            }
        }
    }

    fn on_declaration(&mut self, kind: IndexKind, line: &str) -> Result<()> {
        let dest = self.active_partition();
        let global = self.pool.push(kind, line);
        self.ledger.record(&dest, kind, global)?;
        self.writer.append(&dest, line)
    }

    fn on_face(&mut self, rest: &str) -> Result<()> {
        let dest = self.active_partition();
        let ledger = &mut self.ledger;
        let writer = &mut self.writer;
        let pool = &self.pool;
        let line_no = self.line_no;
        let face = reindex_face(rest, line_no, |kind, global| {
            if let Some(local) = ledger.local_index(&dest, kind, global)? {
                return Ok(local);
            }
            // Shared declaration routed elsewhere: carry a copy into this
            // partition so its file resolves in isolation.
            let Some(decl) = pool.line(kind, global) else {
                return Err(SplitError::DanglingIndex {
                    line: line_no,
                    index: global,
                });
            };
            writer.append(&dest, decl)?;
            ledger.record(&dest, kind, global)
        })?;
        *self.face_counts.entry(dest.clone()).or_default() += 1;
        self.writer.append(&dest, &face)
    }

    /// The partition currently receiving records, opening the provisional
    /// default partition on first use.
    fn active_partition(&mut self) -> String {
        let group = match &self.focus {
            Focus::InGroup(name) => name.clone(),
            Focus::NoGroup => DEFAULT_GROUP.to_string(),
        };
        if let Some(partition) = self.group_partition.get(&group) {
            return partition.clone();
        }
        // Only reachable before any group marker: content accumulates in
        // the default partition, provisionally named after the fallback key
        // (it is never written out under the name "default").
        self.ledger.open(&self.default_name);
        self.default_name.clone()
    }

    fn on_group(&mut self, name: &str, line: &str) -> Result<()> {
        if let Focus::InGroup(current) = &self.focus {
            if current == name {
                // Redundant re-open: a repeated group marker delimits the
                // same section and is ignored.
                return Ok(());
            }
        }
        let partition = match self.group_partition.get(name) {
            Some(existing) => existing.clone(),
            None => {
                let partition = name.to_string();
                if self.first_group_pending() {
                    // Declarations seen before any group belong to
                    // whichever group comes first.
                    self.migrate(&self.default_name.clone(), &partition)?;
                } else {
                    self.ledger.open(&partition);
                }
                self.group_partition.insert(name.to_string(), partition.clone());
                debug!("opened partition {partition:?} at line {}", self.line_no);
                partition
            }
        };
        self.writer.append(&partition, line)?;
        self.focus = Focus::InGroup(name.to_string());
        Ok(())
    }

    fn on_usemtl(&mut self, token: &str) -> Result<()> {
        let material = self.resolver.resolve(token);
        let group = match &self.focus {
            Focus::InGroup(name) => name.clone(),
            Focus::NoGroup => DEFAULT_GROUP.to_string(),
        };
        let source = self
            .group_partition
            .get(&group)
            .cloned()
            .unwrap_or_else(|| self.default_name.clone());
        let destination = partition_name(&group, &material);
        if destination != source {
            if self.materials.contains_key(&source) {
                // The group's earlier content was already claimed by a
                // different material and stays where it is; only the
                // routing changes.
                self.ledger.open(&destination);
            } else {
                // Rename-on-first-use: the group's provisional content is
                // retroactively relocated under its (group, material) name.
                self.migrate(&source, &destination)?;
            }
            self.group_partition.insert(group, destination.clone());
        }
        self.materials.insert(destination, material);
        Ok(())
    }

    /// Whether no named group has been established yet.
    fn first_group_pending(&self) -> bool {
        self.group_partition.is_empty() && self.focus == Focus::NoGroup
    }

    /// Move `src`'s buffered and flushed content, ledger accounting, and
    /// face count into `dst`.
    fn migrate(&mut self, src: &str, dst: &str) -> Result<()> {
        self.writer.rename_merge(src, dst)?;
        self.ledger.merge(src, dst);
        self.ledger.open(dst);
        if let Some(count) = self.face_counts.remove(src) {
            *self.face_counts.entry(dst.to_string()).or_default() += count;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<SplitOutput> {
        self.writer.flush_all()?;
        let files = self.writer.written_files();
        let materials = self
            .materials
            .into_iter()
            .filter(|(partition, _)| self.face_counts.get(partition).copied().unwrap_or(0) > 0)
            .collect();
        Ok(SplitOutput { materials, files })
    }
}

/// Deterministic partition name for a (group, material) pair. The material
/// identifier contributes its local (un-namespaced) name so partition file
/// names stay stable across namespaces.
fn partition_name(group: &str, material: &str) -> String {
    let local = material.rsplit_once(':').map_or(material, |(_, l)| l);
    if group.is_empty() {
        local.to_string()
    } else {
        format!("{group}_{local}")
    }
}
