//! Bounded-memory output buffering for partitions.
//!
//! Each partition accumulates records in memory until a line-count
//! watermark, then appends them to its backing file. A partition revisited
//! later in the stream keeps appending to the same file, so record order in
//! the output always matches routing order. Re-homing a partition's content
//! (when a material claims a provisionally named group) is an explicit
//! ownership transfer: buffered lines move between buffers and any already
//! flushed content is appended file-to-file by streaming copy, never loaded
//! fully into memory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, SplitError};

/// Default flush watermark, in buffered lines per partition.
pub const DEFAULT_FLUSH_WATERMARK: usize = 10_000;

#[derive(Debug, Default)]
struct PartitionSink {
    buffer: Vec<String>,
    /// Whether this pass has created the backing file.
    flushed: bool,
}

/// Buffered, per-partition output writer.
#[derive(Debug)]
pub struct BufferedWriter {
    out_dir: PathBuf,
    watermark: usize,
    sinks: HashMap<String, PartitionSink>,
}

impl BufferedWriter {
    pub fn new(out_dir: impl Into<PathBuf>, watermark: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            watermark: watermark.max(1),
            sinks: HashMap::new(),
        }
    }

    /// Backing file path for a partition name.
    pub fn path_for(&self, partition: &str) -> PathBuf {
        self.out_dir.join(format!("{partition}.obj"))
    }

    /// Buffer one record for `partition`, flushing to disk at the watermark.
    pub fn append(&mut self, partition: &str, line: &str) -> Result<()> {
        let sink = self.sinks.entry(partition.to_string()).or_default();
        sink.buffer.push(line.to_string());
        if sink.buffer.len() >= self.watermark {
            self.flush_partition(partition)?;
        }
        Ok(())
    }

    /// Number of lines currently buffered for `partition`.
    pub fn buffered_len(&self, partition: &str) -> usize {
        self.sinks.get(partition).map_or(0, |s| s.buffer.len())
    }

    /// Whether `partition` has flushed anything to its backing file.
    pub fn has_file(&self, partition: &str) -> bool {
        self.sinks.get(partition).is_some_and(|s| s.flushed)
    }

    /// Move all of `src`'s content (buffered and on-disk) into `dst`,
    /// preserving record order, and forget `src`.
    pub fn rename_merge(&mut self, src: &str, dst: &str) -> Result<()> {
        if src == dst {
            return Ok(());
        }
        let Some(source) = self.sinks.remove(src) else {
            return Ok(());
        };
        debug!(
            "re-homing partition {src:?} -> {dst:?} ({} buffered lines{})",
            source.buffer.len(),
            if source.flushed { ", plus flushed file" } else { "" }
        );
        self.sinks.entry(dst.to_string()).or_default();
        if source.flushed {
            // dst's already-buffered lines precede src's flushed content in
            // routing order, so they must hit the file first.
            self.flush_partition(dst)?;
            let src_path = self.path_for(src);
            let dst_path = self.path_for(dst);
            let mut reader = File::open(&src_path)?;
            let mut writer = OpenOptions::new().append(true).open(&dst_path)?;
            io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            fs::remove_file(&src_path)?;
        }
        let sink = self.sinks.entry(dst.to_string()).or_default();
        sink.buffer.extend(source.buffer);
        Ok(())
    }

    /// Flush `partition`'s buffer to its backing file.
    ///
    /// The first flush refuses to touch a pre-existing file it did not
    /// create; later flushes append.
    pub fn flush_partition(&mut self, partition: &str) -> Result<()> {
        let path = self.path_for(partition);
        let Some(sink) = self.sinks.get_mut(partition) else {
            return Ok(());
        };
        if sink.buffer.is_empty() && sink.flushed {
            return Ok(());
        }
        let file = if sink.flushed {
            OpenOptions::new().append(true).open(&path)?
        } else {
            if path.exists() {
                return Err(SplitError::OutputCollision(path));
            }
            File::create(&path)?
        };
        let mut writer = BufWriter::new(file);
        for line in &sink.buffer {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        sink.flushed = true;
        sink.buffer.clear();
        Ok(())
    }

    /// Flush every partition holding buffered content. Called once at end
    /// of stream.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut names: Vec<String> = self
            .sinks
            .iter()
            .filter(|(_, s)| !s.buffer.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        for name in names {
            self.flush_partition(&name)?;
        }
        Ok(())
    }

    /// Drop a partition that never produced output.
    pub fn discard(&mut self, partition: &str) {
        self.sinks.remove(partition);
    }

    /// Paths of every file this pass has written.
    pub fn written_files(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .sinks
            .iter()
            .filter(|(_, s)| s.flushed)
            .map(|(name, _)| self.path_for(name))
            .collect();
        paths.sort();
        paths
    }
}

/// Read a partition file back as lines. Test and verification helper.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_buffer_holds_until_watermark() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 3);

        writer.append("a", "v 1 0 0").unwrap();
        writer.append("a", "v 0 1 0").unwrap();
        assert!(!writer.path_for("a").exists());
        assert_eq!(writer.buffered_len("a"), 2);

        writer.append("a", "v 0 0 1").unwrap();
        assert!(writer.path_for("a").exists());
        assert_eq!(writer.buffered_len("a"), 0);
        assert_eq!(
            read_lines(&writer.path_for("a")).unwrap(),
            vec!["v 1 0 0", "v 0 1 0", "v 0 0 1"]
        );
    }

    #[test]
    fn test_revisited_partition_appends_in_order() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 2);

        writer.append("a", "v 1 0 0").unwrap();
        writer.append("a", "v 2 0 0").unwrap();
        writer.append("b", "v 9 9 9").unwrap();
        writer.append("b", "v 8 8 8").unwrap();
        writer.append("a", "f 1 2 3").unwrap();
        writer.flush_all().unwrap();

        assert_eq!(
            read_lines(&writer.path_for("a")).unwrap(),
            vec!["v 1 0 0", "v 2 0 0", "f 1 2 3"]
        );
    }

    #[test]
    fn test_flush_all_drains_every_buffer() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 100);
        writer.append("x", "v 0 0 0").unwrap();
        writer.append("y", "v 1 1 1").unwrap();
        writer.flush_all().unwrap();
        assert_eq!(read_lines(&writer.path_for("x")).unwrap(), vec!["v 0 0 0"]);
        assert_eq!(read_lines(&writer.path_for("y")).unwrap(), vec!["v 1 1 1"]);
    }

    #[test]
    fn test_collision_with_unrelated_file_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.obj"), "not ours\n").unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 1);
        let err = writer.append("a", "v 0 0 0").unwrap_err();
        assert!(matches!(err, SplitError::OutputCollision(_)));
    }

    #[test]
    fn test_rename_merge_buffered_only() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 100);
        writer.append("src", "v 1 0 0").unwrap();
        writer.append("dst", "# header").unwrap();
        writer.rename_merge("src", "dst").unwrap();
        writer.flush_all().unwrap();

        assert!(!writer.path_for("src").exists());
        assert_eq!(
            read_lines(&writer.path_for("dst")).unwrap(),
            vec!["# header", "v 1 0 0"]
        );
    }

    #[test]
    fn test_rename_merge_carries_flushed_file() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 2);
        // src flushes its first two lines to disk, keeps one buffered.
        writer.append("src", "v 1 0 0").unwrap();
        writer.append("src", "v 2 0 0").unwrap();
        writer.append("src", "v 3 0 0").unwrap();
        assert!(writer.has_file("src"));

        writer.rename_merge("src", "dst").unwrap();
        writer.flush_all().unwrap();

        assert!(!writer.path_for("src").exists());
        assert_eq!(
            read_lines(&writer.path_for("dst")).unwrap(),
            vec!["v 1 0 0", "v 2 0 0", "v 3 0 0"]
        );
    }

    #[test]
    fn test_rename_merge_into_existing_partition() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 2);
        writer.append("dst", "v 1 0 0").unwrap();
        writer.append("dst", "v 2 0 0").unwrap(); // dst flushes
        writer.append("dst", "f 1 2 3").unwrap(); // buffered
        writer.append("src", "v 9 0 0").unwrap();
        writer.append("src", "v 8 0 0").unwrap(); // src flushes
        writer.append("src", "f 1 2 4").unwrap(); // buffered

        writer.rename_merge("src", "dst").unwrap();
        writer.flush_all().unwrap();

        assert_eq!(
            read_lines(&writer.path_for("dst")).unwrap(),
            vec!["v 1 0 0", "v 2 0 0", "f 1 2 3", "v 9 0 0", "v 8 0 0", "f 1 2 4"]
        );
    }

    #[test]
    fn test_rename_merge_to_self_is_noop() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 100);
        writer.append("a", "v 1 0 0").unwrap();
        writer.rename_merge("a", "a").unwrap();
        assert_eq!(writer.buffered_len("a"), 1);
    }

    #[test]
    fn test_empty_partition_writes_no_file() {
        let dir = tempdir().unwrap();
        let mut writer = BufferedWriter::new(dir.path(), 100);
        writer.discard("ghost");
        writer.flush_all().unwrap();
        assert!(writer.written_files().is_empty());
    }
}
