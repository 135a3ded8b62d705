//! Segment line files: one `Segment::to_line` record per row.
//!
//! Used for goal topologies handed to the CLI and for saving a snapshot before
//! an expansion so it can be rolled back. The format is not meant for long-term storage.

use super::snapshot::TopologySnapshot;
use crate::core::{ReconcileError, Result, Segment};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Parses segment lines, skipping blank lines and `#` comments.
pub fn parse_segments(content: &str) -> Result<Vec<Segment>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            Segment::parse_line(line).map_err(|err| match err {
                ReconcileError::InvalidSegment(msg) => {
                    ReconcileError::InvalidSegment(format!("line {}: {}", idx + 1, msg))
                }
                other => other,
            })
        })
        .collect()
}

pub fn load_segments(path: impl AsRef<Path>) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ReconcileError::Io(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_segments(&content)
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<TopologySnapshot> {
    TopologySnapshot::from_segments(load_segments(path)?)
}

/// Writes the snapshot to `path`, replacing it atomically.
pub fn dump_snapshot(snapshot: &TopologySnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            ReconcileError::Io(format!("Failed to create directory: {}", e))
        })?;
    }
    let temp_path = path.with_extension("tmp");
    let temp_file = File::create(&temp_path)
        .map_err(|e| ReconcileError::Io(format!("Failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(temp_file);
    writeln!(writer, "# segconf snapshot written {}", Utc::now().to_rfc3339())?;
    writeln!(
        writer,
        "# dbid|content|role|preferred_role|mode|status|hostname|address|port|datadir"
    )?;
    for segment in snapshot {
        writeln!(writer, "{}", segment)?;
    }
    writer.flush()?;
    writer.get_mut().sync_all()?;
    fs::rename(&temp_path, path)
        .map_err(|e| ReconcileError::Io(format!("Failed to rename snapshot file: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let content = "\n# coordinator\n1|-1|p|p|s|u|mdw|mdw|5432|/data/master/gpseg-1\n\n";
        let segments = parse_segments(content).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let content = "1|-1|p|p|s|u|mdw|mdw|5432|/data/master/gpseg-1\n2|0|q|p|s|u|h|h|1|/d\n";
        let err = parse_segments(content).unwrap_err().to_string();
        assert!(err.contains("line 2"), "{}", err);
    }

    #[test]
    fn test_dump_then_load_restores_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("gparray.conf");
        let snapshot = TopologySnapshot::from_segments(parse_segments(
            "1|-1|p|p|s|u|mdw|mdw|5432|/data/master/gpseg-1\n\
             2|0|p|p|n|u|sdw1|sdw1-1|40000|/data/primary/gpseg0\n\
             3|0|m|m|n|d|sdw2|sdw2-1|50000|/data/mirror/gpseg0\n",
        )
        .unwrap())
        .unwrap();

        dump_snapshot(&snapshot, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# segconf snapshot written "));
    }
}
