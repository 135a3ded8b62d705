use super::snapshot::group_by_host;
use crate::core::{Dbid, ReconcileError, Result, Segment};
use std::collections::HashMap;

/// Checks that no two segments on the same host share a port or a data directory.
pub fn check_port_and_directory_conflicts<'a>(
    segments: impl IntoIterator<Item = &'a Segment>,
) -> Result<()> {
    for (host, members) in group_by_host(segments) {
        let mut used_ports: HashMap<u16, Dbid> = HashMap::new();
        let mut used_dirs: HashMap<&str, Dbid> = HashMap::new();
        for seg in members {
            if let Some(other) = used_ports.insert(seg.port(), seg.dbid()) {
                return Err(ReconcileError::InvalidTopology(format!(
                    "Segment dbids {} and {} on host {} cannot have the same port {}",
                    other,
                    seg.dbid(),
                    host,
                    seg.port()
                )));
            }
            if let Some(other) = used_dirs.insert(seg.data_directory(), seg.dbid()) {
                return Err(ReconcileError::InvalidTopology(format!(
                    "Segment dbids {} and {} on host {} cannot have the same data directory '{}'",
                    other,
                    seg.dbid(),
                    host,
                    seg.data_directory()
                )));
            }
        }
    }
    Ok(())
}
