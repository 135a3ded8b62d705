use super::layout::check_port_and_directory_conflicts;
use super::snapshot::TopologySnapshot;
use crate::core::{ContentId, Dbid, ReconcileError, Result, Segment};
use std::collections::BTreeMap;

/// Validates segments being added by a cluster expansion and returns the goal
/// topology (current segments plus the new ones).
///
/// New segments must:
/// - use content ids contiguous from the current highest content id,
/// - have one primary per content, plus one mirror exactly when the cluster is mirrored,
/// - use dbids that continue the current dbid sequence without gaps,
/// - not collide with existing ports or data directories on any host.
pub fn validate_expansion(
    current: &TopologySnapshot,
    new_segments: &[Segment],
) -> Result<TopologySnapshot> {
    if new_segments.is_empty() {
        return Err(ReconcileError::InvalidTopology(
            "No expansion segments defined".to_string(),
        ));
    }

    let mirrored = current.mirroring_enabled();
    let first_content = current
        .iter()
        .filter(|seg| !seg.is_query_dispatcher())
        .map(Segment::content_id)
        .max()
        .map_or(0, |content| content + 1);

    let mut by_content: BTreeMap<ContentId, Vec<&Segment>> = BTreeMap::new();
    for seg in new_segments {
        if seg.content_id() < first_content {
            return Err(ReconcileError::InvalidTopology(format!(
                "Invalid content id {} for expansion segment dbid {}",
                seg.content_id(),
                seg.dbid()
            )));
        }
        by_content.entry(seg.content_id()).or_default().push(seg);
    }

    for (expected, (content_id, members)) in (first_content..).zip(&by_content) {
        if *content_id != expected {
            return Err(ReconcileError::InvalidTopology(
                "Expansion segments do not have contiguous content ids".to_string(),
            ));
        }
        let primaries = members.iter().filter(|seg| seg.is_primary(false)).count();
        let mirrors = members.iter().filter(|seg| seg.is_mirror(false)).count();
        if primaries != 1 {
            return Err(ReconcileError::InvalidTopology(format!(
                "Expansion content {} must have exactly one primary, found {}",
                content_id, primaries
            )));
        }
        match (mirrored, mirrors) {
            (true, 1) | (false, 0) => {}
            (true, 0) => {
                return Err(ReconcileError::InvalidTopology(format!(
                    "Expansion segment for content {} has no mirror but mirroring is enabled",
                    content_id
                )));
            }
            (false, _) => {
                return Err(ReconcileError::InvalidTopology(format!(
                    "Expansion segment for content {} has a mirror but mirroring is not enabled",
                    content_id
                )));
            }
            (true, _) => {
                return Err(ReconcileError::InvalidTopology(format!(
                    "Expansion content {} has more than one mirror",
                    content_id
                )));
            }
        }
    }

    let mut dbids: Vec<Dbid> = new_segments.iter().map(Segment::dbid).collect();
    dbids.sort_unstable();
    let first_dbid = current.max_dbid() + 1;
    let contiguous = dbids
        .iter()
        .enumerate()
        .all(|(offset, dbid)| *dbid == first_dbid + offset as Dbid);
    if !contiguous {
        return Err(ReconcileError::InvalidTopology(format!(
            "Expansion segments have incorrect dbids: expected {} onwards, got {:?}",
            first_dbid, dbids
        )));
    }

    check_port_and_directory_conflicts(current.iter().chain(new_segments))?;

    Ok(new_segments
        .iter()
        .fold(current.clone(), |goal, seg| goal.with_segment(seg.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(line: &str) -> Segment {
        Segment::parse_line(line).unwrap()
    }

    fn mirrored_cluster() -> TopologySnapshot {
        TopologySnapshot::from_segments(vec![
            seg("1|-1|p|p|s|u|mdw|mdw|5432|/data/master/gpseg-1"),
            seg("2|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0"),
            seg("3|0|m|m|s|u|sdw2|sdw2|50000|/data/mirror/gpseg0"),
        ])
        .unwrap()
    }

    #[test]
    fn test_valid_expansion_returns_goal() {
        let current = mirrored_cluster();
        let new = vec![
            seg("4|1|p|p|s|u|sdw2|sdw2|40000|/data/primary/gpseg1"),
            seg("5|1|m|m|s|u|sdw1|sdw1|50000|/data/mirror/gpseg1"),
        ];
        let goal = validate_expansion(&current, &new).unwrap();
        assert_eq!(goal.len(), 5);
        assert!(goal.contains(4) && goal.contains(5));
    }

    #[test]
    fn test_missing_mirror_when_mirrored() {
        let new = vec![seg("4|1|p|p|s|u|sdw2|sdw2|40000|/data/primary/gpseg1")];
        let err = validate_expansion(&mirrored_cluster(), &new).unwrap_err();
        assert!(err.to_string().contains("no mirror"));
    }

    #[test]
    fn test_content_gap_is_rejected() {
        let new = vec![
            seg("4|2|p|p|s|u|sdw2|sdw2|40000|/data/primary/gpseg2"),
            seg("5|2|m|m|s|u|sdw1|sdw1|50000|/data/mirror/gpseg2"),
        ];
        let err = validate_expansion(&mirrored_cluster(), &new).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_dbid_gap_is_rejected() {
        let new = vec![
            seg("4|1|p|p|s|u|sdw2|sdw2|40000|/data/primary/gpseg1"),
            seg("6|1|m|m|s|u|sdw1|sdw1|50000|/data/mirror/gpseg1"),
        ];
        let err = validate_expansion(&mirrored_cluster(), &new).unwrap_err();
        assert!(err.to_string().contains("incorrect dbids"));
    }

    #[test]
    fn test_port_reuse_on_existing_host_is_rejected() {
        let new = vec![
            seg("4|1|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg1"),
            seg("5|1|m|m|s|u|sdw2|sdw2|50001|/data/mirror/gpseg1"),
        ];
        let err = validate_expansion(&mirrored_cluster(), &new).unwrap_err();
        assert!(err.to_string().contains("same port 40000"));
    }

    #[test]
    fn test_empty_expansion_is_rejected() {
        assert!(validate_expansion(&mirrored_cluster(), &[]).is_err());
    }
}
