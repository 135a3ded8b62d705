use super::diff::SegmentDiff;
use crate::core::{COORDINATOR_CONTENT_ID, ContentId, Dbid, SegmentRole, ValidationError};
use std::collections::BTreeMap;

/// Checks a diff against the cluster invariants before anything is written.
///
/// Rules are checked in order and the first violation is returned:
/// 1. primaries are only added or removed when `authorized_primary_changes`,
/// 2. each content id has at most one preferred primary and one preferred mirror,
/// 3. once any segment is mirrored, every primary is mirrored,
/// 4. remove-and-add only targets mirrors, never the coordinator or standby, and
///    never in utility mode.
pub fn validate(
    diff: &SegmentDiff,
    authorized_primary_changes: bool,
    utility_mode: bool,
) -> Result<(), ValidationError> {
    if !authorized_primary_changes {
        if let Some(seg) = diff.primary_to_add().iter().chain(diff.primary_to_remove()).next() {
            return Err(ValidationError::PrimaryChangeNotAuthorized { dbid: seg.dbid() });
        }
    }

    let mut primaries: BTreeMap<ContentId, Dbid> = BTreeMap::new();
    let mut mirrors: BTreeMap<ContentId, Dbid> = BTreeMap::new();
    for seg in diff.final_segments() {
        let by_content = match seg.preferred_role() {
            SegmentRole::Primary => &mut primaries,
            SegmentRole::Mirror => &mut mirrors,
        };
        if let Some(existing) = by_content.insert(seg.content_id(), seg.dbid()) {
            return Err(ValidationError::DuplicatePreferredRole {
                content_id: seg.content_id(),
                existing,
                conflicting: seg.dbid(),
            });
        }
    }

    let only_standby_mirrored = mirrors.keys().all(|content| *content == COORDINATOR_CONTENT_ID);
    if !only_standby_mirrored {
        if let Some(content_id) = primaries
            .keys()
            .find(|content| **content != COORDINATOR_CONTENT_ID && !mirrors.contains_key(content))
        {
            return Err(ValidationError::PrimaryWithoutMirror {
                content_id: *content_id,
            });
        }
    }

    for seg in diff.mirror_to_remove_and_add() {
        let dbid = seg.dbid();
        let original = diff.original_of(dbid).unwrap_or(seg);
        if original.is_query_dispatcher() {
            return Err(ValidationError::CoreChangeOfDispatcher { dbid });
        }
        if original.role() != SegmentRole::Mirror {
            return Err(ValidationError::CoreChangeOfPrimary { dbid });
        }
        if utility_mode {
            return Err(ValidationError::CoreChangeInUtilityMode { dbid });
        }
    }

    Ok(())
}
