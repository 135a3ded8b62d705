use crate::core::{Dbid, Segment, SegmentRole};
use crate::topology::TopologySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Classification of every segment in a (current, goal) topology pair.
///
/// Each set is ordered by dbid. A dbid lands in exactly one set:
/// - only in current: `mirror_to_remove` / `primary_to_remove` by current role,
/// - only in goal: `primary_to_add` / `mirror_to_add` by current role,
/// - in both and equal: `segment_unchanged`,
/// - in both, forced or differing beyond mode/status: `mirror_to_remove_and_add`,
/// - in both, differing only in mode/status: `segment_to_update`.
///
/// Records in the last three sets are the goal records. Computing a diff never fails;
/// policy checks belong to [`super::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentDiff {
    mirror_to_remove: Vec<Segment>,
    primary_to_remove: Vec<Segment>,
    primary_to_add: Vec<Segment>,
    mirror_to_add: Vec<Segment>,
    mirror_to_remove_and_add: Vec<Segment>,
    segment_to_update: Vec<Segment>,
    segment_unchanged: Vec<Segment>,
    replaced_originals: BTreeMap<Dbid, Segment>,
}

impl SegmentDiff {
    pub fn compute(
        current: &TopologySnapshot,
        goal: &TopologySnapshot,
        force_remove_and_add: &BTreeSet<Dbid>,
    ) -> Self {
        let mut diff = Self::default();

        for original in current {
            match goal.get(original.dbid()) {
                None => match original.role() {
                    SegmentRole::Mirror => diff.mirror_to_remove.push(original.clone()),
                    SegmentRole::Primary => diff.primary_to_remove.push(original.clone()),
                },
                Some(target) => {
                    let forced = force_remove_and_add.contains(&original.dbid());
                    if !forced && original == target {
                        diff.segment_unchanged.push(target.clone());
                    } else if forced || !original.equal_ignoring_mode_and_status(target) {
                        diff.replaced_originals
                            .insert(original.dbid(), original.clone());
                        diff.mirror_to_remove_and_add.push(target.clone());
                    } else {
                        diff.segment_to_update.push(target.clone());
                    }
                }
            }
        }

        for target in goal {
            if current.contains(target.dbid()) {
                continue;
            }
            match target.role() {
                SegmentRole::Primary => diff.primary_to_add.push(target.clone()),
                SegmentRole::Mirror => diff.mirror_to_add.push(target.clone()),
            }
        }

        diff
    }

    pub fn mirror_to_remove(&self) -> &[Segment] {
        &self.mirror_to_remove
    }

    pub fn primary_to_remove(&self) -> &[Segment] {
        &self.primary_to_remove
    }

    pub fn primary_to_add(&self) -> &[Segment] {
        &self.primary_to_add
    }

    pub fn mirror_to_add(&self) -> &[Segment] {
        &self.mirror_to_add
    }

    /// Goal records replacing a current record wholesale; see [`Self::original_of`].
    pub fn mirror_to_remove_and_add(&self) -> &[Segment] {
        &self.mirror_to_remove_and_add
    }

    pub fn segment_to_update(&self) -> &[Segment] {
        &self.segment_to_update
    }

    pub fn segment_unchanged(&self) -> &[Segment] {
        &self.segment_unchanged
    }

    /// The post-reconciliation topology: everything that survives, in the order
    /// primary_to_add, mirror_to_add, mirror_to_remove_and_add, segment_to_update,
    /// segment_unchanged.
    pub fn final_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.primary_to_add
            .iter()
            .chain(&self.mirror_to_add)
            .chain(&self.mirror_to_remove_and_add)
            .chain(&self.segment_to_update)
            .chain(&self.segment_unchanged)
    }

    /// The current-catalog record that a `mirror_to_remove_and_add` entry replaces.
    pub fn original_of(&self, dbid: Dbid) -> Option<&Segment> {
        self.replaced_originals.get(&dbid)
    }

    /// True when applying the diff would change the catalog.
    pub fn has_changes(&self) -> bool {
        !(self.mirror_to_remove.is_empty()
            && self.primary_to_remove.is_empty()
            && self.primary_to_add.is_empty()
            && self.mirror_to_add.is_empty()
            && self.mirror_to_remove_and_add.is_empty()
            && self.segment_to_update.is_empty())
    }

    pub fn summary(&self) -> DiffSummary {
        fn ids(segments: &[Segment]) -> Vec<Dbid> {
            segments.iter().map(Segment::dbid).collect()
        }
        DiffSummary {
            mirror_to_remove: ids(&self.mirror_to_remove),
            primary_to_remove: ids(&self.primary_to_remove),
            primary_to_add: ids(&self.primary_to_add),
            mirror_to_add: ids(&self.mirror_to_add),
            mirror_to_remove_and_add: ids(&self.mirror_to_remove_and_add),
            segment_to_update: ids(&self.segment_to_update),
            segment_unchanged: ids(&self.segment_unchanged),
        }
    }
}

/// Dbids per classified set, for logging and machine-readable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub mirror_to_remove: Vec<Dbid>,
    pub primary_to_remove: Vec<Dbid>,
    pub primary_to_add: Vec<Dbid>,
    pub mirror_to_add: Vec<Dbid>,
    pub mirror_to_remove_and_add: Vec<Dbid>,
    pub segment_to_update: Vec<Dbid>,
    pub segment_unchanged: Vec<Dbid>,
}

impl DiffSummary {
    /// (set name, dbids) pairs in a fixed order.
    pub fn sets(&self) -> [(&'static str, &[Dbid]); 7] {
        [
            ("mirror_to_remove", self.mirror_to_remove.as_slice()),
            ("primary_to_remove", self.primary_to_remove.as_slice()),
            ("primary_to_add", self.primary_to_add.as_slice()),
            ("mirror_to_add", self.mirror_to_add.as_slice()),
            ("mirror_to_remove_and_add", self.mirror_to_remove_and_add.as_slice()),
            ("segment_to_update", self.segment_to_update.as_slice()),
            ("segment_unchanged", self.segment_unchanged.as_slice()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SegmentMode, SegmentStatus};

    fn seg(line: &str) -> Segment {
        Segment::parse_line(line).unwrap()
    }

    fn snapshot(lines: &[&str]) -> TopologySnapshot {
        TopologySnapshot::from_segments(lines.iter().map(|l| seg(l))).unwrap()
    }

    const COORDINATOR: &str = "1|-1|p|p|s|u|mdw|mdw|5432|/data/master/gpseg-1";
    const PRIMARY0: &str = "2|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0";
    const MIRROR0: &str = "3|0|m|m|s|u|sdw2|sdw2|50000|/data/mirror/gpseg0";

    #[test]
    fn test_identical_snapshots_are_unchanged() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let diff = SegmentDiff::compute(&current, &current.clone(), &BTreeSet::new());
        assert_eq!(diff.summary().segment_unchanged, vec![1, 2, 3]);
        assert!(!diff.has_changes());
        assert_eq!(diff.final_segments().count(), 3);
    }

    #[test]
    fn test_mode_and_status_changes_update_in_place() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let mirror = current.get(3).unwrap();
        let goal = current.with_segment(
            mirror
                .with_mode(SegmentMode::NotInSync)
                .with_status(SegmentStatus::Down),
        );

        let diff = SegmentDiff::compute(&current, &goal, &BTreeSet::new());
        let summary = diff.summary();
        assert_eq!(summary.segment_to_update, vec![3]);
        assert!(summary.mirror_to_remove_and_add.is_empty());
        assert_eq!(diff.segment_to_update[0].status(), SegmentStatus::Down);
        assert!(diff.original_of(3).is_none());
    }

    #[test]
    fn test_force_wins_over_equality() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let force = BTreeSet::from([3]);
        let diff = SegmentDiff::compute(&current, &current.clone(), &force);
        let summary = diff.summary();
        assert_eq!(summary.mirror_to_remove_and_add, vec![3]);
        assert_eq!(summary.segment_unchanged, vec![1, 2]);
        assert_eq!(diff.original_of(3), current.get(3));
    }

    #[test]
    fn test_force_also_wins_over_in_place_update() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let goal = current.with_segment(current.get(3).unwrap().with_status(SegmentStatus::Down));
        let diff = SegmentDiff::compute(&current, &goal, &BTreeSet::from([3]));
        assert_eq!(diff.summary().mirror_to_remove_and_add, vec![3]);
        assert!(diff.segment_to_update.is_empty());
    }

    #[test]
    fn test_core_attribute_change_routes_to_remove_and_add() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let moved = current
            .get(3)
            .unwrap()
            .with_location("sdw2", "sdw2", 50000, "/data/m1")
            .unwrap();
        let diff = SegmentDiff::compute(&current, &current.with_segment(moved.clone()), &BTreeSet::new());
        assert_eq!(diff.mirror_to_remove_and_add, vec![moved]);
        assert_eq!(
            diff.original_of(3).unwrap().data_directory(),
            "/data/mirror/gpseg0"
        );
    }

    #[test]
    fn test_additions_and_removals_are_split_by_role() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let goal = current
            .without(3)
            .with_segment(seg("10|5|p|p|s|u|sdw3|sdw3|40000|/data/primary/gpseg5"))
            .with_segment(seg("11|5|m|m|s|u|sdw4|sdw4|50000|/data/mirror/gpseg5"));
        let removed_primary = current.without(2);

        let diff = SegmentDiff::compute(&current, &goal, &BTreeSet::new());
        let summary = diff.summary();
        assert_eq!(summary.mirror_to_remove, vec![3]);
        assert_eq!(summary.primary_to_add, vec![10]);
        assert_eq!(summary.mirror_to_add, vec![11]);

        let diff = SegmentDiff::compute(&current, &removed_primary, &BTreeSet::new());
        assert_eq!(diff.summary().primary_to_remove, vec![2]);
    }

    #[test]
    fn test_removal_uses_current_role_after_failover() {
        let failed_over = snapshot(&[
            COORDINATOR,
            "2|0|m|p|n|d|sdw1|sdw1|40000|/data/primary/gpseg0",
            "3|0|p|m|n|u|sdw2|sdw2|50000|/data/mirror/gpseg0",
        ]);
        let diff = SegmentDiff::compute(&failed_over, &failed_over.without(2), &BTreeSet::new());
        assert_eq!(diff.summary().mirror_to_remove, vec![2]);
    }

    #[test]
    fn test_final_segments_order() {
        let current = snapshot(&[COORDINATOR, PRIMARY0, MIRROR0]);
        let goal = current
            .with_segment(current.get(2).unwrap().with_mode(SegmentMode::NotInSync))
            .with_segment(seg("11|5|m|m|s|u|sdw4|sdw4|50000|/data/mirror/gpseg5"))
            .with_segment(seg("10|5|p|p|s|u|sdw3|sdw3|40000|/data/primary/gpseg5"));
        let diff = SegmentDiff::compute(&current, &goal, &BTreeSet::from([3]));
        let order: Vec<Dbid> = diff.final_segments().map(Segment::dbid).collect();
        assert_eq!(order, vec![10, 11, 3, 2, 1]);
    }
}
