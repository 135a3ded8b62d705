/// Diff classification property tests
///
/// Checks set-level properties of the diff over a family of generated
/// (current, goal, force) combinations
/// Run with: cargo test --test diff_properties_tests

use segconf::{
    Dbid, Segment, SegmentDiff, SegmentMode, SegmentRole, SegmentStatus, TopologySnapshot,
    parse_segments,
};
use std::collections::BTreeSet;

fn base_cluster() -> TopologySnapshot {
    let lines = [
        "1|-1|p|p|n|u|cdw|cdw|5432|/data/coordinator/gpseg-1",
        "2|-1|m|m|s|u|scdw|scdw|5432|/data/coordinator/gpseg-1",
        "3|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0",
        "4|0|m|m|s|u|sdw2|sdw2|50000|/data/mirror/gpseg0",
        "5|1|p|p|s|u|sdw2|sdw2|40000|/data/primary/gpseg1",
        "6|1|m|m|s|u|sdw1|sdw1|50000|/data/mirror/gpseg1",
        "7|2|m|p|n|d|sdw1|sdw1|40001|/data/primary/gpseg2",
        "8|2|p|m|n|u|sdw2|sdw2|50001|/data/mirror/gpseg2",
    ];
    TopologySnapshot::from_segments(parse_segments(&lines.join("\n")).unwrap()).unwrap()
}

/// Applies the mutations selected by the bits of `mask` to `base`.
fn mutate(base: &TopologySnapshot, mask: u32) -> TopologySnapshot {
    let mut goal = base.clone();
    if mask & 1 != 0 {
        goal = goal.without(4);
    }
    if mask & 2 != 0 {
        goal = goal.with_segment(
            Segment::parse_line("9|3|p|p|n|u|sdw3|sdw3|40000|/data/primary/gpseg3").unwrap(),
        );
    }
    if mask & 4 != 0 {
        goal = goal.with_segment(
            Segment::parse_line("10|3|m|m|n|u|sdw1|sdw1|50002|/data/mirror/gpseg3").unwrap(),
        );
    }
    if mask & 8 != 0 {
        let seg = base.get(6).unwrap();
        goal = goal.with_segment(seg.with_mode(SegmentMode::NotInSync));
    }
    if mask & 16 != 0 {
        let seg = base.get(5).unwrap();
        goal = goal.with_segment(
            seg.with_location("sdw3", "sdw3", 40001, "/data/primary/gpseg1")
                .unwrap(),
        );
    }
    if mask & 32 != 0 {
        let seg = base.get(7).unwrap();
        goal = goal.with_segment(seg.with_role(SegmentRole::Primary).with_status(SegmentStatus::Up));
    }
    goal
}

fn cases() -> Vec<(TopologySnapshot, TopologySnapshot, BTreeSet<Dbid>)> {
    let base = base_cluster();
    let forces: [&[Dbid]; 3] = [&[], &[3, 6], &[1, 4, 9]];
    let mut cases = Vec::new();
    for mask in 0..64 {
        for force in forces {
            let goal = mutate(&base, mask);
            cases.push((base.clone(), goal.clone(), force.iter().copied().collect()));
            // Also run the reverse direction so every mutation is seen as an add and a remove.
            cases.push((goal, base.clone(), force.iter().copied().collect()));
        }
    }
    cases
}

fn all_sets(diff: &SegmentDiff) -> [&[Segment]; 7] {
    [
        diff.mirror_to_remove(),
        diff.primary_to_remove(),
        diff.primary_to_add(),
        diff.mirror_to_add(),
        diff.mirror_to_remove_and_add(),
        diff.segment_to_update(),
        diff.segment_unchanged(),
    ]
}

#[test]
fn test_sets_are_disjoint_and_cover_both_snapshots() {
    for (current, goal, force) in cases() {
        let diff = SegmentDiff::compute(&current, &goal, &force);

        let mut seen = BTreeSet::new();
        for set in all_sets(&diff) {
            for seg in set {
                assert!(seen.insert(seg.dbid()), "dbid {} classified twice", seg.dbid());
            }
        }
        let expected: BTreeSet<Dbid> = current.dbids().chain(goal.dbids()).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn test_compute_is_idempotent() {
    for (current, goal, force) in cases() {
        assert_eq!(
            SegmentDiff::compute(&current, &goal, &force),
            SegmentDiff::compute(&current, &goal, &force)
        );
    }
}

#[test]
fn test_mode_and_status_changes_route_to_update_unless_forced() {
    for (current, goal, force) in cases() {
        let diff = SegmentDiff::compute(&current, &goal, &force);
        for target in &goal {
            let Some(original) = current.get(target.dbid()) else {
                continue;
            };
            if original == target || !original.equal_ignoring_mode_and_status(target) {
                continue;
            }
            let dbid = target.dbid();
            let updated = diff.segment_to_update().iter().any(|s| s.dbid() == dbid);
            let replaced = diff.mirror_to_remove_and_add().iter().any(|s| s.dbid() == dbid);
            if force.contains(&dbid) {
                assert!(replaced && !updated, "forced dbid {dbid} should be replaced");
            } else {
                assert!(updated && !replaced, "dbid {dbid} should be updated in place");
            }
        }
    }
}

#[test]
fn test_force_wins_over_equality() {
    let base = base_cluster();
    for dbid in base.dbids() {
        let force: BTreeSet<Dbid> = [dbid].into_iter().collect();
        let diff = SegmentDiff::compute(&base, &base, &force);
        assert_eq!(diff.summary().mirror_to_remove_and_add, vec![dbid]);
        assert_eq!(diff.segment_unchanged().len(), base.len() - 1);
    }
}

#[test]
fn test_final_segments_match_goal() {
    for (current, goal, force) in cases() {
        let diff = SegmentDiff::compute(&current, &goal, &force);
        let mut finals: Vec<Segment> = diff.final_segments().cloned().collect();
        finals.sort_by_key(Segment::dbid);
        let expected: Vec<Segment> = goal.iter().cloned().collect();
        assert_eq!(finals, expected);
    }
}

#[test]
fn test_every_replacement_keeps_its_current_record() {
    for (current, goal, force) in cases() {
        let diff = SegmentDiff::compute(&current, &goal, &force);
        for target in diff.mirror_to_remove_and_add() {
            let original = diff.original_of(target.dbid());
            assert!(original.is_some(), "dbid {} has no original", target.dbid());
            assert_eq!(original, current.get(target.dbid()));
            assert_eq!(Some(target), goal.get(target.dbid()));
        }
        for seg in diff.segment_to_update().iter().chain(diff.segment_unchanged()) {
            assert!(diff.original_of(seg.dbid()).is_none());
        }
    }
}
