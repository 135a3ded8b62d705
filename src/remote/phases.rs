use super::command::{RemoteCommand, clean_segment_directories, start_segments, stop_segments};
use super::fanout::{DispatchReport, FanOut};
use crate::core::{Result, Segment};
use crate::reconcile::SegmentDiff;
use tracing::{Level, event};

/// A named batch of commands that must all finish before the next batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: &'static str,
    pub commands: Vec<RemoteCommand>,
    /// Failures are reported but do not stop later phases.
    pub tolerate_failures: bool,
}

fn rebuilt_segments(diff: &SegmentDiff) -> Vec<Segment> {
    diff.mirror_to_add()
        .iter()
        .chain(diff.mirror_to_remove_and_add())
        .cloned()
        .collect()
}

/// Host work that precedes copying data into new or relocated segments:
/// stop whatever currently runs at the old locations, then clear the new
/// data directories. Empty phases are omitted.
pub fn preparation_phases(diff: &SegmentDiff) -> Vec<Phase> {
    let retired = diff
        .mirror_to_remove()
        .iter()
        .chain(diff.primary_to_remove())
        .chain(
            diff.mirror_to_remove_and_add()
                .iter()
                .filter_map(|seg| diff.original_of(seg.dbid())),
        )
        .cloned()
        .collect::<Vec<_>>();

    let phases = [
        Phase {
            name: "stop segments",
            commands: stop_segments(&retired),
            // Segments already down make pg_ctl stop fail.
            tolerate_failures: true,
        },
        Phase {
            name: "clean segment directories",
            commands: clean_segment_directories(&rebuilt_segments(diff)),
            tolerate_failures: false,
        },
    ];
    phases
        .into_iter()
        .filter(|phase| !phase.commands.is_empty())
        .collect()
}

/// Starts every new or relocated segment once its data is in place.
pub fn start_phase(diff: &SegmentDiff) -> Phase {
    Phase {
        name: "start segments",
        commands: start_segments(&rebuilt_segments(diff)),
        tolerate_failures: false,
    }
}

/// Runs phases in order with the configured parallelism.
///
/// Stops after the first phase that has an intolerable failure; the reports of
/// the phases that ran are returned alongside.
pub async fn run_phases(
    fanout: &FanOut,
    phases: Vec<Phase>,
) -> (Vec<DispatchReport>, Result<()>) {
    let mut reports = Vec::with_capacity(phases.len());
    for phase in phases {
        event!(Level::INFO, phase = phase.name, commands = phase.commands.len(), "starting phase");
        let report = match fanout.dispatch_all(phase.commands).await {
            Ok(report) => report,
            Err(err) => return (reports, Err(err)),
        };
        let checked = report.check_results();
        reports.push(report);
        if let Err(err) = checked {
            if phase.tolerate_failures {
                event!(Level::WARN, phase = phase.name, error = %err, "ignoring phase failures");
            } else {
                return (reports, Err(err));
            }
        }
    }
    (reports, Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologySnapshot;
    use std::collections::BTreeSet;

    fn snapshot(lines: &[&str]) -> TopologySnapshot {
        TopologySnapshot::from_segments(lines.iter().map(|l| Segment::parse_line(l).unwrap()))
            .unwrap()
    }

    #[test]
    fn test_relocated_mirror_is_stopped_at_old_host_and_cleaned_at_new() {
        let current = snapshot(&[
            "1|-1|p|p|n|u|cdw|cdw|5432|/data/coordinator/gpseg-1",
            "2|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0",
            "3|0|m|m|s|u|sdw2|sdw2|50000|/data/mirror/gpseg0",
        ]);
        let goal = snapshot(&[
            "1|-1|p|p|n|u|cdw|cdw|5432|/data/coordinator/gpseg-1",
            "2|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0",
            "3|0|m|m|s|u|sdw3|sdw3|50000|/data/mirror/gpseg0",
        ]);
        let diff = SegmentDiff::compute(&current, &goal, &BTreeSet::new());

        let phases = preparation_phases(&diff);
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].commands[0].host, "sdw2");
        assert!(phases[0].tolerate_failures);
        assert_eq!(phases[1].commands[0].host, "sdw3");
        assert_eq!(phases[1].commands[0].command_line, "rm -rf '/data/mirror/gpseg0'");

        let start = start_phase(&diff);
        assert_eq!(start.commands.len(), 1);
        assert_eq!(start.commands[0].host, "sdw3");
    }

    #[test]
    fn test_no_changes_means_no_phases() {
        let current = snapshot(&["1|-1|p|p|n|u|cdw|cdw|5432|/data/coordinator/gpseg-1"]);
        let diff = SegmentDiff::compute(&current, &current, &BTreeSet::new());
        assert!(preparation_phases(&diff).is_empty());
        assert!(start_phase(&diff).commands.is_empty());
    }
}
