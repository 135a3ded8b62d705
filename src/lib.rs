// ============================================================================
// segconf: segment configuration reconciliation
// ============================================================================

//! Reconciles the segment catalog of a sharded cluster against a goal topology.
//!
//! A reconciliation diffs the current catalog against the goal, classifies every
//! segment into one of seven sets, validates the result, and only then writes it.
//! Host-level work (stopping, cleaning, starting segments) is fanned out with
//! bounded parallelism.
//!
//! # Examples
//!
//! ```
//! use segconf::{ReconcileOptions, TopologySnapshot, parse_segments, plan_against};
//!
//! # fn main() -> segconf::Result<()> {
//! let current = TopologySnapshot::from_segments(parse_segments(
//!     "1|-1|p|p|n|u|cdw|cdw|5432|/data/coordinator/gpseg-1\n\
//!      2|0|p|p|s|u|sdw1|sdw1|40000|/data/primary/gpseg0\n\
//!      3|0|m|m|s|u|sdw2|sdw2|50000|/data/mirror/gpseg0\n",
//! )?)?;
//! let goal = current.with_segment(current.get(3).unwrap().with_location(
//!     "sdw3", "sdw3", 50000, "/data/mirror/gpseg0",
//! )?);
//!
//! let diff = plan_against(&current, &goal, &ReconcileOptions::default())?;
//! assert_eq!(diff.summary().mirror_to_remove_and_add, vec![3]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod reconcile;
pub mod remote;
pub mod topology;

pub use config::FanOutConfig;
pub use core::{
    ContentId, Dbid, ReconcileError, RemoteExecutionError, Result, Segment, SegmentMode,
    SegmentRole, SegmentRow, SegmentStatus, ValidationError, ValidationRule,
};
pub use reconcile::{
    DiffSummary, InMemorySegmentCatalog, ReconcileOptions, Reconciler, SegmentCatalog,
    SegmentDiff, plan_against, validate,
};
pub use remote::{
    CommandOutcome, CommandResult, DispatchReport, FanOut, Phase, RemoteCommand, RemoteExecutor,
    ShellExecutor,
};
pub use topology::{
    TopologySnapshot, check_port_and_directory_conflicts, dump_snapshot, load_snapshot,
    parse_segments, validate_expansion,
};
