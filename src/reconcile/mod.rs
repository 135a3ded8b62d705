pub mod catalog;
pub mod diff;
pub mod options;
pub mod reconciler;
pub mod validate;

pub use catalog::{InMemorySegmentCatalog, SegmentCatalog};
pub use diff::{DiffSummary, SegmentDiff};
pub use options::ReconcileOptions;
pub use reconciler::{Reconciler, plan_against};
pub use validate::validate;
