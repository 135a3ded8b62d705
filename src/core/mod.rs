pub mod error;
pub mod segment;

pub use error::{ReconcileError, RemoteExecutionError, Result, ValidationError, ValidationRule};
pub use segment::{
    COORDINATOR_CONTENT_ID, ContentId, Dbid, Segment, SegmentMode, SegmentRole, SegmentRow,
    SegmentStatus,
};
