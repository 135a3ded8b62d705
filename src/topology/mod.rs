pub mod expansion;
pub mod file;
pub mod layout;
pub mod snapshot;

pub use expansion::validate_expansion;
pub use file::{dump_snapshot, load_segments, load_snapshot, parse_segments};
pub use layout::check_port_and_directory_conflicts;
pub use snapshot::TopologySnapshot;
