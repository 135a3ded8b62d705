pub mod command;
pub mod executor;
pub mod fanout;
pub mod phases;

pub use command::{
    CommandResult, RemoteCommand, clean_segment_directories, shell_quote, start_segments,
    stop_segments,
};
pub use executor::{RemoteExecutor, ShellExecutor};
pub use fanout::{CommandOutcome, DispatchReport, FanOut};
pub use phases::{Phase, preparation_phases, run_phases, start_phase};
