pub mod cue_engine;
pub mod progress;

pub use cue_engine::{CueEngine, RunOutcome, DEFAULT_QUANTUM};
pub use progress::{FiredCue, LogSink, OutcomeKind, ProgressEvent, ProgressSink};
