pub mod cue;
pub mod cue_table;

pub use cue::{Cue, OutputId, OutputState, RawCue};
pub use cue_table::{CueTable, ValidationError};
