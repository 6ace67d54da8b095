pub mod show;

pub use show::{Light, Show, ShowCue, ShowError};
