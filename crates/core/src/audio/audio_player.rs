use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("audio file not found: {0}")]
    MissingFile(PathBuf),

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open audio output: {0}")]
    Device(String),

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio process error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to signal audio process: {0}")]
    Signal(String),
}

/// Starts playback of a track. The track then runs on its own, outside the
/// caller's thread of control.
pub trait AudioPlayer {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError>;
}

/// Handle on one running track.
pub trait Playback {
    fn is_running(&mut self) -> bool;

    /// Ask the track to stop, forcing it after `grace`.
    fn terminate(&mut self, grace: Duration) -> Result<(), AudioError>;

    /// Block until the track has finished on its own.
    fn wait(&mut self) -> Result<(), AudioError>;
}

impl<P: AudioPlayer + ?Sized> AudioPlayer for Box<P> {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError> {
        (**self).start(track)
    }
}

/// Player for lights-only shows: every track "finishes" immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

struct SilentPlayback;

impl AudioPlayer for SilentPlayer {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError> {
        log::debug!("Silent player skipping {}", track.display());
        Ok(Box::new(SilentPlayback))
    }
}

impl Playback for SilentPlayback {
    fn is_running(&mut self) -> bool {
        false
    }

    fn terminate(&mut self, _grace: Duration) -> Result<(), AudioError> {
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}
