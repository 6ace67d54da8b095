//! Test doubles shared by the supervisor scenarios.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lumen_core::{
    AudioError, AudioPlayer, DriverError, OutputDriver, OutputId, Playback, ProgressEvent,
    StartError,
};
use parking_lot::Mutex;

pub const A: u32 = 21;
pub const B: u32 = 20;

pub fn outputs() -> Vec<OutputId> {
    vec![OutputId(A), OutputId(B)]
}

/// Cues that were actually applied, in order.
pub fn fired(events: &[ProgressEvent]) -> Vec<(OutputId, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::CueFired(f) => Some((f.output, f.state.is_energized())),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioCall {
    Start(PathBuf),
    Terminate(Duration),
    Wait,
}

/// Player whose tracks last a fixed time and which records every call.
#[derive(Clone)]
pub struct ScriptedPlayer {
    pub track_length: Duration,
    pub refuse_start: bool,
    pub calls: Arc<Mutex<Vec<AudioCall>>>,
}

impl ScriptedPlayer {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            refuse_start: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn broken() -> Self {
        Self {
            refuse_start: true,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().clone()
    }
}

struct ScriptedPlayback {
    ends_at: Instant,
    stopped: bool,
    calls: Arc<Mutex<Vec<AudioCall>>>,
}

impl AudioPlayer for ScriptedPlayer {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError> {
        self.calls.lock().push(AudioCall::Start(track.to_path_buf()));
        if self.refuse_start {
            return Err(StartError::MissingFile(track.to_path_buf()));
        }
        Ok(Box::new(ScriptedPlayback {
            ends_at: Instant::now() + self.track_length,
            stopped: false,
            calls: self.calls.clone(),
        }))
    }
}

impl Playback for ScriptedPlayback {
    fn is_running(&mut self) -> bool {
        !self.stopped && Instant::now() < self.ends_at
    }

    fn terminate(&mut self, grace: Duration) -> Result<(), AudioError> {
        self.calls.lock().push(AudioCall::Terminate(grace));
        self.stopped = true;
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        self.calls.lock().push(AudioCall::Wait);
        let now = Instant::now();
        if now < self.ends_at {
            std::thread::sleep(self.ends_at - now);
        }
        Ok(())
    }
}

/// Relay board that records every call and fails the `fail_at`th `set`
/// (1-based, counted across the driver's lifetime).
#[derive(Clone, Default)]
pub struct FlakyDriver {
    pub outputs: Vec<OutputId>,
    pub fail_at: Option<usize>,
    pub log: Arc<Mutex<DriverLog>>,
}

#[derive(Debug, Default)]
pub struct DriverLog {
    pub sets: Vec<(OutputId, bool)>,
    pub energized: Vec<OutputId>,
    pub release_calls: usize,
}

impl FlakyDriver {
    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_at: Some(call),
            ..Self::default()
        }
    }

    pub fn is_energized(&self, output: OutputId) -> bool {
        self.log.lock().energized.contains(&output)
    }
}

impl OutputDriver for FlakyDriver {
    fn initialize(&mut self, outputs: &[OutputId], _active_low: bool) -> Result<(), DriverError> {
        self.outputs = outputs.to_vec();
        Ok(())
    }

    fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    fn set(&mut self, output: OutputId, energized: bool) -> Result<(), DriverError> {
        let mut log = self.log.lock();
        log.sets.push((output, energized));
        if Some(log.sets.len()) == self.fail_at {
            return Err(DriverError::Hardware {
                output,
                reason: "relay did not switch".to_string(),
            });
        }
        log.energized.retain(|o| *o != output);
        if energized {
            log.energized.push(output);
        }
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), DriverError> {
        self.log.lock().release_calls += 1;
        Ok(())
    }
}
