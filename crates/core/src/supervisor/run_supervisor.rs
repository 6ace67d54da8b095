use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::release_guard::ReleaseGuard;
use crate::audio::{AudioPlayer, Playback};
use crate::engine::{
    CueEngine, OutcomeKind, ProgressEvent, ProgressSink, RunOutcome, DEFAULT_QUANTUM,
};
use crate::output::{DriverError, OutputDriver};
use crate::signal::CancelToken;
use crate::{CueTable, OutputId, OutputState, RawCue, ValidationError};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid cue table: {0}")]
    Validation(#[from] ValidationError),

    #[error("output driver error: {0}")]
    Driver(#[from] DriverError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    OutputsReset,
    AudioStarted,
    CuesRunning,
    CuesCompleted,
    CuesCancelled,
    CuesFaulted,
    AudioAwaited,
    ShuttingDown,
}

/// What happened to the track during a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioStatus {
    NoTrack,
    StartFailed(String),
    Finished,
    Terminated,
    Failed(String),
}

#[derive(Debug)]
pub struct CycleReport {
    pub outcome: RunOutcome,
    pub audio: AudioStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Engine wait granularity.
    pub quantum: Duration,
    /// How long a stopped track gets to exit before it is killed.
    pub terminate_grace: Duration,
    /// How often a finished cue run checks whether the track has ended.
    pub audio_poll: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            terminate_grace: Duration::from_secs(1),
            audio_poll: Duration::from_millis(20),
        }
    }
}

/// Sequences one light + audio cycle at a time and owns the guarantee that
/// the outputs end up de-energized and released.
pub struct RunSupervisor<D: OutputDriver, P: AudioPlayer> {
    guard: ReleaseGuard<D>,
    player: P,
    engine: CueEngine,
    cancel: CancelToken,
    config: SupervisorConfig,
    state: SupervisorState,
    #[cfg(test)]
    visited: Vec<SupervisorState>,
}

impl<D: OutputDriver, P: AudioPlayer> RunSupervisor<D, P> {
    /// Take ownership of `driver` and initialize `outputs` on it.
    ///
    /// The release guard is in place before the first pin is touched, so a
    /// failure halfway through initialization still releases what was claimed.
    pub fn start(
        driver: D,
        outputs: &[OutputId],
        active_low: bool,
        player: P,
        cancel: CancelToken,
        config: SupervisorConfig,
    ) -> Result<Self, DriverError> {
        let mut guard = ReleaseGuard::new(driver);
        guard.initialize(outputs, active_low)?;

        Ok(Self {
            guard,
            player,
            engine: CueEngine::new(config.quantum),
            cancel,
            config,
            state: SupervisorState::Idle,
            #[cfg(test)]
            visited: vec![SupervisorState::Idle],
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn outputs(&self) -> &[OutputId] {
        self.guard.outputs()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Validate cues against the outputs this supervisor controls.
    pub fn build_table<I, R>(&self, raw: I) -> Result<CueTable, ValidationError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RawCue>,
    {
        CueTable::build(raw, self.guard.outputs())
    }

    fn transition(&mut self, next: SupervisorState) {
        log::debug!("Supervisor {:?} -> {:?}", self.state, next);
        self.state = next;
        #[cfg(test)]
        self.visited.push(next);
    }

    fn report_fault(sink: &mut dyn ProgressSink, error: &DriverError) {
        sink.emit(ProgressEvent::Fault {
            output: error.output(),
            reason: error.to_string(),
        });
    }

    /// Drive every output to `state`, e.g. for an interlude between cycles.
    pub fn hold_all(
        &mut self,
        state: OutputState,
        sink: &mut dyn ProgressSink,
    ) -> Result<(), SupervisorError> {
        if let Err(e) = self.guard.set_all(state.is_energized()) {
            Self::report_fault(sink, &e);
            return Err(e.into());
        }
        sink.emit(ProgressEvent::OutputsHeld { state });
        Ok(())
    }

    /// Run one full cycle: reset outputs, start the track, fire the cues,
    /// settle the track and reset the outputs again.
    pub fn run_cycle(
        &mut self,
        table: &CueTable,
        track: Option<&Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<CycleReport, SupervisorError> {
        sink.emit(ProgressEvent::CycleStarted {
            cues: table.len(),
            span: table.span(),
        });

        if self.cancel.is_cancelled() {
            self.transition(SupervisorState::ShuttingDown);
            sink.emit(ProgressEvent::CuesFinished {
                outcome: OutcomeKind::Cancelled,
                fired: 0,
                total: table.len(),
            });
            self.transition(SupervisorState::Idle);
            return Ok(CycleReport {
                outcome: RunOutcome::Cancelled,
                audio: AudioStatus::NoTrack,
            });
        }

        self.transition(SupervisorState::OutputsReset);
        if let Err(e) = self.guard.de_energize_all() {
            Self::report_fault(sink, &e);
            self.transition(SupervisorState::Idle);
            return Err(e.into());
        }
        sink.emit(ProgressEvent::OutputsReset);

        let mut playback = match track {
            Some(track) => self.start_audio(track, sink),
            None => Ok(None),
        };

        self.transition(SupervisorState::CuesRunning);
        let outcome = self.engine.run(table, &mut *self.guard, &self.cancel, sink);
        self.transition(match outcome {
            RunOutcome::Completed => SupervisorState::CuesCompleted,
            RunOutcome::Cancelled => SupervisorState::CuesCancelled,
            RunOutcome::Fault(_) => SupervisorState::CuesFaulted,
        });
        if self.cancel.is_cancelled() {
            self.transition(SupervisorState::ShuttingDown);
        }

        let audio = match &mut playback {
            Ok(Some(playback)) if outcome.is_completed() => {
                self.await_audio(&mut **playback, sink)
            }
            Ok(Some(playback)) => self.stop_audio(&mut **playback, sink),
            Ok(None) => AudioStatus::NoTrack,
            Err(reason) => AudioStatus::StartFailed(reason.clone()),
        };
        drop(playback);
        if self.state != SupervisorState::ShuttingDown {
            self.transition(SupervisorState::AudioAwaited);
        }

        let reset = self.guard.de_energize_all();
        self.transition(SupervisorState::Idle);

        let outcome = match (outcome, reset) {
            (outcome, Ok(())) => {
                sink.emit(ProgressEvent::OutputsReset);
                outcome
            }
            (RunOutcome::Fault(e), Err(reset_error)) => {
                log::error!("Output reset after fault also failed: {}", reset_error);
                Self::report_fault(sink, &reset_error);
                RunOutcome::Fault(e)
            }
            (_, Err(reset_error)) => {
                Self::report_fault(sink, &reset_error);
                RunOutcome::Fault(reset_error)
            }
        };

        Ok(CycleReport { outcome, audio })
    }

    fn start_audio(
        &mut self,
        track: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<Option<Box<dyn Playback>>, String> {
        match self.player.start(track) {
            Ok(playback) => {
                self.transition(SupervisorState::AudioStarted);
                sink.emit(ProgressEvent::AudioStarted {
                    track: track.to_path_buf(),
                });
                Ok(Some(playback))
            }
            Err(e) => {
                let reason = e.to_string();
                sink.emit(ProgressEvent::AudioStartFailed {
                    track: PathBuf::from(track),
                    reason: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    /// Wait for the track to end on its own, unless a cancellation arrives first.
    fn await_audio(
        &mut self,
        playback: &mut dyn Playback,
        sink: &mut dyn ProgressSink,
    ) -> AudioStatus {
        log::info!("Waiting for audio to finish...");
        while playback.is_running() {
            if self.cancel.is_cancelled() {
                if self.state != SupervisorState::ShuttingDown {
                    self.transition(SupervisorState::ShuttingDown);
                }
                return self.stop_audio(playback, sink);
            }
            thread::sleep(self.config.audio_poll);
        }

        match playback.wait() {
            Ok(()) => {
                sink.emit(ProgressEvent::AudioFinished);
                AudioStatus::Finished
            }
            Err(e) => {
                sink.emit(ProgressEvent::AudioError {
                    reason: e.to_string(),
                });
                AudioStatus::Failed(e.to_string())
            }
        }
    }

    fn stop_audio(
        &mut self,
        playback: &mut dyn Playback,
        sink: &mut dyn ProgressSink,
    ) -> AudioStatus {
        match playback.terminate(self.config.terminate_grace) {
            Ok(()) => {
                sink.emit(ProgressEvent::AudioTerminated);
                AudioStatus::Terminated
            }
            Err(e) => {
                sink.emit(ProgressEvent::AudioError {
                    reason: e.to_string(),
                });
                AudioStatus::Failed(e.to_string())
            }
        }
    }

    /// De-energize and release every output. Dropping the supervisor does
    /// the same; this variant reports the result.
    pub fn shutdown(mut self, sink: &mut dyn ProgressSink) -> Result<(), DriverError> {
        self.transition(SupervisorState::ShuttingDown);
        let result = self.guard.release();
        if result.is_ok() {
            sink.emit(ProgressEvent::CleanupComplete);
        }
        self.transition(SupervisorState::Idle);
        result
    }
}
