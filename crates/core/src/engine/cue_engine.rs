use std::thread;
use std::time::{Duration, Instant};

use super::progress::{FiredCue, OutcomeKind, ProgressEvent, ProgressSink};
use crate::output::{DriverError, OutputDriver};
use crate::signal::CancelToken;
use crate::CueTable;

/// Default wait granularity. Bounds both lateness and cancellation latency.
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub enum RunOutcome {
    /// Every cue was applied.
    Completed,
    /// The cancel token was seen before the last cue was applied.
    Cancelled,
    /// A driver call failed; the remaining cues were not applied.
    Fault(DriverError),
}

impl RunOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed => OutcomeKind::Completed,
            Self::Cancelled => OutcomeKind::Cancelled,
            Self::Fault(_) => OutcomeKind::Faulted,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Fires the cues of a table against a monotonic clock.
///
/// Every offset is measured from the same start instant, so a late cue
/// delays nothing after it. Cues are never skipped or reordered.
#[derive(Debug, Clone, Copy)]
pub struct CueEngine {
    quantum: Duration,
}

impl CueEngine {
    pub fn new(quantum: Duration) -> Self {
        Self {
            quantum: quantum.max(Duration::from_micros(1)),
        }
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    pub fn run<D>(
        &self,
        table: &CueTable,
        driver: &mut D,
        cancel: &CancelToken,
        sink: &mut dyn ProgressSink,
    ) -> RunOutcome
    where
        D: OutputDriver + ?Sized,
    {
        let start = Instant::now();
        let total = table.len();

        for (cursor, cue) in table.iter().enumerate() {
            // Busy-wait in short sleeps; the quantum is the precision.
            loop {
                if cancel.is_cancelled() {
                    log::debug!("Cancellation seen before cue {}", cursor);
                    return Self::finish(RunOutcome::Cancelled, cursor, total, sink);
                }
                let elapsed = start.elapsed();
                if elapsed >= cue.offset {
                    break;
                }
                thread::sleep((cue.offset - elapsed).min(self.quantum));
            }

            let actual = start.elapsed();
            if let Err(e) = driver.set(cue.output, cue.state.is_energized()) {
                sink.emit(ProgressEvent::Fault {
                    output: cue.output,
                    reason: e.to_string(),
                });
                return Self::finish(RunOutcome::Fault(e), cursor, total, sink);
            }

            sink.emit(ProgressEvent::CueFired(FiredCue {
                index: cursor,
                scheduled: cue.offset,
                output: cue.output,
                state: cue.state,
                actual,
            }));
        }

        Self::finish(RunOutcome::Completed, total, total, sink)
    }

    fn finish(
        outcome: RunOutcome,
        fired: usize,
        total: usize,
        sink: &mut dyn ProgressSink,
    ) -> RunOutcome {
        sink.emit(ProgressEvent::CuesFinished {
            outcome: outcome.kind(),
            fired,
            total,
        });
        outcome
    }
}

impl Default for CueEngine {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM)
    }
}
