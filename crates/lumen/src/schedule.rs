use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use lumen_core::{
    AudioPlayer, CueTable, OutputDriver, OutputState, ProgressSink, RunOutcome, RunSupervisor,
    Settings, SupervisorError, TimeWindow,
};

/// How cycles repeat around the cue run: pre-roll, interludes and the
/// daytime window during which the lights just stay on.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub repeat: bool,
    pub pre_roll: Duration,
    pub interlude_on: Duration,
    pub interlude_off: Duration,
    pub daytime: Option<TimeWindow>,
    pub daytime_check: Duration,
    pub clock: fn() -> NaiveTime,
}

fn local_time() -> NaiveTime {
    Local::now().time()
}

impl Schedule {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            repeat: settings.repeat,
            pre_roll: Duration::from_millis(settings.pre_roll_ms),
            interlude_on: Duration::from_secs(settings.interlude_on_secs),
            interlude_off: Duration::from_secs(settings.interlude_off_secs),
            daytime: settings.daytime,
            daytime_check: Duration::from_secs(settings.daytime_check_secs),
            clock: local_time,
        }
    }

    /// A single cycle straight away: no repeat, no daytime hold, no pre-roll.
    pub fn once(mut self) -> Self {
        self.repeat = false;
        self.daytime = None;
        self.pre_roll = Duration::ZERO;
        self
    }

    fn is_daytime(&self) -> bool {
        self.daytime
            .is_some_and(|window| window.contains((self.clock)()))
    }

    /// Run cycles until the schedule ends, a signal arrives or an output
    /// faults. Returns the outcome of the last cycle that ran.
    pub fn run<D, P>(
        &self,
        supervisor: &mut RunSupervisor<D, P>,
        table: &CueTable,
        track: Option<&Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, SupervisorError>
    where
        D: OutputDriver,
        P: AudioPlayer,
    {
        let cancel = supervisor.cancel_token().clone();
        let mut last = RunOutcome::Cancelled;
        let mut holding_daytime = false;
        let mut cycles = 0usize;

        while !cancel.is_cancelled() {
            if self.is_daytime() {
                if !holding_daytime {
                    log::info!("Inside daytime window, holding lights on");
                    supervisor.hold_all(OutputState::Energized, sink)?;
                    holding_daytime = true;
                }
                cancel.sleep(self.daytime_check);
                continue;
            }
            if holding_daytime {
                log::info!("Daytime window over, resuming the show");
                holding_daytime = false;
            }

            supervisor.hold_all(OutputState::DeEnergized, sink)?;
            if !cancel.sleep(self.pre_roll) {
                break;
            }

            cycles += 1;
            log::info!("Cycle {}", cycles);
            let report = supervisor.run_cycle(table, track, sink)?;
            log::debug!("Cycle {} audio: {:?}", cycles, report.audio);
            last = report.outcome;
            if !last.is_completed() || !self.repeat {
                break;
            }

            if !self.interlude(supervisor, OutputState::Energized, self.interlude_on, sink)?
                || !self.interlude(supervisor, OutputState::DeEnergized, self.interlude_off, sink)?
            {
                break;
            }
        }

        if cycles == 0 {
            log::info!("Stopped before the first cycle");
        }
        Ok(last)
    }

    /// Hold every output at `state` for `length`. Returns `false` if a
    /// cancellation cut the hold short.
    fn interlude<D, P>(
        &self,
        supervisor: &mut RunSupervisor<D, P>,
        state: OutputState,
        length: Duration,
        sink: &mut dyn ProgressSink,
    ) -> Result<bool, SupervisorError>
    where
        D: OutputDriver,
        P: AudioPlayer,
    {
        if length.is_zero() {
            return Ok(true);
        }
        supervisor.hold_all(state, sink)?;
        Ok(supervisor.cancel_token().sleep(length))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use lumen_core::{
        CancelToken, OutputId, ProgressEvent, SilentPlayer, SimulatedDriver, SupervisorConfig,
    };

    use super::*;

    fn schedule() -> Schedule {
        Schedule {
            repeat: true,
            pre_roll: Duration::ZERO,
            interlude_on: Duration::ZERO,
            interlude_off: Duration::ZERO,
            daytime: None,
            daytime_check: Duration::from_millis(10),
            clock: || NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        }
    }

    fn supervisor(cancel: CancelToken) -> RunSupervisor<SimulatedDriver, SilentPlayer> {
        RunSupervisor::start(
            SimulatedDriver::new(),
            &[OutputId(21), OutputId(20)],
            true,
            SilentPlayer,
            cancel,
            SupervisorConfig::default(),
        )
        .unwrap()
    }

    fn cycles(events: &[ProgressEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::CycleStarted { .. }))
            .count()
    }

    #[test]
    fn test_once_runs_a_single_cycle() {
        let mut supervisor = supervisor(CancelToken::new());
        let table = supervisor.build_table(vec![(0.0, 21, true)]).unwrap();
        let mut events = Vec::new();

        let outcome = schedule()
            .once()
            .run(&mut supervisor, &table, None, &mut events)
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(cycles(&events), 1);
    }

    #[test]
    fn test_repeat_until_cancelled() {
        let cancel = CancelToken::new();
        let mut supervisor = supervisor(cancel.clone());
        let table = supervisor
            .build_table(vec![(0.0, 21, true), (0.02, 21, false)])
            .unwrap();
        let mut events = Vec::new();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            cancel.cancel();
        });
        schedule()
            .run(&mut supervisor, &table, None, &mut events)
            .unwrap();
        canceller.join().unwrap();

        assert!(cycles(&events) > 1);
    }

    #[test]
    fn test_daytime_holds_lights_on() {
        let cancel = CancelToken::new();
        let mut supervisor = supervisor(cancel.clone());
        let table = supervisor.build_table(vec![(0.0, 21, true)]).unwrap();
        let mut events = Vec::new();
        let schedule = Schedule {
            daytime: Some(TimeWindow {
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }),
            clock: || NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            ..schedule()
        };

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            cancel.cancel();
        });
        let outcome = schedule
            .run(&mut supervisor, &table, None, &mut events)
            .unwrap();
        canceller.join().unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(cycles(&events), 0);
        // held once on entry, not on every check
        assert_eq!(
            events,
            vec![ProgressEvent::OutputsHeld {
                state: OutputState::Energized
            }]
        );
    }

    #[test]
    fn test_cancel_during_pre_roll_skips_cycle() {
        let cancel = CancelToken::new();
        let mut supervisor = supervisor(cancel.clone());
        let table = supervisor.build_table(vec![(0.0, 21, true)]).unwrap();
        let mut events = Vec::new();
        let schedule = Schedule {
            pre_roll: Duration::from_secs(30),
            ..schedule()
        };

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            cancel.cancel();
        });
        let outcome = schedule
            .run(&mut supervisor, &table, None, &mut events)
            .unwrap();
        canceller.join().unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(cycles(&events), 0);
    }

    #[test]
    fn test_interlude_holds_on_then_off() {
        let mut supervisor = supervisor(CancelToken::new());
        let table = supervisor.build_table(vec![(0.0, 21, true)]).unwrap();
        let mut events = Vec::new();
        let schedule = Schedule {
            repeat: true,
            interlude_on: Duration::from_millis(5),
            interlude_off: Duration::from_millis(5),
            ..schedule()
        };

        // one cycle plus its interlude, then stop via the token
        let cancel = supervisor.cancel_token().clone();
        let mut sink = StopAfterInterlude {
            events: &mut events,
            cancel,
        };
        schedule
            .run(&mut supervisor, &table, None, &mut sink)
            .unwrap();

        let held: Vec<OutputState> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::OutputsHeld { state } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            held,
            vec![
                OutputState::DeEnergized,
                OutputState::Energized,
                OutputState::DeEnergized
            ]
        );
    }

    /// Cancels once the off half of the first interlude has started.
    struct StopAfterInterlude<'a> {
        events: &'a mut Vec<ProgressEvent>,
        cancel: CancelToken,
    }

    impl ProgressSink for StopAfterInterlude<'_> {
        fn emit(&mut self, event: ProgressEvent) {
            let stop = event
                == ProgressEvent::OutputsHeld {
                    state: OutputState::DeEnergized,
                }
                && self.events.iter().any(|e| {
                    *e == ProgressEvent::OutputsHeld {
                        state: OutputState::Energized,
                    }
                });
            self.events.push(event);
            if stop {
                self.cancel.cancel();
            }
        }
    }
}
