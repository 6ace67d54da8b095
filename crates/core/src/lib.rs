pub use audio::{AudioError, AudioPlayer, Playback, ProcessPlayer, SilentPlayer, StartError};
#[cfg(feature = "rodio")]
pub use audio::RodioPlayer;
pub use config::{
    AudioBackend, ConfigError, ConfigFile, ConfigManager, ConfigOption, ConfigSchema, OutputBackend,
    Settings, TimeWindow,
};
pub use cue::{Cue, CueTable, OutputId, OutputState, RawCue, ValidationError};
pub use engine::{
    CueEngine, FiredCue, LogSink, OutcomeKind, ProgressEvent, ProgressSink, RunOutcome,
    DEFAULT_QUANTUM,
};
pub use output::{
    DriverError, GpioDriver, OutputDriver, PinLevel, SimulatedDriver, SimulatedProbe,
    DEFAULT_GPIO_ROOT,
};
pub use show::{Light, Show, ShowCue, ShowError};
pub use signal::{spawn_signal_listener, CancelToken};
pub use supervisor::{
    AudioStatus, CycleReport, ReleaseGuard, RunSupervisor, SupervisorConfig, SupervisorError,
    SupervisorState,
};

pub mod audio;
mod config;
mod cue;
pub mod engine;
pub mod output;
mod show;
mod signal;
pub mod supervisor;
