pub mod release_guard;
pub mod run_supervisor;

pub use release_guard::ReleaseGuard;
pub use run_supervisor::{
    AudioStatus, CycleReport, RunSupervisor, SupervisorConfig, SupervisorError, SupervisorState,
};
