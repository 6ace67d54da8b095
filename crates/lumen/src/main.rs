use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lumen_core::{
    spawn_signal_listener, AudioBackend, AudioPlayer, CancelToken, ConfigManager, CueTable,
    GpioDriver, LogSink, OutputBackend, OutputDriver, ProcessPlayer, ProgressEvent, ProgressSink,
    RunOutcome, RunSupervisor, Settings, Show, SilentPlayer, SimulatedDriver,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod schedule;

use schedule::Schedule;

/// Runs relay-driven lights in step with an audio track, unattended.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Timed light and audio cue runner")]
struct Args {
    /// Settings file (created with defaults if missing)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Show file; the built-in monologue chase is used when omitted
    #[arg(short, long)]
    show: Option<PathBuf>,

    /// Drive in-memory outputs instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Run the lights without any audio
    #[arg(long)]
    no_audio: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the show (the default)
    Run,
    /// Switch each relay on and off in turn to check the wiring
    TestOutputs {
        /// Time each relay stays on, in milliseconds
        #[arg(long, default_value = "1000")]
        step_ms: u64,

        /// Number of passes over all relays
        #[arg(long, default_value = "1")]
        rounds: u32,
    },
    /// Validate the settings and show without touching any output
    Check,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(outcome) => exit_code(&outcome),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed | RunOutcome::Cancelled => ExitCode::SUCCESS,
        RunOutcome::Fault(_) => ExitCode::FAILURE,
    }
}

fn run(args: Args) -> anyhow::Result<RunOutcome> {
    let mut config = ConfigManager::new(Some(args.config.clone()));
    let mut settings = config
        .load()
        .with_context(|| format!("loading settings from {}", args.config.display()))?;
    if args.simulate {
        settings.output_backend = OutputBackend::Simulated;
    }
    if args.no_audio {
        settings.audio_backend = AudioBackend::None;
    }

    let show = match &args.show {
        Some(path) => Show::load(path)?,
        None => Show::monologue(),
    };
    let outputs = show.outputs();

    match args.command.unwrap_or(Command::Run) {
        Command::Check => {
            check(&show, &settings)?;
            Ok(RunOutcome::Completed)
        }
        Command::TestOutputs { step_ms, rounds } => {
            let table = CueTable::walk(&outputs, Duration::from_millis(step_ms));
            supervise(&settings, &show, |supervisor, sink| {
                test_outputs(supervisor, &table, rounds, sink)
            })
        }
        Command::Run => {
            let table = CueTable::build(show.raw_cues()?, &outputs)?;
            let track = match settings.audio_backend {
                AudioBackend::None => None,
                _ => show.audio_file.clone(),
            };
            let mut schedule = Schedule::from_settings(&settings);
            if args.once {
                schedule = schedule.once();
            }
            supervise(&settings, &show, |supervisor, sink| {
                Ok(schedule.run(supervisor, &table, track.as_deref(), sink)?)
            })
        }
    }
}

type Supervisor = RunSupervisor<Box<dyn OutputDriver>, Box<dyn AudioPlayer>>;

/// Log progress from a task on `handle`, keeping log I/O off the cue thread.
///
/// The task ends once every sender is dropped and yields the number of
/// events it wrote.
fn spawn_log_reporter(
    handle: &Handle,
) -> (mpsc::UnboundedSender<ProgressEvent>, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reporter = handle.spawn(async move {
        let mut log = LogSink;
        let mut written = 0;
        while let Some(event) = rx.recv().await {
            log.emit(event);
            written += 1;
        }
        written
    });
    (tx, reporter)
}

/// Claim the outputs, hook up signals, hand the supervisor to `body` and
/// release everything afterwards whatever `body` returned.
fn supervise<F>(settings: &Settings, show: &Show, body: F) -> anyhow::Result<RunOutcome>
where
    F: FnOnce(&mut Supervisor, &mut dyn ProgressSink) -> anyhow::Result<RunOutcome>,
{
    let runtime = tokio::runtime::Runtime::new().context("starting signal runtime")?;
    let cancel = CancelToken::new();
    let _listener = spawn_signal_listener(runtime.handle(), cancel.clone());
    let (mut progress, reporter) = spawn_log_reporter(runtime.handle());

    let mut supervisor = RunSupervisor::start(
        make_driver(settings),
        &show.outputs(),
        settings.active_low,
        make_player(settings)?,
        cancel,
        settings.supervisor_config(),
    )
    .context("initializing outputs")?;
    log::info!(
        "Show '{}' ready on {} outputs ({:?})",
        show.name,
        show.outputs().len(),
        settings.output_backend
    );

    let result = body(&mut supervisor, &mut progress);
    let cleanup = supervisor.shutdown(&mut progress);
    drop(progress);
    match runtime.block_on(reporter) {
        Ok(written) => log::debug!("Reported {} progress events", written),
        Err(e) => log::warn!("Progress reporter stopped early: {}", e),
    }

    let outcome = result?;
    cleanup.context("releasing outputs")?;
    if let RunOutcome::Fault(e) = &outcome {
        log::error!("Stopped on output fault: {}", e);
    }
    Ok(outcome)
}

fn make_driver(settings: &Settings) -> Box<dyn OutputDriver> {
    match settings.output_backend {
        OutputBackend::Gpio => Box::new(GpioDriver::new(&settings.gpio_root)),
        OutputBackend::Simulated => Box::new(SimulatedDriver::new()),
    }
}

fn make_player(settings: &Settings) -> anyhow::Result<Box<dyn AudioPlayer>> {
    Ok(match settings.audio_backend {
        AudioBackend::Process => Box::new(ProcessPlayer::new(
            settings.audio_command.clone(),
            settings.audio_args.clone(),
        )),
        #[cfg(feature = "rodio")]
        AudioBackend::Rodio => Box::new(lumen_core::RodioPlayer::new()),
        #[cfg(not(feature = "rodio"))]
        AudioBackend::Rodio => {
            bail!("audio_backend \"rodio\" needs lumen built with --features rodio")
        }
        AudioBackend::None => Box::new(SilentPlayer),
    })
}

fn test_outputs(
    supervisor: &mut Supervisor,
    table: &CueTable,
    rounds: u32,
    sink: &mut dyn ProgressSink,
) -> anyhow::Result<RunOutcome> {
    let mut outcome = RunOutcome::Completed;
    for round in 1..=rounds {
        log::info!("Relay walk {}/{}", round, rounds);
        outcome = supervisor.run_cycle(table, None, sink)?.outcome;
        if !outcome.is_completed() {
            break;
        }
    }
    Ok(outcome)
}

fn check(show: &Show, settings: &Settings) -> anyhow::Result<()> {
    let outputs = show.outputs();
    let table = CueTable::build(show.raw_cues()?, &outputs)?;

    println!("Show: {}", show.name);
    println!("Outputs: {:?} (active_low={})", settings.output_backend, settings.active_low);
    for light in &show.lights {
        println!("  {:<12} GPIO {}", light.name, light.pin);
    }
    println!("Cues: {} over {:.2}s", table.len(), table.span().as_secs_f64());
    for cue in &table {
        let name = show.light_name(cue.output).unwrap_or("?");
        println!("  {} ({})", cue, name);
    }

    match (&show.audio_file, settings.audio_backend) {
        (_, AudioBackend::None) | (None, _) => println!("Audio: none"),
        (Some(track), backend) => {
            check_track(track)?;
            println!("Audio: {} ({:?})", track.display(), backend);
        }
    }
    Ok(())
}

fn check_track(track: &Path) -> anyhow::Result<()> {
    if !track.is_file() {
        bail!("audio file {} not found", track.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_reporter_drains_every_event() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (mut progress, reporter) = spawn_log_reporter(runtime.handle());

        progress.emit(ProgressEvent::OutputsReset);
        progress.emit(ProgressEvent::AudioFinished);
        progress.emit(ProgressEvent::CleanupComplete);
        drop(progress);

        assert_eq!(runtime.block_on(reporter).unwrap(), 3);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&RunOutcome::Completed), ExitCode::SUCCESS);
        assert_eq!(exit_code(&RunOutcome::Cancelled), ExitCode::SUCCESS);
    }
}
