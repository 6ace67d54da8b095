use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::audio_player::{AudioError, AudioPlayer, Playback, StartError};

const EXIT_POLL: Duration = Duration::from_millis(10);

/// Plays tracks by launching an external player (`aplay` by default) with
/// the track path as its last argument.
#[derive(Debug, Clone)]
pub struct ProcessPlayer {
    command: String,
    args: Vec<String>,
}

impl ProcessPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn aplay() -> Self {
        Self::new("aplay", Vec::new())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for ProcessPlayer {
    fn default() -> Self {
        Self::aplay()
    }
}

impl AudioPlayer for ProcessPlayer {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError> {
        if !track.exists() {
            return Err(StartError::MissingFile(track.to_path_buf()));
        }

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(track)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| StartError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        log::info!(
            "Playing {} with {} (pid {})",
            track.display(),
            self.command,
            child.id()
        );

        Ok(Box::new(ProcessPlayback {
            child,
            command: self.command.clone(),
            exited: false,
        }))
    }
}

struct ProcessPlayback {
    child: Child,
    command: String,
    exited: bool,
}

impl ProcessPlayback {
    #[cfg(unix)]
    fn request_stop(&mut self) -> Result<(), AudioError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM)
            .map_err(|e| AudioError::Signal(e.to_string()))
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) -> Result<(), AudioError> {
        self.child.kill()?;
        Ok(())
    }
}

impl ProcessPlayback {
    /// A failed poll counts as still running so the kill path is not skipped.
    fn running_after(&mut self, poll: io::Result<Option<ExitStatus>>) -> bool {
        match poll {
            Ok(Some(status)) => {
                log::debug!("{} exited with {}", self.command, status);
                self.exited = true;
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::warn!("Could not poll {}: {}", self.command, e);
                true
            }
        }
    }
}

impl Playback for ProcessPlayback {
    fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }
        let poll = self.child.try_wait();
        self.running_after(poll)
    }

    fn terminate(&mut self, grace: Duration) -> Result<(), AudioError> {
        if !self.is_running() {
            return Ok(());
        }

        log::info!("Stopping audio...");
        self.request_stop()?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.is_running() {
                return Ok(());
            }
            thread::sleep(EXIT_POLL);
        }

        log::warn!(
            "{} ignored stop request for {:?}, killing it",
            self.command,
            grace
        );
        self.child.kill()?;
        self.child.wait()?;
        self.exited = true;
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        if self.exited {
            return Ok(());
        }
        let status = self.child.wait()?;
        self.exited = true;
        if !status.success() {
            log::warn!("{} finished with {}", self.command, status);
        }
        Ok(())
    }
}

impl Drop for ProcessPlayback {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
