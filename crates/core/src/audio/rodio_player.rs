use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use super::audio_player::{AudioError, AudioPlayer, Playback, StartError};

const END_POLL: Duration = Duration::from_millis(20);

/// Plays tracks in-process on the default output device.
pub struct RodioPlayer {
    volume: f32,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self { volume: 1.0 }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayer for RodioPlayer {
    fn start(&mut self, track: &Path) -> Result<Box<dyn Playback>, StartError> {
        if !track.exists() {
            return Err(StartError::MissingFile(track.to_path_buf()));
        }

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| StartError::Device(e.to_string()))?;

        let file = File::open(track).map_err(|e| StartError::Decode {
            path: track.to_path_buf(),
            reason: e.to_string(),
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| StartError::Decode {
            path: track.to_path_buf(),
            reason: e.to_string(),
        })?;

        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume);
        sink.append(source);

        log::info!("Playing {} on the default output device", track.display());

        Ok(Box::new(RodioPlayback {
            sink,
            _stream: stream,
        }))
    }
}

struct RodioPlayback {
    sink: Sink,
    // dropping the stream silences the sink
    _stream: OutputStream,
}

impl Playback for RodioPlayback {
    fn is_running(&mut self) -> bool {
        !self.sink.empty()
    }

    fn terminate(&mut self, _grace: Duration) -> Result<(), AudioError> {
        if !self.sink.empty() {
            log::info!("Stopping audio...");
        }
        self.sink.stop();
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        while !self.sink.empty() {
            thread::sleep(END_POLL);
        }
        Ok(())
    }
}
