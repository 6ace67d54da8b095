use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OutputId, RawCue};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShowError {
    #[error("cue {index} refers to unknown light '{light}'")]
    UnknownLight { index: usize, light: String },

    #[error("light '{0}' is defined more than once")]
    DuplicateLight(String),

    #[error("GPIO {0} is assigned to more than one light")]
    DuplicatePin(u32),
}

/// A relay channel with a human name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Light {
    pub name: String,
    /// BCM GPIO number wired to the relay input
    pub pin: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShowCue {
    /// Seconds from the start of the track
    pub time: f64,
    pub light: String,
    pub on: bool,
}

/// Static description of one performance: which lights exist, which track
/// plays, and when each light switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub name: String,
    #[serde(default)]
    pub audio_file: Option<PathBuf>,
    pub lights: Vec<Light>,
    #[serde(default)]
    pub cues: Vec<ShowCue>,
}

impl Show {
    /// Load a show from a JSON file. A relative `audio_file` is resolved
    /// against the show file's directory.
    pub fn load(path: &Path) -> Result<Show> {
        let file =
            File::open(path).with_context(|| format!("opening show {}", path.display()))?;
        let mut show: Show = serde_json::from_reader(file)
            .with_context(|| format!("parsing show {}", path.display()))?;

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        show.audio_file = show.audio_file.take().map(|audio| {
            if audio.is_relative() {
                dir.join(audio)
            } else {
                audio
            }
        });

        show.check_lights()?;
        log::info!(
            "Loaded show '{}' with {} lights and {} cues",
            show.name,
            show.lights.len(),
            show.cues.len()
        );
        Ok(show)
    }

    fn check_lights(&self) -> Result<(), ShowError> {
        let mut names = HashSet::new();
        let mut pins = HashSet::new();
        for light in &self.lights {
            if !names.insert(light.name.as_str()) {
                return Err(ShowError::DuplicateLight(light.name.clone()));
            }
            if !pins.insert(light.pin) {
                return Err(ShowError::DuplicatePin(light.pin));
            }
        }
        Ok(())
    }

    pub fn outputs(&self) -> Vec<OutputId> {
        self.lights.iter().map(|light| OutputId(light.pin)).collect()
    }

    pub fn light_name(&self, output: OutputId) -> Option<&str> {
        self.lights
            .iter()
            .find(|light| light.pin == output.0)
            .map(|light| light.name.as_str())
    }

    /// Resolve light names into outputs, keeping declaration order.
    pub fn raw_cues(&self) -> Result<Vec<RawCue>, ShowError> {
        self.check_lights()?;
        self.cues
            .iter()
            .enumerate()
            .map(|(index, cue)| {
                self.lights
                    .iter()
                    .find(|light| light.name == cue.light)
                    .map(|light| RawCue::new(cue.time, light.pin, cue.on))
                    .ok_or_else(|| ShowError::UnknownLight {
                        index,
                        light: cue.light.clone(),
                    })
            })
            .collect()
    }

    /// The eight-light monologue chase: each light hands over to the next
    /// at the same instant it switches off.
    pub fn monologue() -> Show {
        let pins = [21, 20, 16, 12, 26, 19, 13, 6];
        let handovers = [0.23, 1.76, 3.17, 4.7, 6.23, 7.7, 9.15, 10.71, 12.14];

        let lights: Vec<Light> = pins
            .iter()
            .enumerate()
            .map(|(i, &pin)| Light {
                name: format!("Light {}", i + 1),
                pin,
            })
            .collect();

        let mut cues = Vec::with_capacity(lights.len() * 2);
        for (i, light) in lights.iter().enumerate() {
            cues.push(ShowCue {
                time: handovers[i],
                light: light.name.clone(),
                on: true,
            });
            cues.push(ShowCue {
                time: handovers[i + 1],
                light: light.name.clone(),
                on: false,
            });
        }

        Show {
            name: "Monologue".to_string(),
            audio_file: Some(PathBuf::from("testing_audio.wav")),
            lights,
            cues,
        }
    }
}
