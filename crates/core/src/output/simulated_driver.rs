use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::driver::{DriverError, OutputDriver, PinLevel};
use crate::OutputId;

#[derive(Debug, Default)]
struct SimulatedState {
    levels: HashMap<OutputId, PinLevel>,
    active_low: bool,
    transitions: Vec<(OutputId, PinLevel)>,
    release_calls: usize,
}

/// In-memory stand-in for a relay board, for running shows without GPIO hardware.
pub struct SimulatedDriver {
    outputs: Vec<OutputId>,
    state: Arc<Mutex<SimulatedState>>,
}

/// Read-only view of a [`SimulatedDriver`] that stays valid after the driver
/// has been moved into a supervisor.
#[derive(Clone)]
pub struct SimulatedProbe {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            state: Arc::new(Mutex::new(SimulatedState::default())),
        }
    }

    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            state: self.state.clone(),
        }
    }

    fn drive(&self, output: OutputId, level: PinLevel) {
        let mut state = self.state.lock();
        state.levels.insert(output, level);
        state.transitions.push((output, level));
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDriver for SimulatedDriver {
    fn initialize(&mut self, outputs: &[OutputId], active_low: bool) -> Result<(), DriverError> {
        self.outputs = outputs.to_vec();
        self.state.lock().active_low = active_low;
        for &output in outputs {
            self.drive(output, PinLevel::for_state(false, active_low));
        }
        log::info!(
            "Simulated relay board ready with {} outputs (active_low={})",
            outputs.len(),
            active_low
        );
        Ok(())
    }

    fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    fn set(&mut self, output: OutputId, energized: bool) -> Result<(), DriverError> {
        if !self.outputs.contains(&output) {
            return Err(DriverError::UnknownOutput(output));
        }
        let active_low = self.state.lock().active_low;
        self.drive(output, PinLevel::for_state(energized, active_low));
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.release_calls += 1;
        for &output in &self.outputs {
            if state.levels.get(&output) != Some(&PinLevel::Released) {
                state.levels.insert(output, PinLevel::Released);
                state.transitions.push((output, PinLevel::Released));
            }
        }
        Ok(())
    }
}

impl SimulatedProbe {
    pub fn level(&self, output: OutputId) -> Option<PinLevel> {
        self.state.lock().levels.get(&output).copied()
    }

    /// Whether the relay on `output` is currently pulled in.
    pub fn is_energized(&self, output: OutputId) -> bool {
        let state = self.state.lock();
        state.levels.get(&output).copied() == Some(PinLevel::for_state(true, state.active_low))
    }

    pub fn transitions(&self) -> Vec<(OutputId, PinLevel)> {
        self.state.lock().transitions.clone()
    }

    pub fn release_calls(&self) -> usize {
        self.state.lock().release_calls
    }
}
