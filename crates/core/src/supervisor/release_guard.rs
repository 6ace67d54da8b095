use std::ops::{Deref, DerefMut};

use crate::output::{DriverError, OutputDriver};

/// Owns an output driver and guarantees that, however the owner goes away,
/// every output is de-energized and then released exactly once.
///
/// The guard runs on drop as well, so panics unwinding through the
/// supervisor still leave the relays safe.
pub struct ReleaseGuard<D: OutputDriver> {
    driver: D,
    released: bool,
}

impl<D: OutputDriver> ReleaseGuard<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            released: false,
        }
    }

    /// De-energize all outputs, then release them. Later calls do nothing.
    pub fn release(&mut self) -> Result<(), DriverError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        log::info!("Cleaning up outputs...");
        let reset = self.driver.de_energize_all();
        let release = self.driver.release_all();
        reset.and(release)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<D: OutputDriver> Deref for ReleaseGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.driver
    }
}

impl<D: OutputDriver> DerefMut for ReleaseGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: OutputDriver> Drop for ReleaseGuard<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("Output cleanup failed: {}", e);
        }
    }
}
