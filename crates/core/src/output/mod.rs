pub mod driver;
pub mod gpio_driver;
pub mod simulated_driver;

// Re-export for convenience
pub use driver::{DriverError, OutputDriver, PinLevel};
pub use gpio_driver::{GpioDriver, DEFAULT_GPIO_ROOT};
pub use simulated_driver::{SimulatedDriver, SimulatedProbe};
