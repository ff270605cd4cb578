//! The emulated peripherals: the extended arithmetic element, the serial
//! line controller, and the display stubs.

pub mod eae;
pub mod serial;
pub mod stubs;

pub use eae::Eae;
pub use serial::{RxChar, SerialController};
pub use stubs::{RasterDisplay, VectorDisplay};
