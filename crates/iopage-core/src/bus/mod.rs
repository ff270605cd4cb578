//! Bus model: cycle vocabulary, the adapter that dispatches cycles to
//! devices, and interrupt arbitration.

pub mod adapter;
pub mod cycle;
pub mod interrupt;

pub use adapter::{Bus, DeviceHandle};
pub use cycle::{BusControl, DatoAccess, SignalEdge, REGISTER_STRIDE};
pub use interrupt::{InterruptLine, InterruptRequest};
