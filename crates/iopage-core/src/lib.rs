//! Emulated peripheral core for a 16-bit memory-mapped parallel backplane
//! bus.
//!
//! Devices expose contiguous blocks of 16-bit registers at fixed octal
//! base addresses. The [`Bus`] adapter dispatches read (DATI) and write
//! (DATO, word or byte lane) cycles into per-register latches and invokes
//! the owning device's callback for registers marked active. Devices may
//! run background worker threads, raise prioritized interrupts, and react
//! to bus-wide INIT and power signals.

/// Bus model: cycles, dispatch, and interrupts.
pub mod bus;
pub use bus::{
    Bus, BusControl, DatoAccess, DeviceHandle, InterruptLine, InterruptRequest, SignalEdge,
    REGISTER_STRIDE,
};

/// Device model: register cells, shared base, configuration, capability
/// trait.
pub mod device;
pub use device::base::DeviceBase;
pub use device::params::{DeviceParams, Parameter};
pub use device::register::RegisterCell;
pub use device::{shared, BusDevice, SharedDevice, DEFAULT_WORKER_INTERVAL};

/// The emulated peripherals.
pub mod devices;
pub use devices::eae::{
    Eae, EAE_BASE_ADDR, EAE_INTR_LEVEL, EAE_INTR_VECTOR, SR_ACM1, SR_ACZ, SR_C, SR_DYN, SR_MQZ,
    SR_N, SR_NXV, SR_SXT, SR_Z,
};
pub use devices::serial::{
    RxChar, SerialController, LINE_COUNT, RX_FRAMING_ERR, RX_OVERRUN, RX_PARITY_ERR, RX_VALID,
    SCR_LINE_MASK, SCR_RX_INT_ENABLE, SCR_S_INT_ENABLE, SERIAL_BASE_ADDR, SERIAL_INTR_LEVEL,
    SERIAL_INTR_VECTOR, SERIAL_PRIORITY_SLOT, SILO_CAPACITY, SSR_ALARM_MASK, SSR_FILL_MASK,
    SSR_STORAGE_INT,
};
pub use devices::stubs::{
    RasterDisplay, VectorDisplay, RASTER_DISPLAY_BASE_ADDR, VECTOR_DISPLAY_BASE_ADDR,
};

/// Error taxonomy.
pub mod error;
pub use error::{BusError, InstallError, ParameterError};

/// Background worker harness.
pub mod worker;
pub use worker::WorkerHandle;

#[cfg(test)]
use env_logger as _;
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
