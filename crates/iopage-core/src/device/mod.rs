//! Device model: register cells, shared device base, configuration, and
//! the capability trait implemented by every emulated peripheral.

pub mod base;
pub mod params;
pub mod register;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bus::cycle::{BusControl, DatoAccess, SignalEdge};
use crate::device::base::DeviceBase;
use crate::device::params::Parameter;
use crate::error::ParameterError;

/// Default pause between worker polls for devices that do not override it.
pub const DEFAULT_WORKER_INTERVAL: Duration = Duration::from_millis(100);

/// Capability set of an emulated bus device.
///
/// Every hook except the base accessors is defaultable; a register-only
/// stub implements nothing beyond `base`/`base_mut`. Hooks are invoked
/// with the device lock held: the bus-service thread calls
/// [`BusDevice::on_after_register_access`] and the signal hooks, the
/// device's worker thread calls [`BusDevice::worker_poll`]. Callbacks run
/// while the bus handshake is stalled and must return promptly.
pub trait BusDevice: Send {
    /// Shared identity, placement, and register block.
    fn base(&self) -> &DeviceBase;

    /// Mutable access to the shared state.
    fn base_mut(&mut self) -> &mut DeviceBase;

    /// Called after a bus cycle completed on a register whose activity flag
    /// matches the cycle direction. For writes the write latch already
    /// holds the merged value; for reads the sampled value has already been
    /// returned to the host and the callback prepares the next one.
    fn on_after_register_access(&mut self, index: usize, control: BusControl, access: DatoAccess) {
        let _ = (index, control, access);
    }

    /// Bus power transition. A rising DCLO edge means the device was
    /// powered up and must restore its reset state.
    fn on_power_changed(&mut self, aclo_edge: SignalEdge, dclo_edge: SignalEdge) {
        let _ = aclo_edge;
        if dclo_edge == SignalEdge::Rising {
            self.base_mut().reset_registers();
        }
    }

    /// INIT signal transition. While asserted the device holds its reset
    /// state: all registers at their reset values plus device-defined
    /// clearing of local state.
    fn on_init_changed(&mut self, asserted: bool) {
        if asserted {
            self.base_mut().reset_registers();
        }
    }

    /// Configuration option reassignment. The default validates and stores
    /// into the parameter record; devices with derived state override and
    /// delegate.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the option keeps its prior value.
    fn on_parameter_changed(&mut self, param: &Parameter) -> Result<(), ParameterError> {
        self.base_mut().params_mut().apply(param)
    }

    /// Whether the bus should run a background worker thread for this
    /// device.
    fn worker_enabled(&self) -> bool {
        false
    }

    /// One worker iteration. Runs under the device lock; returns how long
    /// the worker should sleep, unlocked, before the next iteration. The
    /// cancellation flag is checked by the harness between iterations.
    fn worker_poll(&mut self) -> Duration {
        DEFAULT_WORKER_INTERVAL
    }
}

/// How devices are shared between the bus-service thread and workers.
pub type SharedDevice = Arc<Mutex<dyn BusDevice>>;

/// Wraps a device for installation on a bus.
#[must_use]
pub fn shared<D: BusDevice + 'static>(device: D) -> SharedDevice {
    Arc::new(Mutex::new(device))
}
