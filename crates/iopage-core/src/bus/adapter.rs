//! The bus adapter: owns installed devices, dispatches cycles to register
//! cells and callbacks, broadcasts INIT and power signals, and arbitrates
//! interrupt requests.
//!
//! The adapter is an explicitly constructed value; there is no process-wide
//! singleton. The thread calling [`Bus::dati`] / [`Bus::dato`] plays the
//! role of the bus-service actor: it holds the addressed device's lock for
//! the duration of the cycle, so callbacks must return promptly.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::bus::cycle::{BusControl, DatoAccess, SignalEdge};
use crate::bus::interrupt::{InterruptLine, InterruptRequest, PendingInterrupts};
use crate::device::params::Parameter;
use crate::device::SharedDevice;
use crate::error::{BusError, InstallError, ParameterError};
use crate::worker::WorkerHandle;

/// Opaque reference to an installed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(usize);

struct BusSlot {
    name: String,
    base: u32,
    end: u32,
    active: bool,
    device: SharedDevice,
    worker: Option<WorkerHandle>,
}

/// The bus adapter.
pub struct Bus {
    slots: Vec<Option<BusSlot>>,
    intr_tx: Sender<InterruptRequest>,
    intr_rx: Receiver<InterruptRequest>,
    pending: PendingInterrupts,
    init_asserted: bool,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (intr_tx, intr_rx) = unbounded();
        Self {
            slots: Vec::new(),
            intr_tx,
            intr_rx,
            pending: PendingInterrupts::default(),
            init_asserted: false,
        }
    }

    /// Installs a device: claims its address range, attaches the interrupt
    /// line, marks it enabled, starts its worker, and delivers the
    /// power-up DCLO cycle so the device comes up in reset state.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::AddressConflict`] when the claim overlaps an
    /// enabled device, or [`InstallError::UnalignedBase`] for an odd base
    /// address. The device is left uninstalled and disabled.
    pub fn install(&mut self, device: SharedDevice) -> Result<DeviceHandle, InstallError> {
        let (name, base, end, wants_worker) = {
            let mut dev = device.lock().expect("freshly constructed device lock");
            let (base, end) = dev.base().address_span();
            let name = dev.base().name().to_owned();
            if base % 2 != 0 {
                return Err(InstallError::UnalignedBase { device: name, base });
            }
            if let Some(other) = self.overlapping_claim(base, end, usize::MAX) {
                return Err(InstallError::AddressConflict {
                    device: name,
                    other,
                    base,
                    end,
                });
            }
            dev.base_mut().params_mut().enabled = true;
            dev.base_mut()
                .attach_interrupt_line(InterruptLine::new(self.intr_tx.clone()));
            let wants_worker = dev.worker_enabled();
            (name, base, end, wants_worker)
        };

        let handle = DeviceHandle(self.slots.len());
        debug!(target: "bus", "{name}: installed at {base:#o}..{end:#o}");
        self.slots.push(Some(BusSlot {
            name: name.clone(),
            base,
            end,
            active: true,
            device: device.clone(),
            worker: wants_worker.then(|| WorkerHandle::spawn(&name, device.clone())),
        }));

        // Power-up reset, DCLO asserted then released.
        Self::deliver_power(&device, &name, SignalEdge::None, SignalEdge::Rising);
        Self::deliver_power(&device, &name, SignalEdge::None, SignalEdge::Falling);
        Ok(handle)
    }

    /// Removes a device: stops its worker, releases the claim, detaches the
    /// interrupt line, and cancels its pending interrupts.
    pub fn remove(&mut self, handle: DeviceHandle) {
        let Some(slot) = self.slots.get_mut(handle.0).and_then(Option::take) else {
            return;
        };
        drop(slot.worker);
        if let Ok(mut dev) = slot.device.lock() {
            dev.base_mut().detach_interrupt_line();
            dev.base_mut().params_mut().enabled = false;
        }
        self.pending.cancel_device(&slot.name);
        debug!(target: "bus", "{}: removed", slot.name);
    }

    /// Shared handle to an installed device, for host-side inspection.
    #[must_use]
    pub fn device(&self, handle: DeviceHandle) -> Option<SharedDevice> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|slot| slot.device.clone())
    }

    /// Performs a DATI cycle: samples the addressed register's read latch,
    /// then runs the device callback when the register is read-active.
    ///
    /// # Errors
    ///
    /// See [`BusError`].
    pub fn dati(&self, addr: u32) -> Result<u16, BusError> {
        let (slot, index) = self.find(addr)?;
        let mut dev = slot
            .device
            .lock()
            .map_err(|_| BusError::DeviceWedged { addr })?;
        let value = dev.base().register(index).read();
        if dev.base().register(index).active_on_read() {
            dev.on_after_register_access(index, BusControl::Dati, DatoAccess::Word);
        }
        Ok(value)
    }

    /// Performs a full-word DATO cycle.
    ///
    /// # Errors
    ///
    /// See [`BusError`].
    pub fn dato(&self, addr: u32, value: u16) -> Result<(), BusError> {
        self.dato_access(addr, value, DatoAccess::Word)
    }

    /// Performs a DATO cycle on the low byte lane.
    ///
    /// # Errors
    ///
    /// See [`BusError`].
    pub fn dato_byte_low(&self, addr: u32, value: u16) -> Result<(), BusError> {
        self.dato_access(addr, value, DatoAccess::ByteLow)
    }

    /// Performs a DATO cycle on the high byte lane.
    ///
    /// # Errors
    ///
    /// See [`BusError`].
    pub fn dato_byte_high(&self, addr: u32, value: u16) -> Result<(), BusError> {
        self.dato_access(addr, value, DatoAccess::ByteHigh)
    }

    fn dato_access(&self, addr: u32, value: u16, access: DatoAccess) -> Result<(), BusError> {
        let (slot, index) = self.find(addr)?;
        let mut dev = slot
            .device
            .lock()
            .map_err(|_| BusError::DeviceWedged { addr })?;
        let active = {
            let reg = dev.base_mut().register_mut(index);
            reg.bus_write(value, access);
            if reg.active_on_write() {
                true
            } else {
                // Plain latch registers read back what was written.
                let merged = reg.write_latch();
                reg.device_write(merged);
                false
            }
        };
        if active {
            dev.on_after_register_access(index, BusControl::Dato, access);
        }
        Ok(())
    }

    /// Asserts or releases the bus-wide INIT signal and notifies every
    /// installed device.
    pub fn set_init(&mut self, asserted: bool) {
        if self.init_asserted == asserted {
            return;
        }
        self.init_asserted = asserted;
        debug!(target: "bus", "INIT {}", if asserted { "asserted" } else { "released" });
        for slot in self.slots.iter().flatten().filter(|s| s.active) {
            match slot.device.lock() {
                Ok(mut dev) => dev.on_init_changed(asserted),
                Err(_) => warn!(target: "bus", "{}: wedged, INIT not delivered", slot.name),
            }
        }
    }

    /// Current INIT line state.
    #[must_use]
    pub const fn init_asserted(&self) -> bool {
        self.init_asserted
    }

    /// Delivers a power signal transition to every installed device.
    pub fn set_power(&mut self, aclo_edge: SignalEdge, dclo_edge: SignalEdge) {
        for slot in self.slots.iter().flatten().filter(|s| s.active) {
            Self::deliver_power(&slot.device, &slot.name, aclo_edge, dclo_edge);
        }
    }

    /// Runs a full power cycle: DCLO asserted, then released. Devices
    /// restore their power-up defaults on the rising edge.
    pub fn power_cycle(&mut self) {
        self.set_power(SignalEdge::None, SignalEdge::Rising);
        self.set_power(SignalEdge::None, SignalEdge::Falling);
    }

    fn deliver_power(device: &SharedDevice, name: &str, aclo: SignalEdge, dclo: SignalEdge) {
        match device.lock() {
            Ok(mut dev) => dev.on_power_changed(aclo, dclo),
            Err(_) => warn!(target: "bus", "{name}: wedged, power edge not delivered"),
        }
    }

    /// Grants the highest-priority pending interrupt, if any: highest
    /// level first, lowest backplane slot within a level. Requests raised
    /// for an already pending `(level, slot)` pair collapse into one.
    pub fn take_interrupt(&mut self) -> Option<InterruptRequest> {
        self.pending.absorb(&self.intr_rx);
        self.pending.grant()
    }

    /// Reassigns one configuration option of an installed device.
    ///
    /// Enabling re-validates address overlap and restarts the worker;
    /// disabling releases the claim (the slot is kept for later enable).
    ///
    /// # Errors
    ///
    /// Returns the device's validation failure, or an overlap rejection
    /// when enabling at a conflicting address.
    pub fn set_parameter(
        &mut self,
        handle: DeviceHandle,
        param: &Parameter,
    ) -> Result<(), ParameterError> {
        match param {
            Parameter::Enabled(true) => self.enable(handle),
            Parameter::Enabled(false) => self.disable(handle),
            _ => {
                let slot = self.slot_mut(handle)?;
                let mut dev = slot.device.lock().map_err(|_| ParameterError::InvalidValue {
                    name: param.name(),
                    reason: "device is wedged".to_owned(),
                })?;
                dev.on_parameter_changed(param)?;
                let name = dev.base().name().to_owned();
                drop(dev);
                slot.name = name;
                Ok(())
            }
        }
    }

    fn enable(&mut self, handle: DeviceHandle) -> Result<(), ParameterError> {
        let index = self.check_handle(handle)?;
        let (name, base, end, wants_worker) = {
            let slot = self.slots[index].as_ref().expect("checked slot");
            if slot.active {
                return Ok(());
            }
            let dev = slot.device.lock().map_err(|_| ParameterError::InvalidValue {
                name: "enabled",
                reason: "device is wedged".to_owned(),
            })?;
            let (base, end) = dev.base().address_span();
            (dev.base().name().to_owned(), base, end, dev.worker_enabled())
        };
        if let Some(other) = self.overlapping_claim(base, end, index) {
            return Err(ParameterError::InvalidValue {
                name: "enabled",
                reason: format!("address range {base:#o}..{end:#o} overlaps {other}"),
            });
        }

        let slot = self.slots[index].as_mut().expect("checked slot");
        if let Ok(mut dev) = slot.device.lock() {
            dev.on_parameter_changed(&Parameter::Enabled(true))?;
        }
        slot.name = name.clone();
        slot.base = base;
        slot.end = end;
        slot.active = true;
        if wants_worker && slot.worker.is_none() {
            slot.worker = Some(WorkerHandle::spawn(&name, slot.device.clone()));
        }
        let device = slot.device.clone();
        Self::deliver_power(&device, &name, SignalEdge::None, SignalEdge::Rising);
        Self::deliver_power(&device, &name, SignalEdge::None, SignalEdge::Falling);
        Ok(())
    }

    fn disable(&mut self, handle: DeviceHandle) -> Result<(), ParameterError> {
        let index = self.check_handle(handle)?;
        let name = {
            let slot = self.slots[index].as_mut().expect("checked slot");
            if !slot.active {
                return Ok(());
            }
            if let Ok(mut dev) = slot.device.lock() {
                dev.on_parameter_changed(&Parameter::Enabled(false))?;
            }
            slot.worker = None;
            slot.active = false;
            slot.name.clone()
        };
        self.pending.cancel_device(&name);
        Ok(())
    }

    /// Stops every device worker without removing the devices.
    pub fn shutdown(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.worker = None;
        }
    }

    /// One claim summary line per installed device.
    #[must_use]
    pub fn resource_map(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| {
                let info = match slot.device.lock() {
                    Ok(dev) => dev.base().bus_resource_info(),
                    Err(_) => "<wedged>".to_owned(),
                };
                let state = if slot.active { "" } else { " (disabled)" };
                format!("{}: {info}{state}", slot.name)
            })
            .collect()
    }

    fn overlapping_claim(&self, base: u32, end: u32, skip: usize) -> Option<String> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .filter_map(|(_, s)| s.as_ref())
            .find(|slot| slot.active && base < slot.end && slot.base < end)
            .map(|slot| slot.name.clone())
    }

    fn find(&self, addr: u32) -> Result<(&BusSlot, usize), BusError> {
        if addr % 2 != 0 {
            return Err(BusError::UnalignedAddress { addr });
        }
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.active)
            .find_map(|slot| {
                (addr >= slot.base && addr < slot.end)
                    .then(|| (slot, ((addr - slot.base) / 2) as usize))
            })
            .ok_or(BusError::NonExistentDevice { addr })
    }

    fn slot_mut(&mut self, handle: DeviceHandle) -> Result<&mut BusSlot, ParameterError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(ParameterError::InvalidValue {
                name: "device",
                reason: "device was removed".to_owned(),
            })
    }

    fn check_handle(&self, handle: DeviceHandle) -> Result<usize, ParameterError> {
        if self.slots.get(handle.0).and_then(Option::as_ref).is_some() {
            Ok(handle.0)
        } else {
            Err(ParameterError::InvalidValue {
                name: "device",
                reason: "device was removed".to_owned(),
            })
        }
    }
}
