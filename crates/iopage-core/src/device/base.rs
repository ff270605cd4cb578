//! Common state shared by every bus device: identity, placement, the
//! register block, and the interrupt line.

use std::fmt::Write as _;

use log::{debug, log_enabled, Level};

use crate::bus::cycle::REGISTER_STRIDE;
use crate::bus::interrupt::{InterruptLine, InterruptRequest};
use crate::device::params::DeviceParams;
use crate::device::register::RegisterCell;

/// Identity, bus placement, and register block of one device instance.
#[derive(Debug)]
pub struct DeviceBase {
    type_name: &'static str,
    log_label: &'static str,
    params: DeviceParams,
    registers: Vec<RegisterCell>,
    intr_line: Option<InterruptLine>,
}

impl DeviceBase {
    /// Assembles a device base from its static identity, placement, and
    /// register declarations.
    #[must_use]
    pub fn new(
        type_name: &'static str,
        log_label: &'static str,
        params: DeviceParams,
        registers: Vec<RegisterCell>,
    ) -> Self {
        Self {
            type_name,
            log_label,
            params,
            registers,
            intr_line: None,
        }
    }

    /// Instance name from the parameter record.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.params.name
    }

    /// Device model name, e.g. `"EAE"`.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short label used as the log target.
    #[must_use]
    pub const fn log_label(&self) -> &'static str {
        self.log_label
    }

    /// Current configuration.
    #[must_use]
    pub const fn params(&self) -> &DeviceParams {
        &self.params
    }

    /// Mutable configuration access for the parameter hook.
    pub fn params_mut(&mut self) -> &mut DeviceParams {
        &mut self.params
    }

    /// Number of registers in the block.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Register by block index.
    ///
    /// # Panics
    ///
    /// Panics when `index` is outside the declared block; device code only
    /// uses its own register constants.
    #[must_use]
    pub fn register(&self, index: usize) -> &RegisterCell {
        &self.registers[index]
    }

    /// Mutable register by block index.
    ///
    /// # Panics
    ///
    /// Panics when `index` is outside the declared block.
    pub fn register_mut(&mut self, index: usize) -> &mut RegisterCell {
        &mut self.registers[index]
    }

    /// Looks a register up by its mnemonic, case-insensitively.
    #[must_use]
    pub fn register_by_name(&self, name: &str) -> Option<&RegisterCell> {
        self.registers
            .iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }

    /// Claimed byte-address range as `(first, one_past_last)`.
    #[must_use]
    pub fn address_span(&self) -> (u32, u32) {
        let base = self.params.base_addr;
        let end = base + REGISTER_STRIDE * self.registers.len() as u32;
        (base, end)
    }

    /// Maps a byte address to the index of the claiming register, if the
    /// address falls inside this device's block.
    #[must_use]
    pub fn register_index_at(&self, addr: u32) -> Option<usize> {
        let (base, end) = self.address_span();
        if addr < base || addr >= end {
            return None;
        }
        Some(((addr - base) / REGISTER_STRIDE) as usize)
    }

    /// Writes every register's reset value into both latches.
    pub fn reset_registers(&mut self) {
        for reg in &mut self.registers {
            reg.reset();
        }
        self.log_registers("RESET");
    }

    /// Attaches the interrupt line at install time.
    pub fn attach_interrupt_line(&mut self, line: InterruptLine) {
        self.intr_line = Some(line);
    }

    /// Detaches the interrupt line at removal time.
    pub fn detach_interrupt_line(&mut self) {
        self.intr_line = None;
    }

    /// Raises this device's interrupt using its configured vector, level,
    /// and slot. A no-op while the device is not installed.
    pub fn request_interrupt(&self) {
        if let Some(line) = &self.intr_line {
            line.request(InterruptRequest {
                device: self.params.name.clone(),
                vector: self.params.intr_vector,
                level: self.params.intr_level,
                slot: self.params.priority_slot,
            });
        }
    }

    /// Dumps the register block to the debug log, octal, one event line.
    ///
    /// Active registers print as `read/write` latch pairs, passive ones as
    /// the single latched value.
    pub fn log_registers(&self, change_info: &str) {
        if !log_enabled!(target: "registers", Level::Debug) {
            return;
        }
        let mut line = format!("{} {change_info}:", self.params.name);
        for reg in &self.registers {
            if reg.active_on_read() || reg.active_on_write() {
                let _ = write!(
                    line,
                    " {}={:06o}/{:06o}",
                    reg.name(),
                    reg.read(),
                    reg.write_latch()
                );
            } else {
                let _ = write!(line, " {}={:06o}", reg.name(), reg.read());
            }
        }
        debug!(target: "registers", "{line}");
    }

    /// Human-readable claim summary for operator listings, e.g.
    /// `"addr 777300-777316 (8 regs), slot 0, INTR 5/010"`.
    #[must_use]
    pub fn bus_resource_info(&self) -> String {
        let (base, end) = self.address_span();
        let mut info = match self.registers.len() {
            0 => String::new(),
            1 => format!("addr {base:o}"),
            n => format!("addr {base:o}-{:o} ({n} regs)", end - REGISTER_STRIDE),
        };
        let _ = write!(info, ", slot {}", self.params.priority_slot);
        if self.params.intr_vector != 0 {
            let _ = write!(
                info,
                ", INTR {}/{:03o}",
                self.params.intr_level, self.params.intr_vector
            );
        }
        info
    }
}
