//! Asynchronous serial line controller with a 64-entry receive silo.
//!
//! Received characters are funneled from the host through a channel; the
//! device worker drains the channel and enqueues each character into the
//! silo. The host CPU empties the silo by reading NRCR: each read pops one
//! entry, and bit 15 of the value tells whether the entry was valid. The
//! silo raises an alarm interrupt when the fill level crosses the
//! programmed alarm threshold and a storage interrupt when a character is
//! dropped on overflow.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{trace, warn};

use crate::bus::cycle::{BusControl, DatoAccess, SignalEdge};
use crate::device::base::DeviceBase;
use crate::device::params::DeviceParams;
use crate::device::register::RegisterCell;
use crate::device::BusDevice;

/// Default base address of the eight-register block.
pub const SERIAL_BASE_ADDR: u32 = 0o760020;
/// Default receive interrupt vector.
pub const SERIAL_INTR_VECTOR: u16 = 0o340;
/// Default interrupt priority level.
pub const SERIAL_INTR_LEVEL: u8 = 5;
/// Default backplane priority slot.
pub const SERIAL_PRIORITY_SLOT: u8 = 31;

/// Receive silo depth.
pub const SILO_CAPACITY: usize = 64;
/// Number of lines the register file mirrors.
pub const LINE_COUNT: usize = 16;

/// SCR: line-select field.
pub const SCR_LINE_MASK: u16 = 0x000F;
/// SCR: silo alarm interrupts enabled.
pub const SCR_RX_INT_ENABLE: u16 = 1 << 6;
/// SCR: storage (overflow) interrupts enabled.
pub const SCR_S_INT_ENABLE: u16 = 1 << 12;

/// SSR: programmable alarm level field.
pub const SSR_ALARM_MASK: u16 = 0x003F;
/// SSR: silo fill level field.
pub const SSR_FILL_MASK: u16 = 0x3F00;
/// SSR: a character was dropped on overflow.
pub const SSR_STORAGE_INT: u16 = 1 << 15;

/// Silo word: entry holds valid data.
pub const RX_VALID: u16 = 1 << 15;
/// Silo word: receiver data overrun.
pub const RX_OVERRUN: u16 = 1 << 14;
/// Silo word: framing error.
pub const RX_FRAMING_ERR: u16 = 1 << 13;
/// Silo word: parity error.
pub const RX_PARITY_ERR: u16 = 1 << 12;

const REG_SCR: usize = 0;
const REG_NRCR: usize = 1;
const REG_LPR: usize = 2;
const REG_CAR: usize = 3;
const REG_BCR: usize = 4;
const REG_BAR: usize = 5;
const REG_BRCR: usize = 6;
const REG_SSR: usize = 7;

const RX_CHANNEL_DEPTH: usize = 256;
const WORKER_INTERVAL: Duration = Duration::from_millis(20);

/// Host-side sender for injecting received characters.
pub type RxSender = Sender<RxChar>;

/// One received character with its line metadata, as injected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxChar {
    /// Line number, 0..=15.
    pub line: u8,
    /// The character.
    pub ch: u8,
    /// Receiver detected a parity error.
    pub parity_err: bool,
    /// Receiver detected a framing error.
    pub framing_err: bool,
    /// Receiver overran its holding buffer.
    pub overrun: bool,
}

impl RxChar {
    /// A clean character on the given line.
    #[must_use]
    pub const fn clean(line: u8, ch: u8) -> Self {
        Self {
            line,
            ch,
            parity_err: false,
            framing_err: false,
            overrun: false,
        }
    }

    /// Encodes the silo word for this character.
    #[must_use]
    pub const fn encode(self) -> u16 {
        let mut word = self.ch as u16 | (((self.line & 0xF) as u16) << 8) | RX_VALID;
        if self.parity_err {
            word |= RX_PARITY_ERR;
        }
        if self.framing_err {
            word |= RX_FRAMING_ERR;
        }
        if self.overrun {
            word |= RX_OVERRUN;
        }
        word
    }
}

/// The serial line controller.
#[derive(Debug)]
pub struct SerialController {
    base: DeviceBase,
    silo: [u16; SILO_CAPACITY],
    count: usize,
    storage_int: bool,
    lpr_line: [u16; LINE_COUNT],
    car_line: [u16; LINE_COUNT],
    bcr_line: [u16; LINE_COUNT],
    rx: Receiver<RxChar>,
}

impl SerialController {
    /// Creates the controller at its default placement, returning the
    /// host-side sender for injecting received characters.
    #[must_use]
    pub fn new() -> (Self, Sender<RxChar>) {
        Self::with_params(
            DeviceParams::new(
                "slc",
                SERIAL_BASE_ADDR,
                SERIAL_INTR_VECTOR,
                SERIAL_INTR_LEVEL,
            )
            .with_priority_slot(SERIAL_PRIORITY_SLOT),
        )
    }

    /// Creates the controller with explicit placement.
    #[must_use]
    pub fn with_params(params: DeviceParams) -> (Self, Sender<RxChar>) {
        let registers = vec![
            RegisterCell::passive("SCR", REG_SCR),
            // Reading NRCR steps the silo.
            RegisterCell::new("NRCR", REG_NRCR, 0, 0xFFFF, true, false),
            // Line parameter writes are mirrored per line.
            RegisterCell::new("LPR", REG_LPR, 0, 0xFFFF, false, true),
            RegisterCell::new("CAR", REG_CAR, 0, 0xFFFF, false, true),
            RegisterCell::new("BCR", REG_BCR, 0, 0xFFFF, false, true),
            RegisterCell::passive("BAR", REG_BAR),
            RegisterCell::passive("BRCR", REG_BRCR),
            // Alarm level is the only bus-writable field.
            RegisterCell::new("SSR", REG_SSR, 0, SSR_ALARM_MASK, false, true),
        ];
        let (tx, rx) = bounded(RX_CHANNEL_DEPTH);
        let controller = Self {
            base: DeviceBase::new("SLC", "slc", params, registers),
            silo: [0; SILO_CAPACITY],
            count: 0,
            storage_int: false,
            lpr_line: [0; LINE_COUNT],
            car_line: [0; LINE_COUNT],
            bcr_line: [0; LINE_COUNT],
            rx,
        };
        (controller, tx)
    }

    /// Current silo fill level.
    #[must_use]
    pub const fn silo_count(&self) -> usize {
        self.count
    }

    /// Per-line parameter mirror.
    #[must_use]
    pub const fn lpr_line(&self) -> &[u16; LINE_COUNT] {
        &self.lpr_line
    }

    /// Per-line current-address mirror.
    #[must_use]
    pub const fn car_line(&self) -> &[u16; LINE_COUNT] {
        &self.car_line
    }

    /// Per-line byte-count mirror.
    #[must_use]
    pub const fn bcr_line(&self) -> &[u16; LINE_COUNT] {
        &self.bcr_line
    }

    fn scr(&self) -> u16 {
        self.base.register(REG_SCR).write_latch()
    }

    fn alarm_level(&self) -> u16 {
        self.base.register(REG_SSR).write_latch() & SSR_ALARM_MASK
    }

    fn selected_line(&self) -> usize {
        usize::from(self.scr() & SCR_LINE_MASK)
    }

    /// Republishes SSR: storage flag, fill level, and the alarm echo.
    fn publish_ssr(&mut self) {
        let mut ssr = ((self.count as u16) & 0x3F) << 8;
        ssr |= self.alarm_level();
        if self.storage_int {
            ssr |= SSR_STORAGE_INT;
        }
        self.base.register_mut(REG_SSR).device_write(ssr);
    }

    /// Pushes one received character into the silo.
    ///
    /// Returns `false` and drops the character when the silo is full; that
    /// sets the storage flag and, when enabled, requests the storage
    /// interrupt. On success the fill field updates and crossing the alarm
    /// level requests the receive interrupt when enabled.
    pub fn silo_enqueue(&mut self, rx: RxChar) -> bool {
        if self.count > SILO_CAPACITY - 1 {
            self.storage_int = true;
            self.publish_ssr();
            if self.scr() & SCR_S_INT_ENABLE != 0 {
                self.base.request_interrupt();
            }
            warn!(
                target: "slc",
                "silo overflow, dropped {:#04x} from line {}",
                rx.ch, rx.line
            );
            return false;
        }
        self.silo[self.count] = rx.encode();
        self.count += 1;
        self.publish_ssr();
        trace!(target: "slc", "rx {:#04x} line {} fill {}", rx.ch, rx.line, self.count);
        if self.count as u16 > self.alarm_level() && self.scr() & SCR_RX_INT_ENABLE != 0 {
            self.base.request_interrupt();
        }
        true
    }

    /// Pops the oldest silo entry.
    ///
    /// An empty silo returns the head slot with bit 15 clear and changes
    /// nothing; callers key on bit 15, not on the fill level.
    pub fn silo_dequeue(&mut self) -> u16 {
        if self.count == 0 {
            return self.silo[0] & !RX_VALID;
        }
        let word = self.silo[0] | RX_VALID;
        self.silo.copy_within(1..self.count, 0);
        self.count -= 1;
        // Room exists again, so the overflow condition is over.
        self.storage_int = false;
        self.publish_ssr();
        word
    }

    fn reset_device(&mut self, clear_line_mirrors: bool) {
        self.base.reset_registers();
        self.count = 0;
        self.storage_int = false;
        self.lpr_line = [0; LINE_COUNT];
        if clear_line_mirrors {
            self.car_line = [0; LINE_COUNT];
            self.bcr_line = [0; LINE_COUNT];
        }
    }
}

impl BusDevice for SerialController {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn on_after_register_access(&mut self, index: usize, control: BusControl, _access: DatoAccess) {
        match (index, control) {
            (REG_NRCR, BusControl::Dati) => {
                // The completed read returned the previous latch; step the
                // silo and stage the next word.
                let word = self.silo_dequeue();
                self.base.register_mut(REG_NRCR).device_write(word);
            }
            (REG_LPR, BusControl::Dato) => {
                let line = self.selected_line();
                let value = self.base.register(REG_LPR).write_latch();
                self.lpr_line[line] = value;
                self.base.register_mut(REG_LPR).device_write(value);
            }
            (REG_CAR, BusControl::Dato) => {
                let line = self.selected_line();
                let value = self.base.register(REG_CAR).write_latch();
                self.car_line[line] = value;
                self.base.register_mut(REG_CAR).device_write(value);
            }
            (REG_BCR, BusControl::Dato) => {
                let line = self.selected_line();
                let value = self.base.register(REG_BCR).write_latch();
                self.bcr_line[line] = value;
                self.base.register_mut(REG_BCR).device_write(value);
            }
            (REG_SSR, BusControl::Dato) => self.publish_ssr(),
            _ => {}
        }
    }

    fn on_power_changed(&mut self, _aclo_edge: SignalEdge, dclo_edge: SignalEdge) {
        if dclo_edge == SignalEdge::Rising {
            self.reset_device(true);
        }
    }

    fn on_init_changed(&mut self, asserted: bool) {
        // INIT clears the silo and line parameters but keeps the per-line
        // address and count mirrors.
        if asserted {
            self.reset_device(false);
        }
    }

    fn worker_enabled(&self) -> bool {
        true
    }

    fn worker_poll(&mut self) -> Duration {
        while let Ok(rx) = self.rx.try_recv() {
            self.silo_enqueue(rx);
        }
        WORKER_INTERVAL
    }
}
