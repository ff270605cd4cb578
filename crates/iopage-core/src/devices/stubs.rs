//! Register-only stub devices: a vector display and a raster display.
//!
//! Both expose plain latch blocks with no behavior beyond reset; they hold
//! their bus addresses so host software probing the IO page finds them.

use crate::device::base::DeviceBase;
use crate::device::params::DeviceParams;
use crate::device::register::RegisterCell;
use crate::device::BusDevice;

/// Vector display default base address.
pub const VECTOR_DISPLAY_BASE_ADDR: u32 = 0o764040;
/// Vector display default interrupt vector.
pub const VECTOR_DISPLAY_INTR_VECTOR: u16 = 0o270;
/// Vector display default interrupt level.
pub const VECTOR_DISPLAY_INTR_LEVEL: u8 = 5;

/// Raster display default base address.
pub const RASTER_DISPLAY_BASE_ADDR: u32 = 0o764100;
/// Raster display default interrupt level.
pub const RASTER_DISPLAY_INTR_LEVEL: u8 = 4;
/// Raster display default backplane slot.
pub const RASTER_DISPLAY_PRIORITY_SLOT: u8 = 31;
/// Raster display register count.
pub const RASTER_DISPLAY_REGISTER_COUNT: usize = 26;

/// Two-register vector display stub.
#[derive(Debug)]
pub struct VectorDisplay {
    base: DeviceBase,
}

impl Default for VectorDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorDisplay {
    /// Creates the stub at its default placement.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: DeviceBase::new(
                "NG",
                "ng",
                DeviceParams::new(
                    "ng",
                    VECTOR_DISPLAY_BASE_ADDR,
                    VECTOR_DISPLAY_INTR_VECTOR,
                    VECTOR_DISPLAY_INTR_LEVEL,
                ),
                vec![
                    RegisterCell::passive("CSR", 0),
                    RegisterCell::passive("REL", 1),
                ],
            ),
        }
    }
}

impl BusDevice for VectorDisplay {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }
}

/// Twenty-six-register raster display stub.
#[derive(Debug)]
pub struct RasterDisplay {
    base: DeviceBase,
}

impl Default for RasterDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterDisplay {
    /// Creates the stub at its default placement.
    #[must_use]
    pub fn new() -> Self {
        let registers = (0..RASTER_DISPLAY_REGISTER_COUNT)
            .map(|index| RegisterCell::passive(&format!("CSR{index:02}"), index))
            .collect();
        Self {
            base: DeviceBase::new(
                "TV",
                "tv",
                DeviceParams::new("tv", RASTER_DISPLAY_BASE_ADDR, 0, RASTER_DISPLAY_INTR_LEVEL)
                    .with_priority_slot(RASTER_DISPLAY_PRIORITY_SLOT),
                registers,
            ),
        }
    }
}

impl BusDevice for RasterDisplay {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }
}
