//! Per-device configuration: identity, enable state, and bus placement.

use crate::error::ParameterError;

/// Configuration record carried by every device instance.
///
/// Bus-placement fields (base address, vector, level, slot) may only change
/// while the device is disabled; the bus re-validates address overlap before
/// a placement change or an enable is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceParams {
    /// Unique instance name, e.g. `"ke0"`.
    pub name: String,
    /// Whether the device is plugged into the bus.
    pub enabled: bool,
    /// First byte address of the register block (word-aligned, octal by
    /// convention).
    pub base_addr: u32,
    /// Interrupt vector delivered with this device's requests.
    pub intr_vector: u16,
    /// Interrupt priority level, 1..=7.
    pub intr_level: u8,
    /// Backplane priority slot used to order requests within a level.
    pub priority_slot: u8,
}

impl DeviceParams {
    /// Creates a parameter record for a device at its default placement.
    #[must_use]
    pub fn new(name: &str, base_addr: u32, intr_vector: u16, intr_level: u8) -> Self {
        Self {
            name: name.to_owned(),
            enabled: false,
            base_addr,
            intr_vector,
            intr_level,
            priority_slot: 0,
        }
    }

    /// Sets the backplane priority slot.
    #[must_use]
    pub const fn with_priority_slot(mut self, slot: u8) -> Self {
        self.priority_slot = slot;
        self
    }
}

/// One reassignable configuration option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Parameter {
    /// Instance name.
    Name(String),
    /// Plug or unplug the device.
    Enabled(bool),
    /// Register block base address.
    BaseAddr(u32),
    /// Interrupt vector.
    IntrVector(u16),
    /// Interrupt priority level.
    IntrLevel(u8),
    /// Backplane priority slot.
    PrioritySlot(u8),
}

impl Parameter {
    /// Name of the option this value targets.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Enabled(_) => "enabled",
            Self::BaseAddr(_) => "base_addr",
            Self::IntrVector(_) => "intr_vector",
            Self::IntrLevel(_) => "intr_level",
            Self::PrioritySlot(_) => "priority_slot",
        }
    }

    /// Whether this option is locked while the device is enabled.
    #[must_use]
    pub const fn locked_while_enabled(&self) -> bool {
        matches!(
            self,
            Self::BaseAddr(_) | Self::IntrVector(_) | Self::IntrLevel(_) | Self::PrioritySlot(_)
        )
    }
}

impl DeviceParams {
    /// Validates and applies one parameter reassignment.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Locked`] for placement changes while
    /// enabled, or [`ParameterError::InvalidValue`] when the new value is
    /// outside the option's domain. The record is unchanged on error.
    pub fn apply(&mut self, param: &Parameter) -> Result<(), ParameterError> {
        if self.enabled && param.locked_while_enabled() {
            return Err(ParameterError::Locked { name: param.name() });
        }
        match param {
            Parameter::Name(name) => {
                if name.is_empty() {
                    return Err(ParameterError::InvalidValue {
                        name: "name",
                        reason: "must not be empty".to_owned(),
                    });
                }
                self.name.clone_from(name);
            }
            Parameter::Enabled(enabled) => self.enabled = *enabled,
            Parameter::BaseAddr(base) => {
                if base % 2 != 0 {
                    return Err(ParameterError::InvalidValue {
                        name: "base_addr",
                        reason: format!("{base:#o} is not word-aligned"),
                    });
                }
                self.base_addr = *base;
            }
            Parameter::IntrVector(vector) => {
                if vector % 2 != 0 {
                    return Err(ParameterError::InvalidValue {
                        name: "intr_vector",
                        reason: format!("{vector:#o} is not word-aligned"),
                    });
                }
                self.intr_vector = *vector;
            }
            Parameter::IntrLevel(level) => {
                if !(1..=7).contains(level) {
                    return Err(ParameterError::InvalidValue {
                        name: "intr_level",
                        reason: "must be 1..=7".to_owned(),
                    });
                }
                self.intr_level = *level;
            }
            Parameter::PrioritySlot(slot) => self.priority_slot = *slot,
        }
        Ok(())
    }
}
