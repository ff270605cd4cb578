//! Error taxonomy for installation, cycle dispatch, and configuration.
//!
//! Arithmetic overflow in the EAE and silo overflow in the serial controller
//! are ordinary status conditions signaled through register bits; they never
//! appear here.

use thiserror::Error;

/// Failures raised while claiming a device's address range on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    /// The device's register block collides with an already enabled device.
    /// The device stays uninstalled and disabled.
    #[error("{device}: address range {base:#o}..{end:#o} overlaps {other}")]
    AddressConflict {
        /// Device whose installation was rejected.
        device: String,
        /// Device already holding part of the range.
        other: String,
        /// First byte address of the rejected claim.
        base: u32,
        /// One past the last byte address of the rejected claim.
        end: u32,
    },

    /// The requested base address is not word-aligned.
    #[error("{device}: base address {base:#o} is not word-aligned")]
    UnalignedBase {
        /// Device whose installation was rejected.
        device: String,
        /// The offending base address.
        base: u32,
    },
}

/// Failures raised by a single bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// No installed device claims the address; the cycle would time out on
    /// real hardware.
    #[error("no device claims address {addr:#o}")]
    NonExistentDevice {
        /// The unclaimed address.
        addr: u32,
    },

    /// Word cycles must use even addresses.
    #[error("address {addr:#o} is not word-aligned")]
    UnalignedAddress {
        /// The odd address.
        addr: u32,
    },

    /// The addressed device's lock was poisoned by a panicking thread; the
    /// cycle completes without device interaction.
    #[error("device claiming address {addr:#o} is wedged")]
    DeviceWedged {
        /// The address whose device is unusable.
        addr: u32,
    },
}

/// Failures raised by configuration parameter reassignment.
///
/// On error the parameter keeps its prior value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// The new value is outside the parameter's domain.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Parameter that rejected the assignment.
        name: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// Bus-placement parameters are locked while the device is enabled.
    #[error("{name} cannot change while the device is enabled")]
    Locked {
        /// Parameter that rejected the assignment.
        name: &'static str,
    },
}
