//! Error kinds.
//!
//! Bus-cycle operations return [`Error<E>`], generic over the transport's own error type. Its
//! [`Error::Sensor`] variant carries a recoverable [`SensorFault`]; everything else is fatal and
//! means the bus state can no longer be trusted for the rest of the cycle. Errors that can only
//! happen while setting things up (pin maps, control requests, registry membership,
//! configuration) have their own types and never reach the bus.

use alloc::string::String;
use core::fmt::Debug;

use crate::expander::BankKey;

/// A sensor reported unusable data. Recoverable: the reading is marked invalid and the cycle
/// carries on with the next sensor.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SensorFault {
    /// The light sensor did not echo its power-up command.
    #[error("light sensor is powered down (power register read {0:#04x})")]
    LightSensorUnpowered(u8),

    /// The validity bit of a light sensor ADC channel was clear.
    #[error("light sensor channel {channel} returned invalid data {raw:#04x}")]
    InvalidLightData { channel: u8, raw: u8 },

    /// The humidity sensor's status bits reported stale data or command mode.
    #[error("humidity sensor reported status {0}")]
    HumidityStatus(u8),

    /// A ratiometric reading fell outside the plausible band, meaning the probe is open or
    /// shorted.
    #[error("analog sensor disconnected (ratio {0})")]
    SensorDisconnected(f32),

    /// The ADC never cleared its ready bit within the configured poll budget.
    #[error("ADC at {0:#04x} did not finish converting")]
    ConversionTimeout(u8),
}

/// Errors raised while talking to the bus.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: Debug> {
    /// Underlying transport error.
    #[error("bus I/O error: {0:?}")]
    Bus(E),

    /// Recoverable sensor fault.
    #[error(transparent)]
    Sensor(#[from] SensorFault),

    /// Multiplexer address outside `0x70..=0x77`.
    #[error("invalid multiplexer address {0:#04x}")]
    InvalidAddress(u8),

    /// Multiplexer channel outside `0..=3`.
    #[error("invalid multiplexer channel {0}")]
    InvalidChannel(u8),

    /// ADC input channel outside `1..=4`.
    #[error("invalid ADC channel {0}")]
    InvalidAdcChannel(u8),

    /// The multiplexer did not confirm that every channel was switched off.
    #[error("multiplexer {address:#04x} failed to release (status {status:#04x})")]
    BusConflict { address: u8, status: u8 },

    /// A recoverable fault kept recurring past the retry budget.
    #[error("sensor fault persisted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u8, last: SensorFault },

    /// Flush requested for a unit the registry does not hold.
    #[error("no control unit with id {0} is registered")]
    UnknownUnit(u8),

    /// Flush requested for a bank no registered unit uses.
    #[error("bank {0:?} is not in use")]
    UnknownBank(BankKey),
}

impl<E: Debug> Error<E> {
    /// Whether this error must abort the current cycle.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Sensor(_))
    }
}

impl<E: Debug> From<MuxError> for Error<E> {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::InvalidAddress(address) => Error::InvalidAddress(address),
            MuxError::InvalidChannel(k) => Error::InvalidChannel(k),
        }
    }
}

/// A multiplexer address or channel that does not exist. Raised by the constructors, before
/// anything is sent on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MuxError {
    #[error("invalid multiplexer address {0:#04x}")]
    InvalidAddress(u8),

    #[error("invalid multiplexer channel {0}")]
    InvalidChannel(u8),
}

/// Pin map construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinMapError {
    /// No fixed table entry exists for this unit identifier.
    #[error("no pin mapping for unit {0}")]
    UnknownUnit(u8),

    /// A control landed on one of the reserved housekeeping pins of bank 0.
    #[error("pin {0} of bank 0 is reserved")]
    ReservedPin(u8),

    /// Pins are numbered 0 through 7 within a bank.
    #[error("pin {0} does not exist on an 8-bit bank")]
    PinOutOfRange(u8),

    /// Two controls of the same unit share a pin.
    #[error("pin {0} is assigned to more than one control")]
    DuplicatePin(u8),

    /// Bank index other than 0 or 1.
    #[error("bank {0} does not exist")]
    InvalidBank(u8),
}

/// Rejected control requests, e.g. from parsing operator input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlRequestError {
    #[error("unknown control {0:?}")]
    UnknownControl(String),
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
}

/// Registry membership and request failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("control unit {0} is already registered")]
    DuplicateUnit(u8),

    #[error("control unit {0} is not registered")]
    UnknownUnit(u8),

    /// The pin is already driven by another unit or by the shared pump/housekeeping outputs.
    #[error("pin {pin} of bank {bank:?} is already in use")]
    PinConflict { bank: BankKey, pin: u8 },

    #[error(transparent)]
    InvalidControlRequest(#[from] ControlRequestError),
}

/// Configuration validation failures.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("multiplexer channel {0} is used by more than one sensor")]
    DuplicateMuxChannel(u8),

    #[error("multiplexer channel {0} does not exist")]
    InvalidMuxChannel(u8),

    #[error("ADC channel {0} does not exist")]
    InvalidAdcChannel(u8),

    #[error("moisture band ({0}, {1}) is empty")]
    EmptyMoistureBand(f32, f32),

    #[error("tank calibration is not physical: {0}")]
    InvalidTankCalibration(&'static str),

    #[error("ADC poll interval must be non-zero")]
    ZeroPollInterval,
}
