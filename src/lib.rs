//! Coordination of a greenhouse control board's shared I2C bus.
//!
//! A single I2C bus carries the output expander that drives every plant slot's fan, grow light
//! and water valve (plus the shared pump), and one four-channel multiplexer per sensor cluster,
//! behind which sit a light sensor, a humidity/temperature sensor and an ADC for the soil
//! moisture probe. All clusters use the same sensor addresses, so at most one multiplexer
//! channel may be exposed at any time.
//!
//! This crate provides the two pieces that make sharing the bus safe:
//!
//! - a **bank mask registry** that lets independent control units share the expander's 8-bit
//!   output banks (and the one pump) without clobbering each other's bits or writing registers
//!   that already hold the right value, and
//! - an **acquisition sequencer** that reads each cluster through scoped multiplexer sessions and
//!   decodes the sensors' raw encodings into physical quantities.
//!
//! It works with any I2C master implementing the `embedded-hal` blocking traits, and any delay
//! provider implementing `DelayMs<u32>`.
//!
//! # Construction
//!
//! - Use your platform's `embedded-hal` implementation to obtain an I2C master device.
//! - Wrap it in an [`I2cInterface`], which implements [`BusInterface`] for it. Everything in this
//!   crate borrows the `BusInterface` mutably for the duration of one operation, so the bus is
//!   never shared behind a lock.
//!
//! ```ignore
//! let i2c = /* construct something implementing embedded_hal::blocking::i2c::{Write, Read, WriteRead} */
//! let mut bus = greenhouse_io::I2cInterface::new(i2c);
//! ```
//!
//! # Controls
//!
//! *See [`BankMaskRegistry`] and [`ControlUnit`].*
//!
//! Each plant slot is a [`ControlUnit`] whose pins come from a fixed table ([`PinMap`]). Register
//! every unit with one registry, change their desired states, then flush:
//!
//! ```
//! # use greenhouse_io::interface::noop::NoopInterface;
//! # use greenhouse_io::{BankMaskRegistry, Control, ControlUnit, Operation};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut bus = NoopInterface;
//! let mut registry = BankMaskRegistry::default();
//! for id in 1..=4 {
//!     registry.register(ControlUnit::new(id)?)?;
//! }
//!
//! registry.set_desired(2, Control::Light, Operation::On)?;
//! registry.request(3, "valve", "on")?;
//! registry.flush(3, &mut bus)?;
//! # Ok(())
//! # }
//! ```
//!
//! Nothing reaches the hardware until `flush`. It recomputes the whole mask of the affected bank
//! from every unit on it, ORs in the pump bit if any unit wants the pump (an open valve implies
//! a pump request), and skips the write when the expander already holds that mask. Unit 3's
//! valve above also turns on the pump, which lives on a different bank; `flush` updates both.
//!
//! [`BankMaskRegistry::control`] switches several controls of one unit and flushes in one call:
//!
//! ```
//! # use greenhouse_io::interface::noop::NoopInterface;
//! # use greenhouse_io::{BankMaskRegistry, Control, ControlUnit};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut bus = NoopInterface;
//! # let mut registry = BankMaskRegistry::default();
//! # registry.register(ControlUnit::new(1)?)?;
//! registry.control(1, &[Control::Fan, Control::Light], &[Control::Valve], &mut bus)?;
//! registry.control(1, &[], &Control::ALL, &mut bus)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Sensors
//!
//! *See [`AcquisitionSequencer`] and [`Config`].*
//!
//! Add one node per sensor cluster, naming the plant unit it belongs to and the multiplexer it
//! is behind, then run acquisition cycles. Valid readings are handed to a [`ReadingSink`] under
//! the names `light`, `humidity`, `temperature` and `water`:
//!
//! ```
//! # use greenhouse_io::interface::noop::NoopInterface;
//! # use greenhouse_io::{AcquisitionSequencer, BankMaskRegistry, Config, Multiplexer};
//! # struct Sleep;
//! # impl embedded_hal::blocking::delay::DelayMs<u32> for Sleep {
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut bus = NoopInterface;
//! # let mut registry = BankMaskRegistry::default();
//! # let mut delay = Sleep;
//! let config = Config::builder().humidity_retries(2).build()?;
//! let mut sequencer = AcquisitionSequencer::new(config);
//! sequencer.add_node(1, Multiplexer::new(0x70)?)?;
//!
//! let mut recorded: Vec<(u8, String, f32)> = Vec::new();
//! let readings = sequencer.run_cycle(&mut bus, &mut registry, &mut delay, &mut recorded)?;
//! for reading in readings.iter().filter(|r| !r.valid) {
//!     println!("unit {} {}: {:?}", reading.unit, reading.kind, reading.fault);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The moisture probe needs power, which is switched by a housekeeping pin on the expander; the
//! sequencer sets it through the registry, so the other outputs on that bank are unaffected.
//!
//! ## Errors
//!
//! Bus operations return [`Error`]. A sensor that reports unusable data (powered down, invalid
//! data bit, probe out of range, conversion timeout) raises a recoverable [`SensorFault`]: the
//! reading is marked invalid and the cycle goes on. Anything else (a transport error, a
//! multiplexer that does not release, a humidity sensor that stays in a bad state past its
//! retries) is fatal. The cycle stops without issuing further bus operations and the error is
//! returned. [`Error::is_fatal`] tells them apart.
//!
//! ## Logging
//!
//! The crate logs through the `log` facade: bus-level detail at `debug`, decoded readings at
//! `info`, recoverable faults and sink failures at `warn`, aborted cycles at `error`. Install
//! whichever logger you like.
//!
//! # Features
//!
//! The `std` feature is on by default. Without it the crate is `no_std` and only needs `alloc`;
//! readings then carry no capture timestamp, and the light sensor's exponential correction comes
//! from `micromath`. The `serde` feature derives serialization for configuration and pin maps.
//! Deserializing a pin map or a multiplexer runs the same checks as constructing one.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
extern crate embedded_hal as hal;

pub mod acquisition;
pub mod config;
pub mod control;
pub mod discovery;
pub mod error;
pub mod expander;
pub mod interface;
pub mod mux;
pub mod pinmap;
pub mod registers;
pub mod sensors;

pub use acquisition::{AcquisitionSequencer, SensorNode, Stage};
pub use config::{Config, ConfigBuilder};
pub use control::{Control, ControlUnit, DesiredState, Operation};
pub use error::{
    ConfigError, ControlRequestError, Error, MuxError, PinMapError, RegistryError, SensorFault,
};
pub use expander::{Bank, BankKey, BankMaskRegistry, BankMasks, BankWrite, Expander, PinLocation};
pub use interface::i2c::I2cInterface;
pub use interface::BusInterface;
pub use mux::{Channel, Multiplexer};
pub use pinmap::PinMap;
pub use sensors::{ReadingSink, SensorKind, SensorReading};
