//! Sensor routines and the decoders for their raw encodings.
//!
//! Each submodule has a pure `decode` step that turns raw bytes into physical quantities and a
//! `read` routine that performs the bus transactions to fetch those bytes. The `read` routines
//! assume the right multiplexer channel is already selected; sequencing is the job of
//! [`crate::acquisition`].

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Debug};
#[cfg(feature = "std")]
use std::time::SystemTime;

use crate::error::SensorFault;

pub mod adc;
pub mod humidity;
pub mod light;
pub mod tank;

/// The physical quantities a sensor cluster reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    Light,
    Humidity,
    Temperature,
    Moisture,
}

impl SensorKind {
    /// The name readings of this kind are recorded under.
    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Light => "light",
            SensorKind::Humidity => "humidity",
            SensorKind::Temperature => "temperature",
            SensorKind::Moisture => "water",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The outcome of one acquisition attempt for one quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    pub unit: u8,
    pub kind: SensorKind,
    /// Bytes as they came off the bus, including those that failed to decode. Empty if the
    /// sensor failed before returning any.
    pub raw: Vec<u8>,
    /// Decoded value; meaningless unless `valid`.
    pub value: f32,
    pub valid: bool,
    /// Why the reading is invalid.
    pub fault: Option<SensorFault>,
    #[cfg(feature = "std")]
    pub captured_at: SystemTime,
}

impl SensorReading {
    pub fn valid(unit: u8, kind: SensorKind, raw: &[u8], value: f32) -> Self {
        Self {
            unit,
            kind,
            raw: raw.to_vec(),
            value,
            valid: true,
            fault: None,
            #[cfg(feature = "std")]
            captured_at: SystemTime::now(),
        }
    }

    pub fn invalid(unit: u8, kind: SensorKind, raw: &[u8], fault: SensorFault) -> Self {
        Self {
            unit,
            kind,
            raw: raw.to_vec(),
            value: 0.0,
            valid: false,
            fault: Some(fault),
            #[cfg(feature = "std")]
            captured_at: SystemTime::now(),
        }
    }
}

/// Where the acquisition sequencer delivers valid readings, e.g. a plant record store.
pub trait ReadingSink {
    type Error: Debug;

    fn record(&mut self, unit: u8, sensor: &str, value: f32) -> Result<(), Self::Error>;
}

impl<S: ReadingSink + ?Sized> ReadingSink for &mut S {
    type Error = S::Error;

    fn record(&mut self, unit: u8, sensor: &str, value: f32) -> Result<(), Self::Error> {
        (**self).record(unit, sensor, value)
    }
}

/// Collects readings in memory.
impl ReadingSink for Vec<(u8, String, f32)> {
    type Error = core::convert::Infallible;

    fn record(&mut self, unit: u8, sensor: &str, value: f32) -> Result<(), Self::Error> {
        self.push((unit, sensor.to_owned(), value));
        Ok(())
    }
}

/// Discards readings.
impl ReadingSink for () {
    type Error = core::convert::Infallible;

    fn record(&mut self, _unit: u8, _sensor: &str, _value: f32) -> Result<(), Self::Error> {
        Ok(())
    }
}
