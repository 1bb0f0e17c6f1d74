//! Water tank level from a resistive depth sensor.
//!
//! The sensor forms a voltage divider with a fixed reference resistor and is read by the ADC on
//! the control board, which is not behind a multiplexer. Its resistance falls linearly as more
//! of it is submerged.

use hal::blocking::delay::DelayMs;
use log::debug;

use crate::error::{ConfigError, Error};
use crate::interface::BusInterface;
use crate::sensors::adc::{self, PollConfig};

/// Bus address of the control board ADC.
pub const ADDRESS: u8 = 0x6C;

/// ADC input the depth sensor is wired to.
pub const CHANNEL: u8 = 1;

/// Physical constants of the depth sensor and its divider.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TankCalibration {
    /// Fixed divider resistor, in ohms.
    pub reference_ohms: f32,
    /// ADC voltage corresponding to a ratio of 1.
    pub adc_reference_volts: f32,
    /// Voltage across the divider.
    pub supply_volts: f32,
    /// Depth change per ohm of sensor resistance, in cm.
    pub slope_cm_per_ohm: f32,
    /// Depth at zero sensor resistance, in cm.
    pub intercept_cm: f32,
    /// Depths below this read as an empty tank.
    pub min_depth_cm: f32,
    pub tank_height_cm: f32,
    /// Conversions averaged per reading.
    pub samples: u8,
}

impl Default for TankCalibration {
    fn default() -> Self {
        Self {
            reference_ohms: 560.0,
            adc_reference_volts: 2.048,
            supply_volts: 5.0,
            slope_cm_per_ohm: -1.0 / 56.0,
            intercept_cm: 21.3,
            min_depth_cm: 1.0,
            tank_height_cm: 10.0,
            samples: 5,
        }
    }
}

impl TankCalibration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.reference_ohms) {
            Err(ConfigError::InvalidTankCalibration("reference resistance must be positive"))
        } else if !positive(self.adc_reference_volts) || !positive(self.supply_volts) {
            Err(ConfigError::InvalidTankCalibration("voltages must be positive"))
        } else if !positive(self.tank_height_cm) {
            Err(ConfigError::InvalidTankCalibration("tank height must be positive"))
        } else if !self.slope_cm_per_ohm.is_finite() || !self.intercept_cm.is_finite() {
            Err(ConfigError::InvalidTankCalibration("depth line must be finite"))
        } else if self.samples == 0 {
            Err(ConfigError::InvalidTankCalibration("at least one sample is required"))
        } else {
            Ok(())
        }
    }

    /// Convert an averaged ADC ratio into a tank level.
    pub fn level(&self, ratio: f32) -> TankLevel {
        let fraction = ratio * self.adc_reference_volts / self.supply_volts;
        let (resistance_ohms, depth) = if fraction <= 0.0 {
            (f32::INFINITY, 0.0)
        } else {
            let r = self.reference_ohms * (1.0 - fraction) / fraction;
            (r, self.intercept_cm + self.slope_cm_per_ohm * r)
        };
        let depth_cm = if depth < self.min_depth_cm { 0.0 } else { depth };
        TankLevel {
            ratio,
            resistance_ohms,
            depth_cm,
            fraction: (depth_cm / self.tank_height_cm).clamp(0.0, 1.0),
        }
    }
}

/// A decoded tank reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TankLevel {
    /// Averaged ADC ratio.
    pub ratio: f32,
    pub resistance_ohms: f32,
    pub depth_cm: f32,
    /// Share of the tank height that is filled, in `[0, 1]`.
    pub fraction: f32,
}

/// Average `calibration.samples` conversions of the depth sensor and decode them.
pub fn read<B, D>(
    bus: &mut B,
    delay: &mut D,
    address: u8,
    channel: u8,
    poll: &PollConfig,
    calibration: &TankCalibration,
) -> Result<TankLevel, Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    let samples = calibration.samples.max(1);
    let mut sum = 0.0;
    for _ in 0..samples {
        sum += adc::read(bus, delay, address, channel, poll)?;
    }
    let level = calibration.level(sum / f32::from(samples));
    debug!(
        "tank ratio {:.4}, sensor {:.1} ohm, depth {:.2} cm",
        level.ratio, level.resistance_ohms, level.depth_cm
    );
    Ok(level)
}
