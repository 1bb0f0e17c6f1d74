//! Four-channel ratiometric ADC, used for soil moisture probes and the tank level sensor.
//!
//! Conversions are one-shot at 12 bits and unity gain. After the command byte the device is
//! polled until its ready bit clears.

use core::fmt::Debug;

use hal::blocking::delay::DelayMs;
use log::debug;

use crate::error::{Error, SensorFault};
use crate::interface::BusInterface;

/// Bus address of the ADC on each sensor cluster.
pub const CLUSTER_ADDRESS: u8 = 0x68;

/// Largest positive 12-bit reading.
pub const FULL_SCALE: f32 = 2047.0;

const START_ONE_SHOT: u8 = 0b1000_0000;
const NOT_READY: u8 = 0b1000_0000;
const SIGN: u16 = 0x800;

/// How long to wait for a conversion, and how often to check on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PollConfig {
    pub timeout_ms: u32,
    pub interval_ms: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 100,
            interval_ms: 5,
        }
    }
}

impl PollConfig {
    /// Status reads issued before giving up: one straight away and one after every interval.
    pub fn max_reads(&self) -> u32 {
        (self.timeout_ms / self.interval_ms.max(1)).saturating_add(1)
    }
}

/// Command byte that starts a one-shot conversion on input `channel` (1 through 4).
pub fn command<E: Debug>(channel: u8) -> Result<u8, Error<E>> {
    match channel {
        1..=4 => Ok(START_ONE_SHOT | (channel - 1) << 5),
        other => Err(Error::InvalidAdcChannel(other)),
    }
}

/// The signed 12-bit conversion result held in the first two bytes of a read.
pub fn raw_value(b0: u8, b1: u8) -> i16 {
    let bits = u16::from(b0 & 0x0F) << 8 | u16::from(b1);
    if bits & SIGN != 0 {
        bits as i16 - 0x1000
    } else {
        bits as i16
    }
}

/// Ratio of a raw reading to full scale, clamped to `[-1, 1]`.
pub fn ratio(raw: i16) -> f32 {
    (f32::from(raw) / FULL_SCALE).clamp(-1.0, 1.0)
}

/// Check a moisture probe ratio against the open band `(low, high)`. Outside it the probe is
/// unplugged or unpowered.
pub fn moisture(ratio: f32, band: (f32, f32)) -> Result<f32, SensorFault> {
    if ratio > band.0 && ratio < band.1 {
        Ok(ratio)
    } else {
        Err(SensorFault::SensorDisconnected(ratio))
    }
}

/// The ratio encoded by the two data bytes of a conversion.
pub fn decode(raw: [u8; 2]) -> f32 {
    ratio(raw_value(raw[0], raw[1]))
}

/// Start a conversion on input `channel` of the ADC at `address`, wait for it to finish and
/// return its two data bytes.
pub fn fetch<B, D>(
    bus: &mut B,
    delay: &mut D,
    address: u8,
    channel: u8,
    poll: &PollConfig,
) -> Result<[u8; 2], Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    bus.write_byte(address, command(channel)?).map_err(Error::Bus)?;
    let mut block = [0u8; 3];
    for n in 0..poll.max_reads() {
        if n > 0 {
            delay.delay_ms(poll.interval_ms);
        }
        bus.read_block(address, 0, &mut block).map_err(Error::Bus)?;
        if block[2] & NOT_READY == 0 {
            debug!("adc {:#04x} channel {} ready after {} reads", address, channel, n + 1);
            return Ok([block[0], block[1]]);
        }
    }
    Err(SensorFault::ConversionTimeout(address).into())
}

/// [`fetch`] and [`decode`].
pub fn read<B, D>(
    bus: &mut B,
    delay: &mut D,
    address: u8,
    channel: u8,
    poll: &PollConfig,
) -> Result<f32, Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    fetch(bus, delay, address, channel, poll).map(decode)
}
