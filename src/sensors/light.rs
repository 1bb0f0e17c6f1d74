//! Two-channel ambient light sensor.
//!
//! The sensor reports each channel as a single byte in a piecewise-exponential ("chord and
//! step") encoding. Channel 0 sees visible plus infrared light, channel 1 infrared only; lux is
//! derived from both.

use hal::blocking::delay::DelayMs;
use log::debug;
#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::error::{Error, SensorFault};
use crate::interface::BusInterface;

/// Bus address of the light sensor.
pub const ADDRESS: u8 = 0x39;

/// Power-up command. The sensor echoes it back from the register of the same number.
const POWER_ON: u8 = 0x03;
const READ_CHANNEL_0: u8 = 0x43;
const READ_CHANNEL_1: u8 = 0x83;

const VALID: u8 = 0b1000_0000;
const CHORD: u8 = 0b0111_0000;
const STEP: u8 = 0b0000_1111;

/// Integration mode of the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightMode {
    /// Full resolution, 400 ms per channel.
    #[default]
    Standard,
    /// Reduced resolution, 80 ms per channel; counts are scaled by 5.
    Extended,
}

impl LightMode {
    pub fn command(self) -> u8 {
        match self {
            LightMode::Standard => 0x18,
            LightMode::Extended => 0x1D,
        }
    }

    pub fn integration_ms(self) -> u32 {
        match self {
            LightMode::Standard => 400,
            LightMode::Extended => 80,
        }
    }

    pub fn scale(self) -> u32 {
        match self {
            LightMode::Standard => 1,
            LightMode::Extended => 5,
        }
    }
}

/// Both channel bytes and what they decode to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    pub raw: [u8; 2],
    pub count0: u32,
    pub count1: u32,
    pub lux: f32,
}

/// Convert one channel byte to an ADC count.
///
/// Bit 7 flags valid data, bits 6-4 select the chord and bits 3-0 the step within it. The chord
/// boundaries are `floor(16.5 * (2^chord - 1))`, i.e. 0, 16, 49, 115, 247, 511, 1039 and 2095.
pub fn count(channel: u8, byte: u8) -> Result<u32, SensorFault> {
    if byte & VALID == 0 {
        return Err(SensorFault::InvalidLightData { channel, raw: byte });
    }
    let chord = u32::from((byte & CHORD) >> 4);
    let step = u32::from(byte & STEP);
    let step_size = 1u32 << chord;
    Ok(33 * (step_size - 1) / 2 + step_size * step)
}

/// Lux from the two (already scaled) channel counts. Zero whenever the infrared count reaches
/// the total, which includes complete darkness.
pub fn lux(count0: u32, count1: u32) -> f32 {
    if count0 <= count1 {
        return 0.0;
    }
    let visible = (count0 - count1) as f32;
    let ratio = count1 as f32 / visible;
    visible * 0.39 * (-0.181 * ratio * ratio).exp()
}

/// Decode both channel bytes as read in `mode`.
pub fn decode(raw: [u8; 2], mode: LightMode) -> Result<LightSample, SensorFault> {
    let count0 = count(0, raw[0])? * mode.scale();
    let count1 = count(1, raw[1])? * mode.scale();
    Ok(LightSample {
        raw,
        count0,
        count1,
        lux: lux(count0, count1),
    })
}

/// Power the sensor up and integrate both channels in `mode`, returning the raw channel bytes.
pub fn fetch<B, D>(bus: &mut B, delay: &mut D, mode: LightMode) -> Result<[u8; 2], Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    bus.write_byte(ADDRESS, POWER_ON).map_err(Error::Bus)?;
    let echo = bus.read_byte_register(ADDRESS, POWER_ON).map_err(Error::Bus)?;
    if echo != POWER_ON {
        return Err(SensorFault::LightSensorUnpowered(echo).into());
    }
    bus.write_byte(ADDRESS, mode.command()).map_err(Error::Bus)?;

    let mut raw = [0u8; 2];
    for (slot, command) in raw.iter_mut().zip([READ_CHANNEL_0, READ_CHANNEL_1]) {
        bus.write_byte(ADDRESS, command).map_err(Error::Bus)?;
        delay.delay_ms(mode.integration_ms());
        *slot = bus.read_byte(ADDRESS).map_err(Error::Bus)?;
    }
    debug!("light sensor raw {:#04x} {:#04x}", raw[0], raw[1]);
    Ok(raw)
}

/// [`fetch`] and [`decode`].
pub fn read<B, D>(bus: &mut B, delay: &mut D, mode: LightMode) -> Result<LightSample, Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    let raw = fetch(bus, delay, mode)?;
    Ok(decode(raw, mode)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::test_spy::{BusOp, SpyBus, SpyDelay};
    use proptest::prelude::*;

    #[test]
    fn chord_boundaries() {
        let starts: Vec<u32> = (0..8).map(|c| count(0, 0x80 | c << 4).unwrap()).collect();
        assert_eq!(starts, vec![0, 16, 49, 115, 247, 511, 1039, 2095]);
        assert_eq!(count(0, 0xFF), Ok(2095 + 128 * 15));
    }

    #[test]
    fn invalid_bit() {
        assert_eq!(
            count(1, 0x48),
            Err(SensorFault::InvalidLightData { channel: 1, raw: 0x48 })
        );
    }

    #[test]
    fn bench_pair() {
        let sample = decode([0xC8, 0xA5], LightMode::Standard).unwrap();
        assert_eq!((sample.count0, sample.count1), (375, 69));
        assert!((sample.lux - 118.2467).abs() < 1e-2);
    }

    #[test]
    fn extended_mode_scales_counts() {
        let sample = decode([0xC8, 0xA5], LightMode::Extended).unwrap();
        assert_eq!((sample.count0, sample.count1), (1875, 345));
        assert!((sample.lux - 5.0 * 118.2467).abs() < 5e-2);
    }

    #[test]
    fn dark_is_zero() {
        assert_eq!(decode([0x80, 0x80], LightMode::Standard).unwrap().lux, 0.0);
        assert_eq!(lux(100, 100), 0.0);
        assert_eq!(lux(50, 100), 0.0);
    }

    #[test]
    fn read_sequence() {
        let mut bus = SpyBus::new();
        bus.add_device(ADDRESS);
        bus.set_register(ADDRESS, 0x03, 0x03);
        bus.queue_bytes(ADDRESS, &[0xC8, 0xA5]);
        let mut delay = SpyDelay::default();

        let sample = read(&mut bus.split(), &mut delay, LightMode::Standard).unwrap();
        assert_eq!(sample.raw, [0xC8, 0xA5]);
        assert_eq!(delay.calls, vec![400, 400]);
        assert_eq!(
            bus.ops(),
            vec![
                BusOp::WriteByte(ADDRESS, 0x03),
                BusOp::ReadRegister(ADDRESS, 0x03),
                BusOp::WriteByte(ADDRESS, 0x18),
                BusOp::WriteByte(ADDRESS, 0x43),
                BusOp::ReadByte(ADDRESS),
                BusOp::WriteByte(ADDRESS, 0x83),
                BusOp::ReadByte(ADDRESS),
            ]
        );
    }

    #[test]
    fn unpowered_sensor() {
        let mut bus = SpyBus::new();
        bus.add_device(ADDRESS);
        bus.set_register(ADDRESS, 0x03, 0x00);
        let mut delay = SpyDelay::default();
        assert!(matches!(
            read(&mut bus, &mut delay, LightMode::Extended),
            Err(Error::Sensor(SensorFault::LightSensorUnpowered(0)))
        ));
        assert_eq!(delay.total_ms, 0);
    }

    proptest! {
        #[test]
        fn lux_is_finite_and_non_negative(b0 in 0x80u8.., b1 in 0x80u8.., extended in any::<bool>()) {
            let mode = if extended { LightMode::Extended } else { LightMode::Standard };
            let sample = decode([b0, b1], mode).unwrap();
            prop_assert!(sample.lux.is_finite());
            prop_assert!(sample.lux >= 0.0);
        }

        #[test]
        fn counts_grow_with_the_code(code in 0u8..0x7F) {
            prop_assert!(count(0, 0x80 | code).unwrap() < count(0, 0x80 | (code + 1)).unwrap());
        }
    }
}
