//! Combined relative humidity and temperature sensor.

use hal::blocking::delay::DelayMs;
use log::debug;

use crate::error::{Error, SensorFault};
use crate::interface::BusInterface;

/// Bus address of the humidity sensor.
pub const ADDRESS: u8 = 0x27;

/// Time a measurement takes after it has been triggered.
pub const DEFAULT_SETTLE_MS: u32 = 250;

const STATUS_SHIFT: u8 = 6;
const FULL_SCALE: f32 = 16382.0;

/// One decoded measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumiditySample {
    pub raw: [u8; 4],
    /// 0 for fresh data, 1 for data already read once.
    pub status: u8,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Temperature in degrees Celsius.
    pub temperature: f32,
}

/// Decode the four-byte measurement block.
///
/// The top two bits of the first byte are the status. Statuses 0 (fresh) and 1 (stale) carry
/// usable data; 2 (command mode) and 3 (diagnostic) do not.
pub fn decode(raw: [u8; 4]) -> Result<HumiditySample, SensorFault> {
    let status = raw[0] >> STATUS_SHIFT;
    if status > 1 {
        return Err(SensorFault::HumidityStatus(status));
    }
    let humidity = (u16::from(raw[0] & 0x3F) << 8 | u16::from(raw[1])) as f32;
    let temperature = ((u16::from(raw[2]) << 6) + (u16::from(raw[3] & 0xFC) >> 2)) as f32;
    Ok(HumiditySample {
        raw,
        status,
        humidity: humidity * 100.0 / FULL_SCALE,
        temperature: temperature * 165.0 / FULL_SCALE - 40.0,
    })
}

/// Trigger a measurement, wait `settle_ms` and fetch the raw block.
pub fn fetch<B, D>(bus: &mut B, delay: &mut D, settle_ms: u32) -> Result<[u8; 4], Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    bus.quick_write(ADDRESS).map_err(Error::Bus)?;
    delay.delay_ms(settle_ms);
    let mut raw = [0u8; 4];
    bus.read_block(ADDRESS, 0, &mut raw).map_err(Error::Bus)?;
    debug!("humidity sensor raw {:02x?}", raw);
    Ok(raw)
}

/// [`fetch`] and [`decode`].
pub fn read<B, D>(bus: &mut B, delay: &mut D, settle_ms: u32) -> Result<HumiditySample, Error<B::Error>>
where
    B: BusInterface,
    D: DelayMs<u32>,
{
    let raw = fetch(bus, delay, settle_ms)?;
    Ok(decode(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::test_spy::{BusOp, SpyBus, SpyDelay};
    use proptest::prelude::*;

    #[test]
    fn decode_midpoint() {
        let sample = decode([0x1F, 0xFF, 0x66, 0x64]).unwrap();
        assert_eq!(sample.status, 0);
        assert!((sample.humidity - 50.0).abs() < 1e-3);
        assert!((sample.temperature - 26.002).abs() < 1e-2);
    }

    #[test]
    fn decode_extremes() {
        let low = decode([0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(low.humidity, 0.0);
        assert_eq!(low.temperature, -40.0);

        let high = decode([0x3F, 0xFE, 0xFF, 0xF8]).unwrap();
        assert!((high.humidity - 100.0).abs() < 1e-3);
        assert!((high.temperature - 125.0).abs() < 1e-2);
    }

    #[test]
    fn stale_data_is_accepted() {
        assert_eq!(decode([0x5F, 0xFF, 0x66, 0x64]).unwrap().status, 1);
    }

    #[test]
    fn command_and_diagnostic_status_rejected() {
        assert_eq!(decode([0x80, 0, 0, 0]), Err(SensorFault::HumidityStatus(2)));
        assert_eq!(decode([0xC0, 0, 0, 0]), Err(SensorFault::HumidityStatus(3)));
    }

    #[test]
    fn read_triggers_then_waits() {
        let mut bus = SpyBus::new();
        bus.add_device(ADDRESS);
        bus.queue_block(ADDRESS, &[0x1F, 0xFF, 0x66, 0x64]);
        let mut delay = SpyDelay::default();
        assert!(read(&mut bus.split(), &mut delay, 250).is_ok());
        assert_eq!(delay.calls, vec![250]);
        assert_eq!(
            bus.ops(),
            vec![BusOp::Quick(ADDRESS), BusOp::ReadBlock(ADDRESS, 0, 4)]
        );
    }

    #[test]
    fn read_reports_status_fault() {
        let mut bus = SpyBus::new();
        bus.add_device(ADDRESS);
        bus.queue_block(ADDRESS, &[0xC0, 0, 0, 0]);
        let mut delay = SpyDelay::default();
        assert!(matches!(
            read(&mut bus, &mut delay, 250),
            Err(Error::Sensor(SensorFault::HumidityStatus(3)))
        ));
    }

    #[test]
    fn absent_sensor_is_a_bus_error() {
        let mut bus = SpyBus::new();
        let mut delay = SpyDelay::default();
        assert!(matches!(read(&mut bus.split(), &mut delay, 250), Err(Error::Bus(_))));
        assert_eq!(bus.ops().len(), 1);
        assert_eq!(delay.total_ms, 0);
    }

    proptest! {
        #[test]
        fn valid_blocks_stay_in_range(b0 in 0u8..0x80, b1 in any::<u8>(), b2 in any::<u8>(), b3 in any::<u8>()) {
            let sample = decode([b0, b1, b2, b3]).unwrap();
            prop_assert!(sample.humidity >= 0.0 && sample.humidity <= 100.1);
            prop_assert!(sample.temperature >= -40.0 && sample.temperature <= 125.1);
        }
    }
}
