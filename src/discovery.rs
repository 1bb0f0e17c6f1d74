//! Enumeration of the devices present on the bus.

use alloc::vec::Vec;

use log::debug;

use crate::interface::BusInterface;
use crate::mux::ADDRESS_RANGE;

/// Highest valid 7-bit address.
const MAX_ADDRESS: u8 = 0x7F;

/// Probe every 7-bit address with a single-byte read and return those that acknowledged, in
/// ascending order.
///
/// Sensors behind a multiplexer only show up if one of its channels happens to be selected.
pub fn scan<B: BusInterface>(bus: &mut B) -> Vec<u8> {
    let found: Vec<u8> = (0..=MAX_ADDRESS)
        .filter(|&addr| bus.read_byte(addr).is_ok())
        .collect();
    debug!("bus scan found {:02x?}", found);
    found
}

/// The addresses among `0x70..=0x77` that responded to a [`scan`], i.e. the sensor clusters that
/// are plugged in.
pub fn multiplexers<B: BusInterface>(bus: &mut B) -> Vec<u8> {
    ADDRESS_RANGE
        .filter(|&addr| bus.read_byte(addr).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::test_spy::SpyBus;

    fn populated() -> SpyBus {
        let mut bus = SpyBus::new();
        bus.add_expander(0x20);
        bus.add_device(0x6C);
        bus.add_mux(0x70);
        bus.add_mux(0x73);
        bus.attach(0x39, 0x70, 0);
        bus
    }

    #[test]
    fn scan_lists_responders() {
        let mut bus = populated();
        assert_eq!(scan(&mut bus), vec![0x20, 0x6C, 0x70, 0x73]);
        assert_eq!(bus.ops().len(), 128);
    }

    #[test]
    fn scan_sees_exposed_sensors() {
        let mut bus = populated();
        assert!(bus.write_byte(0x70, 0b0001).is_ok());
        assert_eq!(scan(&mut bus), vec![0x20, 0x39, 0x6C, 0x70, 0x73]);
    }

    #[test]
    fn multiplexers_only() {
        let mut bus = populated();
        assert_eq!(multiplexers(&mut bus), vec![0x70, 0x73]);
        assert_eq!(bus.ops().len(), 8);
    }

    #[test]
    fn empty_bus() {
        assert!(scan(&mut SpyBus::new()).is_empty());
    }
}
