//! Fixed mapping from plant unit identifiers to expander pins.

use crate::control::Control;
use crate::error::PinMapError;
use crate::expander::{Bank, BankKey};

/// Bus address of the output expander on the control board.
pub const EXPANDER_ADDRESS: u8 = 0x20;

/// Bank 0 pins below this number are reserved for housekeeping outputs (the shared pump and
/// analog sensor power).
pub const RESERVED_PINS: u8 = 2;

/// Highest identifier in the built-in table.
pub const MAX_UNIT_ID: u8 = 4;

/// Where the outputs of one control unit live on the expander.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawPinMap"))]
pub struct PinMap {
    expander: u8,
    bank: Bank,
    fan: u8,
    light: u8,
    valve: u8,
}

impl PinMap {
    /// Build a pin map, rejecting pins that do not exist, pins shared between two controls, and
    /// the reserved housekeeping pins of bank A.
    pub fn new(expander: u8, bank: Bank, fan: u8, light: u8, valve: u8) -> Result<Self, PinMapError> {
        let pins = [fan, light, valve];
        if let Some(&pin) = pins.iter().find(|&&p| p > 7) {
            return Err(PinMapError::PinOutOfRange(pin));
        }
        if bank == Bank::A {
            if let Some(&pin) = pins.iter().find(|&&p| p < RESERVED_PINS) {
                return Err(PinMapError::ReservedPin(pin));
            }
        }
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(PinMapError::DuplicatePin(*pin));
            }
        }
        Ok(Self {
            expander,
            bank,
            fan,
            light,
            valve,
        })
    }

    /// Look up the built-in mapping for plant unit `id` (1 through 4).
    pub fn for_unit(id: u8) -> Result<Self, PinMapError> {
        let (bank, fan, light, valve) = match id {
            1 => (Bank::A, 2, 3, 4),
            2 => (Bank::A, 5, 6, 7),
            3 => (Bank::B, 0, 1, 2),
            4 => (Bank::B, 3, 5, 6),
            _ => return Err(PinMapError::UnknownUnit(id)),
        };
        Self::new(EXPANDER_ADDRESS, bank, fan, light, valve)
    }

    pub fn expander(&self) -> u8 {
        self.expander
    }

    pub fn bank(&self) -> Bank {
        self.bank
    }

    pub fn key(&self) -> BankKey {
        BankKey::new(self.expander, self.bank)
    }

    /// The pin driving `control`, or `None` for the pump, which is shared and lives elsewhere.
    pub fn pin(&self, control: Control) -> Option<u8> {
        match control {
            Control::Fan => Some(self.fan),
            Control::Light => Some(self.light),
            Control::Valve => Some(self.valve),
            Control::Pump => None,
        }
    }

    /// Bits of this unit's pins within its bank.
    pub fn owned_bits(&self) -> u8 {
        (1 << self.fan) | (1 << self.light) | (1 << self.valve)
    }
}

/// Wire form of [`PinMap`], checked by [`PinMap::new`] on the way in.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawPinMap {
    expander: u8,
    bank: Bank,
    fan: u8,
    light: u8,
    valve: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawPinMap> for PinMap {
    type Error = PinMapError;

    fn try_from(raw: RawPinMap) -> Result<Self, PinMapError> {
        PinMap::new(raw.expander, raw.bank, raw.fan, raw.light, raw.valve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries() {
        let one = PinMap::for_unit(1).unwrap();
        assert_eq!(one.key(), BankKey::new(0x20, Bank::A));
        assert_eq!(one.pin(Control::Fan), Some(2));
        assert_eq!(one.pin(Control::Light), Some(3));
        assert_eq!(one.pin(Control::Valve), Some(4));
        assert_eq!(one.pin(Control::Pump), None);

        let four = PinMap::for_unit(4).unwrap();
        assert_eq!(four.bank(), Bank::B);
        assert_eq!(four.owned_bits(), 0b0110_1000);
    }

    #[test]
    fn table_entries_do_not_overlap_within_a_bank() {
        let a = PinMap::for_unit(1).unwrap().owned_bits() & PinMap::for_unit(2).unwrap().owned_bits();
        let b = PinMap::for_unit(3).unwrap().owned_bits() & PinMap::for_unit(4).unwrap().owned_bits();
        assert_eq!(a, 0);
        assert_eq!(b, 0);
    }

    #[test]
    fn unknown_unit() {
        assert_eq!(PinMap::for_unit(0), Err(PinMapError::UnknownUnit(0)));
        assert_eq!(PinMap::for_unit(5), Err(PinMapError::UnknownUnit(5)));
    }

    #[test]
    fn reserved_pins_rejected_on_bank_a() {
        assert_eq!(
            PinMap::new(0x20, Bank::A, 0, 3, 4),
            Err(PinMapError::ReservedPin(0))
        );
        assert_eq!(
            PinMap::new(0x20, Bank::A, 2, 3, 1),
            Err(PinMapError::ReservedPin(1))
        );
    }

    #[test]
    fn low_pins_allowed_on_bank_b() {
        assert!(PinMap::new(0x20, Bank::B, 0, 1, 2).is_ok());
    }

    #[test]
    fn pin_range_and_duplicates() {
        assert_eq!(
            PinMap::new(0x20, Bank::B, 0, 8, 2),
            Err(PinMapError::PinOutOfRange(8))
        );
        assert_eq!(
            PinMap::new(0x20, Bank::B, 3, 5, 3),
            Err(PinMapError::DuplicatePin(3))
        );
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn table_entry_deserializes() {
        let map: PinMap =
            serde_json::from_str(r#"{"expander":32,"bank":"B","fan":3,"light":5,"valve":6}"#).unwrap();
        assert_eq!(map, PinMap::for_unit(4).unwrap());
    }

    #[test]
    fn reserved_pins_rejected_on_deserialize() {
        let json = r#"{"expander":32,"bank":"A","fan":0,"light":1,"valve":4}"#;
        let err = serde_json::from_str::<PinMap>(json).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{}", err);
    }

    #[test]
    fn bad_pins_rejected_on_deserialize() {
        for json in [
            r#"{"expander":32,"bank":"A","fan":0,"light":1,"valve":9}"#,
            r#"{"expander":32,"bank":"B","fan":0,"light":8,"valve":2}"#,
            r#"{"expander":32,"bank":"B","fan":3,"light":3,"valve":2}"#,
        ] {
            assert!(serde_json::from_str::<PinMap>(json).is_err(), "{}", json);
        }
    }
}
