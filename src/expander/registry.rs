//! Bank mask consolidation.
//!
//! Several control units share each 8-bit output bank, and every unit's valve competes for the
//! one pump. The registry owns the units and derives each bank's mask from all of their declared
//! intents at once, so one unit switching something off can never clear a bit that belongs to
//! another. Masks are recomputed from scratch on every flush and never patched bit by bit.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::control::{Control, ControlUnit, Operation};
use crate::error::{Error, RegistryError};
use crate::expander::{Bank, BankKey, Expander};
use crate::interface::BusInterface;
use crate::pinmap::EXPANDER_ADDRESS;

/// A single pin on a single bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinLocation {
    pub key: BankKey,
    pub pin: u8,
}

impl PinLocation {
    pub fn new(expander: u8, bank: Bank, pin: u8) -> Self {
        Self {
            key: BankKey::new(expander, bank),
            pin,
        }
    }

    fn bit(&self) -> u8 {
        1 << self.pin
    }
}

/// The computed mask of every bank in use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BankMasks(BTreeMap<BankKey, u8>);

impl BankMasks {
    pub fn get(&self, key: BankKey) -> Option<u8> {
        self.0.get(&key).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BankKey, u8)> + '_ {
        self.0.iter().map(|(&k, &m)| (k, m))
    }

    fn or(&mut self, key: BankKey, bits: u8) {
        *self.0.entry(key).or_insert(0) |= bits;
    }
}

/// What a flush did to one bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankWrite {
    /// The mask differed from the output latch and was written.
    Written { key: BankKey, mask: u8 },
    /// The output latch already held the mask; nothing was written.
    Unchanged { key: BankKey, mask: u8 },
}

impl BankWrite {
    pub fn key(&self) -> BankKey {
        match *self {
            BankWrite::Written { key, .. } | BankWrite::Unchanged { key, .. } => key,
        }
    }

    pub fn was_written(&self) -> bool {
        matches!(self, BankWrite::Written { .. })
    }
}

/// Owns every registered [`ControlUnit`] along with the shared pump and housekeeping outputs.
///
/// ```
/// # use greenhouse_io::interface::noop::NoopInterface;
/// # use greenhouse_io::{BankMaskRegistry, Control, ControlUnit, Operation};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let mut bus = NoopInterface;
/// let mut registry = BankMaskRegistry::default();
/// registry.register(ControlUnit::new(1)?)?;
/// registry.register(ControlUnit::new(2)?)?;
///
/// registry.set_desired(1, Control::Fan, Operation::On)?;
/// registry.set_desired(2, Control::Valve, Operation::On)?;
/// registry.flush(1, &mut bus)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BankMaskRegistry {
    units: Vec<ControlUnit>,
    pump: PinLocation,
    analog_power: PinLocation,
    analog_power_on: bool,
}

impl Default for BankMaskRegistry {
    /// The pump on pin 0 and analog sensor power on pin 1 of bank A of the control board
    /// expander.
    fn default() -> Self {
        Self::new(
            PinLocation::new(EXPANDER_ADDRESS, Bank::A, 0),
            PinLocation::new(EXPANDER_ADDRESS, Bank::A, 1),
        )
    }
}

impl BankMaskRegistry {
    pub fn new(pump: PinLocation, analog_power: PinLocation) -> Self {
        Self {
            units: Vec::new(),
            pump,
            analog_power,
            analog_power_on: false,
        }
    }

    /// Take ownership of `unit`. Fails if its id is already registered or any of its pins is
    /// already driven by another unit, the pump or the analog power output.
    pub fn register(&mut self, unit: ControlUnit) -> Result<(), RegistryError> {
        if self.unit(unit.id()).is_some() {
            return Err(RegistryError::DuplicateUnit(unit.id()));
        }
        let key = unit.pins().key();
        let claimed = self
            .units
            .iter()
            .filter(|u| u.pins().key() == key)
            .fold(0u8, |bits, u| bits | u.pins().owned_bits())
            | self.fixed_bits(key);
        let overlap = claimed & unit.pins().owned_bits();
        if overlap != 0 {
            return Err(RegistryError::PinConflict {
                bank: key,
                pin: overlap.trailing_zeros() as u8,
            });
        }
        debug!("registered control unit {} on bank {:?}", unit.id(), key);
        self.units.push(unit);
        Ok(())
    }

    /// The registered units, in registration order.
    pub fn units(&self) -> impl Iterator<Item = &ControlUnit> {
        self.units.iter()
    }

    pub fn unit(&self, id: u8) -> Option<&ControlUnit> {
        self.units.iter().find(|u| u.id() == id)
    }

    /// Record a desired state for one control of unit `id`. For [`Control::Pump`] this only
    /// changes the unit's pump request; no bit is set for it directly.
    pub fn set_desired(&mut self, id: u8, control: Control, operation: Operation) -> Result<(), RegistryError> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or(RegistryError::UnknownUnit(id))?;
        unit.manage(control, operation);
        Ok(())
    }

    /// As [`set_desired`](Self::set_desired), from textual control and operation names.
    pub fn request(&mut self, id: u8, control: &str, operation: &str) -> Result<(), RegistryError> {
        let (control, operation) = crate::control::parse_request(control, operation)?;
        self.set_desired(id, control, operation)
    }

    /// Switch `on` on and `off` off for unit `id`, then flush. Pass [`Control::ALL`] to switch
    /// everything.
    pub fn control<B: BusInterface>(
        &mut self,
        id: u8,
        on: &[Control],
        off: &[Control],
        bus: &mut B,
    ) -> Result<Vec<BankWrite>, Error<B::Error>> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or(Error::UnknownUnit(id))?;
        for &c in on {
            unit.manage(c, Operation::On);
        }
        for &c in off {
            unit.manage(c, Operation::Off);
        }
        self.flush(id, bus)
    }

    /// Whether any registered unit currently wants the pump.
    pub fn pump_requested(&self) -> bool {
        self.units.iter().any(ControlUnit::requests_pump)
    }

    /// Request power for the analog sensors. Takes effect on the next flush of its bank.
    pub fn set_analog_power(&mut self, on: bool) {
        self.analog_power_on = on;
    }

    pub fn analog_power(&self) -> PinLocation {
        self.analog_power
    }

    pub fn pump(&self) -> PinLocation {
        self.pump
    }

    /// OR together every unit's contribution to its bank, plus the pump bit if any unit
    /// requests the pump and the analog power bit if it is requested. Every bank in use appears
    /// in the result, even when its mask is zero.
    pub fn compute_bank_masks(&self) -> BankMasks {
        let mut masks = BankMasks::default();
        masks.or(self.pump.key, 0);
        masks.or(self.analog_power.key, 0);
        for unit in &self.units {
            masks.or(unit.pins().key(), unit.mask());
        }
        if self.pump_requested() {
            masks.or(self.pump.key, self.pump.bit());
        }
        if self.analog_power_on {
            masks.or(self.analog_power.key, self.analog_power.bit());
        }
        masks
    }

    /// Push unit `id`'s bank, and the pump's bank if that is a different one, to the hardware.
    /// Banks whose output latch already matches are left alone.
    pub fn flush<B: BusInterface>(&self, id: u8, bus: &mut B) -> Result<Vec<BankWrite>, Error<B::Error>> {
        let key = self.unit(id).ok_or(Error::UnknownUnit(id))?.pins().key();
        let masks = self.compute_bank_masks();
        let mut writes = vec![Self::write_bank(&masks, key, bus)?];
        if self.pump.key != key {
            writes.push(Self::write_bank(&masks, self.pump.key, bus)?);
        }
        Ok(writes)
    }

    /// Push a single bank to the hardware.
    pub fn flush_bank<B: BusInterface>(&self, key: BankKey, bus: &mut B) -> Result<BankWrite, Error<B::Error>> {
        Self::write_bank(&self.compute_bank_masks(), key, bus)
    }

    /// Push every bank in use to the hardware.
    pub fn flush_all<B: BusInterface>(&self, bus: &mut B) -> Result<Vec<BankWrite>, Error<B::Error>> {
        let masks = self.compute_bank_masks();
        masks
            .iter()
            .map(|(key, _)| Self::write_bank(&masks, key, bus))
            .collect()
    }

    fn write_bank<B: BusInterface>(
        masks: &BankMasks,
        key: BankKey,
        bus: &mut B,
    ) -> Result<BankWrite, Error<B::Error>> {
        let mask = masks.get(key).ok_or(Error::UnknownBank(key))?;
        let mut expander = Expander::new(&mut *bus, key.expander);
        if expander.write_outputs_if_changed(key.bank, mask)? {
            debug!("bank {:?} <- {:#010b}", key, mask);
            Ok(BankWrite::Written { key, mask })
        } else {
            debug!("bank {:?} already holds {:#010b}, no write needed", key, mask);
            Ok(BankWrite::Unchanged { key, mask })
        }
    }

    fn fixed_bits(&self, key: BankKey) -> u8 {
        [self.pump, self.analog_power]
            .iter()
            .filter(|loc| loc.key == key)
            .fold(0u8, |bits, loc| bits | loc.bit())
    }
}
