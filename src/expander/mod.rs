//! The output expander device API. This provides the `Expander` type, a direct abstraction of
//! the bank-addressed output expander, and the [`BankMaskRegistry`] that lets several control
//! units share its banks.

use core::fmt;

use crate::error::{Error, PinMapError};
use crate::interface::BusInterface;
use crate::registers::{Register, RegisterAddress, ALL_OUTPUTS};

pub mod registry;

pub use self::registry::{BankMaskRegistry, BankMasks, BankWrite, PinLocation};

/// One of the two 8-bit port banks on the expander.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bank {
    A,
    B,
}

impl Bank {
    /// Register offset of this bank.
    pub fn index(self) -> u8 {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }
}

impl TryFrom<u8> for Bank {
    type Error = PinMapError;

    fn try_from(index: u8) -> Result<Self, PinMapError> {
        match index {
            0 => Ok(Bank::A),
            1 => Ok(Bank::B),
            other => Err(PinMapError::InvalidBank(other)),
        }
    }
}

/// A physical bank: which expander on the bus, and which bank on that expander.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BankKey {
    pub expander: u8,
    pub bank: Bank,
}

impl BankKey {
    pub fn new(expander: u8, bank: Bank) -> Self {
        Self { expander, bank }
    }
}

impl fmt::Debug for BankKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}/{:?}", self.expander, self.bank)
    }
}

/// The output expander at one bus address.
pub struct Expander<B: BusInterface> {
    bus: B,
    address: u8,
}

impl<B: BusInterface> Expander<B> {
    /// Create a new `Expander`.
    ///
    /// Takes ownership of the `BusInterface` (or a `&mut` borrow of one) which it should use to
    /// reach the device at `address`.
    pub fn new(bus: B, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read back the output latch of `bank`, i.e. the mask most recently written to it.
    pub fn read_outputs(&mut self, bank: Bank) -> Result<u8, Error<B::Error>> {
        let reg = RegisterAddress::from(Register::OutputLatch(bank));
        self.bus
            .read_byte_register(self.address, u8::from(reg))
            .map_err(Error::Bus)
    }

    /// Drive `mask` onto the pins of `bank`.
    ///
    /// The direction register is set to all outputs first: the latch has no effect on a pin
    /// until the device has been told the pin is an output.
    pub fn write_outputs(&mut self, bank: Bank, mask: u8) -> Result<(), Error<B::Error>> {
        let dir = RegisterAddress::from(Register::IoDirection(bank));
        let latch = RegisterAddress::from(Register::OutputLatch(bank));
        self.bus
            .write_byte_register(self.address, u8::from(dir), ALL_OUTPUTS)
            .map_err(Error::Bus)?;
        self.bus
            .write_byte_register(self.address, u8::from(latch), mask)
            .map_err(Error::Bus)
    }

    /// Write `mask` to `bank` unless the output latch already holds it. Returns whether a write
    /// was issued.
    pub fn write_outputs_if_changed(&mut self, bank: Bank, mask: u8) -> Result<bool, Error<B::Error>> {
        let current = self.read_outputs(bank)?;
        if current == mask {
            Ok(false)
        } else {
            self.write_outputs(bank, mask)?;
            Ok(true)
        }
    }

    /// Release the bus.
    pub fn release(self) -> B {
        self.bus
    }
}
