//! The register addresses within the output expander.
//!
//! The expander is an MCP23017-style part running with `IOCON.BANK = 0`, so the registers for
//! bank A and bank B are interleaved at consecutive addresses.

use crate::expander::Bank;

/// A register address within the expander. These are created by conversion from `Register`.
/// It is a newtype around `u8` that prevents arbitrary addresses from being forged and passed to
/// the bus.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RegisterAddress(pub(crate) u8);

impl From<RegisterAddress> for u8 {
    /// Convert a `RegisterAddress` into a `u8` corresponding to the hardware address.
    fn from(addr: RegisterAddress) -> u8 {
        addr.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// I/O direction register for a bank. A cleared bit makes the pin an output; the reset
    /// value is all ones (all inputs).
    IoDirection(Bank),

    /// Output latch register for a bank. Writing sets the levels driven on output pins,
    /// reading returns the last value written.
    OutputLatch(Bank),
}

/// Direction register value that makes every pin of a bank an output.
pub const ALL_OUTPUTS: u8 = 0x00;

impl From<Register> for RegisterAddress {
    /// Convert a `Register` into a `RegisterAddress`.
    fn from(reg: Register) -> RegisterAddress {
        use self::Register::*;
        match reg {
            IoDirection(bank) => RegisterAddress(bank.index()),
            OutputLatch(bank) => RegisterAddress(0x14 + bank.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_direction_address() {
        assert_eq!(RegisterAddress::from(Register::IoDirection(Bank::A)), RegisterAddress(0x00));
        assert_eq!(RegisterAddress::from(Register::IoDirection(Bank::B)), RegisterAddress(0x01));
    }

    #[test]
    fn output_latch_address() {
        assert_eq!(RegisterAddress::from(Register::OutputLatch(Bank::A)), RegisterAddress(0x14));
        assert_eq!(RegisterAddress::from(Register::OutputLatch(Bank::B)), RegisterAddress(0x15));
    }
}
