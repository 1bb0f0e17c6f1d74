//! Channel multiplexer on the shared bus.
//!
//! Every sensor cluster sits behind its own four-channel multiplexer, and the sensors on
//! different clusters share bus addresses. Only one channel of one multiplexer may be exposed
//! at a time, so all sensor traffic goes through [`Multiplexer::session`], which selects a
//! channel, runs one sensor transaction and always switches the channel off again.

use core::ops::RangeInclusive;

use log::{debug, error};

use crate::error::{Error, MuxError};
use crate::interface::BusInterface;

/// Bus addresses a multiplexer can be strapped to.
pub const ADDRESS_RANGE: RangeInclusive<u8> = 0x70..=0x77;

/// Number of downstream channels per multiplexer.
pub const CHANNELS: u8 = 4;

/// A multiplexer selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawChannel"))]
pub enum Channel {
    /// Every downstream channel disconnected.
    Off,
    /// Downstream channel `k` connected.
    On(u8),
}

impl Channel {
    /// Downstream channel `k`, which must be in `0..=3`.
    pub fn new(k: u8) -> Result<Self, MuxError> {
        if k < CHANNELS {
            Ok(Channel::On(k))
        } else {
            Err(MuxError::InvalidChannel(k))
        }
    }

    /// The selector byte to write to the multiplexer control register.
    pub fn selector(self) -> u8 {
        match self {
            Channel::Off => 0,
            Channel::On(k) => 1 << k,
        }
    }
}

/// A multiplexer at a validated bus address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawMultiplexer"))]
pub struct Multiplexer {
    address: u8,
}

impl Multiplexer {
    pub fn new(address: u8) -> Result<Self, MuxError> {
        if ADDRESS_RANGE.contains(&address) {
            Ok(Self { address })
        } else {
            Err(MuxError::InvalidAddress(address))
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Write the selector for `channel` and return the control register as read back.
    pub fn select<B: BusInterface>(&self, bus: &mut B, channel: Channel) -> Result<u8, Error<B::Error>> {
        if let Channel::On(k) = channel {
            if k >= CHANNELS {
                return Err(Error::InvalidChannel(k));
            }
        }
        bus.write_byte(self.address, channel.selector())
            .map_err(Error::Bus)?;
        let status = bus.read_byte(self.address).map_err(Error::Bus)?;
        debug!("mux {:#04x} select {:?}, status {:#06b}", self.address, channel, status);
        Ok(status)
    }

    /// Switch every channel off and check that the multiplexer agrees.
    pub fn release<B: BusInterface>(&self, bus: &mut B) -> Result<(), Error<B::Error>> {
        match self.select(bus, Channel::Off)? {
            0 => Ok(()),
            status => {
                error!("mux {:#04x} still reports {:#06b} after release", self.address, status);
                Err(Error::BusConflict {
                    address: self.address,
                    status,
                })
            }
        }
    }

    /// Run `f` with `channel` exposed.
    ///
    /// The multiplexer is released afterwards no matter how `f` went. If the release fails, that
    /// failure is returned in place of `f`'s result, since the bus can no longer be trusted.
    pub fn session<B, T, F>(&self, bus: &mut B, channel: Channel, f: F) -> Result<T, Error<B::Error>>
    where
        B: BusInterface,
        F: FnOnce(&mut B) -> Result<T, Error<B::Error>>,
    {
        let outcome = match self.select(bus, channel) {
            Ok(_) => f(bus),
            Err(e) => Err(e),
        };
        self.release(bus)?;
        outcome
    }
}

/// Wire form of [`Channel`], checked by [`Channel::new`] on the way in.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
enum RawChannel {
    Off,
    On(u8),
}

#[cfg(feature = "serde")]
impl TryFrom<RawChannel> for Channel {
    type Error = MuxError;

    fn try_from(raw: RawChannel) -> Result<Self, MuxError> {
        match raw {
            RawChannel::Off => Ok(Channel::Off),
            RawChannel::On(k) => Channel::new(k),
        }
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawMultiplexer {
    address: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawMultiplexer> for Multiplexer {
    type Error = MuxError;

    fn try_from(raw: RawMultiplexer) -> Result<Self, MuxError> {
        Multiplexer::new(raw.address)
    }
}
