//! This module provides the shim between `embedded-hal` I2C implementations and the byte and
//! register conventions used by the devices on the shared bus (SMBus-style byte, byte-data,
//! block and quick transactions).

use core::fmt::Debug;

/// A bus transport implements this trait. Every operation is synchronous and addresses a 7-bit
/// device address; each may fail with the transport's own error type.
pub trait BusInterface {
    /// The type of error that transactions may return.
    type Error: Debug;

    /// Send a single byte to the device at `addr`.
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), Self::Error>;

    /// Write `value` into register `reg` of the device at `addr`.
    fn write_byte_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), Self::Error>;

    /// Receive a single byte from the device at `addr`.
    fn read_byte(&mut self, addr: u8) -> Result<u8, Self::Error>;

    /// Fetch the value of register `reg` of the device at `addr`.
    fn read_byte_register(&mut self, addr: u8, reg: u8) -> Result<u8, Self::Error>;

    /// Read `buf.len()` consecutive bytes starting at register `reg` of the device at `addr`.
    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Address the device at `addr` with no payload. Some sensors use this as a trigger.
    fn quick_write(&mut self, addr: u8) -> Result<(), Self::Error>;
}

impl<B: BusInterface + ?Sized> BusInterface for &mut B {
    type Error = B::Error;

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_byte(addr, value)
    }
    fn write_byte_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_byte_register(addr, reg, value)
    }
    fn read_byte(&mut self, addr: u8) -> Result<u8, Self::Error> {
        (**self).read_byte(addr)
    }
    fn read_byte_register(&mut self, addr: u8, reg: u8) -> Result<u8, Self::Error> {
        (**self).read_byte_register(addr, reg)
    }
    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_block(addr, reg, buf)
    }
    fn quick_write(&mut self, addr: u8) -> Result<(), Self::Error> {
        (**self).quick_write(addr)
    }
}

// This is here (and has to be pub) for doctests only. It's useless otherwise.
#[doc(hidden)]
pub mod noop {
    use super::BusInterface;
    pub struct NoopInterface;
    impl BusInterface for NoopInterface {
        type Error = core::convert::Infallible;
        fn write_byte(&mut self, _addr: u8, _value: u8) -> Result<(), Self::Error> {
            Ok(())
        }
        fn write_byte_register(&mut self, _addr: u8, _reg: u8, _value: u8) -> Result<(), Self::Error> {
            Ok(())
        }
        fn read_byte(&mut self, _addr: u8) -> Result<u8, Self::Error> {
            Ok(0u8)
        }
        fn read_byte_register(&mut self, _addr: u8, _reg: u8) -> Result<u8, Self::Error> {
            Ok(0u8)
        }
        fn read_block(&mut self, _addr: u8, _reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
            buf.iter_mut().for_each(|b| *b = 0);
            Ok(())
        }
        fn quick_write(&mut self, _addr: u8) -> Result<(), Self::Error> {
            Ok(())
        }
    }
}

pub mod i2c {
    //! The I2C interface drives the bus through any `embedded-hal` blocking I2C master.

    use hal::blocking::i2c::{Read, Write, WriteRead};

    use super::BusInterface;

    /// The union of all errors that may occur on the I2C interface: one variant for each of the
    /// error types of the write, read and write-read operations.
    #[derive(Debug)]
    pub enum I2cInterfaceError<WE, RE, WRE> {
        /// An error occurred during an I2C write.
        WriteError(WE),
        /// An error occurred during an I2C read.
        ReadError(RE),
        /// An error occurred during a combined write-read.
        WriteReadError(WRE),
    }

    impl<WE, RE, WRE> I2cInterfaceError<WE, RE, WRE> {
        fn from_write(e: WE) -> Self {
            Self::WriteError(e)
        }
        fn from_read(e: RE) -> Self {
            Self::ReadError(e)
        }
        fn from_write_read(e: WRE) -> Self {
            Self::WriteReadError(e)
        }
    }

    /// A configured `BusInterface` over an `embedded-hal` I2C master device.
    pub struct I2cInterface<I2C> {
        i2c: I2C,
    }

    impl<I2C> I2cInterface<I2C>
    where
        I2C: Write + Read + WriteRead,
    {
        /// Wrap the I2C master device `i2c`.
        pub fn new(i2c: I2C) -> Self {
            Self { i2c }
        }

        /// Give the I2C master device back.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    impl<I2C> BusInterface for I2cInterface<I2C>
    where
        I2C: Write + Read + WriteRead,
        <I2C as Write>::Error: core::fmt::Debug,
        <I2C as Read>::Error: core::fmt::Debug,
        <I2C as WriteRead>::Error: core::fmt::Debug,
    {
        type Error = I2cInterfaceError<
            <I2C as Write>::Error,
            <I2C as Read>::Error,
            <I2C as WriteRead>::Error,
        >;

        fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
            self.i2c.write(addr, &[value]).map_err(Self::Error::from_write)
        }

        fn write_byte_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), Self::Error> {
            self.i2c
                .write(addr, &[reg, value])
                .map_err(Self::Error::from_write)
        }

        fn read_byte(&mut self, addr: u8) -> Result<u8, Self::Error> {
            let mut buf = [0u8];
            self.i2c.read(addr, &mut buf).map_err(Self::Error::from_read)?;
            Ok(buf[0])
        }

        fn read_byte_register(&mut self, addr: u8, reg: u8) -> Result<u8, Self::Error> {
            let mut buf = [0u8];
            self.i2c
                .write_read(addr, &[reg], &mut buf)
                .map_err(Self::Error::from_write_read)?;
            Ok(buf[0])
        }

        fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
            self.i2c
                .write_read(addr, &[reg], buf)
                .map_err(Self::Error::from_write_read)
        }

        fn quick_write(&mut self, addr: u8) -> Result<(), Self::Error> {
            // A zero-length write is the address byte plus ack, which is all a quick command is.
            self.i2c.write(addr, &[]).map_err(Self::Error::from_write)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_spy {
    //! A simulated bus for unit tests. It models the output expander's register file, any
    //! number of multiplexers that gate the devices behind them, and scripted responses for the
    //! sensors. Every transaction is logged so tests can check ordering.

    use super::BusInterface;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum BusOp {
        WriteByte(u8, u8),
        WriteRegister(u8, u8, u8),
        ReadByte(u8),
        ReadRegister(u8, u8),
        ReadBlock(u8, u8, usize),
        Quick(u8),
    }

    impl BusOp {
        pub fn addr(&self) -> u8 {
            use self::BusOp::*;
            match *self {
                WriteByte(a, _)
                | WriteRegister(a, _, _)
                | ReadByte(a)
                | ReadRegister(a, _)
                | ReadBlock(a, _, _)
                | Quick(a) => a,
            }
        }
    }

    /// Returned when a device does not acknowledge, either because it is absent, hidden behind
    /// a multiplexer channel that is not selected, or because a fault was injected.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Nak(pub u8);

    #[derive(Default)]
    struct State {
        ops: Vec<BusOp>,
        registers: HashMap<(u8, u8), u8>,
        byte_reads: HashMap<u8, VecDeque<u8>>,
        blocks: HashMap<u8, VecDeque<Vec<u8>>>,
        muxes: HashMap<u8, u8>,
        stuck: HashMap<u8, u8>,
        behind: HashMap<u8, (u8, u8)>,
        present: HashSet<u8>,
        failing: HashSet<u8>,
    }

    pub struct SpyBus {
        state: Arc<Mutex<State>>,
    }

    impl SpyBus {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(State::default())),
            }
        }

        pub fn split(&self) -> Self {
            Self {
                state: self.state.clone(),
            }
        }

        /// A device that acknowledges its address directly on the bus.
        pub fn add_device(&mut self, addr: u8) {
            self.state.lock().unwrap().present.insert(addr);
        }

        /// An expander at `addr` with every register at its reset value.
        pub fn add_expander(&mut self, addr: u8) {
            let mut st = self.state.lock().unwrap();
            st.present.insert(addr);
            st.registers.insert((addr, 0x00), 0xFF);
            st.registers.insert((addr, 0x01), 0xFF);
            st.registers.insert((addr, 0x14), 0x00);
            st.registers.insert((addr, 0x15), 0x00);
        }

        pub fn add_mux(&mut self, addr: u8) {
            let mut st = self.state.lock().unwrap();
            st.present.insert(addr);
            st.muxes.insert(addr, 0);
        }

        /// Make `device` reachable only while channel `channel` of `mux` is selected.
        pub fn attach(&mut self, device: u8, mux: u8, channel: u8) {
            let mut st = self.state.lock().unwrap();
            st.present.insert(device);
            st.behind.insert(device, (mux, channel));
        }

        /// The mux ignores selector writes and always reports `status`.
        pub fn stick_mux(&mut self, mux: u8, status: u8) {
            self.state.lock().unwrap().stuck.insert(mux, status);
        }

        /// Every transaction addressed to `addr` fails from now on.
        pub fn fail(&mut self, addr: u8) {
            self.state.lock().unwrap().failing.insert(addr);
        }

        pub fn set_register(&mut self, addr: u8, reg: u8, value: u8) {
            self.state.lock().unwrap().registers.insert((addr, reg), value);
        }

        pub fn register(&self, addr: u8, reg: u8) -> Option<u8> {
            self.state.lock().unwrap().registers.get(&(addr, reg)).cloned()
        }

        pub fn queue_bytes(&mut self, addr: u8, bytes: &[u8]) {
            self.state
                .lock()
                .unwrap()
                .byte_reads
                .entry(addr)
                .or_default()
                .extend(bytes.iter().cloned());
        }

        /// Queue a block read response. The last queued block keeps repeating.
        pub fn queue_block(&mut self, addr: u8, block: &[u8]) {
            self.state
                .lock()
                .unwrap()
                .blocks
                .entry(addr)
                .or_default()
                .push_back(block.to_vec());
        }

        pub fn selection(&self, mux: u8) -> u8 {
            let st = self.state.lock().unwrap();
            st.stuck
                .get(&mux)
                .cloned()
                .unwrap_or_else(|| st.muxes.get(&mux).cloned().unwrap_or(0))
        }

        pub fn ops(&self) -> Vec<BusOp> {
            self.state.lock().unwrap().ops.clone()
        }

        pub fn clear_ops(&mut self) {
            self.state.lock().unwrap().ops.clear();
        }

        /// Writes (of any kind) issued to `addr`.
        pub fn writes_to(&self, addr: u8) -> Vec<BusOp> {
            self.ops()
                .into_iter()
                .filter(|op| {
                    op.addr() == addr
                        && matches!(op, BusOp::WriteByte(..) | BusOp::WriteRegister(..))
                })
                .collect()
        }

        fn access(&self, op: BusOp) -> Result<(), Nak> {
            let mut st = self.state.lock().unwrap();
            let addr = op.addr();
            st.ops.push(op);
            if st.failing.contains(&addr) || !st.present.contains(&addr) {
                return Err(Nak(addr));
            }
            if let Some(&(mux, channel)) = st.behind.get(&addr) {
                let selection = st
                    .stuck
                    .get(&mux)
                    .cloned()
                    .unwrap_or_else(|| st.muxes.get(&mux).cloned().unwrap_or(0));
                if selection & (1 << channel) == 0 {
                    return Err(Nak(addr));
                }
            }
            Ok(())
        }
    }

    impl BusInterface for SpyBus {
        type Error = Nak;

        fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), Nak> {
            self.access(BusOp::WriteByte(addr, value))?;
            let mut st = self.state.lock().unwrap();
            if let Some(sel) = st.muxes.get_mut(&addr) {
                *sel = value;
            }
            Ok(())
        }

        fn write_byte_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), Nak> {
            self.access(BusOp::WriteRegister(addr, reg, value))?;
            self.state.lock().unwrap().registers.insert((addr, reg), value);
            Ok(())
        }

        fn read_byte(&mut self, addr: u8) -> Result<u8, Nak> {
            self.access(BusOp::ReadByte(addr))?;
            if self.state.lock().unwrap().muxes.contains_key(&addr) {
                return Ok(self.selection(addr));
            }
            let mut st = self.state.lock().unwrap();
            Ok(st
                .byte_reads
                .get_mut(&addr)
                .and_then(|q| q.pop_front())
                .unwrap_or(0))
        }

        fn read_byte_register(&mut self, addr: u8, reg: u8) -> Result<u8, Nak> {
            self.access(BusOp::ReadRegister(addr, reg))?;
            Ok(self.register(addr, reg).unwrap_or(0))
        }

        fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), Nak> {
            self.access(BusOp::ReadBlock(addr, reg, buf.len()))?;
            let mut st = self.state.lock().unwrap();
            let block = match st.blocks.get_mut(&addr) {
                Some(q) if q.len() > 1 => q.pop_front().unwrap_or_default(),
                Some(q) => q.front().cloned().unwrap_or_default(),
                None => Vec::new(),
            };
            for (i, b) in buf.iter_mut().enumerate() {
                *b = block.get(i).cloned().unwrap_or(0);
            }
            Ok(())
        }

        fn quick_write(&mut self, addr: u8) -> Result<(), Nak> {
            self.access(BusOp::Quick(addr))
        }
    }

    /// A delay provider that only adds up how long it was asked to wait.
    #[derive(Default)]
    pub struct SpyDelay {
        pub total_ms: u32,
        pub calls: Vec<u32>,
    }

    impl hal::blocking::delay::DelayMs<u32> for SpyDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
            self.calls.push(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_spy::{BusOp, Nak, SpyBus};
    use super::BusInterface;

    #[test]
    fn spy_gates_devices_behind_mux() {
        let mut bus = SpyBus::new();
        bus.add_mux(0x70);
        bus.attach(0x39, 0x70, 0);

        assert_eq!(bus.read_byte(0x39), Err(Nak(0x39)));
        assert!(bus.write_byte(0x70, 0b0001).is_ok());
        assert_eq!(bus.read_byte(0x39), Ok(0));
        assert!(bus.write_byte(0x70, 0b0010).is_ok());
        assert_eq!(bus.read_byte(0x39), Err(Nak(0x39)));
    }

    #[test]
    fn mutable_reference_forwards() {
        let mut bus = SpyBus::new();
        bus.add_expander(0x20);
        fn poke<B: BusInterface>(mut bus: B) {
            assert!(bus.write_byte_register(0x20, 0x14, 0xAA).is_ok());
        }
        poke(&mut bus);
        assert_eq!(bus.register(0x20, 0x14), Some(0xAA));
        assert_eq!(bus.ops(), vec![BusOp::WriteRegister(0x20, 0x14, 0xAA)]);
    }
}
