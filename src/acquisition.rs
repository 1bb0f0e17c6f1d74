//! Sensor acquisition cycles.
//!
//! The [`AcquisitionSequencer`] walks every registered sensor cluster in turn. For each
//! quantity it opens a multiplexer session on the sensor's channel, fetches the raw bytes,
//! decodes them and releases the channel before anything else touches the bus.
//!
//! A [`SensorFault`] only invalidates the reading it occurred in. Any other error means the bus
//! is in an unknown state: the cycle stops at once and the error is returned.

use alloc::vec::Vec;

use hal::blocking::delay::DelayMs;
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, RegistryError, SensorFault};
use crate::expander::BankMaskRegistry;
use crate::interface::BusInterface;
use crate::mux::{Channel, Multiplexer};
use crate::sensors::tank::{self, TankLevel};
use crate::sensors::{adc, humidity, light, ReadingSink, SensorKind, SensorReading};

/// Where the sequencer is within the current sensor access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    MuxSelecting,
    Reading,
    Decoding,
    MuxReleasing,
    Done,
    Failed,
}

/// What one sensor access produced: the bytes fetched (if any) and the decoded value or the
/// fault that stood in its way.
struct Sampled<T> {
    raw: Vec<u8>,
    value: Result<T, SensorFault>,
}

/// A sensor cluster: the multiplexer its sensors sit behind and the plant unit it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorNode {
    pub unit: u8,
    pub mux: Multiplexer,
}

pub struct AcquisitionSequencer {
    config: Config,
    nodes: Vec<SensorNode>,
    stage: Stage,
}

impl AcquisitionSequencer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            stage: Stage::Idle,
        }
    }

    /// Add the sensor cluster of plant `unit`, reached through `mux`. Clusters are read in the
    /// order they were added.
    pub fn add_node(&mut self, unit: u8, mux: Multiplexer) -> Result<(), RegistryError> {
        if self.nodes.iter().any(|n| n.unit == unit) {
            return Err(RegistryError::DuplicateUnit(unit));
        }
        self.nodes.push(SensorNode { unit, mux });
        Ok(())
    }

    pub fn nodes(&self) -> &[SensorNode] {
        &self.nodes
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Read every cluster, hand each valid reading to `sink` and return all readings, valid or
    /// not.
    ///
    /// Readings of clusters completed before a fatal error have already reached `sink`; the
    /// error itself is returned and nothing further is sent on the bus. Sink failures are
    /// logged and otherwise ignored.
    pub fn run_cycle<B, D, S>(
        &mut self,
        bus: &mut B,
        registry: &mut BankMaskRegistry,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<Vec<SensorReading>, Error<B::Error>>
    where
        B: BusInterface,
        D: DelayMs<u32>,
        S: ReadingSink,
    {
        self.stage = Stage::Idle;
        let nodes = self.nodes.clone();
        let mut readings = Vec::with_capacity(nodes.len() * 4);
        for node in nodes {
            let unit_readings = match self.read_node(bus, registry, delay, node) {
                Ok(r) => r,
                Err(e) => {
                    error!("acquisition cycle aborted at unit {}: {}", node.unit, e);
                    return Err(e);
                }
            };
            for reading in &unit_readings {
                deliver(sink, reading);
            }
            readings.extend(unit_readings);
        }
        Ok(readings)
    }

    /// Read the cluster of plant `unit` only. Nothing is delivered to a sink.
    pub fn read_unit<B, D>(
        &mut self,
        bus: &mut B,
        registry: &mut BankMaskRegistry,
        delay: &mut D,
        unit: u8,
    ) -> Result<Vec<SensorReading>, Error<B::Error>>
    where
        B: BusInterface,
        D: DelayMs<u32>,
    {
        let node = *self
            .nodes
            .iter()
            .find(|n| n.unit == unit)
            .ok_or(Error::UnknownUnit(unit))?;
        self.read_node(bus, registry, delay, node)
    }

    /// Measure the water tank through the control board ADC.
    pub fn read_tank_level<B, D>(&mut self, bus: &mut B, delay: &mut D) -> Result<TankLevel, Error<B::Error>>
    where
        B: BusInterface,
        D: DelayMs<u32>,
    {
        self.stage = Stage::Reading;
        let result = tank::read(
            bus,
            delay,
            self.config.tank_adc_address,
            self.config.tank_adc_channel,
            &self.config.adc_poll,
            &self.config.tank,
        );
        match &result {
            Ok(level) => {
                self.stage = Stage::Done;
                info!(
                    "tank depth {:.2} cm ({:.0}% full)",
                    level.depth_cm,
                    level.fraction * 100.0
                );
            }
            Err(e) if !e.is_fatal() => {
                self.stage = Stage::Done;
                warn!("tank level unavailable: {}", e);
            }
            Err(_) => self.stage = Stage::Failed,
        }
        result
    }

    fn read_node<B, D>(
        &mut self,
        bus: &mut B,
        registry: &mut BankMaskRegistry,
        delay: &mut D,
        node: SensorNode,
    ) -> Result<Vec<SensorReading>, Error<B::Error>>
    where
        B: BusInterface,
        D: DelayMs<u32>,
    {
        let config = self.config.clone();
        let unit = node.unit;
        let mut readings = Vec::with_capacity(4);
        debug!("reading sensors of unit {} via mux {:#04x}", unit, node.mux.address());

        let mode = config.light_mode;
        let lux = self.sample(
            bus,
            node.mux,
            config.light_channel,
            |bus| light::fetch(bus, &mut *delay, mode),
            |raw| light::decode(raw, mode),
        )?;
        readings.push(match lux.value {
            Ok(s) => SensorReading::valid(unit, SensorKind::Light, &s.raw, s.lux),
            Err(fault) => SensorReading::invalid(unit, SensorKind::Light, &lux.raw, fault),
        });

        let attempts = config.humidity_retries.saturating_add(1);
        let mut attempt = 0u8;
        let climate = loop {
            attempt += 1;
            let result = self.sample(
                bus,
                node.mux,
                config.humidity_channel,
                |bus| humidity::fetch(bus, &mut *delay, config.humidity_settle_ms),
                humidity::decode,
            )?;
            match result.value {
                Ok(sample) => break sample,
                Err(fault) if attempt >= attempts => {
                    self.stage = Stage::Failed;
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        last: fault,
                    });
                }
                Err(fault) => warn!("unit {} humidity attempt {} failed: {}", unit, attempt, fault),
            }
        };
        readings.push(SensorReading::valid(
            unit,
            SensorKind::Humidity,
            &climate.raw,
            climate.humidity,
        ));
        readings.push(SensorReading::valid(
            unit,
            SensorKind::Temperature,
            &climate.raw,
            climate.temperature,
        ));

        if config.include_analog {
            readings.push(self.sample_moisture(bus, registry, delay, node)?);
        }
        Ok(readings)
    }

    /// Power the analog sensors, let them settle, read the moisture probe and power them down
    /// again. The power bit goes through the registry so the other outputs on its bank keep
    /// their state.
    fn sample_moisture<B, D>(
        &mut self,
        bus: &mut B,
        registry: &mut BankMaskRegistry,
        delay: &mut D,
        node: SensorNode,
    ) -> Result<SensorReading, Error<B::Error>>
    where
        B: BusInterface,
        D: DelayMs<u32>,
    {
        let power = registry.analog_power().key;
        registry.set_analog_power(true);
        if let Err(e) = registry.flush_bank(power, bus) {
            registry.set_analog_power(false);
            return Err(e);
        }
        delay.delay_ms(self.config.analog_settle_ms);

        let address = self.config.cluster_adc_address;
        let channel = self.config.moisture_adc_channel;
        let poll = self.config.adc_poll;
        let band = self.config.moisture_band;
        let result = self.sample(
            bus,
            node.mux,
            self.config.adc_channel,
            |bus| adc::fetch(bus, &mut *delay, address, channel, &poll),
            |raw| adc::moisture(adc::decode(raw), band),
        );
        registry.set_analog_power(false);
        let moisture = result?;
        registry.flush_bank(power, bus)?;

        Ok(match moisture.value {
            Ok(value) => SensorReading::valid(node.unit, SensorKind::Moisture, &moisture.raw, value),
            Err(fault) => SensorReading::invalid(node.unit, SensorKind::Moisture, &moisture.raw, fault),
        })
    }

    /// One sensor access: select `channel` on `mux`, `fetch` the raw data, `decode` it and
    /// release the multiplexer. A decode failure or a sensor fault raised while fetching comes
    /// back in [`Sampled::value`]; anything else is fatal.
    fn sample<B, R, T, F, G>(
        &mut self,
        bus: &mut B,
        mux: Multiplexer,
        channel: u8,
        fetch: F,
        decode: G,
    ) -> Result<Sampled<T>, Error<B::Error>>
    where
        B: BusInterface,
        R: AsRef<[u8]>,
        F: FnOnce(&mut B) -> Result<R, Error<B::Error>>,
        G: FnOnce(R) -> Result<T, SensorFault>,
    {
        self.stage = Stage::MuxSelecting;
        let channel = match Channel::new(channel) {
            Ok(ch) => ch,
            Err(e) => {
                self.stage = Stage::Failed;
                return Err(e.into());
            }
        };
        let stage = &mut self.stage;
        let mut fetched = Vec::new();
        let result = mux.session(bus, channel, |bus| {
            *stage = Stage::Reading;
            let outcome = fetch(bus).and_then(|raw| {
                *stage = Stage::Decoding;
                fetched.extend_from_slice(raw.as_ref());
                decode(raw).map_err(Error::from)
            });
            *stage = Stage::MuxReleasing;
            outcome
        });
        match result {
            Ok(value) => {
                self.stage = Stage::Done;
                Ok(Sampled {
                    raw: fetched,
                    value: Ok(value),
                })
            }
            Err(Error::Sensor(fault)) => {
                self.stage = Stage::Done;
                Ok(Sampled {
                    raw: fetched,
                    value: Err(fault),
                })
            }
            Err(e) => {
                self.stage = Stage::Failed;
                Err(e)
            }
        }
    }
}

fn deliver<S: ReadingSink>(sink: &mut S, reading: &SensorReading) {
    match reading.fault {
        None => {
            info!("unit {} {} = {:.3}", reading.unit, reading.kind, reading.value);
            if let Err(e) = sink.record(reading.unit, reading.kind.name(), reading.value) {
                warn!("could not record unit {} {}: {:?}", reading.unit, reading.kind, e);
            }
        }
        Some(fault) => warn!("unit {} {} unavailable: {}", reading.unit, reading.kind, fault),
    }
}
