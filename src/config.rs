//! Acquisition settings: where each sensor sits, how long to wait for it and how to calibrate it.

use crate::error::ConfigError;
use crate::mux::CHANNELS;
use crate::sensors::adc::{self, PollConfig};
use crate::sensors::humidity;
use crate::sensors::light::LightMode;
use crate::sensors::tank::{self, TankCalibration};

/// Validated acquisition settings. Obtain one from [`Config::default`] or [`Config::builder`].
///
/// With the `serde` feature the type can be deserialized, with any missing field taking its
/// default. Call [`Config::validate`] on the result before using it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub(crate) light_channel: u8,
    pub(crate) humidity_channel: u8,
    pub(crate) adc_channel: u8,
    pub(crate) cluster_adc_address: u8,
    pub(crate) moisture_adc_channel: u8,
    pub(crate) tank_adc_address: u8,
    pub(crate) tank_adc_channel: u8,
    pub(crate) light_mode: LightMode,
    pub(crate) humidity_settle_ms: u32,
    pub(crate) humidity_retries: u8,
    pub(crate) analog_settle_ms: u32,
    pub(crate) adc_poll: PollConfig,
    pub(crate) moisture_band: (f32, f32),
    pub(crate) tank: TankCalibration,
    pub(crate) include_analog: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            light_channel: 0,
            humidity_channel: 1,
            adc_channel: 2,
            cluster_adc_address: adc::CLUSTER_ADDRESS,
            moisture_adc_channel: 1,
            tank_adc_address: tank::ADDRESS,
            tank_adc_channel: tank::CHANNEL,
            light_mode: LightMode::Standard,
            humidity_settle_ms: humidity::DEFAULT_SETTLE_MS,
            humidity_retries: 3,
            analog_settle_ms: 200,
            adc_poll: PollConfig::default(),
            moisture_band: (0.1, 0.985),
            tank: TankCalibration::default(),
            include_analog: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new(Self::default())
    }

    /// Check that the settings describe hardware that can exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mux = [self.light_channel, self.humidity_channel, self.adc_channel];
        if let Some(&ch) = mux.iter().find(|&&ch| ch >= CHANNELS) {
            return Err(ConfigError::InvalidMuxChannel(ch));
        }
        for (i, ch) in mux.iter().enumerate() {
            if mux[i + 1..].contains(ch) {
                return Err(ConfigError::DuplicateMuxChannel(*ch));
            }
        }
        for &ch in &[self.moisture_adc_channel, self.tank_adc_channel] {
            if !(1..=4).contains(&ch) {
                return Err(ConfigError::InvalidAdcChannel(ch));
            }
        }
        let (low, high) = self.moisture_band;
        if !(low < high) {
            return Err(ConfigError::EmptyMoistureBand(low, high));
        }
        if self.adc_poll.interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.tank.validate()
    }

    pub fn light_mode(&self) -> LightMode {
        self.light_mode
    }

    pub fn humidity_retries(&self) -> u8 {
        self.humidity_retries
    }

    pub fn moisture_band(&self) -> (f32, f32) {
        self.moisture_band
    }

    pub fn adc_poll(&self) -> PollConfig {
        self.adc_poll
    }

    pub fn tank(&self) -> &TankCalibration {
        &self.tank
    }

    pub fn include_analog(&self) -> bool {
        self.include_analog
    }
}

/// A `ConfigBuilder` collects changes to the default settings. Chain method calls on it and end
/// the chain with `build()`, which checks the result.
///
/// ```
/// # use greenhouse_io::config::Config;
/// # use greenhouse_io::sensors::light::LightMode;
/// let config = Config::builder()
///     .light_mode(LightMode::Extended)
///     .humidity_retries(5)
///     .moisture_band(0.15, 0.95)
///     .build()
///     .unwrap();
/// assert_eq!(config.humidity_retries(), 5);
/// ```
#[must_use = "Settings are not checked unless built"]
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn new(config: Config) -> Self {
        Self { config }
    }

    /// Multiplexer channels of the light sensor, humidity sensor and cluster ADC, in that order.
    pub fn mux_channels(mut self, light: u8, humidity: u8, adc: u8) -> Self {
        self.config.light_channel = light;
        self.config.humidity_channel = humidity;
        self.config.adc_channel = adc;
        self
    }

    pub fn light_mode(mut self, mode: LightMode) -> Self {
        self.config.light_mode = mode;
        self
    }

    /// How long the humidity sensor needs between trigger and read.
    pub fn humidity_settle_ms(mut self, ms: u32) -> Self {
        self.config.humidity_settle_ms = ms;
        self
    }

    /// Extra attempts at a humidity measurement while the sensor reports an unusable status.
    pub fn humidity_retries(mut self, retries: u8) -> Self {
        self.config.humidity_retries = retries;
        self
    }

    /// Address of the cluster ADC and the input the moisture probe is wired to.
    pub fn moisture_adc(mut self, address: u8, channel: u8) -> Self {
        self.config.cluster_adc_address = address;
        self.config.moisture_adc_channel = channel;
        self
    }

    /// Address of the control board ADC and the input the tank sensor is wired to.
    pub fn tank_adc(mut self, address: u8, channel: u8) -> Self {
        self.config.tank_adc_address = address;
        self.config.tank_adc_channel = channel;
        self
    }

    /// How long to let the analog sensors settle after powering them.
    pub fn analog_settle_ms(mut self, ms: u32) -> Self {
        self.config.analog_settle_ms = ms;
        self
    }

    pub fn adc_poll(mut self, timeout_ms: u32, interval_ms: u32) -> Self {
        self.config.adc_poll = PollConfig {
            timeout_ms,
            interval_ms,
        };
        self
    }

    /// Moisture ratios strictly between `low` and `high` are plausible; anything else means the
    /// probe is disconnected.
    pub fn moisture_band(mut self, low: f32, high: f32) -> Self {
        self.config.moisture_band = (low, high);
        self
    }

    pub fn tank(mut self, calibration: TankCalibration) -> Self {
        self.config.tank = calibration;
        self
    }

    /// Whether acquisition cycles read the analog (moisture) sensors, which need their power
    /// switched on first.
    pub fn include_analog(mut self, include: bool) -> Self {
        self.config.include_analog = include;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}
