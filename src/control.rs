//! Per-plant control units and the requests that drive them.

use alloc::borrow::ToOwned;
use core::fmt;
use core::str::FromStr;

use crate::error::{ControlRequestError, PinMapError};
use crate::pinmap::PinMap;

/// An actuator a control unit can switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Control {
    Light,
    Fan,
    Valve,
    /// The shared pump. A unit only ever *requests* it; the pump runs if any unit does.
    Pump,
}

impl Control {
    /// Every control, in the order batch requests apply them.
    pub const ALL: [Control; 4] = [Control::Light, Control::Fan, Control::Valve, Control::Pump];

    pub fn name(self) -> &'static str {
        match self {
            Control::Light => "light",
            Control::Fan => "fan",
            Control::Valve => "valve",
            Control::Pump => "pump",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Control {
    type Err = ControlRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Control::Light),
            "fan" => Ok(Control::Fan),
            "valve" => Ok(Control::Valve),
            "pump" => Ok(Control::Pump),
            other => Err(ControlRequestError::UnknownControl(other.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    On,
    Off,
}

impl Operation {
    pub fn is_on(self) -> bool {
        self == Operation::On
    }
}

impl From<bool> for Operation {
    fn from(on: bool) -> Self {
        if on {
            Operation::On
        } else {
            Operation::Off
        }
    }
}

impl FromStr for Operation {
    type Err = ControlRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Operation::On),
            "off" => Ok(Operation::Off),
            other => Err(ControlRequestError::UnknownOperation(other.to_owned())),
        }
    }
}

/// Parse an operator request such as `("fan", "on")`.
pub fn parse_request(control: &str, operation: &str) -> Result<(Control, Operation), ControlRequestError> {
    Ok((control.parse()?, operation.parse()?))
}

/// Desired state of every control of one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub light: bool,
    pub fan: bool,
    pub valve: bool,
    pub pump: bool,
}

impl DesiredState {
    pub fn get(&self, control: Control) -> Operation {
        Operation::from(match control {
            Control::Light => self.light,
            Control::Fan => self.fan,
            Control::Valve => self.valve,
            Control::Pump => self.pump,
        })
    }

    fn set(&mut self, control: Control, operation: Operation) {
        let slot = match control {
            Control::Light => &mut self.light,
            Control::Fan => &mut self.fan,
            Control::Valve => &mut self.valve,
            Control::Pump => &mut self.pump,
        };
        *slot = operation.is_on();
    }
}

/// One plant slot's fan, light and valve, plus its pump request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlUnit {
    id: u8,
    pins: PinMap,
    desired: DesiredState,
}

impl ControlUnit {
    /// Create control unit `id` with the built-in pin map for that slot. Everything starts off.
    pub fn new(id: u8) -> Result<Self, PinMapError> {
        Self::with_pins(id, PinMap::for_unit(id)?)
    }

    /// Create a control unit with a custom (already validated) pin map. Identifiers start at 1;
    /// ones past the built-in table are allowed for custom wiring.
    pub fn with_pins(id: u8, pins: PinMap) -> Result<Self, PinMapError> {
        if id == 0 {
            return Err(PinMapError::UnknownUnit(id));
        }
        Ok(Self {
            id,
            pins,
            desired: DesiredState::default(),
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    /// Record the desired state of one control. Nothing reaches the hardware until the owning
    /// registry flushes.
    pub fn manage(&mut self, control: Control, operation: Operation) {
        self.desired.set(control, operation);
    }

    /// Whether this unit wants the shared pump running: it does whenever its valve is open or it
    /// asked for the pump explicitly.
    pub fn requests_pump(&self) -> bool {
        self.desired.pump || self.desired.valve
    }

    /// This unit's contribution to its bank's mask.
    pub fn mask(&self) -> u8 {
        [Control::Fan, Control::Light, Control::Valve]
            .iter()
            .filter(|&&c| self.desired.get(c).is_on())
            .filter_map(|&c| self.pins.pin(c))
            .fold(0u8, |mask, pin| mask | 1 << pin)
    }
}
