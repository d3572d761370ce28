//! Blue-green environment slots

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two fixed blue-green slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Blue,
    Green,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }

    /// The opposite slot
    pub fn other(&self) -> Slot {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    /// Slot to deploy into given the currently active one.
    ///
    /// Blue is the first target when nothing is active yet.
    pub fn target_for(active: Option<Slot>) -> Slot {
        active.map(|s| s.other()).unwrap_or(Slot::Blue)
    }

    /// Port bound by this slot: blue serves the host port, green the next one.
    ///
    /// `None` when the green port would not fit in a `u16`.
    pub fn port(&self, base_port: u16) -> Option<u16> {
        match self {
            Slot::Blue => Some(base_port),
            Slot::Green => base_port.checked_add(1),
        }
    }

    /// Process name for the slot's service
    pub fn process_name(&self, app_name: &str) -> String {
        format!("{}-{}", app_name, self.name())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Slot::Blue),
            "green" => Ok(Slot::Green),
            _ => Err(format!("Unknown slot: {}", s)),
        }
    }
}
