//! In-process stand-ins for the game client.
//! This module exists so the controller can run headless in tests, the demo binary and batch tools.
//! It does not talk to a real process; scripted doubles replay frames, the sim world reacts to commands.

use crate::error::{ActuatorError, ProviderError};
use crate::ports::{Actuator, WorldProvider};
use crate::snapshot::{Entity, EntityPayload, WorldSnapshot};
use crate::types::{EntityId, WorldPos};

mod scripted;
mod world;

pub use scripted::{Command, RecordingActuator, ScriptedProvider};
pub use world::{SimActuator, SimCounters, SimProvider, SimSettings, SimWorld};
