//! Scripted provider and recording actuator for driving the controller tick by tick.

use std::collections::{BTreeSet, VecDeque};

use super::*;

/// Replays queued snapshot results; once the queue drains the last good snapshot repeats.
#[derive(Clone, Debug)]
pub struct ScriptedProvider {
    frames: VecDeque<Result<WorldSnapshot, ProviderError>>,
    last: Option<WorldSnapshot>,
    linked: bool,
    reacquire_succeeds: bool,
    reads: u64,
}

impl ScriptedProvider {
    pub fn new(first: WorldSnapshot) -> Self {
        let mut provider = Self::empty();
        provider.push(first);
        provider
    }

    pub fn empty() -> Self {
        Self {
            frames: VecDeque::new(),
            last: None,
            linked: true,
            reacquire_succeeds: true,
            reads: 0,
        }
    }

    pub fn push(&mut self, snapshot: WorldSnapshot) {
        self.frames.push_back(Ok(snapshot));
    }

    pub fn push_error(&mut self, error: ProviderError) {
        self.frames.push_back(Err(error));
    }

    /// Replaces everything queued with a single snapshot.
    pub fn set(&mut self, snapshot: WorldSnapshot) {
        self.frames.clear();
        self.push(snapshot);
    }

    pub fn set_linked(&mut self, linked: bool) {
        self.linked = linked;
    }

    pub fn set_reacquire_succeeds(&mut self, succeeds: bool) {
        self.reacquire_succeeds = succeeds;
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl WorldProvider for ScriptedProvider {
    fn is_linked(&self) -> bool {
        self.linked
    }

    fn reacquire(&mut self) -> bool {
        if self.reacquire_succeeds {
            self.linked = true;
        }
        self.linked
    }

    fn snapshot(&mut self) -> Result<WorldSnapshot, ProviderError> {
        self.reads += 1;
        match self.frames.pop_front() {
            Some(Ok(snapshot)) => {
                self.last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(err)) => Err(err),
            None => self
                .last
                .clone()
                .ok_or_else(|| ProviderError::Transient("no snapshot scripted".to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Move(WorldPos),
    Ability { binding: String, target: Option<WorldPos> },
    Pickup(WorldPos),
    Interact(WorldPos),
}

/// Records every accepted command. Bindings can be scripted to answer `NotReady`.
#[derive(Clone, Debug)]
pub struct RecordingActuator {
    commands: Vec<Command>,
    not_ready: BTreeSet<String>,
    linked: bool,
    reacquire_succeeds: bool,
}

impl Default for RecordingActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            not_ready: BTreeSet::new(),
            linked: true,
            reacquire_succeeds: true,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn moves(&self) -> Vec<WorldPos> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Move(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn abilities_used(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Ability { binding, .. } => Some(binding.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn pickups(&self) -> Vec<WorldPos> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Pickup(at) => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn fail_binding(&mut self, binding: &str) {
        self.not_ready.insert(binding.to_string());
    }

    pub fn set_linked(&mut self, linked: bool) {
        self.linked = linked;
    }

    pub fn set_reacquire_succeeds(&mut self, succeeds: bool) {
        self.reacquire_succeeds = succeeds;
    }

    fn accept(&mut self, command: Command) -> Result<(), ActuatorError> {
        if !self.linked {
            return Err(ActuatorError::LinkLost("recording actuator unlinked".to_string()));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl Actuator for RecordingActuator {
    fn is_linked(&self) -> bool {
        self.linked
    }

    fn reacquire(&mut self) -> bool {
        if self.reacquire_succeeds {
            self.linked = true;
        }
        self.linked
    }

    fn move_toward(&mut self, target: WorldPos) -> Result<(), ActuatorError> {
        self.accept(Command::Move(target))
    }

    fn use_ability(&mut self, binding: &str, target: Option<WorldPos>) -> Result<(), ActuatorError> {
        if self.not_ready.contains(binding) {
            return Err(ActuatorError::NotReady);
        }
        self.accept(Command::Ability { binding: binding.to_string(), target })
    }

    fn pickup_item_at(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        self.accept(Command::Pickup(position))
    }

    fn interact_at(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        self.accept(Command::Interact(position))
    }
}
