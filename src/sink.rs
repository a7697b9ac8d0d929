use crate::signal::{LightBits, LightId};
use serde::{Deserialize, Serialize};

/// Where the state machines send their output.
///
/// Every method is fire-and-forget: implementations log their own failures
/// and never report them back into the state machines.
pub trait CommandSink {
    /// Sets the bulbs of one light object. Redundant calls are harmless.
    fn set_light_state(&mut self, light: LightId, bits: LightBits);

    /// Sends a command line to the simulator as if typed by the host.
    fn send_text(&mut self, message: &str);

    /// Shows a message on the local screen only.
    fn show_message(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkCommand {
    SetLight { light: LightId, bits: LightBits },
    Text(String),
    Message(String),
}

/// Sink that keeps everything it is given, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<SinkCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[SinkCommand] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<SinkCommand> {
        core::mem::take(&mut self.commands)
    }

    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                SinkCommand::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                SinkCommand::Message(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn light_updates(&self) -> Vec<(LightId, LightBits)> {
        self.commands
            .iter()
            .filter_map(|command| match *command {
                SinkCommand::SetLight { light, bits } => Some((light, bits)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandSink for RecordingSink {
    fn set_light_state(&mut self, light: LightId, bits: LightBits) {
        self.commands.push(SinkCommand::SetLight { light, bits });
    }

    fn send_text(&mut self, message: &str) {
        self.commands.push(SinkCommand::Text(message.to_string()));
    }

    fn show_message(&mut self, message: &str) {
        self.commands.push(SinkCommand::Message(message.to_string()));
    }
}
