//! Hidden turn-signal commands and their on-screen announcements.
//!
//! The indicator detector tells the simulator about a change by sending a
//! hidden command such as `/i DL_SIGNAL_L 3`. The simulator hands the text
//! back to every InSim client as a hidden message (`DL_SIGNAL_L 3`), which is
//! turned into a short local message for the driver.

use crate::dashboard::VehicleId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalCommand {
    Left,
    Right,
    All,
    Off,
}

impl SignalCommand {
    pub const fn keyword(self) -> &'static str {
        match self {
            SignalCommand::Left => "DL_SIGNAL_L",
            SignalCommand::Right => "DL_SIGNAL_R",
            SignalCommand::All => "DL_SIGNAL_ALL",
            SignalCommand::Off => "DL_SIGNAL_OFF",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "DL_SIGNAL_L" => Some(SignalCommand::Left),
            "DL_SIGNAL_R" => Some(SignalCommand::Right),
            "DL_SIGNAL_ALL" => Some(SignalCommand::All),
            "DL_SIGNAL_OFF" => Some(SignalCommand::Off),
            _ => None,
        }
    }

    /// Text shown to the driver when the command comes back.
    pub const fn announcement(self) -> &'static str {
        match self {
            SignalCommand::Left => "left signal ON",
            SignalCommand::Right => "right signal ON",
            SignalCommand::All => "all signals ON",
            SignalCommand::Off => "signals OFF",
        }
    }

    /// The `/i` command line sent to the simulator for `vehicle`.
    pub fn hidden_command(self, vehicle: VehicleId) -> String {
        format!("/i {} {}", self.keyword(), vehicle)
    }
}

/// A hidden message the simulator echoed back to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    pub command: SignalCommand,
    pub vehicle: Option<VehicleId>,
}

impl Announcement {
    /// Parses the body of a hidden message. Anything that is not one of the
    /// signal keywords is not ours and yields `None`.
    pub fn parse(message: &str) -> Option<Self> {
        let mut args = message.split_whitespace();
        let command = SignalCommand::from_keyword(args.next()?)?;
        let vehicle = args.next().and_then(|arg| arg.parse().ok());

        Some(Self { command, vehicle })
    }

    pub const fn text(&self) -> &'static str {
        self.command.announcement()
    }
}
