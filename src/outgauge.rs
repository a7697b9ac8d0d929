//! OutGauge datagram decoding.
//!
//! The simulator sends one datagram per update for the car being viewed.
//! Layout (little-endian): time u32, car[4], flags u16, gear u8, plid u8,
//! speed/rpm/turbo/eng temp/fuel/oil pressure/oil temp f32, dash lights u32,
//! show lights u32, throttle/brake/clutch f32, display1[16], display2[16],
//! and an optional id i32.

use crate::dashboard::{DashLights, TelemetrySample, VehicleId};
use crate::protocol::{read_text, require, ProtocolError};
use serde::{Deserialize, Serialize};

pub const OUTGAUGE_SIZE: usize = 92;
pub const OUTGAUGE_SIZE_WITH_ID: usize = 96;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutGaugePacket {
    pub time_ms: u32,
    pub car: String,
    pub flags: u16,
    pub gear: u8,
    pub player: VehicleId,
    pub speed_mps: f32,
    pub rpm: f32,
    /// Lights the car has.
    pub dash_lights: u32,
    /// Lights currently lit.
    pub show_lights: DashLights,
    pub throttle: f32,
    pub brake: f32,
    pub clutch: f32,
    pub id: Option<i32>,
}

impl OutGaugePacket {
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        require(datagram, OUTGAUGE_SIZE)?;

        let id = if datagram.len() >= OUTGAUGE_SIZE_WITH_ID {
            Some(read_u32(datagram, 92) as i32)
        } else {
            None
        };

        Ok(Self {
            time_ms: read_u32(datagram, 0),
            car: read_text(&datagram[4..8]),
            flags: u16::from_le_bytes([datagram[8], datagram[9]]),
            gear: datagram[10],
            player: datagram[11],
            speed_mps: read_f32(datagram, 12),
            rpm: read_f32(datagram, 16),
            dash_lights: read_u32(datagram, 40),
            show_lights: DashLights::new(read_u32(datagram, 44)),
            throttle: read_f32(datagram, 48),
            brake: read_f32(datagram, 52),
            clutch: read_f32(datagram, 56),
            id,
        })
    }

    pub const fn sample(&self) -> TelemetrySample {
        TelemetrySample {
            vehicle: self.player,
            lights: self.show_lights,
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(buf, offset))
}
