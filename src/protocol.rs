//! InSim packet codec (InSim version 9, little-endian).
//!
//! Only the packets this program speaks are modelled. Every packet starts
//! with a four byte header: size / 4, type, request id, and one data byte.

use crate::dashboard::VehicleId;
use crate::signal::{LightBits, LightId};
use arrayvec::ArrayString;
use heapless::Vec;
use static_assertions::const_assert_eq;
use thiserror::Error;

pub const INSIM_VERSION: u8 = 9;

pub const ISP_ISI: u8 = 1;
pub const ISP_VER: u8 = 2;
pub const ISP_TINY: u8 = 3;
pub const ISP_III: u8 = 12;
pub const ISP_MST: u8 = 13;
pub const ISP_PLL: u8 = 23;
pub const ISP_MSL: u8 = 40;
pub const ISP_OCO: u8 = 60;

pub const TINY_NONE: u8 = 0;

pub const ISF_LOCAL: u16 = 4;

/// Non-zero request id on ISI asks the host for an IS_VER reply.
pub const REQI_SEND_VERSION: u8 = 1;

pub const OCO_LIGHTS_SET: u8 = 5;
pub const AXO_START_LIGHTS: u8 = 149;

pub const SND_SILENT: u8 = 0;
pub const SND_MESSAGE: u8 = 1;
pub const SND_SYSMESSAGE: u8 = 2;

pub const HEADER_SIZE: usize = 4;
pub const ISI_SIZE: usize = 44;
pub const VER_SIZE: usize = 20;
pub const TINY_SIZE: usize = 4;
pub const MST_SIZE: usize = 68;
pub const MSL_SIZE: usize = 132;
pub const III_MIN_SIZE: usize = 12;
pub const PLL_SIZE: usize = 4;
pub const OCO_SIZE: usize = 8;

/// Largest packet the size byte can describe.
pub const MAX_PACKET_SIZE: usize = 255 * 4;
pub const MAX_OUTGOING_SIZE: usize = 256;

/// Text limits leave room for the terminating NUL.
pub const MST_TEXT_MAX: usize = 63;
pub const MSL_TEXT_MAX: usize = 127;
const NAME_FIELD: usize = 16;

const_assert_eq!(ISI_SIZE % 4, 0);
const_assert_eq!(MST_SIZE % 4, 0);
const_assert_eq!(MSL_SIZE % 4, 0);
const_assert_eq!(OCO_SIZE % 4, 0);
const_assert_eq!(MST_TEXT_MAX + 1 + HEADER_SIZE, MST_SIZE);
const_assert_eq!(MSL_TEXT_MAX + 1 + HEADER_SIZE, MSL_SIZE);

pub type PacketBuffer = Vec<u8, MAX_OUTGOING_SIZE>;
pub type CommandText = ArrayString<MST_TEXT_MAX>;
pub type LocalText = ArrayString<MSL_TEXT_MAX>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("packet too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("packet declares size zero")]
    ZeroSize,
    #[error("packet declares {declared} bytes but {actual} were given")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("text of {len} bytes exceeds the {max} byte limit")]
    TextTooLong { len: usize, max: usize },
    #[error("buffer overflow")]
    BufferOverflow,
}

/// Interface registration sent right after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRequest {
    pub request_id: u8,
    pub flags: u16,
    pub prefix: u8,
    pub interval_ms: u16,
    pub admin: ArrayString<15>,
    pub name: ArrayString<15>,
}

impl InitRequest {
    pub fn new(admin: &str, name: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            request_id: REQI_SEND_VERSION,
            flags: ISF_LOCAL,
            prefix: 0,
            interval_ms: 0,
            admin: bounded_text(admin)?,
            name: bounded_text(name)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingPacket {
    Init(InitRequest),
    Tiny { request_id: u8, subtype: u8 },
    /// IS_MST: typed as if by the host, commands included.
    Command(CommandText),
    /// IS_MSL: shown on the local screen only.
    LocalMessage { text: LocalText, sound: u8 },
    /// IS_OCO: set the bulbs of one start-light object.
    Lights { light: LightId, bits: LightBits },
}

impl OutgoingPacket {
    pub fn command(text: &str) -> Result<Self, ProtocolError> {
        Ok(OutgoingPacket::Command(bounded_text(text)?))
    }

    pub fn local_message(text: &str, sound: u8) -> Result<Self, ProtocolError> {
        Ok(OutgoingPacket::LocalMessage {
            text: bounded_text(text)?,
            sound,
        })
    }

    pub const fn keep_alive() -> Self {
        OutgoingPacket::Tiny {
            request_id: 0,
            subtype: TINY_NONE,
        }
    }

    pub fn encode(&self) -> Result<PacketBuffer, ProtocolError> {
        match self {
            OutgoingPacket::Init(init) => {
                let mut buf = [0u8; ISI_SIZE];
                write_header(&mut buf, ISP_ISI, init.request_id, 0);
                // UDP port 0: no UDP replies, everything on TCP
                buf[4..6].copy_from_slice(&0u16.to_le_bytes());
                buf[6..8].copy_from_slice(&init.flags.to_le_bytes());
                buf[8] = INSIM_VERSION;
                buf[9] = init.prefix;
                buf[10..12].copy_from_slice(&init.interval_ms.to_le_bytes());
                write_text(&mut buf[12..12 + NAME_FIELD], &init.admin);
                write_text(&mut buf[28..28 + NAME_FIELD], &init.name);
                to_buffer(&buf)
            }
            OutgoingPacket::Tiny { request_id, subtype } => {
                let mut buf = [0u8; TINY_SIZE];
                write_header(&mut buf, ISP_TINY, *request_id, *subtype);
                to_buffer(&buf)
            }
            OutgoingPacket::Command(text) => {
                let mut buf = [0u8; MST_SIZE];
                write_header(&mut buf, ISP_MST, 0, 0);
                write_text(&mut buf[HEADER_SIZE..], text);
                to_buffer(&buf)
            }
            OutgoingPacket::LocalMessage { text, sound } => {
                let mut buf = [0u8; MSL_SIZE];
                write_header(&mut buf, ISP_MSL, 0, *sound);
                write_text(&mut buf[HEADER_SIZE..], text);
                to_buffer(&buf)
            }
            OutgoingPacket::Lights { light, bits } => {
                let mut buf = [0u8; OCO_SIZE];
                write_header(&mut buf, ISP_OCO, 0, 0);
                buf[4] = OCO_LIGHTS_SET;
                buf[5] = AXO_START_LIGHTS;
                buf[6] = *light;
                buf[7] = bits.raw();
                to_buffer(&buf)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingPacket {
    Version {
        request_id: u8,
        version: String,
        product: String,
        insim_version: u8,
    },
    Tiny {
        request_id: u8,
        subtype: u8,
    },
    /// IS_III: a `/i` command typed by a user or sent by an InSim client.
    HiddenMessage {
        connection: u8,
        player: VehicleId,
        text: String,
    },
    PlayerLeft {
        player: VehicleId,
    },
    Other {
        packet_type: u8,
    },
}

/// Total packet length announced by a header's first byte.
pub const fn packet_len(size_byte: u8) -> usize {
    size_byte as usize * 4
}

/// Decodes one complete packet, header included.
pub fn decode(frame: &[u8]) -> Result<IncomingPacket, ProtocolError> {
    require(frame, HEADER_SIZE)?;

    let declared = packet_len(frame[0]);
    if declared == 0 {
        return Err(ProtocolError::ZeroSize);
    }
    if declared != frame.len() {
        return Err(ProtocolError::SizeMismatch {
            declared,
            actual: frame.len(),
        });
    }

    let packet_type = frame[1];
    let request_id = frame[2];
    let data = frame[3];

    let packet = match packet_type {
        ISP_VER => {
            require(frame, VER_SIZE)?;
            IncomingPacket::Version {
                request_id,
                version: read_text(&frame[4..12]),
                product: read_text(&frame[12..18]),
                insim_version: frame[18],
            }
        }
        ISP_TINY => IncomingPacket::Tiny {
            request_id,
            subtype: data,
        },
        ISP_III => {
            require(frame, III_MIN_SIZE)?;
            IncomingPacket::HiddenMessage {
                connection: frame[4],
                player: frame[5],
                text: read_text(&frame[8..]),
            }
        }
        ISP_PLL => IncomingPacket::PlayerLeft { player: data },
        other => IncomingPacket::Other { packet_type: other },
    };

    Ok(packet)
}

pub(crate) fn require(frame: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if frame.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Reads a NUL-terminated (or field-filling) string.
pub(crate) fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn bounded_text<const N: usize>(text: &str) -> Result<ArrayString<N>, ProtocolError> {
    ArrayString::from(text).map_err(|_| ProtocolError::TextTooLong {
        len: text.len(),
        max: N,
    })
}

fn write_header(buf: &mut [u8], packet_type: u8, request_id: u8, data: u8) {
    buf[0] = (buf.len() / 4) as u8;
    buf[1] = packet_type;
    buf[2] = request_id;
    buf[3] = data;
}

// Callers size `field` one byte larger than the text bound, so the NUL fits.
fn write_text(field: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(field.len().saturating_sub(1));
    field[..len].copy_from_slice(&bytes[..len]);
}

fn to_buffer(bytes: &[u8]) -> Result<PacketBuffer, ProtocolError> {
    Vec::from_slice(bytes).map_err(|_| ProtocolError::BufferOverflow)
}
