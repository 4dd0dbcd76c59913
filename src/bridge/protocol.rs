// Bridge protocol - OSC addresses and message encoding for the external player

use super::{BridgeError, BridgeResult};
use crate::sequencer::Voice;
use rosc::{OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};

pub const ADDR_ORIGINAL_NOTES: &str = "/wek/outputs";
pub const ADDR_ORIGINAL_STEPS: &str = "/wek2/outputs";
pub const ADDR_FILLER_NOTES: &str = "/wek3/outputs";
pub const ADDR_FILLER_STEPS: &str = "/wek4/outputs";
pub const ADDR_PLAY_MODE: &str = "/wek5/outputs";
pub const ADDR_KIT: &str = "/wek6/outputs";
pub const ADDR_DRUM_INFO: &str = "/druminfo";

/// Which pattern(s) the external player sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMode {
    FillerOnly = 0,
    OriginalOnly = 1,
    Both = 2,
}

/// Pattern reported as currently sounding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    Original,
    Filler,
}

impl From<i32> for PatternType {
    fn from(value: i32) -> Self {
        match value {
            1 => PatternType::Filler,
            _ => PatternType::Original,
        }
    }
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Beat { step: i32, pattern_type: PatternType },
    Other(OscMessage),
}

fn int_args<I: IntoIterator<Item = i32>>(values: I) -> Vec<OscType> {
    values.into_iter().map(OscType::Int).collect()
}

/// The two messages carrying one pattern: notes first, then steps
pub fn pattern_messages(notes: &[Voice], steps: &[usize], is_filler: bool) -> [OscMessage; 2] {
    let (notes_addr, steps_addr) = if is_filler {
        (ADDR_FILLER_NOTES, ADDR_FILLER_STEPS)
    } else {
        (ADDR_ORIGINAL_NOTES, ADDR_ORIGINAL_STEPS)
    };

    [
        OscMessage {
            addr: notes_addr.to_string(),
            args: int_args(notes.iter().map(|&n| n as i32)),
        },
        OscMessage {
            addr: steps_addr.to_string(),
            args: int_args(steps.iter().map(|&s| s as i32)),
        },
    ]
}

pub fn play_mode_message(mode: PlayMode) -> OscMessage {
    OscMessage {
        addr: ADDR_PLAY_MODE.to_string(),
        args: vec![OscType::Int(mode as i32)],
    }
}

pub fn kit_message(index: i32) -> OscMessage {
    OscMessage {
        addr: ADDR_KIT.to_string(),
        args: vec![OscType::Int(index)],
    }
}

/// Serialize one message as an OSC packet
pub fn encode(message: &OscMessage) -> BridgeResult<Vec<u8>> {
    rosc::encoder::encode(&OscPacket::Message(message.clone())).map_err(BridgeError::Osc)
}

/// Decode a datagram, flattening bundles into their messages
pub fn decode(bytes: &[u8]) -> BridgeResult<Vec<OscMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(bytes).map_err(BridgeError::Osc)?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, out);
            }
        }
    }
}

/// Integer value of a numeric argument; floats are rounded
pub fn arg_as_int(arg: &OscType) -> Option<i32> {
    match arg {
        OscType::Int(value) => Some(*value),
        OscType::Long(value) => i32::try_from(*value).ok(),
        OscType::Float(value) => Some(value.round() as i32),
        OscType::Double(value) => Some(value.round() as i32),
        _ => None,
    }
}

/// Classify an inbound message
pub fn parse_inbound(message: OscMessage) -> Inbound {
    if message.addr == ADDR_DRUM_INFO {
        let step = message.args.first().and_then(arg_as_int);
        let pattern_type = message.args.get(1).and_then(arg_as_int);
        if let (Some(step), Some(pattern_type)) = (step, pattern_type) {
            return Inbound::Beat {
                step,
                pattern_type: PatternType::from(pattern_type),
            };
        }
        log::warn!("Malformed {} message: {:?}", ADDR_DRUM_INFO, message.args);
    }
    Inbound::Other(message)
}
