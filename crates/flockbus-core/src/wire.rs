//! Typed wire format for the offsets channel.
//!
//! One OSC message per frame, sent to [`OFFSETS_ADDRESS`]. Arguments are a
//! flat list of `(index, offset)` pairs where every index is tagged
//! `OscType::Int` (32-bit signed) and every offset `OscType::Float` (32-bit
//! float). Receivers tell the two apart by type tag, never by position or
//! value.
//!
//! ```text
//! /flockbus/offsets ,ifif...  10 0.15  11 1.0 ...
//! ```

use rosc::{OscMessage, OscPacket, OscType};

use crate::error::WireError;
use crate::registry::TARGET_COUNT;

/// Fixed logical channel for offset frames.
pub const OFFSETS_ADDRESS: &str = "/flockbus/offsets";

/// Receive buffer large enough for a full frame of [`TARGET_COUNT`] pairs.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// A sorted set of non-overlapping `(index, offset)` pairs.
///
/// Invariants (checked by [`OffsetFrame::new`]): at most [`TARGET_COUNT`]
/// pairs, every index in `0..TARGET_COUNT`, indices strictly ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetFrame {
    pairs: Vec<(i32, f32)>,
}

impl OffsetFrame {
    /// Validate and wrap a list of pairs.
    pub fn new(pairs: Vec<(i32, f32)>) -> Result<Self, WireError> {
        if pairs.len() > TARGET_COUNT {
            return Err(WireError::TooManyPairs(pairs.len()));
        }
        let mut previous: Option<i32> = None;
        for (position, &(index, _)) in pairs.iter().enumerate() {
            if usize::try_from(index).map_or(true, |i| i >= TARGET_COUNT) {
                return Err(WireError::IndexOutOfRange(index));
            }
            if previous.is_some_and(|prev| prev >= index) {
                return Err(WireError::Unsorted { pair: position });
            }
            previous = Some(index);
        }
        Ok(Self { pairs })
    }

    /// The pairs, ascending by index.
    pub fn pairs(&self) -> &[(i32, f32)] {
        &self.pairs
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the frame carries no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Build the OSC message carrying this frame.
    pub fn to_message(&self) -> OscMessage {
        let mut args = Vec::with_capacity(self.pairs.len() * 2);
        for &(index, offset) in &self.pairs {
            args.push(OscType::Int(index));
            args.push(OscType::Float(offset));
        }
        OscMessage {
            addr: OFFSETS_ADDRESS.to_string(),
            args,
        }
    }

    /// Parse a frame out of an OSC message, checking address and type tags.
    pub fn from_message(message: &OscMessage) -> Result<Self, WireError> {
        if message.addr != OFFSETS_ADDRESS {
            return Err(WireError::WrongAddress(message.addr.clone()));
        }
        if message.args.len() % 2 != 0 {
            return Err(WireError::OddArgumentCount(message.args.len()));
        }

        let mut pairs = Vec::with_capacity(message.args.len() / 2);
        for (pair, chunk) in message.args.chunks_exact(2).enumerate() {
            let index = match chunk[0] {
                OscType::Int(index) => index,
                _ => {
                    return Err(WireError::WrongType {
                        position: pair * 2,
                        expected: "int32",
                    })
                }
            };
            let offset = match chunk[1] {
                OscType::Float(offset) => offset,
                _ => {
                    return Err(WireError::WrongType {
                        position: pair * 2 + 1,
                        expected: "float32",
                    })
                }
            };
            pairs.push((index, offset));
        }
        Self::new(pairs)
    }
}

/// Encode a frame into a datagram.
pub fn encode_frame(frame: &OffsetFrame) -> Result<Vec<u8>, WireError> {
    rosc::encoder::encode(&OscPacket::Message(frame.to_message()))
        .map_err(|e| WireError::Encode(format!("{e:?}")))
}

/// Decode every offset frame contained in a datagram.
///
/// Bundles are flattened in order. Any malformed message rejects the whole
/// datagram so that a partial frame is never applied.
pub fn decode_datagram(bytes: &[u8]) -> Result<Vec<OffsetFrame>, WireError> {
    let (_, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| WireError::Decode(format!("{e:?}")))?;
    let mut frames = Vec::new();
    collect_frames(&packet, &mut frames)?;
    Ok(frames)
}

fn collect_frames(packet: &OscPacket, frames: &mut Vec<OffsetFrame>) -> Result<(), WireError> {
    match packet {
        OscPacket::Message(message) => frames.push(OffsetFrame::from_message(message)?),
        OscPacket::Bundle(bundle) => {
            for inner in &bundle.content {
                collect_frames(inner, frames)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_unsorted() {
        let err = OffsetFrame::new(vec![(11, 1.0), (10, 0.15)]).unwrap_err();
        assert_eq!(err, WireError::Unsorted { pair: 1 });
    }

    #[test]
    fn test_new_rejects_duplicates_and_range() {
        assert!(OffsetFrame::new(vec![(3, 1.0), (3, 2.0)]).is_err());
        assert_eq!(
            OffsetFrame::new(vec![(149, 1.0)]).unwrap_err(),
            WireError::IndexOutOfRange(149)
        );
        assert_eq!(
            OffsetFrame::new(vec![(-1, 1.0)]).unwrap_err(),
            WireError::IndexOutOfRange(-1)
        );
    }

    #[test]
    fn test_message_args_are_type_tagged() {
        let frame = OffsetFrame::new(vec![(10, 0.15), (11, 1.0)]).unwrap();
        let message = frame.to_message();

        assert_eq!(message.addr, OFFSETS_ADDRESS);
        assert_eq!(
            message.args,
            vec![
                OscType::Int(10),
                OscType::Float(0.15),
                OscType::Int(11),
                OscType::Float(1.0),
            ]
        );
    }

    #[test]
    fn test_decoded_datagram_keeps_int_and_float_tags() {
        let frame = OffsetFrame::new(vec![(0, 2.0), (148, -3.5)]).unwrap();
        let bytes = encode_frame(&frame).unwrap();

        // Inspect the raw packet rather than the frame helpers
        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        let OscPacket::Message(message) = packet else {
            panic!("expected a message");
        };
        assert!(matches!(message.args[0], OscType::Int(0)));
        assert!(matches!(message.args[1], OscType::Float(v) if v == 2.0));
        assert!(matches!(message.args[2], OscType::Int(148)));
        assert!(matches!(message.args[3], OscType::Float(v) if v == -3.5));

        assert_eq!(decode_datagram(&bytes).unwrap(), vec![frame]);
    }

    #[test]
    fn test_full_frame_fits_datagram_buffer() {
        let pairs = (0..TARGET_COUNT as i32).map(|i| (i, 1.0)).collect();
        let bytes = encode_frame(&OffsetFrame::new(pairs).unwrap()).unwrap();
        assert!(bytes.len() <= MAX_DATAGRAM_SIZE);
    }

    #[test]
    fn test_float_index_is_rejected() {
        let message = OscMessage {
            addr: OFFSETS_ADDRESS.to_string(),
            args: vec![OscType::Float(10.0), OscType::Float(0.5)],
        };
        assert_eq!(
            OffsetFrame::from_message(&message).unwrap_err(),
            WireError::WrongType {
                position: 0,
                expected: "int32"
            }
        );
    }

    #[test]
    fn test_odd_arguments_and_wrong_address_rejected() {
        let odd = OscMessage {
            addr: OFFSETS_ADDRESS.to_string(),
            args: vec![OscType::Int(1)],
        };
        assert_eq!(
            OffsetFrame::from_message(&odd).unwrap_err(),
            WireError::OddArgumentCount(1)
        );

        let elsewhere = OscMessage {
            addr: "/other".to_string(),
            args: vec![],
        };
        assert!(matches!(
            OffsetFrame::from_message(&elsewhere),
            Err(WireError::WrongAddress(_))
        ));
    }

    fn bundle(content: Vec<OscPacket>) -> Vec<u8> {
        let packet = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content,
        });
        rosc::encoder::encode(&packet).unwrap()
    }

    #[test]
    fn test_bundle_is_flattened_in_order() {
        let first = OffsetFrame::new(vec![(0, 1.0)]).unwrap();
        let second = OffsetFrame::new(vec![(4, -2.0), (9, 0.5)]).unwrap();
        let nested = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![OscPacket::Message(second.to_message())],
        });

        let bytes = bundle(vec![OscPacket::Message(first.to_message()), nested]);

        assert_eq!(decode_datagram(&bytes).unwrap(), vec![first, second]);
    }

    #[test]
    fn test_bundle_with_one_bad_message_is_rejected_whole() {
        let good = OffsetFrame::new(vec![(0, 1.0)]).unwrap();
        let bad = OscMessage {
            addr: OFFSETS_ADDRESS.to_string(),
            args: vec![OscType::Int(3), OscType::Int(4)],
        };

        let bytes = bundle(vec![
            OscPacket::Message(good.to_message()),
            OscPacket::Message(bad),
        ]);

        assert_eq!(
            decode_datagram(&bytes).unwrap_err(),
            WireError::WrongType {
                position: 1,
                expected: "float32"
            }
        );
    }

    #[test]
    fn test_more_pairs_than_targets_rejected() {
        let args = (0..=TARGET_COUNT as i32)
            .flat_map(|i| [OscType::Int(i), OscType::Float(1.0)])
            .collect();
        let message = OscMessage {
            addr: OFFSETS_ADDRESS.to_string(),
            args,
        };
        assert_eq!(
            OffsetFrame::from_message(&message).unwrap_err(),
            WireError::TooManyPairs(TARGET_COUNT + 1)
        );

        let bytes = rosc::encoder::encode(&OscPacket::Message(message)).unwrap();
        assert_eq!(
            decode_datagram(&bytes).unwrap_err(),
            WireError::TooManyPairs(TARGET_COUNT + 1)
        );
    }

    #[test]
    fn test_garbage_datagram_is_decode_error() {
        assert!(matches!(
            decode_datagram(b"garbage"),
            Err(WireError::Decode(_))
        ));
    }
}
