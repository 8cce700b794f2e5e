//! C1: framed JSON transport.
//!
//! Two wire framings, caller's choice: 32-bit big-endian length-prefixed
//! JSON, or newline-delimited JSON. Both tolerate arbitrary chunk
//! boundaries — a partial frame is buffered until the next `push`/decode
//! call completes it. A single malformed frame is dropped without tearing
//! down the connection; only a length prefix that would exceed the cap
//! is treated as a fatal framing error.

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;

/// Frames larger than this are rejected as a framing-level error rather
/// than silently dropped, since an oversized length prefix likely means
/// the stream itself is corrupt.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Which wire framing a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 4-byte big-endian length prefix followed by that many UTF-8 bytes.
    LengthPrefixed,
    /// One JSON value per line, terminated by `\n`.
    Newline,
}

/// A `tokio_util::codec` codec that frames arbitrary JSON-serializable
/// messages according to the chosen [`Framing`].
pub struct MessageCodec<T> {
    framing: Framing,
    max_frame_len: u32,
    _marker: std::marker::PhantomData<T>,
}

impl<T> MessageCodec<T> {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            max_frame_len: MAX_FRAME_BYTES,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_max_frame_len(framing: Framing, max_frame_len: u32) -> Self {
        Self {
            framing,
            max_frame_len,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Decoder for MessageCodec<T>
where
    T: DeserializeOwned,
{
    type Item = T;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>, TransportError> {
        match self.framing {
            Framing::LengthPrefixed => decode_length_prefixed(src, self.max_frame_len),
            Framing::Newline => decode_newline(src, self.max_frame_len),
        }
    }
}

fn decode_length_prefixed<T: DeserializeOwned>(
    src: &mut BytesMut,
    max_frame_len: u32,
) -> Result<Option<T>, TransportError> {
    loop {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes(src[..4].try_into().unwrap());
        if len > max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: max_frame_len,
            });
        }
        let total = 4 + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(4);
        let frame = src.split_to(len as usize);
        match serde_json::from_slice::<T>(&frame) {
            Ok(value) => return Ok(Some(value)),
            Err(_) => continue, // drop the malformed frame, try the next one
        }
    }
}

fn decode_newline<T: DeserializeOwned>(
    src: &mut BytesMut,
    max_frame_len: u32,
) -> Result<Option<T>, TransportError> {
    loop {
        let Some(newline_pos) = src.iter().position(|b| *b == b'\n') else {
            if src.len() as u32 > max_frame_len {
                return Err(TransportError::FrameTooLarge {
                    len: src.len() as u32,
                    max: max_frame_len,
                });
            }
            return Ok(None);
        };
        let line = src.split_to(newline_pos);
        src.advance(1); // consume the '\n' itself
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<T>(&line) {
            Ok(value) => return Ok(Some(value)),
            Err(_) => continue,
        }
    }
}

impl<T> Encoder<T> for MessageCodec<T>
where
    T: Serialize,
{
    type Error = TransportError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&item).map_err(TransportError::Decode)?;
        match self.framing {
            Framing::LengthPrefixed => {
                let len = payload.len() as u32;
                dst.reserve(4 + payload.len());
                dst.put_u32(len);
                dst.extend_from_slice(&payload);
            }
            Framing::Newline => {
                dst.reserve(payload.len() + 1);
                dst.extend_from_slice(&payload);
                dst.put_u8(b'\n');
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn length_prefixed_round_trips() {
        let mut codec = MessageCodec::<Ping>::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();
        codec.encode(Ping { n: 7 }, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Ping { n: 7 });
        assert!(buf.is_empty());
    }

    #[test]
    fn newline_round_trips() {
        let mut codec = MessageCodec::<Ping>::new(Framing::Newline);
        let mut buf = BytesMut::new();
        codec.encode(Ping { n: 9 }, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Ping { n: 9 });
    }

    #[test]
    fn length_prefixed_tolerates_arbitrary_chunk_boundaries() {
        let mut codec = MessageCodec::<Ping>::new(Framing::LengthPrefixed);
        let mut full = BytesMut::new();
        codec.encode(Ping { n: 42 }, &mut full).unwrap();

        let mut buf = BytesMut::new();
        let mut result = None;
        for byte in full.to_vec() {
            buf.put_u8(byte);
            if let Some(v) = codec.decode(&mut buf).unwrap() {
                result = Some(v);
                break;
            }
        }
        assert_eq!(result, Some(Ping { n: 42 }));
    }

    #[test]
    fn newline_tolerates_arbitrary_chunk_boundaries() {
        let mut codec = MessageCodec::<Ping>::new(Framing::Newline);
        let mut full = BytesMut::new();
        codec.encode(Ping { n: 5 }, &mut full).unwrap();

        let mut buf = BytesMut::new();
        let mut result = None;
        for byte in full.to_vec() {
            buf.put_u8(byte);
            if let Some(v) = codec.decode(&mut buf).unwrap() {
                result = Some(v);
            }
        }
        assert_eq!(result, Some(Ping { n: 5 }));
    }

    #[test]
    fn oversized_length_prefix_is_a_fatal_framing_error() {
        let mut codec = MessageCodec::<Ping>::with_max_frame_len(Framing::LengthPrefixed, 10);
        let mut buf = BytesMut::new();
        buf.put_u32(1_000);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[test]
    fn malformed_frame_is_dropped_not_fatal() {
        let mut codec = MessageCodec::<Ping>::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();
        let bad = b"not json";
        buf.put_u32(bad.len() as u32);
        buf.extend_from_slice(bad);
        codec.encode(Ping { n: 1 }, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(Ping { n: 1 }));
    }

    #[test]
    fn partial_frame_returns_none_without_erroring() {
        let mut codec = MessageCodec::<Ping>::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();
        buf.put_u32(100);
        buf.extend_from_slice(b"{\"n\":");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }
}
