//! Length-prefixed framing over a byte stream.
//!
//! A frame is a 4-byte big-endian payload length followed by exactly that many
//! bytes of bincode payload. There are no other delimiters. The decoder keeps
//! whatever tail of the stream does not yet form a complete frame and retries
//! once more bytes arrive, so frames split across reads and several frames in
//! one read are both handled.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;

pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum NetError {
    /// The peer closed the stream. Distinct from protocol failures.
    #[error("connection closed by peer")]
    Disconnected,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),
    #[error("failed to encode message: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode frame: {0}")]
    Decode(bincode::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl NetError {
    /// True for corruption of the byte stream, as opposed to transport failures.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            NetError::FrameTooLarge(_) | NetError::Encode(_) | NetError::Decode(_)
        )
    }
}

/// Serializes `message` and prepends its length.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, NetError> {
    let payload = bincode::serialize(message).map_err(NetError::Encode)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reassembles frames from arbitrarily chunked input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly arrived bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts every complete frame currently buffered.
    ///
    /// An incomplete length prefix or payload stays in the buffer untouched.
    /// Consumed bytes are dropped from the front of the buffer afterwards.
    pub fn decode_frames<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, NetError> {
        let mut messages = Vec::new();
        let mut consumed = 0;

        loop {
            let remaining = &self.buffer[consumed..];
            if remaining.len() < LENGTH_PREFIX_SIZE {
                break;
            }

            let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
            prefix.copy_from_slice(&remaining[..LENGTH_PREFIX_SIZE]);
            let size = u32::from_be_bytes(prefix) as usize;
            if size > MAX_FRAME_SIZE {
                return Err(NetError::FrameTooLarge(size));
            }
            if remaining.len() < LENGTH_PREFIX_SIZE + size {
                break;
            }

            let payload = &remaining[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + size];
            messages.push(bincode::deserialize(payload).map_err(NetError::Decode)?);
            consumed += LENGTH_PREFIX_SIZE + size;
        }

        self.buffer.drain(..consumed);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientMessage;
    use crate::Point;

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&ClientMessage::Reload).unwrap();
        let payload = bincode::serialize(&ClientMessage::Reload).unwrap();

        assert_eq!(frame.len(), LENGTH_PREFIX_SIZE + payload.len());
        assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], payload.as_slice());
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut bytes = encode_frame(&ClientMessage::MovePlayer { dx: 1.0, dy: 0.0 }).unwrap();
        bytes.extend(encode_frame(&ClientMessage::Reload).unwrap());
        bytes.extend(encode_frame(&ClientMessage::ShootAt { x: 2.0, y: 3.0 }).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        let messages: Vec<ClientMessage> = decoder.decode_frames().unwrap();

        assert_eq!(
            messages,
            vec![
                ClientMessage::MovePlayer { dx: 1.0, dy: 0.0 },
                ClientMessage::Reload,
                ClientMessage::ShootAt { x: 2.0, y: 3.0 },
            ]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let message = ClientMessage::SpawnRequest {
            point: Point::new(40.0, 40.0),
        };
        let bytes = encode_frame(&message).unwrap();

        let mut decoder = FrameDecoder::new();
        // Split inside the length prefix first, then inside the payload.
        decoder.extend(&bytes[..2]);
        assert!(decoder.decode_frames::<ClientMessage>().unwrap().is_empty());
        decoder.extend(&bytes[2..bytes.len() - 1]);
        assert!(decoder.decode_frames::<ClientMessage>().unwrap().is_empty());
        assert_eq!(decoder.buffered(), bytes.len() - 1);

        decoder.extend(&bytes[bytes.len() - 1..]);
        let messages: Vec<ClientMessage> = decoder.decode_frames().unwrap();
        assert_eq!(messages, vec![message]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_trailing_partial_frame_is_kept() {
        let first = encode_frame(&ClientMessage::Reload).unwrap();
        let second = encode_frame(&ClientMessage::RotatePlayer { angle: 0.5 }).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&first);
        decoder.extend(&second[..3]);
        let messages: Vec<ClientMessage> = decoder.decode_frames().unwrap();
        assert_eq!(messages, vec![ClientMessage::Reload]);
        assert_eq!(decoder.buffered(), 3);

        decoder.extend(&second[3..]);
        let messages: Vec<ClientMessage> = decoder.decode_frames().unwrap();
        assert_eq!(messages, vec![ClientMessage::RotatePlayer { angle: 0.5 }]);
    }

    #[test]
    fn test_oversized_length_prefix() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());

        let result = decoder.decode_frames::<ClientMessage>();
        assert!(matches!(result, Err(NetError::FrameTooLarge(_))));
        assert!(result.unwrap_err().is_protocol_error());
    }

    #[test]
    fn test_corrupted_payload() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&4u32.to_be_bytes());
        decoder.extend(&[0xFF, 0xFF, 0xFF, 0xFF]);

        let result = decoder.decode_frames::<ClientMessage>();
        assert!(matches!(result, Err(NetError::Decode(_))));
    }

    #[test]
    fn test_disconnect_is_not_protocol_error() {
        assert!(!NetError::Disconnected.is_protocol_error());
    }
}
