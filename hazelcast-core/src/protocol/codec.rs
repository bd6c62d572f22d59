//! Stream codec slicing frames out of a socket byte stream.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::*;
use super::frame::Frame;
use crate::error::{HazelcastError, Result};

/// Codec for reading and writing frames on a connection.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use
/// with `FramedRead`/`FramedWrite`. Each frame is self-delimiting, so the
/// codec keeps no state between frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Creates a codec with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a codec rejecting inbound frames larger than `max_frame_size`.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Returns the inbound frame size limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = HazelcastError;

    fn encode(&mut self, item: &'a Frame, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len());
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = HazelcastError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = HazelcastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < INT_SIZE {
            return Ok(None);
        }

        let declared = (&src[FRAME_LENGTH_OFFSET..]).get_i32_le();
        if declared < HEADER_SIZE as i32 {
            return Err(HazelcastError::MalformedFrame(format!(
                "frame length {} below header size {}",
                declared, HEADER_SIZE
            )));
        }

        let frame_length = declared as usize;
        if frame_length > self.max_frame_size {
            return Err(HazelcastError::MalformedFrame(format!(
                "frame length {} exceeds limit {}",
                frame_length, self.max_frame_size
            )));
        }

        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        Frame::decode(src.split_to(frame_length)).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::builder::{string_size, FrameBuilder};

    fn frame_with_name(name: &str, correlation_id: i64) -> Frame {
        let mut builder = FrameBuilder::new(LOCK_FORCE_UNLOCK, HEADER_SIZE + string_size(name));
        builder.put_str(name);
        let mut frame = builder.finish();
        frame.set_correlation_id(correlation_id);
        frame
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut codec = FrameCodec::new();
        let sent = frame_with_name("myLock", 5);

        let mut buf = BytesMut::new();
        codec.encode(&sent, &mut buf).unwrap();
        assert_eq!(buf.len(), sent.len());

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.correlation_id(), 5);
        assert_eq!(decoded.reader().get_str().unwrap(), "myLock");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_frame() {
        let mut codec = FrameCodec::new();
        let frame = frame_with_name("partial", 1);
        let bytes = frame.as_bytes();

        let mut buf = BytesMut::from(&bytes[..2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[2..HEADER_SIZE + 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[HEADER_SIZE + 1..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.correlation_id(), 1);
    }

    #[test]
    fn test_decode_multiple_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for id in 1..=3 {
            codec.encode(frame_with_name("q", id), &mut buf).unwrap();
        }

        for id in 1..=3 {
            let frame = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(frame.correlation_id(), id);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_undersized_length() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&8i32.to_le_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            HazelcastError::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_size(64);
        let mut buf = BytesMut::from(&1024i32.to_le_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            HazelcastError::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_decode_version_mismatch() {
        let mut codec = FrameCodec::new();
        let frame = frame_with_name("v", 1);
        let mut buf = BytesMut::from(frame.as_bytes());
        buf[VERSION_OFFSET] = 9;
        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            HazelcastError::VersionMismatch { actual: 9, .. }
        ));
    }
}
