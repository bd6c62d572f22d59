//! Hazelcast client binary protocol implementation.
//!
//! Every request, response and event travels as one self-describing
//! [`Frame`]. Operation codecs in [`codecs`] turn typed arguments into frames
//! and frames back into typed results.

mod builder;
mod codec;
pub mod codecs;
pub mod constants;
mod frame;
mod reader;

pub use builder::{
    data_entries_size, data_list_size, data_size, nullable_data_size, nullable_string_size,
    string_size, FrameBuilder,
};
pub use codec::FrameCodec;
pub use codecs::{CodecDescriptor, CodecRegistry, OperationCodec};
pub use constants::*;
pub use frame::Frame;
pub use reader::FrameReader;
