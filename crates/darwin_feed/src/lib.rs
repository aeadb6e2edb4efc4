//! Darwin push-port ingestion: a persistent STOMP subscriber and the
//! decoder that turns its raw frames into cancellation events.

pub mod decoder;
pub mod frame_queue;
pub mod stomp;

pub use decoder::{decode_frame, DecodeError};
pub use frame_queue::{bounded_frame_channel, FrameReceiver, FrameSender};
pub use stomp::{run_subscriber, StompConfig, StompError, StompHandle, StompState};
