//! parkgate-sign - LED sign protocol
//!
//! The signs at the gates accept one UDP datagram per update. The datagram
//! is a fixed 209-byte frame: a constant header, four fixed-size text
//! records (title, plate, info line, greeting) and a trailer. Text uses a
//! two-byte-per-character scheme with a display-controller quirk for Thai
//! plates.
//!
//! [`encode_frame`] is pure; [`SignDisplay`] adds the datagram transport.

pub mod encode;
pub mod error;
pub mod frame;
pub mod transport;

pub use encode::{encode_plate_text, encode_utf16be, pad_info, pad_plate};
pub use error::SignError;
pub use frame::{encode_frame, SignContent, SignMode, FRAME_LEN};
pub use transport::{SignDisplay, SignSink, UdpSignSink};
