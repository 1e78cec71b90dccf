//! Wire protocol module.
//!
//! Defines request/response types and message framing for socket communication.
//!
//! ## Wire Format
//!
//! Messages are length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON payload]
//! ```
//!
//! Request: `{"command": "shares.apply", "params": {...}}`.
//! Response: `{"success": bool, "request_id": uuid, "data" | "error": {...}}`.

mod request;
mod response;
mod wire;

pub use request::Request;
pub use response::{ErrorResponse, Response};
pub use wire::{
    call, read_json, read_message, read_message_with_timeout, write_json, write_message,
    write_message_with_timeout, DEFAULT_MAX_MESSAGE_SIZE,
};
