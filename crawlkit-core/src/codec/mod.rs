//! Frame codec for crossing process and socket boundaries.
//!
//! - [`frame`] - `command:payload\0` framing and the incremental decoder
//! - [`message`] - request/response field sets on top of frames

pub mod frame;
pub mod message;

pub use frame::{
    COMMIT, Frame, FrameDecoder, NONE_LITERAL, SEPARATOR, TERMINATOR, decode_frames,
    encode_frames,
};
pub use message::{
    decode_request, decode_response, encode_request, encode_response, fields,
    request_from_frames, response_frames, response_from_frames,
};
