//! HTTP ↔ invocation translation.

mod event;
mod reply;

pub use event::{canonical_header_key, ApiEvent};
pub use reply::{error_response, text_response, translate, ApiReply};
