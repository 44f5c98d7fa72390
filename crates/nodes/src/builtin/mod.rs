//! Built-in handlers.
//!
//! Each handler returns an output shaped like the real integration's
//! response (status codes, echoed inputs, timestamps, simulated AI text).
//! None of them perform network I/O.

mod ai;
mod data;
mod generic;
mod http;
mod messaging;
mod trigger;

pub use ai::AiHandler;
pub use data::{FilterHandler, TransformHandler};
pub use generic::GenericHandler;
pub use http::ApiCallHandler;
pub use messaging::{EmailSendHandler, SlackHandler};
pub use trigger::{FormHandler, WebhookHandler};

/// RFC 3339 wall-clock timestamp stamped onto handler outputs.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
