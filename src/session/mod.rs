//! Session lifecycle management
//!
//! Sessions are announced on the well-known `session_new` topic by the
//! transport layer. Each subsystem implements `SessionService` and wraps it
//! in a `SessionRegistry`, which spawns one independent long-lived handler
//! task per session. There is no shared session object: session scope is the
//! topic naming convention plus each registry's own id → handler map.

mod registry;
mod service;

pub use registry::SessionRegistry;
pub use service::SessionService;
