use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::bus::Bus;

/// A subsystem that attaches per-session state
///
/// Implementations subscribe to the session's topics inside `attach` and run
/// until those streams go silent. One `attach` call runs per session, on its
/// own task; an error is logged by the registry and confined to that
/// session.
#[async_trait]
pub trait SessionService: Send + Sync + 'static {
    /// Service name for logging
    fn name(&self) -> &str;

    /// Long-lived handler for one session.
    async fn attach(self: Arc<Self>, bus: Bus, session_id: String) -> Result<()>;
}
