use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::service::SessionService;
use crate::bus::{topics, Bus, Subscription};

/// Fans new-session notifications out to one subsystem
///
/// Subscribes to `session_new` once and spawns an independent handler task
/// for every session id received, storing the handle for joined shutdown.
pub struct SessionRegistry {
    bus: Bus,
    service: Arc<dyn SessionService>,
    notifications: Subscription,
    handlers: HashMap<String, JoinHandle<()>>,
}

impl SessionRegistry {
    /// Register the service on `session_new`.
    ///
    /// Subscribing happens here, not in `run`, so no session announced
    /// after construction is missed.
    pub fn new(bus: &Bus, service: Arc<dyn SessionService>) -> Self {
        let notifications = bus.subscribe(topics::SESSION_NEW);
        info!("Service {} registered for new sessions", service.name());

        Self {
            bus: bus.clone(),
            service,
            notifications,
            handlers: HashMap::new(),
        }
    }

    /// Accept sessions until `shutdown` resolves, then shut down.
    pub async fn run(mut self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                msg = self.notifications.recv() => {
                    let Some(msg) = msg else { break };
                    let Some(session_id) = msg.into_session_new() else {
                        warn!("Non-session payload on {}, ignoring", topics::SESSION_NEW);
                        continue;
                    };
                    self.spawn_handler(session_id);
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Spawn the long-lived per-session handler task.
    pub fn spawn_handler(&mut self, session_id: String) {
        if self.handlers.contains_key(&session_id) {
            warn!(
                "Service {} already attached to session {}, ignoring duplicate announcement",
                self.service.name(),
                session_id
            );
            return;
        }

        info!(
            "Service {} attaching to session {}",
            self.service.name(),
            session_id
        );

        let service = Arc::clone(&self.service);
        let bus = self.bus.clone();
        let id = session_id.clone();

        let task = tokio::spawn(async move {
            let name = service.name().to_string();
            if let Err(e) = service.attach(bus, id.clone()).await {
                // Confined to this session; other handlers keep running.
                error!("Service {} handler for session {} failed: {:#}", name, id, e);
            } else {
                info!("Service {} handler for session {} finished", name, id);
            }
        });

        self.handlers.insert(session_id, task);
    }

    /// Stop accepting new sessions and wait for every handler to finish.
    pub async fn shutdown(mut self) {
        self.bus.unsubscribe(&self.notifications);

        let name = self.service.name().to_string();
        info!(
            "Service {} shutting down, joining {} session handlers",
            name,
            self.handlers.len()
        );

        for (session_id, task) in self.handlers.drain() {
            if let Err(e) = task.await {
                error!(
                    "Service {} handler for session {} panicked: {}",
                    name, session_id, e
                );
            }
        }

        info!("Service {} shut down", name);
    }

    /// Number of sessions this registry has attached handlers for.
    pub fn session_count(&self) -> usize {
        self.handlers.len()
    }
}
