use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use super::history::{ChatMessage, ConversationHistory};
use crate::backends::ChatBackend;
use crate::bus::{topics, Bus, BusMessage, Subscription};
use crate::session::SessionService;

/// Drives the conversation for one session
///
/// Consumes transcripts from `text_in`, batches rapid-fire transcripts into
/// a single user turn, streams the model response, and publishes the
/// completed response to `text_out`. New user input observed mid-stream
/// abandons the in-flight response (barge-in); the partial text is never
/// published and never committed to history.
pub struct TurnController {
    bus: Bus,
    session_id: String,
    text_in: Subscription,
    backend: Arc<dyn ChatBackend>,
    history: ConversationHistory,
    /// Transcript fragments accumulated for the turn currently being formed.
    /// Cleared only when a turn commits.
    pending: Vec<String>,
}

impl TurnController {
    pub fn new(
        bus: &Bus,
        session_id: &str,
        backend: Arc<dyn ChatBackend>,
        system_prompt: &str,
    ) -> Self {
        Self {
            bus: bus.clone(),
            session_id: session_id.to_string(),
            text_in: bus.subscribe(&topics::text_in(session_id)),
            backend,
            history: ConversationHistory::new(system_prompt),
            pending: Vec::new(),
        }
    }

    /// Run the turn loop until the session's transcript stream closes.
    pub async fn run(mut self) -> Result<()> {
        info!("Turn controller started for session {}", self.session_id);

        // Set after a failed or empty turn: retry only once the user says
        // something new, never in a tight loop against the backend.
        let mut require_new_input = false;

        loop {
            if !self.accumulate_user_turn(require_new_input).await {
                info!(
                    "Transcript stream closed, turn controller for session {} stopping",
                    self.session_id
                );
                return Ok(());
            }

            let user_text = self.pending.join(" ");
            info!("User ({}): {}", self.session_id, user_text);

            match self.stream_response(&user_text).await {
                TurnOutcome::Completed(response) => {
                    info!("Assistant ({}): {}", self.session_id, response);
                    self.bus
                        .publish(
                            &topics::text_out(&self.session_id),
                            BusMessage::Text(response.clone()),
                        )
                        .await;
                    self.history.commit_turn(user_text, response)?;
                    self.pending.clear();
                    require_new_input = false;
                }
                TurnOutcome::Interrupted => {
                    info!(
                        "User interruption on session {}, discarding partial response",
                        self.session_id
                    );
                    // The interrupting transcript already joined the pending
                    // turn, so accumulation may retry without waiting for
                    // more input.
                    require_new_input = false;
                }
                TurnOutcome::Empty => {
                    // Failed or empty turn: nothing published, nothing
                    // committed, the pending user turn stays for the next
                    // transcript to extend.
                    require_new_input = true;
                }
                TurnOutcome::Closed => return Ok(()),
            }
        }
    }

    /// Gather transcripts into the pending user turn.
    ///
    /// Blocks until the turn holds at least one fragment (`require_new`
    /// demands a fresh one even when fragments are pending), then keeps
    /// draining until no further transcript is queued at the moment of
    /// check. Returns false once the stream has closed.
    async fn accumulate_user_turn(&mut self, require_new: bool) -> bool {
        let mut need_more = require_new || self.pending.is_empty();
        while need_more || !self.text_in.is_empty() {
            let Some(msg) = self.text_in.recv().await else {
                return false;
            };
            if let Some(text) = msg.into_text() {
                self.pending.push(text);
                need_more = false;
            }
        }
        true
    }

    /// Stream one model response for the pending user turn.
    async fn stream_response(&mut self, user_text: &str) -> TurnOutcome {
        let mut request = self.history.messages().to_vec();
        request.push(ChatMessage::user(user_text));

        let mut deltas = match self.backend.stream_chat(&request).await {
            Ok(deltas) => deltas,
            Err(e) => {
                error!("Chat request failed for session {}: {:#}", self.session_id, e);
                return TurnOutcome::Empty;
            }
        };

        let mut response = String::new();

        loop {
            tokio::select! {
                // New user input wins over the in-flight response.
                biased;

                msg = self.text_in.recv() => match msg {
                    Some(msg) => {
                        let Some(text) = msg.into_text() else { continue };
                        self.pending.push(text);
                        return TurnOutcome::Interrupted;
                    }
                    None => return TurnOutcome::Closed,
                },

                delta = deltas.recv() => match delta {
                    Some(Ok(delta)) => response.push_str(&delta),
                    Some(Err(e)) => {
                        error!(
                            "Chat stream failed for session {}: {:#}",
                            self.session_id, e
                        );
                        return TurnOutcome::Empty;
                    }
                    None => break,
                },
            }
        }

        if response.trim().is_empty() {
            TurnOutcome::Empty
        } else {
            TurnOutcome::Completed(response)
        }
    }
}

enum TurnOutcome {
    /// Non-empty response completed without interruption.
    Completed(String),
    /// New user input arrived mid-stream; partial response discarded.
    Interrupted,
    /// Backend failure or empty output; nothing published or committed.
    Empty,
    /// Transcript stream closed.
    Closed,
}

/// Attaches a `TurnController` to every session
pub struct TurnService {
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
}

impl TurnService {
    pub fn new(backend: Arc<dyn ChatBackend>, system_prompt: String) -> Self {
        Self {
            backend,
            system_prompt,
        }
    }
}

#[async_trait]
impl SessionService for TurnService {
    fn name(&self) -> &str {
        "turn-controller"
    }

    async fn attach(self: Arc<Self>, bus: Bus, session_id: String) -> Result<()> {
        TurnController::new(
            &bus,
            &session_id,
            Arc::clone(&self.backend),
            &self.system_prompt,
        )
        .run()
        .await
        .with_context(|| format!("Turn controller for session {} failed", session_id))
    }
}
