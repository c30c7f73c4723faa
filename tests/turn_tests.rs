// Integration tests for the conversational turn controller
//
// These tests drive the controller through a scripted chat backend:
// transcript batching, streaming completion, barge-in mid-stream, and
// backend failures that must leave history and text_out untouched.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parlance::{topics, Bus, BusMessage, ChatBackend, ChatMessage, ChatRole, TurnController};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Backend that replays scripted responses and records every request.
struct ScriptedBackend {
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: Mutex<VecDeque<ScriptedCall>>,
}

enum ScriptedCall {
    /// Yield these deltas, then end the stream.
    Deltas(Vec<Result<String>>),
    /// Hand the controller a live stream the test feeds.
    Live(mpsc::UnboundedReceiver<Result<String>>),
    /// Fail the request itself.
    RequestError(String),
}

impl ScriptedBackend {
    fn new(calls: Vec<ScriptedCall>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            calls: Mutex::new(calls.into()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::UnboundedReceiver<Result<String>>> {
        self.requests.lock().unwrap().push(messages.to_vec());

        match self.calls.lock().unwrap().pop_front() {
            Some(ScriptedCall::Deltas(deltas)) => {
                let (tx, rx) = mpsc::unbounded_channel();
                for delta in deltas {
                    tx.send(delta).unwrap();
                }
                Ok(rx)
            }
            Some(ScriptedCall::Live(rx)) => Ok(rx),
            Some(ScriptedCall::RequestError(message)) => Err(anyhow!(message)),
            None => panic!("unscripted chat request"),
        }
    }
}

fn deltas(parts: &[&str]) -> ScriptedCall {
    ScriptedCall::Deltas(parts.iter().map(|p| Ok(p.to_string())).collect())
}

async fn publish_transcript(bus: &Bus, session: &str, text: &str) {
    bus.publish(&topics::text_in(session), BusMessage::Text(text.into()))
        .await;
}

async fn recv_response(sub: &mut parlance::Subscription) -> String {
    sub.recv()
        .await
        .expect("text_out closed")
        .into_text()
        .expect("expected a text payload")
}

/// Let every spawned task reach its next suspension point.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn test_turn_batches_rapid_transcripts() {
    let bus = Bus::new();
    let backend = Arc::new(ScriptedBackend::new(vec![deltas(&["Hi ", "there!"])]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    // Both transcripts queue before the controller runs: one turn, one call
    publish_transcript(&bus, "s1", "Hello").await;
    publish_transcript(&bus, "s1", "there").await;
    tokio::spawn(controller.run());

    assert_eq!(recv_response(&mut text_out).await, "Hi there!");
    assert_eq!(backend.request_count(), 1);

    let request = backend.request(0);
    assert_eq!(request[0].role, ChatRole::System);
    assert_eq!(request[1].role, ChatRole::User);
    assert_eq!(request[1].content, "Hello there");
}

#[tokio::test(start_paused = true)]
async fn test_text_barge_in_discards_partial_response() {
    let bus = Bus::new();
    let (live_tx, live_rx) = mpsc::unbounded_channel();
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedCall::Live(live_rx),
        deltas(&["Sure."]),
    ]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    publish_transcript(&bus, "s1", "Hello").await;
    tokio::spawn(controller.run());
    settle().await;

    // Response starts streaming...
    live_tx.send(Ok("I was ".to_string())).unwrap();
    live_tx.send(Ok("going to say".to_string())).unwrap();
    settle().await;

    // ...then the user speaks again: partial is abandoned, never published
    publish_transcript(&bus, "s1", "Actually, stop").await;

    assert_eq!(recv_response(&mut text_out).await, "Sure.");
    assert!(text_out.is_empty());

    // The interrupted fragments merge into the retried user turn
    assert_eq!(backend.request_count(), 2);
    let retry = backend.request(1);
    assert_eq!(retry[1].content, "Hello Actually, stop");
    // The abandoned partial was never committed to history
    assert_eq!(retry.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_error_publishes_nothing() {
    let bus = Bus::new();
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedCall::RequestError("connection refused".into()),
        deltas(&["Recovered."]),
    ]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    publish_transcript(&bus, "s1", "Hello").await;
    tokio::spawn(controller.run());
    settle().await;

    // Failed turn: nothing published, no retry until new input arrives
    assert!(text_out.is_empty());
    assert_eq!(backend.request_count(), 1);

    // The pending user turn survives and extends with the next transcript
    publish_transcript(&bus, "s1", "are you there?").await;
    assert_eq!(recv_response(&mut text_out).await, "Recovered.");
    assert_eq!(backend.request(1)[1].content, "Hello are you there?");
}

#[tokio::test(start_paused = true)]
async fn test_mid_stream_error_discards_partial() {
    let bus = Bus::new();
    let backend = Arc::new(ScriptedBackend::new(vec![
        ScriptedCall::Deltas(vec![
            Ok("partial ".to_string()),
            Err(anyhow!("malformed chunk")),
        ]),
        deltas(&["Fine now."]),
    ]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    publish_transcript(&bus, "s1", "Hello").await;
    tokio::spawn(controller.run());
    settle().await;

    assert!(text_out.is_empty());

    publish_transcript(&bus, "s1", "still there?").await;
    assert_eq!(recv_response(&mut text_out).await, "Fine now.");
    // History holds no trace of the failed turn
    assert_eq!(backend.request(1).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_response_is_not_committed() {
    let bus = Bus::new();
    let backend = Arc::new(ScriptedBackend::new(vec![
        deltas(&[]),
        deltas(&["Here."]),
    ]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    publish_transcript(&bus, "s1", "Hello").await;
    tokio::spawn(controller.run());
    settle().await;

    assert!(text_out.is_empty());

    publish_transcript(&bus, "s1", "hello?").await;
    assert_eq!(recv_response(&mut text_out).await, "Here.");
    assert_eq!(backend.request(1)[1].content, "Hello hello?");
}

#[tokio::test(start_paused = true)]
async fn test_history_alternates_across_turns() {
    let bus = Bus::new();
    let backend = Arc::new(ScriptedBackend::new(vec![
        deltas(&["First answer."]),
        deltas(&["Second answer."]),
    ]));
    let controller = TurnController::new(&bus, "s1", backend.clone(), "Be brief.");
    let mut text_out = bus.subscribe(&topics::text_out("s1"));

    publish_transcript(&bus, "s1", "one").await;
    tokio::spawn(controller.run());
    assert_eq!(recv_response(&mut text_out).await, "First answer.");

    publish_transcript(&bus, "s1", "two").await;
    assert_eq!(recv_response(&mut text_out).await, "Second answer.");

    let roles: Vec<ChatRole> = backend.request(1).iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::User,
        ]
    );
}
