//! Voice client loop and relay client integration tests
//!
//! The loop runs against scripted collaborators; the relay client talks to a
//! real relay on an ephemeral port.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, routing::post};
use persona_voicebot::client::{Listen, Relay, Speak, Transcribe};
use persona_voicebot::voice::RecognitionError;
use persona_voicebot::{Error, RelayClient, Result, Stopped, VoiceClient};
use tokio_util::sync::CancellationToken;
use url::Url;

mod common;
use common::{FakeModel, serve, spawn_relay};

/// Microphone that always hears a short burst
struct FakeEars;

#[async_trait(?Send)]
impl Listen for FakeEars {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        Ok(vec![0.1; 160])
    }
}

/// Microphone that never hears anything
struct DeafEars;

#[async_trait(?Send)]
impl Listen for DeafEars {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        std::future::pending().await
    }
}

/// Microphone whose device is gone
struct BrokenEars;

#[async_trait(?Send)]
impl Listen for BrokenEars {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        Err(Error::Audio("no input device available".to_string()))
    }
}

/// Recognizer that replays a script, then cancels the loop
struct ScriptedStt {
    script: RefCell<VecDeque<Result<String>>>,
    cancel: CancellationToken,
}

impl ScriptedStt {
    fn new(script: Vec<Result<String>>, cancel: &CancellationToken) -> Self {
        Self {
            script: RefCell::new(script.into()),
            cancel: cancel.clone(),
        }
    }

    fn saying(lines: &[&str], cancel: &CancellationToken) -> Self {
        Self::new(lines.iter().map(|l| Ok((*l).to_string())).collect(), cancel)
    }
}

#[async_trait(?Send)]
impl Transcribe for ScriptedStt {
    async fn transcribe(&self, _samples: &[f32]) -> Result<String> {
        self.script.borrow_mut().pop_front().unwrap_or_else(|| {
            self.cancel.cancel();
            Err(RecognitionError::WaitTimeout.into())
        })
    }
}

/// Relay that echoes and records what it was asked
#[derive(Default, Clone)]
struct EchoRelay {
    asked: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl Relay for EchoRelay {
    async fn ask(&self, message: &str) -> String {
        self.asked.borrow_mut().push(message.to_string());
        format!("You asked: {message}")
    }
}

/// Speaker that records what it was told to say
#[derive(Default, Clone)]
struct RecordingMouth {
    spoken: Rc<RefCell<Vec<String>>>,
    broken: bool,
}

#[async_trait(?Send)]
impl Speak for RecordingMouth {
    async fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.borrow_mut().push(text.to_string());
        if self.broken {
            return Err(Error::Tts("Google TTS error 429 Too Many Requests on part 0".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_exit_command_stops_loop() {
    for exit in ["exit", "Exit", "EXIT", "Exit.", " exit! "] {
        let cancel = CancellationToken::new();
        let relay = EchoRelay::default();
        let mouth = RecordingMouth::default();

        let mut client = VoiceClient::new(
            FakeEars,
            ScriptedStt::saying(&["What is your superpower?", exit, "never reached"], &cancel),
            relay.clone(),
            mouth.clone(),
        )
        .with_pause(Duration::ZERO);

        let stopped = client.run(&cancel).await.unwrap();

        assert_eq!(stopped, Stopped::ExitCommand);
        assert_eq!(*relay.asked.borrow(), vec!["What is your superpower?"]);
        assert_eq!(
            *mouth.spoken.borrow(),
            vec!["You asked: What is your superpower?"]
        );
    }
}

#[tokio::test]
async fn test_exit_inside_sentence_is_relayed() {
    let cancel = CancellationToken::new();
    let relay = EchoRelay::default();

    let mut client = VoiceClient::new(
        FakeEars,
        ScriptedStt::saying(&["how do I exit vim"], &cancel),
        relay.clone(),
        RecordingMouth::default(),
    )
    .with_pause(Duration::ZERO);

    assert_eq!(client.run(&cancel).await.unwrap(), Stopped::Cancelled);
    assert_eq!(*relay.asked.borrow(), vec!["how do I exit vim"]);
}

#[tokio::test]
async fn test_recognition_failures_keep_listening() {
    let cancel = CancellationToken::new();
    let relay = EchoRelay::default();

    let script = vec![
        Err(RecognitionError::WaitTimeout.into()),
        Err(RecognitionError::Unintelligible.into()),
        Err(RecognitionError::Request("connection reset".to_string()).into()),
        Ok("   ".to_string()),
        Ok("hello".to_string()),
        Ok("exit".to_string()),
    ];

    let mut client = VoiceClient::new(
        FakeEars,
        ScriptedStt::new(script, &cancel),
        relay.clone(),
        RecordingMouth::default(),
    )
    .with_pause(Duration::ZERO);

    assert_eq!(client.run(&cancel).await.unwrap(), Stopped::ExitCommand);
    assert_eq!(*relay.asked.borrow(), vec!["hello"]);
}

#[tokio::test]
async fn test_speak_failure_keeps_listening() {
    let cancel = CancellationToken::new();
    let mouth = RecordingMouth {
        broken: true,
        ..RecordingMouth::default()
    };

    let mut client = VoiceClient::new(
        FakeEars,
        ScriptedStt::saying(&["one", "two", "exit"], &cancel),
        EchoRelay::default(),
        mouth.clone(),
    )
    .with_pause(Duration::ZERO);

    assert_eq!(client.run(&cancel).await.unwrap(), Stopped::ExitCommand);
    assert_eq!(mouth.spoken.borrow().len(), 2);
}

#[tokio::test]
async fn test_microphone_failure_is_fatal() {
    let cancel = CancellationToken::new();

    let mut client = VoiceClient::new(
        BrokenEars,
        ScriptedStt::saying(&[], &cancel),
        EchoRelay::default(),
        RecordingMouth::default(),
    );

    let err = client.run(&cancel).await.unwrap_err();
    assert!(matches!(err, Error::Audio(_)));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let relay = EchoRelay::default();

    let mut client = VoiceClient::new(
        FakeEars,
        ScriptedStt::saying(&["hello"], &cancel),
        relay.clone(),
        RecordingMouth::default(),
    );

    assert_eq!(client.run(&cancel).await.unwrap(), Stopped::Cancelled);
    assert!(relay.asked.borrow().is_empty());
}

#[tokio::test]
async fn test_cancel_interrupts_listening() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut client = VoiceClient::new(
        DeafEars,
        ScriptedStt::saying(&[], &cancel),
        EchoRelay::default(),
        RecordingMouth::default(),
    );

    let stopped = tokio::time::timeout(Duration::from_secs(5), client.run(&cancel))
        .await
        .expect("loop ignored cancellation")
        .unwrap();

    assert_eq!(stopped, Stopped::Cancelled);
}

#[tokio::test]
async fn test_relay_client_returns_reply() {
    let addr = spawn_relay(FakeModel::replying("I stay calm when things get confusing.")).await;
    let relay = RelayClient::new(Url::parse(&format!("http://{addr}/chat")).unwrap());

    let reply = relay.ask("What is your superpower?").await;

    assert_eq!(reply, "I stay calm when things get confusing.");
}

#[tokio::test]
async fn test_relay_client_speaks_model_failure() {
    let addr = spawn_relay(FakeModel::failing()).await;
    let relay = RelayClient::new(Url::parse(&format!("http://{addr}/chat")).unwrap());

    let reply = relay.ask("hello").await;

    assert!(reply.starts_with("Error processing request: "));
}

#[tokio::test]
async fn test_relay_client_handles_missing_response_field() {
    let app = Router::new().route(
        "/chat",
        post(|| async { Json(serde_json::json!({"detail": "moved"})) }),
    );
    let addr = serve(app).await;
    let relay = RelayClient::new(Url::parse(&format!("http://{addr}/chat")).unwrap());

    assert_eq!(relay.ask("hello").await, "No response from chatbot.");
}

#[tokio::test]
async fn test_unreachable_relay_is_spoken() {
    let cancel = CancellationToken::new();
    let mouth = RecordingMouth::default();
    let relay = RelayClient::new(Url::parse("http://127.0.0.1:1/chat").unwrap());

    let mut client = VoiceClient::new(
        FakeEars,
        ScriptedStt::saying(&["hello", "exit"], &cancel),
        relay,
        mouth.clone(),
    )
    .with_pause(Duration::ZERO);

    assert_eq!(client.run(&cancel).await.unwrap(), Stopped::ExitCommand);

    let spoken = mouth.spoken.borrow();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].starts_with("Error contacting chatbot: "));
}
