//! JSON-lines protocol between clients and the voxturn server.
//!
//! A client writes one [`Request`] line. The server answers with zero or more
//! `event` lines followed by exactly one final response line.

use crate::pipeline::events::TurnEvent;
use crate::pipeline::orchestrator::{PipelineStatus, TurnReport};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Requests sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Run a turn on a recorded WAV file
    Process {
        audio_path: PathBuf,
        /// Continue this session instead of creating one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<SessionId>,
    },
    /// Speak the given text
    Say {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<SessionId>,
    },
    /// Stop the current reply and drop queued audio
    Interrupt,
    /// Liveness check
    Ping,
    /// Get pipeline status
    Status,
}

impl Request {
    /// Serialize request to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize request from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Progress of a running turn
    Event { event: TurnEvent },
    /// Turn finished generating; playback may still be running
    Done { report: TurnReport },
    Pong,
    Status { status: PipelineStatus },
    /// Request succeeded with nothing to report
    Ok,
    Error { message: String },
}

impl Response {
    /// True for every response that ends a request.
    pub fn is_final(&self) -> bool {
        !matches!(self, Response::Event { .. })
    }

    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::PipelineIssue;
    use crate::pipeline::types::TurnId;

    #[test]
    fn test_request_wire_format() {
        let json = Request::Ping.to_json().unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let json = Request::Say {
            text: "Hello.".to_string(),
            session: None,
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"say","text":"Hello."}"#);
    }

    #[test]
    fn test_process_request_from_json() {
        let request =
            Request::from_json(r#"{"type":"process","audio_path":"/tmp/in.wav","session":"s1"}"#)
                .unwrap();
        assert_eq!(
            request,
            Request::Process {
                audio_path: PathBuf::from("/tmp/in.wav"),
                session: Some(SessionId::parse("s1").unwrap()),
            }
        );
    }

    #[test]
    fn test_session_outside_output_dir_is_rejected() {
        for session in ["../escaped", "a/b", "/abs", ""] {
            let json = format!(r#"{{"type":"say","text":"Hi.","session":"{}"}}"#, session);
            assert!(
                Request::from_json(&json).is_err(),
                "accepted session {:?}",
                session
            );
        }
    }

    #[test]
    fn test_unknown_request_is_rejected() {
        assert!(Request::from_json(r#"{"type":"shutdown"}"#).is_err());
        assert!(Request::from_json("not json").is_err());
    }

    #[test]
    fn test_event_response_nests_turn_event() {
        let response = Response::Event {
            event: TurnEvent::TextChunk {
                text: "Hi".to_string(),
            },
        };
        let json = response.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"kind":"event","event":{"type":"text-chunk","text":"Hi"}}"#
        );
        assert_eq!(Response::from_json(&json).unwrap(), response);
        assert!(!response.is_final());
    }

    #[test]
    fn test_done_response_carries_report() {
        let response = Response::Done {
            report: TurnReport {
                turn: TurnId(2),
                session: SessionId::parse("s1").unwrap(),
                transcript: Some("hi".to_string()),
                reply: "Hello.".to_string(),
                sentences: 1,
                issues: vec![PipelineIssue::Stale { sequence: 1 }],
            },
        };
        let json = response.to_json().unwrap();
        assert!(json.contains(r#""kind":"done""#));
        assert!(json.contains(r#""stage":"stale""#));
        assert_eq!(Response::from_json(&json).unwrap(), response);
        assert!(response.is_final());
    }

    #[test]
    fn test_error_response() {
        let response = Response::Error {
            message: "boom".to_string(),
        };
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"kind":"error","message":"boom"}"#
        );
    }
}
