//! Wire protocol
//!
//! JSON messages tagged by `type`. Outbound messages are the small set the
//! client produces; inbound events cover everything the upstream proxy
//! relays, with an `Unknown` catch-all so new event types degrade to a log
//! line instead of a parse error.

use serde::{Deserialize, Serialize};

/// Error type string the upstream sends when the API quota is exhausted
pub const ERROR_TYPE_QUOTA: &str = "quota_exceeded";

/// Messages sent to the upstream service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on every (re)connect; configures the live session
    Setup {
        model: String,
        voice: String,
        instructions: String,
    },
    /// One base64 PCM16 frame of caller audio
    Audio {
        data: String,
        mime_type: String,
    },
    /// Typed text from the caller
    Text { text: String },
    /// Out-of-band steering content (recovery replay, stall nudges)
    #[serde(rename = "system.message")]
    SystemMessage { content: String },
}

/// Events received from the upstream service
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// One base64 PCM16 chunk of agent audio
    Audio {
        data: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
    /// Agent text content
    Text { text: String },
    /// The agent finished its turn
    TurnComplete,
    /// Upstream error; `error_type` distinguishes recoverable conditions
    Error {
        message: String,
        #[serde(default)]
        error_type: Option<String>,
    },
    /// A tool call began streaming
    #[serde(rename = "response.function_call.start")]
    FunctionCallStart {
        #[serde(default)]
        name: Option<String>,
    },
    /// Tool-call arguments complete; `arguments` is a JSON-encoded string
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone { arguments: String },
    /// Tool call fully delivered
    #[serde(rename = "response.function_call.done")]
    FunctionCallDone,
    /// System message echoed back by the proxy
    #[serde(rename = "system.message")]
    SystemMessage { content: String },
    /// Final transcription of caller speech
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscription { transcript: String },
    /// Incremental agent speech transcript
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },
    /// Agent speech transcript finished
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: Option<String>,
    },
    /// Incremental agent text
    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },
    /// Agent text finished
    #[serde(rename = "response.text.done")]
    TextDone {
        #[serde(default)]
        text: Option<String>,
    },
    /// A model response started
    #[serde(rename = "response.created")]
    ResponseCreated,
    /// Agent audio output started
    #[serde(rename = "output_audio_buffer.started")]
    OutputAudioStarted,
    /// Agent audio output drained
    #[serde(rename = "output_audio_buffer.stopped")]
    OutputAudioStopped,
    /// A model response fully completed
    #[serde(rename = "response.done")]
    ResponseDone,
    /// Anything this client does not handle
    #[serde(other)]
    Unknown,
}

/// Parsed payload of a `function_call_arguments.done` event
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallArgs {
    pub field_name: String,
    pub value: serde_json::Value,
}

impl ToolCallArgs {
    /// Decode the doubly-encoded `arguments` string
    pub fn parse(arguments: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(arguments)
    }

    /// The value as text, however the model chose to type it
    pub fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_serializes_with_type_tag() {
        let msg = ClientMessage::Setup {
            model: "m".into(),
            voice: "v".into(),
            instructions: "i".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "setup");
        assert_eq!(json["model"], "m");
    }

    #[test]
    fn test_system_message_dotted_tag() {
        let msg = ClientMessage::SystemMessage {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "system.message");
    }

    #[test]
    fn test_inbound_audio_event() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"audio","data":"QUJD","mime_type":"audio/pcm;rate=24000"}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Audio { data, mime_type } => {
                assert_eq!(data, "QUJD");
                assert_eq!(mime_type.as_deref(), Some("audio/pcm;rate=24000"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_inbound_tool_call_arguments() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.function_call_arguments.done","arguments":"{\"field_name\":\"dob\",\"value\":\"7/4/1990\"}"}"#,
        )
        .unwrap();
        let ServerEvent::FunctionCallArgumentsDone { arguments } = event else {
            panic!("wrong variant");
        };
        let args = ToolCallArgs::parse(&arguments).unwrap();
        assert_eq!(args.field_name, "dob");
        assert_eq!(args.value_text(), "7/4/1990");
    }

    #[test]
    fn test_tool_call_numeric_value() {
        let args = ToolCallArgs::parse(r#"{"field_name":"pain_level","value":7}"#).unwrap();
        assert_eq!(args.value_text(), "7");
    }

    #[test]
    fn test_error_event_with_quota_type() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"error","message":"out of quota","error_type":"quota_exceeded"}"#,
        )
        .unwrap();
        let ServerEvent::Error { error_type, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(error_type.as_deref(), Some(ERROR_TYPE_QUOTA));
    }

    #[test]
    fn test_unknown_event_tolerated() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"something.new","payload":1}"#).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_turn_complete() {
        let event: ServerEvent = serde_json::from_str(r#"{"type":"turn_complete"}"#).unwrap();
        assert_eq!(event, ServerEvent::TurnComplete);
    }
}
