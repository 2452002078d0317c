//! Messages flowing from the session worker to the wire encoder.

use serde::Serialize;
use sluice_common::constants::ACTION_AGENT_ANSWER;

/// Whether a data fragment is visible answer text or model reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Content,
    Reasoning,
}

/// One unit of output for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A content or reasoning fragment.
    Data {
        agent_name: String,
        tool_name: Option<String>,
        kind: FragmentKind,
        content: String,
    },
    /// A recoverable per-agent error surfaced to the client as content.
    ErrorFrame { agent_name: String, message: String },
    /// Unrecoverable session failure.
    Fatal { cause: String },
    Heartbeat,
    /// Ordered completion.
    Done,
}

impl Message {
    pub fn content(agent_name: impl Into<String>, tool_name: Option<String>, content: impl Into<String>) -> Self {
        Message::Data {
            agent_name: agent_name.into(),
            tool_name,
            kind: FragmentKind::Content,
            content: content.into(),
        }
    }

    pub fn reasoning(agent_name: impl Into<String>, tool_name: Option<String>, content: impl Into<String>) -> Self {
        Message::Data {
            agent_name: agent_name.into(),
            tool_name,
            kind: FragmentKind::Reasoning,
            content: content.into(),
        }
    }

    pub fn error_frame(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Message::ErrorFrame {
            agent_name: agent_name.into(),
            message: message.into(),
        }
    }

    /// `Done` and `Fatal` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::Done | Message::Fatal { .. })
    }

    /// JSON body for frames carried on `data:` lines.
    pub fn answer(&self) -> Option<AgentAnswer<'_>> {
        match self {
            Message::Data {
                agent_name,
                tool_name,
                kind,
                content,
            } => {
                let (content, reasoning_content) = match kind {
                    FragmentKind::Content => (content.as_str(), ""),
                    FragmentKind::Reasoning => ("", content.as_str()),
                };
                Some(AgentAnswer {
                    action: ACTION_AGENT_ANSWER,
                    agent_name,
                    tool_name: tool_name.as_deref().unwrap_or_default(),
                    is_err: false,
                    content,
                    reasoning_content,
                })
            }
            Message::ErrorFrame {
                agent_name,
                message,
            } => Some(AgentAnswer {
                action: ACTION_AGENT_ANSWER,
                agent_name,
                tool_name: "",
                is_err: true,
                content: message,
                reasoning_content: "",
            }),
            Message::Fatal { .. } | Message::Heartbeat | Message::Done => None,
        }
    }
}

/// Wire payload of a `data:` frame.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAnswer<'a> {
    pub action: &'a str,
    pub agent_name: &'a str,
    pub tool_name: &'a str,
    pub is_err: bool,
    pub content: &'a str,
    pub reasoning_content: &'a str,
}
