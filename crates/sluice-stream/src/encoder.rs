//! Renders messages into the event-stream wire format.

use async_trait::async_trait;
use bytes::Bytes;
use sluice_common::constants::wire;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::message::Message;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("client connection closed")]
    Closed,
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination of rendered frames. Every write is flushed before it returns.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), WireError>;

    /// Completes when the client is known to be gone. Sinks that cannot
    /// tell never complete and rely on write failures instead.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Sink over any async writer.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> FrameSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), WireError> {
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Render a message into its wire frame. Heartbeats, data, errors and
/// completion each have their own framing.
pub fn render(message: &Message) -> Result<Bytes, WireError> {
    let frame = match message {
        Message::Heartbeat => Bytes::from_static(wire::KEEP_ALIVE.as_bytes()),
        Message::Done => Bytes::from_static(wire::DONE.as_bytes()),
        Message::Fatal { cause } => {
            Bytes::from(format!("{}{}{}", wire::ERROR_PREFIX, cause, wire::FRAME_END))
        }
        Message::Data { .. } | Message::ErrorFrame { .. } => {
            let json = serde_json::to_string(&message.answer())?;
            Bytes::from(format!("{}{}{}", wire::DATA_PREFIX, json, wire::FRAME_END))
        }
    };
    Ok(frame)
}

/// Writes rendered frames to a sink, one flush per frame.
pub struct WireEncoder<S> {
    sink: S,
    frames: u64,
}

impl<S: FrameSink> WireEncoder<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, frames: 0 }
    }

    pub async fn emit(&mut self, message: &Message) -> Result<(), WireError> {
        let frame = render(message)?;
        self.sink.write_frame(frame).await?;
        self.frames += 1;
        Ok(())
    }

    pub async fn closed(&self) {
        self.sink.closed().await
    }

    /// Frames successfully written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(message: &Message) -> String {
        String::from_utf8(render(message).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn renders_control_frames() {
        assert_eq!(text(&Message::Heartbeat), ": keep-alive\n\n");
        assert_eq!(text(&Message::Done), "[DONE]\n");
        assert_eq!(
            text(&Message::Fatal {
                cause: "internal server error".into()
            }),
            "error: [ERROR]internal server error\n\n"
        );
    }

    #[test]
    fn renders_data_frame_as_single_json_line() {
        let frame = text(&Message::content("helper", Some("calculator".into()), "4\n"));
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        // embedded newlines are escaped so the frame stays on one line
        assert_eq!(frame.matches('\n').count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["toolName"], "calculator");
        assert_eq!(json["content"], "4\n");
        assert_eq!(json["isErr"], false);
    }

    #[tokio::test]
    async fn writer_sink_flushes_each_frame() {
        let mut encoder = WireEncoder::new(WriterSink::new(Vec::new()));
        encoder.emit(&Message::Heartbeat).await.unwrap();
        encoder.emit(&Message::Done).await.unwrap();
        assert_eq!(encoder.frames_written(), 2);
        let bytes = encoder.into_inner().into_inner();
        assert_eq!(bytes, b": keep-alive\n\n[DONE]\n");
    }
}
