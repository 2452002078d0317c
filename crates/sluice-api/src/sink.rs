//! Frame sink feeding an HTTP response body.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use sluice_stream::{FrameSink, WireError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Writes frames into a bounded channel drained by the response body.
///
/// Hyper polls the body as the connection accepts bytes, so a full channel
/// means the client is not keeping up. When the client disconnects hyper
/// drops the body and the sink reports itself closed.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
}

/// A sink and the streaming body it feeds.
pub fn channel(buffer: usize) -> (ChannelSink, Body) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ChannelSink { tx }, Body::from_stream(ReceiverStream::new(rx)))
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), WireError> {
        self.tx.send(Ok(frame)).await.map_err(|_| WireError::Closed)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn dropping_the_body_closes_the_sink() {
        let (mut sink, body) = channel(4);
        sink.write_frame(Bytes::from_static(b"[DONE]\n")).await.unwrap();
        drop(body);

        tokio::time::timeout(Duration::from_secs(1), sink.closed())
            .await
            .expect("closed should resolve");
        assert!(matches!(
            sink.write_frame(Bytes::from_static(b"x")).await,
            Err(WireError::Closed)
        ));
    }
}
