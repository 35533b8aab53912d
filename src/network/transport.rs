//! Client frame transport.
//!
//! Both listeners carry one JSON document per frame: a line on the plain TCP
//! listener, a text message on the WebSocket listener.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

/// Longest accepted line on the plain listener.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("line transport: {0}")]
    Lines(#[from] LinesCodecError),
    #[error("websocket transport: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

pub enum FrameTransport {
    Lines(Framed<TcpStream, LinesCodec>),
    WebSocket(Box<WebSocketStream<TcpStream>>),
}

impl FrameTransport {
    pub fn lines(stream: TcpStream) -> Self {
        Self::Lines(Framed::new(
            stream,
            LinesCodec::new_with_max_length(MAX_FRAME_LEN),
        ))
    }

    pub fn websocket(stream: WebSocketStream<TcpStream>) -> Self {
        Self::WebSocket(Box::new(stream))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lines(_) => "lines",
            Self::WebSocket(_) => "websocket",
        }
    }

    /// Next text frame. `None` once the peer has closed.
    pub async fn next_frame(&mut self) -> Option<Result<String, FrameError>> {
        match self {
            Self::Lines(framed) => framed.next().await.map(|r| r.map_err(FrameError::from)),
            Self::WebSocket(ws) => loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(text)),
                    Ok(Message::Close(_)) => return None,
                    Ok(Message::Binary(_)) => debug!("ignoring binary websocket frame"),
                    Ok(_) => {}
                    Err(e) => return Some(Err(e.into())),
                }
            },
        }
    }

    pub async fn send_frame(&mut self, frame: String) -> Result<(), FrameError> {
        match self {
            Self::Lines(framed) => framed.send(frame).await?,
            Self::WebSocket(ws) => ws.send(Message::Text(frame)).await?,
        }
        Ok(())
    }

    /// Best-effort close; errors mean the peer is already gone.
    pub async fn close(&mut self) {
        let result = match self {
            Self::Lines(framed) => SinkExt::<String>::close(framed)
                .await
                .map_err(FrameError::from),
            Self::WebSocket(ws) => WebSocketStream::close(ws.as_mut(), None)
                .await
                .map_err(FrameError::from),
        };
        if let Err(e) = result {
            debug!(error = %e, "closing client transport");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn lines_close_flushes_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut transport = FrameTransport::lines(stream);
        transport.send_frame(r#"{"event":"welcome"}"#.into()).await.unwrap();
        transport.close().await;

        assert_eq!(peer.await.unwrap(), "{\"event\":\"welcome\"}\n");
    }

    #[tokio::test]
    async fn websocket_close_sends_close_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (mut ws, _) = tokio_tungstenite::client_async(format!("ws://{addr}/"), stream)
                .await
                .unwrap();
            let mut texts = Vec::new();
            while let Some(message) = ws.next().await {
                match message.unwrap() {
                    Message::Text(text) => texts.push(text),
                    Message::Close(_) => return (texts, true),
                    _ => {}
                }
            }
            (texts, false)
        });

        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut transport = FrameTransport::websocket(ws);
        transport.send_frame("hi".into()).await.unwrap();
        transport.close().await;

        let (texts, closed) = peer.await.unwrap();
        assert_eq!(texts, vec!["hi".to_string()]);
        assert!(closed, "peer must see a close frame");
    }
}
