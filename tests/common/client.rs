//! Test line-protocol client.
//!
//! Sends JSON requests one per line and decodes JSON events.

#![allow(dead_code)]

use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use voxfleet_proto::{ClientEvent, ClientRequest, Feature};

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TestClient {
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Send one raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_json(&mut self, value: &Value) -> anyhow::Result<()> {
        self.send_raw(&value.to_string()).await
    }

    pub async fn send(&mut self, request: &ClientRequest) -> anyhow::Result<()> {
        self.send_raw(&serde_json::to_string(request)?).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<ClientEvent> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ClientEvent> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Receive until `predicate` matches; returns the matching event.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<ClientEvent>
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        loop {
            let event = self.recv().await?;
            if predicate(&event) {
                return Ok(event);
            }
        }
    }

    /// True if nothing arrives within `dur`.
    pub async fn is_silent(&mut self, dur: Duration) -> bool {
        self.recv_timeout(dur).await.is_err()
    }

    /// True once the server has closed the connection.
    pub async fn is_closed(&mut self, dur: Duration) -> bool {
        let mut line = String::new();
        matches!(
            timeout(dur, self.reader.read_line(&mut line)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }

    /// Identify and wait for `welcome`. Returns the admitted features.
    pub async fn hello(&mut self, token: &str) -> anyhow::Result<Vec<Feature>> {
        self.send(&ClientRequest::Hello {
            token: token.to_string(),
        })
        .await?;
        match self.recv().await? {
            ClientEvent::Welcome { features, .. } => Ok(features),
            other => anyhow::bail!("expected welcome, got {other:?}"),
        }
    }
}
