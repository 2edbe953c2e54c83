//! Streaming completion client.
//!
//! Relays the upstream newline-delimited response into a channel of
//! [`StreamEvent`]s. Every failure mode becomes exactly one in-band `Error`
//! event; no Rust error ever crosses the stream boundary, so the consumer
//! always sees a well-formed terminating sequence.

use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;

use super::types::{ChatMessage, ChatRequest, StreamEvent};

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
}

impl CompletionClient {
    /// The client must carry connect and read timeouts; an unbounded upstream
    /// call would hang a caller forever on a stalled backend.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// `POST {base_url}/chat {model, messages, stream: true}`, relayed line
    /// by line. The receiver observes `Data* (End | Error)`; dropping it makes
    /// the next relay send fail, which ends the task and aborts the upstream
    /// transfer.
    pub fn stream_chat(
        &self,
        base_url: &str,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> mpsc::Receiver<StreamEvent> {
        let url = format!("{}/chat", base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        };
        let client = self.client.clone();
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            relay(client, url, request, tx).await;
        });

        rx
    }
}

async fn relay(client: Client, url: String, request: ChatRequest, tx: mpsc::Sender<StreamEvent>) {
    let res = match client.post(&url).json(&request).send().await {
        Ok(res) => res,
        Err(err) => {
            let _ = tx
                .send(StreamEvent::Error(format!(
                    "completion endpoint unreachable: {}",
                    err
                )))
                .await;
            return;
        }
    };

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        tracing::warn!(%status, %url, "completion endpoint refused the stream");
        let _ = tx
            .send(StreamEvent::Error(format!(
                "completion endpoint returned {}: {}",
                status.as_u16(),
                body
            )))
            .await;
        return;
    }

    let mut stream = res.bytes_stream();
    // Bytes still waiting for their newline. Text is decoded one complete
    // line at a time, so a multibyte character split across network chunks
    // stays intact.
    let mut pending: Vec<u8> = Vec::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => {
                pending.extend_from_slice(&bytes);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(StreamEvent::Data(line.to_string())).await.is_err() {
                        // Consumer went away; dropping the response cancels
                        // the upstream transfer.
                        return;
                    }
                }
            }
            Err(err) => {
                let _ = tx
                    .send(StreamEvent::Error(format!(
                        "completion stream failed: {}",
                        err
                    )))
                    .await;
                return;
            }
        }
    }

    let trailing = String::from_utf8_lossy(&pending);
    let trailing = trailing.trim();
    if !trailing.is_empty()
        && tx
            .send(StreamEvent::Data(trailing.to_string()))
            .await
            .is_err()
    {
        return;
    }
    let _ = tx.send(StreamEvent::End).await;
}
