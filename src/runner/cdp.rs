//! Minimal DevTools protocol client: target discovery and a single session.

use std::collections::VecDeque;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{EmbedError, Result};

/// One entry of the debugger's `/json/list` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Ask the debugger on `port` for its targets and pick the page to attach to.
pub async fn discover(client: &reqwest::Client, port: u16, needle: &str) -> Result<Option<Target>> {
    let targets: Vec<Target> = client
        .get(format!("http://localhost:{port}/json/list"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(pick_target(targets, needle))
}

/// First attachable `page` target whose URL contains `needle`.
pub fn pick_target(targets: Vec<Target>, needle: &str) -> Option<Target> {
    targets.into_iter().find(|target| {
        target.kind == "page"
            && target.url.contains(needle)
            && target.web_socket_debugger_url.is_some()
    })
}

/// An unsolicited notification from the page.
#[derive(Clone, Debug, PartialEq)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// A decoded protocol frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Reply {
        id: u64,
        result: std::result::Result<Value, String>,
    },
    Event(CdpEvent),
}

#[derive(Deserialize)]
struct RawFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RawError>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Deserialize)]
struct RawError {
    message: String,
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<Frame> {
    let raw: RawFrame = serde_json::from_str(text)?;
    match (raw.id, raw.method) {
        (Some(id), _) => Ok(Frame::Reply {
            id,
            result: match raw.error {
                Some(error) => Err(error.message),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            },
        }),
        (None, Some(method)) => Ok(Frame::Event(CdpEvent {
            method,
            params: raw.params,
        })),
        (None, None) => Err(EmbedError::Cdp(format!("unrecognized frame: {text}"))),
    }
}

/// A WebSocket connection to one debugged page.
///
/// Calls are issued one at a time; events that arrive while waiting for a
/// reply are kept and handed out by [`next_event`](Self::next_event).
pub struct CdpSession {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    backlog: VecDeque<CdpEvent>,
}

impl CdpSession {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url).await?;
        tracing::info!("Connected to {url}");
        Ok(Self {
            socket,
            next_id: 0,
            backlog: VecDeque::new(),
        })
    }

    /// Invoke `method` and wait for its reply.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let request = json!({ "id": id, "method": method, "params": params });
        self.socket
            .send(WsMessage::Text(request.to_string().into()))
            .await?;

        loop {
            match self.read_frame().await? {
                Some(Frame::Reply { id: reply, result }) if reply == id => {
                    return result
                        .map_err(|message| EmbedError::Cdp(format!("{method}: {message}")));
                }
                Some(Frame::Reply { id: stale, .. }) => {
                    tracing::debug!("Ignoring reply to call {stale}");
                }
                Some(Frame::Event(event)) => self.backlog.push_back(event),
                None => return Err(EmbedError::Cdp(format!("{method}: connection closed"))),
            }
        }
    }

    /// The next page event, or `None` once the connection closes.
    pub async fn next_event(&mut self) -> Result<Option<CdpEvent>> {
        if let Some(event) = self.backlog.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.read_frame().await? {
                Some(Frame::Event(event)) => return Ok(Some(event)),
                Some(Frame::Reply { .. }) => continue,
                None => return Ok(None),
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(message) = self.socket.next().await {
            match message? {
                WsMessage::Text(text) => return parse_frame(text.as_str()).map(Some),
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}
