//! SMS through the Android scripting-layer (SL4A) RPC facade.
//!
//! The facade listens on a local TCP port and speaks newline-delimited
//! JSON-RPC: `{"id", "method", "params"}` out, `{"id", "result", "error"}`
//! back. When the server was started with a handshake secret, the first
//! call must be `_authenticate`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::relay::{MessageId, SmsInbox, SmsMessage};
use crate::transport::TransportError;

/// Where the facade listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sl4aConfig {
    pub host: String,
    pub port: u16,
    pub handshake: Option<String>,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

pub struct Sl4aClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl Sl4aClient {
    pub async fn connect(config: &Sl4aConfig) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| TransportError::Connect { addr: addr.clone(), source })?;
        let (read, write) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
            next_id: 0,
        };

        if let Some(ref secret) = config.handshake {
            client.call("_authenticate", json!([secret])).await?;
        }

        info!("📱 Connected to SL4A facade at {addr}");
        Ok(client)
    }

    /// One request/response round trip.
    async fn call(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&RpcRequest { id, method, params })?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let mut buf = String::new();
        if self.reader.read_line(&mut buf).await? == 0 {
            return Err(TransportError::Closed);
        }
        debug!("SL4A {method} -> {}", buf.trim_end());

        let response: RpcResponse = serde_json::from_str(&buf)?;
        if response.id != id {
            return Err(TransportError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }

        match response.error {
            Value::Null => Ok(response.result),
            Value::String(message) => Err(TransportError::Rpc { method: method.to_string(), message }),
            other => Err(TransportError::Rpc { method: method.to_string(), message: other.to_string() }),
        }
    }
}

#[async_trait]
impl SmsInbox for Sl4aClient {
    async fn list_unread_ids(&mut self) -> Result<Vec<MessageId>, TransportError> {
        let result = self.call("smsGetMessageIds", json!([true, "inbox"])).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(result)?)
    }

    async fn fetch_message(&mut self, id: MessageId) -> Result<SmsMessage, TransportError> {
        let result = self
            .call("smsGetMessageById", json!([id.0, ["address", "body", "date"]]))
            .await?;
        parse_message(id, &result)
    }

    async fn send(&mut self, address: &str, body: &str) -> Result<(), TransportError> {
        self.call("smsSend", json!([address, body])).await?;
        Ok(())
    }

    async fn mark_read(&mut self, id: MessageId) -> Result<(), TransportError> {
        self.call("smsMarkMessageRead", json!([[id.0], true])).await?;
        Ok(())
    }
}

fn parse_message(id: MessageId, value: &Value) -> Result<SmsMessage, TransportError> {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TransportError::Protocol(format!("message {id} has no {name}")))
    };

    Ok(SmsMessage {
        id,
        address: field("address")?,
        body: field("body")?,
        received_at: value.get("date").and_then(parse_date),
    })
}

/// Dates come back as epoch milliseconds, as a number or a numeric string.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}
