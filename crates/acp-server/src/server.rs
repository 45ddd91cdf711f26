//! Accept loop and per-connection dispatch.

use std::sync::Arc;

use acp_auth::{AuthOutcome, AuthVerifier};
use acp_core::error::{Error, Result, SessionError};
use acp_core::Command;
use acp_session::Session;
use acp_wire::cflbinary::{self, Value};
use acp_wire::element::{self, SENTINEL};
use acp_wire::monitor;
use acp_wire::property::PropName;
use acp_wire::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::store::{PropertyStore, RpcHandler};

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub password: String,
    /// Feature names reported by GET_FEATURES.
    pub features: Vec<String>,
}

impl ServerConfig {
    pub fn new(bind_addr: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            password: password.into(),
            features: vec![
                "properties".into(),
                "rpc".into(),
                "monitor".into(),
            ],
        }
    }
}

/// The ACP test server.
pub struct AcpServer {
    config: ServerConfig,
    store: Arc<dyn PropertyStore>,
    rpc: Arc<dyn RpcHandler>,
    events: broadcast::Sender<Value>,
}

impl AcpServer {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn PropertyStore>,
        rpc: Arc<dyn RpcHandler>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            config,
            store,
            rpc,
            events,
        })
    }

    /// Push a monitor event to every monitoring connection.
    ///
    /// Returns how many connections are currently subscribed.
    pub fn publish_event(&self, event: Value) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(SessionError::Io)?;
        tracing::info!(addr = %self.config.bind_addr, "listening");
        self.serve(listener).await
    }

    /// Serve connections from an existing listener.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(SessionError::Io)?;
            tracing::debug!(%peer, "accepted connection");
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    tracing::debug!(%peer, error = %e, "connection ended");
                }
            });
        }
    }

    /// Serve one connection until it closes or misbehaves.
    ///
    /// Dispatch is strictly sequential: bytes for the next request
    /// accumulate in the session buffer while the current one is handled.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> Result<()> {
        let mut session = Session::from_stream(stream);
        let mut verifier = AuthVerifier::new(self.config.password.clone());

        loop {
            let message = match session.receive_message().await {
                Ok(message) => message,
                // Idle is fine; keep waiting for the next request.
                Err(Error::Session(SessionError::Timeout)) => continue,
                Err(Error::Session(SessionError::Canceled)) => return Ok(()),
                // The exchange is lost and the buffer dropped, but the
                // connection itself is still usable.
                Err(Error::Framing(e)) => {
                    tracing::warn!(error = %e, "bad frame");
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Inbound streaming bodies are not supported: the frame
            // boundary is unknowable, so the session is torn down.
            if message.body_size < 0 && command_requires_body(message.command) {
                tracing::warn!(command = ?message.command, "streaming request rejected");
                session.close();
                return Ok(());
            }

            match message.command {
                Command::Authenticate => self.handle_auth(&mut session, &mut verifier, &message).await?,
                Command::GetProperty => self.handle_get(&mut session, &message).await?,
                Command::SetProperty => self.handle_set(&mut session, &message).await?,
                Command::Monitor => {
                    self.handle_monitor(&mut session, &message).await?;
                    return Ok(());
                }
                Command::Rpc => self.handle_rpc(&mut session, &message).await?,
                Command::GetFeatures => self.handle_features(&mut session).await?,
                Command::Echo => {
                    let reply = Message::response(Command::Echo, 0, message.body.clone());
                    session.send(&reply).await?;
                }
                other => {
                    tracing::info!(command = ?other, "ignoring unhandled command");
                }
            }
        }
    }

    async fn handle_auth(
        &self,
        session: &mut Session,
        verifier: &mut AuthVerifier,
        message: &Message,
    ) -> Result<()> {
        match verifier.handle(message)? {
            AuthOutcome::Challenge(reply) | AuthOutcome::Failure(reply) => {
                session.send(&reply).await
            }
            AuthOutcome::Success {
                reply,
                session_key,
                client_iv,
                server_iv,
            } => {
                // The confirmation goes out in clear; everything after it
                // is encrypted.
                session.send(&reply).await?;
                session.enable_server_encryption(&session_key, client_iv, server_iv)
            }
        }
    }

    async fn handle_get(&self, session: &mut Session, message: &Message) -> Result<()> {
        let names = parse_request_names(message)?;

        let mut elements = Vec::new();
        for name in names {
            match self.store.get(&name).await {
                Ok(value) => elements.extend_from_slice(&element::compose(0, name.as_bytes(), &value)),
                Err(code) => elements.extend_from_slice(&element::compose_error(name.as_bytes(), code)),
            }
        }
        elements.extend_from_slice(&SENTINEL);

        session
            .send(&Message::response(Command::GetProperty, 0, None))
            .await?;
        session.send_raw(elements).await
    }

    async fn handle_set(&self, session: &mut Session, message: &Message) -> Result<()> {
        let body = message.body.as_deref().unwrap_or_default();

        let mut elements = Vec::new();
        let mut offset = 0;
        while offset < body.len() {
            let (header, value, consumed) = element::parse(&body[offset..])?;
            offset += consumed;
            if header.is_sentinel() {
                break;
            }
            let name = PropName::from(header.name);
            match self.store.set(&name, value.to_vec()).await {
                Ok(()) => elements.extend_from_slice(&element::compose(0, name.as_bytes(), &[0u8; 4])),
                Err(code) => elements.extend_from_slice(&element::compose_error(name.as_bytes(), code)),
            }
        }
        elements.extend_from_slice(&SENTINEL);

        session
            .send(&Message::response(Command::SetProperty, 0, None))
            .await?;
        session.send_raw(elements).await
    }

    /// Acknowledge MONITOR, then forward published events as `"XE"` frames
    /// until the client goes away.
    async fn handle_monitor(&self, session: &mut Session, _message: &Message) -> Result<()> {
        // Subscribe before acknowledging so no event published after the
        // ack can be missed.
        let mut events = self.events.subscribe();
        session
            .send(&Message::response(Command::Monitor, 0, None))
            .await?;
        session.set_monitoring();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let frame = monitor::compose_frame(&event)?;
                    if session.send_raw(frame).await.is_err() {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "monitor consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn handle_rpc(&self, session: &mut Session, message: &Message) -> Result<()> {
        let body = message.body.as_deref().unwrap_or_default();
        let dict = cflbinary::parse(body)?;

        let function = dict.get("function").and_then(Value::as_str).unwrap_or("");
        let inputs = dict.get("inputs").cloned().unwrap_or(Value::Dict(Vec::new()));

        let (status, outputs) = match self.rpc.call(function, &inputs).await {
            Ok(outputs) => (0i64, outputs),
            Err(code) => (i64::from(code), Value::Dict(Vec::new())),
        };

        let reply_body = cflbinary::compose(&Value::dict([
            ("status", Value::Integer(status as u64)),
            ("outputs", outputs),
        ]))?;
        session
            .send(&Message::response(Command::Rpc, 0, Some(reply_body)))
            .await
    }

    async fn handle_features(&self, session: &mut Session) -> Result<()> {
        let features = Value::Array(
            self.config
                .features
                .iter()
                .map(|f| Value::from(f.as_str()))
                .collect(),
        );
        let body = cflbinary::compose(&features)?;
        session
            .send(&Message::response(Command::GetFeatures, 0, Some(body)))
            .await
    }
}

fn command_requires_body(command: Command) -> bool {
    matches!(
        command,
        Command::Authenticate
            | Command::GetProperty
            | Command::SetProperty
            | Command::Monitor
            | Command::Rpc
    )
}

/// Names requested by a GET_PROPERTY body.
fn parse_request_names(message: &Message) -> Result<Vec<PropName>> {
    let body = message.body.as_deref().unwrap_or_default();

    let mut names = Vec::new();
    let mut offset = 0;
    while offset < body.len() {
        let (header, _value, consumed) = element::parse(&body[offset..])?;
        offset += consumed;
        if header.is_sentinel() {
            break;
        }
        names.push(PropName::from(header.name));
    }
    Ok(names)
}
