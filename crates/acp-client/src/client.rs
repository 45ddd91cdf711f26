//! The high-level client facade.
//!
//! Every operation runs as one queued exchange on the shared session, so
//! at most one request is in flight per connection.

use acp_auth::Authenticator;
use acp_core::error::{AuthError, PropertyError, Result, RpcError};
use acp_core::Command;
use acp_session::{Session, SessionGuard, SharedSession};
use acp_wire::cflbinary::{self, Value};
use acp_wire::element::{self, ElementHeader, ELEMENT_HEADER_LEN, SENTINEL};
use acp_wire::monitor::{self, FrameHeader, FRAME_HEADER_LEN};
use acp_wire::property::{PropName, Property};
use acp_wire::Message;

use crate::config::ClientConfig;

/// Flags value stock clients stamp on requests.
const REQUEST_FLAGS: i32 = 4;

/// One entry of a GET_PROPERTY response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyReply {
    Value(Property),
    ServerError { name: PropName, code: i32 },
}

/// High-level ACP client.
pub struct AcpClient {
    config: ClientConfig,
    session: SharedSession,
}

impl AcpClient {
    /// Create a client; call [`connect`] before issuing operations.
    ///
    /// [`connect`]: AcpClient::connect
    pub fn new(config: ClientConfig) -> Self {
        let mut session = Session::new(config.host.clone(), config.port);
        session.set_read_timeout(config.read_timeout);
        Self {
            config,
            session: SharedSession::new(session),
        }
    }

    /// Dial the base station.
    pub async fn connect(&self) -> Result<()> {
        tracing::debug!(host = %self.config.host, port = self.config.port, "connecting");
        self.session.connect(self.config.connect_timeout).await
    }

    /// Close the connection, canceling queued exchanges.
    pub async fn disconnect(&self) {
        self.session.close().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    /// Run the SRP exchange and switch the session to encrypted framing.
    pub async fn authenticate(&self) -> Result<()> {
        let password = self
            .config
            .password
            .clone()
            .ok_or(AuthError::InvalidState(String::from(
                "no password configured",
            )))?;
        self.session
            .queue(|mut session| async move {
                Authenticator::new(password).run(&mut session).await
            })
            .await
    }

    /// Read a single property; server-side errors surface as
    /// `PropertyError::ServerError`.
    pub async fn get_property(&self, name: &str) -> Result<Property> {
        let mut replies = self.get_properties(&[name], false).await?;
        match replies.pop() {
            Some(PropertyReply::Value(prop)) => Ok(prop),
            _ => Err(PropertyError::UnknownProperty(name.to_string()).into()),
        }
    }

    /// Read several properties in one exchange.
    ///
    /// With `include_errors` the result carries per-name errors in request
    /// order; without it the first server error fails the call, after the
    /// whole response has been drained so the stream stays aligned.
    pub async fn get_properties(
        &self,
        names: &[&str],
        include_errors: bool,
    ) -> Result<Vec<PropertyReply>> {
        let mut payload = Vec::with_capacity(names.len() * 16 + SENTINEL.len());
        for name in names {
            let name: PropName = name.parse()?;
            payload.extend_from_slice(&element::compose(0, name.as_bytes(), &[0u8; 4]));
        }
        payload.extend_from_slice(&SENTINEL);

        let password = self.config.password.clone();
        let replies = self
            .session
            .queue(|mut session| async move {
                let password = exchange_password(&session, password);
                session
                    .send(&Message::get_prop(password.as_deref(), REQUEST_FLAGS, payload))
                    .await?;

                let ack = session.receive_message().await?;
                if ack.error_code != 0 {
                    return Err(PropertyError::ServerError(ack.error_code).into());
                }

                read_elements(&mut session).await
            })
            .await?;

        if !include_errors {
            if let Some(PropertyReply::ServerError { code, .. }) = replies
                .iter()
                .find(|r| matches!(r, PropertyReply::ServerError { .. }))
            {
                return Err(PropertyError::ServerError(*code).into());
            }
        }
        Ok(replies)
    }

    /// Write properties; any per-property error fails the call.
    pub async fn set_properties(&self, properties: &[Property]) -> Result<()> {
        let mut payload = Vec::new();
        for prop in properties {
            payload.extend_from_slice(&element::compose(0, prop.name.as_bytes(), &prop.value));
        }
        payload.extend_from_slice(&SENTINEL);

        let password = self.config.password.clone();
        let replies = self
            .session
            .queue(|mut session| async move {
                let password = exchange_password(&session, password);
                session
                    .send(&Message::set_prop(password.as_deref(), REQUEST_FLAGS, payload))
                    .await?;

                let ack = session.receive_message().await?;
                if ack.error_code != 0 {
                    return Err(PropertyError::ServerError(ack.error_code).into());
                }

                read_elements(&mut session).await
            })
            .await?;

        for reply in replies {
            if let PropertyReply::ServerError { code, .. } = reply {
                return Err(PropertyError::ServerError(code).into());
            }
        }
        Ok(())
    }

    /// Subscribe to change events; the session is consumed by the stream.
    pub async fn monitor(&self, filters: Value) -> Result<MonitorStream> {
        let mut session = self.session.acquire().await?;
        let password = exchange_password(&session, self.config.password.clone());

        let body = monitor::compose_request(&filters)?;
        session
            .send(&Message::monitor(password.as_deref(), REQUEST_FLAGS, body))
            .await?;

        let ack = session.receive_message().await?;
        if ack.error_code != 0 {
            return Err(PropertyError::ServerError(ack.error_code).into());
        }

        session.set_monitoring();
        Ok(MonitorStream { session })
    }

    /// Invoke a station-side function; returns its outputs dictionary.
    pub async fn rpc(&self, function: &str, inputs: Value) -> Result<Value> {
        let payload = cflbinary::compose(&Value::dict([
            ("function", Value::from(function)),
            ("inputs", inputs),
        ]))?;

        let password = self.config.password.clone();
        self.session
            .queue(|mut session| async move {
                let password = exchange_password(&session, password);
                session
                    .send(&Message::rpc(password.as_deref(), REQUEST_FLAGS, payload))
                    .await?;

                let reply = session.receive_message().await?;
                let body = reply.body.as_deref().ok_or(RpcError::InvalidResponse)?;
                let dict = cflbinary::parse(body)?;

                let status = dict
                    .get("status")
                    .and_then(Value::as_integer)
                    .ok_or(RpcError::InvalidResponse)?;
                if status != 0 {
                    return Err(RpcError::Failed(status as i32).into());
                }
                dict.get("outputs")
                    .cloned()
                    .ok_or_else(|| RpcError::InvalidResponse.into())
            })
            .await
    }

    /// Query the station's supported feature list.
    pub async fn get_features(&self) -> Result<Value> {
        self.session
            .queue(|mut session| async move {
                session.send(&Message::features(REQUEST_FLAGS)).await?;
                let reply = session.receive_message().await?;
                let body = reply.body.as_deref().ok_or(RpcError::InvalidResponse)?;
                Ok(cflbinary::parse(body)?)
            })
            .await
    }

    /// Fetch and format the station's syslog buffer.
    pub async fn get_logs(&self) -> Result<String> {
        let prop = self.get_property("logm").await?;
        match prop.decode()? {
            acp_wire::PropertyValue::Log(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }

    /// Reboot by writing the `acRB` trigger property.
    pub async fn reboot(&self) -> Result<()> {
        let name: PropName = "acRB".parse()?;
        self.set_properties(&[Property::new(name, vec![0u8; 4])])
            .await
    }

    /// Liveness probe: the station reflects the payload.
    pub async fn echo(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        let password = self.config.password.clone();
        self.session
            .queue(|mut session| async move {
                let password = exchange_password(&session, password);
                session
                    .send(&Message::echo(password.as_deref(), REQUEST_FLAGS, payload))
                    .await?;
                let reply = session.receive_message().await?;
                Ok(reply.body.unwrap_or_default())
            })
            .await
    }

    /// Flash a firmware image to the primary bank.
    ///
    /// The response body is firmware-defined and returned opaque.
    pub async fn flash_primary(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        self.flash(Command::FlashPrimary, image).await
    }

    /// Flash a firmware image to the secondary bank.
    pub async fn flash_secondary(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        self.flash(Command::FlashSecondary, image).await
    }

    /// Flash a bootloader image.
    pub async fn flash_bootloader(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        self.flash(Command::FlashBootloader, image).await
    }

    async fn flash(&self, command: Command, image: Vec<u8>) -> Result<Vec<u8>> {
        let password = self.config.password.clone();
        self.session
            .queue(|mut session| async move {
                let password = exchange_password(&session, password);
                let message = match command {
                    Command::FlashSecondary => {
                        Message::flash_secondary(password.as_deref(), REQUEST_FLAGS, image)
                    }
                    Command::FlashBootloader => {
                        Message::flash_bootloader(password.as_deref(), REQUEST_FLAGS, image)
                    }
                    _ => Message::flash_primary(password.as_deref(), REQUEST_FLAGS, image),
                };
                session.send(&message).await?;
                let reply = session.receive_message().await?;
                Ok(reply.body.unwrap_or_default())
            })
            .await
    }
}

/// Once the session cipher is installed the header key is all zeros.
fn exchange_password(session: &Session, password: Option<String>) -> Option<String> {
    if session.is_encrypted() {
        None
    } else {
        password
    }
}

/// Drain a property element stream up to and including the sentinel.
async fn read_elements(session: &mut Session) -> Result<Vec<PropertyReply>> {
    let mut replies = Vec::new();
    loop {
        let header_bytes = session.receive(ELEMENT_HEADER_LEN).await?;
        let header = ElementHeader::parse(&header_bytes)?;

        if header.is_sentinel() {
            // The remaining 4 zero bytes of the 16-byte marker.
            session.receive(SENTINEL.len() - ELEMENT_HEADER_LEN).await?;
            return Ok(replies);
        }

        let value = session.receive(header.size as usize).await?;
        let name = PropName::from(header.name);

        if header.is_error() {
            let code = value
                .as_slice()
                .try_into()
                .map(i32::from_be_bytes)
                .unwrap_or(acp_core::status::NOT_AVAILABLE);
            replies.push(PropertyReply::ServerError { name, code });
        } else {
            replies.push(PropertyReply::Value(Property::new(name, value)));
        }
    }
}

/// Event stream for a session latched into monitor mode.
///
/// Holds the session guard: no further exchanges can be queued until the
/// stream is dropped or closed.
pub struct MonitorStream {
    session: SessionGuard,
}

impl MonitorStream {
    /// Wait for the next pushed event.
    pub async fn next_event(&mut self) -> Result<Value> {
        let header_bytes = self.session.receive(FRAME_HEADER_LEN).await?;
        let header = FrameHeader::parse(&header_bytes)?;
        let body = self.session.receive(header.body_size as usize).await?;
        Ok(cflbinary::parse(&body)?)
    }

    /// Cancel monitoring by closing the socket.
    pub async fn close(mut self) {
        self.session.close();
    }
}
