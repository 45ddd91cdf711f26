//! TCP session: exclusive socket ownership, buffered reads, exchange
//! serialization.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use acp_core::error::{Result, SessionError};
use acp_wire::message::{Message, HEADER_LEN};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::encryption::{EncryptionContext, Role};

/// Per-read deadline when the caller does not supply one.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Exclusive access to a session for one exchange.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// One TCP connection to a base station or client.
///
/// Single-threaded from the caller's perspective: wrap it in a
/// [`SharedSession`] to serialize exchanges.
pub struct Session {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    buffer: BytesMut,
    crypto: Option<EncryptionContext>,
    read_timeout: Duration,
    monitoring: bool,
}

impl Session {
    /// Create a session for an outbound connection (not yet connected).
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            buffer: BytesMut::new(),
            crypto: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            monitoring: false,
        }
    }

    /// Wrap an accepted connection (server side).
    pub fn from_stream(stream: TcpStream) -> Self {
        let (host, port) = stream
            .peer_addr()
            .map(|a| (a.ip().to_string(), a.port()))
            .unwrap_or_else(|_| (String::from("unknown"), 0));
        Self {
            host,
            port,
            stream: Some(stream),
            buffer: BytesMut::new(),
            crypto: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            monitoring: false,
        }
    }

    /// Dial the remote end.
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(%addr, "connecting");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SessionError::Timeout)?
            .map_err(|e| SessionError::ConnectFailed(e.to_string()))?;

        self.stream = Some(stream);
        self.buffer.clear();
        Ok(())
    }

    /// Close the socket and drop all per-connection state.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(host = %self.host, "session closed");
        }
        self.buffer.clear();
        self.crypto = None;
        self.monitoring = false;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        self.crypto.is_some()
    }

    /// Override the per-read deadline.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Latch the session into monitor mode; no further exchanges may start.
    pub fn set_monitoring(&mut self) {
        self.monitoring = true;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Install the client-side encryption context.
    pub fn enable_encryption(
        &mut self,
        key: &[u8],
        client_iv: [u8; 16],
        server_iv: [u8; 16],
    ) -> Result<()> {
        self.install(Role::Client, key, client_iv, server_iv)
    }

    /// Install the server-side encryption context.
    pub fn enable_server_encryption(
        &mut self,
        key: &[u8],
        client_iv: [u8; 16],
        server_iv: [u8; 16],
    ) -> Result<()> {
        self.install(Role::Server, key, client_iv, server_iv)
    }

    fn install(
        &mut self,
        role: Role,
        key: &[u8],
        client_iv: [u8; 16],
        server_iv: [u8; 16],
    ) -> Result<()> {
        if self.crypto.is_some() {
            return Err(SessionError::EncryptionAlreadyEnabled.into());
        }
        self.crypto = Some(EncryptionContext::new(role, key, client_iv, server_iv));
        tracing::debug!(?role, "session encryption enabled");
        Ok(())
    }

    /// Serialize (encrypting if enabled) and write a message.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        tracing::debug!(command = ?message.command, body_size = message.body_size, "send");
        self.send_raw(message.compose()).await
    }

    /// Write raw bytes through the (possibly encrypted) stream.
    pub async fn send_raw(&mut self, mut bytes: Vec<u8>) -> Result<()> {
        if let Some(crypto) = &mut self.crypto {
            crypto.encrypt_outbound(&mut bytes);
        }
        let stream = self.stream.as_mut().ok_or(SessionError::NotConnected)?;
        stream.write_all(&bytes).await.map_err(SessionError::Io)?;
        stream.flush().await.map_err(SessionError::Io)?;
        Ok(())
    }

    /// Return exactly `n` plaintext bytes from the inbound stream.
    pub async fn receive(&mut self, n: usize) -> Result<Vec<u8>> {
        self.receive_timeout(n, self.read_timeout).await
    }

    /// As [`receive`], with an explicit per-arrival deadline.
    ///
    /// The deadline refreshes whenever bytes arrive. Expiry aborts only
    /// this read; the session stays usable.
    ///
    /// [`receive`]: Session::receive
    pub async fn receive_timeout(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        while self.buffer.len() < n {
            let stream = self.stream.as_mut().ok_or(SessionError::NotConnected)?;

            let mut chunk = [0u8; 4096];
            let read = tokio::time::timeout(timeout, stream.read(&mut chunk))
                .await
                .map_err(|_| SessionError::Timeout)?
                .map_err(SessionError::Io)?;

            if read == 0 {
                self.close();
                return Err(SessionError::Canceled.into());
            }

            let mut data = chunk[..read].to_vec();
            if let Some(crypto) = &mut self.crypto {
                crypto.decrypt_inbound(&mut data);
            }
            self.buffer.extend_from_slice(&data);
        }
        Ok(self.buffer.split_to(n).to_vec())
    }

    /// Read and validate one complete message frame.
    ///
    /// A framing or checksum failure drops the receive buffer: the stream
    /// position can no longer be trusted.
    pub async fn receive_message(&mut self) -> Result<Message> {
        let header = self.receive(HEADER_LEN).await?;
        let mut message = match Message::parse_header(&header) {
            Ok(m) => m,
            Err(e) => {
                self.buffer.clear();
                return Err(e.into());
            }
        };

        let body = if message.body_size > 0 {
            self.receive(message.body_size as usize).await?
        } else {
            Vec::new()
        };
        if message.body_size >= 0 {
            if let Err(e) = message.attach_body(body) {
                self.buffer.clear();
                return Err(e.into());
            }
        }

        tracing::debug!(command = ?message.command, body_size = message.body_size, "received");
        Ok(message)
    }
}

/// Thread-safe session wrapper enforcing one exchange at a time.
///
/// Tokio's mutex is fair, so `queue` calls run in FIFO order: the n-th
/// job's first byte follows the last byte of job n-1's response.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run one exchange with exclusive access to the session.
    ///
    /// Waiters whose connection dropped before their turn are aborted with
    /// `Canceled`; a session latched into monitor mode accepts no further
    /// exchanges.
    pub async fn queue<T, F, Fut>(&self, job: F) -> Result<T>
    where
        F: FnOnce(SessionGuard) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.inner.clone().lock_owned().await;
        if !guard.is_connected() || guard.is_monitoring() {
            return Err(SessionError::Canceled.into());
        }
        job(guard).await
    }

    /// Take exclusive ownership of the session outside the queue.
    ///
    /// Used to latch the session into monitor mode, where the event
    /// stream keeps the guard for the rest of the connection's life.
    pub async fn acquire(&self) -> Result<SessionGuard> {
        let guard = self.inner.clone().lock_owned().await;
        if !guard.is_connected() || guard.is_monitoring() {
            return Err(SessionError::Canceled.into());
        }
        Ok(guard)
    }

    /// Dial the remote end.
    pub async fn connect(&self, timeout: Duration) -> Result<()> {
        self.inner.lock().await.connect(timeout).await
    }

    /// Close the socket; every queued waiter aborts with `Canceled`.
    pub async fn close(&self) {
        self.inner.lock().await.close();
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_connected()
    }

    pub async fn is_encrypted(&self) -> bool {
        self.inner.lock().await.is_encrypted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_core::error::Error;
    use acp_core::Command;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut session = Session::new("127.0.0.1", addr.port());
        let (accepted, _) = tokio::join!(listener.accept(), async {
            session.connect(Duration::from_secs(1)).await.unwrap();
        });
        (session, accepted.unwrap().0)
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn new_is_not_connected() {
            let session = Session::new("10.0.1.1", 5009);
            assert!(!session.is_connected());
            assert!(!session.is_encrypted());
        }

        #[tokio::test]
        async fn connect_fails_on_refused() {
            let mut session = Session::new("127.0.0.1", 1);
            let result = session.connect(Duration::from_secs(1)).await;
            assert!(matches!(
                result,
                Err(Error::Session(SessionError::ConnectFailed(_)))
            ));
        }

        #[tokio::test]
        async fn close_drops_state() {
            let (mut session, _peer) = loopback_pair().await;
            assert!(session.is_connected());
            session.close();
            assert!(!session.is_connected());

            let result = session.receive(1).await;
            assert!(matches!(
                result,
                Err(Error::Session(SessionError::NotConnected))
            ));
        }
    }

    mod receive {
        use super::*;

        #[tokio::test]
        async fn returns_exactly_n_bytes() {
            let (mut session, mut peer) = loopback_pair().await;
            peer.write_all(b"abcdefgh").await.unwrap();

            assert_eq!(session.receive(3).await.unwrap(), b"abc");
            assert_eq!(session.receive(5).await.unwrap(), b"defgh");
        }

        #[tokio::test]
        async fn reassembles_across_writes() {
            let (mut session, mut peer) = loopback_pair().await;

            let writer = tokio::spawn(async move {
                peer.write_all(b"abc").await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                peer.write_all(b"def").await.unwrap();
                peer
            });

            assert_eq!(session.receive(6).await.unwrap(), b"abcdef");
            writer.await.unwrap();
        }

        #[tokio::test]
        async fn expiry_aborts_with_timeout_but_keeps_session() {
            let (mut session, mut peer) = loopback_pair().await;

            let result = session
                .receive_timeout(4, Duration::from_millis(50))
                .await;
            assert!(matches!(result, Err(Error::Session(SessionError::Timeout))));
            assert!(session.is_connected());

            peer.write_all(b"late").await.unwrap();
            assert_eq!(session.receive(4).await.unwrap(), b"late");
        }

        #[tokio::test]
        async fn peer_close_cancels_reader() {
            let (mut session, peer) = loopback_pair().await;
            drop(peer);

            let result = session.receive(1).await;
            assert!(matches!(
                result,
                Err(Error::Session(SessionError::Canceled))
            ));
            assert!(!session.is_connected());
        }
    }

    mod messages {
        use super::*;

        #[tokio::test]
        async fn message_roundtrip_over_socket() {
            let (mut session, mut peer) = loopback_pair().await;

            let message = Message::get_prop(Some("testing"), 4, vec![0u8; 16]);
            peer.write_all(&message.compose()).await.unwrap();

            let received = session.receive_message().await.unwrap();
            assert_eq!(received, message);
        }

        #[tokio::test]
        async fn corrupt_header_drops_buffer() {
            let (mut session, mut peer) = loopback_pair().await;

            let mut frame = Message::features(0).compose();
            frame[20] ^= 0xff;
            frame.extend_from_slice(b"desync tail");
            peer.write_all(&frame).await.unwrap();

            let result = session.receive_message().await;
            assert!(matches!(result, Err(Error::Framing(_))));
            // Buffer dropped: the tail is gone, session still open.
            assert!(session.is_connected());
            assert!(session.buffer.is_empty());
        }

        #[tokio::test]
        async fn encrypted_roundtrip_both_roles() {
            let (mut client, peer) = loopback_pair().await;
            let mut server = Session::from_stream(peer);

            let key = [0x5au8; 20];
            client.enable_encryption(&key, [1u8; 16], [2u8; 16]).unwrap();
            server
                .enable_server_encryption(&key, [1u8; 16], [2u8; 16])
                .unwrap();

            let request = Message::get_prop(None, 4, vec![0u8; 16]);
            client.send(&request).await.unwrap();
            assert_eq!(server.receive_message().await.unwrap(), request);

            let response = Message::response(Command::GetProperty, 0, None);
            server.send(&response).await.unwrap();
            assert_eq!(client.receive_message().await.unwrap(), response);
        }

        #[tokio::test]
        async fn enable_encryption_is_install_once() {
            let (mut session, _peer) = loopback_pair().await;
            session
                .enable_encryption(&[1u8; 20], [0u8; 16], [0u8; 16])
                .unwrap();
            let again = session.enable_encryption(&[1u8; 20], [0u8; 16], [0u8; 16]);
            assert!(matches!(
                again,
                Err(Error::Session(SessionError::EncryptionAlreadyEnabled))
            ));
        }
    }

    mod queueing {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[tokio::test]
        async fn jobs_run_in_fifo_order() {
            let (session, _peer) = loopback_pair().await;
            let shared = SharedSession::new(session);
            let order = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for i in 0..4 {
                let shared = shared.clone();
                let order = order.clone();
                handles.push(tokio::spawn(async move {
                    shared
                        .queue(move |_session| async move {
                            let seen = order.fetch_add(1, Ordering::SeqCst);
                            assert_eq!(seen, i);
                            Ok(())
                        })
                        .await
                }));
                // Give each task its place in the lock queue.
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        #[tokio::test]
        async fn waiters_cancel_after_close() {
            let (session, _peer) = loopback_pair().await;
            let shared = SharedSession::new(session);

            shared.close().await;
            let result = shared.queue(|_s| async { Ok(()) }).await;
            assert!(matches!(
                result,
                Err(Error::Session(SessionError::Canceled))
            ));
        }

        #[tokio::test]
        async fn monitoring_session_refuses_exchanges() {
            let (mut session, _peer) = loopback_pair().await;
            session.set_monitoring();
            let shared = SharedSession::new(session);

            let result = shared.queue(|_s| async { Ok(()) }).await;
            assert!(matches!(
                result,
                Err(Error::Session(SessionError::Canceled))
            ));
        }
    }
}
