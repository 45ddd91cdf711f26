//! Server side of the AUTHENTICATE exchange.

use acp_core::error::{AuthError, Result};
use acp_core::{status, Command};
use acp_crypto::srp::SrpServer;
use acp_wire::Message;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::payload::{self, Confirmation, Hello, Params, Proof};
use crate::SRP_USERNAME;

/// What the connection handler should do with one AUTHENTICATE message.
pub enum AuthOutcome {
    /// Send the reply; the exchange continues.
    Challenge(Message),
    /// Send the reply; the client may retry from stage 1 on this socket.
    Failure(Message),
    /// Send the reply, then install server-side encryption with this
    /// material.
    Success {
        reply: Message,
        session_key: Vec<u8>,
        client_iv: [u8; 16],
        server_iv: [u8; 16],
    },
}

/// Per-connection verifier for the station's single `admin` account.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AuthVerifier {
    password: String,
    salt: [u8; 16],
    #[zeroize(skip)]
    round: Option<SrpServer>,
}

impl AuthVerifier {
    /// Create a verifier with a fresh random salt.
    ///
    /// The salt belongs to the user record; a station whose password was
    /// provisioned elsewhere would carry the stored salt instead.
    pub fn new(password: impl Into<String>) -> Self {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        Self {
            password: password.into(),
            salt,
            round: None,
        }
    }

    /// Process one AUTHENTICATE message.
    pub fn handle(&mut self, message: &Message) -> Result<AuthOutcome> {
        let body = message
            .body
            .as_deref()
            .ok_or(AuthError::MissingField("body"))?;
        let dict = payload::decode(body)?;

        match payload::state_of(&dict) {
            Some(1) => self.handle_hello(&dict),
            Some(3) => self.handle_proof(&dict),
            other => Err(AuthError::InvalidState(format!(
                "unexpected auth state {other:?}"
            ))
            .into()),
        }
    }

    fn handle_hello(&mut self, dict: &acp_wire::Value) -> Result<AuthOutcome> {
        let hello = Hello::from_value(dict)?;
        if hello.username != SRP_USERNAME {
            tracing::warn!(username = %hello.username, "unknown account in auth hello");
        }

        let round = SrpServer::new(SRP_USERNAME.as_bytes(), self.password.as_bytes(), self.salt);
        let challenge = round.challenge();
        let params = Params {
            salt: challenge.salt,
            generator: round.params().generator_bytes(),
            public_key: challenge.server_public_key,
            modulus: round.params().modulus_bytes(),
        };
        let body = payload::encode(&params.to_value())?;
        self.round = Some(round);

        Ok(AuthOutcome::Challenge(Message::response(
            Command::Authenticate,
            0,
            Some(body),
        )))
    }

    fn handle_proof(&mut self, dict: &acp_wire::Value) -> Result<AuthOutcome> {
        let proof = Proof::from_value(dict)?;
        let round = self
            .round
            .take()
            .ok_or_else(|| AuthError::InvalidState("proof before hello".into()))?;

        match round.verify(&proof.public_key, &proof.response) {
            Ok(verified) => {
                let mut server_iv = [0u8; 16];
                OsRng.fill_bytes(&mut server_iv);

                let confirmation = Confirmation {
                    response: verified.server_proof,
                    iv: server_iv,
                };
                let body = payload::encode(&confirmation.to_value())?;

                Ok(AuthOutcome::Success {
                    reply: Message::response(Command::Authenticate, 0, Some(body)),
                    session_key: verified.shared_secret,
                    client_iv: proof.iv,
                    server_iv,
                })
            }
            Err(AuthError::ProofMismatch) => {
                tracing::info!("client proof mismatch, allowing retry");
                Ok(AuthOutcome::Failure(Message::response(
                    Command::Authenticate,
                    status::INCORRECT_PASSWORD,
                    None,
                )))
            }
            Err(other) => Err(other.into()),
        }
    }
}
