//! Client side of the AUTHENTICATE exchange.

use acp_core::error::{AuthError, Result};
use acp_core::status;
use acp_crypto::srp::{SrpChallenge, SrpClient, SrpParams};
use acp_session::Session;
use acp_wire::Message;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::payload::{Confirmation, Hello, Params, Proof};
use crate::SRP_USERNAME;

/// Drives the five-step exchange on a session and installs encryption.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Authenticator {
    password: String,
}

impl Authenticator {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Run the exchange to completion.
    ///
    /// On success the session cipher is installed and every subsequent
    /// byte on the wire is encrypted. `IncorrectPassword` leaves the
    /// session open for another attempt; `ProofMismatch` means the server
    /// failed *our* check and the session should be abandoned.
    pub async fn run(&self, session: &mut Session) -> Result<()> {
        // Stage 1: announce the account.
        let hello = Hello {
            username: SRP_USERNAME.to_string(),
        };
        let body = crate::payload::encode(&hello.to_value())?;
        session.send(&Message::auth(0, body)).await?;

        // Stage 2: group parameters and challenge.
        let reply = session.receive_message().await?;
        if reply.error_code != 0 {
            return Err(auth_error(reply.error_code).into());
        }
        let body = reply.body.as_deref().ok_or(AuthError::MissingField("body"))?;
        let params = Params::from_value(&crate::payload::decode(body)?)?;

        if !SrpParams::default().matches_wire(&params.generator, &params.modulus) {
            return Err(AuthError::InvalidParameter("srp group").into());
        }

        // Stage 3: proof plus our half of the IV material.
        let srp = SrpClient::new(SRP_USERNAME.as_bytes(), self.password.as_bytes());
        let proof = srp.process_challenge(&SrpChallenge {
            salt: params.salt,
            server_public_key: params.public_key,
        })?;

        let mut client_iv = [0u8; 16];
        OsRng.fill_bytes(&mut client_iv);

        let stage3 = Proof {
            public_key: srp.public_key(),
            response: proof.client_proof.clone(),
            iv: client_iv,
        };
        let body = crate::payload::encode(&stage3.to_value())?;
        session.send(&Message::auth(0, body)).await?;

        // Stage 4: the server's proof and IV.
        let reply = session.receive_message().await?;
        if reply.error_code != 0 {
            return Err(auth_error(reply.error_code).into());
        }
        let body = reply.body.as_deref().ok_or(AuthError::MissingField("body"))?;
        let confirmation = Confirmation::from_value(&crate::payload::decode(body)?)?;

        if !srp.verify_server_proof(&confirmation.response, &proof.expected_server_proof) {
            return Err(AuthError::ProofMismatch.into());
        }

        tracing::debug!("authentication complete");
        session.enable_encryption(&proof.shared_secret, client_iv, confirmation.iv)?;
        Ok(())
    }
}

fn auth_error(code: i32) -> AuthError {
    if code == status::INCORRECT_PASSWORD {
        AuthError::IncorrectPassword
    } else {
        AuthError::InvalidState(format!("server error {code}"))
    }
}
