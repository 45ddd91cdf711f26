//! AUTHENTICATE payloads: plist dictionaries for each exchange stage.

use acp_core::error::AuthError;
use acp_wire::cflbinary::{self, Value};

fn data_field(dict: &Value, key: &'static str) -> Result<Vec<u8>, AuthError> {
    dict.get(key)
        .and_then(Value::as_data)
        .map(<[u8]>::to_vec)
        .ok_or(AuthError::MissingField(key))
}

fn iv_field(dict: &Value, key: &'static str) -> Result<[u8; 16], AuthError> {
    data_field(dict, key)?
        .try_into()
        .map_err(|_| AuthError::InvalidParameter("iv"))
}

/// Stage 1, client to server: `{state: 1, username}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    pub username: String,
}

impl Hello {
    pub fn to_value(&self) -> Value {
        Value::dict([
            ("state", Value::Integer(1)),
            ("username", Value::from(self.username.as_str())),
        ])
    }

    pub fn from_value(dict: &Value) -> Result<Self, AuthError> {
        let username = dict
            .get("username")
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingField("username"))?
            .to_string();
        Ok(Self { username })
    }
}

/// Stage 2, server to client: the SRP group and challenge.
///
/// `generator` and `modulus` are big-endian integer bytes; peers may send
/// them padded or trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub salt: [u8; 16],
    pub generator: Vec<u8>,
    pub public_key: Vec<u8>,
    pub modulus: Vec<u8>,
}

impl Params {
    pub fn to_value(&self) -> Value {
        Value::dict([
            ("salt", Value::Data(self.salt.to_vec())),
            ("generator", Value::Data(self.generator.clone())),
            ("publicKey", Value::Data(self.public_key.clone())),
            ("modulus", Value::Data(self.modulus.clone())),
        ])
    }

    pub fn from_value(dict: &Value) -> Result<Self, AuthError> {
        Ok(Self {
            salt: data_field(dict, "salt")?
                .try_into()
                .map_err(|_| AuthError::InvalidParameter("salt"))?,
            generator: data_field(dict, "generator")?,
            public_key: data_field(dict, "publicKey")?,
            modulus: data_field(dict, "modulus")?,
        })
    }
}

/// Stage 3, client to server: `{state: 3, publicKey, response, iv}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Proof {
    pub public_key: Vec<u8>,
    pub response: Vec<u8>,
    pub iv: [u8; 16],
}

impl Proof {
    pub fn to_value(&self) -> Value {
        Value::dict([
            ("state", Value::Integer(3)),
            ("publicKey", Value::Data(self.public_key.clone())),
            ("response", Value::Data(self.response.clone())),
            ("iv", Value::Data(self.iv.to_vec())),
        ])
    }

    pub fn from_value(dict: &Value) -> Result<Self, AuthError> {
        Ok(Self {
            public_key: data_field(dict, "publicKey")?,
            response: data_field(dict, "response")?,
            iv: iv_field(dict, "iv")?,
        })
    }
}

/// Stage 4, server to client: `{response, iv}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub response: Vec<u8>,
    pub iv: [u8; 16],
}

impl Confirmation {
    pub fn to_value(&self) -> Value {
        Value::dict([
            ("response", Value::Data(self.response.clone())),
            ("iv", Value::Data(self.iv.to_vec())),
        ])
    }

    pub fn from_value(dict: &Value) -> Result<Self, AuthError> {
        Ok(Self {
            response: data_field(dict, "response")?,
            iv: iv_field(dict, "iv")?,
        })
    }
}

/// The state counter a client payload declares, if any.
pub fn state_of(dict: &Value) -> Option<u64> {
    dict.get("state").and_then(Value::as_integer)
}

/// Serialize a stage value into a message body.
pub fn encode(value: &Value) -> Result<Vec<u8>, acp_core::error::PayloadError> {
    cflbinary::compose(value)
}

/// Parse a message body into a stage dictionary.
pub fn decode(body: &[u8]) -> Result<Value, acp_core::error::PayloadError> {
    cflbinary::parse(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrip() {
        let hello = Hello {
            username: "admin".into(),
        };
        let value = hello.to_value();
        assert_eq!(state_of(&value), Some(1));
        assert_eq!(Hello::from_value(&value).unwrap(), hello);
    }

    #[test]
    fn params_roundtrip_through_wire_bytes() {
        let params = Params {
            salt: [7u8; 16],
            generator: vec![2],
            public_key: vec![0xaa; 192],
            modulus: vec![0x9d; 192],
        };
        let body = encode(&params.to_value()).unwrap();
        let parsed = Params::from_value(&decode(&body).unwrap()).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn proof_declares_state_three() {
        let proof = Proof {
            public_key: vec![1, 2, 3],
            response: vec![4; 20],
            iv: [9u8; 16],
        };
        let value = proof.to_value();
        assert_eq!(state_of(&value), Some(3));
        assert_eq!(Proof::from_value(&value).unwrap(), proof);
    }

    #[test]
    fn confirmation_roundtrip() {
        let confirmation = Confirmation {
            response: vec![4; 20],
            iv: [3u8; 16],
        };
        let value = confirmation.to_value();
        assert_eq!(state_of(&value), None);
        assert_eq!(Confirmation::from_value(&value).unwrap(), confirmation);
    }

    #[test]
    fn missing_fields_are_reported() {
        let empty = Value::dict([("state", Value::Integer(3))]);
        assert!(matches!(
            Proof::from_value(&empty),
            Err(AuthError::MissingField("publicKey"))
        ));
    }

    #[test]
    fn short_iv_is_rejected() {
        let value = Value::dict([
            ("response", Value::Data(vec![1])),
            ("iv", Value::Data(vec![0u8; 8])),
        ]);
        assert!(matches!(
            Confirmation::from_value(&value),
            Err(AuthError::InvalidParameter("iv"))
        ));
    }
}
