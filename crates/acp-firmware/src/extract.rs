//! Extract pipeline: locate the embedded gzip stream and inflate it.

use std::io::Write;

use acp_core::error::FirmwareError;
use flate2::write::GzDecoder;

/// Deflate-with-gzip-wrapper signature: 0x1f 0x8b, method 8.
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Push-style extractor over a decrypted firmware body.
///
/// Scans for the gzip signature (across feed boundaries, with a 3-byte
/// lookbehind), then inflates everything from there on. Image bytes after
/// the gzip member are discarded.
pub struct FirmwareExtractor {
    state: State,
}

enum State {
    Searching { lookbehind: Vec<u8> },
    Inflating { decoder: GzDecoder<Vec<u8>>, produced: u64 },
    Done,
}

impl FirmwareExtractor {
    pub fn new() -> Self {
        Self {
            state: State::Searching {
                lookbehind: Vec::new(),
            },
        }
    }

    /// Feed decrypted body bytes; returns any newly inflated bytes.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, FirmwareError> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Searching { mut lookbehind } => {
                lookbehind.extend_from_slice(data);
                match find_magic(&lookbehind) {
                    Some(at) => {
                        let tail = lookbehind.split_off(at);
                        self.state = State::Inflating {
                            decoder: GzDecoder::new(Vec::new()),
                            produced: 0,
                        };
                        self.feed(&tail)
                    }
                    None => {
                        let keep_from = lookbehind.len().saturating_sub(GZIP_MAGIC.len() - 1);
                        lookbehind.drain(..keep_from);
                        self.state = State::Searching { lookbehind };
                        Ok(Vec::new())
                    }
                }
            }
            state @ State::Inflating { .. } => {
                self.state = state;
                self.feed(data)
            }
            State::Done => Ok(Vec::new()),
        }
    }

    fn feed(&mut self, data: &[u8]) -> Result<Vec<u8>, FirmwareError> {
        let State::Inflating {
            mut decoder,
            produced,
        } = std::mem::replace(&mut self.state, State::Done)
        else {
            return Ok(Vec::new());
        };

        match decoder.write_all(data) {
            Ok(()) => {
                let out = std::mem::take(decoder.get_mut());
                self.state = State::Inflating {
                    decoder,
                    produced: produced + out.len() as u64,
                };
                Ok(out)
            }
            // The member ended before the body did: flush what is left and
            // discard the rest of the image.
            Err(e) if produced > 0 || !decoder.get_ref().is_empty() => {
                tracing::debug!(error = %e, "inflate stopped at end of gzip member");
                let _ = decoder.try_finish();
                Ok(std::mem::take(decoder.get_mut()))
            }
            Err(e) => Err(FirmwareError::Inflate(e.to_string())),
        }
    }

    /// Flush the inflater and return the final bytes.
    pub fn finish(self) -> Result<Vec<u8>, FirmwareError> {
        match self.state {
            State::Searching { .. } => Err(FirmwareError::NoCompressedPayload),
            State::Inflating { decoder, .. } => decoder
                .finish()
                .map_err(|e| FirmwareError::Inflate(e.to_string())),
            State::Done => Ok(Vec::new()),
        }
    }
}

impl Default for FirmwareExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot extraction from a complete decrypted body.
pub fn extract(body: &[u8]) -> Result<Vec<u8>, FirmwareError> {
    let mut extractor = FirmwareExtractor::new();
    let mut out = extractor.update(body)?;
    out.extend_from_slice(&extractor.finish()?);
    Ok(out)
}

fn find_magic(window: &[u8]) -> Option<usize> {
    window
        .windows(GZIP_MAGIC.len())
        .position(|w| w == GZIP_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn extracts_payload_at_offset() {
        let plain = payload(4096);
        let mut body = b"bootloader stub \x1f\x8b\x00 not quite".to_vec();
        body.extend_from_slice(&gzip(&plain));

        assert_eq!(extract(&body).unwrap(), plain);
    }

    #[test]
    fn extracts_payload_at_offset_zero() {
        let plain = payload(128);
        let body = gzip(&plain);
        assert_eq!(extract(&body).unwrap(), plain);
    }

    #[test]
    fn streaming_finds_signature_across_boundaries() {
        let plain = payload(8192);
        let mut body = vec![0xeeu8; 1001]; // odd prefix so the magic straddles feeds
        body.extend_from_slice(&gzip(&plain));

        for feed in [1usize, 2, 3, 7, 512] {
            let mut extractor = FirmwareExtractor::new();
            let mut out = Vec::new();
            for piece in body.chunks(feed) {
                out.extend_from_slice(&extractor.update(piece).unwrap());
            }
            out.extend_from_slice(&extractor.finish().unwrap());
            assert_eq!(out, plain, "feed size {feed}");
        }
    }

    #[test]
    fn missing_signature_is_reported() {
        let body = vec![0u8; 256];
        assert!(matches!(
            extract(&body),
            Err(FirmwareError::NoCompressedPayload)
        ));
    }

    #[test]
    fn corrupt_stream_does_not_yield_the_payload() {
        let mut body = gzip(&payload(64));
        // Damage the deflate data right after the 10-byte gzip header.
        body[12] ^= 0xff;
        let result = extract(&body);
        assert!(result.is_err() || result.unwrap() != payload(64));
    }

    #[test]
    fn roundtrip_with_decrypt_pipeline() {
        use crate::decrypt::{decrypt, encrypt_image};

        let plain = payload(40000);
        let mut body = b"partition table".to_vec();
        body.extend_from_slice(&gzip(&plain));

        let image = encrypt_image(107, 1, 0x3c, &body, true).unwrap();
        let decrypted = decrypt(&image).unwrap();
        assert_eq!(extract(&decrypted).unwrap(), plain);
    }
}
