//! Symmetric encryption for opaque ids.
//!
//! A raw video id is never exposed directly in a client-facing URL. Instead
//! it is encrypted with a process-local key and the resulting ciphertext is
//! base64url-encoded into an opaque token. Decoding a token recovers the
//! raw id.

use aes::Aes128;
use cfb_mode::cipher::{AsyncStreamCipher, NewCipher};
use cfb_mode::Cfb;
use data_encoding::BASE64URL_NOPAD;
use ring::rand::{SecureRandom, SystemRandom};

use crate::util::{Error, Result};

const BLOCK_SIZE: usize = 16;
const RAW_ID_LEN: usize = 11;

type AesCfb = Cfb<Aes128>;

/// Holds the process-wide encryption key used to mint and open opaque ids.
///
/// The key is generated once at startup from a secure random source and is
/// never persisted: tokens minted by one process run are meaningless to
/// another.
pub struct Codec {
	key: [u8; BLOCK_SIZE],
}

impl Codec {
	/// Creates a codec with a freshly generated random key.
	pub fn new() -> Codec {
		let rng = SystemRandom::new();
		let mut key = [0u8; BLOCK_SIZE];
		rng.fill(&mut key).expect("failed to generate encryption key");
		Codec { key }
	}

	/// Encrypts a raw id into an opaque, URL-safe token.
	pub fn encrypt(&self, raw_id: &str) -> Result<String> {
		if raw_id.len() > BLOCK_SIZE {
			return Err(Error::from("id too long to encode"));
		}

		let mut block = [b' '; BLOCK_SIZE];
		block[..raw_id.len()].copy_from_slice(raw_id.as_bytes());

		let rng = SystemRandom::new();
		let mut iv = [0u8; BLOCK_SIZE];
		rng.fill(&mut iv).expect("failed to generate iv");

		let cipher = AesCfb::new(&self.key.into(), &iv.into());
		cipher.encrypt(&mut block);

		let mut out = Vec::with_capacity(BLOCK_SIZE * 2);
		out.extend_from_slice(&iv);
		out.extend_from_slice(&block);

		Ok(BASE64URL_NOPAD.encode(&out))
	}

	/// Decrypts an opaque token back into its raw id.
	pub fn decrypt(&self, token: &str) -> Result<String> {
		let data = BASE64URL_NOPAD
			.decode(token.as_bytes())
			.map_err(|e| Error::from(format!("invalid token: {}", e)))?;

		if data.len() != BLOCK_SIZE * 2 {
			return Err(Error::from("invalid token length"));
		}

		let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
		let mut block = [0u8; BLOCK_SIZE];
		block.copy_from_slice(ciphertext);

		let mut iv_arr = [0u8; BLOCK_SIZE];
		iv_arr.copy_from_slice(iv);

		let cipher = AesCfb::new(&self.key.into(), &iv_arr.into());
		cipher.decrypt(&mut block);

		let text = String::from_utf8_lossy(&block);
		let text = text.trim_end_matches(' ');
		if text.len() < RAW_ID_LEN {
			return Err(Error::from("decrypted id is malformed"));
		}
		Ok(text[..RAW_ID_LEN].to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_round_trip() {
		let codec = Codec::new();
		let token = codec.encrypt("dQw4w9WgXcQ").unwrap();
		let id = codec.decrypt(&token).unwrap();
		assert_eq!(id, "dQw4w9WgXcQ");
	}

	#[test]
	fn test_tokens_are_not_deterministic() {
		let codec = Codec::new();
		let a = codec.encrypt("dQw4w9WgXcQ").unwrap();
		let b = codec.encrypt("dQw4w9WgXcQ").unwrap();
		assert_ne!(a, b);
		assert_eq!(codec.decrypt(&a).unwrap(), codec.decrypt(&b).unwrap());
	}

	#[test]
	fn test_malformed_token_is_rejected() {
		let codec = Codec::new();
		assert!(codec.decrypt("not-a-valid-token").is_err());
	}
}
