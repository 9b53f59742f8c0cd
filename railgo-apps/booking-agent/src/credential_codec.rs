//!  Railgo Booking Agent
//!
//!  Copyright (C) 2026  Railgo Contributors
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Credential Codec
//!
//! Side-effect free transform from a plaintext credential to the wire form
//! the login endpoint expects: AES-128-CBC under a per-session key obtained
//! from the pre-login handshake, PKCS#7 padding, then base64 applied twice
//! (the backend decodes the outer layer before the inner one).
//!
//! The handshake call itself is performed by the session client; this module
//! only validates the negotiated key and runs the transform.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::RailError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// The cipher key is its own IV source: first 16 bytes of the key text.
const KEY_LEN: usize = 16;

/// Encrypt a plaintext credential with the session key from the login
/// handshake. Deterministic for identical (credential, key) pairs.
pub fn encrypt_credential(credential: &str, session_key: &str) -> Result<String, RailError> {
    let key = session_key.as_bytes();
    if key.len() != KEY_LEN {
        return Err(RailError::Codec(format!(
            "handshake key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    let iv = &key[..KEY_LEN];

    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|e| RailError::Codec(format!("cipher setup failed: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(credential.as_bytes());

    let inner = STANDARD.encode(&ciphertext);
    Ok(STANDARD.encode(inner.as_bytes()))
}
