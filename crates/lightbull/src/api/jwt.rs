// Copyright (c) 2024 Damir Jelić
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::persistence::{Persistence, PersistenceError};

const ISSUER: &str = "lightbull";
const VALIDITY: Duration = Duration::from_secs(60 * 60);
const KEY_LENGTH: usize = 64;
const KEY_CONFIG: &str = "jwt";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to load or store the secret key for JWT: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("the stored secret key for JWT is malformed")]
    MalformedKey,
    #[error("failed to sign the JWT: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// The stored key material: `{key: base64, generated: unix seconds}`.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    key: String,
    generated: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    exp: u64,
}

/// Issues and validates the JSON Web Tokens that gate the mutating API.
///
/// The HMAC key is 64 random bytes, generated on first boot and persisted as
/// a secret configuration blob so tokens survive restarts.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtManager {
    /// Load the key material, generating and persisting it when missing.
    pub fn new(persistence: &Persistence) -> Result<Self, JwtError> {
        let key = if persistence.has_config(KEY_CONFIG) {
            let file: KeyFile = persistence.load_config(KEY_CONFIG)?;

            BASE64
                .decode(file.key)
                .map_err(|_| JwtError::MalformedKey)?
        } else {
            let mut key = vec![0u8; KEY_LENGTH];
            rand::thread_rng().fill_bytes(&mut key);

            let file = KeyFile {
                key: BASE64.encode(&key),
                generated: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
            };
            persistence.save_config(KEY_CONFIG, &file, true)?;

            key
        };

        Ok(Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
        })
    }

    /// Issue a new token, valid for one hour.
    pub fn issue(&self) -> Result<String, JwtError> {
        let claims = Claims {
            iss: ISSUER.to_owned(),
            exp: (SystemTime::now() + VALIDITY)
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &self.encoding,
        )?)
    }

    /// Whether the given token was issued by us and has not expired.
    pub fn check(&self, token: &str) -> bool {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[ISSUER]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).is_ok()
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> (tempfile::TempDir, Persistence) {
        let dir = tempfile::tempdir().expect("We should be able to create a temporary directory");
        let persistence = Persistence::new(dir.path())
            .expect("We should be able to create the persistence store");

        (dir, persistence)
    }

    #[test]
    fn issued_tokens_validate() {
        let (_dir, persistence) = store();
        let manager =
            JwtManager::new(&persistence).expect("We should be able to set up the JWT manager");

        let token = manager.issue().expect("We should be able to issue a token");
        assert!(manager.check(&token), "A freshly issued token should be valid");
        assert!(!manager.check("not-a-token"));
        assert!(!manager.check(""));
    }

    #[test]
    fn the_key_survives_restarts() {
        let (_dir, persistence) = store();

        let manager =
            JwtManager::new(&persistence).expect("We should be able to set up the JWT manager");
        let token = manager.issue().expect("We should be able to issue a token");

        assert!(persistence.has_config("jwt"));

        let reloaded = JwtManager::new(&persistence)
            .expect("We should be able to reload the JWT manager from disk");
        assert!(
            reloaded.check(&token),
            "A token should stay valid across a restart"
        );
    }

    #[test]
    fn tokens_from_a_different_key_are_rejected() {
        let (_dir, first_store) = store();
        let (_other_dir, second_store) = store();

        let first = JwtManager::new(&first_store).unwrap();
        let second = JwtManager::new(&second_store).unwrap();

        let token = first.issue().unwrap();
        assert!(
            !second.check(&token),
            "A token signed with a foreign key should be rejected"
        );
    }
}
