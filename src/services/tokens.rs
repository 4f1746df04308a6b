//! Bearer tokens for authenticated players. A token is the player id
//! and an expiry timestamp, base64url-encoded and signed with the
//! server's HMAC-SHA256 key; verifying one yields the player id back.
//! This is the whole credential story: a connection presenting a valid
//! token is that player, anything else is anonymous.

use crate::utils::types::PlayerId;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64ct::{Base64UrlUnpadded, Encoding};
use log::{debug, error};
use ring::hmac::{self, HMAC_SHA256};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs::{write, File};
use tokio::io::AsyncReadExt;

/// Length of the stored server secret
const SECRET_LENGTH: usize = 64;

/// Errors that can occur while verifying a token
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is expired
    #[error("token is expired")]
    Expired,
    /// The token is invalid
    #[error("token is invalid")]
    Invalid,
}

/// Token issuing and verification service
pub struct Tokens {
    key: hmac::Key,
}

impl Tokens {
    /// How long issued tokens stay valid
    const EXPIRY_TIME: Duration = Duration::from_secs(60 * 60 * 24 * 30 /* 30 Days */);

    /// Obtains the service backed by the persistent server secret,
    /// generating and saving a fresh secret on first run.
    ///
    /// Only used by the actual app, tests create throwaway secrets
    /// through [Tokens::generate].
    pub async fn global() -> Self {
        let secret_path = Path::new("data/secret.bin");

        if secret_path.exists() {
            match Self::from_file(secret_path).await {
                Ok(value) => return value,
                Err(err) => {
                    error!("Failed to load existing secrets file: {}", err);
                }
            }
        }

        debug!("Generating server secret key...");
        let mut secret = [0u8; SECRET_LENGTH];
        OsRng.fill_bytes(&mut secret);
        if let Err(err) = write(secret_path, &secret).await {
            error!("Failed to save secrets file: {}", err);
        }

        Self::from_secret(&secret)
    }

    /// Creates the service over a throwaway secret
    pub fn generate() -> Self {
        let mut secret = [0u8; SECRET_LENGTH];
        OsRng.fill_bytes(&mut secret);
        Self::from_secret(&secret)
    }

    fn from_secret(secret: &[u8; SECRET_LENGTH]) -> Self {
        Self {
            key: hmac::Key::new(HMAC_SHA256, secret),
        }
    }

    async fn from_file(path: &Path) -> std::io::Result<Self> {
        let mut secret = [0u8; SECRET_LENGTH];
        let mut file = File::open(path).await?;
        file.read_exact(&mut secret).await?;
        Ok(Self::from_secret(&secret))
    }

    /// Issues a token bound to the provided player
    pub fn claim(&self, player_id: PlayerId) -> String {
        // Compute expiry timestamp
        let exp = SystemTime::now()
            .checked_add(Self::EXPIRY_TIME)
            .expect("Expiry timestamp too far into the future")
            .duration_since(UNIX_EPOCH)
            .expect("Clock went backwards")
            .as_secs();

        // Encode the player id and expiry into the token message
        let mut data = [0u8; 12];
        data[..4].copy_from_slice(&player_id.to_be_bytes());
        data[4..].copy_from_slice(&exp.to_be_bytes());
        let data = &data;

        let msg = Base64UrlUnpadded::encode_string(data);

        // Sign the raw message bytes
        let sig = hmac::sign(&self.key, data);
        let sig = Base64UrlUnpadded::encode_string(sig.as_ref());

        [msg, sig].join(".")
    }

    /// Verifies a token, producing the player id it was bound to
    pub fn verify(&self, token: &str) -> Result<PlayerId, VerifyError> {
        let (msg_raw, sig_raw) = token.split_once('.').ok_or(VerifyError::Invalid)?;

        // Decode the 12 byte token message
        let mut msg = [0u8; 12];
        Base64UrlUnpadded::decode(msg_raw, &mut msg).map_err(|_| VerifyError::Invalid)?;

        // Decode the 32 byte SHA256 signature
        let mut sig = [0u8; 32];
        Base64UrlUnpadded::decode(sig_raw, &mut sig).map_err(|_| VerifyError::Invalid)?;

        if hmac::verify(&self.key, &msg, &sig).is_err() {
            return Err(VerifyError::Invalid);
        }

        // Extract id and expiry back out of the message bytes
        let mut id = [0u8; 4];
        id.copy_from_slice(&msg[..4]);
        let id = PlayerId::from_be_bytes(id);

        let mut exp = [0u8; 8];
        exp.copy_from_slice(&msg[4..]);
        let exp = u64::from_be_bytes(exp);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Clock went backwards")
            .as_secs();
        if exp < now {
            return Err(VerifyError::Expired);
        }

        Ok(id)
    }
}
