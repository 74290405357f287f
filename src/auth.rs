//! Session context handed to every backend call.
//!
//! The host environment (the messenger client that opens the mini-app)
//! supplies an opaque, signed `init data` blob. The backend verifies the
//! signature; this client only forwards it. The numeric user id is either
//! given explicitly or read from the `user` JSON field embedded in the blob.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the signed session blob.
pub const INIT_DATA_ENV: &str = "SHOP_TRANSFER_INIT_DATA";

/// Environment variable holding the numeric user id.
pub const USER_ID_ENV: &str = "SHOP_TRANSFER_USER_ID";

/// Errors raised while building an [`AuthContext`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthContextError {
    /// No session blob was supplied.
    #[error("no session data: open this from the messenger client or set {INIT_DATA_ENV}")]
    MissingInitData,

    /// The blob carries no user and none was supplied.
    #[error("no user id: pass --user-id or set {USER_ID_ENV}")]
    MissingUserId,

    /// The embedded `user` field is not valid JSON with a numeric `id`.
    #[error("session data has an unreadable user field: {0}")]
    InvalidUser(String),
}

/// Signed session blob plus the user it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    init_data: String,
    user_id: u64,
}

#[derive(Deserialize)]
struct EmbeddedUser {
    id: u64,
}

impl AuthContext {
    /// Builds a context from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`AuthContextError::MissingInitData`] for an empty blob.
    pub fn new(init_data: impl Into<String>, user_id: u64) -> Result<Self, AuthContextError> {
        let init_data = init_data.into();
        if init_data.trim().is_empty() {
            return Err(AuthContextError::MissingInitData);
        }
        Ok(Self { init_data, user_id })
    }

    /// Builds a context from the raw blob, preferring an explicit user id.
    ///
    /// # Errors
    ///
    /// Fails when the blob is empty, or when no user id is given and the
    /// blob has no readable `user` field.
    pub fn from_init_data(
        init_data: &str,
        user_id: Option<u64>,
    ) -> Result<Self, AuthContextError> {
        if init_data.trim().is_empty() {
            return Err(AuthContextError::MissingInitData);
        }
        let user_id = match user_id {
            Some(id) => id,
            None => user_id_from_init_data(init_data)?.ok_or(AuthContextError::MissingUserId)?,
        };
        Self::new(init_data, user_id)
    }

    /// The opaque signed blob, forwarded verbatim.
    #[must_use]
    pub fn init_data(&self) -> &str {
        &self.init_data
    }

    /// The numeric user id.
    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("init_data", &format_args!("<{} bytes>", self.init_data.len()))
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Reads the user id from the URL-encoded `user` field of the blob.
///
/// Returns `Ok(None)` when the blob has no `user` field.
///
/// # Errors
///
/// Returns [`AuthContextError::InvalidUser`] when the field is present but
/// not JSON with a numeric `id`.
pub fn user_id_from_init_data(init_data: &str) -> Result<Option<u64>, AuthContextError> {
    let Some((_, user)) = url::form_urlencoded::parse(init_data.as_bytes())
        .find(|(key, _)| key == "user")
    else {
        return Ok(None);
    };
    let parsed: EmbeddedUser = serde_json::from_str(&user)
        .map_err(|e| AuthContextError::InvalidUser(e.to_string()))?;
    Ok(Some(parsed.id))
}
