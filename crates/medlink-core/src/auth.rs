//! Resolving caller identity from opaque session tokens.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CareResult;

/// Verifies a bearer token and yields the user id it belongs to.
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> Option<String>;
}

/// In-process session store issuing random v4 UUID tokens.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `user_id` and return its token.
    pub fn issue(&self, user_id: &str) -> CareResult<String> {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.lock()?.insert(token.clone(), user_id.to_string());
        Ok(token)
    }

    /// End a session. Returns false if the token was unknown.
    pub fn revoke(&self, token: &str) -> CareResult<bool> {
        Ok(self.sessions.lock()?.remove(token).is_some())
    }
}

impl Authenticator for SessionRegistry {
    fn verify(&self, token: &str) -> Option<String> {
        self.sessions.lock().ok()?.get(token).cloned()
    }
}
