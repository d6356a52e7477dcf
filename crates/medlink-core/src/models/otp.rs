//! One-time password entries for password reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 6-digit reset code. Entries are never pruned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpEntry {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
}

impl OtpEntry {
    pub fn new(code: String) -> Self {
        Self {
            code,
            created_at: Utc::now(),
            verified: false,
        }
    }

    /// Generate a fresh random 6-digit code.
    pub fn generate() -> Self {
        use rand::Rng;
        let code = rand::thread_rng().gen_range(100_000..1_000_000u32);
        Self::new(code.to_string())
    }

    /// Whether this entry can still be redeemed with `code`.
    pub fn redeemable_with(&self, code: &str) -> bool {
        !self.verified && self.code == code
    }
}
