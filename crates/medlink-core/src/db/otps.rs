//! One-time password operations.

use super::{Database, DbResult, UserField, UserKey};
use crate::models::OtpEntry;

impl Database {
    /// Append an OTP entry to the user with this email.
    pub fn push_otp(&self, email: &str, entry: &OtpEntry) -> DbResult<bool> {
        self.push_to_field(UserKey::Email(email), UserField::Otps, entry)
    }

    /// Mark the first unverified entry matching `code` as verified.
    ///
    /// Runs as one atomic primitive so concurrent issuance cannot interleave.
    /// Returns false when no entry matched or the user is missing.
    pub fn mark_otp_verified(&self, email: &str, code: &str) -> DbResult<bool> {
        let matched = self.update_field(UserKey::Email(email), UserField::Otps, |otps: &mut Vec<OtpEntry>| {
            match otps.iter_mut().find(|otp| otp.redeemable_with(code)) {
                Some(otp) => {
                    otp.verified = true;
                    true
                }
                None => false,
            }
        })?;
        Ok(matched.unwrap_or(false))
    }

    /// Most recently issued OTP for the email.
    pub fn latest_otp(&self, email: &str) -> DbResult<Option<OtpEntry>> {
        let otps: Option<Vec<OtpEntry>> = self.get_field(UserKey::Email(email), UserField::Otps)?;
        Ok(otps.and_then(|mut otps| otps.pop()))
    }
}
