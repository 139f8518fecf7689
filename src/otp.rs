use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

const OTP_EXPIRY_MINUTES: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("No OTP found. Please request a new one.")]
    NotFound,
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Invalid OTP. Please try again.")]
    Mismatch,
}

#[derive(Debug)]
struct OtpRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// In-memory single-use code store, keyed by lower-cased email. One active
/// code per email; issuing again replaces the previous one. The map lives
/// behind a single mutex so a verify can never race a concurrent re-issue
/// for the same key.
#[derive(Clone)]
pub struct OtpStore {
    inner: Arc<Mutex<HashMap<String, OtpRecord>>>,
    ttl: Duration,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(OTP_EXPIRY_MINUTES))
    }
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Generate and store a 6-digit code for an email, returning it for
    /// out-of-band delivery. Leading zeros are preserved.
    pub fn issue(&self, email: &str) -> String {
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        let record = OtpRecord {
            code: code.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        let mut map = self.inner.lock().expect("otp store poisoned");
        map.insert(email.to_lowercase(), record);
        code
    }

    /// Check a code. Success consumes it; an expired record is also removed
    /// so the caller must request a new one. A mismatch keeps the record so
    /// the user may retry within the expiry window.
    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let key = email.to_lowercase();
        let mut map = self.inner.lock().expect("otp store poisoned");
        let record = map.get(&key).ok_or(OtpError::NotFound)?;
        if Utc::now() > record.expires_at {
            map.remove(&key);
            return Err(OtpError::Expired);
        }
        if record.code != code {
            return Err(OtpError::Mismatch);
        }
        map.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_six_digits() {
        let store = OtpStore::new();
        for _ in 0..50 {
            let code = store.issue("a@example.com");
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verify_consumes_code() {
        let store = OtpStore::new();
        let code = store.issue("user@example.com");
        assert_eq!(store.verify("user@example.com", &code), Ok(()));
        // Single use: the same code no longer exists.
        assert_eq!(
            store.verify("user@example.com", &code),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn reissue_invalidates_previous_code() {
        let store = OtpStore::new();
        let first = store.issue("user@example.com");
        let second = store.issue("user@example.com");
        if first != second {
            assert_eq!(
                store.verify("user@example.com", &first),
                Err(OtpError::Mismatch)
            );
        }
        assert_eq!(store.verify("user@example.com", &second), Ok(()));
    }

    #[test]
    fn mismatch_keeps_record_for_retry() {
        let store = OtpStore::new();
        let code = store.issue("user@example.com");
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert_eq!(
            store.verify("user@example.com", wrong),
            Err(OtpError::Mismatch)
        );
        assert_eq!(store.verify("user@example.com", &code), Ok(()));
    }

    #[test]
    fn expired_record_is_removed() {
        let store = OtpStore::with_ttl(Duration::milliseconds(-1));
        let code = store.issue("user@example.com");
        assert_eq!(
            store.verify("user@example.com", &code),
            Err(OtpError::Expired)
        );
        // No trace of the code remains after expiry.
        assert_eq!(
            store.verify("user@example.com", &code),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn email_key_is_case_insensitive() {
        let store = OtpStore::new();
        let code = store.issue("User@Example.com");
        assert_eq!(store.verify("user@example.COM", &code), Ok(()));
    }

    #[test]
    fn unknown_email_is_not_found() {
        let store = OtpStore::new();
        assert_eq!(
            store.verify("nobody@example.com", "123456"),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn keys_are_independent() {
        let store = OtpStore::new();
        let a = store.issue("a@example.com");
        let b = store.issue("b@example.com");
        assert_eq!(store.verify("a@example.com", &a), Ok(()));
        assert_eq!(store.verify("b@example.com", &b), Ok(()));
    }
}
