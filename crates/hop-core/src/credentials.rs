//! Per-attempt gateway credentials.
//!
//! Both values live only in memory and are wiped when dropped. Neither
//! `Debug` nor any accessor formats them into text that could reach a log.

use std::fmt;

use zeroize::Zeroizing;

/// The gateway password and one-time code for a single connection attempt.
pub struct SessionCredentials {
    secret: Zeroizing<Vec<u8>>,
    otp: Zeroizing<String>,
}

impl SessionCredentials {
    pub fn new(secret: impl Into<Vec<u8>>, otp: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            otp: Zeroizing::new(otp.into()),
        }
    }

    /// Raw secret bytes, for injection into the subordinate's input only.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// The one-time code.
    pub fn otp(&self) -> &str {
        &self.otp
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("secret", &"<redacted>")
            .field("otp", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let creds = SessionCredentials::new("hunter2", "123456");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("123456"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn accessors_return_values() {
        let creds = SessionCredentials::new(b"s3cret".to_vec(), "000111");
        assert_eq!(creds.secret(), b"s3cret");
        assert_eq!(creds.otp(), "000111");
    }
}
