//! Storage account credentials.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// Storage account name and decoded shared key.
#[derive(Clone)]
pub struct AccountCredentials {
    account_name: String,
    account_key: Vec<u8>,
}

impl AccountCredentials {
    /// Creates credentials from an account name and a base64 account key.
    ///
    /// Fails with [`ErrorKind::Config`](crate::ErrorKind::Config) when either
    /// value is empty or the key is not valid base64.
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self> {
        let account_name = account_name.into().trim().to_owned();
        if account_name.is_empty() {
            return Err(Error::config("storage account name is empty"));
        }

        let account_key = account_key.trim();
        if account_key.is_empty() {
            return Err(Error::config("storage account key is empty"));
        }

        let account_key = STANDARD.decode(account_key).map_err(|err| {
            Error::config("storage account key is not valid base64").with_source(err)
        })?;

        Ok(Self {
            account_name,
            account_key,
        })
    }

    /// Account name.
    #[inline]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub(crate) fn account_key(&self) -> &[u8] {
        &self.account_key
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn decodes_base64_key() {
        let credentials = AccountCredentials::new("acct", "c2VjcmV0").unwrap();
        assert_eq!(credentials.account_name(), "acct");
        assert_eq!(credentials.account_key(), b"secret");
    }

    #[test]
    fn rejects_invalid_key() {
        let err = AccountCredentials::new("acct", "not base64!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn rejects_empty_values() {
        assert!(AccountCredentials::new("", "c2VjcmV0").is_err());
        assert!(AccountCredentials::new("acct", "  ").is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let credentials = AccountCredentials::new("acct", "c2VjcmV0").unwrap();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("secret"));
    }
}
