use super::defaults::*;
use std::collections::HashMap;

/// Immutable capture of the process environment.
///
/// Empty values are dropped at capture time, so `get` returning `Some`
/// always means "set and non-empty".
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// `MYLOBSTER_GATEWAY_TOKEN`, if set.
    pub fn gateway_token(&self) -> Option<&str> {
        self.get(ENV_GATEWAY_TOKEN)
    }

    /// Dev mode is on only for the literal value `"true"`.
    pub fn dev_mode(&self) -> bool {
        self.get(ENV_DEV_MODE) == Some("true")
    }

    /// Storage credentials, present only when all four variables are set.
    pub fn storage_credentials(&self) -> Option<StorageCredentials> {
        Some(StorageCredentials {
            access_key_id: self.get(ENV_R2_ACCESS_KEY_ID)?.to_string(),
            secret_access_key: self.get(ENV_R2_SECRET_ACCESS_KEY)?.to_string(),
            account_id: self.get(ENV_CF_ACCOUNT_ID)?.to_string(),
            bucket_name: self.get(ENV_R2_BUCKET_NAME)?.to_string(),
        })
    }
}

/// Object-storage credentials for the bucket mount.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub account_id: String,
    pub bucket_name: String,
}

// Keys stay out of logs even through `{:?}`.
impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}
