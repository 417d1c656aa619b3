//! Credential persistence: the token file is read on every access-token
//! request and overwritten wholesale on every exchange or refresh.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// The access/refresh token bundle plus its computed expiry.
///
/// `expires_at` is always derived as issue-time + `expires_in` at the moment
/// the tokens are obtained, never recomputed from a loaded file. Any extra
/// provider fields (token type, id token, ...) round-trip through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenSet {
    /// Builds a token set from a token-endpoint response, stamping the
    /// expiry relative to now.
    pub fn issued_now(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        extra: Map<String, Value>,
    ) -> Self {
        let expires_at = Utc::now() + Duration::seconds(expires_in.unwrap_or(0));
        Self {
            access_token,
            refresh_token,
            expires_in,
            expires_at,
            extra,
        }
    }

    /// True while `expires_at` is strictly in the future.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// File-backed storage for a single [`TokenSet`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored tokens, or `None` when no token file exists yet.
    pub fn load(&self) -> Result<Option<TokenSet>, SyncError> {
        if !self.path.exists() {
            debug!("no token file at {}", self.path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let tokens: TokenSet = serde_json::from_str(&content)?;
        debug!("loaded tokens from {}", self.path.display());
        Ok(Some(tokens))
    }

    /// Replaces the token file with the given set. No partial merge.
    pub fn save(&self, tokens: &TokenSet) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tokens)?;
        fs::write(&self.path, content)?;
        debug!("saved tokens to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path() -> PathBuf {
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let mut path = env::temp_dir();
        path.push(format!(
            "contasync-test-tokens-{}-{}.json",
            std::process::id(),
            counter
        ));
        path
    }

    #[test]
    fn issued_now_stamps_future_expiry() {
        let tokens = TokenSet::issued_now("tok".into(), None, Some(3600), Map::new());
        assert!(tokens.is_valid());
        assert!(tokens.expires_at > Utc::now() + Duration::seconds(3500));
    }

    #[test]
    fn zero_expiry_is_immediately_invalid() {
        let tokens = TokenSet::issued_now("tok".into(), None, None, Map::new());
        assert!(!tokens.is_valid());
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path();
        let store = TokenStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let mut extra = Map::new();
        extra.insert("token_type".to_string(), Value::String("Bearer".into()));
        let tokens = TokenSet::issued_now(
            "access".into(),
            Some("refresh".into()),
            Some(3600),
            extra,
        );
        store.save(&tokens).unwrap();

        let loaded = store.load().unwrap().expect("tokens present");
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.expires_at, tokens.expires_at);
        assert_eq!(loaded.extra.get("token_type"), Some(&Value::String("Bearer".into())));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn save_overwrites_wholesale() {
        let path = temp_path();
        let store = TokenStore::new(&path);

        let first = TokenSet::issued_now(
            "old".into(),
            Some("old-refresh".into()),
            Some(3600),
            Map::new(),
        );
        store.save(&first).unwrap();

        // The replacement carries no refresh token; the old one must be gone.
        let second = TokenSet::issued_now("new".into(), None, Some(3600), Map::new());
        store.save(&second).unwrap();

        let loaded = store.load().unwrap().expect("tokens present");
        assert_eq!(loaded.access_token, "new");
        assert!(loaded.refresh_token.is_none());

        let _ = fs::remove_file(&path);
    }
}
