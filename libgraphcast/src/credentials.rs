//! Access credentials for the Graph-style platforms
//!
//! Tokens are held as [`SecretString`] so they never show up in `Debug`
//! output, and every human-facing rendering goes through [`mask_token`].
//!
//! Resolution order per platform:
//!
//! 1. Environment: `INSTAGRAM_ACCESS_TOKEN` / `INSTAGRAM_USER_ID`, or
//!    `THREADS_ACCESS_TOKEN` / `THREADS_USER_ID` (Threads falls back to the
//!    Instagram variables, since one Meta token can carry both scope sets)
//! 2. The platform section of the config file: `token_file` and `account_id`

use secrecy::{ExposeSecret, SecretString};
use std::sync::RwLock;

use crate::config::PlatformConfig;
use crate::error::{ConfigError, Result};
use crate::types::Platform;

/// Render a secret for display: first 6 and last 4 characters. Short values
/// are hidden entirely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 15 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// What introspection reported about a token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenGrant {
    pub scopes: Vec<String>,
    /// Epoch seconds, `None` when the token never expires
    pub expires_at: Option<i64>,
}

/// Token, account and (once introspected) scopes and expiry
pub struct CredentialSet {
    access_token: SecretString,
    pub account_id: String,
    grant: RwLock<Option<TokenGrant>>,
}

impl CredentialSet {
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            account_id: account_id.into(),
            grant: RwLock::new(None),
        }
    }

    /// Remember a successful introspection; a later one replaces it
    pub fn record_grant(&self, grant: TokenGrant) {
        let mut slot = self.grant.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(grant);
    }

    /// `None` until the token has been verified
    pub fn grant(&self) -> Option<TokenGrant> {
        self.grant.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Empty until the token has been verified
    pub fn granted_scopes(&self) -> Vec<String> {
        self.grant().map(|g| g.scopes).unwrap_or_default()
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.grant().and_then(|g| g.expires_at)
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn masked_token(&self) -> String {
        mask_token(self.access_token())
    }

    pub fn masked_account(&self) -> String {
        mask_account(&self.account_id)
    }

    /// Resolve credentials for `platform` from the environment and its config
    /// section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PlatformDisabled` when the section disables the
    /// platform, `ConfigError::MissingCredentials` when no token or account id
    /// can be found, and `ConfigError::ReadError` when a token file cannot be
    /// read.
    pub fn resolve(platform: Platform, config: Option<&PlatformConfig>) -> Result<Self> {
        if let Some(section) = config {
            if !section.enabled {
                return Err(ConfigError::PlatformDisabled(platform.to_string()).into());
            }
        }

        let token = match env_value(platform, "ACCESS_TOKEN") {
            Some(token) => token,
            None => match config.and_then(|c| c.token_file.as_deref()) {
                Some(path) => read_token_file(platform, path)?,
                None => return Err(missing(platform, "an access token")),
            },
        };

        let account_id = env_value(platform, "USER_ID")
            .or_else(|| config.and_then(|c| c.account_id.clone()))
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| missing(platform, "an account id"))?;

        Ok(Self::new(token, account_id.trim()))
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &self.masked_token())
            .field("account_id", &self.masked_account())
            .field("grant", &self.grant())
            .finish()
    }
}

/// Account ids are shorter than tokens; keep only the last 4 digits
fn mask_account(account_id: &str) -> String {
    let chars: Vec<char> = account_id.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}

fn env_value(platform: Platform, suffix: &str) -> Option<String> {
    let lookup = |prefix: &str| {
        std::env::var(format!("{}_{}", prefix, suffix))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match platform {
        Platform::Instagram => lookup("INSTAGRAM"),
        Platform::Threads => lookup("THREADS").or_else(|| lookup("INSTAGRAM")),
    }
}

fn read_token_file(platform: Platform, path: &str) -> Result<String> {
    let expanded = shellexpand::full(path)
        .map_err(|e| ConfigError::MissingField(format!("token_file ({})", e)))?;

    let token = std::fs::read_to_string(expanded.as_ref())
        .map_err(ConfigError::ReadError)?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(missing(platform, "an access token (token file is empty)"));
    }

    Ok(token)
}

fn missing(platform: Platform, what: &str) -> crate::error::GraphcastError {
    ConfigError::MissingCredentials {
        platform: platform.to_string(),
        what: what.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 4] = [
        "INSTAGRAM_ACCESS_TOKEN",
        "INSTAGRAM_USER_ID",
        "THREADS_ACCESS_TOKEN",
        "THREADS_USER_ID",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("EAABsbCS1iHgBAJZCZCZAZBx9"), "EAABsb...ZBx9");
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token(""), "***");
        assert_eq!(mask_token("exactly15chars!"), "exactl...ars!");
    }

    #[test]
    fn test_grant_recorded_after_introspection() {
        let creds = CredentialSet::new("EAABsbCS1iHgBAJZCZCZAZBx9", "17841400000000123");
        assert!(creds.grant().is_none());
        assert!(creds.granted_scopes().is_empty());

        creds.record_grant(TokenGrant {
            scopes: vec!["instagram_basic".to_string()],
            expires_at: Some(1_900_000_000),
        });

        assert_eq!(creds.granted_scopes(), vec!["instagram_basic".to_string()]);
        assert_eq!(creds.expires_at(), Some(1_900_000_000));
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let creds = CredentialSet::new("EAABsbCS1iHgBAJZCZCZAZBx9", "17841400000000123");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("EAABsbCS1iHgBAJZCZCZAZBx9"));
        assert!(!debug.contains("17841400000000123"));
        assert!(debug.contains("EAABsb...ZBx9"));
        assert!(debug.contains("***0123"));
    }

    #[test]
    #[serial]
    fn test_resolve_from_env() {
        clear_env();
        std::env::set_var("INSTAGRAM_ACCESS_TOKEN", "ig-token-from-environment");
        std::env::set_var("INSTAGRAM_USER_ID", "1784");

        let creds = CredentialSet::resolve(Platform::Instagram, None).unwrap();
        assert_eq!(creds.access_token(), "ig-token-from-environment");
        assert_eq!(creds.account_id, "1784");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_threads_falls_back_to_instagram_env() {
        clear_env();
        std::env::set_var("INSTAGRAM_ACCESS_TOKEN", "shared-meta-token-value");
        std::env::set_var("INSTAGRAM_USER_ID", "1784");
        std::env::set_var("THREADS_USER_ID", "2001");

        let creds = CredentialSet::resolve(Platform::Threads, None).unwrap();
        assert_eq!(creds.access_token(), "shared-meta-token-value");
        assert_eq!(creds.account_id, "2001");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_from_token_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("instagram.token");
        fs::write(&token_path, "  file-token-value-123456\n").unwrap();

        let section = PlatformConfig {
            account_id: Some("1784".to_string()),
            token_file: Some(token_path.to_string_lossy().to_string()),
            ..Default::default()
        };

        let creds = CredentialSet::resolve(Platform::Instagram, Some(&section)).unwrap();
        assert_eq!(creds.access_token(), "file-token-value-123456");
    }

    #[test]
    #[serial]
    fn test_empty_token_file_is_missing_credentials() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("threads.token");
        fs::write(&token_path, "\n").unwrap();

        let section = PlatformConfig {
            account_id: Some("1784".to_string()),
            token_file: Some(token_path.to_string_lossy().to_string()),
            ..Default::default()
        };

        let err = CredentialSet::resolve(Platform::Threads, Some(&section)).unwrap_err();
        assert!(err.to_string().contains("token file is empty"));
    }

    #[test]
    #[serial]
    fn test_missing_token_and_account() {
        clear_env();
        let err = CredentialSet::resolve(Platform::Instagram, None).unwrap_err();
        assert!(err.to_string().contains("instagram is missing an access token"));

        std::env::set_var("INSTAGRAM_ACCESS_TOKEN", "token-without-account");
        let err = CredentialSet::resolve(Platform::Instagram, None).unwrap_err();
        assert!(err.to_string().contains("missing an account id"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_disabled_platform() {
        clear_env();
        let section = PlatformConfig {
            enabled: false,
            ..Default::default()
        };
        let err = CredentialSet::resolve(Platform::Threads, Some(&section)).unwrap_err();
        assert!(err.to_string().contains("threads is disabled"));
    }
}
