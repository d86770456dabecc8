//! Secret resolution capability
//!
//! Secrets are named indirections in the pipeline document, resolved by a
//! host-provided store at invocation time. Resolved values are scoped to
//! one step invocation and are never logged in plaintext.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error raised when a named secret cannot be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("secret `{0}` is not available")]
    NotFound(String),
}

/// A resolved secret value
///
/// `Debug` never prints the value, so resolved secrets can flow through
/// logs and error messages safely.
#[derive(Clone)]
pub struct ResolvedSecret {
    name: String,
    value: String,
}

impl ResolvedSecret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plaintext value, for handing to an executor environment
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("name", &self.name)
            .field("value", &"[redacted]")
            .finish()
    }
}

/// Capability for resolving named secrets, injected into the runner
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<ResolvedSecret, SecretError>;
}

/// Resolves secrets from process environment variables
///
/// The secret name is upper-cased: `github_token` reads `GITHUB_TOKEN`.
pub struct EnvSecretProvider;

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn resolve(&self, name: &str) -> Result<ResolvedSecret, SecretError> {
        let var = name.to_uppercase();
        debug!(secret = name, env_var = %var, "resolving secret from environment");
        match std::env::var(&var) {
            Ok(value) => Ok(ResolvedSecret::new(name, value)),
            Err(_) => Err(SecretError::NotFound(name.to_string())),
        }
    }
}

/// In-memory secret store, for CLI overrides and tests
#[derive(Default)]
pub struct MemorySecretStore {
    values: HashMap<String, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl FromIterator<(String, String)> for MemorySecretStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SecretProvider for MemorySecretStore {
    async fn resolve(&self, name: &str) -> Result<ResolvedSecret, SecretError> {
        match self.values.get(name) {
            Some(value) => Ok(ResolvedSecret::new(name, value.clone())),
            None => Err(SecretError::NotFound(name.to_string())),
        }
    }
}

/// Tries a sequence of providers in order, first hit wins
pub struct ChainedSecrets {
    providers: Vec<Arc<dyn SecretProvider>>,
}

impl ChainedSecrets {
    pub fn new(providers: Vec<Arc<dyn SecretProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl SecretProvider for ChainedSecrets {
    async fn resolve(&self, name: &str) -> Result<ResolvedSecret, SecretError> {
        for provider in &self.providers {
            if let Ok(secret) = provider.resolve(name).await {
                return Ok(secret);
            }
        }
        Err(SecretError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_resolves() {
        let mut store = MemorySecretStore::new();
        store.insert("registry_token", "hunter2");

        let secret = store.resolve("registry_token").await.unwrap();
        assert_eq!(secret.name(), "registry_token");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_memory_store_missing() {
        let store = MemorySecretStore::new();
        assert_eq!(
            store.resolve("nope").await.unwrap_err(),
            SecretError::NotFound("nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_env_provider_uppercases_name() {
        std::env::set_var("CONDUCTOR_TEST_SECRET", "s3cr3t");
        let secret = EnvSecretProvider
            .resolve("conductor_test_secret")
            .await
            .unwrap();
        assert_eq!(secret.expose(), "s3cr3t");
        std::env::remove_var("CONDUCTOR_TEST_SECRET");
    }

    #[tokio::test]
    async fn test_chained_first_hit_wins() {
        let mut first = MemorySecretStore::new();
        first.insert("token", "from-first");
        let mut second = MemorySecretStore::new();
        second.insert("token", "from-second");
        second.insert("other", "only-second");

        let chain = ChainedSecrets::new(vec![Arc::new(first), Arc::new(second)]);
        assert_eq!(chain.resolve("token").await.unwrap().expose(), "from-first");
        assert_eq!(
            chain.resolve("other").await.unwrap().expose(),
            "only-second"
        );
        assert!(chain.resolve("missing").await.is_err());
    }

    #[test]
    fn test_debug_redacts_value() {
        let secret = ResolvedSecret::new("token", "hunter2");
        let debug = format!("{:?}", secret);
        assert!(debug.contains("token"));
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("hunter2"));
    }
}
