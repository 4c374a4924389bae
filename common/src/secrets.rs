// Secret provider backed by a managed secret store (AWS Secrets Manager)

use crate::errors::SyncError;
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Raw response of the secret store: a text payload, a binary payload, or
/// (for a malformed response) neither
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretValue {
    pub secret_string: Option<String>,
    pub secret_binary: Option<Vec<u8>>,
}

/// Managed secret store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current value of the named secret
    async fn get_secret_value(&self, name: &str) -> Result<SecretValue, SyncError>;
}

/// Secret store implementation using AWS Secrets Manager
pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    /// Build a client for `region` using the ambient AWS credential chain
    pub async fn new(region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: aws_sdk_secretsmanager::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    #[instrument(skip(self))]
    async fn get_secret_value(&self, name: &str) -> Result<SecretValue, SyncError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| SyncError::SecretAccess {
                name: name.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(SecretValue {
            secret_string: output.secret_string().map(str::to_string),
            secret_binary: output.secret_binary().map(|blob| blob.as_ref().to_vec()),
        })
    }
}

/// Resolves named credentials; secrets are fetched fresh on every call
#[derive(Clone)]
pub struct SecretProvider {
    store: Arc<dyn SecretStore>,
}

impl SecretProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Fetch a secret payload as text. Binary payloads are decoded as UTF-8.
    #[instrument(skip(self))]
    pub async fn fetch(&self, name: &str) -> Result<String, SyncError> {
        if name.is_empty() {
            return Err(SyncError::SecretAccess {
                name: String::new(),
                reason: "secret name must not be empty".to_string(),
            });
        }

        let value = self.store.get_secret_value(name).await.map_err(|e| {
            error!(secret = name, error = %e, "Failed to fetch secret");
            e
        })?;

        match value {
            SecretValue {
                secret_string: Some(text),
                ..
            } => Ok(text),
            SecretValue {
                secret_binary: Some(bytes),
                ..
            } => String::from_utf8(bytes).map_err(|e| SyncError::SecretFormat {
                name: name.to_string(),
                reason: format!("binary payload is not valid UTF-8: {}", e),
            }),
            _ => {
                error!(secret = name, "Secret response carries neither text nor binary payload");
                Err(SyncError::SecretFormat {
                    name: name.to_string(),
                    reason: "expected a text or binary payload".to_string(),
                })
            }
        }
    }

    /// Fetch a secret holding a JSON object and return one of its string fields
    #[instrument(skip(self))]
    pub async fn fetch_json_field(&self, name: &str, field: &str) -> Result<String, SyncError> {
        let payload = self.fetch(name).await?;

        let document: serde_json::Value =
            serde_json::from_str(&payload).map_err(|e| SyncError::SecretFormat {
                name: name.to_string(),
                reason: format!("payload is not JSON: {}", e),
            })?;

        let value = document
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SyncError::SecretFormat {
                name: name.to_string(),
                reason: format!("missing string field '{}'", field),
            })?;

        debug!(secret = name, field = field, "Secret field resolved");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_returning(value: Result<SecretValue, SyncError>) -> SecretProvider {
        let mut store = MockSecretStore::new();
        let mut value = Some(value);
        store
            .expect_get_secret_value()
            .times(1)
            .returning(move |_| value.take().expect("secret fetched once"));
        SecretProvider::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_text_payload_is_returned() {
        let provider = provider_returning(Ok(SecretValue {
            secret_string: Some("hunter2".to_string()),
            secret_binary: None,
        }));
        assert_eq!(provider.fetch("db").await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn test_binary_payload_is_utf8_decoded() {
        let provider = provider_returning(Ok(SecretValue {
            secret_string: None,
            secret_binary: Some("clé".as_bytes().to_vec()),
        }));
        assert_eq!(provider.fetch("db").await.unwrap(), "clé");
    }

    #[tokio::test]
    async fn test_missing_payload_is_format_error() {
        let provider = provider_returning(Ok(SecretValue::default()));
        let err = provider.fetch("db").await.unwrap_err();
        assert!(matches!(err, SyncError::SecretFormat { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_format_error() {
        let provider = provider_returning(Ok(SecretValue {
            secret_string: None,
            secret_binary: Some(vec![0xff, 0xfe]),
        }));
        let err = provider.fetch("db").await.unwrap_err();
        assert!(matches!(err, SyncError::SecretFormat { .. }));
    }

    #[tokio::test]
    async fn test_access_error_propagates() {
        let provider = provider_returning(Err(SyncError::SecretAccess {
            name: "db".to_string(),
            reason: "ResourceNotFoundException".to_string(),
        }));
        let err = provider.fetch("db").await.unwrap_err();
        assert!(matches!(err, SyncError::SecretAccess { .. }));
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_without_store_call() {
        let mut store = MockSecretStore::new();
        store.expect_get_secret_value().never();
        let provider = SecretProvider::new(Arc::new(store));
        assert!(provider.fetch("").await.is_err());
    }

    #[tokio::test]
    async fn test_json_field_is_extracted() {
        let provider = provider_returning(Ok(SecretValue {
            secret_string: Some(r#"{"api_keys": "abc123"}"#.to_string()),
            secret_binary: None,
        }));
        assert_eq!(
            provider.fetch_json_field("api_keys", "api_keys").await.unwrap(),
            "abc123"
        );
    }

    #[tokio::test]
    async fn test_json_field_missing_is_format_error() {
        let provider = provider_returning(Ok(SecretValue {
            secret_string: Some(r#"{"other": "abc123"}"#.to_string()),
            secret_binary: None,
        }));
        let err = provider
            .fetch_json_field("api_keys", "api_keys")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SecretFormat { .. }));
    }
}
