//! Object Store Client: content-addressed upload of downloaded documents
//! under `{tenant}/{process}/{document}.pdf`.
//!
//! The underlying S3 client is expensive to construct (it resolves
//! credentials and region over the network), so it is built lazily behind a
//! double-checked guard: the fast path after first init never touches a
//! lock, and the first caller pays the guarded init under a mutex.

use aws_sdk_s3::primitives::ByteStream;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    /// Path to a credentials file or profile name; `None` falls through to
    /// the default AWS credential provider chain.
    pub credentials_profile: Option<String>,
    pub endpoint_url: Option<String>,
}

/// Canonical object path: `{tenant_id}/{process_number}/{document_number}.pdf`.
pub fn canonical_path(tenant_id: &str, process_number: &str, document_number: &str) -> String {
    format!("{tenant_id}/{process_number}/{document_number}.pdf")
}

pub struct ObjectStoreClient {
    config: ObjectStoreConfig,
    inner: OnceCell<aws_sdk_s3::Client>,
}

impl ObjectStoreClient {
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }

    async fn client(&self) -> Option<&aws_sdk_s3::Client> {
        self.inner
            .get_or_try_init(|| async {
                if let Some(profile) = &self.config.credentials_profile {
                    std::env::set_var("AWS_PROFILE", profile);
                }
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
                if let Some(endpoint) = &self.config.endpoint_url {
                    loader = loader.endpoint_url(endpoint);
                }
                let shared = loader.load().await;
                Ok::<_, ()>(aws_sdk_s3::Client::new(&shared))
            })
            .await
            .ok()
    }

    /// Upload bytes at `path` with content-type `application/pdf`. Returns
    /// `false` on any failure (including a lazily-discovered init failure)
    /// rather than propagating an error: an upload failure is recoverable
    /// by a later run, never fatal to the one document.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>) -> bool {
        let Some(client) = self.client().await else {
            tracing::warn!(path, "object store unavailable, upload deferred");
            return false;
        };

        let result = client
            .put_object()
            .bucket(&self.config.bucket)
            .key(path)
            .content_type("application/pdf")
            .body(ByteStream::from(bytes))
            .send()
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(path, error = %err, "object store upload failed");
                false
            }
        }
    }

    pub async fn delete(&self, path: &str) -> bool {
        let Some(client) = self.client().await else {
            return false;
        };
        client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(path)
            .send()
            .await
            .is_ok()
    }

    pub fn url_for(&self, path: &str) -> String {
        match &self.config.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.config.bucket, path),
            None => format!(
                "https://{}.s3.amazonaws.com/{}",
                self.config.bucket, path
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_canonical_path() {
        assert_eq!(
            canonical_path("t1", "12345.001234/2024-56", "20000001"),
            "t1/12345.001234/2024-56/20000001.pdf"
        );
    }

    #[test]
    fn url_for_uses_configured_endpoint() {
        let client = ObjectStoreClient::new(ObjectStoreConfig {
            bucket: "docs".to_string(),
            credentials_profile: None,
            endpoint_url: Some("https://minio.internal".to_string()),
        });
        assert_eq!(
            client.url_for("t1/p/d.pdf"),
            "https://minio.internal/docs/t1/p/d.pdf"
        );
    }
}
