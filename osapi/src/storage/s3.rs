use super::{ObjectStore, Result, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::time::Duration;

/// Error codes S3 returns when it does not accept the signing credentials
const CREDENTIAL_ERROR_CODES: &[&str] = &["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"];

/// What the configuration provided in terms of static credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialState {
    Complete,
    Missing,
    Partial,
}

impl CredentialState {
    fn from_keys(access_key_id: &str, secret_access_key: &str) -> Self {
        match (access_key_id.is_empty(), secret_access_key.is_empty()) {
            (false, false) => CredentialState::Complete,
            (true, true) => CredentialState::Missing,
            _ => CredentialState::Partial,
        }
    }
}

/// S3-compatible backend built on `aws-sdk-s3`.
///
/// One client is constructed per store and reused for every request. Retries are disabled in
/// the SDK: each call is a single attempt and failures surface to the caller as-is.
pub struct S3ObjectStore {
    client: Client,
    credentials: CredentialState,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = CredentialState::from_keys(&config.access_key_id, &config.secret_access_key);

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style)
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = config.endpoint_url.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }

        // Without complete static credentials no provider is installed: every operation is
        // rejected up front by `ensure_credentials`
        if credentials == CredentialState::Complete {
            builder = builder.credentials_provider(Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "osapi-config",
            ));
        } else {
            tracing::warn!(?credentials, "S3 credentials are not fully configured");
        }

        Self {
            client: Client::from_conf(builder.build()),
            credentials,
        }
    }

    fn ensure_credentials(&self) -> Result<()> {
        match self.credentials {
            CredentialState::Complete => Ok(()),
            CredentialState::Missing => Err(StorageError::NoCredentials),
            CredentialState::Partial => Err(StorageError::PartialCredentials),
        }
    }
}

/// Map an SDK failure onto [`StorageError`], keeping credential rejections distinguishable
fn classify<E, R>(err: SdkError<E, R>, bucket: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) if CREDENTIAL_ERROR_CODES.contains(&code) => StorageError::AccessDenied {
            message: err.message().unwrap_or(code).to_string(),
        },
        Some("NoSuchBucket") => StorageError::NoSuchBucket {
            bucket: bucket.to_string(),
        },
        _ => StorageError::Backend {
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(skip(self))]
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.ensure_credentials()?;

        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_bucket_already_exists() {
                        return Err(StorageError::BucketAlreadyExists {
                            bucket: bucket.to_string(),
                        });
                    }
                    if service_err.is_bucket_already_owned_by_you() {
                        return Err(StorageError::BucketAlreadyOwnedByYou {
                            bucket: bucket.to_string(),
                        });
                    }
                }
                Err(classify(err, bucket))
            }
        }
    }

    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        self.ensure_credentials()?;

        let size = i64::try_from(body.len()).map_err(|_| StorageError::InvalidRequest {
            message: format!("object {key} is too large"),
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.ensure_credentials()?;

        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                // HEAD has no body, so a missing key and a missing bucket both come back as NotFound
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                // Without a body there is no error code, only the status
                if err.raw_response().is_some_and(|response| response.status().as_u16() == 403) {
                    return Err(StorageError::AccessDenied {
                        message: format!("access to {bucket}/{key} was denied"),
                    });
                }
                Err(classify(err, bucket))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn presign_put(&self, bucket: &str, key: &str, content_type: &str, expires_in: Duration) -> Result<String> {
        self.ensure_credentials()?;

        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::InvalidRequest {
            message: format!("invalid presigned URL expiry: {e}"),
        })?;

        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| classify(e, bucket))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: Option<String>) -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::S3,
            access_key_id: "test-access-key".to_string(),
            secret_access_key: "test-secret-key".to_string(),
            endpoint_url: endpoint,
            region: "us-east-1".to_string(),
            force_path_style: true,
            ..Default::default()
        }
    }

    fn s3_error_body(code: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>{code}</Code><Message>{message}</Message><RequestId>req-1</RequestId></Error>"#
        )
    }

    #[test]
    fn test_credential_state_from_keys() {
        assert_eq!(CredentialState::from_keys("a", "b"), CredentialState::Complete);
        assert_eq!(CredentialState::from_keys("", ""), CredentialState::Missing);
        assert_eq!(CredentialState::from_keys("a", ""), CredentialState::Partial);
        assert_eq!(CredentialState::from_keys("", "b"), CredentialState::Partial);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_any_request() {
        let config = StorageConfig {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            ..test_config(Some("http://127.0.0.1:1".to_string()))
        };
        let store = S3ObjectStore::new(&config);

        let result = store.presign_put("b", "k", "text/plain", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StorageError::NoCredentials)));

        let result = store.object_exists("b", "k").await;
        assert!(matches!(result, Err(StorageError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_partial_credentials_rejected() {
        let config = StorageConfig {
            secret_access_key: String::new(),
            ..test_config(Some("http://127.0.0.1:1".to_string()))
        };
        let store = S3ObjectStore::new(&config);

        let result = store.create_bucket("b").await;
        assert!(matches!(result, Err(StorageError::PartialCredentials)));
    }

    #[tokio::test]
    async fn test_presigned_url_has_location_and_expiry() {
        let store = S3ObjectStore::new(&test_config(Some("http://localhost:9000".to_string())));

        let url = store
            .presign_put("uploads", "photo.jpg", "image/jpeg", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/uploads/photo.jpg?"), "unexpected url {url}");
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_expiry() {
        let store = S3ObjectStore::new(&test_config(Some("http://localhost:9000".to_string())));

        let result = store
            .presign_put("uploads", "k", "text/plain", Duration::from_secs(8 * 24 * 60 * 60))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_object_exists_against_mock_server() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/bucket/present.txt"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "0"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/absent.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&test_config(Some(server.uri())));

        assert!(store.object_exists("bucket", "present.txt").await.unwrap());
        assert!(!store.object_exists("bucket", "absent.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_object_exists_forbidden_is_credential_error() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/bucket/secret.txt"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&test_config(Some(server.uri())));

        let result = store.object_exists("bucket", "secret.txt").await;
        match result {
            Err(e @ StorageError::AccessDenied { .. }) => assert!(e.is_credential_error()),
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_bucket_conflicts_are_classified() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/mine/"))
            .respond_with(
                ResponseTemplate::new(409)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(s3_error_body("BucketAlreadyOwnedByYou", "You already own it")),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/theirs/"))
            .respond_with(
                ResponseTemplate::new(409)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(s3_error_body("BucketAlreadyExists", "Pick another name")),
            )
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&test_config(Some(server.uri())));

        let result = store.create_bucket("mine").await;
        assert!(matches!(result, Err(StorageError::BucketAlreadyOwnedByYou { bucket }) if bucket == "mine"));

        let result = store.create_bucket("theirs").await;
        assert!(matches!(result, Err(StorageError::BucketAlreadyExists { bucket }) if bucket == "theirs"));
    }

    #[tokio::test]
    async fn test_put_object_success_and_access_denied() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/bucket/ok.txt"))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"abc\""))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bucket/denied.txt"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(s3_error_body("InvalidAccessKeyId", "The access key does not exist")),
            )
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&test_config(Some(server.uri())));

        store
            .put_object("bucket", "ok.txt", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .unwrap();

        let result = store.put_object("bucket", "denied.txt", Bytes::from_static(b"hello"), None).await;
        match result {
            Err(StorageError::AccessDenied { message }) => assert!(message.contains("access key")),
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }
}
