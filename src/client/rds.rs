//! AWS RDS snapshot service.
//!
//! Wraps `aws-sdk-rds` for one region. Cross-region copies carry a SigV4
//! presigned `CopyDBSnapshot` / `CopyDBClusterSnapshot` URL against the source
//! region, which is what the service expects in place of a `SourceRegion`
//! parameter.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rds::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::{CopyRequest, ServiceError, ServiceErrorKind, ServiceResult, SnapshotService};
use crate::{
    aws::{PRESIGNED_URL_EXPIRY, load_sdk_config, presign_url, resolve_credentials},
    config::AwsCredentials,
    snapshot::{ResourceKind, SnapshotClass, SnapshotRef},
};

const RDS_API_VERSION: &str = "2014-10-31";

/// Configuration for one regional RDS client.
#[derive(Debug, Clone)]
pub struct RdsSnapshotServiceConfig {
    /// AWS region (e.g., "eu-west-1")
    pub region: String,
    /// Optional endpoint URL for testing with localstack
    pub endpoint_url: Option<String>,
    pub credentials: AwsCredentials,
    /// Attach a presigned source-region URL to cross-region copies.
    pub presign_copies: bool,
}

impl RdsSnapshotServiceConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint_url: None,
            credentials: AwsCredentials::Default,
            presign_copies: true,
        }
    }

    pub fn with_endpoint_url(mut self, url: Option<String>) -> Self {
        self.endpoint_url = url;
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_presign_copies(mut self, presign: bool) -> Self {
        self.presign_copies = presign;
        self
    }
}

/// RDS-backed [`SnapshotService`].
pub struct RdsSnapshotService {
    client: Client,
    sdk_config: SdkConfig,
    region: String,
    presign_copies: bool,
}

impl RdsSnapshotService {
    pub async fn new(config: RdsSnapshotServiceConfig) -> Self {
        info!(region = %config.region, "Initializing RDS client");

        let sdk_config = load_sdk_config(&config.region, &config.credentials).await;

        let mut rds_config = aws_sdk_rds::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &config.endpoint_url {
            rds_config = rds_config.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(rds_config.build()),
            sdk_config,
            region: config.region,
            presign_copies: config.presign_copies,
        }
    }

    async fn list_instance_snapshots(
        &self,
        resource_name: &str,
        class: SnapshotClass,
    ) -> ServiceResult<Vec<SnapshotRef>> {
        let mut snapshots = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_db_snapshots()
                .db_instance_identifier(resource_name)
                .snapshot_type(class.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(service_error)?;

            for snap in output.db_snapshots() {
                let Some(identifier) = snap.db_snapshot_identifier() else {
                    continue;
                };
                snapshots.push(SnapshotRef {
                    identifier: identifier.to_string(),
                    owner_resource_name: snap
                        .db_instance_identifier()
                        .unwrap_or(resource_name)
                        .to_string(),
                    resource_kind: ResourceKind::Instance,
                    created_at: snap.snapshot_create_time().and_then(to_chrono),
                    snapshot_class: snap
                        .snapshot_type()
                        .and_then(SnapshotClass::from_service)
                        .unwrap_or(class),
                    status: snap.status().map(str::to_string),
                });
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(snapshots)
    }

    async fn list_cluster_snapshots(
        &self,
        resource_name: &str,
        class: SnapshotClass,
    ) -> ServiceResult<Vec<SnapshotRef>> {
        let mut snapshots = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_db_cluster_snapshots()
                .db_cluster_identifier(resource_name)
                .snapshot_type(class.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(service_error)?;

            for snap in output.db_cluster_snapshots() {
                let Some(identifier) = snap.db_cluster_snapshot_identifier() else {
                    continue;
                };
                snapshots.push(SnapshotRef {
                    identifier: identifier.to_string(),
                    owner_resource_name: snap
                        .db_cluster_identifier()
                        .unwrap_or(resource_name)
                        .to_string(),
                    resource_kind: ResourceKind::Cluster,
                    created_at: snap.snapshot_create_time().and_then(to_chrono),
                    snapshot_class: snap
                        .snapshot_type()
                        .and_then(SnapshotClass::from_service)
                        .unwrap_or(class),
                    status: snap.status().map(str::to_string),
                });
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(snapshots)
    }

    /// Presigned source-region URL for a cross-region copy, if one is needed.
    async fn presigned_copy_url(&self, request: &CopyRequest) -> ServiceResult<Option<String>> {
        if !self.presign_copies || request.source_region == self.region {
            return Ok(None);
        }

        let credentials = resolve_credentials(&self.sdk_config)
            .await
            .map_err(|e| ServiceError::new(ServiceErrorKind::Credentials, e.to_string()))?;

        let url = copy_request_url(request, &self.region)?;
        let signed = presign_url(
            &credentials,
            &request.source_region,
            "rds",
            &url,
            PRESIGNED_URL_EXPIRY,
        )
        .map_err(|e| ServiceError::new(ServiceErrorKind::Credentials, e.to_string()))?;

        debug!(source_region = %request.source_region, "Presigned cross-region copy request");
        Ok(Some(signed))
    }
}

#[async_trait]
impl SnapshotService for RdsSnapshotService {
    fn region(&self) -> &str {
        &self.region
    }

    #[instrument(skip(self), fields(region = %self.region))]
    async fn list_snapshots(
        &self,
        kind: ResourceKind,
        resource_name: &str,
        class: SnapshotClass,
    ) -> ServiceResult<Vec<SnapshotRef>> {
        let snapshots = match kind {
            ResourceKind::Instance => self.list_instance_snapshots(resource_name, class).await?,
            ResourceKind::Cluster => self.list_cluster_snapshots(resource_name, class).await?,
        };
        debug!(count = snapshots.len(), "Listed snapshots");
        Ok(snapshots)
    }

    #[instrument(skip(self, request), fields(region = %self.region, target = %request.target_identifier))]
    async fn copy_snapshot(&self, request: &CopyRequest) -> ServiceResult<String> {
        let pre_signed_url = self.presigned_copy_url(request).await?;

        match request.resource_kind {
            ResourceKind::Instance => {
                let output = self
                    .client
                    .copy_db_snapshot()
                    .source_db_snapshot_identifier(&request.source_arn)
                    .target_db_snapshot_identifier(&request.target_identifier)
                    .set_kms_key_id(request.kms_key_id.clone())
                    .copy_tags(request.copy_tags)
                    .set_pre_signed_url(pre_signed_url)
                    .send()
                    .await
                    .map_err(service_error)?;

                Ok(output
                    .db_snapshot()
                    .and_then(|s| s.db_snapshot_identifier())
                    .unwrap_or(request.target_identifier.as_str())
                    .to_string())
            }
            ResourceKind::Cluster => {
                let output = self
                    .client
                    .copy_db_cluster_snapshot()
                    .source_db_cluster_snapshot_identifier(&request.source_arn)
                    .target_db_cluster_snapshot_identifier(&request.target_identifier)
                    .set_kms_key_id(request.kms_key_id.clone())
                    .copy_tags(request.copy_tags)
                    .set_pre_signed_url(pre_signed_url)
                    .send()
                    .await
                    .map_err(service_error)?;

                Ok(output
                    .db_cluster_snapshot()
                    .and_then(|s| s.db_cluster_snapshot_identifier())
                    .unwrap_or(request.target_identifier.as_str())
                    .to_string())
            }
        }
    }

    #[instrument(skip(self), fields(region = %self.region))]
    async fn delete_snapshot(&self, kind: ResourceKind, identifier: &str) -> ServiceResult<()> {
        match kind {
            ResourceKind::Instance => {
                self.client
                    .delete_db_snapshot()
                    .db_snapshot_identifier(identifier)
                    .send()
                    .await
                    .map_err(service_error)?;
            }
            ResourceKind::Cluster => {
                self.client
                    .delete_db_cluster_snapshot()
                    .db_cluster_snapshot_identifier(identifier)
                    .send()
                    .await
                    .map_err(service_error)?;
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "rds"
    }
}

/// Unsigned query-API URL of the copy request, addressed to the source region.
fn copy_request_url(request: &CopyRequest, destination_region: &str) -> ServiceResult<String> {
    let (action, source_param, target_param) = match request.resource_kind {
        ResourceKind::Instance => (
            "CopyDBSnapshot",
            "SourceDBSnapshotIdentifier",
            "TargetDBSnapshotIdentifier",
        ),
        ResourceKind::Cluster => (
            "CopyDBClusterSnapshot",
            "SourceDBClusterSnapshotIdentifier",
            "TargetDBClusterSnapshotIdentifier",
        ),
    };

    let endpoint = format!("https://rds.{}.amazonaws.com/", request.source_region);
    let mut params = vec![
        ("Action", action),
        ("Version", RDS_API_VERSION),
        (source_param, request.source_arn.as_str()),
        (target_param, request.target_identifier.as_str()),
    ];
    if let Some(key) = &request.kms_key_id {
        params.push(("KmsKeyId", key.as_str()));
    }
    params.push(("DestinationRegion", destination_region));

    url::Url::parse_with_params(&endpoint, &params)
        .map(String::from)
        .map_err(|e| ServiceError::new(ServiceErrorKind::Rejected, e.to_string()))
}

fn to_chrono(time: &aws_sdk_rds::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// Classify an SDK failure. Anything without a service error code never
/// reached the service.
fn service_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if let Some(code) = err.code() {
        return ServiceError::from_code(code, err.message().unwrap_or_default());
    }
    ServiceError::new(
        ServiceErrorKind::Transport,
        DisplayErrorContext(&err).to_string(),
    )
}
