pub mod client;

use client::{DynamodbStreamsClient, DynamodbTableClient, StreamsClient, TableClient};

use anyhow::{bail, Context, Result};
use aws_config::retry::RetryConfig;
use aws_config::sts::AssumeRoleProvider;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Steady-state retry budget for replication traffic.
pub const MAX_API_RETRIES: u32 = 15;

/// Preflights use a reduced budget so missing credentials fail fast instead
/// of grinding through the full retry schedule.
pub const PREFLIGHT_RETRIES: u32 = 7;

const STS_SESSION_NAME: &str = "dynamo-sync";

/// Optional endpoint override, for pointing both services at a local
/// DynamoDB while testing.
pub const ENV_ENDPOINT_URL: &str = "DYNAMO_SYNC_ENDPOINT_URL";

async fn base_config(region: &str, max_attempts: u32) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(max_attempts));

    if !region.is_empty() {
        loader = loader.region(Region::new(region.to_owned()));
    }

    loader.load().await
}

async fn assume_role(config: &SdkConfig, role_arn: &str) -> AssumeRoleProvider {
    AssumeRoleProvider::builder(role_arn)
        .session_name(STS_SESSION_NAME)
        .configure(config)
        .build()
        .await
}

/// Build a DynamoDB table client for one side of a plan.
pub async fn table_client(
    region: &str,
    role_arn: &str,
    max_attempts: u32,
) -> Arc<dyn TableClient> {
    let config = base_config(region, max_attempts).await;
    let mut builder = aws_sdk_dynamodb::config::Builder::from(&config);

    if !role_arn.is_empty() {
        builder = builder.credentials_provider(assume_role(&config, role_arn).await);
    }
    if let Ok(url) = env::var(ENV_ENDPOINT_URL) {
        builder = builder.endpoint_url(url);
    }

    let client = aws_sdk_dynamodb::Client::from_conf(builder.build());
    Arc::new(DynamodbTableClient::new(client))
}

/// Build a DynamoDB Streams client for the input side of a plan.
pub async fn streams_client(
    region: &str,
    role_arn: &str,
    max_attempts: u32,
) -> Arc<dyn StreamsClient> {
    let config = base_config(region, max_attempts).await;
    let mut builder = aws_sdk_dynamodbstreams::config::Builder::from(&config);

    if !role_arn.is_empty() {
        builder = builder.credentials_provider(assume_role(&config, role_arn).await);
    }
    if let Ok(url) = env::var(ENV_ENDPOINT_URL) {
        builder = builder.endpoint_url(url);
    }

    let client = aws_sdk_dynamodbstreams::Client::from_conf(builder.build());
    Arc::new(DynamodbStreamsClient::new(client))
}

/// Fast and dirty credential check. If there are no active credentials this
/// fails within about a second; anything it misses is still caught by the
/// slower preflight checks.
pub async fn check_credentials() -> Result<()> {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(1))
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(1))
                .build(),
        )
        .load()
        .await;

    let client = aws_sdk_sts::Client::new(&config);
    let identity = client
        .get_caller_identity()
        .send()
        .await
        .context("no active AWS credentials")?;

    if identity.account().unwrap_or_default().is_empty() {
        bail!("no active AWS credentials");
    }
    Ok(())
}
