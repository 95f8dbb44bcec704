use crate::shards::ShardTreeError;

use thiserror::Error;

/// Error code the AWS SDK reports when an in-flight request is torn down by
/// cancellation. The collator folds workers that fail with this code into the
/// `Cancelled` outcome instead of treating them as operation failures.
const REQUEST_CANCELED_CODE: &str = "RequestCanceled";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("operation canceled")]
    Cancelled,

    #[error("operation failed")]
    OperationFailed,

    #[error(transparent)]
    ShardTree(#[from] ShardTreeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Collapse vendor cancellation codes into the `Cancelled` sentinel.
    pub fn normalized(self) -> SyncError {
        match self {
            SyncError::Other(inner) if is_request_canceled(&inner) => SyncError::Cancelled,
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Cancelled => 130,
            _ => 79,
        }
    }
}

/// An error returned by an AWS API call, with the service error code
/// preserved so callers can branch on it without string matching against
/// rendered messages.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct AwsApiError {
    code: String,
    message: String,
}

impl AwsApiError {
    pub fn new<C, M>(code: C, message: M) -> Self
    where
        C: Into<String>,
        M: Into<String>,
    {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }
}

/// Look up the AWS error code carried anywhere in an error chain.
pub fn aws_error_code(err: &anyhow::Error) -> Option<&str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AwsApiError>())
        .map(AwsApiError::code)
}

fn is_request_canceled(err: &anyhow::Error) -> bool {
    aws_error_code(err) == Some(REQUEST_CANCELED_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_normalizes_request_canceled_codes_to_cancelled() {
        let err = SyncError::Other(anyhow::Error::new(AwsApiError::new(
            "RequestCanceled",
            "request canceled, context deadline exceeded",
        )));
        assert!(matches!(err.normalized(), SyncError::Cancelled));
    }

    #[test]
    fn it_keeps_other_aws_codes_intact() {
        let err = SyncError::Other(anyhow::Error::new(AwsApiError::new(
            "ProvisionedThroughputExceededException",
            "slow down",
        )));
        assert!(matches!(err.normalized(), SyncError::Other(_)));
    }

    #[test]
    fn it_finds_codes_through_context_wrapping() {
        let inner = anyhow::Error::new(AwsApiError::new("ResourceNotFoundException", "no table"));
        let wrapped = inner.context("describe table");
        assert_eq!(aws_error_code(&wrapped), Some("ResourceNotFoundException"));
    }

    #[test]
    fn it_keeps_sentinels_unchanged() {
        assert!(matches!(
            SyncError::Cancelled.normalized(),
            SyncError::Cancelled
        ));
        assert!(matches!(
            SyncError::OperationFailed.normalized(),
            SyncError::OperationFailed
        ));
    }

    #[test]
    fn it_maps_exit_codes() {
        assert_eq!(SyncError::Cancelled.exit_code(), 130);
        assert_eq!(SyncError::OperationFailed.exit_code(), 79);
        assert_eq!(SyncError::Other(anyhow::anyhow!("boom")).exit_code(), 79);
    }
}
