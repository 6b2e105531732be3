use crate::errors::{Error, Result};
use aws_sdk_sts::{error::ProvideErrorMetadata, Client};
use aws_smithy_client::SdkError;
use aws_types::SdkConfig as AwsSdkConfig;
use serde::{Deserialize, Serialize};

/// Implements AWS STS manager.
#[derive(Debug, Clone)]
pub struct Manager {
    pub region: String,
    pub cli: Client,
}

impl Manager {
    pub fn new(shared_config: &AwsSdkConfig) -> Self {
        Self {
            region: shared_config.region().unwrap().to_string(),
            cli: Client::new(shared_config),
        }
    }

    /// Queries the AWS caller identity to validate the session.
    /// The SDK resolves credentials on the first call, so a bad profile,
    /// region, or credential set fails here rather than mid-listing.
    pub async fn get_identity(&self) -> Result<Identity> {
        log::info!("fetching STS caller identity in region '{}'", self.region);
        let resp = match self.cli.get_caller_identity().send().await {
            Ok(v) => v,
            Err(e) => return Err(connection_err(&e)),
        };

        Ok(Identity::new(
            resp.account().unwrap_or(""),
            resp.arn().unwrap_or(""),
            resp.user_id().unwrap_or(""),
        ))
    }
}

/// Represents the caller identity.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
pub struct Identity {
    pub account_id: String,
    pub role_arn: String,
    pub user_id: String,
}

impl Identity {
    pub fn new(account_id: &str, role_arn: &str, user_id: &str) -> Self {
        Self {
            account_id: String::from(account_id),
            role_arn: String::from(role_arn),
            user_id: String::from(user_id),
        }
    }
}

/// Maps the failed "get_caller_identity" to the fatal connection error,
/// keeping the provider error code and message when the service returned any.
fn connection_err<E: ProvideErrorMetadata + std::fmt::Debug>(e: &SdkError<E>) -> Error {
    match e {
        SdkError::ServiceError(err) => Error::Connection {
            code: err.err().code().unwrap_or("unknown").to_string(),
            message: err.err().message().unwrap_or("no message").to_string(),
        },
        _ => Error::Connection {
            code: String::from("unknown"),
            message: format!("{:?}", e),
        },
    }
}
