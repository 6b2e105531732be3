use crate::{
    errors::{self, Error, Result},
    inventory::VolumeSource,
};
use async_trait::async_trait;
use aws_sdk_ec2::{
    types::{Instance, Volume},
    Client,
};
use aws_types::SdkConfig as AwsSdkConfig;

/// Implements AWS EC2 manager.
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

    /// Describes all EBS volumes in the region, following the listing
    /// token until the provider reports no further page.
    /// ref. <https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_DescribeVolumes.html>
    pub async fn describe_volumes(&self) -> Result<Vec<Volume>> {
        log::info!("describing volumes in region '{}'", self.region);

        let mut volumes: Vec<Volume> = Vec::new();
        let mut token = String::new();
        loop {
            let mut builder = self.cli.describe_volumes();
            if !token.is_empty() {
                builder = builder.set_next_token(Some(token.to_owned()));
            }
            let ret = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    return Err(Error::API {
                        message: format!("failed describe_volumes {:?}", e),
                        retryable: errors::is_sdk_err_retryable(&e),
                    });
                }
            };

            if let Some(vols) = ret.volumes {
                volumes.extend(vols);
            }

            token = match ret.next_token {
                Some(v) => v,
                None => String::new(),
            };
            if token.is_empty() {
                break;
            }
        }

        log::info!("described {} volumes", volumes.len());
        Ok(volumes)
    }

    /// Fetches the instance behind a volume attachment.
    /// Expects exactly one reservation holding exactly one instance.
    /// ref. <https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_DescribeInstances.html>
    pub async fn describe_instance(&self, instance_id: &str) -> Result<Instance> {
        log::info!("describing instance '{}'", instance_id);
        let resp = match self
            .cli
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return Err(Error::API {
                    message: format!("failed describe_instances {:?}", e),
                    retryable: errors::is_sdk_err_retryable(&e),
                });
            }
        };

        let reservations = match resp.reservations {
            Some(rvs) => rvs,
            None => {
                return Err(Error::API {
                    message: String::from("empty reservation from describe_instances response"),
                    retryable: false,
                });
            }
        };
        if reservations.len() != 1 {
            return Err(Error::API {
                message: format!(
                    "expected only 1 reservation from describe_instances response but got {}",
                    reservations.len()
                ),
                retryable: false,
            });
        }

        let rsv = reservations.into_iter().next().unwrap();
        let instances = rsv.instances.unwrap_or_default();
        if instances.len() != 1 {
            return Err(Error::API {
                message: format!(
                    "expected only 1 instance for '{}' but got {}",
                    instance_id,
                    instances.len()
                ),
                retryable: false,
            });
        }

        Ok(instances.into_iter().next().unwrap())
    }
}

#[async_trait]
impl VolumeSource for Manager {
    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.describe_volumes().await
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        self.describe_instance(instance_id).await
    }
}
