pub mod ec2;
pub mod errors;
pub mod inventory;
pub mod sts;

use aws_config::{self, meta::region::RegionProviderChain, timeout::TimeoutConfig};
use aws_types::{region::Region, SdkConfig as AwsSdkConfig};
use tokio::time::Duration;

/// Region used when neither the caller nor the environment provides one.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Loads an AWS config from default environments.
pub async fn load_config(region: Option<String>, profile_name: Option<String>) -> AwsSdkConfig {
    log::info!("loading AWS configuration for region {:?}", region);

    // if region is None, it automatically detects iff it's running inside the EC2 instance
    let reg_provider = RegionProviderChain::first_try(region.map(Region::new))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let timeout_cfg = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(5))
        .build();

    let mut cfg = aws_config::from_env()
        .region(reg_provider)
        .timeout_config(timeout_cfg);
    if let Some(p) = profile_name {
        log::info!("loading the aws profile '{p}'");
        cfg = cfg.profile_name(p);
    }

    cfg.load().await
}
