use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Shared SDK configuration for one region; credentials come from the default chain.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    let region_provider = RegionProviderChain::first_try(Region::new(region.to_string()));
    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await
}
