//! AWS SDK client plumbing.
//!
//! The provisioning "engine" proper is the AWS cloud API; everything in this
//! tree is a thin declarative layer over the official SDK clients. Each
//! service module owns one client and exposes ensure/absent operations
//! identified by resource name, so repeated runs converge without a local
//! state store.

pub mod ec2;
pub mod iam;
pub mod s3;

use crate::config::AwsSettings;
use aws_config::BehaviorVersion;

/// Resolve the shared SDK configuration, honoring region and profile
/// overrides from the deployment config.
pub async fn sdk_config(settings: &AwsSettings) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(ref region) = settings.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(ref profile) = settings.profile {
        loader = loader.profile_name(profile);
    }

    loader.load().await
}
