//! EC2 operations: security group, key pair, AMI lookup, instance, and
//! Elastic IP.
//!
//! Every ensure operation looks the resource up by name first (group name,
//! key name, `Name` tag) and only creates what is missing, so a rerun of the
//! same deployment converges instead of erroring. Deletion helpers mirror
//! the lookups and report whether anything was actually removed.

use crate::config::{AmiFilter, InstanceSettings, SecurityGroupRule, SecurityGroupSettings};
use crate::error::{Error, Result};
use aws_sdk_ec2::primitives::Blob;
use aws_sdk_ec2::types::{
    DomainType, Filter, InstanceNetworkInterfaceSpecification, InstanceStateName, InstanceType,
    IpPermission, IpRange, ResourceType, Tag, TagSpecification,
};
use aws_sdk_ec2::Client;
use std::time::Duration;

/// Poll interval for state waits.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Instance info as returned by the API.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub state: String,
    pub public_ip: Option<String>,
}

/// Elastic IP info as returned by the API.
#[derive(Debug, Clone)]
pub struct AddressInfo {
    pub allocation_id: String,
    pub public_ip: String,
    pub association_id: Option<String>,
    pub instance_id: Option<String>,
}

/// Convert a configured rule into the SDK permission shape.
fn to_ip_permission(rule: &SecurityGroupRule) -> IpPermission {
    let mut ip_range = IpRange::builder().cidr_ip(&rule.cidr);
    if let Some(ref desc) = rule.description {
        ip_range = ip_range.description(desc);
    }

    IpPermission::builder()
        .ip_protocol(&rule.protocol)
        .from_port(rule.from_port)
        .to_port(rule.to_port)
        .ip_ranges(ip_range.build())
        .build()
}

/// Pick the most recent image by creation date from a lookup result.
/// Creation dates are RFC 3339, so lexicographic order is chronological.
fn most_recent_image(images: &[aws_sdk_ec2::types::Image]) -> Option<&aws_sdk_ec2::types::Image> {
    images.iter().max_by(|a, b| {
        a.creation_date()
            .unwrap_or_default()
            .cmp(b.creation_date().unwrap_or_default())
    })
}

/// EC2 service operations.
pub struct Ec2 {
    client: Client,
}

impl Ec2 {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    // ========================================================================
    // Security group
    // ========================================================================

    /// Find a security group by name. Returns its group id.
    pub async fn find_security_group(&self, name: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .describe_security_groups()
            .filters(Filter::builder().name("group-name").values(name).build())
            .send()
            .await
            .map_err(|e| Error::provision(name, "describe security groups", e))?;

        Ok(resp
            .security_groups()
            .first()
            .and_then(|sg| sg.group_id())
            .map(|id| id.to_string()))
    }

    /// Ensure the security group exists with the configured rules.
    ///
    /// Returns `(group_id, created)`. An existing group is left untouched:
    /// reconciling rule drift would be a diff engine, which is out of scope.
    pub async fn ensure_security_group(
        &self,
        settings: &SecurityGroupSettings,
    ) -> Result<(String, bool)> {
        if let Some(group_id) = self.find_security_group(&settings.name).await? {
            tracing::debug!(%group_id, "security group already exists");
            return Ok((group_id, false));
        }

        let resp = self
            .client
            .create_security_group()
            .group_name(&settings.name)
            .description(&settings.description)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::SecurityGroup)
                    .tags(Tag::builder().key("Name").value(&settings.name).build())
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "create security group", e))?;

        let group_id = resp.group_id().unwrap_or_default().to_string();

        // A fresh group carries an implicit allow-all egress rule; revoke it
        // so the configured egress list is the whole truth.
        self.client
            .revoke_security_group_egress()
            .group_id(&group_id)
            .ip_permissions(to_ip_permission(&SecurityGroupRule {
                protocol: "-1".to_string(),
                from_port: 0,
                to_port: 0,
                cidr: "0.0.0.0/0".to_string(),
                description: None,
            }))
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "revoke default egress", e))?;

        if !settings.ingress.is_empty() {
            let permissions: Vec<IpPermission> =
                settings.ingress.iter().map(to_ip_permission).collect();
            self.client
                .authorize_security_group_ingress()
                .group_id(&group_id)
                .set_ip_permissions(Some(permissions))
                .send()
                .await
                .map_err(|e| Error::provision(&settings.name, "authorize ingress rules", e))?;
        }

        if !settings.egress.is_empty() {
            let permissions: Vec<IpPermission> =
                settings.egress.iter().map(to_ip_permission).collect();
            self.client
                .authorize_security_group_egress()
                .group_id(&group_id)
                .set_ip_permissions(Some(permissions))
                .send()
                .await
                .map_err(|e| Error::provision(&settings.name, "authorize egress rules", e))?;
        }

        tracing::info!(%group_id, name = %settings.name, "created security group");
        Ok((group_id, true))
    }

    /// Delete the security group if it exists. Returns the deleted group id.
    pub async fn delete_security_group(&self, name: &str) -> Result<Option<String>> {
        let Some(group_id) = self.find_security_group(name).await? else {
            return Ok(None);
        };

        self.client
            .delete_security_group()
            .group_id(&group_id)
            .send()
            .await
            .map_err(|e| Error::provision(name, "delete security group", e))?;

        tracing::info!(%group_id, "deleted security group");
        Ok(Some(group_id))
    }

    // ========================================================================
    // Key pair
    // ========================================================================

    /// Find a key pair by name.
    pub async fn find_key_pair(&self, name: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .describe_key_pairs()
            .filters(Filter::builder().name("key-name").values(name).build())
            .send()
            .await
            .map_err(|e| Error::provision(name, "describe key pairs", e))?;

        Ok(resp
            .key_pairs()
            .first()
            .and_then(|kp| kp.key_pair_id())
            .map(|id| id.to_string()))
    }

    /// Ensure the key pair exists, importing the configured public key.
    /// Returns `(key_name, created)`.
    pub async fn ensure_key_pair(&self, name: &str, public_key: &str) -> Result<(String, bool)> {
        if self.find_key_pair(name).await?.is_some() {
            tracing::debug!(name, "key pair already exists");
            return Ok((name.to_string(), false));
        }

        self.client
            .import_key_pair()
            .key_name(name)
            .public_key_material(Blob::new(public_key.as_bytes()))
            .send()
            .await
            .map_err(|e| Error::provision(name, "import key pair", e))?;

        tracing::info!(name, "imported key pair");
        Ok((name.to_string(), true))
    }

    /// Delete the key pair if it exists.
    pub async fn delete_key_pair(&self, name: &str) -> Result<Option<String>> {
        if self.find_key_pair(name).await?.is_none() {
            return Ok(None);
        }

        self.client
            .delete_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|e| Error::provision(name, "delete key pair", e))?;

        tracing::info!(name, "deleted key pair");
        Ok(Some(name.to_string()))
    }

    // ========================================================================
    // AMI lookup
    // ========================================================================

    /// Look up the most recent AMI matching the configured filter.
    pub async fn lookup_ami(&self, filter: &AmiFilter) -> Result<String> {
        let resp = self
            .client
            .describe_images()
            .owners(&filter.owner)
            .filters(
                Filter::builder()
                    .name("name")
                    .values(&filter.name_pattern)
                    .build(),
            )
            .filters(Filter::builder().name("state").values("available").build())
            .send()
            .await
            .map_err(|e| Error::provision(&filter.name_pattern, "describe images", e))?;

        let image = most_recent_image(resp.images())
            .ok_or_else(|| Error::AmiNotFound(filter.name_pattern.clone()))?;

        let image_id = image.image_id().unwrap_or_default().to_string();
        tracing::info!(
            %image_id,
            name = image.name().unwrap_or_default(),
            "resolved AMI"
        );
        Ok(image_id)
    }

    // ========================================================================
    // Instance
    // ========================================================================

    /// Find a live (non-terminated) instance by its Name tag.
    pub async fn find_instance_by_name(&self, name: &str) -> Result<Option<InstanceInfo>> {
        let resp = self
            .client
            .describe_instances()
            .filters(Filter::builder().name("tag:Name").values(name).build())
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("pending")
                    .values("running")
                    .values("stopping")
                    .values("stopped")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::provision(name, "describe instances", e))?;

        for reservation in resp.reservations() {
            if let Some(instance) = reservation.instances().first() {
                return Ok(Some(InstanceInfo {
                    instance_id: instance.instance_id().unwrap_or_default().to_string(),
                    state: instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    public_ip: instance.public_ip_address().map(|s| s.to_string()),
                }));
            }
        }

        Ok(None)
    }

    /// Ensure the instance exists and is running.
    /// Returns `(info, changed)`.
    pub async fn ensure_instance(
        &self,
        settings: &InstanceSettings,
        image_id: &str,
        key_name: &str,
        group_id: &str,
    ) -> Result<(InstanceInfo, bool)> {
        if let Some(existing) = self.find_instance_by_name(&settings.name).await? {
            if existing.state == "stopped" {
                self.client
                    .start_instances()
                    .instance_ids(&existing.instance_id)
                    .send()
                    .await
                    .map_err(|e| Error::provision(&settings.name, "start instance", e))?;
                tracing::info!(instance_id = %existing.instance_id, "started stopped instance");

                let info = if settings.wait {
                    self.wait_for_state(
                        &existing.instance_id,
                        InstanceStateName::Running,
                        settings.wait_timeout,
                    )
                    .await?
                } else {
                    existing
                };
                return Ok((info, true));
            }

            tracing::debug!(instance_id = %existing.instance_id, "instance already exists");
            return Ok((existing, false));
        }

        // The public address association rides on the primary interface, so
        // the security group has to be attached there as well.
        let resp = self
            .client
            .run_instances()
            .image_id(image_id)
            .instance_type(InstanceType::from(settings.instance_type.as_str()))
            .min_count(1)
            .max_count(1)
            .key_name(key_name)
            .network_interfaces(
                InstanceNetworkInterfaceSpecification::builder()
                    .device_index(0)
                    .associate_public_ip_address(true)
                    .groups(group_id)
                    .build(),
            )
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .tags(Tag::builder().key("Name").value(&settings.name).build())
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "run instance", e))?;

        let instance = resp
            .instances()
            .first()
            .ok_or_else(|| Error::Internal("run_instances returned no instance".to_string()))?;

        let mut info = InstanceInfo {
            instance_id: instance.instance_id().unwrap_or_default().to_string(),
            state: instance
                .state()
                .and_then(|s| s.name())
                .map(|n| n.as_str().to_string())
                .unwrap_or_else(|| "pending".to_string()),
            public_ip: instance.public_ip_address().map(|s| s.to_string()),
        };

        tracing::info!(
            instance_id = %info.instance_id,
            image_id,
            instance_type = %settings.instance_type,
            "launched instance"
        );

        if settings.wait {
            info = self
                .wait_for_state(
                    &info.instance_id,
                    InstanceStateName::Running,
                    settings.wait_timeout,
                )
                .await?;
        }

        Ok((info, true))
    }

    /// Poll until the instance reaches the desired state or the timeout
    /// elapses. Readiness polling only: a failed describe aborts immediately.
    pub async fn wait_for_state(
        &self,
        instance_id: &str,
        desired: InstanceStateName,
        timeout: Duration,
    ) -> Result<InstanceInfo> {
        let start = std::time::Instant::now();

        tracing::info!(instance_id, state = desired.as_str(), "waiting for instance state");

        loop {
            if start.elapsed() >= timeout {
                return Err(Error::WaitTimeout {
                    resource: instance_id.to_string(),
                    state: desired.as_str().to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }

            let resp = self
                .client
                .describe_instances()
                .instance_ids(instance_id)
                .send()
                .await
                .map_err(|e| Error::provision(instance_id, "describe instances", e))?;

            for reservation in resp.reservations() {
                for instance in reservation.instances() {
                    if instance.state().and_then(|s| s.name()) == Some(&desired) {
                        return Ok(InstanceInfo {
                            instance_id: instance_id.to_string(),
                            state: desired.as_str().to_string(),
                            public_ip: instance.public_ip_address().map(|s| s.to_string()),
                        });
                    }
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Terminate the named instance if it exists and wait for termination to
    /// finish (the security group cannot be deleted while the instance holds
    /// it). Returns the terminated instance id.
    pub async fn terminate_instance(
        &self,
        name: &str,
        wait_timeout: Duration,
    ) -> Result<Option<String>> {
        let Some(info) = self.find_instance_by_name(name).await? else {
            return Ok(None);
        };

        self.client
            .terminate_instances()
            .instance_ids(&info.instance_id)
            .send()
            .await
            .map_err(|e| Error::provision(name, "terminate instance", e))?;

        tracing::info!(instance_id = %info.instance_id, "terminating instance");

        self.wait_for_state(&info.instance_id, InstanceStateName::Terminated, wait_timeout)
            .await?;

        Ok(Some(info.instance_id))
    }

    // ========================================================================
    // Elastic IP
    // ========================================================================

    /// Find an Elastic IP by its Name tag.
    pub async fn find_address(&self, name: &str) -> Result<Option<AddressInfo>> {
        let resp = self
            .client
            .describe_addresses()
            .filters(Filter::builder().name("tag:Name").values(name).build())
            .send()
            .await
            .map_err(|e| Error::provision(name, "describe addresses", e))?;

        Ok(resp.addresses().first().map(|addr| AddressInfo {
            allocation_id: addr.allocation_id().unwrap_or_default().to_string(),
            public_ip: addr.public_ip().unwrap_or_default().to_string(),
            association_id: addr.association_id().map(|s| s.to_string()),
            instance_id: addr.instance_id().map(|s| s.to_string()),
        }))
    }

    /// Ensure an Elastic IP exists (tagged `name`) and is associated with the
    /// instance. Returns `(info, changed)`.
    pub async fn ensure_address(
        &self,
        name: &str,
        instance_id: &str,
    ) -> Result<(AddressInfo, bool)> {
        let (mut info, created) = match self.find_address(name).await? {
            Some(info) => (info, false),
            None => {
                let resp = self
                    .client
                    .allocate_address()
                    .domain(DomainType::Vpc)
                    .tag_specifications(
                        TagSpecification::builder()
                            .resource_type(ResourceType::ElasticIp)
                            .tags(Tag::builder().key("Name").value(name).build())
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| Error::provision(name, "allocate address", e))?;

                let info = AddressInfo {
                    allocation_id: resp.allocation_id().unwrap_or_default().to_string(),
                    public_ip: resp.public_ip().unwrap_or_default().to_string(),
                    association_id: None,
                    instance_id: None,
                };
                tracing::info!(public_ip = %info.public_ip, "allocated Elastic IP");
                (info, true)
            }
        };

        let mut changed = created;
        if info.instance_id.as_deref() != Some(instance_id) {
            let resp = self
                .client
                .associate_address()
                .allocation_id(&info.allocation_id)
                .instance_id(instance_id)
                .send()
                .await
                .map_err(|e| Error::provision(name, "associate address", e))?;

            info.association_id = resp.association_id().map(|s| s.to_string());
            info.instance_id = Some(instance_id.to_string());
            changed = true;
            tracing::info!(public_ip = %info.public_ip, instance_id, "associated Elastic IP");
        }

        Ok((info, changed))
    }

    /// Disassociate and release the Elastic IP if it exists.
    pub async fn release_address(&self, name: &str) -> Result<Option<String>> {
        let Some(info) = self.find_address(name).await? else {
            return Ok(None);
        };

        if let Some(ref association_id) = info.association_id {
            self.client
                .disassociate_address()
                .association_id(association_id)
                .send()
                .await
                .map_err(|e| Error::provision(name, "disassociate address", e))?;
        }

        self.client
            .release_address()
            .allocation_id(&info.allocation_id)
            .send()
            .await
            .map_err(|e| Error::provision(name, "release address", e))?;

        tracing::info!(public_ip = %info.public_ip, "released Elastic IP");
        Ok(Some(info.public_ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_ip_permission_tcp_rule() {
        let rule = SecurityGroupRule {
            protocol: "tcp".to_string(),
            from_port: 22,
            to_port: 22,
            cidr: "0.0.0.0/0".to_string(),
            description: Some("SSH access from anywhere".to_string()),
        };

        let perm = to_ip_permission(&rule);
        assert_eq!(perm.ip_protocol(), Some("tcp"));
        assert_eq!(perm.from_port(), Some(22));
        assert_eq!(perm.to_port(), Some(22));

        let ranges = perm.ip_ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].cidr_ip(), Some("0.0.0.0/0"));
        assert_eq!(ranges[0].description(), Some("SSH access from anywhere"));
    }

    #[test]
    fn test_to_ip_permission_all_outbound() {
        let rule = SecurityGroupRule {
            protocol: "-1".to_string(),
            from_port: 0,
            to_port: 0,
            cidr: "0.0.0.0/0".to_string(),
            description: None,
        };

        let perm = to_ip_permission(&rule);
        assert_eq!(perm.ip_protocol(), Some("-1"));
        assert!(perm.ip_ranges()[0].description().is_none());
    }

    #[test]
    fn test_most_recent_image_picks_latest() {
        let images = vec![
            aws_sdk_ec2::types::Image::builder()
                .image_id("ami-old")
                .creation_date("2023-01-15T00:00:00.000Z")
                .build(),
            aws_sdk_ec2::types::Image::builder()
                .image_id("ami-new")
                .creation_date("2024-03-01T00:00:00.000Z")
                .build(),
            aws_sdk_ec2::types::Image::builder()
                .image_id("ami-mid")
                .creation_date("2023-09-20T00:00:00.000Z")
                .build(),
        ];

        let latest = most_recent_image(&images).unwrap();
        assert_eq!(latest.image_id(), Some("ami-new"));
    }

    #[test]
    fn test_most_recent_image_empty() {
        assert!(most_recent_image(&[]).is_none());
    }
}
