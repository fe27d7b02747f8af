//! The deployment stack.
//!
//! One fixed, linear sequence of resource steps: security group, IAM user
//! with access key and policy, S3 bucket and website object, key pair,
//! AMI lookup, instance, Elastic IP, playbook handoff. Each step may consume
//! identifiers produced by earlier steps; the first failure aborts the run
//! and the underlying SDK error propagates unmodified. `destroy` walks the
//! same sequence in reverse.

use crate::aws::{ec2::Ec2, iam::Iam, s3::S3};
use crate::config::DeployConfig;
use crate::error::Result;
use crate::output;
use crate::outputs::StackOutputs;
use crate::playbook::PlaybookRunner;
use chrono::Utc;
use std::path::Path;

/// Outcome of a single stack step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The resource was created or modified
    Created,
    /// The resource already matched the desired state
    Unchanged,
    /// The resource was deleted
    Deleted,
    /// The step did not apply (already absent, or explicitly skipped)
    Skipped,
    /// Check mode: the step would change something
    WouldChange,
}

/// Running tally for the recap line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recap {
    pub created: u32,
    pub unchanged: u32,
    pub deleted: u32,
    pub skipped: u32,
}

impl Recap {
    fn record(&mut self, resource: &str, status: StepStatus, detail: &str) {
        match status {
            StepStatus::Created => {
                self.created += 1;
                output::created(resource, detail);
            }
            StepStatus::Unchanged => {
                self.unchanged += 1;
                output::ok(resource, detail);
            }
            StepStatus::Deleted => {
                self.deleted += 1;
                output::deleted(resource, detail);
            }
            StepStatus::Skipped => {
                self.skipped += 1;
                output::skipped(resource, detail);
            }
            StepStatus::WouldChange => {
                self.created += 1;
                output::would(resource, detail);
            }
        }
    }

    fn print(&self) {
        output::recap(self.created, self.unchanged, self.deleted, self.skipped, 0);
    }
}

/// Options for a provisioning run.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Report what would change without touching anything
    pub check_mode: bool,
    /// Stop after the Elastic IP; do not run the playbook
    pub skip_playbook: bool,
}

/// The deployment stack bound to AWS service clients.
pub struct Stack {
    config: DeployConfig,
    ec2: Ec2,
    iam: Iam,
    s3: S3,
}

impl Stack {
    /// Resolve SDK configuration and bind service clients.
    pub async fn connect(config: DeployConfig) -> Self {
        let sdk = crate::aws::sdk_config(&config.aws).await;
        Self {
            ec2: Ec2::new(&sdk),
            iam: Iam::new(&sdk),
            s3: S3::new(&sdk),
            config,
        }
    }

    /// Provision the stack in order. Returns the published outputs, or
    /// `None` in check mode.
    pub async fn up(&self, opts: UpOptions) -> Result<Option<StackOutputs>> {
        output::deploy_header(&self.config.instance.name);

        if opts.check_mode {
            self.preview(opts).await?;
            return Ok(None);
        }

        let mut recap = Recap::default();
        let sg = &self.config.security_group;
        let iam = &self.config.iam;
        let bucket = &self.config.bucket;
        let keypair = &self.config.keypair;
        let instance = &self.config.instance;

        output::step_header(&sg.name);
        let (group_id, created) = self.ec2.ensure_security_group(sg).await?;
        recap.record(&sg.name, status_of(created), &group_id);

        output::step_header(&iam.user_name);
        let (_, created) = self.iam.ensure_user(&iam.user_name).await?;
        recap.record(&iam.user_name, status_of(created), "user");

        let (access_key, created) = self.iam.ensure_access_key(&iam.user_name).await?;
        recap.record(&iam.user_name, status_of(created), &access_key.access_key_id);

        let created = self.iam.ensure_policy_attachment(iam).await?;
        recap.record(&iam.user_name, status_of(created), &iam.policy_arn);

        output::step_header(&bucket.name);
        let (_, created) = self.s3.ensure_bucket(&bucket.name).await?;
        recap.record(&bucket.name, status_of(created), "bucket");

        self.s3.put_website_object(bucket).await?;
        recap.record(
            &bucket.name,
            StepStatus::Created,
            &format!("uploaded {}", bucket.object_key),
        );

        output::step_header(&keypair.name);
        let (_, created) = self
            .ec2
            .ensure_key_pair(&keypair.name, &keypair.public_key)
            .await?;
        recap.record(&keypair.name, status_of(created), "key pair");

        output::step_header(&instance.name);
        let image_id = self.ec2.lookup_ami(&instance.ami).await?;
        recap.record(&instance.name, StepStatus::Unchanged, &format!("ami {}", image_id));

        let (info, created) = self
            .ec2
            .ensure_instance(instance, &image_id, &keypair.name, &group_id)
            .await?;
        recap.record(&instance.name, status_of(created), &info.instance_id);

        let eip_name = self.eip_name();
        let (address, created) = self.ec2.ensure_address(&eip_name, &info.instance_id).await?;
        recap.record(&eip_name, status_of(created), &address.public_ip);

        let playbook_name = self.config.playbook.path.display().to_string();
        output::step_header(&playbook_name);
        if opts.skip_playbook {
            recap.record(&playbook_name, StepStatus::Skipped, "--skip-playbook");
        } else {
            let runner = PlaybookRunner::new(&self.config.playbook, &bucket.name)?;
            runner.run(&address.public_ip).await?;
            recap.record(&playbook_name, StepStatus::Created, "playbook run complete");
        }

        recap.print();

        let mut outputs = StackOutputs {
            public_ip: address.public_ip,
            access_key_id: access_key.access_key_id,
            secret_access_key: access_key.secret_access_key,
            generated_at: Utc::now(),
        };
        outputs.inherit_secret(Path::new("."));

        Ok(Some(outputs))
    }

    /// Report what `up` would change, touching nothing. Lookups still hit
    /// the cloud: the current state is the only source of truth.
    async fn preview(&self, opts: UpOptions) -> Result<()> {
        let mut recap = Recap::default();
        let sg = &self.config.security_group;
        let iam = &self.config.iam;
        let bucket = &self.config.bucket;
        let keypair = &self.config.keypair;
        let instance = &self.config.instance;

        match self.ec2.find_security_group(&sg.name).await? {
            Some(id) => recap.record(&sg.name, StepStatus::Unchanged, &id),
            None => recap.record(&sg.name, StepStatus::WouldChange, "create security group"),
        }

        if self.iam.find_user(&iam.user_name).await? {
            recap.record(&iam.user_name, StepStatus::Unchanged, "user");
        } else {
            recap.record(
                &iam.user_name,
                StepStatus::WouldChange,
                "create user, access key, policy attachment",
            );
        }

        match self.s3.find_bucket(&bucket.name).await? {
            true => recap.record(&bucket.name, StepStatus::Unchanged, "bucket"),
            false => recap.record(&bucket.name, StepStatus::WouldChange, "create bucket"),
        }
        recap.record(
            &bucket.name,
            StepStatus::WouldChange,
            &format!("upload {}", bucket.object_key),
        );

        match self.ec2.find_key_pair(&keypair.name).await? {
            Some(_) => recap.record(&keypair.name, StepStatus::Unchanged, "key pair"),
            None => recap.record(&keypair.name, StepStatus::WouldChange, "import key pair"),
        }

        let existing = self.ec2.find_instance_by_name(&instance.name).await?;
        match &existing {
            Some(info) => recap.record(&instance.name, StepStatus::Unchanged, &info.instance_id),
            None => recap.record(
                &instance.name,
                StepStatus::WouldChange,
                &format!("launch {} instance", instance.instance_type),
            ),
        }

        let eip_name = self.eip_name();
        let address = self.ec2.find_address(&eip_name).await?;
        match &address {
            Some(info) => recap.record(&eip_name, StepStatus::Unchanged, &info.public_ip),
            None => recap.record(&eip_name, StepStatus::WouldChange, "allocate and associate"),
        }

        let playbook_name = self.config.playbook.path.display().to_string();
        if opts.skip_playbook {
            recap.record(&playbook_name, StepStatus::Skipped, "--skip-playbook");
        } else {
            let ip = address
                .map(|a| a.public_ip)
                .unwrap_or_else(|| "(pending)".to_string());
            match PlaybookRunner::new(&self.config.playbook, &bucket.name) {
                Ok(runner) => {
                    recap.record(&playbook_name, StepStatus::WouldChange, &runner.rendered(&ip));
                }
                Err(_) => recap.record(
                    &playbook_name,
                    StepStatus::Skipped,
                    "playbook.private_key_path not configured",
                ),
            }
        }

        recap.print();
        Ok(())
    }

    /// Tear the stack down in reverse order. Steps whose resource is
    /// already gone are reported as skipped.
    pub async fn destroy(&self) -> Result<()> {
        output::deploy_header(&self.config.instance.name);

        let mut recap = Recap::default();
        let sg = &self.config.security_group;
        let iam = &self.config.iam;
        let bucket = &self.config.bucket;
        let keypair = &self.config.keypair;
        let instance = &self.config.instance;

        let eip_name = self.eip_name();
        output::step_header(&eip_name);
        match self.ec2.release_address(&eip_name).await? {
            Some(ip) => recap.record(&eip_name, StepStatus::Deleted, &ip),
            None => recap.record(&eip_name, StepStatus::Skipped, "already absent"),
        }

        output::step_header(&instance.name);
        match self
            .ec2
            .terminate_instance(&instance.name, instance.wait_timeout)
            .await?
        {
            Some(id) => recap.record(&instance.name, StepStatus::Deleted, &id),
            None => recap.record(&instance.name, StepStatus::Skipped, "already absent"),
        }

        output::step_header(&keypair.name);
        match self.ec2.delete_key_pair(&keypair.name).await? {
            Some(_) => recap.record(&keypair.name, StepStatus::Deleted, "key pair"),
            None => recap.record(&keypair.name, StepStatus::Skipped, "already absent"),
        }

        output::step_header(&bucket.name);
        match self.s3.delete_bucket(bucket).await? {
            Some(_) => recap.record(&bucket.name, StepStatus::Deleted, "bucket and object"),
            None => recap.record(&bucket.name, StepStatus::Skipped, "already absent"),
        }

        output::step_header(&iam.user_name);
        match self.iam.delete_user(iam).await? {
            Some(_) => recap.record(&iam.user_name, StepStatus::Deleted, "user, keys, policy"),
            None => recap.record(&iam.user_name, StepStatus::Skipped, "already absent"),
        }

        output::step_header(&sg.name);
        match self.ec2.delete_security_group(&sg.name).await? {
            Some(id) => recap.record(&sg.name, StepStatus::Deleted, &id),
            None => recap.record(&sg.name, StepStatus::Skipped, "already absent"),
        }

        recap.print();
        Ok(())
    }

    /// Report what `destroy` would remove, touching nothing.
    pub async fn preview_destroy(&self) -> Result<()> {
        output::deploy_header(&self.config.instance.name);

        let mut recap = Recap::default();
        let eip_name = self.eip_name();

        match self.ec2.find_address(&eip_name).await? {
            Some(info) => recap.record(&eip_name, StepStatus::WouldChange, &format!("release {}", info.public_ip)),
            None => recap.record(&eip_name, StepStatus::Skipped, "already absent"),
        }

        let instance = &self.config.instance;
        match self.ec2.find_instance_by_name(&instance.name).await? {
            Some(info) => recap.record(&instance.name, StepStatus::WouldChange, &format!("terminate {}", info.instance_id)),
            None => recap.record(&instance.name, StepStatus::Skipped, "already absent"),
        }

        let keypair = &self.config.keypair;
        match self.ec2.find_key_pair(&keypair.name).await? {
            Some(_) => recap.record(&keypair.name, StepStatus::WouldChange, "delete key pair"),
            None => recap.record(&keypair.name, StepStatus::Skipped, "already absent"),
        }

        let bucket = &self.config.bucket;
        match self.s3.find_bucket(&bucket.name).await? {
            true => recap.record(&bucket.name, StepStatus::WouldChange, "delete bucket and object"),
            false => recap.record(&bucket.name, StepStatus::Skipped, "already absent"),
        }

        let iam = &self.config.iam;
        match self.iam.find_user(&iam.user_name).await? {
            true => recap.record(&iam.user_name, StepStatus::WouldChange, "delete user, keys, policy"),
            false => recap.record(&iam.user_name, StepStatus::Skipped, "already absent"),
        }

        let sg = &self.config.security_group;
        match self.ec2.find_security_group(&sg.name).await? {
            Some(id) => recap.record(&sg.name, StepStatus::WouldChange, &format!("delete {}", id)),
            None => recap.record(&sg.name, StepStatus::Skipped, "already absent"),
        }

        recap.print();
        Ok(())
    }

    /// The Name tag used for the Elastic IP allocation.
    fn eip_name(&self) -> String {
        format!("{}-eip", self.config.instance.name)
    }
}

/// Map an ensure result onto a step status.
fn status_of(created: bool) -> StepStatus {
    if created {
        StepStatus::Created
    } else {
        StepStatus::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of() {
        assert_eq!(status_of(true), StepStatus::Created);
        assert_eq!(status_of(false), StepStatus::Unchanged);
    }

    #[test]
    fn test_recap_tallies_by_status() {
        let mut recap = Recap::default();
        recap.record("a", StepStatus::Created, "x");
        recap.record("b", StepStatus::Created, "x");
        recap.record("c", StepStatus::Unchanged, "x");
        recap.record("d", StepStatus::Skipped, "x");
        recap.record("e", StepStatus::Deleted, "x");

        assert_eq!(recap.created, 2);
        assert_eq!(recap.unchanged, 1);
        assert_eq!(recap.skipped, 1);
        assert_eq!(recap.deleted, 1);
    }

    #[test]
    fn test_eip_name_follows_instance_name() {
        let config = DeployConfig::default();
        assert_eq!(format!("{}-eip", config.instance.name), "web-server-eip");
    }
}
