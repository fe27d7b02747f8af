//! IAM operations: the read-only user, its access key, and the managed
//! policy attachment.

use crate::config::IamSettings;
use crate::error::{Error, Result};
use aws_sdk_iam::Client;

/// Access key credentials for the deployment user.
///
/// The secret is only present when this run created the key: AWS never
/// returns it again afterwards.
#[derive(Debug, Clone)]
pub struct AccessKeyInfo {
    pub access_key_id: String,
    pub secret_access_key: Option<String>,
}

/// IAM service operations.
pub struct Iam {
    client: Client,
}

impl Iam {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Whether the user exists.
    pub async fn find_user(&self, name: &str) -> Result<bool> {
        match self.client.get_user().user_name(name).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    Ok(false)
                } else {
                    Err(Error::provision(name, "get user", service_err))
                }
            }
        }
    }

    /// Ensure the user exists. Returns `(user_name, created)`.
    pub async fn ensure_user(&self, name: &str) -> Result<(String, bool)> {
        if self.find_user(name).await? {
            tracing::debug!(name, "IAM user already exists");
            return Ok((name.to_string(), false));
        }

        self.client
            .create_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provision(name, "create user", e))?;

        tracing::info!(name, "created IAM user");
        Ok((name.to_string(), true))
    }

    /// Ensure the managed policy is attached to the user.
    /// Returns true when the attachment was newly made.
    pub async fn ensure_policy_attachment(&self, settings: &IamSettings) -> Result<bool> {
        let resp = self
            .client
            .list_attached_user_policies()
            .user_name(&settings.user_name)
            .send()
            .await
            .map_err(|e| Error::provision(&settings.user_name, "list attached policies", e))?;

        let attached = resp
            .attached_policies()
            .iter()
            .any(|p| p.policy_arn() == Some(settings.policy_arn.as_str()));

        if attached {
            tracing::debug!(policy = %settings.policy_arn, "policy already attached");
            return Ok(false);
        }

        self.client
            .attach_user_policy()
            .user_name(&settings.user_name)
            .policy_arn(&settings.policy_arn)
            .send()
            .await
            .map_err(|e| Error::provision(&settings.user_name, "attach user policy", e))?;

        tracing::info!(policy = %settings.policy_arn, user = %settings.user_name, "attached policy");
        Ok(true)
    }

    /// Ensure the user has an access key. A new key (with its secret) is
    /// created only when none exists; an existing key is reused by id.
    /// Returns `(info, created)`.
    pub async fn ensure_access_key(&self, user_name: &str) -> Result<(AccessKeyInfo, bool)> {
        let resp = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| Error::provision(user_name, "list access keys", e))?;

        if let Some(existing) = resp.access_key_metadata().first() {
            let access_key_id = existing.access_key_id().unwrap_or_default().to_string();
            tracing::debug!(%access_key_id, "access key already exists");
            return Ok((
                AccessKeyInfo {
                    access_key_id,
                    secret_access_key: None,
                },
                false,
            ));
        }

        let resp = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| Error::provision(user_name, "create access key", e))?;

        let key = resp
            .access_key()
            .ok_or_else(|| Error::Internal("create_access_key returned no key".to_string()))?;

        tracing::info!(access_key_id = key.access_key_id(), "created access key");
        Ok((
            AccessKeyInfo {
                access_key_id: key.access_key_id().to_string(),
                secret_access_key: Some(key.secret_access_key().to_string()),
            },
            true,
        ))
    }

    /// Delete the user and everything hanging off it (access keys, policy
    /// attachment). AWS refuses to delete a user that still has either.
    /// Returns the deleted user name.
    pub async fn delete_user(&self, settings: &IamSettings) -> Result<Option<String>> {
        let name = settings.user_name.as_str();
        if !self.find_user(name).await? {
            return Ok(None);
        }

        let keys = self
            .client
            .list_access_keys()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provision(name, "list access keys", e))?;

        for key in keys.access_key_metadata() {
            if let Some(key_id) = key.access_key_id() {
                self.client
                    .delete_access_key()
                    .user_name(name)
                    .access_key_id(key_id)
                    .send()
                    .await
                    .map_err(|e| Error::provision(name, "delete access key", e))?;
                tracing::info!(access_key_id = key_id, "deleted access key");
            }
        }

        let policies = self
            .client
            .list_attached_user_policies()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provision(name, "list attached policies", e))?;

        for policy in policies.attached_policies() {
            if let Some(arn) = policy.policy_arn() {
                self.client
                    .detach_user_policy()
                    .user_name(name)
                    .policy_arn(arn)
                    .send()
                    .await
                    .map_err(|e| Error::provision(name, "detach user policy", e))?;
                tracing::info!(policy = arn, "detached policy");
            }
        }

        self.client
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provision(name, "delete user", e))?;

        tracing::info!(name, "deleted IAM user");
        Ok(Some(name.to_string()))
    }
}
