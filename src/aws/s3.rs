//! S3 operations: the private website bucket and its single page object.

use crate::config::BucketSettings;
use crate::error::{Error, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::path::Path;

/// Guess a content type from the object key extension.
fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// S3 service operations.
pub struct S3 {
    client: Client,
    region: Option<String>,
}

impl S3 {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
            region: config.region().map(|r| r.to_string()),
        }
    }

    /// Whether the bucket exists (and is accessible to us).
    pub async fn find_bucket(&self, name: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::provision(name, "head bucket", service_err))
                }
            }
        }
    }

    /// Ensure the bucket exists. Buckets are private by default; the
    /// deployment never attaches an ACL or a public-access policy.
    /// Returns `(bucket_name, created)`.
    pub async fn ensure_bucket(&self, name: &str) -> Result<(String, bool)> {
        if self.find_bucket(name).await? {
            tracing::debug!(name, "bucket already exists");
            return Ok((name.to_string(), false));
        }

        let mut req = self.client.create_bucket().bucket(name);

        // us-east-1 rejects an explicit location constraint
        if let Some(region) = self.region.as_deref().filter(|r| *r != "us-east-1") {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        req.send()
            .await
            .map_err(|e| Error::provision(name, "create bucket", e))?;

        tracing::info!(name, "created bucket");
        Ok((name.to_string(), true))
    }

    /// Upload the website page into the bucket.
    pub async fn put_website_object(&self, settings: &BucketSettings) -> Result<()> {
        let source: &Path = settings.website_file.as_path();
        if !source.exists() {
            return Err(Error::FileNotFound(source.to_path_buf()));
        }

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| Error::provision(&settings.name, "read website file", e))?;

        self.client
            .put_object()
            .bucket(&settings.name)
            .key(&settings.object_key)
            .content_type(content_type_for(&settings.object_key))
            .body(body)
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "put object", e))?;

        tracing::info!(
            bucket = %settings.name,
            key = %settings.object_key,
            "uploaded website object"
        );
        Ok(())
    }

    /// Delete the page object and the bucket if they exist.
    /// Returns the deleted bucket name.
    pub async fn delete_bucket(&self, settings: &BucketSettings) -> Result<Option<String>> {
        if !self.find_bucket(&settings.name).await? {
            return Ok(None);
        }

        // The bucket must be empty before it can go
        self.client
            .delete_object()
            .bucket(&settings.name)
            .key(&settings.object_key)
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "delete object", e))?;

        self.client
            .delete_bucket()
            .bucket(&settings.name)
            .send()
            .await
            .map_err(|e| Error::provision(&settings.name, "delete bucket", e))?;

        tracing::info!(name = %settings.name, "deleted bucket");
        Ok(Some(settings.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_website_page() {
        assert_eq!(content_type_for("index.html"), "text/html");
        assert_eq!(content_type_for("site/page.htm"), "text/html");
        assert_eq!(content_type_for("style.css"), "text/css");
        assert_eq!(content_type_for("archive.bin"), "application/octet-stream");
        assert_eq!(content_type_for("no-extension"), "application/octet-stream");
    }
}
