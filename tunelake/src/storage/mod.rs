use std::sync::Arc;

use common::config::{S3Config, Settings};
use common::{Error, Result};
use datafusion::prelude::SessionContext;
use object_store::aws::AmazonS3Builder;
use url::Url;

/// Registers an S3 object store with the session for every configured root
/// that lives on object storage. Local filesystem roots need no
/// registration.
pub fn register_object_stores(
    ctx: &SessionContext,
    settings: &Settings,
    s3: &S3Config,
) -> Result<()> {
    for root in [&settings.paths.source, &settings.paths.destination] {
        if let Some(bucket) = bucket_name(root)? {
            register_bucket(ctx, s3, &bucket)?;
        }
    }
    Ok(())
}

fn bucket_name(root: &str) -> Result<Option<String>> {
    if !root.starts_with("s3://") {
        return Ok(None);
    }
    let url = Url::parse(root)?;
    let bucket = url
        .host_str()
        .ok_or_else(|| Error::InvalidInput(format!("S3 path '{}' has no bucket", root)))?;
    Ok(Some(bucket.to_string()))
}

fn register_bucket(ctx: &SessionContext, config: &S3Config, bucket: &str) -> Result<()> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&config.region)
        .with_access_key_id(&config.access_key)
        .with_secret_access_key(&config.secret_key);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if config.allow_http {
        builder = builder.with_allow_http(true);
    }

    let store = Arc::new(builder.build()?);
    let url = Url::parse(&format!("s3://{}", bucket))?;
    ctx.runtime_env().register_object_store(&url, store);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_parses_s3_urls_only() {
        assert_eq!(
            bucket_name("s3://raw-bucket/prefix").unwrap(),
            Some("raw-bucket".to_string())
        );
        assert_eq!(bucket_name("/data/raw").unwrap(), None);
        assert_eq!(bucket_name("file:///data/raw").unwrap(), None);
    }
}
