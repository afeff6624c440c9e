use std::sync::Arc;

use common::{Error, Result};
use datafusion::prelude::{DataFrame, NdJsonReadOptions, SessionContext};
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use tracing::info;
use url::Url;

use crate::models::schema::{activity_schema, catalog_schema};

/// Catalog documents sit four directory levels under the source root,
/// activity logs three. The nesting is part of the corpus layout and is
/// not configurable.
pub const CATALOG_GLOB: &str = "song_data/*/*/*/*.json";
pub const ACTIVITY_GLOB: &str = "log_data/*/*/*.json";

/// Loads the two raw NDJSON corpora into lazy `DataFrame`s with declared
/// schemas.
///
/// A record that cannot be decoded against the declared schema fails the
/// batch and aborts the run; corrupt lines are never silently skipped.
pub struct RecordLoader {
    ctx: Arc<SessionContext>,
    source_root: String,
}

impl RecordLoader {
    pub fn new(ctx: Arc<SessionContext>, source_root: &str) -> Self {
        Self {
            ctx,
            source_root: source_root.trim_end_matches('/').to_string(),
        }
    }

    pub async fn load_catalog(&self) -> Result<DataFrame> {
        let files = self.discover(CATALOG_GLOB).await?;
        info!(files = files.len(), pattern = CATALOG_GLOB, "Loading song catalog");

        let schema = catalog_schema();
        let options = NdJsonReadOptions::default().schema(&schema);
        let df = self.ctx.read_json(files, options).await?;
        Ok(df)
    }

    pub async fn load_activity(&self) -> Result<DataFrame> {
        let files = self.discover(ACTIVITY_GLOB).await?;
        info!(files = files.len(), pattern = ACTIVITY_GLOB, "Loading activity logs");

        let schema = activity_schema();
        let options = NdJsonReadOptions::default().schema(&schema);
        let df = self.ctx.read_json(files, options).await?;
        Ok(df)
    }

    /// Expands the corpus pattern into concrete file paths.
    /// `ListingTableUrl` does not expand globs, so discovery happens here;
    /// an empty match set is an error rather than five empty tables.
    async fn discover(&self, pattern: &str) -> Result<Vec<String>> {
        let mut files = if self.source_root.starts_with("s3://") {
            self.discover_objects(pattern).await?
        } else {
            discover_local(&self.source_root, pattern)?
        };

        if files.is_empty() {
            return Err(Error::Storage(format!(
                "no records found under {}/{}",
                self.source_root, pattern
            )));
        }
        files.sort();
        Ok(files)
    }

    async fn discover_objects(&self, pattern: &str) -> Result<Vec<String>> {
        let url = Url::parse(&self.source_root)?;
        let bucket = url.host_str().ok_or_else(|| {
            Error::InvalidInput(format!("S3 path '{}' has no bucket", self.source_root))
        })?;
        let store = self
            .ctx
            .runtime_env()
            .object_store_registry
            .get_store(&url)?;

        let base = url.path().trim_matches('/').to_string();
        let corpus_dir = pattern.split('/').next().unwrap_or_default();
        let prefix_str = if base.is_empty() {
            corpus_dir.to_string()
        } else {
            format!("{}/{}", base, corpus_dir)
        };
        let prefix = ObjectPath::from(prefix_str.as_str());

        let metas: Vec<_> = store.list(Some(&prefix)).try_collect().await?;

        let mut files = Vec::new();
        for meta in metas {
            let key: &str = meta.location.as_ref();
            let rel = if base.is_empty() {
                key
            } else {
                match key.strip_prefix(base.as_str()) {
                    Some(rest) => rest.trim_start_matches('/'),
                    None => continue,
                }
            };
            if matches_pattern(rel, pattern) {
                files.push(format!("s3://{}/{}", bucket, key));
            }
        }
        Ok(files)
    }
}

fn discover_local(root: &str, pattern: &str) -> Result<Vec<String>> {
    let full = format!("{}/{}", root, pattern);
    let entries = glob::glob(&full)
        .map_err(|e| Error::InvalidInput(format!("bad corpus pattern '{}': {}", full, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(files)
}

/// Segment-wise match of a relative object key against a corpus pattern.
/// `*` matches exactly one segment, `*.json` any segment with that suffix.
fn matches_pattern(rel: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = rel.split('/').collect();
    let parts: Vec<&str> = pattern.split('/').collect();

    segments.len() == parts.len()
        && segments
            .iter()
            .zip(parts.iter())
            .all(|(segment, part)| match part.strip_prefix('*') {
                Some(suffix) if suffix.is_empty() => true,
                Some(suffix) => segment.ends_with(suffix),
                None => segment == part,
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CATALOG_LINE: &str = r#"{"song_id": "S1", "title": "X", "artist_id": "A1", "artist_name": "Band", "artist_location": null, "artist_latitude": null, "artist_longitude": null, "year": 2000, "duration": 200.0}"#;

    #[test]
    fn pattern_matches_exact_nesting_only() {
        assert!(matches_pattern("song_data/A/B/C/f.json", CATALOG_GLOB));
        assert!(!matches_pattern("song_data/A/B/f.json", CATALOG_GLOB));
        assert!(!matches_pattern("song_data/A/B/C/D/f.json", CATALOG_GLOB));
        assert!(!matches_pattern("song_data/A/B/C/f.parquet", CATALOG_GLOB));
        assert!(matches_pattern("log_data/2018/11/f.json", ACTIVITY_GLOB));
        assert!(!matches_pattern("log_data/2018/f.json", ACTIVITY_GLOB));
    }

    #[tokio::test]
    async fn loader_discovers_nested_corpus_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("song_data/A/B/C");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("part-1.json"), format!("{}\n", CATALOG_LINE)).unwrap();

        let ctx = Arc::new(SessionContext::new());
        let loader = RecordLoader::new(ctx, &dir.path().to_string_lossy());
        let catalog = loader.load_catalog().await.unwrap();
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn files_at_the_wrong_depth_are_ignored() {
        let dir = TempDir::new().unwrap();
        let shallow = dir.path().join("song_data/A/B");
        fs::create_dir_all(&shallow).unwrap();
        fs::write(shallow.join("part-1.json"), format!("{}\n", CATALOG_LINE)).unwrap();

        let ctx = Arc::new(SessionContext::new());
        let loader = RecordLoader::new(ctx, &dir.path().to_string_lossy());
        assert!(loader.load_catalog().await.is_err(), "nothing at 4 levels");
    }

    #[tokio::test]
    async fn empty_corpus_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(SessionContext::new());
        let loader = RecordLoader::new(ctx, &dir.path().to_string_lossy());
        assert!(loader.load_catalog().await.is_err());
        assert!(loader.load_activity().await.is_err());
    }
}
