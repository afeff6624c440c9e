use std::sync::Arc;

use common::Result;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{DataFrame, SessionContext};
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use tracing::info;
use url::Url;

/// Writes tables as hive-partitioned Parquet under a destination root.
///
/// Semantics are full overwrite: prior contents of `<destination>/<table>`
/// are removed before the write. There is no append, no merge, and no
/// cross-table transaction — a failed write leaves earlier tables in
/// place. Concurrent runs against the same destination race; callers must
/// serialize invocations.
pub struct PartitionedSink {
    ctx: Arc<SessionContext>,
    destination_root: String,
}

impl PartitionedSink {
    pub fn new(ctx: Arc<SessionContext>, destination_root: &str) -> Self {
        Self {
            ctx,
            destination_root: destination_root.trim_end_matches('/').to_string(),
        }
    }

    pub async fn write_table(
        &self,
        df: DataFrame,
        table: &str,
        partition_by: &[&str],
    ) -> Result<()> {
        let target = format!("{}/{}", self.destination_root, table);

        self.clear_destination(&target).await?;

        let options = DataFrameWriteOptions::new()
            .with_partition_by(partition_by.iter().map(|s| s.to_string()).collect());

        info!(table, target = %target, partitions = ?partition_by, "Writing table");
        df.write_parquet(&target, options, None).await?;

        Ok(())
    }

    async fn clear_destination(&self, target: &str) -> Result<()> {
        if target.starts_with("s3://") {
            self.clear_object_prefix(target).await
        } else {
            match tokio::fs::remove_dir_all(target).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }

    async fn clear_object_prefix(&self, target: &str) -> Result<()> {
        let url = Url::parse(target)?;
        let store = self
            .ctx
            .runtime_env()
            .object_store_registry
            .get_store(&url)?;
        let prefix = ObjectPath::from(url.path());

        let locations = store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .boxed();
        let deleted = store
            .delete_stream(locations)
            .try_collect::<Vec<_>>()
            .await?;

        if !deleted.is_empty() {
            info!(target = %target, objects = deleted.len(), "Cleared prior table contents");
        }
        Ok(())
    }
}
