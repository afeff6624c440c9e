pub mod dimensions;
pub mod facts;
pub mod loader;
pub mod sink;
pub mod udf;

use std::sync::Arc;

use common::Result;
use common::config::Settings;
use datafusion::prelude::SessionContext;
use tracing::{info, warn};

use crate::storage;
use loader::RecordLoader;
use sink::PartitionedSink;

/// Per-table row counts for one run, plus the number of filtered activity
/// records the fact join dropped for lack of a catalog match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlSummary {
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time: usize,
    pub songplays: usize,
    pub unmatched_events: usize,
}

/// One full pass over the two corpora: load, build the four dimensions and
/// the fact table, write all five out. Every run recomputes everything;
/// there is no incremental update.
pub struct EtlProcessor {
    loader: RecordLoader,
    sink: PartitionedSink,
}

impl EtlProcessor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let ctx = Arc::new(SessionContext::new());

        if let Some(s3) = &settings.s3 {
            storage::register_object_stores(&ctx, settings, s3)?;
        }

        Ok(Self {
            loader: RecordLoader::new(ctx.clone(), &settings.paths.source),
            sink: PartitionedSink::new(ctx, &settings.paths.destination),
        })
    }

    pub async fn run(&self) -> Result<EtlSummary> {
        let catalog = self.loader.load_catalog().await?;
        let activity = self.loader.load_activity().await?;

        // The NextSong filter happens once; every activity-derived table
        // and the fact join observe the same record set.
        let filtered = dimensions::filter_next_song(activity)?;

        let songs = dimensions::build_songs(catalog.clone())?;
        let artists = dimensions::build_artists(catalog.clone())?;
        let users = dimensions::build_users(filtered.clone())?;
        let time = dimensions::build_time(filtered.clone())?;
        let songplays = facts::build_songplays(catalog.clone(), filtered.clone())?;

        let summary = EtlSummary {
            songs: songs.clone().count().await?,
            artists: artists.clone().count().await?,
            users: users.clone().count().await?,
            time: time.clone().count().await?,
            songplays: songplays.clone().count().await?,
            unmatched_events: facts::unmatched_events(catalog, filtered)?.count().await?,
        };

        if summary.unmatched_events > 0 {
            warn!(
                dropped = summary.unmatched_events,
                "Activity records without a catalog match were dropped from songplays"
            );
        }

        // A failed write aborts the remaining tables but never rolls back
        // tables already written.
        self.sink.write_table(songs, "songs", &["year", "artist_id"]).await?;
        self.sink.write_table(artists, "artists", &[]).await?;
        self.sink.write_table(users, "users", &[]).await?;
        self.sink.write_table(time, "time", &["year", "month"]).await?;
        self.sink
            .write_table(songplays, "songplays", &["year", "month"])
            .await?;

        info!(?summary, "Pipeline run complete");
        Ok(summary)
    }
}
