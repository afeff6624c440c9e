use common::Result;
use datafusion::arrow::datatypes::DataType;
use datafusion::functions::expr_fn::date_part;
use datafusion::prelude::*;

use crate::processor::udf;

/// Retains only "NextSong" events. Applied exactly once, before any
/// projection, so that `users`, `time` and the fact join all observe the
/// same record set.
pub fn filter_next_song(activity: DataFrame) -> Result<DataFrame> {
    Ok(activity.filter(col("page").eq(lit("NextSong")))?)
}

/// `songs` dimension: one row per distinct
/// `(song_id, title, artist_id, year, duration)` tuple with a known id.
pub fn build_songs(catalog: DataFrame) -> Result<DataFrame> {
    let df = catalog
        .select(vec![
            col("song_id"),
            col("title"),
            col("artist_id"),
            col("year"),
            col("duration"),
        ])?
        .filter(col("song_id").is_not_null())?
        .distinct()?;
    Ok(df)
}

/// `artists` dimension: one row per distinct artist tuple with a known id.
pub fn build_artists(catalog: DataFrame) -> Result<DataFrame> {
    let df = catalog
        .select(vec![
            col("artist_id"),
            col("artist_name").alias("name"),
            col("artist_location").alias("location"),
            col("artist_latitude").alias("latitude"),
            col("artist_longitude").alias("longitude"),
        ])?
        .filter(col("artist_id").is_not_null())?
        .distinct()?;
    Ok(df)
}

/// `users` dimension, deduplicated on the full tuple. A user whose `level`
/// changed between events keeps one row per level; rows are not collapsed
/// to the latest level.
pub fn build_users(filtered: DataFrame) -> Result<DataFrame> {
    // ident() keeps the raw logs' camelCase names from being
    // lowercase-normalized during planning.
    let df = filtered
        .select(vec![
            ident("userId").alias("user_id"),
            ident("firstName").alias("first_name"),
            ident("lastName").alias("last_name"),
            col("gender"),
            col("level"),
        ])?
        .distinct()?;
    Ok(df)
}

/// Adds a `start_time` UTC timestamp column derived from the epoch-millis
/// `ts` field.
pub fn with_event_time(filtered: DataFrame) -> Result<DataFrame> {
    let to_timestamp = udf::epoch_millis_to_timestamp();
    Ok(filtered.with_column("start_time", to_timestamp.call(vec![col("ts")]))?)
}

/// `time` dimension: one row per distinct `start_time` in the filtered
/// activity, with its calendar decomposition. All derived fields are
/// functions of `start_time`, so deduplicating the full tuple is the same
/// as deduplicating on `start_time`.
///
/// `weekday` is fixed to 1=Sunday .. 7=Saturday; `week` is the ISO week of
/// year.
pub fn build_time(filtered: DataFrame) -> Result<DataFrame> {
    let df = with_event_time(filtered)?
        .select(vec![
            col("start_time"),
            calendar_part("hour").alias("hour"),
            calendar_part("day").alias("day"),
            calendar_part("week").alias("week"),
            calendar_part("month").alias("month"),
            calendar_part("year").alias("year"),
            (calendar_part("dow") + lit(1)).alias("weekday"),
        ])?
        .distinct()?;
    Ok(df)
}

fn calendar_part(part: &str) -> Expr {
    cast(date_part(lit(part), col("start_time")), DataType::Int32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{activity_schema, catalog_schema};
    use datafusion::arrow::array::{
        Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray,
        TimestampMillisecondArray,
    };
    use std::sync::Arc;

    // 2018-11-02T01:25:34.796Z, a Friday in ISO week 44.
    const TS_FRIDAY: i64 = 1541121934796;
    // 2018-11-21T21:56:47.796Z
    const TS_LATER: i64 = 1542837407796;

    fn catalog_df(ctx: &SessionContext) -> DataFrame {
        let batch = RecordBatch::try_new(
            Arc::new(catalog_schema()),
            vec![
                Arc::new(StringArray::from(vec![Some("S1"), Some("S1"), None])),
                Arc::new(StringArray::from(vec![Some("X"), Some("X"), Some("Z")])),
                Arc::new(StringArray::from(vec![Some("A1"), Some("A1"), Some("A2")])),
                Arc::new(StringArray::from(vec![
                    Some("Band"),
                    Some("Band"),
                    Some("Duo"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("Memphis"),
                    Some("Memphis"),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![Some(35.1), Some(35.1), None])),
                Arc::new(Float64Array::from(vec![Some(-90.0), Some(-90.0), None])),
                Arc::new(Int64Array::from(vec![Some(2000), Some(2000), Some(0)])),
                Arc::new(Float64Array::from(vec![
                    Some(200.0),
                    Some(200.0),
                    Some(95.5),
                ])),
            ],
        )
        .unwrap();
        ctx.read_batch(batch).unwrap()
    }

    fn activity_df(ctx: &SessionContext) -> DataFrame {
        // Two identical NextSong events, one NextSong with a level change,
        // and one Home event that every builder must ignore.
        let batch = RecordBatch::try_new(
            Arc::new(activity_schema()),
            vec![
                Arc::new(StringArray::from(vec![
                    Some("Band"),
                    Some("Band"),
                    Some("Band"),
                    None,
                ])),
                Arc::new(StringArray::from(vec![
                    Some("X"),
                    Some("X"),
                    Some("Y"),
                    None,
                ])),
                Arc::new(StringArray::from(vec![
                    Some("7"),
                    Some("7"),
                    Some("7"),
                    Some("8"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("Lily"),
                    Some("Lily"),
                    Some("Lily"),
                    Some("Ray"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("Koch"),
                    Some("Koch"),
                    Some("Koch"),
                    Some("Soto"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("F"),
                    Some("F"),
                    Some("F"),
                    Some("M"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("free"),
                    Some("free"),
                    Some("paid"),
                    Some("free"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("NextSong"),
                    Some("NextSong"),
                    Some("NextSong"),
                    Some("Home"),
                ])),
                Arc::new(Int64Array::from(vec![
                    Some(TS_FRIDAY),
                    Some(TS_FRIDAY),
                    Some(TS_LATER),
                    Some(TS_LATER),
                ])),
                Arc::new(Int64Array::from(vec![
                    Some(99),
                    Some(99),
                    Some(100),
                    Some(101),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("agent"),
                    Some("agent"),
                    Some("agent"),
                    Some("agent"),
                ])),
            ],
        )
        .unwrap();
        ctx.read_batch(batch).unwrap()
    }

    async fn row_count(df: DataFrame) -> usize {
        df.count().await.unwrap()
    }

    #[tokio::test]
    async fn songs_drop_null_ids_and_duplicates() {
        let ctx = SessionContext::new();
        let songs = build_songs(catalog_df(&ctx)).unwrap();
        let batches = songs.collect().await.unwrap();

        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);

        let batch = &batches[0];
        let song_ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(song_ids.value(0), "S1");
        let years = batch
            .column(3)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(years.value(0), 2000);
    }

    #[tokio::test]
    async fn artists_keep_rows_with_null_song_id() {
        let ctx = SessionContext::new();
        let artists = build_artists(catalog_df(&ctx)).unwrap();
        // A2 only appears on the record whose song_id is null; the artist
        // row must survive anyway.
        assert_eq!(row_count(artists).await, 2);
    }

    #[tokio::test]
    async fn next_song_filter_drops_other_pages() {
        let ctx = SessionContext::new();
        let filtered = filter_next_song(activity_df(&ctx)).unwrap();
        assert_eq!(row_count(filtered).await, 3);
    }

    #[tokio::test]
    async fn users_keep_one_row_per_level() {
        let ctx = SessionContext::new();
        let filtered = filter_next_song(activity_df(&ctx)).unwrap();
        let users = build_users(filtered).unwrap();
        let batches = users.collect().await.unwrap();

        let mut seen: Vec<(String, String)> = Vec::new();
        for batch in &batches {
            let user_ids = batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            let levels = batch
                .column(4)
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            for i in 0..batch.num_rows() {
                seen.push((user_ids.value(i).to_string(), levels.value(i).to_string()));
            }
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("7".to_string(), "free".to_string()),
                ("7".to_string(), "paid".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn time_decomposes_distinct_timestamps() {
        let ctx = SessionContext::new();
        let filtered = filter_next_song(activity_df(&ctx)).unwrap();
        let time = build_time(filtered).unwrap().sort(vec![
            col("start_time").sort(true, false),
        ])
        .unwrap();
        let batches = time.collect().await.unwrap();

        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2, "duplicate timestamps must collapse");

        let batch = &batches[0];
        let start = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(start.value(0), TS_FRIDAY);

        let int_col = |idx: usize| {
            batch
                .column(idx)
                .as_any()
                .downcast_ref::<Int32Array>()
                .unwrap()
                .value(0)
        };
        assert_eq!(int_col(1), 1, "hour");
        assert_eq!(int_col(2), 2, "day");
        assert_eq!(int_col(3), 44, "week");
        assert_eq!(int_col(4), 11, "month");
        assert_eq!(int_col(5), 2018, "year");
        assert_eq!(int_col(6), 6, "weekday is 6 for a Friday (1=Sunday)");
    }
}
