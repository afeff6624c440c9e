use common::Result;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::JoinType;
use datafusion::functions::expr_fn::date_part;
use datafusion::prelude::*;

use crate::processor::dimensions::with_event_time;
use crate::processor::udf;

/// `songplays` fact table.
///
/// A fact row exists for every filtered activity record whose
/// `(artist, song)` pair exactly equals a catalog record's
/// `(artist_name, title)` — case-sensitive string equality, inner-join
/// semantics, executed as an engine hash join. Non-matching events are
/// dropped here; `unmatched_events` exposes how many.
///
/// The join reads the raw catalog and the filtered activity directly and
/// never consults the dimension tables. `location` carries the catalog's
/// `artist_location`, not anything from the event.
pub fn build_songplays(catalog: DataFrame, filtered: DataFrame) -> Result<DataFrame> {
    let songs = catalog.select(vec![
        col("song_id"),
        col("artist_id"),
        col("artist_location"),
        col("artist_name"),
        col("title"),
    ])?;

    // ident() preserves the camelCase log column names during planning.
    let events = with_event_time(filtered)?.select(vec![
        col("start_time"),
        ident("userId"),
        col("level"),
        ident("sessionId"),
        ident("userAgent"),
        col("artist"),
        col("song"),
    ])?;

    let joined = events.join(
        songs,
        JoinType::Inner,
        &["artist", "song"],
        &["artist_name", "title"],
        None,
    )?;

    let surrogate = udf::songplay_id();
    let df = joined.select(vec![
        surrogate.call(vec![ident("sessionId")]).alias("songplay_id"),
        col("start_time"),
        ident("userId").alias("user_id"),
        col("level"),
        col("song_id"),
        col("artist_id"),
        ident("sessionId").alias("session_id"),
        col("artist_location").alias("location"),
        ident("userAgent").alias("user_agent"),
        cast(date_part(lit("month"), col("start_time")), DataType::Int32).alias("month"),
        cast(date_part(lit("year"), col("start_time")), DataType::Int32).alias("year"),
    ])?;

    Ok(df)
}

/// Filtered activity records with no catalog match. Counted after a run as
/// the JoinMismatch observability signal; the rows themselves never reach
/// the fact table.
pub fn unmatched_events(catalog: DataFrame, filtered: DataFrame) -> Result<DataFrame> {
    let keys = catalog.select(vec![col("artist_name"), col("title")])?;
    let df = filtered.join(
        keys,
        JoinType::LeftAnti,
        &["artist", "song"],
        &["artist_name", "title"],
        None,
    )?;
    Ok(df)
}
