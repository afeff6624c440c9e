use arrow::datatypes::{DataType, Field, Schema};

/// Declared schema for the song-catalog corpus.
///
/// The corpus is newline-delimited JSON, one song per document. Declaring
/// the schema up front (instead of inferring it from the input) keeps the
/// loaded column types independent of record order and of which optional
/// fields happen to appear first. JSON fields not listed here are ignored
/// by the reader.
pub fn catalog_schema() -> Schema {
    Schema::new(vec![
        Field::new("song_id", DataType::Utf8, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
        // Release year; 0 in the corpus means unknown.
        Field::new("year", DataType::Int64, true),
        Field::new("duration", DataType::Float64, true),
    ])
}

/// Declared schema for the user-activity log corpus.
///
/// Only the fields the pipeline consumes are declared; the raw logs carry
/// more (auth, status, registration, ...) and those are dropped at load
/// time. `ts` is epoch milliseconds.
pub fn activity_schema() -> Schema {
    Schema::new(vec![
        Field::new("artist", DataType::Utf8, true),
        Field::new("song", DataType::Utf8, true),
        Field::new("userId", DataType::Utf8, true),
        Field::new("firstName", DataType::Utf8, true),
        Field::new("lastName", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("page", DataType::Utf8, true),
        Field::new("ts", DataType::Int64, true),
        Field::new("sessionId", DataType::Int64, true),
        Field::new("userAgent", DataType::Utf8, true),
    ])
}
