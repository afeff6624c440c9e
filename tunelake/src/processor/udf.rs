use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::DateTime;
use datafusion::arrow::array::{Array, Int64Array, TimestampMillisecondArray};
use datafusion::arrow::datatypes::{DataType, TimeUnit};
use datafusion::common::DataFusionError;
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, Volatility, create_udf};

type DataFusionResult<T> = std::result::Result<T, DataFusionError>;

/// Converts epoch milliseconds (the activity log `ts` field) into a UTC
/// timestamp column with millisecond precision. The timezone is fixed to
/// UTC rather than inherited from the host environment.
pub fn epoch_millis_to_timestamp() -> ScalarUDF {
    create_udf(
        "epoch_millis_to_timestamp",
        vec![DataType::Int64],
        DataType::Timestamp(TimeUnit::Millisecond, None),
        Volatility::Immutable,
        Arc::new(convert_to_timestamp),
    )
}

/// Assigns surrogate keys to fact rows from a shared atomic counter.
///
/// Keys are unique within the process and monotonically non-decreasing in
/// assignment order, but batches may execute in any order, so numeric order
/// does not follow `start_time`. Values are not dense either: a plan that
/// executes more than once (e.g. a count before the write) advances the
/// counter each time.
pub fn songplay_id() -> ScalarUDF {
    let counter = Arc::new(AtomicI64::new(0));
    create_udf(
        "songplay_id",
        vec![DataType::Int64],
        DataType::Int64,
        Volatility::Volatile,
        Arc::new(move |args| assign_surrogate_ids(&counter, args)),
    )
}

fn convert_to_timestamp(args: &[ColumnarValue]) -> DataFusionResult<ColumnarValue> {
    let int_array = match &args[0] {
        ColumnarValue::Array(array) => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| DataFusionError::Internal("Expected int64 array".to_string()))?,
        ColumnarValue::Scalar(_) => {
            return Err(DataFusionError::Internal(
                "Scalar inputs not supported".to_string(),
            ));
        }
    };

    // Out-of-range millis become null rather than a bogus epoch value.
    let result: TimestampMillisecondArray = int_array
        .iter()
        .map(|opt_ts| {
            opt_ts.and_then(|ts| {
                DateTime::from_timestamp_millis(ts).map(|dt| dt.timestamp_millis())
            })
        })
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}

fn assign_surrogate_ids(
    counter: &AtomicI64,
    args: &[ColumnarValue],
) -> DataFusionResult<ColumnarValue> {
    let len = match &args[0] {
        ColumnarValue::Array(array) => array.len(),
        ColumnarValue::Scalar(_) => {
            return Err(DataFusionError::Internal(
                "Scalar inputs not supported".to_string(),
            ));
        }
    };

    let start = counter.fetch_add(len as i64, Ordering::Relaxed);
    let result: Int64Array = (start..start + len as i64).map(Some).collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}
