//! SDK error mapping.
//!
//! Maps AWS SDK errors to the `StoreError` taxonomy from
//! `orderstore_core::storage`, per operation. Throttling-class service
//! errors map to `Throttled` so the client's backoff applies to them and
//! nothing else.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;

use orderstore_core::storage::{RecordKey, StoreError};

/// Dispatch and timeout failures never reached the service.
fn connection_error<E, R>(err: &SdkError<E, R>) -> Option<StoreError> {
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(StoreError::Connection(err.to_string()))
        }
        _ => None,
    }
}

/// Classify errors the typed enums leave unhandled by their error code.
fn classify_by_code<E: ProvideErrorMetadata + Debug>(operation: &str, err: E) -> StoreError {
    let message = err.message().unwrap_or("no message").to_string();
    match err.code() {
        Some("ThrottlingException") => StoreError::Throttled(message),
        Some("ValidationException") => StoreError::Validation(message),
        _ => StoreError::Service(format!("{operation} failed: {err:?}")),
    }
}

/// Map a PutItem SDK error.
pub(super) fn map_put_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> StoreError {
    if let Some(connection) = connection_error(&err) {
        return connection;
    }
    match err.into_service_error() {
        PutItemError::ProvisionedThroughputExceededException(e) => {
            StoreError::Throttled(e.message().unwrap_or("throughput exceeded").to_string())
        }
        PutItemError::RequestLimitExceeded(e) => {
            StoreError::Throttled(e.message().unwrap_or("request limit exceeded").to_string())
        }
        PutItemError::ResourceNotFoundException(_) => {
            StoreError::Service("table not found".to_string())
        }
        err => classify_by_code("PutItem", err),
    }
}

/// Map a Scan SDK error.
pub(super) fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
) -> StoreError {
    if let Some(connection) = connection_error(&err) {
        return connection;
    }
    match err.into_service_error() {
        ScanError::ProvisionedThroughputExceededException(e) => {
            StoreError::Throttled(e.message().unwrap_or("throughput exceeded").to_string())
        }
        ScanError::RequestLimitExceeded(e) => {
            StoreError::Throttled(e.message().unwrap_or("request limit exceeded").to_string())
        }
        ScanError::ResourceNotFoundException(_) => {
            StoreError::Service("table not found".to_string())
        }
        err => classify_by_code("Scan", err),
    }
}

/// Map a Query SDK error.
pub(super) fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StoreError {
    if let Some(connection) = connection_error(&err) {
        return connection;
    }
    match err.into_service_error() {
        QueryError::ProvisionedThroughputExceededException(e) => {
            StoreError::Throttled(e.message().unwrap_or("throughput exceeded").to_string())
        }
        QueryError::RequestLimitExceeded(e) => {
            StoreError::Throttled(e.message().unwrap_or("request limit exceeded").to_string())
        }
        QueryError::ResourceNotFoundException(_) => {
            StoreError::Service("table or index not found".to_string())
        }
        err => classify_by_code("Query", err),
    }
}

/// Map an UpdateItem SDK error. A failed existence condition means the
/// record to update is absent.
pub(super) fn map_update_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    key: &RecordKey,
) -> StoreError {
    if let Some(connection) = connection_error(&err) {
        return connection;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => StoreError::NotFound {
            id: key.to_string(),
        },
        UpdateItemError::ProvisionedThroughputExceededException(e) => {
            StoreError::Throttled(e.message().unwrap_or("throughput exceeded").to_string())
        }
        UpdateItemError::RequestLimitExceeded(e) => {
            StoreError::Throttled(e.message().unwrap_or("request limit exceeded").to_string())
        }
        UpdateItemError::ResourceNotFoundException(_) => {
            StoreError::Service("table not found".to_string())
        }
        err => classify_by_code("UpdateItem", err),
    }
}

/// Map a BatchWriteItem SDK error.
pub(super) fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> StoreError {
    if let Some(connection) = connection_error(&err) {
        return connection;
    }
    match err.into_service_error() {
        BatchWriteItemError::ProvisionedThroughputExceededException(e) => {
            StoreError::Throttled(e.message().unwrap_or("throughput exceeded").to_string())
        }
        BatchWriteItemError::RequestLimitExceeded(e) => {
            StoreError::Throttled(e.message().unwrap_or("request limit exceeded").to_string())
        }
        BatchWriteItemError::ResourceNotFoundException(_) => {
            StoreError::Service("table not found".to_string())
        }
        err => classify_by_code("BatchWriteItem", err),
    }
}
