use std::collections::HashMap;

use async_trait::async_trait;

use crate::order::{AttrValue, OrderKey, OrderRecord};

use super::error::Result;
use super::types::{Page, PageToken, QueryRequest, RecordKey, ScanFilter};
use super::update::UpdatePatch;

/// One table on the remote service, at the request/response granularity.
///
/// Implementations perform exactly one page read or one batch write per
/// call and never loop: pagination, batch chunking, and retries are the
/// client's responsibility, which keeps them testable against a fake
/// backend.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Writes a record unconditionally (last write wins).
    async fn put_record(&self, record: &OrderRecord) -> Result<()>;

    /// Reads one page of a table scan. The filter is evaluated after the
    /// page is read, so a page may contain zero matches and still carry a
    /// continuation token.
    async fn scan_page(
        &self,
        filter: Option<&ScanFilter>,
        start: Option<PageToken>,
    ) -> Result<Page>;

    /// Reads one page of a key-condition query against the base table or a
    /// named secondary index.
    async fn query_page(&self, request: &QueryRequest, start: Option<PageToken>) -> Result<Page>;

    /// Applies a partial attribute merge to an existing record and returns
    /// the new values of the assigned attributes. Fails with `NotFound`
    /// when the record does not exist: this layer is update-only, never
    /// update-or-create.
    async fn update_record(
        &self,
        key: &RecordKey,
        patch: &UpdatePatch,
    ) -> Result<HashMap<String, AttrValue>>;

    /// Deletes one batch of records (at most the service's batch bound)
    /// and returns the keys the service left unprocessed.
    async fn delete_batch(&self, keys: &[OrderKey]) -> Result<Vec<OrderKey>>;
}
