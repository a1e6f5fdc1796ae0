//! Typed, pagination-safe access to the orders table.
//!
//! The entry point is [`TableClient`], a thin layer over a [`TableStore`]
//! backend that hides continuation-token loops, chunks batch deletions,
//! and retries throttling-class failures with bounded exponential backoff.
//! The production backend is [`storage::dynamodb::DynamoTableStore`]; tests
//! plug in [`storage::inmemory::InMemoryTableStore`].
//!
//! ```no_run
//! use orderstore::{TableClient, UpdatePatch};
//! use orderstore::storage::dynamodb::DynamoTableStore;
//!
//! # async fn example() -> orderstore::Result<()> {
//! let store = DynamoTableStore::from_env().await?;
//! let client = TableClient::new(store);
//!
//! let order = orderstore::OrderRecord::new("cus-05", "ord-4").with_status("pending");
//! client.put(&order).await?;
//!
//! client
//!     .update(&order.key(), UpdatePatch::new().set("status", "shipped"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod retry;
pub mod storage;

pub use client::{TableClient, MAX_DELETE_BATCH_SIZE};
pub use retry::RetryPolicy;

// Re-export the core vocabulary so most callers only need this crate.
pub use orderstore_core::order::{AttrValue, OrderKey, OrderRecord};
pub use orderstore_core::storage::{
    Page, PageToken, QueryRequest, RecordKey, Result, ScanFilter, SortDirection,
    SortKeyCondition, StoreError, TableSchema, TableStore, UpdatePatch,
};
