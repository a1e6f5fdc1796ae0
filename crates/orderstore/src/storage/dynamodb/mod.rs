//! DynamoDB table backend.
//!
//! Implements the `TableStore` trait from `orderstore_core::storage` using
//! `aws-sdk-dynamodb`. The SDK owns credentials and the wire protocol;
//! this module owns the mapping between the logical request model and the
//! service's item/expression shapes.

mod conversions;
mod error;
mod expressions;
mod store;

pub use store::DynamoTableStore;
