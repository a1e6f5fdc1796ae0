//! Deployable table configuration (pure data).
//!
//! The shape of the orders table is defined once in
//! `orderstore_core::storage::TableSchema`; this module derives the
//! attribute typing and billing details a deployment needs on top of it.

use orderstore_core::storage::TableSchema;

/// Table schema configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub gsis: Vec<GsiConfig>,
    pub billing_mode: BillingMode,
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

/// DynamoDB attribute types used by the orders table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
}

/// Global Secondary Index configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiConfig {
    pub name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub projection: ProjectionType,
}

/// GSI projection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    All,
}

/// Billing mode for the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    PayPerRequest,
}

impl TableConfig {
    /// Sets the table name.
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }
}

fn string_key(name: &str) -> KeyAttribute {
    KeyAttribute {
        name: name.to_string(),
        attribute_type: AttributeType::String,
    }
}

/// Derives deployable configuration from a schema. All orders table key
/// attributes are strings; indexes project every attribute so index reads
/// return whole records.
pub fn from_schema(schema: &TableSchema) -> TableConfig {
    TableConfig {
        table_name: schema.table_name.clone(),
        partition_key: string_key(&schema.partition_attribute),
        sort_key: Some(string_key(&schema.sort_attribute)),
        gsis: schema
            .indexes
            .iter()
            .map(|index| GsiConfig {
                name: index.name.clone(),
                partition_key: string_key(&index.key_attribute),
                sort_key: index.sort_attribute.as_deref().map(string_key),
                projection: ProjectionType::All,
            })
            .collect(),
        billing_mode: BillingMode::PayPerRequest,
    }
}

/// Returns the canonical orders table configuration. Pure, no I/O.
pub fn orders_table_config() -> TableConfig {
    from_schema(&TableSchema::orders())
}
