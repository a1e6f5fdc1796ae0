//! Expression rendering.
//!
//! Every attribute name goes through a `#n` placeholder and every value
//! through a `:v` placeholder, so reserved words (`status` among them)
//! never appear verbatim in an expression and callers never deal with raw
//! expression strings.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use orderstore_core::storage::{
    QueryRequest, ScanFilter, SortKeyCondition, StoreError, TableSchema, UpdateAction, UpdatePatch,
};

use super::conversions::attr_to_attribute_value;

/// A rendered expression with its placeholder maps.
pub(super) struct ExpressionParts {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_name: usize,
    next_value: usize,
}

impl Placeholders {
    /// Alias an attribute name, reusing the alias on repeats.
    fn name(&mut self, attribute: &str) -> String {
        if let Some((alias, _)) = self.names.iter().find(|(_, name)| *name == attribute) {
            return alias.clone();
        }
        let alias = format!("#n{}", self.next_name);
        self.next_name += 1;
        self.names.insert(alias.clone(), attribute.to_string());
        alias
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.next_value);
        self.next_value += 1;
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn into_parts(self, expression: String) -> ExpressionParts {
        ExpressionParts {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}

/// Render a scan filter to a filter expression.
pub(super) fn render_filter(filter: &ScanFilter) -> ExpressionParts {
    let mut placeholders = Placeholders::default();
    let expression = render_filter_term(filter, &mut placeholders);
    placeholders.into_parts(expression)
}

fn render_filter_term(filter: &ScanFilter, placeholders: &mut Placeholders) -> String {
    match filter {
        ScanFilter::Eq { attribute, value } => {
            let name = placeholders.name(attribute);
            let value = placeholders.value(attr_to_attribute_value(value));
            format!("{name} = {value}")
        }
        ScanFilter::And(filters) => {
            let terms: Vec<String> = filters
                .iter()
                .map(|f| render_filter_term(f, placeholders))
                .collect();
            if terms.len() == 1 {
                terms.into_iter().next().unwrap_or_default()
            } else {
                format!("({})", terms.join(" AND "))
            }
        }
    }
}

/// Render an update patch to an update expression.
pub(super) fn render_update(patch: &UpdatePatch) -> ExpressionParts {
    let mut placeholders = Placeholders::default();
    let mut sets = Vec::new();
    let mut removes = Vec::new();

    for action in patch.actions() {
        match action {
            UpdateAction::Set { attribute, value } => {
                let name = placeholders.name(attribute);
                let value = placeholders.value(attr_to_attribute_value(value));
                sets.push(format!("{name} = {value}"));
            }
            UpdateAction::Remove { attribute } => {
                removes.push(placeholders.name(attribute));
            }
        }
    }

    let mut clauses = Vec::new();
    if !sets.is_empty() {
        clauses.push(format!("SET {}", sets.join(", ")));
    }
    if !removes.is_empty() {
        clauses.push(format!("REMOVE {}", removes.join(", ")));
    }

    placeholders.into_parts(clauses.join(" "))
}

/// Render the key condition of a query against the table or an index.
pub(super) fn render_key_condition(
    schema: &TableSchema,
    request: &QueryRequest,
) -> Result<ExpressionParts, StoreError> {
    let (key_attribute, sort_attribute) = match &request.index {
        None => (
            schema.partition_attribute.as_str(),
            Some(schema.sort_attribute.as_str()),
        ),
        Some(name) => {
            let index = schema
                .index(name)
                .ok_or_else(|| StoreError::Validation(format!("unknown index '{name}'")))?;
            (index.key_attribute.as_str(), index.sort_attribute.as_deref())
        }
    };

    let mut placeholders = Placeholders::default();
    let key_name = placeholders.name(key_attribute);
    let key_value = placeholders.value(AttributeValue::S(request.key_value.clone()));
    let mut expression = format!("{key_name} = {key_value}");

    if !matches!(request.sort, SortKeyCondition::Any) {
        let Some(sort_attribute) = sort_attribute else {
            return Err(StoreError::Validation(format!(
                "index '{}' has no sort key to apply a condition to",
                request.index.as_deref().unwrap_or_default()
            )));
        };
        let sort_name = placeholders.name(sort_attribute);
        match &request.sort {
            SortKeyCondition::Equals(value) => {
                let value = placeholders.value(AttributeValue::S(value.clone()));
                expression.push_str(&format!(" AND {sort_name} = {value}"));
            }
            SortKeyCondition::BeginsWith(prefix) => {
                let value = placeholders.value(AttributeValue::S(prefix.clone()));
                expression.push_str(&format!(" AND begins_with({sort_name}, {value})"));
            }
            SortKeyCondition::Any => unreachable!(),
        }
    }

    Ok(placeholders.into_parts(expression))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_aliases_reserved_names() {
        let filter = ScanFilter::attr_eq("status", "pending");
        let parts = render_filter(&filter);

        assert_eq!(parts.expression, "#n0 = :v0");
        assert_eq!(parts.names.get("#n0").map(String::as_str), Some("status"));
        assert_eq!(
            parts.values.get(":v0"),
            Some(&AttributeValue::S("pending".to_string()))
        );
    }

    #[test]
    fn test_filter_conjunction() {
        let filter = ScanFilter::attr_eq("status", "pending")
            .and(ScanFilter::attr_eq("carrier", "DHL"));
        let parts = render_filter(&filter);

        assert_eq!(parts.expression, "(#n0 = :v0 AND #n1 = :v1)");
        assert_eq!(parts.names.len(), 2);
        assert_eq!(parts.values.len(), 2);
    }

    #[test]
    fn test_update_expression_with_set_and_remove() {
        let patch = UpdatePatch::new()
            .set("status", "shipped")
            .set("updated_date", "2026-08-07T12:00:00+00:00")
            .remove("note");
        let parts = render_update(&patch);

        assert_eq!(parts.expression, "SET #n0 = :v0, #n1 = :v1 REMOVE #n2");
        assert_eq!(parts.names.get("#n0").map(String::as_str), Some("status"));
        assert_eq!(
            parts.names.get("#n1").map(String::as_str),
            Some("updated_date")
        );
        assert_eq!(parts.names.get("#n2").map(String::as_str), Some("note"));
    }

    #[test]
    fn test_repeated_attribute_reuses_the_alias() {
        let filter = ScanFilter::attr_eq("status", "pending")
            .and(ScanFilter::attr_eq("status", "shipped"));
        let parts = render_filter(&filter);

        assert_eq!(parts.expression, "(#n0 = :v0 AND #n0 = :v1)");
        assert_eq!(parts.names.len(), 1);
    }

    #[test]
    fn test_key_condition_for_partition_query() {
        let schema = TableSchema::orders();
        let request = QueryRequest::partition("cus-05");
        let parts = render_key_condition(&schema, &request).unwrap();

        assert_eq!(parts.expression, "#n0 = :v0");
        assert_eq!(
            parts.names.get("#n0").map(String::as_str),
            Some("customer_id")
        );
    }

    #[test]
    fn test_key_condition_with_sort_equality() {
        let schema = TableSchema::orders();
        let request = QueryRequest::partition("cus-05")
            .with_sort(SortKeyCondition::Equals("ord-4".to_string()));
        let parts = render_key_condition(&schema, &request).unwrap();

        assert_eq!(parts.expression, "#n0 = :v0 AND #n1 = :v1");
        assert_eq!(parts.names.get("#n1").map(String::as_str), Some("order_id"));
    }

    #[test]
    fn test_key_condition_with_prefix_on_index() {
        let schema = TableSchema::orders();
        let request = QueryRequest::index("status-index", "pending")
            .with_sort(SortKeyCondition::BeginsWith("ord-".to_string()));
        let parts = render_key_condition(&schema, &request).unwrap();

        assert_eq!(
            parts.expression,
            "#n0 = :v0 AND begins_with(#n1, :v1)"
        );
        assert_eq!(parts.names.get("#n0").map(String::as_str), Some("status"));
    }

    #[test]
    fn test_unknown_index_is_a_validation_error() {
        let schema = TableSchema::orders();
        let request = QueryRequest::index("other-index", "pending");

        assert!(matches!(
            render_key_condition(&schema, &request),
            Err(StoreError::Validation(_))
        ));
    }
}
