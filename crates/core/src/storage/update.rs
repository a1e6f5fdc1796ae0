use std::collections::HashMap;

use chrono::DateTime;

use crate::order::{
    AttrValue, OrderRecord, ATTR_CREATED_DATE, ATTR_STATUS, ATTR_UPDATED_DATE,
};

use super::error::{Result, StoreError};
use super::types::TableSchema;

/// A single action of an [`UpdatePatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set { attribute: String, value: AttrValue },
    Remove { attribute: String },
}

impl UpdateAction {
    /// The attribute this action targets.
    pub fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set { attribute, .. } => attribute,
            UpdateAction::Remove { attribute } => attribute,
        }
    }
}

/// A partial attribute merge: only the named attributes change.
///
/// Backends own the translation into their wire form, including any
/// placeholder aliasing for attribute names that collide with reserved
/// words; callers never see raw expression strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdatePatch {
    actions: Vec<UpdateAction>,
}

impl UpdatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `set attribute = value` action.
    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.actions.push(UpdateAction::Set {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a `remove attribute` action.
    pub fn remove(mut self, attribute: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove {
            attribute: attribute.into(),
        });
        self
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// True if the patch already assigns `attribute`.
    pub fn sets_attribute(&self, attribute: &str) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, UpdateAction::Set { attribute: name, .. } if name == attribute))
    }

    /// Checks the patch against the table schema.
    ///
    /// Key attributes are immutable once written, and an empty patch is a
    /// malformed request rather than a no-op.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        if self.actions.is_empty() {
            return Err(StoreError::Validation(
                "update patch contains no actions".to_string(),
            ));
        }
        for action in &self.actions {
            if schema.is_key_attribute(action.attribute()) {
                return Err(StoreError::Validation(format!(
                    "key attribute '{}' cannot be modified",
                    action.attribute()
                )));
            }
        }
        Ok(())
    }

    /// Applies the patch to a record in place and returns the new values of
    /// the assigned attributes (the `UPDATED_NEW` shape).
    pub fn apply_to(&self, record: &mut OrderRecord) -> HashMap<String, AttrValue> {
        let mut updated = HashMap::new();
        for action in &self.actions {
            match action {
                UpdateAction::Set { attribute, value } => {
                    set_record_attr(record, attribute, value.clone());
                    updated.insert(attribute.clone(), value.clone());
                }
                UpdateAction::Remove { attribute } => {
                    remove_record_attr(record, attribute);
                }
            }
        }
        updated
    }
}

fn set_record_attr(record: &mut OrderRecord, attribute: &str, value: AttrValue) {
    match (attribute, &value) {
        (ATTR_STATUS, AttrValue::S(s)) => record.status = Some(s.clone()),
        (ATTR_CREATED_DATE, AttrValue::S(s)) if parse_rfc3339(s).is_some() => {
            record.created_date = parse_rfc3339(s);
        }
        (ATTR_UPDATED_DATE, AttrValue::S(s)) if parse_rfc3339(s).is_some() => {
            record.updated_date = parse_rfc3339(s);
        }
        _ => {
            record.attributes.insert(attribute.to_string(), value);
        }
    }
}

fn remove_record_attr(record: &mut OrderRecord, attribute: &str) {
    match attribute {
        ATTR_STATUS => record.status = None,
        ATTR_CREATED_DATE => record.created_date = None,
        ATTR_UPDATED_DATE => record.updated_date = None,
        other => {
            record.attributes.remove(other);
        }
    }
}

fn parse_rfc3339(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&chrono::Utc))
}
