// SPDX-License-Identifier: PMPL-1.0-or-later
//! Logical schema model.
//!
//! A schema maps collection names to a primary key and a field tree. Field
//! sizes are either declared (`avg_size`) or derived recursively from nested
//! objects and arrays when a document is sized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EstimationError, Result};

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Number,
    String,
    Boolean,
    Date,
    Object,
    Array,
}

impl FieldKind {
    pub fn is_primitive(self) -> bool {
        !matches!(self, FieldKind::Object | FieldKind::Array)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        };
        write!(f, "{}", name)
    }
}

/// A single field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Declared average value size in bytes. For objects and arrays this
    /// short-circuits the recursive computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_size: Option<f64>,
    /// Sub-fields of an object.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldSpec>,
    /// Element type of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldSpec>>,
}

impl FieldSpec {
    /// A primitive field with the type's default size.
    pub fn primitive(kind: FieldKind) -> Self {
        Self {
            kind,
            avg_size: None,
            properties: BTreeMap::new(),
            items: None,
        }
    }

    pub fn sized(kind: FieldKind, avg_size: f64) -> Self {
        Self {
            avg_size: Some(avg_size),
            ..Self::primitive(kind)
        }
    }

    pub fn object(properties: BTreeMap<String, FieldSpec>) -> Self {
        Self {
            properties,
            ..Self::primitive(FieldKind::Object)
        }
    }

    pub fn array(items: FieldSpec) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::primitive(FieldKind::Array)
        }
    }

    fn validate(&self, path: &str) -> Result<()> {
        if let Some(size) = self.avg_size {
            if !(size.is_finite() && size >= 0.0) {
                return Err(EstimationError::config(format!(
                    "field `{path}` has invalid avg_size {size}"
                )));
            }
        }
        match self.kind {
            FieldKind::Object => {
                if self.properties.is_empty() && self.avg_size.is_none() {
                    return Err(EstimationError::config(format!(
                        "object field `{path}` needs properties or avg_size"
                    )));
                }
                for (name, child) in &self.properties {
                    child.validate(&format!("{path}.{name}"))?;
                }
            }
            FieldKind::Array => match &self.items {
                Some(items) => items.validate(path)?,
                None if self.avg_size.is_some() => {}
                None => {
                    return Err(EstimationError::config(format!(
                        "array field `{path}` needs items or avg_size"
                    )))
                }
            },
            _ => {}
        }
        Ok(())
    }
}

/// Result of looking a dotted path up in a collection's field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLookup<'a> {
    pub spec: &'a FieldSpec,
    /// Array field paths crossed on the way down, outermost first.
    pub array_paths: Vec<String>,
}

/// Schema of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub primary_key: String,
    pub fields: BTreeMap<String, FieldSpec>,
}

impl CollectionSchema {
    /// Look up a dotted path. Arrays are transparent: `lines.qty` descends
    /// into the element type of `lines`.
    pub fn lookup(&self, path: &str) -> Option<FieldLookup<'_>> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut spec = self.fields.get(first)?;
        let mut current = first.to_string();
        let mut array_paths = Vec::new();

        for segment in segments {
            if spec.kind == FieldKind::Array {
                array_paths.push(current.clone());
                spec = spec.items.as_deref()?;
            }
            spec = spec.properties.get(segment)?;
            current.push('.');
            current.push_str(segment);
        }
        Some(FieldLookup { spec, array_paths })
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }
}

/// The logical schema: every collection of the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl Schema {
    pub fn collection(&self, name: &str) -> Result<&CollectionSchema> {
        self.collections
            .get(name)
            .ok_or_else(|| EstimationError::config(format!("unknown collection `{name}`")))
    }

    /// Every collection has exactly one primary key, present in its fields.
    pub fn validate(&self) -> Result<()> {
        for (name, collection) in &self.collections {
            if !collection.fields.contains_key(&collection.primary_key) {
                return Err(EstimationError::config(format!(
                    "primary key `{}` of collection `{name}` is not a declared field",
                    collection.primary_key
                )));
            }
            for (field_name, spec) in &collection.fields {
                if field_name.contains('.') {
                    return Err(EstimationError::config(format!(
                        "field name `{field_name}` in `{name}` must not contain '.'"
                    )));
                }
                spec.validate(&format!("{name}.{field_name}"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_line() -> CollectionSchema {
        let mut line = BTreeMap::new();
        line.insert("IDP".to_string(), FieldSpec::primitive(FieldKind::Integer));
        line.insert("quantity".to_string(), FieldSpec::primitive(FieldKind::Integer));

        let mut fields = BTreeMap::new();
        fields.insert("IDO".to_string(), FieldSpec::primitive(FieldKind::Integer));
        fields.insert("date".to_string(), FieldSpec::primitive(FieldKind::Date));
        fields.insert("lines".to_string(), FieldSpec::array(FieldSpec::object(line)));
        CollectionSchema {
            primary_key: "IDO".to_string(),
            fields,
        }
    }

    #[test]
    fn test_lookup_top_level() {
        let schema = order_line();
        let found = schema.lookup("date").unwrap();
        assert_eq!(found.spec.kind, FieldKind::Date);
        assert!(found.array_paths.is_empty());
    }

    #[test]
    fn test_lookup_through_array() {
        let schema = order_line();
        let found = schema.lookup("lines.quantity").unwrap();
        assert_eq!(found.spec.kind, FieldKind::Integer);
        assert_eq!(found.array_paths, vec!["lines".to_string()]);
    }

    #[test]
    fn test_lookup_missing() {
        let schema = order_line();
        assert!(schema.lookup("lines.price").is_none());
        assert!(schema.lookup("date.day").is_none());
        assert!(!schema.has_field("brand"));
    }

    #[test]
    fn test_validate_primary_key() {
        let mut collection = order_line();
        collection.primary_key = "missing".to_string();
        let mut schema = Schema::default();
        schema.collections.insert("OrderLine".to_string(), collection);
        assert!(matches!(
            schema.validate(),
            Err(EstimationError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_array_without_items() {
        let mut collection = order_line();
        collection
            .fields
            .insert("tags".to_string(), FieldSpec::primitive(FieldKind::Array));
        let mut schema = Schema::default();
        schema.collections.insert("OrderLine".to_string(), collection);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_deserialize_schema() {
        let json = r#"{
            "collections": {
                "Product": {
                    "primary_key": "IDP",
                    "fields": {
                        "IDP": {"type": "integer"},
                        "brand": {"type": "string"},
                        "description": {"type": "string", "avg_size": 500}
                    }
                }
            }
        }"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert!(schema.validate().is_ok());
        let product = schema.collection("Product").unwrap();
        assert_eq!(product.fields["description"].avg_size, Some(500.0));
        assert!(schema.collection("Stock").is_err());
    }
}
