//! Schema: type definitions, inheritance chains and property types
//!
//! A schema maps type names to [`TypeDef`]s. Inheritance is resolved
//! explicitly: [`Schema::type_chain`] computes the ordered ancestor list and
//! [`Schema::properties`] merges property maps from the root ancestor down,
//! so descendants override ancestors.

pub mod value;

pub use value::{default_value, ensure_type, parse_value};

use crate::graph::Node;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while loading or querying a schema
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Cannot resolve property path {path:?} on type {type_name}")]
    UnresolvablePath { type_name: String, path: Vec<String> },

    #[error("Cyclic inheritance involving type {0}")]
    CyclicInheritance(String),

    #[error("Cannot convert {value} to {expected}")]
    InvalidValue { expected: String, value: String },

    #[error("Schema parse error: {0}")]
    Parse(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Base (container) type of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    /// Reference to a node of the named schema type, stored as the node id
    Reference(String),
}

impl BaseType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "string" => BaseType::String,
            "number" => BaseType::Number,
            "boolean" => BaseType::Boolean,
            "date" => BaseType::Date,
            "object" => BaseType::Object,
            "array" => BaseType::Array,
            other => BaseType::Reference(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BaseType::String => "string",
            BaseType::Number => "number",
            BaseType::Boolean => "boolean",
            BaseType::Date => "date",
            BaseType::Object => "object",
            BaseType::Array => "array",
            BaseType::Reference(name) => name,
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPropertyType {
    Scalar(String),
    Composite(Vec<String>),
}

/// Declared type of a property: `"string"` or `["array", "person"]`.
///
/// The first segment is the base/container type; the remaining segments
/// describe the contained values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPropertyType", into = "RawPropertyType")]
pub struct PropertyType {
    segments: Vec<String>,
}

impl TryFrom<RawPropertyType> for PropertyType {
    type Error = String;

    fn try_from(raw: RawPropertyType) -> Result<Self, Self::Error> {
        match raw {
            RawPropertyType::Scalar(tag) => Ok(PropertyType::new([tag])),
            RawPropertyType::Composite(segments) if segments.is_empty() => {
                Err("empty composite property type".to_string())
            }
            RawPropertyType::Composite(segments) => Ok(PropertyType { segments }),
        }
    }
}

impl From<PropertyType> for RawPropertyType {
    fn from(pt: PropertyType) -> Self {
        if pt.segments.len() == 1 {
            RawPropertyType::Scalar(pt.segments[0].clone())
        } else {
            RawPropertyType::Composite(pt.segments)
        }
    }
}

impl PropertyType {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return PropertyType::object();
        }
        PropertyType { segments }
    }

    pub fn object() -> Self {
        PropertyType::new(["object"])
    }

    /// Runtime type of an existing value; `None` for null
    pub fn of_value(value: &crate::graph::PropertyValue) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(PropertyType::new([value.type_name()]))
        }
    }

    pub fn base(&self) -> BaseType {
        BaseType::parse(&self.segments[0])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Type of the values held by a container (`["array","person"]` → `"person"`)
    pub fn element(&self) -> Option<PropertyType> {
        (self.segments.len() > 1).then(|| PropertyType {
            segments: self.segments[1..].to_vec(),
        })
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A type definition: optional parent and own properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default)]
    pub properties: IndexMap<String, PropertyType>,
}

impl TypeDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.properties.insert(name.into(), property_type);
        self
    }
}

/// A statically declared index: `{types: [...], property: "category"}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    #[serde(default)]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// The schema: `{id?, version?, indexes?, views?, types}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub indexes: IndexMap<String, IndexSpec>,

    /// View declarations are kept opaque; the view layer consumes them
    #[serde(default)]
    pub views: IndexMap<String, serde_json::Value>,

    #[serde(default)]
    pub types: IndexMap<String, TypeDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let schema: Schema =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_yaml(yaml: &str) -> SchemaResult<Self> {
        let schema: Schema =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn with_identity(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self.version = Some(version.into());
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, def: TypeDef) -> Self {
        self.types.insert(name.into(), def);
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, spec: IndexSpec) -> Self {
        self.indexes.insert(name.into(), spec);
        self
    }

    /// Check every type chain terminates and every parent exists
    pub fn validate(&self) -> SchemaResult<()> {
        for name in self.types.keys() {
            self.type_chain(name)?;
        }
        Ok(())
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Ordered type names from the root ancestor down to `type_name`
    pub fn type_chain(&self, type_name: &str) -> SchemaResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(type_name.to_string());

        while let Some(name) = current {
            let def = self
                .types
                .get(&name)
                .ok_or_else(|| SchemaError::UnknownType(name.clone()))?;
            if !seen.insert(name.clone()) {
                return Err(SchemaError::CyclicInheritance(name));
            }
            current = def.parent.clone();
            chain.push(name);
        }

        chain.reverse();
        Ok(chain)
    }

    /// True if `ancestor` is `type_name` or one of its ancestors
    pub fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        self.type_chain(type_name)
            .map(|chain| chain.iter().any(|t| t == ancestor))
            .unwrap_or(false)
    }

    /// Properties of a type merged along its chain; descendants win
    pub fn properties(&self, type_name: &str) -> SchemaResult<IndexMap<String, PropertyType>> {
        let mut merged = IndexMap::new();
        for name in self.type_chain(type_name)? {
            if let Some(def) = self.types.get(&name) {
                for (prop, pt) in &def.properties {
                    merged.insert(prop.clone(), pt.clone());
                }
            }
        }
        Ok(merged)
    }

    /// Declared type of a property path on a node type.
    ///
    /// Reference properties continue the lookup on the referenced type,
    /// array segments select the element type, and anything below an
    /// `object` is itself typed `object`.
    pub fn property_type<S: AsRef<str>>(&self, type_name: &str, path: &[S]) -> SchemaResult<PropertyType> {
        let unresolvable = || SchemaError::UnresolvablePath {
            type_name: type_name.to_string(),
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
        };

        let mut current_type = type_name.to_string();
        let mut idx = 0;
        let mut resolved: Option<PropertyType> = None;

        while idx < path.len() {
            let segment = path[idx].as_ref();
            let pt = match resolved.take() {
                None => self
                    .properties(&current_type)?
                    .get(segment)
                    .cloned()
                    .ok_or_else(unresolvable)?,
                Some(container) => match container.base() {
                    BaseType::Array => {
                        segment.parse::<usize>().map_err(|_| unresolvable())?;
                        container.element().unwrap_or_else(PropertyType::object)
                    }
                    BaseType::Object => return Ok(PropertyType::object()),
                    BaseType::Reference(target) if self.has_type(&target) => {
                        current_type = target;
                        continue;
                    }
                    _ => return Err(unresolvable()),
                },
            };
            resolved = Some(pt);
            idx += 1;
        }

        resolved.ok_or_else(unresolvable)
    }

    /// Check a node's type exists
    pub fn validate_node(&self, node: &Node) -> SchemaResult<()> {
        if self.has_type(&node.node_type) {
            Ok(())
        } else {
            Err(SchemaError::UnknownType(node.node_type.clone()))
        }
    }

    /// Coerce the declared, non-null properties of `node` with [`parse_value`]
    pub fn coerce_node(&self, node: &mut Node) -> SchemaResult<()> {
        for (name, pt) in self.properties(&node.node_type)? {
            if let Some(value) = node.properties.get_mut(&name) {
                if !value.is_null() {
                    *value = parse_value(&pt.base(), std::mem::take(value))?;
                }
            }
        }
        Ok(())
    }

    /// Fill declared properties missing from `node` with their defaults.
    /// Reference properties stay absent.
    pub fn apply_defaults(&self, node: &mut Node) -> SchemaResult<()> {
        for (name, pt) in self.properties(&node.node_type)? {
            let base = pt.base();
            if matches!(base, BaseType::Reference(_)) {
                continue;
            }
            let slot = node.properties.entry(name).or_insert(crate::graph::PropertyValue::Null);
            if slot.is_null() {
                *slot = default_value(&base);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "types": {
                    "node": {"properties": {"category": "string"}},
                    "person": {"parent": "node", "properties": {"name": "string"}},
                    "doc": {
                        "parent": "node",
                        "properties": {
                            "author": "person",
                            "editors": ["array", "person"],
                            "tags": ["array", "string"],
                            "meta": "object",
                            "category": "number"
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_type_chain() {
        let s = schema();
        assert_eq!(s.type_chain("doc").unwrap(), vec!["node", "doc"]);
        assert!(matches!(s.type_chain("nope"), Err(SchemaError::UnknownType(_))));
        assert!(s.is_a("person", "node"));
        assert!(!s.is_a("node", "person"));
    }

    #[test]
    fn test_cycle_detected() {
        let s = Schema::new()
            .with_type("a", TypeDef::new().with_parent("b"))
            .with_type("b", TypeDef::new().with_parent("a"));
        assert!(matches!(s.type_chain("a"), Err(SchemaError::CyclicInheritance(_))));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_properties_descendant_overrides() {
        let s = schema();
        let props = s.properties("doc").unwrap();
        assert_eq!(props.get("category").unwrap().base(), BaseType::Number);
        assert!(props.contains_key("author"));
        let keys: Vec<_> = props.keys().cloned().collect();
        assert_eq!(keys[0], "category");
    }

    #[test]
    fn test_property_type_through_references() {
        let s = schema();
        assert_eq!(s.property_type("doc", &["tags"]).unwrap().base(), BaseType::Array);
        assert_eq!(s.property_type("doc", &["tags", "0"]).unwrap().base(), BaseType::String);
        assert_eq!(s.property_type("doc", &["author", "name"]).unwrap().base(), BaseType::String);
        assert_eq!(
            s.property_type("doc", &["editors", "1", "name"]).unwrap().base(),
            BaseType::String
        );
        assert_eq!(s.property_type("doc", &["meta", "x", "y"]).unwrap().base(), BaseType::Object);
        assert!(matches!(
            s.property_type("doc", &["missing"]),
            Err(SchemaError::UnresolvablePath { .. })
        ));
        assert!(s.property_type("doc", &["tags", "first"]).is_err());
    }

    #[test]
    fn test_yaml_schema() {
        let s = Schema::from_yaml(
            "id: test\nversion: '1'\ntypes:\n  numbers:\n    properties:\n      val: number\n      arr: [array, number]\n",
        )
        .unwrap();
        assert_eq!(s.id.as_deref(), Some("test"));
        assert_eq!(s.property_type("numbers", &["arr"]).unwrap().segments(), ["array", "number"]);
    }

    #[test]
    fn test_validate_and_coerce_node() {
        let s = schema().with_identity("docs", "3");
        assert_eq!(s.version.as_deref(), Some("3"));
        assert!(matches!(
            s.validate_node(&Node::new("x", "ghost")),
            Err(SchemaError::UnknownType(_))
        ));

        let mut node = Node::new("d1", "doc")
            .with_property("category", "7")
            .with_property("author", "p1");
        s.coerce_node(&mut node).unwrap();
        assert_eq!(node.get_property("category"), Some(&PropertyValue::Number(7.0)));

        let mut bad = Node::new("d2", "doc").with_property("category", true);
        assert!(matches!(s.coerce_node(&mut bad), Err(SchemaError::InvalidValue { .. })));
    }

    #[test]
    fn test_apply_defaults() {
        let s = schema();
        let mut node = Node::new("d1", "doc").with_property("tags", vec![PropertyValue::from("x")]);
        s.apply_defaults(&mut node).unwrap();
        assert_eq!(node.get_property("category"), Some(&PropertyValue::Number(0.0)));
        assert_eq!(node.get_property("meta"), Some(&PropertyValue::Object(Default::default())));
        assert_eq!(node.get_property("tags").unwrap().as_array().unwrap().len(), 1);
        assert!(!node.has_property("author"));
    }
}
