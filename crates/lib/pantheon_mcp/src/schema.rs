//! Restricted input schemas for tool arguments.
//!
//! A schema is an ordered list of fields, each with a primitive type and
//! optional `required`, `enum`, `default` and `description` facets. It
//! renders as a JSON Schema object on the wire and validates/defaults raw
//! argument maps before dispatch.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Primitive JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    /// Accept `value` as this type, applying primitive coercion from
    /// strings. Returns `None` when the value does not fit.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::String, Value::String(_))
            | (FieldType::Number, Value::Number(_))
            | (FieldType::Boolean, Value::Bool(_))
            | (FieldType::Object, Value::Object(_))
            | (FieldType::Array, Value::Array(_)) => Some(value.clone()),

            (FieldType::Integer, Value::Number(n)) => integral(n).map(Value::Number),

            (FieldType::Number, Value::String(s)) => parse_number(s.trim()).map(Value::Number),
            (FieldType::Integer, Value::String(s)) => {
                parse_number(s.trim()).as_ref().and_then(integral).map(Value::Number)
            }
            (FieldType::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn integral(n: &Number) -> Option<Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let f = n.as_f64()?;
    if f.fract() != 0.0 {
        return None;
    }
    if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(Number::from(f as i64))
    } else {
        None
    }
}

/// Why a set of arguments does not satisfy a schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaViolation {
    #[error("missing required field '{field}'")]
    MissingRequired { field: String },

    #[error("field '{field}' must be of type {expected}")]
    WrongType { field: String, expected: FieldType },

    #[error("field '{field}' must be one of: {}", render_allowed(.allowed))]
    NotAllowed { field: String, allowed: Vec<Value> },
}

fn render_allowed(allowed: &[Value]) -> String {
    allowed
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Fields
// =============================================================================

/// One declared argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: FieldType,
    required: bool,
    allowed: Option<Vec<Value>>,
    default: Option<Value>,
    description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            allowed: None,
            default: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Type-check and enum-check a present value.
    fn accept(&self, value: &Value) -> Result<Value, SchemaViolation> {
        let value = self.kind.coerce(value).ok_or_else(|| SchemaViolation::WrongType {
            field: self.name.clone(),
            expected: self.kind,
        })?;
        if let Some(allowed) = &self.allowed
            && !allowed.contains(&value)
        {
            return Err(SchemaViolation::NotAllowed {
                field: self.name.clone(),
                allowed: allowed.clone(),
            });
        }
        Ok(value)
    }
}

impl Serialize for FieldSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind.as_str())?;
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(allowed) = &self.allowed {
            map.serialize_entry("enum", allowed)?;
        }
        if let Some(default) = &self.default {
            map.serialize_entry("default", default)?;
        }
        map.end()
    }
}

// =============================================================================
// Schemas
// =============================================================================

/// Ordered field list for one tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check `raw` and return a new map with defaults filled in.
    ///
    /// `null` counts as absent. Undeclared keys are copied through
    /// unchanged. The input map is never modified.
    pub fn normalize(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaViolation> {
        let mut out = raw.clone();
        for field in &self.fields {
            match raw.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let value = field.accept(value)?;
                    out.insert(field.name.clone(), value);
                }
                None if field.required => {
                    return Err(SchemaViolation::MissingRequired {
                        field: field.name.clone(),
                    });
                }
                None => match &field.default {
                    Some(default) => {
                        out.insert(field.name.clone(), default.clone());
                    }
                    None => {
                        out.remove(&field.name);
                    }
                },
            }
        }
        Ok(out)
    }
}

struct Properties<'a>(&'a [FieldSpec]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, field)?;
        }
        map.end()
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(&self.fields))?;
        if !required.is_empty() {
            map.serialize_entry("required", &required)?;
        }
        map.end()
    }
}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
