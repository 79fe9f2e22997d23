//! Static tool catalog bound to backend operations.

use std::collections::HashMap;

use pantheon_core::backend::Arguments;
use thiserror::Error;

use crate::schema::{SchemaViolation, ToolDefinition};

/// Catalog construction failures.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate tool name '{0}'")]
    DuplicateTool(String),

    #[error("tool '{tool}' declares field '{field}' more than once")]
    DuplicateField { tool: String, field: String },

    #[error("tool '{tool}' has an invalid default: {violation}")]
    InvalidDefault {
        tool: String,
        violation: SchemaViolation,
    },
}

/// Why a call could not be turned into a backend invocation.
#[derive(Debug, Error, PartialEq)]
pub enum CallRejection {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] SchemaViolation),
}

struct Entry<Op> {
    definition: ToolDefinition,
    operation: Op,
}

/// Immutable, ordered catalog. Each tool name maps to exactly one
/// operation variant of the backend.
pub struct ToolRegistry<Op> {
    entries: Vec<Entry<Op>>,
    by_name: HashMap<String, usize>,
}

impl<Op: Copy> ToolRegistry<Op> {
    pub fn new<I>(tools: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (ToolDefinition, Op)>,
    {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();

        for (definition, operation) in tools {
            validate_definition(&definition)?;
            if by_name.contains_key(&definition.name) {
                return Err(RegistryError::DuplicateTool(definition.name));
            }
            by_name.insert(definition.name.clone(), entries.len());
            entries.push(Entry {
                definition,
                operation,
            });
        }

        Ok(Self { entries, by_name })
    }

    /// All definitions in declaration order.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.entries.iter().map(|e| &e.definition).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.entry(name).map(|e| &e.definition)
    }

    pub fn operation(&self, name: &str) -> Option<Op> {
        self.entry(name).map(|e| e.operation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and default `raw` against the named tool's schema.
    pub fn normalize(&self, name: &str, raw: &Arguments) -> Result<Arguments, CallRejection> {
        let entry = self
            .entry(name)
            .ok_or_else(|| CallRejection::UnknownTool(name.to_string()))?;
        Ok(entry.definition.input_schema.normalize(raw)?)
    }

    /// Resolve a call to its operation and effective arguments.
    pub fn prepare(&self, name: &str, raw: &Arguments) -> Result<(Op, Arguments), CallRejection> {
        let arguments = self.normalize(name, raw)?;
        let operation = self
            .operation(name)
            .ok_or_else(|| CallRejection::UnknownTool(name.to_string()))?;
        Ok((operation, arguments))
    }

    fn entry(&self, name: &str) -> Option<&Entry<Op>> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }
}

fn validate_definition(definition: &ToolDefinition) -> Result<(), RegistryError> {
    let fields = definition.input_schema.fields();
    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name() == field.name()) {
            return Err(RegistryError::DuplicateField {
                tool: definition.name.clone(),
                field: field.name().to_string(),
            });
        }
        if let Some(default) = field.default() {
            let probe = crate::schema::InputSchema::new(vec![field.clone()]);
            let mut args = Arguments::new();
            args.insert(field.name().to_string(), default.clone());
            probe
                .normalize(&args)
                .map_err(|violation| RegistryError::InvalidDefault {
                    tool: definition.name.clone(),
                    violation,
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{FieldSpec, InputSchema};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        List,
        Upload,
    }

    fn list_tool() -> ToolDefinition {
        ToolDefinition::new(
            "list_folder",
            "List a folder",
            InputSchema::new(vec![FieldSpec::string("path").default_value("")]),
        )
    }

    fn upload_tool() -> ToolDefinition {
        ToolDefinition::new(
            "upload_file",
            "Upload",
            InputSchema::new(vec![
                FieldSpec::string("path").required(),
                FieldSpec::string("mode").one_of(["add", "overwrite"]).default_value("add"),
            ]),
        )
    }

    #[test]
    fn preserves_declaration_order_and_binds_operations() {
        let registry =
            ToolRegistry::new([(list_tool(), Op::List), (upload_tool(), Op::Upload)]).unwrap();
        let names: Vec<&str> = registry.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["list_folder", "upload_file"]);
        assert_eq!(registry.operation("upload_file"), Some(Op::Upload));
        assert!(registry.lookup("nope").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolRegistry::new([(list_tool(), Op::List), (list_tool(), Op::Upload)])
            .err()
            .expect("duplicate");
        assert_eq!(err, RegistryError::DuplicateTool("list_folder".into()));
    }

    #[test]
    fn defaults_must_satisfy_their_own_enum() {
        let bad = ToolDefinition::new(
            "bad",
            "",
            InputSchema::new(vec![FieldSpec::string("mode").one_of(["a", "b"]).default_value("c")]),
        );
        let err = ToolRegistry::new([(bad, Op::List)]).err().expect("invalid default");
        assert!(matches!(err, RegistryError::InvalidDefault { .. }));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let bad = ToolDefinition::new(
            "bad",
            "",
            InputSchema::new(vec![FieldSpec::string("x"), FieldSpec::number("x")]),
        );
        let err = ToolRegistry::new([(bad, Op::List)]).err().expect("duplicate field");
        assert!(matches!(err, RegistryError::DuplicateField { .. }));
    }

    #[test]
    fn prepare_rejects_unknown_and_invalid_calls() {
        let registry = ToolRegistry::new([(upload_tool(), Op::Upload)]).unwrap();

        let err = registry.prepare("missing", &Arguments::new()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: missing");

        let err = registry.prepare("upload_file", &Arguments::new()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid arguments: missing required field 'path'");

        let raw = json!({"path": "/x"}).as_object().cloned().unwrap();
        let (op, args) = registry.prepare("upload_file", &raw).unwrap();
        assert_eq!(op, Op::Upload);
        assert_eq!(args["mode"], "add");
    }
}
