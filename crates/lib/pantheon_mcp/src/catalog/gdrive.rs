//! Google Drive tool catalog.

use pantheon_core::gdrive::DriveOp;

use crate::protocol::ServerInfo;
use crate::registry::{RegistryError, ToolRegistry};
use crate::schema::{FieldSpec, InputSchema, ToolDefinition};

pub const SERVER_NAME: &str = "google-drive-mcp";

pub fn server_info() -> ServerInfo {
    ServerInfo::new(SERVER_NAME, env!("CARGO_PKG_VERSION"))
}

const SEARCH_QUERY_HELP: &str =
    "Search query (e.g., \"name contains 'report' and mimeType = 'application/pdf'\")";

fn file_id(description: &str) -> FieldSpec {
    FieldSpec::string("file_id").required().describe(description)
}

pub fn registry() -> Result<ToolRegistry<DriveOp>, RegistryError> {
    ToolRegistry::new([
        (
            ToolDefinition::new(
                "search_files",
                "Search for files in Google Drive using advanced queries",
                InputSchema::new(vec![
                    FieldSpec::string("query").required().describe(SEARCH_QUERY_HELP),
                    FieldSpec::number("max_results")
                        .default_value(10)
                        .describe("Maximum number of results (default: 10)"),
                    FieldSpec::boolean("include_shared_drives")
                        .default_value(false)
                        .describe("Include shared drive files"),
                ]),
            ),
            DriveOp::SearchFiles,
        ),
        (
            ToolDefinition::new(
                "get_file_metadata",
                "Get detailed metadata for a file",
                InputSchema::new(vec![file_id("Google Drive file ID")]),
            ),
            DriveOp::GetFileMetadata,
        ),
        (
            ToolDefinition::new(
                "list_shared_drives",
                "List all shared drives (team drives) accessible to the user",
                InputSchema::empty(),
            ),
            DriveOp::ListSharedDrives,
        ),
        (
            ToolDefinition::new(
                "get_file_permissions",
                "Get sharing permissions for a file",
                InputSchema::new(vec![file_id("Google Drive file ID")]),
            ),
            DriveOp::GetFilePermissions,
        ),
        (
            ToolDefinition::new(
                "create_file",
                "Create a new file in Google Drive",
                InputSchema::new(vec![
                    FieldSpec::string("name").required().describe("File name"),
                    FieldSpec::string("content")
                        .required()
                        .describe("File content (for text files)"),
                    FieldSpec::string("mime_type")
                        .default_value("text/plain")
                        .describe("MIME type (default: text/plain)"),
                    FieldSpec::string("parent_id").describe("Parent folder ID (optional)"),
                ]),
            ),
            DriveOp::CreateFile,
        ),
        (
            ToolDefinition::new(
                "update_file_content",
                "Update the content of an existing file",
                InputSchema::new(vec![
                    file_id("File ID to update"),
                    FieldSpec::string("content").required().describe("New file content"),
                ]),
            ),
            DriveOp::UpdateFileContent,
        ),
        (
            ToolDefinition::new(
                "delete_file",
                "Delete a file (moves to trash)",
                InputSchema::new(vec![file_id("File ID to delete")]),
            ),
            DriveOp::DeleteFile,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn catalog_has_seven_tools_in_order() {
        let registry = registry().expect("drive catalog");
        let names: Vec<&str> = registry.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "search_files",
                "get_file_metadata",
                "list_shared_drives",
                "get_file_permissions",
                "create_file",
                "update_file_content",
                "delete_file",
            ]
        );
    }

    #[test]
    fn empty_schema_renders_as_object() {
        let registry = registry().expect("drive catalog");
        let def = registry.lookup("list_shared_drives").unwrap();
        assert_eq!(
            serde_json::to_value(&def.input_schema).unwrap(),
            json!({"type": "object", "properties": {}})
        );
    }
}
