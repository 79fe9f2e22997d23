//! Dropbox tool catalog.

use pantheon_core::dropbox::DropboxOp;

use crate::protocol::ServerInfo;
use crate::registry::{RegistryError, ToolRegistry};
use crate::schema::{FieldSpec, InputSchema, ToolDefinition};

pub const SERVER_NAME: &str = "dropbox-mcp";

pub fn server_info() -> ServerInfo {
    ServerInfo::new(SERVER_NAME, env!("CARGO_PKG_VERSION"))
}

pub fn registry() -> Result<ToolRegistry<DropboxOp>, RegistryError> {
    ToolRegistry::new([
        (
            ToolDefinition::new(
                "search_files",
                "Search for files in Dropbox",
                InputSchema::new(vec![
                    FieldSpec::string("query").required().describe("Search query"),
                    FieldSpec::number("max_results")
                        .default_value(20)
                        .describe("Maximum number of results (default: 20)"),
                    FieldSpec::string("path").describe("Limit search to specific folder path"),
                ]),
            ),
            DropboxOp::SearchFiles,
        ),
        (
            ToolDefinition::new(
                "list_folder",
                "List contents of a folder",
                InputSchema::new(vec![
                    FieldSpec::string("path")
                        .default_value("")
                        .describe("Folder path (empty string for root)"),
                    FieldSpec::boolean("recursive")
                        .default_value(false)
                        .describe("List recursively"),
                ]),
            ),
            DropboxOp::ListFolder,
        ),
        (
            ToolDefinition::new(
                "get_metadata",
                "Get metadata for a file or folder",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("File or folder path"),
                ]),
            ),
            DropboxOp::GetMetadata,
        ),
        (
            ToolDefinition::new(
                "upload_file",
                "Upload a file to Dropbox",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("Destination path in Dropbox"),
                    FieldSpec::string("content").required().describe("File content (text)"),
                    FieldSpec::string("mode")
                        .one_of(["add", "overwrite", "update"])
                        .default_value("add")
                        .describe("Upload mode: add, overwrite, or update"),
                ]),
            ),
            DropboxOp::UploadFile,
        ),
        (
            ToolDefinition::new(
                "download_file",
                "Download file content from Dropbox",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("File path in Dropbox"),
                ]),
            ),
            DropboxOp::DownloadFile,
        ),
        (
            ToolDefinition::new(
                "delete",
                "Delete a file or folder",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("Path to delete"),
                ]),
            ),
            DropboxOp::Delete,
        ),
        (
            ToolDefinition::new(
                "create_folder",
                "Create a new folder",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("Folder path to create"),
                ]),
            ),
            DropboxOp::CreateFolder,
        ),
        (
            ToolDefinition::new(
                "get_shared_link",
                "Get or create a shared link for a file",
                InputSchema::new(vec![
                    FieldSpec::string("path").required().describe("File or folder path"),
                ]),
            ),
            DropboxOp::GetSharedLink,
        ),
        (
            ToolDefinition::new(
                "move_file",
                "Move or rename a file",
                InputSchema::new(vec![
                    FieldSpec::string("from_path").required().describe("Source path"),
                    FieldSpec::string("to_path").required().describe("Destination path"),
                ]),
            ),
            DropboxOp::MoveFile,
        ),
    ])
}
