//! # pantheon_core
//!
//! Core collaborators for the Pantheon storage MCP servers.
//!
//! - [`credentials`]: ordered credential sources and the resolver that
//!   walks them at startup.
//! - [`backend`]: the contract the MCP dispatcher consumes.
//! - [`dropbox`] and [`gdrive`]: HTTP bindings for the two storage services.

pub mod backend;
pub mod credentials;
pub mod dropbox;
pub mod gdrive;

mod http;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
