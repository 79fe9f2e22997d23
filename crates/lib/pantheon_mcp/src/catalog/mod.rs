//! The fixed tool catalogs shipped with the binary.

pub mod dropbox;
pub mod gdrive;
