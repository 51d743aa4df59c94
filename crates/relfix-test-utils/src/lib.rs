pub mod sandbox;
pub mod snapdir;

pub use insta::assert_snapshot;
pub use snapdir::dir_manifest;
