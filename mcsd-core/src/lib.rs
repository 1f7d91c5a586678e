pub mod constants;
pub mod dedup;
pub mod entry;
pub mod error;
pub mod org_tree;
pub mod resource;
pub mod source;
pub mod transaction;
pub mod validator;

pub use dedup::deduplicate;
pub use entry::{Method, PulledEntry};
pub use error::{CoreError, Result};
pub use org_tree::OrganizationTree;
pub use resource::{Meta, Resource};
pub use source::{
    build_source_url, build_source_url_from_ref, directory_key, parse_source_url,
    trim_one_trailing_slash, SourceDirectory,
};
pub use transaction::{build_entry, is_mcsd_directory_endpoint, synthetic_put_entry, TransactionEntry};
pub use validator::{validate, validate_tree_roots, ValidationError};
