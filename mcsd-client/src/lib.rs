pub mod access;
pub mod auth;
pub mod error;

pub use access::{FhirAccess, SearchResult};
pub use auth::{NoAuthProvider, StaticTokenProvider, TokenProvider};
pub use error::{ClientError, Result};
