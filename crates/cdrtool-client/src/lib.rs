//! Repository API seam: the [`Repository`] trait the orchestration code is
//! written against, and its HTTP implementation.

mod error;
mod repository;

pub use error::RepoError;
pub use repository::{NewEnvelope, Repository};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::RepositoryClient;
