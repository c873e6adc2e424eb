//! # Clients
//!
//! External collaborators of the controller core and their typed errors.
//!
//! - `atlas.rs` - Atlas domain objects and the [`AtlasClient`] trait
//! - `rest.rs` - reqwest implementation of [`AtlasClient`]
//! - `store.rs` - [`SecretStore`] trait and the Kubernetes implementation
//! - `credentials.rs` - password lookup for database users
//! - `error.rs` - [`ApiError`], [`StoreError`], [`CredentialError`]

mod atlas;
mod credentials;
mod error;
mod rest;
mod store;

pub use atlas::{
    AtlasClient, AuditLog, ClusterDescription, ConnectionStrings, DatabaseUserRequest, Paginated,
    PrivateEndpoint, Project, RoleRequest, ScopeRequest,
};
pub use credentials::{CredentialResolver, CredentialSource};
pub use error::{ApiError, CredentialError, StoreError};
pub use rest::AtlasRestClient;
pub use store::{label_selector, KubeSecretStore, SecretStore};
