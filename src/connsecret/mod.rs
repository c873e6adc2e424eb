//! # Connection Secrets
//!
//! Generated Secrets carrying live credentials and connection URLs for one
//! (project, deployment, database user) triple.
//!
//! - `connection.rs` - connection endpoints and inventory merging
//! - `naming.rs` - deterministic secret names and label values
//! - `url.rs` - credential embedding into connection strings
//! - `secret.rs` - secret payload and upsert
//! - `synchronizer.rs` - create/update/cleanup pass per database user
//! - `binding.rs` - user + secret provisioning with compensation

mod binding;
mod connection;
mod naming;
mod secret;
mod synchronizer;
mod url;

pub use binding::{
    generate_password, provision_binding, Binding, BindingError, BindingRequest,
    DEFAULT_BINDING_ROLE,
};
pub use connection::{connection_set, Connection, PrivateUrls};
pub use naming::{connection_secret_name, normalize_identifier, normalize_label_value};
pub use secret::{build_connection_secret, project_labels, upsert_secret, UpsertOutcome};
pub use synchronizer::{
    ConnectionSecretSynchronizer, SyncError, SyncReport, CONNECTION_SECRETS_ENSURED_EVENT,
};
pub use url::{credentials_of, embed_credentials, strip_credentials, UrlError};
