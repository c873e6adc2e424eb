//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default delay before an `InProgress` reconcile result is retried (seconds)
pub const DEFAULT_RETRY_SECS: u64 = 10;

/// Default timeout for a single Atlas API request (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default Atlas API base URL
pub const DEFAULT_ATLAS_BASE_URL: &str = "https://cloud.mongodb.com";

/// Default delay before restarting a secret watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Kind name used when registering interest in Kubernetes Secrets
pub const SECRET_KIND: &str = "Secret";

/// Label carrying the Atlas project ID on generated connection secrets
pub const PROJECT_LABEL_KEY: &str = "atlas.mongodb.com/project-id";

/// Label carrying the normalized cluster name on generated connection secrets
pub const CLUSTER_LABEL_KEY: &str = "atlas.mongodb.com/cluster-name";

/// Annotation carrying the full cluster name (label values stop at 63
/// characters, Atlas cluster names at 64)
pub const CLUSTER_NAME_ANNOTATION_KEY: &str = "atlas.mongodb.com/cluster-name";

/// Connection secret data keys (consumed by existing applications, must not change)
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const STANDARD_KEY: &str = "connectionString.standard";
pub const STANDARD_SRV_KEY: &str = "connectionString.standardSrv";
pub const PRIVATE_KEY: &str = "connectionString.private";
pub const PRIVATE_SRV_KEY: &str = "connectionString.privateSrv";
pub const PRIVATE_SHARD_KEY: &str = "connectionString.privateShard";

/// Maximum length of a Kubernetes object name (DNS subdomain)
pub const MAX_NAME_LENGTH: usize = 253;

/// Maximum length of a Kubernetes label value
pub const MAX_LABEL_VALUE_LENGTH: usize = 63;

/// Atlas for Government hosts. Serverless instances are not offered there,
/// so a failed serverless listing is tolerated.
pub const CLOUD_GOV_DOMAINS: &[&str] = &[
    "cloudgov.mongodb.com",
    "cloud.mongodbgov.com",
    "cloud-dev.mongodbgov.com",
    "cloud-qa.mongodbgov.com",
];

/// Field manager / user agent name
pub const CONTROLLER_NAME: &str = "atlas-connection-controller";

/// Annotation that opts a resource out of reconciliation
pub const RECONCILIATION_POLICY_ANNOTATION: &str = "mongodb.com/atlas-reconciliation-policy";
pub const RECONCILIATION_POLICY_SKIP: &str = "skip";

/// Finalizer pinned on auditing resources that manage at least one project
pub const AUDITING_FINALIZER: &str = "mongodbatlas/finalizer";
