//! # Audit Service
//!
//! Per-project auditing settings, read and written as [`AuditingConfig`].

use crate::client::{ApiError, AtlasRestClient, AuditLog};
use crate::crd::AuditingConfig;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait AuditService: Send + Sync {
    /// # Errors
    /// `ApiError::NotFound` when the project does not exist
    async fn get(&self, project_id: &str) -> Result<AuditingConfig, ApiError>;

    /// # Errors
    /// `ApiError::NotFound` when the project does not exist
    async fn set(&self, project_id: &str, config: &AuditingConfig) -> Result<(), ApiError>;
}

/// Filter that actually restricts auditing. An empty document audits
/// everything, same as no filter at all.
fn effective_filter(filter: Option<&Value>) -> Option<&Value> {
    filter.filter(|value| match value {
        Value::Null => false,
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    })
}

/// Whether `current` already applies `desired`
#[must_use]
pub fn config_matches(desired: &AuditingConfig, current: &AuditingConfig) -> bool {
    desired.enabled == current.enabled
        && desired.audit_authorization_success == current.audit_authorization_success
        && effective_filter(desired.audit_filter.as_ref())
            == effective_filter(current.audit_filter.as_ref())
}

fn from_audit_log(audit_log: AuditLog) -> Result<AuditingConfig, ApiError> {
    let audit_filter = if audit_log.audit_filter.trim().is_empty() {
        None
    } else {
        let filter = serde_json::from_str(&audit_log.audit_filter)
            .map_err(|e| ApiError::Decode(format!("invalid audit filter: {e}")))?;
        Some(filter)
    };
    Ok(AuditingConfig {
        enabled: audit_log.enabled,
        audit_authorization_success: audit_log.audit_authorization_success,
        audit_filter,
    })
}

fn to_audit_log(config: &AuditingConfig) -> AuditLog {
    AuditLog {
        enabled: config.enabled,
        audit_authorization_success: config.audit_authorization_success,
        audit_filter: effective_filter(config.audit_filter.as_ref())
            .map_or_else(|| "{}".to_string(), Value::to_string),
    }
}

#[async_trait]
impl AuditService for AtlasRestClient {
    async fn get(&self, project_id: &str) -> Result<AuditingConfig, ApiError> {
        from_audit_log(self.get_audit_log(project_id).await?)
    }

    async fn set(&self, project_id: &str, config: &AuditingConfig) -> Result<(), ApiError> {
        self.update_audit_log(project_id, &to_audit_log(config)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(filter: Option<Value>) -> AuditingConfig {
        AuditingConfig {
            enabled: true,
            audit_authorization_success: false,
            audit_filter: filter,
        }
    }

    #[test]
    fn test_empty_filters_are_equivalent() {
        assert!(config_matches(&config(None), &config(Some(json!({})))));
        assert!(config_matches(&config(Some(Value::Null)), &config(None)));
        assert!(!config_matches(
            &config(None),
            &config(Some(json!({"atype": "authenticate"})))
        ));
    }

    #[test]
    fn test_flags_are_compared() {
        let mut current = config(None);
        current.audit_authorization_success = true;
        assert!(!config_matches(&config(None), &current));
    }

    #[test]
    fn test_audit_log_conversion() {
        let decoded = from_audit_log(AuditLog {
            enabled: true,
            audit_authorization_success: true,
            audit_filter: r#"{"atype":"authenticate"}"#.to_string(),
        })
        .unwrap();
        assert_eq!(decoded.audit_filter, Some(json!({"atype": "authenticate"})));

        assert_eq!(from_audit_log(AuditLog::default()).unwrap().audit_filter, None);
        assert!(matches!(
            from_audit_log(AuditLog {
                audit_filter: "{not json".to_string(),
                ..Default::default()
            }),
            Err(ApiError::Decode(_))
        ));

        assert_eq!(to_audit_log(&config(None)).audit_filter, "{}");
        assert_eq!(
            to_audit_log(&config(Some(json!({"a": 1})))).audit_filter,
            r#"{"a":1}"#
        );
    }
}
