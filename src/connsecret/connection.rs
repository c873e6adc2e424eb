//! # Connections
//!
//! Named connection endpoints assembled from the two independent Atlas
//! inventories (advanced clusters and serverless instances).

use crate::client::ClusterDescription;
use std::collections::HashSet;

/// Private-endpoint URL variants of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateUrls {
    pub url: String,
    pub srv_url: String,
    pub shard_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub standard_url: String,
    pub standard_srv_url: String,
    pub private_url: String,
    pub private_srv_url: String,
    pub is_serverless: bool,
    pub private_endpoints: Vec<PrivateUrls>,
}

impl Connection {
    #[must_use]
    pub fn from_cluster(cluster: &ClusterDescription, is_serverless: bool) -> Self {
        let mut connection = Connection {
            name: cluster.name.clone(),
            is_serverless,
            ..Default::default()
        };
        if let Some(strings) = &cluster.connection_strings {
            connection.standard_url = strings.standard.clone().unwrap_or_default();
            connection.standard_srv_url = strings.standard_srv.clone().unwrap_or_default();
            connection.private_url = strings.private.clone().unwrap_or_default();
            connection.private_srv_url = strings.private_srv.clone().unwrap_or_default();
            connection.private_endpoints = strings
                .private_endpoint
                .iter()
                .map(|pe| PrivateUrls {
                    url: pe.connection_string.clone().unwrap_or_default(),
                    srv_url: pe.srv_connection_string.clone().unwrap_or_default(),
                    shard_url: pe.srv_shard_optimized_connection_string.clone().unwrap_or_default(),
                })
                .collect();
        }
        connection
    }

    /// Atlas lists deployments before their connection strings exist, often
    /// with an empty strings object. The SRV string is the last to appear.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.standard_srv_url.is_empty()
    }

    /// Private URL variants in secret-key order: the legacy private pair
    /// (when present) first, then one entry per private endpoint
    #[must_use]
    pub fn private_variants(&self) -> Vec<PrivateUrls> {
        let mut variants = Vec::with_capacity(self.private_endpoints.len() + 1);
        if !self.private_url.is_empty() {
            variants.push(PrivateUrls {
                url: self.private_url.clone(),
                srv_url: self.private_srv_url.clone(),
                shard_url: String::new(),
            });
        }
        variants.extend(self.private_endpoints.iter().cloned());
        variants
    }
}

/// Merge connection lists, keeping the first connection seen for every
/// name. Order of first appearance is preserved.
#[must_use]
pub fn connection_set<I>(lists: I) -> Vec<Connection>
where
    I: IntoIterator<Item = Vec<Connection>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for connection in lists.into_iter().flatten() {
        if seen.insert(connection.name.clone()) {
            merged.push(connection);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConnectionStrings, PrivateEndpoint};

    fn conn(name: &str, srv: &str) -> Connection {
        Connection {
            name: name.to_string(),
            standard_srv_url: srv.to_string(),
            ..Default::default()
        }
    }

    fn names(connections: &[Connection]) -> Vec<&str> {
        connections.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_first_seen_wins() {
        let merged = connection_set(vec![
            vec![conn("A", "v1")],
            vec![conn("A", "v2"), conn("B", "b")],
        ]);
        assert_eq!(merged, vec![conn("A", "v1"), conn("B", "b")]);
    }

    #[test]
    fn test_membership_independent_of_order() {
        let forward = connection_set(vec![vec![conn("A", "v1")], vec![conn("A", "v2"), conn("B", "b")]]);
        let reverse = connection_set(vec![vec![conn("A", "v2"), conn("B", "b")], vec![conn("A", "v1")]]);

        let mut forward_names = names(&forward);
        let mut reverse_names = names(&reverse);
        forward_names.sort_unstable();
        reverse_names.sort_unstable();
        assert_eq!(forward_names, reverse_names);

        // representative comes from whichever list is first
        assert_eq!(reverse[0], conn("A", "v2"));
    }

    #[test]
    fn test_duplicates_within_one_list_are_dropped() {
        let merged = connection_set(vec![vec![conn("A", "1"), conn("A", "2")]]);
        assert_eq!(merged, vec![conn("A", "1")]);
    }

    #[test]
    fn test_from_cluster_without_strings_is_not_ready() {
        let connection = Connection::from_cluster(&ClusterDescription::new("c0"), false);
        assert!(!connection.is_ready());

        let empty = ClusterDescription::new("c0").with_connection_strings(ConnectionStrings::default());
        assert!(!Connection::from_cluster(&empty, false).is_ready());
    }

    #[test]
    fn test_private_variants_order() {
        let cluster = ClusterDescription::new("c0").with_connection_strings(ConnectionStrings {
            standard_srv: Some("mongodb+srv://c0.net".into()),
            private: Some("mongodb://pl:1".into()),
            private_srv: Some("mongodb+srv://pl.c0.net".into()),
            private_endpoint: vec![PrivateEndpoint {
                connection_string: Some("mongodb://pe:1".into()),
                srv_connection_string: Some("mongodb+srv://pe.c0.net".into()),
                srv_shard_optimized_connection_string: Some("mongodb+srv://pe-shard.c0.net".into()),
            }],
            ..Default::default()
        });
        let variants = Connection::from_cluster(&cluster, false).private_variants();

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].url, "mongodb://pl:1");
        assert!(variants[0].shard_url.is_empty());
        assert_eq!(variants[1].shard_url, "mongodb+srv://pe-shard.c0.net");
    }
}
