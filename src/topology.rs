//! Shard topology normalization for router-mode scrapes.
//!
//! A mongos `dbStats` reply keys its per-shard breakdown by an opaque
//! descriptor of the form `<shardId>/<host:port,host:port,...>`. Only the
//! prefix before the first `/` is the stable shard identity; the endpoint
//! list changes as replica-set members move.

use crate::source::DatabaseStats;
use std::collections::HashMap;

/// Extract the shard identity from a shard descriptor.
///
/// Descriptors without a `/` are returned unchanged.
pub fn shard_id(descriptor: &str) -> &str {
    descriptor
        .split_once('/')
        .map_or(descriptor, |(id, _)| id)
}

/// Normalize a raw per-shard stats map into `(shardId, stats)` pairs.
///
/// No deduplication: if two descriptors normalize to the same shard id,
/// both pairs are emitted and the last registry write wins.
pub fn normalize_shard_map(
    shards: &HashMap<String, DatabaseStats>,
) -> impl Iterator<Item = (&str, &DatabaseStats)> {
    shards.iter().map(|(descriptor, stats)| (shard_id(descriptor), stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_id_strips_endpoint_list() {
        assert_eq!(shard_id("shard01/host-a:27017,host-b:27017"), "shard01");
    }

    #[test]
    fn test_shard_id_without_slash_is_identity() {
        assert_eq!(shard_id("shard01"), "shard01");
        assert_eq!(shard_id(""), "");
    }

    #[test]
    fn test_normalize_keeps_duplicate_identities() {
        let mut shards = HashMap::new();
        shards.insert("rs0/a:27017".to_string(), DatabaseStats::default());
        shards.insert("rs0/b:27017".to_string(), DatabaseStats::default());

        let ids: Vec<&str> = normalize_shard_map(&shards).map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["rs0", "rs0"]);
    }
}
