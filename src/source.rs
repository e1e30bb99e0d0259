//! Statistics source: the admin-command surface one scrape needs.
//!
//! [`StatsSource`] is the seam between the orchestrator and the MongoDB
//! driver; [`MongoStatsSource`] is the production implementation, tests use
//! an in-crate mock. Pure request/response, no retries: a transient failure
//! for one entity must not abort the overall scrape.

use async_trait::async_trait;
use mongodb::Client;
use mongodb::bson::{Document, doc, from_document};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ScrapeError;

/// Database-level statistics, one `dbStats` reply per database.
///
/// Numeric fields are f64: the server reports them as a mix of int32,
/// int64, and double depending on version and scale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseStats {
    #[serde(rename = "db")]
    pub name: String,
    #[serde(rename = "indexSize")]
    pub index_size_bytes: f64,
    #[serde(rename = "dataSize")]
    pub data_size_bytes: f64,
    #[serde(rename = "collections")]
    pub collection_count: f64,
    #[serde(rename = "objects")]
    pub object_count: f64,
    #[serde(rename = "indexes")]
    pub index_count: f64,
}

/// A full `dbStats` reply: the aggregate record, plus — on mongos — the
/// `raw` map from shard descriptor to that shard's flat record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseStatsReply {
    #[serde(flatten)]
    pub totals: DatabaseStats,
    #[serde(rename = "raw", default)]
    pub shards: Option<HashMap<String, DatabaseStats>>,
}

/// Collection-level statistics, one `collStats` reply per collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectionStats {
    #[serde(rename = "size")]
    pub size_bytes: f64,
    #[serde(rename = "count")]
    pub object_count: f64,
    #[serde(rename = "avgObjSize")]
    pub avg_object_size_bytes: f64,
    #[serde(rename = "storageSize")]
    pub storage_size_bytes: f64,
    #[serde(rename = "nindexes")]
    pub index_count: f64,
    #[serde(rename = "totalIndexSize")]
    pub total_index_size_bytes: f64,
}

/// The enumeration and stats calls one scrape cycle performs.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// List every database name visible on the cluster.
    async fn list_databases(&self) -> Result<Vec<String>, ScrapeError>;

    /// List every collection name within a database.
    async fn list_collections(&self, db: &str) -> Result<Vec<String>, ScrapeError>;

    /// Run `dbStats` scoped to a database.
    async fn database_stats(&self, db: &str) -> Result<DatabaseStatsReply, ScrapeError>;

    /// Run `collStats` scoped to a collection.
    async fn collection_stats(&self, db: &str, coll: &str)
    -> Result<CollectionStats, ScrapeError>;
}

#[async_trait]
impl<S: StatsSource + ?Sized> StatsSource for Arc<S> {
    async fn list_databases(&self) -> Result<Vec<String>, ScrapeError> {
        (**self).list_databases().await
    }

    async fn list_collections(&self, db: &str) -> Result<Vec<String>, ScrapeError> {
        (**self).list_collections(db).await
    }

    async fn database_stats(&self, db: &str) -> Result<DatabaseStatsReply, ScrapeError> {
        (**self).database_stats(db).await
    }

    async fn collection_stats(
        &self,
        db: &str,
        coll: &str,
    ) -> Result<CollectionStats, ScrapeError> {
        (**self).collection_stats(db, coll).await
    }
}

/// Production stats source backed by the MongoDB driver.
pub struct MongoStatsSource {
    client: Client,
}

impl MongoStatsSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn run_stats_command(
        &self,
        db: &str,
        entity: &str,
        command: Document,
    ) -> Result<Document, ScrapeError> {
        self.client
            .database(db)
            .run_command(command)
            .await
            .map_err(|e| ScrapeError::Query(entity.to_string(), e))
    }
}

#[async_trait]
impl StatsSource for MongoStatsSource {
    async fn list_databases(&self) -> Result<Vec<String>, ScrapeError> {
        self.client
            .list_database_names()
            .await
            .map_err(|e| ScrapeError::Enumeration("databases".to_string(), e))
    }

    async fn list_collections(&self, db: &str) -> Result<Vec<String>, ScrapeError> {
        self.client
            .database(db)
            .list_collection_names()
            .await
            .map_err(|e| ScrapeError::Enumeration(format!("collections of {db}"), e))
    }

    async fn database_stats(&self, db: &str) -> Result<DatabaseStatsReply, ScrapeError> {
        let entity = format!("dbStats {db}");
        let reply = self
            .run_stats_command(db, &entity, doc! { "dbStats": 1, "scale": 1 })
            .await?;
        from_document(reply).map_err(|e| ScrapeError::Decode(entity, e))
    }

    async fn collection_stats(
        &self,
        db: &str,
        coll: &str,
    ) -> Result<CollectionStats, ScrapeError> {
        let entity = format!("collStats {db}.{coll}");
        let reply = self
            .run_stats_command(db, &entity, doc! { "collStats": coll, "scale": 1 })
            .await?;
        from_document(reply).map_err(|e| ScrapeError::Decode(entity, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_flat_database_stats() {
        let reply: DatabaseStatsReply = from_document(doc! {
            "db": "books",
            "collections": 3,
            "objects": 1500i64,
            "dataSize": 8_388_608.0,
            "indexSize": 65536,
            "indexes": 5,
            "ok": 1.0,
        })
        .expect("flat dbStats reply should decode");

        assert_eq!(reply.totals.name, "books");
        assert_eq!(reply.totals.collection_count, 3.0);
        assert_eq!(reply.totals.object_count, 1500.0);
        assert_eq!(reply.totals.data_size_bytes, 8_388_608.0);
        assert_eq!(reply.totals.index_count, 5.0);
        assert!(reply.shards.is_none());
    }

    #[test]
    fn test_decode_sharded_database_stats() {
        let reply: DatabaseStatsReply = from_document(doc! {
            "db": "books",
            "objects": 3000,
            "raw": {
                "shard01/host-a:27017,host-b:27017": {
                    "db": "books",
                    "objects": 1000,
                    "dataSize": 4096,
                },
                "shard02/host-c:27017": {
                    "db": "books",
                    "objects": 2000,
                    "dataSize": 8192,
                },
            },
            "ok": 1.0,
        })
        .expect("sharded dbStats reply should decode");

        assert_eq!(reply.totals.object_count, 3000.0);
        let shards = reply.shards.expect("raw map should be present");
        assert_eq!(shards.len(), 2);
        assert_eq!(
            shards["shard01/host-a:27017,host-b:27017"].object_count,
            1000.0
        );
    }

    #[test]
    fn test_decode_collection_stats_with_missing_fields() {
        // collStats omits fields for empty collections; they default to 0.
        let stats: CollectionStats = from_document(doc! {
            "size": 1024,
            "count": 10,
            "avgObjSize": 102.4,
            "ok": 1.0,
        })
        .expect("partial collStats reply should decode");

        assert_eq!(stats.size_bytes, 1024.0);
        assert_eq!(stats.object_count, 10.0);
        assert_eq!(stats.avg_object_size_bytes, 102.4);
        assert_eq!(stats.storage_size_bytes, 0.0);
        assert_eq!(stats.index_count, 0.0);
        assert_eq!(stats.total_index_size_bytes, 0.0);
    }
}
