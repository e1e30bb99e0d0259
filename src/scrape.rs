//! The scrape cycle.
//!
//! One scrape enumerates databases, fetches database- and collection-level
//! statistics, normalizes sharded topology, folds everything into a
//! scrape-local [`MetricRegistry`], and renders it. Failures are local to
//! the entity being processed: a broken database or collection is logged,
//! counted, and skipped; the scrape always completes and the endpoint
//! always has something to serve.
//!
//! Because every scrape owns its registry, overlapping exposition requests
//! never observe mixed or partial state and no lock around the cycle is
//! needed; discarding the registry after rendering is what guarantees that
//! entities removed between scrapes stop being reported.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TopologyMode;
use crate::error::ScrapeError;
use crate::registry::{self, MetricCatalog, MetricRegistry};
use crate::source::{CollectionStats, DatabaseStats, StatsSource};
use crate::topology;

/// One skipped entity and why.
#[derive(Debug)]
pub struct ScrapeFailure {
    pub entity: String,
    pub code: &'static str,
}

/// Per-entity outcome of one scrape cycle.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Databases whose stats were exported.
    pub databases: usize,
    /// Collections whose stats were exported.
    pub collections: usize,
    /// Entities skipped, with their error codes.
    pub failures: Vec<ScrapeFailure>,
}

impl ScrapeReport {
    fn record_failure(&mut self, entity: impl Into<String>, err: &ScrapeError) {
        self.failures.push(ScrapeFailure {
            entity: entity.into(),
            code: err.error_code(),
        });
    }
}

/// The rendered snapshot plus its report.
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// Prometheus text exposition body.
    pub body: String,
    pub report: ScrapeReport,
}

/// Drives one full scrape against a [`StatsSource`].
pub struct ScrapeOrchestrator<S> {
    source: S,
    mode: TopologyMode,
    excluded: HashSet<String>,
    stats_timeout: Duration,
    catalog: MetricCatalog,
}

impl<S: StatsSource> ScrapeOrchestrator<S> {
    pub fn new(
        source: S,
        mode: TopologyMode,
        excluded: impl IntoIterator<Item = String>,
        stats_timeout: Duration,
    ) -> Self {
        Self {
            source,
            mode,
            excluded: excluded.into_iter().collect(),
            stats_timeout,
            catalog: MetricCatalog::for_mode(mode),
        }
    }

    /// Static gauge metadata, available even before the first scrape.
    ///
    /// The text exposition omits families with no samples, so this is the
    /// only complete view of the declared schema; a degraded scrape still
    /// answers `describe` in full.
    pub fn describe(&self) -> Vec<registry::GaugeSpec> {
        self.catalog.describe()
    }

    /// Run one full scrape cycle and render its snapshot.
    pub async fn scrape(&self) -> ScrapeOutcome {
        let registry = match MetricRegistry::new(&self.catalog) {
            Ok(registry) => registry,
            Err(e) => {
                // Conflicting declarations cannot come from a fixed
                // catalogue; degrade to an empty exposition body.
                tracing::error!(error = %e, "Failed to build scrape registry");
                return ScrapeOutcome {
                    body: String::new(),
                    report: ScrapeReport::default(),
                };
            }
        };
        let mut report = ScrapeReport::default();

        match self.bounded("databases", self.source.list_databases()).await {
            Ok(databases) => {
                for db in databases.iter().filter(|db| !self.excluded.contains(*db)) {
                    self.scrape_database(&registry, &mut report, db).await;
                }
            }
            Err(e) => {
                // An empty scrape is still valid: zero samples, full metadata.
                warn!(error = %e, code = e.error_code(), "Failed to list databases");
                report.record_failure("databases", &e);
            }
        }

        registry.set_scrape_errors(report.failures.len() as f64);
        let body = registry.emit();
        registry.reset();

        ScrapeOutcome { body, report }
    }

    async fn scrape_database(
        &self,
        registry: &MetricRegistry,
        report: &mut ScrapeReport,
        db: &str,
    ) {
        let entity = format!("dbStats {db}");
        match self.bounded(&entity, self.source.database_stats(db)).await {
            Ok(reply) => {
                match (self.mode, &reply.shards) {
                    (TopologyMode::Router, Some(shards)) => {
                        for (shard, stats) in topology::normalize_shard_map(shards) {
                            let name = non_empty(&stats.name, db);
                            self.export_database(registry, &[name, shard], stats);
                        }
                        report.databases += 1;
                    }
                    (TopologyMode::Router, None) => {
                        // A mongos reply without a raw shard map carries no
                        // per-shard breakdown to label; skip database-level
                        // samples for it and keep it out of the export count.
                        debug!(db = db, "dbStats reply carried no shard map");
                    }
                    (TopologyMode::Standalone, _) => {
                        let name = non_empty(&reply.totals.name, db);
                        self.export_database(registry, &[name], &reply.totals);
                        report.databases += 1;
                    }
                }
            }
            Err(e) => {
                warn!(db = db, error = %e, code = e.error_code(), "Failed to get database status");
                report.record_failure(entity, &e);
                return;
            }
        }

        self.scrape_collections(registry, report, db).await;
    }

    async fn scrape_collections(
        &self,
        registry: &MetricRegistry,
        report: &mut ScrapeReport,
        db: &str,
    ) {
        let entity = format!("collections of {db}");
        let collections = match self.bounded(&entity, self.source.list_collections(db)).await {
            Ok(collections) => collections,
            Err(e) => {
                // Only this database loses its collection-level samples.
                warn!(db = db, error = %e, code = e.error_code(), "Failed to list collections");
                report.record_failure(entity, &e);
                return;
            }
        };

        for coll in &collections {
            let entity = format!("collStats {db}.{coll}");
            match self
                .bounded(&entity, self.source.collection_stats(db, coll))
                .await
            {
                Ok(stats) => {
                    self.export_collection(registry, db, coll, &stats);
                    report.collections += 1;
                }
                Err(e) => {
                    warn!(db = db, coll = coll, error = %e, code = e.error_code(), "Failed to get collection status");
                    report.record_failure(entity, &e);
                }
            }
        }
    }

    fn export_database(&self, registry: &MetricRegistry, labels: &[&str], stats: &DatabaseStats) {
        registry.set(registry::DB_INDEX_SIZE_BYTES, labels, stats.index_size_bytes);
        registry.set(registry::DB_DATA_SIZE_BYTES, labels, stats.data_size_bytes);
        registry.set(registry::DB_COLLECTIONS_TOTAL, labels, stats.collection_count);
        registry.set(registry::DB_INDEXES_TOTAL, labels, stats.index_count);
        registry.set(registry::DB_OBJECTS_TOTAL, labels, stats.object_count);
    }

    fn export_collection(
        &self,
        registry: &MetricRegistry,
        db: &str,
        coll: &str,
        stats: &CollectionStats,
    ) {
        let labels = &[db, coll];
        registry.set(registry::COLL_SIZE, labels, stats.size_bytes);
        registry.set(registry::COLL_COUNT, labels, stats.object_count);
        registry.set(registry::COLL_AVG_OBJ_SIZE, labels, stats.avg_object_size_bytes);
        registry.set(registry::COLL_STORAGE_SIZE, labels, stats.storage_size_bytes);
        registry.set(registry::COLL_INDEXES, labels, stats.index_count);
        registry.set(registry::COLL_INDEXES_SIZE, labels, stats.total_index_size_bytes);
    }

    /// Apply the per-call deadline so an unreachable cluster degrades the
    /// scrape instead of hanging the exposition request.
    async fn bounded<T>(
        &self,
        entity: &str,
        call: impl Future<Output = Result<T, ScrapeError>>,
    ) -> Result<T, ScrapeError> {
        match tokio::time::timeout(self.stats_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout(entity.to_string(), self.stats_timeout)),
        }
    }
}

fn non_empty<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.is_empty() { fallback } else { name }
}

/// Log a one-line summary of a finished scrape.
pub fn log_outcome(outcome: &ScrapeOutcome) {
    if outcome.report.failures.is_empty() {
        debug!(
            databases = outcome.report.databases,
            collections = outcome.report.collections,
            "Scrape succeeded"
        );
    } else {
        info!(
            databases = outcome.report.databases,
            collections = outcome.report.collections,
            skipped = outcome.report.failures.len(),
            "Partial scrape"
        );
        for failure in &outcome.report.failures {
            debug!(entity = %failure.entity, code = failure.code, "Skipped during scrape");
        }
    }
}
