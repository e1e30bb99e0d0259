//! Gauge registry for one scrape cycle.
//!
//! Every exported gauge is declared once, up front, in a [`MetricCatalog`]:
//! name, help text, and a fixed label schema. A [`MetricRegistry`] is built
//! from the catalogue per scrape, populated by the orchestrator, rendered to
//! Prometheus text format, and then discarded — a dropped collection or a
//! removed shard can never carry a stale value into the next scrape.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

use crate::config::TopologyMode;

// Database-level gauges (subsystem "db").
pub const DB_INDEX_SIZE_BYTES: &str = "mongodb_db_index_size_bytes";
pub const DB_DATA_SIZE_BYTES: &str = "mongodb_db_data_size_bytes";
pub const DB_COLLECTIONS_TOTAL: &str = "mongodb_db_collections_total";
pub const DB_INDEXES_TOTAL: &str = "mongodb_db_indexes_total";
pub const DB_OBJECTS_TOTAL: &str = "mongodb_db_objects_total";

// Collection-level gauges (subsystem "db_coll").
pub const COLL_SIZE: &str = "mongodb_db_coll_size";
pub const COLL_COUNT: &str = "mongodb_db_coll_count";
pub const COLL_AVG_OBJ_SIZE: &str = "mongodb_db_coll_avgobjsize";
pub const COLL_STORAGE_SIZE: &str = "mongodb_db_coll_storage_size";
pub const COLL_INDEXES: &str = "mongodb_db_coll_indexes";
pub const COLL_INDEXES_SIZE: &str = "mongodb_db_coll_indexes_size";

/// Exporter self-health: entities skipped during the last scrape.
pub const SCRAPE_ERRORS: &str = "mongodb_exporter_scrape_errors";

/// Static declaration of one gauge.
#[derive(Debug, Clone, Copy)]
pub struct GaugeSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// The full set of gauges one topology mode exports.
///
/// Database-level gauges carry `{db}` in standalone mode and `{db, shard}`
/// in router mode; collection-level gauges carry `{db, coll}` in both.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    specs: Vec<GaugeSpec>,
}

impl MetricCatalog {
    pub fn for_mode(mode: TopologyMode) -> Self {
        let db_labels: &'static [&'static str] = match mode {
            TopologyMode::Standalone => &["db"],
            TopologyMode::Router => &["db", "shard"],
        };
        const COLL_LABELS: &[&str] = &["db", "coll"];

        let specs = vec![
            GaugeSpec {
                name: DB_INDEX_SIZE_BYTES,
                help: "The total size in bytes of all indexes created on this database",
                labels: db_labels,
            },
            GaugeSpec {
                name: DB_DATA_SIZE_BYTES,
                help: "The total size in bytes of the uncompressed data held in this database",
                labels: db_labels,
            },
            GaugeSpec {
                name: DB_COLLECTIONS_TOTAL,
                help: "Contains a count of the number of collections in that database",
                labels: db_labels,
            },
            GaugeSpec {
                name: DB_INDEXES_TOTAL,
                help: "Contains a count of the total number of indexes across all collections in the database",
                labels: db_labels,
            },
            GaugeSpec {
                name: DB_OBJECTS_TOTAL,
                help: "Contains a count of the number of objects (i.e. documents) in the database across all collections",
                labels: db_labels,
            },
            GaugeSpec {
                name: COLL_SIZE,
                help: "The total size in memory of all records in a collection",
                labels: COLL_LABELS,
            },
            GaugeSpec {
                name: COLL_COUNT,
                help: "The number of objects or documents in this collection",
                labels: COLL_LABELS,
            },
            GaugeSpec {
                name: COLL_AVG_OBJ_SIZE,
                help: "The average size of an object in the collection (plus any padding)",
                labels: COLL_LABELS,
            },
            GaugeSpec {
                name: COLL_STORAGE_SIZE,
                help: "The total amount of storage allocated to this collection for document storage",
                labels: COLL_LABELS,
            },
            GaugeSpec {
                name: COLL_INDEXES,
                help: "The number of indexes on the collection",
                labels: COLL_LABELS,
            },
            GaugeSpec {
                name: COLL_INDEXES_SIZE,
                help: "The total size of all indexes",
                labels: COLL_LABELS,
            },
        ];

        Self { specs }
    }

    /// Static name/help/label metadata for every declared gauge, including
    /// the exporter self-health gauge. Independent of any registry values.
    pub fn describe(&self) -> Vec<GaugeSpec> {
        let mut specs = self.specs.clone();
        specs.push(GaugeSpec {
            name: SCRAPE_ERRORS,
            help: SCRAPE_ERRORS_HELP,
            labels: &[],
        });
        specs
    }
}

const SCRAPE_ERRORS_HELP: &str =
    "Number of entities (databases or collections) skipped during the last scrape";

/// A scrape-local set of gauges built from a [`MetricCatalog`].
pub struct MetricRegistry {
    registry: Registry,
    gauges: HashMap<&'static str, GaugeVec>,
    scrape_errors: Gauge,
}

impl MetricRegistry {
    /// Declare every catalogue gauge in a fresh Prometheus registry.
    ///
    /// Only fails on conflicting declarations, which a well-formed
    /// catalogue cannot produce.
    pub fn new(catalog: &MetricCatalog) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let mut gauges = HashMap::with_capacity(catalog.specs.len());

        for spec in &catalog.specs {
            let vec = GaugeVec::new(Opts::new(spec.name, spec.help), spec.labels)?;
            registry.register(Box::new(vec.clone()))?;
            gauges.insert(spec.name, vec);
        }

        let scrape_errors = Gauge::new(SCRAPE_ERRORS, SCRAPE_ERRORS_HELP)?;
        registry.register(Box::new(scrape_errors.clone()))?;

        Ok(Self {
            registry,
            gauges,
            scrape_errors,
        })
    }

    /// Idempotent overwrite of one sample.
    ///
    /// Label arity is fixed by the catalogue; callers pass exactly the
    /// declared number of label values.
    pub fn set(&self, metric: &str, labels: &[&str], value: f64) {
        match self.gauges.get(metric) {
            Some(gauge) => gauge.with_label_values(labels).set(value),
            None => {
                debug_assert!(false, "set on undeclared metric {metric}");
                tracing::warn!(metric = metric, "set on undeclared metric, sample dropped");
            }
        }
    }

    /// Record how many entities were skipped during this scrape.
    pub fn set_scrape_errors(&self, count: f64) {
        self.scrape_errors.set(count);
    }

    /// Render every currently-set sample in Prometheus text format.
    pub fn emit(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            return String::new();
        }
        match String::from_utf8(buffer) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
                String::new()
            }
        }
    }

    /// Clear every previously-set value, keeping all declarations.
    pub fn reset(&self) {
        for gauge in self.gauges.values() {
            gauge.reset();
        }
        self.scrape_errors.set(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Value sample lines, ignoring HELP/TYPE metadata.
    fn sample_lines(body: &str) -> Vec<&str> {
        body.lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect()
    }

    #[test]
    fn test_catalog_declares_full_schema() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Standalone);
        let specs = catalog.describe();
        assert_eq!(specs.len(), 12);
        assert!(specs.iter().any(|s| s.name == DB_OBJECTS_TOTAL && s.labels == ["db"]));
        assert!(specs.iter().any(|s| s.name == COLL_SIZE && s.labels == ["db", "coll"]));
        assert!(specs.iter().any(|s| s.name == SCRAPE_ERRORS && s.labels.is_empty()));
    }

    #[test]
    fn test_router_catalog_adds_shard_label() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Router);
        for spec in catalog.describe() {
            if spec.name.starts_with("mongodb_db_coll_") {
                assert_eq!(spec.labels, ["db", "coll"], "{}", spec.name);
            } else if spec.name.starts_with("mongodb_db_") {
                assert_eq!(spec.labels, ["db", "shard"], "{}", spec.name);
            }
        }
    }

    #[test]
    fn test_empty_registry_emits_no_samples_but_describes_fully() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Standalone);
        let registry = MetricRegistry::new(&catalog).expect("registry should build");

        let body = registry.emit();
        // scrape_errors starts unset at 0; it is a plain gauge and always
        // renders, but no catalogue gauge may produce a labeled sample.
        let labeled: Vec<&str> = sample_lines(&body)
            .into_iter()
            .filter(|l| !l.starts_with(SCRAPE_ERRORS))
            .collect();
        assert!(labeled.is_empty(), "unexpected samples: {labeled:?}");

        assert_eq!(catalog.describe().len(), 12);
    }

    #[test]
    fn test_set_then_emit_contains_sample() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Standalone);
        let registry = MetricRegistry::new(&catalog).expect("registry should build");

        registry.set(DB_DATA_SIZE_BYTES, &["books"], 4096.0);
        let body = registry.emit();
        assert!(body.contains(DB_DATA_SIZE_BYTES));
        assert!(body.contains(r#"db="books""#));
        assert!(body.contains("4096"));
    }

    #[test]
    fn test_set_is_last_write_wins() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Standalone);
        let registry = MetricRegistry::new(&catalog).expect("registry should build");

        registry.set(DB_OBJECTS_TOTAL, &["books"], 1.0);
        registry.set(DB_OBJECTS_TOTAL, &["books"], 2.0);

        let body = registry.emit();
        let samples: Vec<&str> = sample_lines(&body)
            .into_iter()
            .filter(|l| l.starts_with(DB_OBJECTS_TOTAL))
            .collect();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].ends_with('2'));
    }

    #[test]
    fn test_reset_clears_values() {
        let catalog = MetricCatalog::for_mode(TopologyMode::Standalone);
        let registry = MetricRegistry::new(&catalog).expect("registry should build");

        registry.set(COLL_COUNT, &["books", "orders"], 42.0);
        registry.set_scrape_errors(3.0);
        registry.reset();

        let body = registry.emit();
        assert!(!body.contains(r#"coll="orders""#));
        assert!(!sample_lines(&body)
            .iter()
            .any(|l| l.starts_with(SCRAPE_ERRORS) && !l.ends_with('0')));
    }
}
