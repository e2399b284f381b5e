//! Staging aggregate store — raw fact rows are written tagged with a config
//! identifier and later read back pre-grouped. Any store offering
//! filter+group semantics suffices; the pipeline is expressed as typed
//! stages rather than a backend-specific query language.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use roas_core::row::{self, Row};
use roas_core::RoasResult;

use crate::revenue::RevenueRow;

pub const FACTS_COLLECTION: &str = "revenue_facts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStage {
    /// Keep rows whose `field` equals `value`.
    Match { field: String, value: Value },
    /// Group by the `by` fields, summing the numeric `sums` fields.
    Group { by: Vec<String>, sums: Vec<String> },
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn insert_many(&self, collection: &str, docs: Vec<Row>) -> RoasResult<()>;

    /// Delete documents where `field == value`; returns how many went away.
    async fn delete_many(&self, collection: &str, field: &str, value: &Value) -> RoasResult<u64>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[AggregateStage],
    ) -> RoasResult<Vec<Row>>;
}

/// In-memory staging store for tests and the offline runner.
#[derive(Default)]
pub struct MemoryStagingStore {
    collections: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn insert_many(&self, collection: &str, mut docs: Vec<Row>) -> RoasResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .append(&mut docs);
        Ok(())
    }

    async fn delete_many(&self, collection: &str, field: &str, value: &Value) -> RoasResult<u64> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| doc.get(field) != Some(value));
        Ok((before - docs.len()) as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[AggregateStage],
    ) -> RoasResult<Vec<Row>> {
        let mut rows = self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for stage in pipeline {
            match stage {
                AggregateStage::Match { field, value } => {
                    rows.retain(|row| row.get(field) == Some(value));
                }
                AggregateStage::Group { by, sums } => {
                    // BTreeMap keeps group output order deterministic.
                    let mut groups: BTreeMap<String, Row> = BTreeMap::new();
                    for r in rows {
                        let key: String = by
                            .iter()
                            .map(|f| r.get(f).cloned().unwrap_or(Value::Null).to_string())
                            .collect::<Vec<_>>()
                            .join("\u{1f}");
                        let group = groups.entry(key).or_insert_with(|| {
                            let mut g = Row::new();
                            for f in by {
                                g.insert(f.clone(), r.get(f).cloned().unwrap_or(Value::Null));
                            }
                            for f in sums {
                                g.insert(f.clone(), json!(0.0));
                            }
                            g
                        });
                        for f in sums {
                            let total = row::get_f64(group, f) + row::get_f64(&r, f);
                            group.insert(f.clone(), json!(total));
                        }
                    }
                    rows = groups.into_values().collect();
                }
            }
        }
        Ok(rows)
    }
}

fn fact_doc(config_id: &str, r: &RevenueRow) -> Row {
    let mut doc = Row::new();
    doc.insert("config_id".to_string(), json!(config_id));
    doc.insert("ad_name".to_string(), json!(r.ad_name));
    doc.insert("segmentation".to_string(), json!(r.segmentation));
    doc.insert("campaign".to_string(), json!(r.campaign));
    doc.insert("ad_id".to_string(), json!(r.ad_id));
    doc.insert("leads".to_string(), json!(r.leads));
    doc.insert("sales".to_string(), json!(r.sales));
    doc.insert("revenue".to_string(), json!(r.revenue));
    doc
}

/// Replace the staged facts for `config_id` with `rows`. Delete-then-insert
/// keeps reruns of the same upload idempotent.
pub async fn materialize_facts(
    store: &dyn StagingStore,
    config_id: &str,
    rows: &[RevenueRow],
) -> RoasResult<usize> {
    store
        .delete_many(FACTS_COLLECTION, "config_id", &json!(config_id))
        .await?;
    let docs: Vec<Row> = rows.iter().map(|r| fact_doc(config_id, r)).collect();
    let written = docs.len();
    store.insert_many(FACTS_COLLECTION, docs).await?;
    Ok(written)
}

/// Read the staged facts for `config_id` back, grouped by
/// (ad, segmentation, campaign, ad-id) with leads/sales/revenue summed.
pub async fn read_grouped_facts(
    store: &dyn StagingStore,
    config_id: &str,
) -> RoasResult<Vec<RevenueRow>> {
    let pipeline = vec![
        AggregateStage::Match {
            field: "config_id".to_string(),
            value: json!(config_id),
        },
        AggregateStage::Group {
            by: ["ad_name", "segmentation", "campaign", "ad_id"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sums: ["leads", "sales", "revenue"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
    ];
    let rows = store.aggregate(FACTS_COLLECTION, &pipeline).await?;
    Ok(rows
        .iter()
        .filter_map(|r| {
            let mut row = RevenueRow {
                ad_name: row::get_str(r, "ad_name")?,
                segmentation: row::get_str(r, "segmentation").unwrap_or_default(),
                campaign: row::get_str(r, "campaign").unwrap_or_default(),
                ad_id: row::get_str(r, "ad_id"),
                normalized_ad: String::new(),
                normalized_seg: String::new(),
                leads: row::get_u64(r, "leads"),
                sales: row::get_u64(r, "sales"),
                revenue: row::get_f64(r, "revenue"),
            };
            row.ensure_normalized();
            Some(row)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(ad: &str, seg: &str, leads: u64, revenue: f64) -> RevenueRow {
        RevenueRow {
            ad_name: ad.to_string(),
            segmentation: seg.to_string(),
            campaign: "PQ_Test".to_string(),
            ad_id: None,
            normalized_ad: String::new(),
            normalized_seg: String::new(),
            leads,
            sales: 1,
            revenue,
        }
    }

    #[tokio::test]
    async fn test_materialize_and_read_back_grouped() {
        let store = MemoryStagingStore::new();
        let rows = vec![
            sample_row("AdX", "SegA", 10, 100.0),
            sample_row("AdX", "SegA", 5, 50.0),
            sample_row("AdY", "SegB", 2, 0.0),
        ];
        materialize_facts(&store, "cfg1", &rows).await.unwrap();

        let grouped = read_grouped_facts(&store, "cfg1").await.unwrap();
        assert_eq!(grouped.len(), 2);
        let adx = grouped.iter().find(|r| r.normalized_ad == "adx").unwrap();
        assert_eq!(adx.leads, 15);
        assert_eq!(adx.sales, 2);
        assert_eq!(adx.revenue, 150.0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = MemoryStagingStore::new();
        let rows = vec![sample_row("AdX", "SegA", 10, 100.0)];
        materialize_facts(&store, "cfg1", &rows).await.unwrap();
        materialize_facts(&store, "cfg1", &rows).await.unwrap();

        let grouped = read_grouped_facts(&store, "cfg1").await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].leads, 10);
    }

    #[tokio::test]
    async fn test_match_isolates_config_ids() {
        let store = MemoryStagingStore::new();
        materialize_facts(&store, "cfg1", &[sample_row("AdX", "SegA", 10, 100.0)])
            .await
            .unwrap();
        materialize_facts(&store, "cfg2", &[sample_row("AdZ", "SegC", 3, 30.0)])
            .await
            .unwrap();

        let grouped = read_grouped_facts(&store, "cfg1").await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].normalized_ad, "adx");
    }
}
