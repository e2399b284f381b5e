//! The reconciliation engine: merges the spend ledger with the grouped
//! revenue rows into a unified per-ad ledger.
//!
//! Identity resolution is platform-ad-id first, normalized-name fallback:
//! ad-platform ids are stable while names get edited post-hoc. Derived
//! metrics (ROAS, profit, CPL, conversion rate) are computed once in a
//! finalize pass, never interleaved with accumulation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use roas_analytics::{OrganicTotals, RevenueRow};
use roas_ingest::SpendLedger;

/// Ledger key for untracked organic sales.
pub const ORGANIC_KEY: &str = "organica";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationEntry {
    pub name: String,
    pub normalized_name: String,
    pub campaign: String,
    pub ad_id: Option<String>,
    pub revenue: f64,
    pub leads: u64,
    pub sales: u64,
    pub spend: f64,
    pub profit: f64,
    pub cpl: f64,
    /// Sales per lead, in percent.
    pub conversion_rate: f64,
}

impl SegmentationEntry {
    fn new(name: String, normalized_name: String, campaign: String, ad_id: Option<String>) -> Self {
        Self {
            name,
            normalized_name,
            campaign,
            ad_id,
            revenue: 0.0,
            leads: 0,
            sales: 0,
            spend: 0.0,
            profit: 0.0,
            cpl: 0.0,
            conversion_rate: 0.0,
        }
    }

    fn has_ad_id(&self, id: &str) -> bool {
        self.ad_id.as_deref().is_some_and(|own| !own.is_empty() && own == id)
    }
}

/// One reconciled ad (or the organic sentinel) with rolled-up totals and
/// its segmentations ordered by revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdLedgerEntry {
    /// Normalized ad key; `"organica"` for the organic sentinel.
    pub key: String,
    pub name: String,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
    pub spend: f64,
    pub profit: f64,
    pub roas: f64,
    pub segmentations: Vec<SegmentationEntry>,
}

impl AdLedgerEntry {
    fn new(key: String, name: String) -> Self {
        Self {
            key,
            name,
            leads: 0,
            sales: 0,
            revenue: 0.0,
            spend: 0.0,
            profit: 0.0,
            roas: 0.0,
            segmentations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Revenue across all ads except the organic sentinel (organic is
    /// informational, not ad-attributed).
    pub total_revenue: f64,
    /// Spend across all ads including organic (organic spend is always 0).
    pub total_spend: f64,
    pub total_roas: f64,
    pub multiply_revenue: bool,
}

/// Reconciled ledger: ads ordered by profit descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdLedger {
    pub ads: Vec<AdLedgerEntry>,
    pub summary: LedgerSummary,
}

impl AdLedger {
    pub fn get(&self, key: &str) -> Option<&AdLedgerEntry> {
        self.ads.iter().find(|a| a.key == key)
    }
}

/// Duplicate-suppression signature for a grouped revenue row. Re-processing
/// a row with an identical (ad, seg, revenue, leads) signature must not
/// change totals.
#[derive(PartialEq, Eq, Hash)]
struct DedupKey(String, String, u64, u64);

impl DedupKey {
    fn of(row: &RevenueRow) -> Self {
        Self(
            row.normalized_ad.clone(),
            row.normalized_seg.clone(),
            row.revenue.to_bits(),
            row.leads,
        )
    }
}

struct LedgerBuilder {
    entries: Vec<AdLedgerEntry>,
    index: HashMap<String, usize>,
}

impl LedgerBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get_or_create(&mut self, key: &str, name: &str) -> usize {
        match self.index.get(key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.entries
                    .push(AdLedgerEntry::new(key.to_string(), name.to_string()));
                self.index.insert(key.to_string(), i);
                i
            }
        }
    }

    /// Position of the entry owning a segmentation with this platform
    /// ad-id, searching across all ads. The first match anywhere wins,
    /// even when two distinct ads share a reused platform id.
    fn find_by_ad_id(&self, id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.segmentations.iter().any(|s| s.has_ad_id(id)))
    }
}

/// Merge spend and revenue into the per-ad ledger.
pub fn reconcile(
    spend: &SpendLedger,
    revenue_rows: &[RevenueRow],
    organic: Option<OrganicTotals>,
    multiply_revenue: bool,
) -> AdLedger {
    let mut builder = LedgerBuilder::new();
    let mut seen: HashSet<DedupKey> = HashSet::new();

    // Step 1: seed the organic sentinel.
    if let Some(org) = organic {
        if org.total_sales > 0 {
            let i = builder.get_or_create(ORGANIC_KEY, "Orgánica");
            builder.entries[i].sales = org.total_sales;
            builder.entries[i].revenue = org.total_revenue;
        }
    }

    // Step 2: fold revenue rows.
    for row in revenue_rows {
        if row.normalized_ad.is_empty() {
            continue;
        }
        if !seen.insert(DedupKey::of(row)) {
            continue;
        }

        // The spend CSV's original name is the user-facing one.
        let display = spend
            .display_names
            .get(&row.normalized_ad)
            .cloned()
            .unwrap_or_else(|| row.ad_name.clone());
        let i = builder.get_or_create(&row.normalized_ad, &display);
        let entry = &mut builder.entries[i];
        entry.leads += row.leads;
        entry.sales += row.sales;
        entry.revenue += row.revenue;

        match entry
            .segmentations
            .iter_mut()
            .find(|s| s.normalized_name == row.normalized_seg)
        {
            Some(seg) => {
                seg.leads += row.leads;
                seg.sales += row.sales;
                seg.revenue += row.revenue;
                if seg.ad_id.is_none() {
                    seg.ad_id = row.ad_id.clone();
                }
            }
            None => {
                let mut seg = SegmentationEntry::new(
                    row.segmentation.clone(),
                    row.normalized_seg.clone(),
                    row.campaign.clone(),
                    row.ad_id.clone(),
                );
                seg.leads = row.leads;
                seg.sales = row.sales;
                seg.revenue = row.revenue;
                entry.segmentations.push(seg);
            }
        }
    }

    // Step 3: fold spend. Platform-id match wins over the name key.
    for (key, ss) in &spend.segments {
        let spend_ad_id = ss.ad_id.as_deref().filter(|id| !id.is_empty());
        let target = spend_ad_id
            .and_then(|id| builder.find_by_ad_id(id))
            .or_else(|| builder.index.get(&key.ad).copied());

        let i = match target {
            Some(i) => i,
            None => {
                // Spend with no revenue counterpart: new ad, pure cost.
                let display = spend
                    .display_names
                    .get(&key.ad)
                    .cloned()
                    .unwrap_or_else(|| ss.ad_name.clone());
                builder.get_or_create(&key.ad, &display)
            }
        };
        let entry = &mut builder.entries[i];

        let seg_idx = spend_ad_id
            .and_then(|id| entry.segmentations.iter().position(|s| s.has_ad_id(id)))
            .or_else(|| {
                entry
                    .segmentations
                    .iter()
                    .position(|s| s.normalized_name == key.seg)
            });
        match seg_idx {
            Some(j) => entry.segmentations[j].spend += ss.spend,
            None => {
                let mut seg = SegmentationEntry::new(
                    ss.segmentation.clone(),
                    key.seg.clone(),
                    ss.campaign.clone(),
                    ss.ad_id.clone(),
                );
                seg.spend = ss.spend;
                entry.segmentations.push(seg);
            }
        }
        entry.spend += ss.spend;
    }

    // Step 4: finalize. Derived fields get computed exactly once, here.
    for entry in &mut builder.entries {
        // Spend accumulates in floating point; keep currency at cents.
        entry.spend = (entry.spend * 100.0).round() / 100.0;
        entry.roas = if entry.spend > 0.0 {
            entry.revenue / entry.spend
        } else {
            0.0
        };
        entry.profit = entry.revenue - entry.spend;
        for seg in &mut entry.segmentations {
            seg.profit = seg.revenue - seg.spend;
            seg.cpl = if seg.leads > 0 && seg.spend > 0.0 {
                seg.spend / seg.leads as f64
            } else {
                0.0
            };
            seg.conversion_rate = if seg.leads > 0 {
                seg.sales as f64 / seg.leads as f64 * 100.0
            } else {
                0.0
            };
        }
        entry
            .segmentations
            .sort_by(|a, b| cmp_f64_desc(a.revenue, b.revenue));
    }
    builder
        .entries
        .sort_by(|a, b| cmp_f64_desc(a.profit, b.profit));

    // Step 5: grand totals.
    let total_revenue: f64 = builder
        .entries
        .iter()
        .filter(|e| e.key != ORGANIC_KEY)
        .map(|e| e.revenue)
        .sum();
    let total_spend: f64 = builder.entries.iter().map(|e| e.spend).sum();
    let total_roas = if total_spend > 0.0 {
        total_revenue / total_spend
    } else {
        0.0
    };

    AdLedger {
        ads: builder.entries,
        summary: LedgerSummary {
            total_revenue,
            total_spend,
            total_roas,
            multiply_revenue,
        },
    }
}

fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roas_ingest::parse_spend_csv;

    fn revenue_row(ad: &str, seg: &str, leads: u64, sales: u64, revenue: f64) -> RevenueRow {
        let mut row = RevenueRow {
            ad_name: ad.to_string(),
            segmentation: seg.to_string(),
            campaign: "PQ_Test".to_string(),
            ad_id: None,
            normalized_ad: String::new(),
            normalized_seg: String::new(),
            leads,
            sales,
            revenue,
        };
        row.ensure_normalized();
        row
    }

    fn spend_ledger(csv: &str) -> SpendLedger {
        parse_spend_csv(csv, 0.0).unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent,Ad ID\nPQ_Test,SegA,AdX,100,\n",
        );
        let rows = vec![revenue_row("AdX", "SegA", 50, 5, 300.0)];
        let ledger = reconcile(&spend, &rows, None, false);

        let adx = ledger.get("adx").unwrap();
        assert_eq!(adx.spend, 100.0);
        assert_eq!(adx.revenue, 300.0);
        assert_eq!(adx.roas, 3.0);
        assert_eq!(adx.profit, 200.0);

        let seg = &adx.segmentations[0];
        assert_eq!(seg.cpl, 2.0);
        assert_eq!(seg.conversion_rate, 10.0);
        assert_eq!(seg.spend, 100.0);

        assert_eq!(ledger.summary.total_revenue, 300.0);
        assert_eq!(ledger.summary.total_spend, 100.0);
        assert_eq!(ledger.summary.total_roas, 3.0);
    }

    #[test]
    fn test_revenue_dedup_is_idempotent() {
        let spend = SpendLedger::default();
        let row = revenue_row("AdX", "SegA", 50, 5, 300.0);
        let once = reconcile(&spend, &[row.clone()], None, false);
        let twice = reconcile(&spend, &[row.clone(), row], None, false);
        assert_eq!(once.get("adx").unwrap().revenue, 300.0);
        assert_eq!(twice.get("adx").unwrap().revenue, 300.0);
        assert_eq!(twice.get("adx").unwrap().leads, 50);
    }

    #[test]
    fn test_platform_id_precedence_over_drifted_names() {
        // Same platform ad-id, drifted names: must land in ONE entry.
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent,Ad ID\n\
             PQ,SegA,Ad Old Name,60,777\n\
             PQ,SegA,Ad NEW Name,40,777\n",
        );
        let mut row = revenue_row("Ad Old Name", "SegA", 10, 1, 100.0);
        row.ad_id = Some("777".to_string());
        let ledger = reconcile(&spend, &[row], None, false);

        let entry = ledger.get("ad old name").unwrap();
        assert_eq!(entry.spend, 100.0);
        assert!(ledger.get("ad new name").is_none());
    }

    #[test]
    fn test_name_fallback_without_ad_id() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\n\
             PQ,SegA,AdX,30\n\
             PQ,SegA,ADX,20\n",
        );
        let ledger = reconcile(&spend, &[], None, false);
        assert_eq!(ledger.ads.len(), 1);
        assert_eq!(ledger.get("adx").unwrap().spend, 50.0);
    }

    #[test]
    fn test_spend_without_revenue_creates_negative_profit_entry() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,Huerfano,25.5\n",
        );
        let ledger = reconcile(&spend, &[], None, false);
        let entry = ledger.get("huerfano").unwrap();
        assert_eq!(entry.revenue, 0.0);
        assert_eq!(entry.profit, -25.5);
        assert_eq!(entry.roas, 0.0);
        assert_eq!(entry.segmentations.len(), 1);
        assert_eq!(entry.segmentations[0].spend, 25.5);
        assert_eq!(entry.segmentations[0].profit, -25.5);
    }

    #[test]
    fn test_organic_excluded_from_total_revenue() {
        let spend = SpendLedger::default();
        let organic = OrganicTotals {
            total_sales: 10,
            total_revenue: 500.0,
        };
        let ledger = reconcile(&spend, &[], Some(organic), false);

        let org = ledger.get(ORGANIC_KEY).unwrap();
        assert_eq!(org.spend, 0.0);
        assert_eq!(org.roas, 0.0);
        assert_eq!(org.profit, 500.0);
        assert_eq!(ledger.summary.total_revenue, 0.0);
        assert_eq!(ledger.summary.total_spend, 0.0);
    }

    #[test]
    fn test_organic_not_seeded_without_sales() {
        let ledger = reconcile(
            &SpendLedger::default(),
            &[],
            Some(OrganicTotals::default()),
            false,
        );
        assert!(ledger.get(ORGANIC_KEY).is_none());
    }

    #[test]
    fn test_spend_conservation() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\n\
             PQ,S1,A,10.10\nPQ,S2,A,20.201\nPQ,S1,B,0.004\nPF,S3,C,99.99\n",
        );
        let input_total = spend.total_spend;
        let rows = vec![
            revenue_row("A", "S1", 5, 1, 50.0),
            revenue_row("B", "S9", 2, 0, 0.0),
        ];
        let ledger = reconcile(&spend, &rows, None, false);

        let mut ledger_total = 0.0;
        for ad in &ledger.ads {
            let seg_sum: f64 = ad.segmentations.iter().map(|s| s.spend).sum();
            assert!(
                (ad.spend - (seg_sum * 100.0).round() / 100.0).abs() < 1e-9,
                "ad {} spend {} != rounded seg sum {}",
                ad.key,
                ad.spend,
                seg_sum
            );
            ledger_total += seg_sum;
        }
        assert!((ledger_total - input_total).abs() < 1e-9);
    }

    #[test]
    fn test_roas_zero_when_spend_zero() {
        let rows = vec![revenue_row("AdX", "SegA", 10, 2, 1000.0)];
        let ledger = reconcile(&SpendLedger::default(), &rows, None, false);
        let adx = ledger.get("adx").unwrap();
        assert_eq!(adx.spend, 0.0);
        assert_eq!(adx.roas, 0.0);
        assert!(adx.roas.is_finite());
    }

    #[test]
    fn test_ads_sorted_by_profit_segs_by_revenue() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,S1,Low,500\n",
        );
        let rows = vec![
            revenue_row("Low", "S1", 10, 1, 100.0),
            revenue_row("High", "S1", 10, 2, 900.0),
            revenue_row("High", "S2", 10, 4, 1800.0),
        ];
        let ledger = reconcile(&spend, &rows, None, false);
        assert_eq!(ledger.ads[0].key, "high");
        assert_eq!(ledger.ads[1].key, "low");
        assert_eq!(ledger.ads[0].segmentations[0].normalized_name, "s2");
    }

    #[test]
    fn test_display_name_prefers_spend_csv() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,AdX Bonito,10\n",
        );
        let rows = vec![revenue_row("ADX BONITO", "SegA", 1, 0, 0.0)];
        let ledger = reconcile(&spend, &rows, None, false);
        assert_eq!(ledger.get("adx bonito").unwrap().name, "AdX Bonito");
    }

    #[test]
    fn test_deterministic_across_runs() {
        let spend = spend_ledger(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent,Ad ID\n\
             PQ,S1,A,10,1\nPQ,S2,B,20,2\nPF,S3,C,30,\n",
        );
        let rows = vec![
            revenue_row("A", "S1", 5, 1, 50.0),
            revenue_row("B", "S2", 5, 1, 70.0),
        ];
        let a = reconcile(&spend, &rows, None, false);
        let b = reconcile(&spend, &rows, None, false);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
