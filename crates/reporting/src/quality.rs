//! Quality cohorts and ROAS factor correlation.
//!
//! Revenue rows are re-grouped by demographic/behavioral attributes; spend
//! is not natively tagged with demographics, so each (ad, segmentation)
//! spend figure is distributed across the cohorts it feeds in proportion to
//! lead volume. The factor analysis is exploratory statistics only: ratio
//! thresholds over good/bad ROAS buckets, with no hypothesis testing and no
//! multiple-comparison correction.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use roas_analytics::QualityRow;
use roas_core::config::FactorConfig;
use roas_ingest::{SegKey, SpendLedger};

/// Placeholder for a blank lead-quality tag.
pub const SIN_CLASIFICAR: &str = "Sin Clasificar";
/// Placeholder for any other blank attribute. Blanks get an explicit,
/// consistent value so they never silently merge with a different blank
/// under a different meaning.
pub const NO_ESPECIFICADO: &str = "No Especificado";

/// The categorical attribute tuple keying a quality cohort.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeTuple {
    pub quality: String,
    pub income: String,
    pub education: String,
    pub occupation: String,
    pub purpose: String,
    pub age_bracket: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeField {
    Quality,
    Income,
    Education,
    Occupation,
    Purpose,
    AgeBracket,
}

impl AttributeField {
    fn name(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Income => "income",
            Self::Education => "education",
            Self::Occupation => "occupation",
            Self::Purpose => "purpose",
            Self::AgeBracket => "age_bracket",
        }
    }

    fn get(self, tuple: &AttributeTuple) -> &str {
        match self {
            Self::Quality => &tuple.quality,
            Self::Income => &tuple.income,
            Self::Education => &tuple.education,
            Self::Occupation => &tuple.occupation,
            Self::Purpose => &tuple.purpose,
            Self::AgeBracket => &tuple.age_bracket,
        }
    }
}

const SINGLE_FIELDS: [AttributeField; 6] = [
    AttributeField::Quality,
    AttributeField::Income,
    AttributeField::Education,
    AttributeField::Occupation,
    AttributeField::Purpose,
    AttributeField::AgeBracket,
];

// Fixed pair list: the combinations the business actually reads.
const PAIR_FIELDS: [(AttributeField, AttributeField); 6] = [
    (AttributeField::Quality, AttributeField::Income),
    (AttributeField::Quality, AttributeField::Occupation),
    (AttributeField::Quality, AttributeField::Education),
    (AttributeField::Income, AttributeField::Education),
    (AttributeField::Income, AttributeField::Occupation),
    (AttributeField::Quality, AttributeField::AgeBracket),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySegment {
    pub attributes: AttributeTuple,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
    /// Spend proportionally allocated from the contributing ads.
    pub spend: f64,
    pub conversion_rate: f64,
    pub roas: f64,
    pub profit: f64,
    pub cpl: f64,
    /// Leads-weighted average of the numeric quality score.
    pub avg_quality_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_leads: u64,
    pub total_sales: u64,
    pub total_revenue: f64,
    pub total_spend: f64,
    pub roas: f64,
    pub conversion_rate: f64,
    pub avg_quality_score: f64,
}

/// A single attribute value (or pair of values) correlated with the
/// good/bad ROAS buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorFinding {
    /// `"income"` for singles, `"quality+income"` for pairs.
    pub field: String,
    pub value: String,
    pub good_leads: u64,
    pub bad_leads: u64,
    /// Share of this value's leads sitting in good-ROAS cohorts.
    pub ratio: f64,
    pub good_mean_roas: f64,
    pub bad_mean_roas: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorAnalysis {
    pub roas_threshold: f64,
    pub good_factors: Vec<FactorFinding>,
    pub bad_factors: Vec<FactorFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub summary: QualitySummary,
    pub segments: Vec<QualitySegment>,
    pub factor_analysis: FactorAnalysis,
}

#[derive(Default)]
struct SegmentAccum {
    leads: u64,
    sales: u64,
    revenue: f64,
    spend: f64,
    score_sum: f64,
    leads_by_key: BTreeMap<SegKey, u64>,
}

fn placeholder(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Group quality rows into attribute cohorts, allocate spend, derive
/// metrics and run the factor correlation. `None` when there is nothing to
/// analyze.
pub fn analyze_quality(
    rows: &[QualityRow],
    spend: &SpendLedger,
    config: &FactorConfig,
) -> Option<QualityAnalysis> {
    if rows.is_empty() {
        return None;
    }

    let mut cohorts: BTreeMap<AttributeTuple, SegmentAccum> = BTreeMap::new();
    let mut leads_per_key: BTreeMap<SegKey, u64> = BTreeMap::new();

    for row in rows {
        let tuple = AttributeTuple {
            quality: placeholder(&row.quality, SIN_CLASIFICAR),
            income: placeholder(&row.income, NO_ESPECIFICADO),
            education: placeholder(&row.education, NO_ESPECIFICADO),
            occupation: placeholder(&row.occupation, NO_ESPECIFICADO),
            purpose: placeholder(&row.purpose, NO_ESPECIFICADO),
            age_bracket: placeholder(&row.age_bracket, NO_ESPECIFICADO),
        };
        let key = SegKey {
            ad: row.normalized_ad.clone(),
            seg: row.normalized_seg.clone(),
        };

        let accum = cohorts.entry(tuple).or_default();
        accum.leads += row.leads;
        accum.sales += row.sales;
        accum.revenue += row.revenue;
        accum.score_sum += row.quality_score_sum;
        *accum.leads_by_key.entry(key.clone()).or_default() += row.leads;
        *leads_per_key.entry(key).or_default() += row.leads;
    }

    // Proportional spend allocation: spend[key] * cohortLeads / totalLeads.
    // A key with zero leads across all cohorts allocates nothing.
    for accum in cohorts.values_mut() {
        for (key, cohort_leads) in &accum.leads_by_key {
            let total = leads_per_key.get(key).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            if let Some(ss) = spend.segments.get(key) {
                accum.spend += ss.spend * (*cohort_leads as f64 / total as f64);
            }
        }
    }

    let mut segments: Vec<QualitySegment> = cohorts
        .into_iter()
        .map(|(attributes, a)| QualitySegment {
            conversion_rate: if a.leads > 0 {
                a.sales as f64 / a.leads as f64 * 100.0
            } else {
                0.0
            },
            roas: if a.spend > 0.0 { a.revenue / a.spend } else { 0.0 },
            profit: a.revenue - a.spend,
            cpl: if a.leads > 0 && a.spend > 0.0 {
                a.spend / a.leads as f64
            } else {
                0.0
            },
            avg_quality_score: if a.leads > 0 {
                a.score_sum / a.leads as f64
            } else {
                0.0
            },
            attributes,
            leads: a.leads,
            sales: a.sales,
            revenue: a.revenue,
            spend: a.spend,
        })
        .collect();
    segments.sort_by(|a, b| match b.revenue.partial_cmp(&a.revenue) {
        Some(Ordering::Equal) | None => a.attributes.cmp(&b.attributes),
        Some(other) => other,
    });

    let total_leads: u64 = segments.iter().map(|s| s.leads).sum();
    let total_sales: u64 = segments.iter().map(|s| s.sales).sum();
    let total_revenue: f64 = segments.iter().map(|s| s.revenue).sum();
    let total_spend: f64 = segments.iter().map(|s| s.spend).sum();
    let score_sum: f64 = segments
        .iter()
        .map(|s| s.avg_quality_score * s.leads as f64)
        .sum();
    let summary = QualitySummary {
        total_leads,
        total_sales,
        total_revenue,
        total_spend,
        roas: if total_spend > 0.0 {
            total_revenue / total_spend
        } else {
            0.0
        },
        conversion_rate: if total_leads > 0 {
            total_sales as f64 / total_leads as f64 * 100.0
        } else {
            0.0
        },
        avg_quality_score: if total_leads > 0 {
            score_sum / total_leads as f64
        } else {
            0.0
        },
    };

    let factor_analysis = correlate_factors(&segments, config);

    Some(QualityAnalysis {
        summary,
        segments,
        factor_analysis,
    })
}

#[derive(Default)]
struct ValueStats {
    good_leads: u64,
    bad_leads: u64,
    good_roas_sum: f64,
    good_cohorts: u64,
    bad_roas_sum: f64,
    bad_cohorts: u64,
}

fn correlate_factors(segments: &[QualitySegment], config: &FactorConfig) -> FactorAnalysis {
    let mut good_factors = Vec::new();
    let mut bad_factors = Vec::new();

    for field in SINGLE_FIELDS {
        classify_values(
            segments,
            config,
            field.name().to_string(),
            |t| field.get(t).to_string(),
            config.min_leads_single,
            config.good_ratio_single,
            config.bad_ratio_single,
            &mut good_factors,
            &mut bad_factors,
        );
    }
    for (a, b) in PAIR_FIELDS {
        classify_values(
            segments,
            config,
            format!("{}+{}", a.name(), b.name()),
            |t| format!("{} | {}", a.get(t), b.get(t)),
            config.min_leads_pair,
            config.good_ratio_pair,
            config.bad_ratio_pair,
            &mut good_factors,
            &mut bad_factors,
        );
    }

    good_factors.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.value.cmp(&b.value))
    });
    bad_factors.sort_by(|a, b| {
        a.ratio
            .partial_cmp(&b.ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.value.cmp(&b.value))
    });

    FactorAnalysis {
        roas_threshold: config.roas_threshold,
        good_factors,
        bad_factors,
    }
}

#[allow(clippy::too_many_arguments)]
fn classify_values(
    segments: &[QualitySegment],
    config: &FactorConfig,
    field: String,
    value_of: impl Fn(&AttributeTuple) -> String,
    min_leads: u64,
    good_ratio: f64,
    bad_ratio: f64,
    good_out: &mut Vec<FactorFinding>,
    bad_out: &mut Vec<FactorFinding>,
) {
    let mut stats: BTreeMap<String, ValueStats> = BTreeMap::new();
    for segment in segments {
        let entry = stats.entry(value_of(&segment.attributes)).or_default();
        if segment.roas >= config.roas_threshold {
            entry.good_leads += segment.leads;
            entry.good_roas_sum += segment.roas;
            entry.good_cohorts += 1;
        } else {
            entry.bad_leads += segment.leads;
            entry.bad_roas_sum += segment.roas;
            entry.bad_cohorts += 1;
        }
    }

    for (value, s) in stats {
        let total = s.good_leads + s.bad_leads;
        // Below this support the ratio is noise either way.
        if total < min_leads {
            continue;
        }
        let ratio = s.good_leads as f64 / total as f64;
        let finding = FactorFinding {
            field: field.clone(),
            value,
            good_leads: s.good_leads,
            bad_leads: s.bad_leads,
            ratio,
            good_mean_roas: if s.good_cohorts > 0 {
                s.good_roas_sum / s.good_cohorts as f64
            } else {
                0.0
            },
            bad_mean_roas: if s.bad_cohorts > 0 {
                s.bad_roas_sum / s.bad_cohorts as f64
            } else {
                0.0
            },
        };
        if ratio >= good_ratio {
            good_out.push(finding);
        } else if ratio <= bad_ratio {
            bad_out.push(finding);
        }
        // In-between ratios are inconclusive and omitted.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roas_ingest::parse_spend_csv;

    fn quality_row(
        ad: &str,
        seg: &str,
        quality: &str,
        income: &str,
        leads: u64,
        sales: u64,
        revenue: f64,
    ) -> QualityRow {
        QualityRow {
            normalized_ad: roas_ingest::normalize(ad),
            normalized_seg: roas_ingest::normalize(seg),
            quality: quality.to_string(),
            income: income.to_string(),
            education: String::new(),
            occupation: String::new(),
            purpose: String::new(),
            age_bracket: String::new(),
            leads,
            sales,
            revenue,
            quality_score_sum: 0.0,
        }
    }

    #[test]
    fn test_empty_rows_yield_none() {
        assert!(analyze_quality(&[], &SpendLedger::default(), &FactorConfig::default()).is_none());
    }

    #[test]
    fn test_blank_attributes_get_explicit_placeholders() {
        let rows = vec![quality_row("AdX", "SegA", "", "  ", 10, 1, 100.0)];
        let analysis =
            analyze_quality(&rows, &SpendLedger::default(), &FactorConfig::default()).unwrap();
        let attrs = &analysis.segments[0].attributes;
        assert_eq!(attrs.quality, SIN_CLASIFICAR);
        assert_eq!(attrs.income, NO_ESPECIFICADO);
        assert_eq!(attrs.education, NO_ESPECIFICADO);
    }

    #[test]
    fn test_proportional_allocation_conserves_spend() {
        // One spend key (adx, sega) with 100 of spend feeding two cohorts
        // with 30 and 70 leads.
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,AdX,100\n",
            0.0,
        )
        .unwrap();
        let rows = vec![
            quality_row("AdX", "SegA", "Alta", "Alto", 30, 3, 300.0),
            quality_row("AdX", "SegA", "Baja", "Bajo", 70, 1, 50.0),
        ];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        let allocated: f64 = analysis.segments.iter().map(|s| s.spend).sum();
        assert!((allocated - 100.0).abs() < 1e-9);

        let alta = analysis
            .segments
            .iter()
            .find(|s| s.attributes.quality == "Alta")
            .unwrap();
        assert!((alta.spend - 30.0).abs() < 1e-9);
        assert!((alta.roas - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_leads_key_allocates_nothing() {
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,AdX,100\n",
            0.0,
        )
        .unwrap();
        let rows = vec![quality_row("AdX", "SegA", "Alta", "Alto", 0, 0, 0.0)];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        assert_eq!(analysis.segments[0].spend, 0.0);
        assert_eq!(analysis.summary.total_spend, 0.0);
    }

    #[test]
    fn test_factor_boundary_inclusive_at_good_ratio() {
        // "Alto" income: 7 good leads vs 3 bad -> ratio exactly 0.7.
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,Good,10\nPQ,SegB,Bad,100\n",
            0.0,
        )
        .unwrap();
        let rows = vec![
            // roas = 100/10 = 10 -> good cohort
            quality_row("Good", "SegA", "Alta", "Alto", 7, 1, 100.0),
            // roas = 10/100 = 0.1 -> bad cohort
            quality_row("Bad", "SegB", "Baja", "Alto", 3, 0, 10.0),
        ];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        let finding = analysis
            .factor_analysis
            .good_factors
            .iter()
            .find(|f| f.field == "income" && f.value == "Alto")
            .expect("ratio 0.7 must classify as good");
        assert_eq!(finding.good_leads, 7);
        assert_eq!(finding.bad_leads, 3);
        assert!((finding.ratio - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_factor_below_support_excluded() {
        // 4 leads total: below the 5-lead minimum, excluded regardless of
        // a perfect ratio.
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,Good,10\n",
            0.0,
        )
        .unwrap();
        let rows = vec![quality_row("Good", "SegA", "Alta", "Raro", 4, 1, 100.0)];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        assert!(!analysis
            .factor_analysis
            .good_factors
            .iter()
            .any(|f| f.value == "Raro"));
        assert!(!analysis
            .factor_analysis
            .bad_factors
            .iter()
            .any(|f| f.value == "Raro"));
    }

    #[test]
    fn test_inconclusive_ratio_omitted() {
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,Good,10\nPQ,SegB,Bad,100\n",
            0.0,
        )
        .unwrap();
        let rows = vec![
            quality_row("Good", "SegA", "Alta", "Medio", 5, 1, 100.0),
            quality_row("Bad", "SegB", "Baja", "Medio", 5, 0, 10.0),
        ];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        // ratio 0.5 for income=Medio: neither good nor bad.
        assert!(!analysis
            .factor_analysis
            .good_factors
            .iter()
            .any(|f| f.field == "income" && f.value == "Medio"));
        assert!(!analysis
            .factor_analysis
            .bad_factors
            .iter()
            .any(|f| f.field == "income" && f.value == "Medio"));
    }

    #[test]
    fn test_pair_factors_use_stricter_thresholds() {
        let spend = parse_spend_csv(
            "Campaign Name,Ad Set Name,Ad Name,Amount Spent\nPQ,SegA,Good,10\nPQ,SegB,Bad,100\n",
            0.0,
        )
        .unwrap();
        // Distinct cohorts (quality differs) sharing the income+education
        // pair value: 8 good vs 2 bad leads = ratio exactly 0.8, good at
        // the stricter pair threshold.
        let rows = vec![
            quality_row("Good", "SegA", "Alta", "Alto", 8, 1, 100.0),
            quality_row("Bad", "SegB", "Baja", "Alto", 2, 0, 10.0),
        ];
        let analysis = analyze_quality(&rows, &spend, &FactorConfig::default()).unwrap();
        let pair_value = format!("Alto | {NO_ESPECIFICADO}");
        let finding = analysis
            .factor_analysis
            .good_factors
            .iter()
            .find(|f| f.field == "income+education" && f.value == pair_value)
            .expect("ratio 0.8 must classify as good for pairs");
        assert_eq!(finding.good_leads, 8);
        assert_eq!(finding.bad_leads, 2);
        assert!((finding.ratio - 0.8).abs() < 1e-12);
    }
}
