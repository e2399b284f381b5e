//! Cohort views over the aggregated revenue: registration-day series,
//! captation-delay distribution, per-country ROAS and the hot/cold traffic
//! splits derived from campaign naming conventions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use roas_analytics::{CaptationDaysRow, CountryRevenueRow, RegistrationDateRow, RevenueRow};
use roas_ingest::spend::SIN_PAIS;
use roas_ingest::{normalize, CountrySpend, SpendLedger};

/// Traffic temperature, read off the campaign naming convention: `PQ_`
/// campaigns target warm audiences, `PF_` cold ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficType {
    Caliente,
    Frio,
    Otro,
}

impl TrafficType {
    pub fn classify(campaign: &str) -> Self {
        let lower = campaign.to_lowercase();
        if lower.contains("pq") {
            Self::Caliente
        } else if lower.contains("pf") {
            Self::Frio
        } else {
            Self::Otro
        }
    }
}

/// Lead/sale/revenue totals for one traffic temperature.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrafficTotals {
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
}

/// One registration day with the spend of the ads that captured leads
/// that day joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDateCohort {
    pub date: NaiveDate,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
    pub spend: f64,
    pub cpl: f64,
    /// Display names of the ads contributing leads on this day.
    pub ads: Vec<String>,
}

/// Leads and revenue per country with the country spend report joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryCohort {
    pub country: String,
    pub leads: u64,
    pub tracked_sales: u64,
    pub organic_sales: u64,
    pub revenue: f64,
    pub spend: f64,
    pub roas: f64,
    pub cpl: f64,
}

/// Daily lead volume, one series per traffic temperature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptationPoint {
    pub date: NaiveDate,
    pub leads: u64,
    pub sales: u64,
}

#[derive(Default)]
struct DayAccum {
    leads: u64,
    sales: u64,
    revenue: f64,
    ads: BTreeSet<String>,
}

/// Fold the per-(day, ad) revenue rows into a chronological day series,
/// joining each day's spend from the daily spend breakdown.
pub fn registration_cohorts(
    rows: &[RegistrationDateRow],
    spend: &SpendLedger,
) -> Vec<RegistrationDateCohort> {
    let mut days: BTreeMap<NaiveDate, DayAccum> = BTreeMap::new();
    for row in rows {
        let accum = days.entry(row.date).or_default();
        accum.leads += row.leads;
        accum.sales += row.sales;
        accum.revenue += row.revenue;
        if !row.normalized_ad.is_empty() {
            accum.ads.insert(row.normalized_ad.clone());
        }
    }

    days.into_iter()
        .map(|(date, accum)| {
            let day_spend: f64 = accum
                .ads
                .iter()
                .map(|ad| spend.spend_for_day(ad, date))
                .sum();
            let ads = accum
                .ads
                .iter()
                .map(|ad| {
                    spend
                        .display_names
                        .get(ad)
                        .cloned()
                        .unwrap_or_else(|| ad.clone())
                })
                .collect();
            RegistrationDateCohort {
                date,
                cpl: if accum.leads > 0 && day_spend > 0.0 {
                    day_spend / accum.leads as f64
                } else {
                    0.0
                },
                leads: accum.leads,
                sales: accum.sales,
                revenue: accum.revenue,
                spend: day_spend,
                ads,
            }
        })
        .collect()
}

/// Merge the captation-delay distribution, clamping negative deltas (sale
/// timestamped before registration, a data-entry artifact) to day 0.
pub fn captation_cohorts(rows: &[CaptationDaysRow]) -> Vec<CaptationDaysRow> {
    let mut merged: BTreeMap<i64, (u64, f64)> = BTreeMap::new();
    for row in rows {
        let entry = merged.entry(row.days.max(0)).or_default();
        entry.0 += row.count;
        entry.1 += row.revenue;
    }
    merged
        .into_iter()
        .map(|(days, (count, revenue))| CaptationDaysRow {
            days,
            count,
            revenue,
        })
        .collect()
}

/// Join the per-country revenue rows with the country spend report on the
/// normalized country name. Countries appearing only in the spend report
/// still show up, as pure cost.
pub fn country_cohorts(
    rows: &[CountryRevenueRow],
    spend: Option<&CountrySpend>,
) -> Vec<CountryCohort> {
    let mut spend_by_key: BTreeMap<String, (String, f64)> = BTreeMap::new();
    if let Some(report) = spend {
        for (country, amount) in &report.by_country {
            let key = normalize(country);
            let entry = spend_by_key
                .entry(key)
                .or_insert_with(|| (country.clone(), 0.0));
            entry.1 += amount;
        }
    }

    let mut cohorts: BTreeMap<String, CountryCohort> = BTreeMap::new();
    for row in rows {
        let country = if row.country.trim().is_empty() {
            SIN_PAIS.to_string()
        } else {
            row.country.clone()
        };
        let key = normalize(&country);
        let country_spend = spend_by_key.remove(&key).map(|(_, s)| s).unwrap_or(0.0);
        let cohort = cohorts.entry(key).or_insert_with(|| CountryCohort {
            country,
            leads: 0,
            tracked_sales: 0,
            organic_sales: 0,
            revenue: 0.0,
            spend: 0.0,
            roas: 0.0,
            cpl: 0.0,
        });
        cohort.leads += row.leads;
        cohort.tracked_sales += row.tracked_sales;
        cohort.organic_sales += row.organic_sales;
        cohort.revenue += row.revenue;
        cohort.spend += country_spend;
    }
    for (key, (country, amount)) in spend_by_key {
        cohorts.insert(
            key,
            CountryCohort {
                country,
                leads: 0,
                tracked_sales: 0,
                organic_sales: 0,
                revenue: 0.0,
                spend: amount,
                roas: 0.0,
                cpl: 0.0,
            },
        );
    }

    let mut result: Vec<CountryCohort> = cohorts
        .into_values()
        .map(|mut c| {
            c.roas = if c.spend > 0.0 { c.revenue / c.spend } else { 0.0 };
            c.cpl = if c.leads > 0 && c.spend > 0.0 {
                c.spend / c.leads as f64
            } else {
                0.0
            };
            c
        })
        .collect();
    result.sort_by(|a, b| a.country.cmp(&b.country));
    result
}

/// Lead/sale/revenue totals per traffic temperature, classified from each
/// row's campaign name.
pub fn traffic_type_summary(rows: &[RevenueRow]) -> BTreeMap<TrafficType, TrafficTotals> {
    let mut summary: BTreeMap<TrafficType, TrafficTotals> = BTreeMap::new();
    for row in rows {
        let totals = summary.entry(TrafficType::classify(&row.campaign)).or_default();
        totals.leads += row.leads;
        totals.sales += row.sales;
        totals.revenue += row.revenue;
    }
    summary
}

/// Spend per traffic temperature, classified from the spend report's
/// campaign names.
pub fn traffic_type_spend(spend: &SpendLedger) -> BTreeMap<TrafficType, f64> {
    let mut totals: BTreeMap<TrafficType, f64> = BTreeMap::new();
    for segment in spend.segments.values() {
        *totals
            .entry(TrafficType::classify(&segment.campaign))
            .or_default() += segment.spend;
    }
    totals
}

/// Daily captation series split by traffic temperature.
pub fn captation_by_traffic_type(
    rows: &[RegistrationDateRow],
) -> BTreeMap<TrafficType, Vec<CaptationPoint>> {
    let mut days: BTreeMap<(TrafficType, NaiveDate), (u64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = days
            .entry((TrafficType::classify(&row.campaign), row.date))
            .or_default();
        entry.0 += row.leads;
        entry.1 += row.sales;
    }

    let mut series: BTreeMap<TrafficType, Vec<CaptationPoint>> = BTreeMap::new();
    for ((traffic, date), (leads, sales)) in days {
        series.entry(traffic).or_default().push(CaptationPoint {
            date,
            leads,
            sales,
        });
    }
    series
}
