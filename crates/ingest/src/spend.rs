//! Spend ledger builder — folds the ad-platform CSV export into
//! per-(ad, segmentation) spend totals, a first-seen display-name mapping
//! and a per-day spend breakdown for the time-series joins.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use roas_core::{RoasError, RoasResult};

use crate::normalize::normalize;

/// Composite join key `(normalized ad, normalized segmentation)`.
///
/// A value type instead of an `"ad|seg"` concatenated string: names can
/// contain the delimiter and would corrupt a string key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SegKey {
    pub ad: String,
    pub seg: String,
}

impl SegKey {
    pub fn new(ad_name: &str, seg_name: &str) -> Self {
        Self {
            ad: normalize(ad_name),
            seg: normalize(seg_name),
        }
    }
}

/// Per-day spend key for the daily breakdown table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DailyKey {
    pub day: NaiveDate,
    /// Normalized ad name.
    pub ad: String,
}

/// Accumulated spend for one (ad, segmentation) pair. Retains the
/// first-seen original names and platform ad-id for the key.
#[derive(Debug, Clone, Serialize)]
pub struct SpendSegmentation {
    pub campaign: String,
    pub ad_name: String,
    pub segmentation: String,
    pub ad_id: Option<String>,
    pub spend: f64,
}

/// Parsed spend report. BTreeMaps keep iteration deterministic so that
/// re-running the same reconciliation yields bit-identical ledgers.
#[derive(Debug, Default)]
pub struct SpendLedger {
    pub segments: BTreeMap<SegKey, SpendSegmentation>,
    /// Normalized ad name -> first-seen original display name.
    pub display_names: BTreeMap<String, String>,
    /// Spend per (day, normalized ad), for time-series joins.
    pub daily: BTreeMap<DailyKey, f64>,
    pub total_spend: f64,
}

impl SpendLedger {
    /// Total spend for one normalized ad across all its segmentations.
    pub fn ad_total(&self, normalized_ad: &str) -> f64 {
        self.segments
            .iter()
            .filter(|(key, _)| key.ad == normalized_ad)
            .map(|(_, seg)| seg.spend)
            .sum()
    }

    /// Spend for an ad on a calendar day, falling back to the ad's overall
    /// total when no daily figure exists for that exact day.
    pub fn spend_for_day(&self, normalized_ad: &str, day: NaiveDate) -> f64 {
        let key = DailyKey {
            day,
            ad: normalized_ad.to_string(),
        };
        match self.daily.get(&key) {
            Some(spend) => *spend,
            None => self.ad_total(normalized_ad),
        }
    }
}

/// Country-level spend report (the country CSV variant only carries
/// country, amount and optionally day).
#[derive(Debug, Default)]
pub struct CountrySpend {
    pub by_country: BTreeMap<String, f64>,
    pub by_country_day: BTreeMap<(String, NaiveDate), f64>,
    pub total_spend: f64,
}

pub const SIN_PAIS: &str = "Sin país";

struct SpendColumns {
    campaign: usize,
    ad_set: usize,
    ad: usize,
    amount: usize,
    ad_id: Option<usize>,
    day: Option<usize>,
}

impl SpendColumns {
    fn from_headers(headers: &csv::StringRecord) -> RoasResult<Self> {
        let required = |names: &[&str]| {
            find_header(headers, names).ok_or_else(|| {
                RoasError::Csv(format!("missing required column `{}`", names[0]))
            })
        };
        Ok(Self {
            campaign: required(&["campaign name"])?,
            ad_set: required(&["ad set name"])?,
            ad: required(&["ad name"])?,
            amount: required(&["amount spent"])?,
            ad_id: find_header(headers, &["ad id"]),
            day: find_header(headers, &["day", "date", "fecha"]),
        })
    }
}

fn find_header(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim_start_matches('\u{FEFF}').trim();
        names.iter().any(|n| h.eq_ignore_ascii_case(n))
    })
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

/// Tolerant numeric parse for spend amounts. When a comma is present it is
/// the decimal separator and dots are thousands separators (the export
/// locale). Unparseable values default to 0, never an error.
pub fn parse_decimal(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let numeric = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    numeric.parse().unwrap_or(0.0)
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // Timestamps occasionally show up; the calendar day prefix is enough.
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

fn apply_exchange(amount: f64, exchange_rate: f64) -> f64 {
    if exchange_rate > 0.0 {
        amount / exchange_rate
    } else {
        amount
    }
}

/// Parse the spend CSV into a [`SpendLedger`]. Fails only on unparseable
/// CSV structure (missing required headers); malformed rows are skipped and
/// unparseable amounts count as 0.
pub fn parse_spend_csv(csv_text: &str, exchange_rate: f64) -> RoasResult<SpendLedger> {
    let text = csv_text.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| RoasError::Csv(format!("failed to read CSV headers: {e}")))?
        .clone();
    let columns = SpendColumns::from_headers(&headers)?;

    let mut ledger = SpendLedger::default();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed spend CSV record");
                continue;
            }
        };

        let campaign = field(&record, columns.campaign);
        let ad_set = field(&record, columns.ad_set);
        let ad = field(&record, columns.ad);
        if campaign.is_empty() || ad_set.is_empty() || ad.is_empty() {
            continue;
        }

        let key = SegKey::new(ad, ad_set);
        if key.ad.is_empty() {
            // Unmatchable name; nothing downstream could ever join on it.
            warn!(ad, "skipping spend row with unusable ad name");
            continue;
        }

        let amount = apply_exchange(parse_decimal(field(&record, columns.amount)), exchange_rate);
        let ad_id = columns
            .ad_id
            .map(|i| field(&record, i).to_string())
            .filter(|v| !v.is_empty());

        ledger
            .display_names
            .entry(key.ad.clone())
            .or_insert_with(|| ad.to_string());

        let entry = ledger
            .segments
            .entry(key.clone())
            .or_insert_with(|| SpendSegmentation {
                campaign: campaign.to_string(),
                ad_name: ad.to_string(),
                segmentation: ad_set.to_string(),
                ad_id,
                spend: 0.0,
            });
        entry.spend += amount;
        ledger.total_spend += amount;

        if let Some(day) = columns.day.and_then(|i| parse_day(field(&record, i))) {
            *ledger
                .daily
                .entry(DailyKey {
                    day,
                    ad: key.ad.clone(),
                })
                .or_default() += amount;
        }
    }

    Ok(ledger)
}

/// Parse the country spend CSV variant: only country, amount and optionally
/// day are consumed. The country header matches accent-insensitively
/// (`Country` / `País`).
pub fn parse_country_csv(csv_text: &str, exchange_rate: f64) -> RoasResult<CountrySpend> {
    let text = csv_text.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| RoasError::Csv(format!("failed to read CSV headers: {e}")))?
        .clone();

    let country_idx = headers
        .iter()
        .position(|h| {
            let key = normalize(h);
            key == "country" || key == "pais"
        })
        .ok_or_else(|| RoasError::Csv("missing required column `country`".to_string()))?;
    let amount_idx = find_header(&headers, &["amount spent"])
        .ok_or_else(|| RoasError::Csv("missing required column `amount spent`".to_string()))?;
    let day_idx = find_header(&headers, &["day", "date", "fecha"]);

    let mut report = CountrySpend::default();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed country CSV record");
                continue;
            }
        };

        let country = match field(&record, country_idx) {
            "" => SIN_PAIS.to_string(),
            c => c.to_string(),
        };
        let amount = apply_exchange(parse_decimal(field(&record, amount_idx)), exchange_rate);

        *report.by_country.entry(country.clone()).or_default() += amount;
        report.total_spend += amount;

        if let Some(day) = day_idx.and_then(|i| parse_day(field(&record, i))) {
            *report.by_country_day.entry((country, day)).or_default() += amount;
        }
    }

    Ok(report)
}
