//! Analysis orchestration: input validation, source fetches, reconciliation
//! and the assembly of the full dashboard payload.
//!
//! Only required inputs fail the run. Optional enrichments (organic totals,
//! demographics, dates, countries) degrade to `None` on fetch failure so a
//! flaky store column never takes the core ledger down with it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use roas_analytics::{
    materialize_facts, read_grouped_facts, CaptationDaysRow, CountryRevenueRow, OrganicTotals,
    QualityRow, RegistrationDateRow, RevenueAggregator, RevenueRow, RowSource, StagingStore,
};
use roas_core::{AnalysisConfig, RoasError, RoasResult};
use roas_ingest::{parse_country_csv, parse_spend_csv, CountrySpend, SpendLedger};

use crate::cohorts::{
    self, CaptationPoint, CountryCohort, RegistrationDateCohort, TrafficTotals, TrafficType,
};
use crate::ledger::{self, AdLedgerEntry, LedgerSummary};
use crate::quality::{self, QualityAnalysis};

/// One analysis run's inputs: the store tables holding leads and sales plus
/// the raw ad-platform CSV exports.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub leads_table: String,
    pub sales_table: String,
    pub spend_csv: String,
    #[serde(default)]
    pub country_csv: Option<String>,
}

/// The full dashboard payload. Sections backed by absent or failed optional
/// sources are `None`; the ledger and summary are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ads: Vec<AdLedgerEntry>,
    pub summary: LedgerSummary,
    pub quality_data: Option<QualityAnalysis>,
    pub country_data: Option<Vec<CountryCohort>>,
    pub captation_days_data: Option<Vec<CaptationDaysRow>>,
    pub sales_by_registration_date: Option<Vec<RegistrationDateCohort>>,
    pub traffic_type_summary: BTreeMap<TrafficType, TrafficTotals>,
    pub traffic_type_spend: BTreeMap<TrafficType, f64>,
    pub captation_by_traffic_type: Option<BTreeMap<TrafficType, Vec<CaptationPoint>>>,
}

/// Pre-aggregated source rows for runs without a live store connection,
/// matching the JSON export shape of the live fetches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineInput {
    pub revenue_rows: Vec<RevenueRow>,
    #[serde(default)]
    pub organic: Option<OrganicTotals>,
    #[serde(default)]
    pub quality_rows: Option<Vec<QualityRow>>,
    #[serde(default)]
    pub registration_rows: Option<Vec<RegistrationDateRow>>,
    #[serde(default)]
    pub captation_days: Option<Vec<CaptationDaysRow>>,
    #[serde(default)]
    pub country_rows: Option<Vec<CountryRevenueRow>>,
}

struct Extras {
    organic: Option<OrganicTotals>,
    quality_rows: Option<Vec<QualityRow>>,
    registration_rows: Option<Vec<RegistrationDateRow>>,
    captation_days: Option<Vec<CaptationDaysRow>>,
    country_rows: Option<Vec<CountryRevenueRow>>,
}

/// Run the full analysis against a live row store.
pub async fn run_analysis(
    store: &dyn RowSource,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> RoasResult<AnalysisResult> {
    let (spend, country_spend) = parse_inputs(request, config)?;
    ensure_tables_exist(store, request).await?;

    let aggregator =
        RevenueAggregator::probe(store, &request.leads_table, &request.sales_table, config)
            .await?;
    let revenue_rows = aggregator.grouped_revenue().await?;
    info!(rows = revenue_rows.len(), "fetched grouped revenue");

    let extras = fetch_extras(&aggregator).await;
    Ok(assemble(&spend, country_spend.as_ref(), &revenue_rows, extras, config))
}

/// Run the analysis via the staging store: the grouped revenue facts are
/// materialized under `config_id` and read back pre-grouped, so later runs
/// can re-slice them without touching the row store again.
pub async fn run_staged(
    store: &dyn RowSource,
    staging: &dyn StagingStore,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    config_id: &str,
) -> RoasResult<AnalysisResult> {
    let (spend, country_spend) = parse_inputs(request, config)?;
    ensure_tables_exist(store, request).await?;

    let aggregator =
        RevenueAggregator::probe(store, &request.leads_table, &request.sales_table, config)
            .await?;
    let fetched = aggregator.grouped_revenue().await?;
    let written = materialize_facts(staging, config_id, &fetched).await?;
    let revenue_rows = read_grouped_facts(staging, config_id).await?;
    info!(config_id, written, "staged grouped revenue facts");

    let extras = fetch_extras(&aggregator).await;
    Ok(assemble(&spend, country_spend.as_ref(), &revenue_rows, extras, config))
}

/// Run the analysis from pre-aggregated rows, no store involved.
pub fn run_offline(
    spend_csv: &str,
    country_csv: Option<&str>,
    mut input: OfflineInput,
    config: &AnalysisConfig,
) -> RoasResult<AnalysisResult> {
    let spend = parse_spend_ledger(spend_csv, config)?;
    let country_spend = country_csv
        .filter(|c| !c.trim().is_empty())
        .map(|c| parse_country_csv(c, config.exchange_rate))
        .transpose()?;

    for row in &mut input.revenue_rows {
        row.ensure_normalized();
    }
    if let Some(rows) = &mut input.registration_rows {
        for row in rows {
            row.ensure_normalized();
        }
    }

    let extras = Extras {
        organic: input.organic,
        quality_rows: input.quality_rows,
        registration_rows: input.registration_rows,
        captation_days: input.captation_days,
        country_rows: input.country_rows,
    };
    Ok(assemble(
        &spend,
        country_spend.as_ref(),
        &input.revenue_rows,
        extras,
        config,
    ))
}

fn parse_inputs(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> RoasResult<(SpendLedger, Option<CountrySpend>)> {
    if request.leads_table.trim().is_empty() || request.sales_table.trim().is_empty() {
        return Err(RoasError::InvalidInput(
            "leads and sales table names are required".to_string(),
        ));
    }
    let spend = parse_spend_ledger(&request.spend_csv, config)?;
    let country_spend = request
        .country_csv
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| parse_country_csv(c, config.exchange_rate))
        .transpose()?;
    Ok((spend, country_spend))
}

async fn ensure_tables_exist(store: &dyn RowSource, request: &AnalysisRequest) -> RoasResult<()> {
    let tables = store.list_tables().await?;
    for table in [&request.leads_table, &request.sales_table] {
        if !tables.iter().any(|t| t == table) {
            return Err(RoasError::InvalidInput(format!(
                "table `{table}` does not exist"
            )));
        }
    }
    Ok(())
}

fn parse_spend_ledger(spend_csv: &str, config: &AnalysisConfig) -> RoasResult<SpendLedger> {
    if spend_csv.trim().is_empty() {
        return Err(RoasError::InvalidInput("spend report is empty".to_string()));
    }
    let spend = parse_spend_csv(spend_csv, config.exchange_rate)?;
    if spend.segments.is_empty() {
        return Err(RoasError::InvalidInput(
            "spend report contains no usable rows".to_string(),
        ));
    }
    Ok(spend)
}

async fn fetch_extras(aggregator: &RevenueAggregator<'_>) -> Extras {
    Extras {
        organic: or_degrade("organic totals", aggregator.organic_totals().await),
        quality_rows: or_degrade("quality rows", aggregator.quality_rows().await),
        registration_rows: or_degrade(
            "registration date rows",
            aggregator.registration_rows().await,
        ),
        captation_days: or_degrade("captation days", aggregator.captation_days().await),
        country_rows: or_degrade("country rows", aggregator.country_rows().await),
    }
}

/// Optional-source fetches degrade to `None` on error instead of failing
/// the run.
fn or_degrade<T>(source: &str, result: RoasResult<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, source, "optional source fetch failed, section omitted");
            None
        }
    }
}

fn assemble(
    spend: &SpendLedger,
    country_spend: Option<&CountrySpend>,
    revenue_rows: &[RevenueRow],
    extras: Extras,
    config: &AnalysisConfig,
) -> AnalysisResult {
    let ledger = ledger::reconcile(spend, revenue_rows, extras.organic, config.multiply_revenue);

    let quality_data = extras
        .quality_rows
        .as_deref()
        .and_then(|rows| quality::analyze_quality(rows, spend, &config.factors));

    let country_data = extras
        .country_rows
        .as_deref()
        .map(|rows| cohorts::country_cohorts(rows, country_spend));

    let captation_days_data = extras
        .captation_days
        .as_deref()
        .map(cohorts::captation_cohorts);

    let sales_by_registration_date = extras
        .registration_rows
        .as_deref()
        .map(|rows| cohorts::registration_cohorts(rows, spend));

    let captation_by_traffic_type = extras
        .registration_rows
        .as_deref()
        .map(cohorts::captation_by_traffic_type);

    AnalysisResult {
        traffic_type_summary: cohorts::traffic_type_summary(revenue_rows),
        traffic_type_spend: cohorts::traffic_type_spend(spend),
        ads: ledger.ads,
        summary: ledger.summary,
        quality_data,
        country_data,
        captation_days_data,
        sales_by_registration_date,
        captation_by_traffic_type,
    }
}
