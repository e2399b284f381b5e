//! Revenue aggregation — grouped lead/sale queries over the relational
//! store with column-existence probing for the schema variants the business
//! actually used.
//!
//! Every optional enrichment (platform ad-id, dates, country, demographics)
//! degrades to `None` when its column is absent; only structural misuse
//! (bad identifiers, missing ad/segmentation columns) is an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use roas_core::row::{self, Row};
use roas_core::{AnalysisConfig, RoasError, RoasResult};
use roas_ingest::normalize;

use crate::store::{validate_identifier, RowSource};

// Column candidates per logical field, in priority order. These are
// enumerated from the schemas the business used, not discovered generically.
const AD_CANDIDATES: &[&str] = &["ANUNCIO", "anuncio", "AD", "ad_name"];
const SEG_CANDIDATES: &[&str] = &["SEGMENTACION", "segmentacion", "AD_SET", "ad_set"];
const CAMPAIGN_CANDIDATES: &[&str] = &["CAMPANA", "campana", "CAMPAIGN", "campaign_name"];
const AD_ID_CANDIDATES: &[&str] = &["AD_ID", "ad_id", "ID_ANUNCIO", "anuncio_id"];
const REGISTRATION_DATE_CANDIDATES: &[&str] = &[
    "FECHA_REGISTRO",
    "FECHA",
    "FECHA_CAPTACION",
    "FECHA_REGISTO",
    "fecha_registro",
    "created_at",
];
const SALE_DATE_CANDIDATES: &[&str] = &["FECHA_VENTA", "FECHA", "fecha_venta", "created_at"];
const CLIENT_ID_CANDIDATES: &[&str] = &["TELEFONO", "telefono", "EMAIL", "email", "ID"];
const AMOUNT_CANDIDATES: &[&str] = &["MONTO", "monto", "VALOR", "IMPORTE", "PRECIO", "amount"];
const SOURCE_CANDIDATES: &[&str] = &["FUENTE", "fuente", "ORIGEN", "origen", "SOURCE", "source"];
const COUNTRY_CANDIDATES: &[&str] = &["PAIS", "pais", "COUNTRY", "country"];
const QUALITY_CANDIDATES: &[&str] = &["CALIDAD", "calidad", "CALIDAD_LEAD"];
const INCOME_CANDIDATES: &[&str] = &["INGRESOS", "ingresos", "NIVEL_INGRESOS"];
const EDUCATION_CANDIDATES: &[&str] = &["EDUCACION", "educacion", "NIVEL_EDUCATIVO"];
const OCCUPATION_CANDIDATES: &[&str] = &["OCUPACION", "ocupacion", "PROFESION"];
const PURPOSE_CANDIDATES: &[&str] = &["PROPOSITO", "proposito", "OBJETIVO"];
const AGE_BRACKET_CANDIDATES: &[&str] = &["RANGO_EDAD", "rango_edad", "EDAD_ESPECIFICA", "edad"];
const QUALITY_SCORE_CANDIDATES: &[&str] = &["PUNTAJE", "puntaje", "SCORE_CALIDAD", "score"];

/// One grouped result from the lead/sale store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueRow {
    pub ad_name: String,
    pub segmentation: String,
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub normalized_ad: String,
    #[serde(default)]
    pub normalized_seg: String,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
}

impl RevenueRow {
    /// Fill the normalized join keys from the raw names when absent
    /// (e.g. rows deserialized from an offline export).
    pub fn ensure_normalized(&mut self) {
        if self.normalized_ad.is_empty() {
            self.normalized_ad = normalize(&self.ad_name);
        }
        if self.normalized_seg.is_empty() {
            self.normalized_seg = normalize(&self.segmentation);
        }
    }
}

/// Untracked (organic) sale totals, rolled into the `"organica"` ledger entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OrganicTotals {
    pub total_sales: u64,
    pub total_revenue: f64,
}

/// Revenue grouped by ad, segmentation and the demographic attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRow {
    #[serde(default)]
    pub normalized_ad: String,
    #[serde(default)]
    pub normalized_seg: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub income: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub age_bracket: String,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
    #[serde(default)]
    pub quality_score_sum: f64,
}

/// Revenue grouped by registration day and ad (campaign kept for the
/// traffic-type views).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDateRow {
    pub date: NaiveDate,
    pub ad_name: String,
    #[serde(default)]
    pub normalized_ad: String,
    #[serde(default)]
    pub campaign: String,
    pub leads: u64,
    pub sales: u64,
    pub revenue: f64,
}

impl RegistrationDateRow {
    pub fn ensure_normalized(&mut self) {
        if self.normalized_ad.is_empty() {
            self.normalized_ad = normalize(&self.ad_name);
        }
    }
}

/// Purchases grouped by whole days between registration and sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptationDaysRow {
    pub days: i64,
    pub count: u64,
    pub revenue: f64,
}

/// Leads and sales grouped by lead country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRevenueRow {
    pub country: String,
    pub leads: u64,
    pub tracked_sales: u64,
    pub organic_sales: u64,
    pub revenue: f64,
}

/// Optional columns resolved once per analysis, not re-probed per row.
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    pub ad: String,
    pub segmentation: String,
    pub campaign: Option<String>,
    pub ad_id: Option<String>,
    pub registration_date: Option<String>,
    pub sale_date: Option<String>,
    /// Shared client identifier present on both tables.
    pub client_id: Option<String>,
    pub amount: Option<String>,
    pub source_tag: Option<String>,
    pub country: Option<String>,
    pub quality: Option<String>,
    pub income: Option<String>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub purpose: Option<String>,
    pub age_bracket: Option<String>,
    pub quality_score: Option<String>,
}

pub struct RevenueAggregator<'a> {
    store: &'a dyn RowSource,
    leads_table: String,
    sales_table: String,
    columns: ResolvedColumns,
    multiplier: f64,
    organic_pattern: String,
}

impl std::fmt::Debug for RevenueAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevenueAggregator")
            .field("leads_table", &self.leads_table)
            .field("sales_table", &self.sales_table)
            .field("columns", &self.columns)
            .field("multiplier", &self.multiplier)
            .field("organic_pattern", &self.organic_pattern)
            .finish_non_exhaustive()
    }
}

impl<'a> RevenueAggregator<'a> {
    /// Validate table identifiers and resolve the optional-column schema
    /// variant once. Fails only when the lead table lacks the ad or
    /// segmentation column.
    pub async fn probe(
        store: &'a dyn RowSource,
        leads_table: &str,
        sales_table: &str,
        config: &AnalysisConfig,
    ) -> RoasResult<RevenueAggregator<'a>> {
        validate_identifier(leads_table)?;
        validate_identifier(sales_table)?;

        let ad = resolve_column(store, leads_table, AD_CANDIDATES)
            .await?
            .ok_or_else(|| {
                RoasError::InvalidInput(format!("table `{leads_table}` has no ad column"))
            })?;
        let segmentation = resolve_column(store, leads_table, SEG_CANDIDATES)
            .await?
            .ok_or_else(|| {
                RoasError::InvalidInput(format!(
                    "table `{leads_table}` has no segmentation column"
                ))
            })?;

        // The client identifier must exist on both tables to join sales.
        let mut client_id = None;
        for candidate in CLIENT_ID_CANDIDATES {
            if store.column_exists(leads_table, candidate).await?
                && store.column_exists(sales_table, candidate).await?
            {
                client_id = Some(candidate.to_string());
                break;
            }
        }

        let columns = ResolvedColumns {
            ad,
            segmentation,
            campaign: resolve_column(store, leads_table, CAMPAIGN_CANDIDATES).await?,
            ad_id: resolve_column(store, leads_table, AD_ID_CANDIDATES).await?,
            registration_date: resolve_column(store, leads_table, REGISTRATION_DATE_CANDIDATES)
                .await?,
            sale_date: resolve_column(store, sales_table, SALE_DATE_CANDIDATES).await?,
            client_id,
            amount: resolve_column(store, sales_table, AMOUNT_CANDIDATES).await?,
            source_tag: resolve_column(store, sales_table, SOURCE_CANDIDATES).await?,
            country: resolve_column(store, leads_table, COUNTRY_CANDIDATES).await?,
            quality: resolve_column(store, leads_table, QUALITY_CANDIDATES).await?,
            income: resolve_column(store, leads_table, INCOME_CANDIDATES).await?,
            education: resolve_column(store, leads_table, EDUCATION_CANDIDATES).await?,
            occupation: resolve_column(store, leads_table, OCCUPATION_CANDIDATES).await?,
            purpose: resolve_column(store, leads_table, PURPOSE_CANDIDATES).await?,
            age_bracket: resolve_column(store, leads_table, AGE_BRACKET_CANDIDATES).await?,
            quality_score: resolve_column(store, leads_table, QUALITY_SCORE_CANDIDATES).await?,
        };
        debug!(?columns, "resolved store columns");

        let organic_pattern: String = config
            .organic_pattern
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let organic_pattern = if organic_pattern.is_empty() {
            "org".to_string()
        } else {
            organic_pattern
        };

        Ok(RevenueAggregator {
            store,
            leads_table: leads_table.to_string(),
            sales_table: sales_table.to_string(),
            columns,
            multiplier: config.revenue_multiplier(),
            organic_pattern,
        })
    }

    pub fn columns(&self) -> &ResolvedColumns {
        &self.columns
    }

    /// `sale is tracked` predicate: no source tag column means every sale
    /// counts; otherwise the tag must be NULL or not contain the organic
    /// marker.
    fn tracked_condition(&self) -> String {
        match &self.columns.source_tag {
            Some(src) => format!(
                "(s.{src} IS NULL OR LOWER(s.{src}) NOT LIKE '%{}%')",
                self.organic_pattern
            ),
            None => "1=1".to_string(),
        }
    }

    fn organic_condition(&self) -> Option<String> {
        self.columns.source_tag.as_ref().map(|src| {
            format!(
                "(s.{src} IS NOT NULL AND LOWER(s.{src}) LIKE '%{}%')",
                self.organic_pattern
            )
        })
    }

    /// Revenue SUM term with the co-production multiplier applied inside
    /// the aggregation so SUM semantics stay correct.
    fn revenue_term(&self) -> String {
        match &self.columns.amount {
            Some(amount) => format!("s.{amount} * {}", self.multiplier),
            None => "0".to_string(),
        }
    }

    fn sale_exists(&self) -> String {
        // Only callable when client_id is resolved.
        let client = self.columns.client_id.as_deref().unwrap_or("");
        format!("s.{client} IS NOT NULL")
    }

    /// Grouped revenue: `GROUP BY ad, segmentation, campaign[, ad-id]`,
    /// left-joined to tracked sales on the shared client identifier.
    pub async fn grouped_revenue(&self) -> RoasResult<Vec<RevenueRow>> {
        let c = &self.columns;
        let campaign_select = match &c.campaign {
            Some(col) => format!("l.{col} AS campaign"),
            None => "'' AS campaign".to_string(),
        };
        let ad_id_select = c
            .ad_id
            .as_ref()
            .map(|col| format!(", l.{col} AS ad_id"))
            .unwrap_or_default();
        let mut group_by = format!("l.{}, l.{}", c.ad, c.segmentation);
        if let Some(col) = &c.campaign {
            group_by.push_str(&format!(", l.{col}"));
        }
        if let Some(col) = &c.ad_id {
            group_by.push_str(&format!(", l.{col}"));
        }

        let sql = match &c.client_id {
            Some(client) => {
                let tracked = self.tracked_condition();
                let sale = self.sale_exists();
                let revenue = self.revenue_term();
                format!(
                    "SELECT l.{ad} AS ad_name, l.{seg} AS segmentation, {campaign_select}{ad_id_select}, \
                     COUNT(DISTINCT l.{client}) AS leads, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN 1 ELSE 0 END) AS sales, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN {revenue} ELSE 0 END) AS revenue \
                     FROM {leads} l LEFT JOIN {sales} s ON s.{client} = l.{client} \
                     GROUP BY {group_by}",
                    ad = c.ad,
                    seg = c.segmentation,
                    leads = self.leads_table,
                    sales = self.sales_table,
                )
            }
            // No shared client identifier: leads only, no sale attribution.
            None => format!(
                "SELECT l.{ad} AS ad_name, l.{seg} AS segmentation, {campaign_select}{ad_id_select}, \
                 COUNT(*) AS leads, 0 AS sales, 0 AS revenue \
                 FROM {leads} l GROUP BY {group_by}",
                ad = c.ad,
                seg = c.segmentation,
                leads = self.leads_table,
            ),
        };

        let rows = self.store.query(&sql).await?;
        Ok(rows.iter().filter_map(parse_revenue_row).collect())
    }

    /// Organic-only totals: sales whose source tag matches the organic
    /// pattern, with no ad grouping. `None` when the sales table carries no
    /// source tag (organic sales cannot be identified).
    pub async fn organic_totals(&self) -> RoasResult<Option<OrganicTotals>> {
        let organic = match self.organic_condition() {
            Some(cond) => cond,
            None => return Ok(None),
        };
        let revenue = self.revenue_term();
        let sql = format!(
            "SELECT COUNT(*) AS total_sales, SUM({revenue}) AS total_revenue \
             FROM {sales} s WHERE {organic}",
            sales = self.sales_table,
        );
        let rows = self.store.query(&sql).await?;
        Ok(rows.first().map(|r| OrganicTotals {
            total_sales: row::get_u64(r, "total_sales"),
            total_revenue: row::get_f64(r, "total_revenue"),
        }))
    }

    /// Revenue grouped by ad, segmentation and demographic attributes.
    /// `None` when no demographic column exists on the lead table.
    pub async fn quality_rows(&self) -> RoasResult<Option<Vec<QualityRow>>> {
        let c = &self.columns;
        let attrs: [(&str, Option<&String>); 6] = [
            ("quality", c.quality.as_ref()),
            ("income", c.income.as_ref()),
            ("education", c.education.as_ref()),
            ("occupation", c.occupation.as_ref()),
            ("purpose", c.purpose.as_ref()),
            ("age_bracket", c.age_bracket.as_ref()),
        ];
        if attrs.iter().all(|(_, col)| col.is_none()) {
            return Ok(None);
        }

        let mut selects = Vec::new();
        let mut group_by = format!("l.{}, l.{}", c.ad, c.segmentation);
        for (alias, col) in &attrs {
            match col {
                Some(col) => {
                    selects.push(format!("l.{col} AS {alias}"));
                    group_by.push_str(&format!(", l.{col}"));
                }
                None => selects.push(format!("'' AS {alias}")),
            }
        }
        let score_term = match &c.quality_score {
            Some(col) => format!("SUM(l.{col})"),
            None => "0".to_string(),
        };

        let sql = match &c.client_id {
            Some(client) => {
                let tracked = self.tracked_condition();
                let sale = self.sale_exists();
                let revenue = self.revenue_term();
                format!(
                    "SELECT l.{ad} AS ad_name, l.{seg} AS segmentation, {attr_selects}, \
                     COUNT(DISTINCT l.{client}) AS leads, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN 1 ELSE 0 END) AS sales, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN {revenue} ELSE 0 END) AS revenue, \
                     {score_term} AS quality_score_sum \
                     FROM {leads} l LEFT JOIN {sales} s ON s.{client} = l.{client} \
                     GROUP BY {group_by}",
                    ad = c.ad,
                    seg = c.segmentation,
                    attr_selects = selects.join(", "),
                    leads = self.leads_table,
                    sales = self.sales_table,
                )
            }
            None => format!(
                "SELECT l.{ad} AS ad_name, l.{seg} AS segmentation, {attr_selects}, \
                 COUNT(*) AS leads, 0 AS sales, 0 AS revenue, {score_term} AS quality_score_sum \
                 FROM {leads} l GROUP BY {group_by}",
                ad = c.ad,
                seg = c.segmentation,
                attr_selects = selects.join(", "),
                leads = self.leads_table,
            ),
        };

        let rows = self.store.query(&sql).await?;
        Ok(Some(rows.iter().map(parse_quality_row).collect()))
    }

    /// Leads/sales/revenue per registration day and ad. `None` when the
    /// lead table has no registration date column.
    pub async fn registration_rows(&self) -> RoasResult<Option<Vec<RegistrationDateRow>>> {
        let c = &self.columns;
        let reg = match &c.registration_date {
            Some(col) => col,
            None => return Ok(None),
        };
        let campaign_select = match &c.campaign {
            Some(col) => format!("l.{col} AS campaign"),
            None => "'' AS campaign".to_string(),
        };
        let mut group_by = format!("DATE(l.{reg}), l.{}", c.ad);
        if let Some(col) = &c.campaign {
            group_by.push_str(&format!(", l.{col}"));
        }

        let sql = match &c.client_id {
            Some(client) => {
                let tracked = self.tracked_condition();
                let sale = self.sale_exists();
                let revenue = self.revenue_term();
                format!(
                    "SELECT DATE(l.{reg}) AS reg_date, l.{ad} AS ad_name, {campaign_select}, \
                     COUNT(DISTINCT l.{client}) AS leads, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN 1 ELSE 0 END) AS sales, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN {revenue} ELSE 0 END) AS revenue \
                     FROM {leads} l LEFT JOIN {sales} s ON s.{client} = l.{client} \
                     WHERE l.{reg} IS NOT NULL \
                     GROUP BY {group_by} ORDER BY reg_date",
                    ad = c.ad,
                    leads = self.leads_table,
                    sales = self.sales_table,
                )
            }
            None => format!(
                "SELECT DATE(l.{reg}) AS reg_date, l.{ad} AS ad_name, {campaign_select}, \
                 COUNT(*) AS leads, 0 AS sales, 0 AS revenue \
                 FROM {leads} l WHERE l.{reg} IS NOT NULL \
                 GROUP BY {group_by} ORDER BY reg_date",
                ad = c.ad,
                leads = self.leads_table,
            ),
        };

        let rows = self.store.query(&sql).await?;
        Ok(Some(rows.iter().filter_map(parse_registration_row).collect()))
    }

    /// Tracked purchases grouped by whole days between registration and
    /// sale. `None` without both date columns and a client join.
    pub async fn captation_days(&self) -> RoasResult<Option<Vec<CaptationDaysRow>>> {
        let c = &self.columns;
        let (reg, sale_date, client) =
            match (&c.registration_date, &c.sale_date, &c.client_id) {
                (Some(r), Some(s), Some(cl)) => (r, s, cl),
                _ => return Ok(None),
            };
        let tracked = self.tracked_condition();
        let revenue = self.revenue_term();
        let sql = format!(
            "SELECT DATEDIFF(DATE(s.{sale_date}), DATE(l.{reg})) AS days, \
             COUNT(*) AS count, SUM({revenue}) AS revenue \
             FROM {leads} l INNER JOIN {sales} s ON s.{client} = l.{client} \
             WHERE l.{reg} IS NOT NULL AND s.{sale_date} IS NOT NULL AND {tracked} \
             GROUP BY days ORDER BY days",
            leads = self.leads_table,
            sales = self.sales_table,
        );
        let rows = self.store.query(&sql).await?;
        Ok(Some(
            rows.iter()
                .map(|r| CaptationDaysRow {
                    days: row::get_i64(r, "days"),
                    count: row::get_u64(r, "count"),
                    revenue: row::get_f64(r, "revenue"),
                })
                .collect(),
        ))
    }

    /// Leads/sales split per lead country, with blank countries grouped
    /// under an explicit fallback. `None` without a country column.
    pub async fn country_rows(&self) -> RoasResult<Option<Vec<CountryRevenueRow>>> {
        let c = &self.columns;
        let country = match &c.country {
            Some(col) => col,
            None => return Ok(None),
        };
        let country_expr = format!("COALESCE(NULLIF(l.{country}, ''), 'Sin país')");

        let sql = match &c.client_id {
            Some(client) => {
                let tracked = self.tracked_condition();
                let organic = self
                    .organic_condition()
                    .unwrap_or_else(|| "1=0".to_string());
                let sale = self.sale_exists();
                let revenue = self.revenue_term();
                format!(
                    "SELECT {country_expr} AS country, \
                     COUNT(DISTINCT l.{client}) AS leads, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN 1 ELSE 0 END) AS tracked_sales, \
                     SUM(CASE WHEN {sale} AND {organic} THEN 1 ELSE 0 END) AS organic_sales, \
                     SUM(CASE WHEN {sale} AND {tracked} THEN {revenue} ELSE 0 END) AS revenue \
                     FROM {leads} l LEFT JOIN {sales} s ON s.{client} = l.{client} \
                     GROUP BY {country_expr}",
                    leads = self.leads_table,
                    sales = self.sales_table,
                )
            }
            None => format!(
                "SELECT {country_expr} AS country, COUNT(*) AS leads, \
                 0 AS tracked_sales, 0 AS organic_sales, 0 AS revenue \
                 FROM {leads} l GROUP BY {country_expr}",
                leads = self.leads_table,
            ),
        };

        let rows = self.store.query(&sql).await?;
        Ok(Some(
            rows.iter()
                .map(|r| CountryRevenueRow {
                    country: row::get_str(r, "country")
                        .unwrap_or_else(|| "Sin país".to_string()),
                    leads: row::get_u64(r, "leads"),
                    tracked_sales: row::get_u64(r, "tracked_sales"),
                    organic_sales: row::get_u64(r, "organic_sales"),
                    revenue: row::get_f64(r, "revenue"),
                })
                .collect(),
        ))
    }
}

async fn resolve_column(
    store: &dyn RowSource,
    table: &str,
    candidates: &[&str],
) -> RoasResult<Option<String>> {
    for candidate in candidates {
        if store.column_exists(table, candidate).await? {
            return Ok(Some(candidate.to_string()));
        }
    }
    Ok(None)
}

fn parse_revenue_row(r: &Row) -> Option<RevenueRow> {
    let ad_name = row::get_str(r, "ad_name")?;
    let normalized_ad = normalize(&ad_name);
    if normalized_ad.is_empty() {
        // Unmatchable name, nothing to reconcile against.
        return None;
    }
    let segmentation = row::get_str(r, "segmentation").unwrap_or_default();
    Some(RevenueRow {
        normalized_seg: normalize(&segmentation),
        normalized_ad,
        ad_name,
        segmentation,
        campaign: row::get_str(r, "campaign").unwrap_or_default(),
        ad_id: row::get_str(r, "ad_id"),
        leads: row::get_u64(r, "leads"),
        sales: row::get_u64(r, "sales"),
        revenue: row::get_f64(r, "revenue"),
    })
}

fn parse_quality_row(r: &Row) -> QualityRow {
    let ad_name = row::get_str(r, "ad_name").unwrap_or_default();
    let segmentation = row::get_str(r, "segmentation").unwrap_or_default();
    QualityRow {
        normalized_ad: normalize(&ad_name),
        normalized_seg: normalize(&segmentation),
        quality: row::get_str(r, "quality").unwrap_or_default(),
        income: row::get_str(r, "income").unwrap_or_default(),
        education: row::get_str(r, "education").unwrap_or_default(),
        occupation: row::get_str(r, "occupation").unwrap_or_default(),
        purpose: row::get_str(r, "purpose").unwrap_or_default(),
        age_bracket: row::get_str(r, "age_bracket").unwrap_or_default(),
        leads: row::get_u64(r, "leads"),
        sales: row::get_u64(r, "sales"),
        revenue: row::get_f64(r, "revenue"),
        quality_score_sum: row::get_f64(r, "quality_score_sum"),
    }
}

fn parse_registration_row(r: &Row) -> Option<RegistrationDateRow> {
    let raw = row::get_str(r, "reg_date")?;
    let head = raw.get(..10).unwrap_or(&raw);
    let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()?;
    let ad_name = row::get_str(r, "ad_name").unwrap_or_default();
    Some(RegistrationDateRow {
        date,
        normalized_ad: normalize(&ad_name),
        ad_name,
        campaign: row::get_str(r, "campaign").unwrap_or_default(),
        leads: row::get_u64(r, "leads"),
        sales: row::get_u64(r, "sales"),
        revenue: row::get_f64(r, "revenue"),
    })
}
