//! Integration test for the full spend-to-dashboard analysis flow.

use roas_core::AnalysisConfig;
use roas_reporting::{run_offline, OfflineInput, TrafficType};
use serde_json::json;

const SPEND_CSV: &str = "\
\u{FEFF}Campaign Name,Ad Set Name,Ad Name,Amount Spent,Ad ID,Day
PQ_Lanzamiento,Intereses,Anuncio Café ☕️,\"1.000,50\",111,2024-03-01
PQ_Lanzamiento,Intereses,ANUNCIO CAFE,\"499,50\",111,2024-03-02
PF_Prospecting,Lookalike,Anuncio Frío,200,222,2024-03-01
PF_Prospecting,Lookalike,Huérfano,75,,2024-03-01
";

const COUNTRY_CSV: &str = "\
Country,Amount Spent,Day
México,900,2024-03-01
Perú,300,2024-03-01
";

fn offline_input() -> OfflineInput {
    serde_json::from_value(json!({
        "revenue_rows": [
            {
                "ad_name": "Anuncio Café", "segmentation": "Intereses",
                "campaign": "PQ_Lanzamiento", "ad_id": "111",
                "leads": 100, "sales": 10, "revenue": 4500.0
            },
            {
                "ad_name": "anuncio frio", "segmentation": "Lookalike",
                "campaign": "PF_Prospecting",
                "leads": 40, "sales": 1, "revenue": 150.0
            }
        ],
        "organic": {"total_sales": 3, "total_revenue": 600.0},
        "quality_rows": [
            {
                "normalized_ad": "anuncio cafe", "normalized_seg": "intereses",
                "quality": "Alta", "income": "Alto",
                "leads": 60, "sales": 8, "revenue": 4000.0, "quality_score_sum": 240.0
            },
            {
                "normalized_ad": "anuncio cafe", "normalized_seg": "intereses",
                "quality": "Baja", "income": "",
                "leads": 40, "sales": 2, "revenue": 500.0, "quality_score_sum": 80.0
            }
        ],
        "registration_rows": [
            {
                "date": "2024-03-01", "ad_name": "Anuncio Café",
                "campaign": "PQ_Lanzamiento", "leads": 55, "sales": 6, "revenue": 2600.0
            },
            {
                "date": "2024-03-02", "ad_name": "Anuncio Café",
                "campaign": "PQ_Lanzamiento", "leads": 45, "sales": 4, "revenue": 1900.0
            }
        ],
        "captation_days": [
            {"days": -1, "count": 1, "revenue": 100.0},
            {"days": 0, "count": 5, "revenue": 2000.0},
            {"days": 3, "count": 4, "revenue": 2400.0}
        ],
        "country_rows": [
            {"country": "Mexico", "leads": 90, "tracked_sales": 8, "organic_sales": 2, "revenue": 3600.0},
            {"country": "Perú", "leads": 50, "tracked_sales": 3, "organic_sales": 1, "revenue": 1050.0}
        ]
    }))
    .unwrap()
}

#[test]
fn test_full_dashboard_from_exports() {
    let result = run_offline(
        SPEND_CSV,
        Some(COUNTRY_CSV),
        offline_input(),
        &AnalysisConfig::default(),
    )
    .unwrap();

    // Both spend-name variants of ad 111 merged under one key; the comma
    // decimals parsed with the export locale.
    let cafe = result
        .ads
        .iter()
        .find(|a| a.key == "anuncio cafe")
        .expect("reconciled cafe ad");
    assert!((cafe.spend - 1500.0).abs() < 1e-9);
    assert_eq!(cafe.revenue, 4500.0);
    assert_eq!(cafe.roas, 3.0);
    assert_eq!(cafe.name, "Anuncio Café ☕️");

    // Spend with no revenue counterpart shows up as pure cost.
    let orphan = result.ads.iter().find(|a| a.key == "huerfano").unwrap();
    assert_eq!(orphan.profit, -75.0);

    // Organic revenue is reported but excluded from the ad-attributed total.
    assert!(result.ads.iter().any(|a| a.key == "organica"));
    assert!((result.summary.total_revenue - 4650.0).abs() < 1e-9);
    assert!((result.summary.total_spend - 1775.0).abs() < 1e-9);

    // Most profitable ad first.
    assert_eq!(result.ads[0].key, "anuncio cafe");

    // Quality cohorts: allocated spend sums back to the cafe ad's spend.
    let quality = result.quality_data.expect("quality section");
    let allocated: f64 = quality.segments.iter().map(|s| s.spend).sum();
    assert!((allocated - 1500.0).abs() < 1e-9);
    assert_eq!(quality.summary.total_leads, 100);

    // Registration series is chronological with daily spend joined in.
    let series = result.sales_by_registration_date.expect("date series");
    assert_eq!(series.len(), 2);
    assert!((series[0].spend - 1000.5).abs() < 1e-9);
    assert!((series[1].spend - 499.5).abs() < 1e-9);

    // Negative captation delay clamped into day zero.
    let captation = result.captation_days_data.expect("captation section");
    assert_eq!(captation[0].days, 0);
    assert_eq!(captation[0].count, 6);

    // Country join is accent-insensitive and sorted by name.
    let countries = result.country_data.expect("country section");
    assert_eq!(countries[0].country, "Mexico");
    assert_eq!(countries[0].spend, 900.0);
    assert_eq!(countries[0].roas, 4.0);

    // Campaign naming drives the traffic split.
    assert_eq!(
        result.traffic_type_summary[&TrafficType::Caliente].leads,
        100
    );
    assert_eq!(result.traffic_type_spend[&TrafficType::Frio], 275.0);
}

#[test]
fn test_rerun_is_bit_identical() {
    let config = AnalysisConfig::default();
    let a = run_offline(SPEND_CSV, Some(COUNTRY_CSV), offline_input(), &config).unwrap();
    let b = run_offline(SPEND_CSV, Some(COUNTRY_CSV), offline_input(), &config).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_missing_sections_stay_absent() {
    let input: OfflineInput = serde_json::from_value(json!({
        "revenue_rows": [{
            "ad_name": "Solo", "segmentation": "S",
            "leads": 5, "sales": 0, "revenue": 0.0
        }]
    }))
    .unwrap();
    let result = run_offline(SPEND_CSV, None, input, &AnalysisConfig::default()).unwrap();
    assert!(result.quality_data.is_none());
    assert!(result.country_data.is_none());
    assert!(result.captation_days_data.is_none());
    assert!(result.sales_by_registration_date.is_none());
    assert!(result.captation_by_traffic_type.is_none());
}
