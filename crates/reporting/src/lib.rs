//! Spend-to-revenue reconciliation and derived analytics — the per-ad
//! ledger, quality/factor analysis, cohort views and the orchestrating
//! pipeline.

pub mod cohorts;
pub mod ledger;
pub mod pipeline;
pub mod quality;

pub use cohorts::TrafficType;
pub use ledger::{reconcile, AdLedger, AdLedgerEntry, LedgerSummary, SegmentationEntry};
pub use pipeline::{
    run_analysis, run_offline, run_staged, AnalysisRequest, AnalysisResult, OfflineInput,
};
pub use quality::{analyze_quality, FactorAnalysis, QualityAnalysis, QualitySegment};
