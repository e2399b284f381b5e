//! Aggregation against the external lead/sale stores — column-probing
//! revenue queries, organic totals, cohort source rows and the staging
//! (materialize/read-back) layer.

pub mod revenue;
pub mod staging;
pub mod store;

pub use revenue::{
    CaptationDaysRow, CountryRevenueRow, OrganicTotals, QualityRow, RegistrationDateRow,
    ResolvedColumns, RevenueAggregator, RevenueRow,
};
pub use staging::{
    materialize_facts, read_grouped_facts, AggregateStage, MemoryStagingStore, StagingStore,
};
pub use store::{validate_identifier, RowSource};
