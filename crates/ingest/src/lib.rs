//! Ingestion of ad-platform spend reports — join-key normalization and
//! CSV parsing into per-(ad, segmentation) spend ledgers.

pub mod normalize;
pub mod spend;

pub use normalize::{clean_display_name, normalize, NO_NAME};
pub use spend::{
    parse_country_csv, parse_spend_csv, CountrySpend, DailyKey, SegKey, SpendLedger,
    SpendSegmentation,
};
