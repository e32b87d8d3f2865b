//! Feature extraction for fraud classifier inference.
//!
//! This module derives the named features used during model training
//! from raw request bodies, and arranges them in the column order the
//! loaded model declares.

use serde::{Deserialize, Serialize};

use crate::types::transaction::{FlatPredictInput, TransactionInput};

/// Number of features the classifier consumes.
pub const FEATURE_COUNT: usize = 7;

/// Training column order of the canonical model.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "distance_from_home",
    "distance_from_last_transaction",
    "ratio_to_median_purchase_price",
    "repeat_retailer",
    "used_chip",
    "used_pin_number",
    "online_order",
];

/// Ratio used when the payee has no spending history.
pub const DEFAULT_RATIO: f64 = 1.0;

/// Derived features for a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub ratio_to_median_purchase_price: f64,
    pub online_order: bool,
    pub distance_from_home: f64,
    pub used_pin: bool,
    pub used_chip: bool,
    pub distance_from_last_transaction: f64,
    pub repeat_retailer: bool,
}

impl FeatureSet {
    /// Value of a training column, or `None` if the column is unknown.
    pub fn value_of(&self, column: &str) -> Option<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let value = match column {
            "distance_from_home" => self.distance_from_home as f32,
            "distance_from_last_transaction" => self.distance_from_last_transaction as f32,
            "ratio_to_median_purchase_price" => self.ratio_to_median_purchase_price as f32,
            "repeat_retailer" => flag(self.repeat_retailer),
            "used_chip" => flag(self.used_chip),
            "used_pin_number" | "used_pin" => flag(self.used_pin),
            "online_order" => flag(self.online_order),
            _ => return None,
        };
        Some(value)
    }

    /// Arrange the features in `columns` order.
    ///
    /// Returns the first unknown column name on failure.
    pub fn to_vector<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<f32>, String> {
        columns
            .iter()
            .map(|c| {
                self.value_of(c.as_ref())
                    .ok_or_else(|| c.as_ref().to_string())
            })
            .collect()
    }
}

/// Human-readable label for a training column.
pub fn display_name(column: &str) -> &str {
    match column {
        "distance_from_home" => "Distance from home",
        "distance_from_last_transaction" => "Distance from last transaction",
        "ratio_to_median_purchase_price" => "Ratio to median purchase",
        "repeat_retailer" => "Repeat retailer",
        "used_chip" => "Used chip",
        "used_pin_number" | "used_pin" => "Used PIN",
        "online_order" => "Online order",
        other => other,
    }
}

/// How the card was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Pin,
    Chip,
    Online,
    Other,
}

impl PaymentMode {
    /// Case-insensitive parse; anything unrecognized is `Other`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("pin") => PaymentMode::Pin,
            Some("chip") => PaymentMode::Chip,
            Some("online") => PaymentMode::Online,
            _ => PaymentMode::Other,
        }
    }
}

/// Feature extractor that transforms request bodies into model features.
///
/// All defaults for missing fields are resolved here.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a nested transaction body.
    pub fn extract(&self, input: &TransactionInput) -> FeatureSet {
        let tx = &input.transaction_information;

        let average_spending = input.payee_information.average_spending.unwrap_or(0.0);
        let ratio = if average_spending == 0.0 {
            DEFAULT_RATIO
        } else {
            tx.order_amount.unwrap_or(0.0) / average_spending
        };

        let mode = PaymentMode::parse(tx.payment_mode.as_deref());

        FeatureSet {
            ratio_to_median_purchase_price: ratio,
            online_order: mode == PaymentMode::Online,
            distance_from_home: input.home_distance().unwrap_or(0.0),
            used_pin: mode == PaymentMode::Pin,
            used_chip: mode == PaymentMode::Chip,
            distance_from_last_transaction: input.distance_from_last_transaction.unwrap_or(0.0),
            repeat_retailer: !tx.is_first_time.unwrap_or(true),
        }
    }

    /// Extract features from a legacy flat body, where the ratio is precomputed.
    ///
    /// An omitted `isFirstTime` counts as a first visit here as well, unlike
    /// the old flat endpoint, which treated it as a repeat retailer.
    pub fn extract_flat(&self, input: &FlatPredictInput) -> FeatureSet {
        let mode = PaymentMode::parse(input.payment_mode.as_deref());

        FeatureSet {
            ratio_to_median_purchase_price: input.ratio_to_median_purchase_price.unwrap_or(0.0),
            online_order: mode == PaymentMode::Online,
            distance_from_home: input.home_distance().unwrap_or(0.0),
            used_pin: mode == PaymentMode::Pin,
            used_chip: mode == PaymentMode::Chip,
            distance_from_last_transaction: input.distance_from_last_transaction.unwrap_or(0.0),
            repeat_retailer: !input.is_first_time.unwrap_or(true),
        }
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Feature names in training order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_COLUMNS.to_vec()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
