//! Inbound request bodies for classification

use serde::{Deserialize, Serialize};

/// Transaction submitted to `/api/classify`.
///
/// Every field is optional; defaults are resolved once by the
/// [`FeatureExtractor`](crate::feature_extractor::FeatureExtractor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    #[serde(default)]
    pub payee_information: PayeeInformation,

    #[serde(default)]
    pub transaction_information: TransactionInformation,

    /// Kilometers between the payee's home and the order address
    #[serde(rename = "distance_from_home", default)]
    pub distance_from_home: Option<f64>,

    /// Older clients send the home distance under this key
    #[serde(rename = "distance", default)]
    pub distance: Option<f64>,

    #[serde(rename = "distance_from_last_transaction", default)]
    pub distance_from_last_transaction: Option<f64>,
}

impl TransactionInput {
    /// `distance_from_home`, falling back to the legacy `distance` key.
    pub fn home_distance(&self) -> Option<f64> {
        self.distance_from_home.or(self.distance)
    }
}

/// Spending history of the payee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayeeInformation {
    #[serde(default)]
    pub average_spending: Option<f64>,
}

/// Details of the order being classified
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInformation {
    #[serde(default)]
    pub order_amount: Option<f64>,

    /// `pin`, `chip`, `online` (any casing) or anything else
    #[serde(default)]
    pub payment_mode: Option<String>,

    #[serde(default)]
    pub is_first_time: Option<bool>,
}

/// Flat body accepted by the legacy `/api/predict` endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatPredictInput {
    #[serde(default)]
    pub ratio_to_median_purchase_price: Option<f64>,

    #[serde(default)]
    pub distance_from_home: Option<f64>,

    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub distance_from_last_transaction: Option<f64>,

    #[serde(rename = "isFirstTime", default)]
    pub is_first_time: Option<bool>,

    #[serde(rename = "paymentMode", default)]
    pub payment_mode: Option<String>,
}

impl FlatPredictInput {
    pub fn home_distance(&self) -> Option<f64> {
        self.distance_from_home.or(self.distance)
    }
}

/// Body of `/api/distance`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistanceRequest {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}
