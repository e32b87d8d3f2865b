//! Load Client
//!
//! Generates random transactions and posts them to a running classifier
//! service, tallying the verdicts.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request body matching `/api/classify`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest {
    payee_information: PayeeInformation,
    transaction_information: TransactionInformation,
    #[serde(rename = "distance_from_home")]
    distance_from_home: f64,
    #[serde(rename = "distance_from_last_transaction")]
    distance_from_last_transaction: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayeeInformation {
    average_spending: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInformation {
    order_amount: f64,
    payment_mode: String,
    is_first_time: bool,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    fraudulent: bool,
    confidence: f64,
}

/// Transaction generator for load testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Close to home, in-person, typical spend
    fn generate_legitimate(&mut self) -> ClassifyRequest {
        let average = self.rng.gen_range(50.0..200.0);
        ClassifyRequest {
            payee_information: PayeeInformation {
                average_spending: average,
            },
            transaction_information: TransactionInformation {
                order_amount: average * self.rng.gen_range(0.3..1.5),
                payment_mode: self.random_choice(&["pin", "chip", "chip", "online"]).to_string(),
                is_first_time: self.rng.gen_bool(0.2),
            },
            distance_from_home: self.rng.gen_range(0.0..25.0),
            distance_from_last_transaction: self.rng.gen_range(0.0..10.0),
        }
    }

    /// Far from home, online, unusually large order at a new retailer
    fn generate_suspicious(&mut self) -> ClassifyRequest {
        let average = self.rng.gen_range(20.0..100.0);
        ClassifyRequest {
            payee_information: PayeeInformation {
                average_spending: average,
            },
            transaction_information: TransactionInformation {
                order_amount: average * self.rng.gen_range(4.0..12.0),
                payment_mode: "online".to_string(),
                is_first_time: true,
            },
            distance_from_home: self.rng.gen_range(100.0..2000.0),
            distance_from_last_transaction: self.rng.gen_range(50.0..1000.0),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_client=info".parse()?),
        )
        .init();

    info!("Starting Load Client");

    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "http://localhost:5000".to_string());
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(50);

    info!(
        base_url = %base_url,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    let url = format!("{}/api/classify", base_url);

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut flagged = 0u64;
    let mut failed = 0u64;
    let mut confidence_sum = 0.0;
    let start = Instant::now();

    for i in 0..count {
        let request = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        match client.post(&url).json(&request).send().await {
            Ok(resp) if resp.status().is_success() => {
                let verdict: ClassifyResponse = resp.json().await?;
                if verdict.fraudulent {
                    flagged += 1;
                }
                confidence_sum += verdict.confidence;
            }
            Ok(resp) => {
                failed += 1;
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), body = %body, "Classification rejected");
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} transactions ({} flagged, {} failed)",
                i + 1,
                count,
                flagged,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let succeeded = count - failed;
    let avg_confidence = if succeeded > 0 {
        confidence_sum / succeeded as f64
    } else {
        0.0
    };

    info!(
        sent = count,
        flagged = flagged,
        failed = failed,
        avg_confidence = format!("{:.2}%", avg_confidence),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Completed"
    );

    Ok(())
}
