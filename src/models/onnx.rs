//! ONNX Runtime backend for the fraud classifier

use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::Session;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::Mutex;
use tracing::debug;

use crate::models::inference::{Classifier, RawOutput};
use crate::models::metadata::{DecisionTree, ModelMetadata};

/// Binary classifier exported to ONNX (e.g. skl2onnx), with `label` and
/// `probabilities` outputs.
pub struct OnnxClassifier {
    /// `Session::run` takes `&mut self`
    session: Mutex<Session>,
    input_name: String,
    label_output: String,
    proba_output: String,
    metadata: ModelMetadata,
}

impl OnnxClassifier {
    pub fn new(session: Session, metadata: ModelMetadata) -> Self {
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "label".to_string());

        let proba_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        Self {
            session: Mutex::new(session),
            input_name,
            label_output,
            proba_output,
            metadata,
        }
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_names(&self) -> (&str, &str) {
        (&self.label_output, &self.proba_output)
    }

    fn extract_label(&self, outputs: &ort::session::SessionOutputs) -> Result<i64> {
        let output = outputs
            .get(self.label_output.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing output '{}'", self.label_output))?;

        let (_, data) = output
            .try_extract_tensor::<i64>()
            .context("Label output is not an int64 tensor")?;

        data.first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Empty label output"))
    }

    /// Handles both a `[1, 2]` float tensor and ZipMap's seq(map(int64, float)).
    fn extract_probabilities(&self, outputs: &ort::session::SessionOutputs) -> Result<Vec<f64>> {
        let output = outputs
            .get(self.proba_output.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing output '{}'", self.proba_output))?;

        let dtype = output.dtype();

        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            debug!(output = %self.proba_output, "Extracted probabilities from tensor");
            return Ok(data.iter().take(2).map(|&p| p as f64).collect());
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output);
        }

        Err(anyhow::anyhow!(
            "Unsupported probability output type for '{}'",
            self.proba_output
        ))
    }

    fn extract_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<Vec<f64>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty probability sequence"))?;

        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

        let mut probabilities = vec![0.0; 2];
        for (class_id, prob) in &kv_pairs {
            match *class_id {
                0 | 1 => probabilities[*class_id as usize] = *prob as f64,
                other => anyhow::bail!("Unexpected class id {} in probability map", other),
            }
        }

        debug!(output = %self.proba_output, "Extracted probabilities from seq(map)");
        Ok(probabilities)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn columns(&self) -> &[String] {
        &self.metadata.feature_names
    }

    fn classify(&self, row: &[f32]) -> Result<RawOutput> {
        // Input tensor - shape [1, num_features]
        let shape = vec![1_i64, row.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, row.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let label = self.extract_label(&outputs)?;
        let probabilities = self.extract_probabilities(&outputs)?;

        Ok(RawOutput {
            label,
            probabilities,
        })
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        if self.metadata.feature_importances.is_empty() {
            None
        } else {
            Some(&self.metadata.feature_importances)
        }
    }

    fn sample_tree(&self) -> Option<&DecisionTree> {
        self.metadata.sample_tree()
    }
}
