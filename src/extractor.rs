//! W-2 extraction pipeline: vision model -> JSON recovery -> normalization.

use thiserror::Error;
use tracing::{debug, info};

use crate::json_extract::{self, ExtractionError};
use crate::prompt::W2_PROMPT;
use crate::vision::{ImageInput, VisionModel};
use crate::w2::{self, W2};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("vision model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("vision model returned an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Extraction pipeline orchestrator.
pub struct W2Extractor {
    model: Box<dyn VisionModel>,
}

impl W2Extractor {
    pub fn new(model: impl VisionModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    /// Transcribe a W-2 image and return the normalized record.
    pub async fn extract(&self, image: &ImageInput) -> Result<W2, PipelineError> {
        info!(
            "Starting W-2 extraction for: {} ({} bytes) using model: {}",
            image.filename,
            image.data.len(),
            self.model.name()
        );

        let response = self
            .model
            .transcribe(W2_PROMPT, image)
            .await
            .map_err(PipelineError::Model)?;

        debug!("Raw model response length: {} chars", response.len());

        if response.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        let w2 = parse_raw(&response)?;

        info!(
            "W-2 extraction complete: tax year {}, {} box 12 items, {} state entries",
            w2.tax_year,
            w2.federal_wages_and_taxes.box_12_items.len(),
            w2.state_and_local.entries.len()
        );

        Ok(w2)
    }
}

/// Recover JSON from a model reply and normalize it into a W-2.
pub fn parse_raw(raw: &str) -> Result<W2, ExtractionError> {
    let value = json_extract::extract_json_value(raw)?;
    Ok(w2::normalize(&value))
}
