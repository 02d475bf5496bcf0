//! The per-upload workflow: locate, crop, score, classify, describe, comment.
//!
//! Every step runs in order. Model failures degrade into placeholder text or
//! advisories; only an undecodable image aborts the request.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use serde::Serialize;

use crate::critic::{self, Localization};
use crate::error::AppError;
use crate::gemini::VisionModel;
use crate::retry::RetryPolicy;
use crate::symmetry::{BoundingBox, Evaluation, SymmetryScorer};

/// Scores at or above this get the celebratory treatment.
pub const HIGH_SCORE: f64 = 80.0;

pub struct Upload {
    pub bytes: Vec<u8>,
    /// Content type declared by the client, if any.
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SandwichReport {
    pub score: f64,
    pub high_score: bool,
    pub is_sandwich: bool,
    pub overall_analysis: String,
    pub filling_analysis: String,
    pub comment: Option<String>,
    pub advisories: Vec<String>,
    pub bounding_box: Option<BoundingBox>,
    pub difference_png: String,
    pub heatmap_png: String,
    pub binary_mask_png: String,
    pub processing_time_ms: u128,
}

/// Everything the pipeline needs besides the upload itself.
pub struct Analyzer<'a> {
    pub model: &'a dyn VisionModel,
    pub scorer: SymmetryScorer,
    pub comment_retry: RetryPolicy,
}

struct Scored {
    evaluation: Evaluation,
    crop_png: Option<Vec<u8>>,
    difference_png: String,
    heatmap_png: String,
    binary_mask_png: String,
}

impl Analyzer<'_> {
    pub async fn analyze(&self, upload: Upload) -> Result<SandwichReport, AppError> {
        let start = Instant::now();

        if upload.bytes.is_empty() {
            return Err(AppError::InvalidImage("upload is empty".to_string()));
        }
        let mime_type = resolve_mime(upload.mime_type.as_deref(), &upload.bytes);
        let bytes = Arc::new(upload.bytes);

        let image = {
            let bytes = Arc::clone(&bytes);
            blocking(move || {
                image::load_from_memory(&bytes).map_err(|e| AppError::InvalidImage(e.to_string()))
            })
            .await??
        };
        let (width, height) = image.dimensions();
        tracing::info!(
            "📸 Received {}x{} {} image, asking {}",
            width,
            height,
            mime_type,
            self.model.name()
        );

        let mut advisories = Vec::new();

        tracing::info!("Detecting sandwich boundaries with AI...");
        let bounding_box = match critic::locate_subject(self.model, &bytes, &mime_type).await {
            Localization::Found(pct) => Some(pct.to_pixels(width, height)),
            Localization::Unparseable(reply) => {
                advisories.push(format!("AI could not parse bounding box: {}", reply));
                None
            }
            Localization::Failed(err) => {
                advisories.push(format!("Error getting bounding box from AI: {}", err));
                None
            }
        };

        let scorer = self.scorer;
        let scored = blocking(move || score_and_render(&scorer, &image, bounding_box)).await??;
        if let Some(advisory) = &scored.evaluation.advisory {
            advisories.push(advisory.message());
        }
        let score = scored.evaluation.result.score;
        tracing::info!("📊 Symmetry score: {:.2}", score);

        let classification = critic::classify_subject(self.model, &bytes, &mime_type).await;

        let (filling_analysis, comment) = if classification.is_sandwich {
            tracing::info!("Analyzing filling symmetry with AI...");
            let filling = match &scored.crop_png {
                Some(png) => critic::analyze_filling(self.model, png, "image/png").await,
                None => critic::analyze_filling(self.model, &bytes, &mime_type).await,
            };

            tracing::info!("Generating brutally honest comment...");
            let comment = critic::generate_comment(
                self.model,
                &self.comment_retry,
                score,
                &classification.description,
                &filling,
            )
            .await;
            (filling, Some(comment))
        } else {
            tracing::info!("🚫 Upload does not look like a sandwich");
            (critic::NO_FILLING_ANALYSIS.to_string(), None)
        };

        let bounding_box = match scored.evaluation.advisory {
            None => bounding_box,
            Some(_) => None,
        };

        Ok(SandwichReport {
            score,
            high_score: score >= HIGH_SCORE,
            is_sandwich: classification.is_sandwich,
            overall_analysis: classification.description,
            filling_analysis,
            comment,
            advisories,
            bounding_box,
            difference_png: scored.difference_png,
            heatmap_png: scored.heatmap_png,
            binary_mask_png: scored.binary_mask_png,
            processing_time_ms: start.elapsed().as_millis(),
        })
    }
}

fn score_and_render(
    scorer: &SymmetryScorer,
    image: &DynamicImage,
    bounding_box: Option<BoundingBox>,
) -> Result<Scored, AppError> {
    let evaluation = scorer.evaluate_or_full_image(image, bounding_box)?;

    let crop_png = match (bounding_box, &evaluation.advisory) {
        (Some(bbox), None) => {
            let bbox = bbox.clamp_to(image.width(), image.height())?;
            let crop = image.crop_imm(bbox.x_min, bbox.y_min, bbox.width(), bbox.height());
            Some(encode_png(&crop)?)
        }
        _ => None,
    };

    let result = &evaluation.result;
    let difference_png = encode_base64_png(&DynamicImage::ImageLuma8(result.difference_map.clone()))?;
    let heatmap_png = encode_base64_png(&DynamicImage::ImageRgb8(result.heatmap.clone()))?;
    let binary_mask_png = encode_base64_png(&DynamicImage::ImageLuma8(result.binary_mask.clone()))?;

    Ok(Scored {
        evaluation,
        crop_png,
        difference_png,
        heatmap_png,
        binary_mask_png,
    })
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageOutputFormat::Png)
        .map_err(|e| AppError::Internal(format!("PNG encoding failed: {}", e)))?;
    Ok(png_bytes)
}

fn encode_base64_png(image: &DynamicImage) -> Result<String, AppError> {
    Ok(general_purpose::STANDARD.encode(encode_png(image)?))
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("worker task failed: {}", e)))
}

/// Uses the declared content type when it names an image, otherwise sniffs the bytes.
pub fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(mime) = declared.filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }
    let sniffed = match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "image/png",
    };
    sniffed.to_string()
}
