//! Object detection service client
//!
//! Talks to a detection server (for example a YOLO model behind a small HTTP
//! wrapper). The request is a multipart upload of the image plus the
//! confidence threshold; the response lists boxes in detector order:
//!
//! ```json
//! {
//!   "width": 640,
//!   "height": 480,
//!   "detections": [
//!     { "label": "person", "confidence": 0.91, "width": 200.0, "height": 410.0 }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::engines::{BoundingBox, Detections, MediaBlob, ObjectDetector};
use crate::{Error, Result};

/// HTTP object detection engine
pub struct DetectionService {
    client: Client,
    url: String,
}

impl DetectionService {
    /// Create a new detection client
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl ObjectDetector for DetectionService {
    async fn detect(&self, image: &MediaBlob, confidence: f32) -> Result<Detections> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone().unwrap_or_else(|| "image.jpg".to_string()))
            .mime_str(image.mime_or("image/jpeg"))
            .map_err(|e| Error::Vision(format!("invalid MIME type: {e}")))?;

        let form = Form::new()
            .part("image", part)
            .text("conf", confidence.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("detection request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("detection API error {status}: {body}")));
        }

        let result: DetectionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("failed to parse detection response: {e}")))?;

        Ok(result.into_detections(confidence))
    }

    fn name(&self) -> &'static str {
        "detection-service"
    }
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    width: u32,
    height: u32,
    #[serde(default)]
    detections: Vec<BoundingBox>,
}

impl DetectionResponse {
    /// Keep detector order, dropping anything the server let through below threshold
    fn into_detections(self, confidence: f32) -> Detections {
        Detections {
            image_width: self.width,
            image_height: self.height,
            boxes: self
                .detections
                .into_iter()
                .filter(|b| b.confidence >= confidence)
                .collect(),
        }
    }
}
