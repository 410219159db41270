//! Scene analysis: captioning, detection and distance estimation

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{StageOutcome, bounded};
use crate::engines::{BoundingBox, Captioner, Detections, MediaBlob};
use crate::registry::ModelRegistry;
use crate::{Config, Result};

/// Caption substituted when captioning or its translation fails
pub const FALLBACK_CAPTION: &str = "một khung cảnh mà tôi chưa mô tả được";

/// Most object clauses a reply narrates
pub(super) const MAX_DESCRIBED_OBJECTS: usize = 3;

/// How the vision stage analyzes an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisionMode {
    /// Object detection only, narrated as counts per label
    DetectionOnly,
    /// Scene caption plus the first few detections with distances
    CaptionAndDetection,
}

impl VisionMode {
    /// Stable identifier used in config and API responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectionOnly => "detection-only",
            Self::CaptionAndDetection => "caption-and-detection",
        }
    }
}

impl fmt::Display for VisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detection-only" | "detection" | "yolo" => Ok(Self::DetectionOnly),
            "caption-and-detection" | "caption" | "multimodal" => Ok(Self::CaptionAndDetection),
            other => Err(format!("unknown vision mode: {other}")),
        }
    }
}

/// Rough distance estimated from how much of the frame a box fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBucket {
    VeryClose,
    Close,
    Mid,
    Far,
}

impl DistanceBucket {
    /// Bucket a box-area / image-area ratio
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.5 {
            Self::VeryClose
        } else if ratio > 0.2 {
            Self::Close
        } else if ratio > 0.05 {
            Self::Mid
        } else {
            Self::Far
        }
    }

    /// Bucket a box relative to its image
    ///
    /// A degenerate image size counts as far away.
    #[must_use]
    pub fn for_box(bbox: &BoundingBox, image_area: f64) -> Self {
        if image_area <= 0.0 {
            return Self::Far;
        }
        Self::from_ratio(bbox.area() / image_area)
    }

    /// Spoken description
    #[must_use]
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::VeryClose => "rất gần (ngay trước mặt)",
            Self::Close => "gần (khoảng 1-2 mét)",
            Self::Mid => "cách khoảng 3-5 mét",
            Self::Far => "ở phía xa",
        }
    }
}

/// Detector classes with a Vietnamese name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownLabel {
    Person,
    Car,
    Motorcycle,
    Bicycle,
    Bus,
    Truck,
    Dog,
    Cat,
    Chair,
    Bottle,
    Cup,
    CellPhone,
    Book,
    Tv,
    TrafficLight,
}

impl KnownLabel {
    /// Look up a detector class name
    #[must_use]
    pub fn from_class(class: &str) -> Option<Self> {
        let known = match class {
            "person" => Self::Person,
            "car" => Self::Car,
            "motorcycle" => Self::Motorcycle,
            "bicycle" => Self::Bicycle,
            "bus" => Self::Bus,
            "truck" => Self::Truck,
            "dog" => Self::Dog,
            "cat" => Self::Cat,
            "chair" => Self::Chair,
            "bottle" => Self::Bottle,
            "cup" => Self::Cup,
            "cell phone" => Self::CellPhone,
            "book" => Self::Book,
            "tv" => Self::Tv,
            "traffic light" => Self::TrafficLight,
            _ => return None,
        };
        Some(known)
    }

    /// Vietnamese name
    #[must_use]
    pub const fn vietnamese(self) -> &'static str {
        match self {
            Self::Person => "người",
            Self::Car => "xe hơi",
            Self::Motorcycle => "xe máy",
            Self::Bicycle => "xe đạp",
            Self::Bus => "xe buýt",
            Self::Truck => "xe tải",
            Self::Dog => "chó",
            Self::Cat => "mèo",
            Self::Chair => "cái ghế",
            Self::Bottle => "cái chai",
            Self::Cup => "cái cốc",
            Self::CellPhone => "điện thoại",
            Self::Book => "quyển sách",
            Self::Tv => "ti vi",
            Self::TrafficLight => "đèn giao thông",
        }
    }
}

/// A detector label, translated when the table knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Translated(KnownLabel),
    /// Unknown class, spoken as the detector emitted it
    Untranslated(String),
}

impl Label {
    /// Translate a detector class name
    #[must_use]
    pub fn translate(class: &str) -> Self {
        KnownLabel::from_class(class)
            .map_or_else(|| Self::Untranslated(class.to_string()), Self::Translated)
    }

    /// Spoken name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Translated(known) => known.vietnamese(),
            Self::Untranslated(class) => class,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object in the scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedObject {
    pub label: Label,
    pub distance: DistanceBucket,
}

/// Everything the vision stage learned about one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionSummary {
    pub mode: VisionMode,
    /// Scene caption in the reply language (captioning mode only)
    pub caption: Option<String>,
    /// Objects in detector order
    pub objects: Vec<DetectedObject>,
}

impl VisionSummary {
    /// Summary used when the engines produced nothing
    #[must_use]
    pub fn placeholder(mode: VisionMode) -> Self {
        let caption = match mode {
            VisionMode::DetectionOnly => None,
            VisionMode::CaptionAndDetection => Some(FALLBACK_CAPTION.to_string()),
        };
        Self {
            mode,
            caption,
            objects: Vec::new(),
        }
    }

    fn from_detections(mode: VisionMode, caption: Option<String>, detections: &Detections) -> Self {
        let image_area = detections.image_area();
        let limit = match mode {
            VisionMode::DetectionOnly => usize::MAX,
            VisionMode::CaptionAndDetection => MAX_DESCRIBED_OBJECTS,
        };
        let objects = detections
            .boxes
            .iter()
            .take(limit)
            .map(|bbox| DetectedObject {
                label: Label::translate(&bbox.label),
                distance: DistanceBucket::for_box(bbox, image_area),
            })
            .collect();
        Self {
            mode,
            caption,
            objects,
        }
    }
}

/// Runs the configured vision engines over an image
pub struct VisionStage {
    registry: Arc<ModelRegistry>,
    mode: VisionMode,
    confidence: f32,
    target_language: String,
    timeout: Duration,
}

impl VisionStage {
    /// Create a stage with explicit settings
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        mode: VisionMode,
        confidence: f32,
        target_language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            mode,
            confidence,
            target_language: target_language.into(),
            timeout,
        }
    }

    /// Create a stage from the loaded configuration
    #[must_use]
    pub fn from_config(registry: Arc<ModelRegistry>, config: &Config) -> Self {
        Self::new(
            registry,
            config.vision.mode,
            config.vision.confidence,
            config.translation.target_language.clone(),
            config.stage_timeout,
        )
    }

    /// The configured analysis mode
    #[must_use]
    pub const fn mode(&self) -> VisionMode {
        self.mode
    }

    /// Analyze one image
    ///
    /// Engine failures and timeouts degrade to the placeholder caption and an
    /// empty object list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`](crate::Error::EngineConstruction)
    /// if a required vision engine cannot be built
    pub async fn analyze(&self, image: &MediaBlob) -> Result<StageOutcome<VisionSummary>> {
        let detector = self.registry.object_detector().await?;
        let detect = bounded(
            self.timeout,
            "object detection",
            detector.detect(image, self.confidence),
        );

        let mut causes = Vec::new();
        let (caption, detections) = match self.mode {
            VisionMode::DetectionOnly => (None, detect.await),
            VisionMode::CaptionAndDetection => {
                let captioner = self.registry.captioner().await?;
                let (caption, detections) =
                    tokio::join!(self.describe(captioner.as_ref(), image), detect);
                if let StageOutcome::Degraded { cause, .. } = &caption {
                    causes.push(cause.clone());
                }
                (Some(caption.into_value()), detections)
            }
        };

        let detections = detections.unwrap_or_else(|e| {
            tracing::warn!(engine = detector.name(), error = %e, "object detection failed");
            causes.push(e.to_string());
            Detections::default()
        });

        let summary = VisionSummary::from_detections(self.mode, caption, &detections);
        tracing::info!(
            mode = %self.mode,
            detected = detections.boxes.len(),
            described = summary.objects.len(),
            "image analyzed"
        );

        Ok(if causes.is_empty() {
            StageOutcome::Completed(summary)
        } else {
            StageOutcome::degraded(summary, causes.join("; "))
        })
    }

    /// Caption the image and translate the caption
    async fn describe(&self, captioner: &dyn Captioner, image: &MediaBlob) -> StageOutcome<String> {
        let english = match bounded(self.timeout, "captioning", captioner.caption(image)).await {
            Ok(english) => english,
            Err(e) => {
                tracing::warn!(engine = captioner.name(), error = %e, "captioning failed");
                return StageOutcome::degraded(FALLBACK_CAPTION.to_string(), e);
            }
        };

        let translator = match self.registry.translator().await {
            Ok(translator) => translator,
            Err(e) => {
                tracing::warn!(error = %e, "translator unavailable");
                return StageOutcome::degraded(FALLBACK_CAPTION.to_string(), e);
            }
        };

        match bounded(
            self.timeout,
            "translation",
            translator.translate(&english, &self.target_language),
        )
        .await
        {
            Ok(translated) => {
                tracing::debug!(caption = %english, translated = %translated, "caption translated");
                StageOutcome::Completed(translated)
            }
            Err(e) => {
                tracing::warn!(engine = translator.name(), error = %e, "caption translation failed");
                StageOutcome::degraded(FALLBACK_CAPTION.to_string(), e)
            }
        }
    }
}
