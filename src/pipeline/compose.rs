//! Reply templates

use super::vision::MAX_DESCRIBED_OBJECTS;
use super::{Intent, Transcript, VisionMode, VisionSummary};

const APOLOGY: &str = "Xin lỗi, tôi không nghe rõ bạn nói gì.";
const NEED_CAMERA: &str = "Bạn muốn tôi nhìn, nhưng tôi chưa nhận được hình ảnh nào cả.";
const NOTHING_VISIBLE: &str = "Tôi không thấy vật thể nào rõ ràng trước mặt.";

/// Text spoken back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Never empty
    pub text: String,
}

/// Builds replies from pipeline results
///
/// Composition is pure: equal inputs give equal replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseComposer;

impl ResponseComposer {
    /// Reply for an utterance that could not be understood
    #[must_use]
    pub fn apology(&self) -> Reply {
        Reply {
            text: APOLOGY.to_string(),
        }
    }

    /// Compose the reply for one turn
    #[must_use]
    pub fn compose(
        &self,
        transcript: &Transcript,
        intent: Intent,
        image_present: bool,
        vision: Option<&VisionSummary>,
    ) -> Reply {
        if !transcript.usable {
            return self.apology();
        }

        let text = match (intent, image_present) {
            (Intent::VisionQuery, true) => {
                let narration = vision.map_or_else(|| NOTHING_VISIBLE.to_string(), Self::narrate);
                format!("Bạn vừa hỏi: '{}'. {narration}", transcript.text)
            }
            (Intent::VisionQuery, false) => NEED_CAMERA.to_string(),
            (Intent::Greeting, _) => format!(
                "Chào bạn, tôi đã nghe thấy bạn nói: '{}'. Tôi có thể giúp gì?",
                transcript.text
            ),
        };
        Reply { text }
    }

    /// Describe a vision summary in one or two sentences
    #[must_use]
    pub fn narrate(summary: &VisionSummary) -> String {
        match summary.mode {
            VisionMode::DetectionOnly => narrate_counts(summary),
            VisionMode::CaptionAndDetection => narrate_scene(summary),
        }
    }
}

/// "Tôi thấy có: 2 người, 1 xe hơi." with the first three labels in first-seen order
fn narrate_counts(summary: &VisionSummary) -> String {
    if summary.objects.is_empty() {
        return NOTHING_VISIBLE.to_string();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for object in &summary.objects {
        let label = object.label.as_str();
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts.truncate(MAX_DESCRIBED_OBJECTS);

    let clauses: Vec<String> = counts
        .iter()
        .map(|(label, n)| format!("{n} {label}"))
        .collect();
    format!("Tôi thấy có: {}.", clauses.join(", "))
}

/// Caption sentence, then the described objects with their distances
fn narrate_scene(summary: &VisionSummary) -> String {
    let caption = summary
        .caption
        .as_deref()
        .unwrap_or(super::vision::FALLBACK_CAPTION)
        .trim()
        .trim_end_matches('.');
    let mut text = format!("Khung cảnh chung là {caption}.");

    if !summary.objects.is_empty() {
        let details: Vec<String> = summary
            .objects
            .iter()
            .map(|o| format!("một {} đang {}", o.label, o.distance.phrase()))
            .collect();
        text.push_str(&format!(" Cụ thể, tôi thấy: {}.", details.join(", ")));
    }
    text
}
