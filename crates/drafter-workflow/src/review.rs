//! Technical-solution review
//!
//! Deterministic checks over the content blocks that flag drafts likely to
//! need more work before the disclosure is filed.

use crate::blocks::{BlockKind, ContentBlocks};
use crate::form::{record, FieldValue, Record};
use serde::{Deserialize, Serialize};

/// Text shorter than this, in characters, is considered too brief
pub const MIN_SOLUTION_CHARS: usize = 100;

const VAGUE_TERMS: [&str; 2] = ["等", "之类"];

/// Category of review warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// Description is too short
    Brief,
    /// Image block without uploaded image
    Image,
    /// Vague wording
    Unclear,
}

impl WarningKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Image => "image",
            Self::Unclear => "unclear",
        }
    }

    /// User-facing message
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Brief => "技术方案描述过于简略，建议补充更多技术细节",
            Self::Image => "存在未上传图片的图片区块，请检查",
            Self::Unclear => "文中存在模糊表述（如'等'、'之类'），建议明确具体内容",
        }
    }
}

/// One review finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ReviewWarning {
    fn new(kind: WarningKind) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }

    /// Form record with `type` and `message` keys
    #[must_use]
    pub fn to_record(&self) -> Record {
        record([("type", self.kind.as_str()), ("message", self.message.as_str())])
    }
}

/// Review content blocks
///
/// Warnings come in a fixed order: brief, image, unclear.
#[must_use]
pub fn review(blocks: &ContentBlocks) -> Vec<ReviewWarning> {
    let text: String = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Text)
        .map(|b| b.content.as_str())
        .collect();

    let mut warnings = Vec::new();
    if text.chars().count() < MIN_SOLUTION_CHARS {
        warnings.push(ReviewWarning::new(WarningKind::Brief));
    }
    if blocks
        .iter()
        .any(|b| b.kind == BlockKind::Image && b.image_ref.is_none())
    {
        warnings.push(ReviewWarning::new(WarningKind::Image));
    }
    if VAGUE_TERMS.iter().any(|term| text.contains(term)) {
        warnings.push(ReviewWarning::new(WarningKind::Unclear));
    }
    warnings
}

/// Review as a form value
#[must_use]
pub fn review_records(blocks: &ContentBlocks) -> FieldValue {
    FieldValue::Records(review(blocks).iter().map(ReviewWarning::to_record).collect())
}
