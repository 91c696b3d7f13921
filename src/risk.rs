//! Composite AI-risk scoring, run as deep analysis after escalation.
//!
//! The score combines stylometric deviation from the student's
//! established baseline, behavioral red flags from the session, and
//! structural AI-pattern indicators over the document body. It rises
//! with each component; the exact weighting is policy, the
//! monotonicity is contract.

use crate::config::DetectorConfig;
use crate::session::WritingSession;
use crate::stylometry::{
    behavioral_flags, structural_indicators, BehavioralFlag, StructuralIndicator, StyleBaseline,
    TextMetrics,
};
use serde::{Deserialize, Serialize};

/// Weight of the baseline deviation (itself in [0, 1]).
const DEVIATION_WEIGHT: f64 = 40.0;
/// Score contribution per behavioral red flag.
const BEHAVIORAL_FLAG_WEIGHT: f64 = 12.0;
/// Score contribution per structural indicator.
const STRUCTURAL_INDICATOR_WEIGHT: f64 = 8.0;
/// Words at which content-volume confidence reaches 50%.
const CONFIDENCE_HALF_WORDS: f64 = 300.0;
/// Confidence damping applied when no baseline exists.
const NO_BASELINE_CONFIDENCE: f64 = 0.6;

/// Outcome of one deep-analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite risk score, 0-100.
    pub score: f64,
    /// Confidence percentage, 0-100.
    pub confidence: f64,
    /// Deviation from the student's baseline, 0-1; 0 when no baseline
    /// is established.
    pub stylometric_deviation: f64,
    pub behavioral_flags: Vec<BehavioralFlag>,
    pub structural_indicators: Vec<StructuralIndicator>,
    /// Words evaluated.
    pub words_evaluated: u64,
}

impl RiskAssessment {
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.score > threshold
    }
}

/// Score one document against one session's telemetry and the
/// student's baseline, if established.
pub fn assess_ai_risk(
    content: &str,
    baseline: Option<&StyleBaseline>,
    session: &WritingSession,
    config: &DetectorConfig,
) -> RiskAssessment {
    let deviation = baseline.map(|b| b.deviation(content)).unwrap_or(0.0);
    let flags = behavioral_flags(session, config);
    let indicators = structural_indicators(content);

    let score = (deviation * DEVIATION_WEIGHT
        + flags.len() as f64 * BEHAVIORAL_FLAG_WEIGHT
        + indicators.len() as f64 * STRUCTURAL_INDICATOR_WEIGHT)
        .clamp(0.0, 100.0);

    let words = TextMetrics::from_text(content).word_count as u64;
    let volume_confidence = 1.0 - 1.0 / (1.0 + words as f64 / CONFIDENCE_HALF_WORDS);
    let confidence = match baseline {
        Some(b) if b.sample_words > 0 => volume_confidence,
        _ => volume_confidence * NO_BASELINE_CONFIDENCE,
    } * 100.0;

    RiskAssessment {
        score,
        confidence,
        stylometric_deviation: deviation,
        behavioral_flags: flags,
        structural_indicators: indicators,
        words_evaluated: words,
    }
}
