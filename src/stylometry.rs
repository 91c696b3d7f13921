//! Stylometric heuristics over document text.
//!
//! This module captures writing-style aggregates WITHOUT retaining raw
//! text: word/sentence statistics, a hashed trigram signature, and the
//! structural indicators used by AI-risk scoring. Everything here is
//! heuristic threshold scoring, not natural-language modelling.

use crate::config::DetectorConfig;
use crate::session::WritingSession;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use statrs::statistics::Statistics;
use std::collections::HashSet;

// =============================================================================
// Constants
// =============================================================================

/// Weight of mean word length in the complexity score.
const WORD_LENGTH_WEIGHT: f64 = 10.0;
/// Weight of mean sentence length in the complexity score.
const SENTENCE_LENGTH_WEIGHT: f64 = 2.0;
/// Number of hash functions for the MinHash trigram signature.
const MINHASH_FUNCTIONS: usize = 64;
/// N-gram size for the signature.
const NGRAM_SIZE: usize = 3;
/// Minimum n-grams before a signature comparison is meaningful.
const MIN_NGRAMS: u64 = 50;
/// Minimum words before structural indicators are evaluated.
const MIN_STRUCTURAL_WORDS: usize = 50;
/// Transition-phrase density (per sentence) that reads as formulaic.
const FORMULAIC_TRANSITION_RATE: f64 = 0.25;
/// Coefficient of variation under which paragraph lengths are uniform.
const UNIFORM_PARAGRAPH_CV: f64 = 0.15;
/// Coefficient of variation under which sentence lengths are flat.
const LOW_SENTENCE_VARIANCE_CV: f64 = 0.25;
/// First-person rate under which a text reads impersonal.
const IMPERSONAL_FIRST_PERSON_RATE: f64 = 0.002;

const TRANSITION_PHRASES: &[&str] = &[
    "furthermore",
    "moreover",
    "additionally",
    "consequently",
    "however",
    "in conclusion",
    "in summary",
    "firstly",
    "secondly",
    "thirdly",
    "on the other hand",
    "it is important to note",
];

const FIRST_PERSON_WORDS: &[&str] = &["i", "me", "my", "mine", "we", "our", "ours", "i'm", "i've"];

// =============================================================================
// Text metrics
// =============================================================================

/// Statistical aggregates for one piece of text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextMetrics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub mean_word_length: f64,
    pub mean_sentence_length: f64,
    pub sentence_length_std: f64,
    /// Type-token ratio over lowercased words.
    pub vocabulary_richness: f64,
    /// Punctuation characters per word.
    pub punctuation_rate: f64,
    /// First-person pronouns per word.
    pub first_person_rate: f64,
    pub paragraph_lengths: Vec<usize>,
}

impl TextMetrics {
    pub fn from_text(text: &str) -> Self {
        let words: Vec<&str> = tokenize_words(text);
        if words.is_empty() {
            return Self::default();
        }

        let mean_word_length =
            words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;

        let sentence_lengths: Vec<f64> = split_sentences(text)
            .iter()
            .map(|s| tokenize_words(s).len() as f64)
            .filter(|&n| n > 0.0)
            .collect();
        let mean_sentence_length = if sentence_lengths.is_empty() {
            words.len() as f64
        } else {
            sentence_lengths.clone().mean()
        };
        let sentence_length_std = if sentence_lengths.len() > 1 {
            sentence_lengths.clone().std_dev()
        } else {
            0.0
        };

        let distinct: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let vocabulary_richness = distinct.len() as f64 / words.len() as f64;

        let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
        let punctuation_rate = punctuation as f64 / words.len() as f64;

        let first_person = words
            .iter()
            .filter(|w| FIRST_PERSON_WORDS.contains(&w.to_lowercase().as_str()))
            .count();
        let first_person_rate = first_person as f64 / words.len() as f64;

        let paragraph_lengths: Vec<usize> = split_paragraphs(text)
            .iter()
            .map(|p| tokenize_words(p).len())
            .filter(|&n| n > 0)
            .collect();

        Self {
            word_count: words.len(),
            sentence_count: sentence_lengths.len(),
            paragraph_count: paragraph_lengths.len(),
            mean_word_length,
            mean_sentence_length,
            sentence_length_std,
            vocabulary_richness,
            punctuation_rate,
            first_person_rate,
            paragraph_lengths,
        }
    }
}

/// Simple complexity score: weighted combination of mean word length
/// and mean sentence length. The stylistic-drift rule compares this
/// between the two most recent document versions.
pub fn complexity_score(text: &str) -> f64 {
    let metrics = TextMetrics::from_text(text);
    metrics.mean_word_length * WORD_LENGTH_WEIGHT
        + metrics.mean_sentence_length * SENTENCE_LENGTH_WEIGHT
}

// =============================================================================
// Style baseline
// =============================================================================

/// A student's established authentic writing-style profile, used for
/// deviation comparison during deep analysis. Aggregates only; no raw
/// text is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleBaseline {
    pub mean_word_length: f64,
    pub mean_sentence_length: f64,
    pub vocabulary_richness: f64,
    pub punctuation_rate: f64,
    pub first_person_rate: f64,
    pub ngram_signature: NgramSignature,
    /// Words the baseline was built from; drives comparison confidence.
    pub sample_words: u64,
}

impl StyleBaseline {
    pub fn from_text(text: &str) -> Self {
        let metrics = TextMetrics::from_text(text);
        let mut signature = NgramSignature::default();
        for ngram in char_ngrams(text) {
            signature.add_ngram(&ngram);
        }

        Self {
            mean_word_length: metrics.mean_word_length,
            mean_sentence_length: metrics.mean_sentence_length,
            vocabulary_richness: metrics.vocabulary_richness,
            punctuation_rate: metrics.punctuation_rate,
            first_person_rate: metrics.first_person_rate,
            ngram_signature: signature,
            sample_words: metrics.word_count as u64,
        }
    }

    /// Fold additional writing into the baseline, weighted by volume.
    pub fn merge(&mut self, other: &StyleBaseline) {
        let total = self.sample_words + other.sample_words;
        if total == 0 {
            return;
        }
        let self_weight = self.sample_words as f64 / total as f64;
        let other_weight = other.sample_words as f64 / total as f64;

        self.mean_word_length =
            self.mean_word_length * self_weight + other.mean_word_length * other_weight;
        self.mean_sentence_length =
            self.mean_sentence_length * self_weight + other.mean_sentence_length * other_weight;
        self.vocabulary_richness =
            self.vocabulary_richness * self_weight + other.vocabulary_richness * other_weight;
        self.punctuation_rate =
            self.punctuation_rate * self_weight + other.punctuation_rate * other_weight;
        self.first_person_rate =
            self.first_person_rate * self_weight + other.first_person_rate * other_weight;
        self.ngram_signature.merge(&other.ngram_signature);
        self.sample_words = total;
    }

    /// Deviation of a text from this baseline, in [0, 1].
    ///
    /// 0 means indistinguishable; 1 means nothing in common. Weighted
    /// over the statistical aggregates and the trigram signature.
    pub fn deviation(&self, text: &str) -> f64 {
        let sample = StyleBaseline::from_text(text);

        let stat_deviation = [
            relative_distance(self.mean_word_length, sample.mean_word_length),
            relative_distance(self.mean_sentence_length, sample.mean_sentence_length),
            relative_distance(self.vocabulary_richness, sample.vocabulary_richness),
            relative_distance(self.punctuation_rate, sample.punctuation_rate),
            relative_distance(self.first_person_rate, sample.first_person_rate),
        ]
        .iter()
        .sum::<f64>()
            / 5.0;

        let ngram_deviation = 1.0 - self.ngram_signature.similarity(&sample.ngram_signature);

        (stat_deviation * 0.6 + ngram_deviation * 0.4).clamp(0.0, 1.0)
    }
}

/// Character-trigram signature using MinHash; allows similarity
/// comparison without revealing content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramSignature {
    pub minhash: Vec<u64>,
    pub ngram_count: u64,
}

impl Default for NgramSignature {
    fn default() -> Self {
        Self {
            minhash: vec![u64::MAX; MINHASH_FUNCTIONS],
            ngram_count: 0,
        }
    }
}

impl NgramSignature {
    pub fn add_ngram(&mut self, ngram: &str) {
        for i in 0..MINHASH_FUNCTIONS {
            let hash = hash_with_seed(ngram, i as u64);
            if hash < self.minhash[i] {
                self.minhash[i] = hash;
            }
        }
        self.ngram_count += 1;
    }

    pub fn merge(&mut self, other: &NgramSignature) {
        for i in 0..MINHASH_FUNCTIONS {
            self.minhash[i] = self.minhash[i].min(other.minhash[i]);
        }
        self.ngram_count += other.ngram_count;
    }

    /// Jaccard similarity estimate. Returns 0.5 (inconclusive) when
    /// either side has too few n-grams for a reliable comparison.
    pub fn similarity(&self, other: &NgramSignature) -> f64 {
        if self.ngram_count < MIN_NGRAMS || other.ngram_count < MIN_NGRAMS {
            return 0.5;
        }

        let matches = self
            .minhash
            .iter()
            .zip(other.minhash.iter())
            .filter(|(a, b)| a == b)
            .count();
        matches as f64 / MINHASH_FUNCTIONS as f64
    }
}

fn hash_with_seed(s: &str, seed: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hasher.update(seed.to_le_bytes());
    let result = hasher.finalize();
    u64::from_le_bytes(result[0..8].try_into().unwrap())
}

// =============================================================================
// Structural indicators
// =============================================================================

/// Structural "AI-pattern" heuristics over the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralIndicator {
    /// Transition-phrase density reads as formulaic scaffolding.
    FormulaicTransitions,
    /// Paragraph lengths are suspiciously uniform.
    UniformParagraphs,
    /// Sentence lengths barely vary.
    LowSentenceVariance,
    /// No personal voice: first-person pronouns essentially absent.
    ImpersonalVoice,
}

/// Evaluate the structural indicators for one text. Short texts yield
/// nothing; there is no reliable structure to score.
pub fn structural_indicators(text: &str) -> Vec<StructuralIndicator> {
    let metrics = TextMetrics::from_text(text);
    let mut indicators = Vec::new();

    if metrics.word_count < MIN_STRUCTURAL_WORDS {
        return indicators;
    }

    let lowered = text.to_lowercase();
    let transitions: usize = TRANSITION_PHRASES
        .iter()
        .map(|p| lowered.matches(p).count())
        .sum();
    if metrics.sentence_count > 0
        && transitions as f64 / metrics.sentence_count as f64 > FORMULAIC_TRANSITION_RATE
    {
        indicators.push(StructuralIndicator::FormulaicTransitions);
    }

    if metrics.paragraph_count >= 3 {
        let lengths: Vec<f64> = metrics.paragraph_lengths.iter().map(|&n| n as f64).collect();
        let mean = lengths.clone().mean();
        if mean > 0.0 {
            let cv = lengths.std_dev() / mean;
            if cv < UNIFORM_PARAGRAPH_CV {
                indicators.push(StructuralIndicator::UniformParagraphs);
            }
        }
    }

    if metrics.sentence_count >= 5 && metrics.mean_sentence_length > 0.0 {
        let cv = metrics.sentence_length_std / metrics.mean_sentence_length;
        if cv < LOW_SENTENCE_VARIANCE_CV {
            indicators.push(StructuralIndicator::LowSentenceVariance);
        }
    }

    if metrics.first_person_rate < IMPERSONAL_FIRST_PERSON_RATE {
        indicators.push(StructuralIndicator::ImpersonalVoice);
    }

    indicators
}

// =============================================================================
// Behavioral flags
// =============================================================================

/// Behavioral red flags drawn from a session's cumulative telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehavioralFlag {
    /// Session-wide typing speed above the policy threshold.
    RapidTyping,
    /// Paste volume above the policy threshold.
    HeavyPasting,
    /// Substantial output with almost no deletion; drafts rarely
    /// arrive fully formed.
    SparseRevision,
}

/// Revision ratio under which a large addition looks unrevised.
const SPARSE_REVISION_RATIO: f64 = 0.02;
/// Words added before the sparse-revision flag can apply.
const SPARSE_REVISION_MIN_WORDS: u64 = 200;

pub fn behavioral_flags(session: &WritingSession, config: &DetectorConfig) -> Vec<BehavioralFlag> {
    let mut flags = Vec::new();

    if session.duration_minutes > 0.0 {
        let wpm = session.words_added as f64 / session.duration_minutes * 60.0;
        if wpm > config.typing_speed_wpm {
            flags.push(BehavioralFlag::RapidTyping);
        }
    }

    if session.copy_paste_events > config.copy_paste_events {
        flags.push(BehavioralFlag::HeavyPasting);
    }

    if session.words_added >= SPARSE_REVISION_MIN_WORDS
        && (session.words_deleted as f64 / session.words_added as f64) < SPARSE_REVISION_RATIO
    {
        flags.push(BehavioralFlag::SparseRevision);
    }

    flags
}

// =============================================================================
// Helpers
// =============================================================================

fn tokenize_words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|w| !w.is_empty())
        .collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .flat_map(|p| p.split("\r\n\r\n"))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn char_ngrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect();
    chars
        .windows(NGRAM_SIZE)
        .map(|w| w.iter().collect())
        .collect()
}

fn relative_distance(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        0.0
    } else {
        ((a - b).abs() / (a + b + 0.001)).clamp(0.0, 1.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WritingSession;
    use chrono::Utc;

    const PERSONAL_TEXT: &str = "I went to the lake last summer. My brother dared me to jump \
        off the old dock, and I did! The water was so cold I yelled. We laughed about it for \
        the rest of the trip, and I still think about that afternoon when things get stressful. \
        Honestly, it was one of the best days I can remember.";

    const FORMULAIC_TEXT: &str = "Furthermore, the economy benefits from trade. Moreover, \
        trade increases specialization among nations. Additionally, consumers gain access to \
        cheaper goods overall. Consequently, living standards rise across participating \
        countries. In conclusion, trade liberalization provides substantial aggregate benefits. \
        Furthermore, these benefits compound over extended time horizons significantly.";

    #[test]
    fn test_complexity_score_tracks_word_and_sentence_length() {
        let simple = "The cat sat. The dog ran. It was fun.";
        let dense = "Notwithstanding considerable epistemological complications, \
            contemporary historiographical methodologies increasingly emphasize \
            interdisciplinary triangulation across heterogeneous documentary corpora.";

        assert!(complexity_score(dense) > complexity_score(simple));
    }

    #[test]
    fn test_complexity_score_empty_text() {
        assert_eq!(complexity_score(""), 0.0);
    }

    #[test]
    fn test_text_metrics_counts() {
        let metrics = TextMetrics::from_text("Hello there. I am here!");
        assert_eq!(metrics.word_count, 5);
        assert_eq!(metrics.sentence_count, 2);
        assert!(metrics.first_person_rate > 0.0);
    }

    #[test]
    fn test_baseline_deviation_lower_for_same_author() {
        let baseline = StyleBaseline::from_text(PERSONAL_TEXT);

        let same_style = "I tried skating on that lake in winter too. My friend told me the \
            ice was thick enough, and I believed him. We fell twice but kept going until dark, \
            and I loved every minute of it.";

        let own = baseline.deviation(same_style);
        let foreign = baseline.deviation(FORMULAIC_TEXT);
        assert!(own < foreign, "own={own} foreign={foreign}");
    }

    #[test]
    fn test_baseline_merge_weights_by_volume() {
        let mut a = StyleBaseline::from_text(PERSONAL_TEXT);
        let words_before = a.sample_words;
        let b = StyleBaseline::from_text(FORMULAIC_TEXT);
        a.merge(&b);
        assert_eq!(a.sample_words, words_before + b.sample_words);
    }

    #[test]
    fn test_structural_indicators_on_formulaic_text() {
        let indicators = structural_indicators(FORMULAIC_TEXT);
        assert!(indicators.contains(&StructuralIndicator::FormulaicTransitions));
        assert!(indicators.contains(&StructuralIndicator::ImpersonalVoice));
    }

    #[test]
    fn test_structural_indicators_absent_on_personal_text() {
        let indicators = structural_indicators(PERSONAL_TEXT);
        assert!(!indicators.contains(&StructuralIndicator::FormulaicTransitions));
        assert!(!indicators.contains(&StructuralIndicator::ImpersonalVoice));
    }

    #[test]
    fn test_structural_indicators_skip_short_text() {
        assert!(structural_indicators("Too short to judge.").is_empty());
    }

    #[test]
    fn test_behavioral_flags() {
        let config = DetectorConfig::default();
        let mut session = WritingSession::new("s1", "u1", "d1", Utc::now());
        session.words_added = 600;
        session.words_deleted = 2;
        session.duration_minutes = 2.0;
        session.copy_paste_events = 9;

        let flags = behavioral_flags(&session, &config);
        assert!(flags.contains(&BehavioralFlag::RapidTyping));
        assert!(flags.contains(&BehavioralFlag::HeavyPasting));
        assert!(flags.contains(&BehavioralFlag::SparseRevision));
    }

    #[test]
    fn test_behavioral_flags_empty_for_ordinary_session() {
        let config = DetectorConfig::default();
        let mut session = WritingSession::new("s1", "u1", "d1", Utc::now());
        session.words_added = 300;
        session.words_deleted = 60;
        session.duration_minutes = 45.0;
        session.copy_paste_events = 1;

        assert!(behavioral_flags(&session, &config).is_empty());
    }

    #[test]
    fn test_ngram_signature_similarity_needs_volume() {
        let a = NgramSignature::default();
        let b = NgramSignature::default();
        assert_eq!(a.similarity(&b), 0.5);
    }
}
