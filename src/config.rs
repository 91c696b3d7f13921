//! Policy configuration for the analysis pipeline.
//!
//! Every heuristic threshold used by the detector, the trend analyzer
//! and the alert builder lives here rather than as a literal, so the
//! policy can be tuned and tested without code changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritepulseConfig {
    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub trends: TrendConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Real-time anomaly detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// A single bulk insertion above this many characters is suspicious
    /// (exclusive boundary).
    #[serde(default = "default_bulk_addition_chars")]
    pub bulk_addition_chars: u64,

    /// Words-per-minute above which typing speed is flagged.
    /// Informational only; fast typists exist.
    #[serde(default = "default_typing_speed_wpm")]
    pub typing_speed_wpm: f64,

    /// Copy-paste events per update above which paste frequency is flagged.
    #[serde(default = "default_copy_paste_events")]
    pub copy_paste_events: u64,

    /// Complexity-score delta that marks a medium style change.
    #[serde(default = "default_style_delta_medium")]
    pub style_delta_medium: f64,

    /// Complexity-score delta that escalates a style change to high.
    #[serde(default = "default_style_delta_high")]
    pub style_delta_high: f64,

    /// Minimum seconds between style checks for one session.
    #[serde(default = "default_style_check_interval_secs")]
    pub style_check_interval_secs: u64,

    /// Composite risk score above which deep analysis produces an
    /// educational intervention.
    #[serde(default = "default_risk_intervention_threshold")]
    pub risk_intervention_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bulk_addition_chars: default_bulk_addition_chars(),
            typing_speed_wpm: default_typing_speed_wpm(),
            copy_paste_events: default_copy_paste_events(),
            style_delta_medium: default_style_delta_medium(),
            style_delta_high: default_style_delta_high(),
            style_check_interval_secs: default_style_check_interval_secs(),
            risk_intervention_threshold: default_risk_intervention_threshold(),
        }
    }
}

/// Longitudinal trend analyzer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Default historical window in days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Fractional word-count decline vs the prior window that, together
    /// with the absolute floor below, marks a productivity decline.
    #[serde(default = "default_decline_fraction")]
    pub decline_fraction: f64,

    /// Absolute word floor for the decline rule; both conditions must hold.
    #[serde(default = "default_low_output_words")]
    pub low_output_words: u64,

    /// Total minutes above which the effort/output mismatch rule applies.
    #[serde(default = "default_effort_minutes_floor")]
    pub effort_minutes_floor: f64,

    /// Average words per session below which effort is mismatched to output.
    #[serde(default = "default_effort_words_per_session")]
    pub effort_words_per_session: f64,

    /// A submission first edited within this many hours of its deadline
    /// counts as last-minute.
    #[serde(default = "default_last_minute_hours")]
    pub last_minute_hours: i64,

    /// Fraction of last-minute submissions that marks a procrastination
    /// pattern (requires `min_submissions`).
    #[serde(default = "default_last_minute_fraction")]
    pub last_minute_fraction: f64,

    /// Minimum submissions before the procrastination rule applies.
    #[serde(default = "default_min_submissions")]
    pub min_submissions: usize,

    /// Contribution share under this multiple of the equal-split
    /// expectation flags under-participation.
    #[serde(default = "default_under_participation_ratio")]
    pub under_participation_ratio: f64,

    /// Contribution share over this multiple of the equal-split
    /// expectation flags over-contribution.
    #[serde(default = "default_over_participation_ratio")]
    pub over_participation_ratio: f64,

    /// Deleted/added word ratio above which the quality-concern rule fires.
    #[serde(default = "default_deletion_ratio")]
    pub deletion_ratio: f64,

    /// Minimum deleted words before the quality-concern rule applies.
    #[serde(default = "default_deletion_volume_words")]
    pub deletion_volume_words: u64,

    /// Look-ahead window in days for the time-management crisis rule.
    #[serde(default = "default_crisis_due_within_days")]
    pub crisis_due_within_days: i64,

    /// Words-written floor under which an imminent submission counts
    /// toward a crisis.
    #[serde(default = "default_crisis_words_floor")]
    pub crisis_words_floor: u64,

    /// Minimum imminent low-progress submissions for a crisis.
    #[serde(default = "default_crisis_min_submissions")]
    pub crisis_min_submissions: usize,

    /// Instructor response window for a crisis alert, in hours.
    #[serde(default = "default_crisis_response_hours")]
    pub crisis_response_hours: i64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            decline_fraction: default_decline_fraction(),
            low_output_words: default_low_output_words(),
            effort_minutes_floor: default_effort_minutes_floor(),
            effort_words_per_session: default_effort_words_per_session(),
            last_minute_hours: default_last_minute_hours(),
            last_minute_fraction: default_last_minute_fraction(),
            min_submissions: default_min_submissions(),
            under_participation_ratio: default_under_participation_ratio(),
            over_participation_ratio: default_over_participation_ratio(),
            deletion_ratio: default_deletion_ratio(),
            deletion_volume_words: default_deletion_volume_words(),
            crisis_due_within_days: default_crisis_due_within_days(),
            crisis_words_floor: default_crisis_words_floor(),
            crisis_min_submissions: default_crisis_min_submissions(),
            crisis_response_hours: default_crisis_response_hours(),
        }
    }
}

/// Alert builder response-deadline policy, per severity, in hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_critical_response_hours")]
    pub critical_response_hours: i64,

    #[serde(default = "default_warning_response_hours")]
    pub warning_response_hours: i64,

    #[serde(default = "default_info_response_hours")]
    pub info_response_hours: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            critical_response_hours: default_critical_response_hours(),
            warning_response_hours: default_warning_response_hours(),
            info_response_hours: default_info_response_hours(),
        }
    }
}

// Defaults
fn default_bulk_addition_chars() -> u64 {
    500
}
fn default_typing_speed_wpm() -> f64 {
    120.0
}
fn default_copy_paste_events() -> u64 {
    5
}
fn default_style_delta_medium() -> f64 {
    30.0
}
fn default_style_delta_high() -> f64 {
    50.0
}
fn default_style_check_interval_secs() -> u64 {
    300
}
fn default_risk_intervention_threshold() -> f64 {
    50.0
}
fn default_window_days() -> i64 {
    7
}
fn default_decline_fraction() -> f64 {
    0.40
}
fn default_low_output_words() -> u64 {
    200
}
fn default_effort_minutes_floor() -> f64 {
    120.0
}
fn default_effort_words_per_session() -> f64 {
    20.0
}
fn default_last_minute_hours() -> i64 {
    24
}
fn default_last_minute_fraction() -> f64 {
    0.60
}
fn default_min_submissions() -> usize {
    2
}
fn default_under_participation_ratio() -> f64 {
    0.5
}
fn default_over_participation_ratio() -> f64 {
    1.8
}
fn default_deletion_ratio() -> f64 {
    0.8
}
fn default_deletion_volume_words() -> u64 {
    100
}
fn default_crisis_due_within_days() -> i64 {
    3
}
fn default_crisis_words_floor() -> u64 {
    100
}
fn default_crisis_min_submissions() -> usize {
    2
}
fn default_crisis_response_hours() -> i64 {
    24
}
fn default_critical_response_hours() -> i64 {
    24
}
fn default_warning_response_hours() -> i64 {
    72
}
fn default_info_response_hours() -> i64 {
    168
}

impl WritepulseConfig {
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("writepulse.json");

        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            let config: WritepulseConfig = serde_json::from_str(&raw)?;
            return Ok(config);
        }

        let config = Self::default();
        config.persist(data_dir)?;
        Ok(config)
    }

    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join("writepulse.json");
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(config_path, raw)?;
        Ok(())
    }
}
