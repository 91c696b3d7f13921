//! writepulse-core: writing-behavior analysis for instructor support.
//!
//! Ingests writing-session telemetry, runs real-time anomaly rules,
//! escalates to declaration-aware AI-risk deep analysis, and batches
//! longitudinal trend scans into intervention alerts. The core owns no
//! persistence or delivery; those arrive through the trait seams in
//! [`store`].

pub mod alerts;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod risk;
pub mod session;
pub mod store;
pub mod stylometry;
pub mod trends;

// Re-export common types
pub use crate::alerts::{
    AlertBuilder, AlertContext, AlertMetrics, AlertSeverity, AlertType, DispatchPriority,
    InterventionAlert, TrendDirection,
};
pub use crate::config::{AlertConfig, DetectorConfig, TrendConfig, WritepulseConfig};
pub use crate::detector::AnomalyDetector;
pub use crate::engine::{AnalysisEngine, Collaborators};
pub use crate::error::{AnalysisError, StoreError};
pub use crate::risk::{assess_ai_risk, RiskAssessment};
pub use crate::session::{
    ActivitySnapshot, AnomalyRecord, AnomalySeverity, AnomalyType, SessionUpdate, WritingSession,
};
pub use crate::store::{
    AiUseDeclaration, DeclaredExtent, InterventionNotification, MemoryStore, SubmissionRecord,
};
pub use crate::stylometry::{BehavioralFlag, StructuralIndicator, StyleBaseline};
pub use crate::trends::TrendAnalyzer;
