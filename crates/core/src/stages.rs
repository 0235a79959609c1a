//! Static per-job-kind stage registry.
//!
//! Each job kind runs a fixed, ordered set of analysis stages. Stage
//! names double as the `agent` field of progress events, so they must be
//! unique within a kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Static description of one stage: display name plus icon token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDef {
    pub name: &'static str,
    pub icon: &'static str,
}

impl StageDef {
    pub const fn new(name: &'static str, icon: &'static str) -> Self {
        Self { name, icon }
    }
}

/// Stages of a single-company research job.
pub const STOCK_STAGES: &[StageDef] = &[
    StageDef::new("Financial Analyst", "📊"),
    StageDef::new("Technical Analyst", "📈"),
    StageDef::new("News Analyst", "📰"),
    StageDef::new("Risk Analyst", "🔍"),
    StageDef::new("Report Generator", "📝"),
    StageDef::new("Strategic Analyst", "🎯"),
];

/// Stages of a sector comparison job.
pub const SECTOR_STAGES: &[StageDef] = &[
    StageDef::new("Sector Analyst", "🔍"),
    StageDef::new("Financial Analyst", "📊"),
    StageDef::new("Technical Analyst", "📈"),
    StageDef::new("Risk Analyst", "⚠️"),
    StageDef::new("Report Generator", "📝"),
    StageDef::new("Portfolio Strategist", "💼"),
];

/// Kind of research job, as sent to the submission endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[default]
    Stock,
    Sector,
}

impl JobKind {
    /// Ordered stages run for this kind.
    pub fn stages(self) -> &'static [StageDef] {
        match self {
            JobKind::Stock => STOCK_STAGES,
            JobKind::Sector => SECTOR_STAGES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Stock => "stock",
            JobKind::Sector => "sector",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(JobKind::Stock),
            "sector" => Ok(JobKind::Sector),
            other => Err(CoreError::UnknownJobKind(other.to_string())),
        }
    }
}

/// Check that a custom stage list is usable: non-empty, unique names.
pub fn validate_stages(stages: &[StageDef]) -> Result<(), CoreError> {
    if stages.is_empty() {
        return Err(CoreError::InvalidStages("at least one stage is required".into()));
    }
    for (i, stage) in stages.iter().enumerate() {
        if stages[..i].iter().any(|s| s.name == stage.name) {
            return Err(CoreError::InvalidStages(format!(
                "duplicate stage name '{}'",
                stage.name
            )));
        }
    }
    Ok(())
}
