//! Critic report types.

use serde::{Deserialize, Serialize};

/// Critic outcome for one draft.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Revise,
    Rewrite,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Approve => "approve",
            Self::Revise => "revise",
            Self::Rewrite => "rewrite",
        }
    }

    /// Lenient mapping; anything unrecognized is `None` so callers can decide from scores.
    #[must_use]
    pub fn coerce(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("approv") || lower == "pass" || lower == "accept" {
            Some(Self::Approve)
        } else if lower.starts_with("rewrite") || lower == "reject" {
            Some(Self::Rewrite)
        } else if lower.starts_with("revis") || lower == "edit" {
            Some(Self::Revise)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    /// Lenient mapping; unknown severities become `Moderate`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "minor" | "low" | "trivial" => Self::Minor,
            "major" | "high" | "severe" => Self::Major,
            "critical" | "blocker" | "fatal" => Self::Critical,
            _ => Self::Moderate,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Continuity,
    Repetition,
    Pacing,
    Hook,
    Character,
    Style,
    Other,
}

impl IssueCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Continuity => "continuity",
            Self::Repetition => "repetition",
            Self::Pacing => "pacing",
            Self::Hook => "hook",
            Self::Character => "character",
            Self::Style => "style",
            Self::Other => "other",
        }
    }

    /// Lenient mapping; unknown categories become `Other`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.contains("continu") || lower.contains("consisten") || lower.contains("logic") {
            Self::Continuity
        } else if lower.contains("repet") {
            Self::Repetition
        } else if lower.contains("pac") {
            Self::Pacing
        } else if lower.contains("hook") || lower.contains("cliff") || lower.contains("ending") {
            Self::Hook
        } else if lower.contains("charac") || lower.contains("ooc") {
            Self::Character
        } else if lower.contains("style") || lower.contains("prose") || lower.contains("voice") {
            Self::Style
        } else {
            Self::Other
        }
    }
}

/// A single critic finding, from the model or from a local check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CritiqueIssue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    /// Whether the finding came from a deterministic local scan.
    #[serde(default)]
    pub local: bool,
}

impl CritiqueIssue {
    #[must_use]
    pub fn local(category: IssueCategory, severity: Severity, description: String) -> Self {
        Self { category, severity, description, local: true }
    }

    /// Continuity findings of major or critical severity force a rewrite.
    #[must_use]
    pub fn forces_rewrite(&self) -> bool {
        self.category == IssueCategory::Continuity && self.severity >= Severity::Major
    }

    /// Critical findings of any category block approval.
    #[must_use]
    pub fn blocks_approval(&self) -> bool {
        self.severity == Severity::Critical || self.forces_rewrite()
    }
}

/// Scores on the four critic axes, each clamped to `[0, 10]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CritiqueScores {
    pub overall: f32,
    pub dopamine: f32,
    pub pacing: f32,
    pub hook: f32,
}

/// Final critic report attached to a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CritiqueReport {
    pub scores: CritiqueScores,
    pub verdict: Verdict,
    pub requires_rewrite: bool,
    pub issues: Vec<CritiqueIssue>,
    pub feedback: String,
    /// Set when the model call or its parse failed and the report was produced fail-closed.
    #[serde(default)]
    pub degraded: bool,
}

impl CritiqueReport {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approve && !self.requires_rewrite && !self.degraded
    }

    /// Fail-closed report used when critique is unavailable.
    #[must_use]
    pub fn unavailable(reason: &str) -> Self {
        Self {
            scores: CritiqueScores::default(),
            verdict: Verdict::Revise,
            requires_rewrite: false,
            issues: Vec::new(),
            feedback: format!("Critique unavailable ({reason}); tighten continuity and pacing."),
            degraded: true,
        }
    }
}

/// Clamp a score into `[0, 10]`, mapping NaN to 0.
#[must_use]
pub fn clamp_score(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 10.0) }
}
