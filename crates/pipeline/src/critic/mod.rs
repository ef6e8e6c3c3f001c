//! Critic step: model scoring merged with local checks, failing closed.

mod checks;

use std::fmt::Write as _;
use std::sync::Arc;

use novelmill_core::constants::CONTINUITY_SCORE_CAP;
use novelmill_core::{
    CritiqueIssue, CritiqueReport, CritiqueScores, IssueCategory, Outline, Project, Severity, Verdict,
    clamp_score, parse_structured,
};
use novelmill_llm::{CompletionProvider, CompletionRequest};
use serde::Deserialize;
use serde_json::Value;

pub use checks::{LocalFacts, local_checks};

use crate::context::AssembledContext;

const CRITIC_SYSTEM: &str = "You are a demanding serial-fiction editor. You judge one chapter \
against its outline and the story state, and answer with a single JSON object.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CritiqueRecord {
    scores: ScoreRecord,
    /// Some models flatten the scores.
    overall: Value,
    #[serde(alias = "decision")]
    verdict: String,
    issues: Vec<IssueRecord>,
    #[serde(alias = "notes", alias = "suggestions")]
    feedback: Value,
    requires_rewrite: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScoreRecord {
    overall: Value,
    #[serde(alias = "payoff")]
    dopamine: Value,
    pacing: Value,
    #[serde(alias = "ending", alias = "ending_hook")]
    hook: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueRecord {
    #[serde(alias = "type")]
    category: String,
    severity: String,
    #[serde(alias = "issue", alias = "text", alias = "detail")]
    description: String,
}

fn number(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.split('/').next().and_then(|head| head.trim().parse().ok()),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Array(items) => {
            items.iter().filter_map(Value::as_str).map(str::trim).collect::<Vec<_>>().join(" ")
        },
        _ => String::new(),
    }
}

/// Model judgment after clamping and enum coercion.
#[derive(Debug)]
struct ModelCritique {
    scores: CritiqueScores,
    verdict: Option<Verdict>,
    issues: Vec<CritiqueIssue>,
    feedback: String,
    requires_rewrite: bool,
}

impl ModelCritique {
    fn from_record(record: CritiqueRecord) -> Result<Self, String> {
        let overall = number(&record.scores.overall)
            .or_else(|| number(&record.overall))
            .ok_or_else(|| "critique has no overall score".to_owned())?;
        let axis = |v: &Value| number(v).map_or(0.0, clamp_score);
        Ok(Self {
            scores: CritiqueScores {
                overall: clamp_score(overall),
                dopamine: axis(&record.scores.dopamine),
                pacing: axis(&record.scores.pacing),
                hook: axis(&record.scores.hook),
            },
            verdict: Verdict::coerce(&record.verdict),
            issues: record
                .issues
                .into_iter()
                .filter(|i| !i.description.trim().is_empty())
                .map(|i| CritiqueIssue {
                    category: IssueCategory::coerce(&i.category),
                    severity: Severity::coerce(&i.severity),
                    description: i.description.trim().to_owned(),
                    local: false,
                })
                .collect(),
            feedback: text(&record.feedback),
            requires_rewrite: matches!(record.requires_rewrite, Value::Bool(true)),
        })
    }
}

/// Merge the model judgment (or its failure) with local findings into the final report.
fn finalize(
    model: Result<ModelCritique, String>,
    local: Vec<CritiqueIssue>,
    approval_score: f32,
) -> CritiqueReport {
    let (mut report, model_verdict, model_rewrite) = match model {
        Ok(m) => (
            CritiqueReport {
                scores: m.scores,
                verdict: Verdict::Revise,
                requires_rewrite: false,
                issues: m.issues,
                feedback: m.feedback,
                degraded: false,
            },
            m.verdict,
            m.requires_rewrite,
        ),
        Err(reason) => (CritiqueReport::unavailable(&reason), None, false),
    };
    report.issues.extend(local);

    let forced = report.issues.iter().any(CritiqueIssue::forces_rewrite);
    if forced {
        report.requires_rewrite = true;
        report.scores.overall = report.scores.overall.min(CONTINUITY_SCORE_CAP);
    }
    let blocked = report.issues.iter().any(CritiqueIssue::blocks_approval);
    let model_approves = match model_verdict {
        Some(v) => v == Verdict::Approve,
        None => report.scores.overall >= approval_score,
    };

    report.verdict = if forced || model_rewrite || model_verdict == Some(Verdict::Rewrite) {
        Verdict::Rewrite
    } else if !report.degraded && model_approves && !blocked && report.scores.overall >= approval_score {
        Verdict::Approve
    } else {
        Verdict::Revise
    };
    if report.verdict == Verdict::Rewrite {
        report.requires_rewrite = true;
    }

    let mut feedback = report.feedback.clone();
    for issue in report.issues.iter().filter(|i| i.severity >= Severity::Moderate) {
        if !feedback.is_empty() {
            feedback.push('\n');
        }
        let _ = write!(feedback, "[{} {}] {}", issue.severity.as_str(), issue.category.as_str(), issue.description);
    }
    report.feedback = feedback;
    report
}

pub struct Critic {
    llm: Arc<dyn CompletionProvider>,
    approval_score: f32,
}

impl Critic {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>, approval_score: f32) -> Self {
        Self { llm, approval_score }
    }

    /// Judge `prose`. Never errors: an unavailable or unparsable model answer yields a
    /// degraded, non-approved report.
    pub async fn critique(
        &self,
        project: &Project,
        context: &AssembledContext,
        outline: &Outline,
        prose: &str,
    ) -> CritiqueReport {
        let chapter = context.chapter;
        let facts = LocalFacts::new(context, outline, project.is_terminal_arc(chapter));
        let (model, local) = tokio::join!(
            self.model_critique(project, context, outline, prose),
            async { local_checks(prose, &facts) },
        );
        if let Err(reason) = &model {
            tracing::warn!(chapter, reason = %reason, "critique unavailable, failing closed");
        }
        let report = finalize(model, local, self.approval_score);
        tracing::info!(
            chapter,
            overall = report.scores.overall,
            verdict = report.verdict.as_str(),
            issues = report.issues.len(),
            degraded = report.degraded,
            "chapter critiqued"
        );
        report
    }

    async fn model_critique(
        &self,
        project: &Project,
        context: &AssembledContext,
        outline: &Outline,
        prose: &str,
    ) -> Result<ModelCritique, String> {
        let request = CompletionRequest::new(critique_prompt(project, context, outline, prose))
            .with_system(CRITIC_SYSTEM)
            .with_temperature(0.2)
            .with_max_tokens(1500)
            .structured();
        let response = self.llm.complete(&request).await.map_err(|e| e.to_string())?;
        let record: CritiqueRecord = parse_structured(&response.text).map_err(|e| e.to_string())?;
        ModelCritique::from_record(record)
    }
}

fn critique_prompt(project: &Project, context: &AssembledContext, outline: &Outline, prose: &str) -> String {
    let mut plan = String::new();
    for (i, scene) in outline.scenes.iter().enumerate() {
        let _ = writeln!(plan, "{}. {} ({}): {} vs {}", i + 1, scene.setting, scene.speed.as_str(), scene.goal, scene.conflict);
    }
    let bridge = context
        .bridge
        .as_ref()
        .map(|b| b.unresolved_hook.as_str())
        .filter(|h| !h.trim().is_empty())
        .unwrap_or("(none)");
    let hook_rule = if project.is_terminal_arc(context.chapter) {
        "Final arc: a closing hook is optional."
    } else {
        "The chapter must end on a hook."
    };
    format!(
        r#"Critique chapter {chapter} of "{title}".

OUTLINE "{chapter_title}":
{plan}Planned hook: {hook}
Bridge the opening must resolve: {bridge}
{roster}
{hook_rule}

CHAPTER TEXT:
{prose}

Score 0-10 on each axis and list concrete issues. Continuity errors (dead characters acting,
contradicted facts, unopened places) are "continuity" issues of severity major or critical.
Return JSON:
{{
  "scores": {{"overall": 0, "dopamine": 0, "pacing": 0, "hook": 0}},
  "verdict": "approve|revise|rewrite",
  "issues": [{{"category": "continuity|repetition|pacing|hook|character|style|other",
              "severity": "minor|moderate|major|critical", "description": "..."}}],
  "feedback": "the most important fixes, in order"
}}"#,
        chapter = context.chapter,
        title = project.title,
        chapter_title = outline.title,
        hook = if outline.hook.is_empty() { "(none)" } else { outline.hook.as_str() },
        roster = context.roster.render(),
    )
}

#[cfg(test)]
mod critic_tests;
