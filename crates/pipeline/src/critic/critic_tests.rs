use novelmill_core::{LifeStatus, Scene};
use novelmill_llm::{ScriptedProvider, ScriptedReply};

use super::*;
use crate::test_support::{context, critique_json, project, prose, state};

fn outline() -> Outline {
    Outline {
        title: "Ash".to_owned(),
        scenes: vec![Scene { setting: "Azure Peak".to_owned(), goal: "climb".to_owned(), ..Scene::default() }],
        hook: "Footsteps at the door.".to_owned(),
        ..Outline::default()
    }
}

fn hooked_prose() -> String {
    format!("{}\n\nThen footsteps stopped outside the door.", prose(300))
}

async fn run(reply: ScriptedReply, ctx: &AssembledContext, body: &str) -> CritiqueReport {
    let llm = Arc::new(ScriptedProvider::new().on_sequence("Critique chapter", vec![reply]));
    Critic::new(llm, 7.0).critique(&project(), ctx, &outline(), body).await
}

#[tokio::test]
async fn test_approves_clean_high_scoring_draft() {
    let report = run(ScriptedReply::text(critique_json(8.5, "approve")), &context(9), &hooked_prose()).await;
    assert!(report.is_approved());
    assert!((report.scores.overall - 8.5).abs() < f32::EPSILON);
    assert!(report.feedback.starts_with("Sharpen the duel."));
}

#[tokio::test]
async fn test_continuity_findings_always_force_rewrite_and_cap_score() {
    for severity in ["major", "critical"] {
        for raw in [0.0_f32, 5.0, 9.5, 10.0, 14.0] {
            let reply = serde_json::json!({
                "scores": { "overall": raw, "dopamine": 9, "pacing": 9, "hook": 9 },
                "verdict": "approve",
                "issues": [{ "category": "Continuity", "severity": severity, "description": "Mara is in two places" }],
                "feedback": ""
            });
            let report = run(ScriptedReply::text(reply.to_string()), &context(9), &hooked_prose()).await;
            assert!(report.requires_rewrite, "{severity} at {raw}");
            assert!(report.scores.overall <= CONTINUITY_SCORE_CAP, "{severity} at {raw}");
            assert_eq!(report.verdict, Verdict::Rewrite);
            assert!(!report.is_approved());
        }
    }
}

#[tokio::test]
async fn test_fails_closed_on_error_or_garbage() {
    let replies = [
        ScriptedReply::status(500),
        ScriptedReply::text("What a great chapter!"),
        ScriptedReply::text(r#"{"verdict": "approve", "feedback": "no scores given"}"#),
    ];
    for reply in replies {
        let report = run(reply, &context(9), &hooked_prose()).await;
        assert!(report.degraded);
        assert_eq!(report.verdict, Verdict::Revise);
        assert!(report.scores.overall.abs() < f32::EPSILON);
        assert!(!report.is_approved());
    }
}

#[tokio::test]
async fn test_threshold_and_verdict_both_required() {
    let low = run(ScriptedReply::text(critique_json(6.5, "approve")), &context(9), &hooked_prose()).await;
    assert_eq!(low.verdict, Verdict::Revise);

    let no_verdict = run(ScriptedReply::text(critique_json(8.0, "")), &context(9), &hooked_prose()).await;
    assert_eq!(no_verdict.verdict, Verdict::Approve);

    let revise = run(ScriptedReply::text(critique_json(9.0, "revise")), &context(9), &hooked_prose()).await;
    assert_eq!(revise.verdict, Verdict::Revise);
    assert!(!revise.requires_rewrite);

    let rewrite = run(ScriptedReply::text(critique_json(9.0, "rewrite")), &context(9), &hooked_prose()).await;
    assert_eq!(rewrite.verdict, Verdict::Rewrite);
}

#[tokio::test]
async fn test_critical_local_repetition_blocks_approval() {
    let body = format!("{}{}", "He took a deep breath. ".repeat(9), hooked_prose());
    let report = run(ScriptedReply::text(critique_json(9.0, "approve")), &context(9), &body).await;
    assert_eq!(report.verdict, Verdict::Revise);
    assert!(report.issues.iter().any(|i| i.local && i.severity == Severity::Critical));
    assert!(report.feedback.contains("[critical repetition]"));
}

#[tokio::test]
async fn test_dead_character_in_roster_forces_rewrite() {
    let mut ctx = context(9);
    ctx.roster.dead.push(state("Elder Zhao", 4, LifeStatus::Dead));
    let body = format!("Elder Zhao poured the tea.\n\n{}", hooked_prose());
    let report = run(ScriptedReply::text(critique_json(9.5, "approve")), &ctx, &body).await;
    assert_eq!(report.verdict, Verdict::Rewrite);
    assert!(report.scores.overall <= CONTINUITY_SCORE_CAP);

    let prompt_llm = Arc::new(ScriptedProvider::new().with_fallback(ScriptedReply::text(critique_json(8.0, "approve"))));
    Critic::new(prompt_llm.clone(), 7.0).critique(&project(), &ctx, &outline(), &body).await;
    assert!(prompt_llm.calls()[0].prompt.contains("FORBIDDEN, ALREADY DEAD: Elder Zhao"));
    assert!(prompt_llm.calls()[0].prompt.contains("Elder Zhao poured the tea."));
}
