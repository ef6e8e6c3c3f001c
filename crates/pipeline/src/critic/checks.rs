//! Deterministic local checks run beside the model critique.

use std::sync::LazyLock;

use novelmill_core::constants::{HOOK_SCAN_CHARS, REPETITION_CRITICAL, REPETITION_MODERATE};
use novelmill_core::text::{contains_word, paragraphs, truncate};
use novelmill_core::{CritiqueIssue, IssueCategory, Outline, Severity};
use regex::Regex;

use crate::context::AssembledContext;
use crate::hooks::has_hook_signal;

/// Tracked phrase groups; each group counts all of its variants together.
const PHRASE_GROUPS: &[(&str, &str)] = &[
    ("deep breath", r"(?i)\b(took|drew|taking|drawing|takes|draws) a (deep|long|slow|sharp) breath\b"),
    ("narrowed eyes", r"(?i)\beyes narrow(ed|ing)?\b|\bnarrowed (his|her|their) eyes\b"),
    ("cold smile", r"(?i)\b(cold|icy|faint|thin) (smile|smirk)\b"),
    ("cold snort", r"(?i)\bsnort(ed)? coldly\b|\b(cold|light) snort\b"),
    ("pounding heart", r"(?i)\bheart (pounded|pounding|raced|racing|hammered|hammering)\b"),
    ("a hint of", r"(?i)\ba (hint|trace|flash|glint|flicker) of\b"),
    ("could not help", r"(?i)\bcould(n't| not) help but\b"),
    ("stunned crowd", r"(?i)\b(jaws? dropped|eyes widened|was stunned|were stunned|gasped)\b"),
    ("courting death", r"(?i)\bcourting death\b"),
    ("silence fell", r"(?i)\b(silence fell|fell silent|the air froze)\b"),
];

#[allow(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static PHRASE_REGEXES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PHRASE_GROUPS.iter().map(|(label, pattern)| (*label, Regex::new(pattern).unwrap())).collect()
});

/// Words that mark a passage as memory rather than present action.
const FLASHBACK_SIGNALS: &[&str] = &[
    "remember",
    "remembered",
    "remembering",
    "memory",
    "memories",
    "recalled",
    "flashback",
    "years ago",
    "long ago",
    "used to",
    "once said",
    "once told",
    "dream",
    "dreamed",
    "grave",
    "tomb",
    "funeral",
    "the late",
    "spirit tablet",
    "mourned",
    "ghost",
];

/// Story state the local checks compare the prose against.
#[derive(Debug, Clone, Default)]
pub struct LocalFacts {
    /// Dead characters with the chapter their death was recorded at.
    pub dead: Vec<(String, u32)>,
    pub unexplored: Vec<String>,
    /// Scene settings the outline opens this chapter; exempt from the unexplored check.
    pub planned_settings: Vec<String>,
    pub terminal_arc: bool,
    /// Outline title when it repeats a recent chapter title.
    pub repeated_title: Option<String>,
}

impl LocalFacts {
    #[must_use]
    pub fn new(context: &AssembledContext, outline: &Outline, terminal_arc: bool) -> Self {
        Self {
            dead: context.roster.dead.iter().map(|s| (s.name.clone(), s.chapter)).collect(),
            unexplored: context.unexplored.clone(),
            planned_settings: outline.scenes.iter().map(|s| s.setting.clone()).collect(),
            terminal_arc,
            repeated_title: context
                .blacklist
                .repeats_title(&outline.title)
                .then(|| outline.title.clone()),
        }
    }
}

fn is_flashback(passage: &str) -> bool {
    FLASHBACK_SIGNALS.iter().any(|s| contains_word(passage, s))
}

fn repetition(prose: &str) -> Vec<CritiqueIssue> {
    PHRASE_REGEXES
        .iter()
        .filter_map(|(label, re)| {
            let count = re.find_iter(prose).count();
            let severity = if count >= REPETITION_CRITICAL {
                Severity::Critical
            } else if count >= REPETITION_MODERATE {
                Severity::Moderate
            } else {
                return None;
            };
            Some(CritiqueIssue::local(
                IssueCategory::Repetition,
                severity,
                format!("The \"{label}\" phrasing appears {count} times; vary or cut it."),
            ))
        })
        .collect()
}

fn dead_reappearance(prose: &str, dead: &[(String, u32)]) -> Vec<CritiqueIssue> {
    let passages = paragraphs(prose);
    dead.iter()
        .filter_map(|(name, died)| {
            let offending =
                passages.iter().find(|p| contains_word(p, name) && !is_flashback(p))?;
            Some(CritiqueIssue::local(
                IssueCategory::Continuity,
                Severity::Critical,
                format!(
                    "{name} died by chapter {died} but appears outside a flashback: \"{}\"",
                    truncate(offending, 160)
                ),
            ))
        })
        .collect()
}

fn unexplored_reference(prose: &str, facts: &LocalFacts) -> Vec<CritiqueIssue> {
    facts
        .unexplored
        .iter()
        .filter(|loc| !facts.planned_settings.iter().any(|s| contains_word(s, loc)))
        .filter(|loc| contains_word(prose, loc))
        .map(|loc| {
            CritiqueIssue::local(
                IssueCategory::Continuity,
                Severity::Major,
                format!("References {loc}, which the story has not opened yet."),
            )
        })
        .collect()
}

/// All local findings for `prose`.
#[must_use]
pub fn local_checks(prose: &str, facts: &LocalFacts) -> Vec<CritiqueIssue> {
    let mut issues = repetition(prose);
    issues.extend(dead_reappearance(prose, &facts.dead));
    issues.extend(unexplored_reference(prose, facts));
    if let Some(title) = &facts.repeated_title {
        issues.push(CritiqueIssue::local(
            IssueCategory::Repetition,
            Severity::Moderate,
            format!("The title \"{title}\" was used by a recent chapter; pick a new one."),
        ));
    }
    if !facts.terminal_arc && !has_hook_signal(prose, HOOK_SCAN_CHARS) {
        issues.push(CritiqueIssue::local(
            IssueCategory::Hook,
            Severity::Moderate,
            "The closing passage leaves no open tension; end on a concrete hook.".to_owned(),
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOOKED: &str = "\n\nThen footsteps stopped outside the door.";

    fn facts() -> LocalFacts {
        LocalFacts {
            dead: vec![("Elder Zhao".to_owned(), 12)],
            unexplored: vec!["Sunken Palace".to_owned()],
            planned_settings: vec!["Azure Peak".to_owned()],
            terminal_arc: false,
            repeated_title: None,
        }
    }

    #[test]
    fn test_repetition_thresholds() {
        let four = "He took a deep breath. ".repeat(4);
        assert!(local_checks(&format!("{four}{HOOKED}"), &facts()).is_empty());

        let five = format!("{}She drew a long breath.{HOOKED}", four);
        let issues = local_checks(&five, &facts());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Moderate);
        assert_eq!(issues[0].category, IssueCategory::Repetition);

        let eight = format!("{}{HOOKED}", "He took a deep breath. ".repeat(8));
        assert_eq!(local_checks(&eight, &facts())[0].severity, Severity::Critical);
    }

    #[test]
    fn test_dead_character_outside_flashback() {
        let prose = format!("Lin bowed.\n\nElder Zhao smiled at him from the pavilion.{HOOKED}");
        let issues = local_checks(&prose, &facts());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].forces_rewrite());
        assert!(issues[0].description.contains("died by chapter 12"));

        let memory = format!("Lin remembered how Elder Zhao smiled.{HOOKED}");
        assert!(local_checks(&memory, &facts()).is_empty());
    }

    #[test]
    fn test_unexplored_location_unless_planned() {
        let prose = format!("Rumors spoke of the Sunken Palace.{HOOKED}");
        let issues = local_checks(&prose, &facts());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Major);

        let mut planned = facts();
        planned.planned_settings.push("The Sunken Palace gates".to_owned());
        assert!(local_checks(&prose, &planned).is_empty());
    }

    #[test]
    fn test_missing_hook_outside_terminal_arc() {
        let flat = "They ate and slept well.";
        let issues = local_checks(flat, &facts());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Hook);

        let terminal = LocalFacts { terminal_arc: true, ..facts() };
        assert!(local_checks(flat, &terminal).is_empty());
    }

    #[test]
    fn test_repeated_title_is_moderate_repetition() {
        let facts = LocalFacts { repeated_title: Some("The Gate".to_owned()), ..facts() };
        let issues = local_checks(&format!("Lin bowed.{HOOKED}"), &facts);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Repetition);
        assert!(!issues[0].blocks_approval());
    }

    #[test]
    fn test_dead_characters_never_pass_unflagged() {
        // Randomized fixtures: any present-tense mention of a dead name is flagged.
        let names = ["Elder Zhao", "Mara", "Qin Feng", "Old Wu", "Su Yan"];
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let dead = names[(seed % 5) as usize];
            let alive = names[((seed >> 8) % 5) as usize];
            let died = u32::try_from(seed % 90).unwrap() + 1;
            let facts = LocalFacts {
                dead: vec![(dead.to_owned(), died)],
                terminal_arc: true,
                ..LocalFacts::default()
            };
            let prose = format!("{alive} walked in.\n\n{dead} drew a sword.");
            let issues = local_checks(&prose, &facts);
            assert!(issues.iter().any(|i| i.forces_rewrite()), "{dead} slipped through");

            let recalled = format!("{alive} walked in.\n\n{alive} remembered {dead} at the funeral.");
            let flagged = local_checks(&recalled, &facts).iter().any(|i| i.forces_rewrite());
            assert_eq!(flagged, alive == dead);
        }
    }
}
