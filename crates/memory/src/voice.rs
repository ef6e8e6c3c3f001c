//! Voice Fingerprint Tracker: rolling style metrics and drift warnings.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use novelmill_core::constants::{
    VOICE_CHECK_INTERVAL, VOICE_DIALOGUE_DRIFT, VOICE_SAMPLE_SIZE, VOICE_SENTENCE_DRIFT,
};
use novelmill_core::text::{contains_phrase, contains_word, sentences, word_count};
use novelmill_core::{DriftDimension, DriftWarning, Register, StyleMetrics, VoiceFingerprint};
use novelmill_storage::NarrativeStore;

use crate::error::TrackerError;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

const MONOLOGUE_MARKERS: &[&str] =
    &["thought", "wondered", "realized", "asked himself", "asked herself", "told himself", "told herself"];
const EMOTIONAL: &[&str] = &["heart", "tears", "fear", "anger", "grief", "joy", "trembled", "ache", "shame", "longing"];
const DESCRIPTIVE: &[&str] = &["light", "shadow", "mist", "scent", "silent", "glow", "colour", "color", "stone", "wind"];
const ACTION: &[&str] = &["struck", "slashed", "dodged", "leapt", "punched", "blade", "lunged", "charged", "kicked", "blocked"];
const CLICHES: &[&str] = &[
    "a chill ran down",
    "let out a breath",
    "couldn't help but",
    "eyes widened",
    "in the blink of an eye",
    "little did he know",
    "little did she know",
    "time seemed to stop",
    "sent shivers down",
    "a smirk played",
];
const STOPWORDS: &[&str] = &["the", "a", "an", "and", "of", "to", "in", "he", "she", "it", "was", "his", "her", "that", "on", "at"];
const SIGNATURE_LIMIT: usize = 10;

fn dialogue_chars(text: &str) -> (usize, usize) {
    let mut inside = false;
    let mut quoted = 0usize;
    let mut total = 0usize;
    for ch in text.chars() {
        match ch {
            '"' => inside = !inside,
            '\u{201C}' => inside = true,
            '\u{201D}' => inside = false,
            '\n' => inside = false,
            c if c.is_whitespace() => {},
            _ => {
                total += 1;
                if inside {
                    quoted += 1;
                }
            },
        }
    }
    (quoted, total)
}

fn lexicon_hits(text: &str, lexicon: &[&str]) -> usize {
    lexicon.iter().filter(|w| contains_word(text, w)).count()
}

fn register_of(text: &str) -> Register {
    let scores = [
        (Register::Emotional, lexicon_hits(text, EMOTIONAL)),
        (Register::Descriptive, lexicon_hits(text, DESCRIPTIVE)),
        (Register::Action, lexicon_hits(text, ACTION)),
    ];
    let Some(&(top, best)) = scores.iter().max_by_key(|(_, n)| *n) else {
        return Register::Balanced;
    };
    let runner_up = scores.iter().filter(|(r, _)| *r != top).map(|(_, n)| *n).max().unwrap_or(0);
    if best >= 3 && best * 2 >= runner_up * 3 { top } else { Register::Balanced }
}

/// Style metrics of a prose sample.
#[must_use]
pub fn measure(samples: &[&str]) -> StyleMetrics {
    let mut words = 0usize;
    let mut sentence_count = 0usize;
    let mut monologue = 0usize;
    let mut quoted = 0usize;
    let mut total = 0usize;
    for text in samples {
        let parts = sentences(text);
        sentence_count += parts.len();
        words += parts.iter().map(|s| word_count(s)).sum::<usize>();
        monologue += parts.iter().filter(|s| MONOLOGUE_MARKERS.iter().any(|m| contains_word(s, m))).count();
        let (q, t) = dialogue_chars(text);
        quoted += q;
        total += t;
    }
    let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f32 / d as f32 };
    StyleMetrics {
        avg_sentence_words: ratio(words, sentence_count),
        dialogue_ratio: ratio(quoted, total),
        monologue_ratio: ratio(monologue, sentence_count),
        register: register_of(&samples.join("\n")),
    }
}

/// Drift of `current` against `baseline`, one warning per drifting dimension.
#[must_use]
pub fn detect_drift(baseline: &StyleMetrics, current: &StyleMetrics, chapter: u32) -> Vec<DriftWarning> {
    let mut warnings = Vec::new();
    let dialogue_shift = current.dialogue_ratio - baseline.dialogue_ratio;
    if dialogue_shift.abs() > VOICE_DIALOGUE_DRIFT {
        warnings.push(DriftWarning {
            dimension: DriftDimension::DialogueRatio,
            detected_chapter: chapter,
            message: format!(
                "dialogue share moved from {:.0}% to {:.0}%; bring it back toward {:.0}%",
                baseline.dialogue_ratio * 100.0,
                current.dialogue_ratio * 100.0,
                baseline.dialogue_ratio * 100.0
            ),
        });
    }
    if baseline.avg_sentence_words > 0.0 {
        let relative = (current.avg_sentence_words - baseline.avg_sentence_words) / baseline.avg_sentence_words;
        if relative.abs() > VOICE_SENTENCE_DRIFT {
            warnings.push(DriftWarning {
                dimension: DriftDimension::SentenceLength,
                detected_chapter: chapter,
                message: format!(
                    "sentences average {:.1} words against a baseline of {:.1}; write {} sentences",
                    current.avg_sentence_words,
                    baseline.avg_sentence_words,
                    if relative > 0.0 { "shorter" } else { "longer" }
                ),
            });
        }
    }
    if current.register != baseline.register {
        warnings.push(DriftWarning {
            dimension: DriftDimension::Register,
            detected_chapter: chapter,
            message: format!(
                "register shifted from {} to {}",
                baseline.register.as_str(),
                current.register.as_str()
            ),
        });
    }
    warnings
}

fn trigrams(text: &str) -> HashSet<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words
        .windows(3)
        .filter(|w| w.iter().filter(|t| STOPWORDS.contains(&t.as_str())).count() < 2)
        .map(|w| w.join(" "))
        .collect()
}

/// Three-word phrases recurring across at least two sampled chapters.
#[must_use]
pub fn signature_phrases(samples: &[&str]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for text in samples {
        for gram in trigrams(text) {
            *counts.entry(gram).or_default() += 1;
        }
    }
    let mut recurring: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    recurring.into_iter().take(SIGNATURE_LIMIT).map(|(g, _)| g).collect()
}

fn cliches_in(samples: &[&str]) -> Vec<String> {
    CLICHES
        .iter()
        .filter(|c| samples.iter().any(|s| contains_phrase(s, c)))
        .map(|c| (*c).to_owned())
        .collect()
}

pub struct VoiceTracker {
    store: Arc<dyn NarrativeStore>,
}

impl VoiceTracker {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MemoryTracker for VoiceTracker {
    fn name(&self) -> &'static str {
        "voice"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let existing = self.store.get_voice_fingerprint(&chapter.project_id).await?;
        if existing.is_some() && chapter.number % VOICE_CHECK_INTERVAL != 0 {
            return Ok(());
        }
        let earlier = self
            .store
            .recent_chapters(&chapter.project_id, chapter.number, VOICE_SAMPLE_SIZE - 1)
            .await?;
        let mut samples: Vec<&str> = earlier.iter().map(|c| c.body.as_str()).collect();
        samples.push(&chapter.body);
        let mut sampled: Vec<u32> = earlier.iter().map(|c| c.number).collect();
        sampled.push(chapter.number);

        let current = measure(&samples);
        let mut fingerprint = existing.unwrap_or_else(|| VoiceFingerprint {
            project_id: chapter.project_id.clone(),
            baseline: current,
            ..VoiceFingerprint::default()
        });
        fingerprint.current = current;
        fingerprint.drift_warnings = detect_drift(&fingerprint.baseline, &current, chapter.number);
        fingerprint.signature_phrases = signature_phrases(&samples);
        fingerprint.avoided_phrases = cliches_in(&samples);
        fingerprint.sampled_chapters = sampled;
        fingerprint.computed_chapter = chapter.number;
        for warning in &fingerprint.drift_warnings {
            tracing::info!(project = %chapter.project_id, chapter = chapter.number, drift = %warning.message, "voice drift");
        }
        self.store.save_voice_fingerprint(&fingerprint).await?;
        Ok(())
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let Some(fp) = self.store.get_voice_fingerprint(&query.project.id).await? else {
            return Ok(None);
        };
        let mut out = format!(
            "VOICE: keep sentences near {:.0} words, dialogue near {:.0}% of the text, {} register.\n",
            fp.baseline.avg_sentence_words,
            fp.baseline.dialogue_ratio * 100.0,
            fp.baseline.register.as_str()
        );
        if !fp.signature_phrases.is_empty() {
            let _ = writeln!(out, "Signature phrasing (flavor, do not overuse): {}", fp.signature_phrases.join("; "));
        }
        if !fp.avoided_phrases.is_empty() {
            let _ = writeln!(out, "Never write: {}", fp.avoided_phrases.join("; "));
        }
        for warning in &fp.drift_warnings {
            let _ = writeln!(out, "DO NOT DRIFT FURTHER: {}", warning.message);
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use novelmill_core::Chapter;
    use novelmill_storage::{ChapterStore, VoiceStore};

    use super::*;
    use crate::test_support::{committed, dyn_store, project, store};

    const CALM: &str = "The mist lay over the valley like a held breath. Light crept along the stone wall. \
The wind carried the scent of pine and cold water through the silent courtyard.";
    const TALKY: &str = "\"Move!\" \"Now?\" \"Yes, now, before they see us!\" \"Fine.\" \"Run.\" He ran.";

    #[test]
    fn test_measures_dialogue_and_sentence_length() {
        let calm = measure(&[CALM]);
        assert!(calm.dialogue_ratio.abs() < f32::EPSILON);
        assert!(calm.avg_sentence_words > 8.0);
        assert_eq!(calm.register, Register::Descriptive);

        let talky = measure(&[TALKY]);
        assert!(talky.dialogue_ratio > 0.6);
        assert!(talky.avg_sentence_words < 4.0);
    }

    #[test]
    fn test_drift_flags_each_dimension() {
        let baseline = measure(&[CALM]);
        let current = measure(&[TALKY]);
        let dims: Vec<DriftDimension> = detect_drift(&baseline, &current, 10).iter().map(|w| w.dimension).collect();
        assert_eq!(
            dims,
            vec![DriftDimension::DialogueRatio, DriftDimension::SentenceLength, DriftDimension::Register]
        );
        assert!(detect_drift(&baseline, &baseline, 10).is_empty());
    }

    #[test]
    fn test_signature_needs_two_chapters() {
        let a = "Lin clenched his jaw and walked on. The crimson sky burned.";
        let b = "Again Lin clenched his jaw. Under the crimson sky burned nothing.";
        let phrases = signature_phrases(&[a, b]);
        assert!(phrases.contains(&"lin clenched his".to_owned()));
        assert!(phrases.contains(&"crimson sky burned".to_owned()));
        assert!(!phrases.iter().any(|p| p.contains("walked")));
    }

    #[tokio::test]
    async fn test_baseline_is_fixed_and_recompute_follows_interval() {
        let store = store();
        let tracker = VoiceTracker::new(dyn_store(&store));

        tracker.on_chapter_committed(&committed(1, CALM, None)).await.unwrap();
        let first = store.get_voice_fingerprint("p1").await.unwrap().unwrap();
        assert!(first.drift_warnings.is_empty());
        assert_eq!(first.sampled_chapters, vec![1]);

        tracker.on_chapter_committed(&committed(2, TALKY, None)).await.unwrap();
        assert_eq!(store.get_voice_fingerprint("p1").await.unwrap().unwrap(), first);

        for n in 3..=4 {
            store.upsert_chapter(&Chapter::new("p1", n, "t", TALKY)).await.unwrap();
        }
        tracker.on_chapter_committed(&committed(5, TALKY, None)).await.unwrap();
        let fp = store.get_voice_fingerprint("p1").await.unwrap().unwrap();
        assert_eq!(fp.baseline, first.baseline);
        assert_eq!(fp.sampled_chapters, vec![3, 4, 5]);
        assert!(!fp.drift_warnings.is_empty());

        let project = project();
        let fragment = tracker
            .context_fragment(&FragmentQuery { project: &project, chapter: 6, cast: &[] })
            .await
            .unwrap()
            .unwrap();
        assert!(fragment.contains("DO NOT DRIFT FURTHER: dialogue share moved"));
    }
}
