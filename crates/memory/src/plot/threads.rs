//! Plot thread relevance scoring and touch detection.

use novelmill_core::constants::{THREAD_RECENCY_WINDOW, THREAD_URGENCY_WINDOW, TOP_THREADS};
use novelmill_core::text::contains_word;
use novelmill_core::{PlotThread, ThreadStatus};

const OVERLAP_WEIGHT: f32 = 0.4;
const URGENCY_WEIGHT: f32 = 0.3;
const PRIORITY_WEIGHT: f32 = 0.2;
const RECENCY_WEIGHT: f32 = 0.1;
const OVERDUE_URGENCY: f32 = 1.5;
const CLIMAX_BONUS: f32 = 0.15;
const MIN_KEYWORD_LEN: usize = 5;

/// Share of the thread's related characters present in `cast`.
fn overlap(thread: &PlotThread, cast: &[String]) -> f32 {
    if thread.related_characters.is_empty() {
        return 0.0;
    }
    let hits = thread
        .related_characters
        .iter()
        .filter(|name| cast.iter().any(|c| c.eq_ignore_ascii_case(name.trim())))
        .count();
    hits as f32 / thread.related_characters.len() as f32
}

fn urgency(thread: &PlotThread, chapter: u32) -> f32 {
    let Some(deadline) = thread.payoff_deadline else {
        return 0.0;
    };
    if chapter > deadline {
        return OVERDUE_URGENCY;
    }
    let remaining = deadline - chapter;
    if remaining <= THREAD_URGENCY_WINDOW {
        1.0 - remaining as f32 / THREAD_URGENCY_WINDOW as f32
    } else {
        0.0
    }
}

/// Positive inside the recency window, decaying negative past it.
fn recency(thread: &PlotThread, chapter: u32) -> f32 {
    let since = chapter.saturating_sub(thread.last_touched_chapter);
    let window = THREAD_RECENCY_WINDOW as f32;
    if since <= THREAD_RECENCY_WINDOW {
        1.0 - since as f32 / window
    } else {
        -((since - THREAD_RECENCY_WINDOW) as f32 / window).min(1.0)
    }
}

/// Weighted relevance of `thread` for the chapter about to be written.
#[must_use]
pub fn score_thread(thread: &PlotThread, chapter: u32, cast: &[String]) -> f32 {
    let mut score = OVERLAP_WEIGHT * overlap(thread, cast)
        + URGENCY_WEIGHT * urgency(thread, chapter)
        + PRIORITY_WEIGHT * thread.priority.base_score()
        + RECENCY_WEIGHT * recency(thread, chapter);
    if thread.status == ThreadStatus::Climax {
        score += CLIMAX_BONUS;
    }
    score
}

/// Active threads ranked by relevance, best first, at most [`TOP_THREADS`].
#[must_use]
pub fn rank_threads<'a>(
    threads: &'a [PlotThread],
    chapter: u32,
    cast: &[String],
) -> Vec<(f32, &'a PlotThread)> {
    let mut scored: Vec<(f32, &PlotThread)> = threads
        .iter()
        .filter(|t| t.status.is_active())
        .map(|t| (score_thread(t, chapter, cast), t))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored.truncate(TOP_THREADS);
    scored
}

/// Whether a committed chapter advanced `thread`.
///
/// Counts related characters on stage (other than the protagonist, who is in
/// every chapter) and distinctive title words in the text.
#[must_use]
pub fn is_touched(thread: &PlotThread, body: &str, cast: &[String], protagonist: &str) -> bool {
    let character_hit = thread.related_characters.iter().any(|name| {
        let name = name.trim();
        !name.eq_ignore_ascii_case(protagonist)
            && (cast.iter().any(|c| c.eq_ignore_ascii_case(name)) || contains_word(body, name))
    });
    if character_hit {
        return true;
    }
    let keywords: Vec<&str> = thread
        .title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .collect();
    let hits = keywords.iter().filter(|w| contains_word(body, w)).count();
    hits >= 2 || (keywords.len() == 1 && hits == 1)
}

#[cfg(test)]
mod tests {
    use novelmill_core::ThreadPriority;

    use super::*;

    fn thread(id: &str, priority: ThreadPriority, touched: u32, deadline: Option<u32>) -> PlotThread {
        PlotThread {
            id: id.to_owned(),
            project_id: "p".to_owned(),
            title: format!("thread {id}"),
            description: String::new(),
            priority,
            status: ThreadStatus::Developing,
            related_characters: Vec::new(),
            introduced_chapter: 1,
            last_touched_chapter: touched,
            payoff_deadline: deadline,
        }
    }

    #[test]
    fn test_urgent_old_thread_outranks_fresh_sub_thread() {
        let old = thread("old", ThreadPriority::Main, 10, Some(44));
        let fresh = thread("fresh", ThreadPriority::Sub, 38, None);
        let threads = vec![fresh, old];
        let ranked = rank_threads(&threads, 40, &[]);
        assert_eq!(ranked[0].1.id, "old");
        assert!(ranked[0].0 > ranked[1].0);
    }

    #[test]
    fn test_recency_turns_negative_past_window() {
        let stale = thread("s", ThreadPriority::Minor, 1, None);
        assert!(recency(&stale, 200) < 0.0);
        assert!((recency(&stale, 200) + 1.0).abs() < f32::EPSILON);
        assert!(recency(&stale, 30) > 0.0);
    }

    #[test]
    fn test_overdue_thread_gets_flat_bonus() {
        let overdue = thread("o", ThreadPriority::Minor, 5, Some(20));
        assert!((urgency(&overdue, 30) - OVERDUE_URGENCY).abs() < f32::EPSILON);
        let far = thread("f", ThreadPriority::Minor, 5, Some(100));
        assert!(urgency(&far, 30).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resolved_threads_are_not_ranked_and_climax_gets_bonus() {
        let mut resolved = thread("r", ThreadPriority::Main, 39, None);
        resolved.status = ThreadStatus::Resolved;
        let mut climax = thread("c", ThreadPriority::Sub, 20, None);
        climax.status = ThreadStatus::Climax;
        let plain = thread("d", ThreadPriority::Sub, 20, None);
        let threads = vec![resolved, climax, plain];
        let ranked = rank_threads(&threads, 40, &[]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].1.id, "c");
    }

    #[test]
    fn test_cast_overlap_raises_score() {
        let mut t = thread("t", ThreadPriority::Sub, 30, None);
        t.related_characters = vec!["Mara".to_owned(), "Zhao".to_owned()];
        let with = score_thread(&t, 40, &["mara".to_owned()]);
        let without = score_thread(&t, 40, &[]);
        assert!((with - without - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_touch_detection_ignores_protagonist_and_short_words() {
        let mut t = thread("t", ThreadPriority::Sub, 1, None);
        t.title = "The Crimson Pavilion".to_owned();
        t.related_characters = vec!["Lin".to_owned()];
        assert!(!is_touched(&t, "Lin walked to the pavilion.", &["Lin".to_owned()], "Lin"));
        assert!(is_touched(&t, "The crimson banners of the pavilion burned.", &[], "Lin"));
        t.related_characters.push("Mara".to_owned());
        assert!(is_touched(&t, "Nothing relevant.", &["Mara".to_owned()], "Lin"));
    }
}
