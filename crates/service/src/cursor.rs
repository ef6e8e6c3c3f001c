//! Next-chapter resolution from the persisted cursor.
//!
//! The cursor can drift from what is actually committed: a crash between
//! commit and cursor update leaves it behind, a manual edit or a lost row
//! leaves it ahead or leaves a hole. Resolution always looks at the
//! committed numbers, never at the cursor alone.

/// Where the next chapter goes and what to repair first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPlan {
    pub target: u32,
    /// Set when the cursor points past the last committed chapter.
    pub rollback_to: Option<u32>,
    /// The target fills a hole below the highest committed chapter.
    pub fills_gap: bool,
}

/// Resolve the chapter to write next.
///
/// A hole in the committed sequence is filled before anything is appended,
/// and the cursor is never moved forward to get there.
#[must_use]
pub fn plan_next_chapter(cursor: u32, committed: &[u32]) -> CursorPlan {
    let max = committed.iter().copied().max().unwrap_or(0);
    let rollback_to = (cursor > max).then_some(max);
    match missing_chapters(committed).first() {
        Some(&gap) => CursorPlan { target: gap, rollback_to, fills_gap: true },
        None => CursorPlan { target: max.saturating_add(1), rollback_to, fills_gap: false },
    }
}

/// Every number in `1..max` with no committed chapter, ascending.
#[must_use]
pub fn missing_chapters(committed: &[u32]) -> Vec<u32> {
    let mut sorted: Vec<u32> = committed.iter().copied().filter(|&n| n > 0).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut missing = Vec::new();
    let mut expected = 1;
    for n in sorted {
        missing.extend(expected..n);
        expected = n.saturating_add(1);
    }
    missing
}

/// Highest `n` such that chapters `1..=n` are all committed.
#[must_use]
pub fn contiguous_prefix(committed: &[u32]) -> u32 {
    let mut sorted: Vec<u32> = committed.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut prefix: u32 = 0;
    for n in sorted {
        if n == prefix.saturating_add(1) {
            prefix = n;
        } else if n > prefix {
            break;
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_below_cursor_is_filled_without_moving_cursor() {
        let committed: Vec<u32> = (1..=45).chain(47..=50).collect();
        let plan = plan_next_chapter(50, &committed);
        assert_eq!(plan.target, 46);
        assert_ne!(plan.target, 51);
        assert_eq!(plan.rollback_to, None);
        assert!(plan.fills_gap);
    }

    #[test]
    fn test_cursor_ahead_of_committed_rolls_back() {
        let committed: Vec<u32> = (1..=50).collect();
        let plan = plan_next_chapter(55, &committed);
        assert_eq!(plan.rollback_to, Some(50));
        assert_eq!(plan.target, 51);
        assert!(!plan.fills_gap);
    }

    #[test]
    fn test_empty_project_starts_at_one() {
        let plan = plan_next_chapter(0, &[]);
        assert_eq!(plan, CursorPlan { target: 1, rollback_to: None, fills_gap: false });
    }

    #[test]
    fn test_cursor_behind_committed_appends_after_max() {
        let committed: Vec<u32> = (1..=45).collect();
        assert_eq!(plan_next_chapter(40, &committed).target, 46);
        assert_eq!(contiguous_prefix(&committed), 45);
    }

    #[test]
    fn test_missing_chapters_lists_every_hole() {
        assert_eq!(missing_chapters(&[5, 1, 3, 3]), vec![2, 4]);
        assert!(missing_chapters(&[1, 2, 3]).is_empty());
        assert_eq!(missing_chapters(&[3]), vec![1, 2]);
    }

    #[test]
    fn test_prefix_stops_at_first_hole() {
        let committed: Vec<u32> = (1..=45).chain(47..=50).collect();
        assert_eq!(contiguous_prefix(&committed), 45);
        let filled: Vec<u32> = (1..=50).collect();
        assert_eq!(contiguous_prefix(&filled), 50);
        assert_eq!(contiguous_prefix(&[2, 3]), 0);
    }
}
