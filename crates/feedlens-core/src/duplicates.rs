//! Repeated-comment detection.
//!
//! Comments are partitioned by user and walked in creation order. A comment
//! is repetitive when its description and title equal those of the current
//! original (after whitespace collapsing) and it was posted within the time
//! window. Matches leave the original in place, so a burst of identical
//! comments all point at the first one rather than forming a chain.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::defaults;
use crate::models::DuplicateLink;
use crate::text::collapse_whitespace;

/// Minimal projection of a comment needed for the scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRow {
    pub comment_id: i64,
    pub user_hash: String,
    pub title: Option<String>,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Original {
    id: i64,
    description: String,
    title: String,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    window: Duration,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(defaults::DUPLICATE_WINDOW_SECS)
    }
}

impl DuplicateDetector {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs),
        }
    }

    /// Compute a verdict for every row. Output is ordered by comment id.
    ///
    /// Within a user, rows sort by timestamp then id; rows without a
    /// timestamp go last and never match.
    pub fn detect(&self, rows: &[ScanRow]) -> Vec<DuplicateLink> {
        let mut by_user: BTreeMap<&str, Vec<&ScanRow>> = BTreeMap::new();
        for row in rows {
            by_user.entry(row.user_hash.as_str()).or_default().push(row);
        }

        let mut links = Vec::with_capacity(rows.len());
        for (_, mut partition) in by_user {
            partition.sort_by_key(|r| (r.created_at.is_none(), r.created_at, r.comment_id));
            self.scan_partition(&partition, &mut links);
        }
        links.sort_by_key(|l| l.comment_id);

        debug!(
            subsystem = "core",
            component = "duplicates",
            scanned = rows.len(),
            flagged = links.iter().filter(|l| l.is_repetitive).count(),
            "Duplicate scan finished"
        );
        links
    }

    fn scan_partition(&self, partition: &[&ScanRow], links: &mut Vec<DuplicateLink>) {
        let mut original: Option<Original> = None;

        for row in partition {
            let description = collapse_whitespace(&row.description);
            let title = collapse_whitespace(row.title.as_deref().unwrap_or(""));

            let duplicate_of = original.as_ref().and_then(|orig| {
                let (Some(prev), Some(cur)) = (orig.created_at, row.created_at) else {
                    return None;
                };
                let elapsed = cur - prev;
                let same = orig.description == description && orig.title == title;
                (same && elapsed >= Duration::zero() && elapsed <= self.window).then_some(orig.id)
            });

            links.push(DuplicateLink {
                comment_id: row.comment_id,
                is_repetitive: duplicate_of.is_some(),
                duplicate_of,
            });

            if duplicate_of.is_none() {
                original = Some(Original {
                    id: row.comment_id,
                    description,
                    title,
                    created_at: row.created_at,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes))
    }

    fn row(id: i64, user: &str, text: &str, minutes: Option<i64>) -> ScanRow {
        ScanRow {
            comment_id: id,
            user_hash: user.to_string(),
            title: Some("انتقال وجه".to_string()),
            description: text.to_string(),
            created_at: minutes.and_then(at),
        }
    }

    fn flagged(links: &[DuplicateLink]) -> Vec<(i64, i64)> {
        links
            .iter()
            .filter_map(|l| l.duplicate_of.map(|d| (l.comment_id, d)))
            .collect()
    }

    #[test]
    fn test_ten_minutes_apart_flagged() {
        let rows = vec![row(1, "u", "کار نمی‌کند", Some(0)), row(2, "u", "کار نمی‌کند", Some(10))];
        let links = DuplicateDetector::default().detect(&rows);
        assert_eq!(flagged(&links), vec![(2, 1)]);
        assert!(!links[0].is_repetitive);
        assert!(links[1].is_repetitive);
    }

    #[test]
    fn test_sixty_one_minutes_apart_not_flagged() {
        let rows = vec![row(1, "u", "کار نمی‌کند", Some(0)), row(2, "u", "کار نمی‌کند", Some(61))];
        let links = DuplicateDetector::default().detect(&rows);
        assert!(flagged(&links).is_empty());
    }

    #[test]
    fn test_exactly_one_hour_is_inside_window() {
        let rows = vec![row(1, "u", "خوب", Some(0)), row(2, "u", "خوب", Some(60))];
        assert_eq!(flagged(&DuplicateDetector::default().detect(&rows)), vec![(2, 1)]);
    }

    #[test]
    fn test_whitespace_differences_still_match() {
        let rows = vec![
            row(1, "u", "برنامه   خیلی کند است", Some(0)),
            row(2, "u", " برنامه خیلی\nکند است ", Some(5)),
        ];
        assert_eq!(flagged(&DuplicateDetector::default().detect(&rows)), vec![(2, 1)]);
    }

    #[test]
    fn test_different_title_not_flagged() {
        let mut second = row(2, "u", "خوب", Some(5));
        second.title = Some("کارت‌ها".to_string());
        let rows = vec![row(1, "u", "خوب", Some(0)), second];
        assert!(flagged(&DuplicateDetector::default().detect(&rows)).is_empty());
    }

    #[test]
    fn test_matches_do_not_advance_original() {
        let rows = vec![
            row(1, "u", "خوب", Some(0)),
            row(2, "u", "خوب", Some(50)),
            row(3, "u", "خوب", Some(70)),
            row(4, "u", "خوب", Some(100)),
        ];
        // 2 is within an hour of 1; 3 is 70 minutes after 1 so it becomes the
        // new original; 4 is 30 minutes after 3.
        assert_eq!(
            flagged(&DuplicateDetector::default().detect(&rows)),
            vec![(2, 1), (4, 3)]
        );
    }

    #[test]
    fn test_users_are_independent() {
        let rows = vec![row(1, "a", "خوب", Some(0)), row(2, "b", "خوب", Some(1))];
        assert!(flagged(&DuplicateDetector::default().detect(&rows)).is_empty());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let rows = vec![row(2, "u", "خوب", Some(10)), row(1, "u", "خوب", Some(0))];
        let links = DuplicateDetector::default().detect(&rows);
        assert_eq!(flagged(&links), vec![(2, 1)]);
        assert_eq!(links.iter().map(|l| l.comment_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_identical_timestamps_break_ties_by_id() {
        let rows = vec![row(9, "u", "خوب", Some(0)), row(4, "u", "خوب", Some(0))];
        assert_eq!(flagged(&DuplicateDetector::default().detect(&rows)), vec![(9, 4)]);
    }

    #[test]
    fn test_missing_timestamp_never_matches() {
        let rows = vec![
            row(1, "u", "خوب", None),
            row(2, "u", "خوب", Some(0)),
            row(3, "u", "خوب", None),
        ];
        assert!(flagged(&DuplicateDetector::default().detect(&rows)).is_empty());
    }

    #[test]
    fn test_detection_is_idempotent() {
        let rows = vec![
            row(1, "u", "خوب", Some(0)),
            row(2, "u", "خوب", Some(3)),
            row(3, "v", "بد", Some(0)),
            row(4, "v", "بد", Some(90)),
        ];
        let detector = DuplicateDetector::default();
        assert_eq!(detector.detect(&rows), detector.detect(&rows));
    }

    #[test]
    fn test_every_row_gets_a_verdict() {
        let rows = vec![row(1, "u", "یک", Some(0)), row(2, "u", "دو", Some(1))];
        assert_eq!(DuplicateDetector::default().detect(&rows).len(), 2);
    }
}
