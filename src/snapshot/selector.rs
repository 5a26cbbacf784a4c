//! Choosing which snapshot to copy and which copies to keep.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{SnapshotClass, SnapshotRef};

/// How the "latest" snapshot of a resource is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Greatest identifier wins.
    ///
    /// Automated snapshot identifiers embed their creation time
    /// (`rds:<name>-YYYY-MM-DD-HH-MM`), so lexicographic order matches
    /// creation order as long as the backup service keeps that convention.
    #[default]
    LatestByIdentifier,
}

/// Select the latest snapshot of `class` from `snapshots`.
///
/// Returns `None` when nothing of that class is present, which callers treat
/// as "nothing to copy".
pub fn select_latest(snapshots: &[SnapshotRef], class: SnapshotClass) -> Option<&SnapshotRef> {
    select_latest_with(snapshots, class, SelectionPolicy::default())
}

pub(crate) fn select_latest_with(
    snapshots: &[SnapshotRef],
    class: SnapshotClass,
    policy: SelectionPolicy,
) -> Option<&SnapshotRef> {
    let candidates = snapshots.iter().filter(|s| s.snapshot_class == class);
    match policy {
        SelectionPolicy::LatestByIdentifier => {
            candidates.max_by(|a, b| a.identifier.cmp(&b.identifier))
        }
    }
}

/// Order copies newest first.
///
/// A copy without a creation time sorts as `now`, i.e. among the newest, so an
/// in-flight copy is never the first thing pruned. Equal timestamps fall back
/// to identifier order (descending) to keep the result deterministic.
pub fn order_newest_first(mut copies: Vec<SnapshotRef>, now: DateTime<Utc>) -> Vec<SnapshotRef> {
    copies.sort_by(|a, b| compare_newest_first(a, b, now));
    copies
}

fn compare_newest_first(a: &SnapshotRef, b: &SnapshotRef, now: DateTime<Utc>) -> Ordering {
    b.effective_created_at(now)
        .cmp(&a.effective_created_at(now))
        .then_with(|| b.identifier.cmp(&a.identifier))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::snapshot::ResourceKind;

    fn automated(id: &str) -> SnapshotRef {
        SnapshotRef::new(id, "db-a", ResourceKind::Instance, SnapshotClass::Automated)
    }

    fn manual_at(id: &str, at: Option<DateTime<Utc>>) -> SnapshotRef {
        let snap = SnapshotRef::new(id, "db-a", ResourceKind::Instance, SnapshotClass::Manual);
        match at {
            Some(at) => snap.with_created_at(at),
            None => snap,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_select_latest_empty() {
        assert!(select_latest(&[], SnapshotClass::Automated).is_none());
    }

    #[rstest]
    #[case::sorted(&["rds:db-a-2024-05-30-06-00", "rds:db-a-2024-05-31-06-00", "rds:db-a-2024-06-01-06-00"])]
    #[case::reversed(&["rds:db-a-2024-06-01-06-00", "rds:db-a-2024-05-31-06-00", "rds:db-a-2024-05-30-06-00"])]
    #[case::shuffled(&["rds:db-a-2024-05-31-06-00", "rds:db-a-2024-06-01-06-00", "rds:db-a-2024-05-30-06-00"])]
    fn test_select_latest_is_order_independent(#[case] ids: &[&str]) {
        let snaps: Vec<_> = ids.iter().map(|id| automated(id)).collect();
        let latest = select_latest(&snaps, SnapshotClass::Automated).unwrap();
        assert_eq!(latest.identifier, "rds:db-a-2024-06-01-06-00");
    }

    #[test]
    fn test_select_latest_ignores_identifier_timestamps() {
        // Identifier order wins even when the timestamps disagree.
        let snaps = vec![
            automated("rds:db-a-2024-06-01").with_created_at(base()),
            automated("rds:db-a-2024-05-01").with_created_at(base() + Duration::days(3)),
        ];
        let latest = select_latest(&snaps, SnapshotClass::Automated).unwrap();
        assert_eq!(latest.identifier, "rds:db-a-2024-06-01");
    }

    #[test]
    fn test_select_latest_filters_class() {
        let snaps = vec![
            automated("rds:db-a-2024-05-01"),
            manual_at("zzz-manual", None),
        ];
        let latest = select_latest(&snaps, SnapshotClass::Automated).unwrap();
        assert_eq!(latest.identifier, "rds:db-a-2024-05-01");

        let only_manual = vec![manual_at("zzz-manual", None)];
        assert!(select_latest(&only_manual, SnapshotClass::Automated).is_none());
    }

    #[test]
    fn test_order_newest_first() {
        let copies = vec![
            manual_at("t2", Some(base() + Duration::days(2))),
            manual_at("t4", Some(base() + Duration::days(4))),
            manual_at("t1", Some(base() + Duration::days(1))),
            manual_at("t3", Some(base() + Duration::days(3))),
        ];
        let ordered = order_newest_first(copies, base() + Duration::days(10));
        let ids: Vec<_> = ordered.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn test_missing_timestamp_sorts_as_newest() {
        let now = base() + Duration::days(10);
        let copies = vec![
            manual_at("old", Some(base())),
            manual_at("pending", None),
            manual_at("recent", Some(base() + Duration::days(9))),
        ];
        let ordered = order_newest_first(copies, now);
        assert_eq!(ordered[0].identifier, "pending");
        assert_eq!(ordered[2].identifier, "old");
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_identifier() {
        let copies = vec![
            manual_at("copy-a", Some(base())),
            manual_at("copy-c", Some(base())),
            manual_at("copy-b", Some(base())),
        ];
        let ordered = order_newest_first(copies, base());
        let ids: Vec<_> = ordered.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, vec!["copy-c", "copy-b", "copy-a"]);
    }
}
