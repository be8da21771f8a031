//! The bounded top-N scheduler (C5, `spec.md` §4.5): picks which due
//! packages/persons actually get crawled this run when more are due than
//! the per-run budget allows.

use gcse_core::Millis;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One schedulable item: its id plus enough crawl history to rank it.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    /// Caller payload carried through unchanged (a `PackagePath`, `PersonId`, ...).
    pub item: T,
    /// Stable tie-break key, e.g. `"{user}/{name}"`.
    pub sort_key: String,
    /// Time of the last successful crawl, `None` if never crawled.
    pub last_crawl: Option<Millis>,
}

impl<T> PartialEq for Candidate<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item && self.sort_key == other.sort_key && self.last_crawl == other.last_crawl
    }
}

/// Ranks candidates by `spec.md` §4.5's three rules, ascending from
/// "most eligible to crawl" to "least eligible":
/// 1. Never-crawled items precede ever-crawled ones.
/// 2. Among never-crawled items, order is lexicographic by `sort_key`
///    (a stable tie-break, not a priority).
/// 3. Among ever-crawled items, the older `last_crawl` precedes.
impl<T> PartialOrd for Candidate<T>
where
    T: PartialEq,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Eq for Candidate<T> where T: PartialEq {}

impl<T> Ord for Candidate<T>
where
    T: PartialEq,
{
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.last_crawl, other.last_crawl) {
            (None, None) => self.sort_key.cmp(&other.sort_key),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

/// Select the `max` most eligible candidates, in crawl order (most
/// eligible first).
///
/// `Candidate`'s `Ord` is defined so "greater" means "less eligible" —
/// exactly the ranking a plain `BinaryHeap` (a max-heap) needs to evict
/// the least-eligible entry once capacity is exceeded. What survives is
/// the `max` most-eligible candidates seen, which `into_sorted_vec`
/// then yields in crawl order.
#[must_use]
pub fn select_top_n<T>(candidates: impl IntoIterator<Item = Candidate<T>>, max: usize) -> Vec<T>
where
    T: PartialEq,
{
    if max == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Candidate<T>> = BinaryHeap::with_capacity(max + 1);

    for candidate in candidates {
        heap.push(candidate);
        if heap.len() > max {
            heap.pop();
        }
    }

    heap.into_sorted_vec().into_iter().map(|c| c.item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cand(item: &str, last_crawl: Option<Millis>) -> Candidate<String> {
        Candidate {
            item: item.to_string(),
            sort_key: item.to_string(),
            last_crawl,
        }
    }

    #[test]
    fn never_crawled_precedes_crawled() {
        let now = Millis::now();
        let candidates = vec![
            cand("c", Some(now.plus(Duration::hours(-2)))),
            cand("b", None),
            cand("a", Some(now.plus(Duration::minutes(-10)))),
        ];
        let order = select_top_n(candidates, 10);
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn never_crawled_ties_break_lexicographically() {
        let candidates = vec![cand("zebra", None), cand("apple", None)];
        let order = select_top_n(candidates, 10);
        assert_eq!(order, vec!["apple", "zebra"]);
    }

    #[test]
    fn bounded_heap_keeps_most_eligible() {
        let now = Millis::now();
        let candidates = vec![
            cand("never", None),
            cand("old", Some(now.plus(Duration::days(-10)))),
            cand("recent", Some(now.plus(Duration::minutes(-1)))),
        ];
        let order = select_top_n(candidates, 2);
        assert_eq!(order, vec!["never", "old"]);
    }

    #[test]
    fn zero_budget_selects_nothing() {
        let candidates = vec![cand("a", None)];
        assert!(select_top_n(candidates, 0).is_empty());
    }
}
