//! Bounded issue history, pattern counters and duplicate suppression.

use std::collections::{HashMap, HashSet, VecDeque};

use shared_types::DetectedIssue;

use super::entities::PatternRecord;
use super::value_objects::PatternKey;

/// Most recent issues, oldest dropped first.
pub struct IssueLog {
    issues: VecDeque<DetectedIssue>,
    capacity: usize,
}

impl IssueLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            issues: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, issue: DetectedIssue) {
        if self.issues.len() == self.capacity {
            self.issues.pop_front();
        }
        self.issues.push_back(issue);
    }

    /// Up to `limit` issues of `category`, newest first.
    pub fn recent(&self, category: &str, limit: usize) -> Vec<&DetectedIssue> {
        self.issues
            .iter()
            .rev()
            .filter(|issue| issue.category == category)
            .take(limit)
            .collect()
    }

    pub fn get_mut(&mut self, issue_id: &str) -> Option<&mut DetectedIssue> {
        self.issues.iter_mut().rev().find(|issue| issue.id == issue_id)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Occurrence counts per pattern. When full, the least recently seen
/// pattern is dropped.
pub struct PatternCounter {
    records: HashMap<PatternKey, PatternRecord>,
    capacity: usize,
}

impl PatternCounter {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Counts one more occurrence and returns the updated record.
    pub fn record(&mut self, key: PatternKey, now: u64) -> PatternRecord {
        if !self.records.contains_key(&key) && self.records.len() >= self.capacity {
            let stalest = self
                .records
                .values()
                .min_by_key(|r| r.last_seen)
                .map(|r| r.key.clone());
            if let Some(stalest) = stalest {
                self.records.remove(&stalest);
            }
        }
        let record = self.records.entry(key.clone()).or_insert_with(|| PatternRecord {
            key,
            occurrences: 0,
            first_seen: now,
            last_seen: now,
            fix_id: None,
        });
        record.occurrences = record.occurrences.saturating_add(1);
        record.last_seen = now;
        record.clone()
    }

    pub fn attach_fix(&mut self, key: &PatternKey, fix_id: &str) {
        if let Some(record) = self.records.get_mut(key) {
            record.fix_id = Some(fix_id.to_string());
        }
    }

    /// Clears the attached fix if it is still `fix_id`.
    pub fn detach_fix(&mut self, key: &PatternKey, fix_id: &str) {
        if let Some(record) = self.records.get_mut(key) {
            if record.fix_id.as_deref() == Some(fix_id) {
                record.fix_id = None;
            }
        }
    }

    pub fn get(&self, key: &PatternKey) -> Option<&PatternRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Remembers the last `capacity` ids.
pub struct RecentIds {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// False if the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Severity;

    fn issue(id: &str, category: &str) -> DetectedIssue {
        let mut issue = DetectedIssue::new(category, Severity::Medium, "down");
        issue.id = id.into();
        issue
    }

    #[test]
    fn test_issue_log_recent_newest_first() {
        let mut log = IssueLog::new(3);
        log.push(issue("1", "network.dns"));
        log.push(issue("2", "network.wifi"));
        log.push(issue("3", "network.dns"));
        log.push(issue("4", "network.dns"));

        let ids: Vec<&str> = log.recent("network.dns", 10).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["4", "3"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_pattern_counter_counts_and_evicts() {
        let mut counter = PatternCounter::new(1);
        let a = PatternKey::of(&issue("1", "network.dns"));
        let b = PatternKey::of(&issue("2", "network.wifi"));

        assert_eq!(counter.record(a.clone(), 1).occurrences, 1);
        assert_eq!(counter.record(a.clone(), 2).occurrences, 2);
        counter.record(b.clone(), 3);
        assert!(counter.get(&a).is_none());
        assert_eq!(counter.len(), 1);
    }

    #[test]
    fn test_pattern_counter_detach_fix() {
        let mut counter = PatternCounter::new(4);
        let key = PatternKey::of(&issue("1", "network.dns"));
        counter.record(key.clone(), 1);
        counter.attach_fix(&key, "fix-2");

        counter.detach_fix(&key, "fix-1");
        assert_eq!(counter.get(&key).unwrap().fix_id.as_deref(), Some("fix-2"));
        counter.detach_fix(&key, "fix-2");
        assert!(counter.get(&key).unwrap().fix_id.is_none());
        assert_eq!(counter.record(key, 2).occurrences, 2);
    }

    #[test]
    fn test_pattern_counter_saturates() {
        let mut counter = PatternCounter::new(1);
        let key = PatternKey::of(&issue("1", "network.dns"));
        counter.record(key.clone(), 1);
        counter.records.get_mut(&key).unwrap().occurrences = u32::MAX;
        assert_eq!(counter.record(key, 2).occurrences, u32::MAX);
    }

    #[test]
    fn test_recent_ids() {
        let mut ids = RecentIds::new(2);
        assert!(ids.insert("a"));
        assert!(!ids.insert("a"));
        ids.insert("b");
        ids.insert("c");
        assert!(!ids.contains("a"));
        assert!(ids.contains("c"));
    }
}
