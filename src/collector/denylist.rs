use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenylistEntry {
    pub failure_count: u32,
}

/// Candidates that failed for a reason retrying will not fix. Entries live
/// for the lifetime of the collector.
#[derive(Debug, Clone, Default)]
pub struct QueryDenylist {
    entries: HashMap<String, DenylistEntry>,
}

impl QueryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, unique_key: &str) -> bool {
        self.entries.contains_key(unique_key)
    }

    pub fn get(&self, unique_key: &str) -> Option<&DenylistEntry> {
        self.entries.get(unique_key)
    }

    /// Returns the failure count after recording this failure.
    pub fn record_failure(&mut self, unique_key: &str) -> u32 {
        let entry = self.entries.entry(unique_key.to_string()).or_default();
        entry.failure_count += 1;
        entry.failure_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
