use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A statement picked up from the digest summary, waiting to be explained.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCandidate {
    pub schema: String,
    pub digest: String,
    /// Sample text as stored by the engine, possibly truncated.
    pub query_text: String,
    pub last_seen: DateTime<Utc>,
}

impl QueryCandidate {
    pub fn unique_key(&self) -> String {
        format!("{}{}", self.schema, self.digest)
    }
}

/// Candidates keyed by [`QueryCandidate::unique_key`], in discovery order,
/// plus the `last_seen` bookmark the next digest scan starts from.
#[derive(Debug, Clone)]
pub struct QueryCache {
    queries: IndexMap<String, QueryCandidate>,
    bookmark: DateTime<Utc>,
    batch_size: usize,
}

impl QueryCache {
    pub fn new(bookmark: DateTime<Utc>) -> Self {
        Self {
            queries: IndexMap::new(),
            bookmark,
            batch_size: 0,
        }
    }

    pub fn bookmark(&self) -> DateTime<Utc> {
        self.bookmark
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn contains(&self, unique_key: &str) -> bool {
        self.queries.contains_key(unique_key)
    }

    pub fn get(&self, unique_key: &str) -> Option<&QueryCandidate> {
        self.queries.get(unique_key)
    }

    /// Inserts or replaces the candidate and moves the bookmark forward if
    /// the candidate was seen later. The bookmark never moves back.
    pub fn insert(&mut self, candidate: QueryCandidate) {
        if candidate.last_seen > self.bookmark {
            self.bookmark = candidate.last_seen;
        }
        self.queries.insert(candidate.unique_key(), candidate);
    }

    pub fn remove(&mut self, unique_key: &str) -> Option<QueryCandidate> {
        self.queries.shift_remove(unique_key)
    }

    /// `ceil(len * ratio)`, kept within `1..=len` so a non-empty cache
    /// always drains.
    pub fn update_batch_size(&mut self, per_collect_ratio: f64) -> usize {
        let len = self.queries.len();
        let size = (len as f64 * per_collect_ratio).ceil() as usize;
        self.batch_size = if len == 0 { 0 } else { size.clamp(1, len) };
        self.batch_size
    }

    /// Keys of the next batch, in cache order.
    pub fn batch_keys(&self) -> Vec<String> {
        self.queries.keys().take(self.batch_size).cloned().collect()
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::collector::{QueryCache, QueryCandidate};

    fn candidate(schema: &str, digest: &str, minutes: i64) -> QueryCandidate {
        QueryCandidate {
            schema: schema.into(),
            digest: digest.into(),
            query_text: "SELECT 1".into(),
            last_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    #[test]
    pub fn test_unique_key() {
        assert_eq!(candidate("books", "abc", 0).unique_key(), "booksabc");
    }

    #[test]
    pub fn test_bookmark_never_moves_back() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut cache = QueryCache::new(start);

        cache.insert(candidate("a", "1", 10));
        cache.insert(candidate("a", "2", 5));
        assert_eq!(cache.bookmark(), start + Duration::minutes(10));

        cache.insert(candidate("a", "3", -30));
        assert_eq!(cache.bookmark(), start + Duration::minutes(10));
    }

    #[test]
    pub fn test_duplicate_keys_replace() {
        let mut cache = QueryCache::new(Utc::now() - Duration::days(1));

        cache.insert(candidate("a", "1", 0));
        let mut newer = candidate("a", "1", 1);
        newer.query_text = "SELECT 2".into();
        cache.insert(newer);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a1").unwrap().query_text, "SELECT 2");
    }

    #[test]
    pub fn test_batch_size_rounds_up() {
        let mut cache = QueryCache::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        for i in 0..5 {
            cache.insert(candidate("s", &i.to_string(), i));
        }

        assert_eq!(cache.update_batch_size(0.3), 2);
        assert_eq!(cache.batch_keys(), vec!["s0", "s1"]);
        assert_eq!(cache.update_batch_size(1.0), 5);
        assert_eq!(cache.update_batch_size(0.01), 1);
    }

    #[test]
    pub fn test_batch_size_never_stalls() {
        let mut cache = QueryCache::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(cache.update_batch_size(0.0), 0);

        for i in 0..3 {
            cache.insert(candidate("s", &i.to_string(), i));
        }

        assert_eq!(cache.update_batch_size(0.0), 1);
        assert_eq!(cache.update_batch_size(f64::NAN), 1);
        assert_eq!(cache.update_batch_size(-2.0), 1);
        assert_eq!(cache.update_batch_size(7.0), 3);
    }

    #[test]
    pub fn test_remove_keeps_order() {
        let mut cache = QueryCache::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        for i in 0..3 {
            cache.insert(candidate("s", &i.to_string(), i));
        }
        cache.update_batch_size(1.0);

        assert!(cache.remove("s1").is_some());
        assert!(!cache.contains("s1"));
        assert_eq!(cache.batch_keys(), vec!["s0", "s2"]);
    }
}
