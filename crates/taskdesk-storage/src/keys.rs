//! Shared key generation for storage backends.
//!
//! Key format: `{parent_id}/{timestamp_millis}-{file_name}`.

use std::sync::atomic::{AtomicI64, Ordering};

use taskdesk_core::ParentId;

/// Derives remote keys with timestamps that never repeat or go backwards
/// within one generator, so two files with the same name in one run never
/// collide.
#[derive(Debug, Default)]
pub struct RemoteKeyGenerator {
    last_millis: AtomicI64,
}

impl RemoteKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive(&self, parent_id: &ParentId, file_name: &str) -> String {
        let millis = self.next_millis(chrono::Utc::now().timestamp_millis());
        format_key(parent_id, millis, file_name)
    }

    fn next_millis(&self, now: i64) -> i64 {
        let mut current = self.last_millis.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self.last_millis.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Build a key from its parts. The file name is reduced to a single safe path segment.
pub fn format_key(parent_id: &ParentId, millis: i64, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        sanitize_segment(parent_id.as_str()),
        millis,
        sanitize_segment(file_name)
    )
}

/// Keep alphanumerics, `.`, `-` and `_`; replace everything else with `_`.
pub fn sanitize_segment(segment: &str) -> String {
    const MAX: usize = 200;
    let base = segment.rsplit(['/', '\\']).next().unwrap_or(segment);
    let s: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        s
    }
}
