//! Source Registry: deduplicated, citable sources for one request.
//!
//! Every concurrent search task inserts through [`SourceRegistry::upsert`].
//! The lock is held only for the map lookup and push; nothing awaits while
//! holding it.

use deepsift_core::{Source, SourceId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use url::Url;

#[derive(Debug, Default)]
struct Inner {
    by_url: HashMap<String, SourceId>,
    sources: Vec<Source>,
}

/// Request-scoped registry of sources keyed by normalized URL.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    inner: Mutex<Inner>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere cannot leave a half-inserted source behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a source, or return the id already assigned to its URL.
    ///
    /// The first label and snippet seen for a URL are kept.
    pub fn upsert(&self, url: &str, label: &str, snippet: &str) -> SourceId {
        let key = normalize_url(url);
        let mut inner = self.lock();
        if let Some(id) = inner.by_url.get(&key) {
            return *id;
        }

        let id = SourceId::new(inner.sources.len() as u32 + 1);
        let label = if label.trim().is_empty() {
            key.clone()
        } else {
            label.trim().to_string()
        };
        inner.sources.push(Source {
            id,
            url: key.clone(),
            label,
            snippet: snippet.trim().to_string(),
        });
        inner.by_url.insert(key, id);
        id
    }

    pub fn resolve(&self, id: SourceId) -> Option<Source> {
        let inner = self.lock();
        let idx = (id.number() as usize).checked_sub(1)?;
        inner.sources.get(idx).cloned()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        let n = id.number() as usize;
        n >= 1 && n <= self.len()
    }

    /// Id for a URL, if it has been registered.
    pub fn lookup(&self, url: &str) -> Option<SourceId> {
        self.lock().by_url.get(&normalize_url(url)).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sources in id order.
    pub fn snapshot(&self) -> Vec<Source> {
        self.lock().sources.clone()
    }
}

/// Canonical form of a URL used as the source identity key.
///
/// Lowercases scheme and host, drops default ports, fragments, and trailing
/// slashes. Strings that do not parse as URLs are trimmed and have the same
/// fragment and slash rules applied textually.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) if url.has_host() => {
            url.set_fragment(None);
            let trimmed = url.path().trim_end_matches('/').to_string();
            url.set_path(if trimmed.is_empty() { "/" } else { trimmed.as_str() });
            let mut out = url.to_string();
            if url.path() == "/" && url.query().is_none() {
                out.pop();
            }
            out
        }
        _ => {
            let without_fragment = raw.split('#').next().unwrap_or(raw);
            without_fragment.trim_end_matches('/').to_string()
        }
    }
}
