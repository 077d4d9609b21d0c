//! Content Cache Module
//!
//! Caches stylesheet text, optionally compacted before storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::cache::{BoundedCache, CacheStats, SharedCache};
use crate::config::BoundedCacheConfig;
use crate::error::CacheResult;

// == Content Cache ==
/// Stylesheet cache keyed by content id.
///
/// With compaction on, text is minified before it is stored. Minification
/// only drops comments and insignificant whitespace, so reads hand back the
/// stored text as is. Text the compactor cannot parse is stored untouched.
#[derive(Debug)]
pub struct ContentCache {
    store: SharedCache<String, String>,
    compression: bool,
    bytes_saved: AtomicU64,
}

/// Content cache report: the generic stats plus compaction savings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentCacheStats {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub compression: bool,
    pub bytes_saved: u64,
}

impl ContentCache {
    pub fn new(config: BoundedCacheConfig, compression: bool) -> Self {
        let cache = BoundedCache::with_estimator(config, Arc::new(|text: &String| text.len()));
        Self {
            store: SharedCache::new("content", cache),
            compression,
            bytes_saved: AtomicU64::new(0),
        }
    }

    // == Get ==
    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await
    }

    // == Set ==
    /// Stores `content`, compacting it first when enabled.
    pub async fn set(&self, key: impl Into<String>, content: &str) -> CacheResult<()> {
        let stored = if self.compression {
            match compact_stylesheet(content) {
                Some(compacted) if compacted.len() < content.len() => {
                    let saved = (content.len() - compacted.len()) as u64;
                    self.bytes_saved.fetch_add(saved, Ordering::Relaxed);
                    compacted
                }
                Some(_) => content.to_string(),
                None => {
                    trace!("Compaction failed, storing original text");
                    content.to_string()
                }
            }
        } else {
            content.to_string()
        };

        self.store.set(key.into(), stored, None).await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.has(key).await
    }

    pub async fn stats(&self) -> ContentCacheStats {
        ContentCacheStats {
            cache: self.store.stats().await,
            compression: self.compression,
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
        }
    }

    /// Underlying cache, for maintenance and invalidation.
    pub fn store(&self) -> &SharedCache<String, String> {
        &self.store
    }
}

// == Compaction ==
/// Minifies stylesheet text.
///
/// Strips `/* */` comments, collapses whitespace runs, removes whitespace next
/// to `{ } ; , >` and the last `;` of a block. Whitespace after `:` goes, but
/// whitespace before it stays: `.card :hover` and `.card:hover` select
/// different elements. Quoted strings are copied verbatim. Returns `None` on
/// an unterminated comment or string.
pub fn compact_stylesheet(input: &str) -> Option<String> {
    const TIGHT: &[char] = &['{', '}', ':', ';', ',', '>'];

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                loop {
                    let next = chars.next()?;
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                pending_space = true;
            }
            '"' | '\'' => {
                flush_space(&mut out, &mut pending_space, c, TIGHT);
                out.push(c);
                loop {
                    let next = chars.next()?;
                    out.push(next);
                    if next == '\\' {
                        out.push(chars.next()?);
                    } else if next == c {
                        break;
                    } else if next == '\n' {
                        return None;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            '}' => {
                pending_space = false;
                if out.ends_with(';') {
                    out.pop();
                }
                out.push('}');
            }
            c => {
                flush_space(&mut out, &mut pending_space, c, TIGHT);
                out.push(c);
            }
        }
    }

    Some(out)
}

fn flush_space(out: &mut String, pending: &mut bool, next: char, tight: &[char]) {
    if *pending {
        let after_tight = out.chars().last().map_or(true, |p| tight.contains(&p));
        let before_tight = next != ':' && tight.contains(&next);
        if !after_tight && !before_tight {
            out.push(' ');
        }
        *pending = false;
    }
}
