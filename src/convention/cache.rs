//! Memoised layouts keyed by signature and convention

use super::abi::{CallingConvention, FrameSide};
use super::location::CallLayout;
use super::resolver::resolve;
use crate::logging::log_layout_resolved;
use crate::signature::ParameterKind;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LayoutKey {
    kinds: Vec<ParameterKind>,
    convention: CallingConvention,
    side: FrameSide,
}

/// Concurrent cache of resolved layouts
///
/// Resolution is pure, so racing first-time lookups agree on the result;
/// the map keeps whichever insert lands first.
#[derive(Default)]
pub struct LayoutCache {
    layouts: DashMap<LayoutKey, Arc<CallLayout>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached layout for the key, resolving it on first use
    pub fn get_or_resolve(
        &self,
        kinds: &[ParameterKind],
        convention: CallingConvention,
        side: FrameSide,
    ) -> Arc<CallLayout> {
        let key = LayoutKey {
            kinds: kinds.to_vec(),
            convention,
            side,
        };

        if let Some(layout) = self.layouts.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(layout.value());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let entry = self.layouts.entry(key).or_insert_with(|| {
            let layout = resolve(kinds, convention, side);
            log_layout_resolved(&convention, kinds.len(), layout.overflow_size());
            Arc::new(layout)
        });
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn clear(&self) {
        self.layouts.clear();
    }

    pub fn stats(&self) -> LayoutCacheStats {
        LayoutCacheStats {
            entries: self.layouts.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Layout cache statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}
