//! Lazily bound native addresses shared across threads

use super::{Linker, NativeAddress, NativeFunction, NativeRegistry};
use crate::error::LinkError;
use crate::logging;
use crate::signature::SymbolNames;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Binding table from a method's symbol names to its native address
///
/// Concurrent first-time links of the same method serialize on the map
/// entry: one thread resolves, the rest observe its result. Failures are
/// not stored, so a later registration can still satisfy the method;
/// while nothing changes, re-linking fails with an equal error.
pub struct LinkageCache {
    registry: Arc<NativeRegistry>,
    linkers: RwLock<Vec<Arc<dyn Linker>>>,
    bound: DashMap<SymbolNames, NativeAddress>,
    lookups: AtomicU64,
}

impl LinkageCache {
    pub fn new(registry: Arc<NativeRegistry>) -> Self {
        Self {
            registry,
            linkers: RwLock::new(Vec::new()),
            bound: DashMap::new(),
            lookups: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<NativeRegistry> {
        &self.registry
    }

    /// Search `linker` after the registry and any linker added earlier
    pub fn add_linker(&self, linker: Arc<dyn Linker>) {
        self.linkers.write().push(linker);
    }

    /// Address for a method, resolving and binding it on first use
    pub fn link(&self, symbols: &SymbolNames) -> Result<NativeAddress, LinkError> {
        if let Some(address) = self.bound.get(symbols) {
            return Ok(*address);
        }

        match self.bound.entry(symbols.clone()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let (symbol, address) = self.resolve(symbols)?;
                logging::log_symbol_linked(symbol, address.get());
                entry.insert(address);
                Ok(address)
            }
        }
    }

    /// Try the short name, then the long name, in every linker
    fn resolve<'s>(&self, symbols: &'s SymbolNames) -> Result<(&'s str, NativeAddress), LinkError> {
        let linkers = self.linkers.read();
        for candidate in symbols.candidates() {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            let found = self
                .registry
                .resolve_native_symbol(candidate)
                .or_else(|| linkers.iter().find_map(|l| l.resolve_native_symbol(candidate)));
            if let Some(address) = found {
                return Ok((candidate, address));
            }
        }
        Err(LinkError::SymbolNotFound {
            short: symbols.short.clone(),
            long: symbols.long.clone(),
        })
    }

    /// In-process implementation behind `address`, if there is one
    pub fn function(&self, address: NativeAddress) -> Option<Arc<dyn NativeFunction>> {
        self.registry.function(address)
    }

    /// Forget a binding so the next link resolves again
    pub fn unbind(&self, symbols: &SymbolNames) -> Option<NativeAddress> {
        self.bound.remove(symbols).map(|(_, address)| address)
    }

    pub fn clear(&self) {
        self.bound.clear();
    }

    /// Number of bound methods
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Symbol lookups performed so far (cache hits do not count)
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl Default for LinkageCache {
    fn default() -> Self {
        Self::new(Arc::new(NativeRegistry::new()))
    }
}
