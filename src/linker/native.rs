//! In-process native functions and their registry

use super::{Linker, NativeAddress};
use crate::runtime::NativeValue;
use crate::signature::{short_name, NativeMethod};
use crate::stub::NativeEnv;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Code a stub can call
///
/// Closures of the right shape implement this directly:
/// ```ignore
/// registry.register("Java_Counter_next", |_env: &mut NativeEnv<'_>, args: &[NativeValue]| {
///     NativeValue::Int(args[2].as_int().unwrap_or(0) + 1)
/// });
/// ```
pub trait NativeFunction: Send + Sync {
    fn call(&self, env: &mut NativeEnv<'_>, args: &[NativeValue]) -> NativeValue;
}

impl<F> NativeFunction for F
where
    F: Fn(&mut NativeEnv<'_>, &[NativeValue]) -> NativeValue + Send + Sync,
{
    #[inline]
    fn call(&self, env: &mut NativeEnv<'_>, args: &[NativeValue]) -> NativeValue {
        self(env, args)
    }
}

/// Registered functions get synthetic addresses in this range
const REGISTRY_BASE: usize = 0x7f00_0000_0000;
const REGISTRY_STRIDE: usize = 0x10;

/// Symbol table of natives bound at runtime, in the manner of `RegisterNatives`
///
/// Re-registering a symbol rebinds it; stubs that already linked keep the
/// old address until their linkage cache is cleared.
pub struct NativeRegistry {
    symbols: DashMap<String, NativeAddress>,
    functions: RwLock<Vec<Arc<dyn NativeFunction>>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self {
            symbols: DashMap::new(),
            functions: RwLock::new(Vec::new()),
        }
    }

    /// Bind `symbol` to `function`, returning its address
    pub fn register<F: NativeFunction + 'static>(&self, symbol: &str, function: F) -> NativeAddress {
        let address = {
            let mut functions = self.functions.write();
            functions.push(Arc::new(function));
            Self::address_of(functions.len() - 1)
        };
        self.symbols.insert(symbol.to_string(), address);
        address
    }

    /// Bind the short mangled name of `method`
    pub fn register_method<F: NativeFunction + 'static>(&self, method: &NativeMethod, function: F) -> NativeAddress {
        self.register(&short_name(method), function)
    }

    pub fn unregister(&self, symbol: &str) -> Option<NativeAddress> {
        self.symbols.remove(symbol).map(|(_, address)| address)
    }

    /// Function behind a registry address
    pub fn function(&self, address: NativeAddress) -> Option<Arc<dyn NativeFunction>> {
        let offset = address.get().checked_sub(REGISTRY_BASE)?;
        if offset % REGISTRY_STRIDE != 0 {
            return None;
        }
        self.functions.read().get(offset / REGISTRY_STRIDE).cloned()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn address_of(index: usize) -> NativeAddress {
        NativeAddress::from_usize(REGISTRY_BASE + index * REGISTRY_STRIDE)
            .unwrap_or_else(|| unreachable!("registry addresses start above zero"))
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for NativeRegistry {
    fn resolve_native_symbol(&self, name: &str) -> Option<NativeAddress> {
        self.symbols.get(name).map(|entry| *entry.value())
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("symbols", &self.symbols.len())
            .field("functions", &self.functions.read().len())
            .finish()
    }
}
