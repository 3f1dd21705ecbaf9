//! callbridge - the call boundary of a managed runtime
//!
//! Two halves:
//! - `convention` decides where each argument of a call lives (register or
//!   stack slot) and how large the overflow area is
//! - `stub` synthesizes the managed-to-native transition for a method:
//!   handleization of references, frame-record transitions, cleanup and
//!   exception propagation
//!
//! `runtime` and `linker` hold the collaborators a stub runs against.

pub mod config;
pub mod convention;
pub mod error;
pub mod linker;
pub mod logging;
pub mod runtime;
pub mod signature;
pub mod stub;

pub use config::BoundaryConfig;
pub use convention::{resolve, Abi, CallLayout, CallingConvention, ConventionKind, FrameSide, LayoutCache, Location};
pub use error::{ConfigError, InvokeError, LinkError, PreconditionError};
pub use linker::{LinkageCache, NativeFunction, NativeRegistry};
pub use runtime::{Handle, ManagedException, NativeValue, ObjectSpace, ThreadContext, Value, VmThread};
pub use signature::{NativeMethod, ParameterKind, SignatureDescriptor};
pub use stub::{synthesize, Lightweight, Linkage, NativeEnv, Stub, StubGenerator, TraceMode};

use signature::HolderType;
use std::sync::Arc;

/// Everything shared by the threads of one runtime instance: layout and
/// stub caches, native bindings and the object space
pub struct Boundary {
    config: BoundaryConfig,
    layouts: LayoutCache,
    stubs: StubGenerator,
    linkage: LinkageCache,
    space: Arc<ObjectSpace>,
}

impl Boundary {
    pub fn new(config: BoundaryConfig) -> Self {
        Self {
            layouts: LayoutCache::new(),
            stubs: StubGenerator::from_config(&config.stubs),
            linkage: LinkageCache::new(Arc::new(NativeRegistry::new())),
            space: Arc::new(ObjectSpace::new()),
            config,
        }
    }

    /// Configuration from `callbridge.toml` (if found) and the environment
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut config = BoundaryConfig::discover();
        config.apply_env()?;
        Ok(Self::new(config))
    }

    #[inline]
    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &Arc<NativeRegistry> {
        self.linkage.registry()
    }

    #[inline]
    pub fn linkage(&self) -> &LinkageCache {
        &self.linkage
    }

    #[inline]
    pub fn space(&self) -> &Arc<ObjectSpace> {
        &self.space
    }

    #[inline]
    pub fn layouts(&self) -> &LayoutCache {
        &self.layouts
    }

    /// New managed thread sized by the handle configuration
    pub fn attach_thread(&self, name: &str) -> VmThread {
        VmThread::with_config(name, Arc::clone(&self.space), &self.config.handles)
    }

    /// Memoised layout on the configured ABI
    pub fn layout(&self, kinds: &[ParameterKind], kind: ConventionKind, side: FrameSide) -> Arc<CallLayout> {
        let convention = CallingConvention::new(self.config.convention.abi, kind);
        self.layouts.get_or_resolve(kinds, convention, side)
    }

    /// Memoised stub for `method`
    pub fn stub(&self, method: &NativeMethod, linkage: Linkage) -> Result<Arc<Stub>, PreconditionError> {
        self.stubs.stub_for(method, linkage)
    }

    /// Bind `method` to an in-process implementation
    pub fn register_native<F: NativeFunction + 'static>(&self, method: &NativeMethod, function: F) {
        self.linkage.registry().register_method(method, function);
    }

    /// Run `stub` on `thread` against this boundary's bindings
    pub fn invoke(&self, stub: &Stub, thread: &mut dyn ThreadContext, args: &[Value]) -> Result<Value, InvokeError> {
        stub.invoke(thread, &self.linkage, args)
    }

    /// Class mirror handed to static natives of `holder`
    pub fn class_mirror(&self, holder: &str) -> runtime::ObjectRef {
        self.space.class_mirror(&HolderType::new(holder))
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::new(BoundaryConfig::default())
    }
}
