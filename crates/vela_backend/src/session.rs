use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use vela_core::diagnostics::{Diagnostic, DiagnosticSink, Span};
use vela_core::types::Type;

use crate::intrinsics::{IntrinsicRegistry, IntrinsicResolver};
use crate::repr::{self, ReprClass, OBJECT};

/// Per-compilation context replacing the source system's hidden process-wide
/// registries.
///
/// A `Session` owns the epoch counter, the intrinsic registry and its
/// resolution cache, and the shared diagnostic sink. Repeated or concurrent
/// compilations in one process each get their own session, so no state leaks
/// across runs; [`Session::reset`] advances the epoch instead of mutating
/// globals.
#[derive(Debug)]
pub struct Session {
    epoch: AtomicU64,
    resolver: IntrinsicResolver,
    sink: Mutex<DiagnosticSink>,
}

impl Session {
    pub fn new(registry: IntrinsicRegistry) -> Session {
        Session {
            epoch: AtomicU64::new(0),
            resolver: IntrinsicResolver::new(registry),
            sink: Mutex::new(DiagnosticSink::new()),
        }
    }

    /// The current regeneration epoch. Zero until the first reset; non-zero
    /// epochs suffix generated class names so regenerated classes never
    /// collide in-process with stale artifacts.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Invalidates memoized intrinsic resolutions and advances the epoch.
    /// The counter only ever increments.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::Relaxed);
        self.resolver.reset_cache();
    }

    pub fn resolver(&self) -> &IntrinsicResolver {
        &self.resolver
    }

    pub fn internal_error(&self, span: Span, message: impl Into<String>) {
        self.sink.lock().internal_error(span, message);
    }

    pub fn warning(&self, span: Span, message: impl Into<String>) {
        self.sink.lock().warning(span, message);
    }

    pub fn push_checkpoint(&self) {
        self.sink.lock().push_checkpoint();
    }

    pub fn pop_checkpoint(&self) -> usize {
        self.sink.lock().pop_checkpoint()
    }

    pub fn errors_since_checkpoint(&self) -> usize {
        self.sink.lock().errors_since_checkpoint()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.lock().diagnostics().to_vec()
    }

    /// Maps `ty` to its representation, funneling mapper failures into the
    /// sink. On failure the unit is already doomed, so lowering continues
    /// best-effort with `Object`.
    pub(crate) fn repr_of(&self, ty: &Type, span: Span) -> ReprClass {
        match repr::map(ty) {
            Ok(mapped) => {
                if let Some(warning) = mapped.warning {
                    self.warning(span, warning);
                }
                mapped.repr
            }
            Err(err) => {
                self.internal_error(span, err.to_string());
                OBJECT
            }
        }
    }
}
