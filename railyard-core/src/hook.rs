//! Hook / Pluggable base (spec §4.A).
//!
//! Generalizes the teacher's per-method `Interceptor::around` chain into a
//! named extension point with two kinds of callback: `write` callbacks that
//! may transform the in-flight value, threaded in registration order, and
//! `read` callbacks that only observe the final value. This replaces the
//! class-inheritance / decorator plugin patterns the original system uses
//! with a plain registry of `(name, fn)` pairs (spec §9).

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

tokio::task_local! {
    /// Per-extension-point call depth for the current logical call stack.
    /// Scoped per task rather than shared process-wide, so concurrent
    /// controller lanes calling the same extension point from unrelated
    /// task trees never contend for the same budget — only genuine
    /// recursion (a callback that calls back into its own hook) does.
    static HOOK_DEPTH: RefCell<HashMap<&'static str, usize>>;
}

/// Context passed alongside the value to every callback in a chain.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub extension_point: &'static str,
}

type WriteFuture<V> = Pin<Box<dyn Future<Output = Result<V, HookError>> + Send>>;
type ReadFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

type WriteFn<V> = Arc<dyn Fn(V, HookContext) -> WriteFuture<V> + Send + Sync>;
type ReadFn<V: Clone> = Arc<dyn Fn(V, HookContext) -> ReadFuture + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unknown extension point: {0}")]
    UnknownExtensionPoint(String),
    #[error("re-entrant call into extension point {0} exceeded depth limit")]
    ReentrancyLimit(String),
    #[error("callback failed: {0}")]
    CallbackFailed(String),
}

/// Named sequence of write/read callbacks for a single extension point and
/// value type `V`. Write callbacks run first, in registration order,
/// threading `V` through each; read callbacks then observe the final value
/// without being able to change it (spec §4.A).
struct Chain<V: Clone> {
    writes: Vec<(&'static str, WriteFn<V>)>,
    reads: Vec<(&'static str, ReadFn<V>)>,
}

impl<V: Clone + Send + 'static> Chain<V> {
    fn new() -> Self {
        Self {
            writes: Vec::new(),
            reads: Vec::new(),
        }
    }
}

/// The maximum re-entrancy depth allowed into the same extension point from
/// within its own callbacks (spec §4.A: "detect and fail on cycles").
const MAX_REENTRANCY_DEPTH: usize = 8;

/// A hook exposes a fixed, declared-at-construction set of named extension
/// points. Calling an undeclared name is an error.
pub struct Hook<V: Clone + Send + 'static> {
    chains: RwLock<HashMap<&'static str, Chain<V>>>,
    closed: AtomicBool,
}

impl<V: Clone + Send + 'static> Hook<V> {
    /// Declare the set of extension-point names this hook owns.
    pub fn new(extension_points: impl IntoIterator<Item = &'static str>) -> Self {
        let mut chains = HashMap::new();
        for name in extension_points {
            chains.insert(name, Chain::new());
        }
        Self {
            chains: RwLock::new(chains),
            closed: AtomicBool::new(false),
        }
    }

    /// Names of every declared extension point (supplemental introspection,
    /// grounded on the teacher's `MetaRegistry` diagnostics).
    pub async fn extension_points(&self) -> Vec<&'static str> {
        self.chains.read().await.keys().copied().collect()
    }

    pub async fn register_write<F, Fut>(
        &self,
        name: &'static str,
        callback_name: &'static str,
        f: F,
    ) -> Result<(), HookError>
    where
        F: Fn(V, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, HookError>> + Send + 'static,
    {
        let mut chains = self.chains.write().await;
        let chain = chains
            .get_mut(name)
            .ok_or_else(|| HookError::UnknownExtensionPoint(name.to_string()))?;
        chain
            .writes
            .push((callback_name, Arc::new(move |v, ctx| Box::pin(f(v, ctx)))));
        Ok(())
    }

    pub async fn register_read<F, Fut>(
        &self,
        name: &'static str,
        callback_name: &'static str,
        f: F,
    ) -> Result<(), HookError>
    where
        F: Fn(V, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut chains = self.chains.write().await;
        let chain = chains
            .get_mut(name)
            .ok_or_else(|| HookError::UnknownExtensionPoint(name.to_string()))?;
        chain
            .reads
            .push((callback_name, Arc::new(move |v, ctx| Box::pin(f(v, ctx)))));
        Ok(())
    }

    /// Execute all write callbacks in registration order, threading the
    /// value, then invoke read callbacks with the final value. Exceptions
    /// (an `Err` from a write callback) abort further callbacks and
    /// propagate to the caller.
    pub async fn call(&self, name: &'static str, value: V) -> Result<V, HookError> {
        let ambient = HOOK_DEPTH.try_with(|depths| depths.borrow().clone()).unwrap_or_default();
        let current_depth = ambient.get(name).copied().unwrap_or(0) + 1;
        if current_depth > MAX_REENTRANCY_DEPTH {
            return Err(HookError::ReentrancyLimit(name.to_string()));
        }

        let mut scoped = ambient;
        scoped.insert(name, current_depth);

        HOOK_DEPTH.scope(RefCell::new(scoped), self.run_chain(name, value)).await
    }

    async fn run_chain(&self, name: &'static str, mut value: V) -> Result<V, HookError> {
        let (writes, reads) = {
            let chains = self.chains.read().await;
            let chain = chains
                .get(name)
                .ok_or_else(|| HookError::UnknownExtensionPoint(name.to_string()))?;
            (chain.writes.clone(), chain.reads.clone())
        };

        let ctx = HookContext { extension_point: name };
        for (_, write) in &writes {
            value = write(value, ctx.clone()).await?;
        }
        for (_, read) in &reads {
            read(value.clone(), ctx.clone()).await;
        }
        Ok(value)
    }
}

// `Chain` needs manual Clone of its callback vectors for the read-lock
// snapshot taken by `call` above.
impl<V: Clone> Clone for Chain<V> {
    fn clone(&self) -> Self {
        Self {
            writes: self.writes.clone(),
            reads: self.reads.clone(),
        }
    }
}
