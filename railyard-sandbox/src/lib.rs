//! Module evaluator (spec §4.D): runs compiled test sources inside an
//! embedded JS engine, resolving `require` against a pre-built
//! `ModuleGraph` instead of touching the filesystem a second time.
//!
//! A `Sandbox` is deliberately not `Send`/`Sync` — boa's `Context` and
//! `JsValue` are thread-confined, which matches the one-sandbox-per-
//! worker-thread execution model a [`railyard_worker`] instance drives.

mod require;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::ObjectInitializer;
use boa_engine::{js_string, native_function::NativeFunction, Context, JsValue, Source};
use railyard_core::{ModuleGraph, RailyardError};

/// Shared between the top-level `Sandbox` and every `require` closure it
/// hands out, so a cyclic require reaches the same cache (spec §4.D).
struct SandboxState {
    graph: ModuleGraph,
    cache: HashMap<String, JsValue>,
    in_progress: HashMap<String, JsValue>,
}

pub struct Sandbox {
    context: Context,
    state: Rc<RefCell<SandboxState>>,
}

impl Sandbox {
    pub fn new(graph: ModuleGraph) -> Self {
        let context = Context::default();
        let state = Rc::new(RefCell::new(SandboxState {
            graph,
            cache: HashMap::new(),
            in_progress: HashMap::new(),
        }));
        let mut sandbox = Self { context, state };
        sandbox.install_console();
        sandbox
    }

    /// Evaluate `entry_path`'s compiled source, running its top-level
    /// body and caching its `module.exports` value.
    pub fn load(&mut self, entry_path: &str, compiled_source: &[u8]) -> Result<(), RailyardError> {
        let state = self.state.clone();
        require::evaluate_module(&state, &mut self.context, entry_path, compiled_source)
            .map_err(|e| RailyardError::SandboxError(describe(&e)))?;
        Ok(())
    }

    /// Invoke the entry module's default export with `args` as its sole
    /// argument, draining the job queue so a returned promise settles
    /// before the outcome is reported (spec §4.G "the default top-level
    /// export is invoked; its resolved/rejected outcome determines
    /// pass/fail").
    pub fn run_default_export(
        &mut self,
        entry_path: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RailyardError> {
        let exports = self
            .state
            .borrow()
            .cache
            .get(entry_path)
            .cloned()
            .ok_or_else(|| RailyardError::SandboxError(format!("module not loaded: {entry_path}")))?;

        let default_export = exports
            .as_object()
            .and_then(|obj| obj.get(js_string!("default"), &mut self.context).ok())
            .filter(|v| !v.is_undefined())
            .unwrap_or(exports);

        let func = default_export.as_object().ok_or_else(|| {
            RailyardError::SandboxError("module's default export is not callable".to_string())
        })?;

        let js_args = json_to_js(&args, &mut self.context)
            .map_err(|e| RailyardError::SandboxError(describe(&e)))?;

        let result = func
            .call(&JsValue::undefined(), &[js_args], &mut self.context)
            .map_err(|e| RailyardError::SandboxError(describe(&e)))?;

        let settled = self
            .drain_until_settled(result)
            .map_err(|e| RailyardError::SandboxError(describe(&e)))?;

        settled
            .to_json(&mut self.context)
            .map(|opt| opt.unwrap_or(serde_json::Value::Null))
            .map_err(|e| RailyardError::SandboxError(describe(&e)))
    }

    /// Drop every cached module instance; the next `load` re-evaluates
    /// from source (spec §4.D `clearCache`).
    pub fn clear_cache(&mut self) {
        let mut state = self.state.borrow_mut();
        state.cache.clear();
        state.in_progress.clear();
    }

    fn drain_until_settled(&mut self, value: JsValue) -> boa_engine::JsResult<JsValue> {
        let Some(promise) = value.as_promise() else {
            return Ok(value);
        };
        self.context.run_jobs();
        match promise.state() {
            PromiseState::Fulfilled(result) => Ok(result),
            PromiseState::Rejected(err) => Err(boa_engine::JsError::from_opaque(err)),
            PromiseState::Pending => Err(boa_engine::JsError::from_native(
                boa_engine::JsNativeError::error()
                    .with_message("test's returned promise never settled"),
            )),
        }
    }

    fn install_console(&mut self) {
        let console = ObjectInitializer::new(&mut self.context)
            .function(console_fn(), js_string!("log"), 0)
            .function(console_fn(), js_string!("info"), 0)
            .function(console_warn_fn(), js_string!("warn"), 0)
            .function(console_error_fn(), js_string!("error"), 0)
            .function(console_fn(), js_string!("debug"), 0)
            .build();
        self.context
            .register_global_property(
                js_string!("console"),
                console,
                boa_engine::property::Attribute::all(),
            )
            .expect("console is registered exactly once per sandbox");
    }
}

fn console_fn() -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(|_this, args, context| {
            tracing::info!(target: "railyard_sandbox::console", "{}", join_args(args, context));
            Ok(JsValue::undefined())
        })
    }
}

fn console_warn_fn() -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(|_this, args, context| {
            tracing::warn!(target: "railyard_sandbox::console", "{}", join_args(args, context));
            Ok(JsValue::undefined())
        })
    }
}

fn console_error_fn() -> NativeFunction {
    unsafe {
        NativeFunction::from_closure(|_this, args, context| {
            tracing::error!(target: "railyard_sandbox::console", "{}", join_args(args, context));
            Ok(JsValue::undefined())
        })
    }
}

fn join_args(args: &[JsValue], context: &mut Context) -> String {
    args.iter()
        .map(|a| {
            a.to_string(context)
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_else(|_| "<unprintable>".to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn json_to_js(
    value: &serde_json::Value,
    context: &mut Context,
) -> boa_engine::JsResult<JsValue> {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    let expr = format!("({text})");
    context.eval(Source::from_bytes(expr.as_bytes()))
}

fn describe(err: &boa_engine::JsError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use railyard_core::ModuleGraph;

    #[test]
    fn loads_and_runs_default_export() {
        let sandbox_path = "/virtual/entry.js";
        let mut sandbox = Sandbox::new(ModuleGraph::new());
        sandbox
            .load(
                sandbox_path,
                b"module.exports = function(x) { return x + 1; };",
            )
            .unwrap();
        let result = sandbox
            .run_default_export(sandbox_path, serde_json::json!(41))
            .unwrap();
        assert_eq!(result, serde_json::json!(42));
    }

    #[test]
    fn require_resolves_through_module_graph() {
        let mut graph = ModuleGraph::new();
        graph.add_edge(
            "/virtual/entry.js",
            "./lib",
            "/virtual/lib.js",
            b"module.exports = 7;".to_vec(),
        );
        let mut sandbox = Sandbox::new(graph);
        sandbox
            .load(
                "/virtual/entry.js",
                b"module.exports = function() { return require('./lib'); };",
            )
            .unwrap();
        let result = sandbox
            .run_default_export("/virtual/entry.js", serde_json::Value::Null)
            .unwrap();
        assert_eq!(result, serde_json::json!(7));
    }

    #[test]
    fn missing_require_spec_is_a_sandbox_error() {
        let mut sandbox = Sandbox::new(ModuleGraph::new());
        sandbox
            .load(
                "/virtual/entry.js",
                b"module.exports = function() { return require('./missing'); };",
            )
            .unwrap();
        let err = sandbox
            .run_default_export("/virtual/entry.js", serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, RailyardError::SandboxError(msg) if msg.contains("ModuleNotFound")));
    }

    #[test]
    fn circular_requires_return_partial_exports() {
        let mut graph = ModuleGraph::new();
        graph.add_edge(
            "/virtual/a.js",
            "./b",
            "/virtual/b.js",
            b"exports.value = require('./a');".to_vec(),
        );
        graph.add_edge(
            "/virtual/b.js",
            "./a",
            "/virtual/a.js",
            b"module.exports = function() { return require('./b'); };".to_vec(),
        );
        let mut sandbox = Sandbox::new(graph);
        // Should terminate rather than recurse infinitely; the exact
        // partial-exports shape isn't asserted here, just termination.
        sandbox
            .load(
                "/virtual/a.js",
                b"module.exports = function() { return require('./b'); };",
            )
            .unwrap();
    }
}
