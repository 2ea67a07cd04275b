//! CommonJS module loader: wraps a compiled source in a function shim and
//! evaluates it with an injected `require`/`module`/`exports` surface,
//! resolving `require` specifiers against the pre-built dependency graph
//! rather than hitting the filesystem again (spec §4.D).

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, ObjectInitializer},
    property::Attribute,
    Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsValue, Source,
};

use crate::SandboxState;

/// Evaluate (or return the cached / in-progress instance of) the module
/// whose resolved path is `abs_path`. Re-entry while `abs_path` is still
/// `in_progress` returns the partially-populated `exports` object,
/// matching Node's circular-require behaviour (spec §4.D edge cases).
pub(crate) fn evaluate_module(
    state: &Rc<RefCell<SandboxState>>,
    context: &mut Context,
    abs_path: &str,
    source: &[u8],
) -> JsResult<JsValue> {
    if let Some(cached) = state.borrow().cache.get(abs_path) {
        return Ok(cached.clone());
    }
    if let Some(partial) = state.borrow().in_progress.get(abs_path) {
        return Ok(partial.clone());
    }

    let exports = ObjectInitializer::new(context).build();
    let module = ObjectInitializer::new(context)
        .property(js_string!("exports"), exports.clone(), Attribute::all())
        .build();

    state
        .borrow_mut()
        .in_progress
        .insert(abs_path.to_string(), JsValue::from(exports.clone()));

    let mut run = || -> JsResult<JsValue> {
        let text = String::from_utf8_lossy(source);
        let wrapped = format!(
            "(function(require, module, exports, __dirname, __filename) {{\n{text}\n}})"
        );
        let wrapper = context.eval(Source::from_bytes(wrapped.as_bytes()))?;
        let wrapper_fn = wrapper.as_object().ok_or_else(|| {
            JsError::from_native(
                JsNativeError::typ().with_message("module body did not evaluate to a function"),
            )
        })?;

        let dirname = std::path::Path::new(abs_path)
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let require_fn = make_require_function(state.clone(), abs_path.to_string(), context);

        let call_args = [
            JsValue::from(require_fn),
            JsValue::from(module.clone()),
            JsValue::from(exports.clone()),
            JsValue::from(js_string!(dirname)),
            JsValue::from(js_string!(abs_path)),
        ];
        wrapper_fn.call(&JsValue::undefined(), &call_args, context)?;

        module.get(js_string!("exports"), context)
    };

    let result = run();
    state.borrow_mut().in_progress.remove(abs_path);

    match result {
        Ok(final_exports) => {
            state
                .borrow_mut()
                .cache
                .insert(abs_path.to_string(), final_exports.clone());
            Ok(final_exports)
        }
        Err(err) => Err(err),
    }
}

fn make_require_function(
    state: Rc<RefCell<SandboxState>>,
    current_path: String,
    context: &mut Context,
) -> JsObject {
    FunctionObjectBuilder::new(context.realm(), unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            let spec = args
                .get_or_undefined(0)
                .to_string(context)?
                .to_std_string_escaped();

            let resolved = state.borrow().graph.resolve(&current_path, &spec).cloned();
            let Some(module_file) = resolved else {
                return Err(JsError::from_native(JsNativeError::error().with_message(
                    format!("ModuleNotFound: \"{spec}\" required from {current_path}"),
                )));
            };

            evaluate_module(
                &state,
                context,
                &module_file.resolved_path,
                &module_file.bytes,
            )
        })
    })
    .name(js_string!("require"))
    .length(1)
    .build()
    .into()
}
