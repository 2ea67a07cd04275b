//! In-memory [`railyard_core::Compiler`] stub (spec §3.4): either echoes
//! the source back unchanged or returns a scripted failure, so sandbox
//! and controller tests never shell out to a real toolchain.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use railyard_core::{Compiler, RailyardError};

#[derive(Default)]
pub struct ScriptedCompiler {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    outputs: HashMap<String, Vec<u8>>,
    failures: HashMap<String, String>,
    requests: Vec<String>,
}

impl ScriptedCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the bytes returned for `filename`; files not scripted are
    /// echoed back unchanged.
    pub fn set_output(&self, filename: &str, output: Vec<u8>) {
        self.state.lock().unwrap().outputs.insert(filename.to_string(), output);
    }

    pub fn fail(&self, filename: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(filename.to_string(), message.to_string());
    }

    pub fn requested_filenames(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    async fn compile(&self, source: &[u8], filename: &str) -> Result<Vec<u8>, RailyardError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(filename.to_string());

        if let Some(message) = state.failures.get(filename).cloned() {
            return Err(RailyardError::CompileError(message));
        }
        Ok(state.outputs.get(filename).cloned().unwrap_or_else(|| source.to_vec()))
    }
}
