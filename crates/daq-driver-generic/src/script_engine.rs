use anyhow::{anyhow, Context, Result};
use daq_plugin_api::config::InstrumentConfig;
use rhai::{Engine, Scope, AST};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct CompiledScripts {
    scripts: HashMap<String, Arc<AST>>,
}

impl CompiledScripts {
    pub fn compile_from_config(config: &InstrumentConfig, engine: &Engine) -> Result<Self> {
        Ok(Self {
            scripts: HashMap::new(),
        }) // Placeholder for now
    }
    pub fn get(&self, name: &str) -> Option<Arc<AST>> {
        self.scripts.get(name).cloned()
    }
    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

#[derive(Clone)]
pub struct ScriptContext {
    pub address: String,
    pub input: Option<f64>,
    pub parameters: Arc<HashMap<String, f64>>,
}

impl ScriptContext {
    pub fn new(address: &str, input: Option<f64>, parameters: HashMap<String, f64>) -> Self {
        Self {
            address: address.to_string(),
            input,
            parameters: Arc::new(parameters),
        }
    }
}

pub struct ScriptEngineConfig {
    pub max_operations: u64,
}
impl Default for ScriptEngineConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
        }
    }
}

pub fn create_sandboxed_engine(config: &ScriptEngineConfig) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(config.max_operations);
    engine
}

pub enum ScriptResult {
    None,
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
}

pub async fn execute_script_async(
    _engine: Arc<Engine>,
    _ast: Arc<AST>,
    _context: &ScriptContext,
    _timeout: Duration,
) -> Result<ScriptResult> {
    Err(anyhow!("Not implemented"))
}
