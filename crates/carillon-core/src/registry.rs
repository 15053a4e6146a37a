//! Tracks which SynthDefs the engine already knows.

use crate::errors::Result;
use crate::transport::EngineTransport;
use carillon_dsp::GraphIR;
use std::collections::HashSet;

/// Registers each definition name with the engine at most once.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    registered: HashSet<String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `def` unless a definition with the same name was already
    /// registered. Returns whether anything was sent.
    pub fn ensure_registered<T: EngineTransport>(
        &mut self,
        transport: &mut T,
        def: &GraphIR,
    ) -> Result<bool> {
        if self.registered.contains(&def.name) {
            log::debug!("[SYNTHDEF] '{}' already registered", def.name);
            return Ok(false);
        }
        transport.register_definition(def)?;
        log::info!("[SYNTHDEF] Registered '{}'", def.name);
        self.registered.insert(def.name.clone());
        Ok(true)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains(name)
    }
}
