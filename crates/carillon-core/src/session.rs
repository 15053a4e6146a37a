//! Session startup: everything that has to happen once before the first
//! note can be played.

use crate::config::Config;
use crate::errors::Result;
use crate::registry::DefinitionRegistry;
use crate::scheduler::{InstanceIdAllocator, InstanceScheduler};
use crate::scsynth::NodeId;
use crate::transport::EngineTransport;
use carillon_dsp::{build_bell_synthdef, min_note_duration, GraphIR, NormalizedPartialTable};

/// Build the bell definition named by `[instrument] synthdef`.
pub fn bell_definition(config: &Config) -> Result<GraphIR> {
    let table = NormalizedPartialTable::bell()?;
    Ok(build_bell_synthdef(&config.instrument.synthdef, &table)?)
}

/// A started session.
pub struct Session;

impl Session {
    /// Register the bell definition, create the default group, and return
    /// a scheduler ready to consume note events.
    ///
    /// Any error here is fatal to the session.
    pub fn start<T: EngineTransport>(mut transport: T, config: &Config) -> Result<InstanceScheduler<T>> {
        config.validate()?;
        let table = NormalizedPartialTable::bell()?;
        let def = build_bell_synthdef(&config.instrument.synthdef, &table)?;
        let mapper = config
            .event_mapper()
            .with_min_duration(min_note_duration(&table));

        let mut registry = DefinitionRegistry::new();
        registry.ensure_registered(&mut transport, &def)?;

        let group = transport.create_default_group()?;
        log::info!("Default group {} ready", group.node_id());

        Ok(InstanceScheduler::new(
            transport,
            mapper,
            group,
            def.name,
            InstanceIdAllocator::starting_at(NodeId::new(config.engine.first_node_id)),
            config.pipeline.on_instantiate_error,
        ))
    }
}
