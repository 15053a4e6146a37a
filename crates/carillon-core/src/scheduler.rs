//! Instance scheduler.
//!
//! Consumes note events strictly in arrival order. Each event is mapped to
//! controls, given a fresh node ID, and sent as one instantiate call; the
//! next event is not looked at until that call has returned.

use crate::errors::Result;
use crate::mapper::EventMapper;
use crate::midi::NoteEvent;
use crate::scsynth::{AddAction, NodeId};
use crate::transport::{EngineTransport, GroupHandle};
use crossbeam_channel::{select, Receiver};
use serde::{Deserialize, Serialize};

/// What a failed instantiate call does to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log a warning, drop the note, keep going.
    #[default]
    Log,
    /// Stop and return the error.
    Fatal,
}

/// Hands out node IDs in strictly increasing order. IDs are never reused,
/// including those whose instantiate call failed.
#[derive(Debug, Clone)]
pub struct InstanceIdAllocator {
    next: i32,
}

impl InstanceIdAllocator {
    pub fn starting_at(first: NodeId) -> Self {
        Self {
            next: first.as_i32(),
        }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next);
        self.next += 1;
        id
    }
}

/// Counters reported when the event loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Events taken off the stream.
    pub events: u64,
    /// Events whose instantiate call failed.
    pub dropped: u64,
    /// Last ID handed out, if any.
    pub last_id: Option<NodeId>,
}

/// Why [`InstanceScheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The event stream's sender went away.
    EndOfStream,
    /// A shutdown message arrived (or the shutdown sender went away).
    Shutdown,
}

/// Turns note events into instantiate calls on an [`EngineTransport`].
pub struct InstanceScheduler<T: EngineTransport> {
    transport: T,
    mapper: EventMapper,
    group: GroupHandle,
    def_name: String,
    ids: InstanceIdAllocator,
    policy: FailurePolicy,
    summary: SessionSummary,
}

impl<T: EngineTransport> InstanceScheduler<T> {
    pub fn new(
        transport: T,
        mapper: EventMapper,
        group: GroupHandle,
        def_name: impl Into<String>,
        ids: InstanceIdAllocator,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            transport,
            mapper,
            group,
            def_name: def_name.into(),
            ids,
            policy,
            summary: SessionSummary::default(),
        }
    }

    /// Process one event.
    ///
    /// Returns the node ID on success. Under [`FailurePolicy::Log`] a failed
    /// call yields `Ok(None)`; under [`FailurePolicy::Fatal`] the error is
    /// returned.
    pub fn handle_event(&mut self, event: NoteEvent) -> Result<Option<NodeId>> {
        let params = self.mapper.map_event(event);
        let id = self.ids.next_id();
        self.summary.events += 1;
        self.summary.last_id = Some(id);

        log::debug!(
            "[NOTE] pitch={} velocity={} -> node {} (amp={:.3}, dur={}, fund={:.2})",
            event.pitch,
            event.velocity,
            id,
            params.amp,
            params.dur,
            params.fund
        );

        match self.transport.instantiate(
            self.group,
            &self.def_name,
            id,
            AddAction::AddToTail,
            &params,
        ) {
            Ok(id) => Ok(Some(id)),
            Err(e) => match self.policy {
                FailurePolicy::Log => {
                    self.summary.dropped += 1;
                    log::warn!("Dropping note {} (node {}): {}", event.pitch, id, e);
                    Ok(None)
                }
                FailurePolicy::Fatal => Err(e),
            },
        }
    }

    /// Run until the event stream ends or `shutdown` fires.
    ///
    /// Events still queued when shutdown is requested may be discarded.
    pub fn run(&mut self, events: &Receiver<NoteEvent>, shutdown: &Receiver<()>) -> Result<StopReason> {
        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        self.handle_event(event)?;
                    }
                    Err(_) => {
                        log::info!("Event stream closed");
                        return Ok(StopReason::EndOfStream);
                    }
                },
                recv(shutdown) -> _ => {
                    log::info!("Shutdown requested");
                    return Ok(StopReason::Shutdown);
                }
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn group(&self) -> GroupHandle {
        self.group
    }

    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
