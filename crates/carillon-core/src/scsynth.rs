//! High-level API for the SuperCollider synthesis server (scsynth).
//!
//! This module wraps the handful of server commands the instrument needs:
//!
//! - Checking the server is reachable (`/status`)
//! - Loading SynthDefs (`/d_recv`)
//! - Creating groups (`/g_new`) and synth nodes (`/s_new`)

use crate::config::EngineSettings;
use crate::errors::{CarillonError, Result};
use crate::osc::OscClient;
use rosc::{OscMessage, OscType};

/// Action for adding nodes to the node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAction {
    /// Add to head of target group (first to execute).
    AddToHead = 0,
    /// Add to tail of target group (last to execute).
    AddToTail = 1,
    /// Add immediately before target node.
    AddBefore = 2,
    /// Add immediately after target node.
    AddAfter = 3,
    /// Replace target node.
    AddReplace = 4,
}

impl From<AddAction> for i32 {
    fn from(action: AddAction) -> Self {
        action as i32
    }
}

/// Node ID for synth and group nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Create a new NodeId with an explicit value.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// The root group (0).
    pub fn root() -> Self {
        Self(0)
    }

    /// Get the inner i32 value.
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<i32> for NodeId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters reported by `/status.reply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub ugens: i32,
    pub synths: i32,
    pub groups: i32,
    pub synthdefs: i32,
}

impl ServerStatus {
    fn from_reply(msg: &OscMessage) -> Self {
        let int_at = |i: usize| match msg.args.get(i) {
            Some(OscType::Int(v)) => *v,
            _ => 0,
        };
        Self {
            ugens: int_at(1),
            synths: int_at(2),
            groups: int_at(3),
            synthdefs: int_at(4),
        }
    }
}

/// High-level client for interacting with scsynth.
pub struct Scsynth {
    /// The underlying OSC client.
    pub osc: OscClient,
    /// Group created by [`EngineTransport::create_default_group`](crate::transport::EngineTransport::create_default_group).
    pub(crate) default_group: NodeId,
}

impl std::fmt::Debug for Scsynth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scsynth")
            .field("addr", &self.osc.addr)
            .field("default_group", &self.default_group)
            .finish_non_exhaustive()
    }
}

impl Scsynth {
    /// Connect to scsynth as described by `settings`.
    ///
    /// UDP has no handshake, so the server is pinged with `/status`; no
    /// reply within the timeout means the connection failed.
    pub fn connect(settings: &EngineSettings) -> Result<Self> {
        let osc = OscClient::new(
            &settings.local_addr,
            &settings.server_addr,
            settings.timeout,
        )?;
        let scsynth = Self {
            osc,
            default_group: settings.default_group(),
        };
        let status = scsynth.status()?;
        log::info!(
            "Connected to scsynth at {} ({} synths, {} groups, {} synthdefs loaded)",
            settings.server_addr,
            status.synths,
            status.groups,
            status.synthdefs
        );
        Ok(scsynth)
    }

    /// Query server counters.
    pub fn status(&self) -> Result<ServerStatus> {
        self.osc.send_msg("/status", vec![])?;
        self.osc.wait_for("/status", |msg| {
            (msg.addr == "/status.reply").then(|| ServerStatus::from_reply(msg))
        })
    }

    /// Load a SynthDef from raw bytes and wait for the server to confirm.
    pub fn d_recv_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        self.osc.send_msg("/d_recv", vec![OscType::Blob(bytes)])?;
        self.osc.wait_for("/d_recv", |msg| command_reply(msg, "/d_recv"))?
    }

    /// Create a new synth node.
    ///
    /// # Arguments
    /// * `def` - SynthDef name
    /// * `node_id` - Node ID
    /// * `add_action` - Where to add the node
    /// * `target` - Target node for placement
    /// * `controls` - Initial control values
    pub fn s_new(
        &self,
        def: &str,
        node_id: NodeId,
        add_action: AddAction,
        target: NodeId,
        controls: &[(&str, f32)],
    ) -> Result<()> {
        let mut args: Vec<OscType> = vec![
            OscType::String(def.to_string()),
            OscType::Int(node_id.as_i32()),
            OscType::Int(add_action.into()),
            OscType::Int(target.as_i32()),
        ];
        for (k, v) in controls {
            args.push(OscType::String(k.to_string()));
            args.push(OscType::Float(*v));
        }

        log::debug!(
            "[OSC] /s_new: def='{}', node={}, action={}, target={}, controls={:?}",
            def,
            node_id,
            add_action as i32,
            target,
            controls
        );

        self.osc.send_msg("/s_new", args)
    }

    /// Create a new group node.
    pub fn g_new(&self, node_id: NodeId, add_action: AddAction, target: NodeId) -> Result<()> {
        log::debug!(
            "[OSC] /g_new: node={}, action={}, target={}",
            node_id,
            add_action as i32,
            target
        );
        self.osc.send_msg(
            "/g_new",
            vec![
                OscType::Int(node_id.as_i32()),
                OscType::Int(add_action.into()),
                OscType::Int(target.as_i32()),
            ],
        )
    }
}

/// Turn `/done <cmd>` into `Ok` and `/fail <cmd> <reason>` into an error;
/// anything else is not a reply to `cmd`.
fn command_reply(msg: &OscMessage, cmd: &str) -> Option<Result<()>> {
    let first_is_cmd = matches!(msg.args.first(), Some(OscType::String(s)) if s == cmd);
    match msg.addr.as_str() {
        "/done" if first_is_cmd => Some(Ok(())),
        "/fail" if first_is_cmd => {
            let reason = match msg.args.get(1) {
                Some(OscType::String(s)) => s.clone(),
                _ => "unknown error".to_string(),
            };
            Some(Err(CarillonError::Rejected {
                command: cmd.to_string(),
                reason,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn test_node_id() {
        assert_eq!(NodeId::root().as_i32(), 0);
        assert_eq!(NodeId::new(42).as_i32(), 42);
        assert_eq!(NodeId::from(7), NodeId(7));
        assert!(NodeId::new(1000) < NodeId::new(1001));
    }

    #[test]
    fn test_add_action() {
        assert_eq!(AddAction::AddToHead as i32, 0);
        assert_eq!(AddAction::AddToTail as i32, 1);
        assert_eq!(AddAction::AddBefore as i32, 2);
        assert_eq!(AddAction::AddAfter as i32, 3);
        assert_eq!(AddAction::AddReplace as i32, 4);
    }

    #[test]
    fn test_command_reply() {
        let done = reply("/done", vec![OscType::String("/d_recv".into())]);
        assert!(matches!(command_reply(&done, "/d_recv"), Some(Ok(()))));

        let fail = reply(
            "/fail",
            vec![
                OscType::String("/d_recv".into()),
                OscType::String("bad def".into()),
            ],
        );
        match command_reply(&fail, "/d_recv") {
            Some(Err(CarillonError::Rejected { reason, .. })) => assert_eq!(reason, "bad def"),
            other => panic!("Expected rejection, got {:?}", other),
        }

        let other_done = reply("/done", vec![OscType::String("/b_alloc".into())]);
        assert!(command_reply(&other_done, "/d_recv").is_none());
        assert!(command_reply(&reply("/n_go", vec![]), "/d_recv").is_none());
    }

    #[test]
    fn test_status_reply_parsing() {
        let msg = reply(
            "/status.reply",
            vec![
                OscType::Int(1),
                OscType::Int(120),
                OscType::Int(3),
                OscType::Int(2),
                OscType::Int(40),
                OscType::Float(1.5),
            ],
        );
        let status = ServerStatus::from_reply(&msg);
        assert_eq!(status.ugens, 120);
        assert_eq!(status.synths, 3);
        assert_eq!(status.groups, 2);
        assert_eq!(status.synthdefs, 40);
    }
}
