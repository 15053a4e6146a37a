//! The engine seam: everything the pipeline asks of the synthesis server.
//!
//! [`Scsynth`] is the real implementation; tests drive the pipeline with
//! recording fakes.

use crate::errors::Result;
use crate::mapper::ControlParameters;
use crate::scsynth::{AddAction, NodeId, Scsynth};
use carillon_dsp::{encode_synthdef, GraphIR};

/// A group on the server that new instances are placed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub NodeId);

impl GroupHandle {
    pub fn node_id(self) -> NodeId {
        self.0
    }
}

/// Commands the note pipeline sends to a synthesis engine.
pub trait EngineTransport {
    /// Make `def` available under `def.name`. Blocks until the engine
    /// acknowledges or rejects it.
    fn register_definition(&mut self, def: &GraphIR) -> Result<()>;

    /// Create the group all instances are added to.
    fn create_default_group(&mut self) -> Result<GroupHandle>;

    /// Start one instance of `def_name` with the given controls.
    fn instantiate(
        &mut self,
        group: GroupHandle,
        def_name: &str,
        id: NodeId,
        add_action: AddAction,
        params: &ControlParameters,
    ) -> Result<NodeId>;
}

impl EngineTransport for Scsynth {
    fn register_definition(&mut self, def: &GraphIR) -> Result<()> {
        let bytes = encode_synthdef(def)?;
        log::info!(
            "[SYNTHDEF] Sending '{}' ({} bytes, {} ugens)",
            def.name,
            bytes.len(),
            def.nodes.len()
        );
        self.d_recv_bytes(bytes)
    }

    fn create_default_group(&mut self) -> Result<GroupHandle> {
        let group = self.default_group;
        self.g_new(group, AddAction::AddToHead, NodeId::root())?;
        Ok(GroupHandle(group))
    }

    fn instantiate(
        &mut self,
        group: GroupHandle,
        def_name: &str,
        id: NodeId,
        add_action: AddAction,
        params: &ControlParameters,
    ) -> Result<NodeId> {
        self.s_new(def_name, id, add_action, group.node_id(), &params.to_controls())?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::osc::OscClient;
    use rosc::{encoder, OscPacket, OscType};
    use std::net::UdpSocket;
    use std::time::Duration;

    /// Minimal stand-in for scsynth: answers `/status` and `/d_recv`,
    /// and hands every received message back to the test.
    fn fake_server(
        reply_to_d_recv: Option<&'static str>,
    ) -> (String, std::thread::JoinHandle<Vec<rosc::OscMessage>>) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let addr = sock.local_addr().unwrap().to_string();

        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buf = [0u8; 65536];
            while let Ok((size, from)) = sock.recv_from(&mut buf) {
                let (_, packet) = rosc::decoder::decode_udp(&buf[..size]).unwrap();
                let OscPacket::Message(msg) = packet else {
                    continue;
                };
                let reply = match (msg.addr.as_str(), reply_to_d_recv) {
                    ("/status", _) => Some(OscClient::msg(
                        "/status.reply",
                        vec![
                            OscType::Int(1),
                            OscType::Int(0),
                            OscType::Int(0),
                            OscType::Int(1),
                            OscType::Int(0),
                        ],
                    )),
                    ("/d_recv", Some(path)) => Some(OscClient::msg(
                        path,
                        vec![
                            OscType::String("/d_recv".into()),
                            OscType::String("refused".into()),
                        ],
                    )),
                    _ => None,
                };
                if let Some(reply) = reply {
                    sock.send_to(&encoder::encode(&reply).unwrap(), from).unwrap();
                }
                seen.push(msg);
            }
            seen
        });
        (addr, handle)
    }

    fn settings(server_addr: String) -> EngineSettings {
        EngineSettings {
            server_addr,
            timeout: Duration::from_millis(300),
            ..EngineSettings::default()
        }
    }

    fn bell() -> GraphIR {
        let table = carillon_dsp::NormalizedPartialTable::bell().unwrap();
        carillon_dsp::build_bell_synthdef("bells", &table).unwrap()
    }

    #[test]
    fn test_connect_requires_status_reply() {
        // Nothing listens on this socket's peer, so /status goes unanswered
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let err = Scsynth::connect(&settings(silent.local_addr().unwrap().to_string())).unwrap_err();
        assert!(matches!(err, crate::CarillonError::Timeout { .. }));
    }

    #[test]
    fn test_scsynth_command_sequence() {
        let (addr, server) = fake_server(Some("/done"));
        let mut scsynth = Scsynth::connect(&settings(addr)).unwrap();

        scsynth.register_definition(&bell()).unwrap();
        let group = scsynth.create_default_group().unwrap();
        assert_eq!(group, GroupHandle(NodeId::new(1)));

        let params = ControlParameters {
            amp: 1.0,
            dur: 2.0,
            fund: 440.0,
        };
        let id = scsynth
            .instantiate(group, "bells", NodeId::new(1000), AddAction::AddToTail, &params)
            .unwrap();
        assert_eq!(id, NodeId::new(1000));
        drop(scsynth);

        let seen = server.join().unwrap();
        let paths: Vec<_> = seen.iter().map(|m| m.addr.as_str()).collect();
        assert_eq!(paths, ["/status", "/d_recv", "/g_new", "/s_new"]);

        match &seen[1].args[0] {
            OscType::Blob(bytes) => assert_eq!(&bytes[..4], b"SCgf"),
            other => panic!("Expected blob, got {:?}", other),
        }
        assert_eq!(
            seen[2].args,
            vec![OscType::Int(1), OscType::Int(0), OscType::Int(0)]
        );
        assert_eq!(
            seen[3].args,
            vec![
                OscType::String("bells".into()),
                OscType::Int(1000),
                OscType::Int(1),
                OscType::Int(1),
                OscType::String("amp".into()),
                OscType::Float(1.0),
                OscType::String("dur".into()),
                OscType::Float(2.0),
                OscType::String("fund".into()),
                OscType::Float(440.0),
            ]
        );
    }

    #[test]
    fn test_register_rejected() {
        let (addr, _server) = fake_server(Some("/fail"));
        let mut scsynth = Scsynth::connect(&settings(addr)).unwrap();
        match scsynth.register_definition(&bell()) {
            Err(crate::CarillonError::Rejected { command, reason }) => {
                assert_eq!(command, "/d_recv");
                assert_eq!(reason, "refused");
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_register_times_out_without_reply() {
        let (addr, _server) = fake_server(None);
        let mut scsynth = Scsynth::connect(&settings(addr)).unwrap();
        let err = scsynth.register_definition(&bell()).unwrap_err();
        assert!(matches!(err, crate::CarillonError::Timeout { .. }));
    }
}
