//! # Gossip Scenarios
//!
//! Relay behaviour across real nodes:
//!
//! 1. **End to end**: one broadcast reaches exactly `fanout` peers, one hop
//!    out, and is installed where it lands
//! 2. **Dedup**: a second delivery of the same envelope changes nothing
//! 3. **Hop bound**: a chain longer than `max_hops` stops relaying
//! 4. **Wire round trip**: relayed envelopes keep the origin's signed fields

#[cfg(test)]
mod tests {
    use mm_01_dissemination::{BroadcastRequest, DisseminationApi, ReceiveOutcome};
    use mm_02_update_pipeline::{PipelineState, UpdatePipelineApi};
    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, MeshEvent};
    use shared_types::{NodeId, UpdateCategory, UpdateEnvelope};

    use crate::integration::support::{settle, wait_until, within, TestMesh};

    fn config_update(version: &str, payload: &str) -> BroadcastRequest {
        BroadcastRequest {
            category: UpdateCategory::Configuration,
            version: version.into(),
            payload: payload.as_bytes().to_vec(),
            notes: None,
        }
    }

    // =========================================================================
    // END TO END
    // =========================================================================

    #[tokio::test]
    async fn test_broadcast_reaches_fanout_peers_and_applies() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b", "node-c", "node-d", "node-e"]).await;
        let mut others = Vec::new();
        for id in ["node-b", "node-c", "node-d", "node-e"] {
            others.push(net.add_node(id, &[]).await);
        }
        let mut subscriptions: Vec<_> = others
            .iter()
            .map(|n| n.event_bus.subscribe(EventFilter::topics(vec![EventTopic::Dissemination])))
            .collect();

        let payload = r#"{"ssid":"mesh-1"}"#;
        assert_eq!(payload.len(), 17);
        let envelope = a.dissemination.broadcast(config_update("1.0.0", payload)).await.unwrap();

        assert_eq!(envelope.hop_count, 0);
        assert_eq!(envelope.propagation_path, vec![NodeId::new("node-a")]);
        assert_eq!(envelope.payload_size_bytes, 17);
        assert!(a.dissemination.has_seen(&envelope.id));
        assert_eq!(a.dissemination.stats().forwards_dispatched, 3);

        wait_until("three peers to accept", || {
            others.iter().filter(|n| n.dissemination.has_seen(&envelope.id)).count() == 3
        })
        .await;
        settle().await;
        let reached: Vec<usize> = (0..others.len())
            .filter(|&i| others[i].dissemination.has_seen(&envelope.id))
            .collect();
        assert_eq!(reached.len(), 3, "no peer relays, so exactly the fan-out is reached");

        for &i in &reached {
            let node = &others[i];
            let received = within("EnvelopeReceived", subscriptions[i].recv()).await;
            match received {
                Some(MeshEvent::EnvelopeReceived(copy)) => {
                    assert_eq!(copy.id, envelope.id);
                    assert_eq!(copy.hop_count, 1);
                    assert_eq!(copy.propagation_path, vec![NodeId::new("node-a")]);
                }
                other => panic!("unexpected event {:?}", other),
            }

            wait_until("update to be applied", || {
                node.pipeline.state_of(&envelope.id) == Some(PipelineState::Applied)
            })
            .await;
            assert_eq!(node.config_document.get("/ssid"), Some(json!("mesh-1")));
            let record = node.pipeline.applied(UpdateCategory::Configuration).unwrap();
            assert_eq!(record.version, "1.0.0");
            assert_eq!(record.envelope_id, envelope.id);
        }

        net.shutdown().await;
    }

    // =========================================================================
    // DEDUP
    // =========================================================================

    #[tokio::test]
    async fn test_second_delivery_is_duplicate_and_applies_once() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;

        let envelope = a.dissemination.broadcast(config_update("1.0.0", r#"{"mode":"mesh"}"#)).await.unwrap();
        let copy = envelope.forwarded_by(a.dissemination.local_node());

        let first = b.dissemination.receive_envelope(copy.clone()).await;
        assert_eq!(first, ReceiveOutcome::Accepted { forwarded_to: 0 });
        let second = b.dissemination.receive_envelope(copy).await;
        assert_eq!(second, ReceiveOutcome::Duplicate);

        wait_until("update to be applied", || b.pipeline.stats().applied == 1).await;
        settle().await;
        assert_eq!(b.pipeline.stats().applied, 1);
        let stats = b.dissemination.stats();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.duplicates, 1);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_cycle_in_peer_graph_terminates() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &["node-c"]).await;
        let c = net.add_node("node-c", &["node-a", "node-b"]).await;

        let envelope = a.dissemination.broadcast(config_update("1.0.0", r#"{"ring":true}"#)).await.unwrap();

        wait_until("ring to be covered", || c.dissemination.has_seen(&envelope.id)).await;
        settle().await;
        // Each node accepts once; the copy that comes back to a node on the
        // path is never sent.
        assert_eq!(b.dissemination.stats().processed, 1);
        assert_eq!(c.dissemination.stats().processed, 1);
        assert_eq!(a.dissemination.stats().processed, 0);

        net.shutdown().await;
    }

    // =========================================================================
    // HOP BOUND
    // =========================================================================

    #[tokio::test]
    async fn test_chain_stops_at_max_hops() {
        let mut net = TestMesh::new();
        let hops = |c: &mut node_runtime::NodeConfig| c.dissemination.max_hops = 2;
        let a = net.add_node_with("node-a", &["node-b"], hops).await;
        let b = net.add_node_with("node-b", &["node-c"], hops).await;
        let c = net.add_node_with("node-c", &["node-d"], hops).await;
        let d = net.add_node_with("node-d", &[], hops).await;

        let envelope = a.dissemination.broadcast(config_update("1.0.0", r#"{"hops":2}"#)).await.unwrap();

        wait_until("node-c to drop the hop-2 copy", || c.dissemination.stats().hop_limited == 1).await;
        settle().await;
        assert!(b.dissemination.has_seen(&envelope.id));
        assert!(!c.dissemination.has_seen(&envelope.id));
        assert!(!d.dissemination.has_seen(&envelope.id));

        net.shutdown().await;
    }

    // =========================================================================
    // WIRE ROUND TRIP
    // =========================================================================

    #[tokio::test]
    async fn test_relayed_envelope_keeps_signed_fields() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &["node-c"]).await;
        let c = net.add_node("node-c", &[]).await;
        let mut at_c = c.event_bus.subscribe(EventFilter::topics(vec![EventTopic::Dissemination]));

        let mut request = config_update("2.1.0", r#"{"portal":{"title":"Mesh"}}"#);
        request.notes = Some("relay check".into());
        let original = a.dissemination.broadcast(request).await.unwrap();

        let relayed: UpdateEnvelope = match within("EnvelopeReceived at node-c", at_c.recv()).await {
            Some(MeshEvent::EnvelopeReceived(envelope)) => envelope,
            other => panic!("unexpected event {:?}", other),
        };

        assert_eq!(relayed.id, original.id);
        assert_eq!(relayed.signing_payload(), original.signing_payload());
        assert_eq!(relayed.signature, original.signature);
        assert_eq!(relayed.payload_locator, original.payload_locator);
        assert_eq!(relayed.notes.as_deref(), Some("relay check"));
        assert_eq!(relayed.hop_count, 2);
        assert_eq!(
            relayed.propagation_path,
            vec![NodeId::new("node-a"), NodeId::new("node-b")]
        );
        assert!(b.dissemination.has_seen(&original.id));

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_offline_peer_counts_send_failure() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &[]).await;
        net.mesh.disconnect(&NodeId::new("node-b"));

        let envelope = a.dissemination.broadcast(config_update("1.0.0", r#"{"x":1}"#)).await.unwrap();

        wait_until("send failure to be recorded", || a.dissemination.stats().send_failures == 1).await;
        assert!(!b.dissemination.has_seen(&envelope.id));

        net.shutdown().await;
    }
}
