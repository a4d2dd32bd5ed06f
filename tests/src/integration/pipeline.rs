//! # Pipeline Scenarios
//!
//! What a receiving node does with a relayed update:
//!
//! - stale and future-dated envelopes are dropped at relay
//! - origins outside the trust policy are dropped at relay
//! - an unsafe payload is still relayed but never installed, and the
//!   failure becomes a local `update-failure` issue
//! - payloads parked on disk by the origin are fetched and installed

#[cfg(test)]
mod tests {
    use mm_01_dissemination::{BroadcastRequest, DisseminationApi, ReceiveOutcome};
    use mm_02_update_pipeline::{PipelineState, Stage, UpdatePipelineApi};
    use mm_03_self_healing::SelfHealingApi;
    use node_runtime::handlers::UPDATE_FAILURE_CATEGORY;
    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, MeshEvent};
    use shared_types::{ContentStore, NodeId, UpdateCategory, UpdateFailure};

    use crate::integration::support::{wait_until, within, TestMesh, BASE_TIME};

    const DAY: u64 = 24 * 60 * 60;

    fn request(category: UpdateCategory, version: &str, payload: &str) -> BroadcastRequest {
        BroadcastRequest {
            category,
            version: version.into(),
            payload: payload.as_bytes().to_vec(),
            notes: None,
        }
    }

    fn rejection_kind(outcome: &ReceiveOutcome) -> UpdateFailure {
        match outcome {
            ReceiveOutcome::Rejected(rejection) => rejection.failure,
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    // =========================================================================
    // FRESHNESS
    // =========================================================================

    #[tokio::test]
    async fn test_expired_envelope_is_not_relayed() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;

        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "1.0.0", r#"{"a":1}"#))
            .await
            .unwrap();
        net.time.advance(8 * DAY);

        let outcome = b.dissemination.receive_envelope(envelope.forwarded_by(&NodeId::new("node-a"))).await;
        assert_eq!(rejection_kind(&outcome), UpdateFailure::Stale);
        assert!(!b.dissemination.has_seen(&envelope.id));
        assert_eq!(b.dissemination.stats().rejected, 1);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_future_dated_envelope_is_not_relayed() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;

        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "1.0.0", r#"{"a":1}"#))
            .await
            .unwrap();
        // The envelope now looks ten minutes ahead of the receiver.
        net.time.set(BASE_TIME - 600);

        let outcome = b.dissemination.receive_envelope(envelope.forwarded_by(&NodeId::new("node-a"))).await;
        assert_eq!(rejection_kind(&outcome), UpdateFailure::Stale);

        net.shutdown().await;
    }

    // =========================================================================
    // TRUST
    // =========================================================================

    #[tokio::test]
    async fn test_untrusted_origin_is_not_relayed() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net
            .add_node_with("node-b", &[], |c| {
                c.pipeline.trusted_origin_prefixes = vec!["hq-".into()];
            })
            .await;
        let mut rejected = b.event_bus.subscribe(EventFilter::topics(vec![EventTopic::Dissemination]));

        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::BlockedList, "1.0.0", "ads.example\n"))
            .await
            .unwrap();

        match within("EnvelopeRejected", rejected.recv()).await {
            Some(MeshEvent::EnvelopeRejected { envelope_id, origin, rejection }) => {
                assert_eq!(envelope_id, envelope.id);
                assert_eq!(origin, NodeId::new("node-a"));
                assert_eq!(rejection.failure, UpdateFailure::Untrusted);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!b.dissemination.has_seen(&envelope.id));
        assert!(b.pipeline.state_of(&envelope.id).is_none());

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_tampered_version_fails_signature() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;

        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "1.0.0", r#"{"a":1}"#))
            .await
            .unwrap();
        let mut forged = envelope.forwarded_by(&NodeId::new("node-a"));
        forged.version = "9.9.9".into();

        let outcome = b.dissemination.receive_envelope(forged).await;
        assert_eq!(rejection_kind(&outcome), UpdateFailure::Untrusted);

        net.shutdown().await;
    }

    // =========================================================================
    // UNSAFE PAYLOADS AND FAILURE FEEDBACK
    // =========================================================================

    #[tokio::test]
    async fn test_unsafe_payload_relayed_but_never_applied() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &["node-c"]).await;
        let c = net.add_node("node-c", &[]).await;
        let mut issues = b.event_bus.subscribe(EventFilter::topics(vec![EventTopic::SelfHealing]));

        let envelope = a
            .dissemination
            .broadcast(request(
                UpdateCategory::Configuration,
                "1.0.0",
                r#"{"portal":"<SCRIPT>alert(1)</script>"}"#,
            ))
            .await
            .unwrap();

        // Relay only needs integrity, so the envelope still travels on.
        wait_until("node-c to accept the relay", || c.dissemination.has_seen(&envelope.id)).await;

        for node in [&b, &c] {
            wait_until("sandbox rejection", || {
                node.pipeline.state_of(&envelope.id) == Some(PipelineState::Rejected(Stage::SandboxTesting))
            })
            .await;
            assert!(node.pipeline.applied(UpdateCategory::Configuration).is_none());
            assert_eq!(node.config_document.get("/portal"), None);
            assert_eq!(node.pipeline.stats().rejected_unsafe, 1);
        }

        match within("IssueReported", issues.recv()).await {
            Some(MeshEvent::IssueReported(issue)) => {
                assert_eq!(issue.category, UPDATE_FAILURE_CATEGORY);
                assert_eq!(issue.detected_by, NodeId::new("node-b"));
                assert_eq!(issue.context["stage"], "sandbox-testing");
                assert_eq!(issue.context["failure"], "unsafe");
            }
            other => panic!("unexpected event {:?}", other),
        }
        wait_until("issue to be stored", || b.healing.stats().issues_stored == 1).await;

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_downgrade_is_rejected_after_upgrade() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &[]).await;

        let newer = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "2.0.0", r#"{"gen":2}"#))
            .await
            .unwrap();
        wait_until("2.0.0 applied", || {
            b.pipeline.state_of(&newer.id) == Some(PipelineState::Applied)
        })
        .await;

        let older = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "1.5.0", r#"{"gen":1}"#))
            .await
            .unwrap();
        wait_until("1.5.0 rejected", || {
            matches!(b.pipeline.state_of(&older.id), Some(PipelineState::Rejected(_)))
        })
        .await;

        assert_eq!(b.config_document.get("/gen"), Some(json!(2)));
        assert_eq!(b.pipeline.applied(UpdateCategory::Configuration).unwrap().version, "2.0.0");

        net.shutdown().await;
    }

    // =========================================================================
    // PAYLOAD STORAGE
    // =========================================================================

    #[tokio::test]
    async fn test_payload_fetched_from_origin_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();

        let mut net = TestMesh::new();
        let a = net
            .add_node_with("node-a", &["node-b"], |c| {
                c.storage.in_memory = false;
                c.storage.data_dir = data_dir.clone();
            })
            .await;
        let b = net.add_node("node-b", &[]).await;

        let blocklist = "# mesh blocklist\ntracker.example\nads.example\n";
        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::BlockedList, "1.0.0", blocklist))
            .await
            .unwrap();

        let on_disk = tokio::fs::read(data_dir.join("payloads").join(&envelope.id)).await.unwrap();
        assert_eq!(on_disk, blocklist.as_bytes());

        wait_until("blocklist applied", || b.blocklist.is_blocked("ads.example")).await;
        assert!(b.blocklist.is_blocked("tracker.example"));
        // The receiver keeps its own copy for peers further down.
        assert_eq!(b.store.get(&envelope.id).await.unwrap(), blocklist.as_bytes());

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_payload_unavailable_is_fetch_failure() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;

        let envelope = a
            .dissemination
            .broadcast(request(UpdateCategory::Configuration, "1.0.0", r#"{"a":1}"#))
            .await
            .unwrap();
        // Origin is the only holder of the payload and is unreachable.
        net.mesh.disconnect(&NodeId::new("node-a"));

        let outcome = b.dissemination.receive_envelope(envelope.forwarded_by(&NodeId::new("node-a"))).await;
        assert!(outcome.is_accepted());

        wait_until("download rejection", || {
            b.pipeline.state_of(&envelope.id) == Some(PipelineState::Rejected(Stage::Downloading))
        })
        .await;
        assert_eq!(b.pipeline.stats().fetch_failed, 1);

        net.mesh.reconnect(&NodeId::new("node-a"));
        net.shutdown().await;
    }
}
