//! # Self-Healing Scenarios
//!
//! Fixes found on one node travel the mesh as Fix envelopes and are
//! re-validated by every receiver before they run. A fix envelope that
//! cannot be taken in is reported like any other failed update.

#[cfg(test)]
mod tests {
    use mm_01_dissemination::DisseminationApi;
    use mm_03_self_healing::{FixTemplate, SelfHealingApi};
    use node_runtime::handlers::{FIX_INTAKE_STAGE, UPDATE_FAILURE_CATEGORY};
    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, MeshEvent};
    use shared_types::{DetectedIssue, FixKind, NodeId, Severity, UpdateFailure};

    use crate::integration::support::{settle, wait_until, within, TestMesh};

    fn dns_servfail() -> DetectedIssue {
        DetectedIssue::new("network.dns", Severity::High, "resolver failing")
            .with_error("SERVFAIL from 192.168.1.1")
            .with_context("interface", "wlan0")
    }

    #[tokio::test]
    async fn test_local_fix_spreads_and_applies_downstream() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &["node-c"]).await;
        let c = net.add_node("node-c", &[]).await;

        let fix = a.healing.report_issue(dns_servfail()).await.unwrap().expect("template fix");
        assert_eq!(fix.kind, FixKind::ConfigChange);
        assert_eq!(fix.generated_by, NodeId::new("node-a"));
        assert!(fix.tested_locally && fix.test_passed);

        let fallback = json!(["1.1.1.1", "9.9.9.9"]);
        assert_eq!(a.config_document.get("/dns/fallback_servers"), Some(fallback.clone()));
        assert_eq!(a.healing.stats().fixes_disseminated, 1);
        assert_eq!(a.dissemination.stats().broadcasts, 1);

        for node in [&b, &c] {
            wait_until("fix applied downstream", || node.healing.stats().fixes_applied == 1).await;
            assert_eq!(node.config_document.get("/dns/fallback_servers"), Some(fallback.clone()));
            assert_eq!(node.healing.stats().fixes_received, 1);
        }

        // Receivers do not re-originate a fix they were handed.
        settle().await;
        assert_eq!(b.dissemination.stats().broadcasts, 0);
        assert_eq!(c.dissemination.stats().broadcasts, 0);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_low_confidence_fix_rejected_by_peer() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &[]).await;
        let mut at_b = b.event_bus.subscribe(EventFilter::topics(vec![EventTopic::SelfHealing]));

        a.healing.add_template(FixTemplate {
            category: "network.radio".into(),
            error_substring: "stuck".into(),
            kind: FixKind::ConfigChange,
            description: "Reset the radio".into(),
            payload: r#"{"radio":{"reset":true}}"#.into(),
            confidence: 30,
        });
        let issue = DetectedIssue::new("network.radio", Severity::Medium, "radio stuck in scan");
        let fix = a.healing.report_issue(issue).await.unwrap().expect("template fix");
        assert_eq!(fix.confidence_score, 30);
        assert_eq!(a.config_document.get("/radio/reset"), Some(json!(true)));

        match within("FixRejected at node-b", at_b.recv()).await {
            Some(MeshEvent::FixRejected { fix_id, reason }) => {
                assert_eq!(fix_id, fix.id);
                assert!(reason.contains("acceptance floor"), "reason: {}", reason);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(b.config_document.get("/radio/reset"), None);
        assert_eq!(b.healing.stats().fixes_applied, 0);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_operator_fix_stays_local() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &[]).await;
        let mut at_a = a.event_bus.subscribe(EventFilter::topics(vec![EventTopic::SelfHealing]));

        let issue = DetectedIssue::new("network.interface", Severity::High, "wlan0 down")
            .with_error("iwlwifi driver crashed");
        let fix = a.healing.report_issue(issue).await.unwrap().expect("template fix");
        assert_eq!(fix.kind, FixKind::DriverUpdate);

        let mut saw_operator_event = false;
        for _ in 0..3 {
            if let Some(MeshEvent::OperatorActionRequired { fix_id, kind, .. }) =
                within("self-healing event", at_a.recv()).await
            {
                assert_eq!(fix_id, fix.id);
                assert_eq!(kind, FixKind::DriverUpdate);
                saw_operator_event = true;
                break;
            }
        }
        assert!(saw_operator_event);
        assert_eq!(a.healing.stats().awaiting_operator, 1);

        settle().await;
        assert_eq!(a.dissemination.stats().broadcasts, 0);
        assert_eq!(b.healing.stats().fixes_received, 0);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeat_issue_reuses_fix_without_rebroadcast() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &["node-b"]).await;
        let b = net.add_node("node-b", &[]).await;

        let first = a.healing.report_issue(dns_servfail()).await.unwrap().expect("template fix");
        let again = a.healing.report_issue(dns_servfail()).await.unwrap();
        assert!(again.is_none());

        wait_until("fix applied at node-b", || b.healing.stats().fixes_applied == 1).await;
        settle().await;
        let stats = a.healing.stats();
        assert_eq!(stats.fixes_generated, 1);
        assert_eq!(stats.issues_stored, 2);
        assert_eq!(a.dissemination.stats().broadcasts, 1);
        assert_eq!(b.healing.stats().fixes_received, 1);
        assert!(!first.id.is_empty());

        net.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_fix_payload_becomes_local_issue() {
        let mut net = TestMesh::new();
        let a = net.add_node("node-a", &[]).await;
        let b = net.add_node("node-b", &[]).await;
        let mut at_a = a.event_bus.subscribe(EventFilter::topics(vec![EventTopic::Dissemination]));
        let mut at_b = b.event_bus.subscribe(EventFilter::topics(vec![EventTopic::SelfHealing]));

        a.healing.report_issue(dns_servfail()).await.unwrap().expect("template fix");
        let envelope = loop {
            if let Some(MeshEvent::EnvelopeBroadcast(envelope)) = within("fix broadcast", at_a.recv()).await {
                break envelope;
            }
        };
        // node-a holds the only copy of the payload.
        net.mesh.disconnect(&NodeId::new("node-a"));

        let outcome = b.dissemination.receive_envelope(envelope.forwarded_by(&NodeId::new("node-a"))).await;
        assert!(outcome.is_accepted());

        match within("FixRefused at node-b", at_b.recv()).await {
            Some(MeshEvent::FixRefused { envelope_id, origin, rejection }) => {
                assert_eq!(envelope_id, envelope.id);
                assert_eq!(origin, NodeId::new("node-a"));
                assert_eq!(rejection.failure, UpdateFailure::FetchFailed);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match within("IssueReported at node-b", at_b.recv()).await {
            Some(MeshEvent::IssueReported(issue)) => {
                assert_eq!(issue.category, UPDATE_FAILURE_CATEGORY);
                assert_eq!(issue.context["stage"], FIX_INTAKE_STAGE);
                assert_eq!(issue.context["failure"], "fetch-failed");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(b.healing.stats().fixes_refused, 1);
        assert_eq!(b.healing.stats().fixes_applied, 0);

        net.mesh.reconnect(&NodeId::new("node-a"));
        net.shutdown().await;
    }
}
