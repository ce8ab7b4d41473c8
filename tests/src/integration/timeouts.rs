//! Deadlines against a live server: timeout signals, grace-window cleanup,
//! and correlation under concurrent load.

#[cfg(test)]
mod tests {
    use crate::support::{connect_client, connect_client_with, ServerHarness};
    use serde_json::json;
    use sockline_client::{ClientError, ClientOptions};
    use sockline_server::{URI_DELAY, URI_ECHO};
    use std::time::Duration;

    fn tight_timeout_options() -> ClientOptions {
        ClientOptions {
            request_timeout: Duration::from_millis(100),
            expire_request: Duration::from_millis(200),
            auto_reconnect: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_timeout_fires_before_slow_handler_finishes() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, tight_timeout_options()).await;

        let err = client
            .send(URI_DELAY, json!({"delay": 500}))
            .await
            .unwrap_err();
        match err {
            ClientError::Timeout { uri } => assert_eq!(uri, URI_DELAY),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(client.stats().timeouts, 1);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_expired_entry_retained_then_purged() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, tight_timeout_options()).await;

        let _ = client.send(URI_DELAY, json!({"delay": 500})).await;
        // Just timed out: the entry sits in the grace window.
        assert_eq!(client.pending_count(), 1);

        // Grace elapsed: the tracker is empty again.
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(client.pending_count(), 0);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_straggler_response_absorbed_within_grace() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, tight_timeout_options()).await;

        // Handler answers at ~150ms: after the 100ms deadline but inside the
        // 200ms grace window. The straggler must be swallowed, not counted
        // as an unmatched response.
        let err = client
            .send(URI_DELAY, json!({"delay": 150}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let stats = client.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.unmatched, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(client.pending_count(), 0);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_requests_never_cross_wires() {
        let harness = ServerHarness::start();
        let client = connect_client(&harness).await;

        // 50 concurrent sends on the one stream; every response must carry
        // its own sequence number back.
        let sends = (0..50).map(|n| {
            let client = client.clone();
            async move {
                let result = client.send(URI_ECHO, json!({"n": n})).await.unwrap();
                assert_eq!(result["n"], n);
            }
        });
        futures::future::join_all(sends).await;

        let stats = client.stats();
        assert_eq!(stats.sent, 50);
        assert_eq!(stats.completed, 50);
        assert_eq!(client.pending_count(), 0);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_timed_out_request_does_not_affect_later_ones() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, tight_timeout_options()).await;

        let err = client
            .send(URI_DELAY, json!({"delay": 500}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));

        // The stream is still healthy; a fresh request succeeds.
        let result = client.send(URI_ECHO, json!({"after": true})).await.unwrap();
        assert_eq!(result["after"], true);

        client.close();
        harness.server.shutdown().await;
    }
}
