//! Connection-loss behavior: draining pending requests and failing fast
//! afterwards.

#[cfg(test)]
mod tests {
    use crate::support::{connect_client_with, init_tracing, ServerHarness};
    use serde_json::json;
    use sockline_client::{ClientError, ClientOptions, IpcClient};
    use sockline_server::URI_DELAY;
    use std::time::Duration;

    fn no_reconnect_options() -> ClientOptions {
        ClientOptions {
            auto_reconnect: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_server_closing_connections_drains_pending_requests() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, no_reconnect_options()).await;

        // Park a request on a handler that will outlive the connection.
        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.send(URI_DELAY, json!({"delay": 60_000})).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.pending_count(), 1);

        harness.server.close_connections();

        let outcome = pending.await.unwrap();
        assert!(matches!(outcome, Err(ClientError::Disconnected)));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().drained, 1);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails_without_registering() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, no_reconnect_options()).await;

        // The client's connect completes once the stream is in the listener
        // backlog; wait until the accept loop has adopted it so close_connections
        // actually sees it.
        for _ in 0..100 {
            if harness.server.open_connections() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(harness.server.open_connections(), 1);

        harness.server.close_connections();
        // Let the client notice the EOF.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!client.is_connected());

        let err = client.send("/anything", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::NoOpenStream));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().sent, 0);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_to_absent_socket_is_transport_error() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let client = IpcClient::new(dir.path().join("never_bound.sock"));
        assert!(matches!(
            client.connect().await,
            Err(ClientError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_server_shutdown_ends_client_connections() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, no_reconnect_options()).await;

        harness.server.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!client.is_connected());
        assert!(matches!(
            client.send("/anything", json!({})).await,
            Err(ClientError::NoOpenStream)
        ));
        client.close();
    }

    #[tokio::test]
    async fn test_closed_client_is_terminal() {
        let harness = ServerHarness::start();
        let client = connect_client_with(&harness, no_reconnect_options()).await;

        client.close();
        assert!(!client.is_connected());
        assert!(matches!(
            client.send("/anything", json!({})).await,
            Err(ClientError::NoOpenStream)
        ));
        assert!(matches!(client.connect().await, Err(ClientError::Closed)));

        harness.server.shutdown().await;
    }
}
