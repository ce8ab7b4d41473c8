//! Recovery across a server restart: the client's fixed-delay reconnect loop
//! re-establishes the stream without caller intervention.

#[cfg(test)]
mod tests {
    use crate::support::{connect_client_with, ServerHarness};
    use serde_json::json;
    use sockline_client::ClientOptions;
    use sockline_server::URI_ECHO;
    use std::time::Duration;

    fn fast_reconnect_options() -> ClientOptions {
        ClientOptions {
            auto_reconnect: Some(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_client_recovers_after_server_restart() {
        let mut harness = ServerHarness::start();
        let client = connect_client_with(&harness, fast_reconnect_options()).await;

        let result = client.send(URI_ECHO, json!({"phase": 1})).await.unwrap();
        assert_eq!(result["phase"], 1);

        harness.server.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!client.is_connected());

        harness.restart();
        // A few reconnect intervals for the loop to land.
        for _ in 0..50 {
            if client.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(client.is_connected());

        let result = client.send(URI_ECHO, json!({"phase": 2})).await.unwrap();
        assert_eq!(result["phase"], 2);

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_stops_reconnect_attempts() {
        let mut harness = ServerHarness::start();
        let client = connect_client_with(&harness, fast_reconnect_options()).await;

        harness.server.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.close();

        harness.restart();
        // The closed client must never re-attach.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!client.is_connected());
        assert_eq!(harness.server.open_connections(), 0);

        harness.server.shutdown().await;
    }
}
