//! Routing semantics over the wire: protocol errors, handler precedence,
//! malformed frames, and out-of-order completion.

#[cfg(test)]
mod tests {
    use crate::support::{connect_client, init_tracing, ServerHarness};
    use regex::Regex;
    use serde_json::json;
    use sockline_proto::{FrameReader, FrameWriter, RequestEnvelope, ResponseEnvelope};
    use sockline_server::{Matcher, URI_DELAY, URI_ECHO};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    /// Raw socket, no client machinery: lets tests send frames the client
    /// API cannot produce (missing uri, missing id, garbage bytes).
    async fn raw_stream(
        harness: &ServerHarness,
    ) -> (
        FrameReader<impl tokio::io::AsyncRead + Unpin>,
        FrameWriter<impl tokio::io::AsyncWrite + Unpin>,
    ) {
        let stream = UnixStream::connect(&harness.path).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        (FrameReader::new(read_half), FrameWriter::new(write_half))
    }

    #[tokio::test]
    async fn test_missing_uri_answered_with_no_uri_and_same_id() {
        init_tracing();
        let harness = ServerHarness::start();
        let (mut reader, mut writer) = raw_stream(&harness).await;

        writer
            .write(&json!({"ipcReqID": "rq42", "data": {"x": 1}}))
            .await
            .unwrap();
        let response: ResponseEnvelope = reader.next().await.unwrap().unwrap();
        assert_eq!(response.ipc_req_id.as_deref(), Some("rq42"));
        assert_eq!(response.data["code"], "no_uri");
        assert!(!response.data["message"].as_str().unwrap().is_empty());

        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_uri_and_id_answered_with_null_id() {
        let harness = ServerHarness::start();
        let (mut reader, mut writer) = raw_stream(&harness).await;

        writer.write(&json!({"data": {}})).await.unwrap();
        let response: ResponseEnvelope = reader.next().await.unwrap().unwrap();
        assert_eq!(response.ipc_req_id, None);
        assert_eq!(response.data["code"], "no_uri");

        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_earlier_registered_matcher_wins() {
        let harness = ServerHarness::start();
        harness.server.add_handler(
            Matcher::Pattern(Regex::new(r"^/api/").unwrap()),
            "broad",
            Arc::new(|_req: RequestEnvelope| async move { json!("broad") }),
        );
        harness.server.add_handler(
            Matcher::Exact("/api/specific".into()),
            "narrow",
            Arc::new(|_req: RequestEnvelope| async move { json!("narrow") }),
        );
        let client = connect_client(&harness).await;

        let result = client.send("/api/specific", json!({})).await.unwrap();
        assert_eq!(result, json!("broad"));

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_line_does_not_break_the_connection() {
        let harness = ServerHarness::start();
        let stream = UnixStream::connect(&harness.path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        write_half.write_all(b"this is not json\n").await.unwrap();
        let frame = serde_json::to_string(&RequestEnvelope::new("rq1", URI_ECHO, json!(5), "t"))
            .unwrap();
        write_half
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .unwrap();
        write_half.flush().await.unwrap();

        let response: ResponseEnvelope = reader.next().await.unwrap().unwrap();
        assert_eq!(response.ipc_req_id.as_deref(), Some("rq1"));
        assert_eq!(response.data, json!(5));

        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_responses_correlate_out_of_order() {
        let harness = ServerHarness::start();
        let client = connect_client(&harness).await;

        // The slow request is issued first but must not delay the fast one,
        // and each caller must get its own payload back.
        let slow = client.send(URI_DELAY, json!({"delay": 150, "tag": "slow"}));
        let fast = client.send(URI_ECHO, json!({"tag": "fast"}));
        let (slow_result, fast_result) = tokio::join!(slow, fast);
        assert_eq!(slow_result.unwrap()["tag"], "slow");
        assert_eq!(fast_result.unwrap()["tag"], "fast");

        client.close();
        harness.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_interleaved_requests_on_one_raw_stream() {
        let harness = ServerHarness::start();
        let (mut reader, mut writer) = raw_stream(&harness).await;

        writer
            .write(&RequestEnvelope::new(
                "rq-slow",
                URI_DELAY,
                json!({"delay": 100, "which": "slow"}),
                "t",
            ))
            .await
            .unwrap();
        writer
            .write(&RequestEnvelope::new(
                "rq-fast",
                URI_ECHO,
                json!({"which": "fast"}),
                "t",
            ))
            .await
            .unwrap();

        let first: ResponseEnvelope = reader.next().await.unwrap().unwrap();
        let second: ResponseEnvelope = reader.next().await.unwrap().unwrap();
        assert_eq!(first.ipc_req_id.as_deref(), Some("rq-fast"));
        assert_eq!(first.data["which"], "fast");
        assert_eq!(second.ipc_req_id.as_deref(), Some("rq-slow"));
        assert_eq!(second.data["which"], "slow");

        harness.server.shutdown().await;
    }
}
