//! Tests for the HTTP transport.
//!
//! Requests are served by a local wiremock server; no real queue server is
//! needed.

use super::*;
use crate::error::{ConfigurationError, ErrorCode};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "test-secret";

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::consumer(ClientConfig::new(server.uri(), SECRET).with_request_timeout(None))
        .expect("transport should build")
}

mod construction {
    use super::*;

    /// Verify a consumer transport with a 10s timeout is rejected before any request.
    #[tokio::test]
    async fn test_consumer_rejects_short_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&mock_server)
            .await;

        let config = ClientConfig::new(mock_server.uri(), SECRET)
            .with_request_timeout(Some(Duration::from_secs(10)));
        let result = HttpTransport::consumer(config);

        assert!(matches!(
            result,
            Err(QueueError::Configuration(
                ConfigurationError::TimeoutTooShort { .. }
            ))
        ));
    }

    #[test]
    fn test_consumer_accepts_disabled_or_long_timeout() {
        let disabled = ClientConfig::new("http://localhost:8080", SECRET).with_request_timeout(None);
        assert!(HttpTransport::consumer(disabled).is_ok());

        let long = ClientConfig::new("http://localhost:8080", SECRET)
            .with_request_timeout(Some(Duration::from_secs(40)));
        let transport = HttpTransport::consumer(long).unwrap();
        assert_eq!(transport.request_timeout(), Some(Duration::from_secs(40)));
    }

    #[test]
    fn test_producer_allows_short_timeout() {
        let config = ClientConfig::new("http://localhost:8080", SECRET)
            .with_request_timeout(Some(Duration::from_secs(10)));

        assert!(HttpTransport::new(config).is_ok());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let transport =
            HttpTransport::new(ClientConfig::new("http://localhost:8080/", SECRET)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080");

        let with_path =
            HttpTransport::new(ClientConfig::new("http://localhost:8080/forq/", SECRET)).unwrap();
        assert_eq!(with_path.base_url(), "http://localhost:8080/forq");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = HttpTransport::new(ClientConfig::new("http://localhost:8080", ""));
        assert!(matches!(result, Err(QueueError::Configuration(_))));
    }

    #[test]
    fn test_debug_does_not_expose_secret() {
        let transport =
            HttpTransport::new(ClientConfig::new("http://localhost:8080", SECRET)).unwrap();
        assert!(!format!("{:?}", transport).contains(SECRET));
    }
}

mod consume {
    use super::*;

    /// Verify a 200 response is decoded into a message.
    #[tokio::test]
    async fn test_consume_one_returns_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/queues/orders/messages"))
            .and(header("accept", "application/json"))
            .and(header("x-api-key", SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg-1",
                "content": "hello"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport.consume_one(&QueueName::new("orders")).await;

        let message = result.unwrap().expect("a message should be returned");
        assert_eq!(message.id, MessageId::new("msg-1"));
        assert_eq!(message.content, "hello");
    }

    /// Verify a 204 response means "no message", not an error.
    #[tokio::test]
    async fn test_consume_one_empty_queue() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/queues/orders/messages"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport.consume_one(&QueueName::new("orders")).await;

        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_one_server_error_code() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/queues/orders/messages"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({ "code": "unauthorized" })),
            )
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport.consume_one(&QueueName::new("orders")).await;

        match result {
            Err(QueueError::Api { status, code }) => {
                assert_eq!(status, 401);
                assert_eq!(code, ErrorCode::Unauthorized);
            }
            other => panic!("Expected Api error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_consume_one_malformed_message_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/queues/orders/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport.consume_one(&QueueName::new("orders")).await;

        assert!(matches!(result, Err(QueueError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_queue_name_is_percent_encoded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/queues/my%20queue/messages"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport.consume_one(&QueueName::new("my queue")).await;

        assert!(result.unwrap().is_none());
    }
}

mod acknowledge {
    use super::*;

    #[tokio::test]
    async fn test_ack_no_content_is_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages/msg-1/ack"))
            .and(header("x-api-key", SECRET))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .ack(&QueueName::new("orders"), &MessageId::new("msg-1"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_nack_no_content_is_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages/msg-2/nack"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .nack(&QueueName::new("orders"), &MessageId::new("msg-2"))
            .await;

        assert!(result.is_ok());
    }

    /// Verify a 404 with a code is surfaced as a typed error.
    #[tokio::test]
    async fn test_ack_unknown_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages/gone/ack"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({ "code": "not_found.message" })),
            )
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .ack(&QueueName::new("orders"), &MessageId::new("gone"))
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.code(), Some(&ErrorCode::MessageNotFound));
        assert!(!error.is_transient());
    }

    /// Verify a 200 is not accepted where 204 is the only success.
    #[tokio::test]
    async fn test_nack_unexpected_success_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages/msg-3/nack"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .nack(&QueueName::new("orders"), &MessageId::new("msg-3"))
            .await;

        assert!(matches!(result, Err(QueueError::InvalidResponse { .. })));
    }
}

mod produce {
    use super::*;

    #[tokio::test]
    async fn test_produce_sends_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages"))
            .and(header("content-type", "application/json"))
            .and(header("x-api-key", SECRET))
            .and(body_json(serde_json::json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .produce(&NewMessage::new("hello"), &QueueName::new("orders"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_produce_with_process_after() {
        let mock_server = MockServer::start().await;
        let at = chrono::DateTime::from_timestamp_millis(1_900_000_000_000).unwrap();

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages"))
            .and(body_json(serde_json::json!({
                "content": "later",
                "processAfter": 1_900_000_000_000i64
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let message = NewMessage::new("later").with_process_after(at);
        let result = transport.produce(&message, &QueueName::new("orders")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_produce_content_too_large() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/queues/orders/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "bad_request.body.content.exceeds_limit"
            })))
            .mount(&mock_server)
            .await;

        let transport = transport_for(&mock_server);
        let result = transport
            .produce(&NewMessage::new("x".repeat(1024)), &QueueName::new("orders"))
            .await;

        match result {
            Err(QueueError::Api { status, code }) => {
                assert_eq!(status, 400);
                assert_eq!(code, ErrorCode::ContentExceedsLimit);
                assert!(code.is_bad_request());
            }
            other => panic!("Expected Api error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_request_error() {
        // Nothing listens on port 9 on a test machine
        let transport = HttpTransport::new(
            ClientConfig::new("http://127.0.0.1:9", SECRET)
                .with_request_timeout(Some(Duration::from_secs(5))),
        )
        .unwrap();

        let result = transport
            .produce(&NewMessage::new("hello"), &QueueName::new("orders"))
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, QueueError::Request { .. }));
        assert!(error.is_transient());
    }
}
