#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::HttpAccountClient;
    use crate::client::{AccountClient, InitDataSource};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tapfarm_types::{Account, ClientError, ErrorClass};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticInitData;

    #[async_trait]
    impl InitDataSource for StaticInitData {
        async fn init_data(&self, _account: &Account) -> Result<String, ClientError> {
            Ok("query_id=test".to_string())
        }
    }

    fn client(server: &MockServer, timeout: Duration) -> HttpAccountClient {
        HttpAccountClient::with_init_source(
            format!("{}/php", server.uri()),
            "REF123",
            timeout,
            Arc::new(StaticInitData),
        )
    }

    fn account() -> Account {
        Account::new("acct1", "sessions/acct1.session")
    }

    #[tokio::test]
    async fn test_login_sends_init_data_and_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/php/init.php"))
            .and(body_partial_json(json!({ "initData": "query_id=test", "start_param": "REF123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, Duration::from_secs(5)).login(&account(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/php/init.php"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": false, "error": "banned" })),
            )
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(5)).login(&account(), None).await.unwrap_err();
        assert_eq!(err, ClientError::auth("banned"));
    }

    #[tokio::test]
    async fn test_forbidden_status_is_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(5)).login(&account(), None).await.unwrap_err();
        assert_eq!(err.class(true), ErrorClass::Auth);
    }

    #[tokio::test]
    async fn test_cycle_collects_and_reports_next_pause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .and(body_partial_json(json!({ "action": "state" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "data": { "mining": { "left_ms": 0, "can_collect": true } }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .and(body_partial_json(json!({ "action": "mining_collect" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "data": {} })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .and(body_partial_json(json!({ "action": "state" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "data": { "mining": { "left_ms": 7_200_000, "can_collect": false } }
            })))
            .mount(&server)
            .await;

        let report =
            client(&server, Duration::from_secs(5)).run_cycle(&account(), None).await.unwrap();
        assert_eq!(report.quests_completed, 1);
        assert_eq!(report.next_pause, Some(Duration::from_secs(7200)));
    }

    #[tokio::test]
    async fn test_cycle_without_reward() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "data": { "mining": { "left_ms": 1500, "can_collect": false } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report =
            client(&server, Duration::from_secs(5)).run_cycle(&account(), None).await.unwrap();
        assert_eq!(report.quests_completed, 0);
        assert_eq!(report.next_pause, Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/php/cards.php"))
            .respond_with(ResponseTemplate::new(407))
            .mount(&server)
            .await;

        let client = client(&server, Duration::from_secs(5));
        assert!(matches!(
            client.run_cycle(&account(), None).await,
            Err(ClientError::Transient { .. })
        ));
        assert!(matches!(
            client.run_cycle(&account(), None).await,
            Err(ClientError::Unclassified { .. })
        ));
        assert!(matches!(client.run_cycle(&account(), None).await, Err(ClientError::Proxy { .. })));
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(1)).login(&account(), None).await.unwrap_err();
        assert_eq!(err, ClientError::Timeout { duration_secs: 1 });
        assert_eq!(err.class(false), ErrorClass::Transient);
    }
}
