//! Parent access link endpoints.

use async_trait::async_trait;
use reqwest::Method;
use shared::{AccessLinkResponse, KidInfoDto, SendCodeRequest, VerifyCodeRequest};

use super::connection::RestConnection;
use crate::storage::{ApiResult, ParentAccessStorage};

const PARENT_ACCESS: &str = "parent-access";

#[async_trait]
impl ParentAccessStorage for RestConnection {
    async fn validate_token(&self, token: &str) -> ApiResult<AccessLinkResponse> {
        // The token is one path segment, percent-encoded as is
        self.get_json(self.endpoint(&[PARENT_ACCESS, token])?).await
    }

    async fn send_code(&self, request: &SendCodeRequest) -> ApiResult<()> {
        let url = self.endpoint(&[PARENT_ACCESS, "send-code"])?;
        self.send_command(Method::POST, url, Some(request)).await
    }

    async fn verify_code(&self, request: &VerifyCodeRequest) -> ApiResult<KidInfoDto> {
        let url = self.endpoint(&[PARENT_ACCESS, "verify-code"])?;
        self.send_json(Method::POST, url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::rest::test_utils::TestServer;
    use crate::storage::ApiError;

    const LINK_JSON: &str = r#"{"kidId": 12, "kidName": "Noa", "formId": 1003}"#;

    #[tokio::test]
    async fn test_token_is_encoded_not_filtered() {
        let server = TestServer::start(|_, _| (200, LINK_JSON.to_string())).await;
        let conn = server.connection();

        conn.validate_token("Ab+c/9=~z").await.unwrap();
        conn.validate_token("Abc9z").await.unwrap();
        conn.validate_token("a b%c?d#e").await.unwrap();

        let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/parent-access/Ab+c%2F9=~z",
                "/api/parent-access/Abc9z",
                "/api/parent-access/a%20b%25c%3Fd%23e",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_token_statuses() {
        let server = TestServer::start(|_, path| match path {
            "/api/parent-access/good" => (200, LINK_JSON.to_string()),
            "/api/parent-access/old" => (410, r#"{"error":"Link expired"}"#.to_string()),
            _ => (404, String::new()),
        })
        .await;
        let conn = server.connection();

        let link = conn.validate_token("good").await.unwrap();
        assert_eq!(link.kid_id, 12);
        assert_eq!(link.form_id, 1003);

        assert_eq!(
            conn.validate_token("old").await,
            Err(ApiError::Rejected {
                status: 410,
                message: "Link expired".to_string()
            })
        );
        assert_eq!(conn.validate_token("missing").await, Err(ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_code_endpoints() {
        let server = TestServer::start(|_, path| match path {
            "/api/parent-access/verify-code" => (
                200,
                r#"{"kidId": 12, "firstName": "Noa", "lastName": "Levi", "formId": 1003}"#
                    .to_string(),
            ),
            _ => (200, String::new()),
        })
        .await;
        let conn = server.connection();

        conn.send_code(&SendCodeRequest {
            form_id: 1003,
            phone_number: "0501234567".to_string(),
        })
        .await
        .unwrap();
        let kid = conn
            .verify_code(&VerifyCodeRequest {
                form_id: 1003,
                phone_number: "0501234567".to_string(),
                code: "123456".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(kid.first_name, "Noa");

        assert_eq!(
            server.request_lines(),
            vec![
                "POST /api/parent-access/send-code",
                "POST /api/parent-access/verify-code",
            ]
        );
        assert!(server.requests()[1].body.contains(r#""code":"123456""#));
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
    }
}
