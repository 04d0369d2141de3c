//! Remote Authorizer Client (C2): exchanges an opaque bearer token and a
//! declared cluster ID with the external authorization service.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AuthorizerClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    account_id: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl AuthorizerClient {
    pub fn new(endpoint: reqwest::Url) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, endpoint })
    }

    /// Exchanges `(token, cluster_id)` for the canonical subject and tenant
    /// labels. 2xx -> success; 401/403 -> `Forbidden`; anything else,
    /// including transport failure, -> `UpstreamUnavailable`.
    pub async fn authorize_cluster(
        &self,
        token: &str,
        cluster_id: &str,
    ) -> Result<(String, BTreeMap<String, String>), Error> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .form(&[
                ("cluster_id", cluster_id),
                ("authorization_token", token),
            ])
            .send()
            .await
            .map_err(|source| Error::UpstreamUnavailable { source })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Forbidden);
        }
        if !status.is_success() {
            let source = response
                .error_for_status()
                .expect_err("non-2xx status always yields an error here");
            return Err(Error::UpstreamUnavailable { source });
        }

        let parsed: AuthorizeResponse = response.json().await.map_err(|source| {
            tracing::warn!(%source, "upstream authorizer returned an unparsable body");
            Error::UpstreamUnavailable { source }
        })?;

        Ok((parsed.account_id, parsed.labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn authorize_cluster_parses_success_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "account_id": "acct-1",
                "labels": {"env": "prod"},
            })))
            .mount(&server)
            .await;

        let client =
            AuthorizerClient::new(format!("{}/authorize", server.uri()).parse().unwrap()).unwrap();
        let (subject, labels) = client.authorize_cluster("tok", "cluster-a").await.unwrap();

        assert_eq!(subject, "acct-1");
        assert_eq!(labels.get("env"), Some(&"prod".to_owned()));
    }

    #[tokio::test]
    async fn authorize_cluster_maps_403_to_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client =
            AuthorizerClient::new(format!("{}/authorize", server.uri()).parse().unwrap()).unwrap();
        let err = client.authorize_cluster("tok", "cluster-a").await.unwrap_err();
        assert!(matches!(err, Error::Forbidden));
    }

    #[tokio::test]
    async fn authorize_cluster_maps_5xx_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client =
            AuthorizerClient::new(format!("{}/authorize", server.uri()).parse().unwrap()).unwrap();
        let err = client.authorize_cluster("tok", "cluster-a").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
    }
}
