//! Mock JWKS endpoint harness.
//!
//! Wraps a wiremock server serving a Cognito-style key document, plus a
//! test configuration pointing the identity core at it.

use identity::config::Config;
use serde_json::Value;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER};

/// Path the mock key document is served under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A mock identity-provider key endpoint.
pub struct MockJwks {
    /// The underlying wiremock server, exposed for custom expectations.
    pub server: MockServer,
}

impl MockJwks {
    /// Start a mock server with no mounted responses.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full URL of the key document.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve `document` for any number of fetches.
    pub async fn serve_keys(&self, document: Value) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(&document))
            .mount(&self.server)
            .await;
    }

    /// Serve `document` and assert exactly `hits` fetches when the server
    /// is dropped.
    pub async fn serve_keys_expecting(&self, document: Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(&document))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Serve an HTTP error status from the key endpoint.
    pub async fn serve_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Drop all mounted responses and recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Identity configuration pointing at this mock endpoint.
    ///
    /// Uses the fixture issuer/audience so tokens from
    /// `TestTokenBuilder::new()` validate without further setup.
    ///
    /// # Panics
    ///
    /// Panics if the test variables fail validation, which would be a
    /// harness defect.
    #[must_use]
    pub fn config(&self) -> Config {
        let vars = HashMap::from([
            ("AWS_REGION".to_string(), "us-east-1".to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                "us-east-1_TestPool".to_string(),
            ),
            ("COGNITO_ISSUER".to_string(), TEST_ISSUER.to_string()),
            ("COGNITO_JWKS_URL".to_string(), self.url()),
            ("COGNITO_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ]);

        Config::from_vars(&vars).expect("test configuration should validate")
    }
}
