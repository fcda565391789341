//! Operator self-check: confirm the public callback base URL reaches a
//! running endpoint by sending it a fresh challenge.

use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use ws_common::ChallengeVerifier;
use ws_config::HubConfig;

use crate::client::build_http_client;
use crate::error::{HubError, Result};

pub struct CallbackProbe {
    client: Client,
    verifier: ChallengeVerifier,
}

impl CallbackProbe {
    pub fn new(config: &HubConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            verifier: ChallengeVerifier::new(),
        })
    }

    /// GET `<callback_base_url>?validate=<challenge>` and check the reply
    pub async fn verify(&self, callback_base_url: &str) -> Result<()> {
        let challenge = self.verifier.generate_challenge();

        let response = self
            .client
            .get(callback_base_url)
            .query(&[("validate", challenge.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            warn!(url = %callback_base_url, status = status.as_u16(), "Callback probe rejected");
            return Err(HubError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        if !self.verifier.verify(&challenge, body.trim()) {
            warn!(url = %callback_base_url, "Callback probe got a wrong challenge response");
            return Err(HubError::ChallengeMismatch);
        }

        info!(url = %callback_base_url, "Callback endpoint verified");
        Ok(())
    }
}
