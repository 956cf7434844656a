//! HTTP implementation of [`CustodyClient`]

use crate::{
    auth::RequestSigner,
    types::{members_hash, CandidateOutput, OutputQuery, SigningSession, TransactionHash},
    ClientError, CustodyClient, Result,
};
use async_trait::async_trait;
use chrono::SecondsFormat;
use cosigner_config::{AgentCredentials, ApiConfig};
use cosigner_crypto::{encrypt_pin, KEY_LENGTH};
use reqwest::{header, Client as HttpClient, Method};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Header carrying a per-request trace id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root; always ends with `/` so endpoint paths join beneath it
    pub base_url: Url,
    /// Request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, timeout })
    }

    pub fn from_api(api: &ApiConfig) -> Result<Self> {
        Self::new(&api.base_url, api.timeout())
    }
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    data: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct BroadcastResult {
    hash: String,
}

/// Custody service client authenticated as one member session
pub struct HttpCustodyClient {
    config: ClientConfig,
    http_client: HttpClient,
    signer: RequestSigner,
    pin_token: [u8; KEY_LENGTH],
    session_key: Zeroizing<Vec<u8>>,
}

impl HttpCustodyClient {
    pub fn new(config: ClientConfig, credentials: &AgentCredentials) -> Result<Self> {
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        let signer = RequestSigner::new(
            credentials.client_id(),
            credentials.session_id(),
            credentials.private_key(),
        )?;

        Ok(Self {
            config,
            http_client,
            signer,
            pin_token: *credentials.pin_token(),
            session_key: Zeroizing::new(credentials.private_key().to_vec()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let mut url = self.config.base_url.join(path)?;
        url.set_query(query.as_deref());

        let body = match body {
            Some(value) => serde_json::to_vec(&value)?,
            None => Vec::new(),
        };
        let uri = &url[url::Position::BeforePath..];
        let token = self.signer.sign_token(method.as_str(), uri, &body)?;
        let request_id = Uuid::new_v4().to_string();

        debug!(%method, uri, request_id = %request_id, "custody request");

        let mut request = self
            .http_client
            .request(method, url.clone())
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, &request_id);
        if !body.is_empty() {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let envelope: ApiEnvelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    code: 0,
                    description: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
        };

        if let Some(error) = envelope.error {
            return Err(ClientError::Api {
                status: if error.status == 0 {
                    status.as_u16()
                } else {
                    error.status
                },
                code: error.code,
                description: error.description,
            });
        }

        envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("missing data field".to_string()))
    }
}

#[async_trait]
impl CustodyClient for HttpCustodyClient {
    async fn list_candidate_outputs(&self, query: &OutputQuery) -> Result<Vec<CandidateOutput>> {
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("members", &members_hash(&query.members))
            .append_pair("threshold", &query.threshold.to_string())
            .append_pair(
                "offset",
                &query.offset.to_rfc3339_opts(SecondsFormat::Nanos, true),
            )
            .append_pair("limit", &query.limit.to_string())
            .append_pair("order", "updated")
            .finish();

        self.request(Method::GET, "multisigs/outputs", Some(params), None)
            .await
    }

    async fn open_signing_session(&self, raw_transaction: &str) -> Result<SigningSession> {
        self.request(
            Method::POST,
            "multisigs/requests",
            None,
            Some(json!({ "action": "sign", "raw": raw_transaction })),
        )
        .await
    }

    async fn add_signature(&self, request_id: &str, pin: &str) -> Result<SigningSession> {
        let encrypted = encrypt_pin(pin, &self.pin_token, &self.session_key)?;
        let path = format!("multisigs/requests/{request_id}/sign");

        self.request(Method::POST, &path, None, Some(json!({ "pin": encrypted })))
            .await
    }

    async fn broadcast_transaction(&self, raw_transaction: &str) -> Result<TransactionHash> {
        let result: BroadcastResult = self
            .request(
                Method::POST,
                "external/proxy",
                None,
                Some(json!({
                    "method": "sendrawtransaction",
                    "params": [raw_transaction],
                })),
            )
            .await?;

        Ok(TransactionHash(result.hash))
    }
}
