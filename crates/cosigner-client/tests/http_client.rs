use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{TimeZone, Utc};
use cosigner_client::{
    auth::{request_digest, Claims},
    members_hash, ClientConfig, ClientError, CustodyClient, HttpCustodyClient, OutputQuery,
    UtxoState,
};
use cosigner_config::{AgentCredentials, DappConfig};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;

const SESSION_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
const SESSION_PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
const SERVER_PUBLIC: &str = "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Healthy,
    ErrorEnvelope,
    Unavailable,
}

#[derive(Clone)]
struct MockService {
    mode: Mode,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

fn session(signers: &[&str]) -> Value {
    json!({
        "type": "multisig_request",
        "request_id": "req-1",
        "action": "sign",
        "state": "initial",
        "raw_transaction": "77770002deadbeef",
        "signers": signers,
        "threshold": 3
    })
}

async fn handle(
    State(service): State<MockService>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    service.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    });

    match service.mode {
        Mode::ErrorEnvelope => {
            return (
                StatusCode::ACCEPTED,
                Json(json!({
                    "error": {"status": 202, "code": 20117, "description": "Insufficient balance."}
                })),
            )
                .into_response()
        }
        Mode::Unavailable => {
            return (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
        }
        Mode::Healthy => {}
    }

    let data = match (method.as_str(), uri.path()) {
        ("GET", "/multisigs/outputs") => json!([{
            "type": "multisig_utxo",
            "utxo_id": "utxo-1",
            "asset_id": "asset",
            "amount": "1",
            "state": "signed",
            "signed_tx": "77770002deadbeef",
            "updated_at": "2024-03-01T12:00:01.5Z"
        }]),
        ("POST", "/multisigs/requests") => session(&["peer-a", "peer-b"]),
        ("POST", "/multisigs/requests/req-1/sign") => session(&["peer-a", "peer-b", "agent"]),
        ("POST", "/external/proxy") => json!({"hash": "f00dcafe"}),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"status": 404, "code": 404, "description": "not found"}})),
            )
                .into_response()
        }
    };

    Json(json!({ "data": data })).into_response()
}

async fn spawn_service(mode: Mode) -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(handle).with_state(MockService {
        mode,
        requests: requests.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, requests)
}

fn credentials() -> AgentCredentials {
    AgentCredentials::from_dapp(&DappConfig {
        client_id: "agent".to_string(),
        session_id: "session".to_string(),
        private_key_seed: SESSION_SEED.to_string(),
        pin_seed: "00".repeat(32),
        server_public_key: SERVER_PUBLIC.to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn client(addr: SocketAddr) -> HttpCustodyClient {
    let config = ClientConfig::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    HttpCustodyClient::new(config, &credentials()).unwrap()
}

fn verify_request(recorded: &Recorded) -> Claims {
    let auth = recorded
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    let token = auth.strip_prefix("Bearer ").unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let public: [u8; 32] = hex::decode(SESSION_PUBLIC).unwrap().try_into().unwrap();
    let signature: [u8; 64] = URL_SAFE_NO_PAD
        .decode(parts[2])
        .unwrap()
        .try_into()
        .unwrap();
    VerifyingKey::from_bytes(&public)
        .unwrap()
        .verify(
            format!("{}.{}", parts[0], parts[1]).as_bytes(),
            &Signature::from_bytes(&signature),
        )
        .unwrap();

    let claims: Claims =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    let uri = match &recorded.query {
        Some(query) => format!("{}?{}", recorded.path, query),
        None => recorded.path.clone(),
    };
    assert_eq!(
        claims.sig,
        request_digest(recorded.method.as_str(), &uri, &recorded.body)
    );
    assert!(recorded.headers.contains_key("x-request-id"));
    claims
}

#[tokio::test]
async fn test_list_candidate_outputs() {
    let (addr, requests) = spawn_service(Mode::Healthy).await;
    let client = client(addr);

    let members = vec!["peer-b".to_string(), "agent".to_string(), "peer-a".to_string()];
    let query = OutputQuery {
        members: members.clone(),
        threshold: 3,
        offset: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        limit: 500,
    };
    let outputs = client.list_candidate_outputs(&query).await.unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].utxo_id, "utxo-1");
    assert_eq!(outputs[0].state, UtxoState::Signed);

    let recorded = requests.lock().unwrap()[0].clone();
    assert_eq!(recorded.method, Method::GET);
    assert_eq!(recorded.path, "/multisigs/outputs");

    let params: HashMap<String, String> =
        url::form_urlencoded::parse(recorded.query.as_deref().unwrap().as_bytes())
            .into_owned()
            .collect();
    assert_eq!(params["members"], members_hash(&members));
    assert_eq!(params["threshold"], "3");
    assert_eq!(params["offset"], "2024-03-01T12:00:00.000000000Z");
    assert_eq!(params["limit"], "500");
    assert_eq!(params["order"], "updated");

    let claims = verify_request(&recorded);
    assert_eq!(claims.uid, "agent");
    assert_eq!(claims.sid, "session");
    assert_eq!(claims.scp, "FULL");
}

#[tokio::test]
async fn test_signing_flow_requests() {
    let (addr, requests) = spawn_service(Mode::Healthy).await;
    let client = client(addr);

    let opened = client
        .open_signing_session("77770002deadbeef")
        .await
        .unwrap();
    assert_eq!(opened.request_id, "req-1");
    assert_eq!(opened.signer_count(), 2);

    let signed = client.add_signature("req-1", "ignored-by-mock").await.unwrap();
    assert!(signed.has_signer("agent"));

    let hash = client
        .broadcast_transaction(&signed.raw_transaction)
        .await
        .unwrap();
    assert_eq!(hash.to_string(), "f00dcafe");

    let recorded = requests.lock().unwrap().clone();
    assert_eq!(recorded.len(), 3);

    assert_eq!(recorded[0].path, "/multisigs/requests");
    let body: Value = serde_json::from_slice(&recorded[0].body).unwrap();
    assert_eq!(body, json!({"action": "sign", "raw": "77770002deadbeef"}));

    assert_eq!(recorded[1].path, "/multisigs/requests/req-1/sign");
    let body: Value = serde_json::from_slice(&recorded[1].body).unwrap();
    let encrypted = URL_SAFE_NO_PAD
        .decode(body["pin"].as_str().unwrap())
        .unwrap();
    // IV, then pin || timestamp || iterator (31 bytes) padded to two blocks
    assert_eq!(encrypted.len(), 16 + 16 * 2);

    assert_eq!(recorded[2].path, "/external/proxy");
    let body: Value = serde_json::from_slice(&recorded[2].body).unwrap();
    assert_eq!(
        body,
        json!({"method": "sendrawtransaction", "params": ["77770002deadbeef"]})
    );

    let request_ids: Vec<_> = recorded
        .iter()
        .map(|r| {
            verify_request(r);
            r.headers.get("x-request-id").cloned().unwrap()
        })
        .collect();
    assert_ne!(request_ids[0], request_ids[1]);
}

#[tokio::test]
async fn test_error_envelope() {
    let (addr, _) = spawn_service(Mode::ErrorEnvelope).await;
    let client = client(addr);

    let err = client.open_signing_session("7777").await.unwrap_err();
    match err {
        ClientError::Api {
            status,
            code,
            description,
        } => {
            assert_eq!(status, 202);
            assert_eq!(code, 20117);
            assert_eq!(description, "Insufficient balance.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_failure() {
    let (addr, _) = spawn_service(Mode::Unavailable).await;
    let client = client(addr);

    let err = client.broadcast_transaction("7777").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 502, .. }));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).open_signing_session("7777").await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}
