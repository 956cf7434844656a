//! Scripted custody service for engine tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cosigner_client::{
    CandidateOutput, ClientError, CustodyClient, OutputQuery, Result, SigningSession,
    TransactionHash, UtxoState,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(OutputQuery),
    Open(String),
    /// request id, pin
    Sign(String, String),
    Broadcast(String),
}

#[derive(Default)]
struct State {
    batches: VecDeque<Result<Vec<CandidateOutput>>>,
    /// keyed by raw transaction
    sessions: HashMap<String, SigningSession>,
    failing_opens: HashSet<String>,
    fail_sign: bool,
    fail_broadcast: bool,
    calls: Vec<Call>,
}

pub struct MockClient {
    agent_id: String,
    state: Mutex<State>,
}

fn remote_failure() -> ClientError {
    ClientError::Api {
        status: 500,
        code: 500,
        description: "scripted failure".to_string(),
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_709_294_400 + secs, 0).unwrap()
}

pub fn session(signers: &[&str], threshold: u8) -> SigningSession {
    SigningSession {
        request_id: "req".to_string(),
        action: "sign".to_string(),
        state: "initial".to_string(),
        raw_transaction: "raw".to_string(),
        signers: signers.iter().map(|s| s.to_string()).collect(),
        threshold,
        transaction_hash: None,
    }
}

pub fn output(utxo_id: &str, raw: &str, state: UtxoState, secs: i64) -> CandidateOutput {
    CandidateOutput {
        utxo_id: utxo_id.to_string(),
        asset_id: "asset".to_string(),
        amount: "1".to_string(),
        state,
        signed_tx: raw.to_string(),
        updated_at: at(secs),
    }
}

/// A signed output `secs` after the test epoch
pub fn output_at(utxo_id: &str, raw: &str, secs: i64) -> CandidateOutput {
    output(utxo_id, raw, UtxoState::Signed, secs)
}

impl MockClient {
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Serve a session for `raw`; its request id becomes `req-{raw}`
    pub fn add_session(&self, raw: &str, mut session: SigningSession) {
        session.request_id = format!("req-{raw}");
        session.raw_transaction = raw.to_string();
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(raw.to_string(), session);
    }

    pub fn push_batch(&self, batch: Vec<CandidateOutput>) {
        self.state.lock().unwrap().batches.push_back(Ok(batch));
    }

    pub fn push_list_failure(&self) {
        self.state
            .lock()
            .unwrap()
            .batches
            .push_back(Err(remote_failure()));
    }

    pub fn fail_open(&self, raw: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_opens
            .insert(raw.to_string());
    }

    pub fn fail_sign(&self) {
        self.state.lock().unwrap().fail_sign = true;
    }

    pub fn fail_broadcast(&self) {
        self.state.lock().unwrap().fail_broadcast = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn list_count(&self) -> usize {
        self.count(|call| matches!(call, Call::List(_)))
    }

    pub fn sign_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Sign(..)))
    }

    pub fn broadcast_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Broadcast(_)))
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

#[async_trait]
impl CustodyClient for MockClient {
    async fn list_candidate_outputs(&self, query: &OutputQuery) -> Result<Vec<CandidateOutput>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List(query.clone()));
        state.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn open_signing_session(&self, raw_transaction: &str) -> Result<SigningSession> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Open(raw_transaction.to_string()));
        if state.failing_opens.contains(raw_transaction) {
            return Err(remote_failure());
        }
        state
            .sessions
            .get(raw_transaction)
            .cloned()
            .ok_or_else(|| ClientError::InvalidResponse("unknown transaction".to_string()))
    }

    async fn add_signature(&self, request_id: &str, pin: &str) -> Result<SigningSession> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Sign(request_id.to_string(), pin.to_string()));
        if state.fail_sign {
            return Err(remote_failure());
        }

        let agent_id = self.agent_id.clone();
        let session = state
            .sessions
            .values_mut()
            .find(|session| session.request_id == request_id)
            .ok_or_else(|| ClientError::InvalidResponse("unknown request".to_string()))?;
        if !session.has_signer(&agent_id) {
            session.signers.push(agent_id);
        }
        Ok(session.clone())
    }

    async fn broadcast_transaction(&self, raw_transaction: &str) -> Result<TransactionHash> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Broadcast(raw_transaction.to_string()));
        if state.fail_broadcast {
            return Err(remote_failure());
        }
        Ok(TransactionHash(format!("hash-{raw_transaction}")))
    }
}
