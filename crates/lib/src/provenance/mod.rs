//! Signed provenance records.
//!
//! Every package carries a `chain.json`: an append-only [`EventChain`] whose
//! genesis event names the staged package by content hash. Signing sits
//! behind the [`Signer`] capability; [`Ed25519Signer`] is the reference
//! implementation.
//!
//! ```text
//! secret ──derive_account──▶ Account ──sign_event──▶ SignedEvent ──▶ EventChain
//! ```
//!
//! The secret is consumed by `derive_account` and never stored or logged.

pub mod ed25519;

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::CHAIN_ID_LEN;
use crate::util::hash::hash_bytes;

pub use ed25519::Ed25519Signer;

/// Event type of the genesis event of a package chain.
pub const PACKAGE_EVENT: &str = "ownable/package";

const CHAIN_NONCE_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum ProvenanceError {
  #[error("secret must not be empty")]
  EmptySecret,

  #[error("invalid key material: {0}")]
  InvalidKey(String),

  #[error("failed to serialize event: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("event {index} does not verify: {message}")]
  Verification { index: usize, message: String },
}

/// User secret the signing key is derived from.
pub struct Secret(String);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn expose(&self) -> &[u8] {
    self.0.as_bytes()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(<redacted>)")
  }
}

/// Key pair derived from a secret, plus the network it signs for.
pub struct Account {
  public_key: Vec<u8>,
  private_key: Vec<u8>,
  network: String,
}

impl Account {
  pub fn new(public_key: Vec<u8>, private_key: Vec<u8>, network: impl Into<String>) -> Self {
    Self {
      public_key,
      private_key,
      network: network.into(),
    }
  }

  pub fn public_key(&self) -> &[u8] {
    &self.public_key
  }

  /// Meant for the signer that created the account.
  pub fn private_key(&self) -> &[u8] {
    &self.private_key
  }

  pub fn network(&self) -> &str {
    &self.network
  }

  pub fn identity(&self) -> SignerIdentity {
    SignerIdentity {
      public_key: hex::encode(&self.public_key),
      network: self.network.clone(),
    }
  }
}

impl fmt::Debug for Account {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Account")
      .field("public_key", &hex::encode(&self.public_key))
      .field("network", &self.network)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
  /// Hex-encoded public key.
  pub public_key: String,
  pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
  #[serde(rename = "type")]
  pub event_type: String,
  /// Content hash of the staged package.
  pub package: String,
  pub network: String,
  pub keywords: Vec<String>,
}

impl EventPayload {
  pub fn package(package_hash: impl Into<String>, network: impl Into<String>, keywords: Vec<String>) -> Self {
    Self {
      event_type: PACKAGE_EVENT.to_string(),
      package: package_hash.into(),
      network: network.into(),
      keywords,
    }
  }
}

/// The part of an event covered by its hash and signature.
///
/// Field order is the canonical serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedEvent {
  pub previous: String,
  /// Milliseconds since the Unix epoch.
  pub timestamp: i64,
  pub signer: SignerIdentity,
  pub payload: EventPayload,
}

impl UnsignedEvent {
  pub fn canonical_bytes(&self) -> Result<Vec<u8>, ProvenanceError> {
    Ok(serde_json::to_vec(self)?)
  }

  /// SHA-256 hex of the canonical bytes.
  pub fn hash(&self) -> Result<String, ProvenanceError> {
    Ok(hash_bytes(&self.canonical_bytes()?).0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
  pub previous: String,
  pub timestamp: i64,
  pub signer: SignerIdentity,
  pub payload: EventPayload,
  pub hash: String,
  /// Hex-encoded signature over the raw bytes of `hash`.
  pub signature: String,
}

impl SignedEvent {
  pub fn unsigned(&self) -> UnsignedEvent {
    UnsignedEvent {
      previous: self.previous.clone(),
      timestamp: self.timestamp,
      signer: self.signer.clone(),
      payload: self.payload.clone(),
    }
  }
}

/// Capability to derive accounts and sign events.
pub trait Signer: Send + Sync {
  /// Derive the signing account for `network`; consumes the secret.
  fn derive_account(&self, secret: Secret, network: &str) -> Result<Account, ProvenanceError>;

  fn sign_event(&self, account: &Account, payload: EventPayload, previous: &str) -> Result<SignedEvent, ProvenanceError>;

  /// Check that `event.signature` is a valid signature of `event.hash`.
  fn verify_signature(&self, event: &SignedEvent) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChain {
  pub id: String,
  pub events: Vec<SignedEvent>,
}

impl EventChain {
  /// Start an empty chain for `account` with a random nonce.
  pub fn new(account: &Account) -> Self {
    let mut nonce = [0u8; CHAIN_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    Self::with_nonce(account, &nonce)
  }

  /// Id is the leading hex of SHA-256(public key ‖ nonce).
  pub fn with_nonce(account: &Account, nonce: &[u8]) -> Self {
    let mut seed = account.public_key().to_vec();
    seed.extend_from_slice(nonce);
    let id = hash_bytes(&seed).prefix(CHAIN_ID_LEN).to_string();
    debug!(chain = %id, "started event chain");
    Self { id, events: Vec::new() }
  }

  /// `previous` of the genesis event: SHA-256 hex of the chain id.
  pub fn anchor(&self) -> String {
    hash_bytes(self.id.as_bytes()).0
  }

  pub fn head(&self) -> String {
    self.events.last().map(|e| e.hash.clone()).unwrap_or_else(|| self.anchor())
  }

  pub fn append<S: Signer + ?Sized>(
    &mut self,
    signer: &S,
    account: &Account,
    payload: EventPayload,
  ) -> Result<&SignedEvent, ProvenanceError> {
    let event = signer.sign_event(account, payload, &self.head())?;
    self.events.push(event);
    let event = &self.events[self.events.len() - 1];
    debug!(chain = %self.id, hash = %event.hash, "appended event");
    Ok(event)
  }

  /// Check linkage, hashes and signatures of every event.
  pub fn verify<S: Signer + ?Sized>(&self, signer: &S) -> Result<(), ProvenanceError> {
    let mut previous = self.anchor();
    for (index, event) in self.events.iter().enumerate() {
      let fail = |message: String| ProvenanceError::Verification { index, message };

      if event.previous != previous {
        return Err(fail(format!("previous {} does not link to {}", event.previous, previous)));
      }
      let hash = event.unsigned().hash()?;
      if hash != event.hash {
        return Err(fail(format!("hash {} does not match content {}", event.hash, hash)));
      }
      signer.verify_signature(event).map_err(fail)?;
      previous = event.hash.clone();
    }
    Ok(())
  }

  pub fn to_json(&self) -> Result<String, ProvenanceError> {
    Ok(format!("{}\n", serde_json::to_string_pretty(self)?))
  }
}

/// Derive the account, start a chain and add the package genesis event.
pub fn record_package<S: Signer + ?Sized>(
  signer: &S,
  secret: Secret,
  network: &str,
  package_hash: &str,
  keywords: Vec<String>,
) -> Result<EventChain, ProvenanceError> {
  let account = signer.derive_account(secret, network)?;
  let mut chain = EventChain::new(&account);
  chain.append(signer, &account, EventPayload::package(package_hash, network, keywords))?;
  info!(chain = %chain.id, network = %network, "recorded package provenance");
  Ok(chain)
}
