use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use super::{Account, EventPayload, ProvenanceError, Secret, SignedEvent, Signer, UnsignedEvent};

/// Ed25519 signing with the key seed taken as SHA-256 of the secret.
///
/// The same secret always yields the same account.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
  fn signing_key(account: &Account) -> Result<SigningKey, ProvenanceError> {
    let seed: [u8; 32] = account
      .private_key()
      .try_into()
      .map_err(|_| ProvenanceError::InvalidKey("expected a 32-byte ed25519 seed".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
  }
}

impl Signer for Ed25519Signer {
  fn derive_account(&self, secret: Secret, network: &str) -> Result<Account, ProvenanceError> {
    if secret.is_empty() {
      return Err(ProvenanceError::EmptySecret);
    }
    let seed: [u8; 32] = Sha256::digest(secret.expose()).into();
    drop(secret);

    let key = SigningKey::from_bytes(&seed);
    Ok(Account::new(
      key.verifying_key().to_bytes().to_vec(),
      seed.to_vec(),
      network,
    ))
  }

  fn sign_event(&self, account: &Account, payload: EventPayload, previous: &str) -> Result<SignedEvent, ProvenanceError> {
    let key = Self::signing_key(account)?;
    let unsigned = UnsignedEvent {
      previous: previous.to_string(),
      timestamp: chrono::Utc::now().timestamp_millis(),
      signer: account.identity(),
      payload,
    };

    let hash = unsigned.hash()?;
    let hash_bytes = hex::decode(&hash).map_err(|e| ProvenanceError::InvalidKey(e.to_string()))?;
    let signature: Signature = key.sign(&hash_bytes);

    Ok(SignedEvent {
      previous: unsigned.previous,
      timestamp: unsigned.timestamp,
      signer: unsigned.signer,
      payload: unsigned.payload,
      hash,
      signature: hex::encode(signature.to_bytes()),
    })
  }

  fn verify_signature(&self, event: &SignedEvent) -> Result<(), String> {
    let public: [u8; 32] = hex::decode(&event.signer.public_key)
      .map_err(|e| format!("public key is not hex: {}", e))?
      .try_into()
      .map_err(|_| "public key must be 32 bytes".to_string())?;
    let key = VerifyingKey::from_bytes(&public).map_err(|e| e.to_string())?;

    let signature: [u8; 64] = hex::decode(&event.signature)
      .map_err(|e| format!("signature is not hex: {}", e))?
      .try_into()
      .map_err(|_| "signature must be 64 bytes".to_string())?;
    let hash = hex::decode(&event.hash).map_err(|e| format!("hash is not hex: {}", e))?;

    key
      .verify(&hash, &Signature::from_bytes(&signature))
      .map_err(|e| format!("bad signature: {}", e))
  }
}
