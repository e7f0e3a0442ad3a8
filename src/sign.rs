//! Signing layer
//!
//! Attaches and validates opaque signatures over block identity. The
//! cryptographic primitive is an injected capability: the core owns only the
//! byte layout and the decision of what gets signed. The signed message is
//! exactly the block's 32-byte content hash — the same bytes
//! [`verify_block`] recomputes — so a tampered-but-resigned block is still
//! detectable without the private key.
//!
//! [`verify_block`]: crate::audit::verify_block
//!
//! The shipped implementation is ed25519; key material is treated as opaque
//! bytes and no key management is provided.

use crate::block::{now_millis, Block, SIGNATURE_SIZE};
use crate::chain::Chain;
use crate::error::{Error, Result};
use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier as DalekVerifier, VerifyingKey};
use rand::rngs::OsRng;

/// Signing capability injected into the core
pub trait BlockSigner {
    /// Sign a message, returning signature bytes (at most
    /// [`SIGNATURE_SIZE`])
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Verification counterpart of [`BlockSigner`]
pub trait BlockVerifier {
    /// True if `signature` is valid for `message`
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 signer over an externally supplied private key
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Wrap externally supplied private key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(bytes),
        }
    }

    /// Generate a fresh keypair (tests, provisioning)
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// The matching verifier
    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier {
            key: self.key.verifying_key(),
        }
    }
}

impl BlockSigner for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = DalekSigner::sign(&self.key, message);
        Ok(signature.to_bytes().to_vec())
    }
}

/// Ed25519 verifier over an externally supplied public key
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Wrap externally supplied public key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(Self { key })
    }
}

impl BlockVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::from_slice(signature) {
            Ok(sig) => DalekVerifier::verify(&self.key, message, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

/// Validate a block's stored signature against its content hash
pub fn verify_block_signature(block: &Block, verifier: &dyn BlockVerifier) -> bool {
    let sig = &block.identity.signature;
    if sig.is_empty() || block.identity.sig_len as usize != sig.len() {
        return false;
    }
    verifier.verify(&block.identity.hash, sig)
}

impl Chain {
    /// Sign a block's content hash and store the signature bytes
    pub fn sign_block(&mut self, index: usize, signer: &dyn BlockSigner) -> Result<()> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(Error::BlockNotFound(index))?;

        let signature = signer.sign(&block.identity.hash)?;
        if signature.len() > SIGNATURE_SIZE {
            return Err(Error::Signing(format!(
                "signature of {} bytes exceeds the {}-byte field",
                signature.len(),
                SIGNATURE_SIZE
            )));
        }

        block.identity.sig_len = signature.len() as u16;
        block.identity.signature = signature;
        block.time.validated_at = now_millis();
        self.updated_at = now_millis();
        Ok(())
    }

    /// Validate one block's signature
    pub fn verify_signature(&self, index: usize, verifier: &dyn BlockVerifier) -> bool {
        match self.blocks.get(index) {
            Some(block) => verify_block_signature(block, verifier),
            None => false,
        }
    }
}
