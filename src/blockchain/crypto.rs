use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// A wallet address: the owner's ed25519 public key in base58
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let bytes = public_key.as_bytes();
        let encoded = bs58::encode(bytes).into_string();
        Address(encoded)
    }

    /// Converts the address back to a public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        VerifyingKey::from_bytes(&bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key bytes".to_string())
        })?)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    /// Accepts only base58 strings that decode to an ed25519 public key
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// A detached signature in base58
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        let bytes = signature.to_bytes();
        let encoded = bs58::encode(bytes).into_string();
        DigitalSignature(encoded)
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }
}

/// Capability to sign arbitrary bytes on behalf of an address.
///
/// The ledger never looks inside a signature; it only hands the bytes it wants
/// covered to the signer and later checks them with [`verify_signature`].
pub trait Signer {
    /// Signs `message` with the owner's private key
    fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError>;
}

/// An ed25519 key pair and the address derived from it
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Creates a new random key pair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let address = Address::from_public_key(&signing_key.verifying_key());

        KeyPair {
            signing_key,
            address,
        }
    }

    /// Gets the address of the key pair
    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl Signer for KeyPair {
    fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        Ok(DigitalSignature::from_signature(&signature))
    }
}

/// Checks that `signature` over `message` was produced by the owner of `address`.
///
/// Malformed addresses or signatures verify as false.
pub fn verify_signature(address: &Address, message: &[u8], signature: &DigitalSignature) -> bool {
    let public_key = match address.to_public_key() {
        Ok(key) => key,
        Err(_) => return false,
    };

    let signature = match signature.to_signature() {
        Ok(signature) => signature,
        Err(_) => return false,
    };

    public_key.verify(message, &signature).is_ok()
}
