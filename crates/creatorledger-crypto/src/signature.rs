//! Ed25519 signatures and verification

use crate::{CryptoError, CryptoResult, PublicKey};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature as DalekSignature, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An Ed25519 signature (64 bytes), or the distinguished empty value
///
/// Canonical string form: standard base64 of the 64 bytes. The empty
/// signature means "no signature": it renders as the empty string,
/// exposes an empty byte slice, and never verifies.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(Option<Box<[u8; 64]>>);

impl Signature {
    /// The distinguished "no signature" value
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wrap raw signature bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(Some(Box::new(bytes)))
    }

    /// Strict parse of the canonical string form ("" parses to empty)
    pub fn parse(s: &str) -> CryptoResult<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let bytes = BASE64
            .decode(s)
            .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignatureFormat("signature must be 64 bytes".to_string())
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Parse that reports failure as `None` instead of an error
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::parse(s).ok()
    }

    /// The signature bytes (empty slice for the empty signature)
    pub fn as_bytes(&self) -> &[u8] {
        match &self.0 {
            Some(bytes) => bytes.as_slice(),
            None => &[],
        }
    }

    /// Whether this is the distinguished empty value
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(bytes) => write!(f, "{}", BASE64.encode(bytes.as_slice())),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "Signature({})", self),
            None => write!(f, "Signature(empty)"),
        }
    }
}

impl FromStr for Signature {
    type Err = CryptoError;

    fn from_str(s: &str) -> CryptoResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Signature {
    type Error = CryptoError;

    fn try_from(s: String) -> CryptoResult<Self> {
        Self::parse(&s)
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_string()
    }
}

/// Verify a signature over a message
///
/// Never fails loudly: invalid key or signature encodings, and the
/// empty signature, verify `false`. Signature content comparison is
/// constant-time inside the dalek verifier.
pub fn verify(public: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Some(bytes) = &signature.0 else {
        return false;
    };
    let Some(verifying_key) = public.to_verifying_key() else {
        return false;
    };
    let signature = DalekSignature::from_bytes(bytes);
    verifying_key.verify(message, &signature).is_ok()
}

/// Verify raw 64-byte signature material over a message
pub fn verify_bytes(public: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    verify(public, message, &Signature::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_keypair, SecretKey};
    use proptest::prelude::*;

    // RFC 8032 section 7.1 test vectors

    const RFC_SEED_1: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const RFC_PUBLIC_1: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const RFC_SIG_1: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

    const RFC_SEED_2: &str = "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb";
    const RFC_PUBLIC_2: &str = "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c";
    const RFC_SIG_2: &str = "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00";

    const RFC_SEED_3: &str = "c5aa8df43f9f837bedb7442f31dcb7b166d38535076f094b85ce3a2e0b4458f7";
    const RFC_PUBLIC_3: &str = "fc51cd8e6218a1a38da47ed00230f0580816ed13ba3303ac5deb911548908025";
    const RFC_SIG_3: &str = "6291d657deec24024827e69c3abe01a30ce548a284743a445e3680d7db5ac3ac18ff9b538d16f290ae67f760984dc6594a7c15e9716ed28dc027beceea1ec40a";

    fn check_vector(seed_hex: &str, public_hex: &str, sig_hex: &str, message: &[u8]) {
        let seed: [u8; 32] = hex::decode(seed_hex).unwrap().try_into().unwrap();
        let secret = SecretKey::from_seed(seed);

        let public = secret.public_key().unwrap();
        assert_eq!(hex::encode(public.as_bytes()), public_hex);

        let signature = secret.sign(message).unwrap();
        assert_eq!(hex::encode(signature.as_bytes()), sig_hex);

        assert!(verify(&public, message, &signature));
    }

    #[test]
    fn test_rfc8032_vector_1_empty_message() {
        check_vector(RFC_SEED_1, RFC_PUBLIC_1, RFC_SIG_1, b"");
    }

    #[test]
    fn test_rfc8032_vector_2_single_byte() {
        check_vector(RFC_SEED_2, RFC_PUBLIC_2, RFC_SIG_2, &[0x72]);
    }

    #[test]
    fn test_rfc8032_vector_3_two_bytes() {
        check_vector(RFC_SEED_3, RFC_PUBLIC_3, RFC_SIG_3, &[0xaf, 0x82]);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let (_, secret) = generate_keypair();
        let a = secret.sign(b"same message").unwrap();
        let b = secret.sign(b"same message").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_, secret) = generate_keypair();
        let (other_public, _) = generate_keypair();
        let signature = secret.sign(b"message").unwrap();
        assert!(!verify(&other_public, b"message", &signature));
    }

    #[test]
    fn test_empty_signature_never_verifies() {
        let (public, _) = generate_keypair();
        assert!(!verify(&public, b"anything", &Signature::empty()));
        assert!(!verify_bytes(&public, b"anything", &[]));
    }

    #[test]
    fn test_empty_signature_canonical_form() {
        let empty = Signature::empty();
        assert_eq!(empty.to_string(), "");
        assert!(empty.as_bytes().is_empty());
        assert_eq!(Signature::parse("").unwrap(), empty);
    }

    #[test]
    fn test_signature_parse_failures() {
        assert!(Signature::parse("!!!not-base64!!!").is_err());
        // valid base64, wrong length
        assert!(Signature::parse("AAAA").is_err());
        assert!(Signature::try_parse("!!!").is_none());
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let (_, secret) = generate_keypair();
        let signature = secret.sign(b"message").unwrap();
        let json = serde_json::to_string(&signature).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(signature, back);
    }

    proptest! {
        // Sign/verify round-trip holds for every message
        #[test]
        fn prop_sign_verify_roundtrip(seed in any::<[u8; 32]>(), message in proptest::collection::vec(any::<u8>(), 0..256)) {
            let secret = SecretKey::from_seed(seed);
            let public = secret.public_key().unwrap();
            let signature = secret.sign(&message).unwrap();
            prop_assert!(verify(&public, &message, &signature));
        }

        // Flipping any bit of the message breaks verification
        #[test]
        fn prop_tampered_message_fails(seed in any::<[u8; 32]>(), message in proptest::collection::vec(any::<u8>(), 1..128), byte_idx: usize, bit in 0u8..8) {
            let secret = SecretKey::from_seed(seed);
            let public = secret.public_key().unwrap();
            let signature = secret.sign(&message).unwrap();

            let mut tampered = message.clone();
            let idx = byte_idx % tampered.len();
            tampered[idx] ^= 1 << bit;
            prop_assert!(!verify(&public, &tampered, &signature));
        }

        // Flipping any bit of the signature breaks verification
        #[test]
        fn prop_tampered_signature_fails(seed in any::<[u8; 32]>(), message in proptest::collection::vec(any::<u8>(), 0..128), byte_idx in 0usize..64, bit in 0u8..8) {
            let secret = SecretKey::from_seed(seed);
            let public = secret.public_key().unwrap();
            let signature = secret.sign(&message).unwrap();

            let mut bytes: [u8; 64] = signature.as_bytes().try_into().unwrap();
            bytes[byte_idx] ^= 1 << bit;
            prop_assert!(!verify(&public, &message, &Signature::from_bytes(bytes)));
        }

        // Flipping any bit of the public key breaks verification
        #[test]
        fn prop_tampered_public_key_fails(seed in any::<[u8; 32]>(), message in proptest::collection::vec(any::<u8>(), 0..128), byte_idx in 0usize..32, bit in 0u8..8) {
            let secret = SecretKey::from_seed(seed);
            let public = secret.public_key().unwrap();
            let signature = secret.sign(&message).unwrap();

            let mut bytes = *public.as_bytes();
            bytes[byte_idx] ^= 1 << bit;
            prop_assert!(!verify(&PublicKey::from_bytes(bytes), &message, &signature));
        }

        // Canonical encoding round-trips for keys and signatures
        #[test]
        fn prop_canonical_encoding_roundtrip(seed in any::<[u8; 32]>(), message in proptest::collection::vec(any::<u8>(), 0..64)) {
            let secret = SecretKey::from_seed(seed);
            let public = secret.public_key().unwrap();
            let signature = secret.sign(&message).unwrap();

            prop_assert_eq!(PublicKey::parse(&public.to_string()).unwrap(), public);
            prop_assert_eq!(Signature::parse(&signature.to_string()).unwrap(), signature);
        }
    }
}
