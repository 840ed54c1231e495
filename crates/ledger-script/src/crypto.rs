use bitcoin::hashes::{Hash, hash160, ripemd160, sha1, sha256, sha256d};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly, ecdsa};

/// Digest families reachable from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Ripemd160,
    Sha1,
    Sha256,
    /// RIPEMD160(SHA256(x)).
    Hash160,
    /// SHA256(SHA256(x)).
    Hash256,
}

/// Hashing and signature verification supplied by the caller.
///
/// The engine never implements cryptography itself; every hash opcode and every
/// signature check goes through this trait.
pub trait CryptoCapability {
    fn hash(&self, algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8>;

    /// Returns whether `signature` is valid for `message` under `pubkey`.
    ///
    /// Malformed keys or signatures must yield `false`, never a panic.
    fn verify_signature(&self, pubkey: &[u8], signature: &[u8], message: &[u8]) -> bool;
}

fn hash_with_bitcoin_hashes(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Ripemd160 => ripemd160::Hash::hash(data).to_byte_array().to_vec(),
        HashAlgorithm::Sha1 => sha1::Hash::hash(data).to_byte_array().to_vec(),
        HashAlgorithm::Sha256 => sha256::Hash::hash(data).to_byte_array().to_vec(),
        HashAlgorithm::Hash160 => hash160::Hash::hash(data).to_byte_array().to_vec(),
        HashAlgorithm::Hash256 => sha256d::Hash::hash(data).to_byte_array().to_vec(),
    }
}

/// DER-encoded ECDSA over secp256k1.
///
/// The message must be a 32-byte digest. Keys may be compressed or uncompressed,
/// and high-S signatures are accepted.
pub struct Secp256k1Crypto {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Crypto {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoCapability for Secp256k1Crypto {
    fn hash(&self, algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        hash_with_bitcoin_hashes(algorithm, data)
    }

    fn verify_signature(&self, pubkey: &[u8], signature: &[u8], message: &[u8]) -> bool {
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Ok(mut signature) = ecdsa::Signature::from_der(signature) else {
            return false;
        };
        // libsecp256k1 only verifies lower-S form.
        signature.normalize_s();
        let Ok(digest) = <[u8; 32]>::try_from(message) else {
            return false;
        };

        let msg = Message::from_digest(digest);

        self.secp.verify_ecdsa(&msg, &signature, &pubkey).is_ok()
    }
}

/// Real hashes, every signature accepted.
///
/// Only meant for exercising script logic without keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignatureCheck;

impl CryptoCapability for NoSignatureCheck {
    fn hash(&self, algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        hash_with_bitcoin_hashes(algorithm, data)
    }

    fn verify_signature(&self, _pubkey: &[u8], _signature: &[u8], _message: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    #[test]
    fn test_hash_algorithms() {
        let crypto = Secp256k1Crypto::new();
        assert_eq!(
            hex::encode(crypto.hash(HashAlgorithm::Sha256, b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex::encode(crypto.hash(HashAlgorithm::Sha1, b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            hex::encode(crypto.hash(HashAlgorithm::Ripemd160, b"")),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
        assert_eq!(
            hex::encode(crypto.hash(HashAlgorithm::Hash160, b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
        assert_eq!(
            hex::encode(crypto.hash(HashAlgorithm::Hash256, b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_verify_signature() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        let digest = [0x42; 32];
        let sig = secp.sign_ecdsa(&Message::from_digest(digest), &secret);
        let der = sig.serialize_der();

        let crypto = Secp256k1Crypto::new();
        assert!(crypto.verify_signature(&pubkey.serialize(), &der, &digest));
        assert!(crypto.verify_signature(&pubkey.serialize_uncompressed(), &der, &digest));
        assert!(!crypto.verify_signature(&pubkey.serialize(), &der, &[0x43; 32]));
        assert!(!crypto.verify_signature(&pubkey.serialize(), &der[1..], &digest));
        assert!(!crypto.verify_signature(&[0x05; 33], &der, &digest));
        assert!(!crypto.verify_signature(&pubkey.serialize(), &der, &digest[..31]));
        assert!(NoSignatureCheck.verify_signature(&[], &[], &[]));
    }
}
