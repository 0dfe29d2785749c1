//! Chainkd: ed25519 hierarchical keys
//!
//! An extended private key is a 32-byte little-endian scalar followed by a
//! 32-byte chain code. Children are derived with HMAC-SHA512 keyed by the
//! chain code; non-hardened children add a pruned offset to the parent scalar
//! so they can be derived from the public side as well.

use bitcoin::hashes::{sha512, Hash, HashEngine, Hmac, HmacEngine};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::VerifyingKey;
use sha2::Sha512;
use std::fmt;

use crate::error::{Result, SwapError};

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let mut engine: HmacEngine<sha512::Hash> = HmacEngine::new(key);
    for part in parts {
        engine.input(part);
    }
    Hmac::<sha512::Hash>::from_engine(engine).to_byte_array()
}

fn prune_root_scalar(scalar: &mut [u8]) {
    scalar[0] &= 248;
    scalar[31] &= 31;
    scalar[31] |= 64;
}

fn prune_intermediate_scalar(scalar: &mut [u8]) {
    scalar[0] &= 248;
    scalar[29] &= 1;
    scalar[30] = 0;
    scalar[31] = 0;
}

fn public_key_of(scalar: &[u8; 32]) -> [u8; 32] {
    let scalar = Scalar::from_bytes_mod_order(*scalar);
    EdwardsPoint::mul_base(&scalar).compress().to_bytes()
}

/// Extended private key
#[derive(Clone, PartialEq, Eq)]
pub struct XPrv([u8; 64]);

/// Extended public key: public key followed by chain code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XPub([u8; 64]);

impl XPrv {
    /// Root key of a seed
    pub fn root(seed: &[u8]) -> Self {
        let mut xprv = hmac_sha512(b"Root", &[seed]);
        prune_root_scalar(&mut xprv[..32]);
        Self(xprv)
    }

    pub fn from_hex(xprivate_key: &str) -> Result<Self> {
        let bytes = hex::decode(xprivate_key)
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok())
            .ok_or_else(|| SwapError::Value("xprivate key must be 64 bytes hex".to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn scalar(&self) -> [u8; 32] {
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&self.0[..32]);
        scalar
    }

    pub fn xpub(&self) -> XPub {
        let mut xpub = [0u8; 64];
        xpub[..32].copy_from_slice(&public_key_of(&self.scalar()));
        xpub[32..].copy_from_slice(&self.0[32..]);
        XPub(xpub)
    }

    pub fn public_key(&self) -> [u8; 32] {
        public_key_of(&self.scalar())
    }

    /// Non-hardened child at `selector`
    pub fn child(&self, selector: &[u8]) -> Self {
        let xpub = self.xpub();
        let mut res = hmac_sha512(&xpub.0[32..], &[b"N", &xpub.0[..32], selector]);
        prune_intermediate_scalar(&mut res[..32]);

        // 256-bit little-endian addition, final carry dropped
        let mut carry = 0u16;
        for i in 0..32 {
            let sum = u16::from(self.0[i]) + u16::from(res[i]) + carry;
            res[i] = (sum & 0xff) as u8;
            carry = sum >> 8;
        }
        Self(res)
    }

    /// Derives along non-hardened little-endian `u32` indexes.
    pub fn derive(&self, indexes: &[u32]) -> Self {
        indexes
            .iter()
            .fold(self.clone(), |xprv, index| xprv.child(&index.to_le_bytes()))
    }

    fn expanded(&self) -> ExpandedSecretKey {
        let expanded = hmac_sha512(b"Expand", &[&self.0]);
        let mut hash_prefix = [0u8; 32];
        hash_prefix.copy_from_slice(&expanded[32..]);
        ExpandedSecretKey {
            scalar: Scalar::from_bytes_mod_order(self.scalar()),
            hash_prefix,
        }
    }

    /// ed25519 signature of `message` with the expanded key
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        let verifying_key = VerifyingKey::from_bytes(&self.public_key())
            .map_err(|e| SwapError::Value(format!("invalid public key: {}", e)))?;
        let signature = raw_sign::<Sha512>(&self.expanded(), message, &verifying_key);
        Ok(signature.to_bytes())
    }
}

impl fmt::Debug for XPrv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XPrv(<redacted>)")
    }
}

impl XPub {
    pub fn public_key(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.0[..32]);
        key
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Parses `m/44/153/1/0/1`; chainkd paths are non-hardened only.
pub fn parse_path(path: &str) -> Result<Vec<u32>> {
    let invalid = || SwapError::Value(format!("invalid derivation path '{}'", path));
    let mut parts = path.split('/');
    if parts.next() != Some("m") {
        return Err(invalid());
    }
    parts
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>().map_err(|_| invalid()))
        .collect()
}

/// Path of blockcenter derivation indexes (little-endian `u32` hex each)
pub fn path_from_indexes(indexes: &[String]) -> Result<(String, Vec<u32>)> {
    let values = indexes
        .iter()
        .map(|index| {
            hex::decode(index)
                .ok()
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(u32::from_le_bytes)
                .ok_or_else(|| SwapError::Value(format!("invalid derivation index '{}'", index)))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut path = "m".to_string();
    for value in &values {
        path.push('/');
        path.push_str(&value.to_string());
    }
    Ok((path, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    const ROOT_XPRV: &str = "58775359b7b3588dcdc1bcf373489fa1272cacc03909f78469657b0208e66e46daedfdd0fd8f8df14e2084c7e8df4701db3062dded1c713e0aae734ac09c4afd";

    #[test]
    fn test_derive_sender_key() {
        let root = XPrv::from_hex(ROOT_XPRV).unwrap();
        let derived = root.derive(&[44, 153, 1, 0, 1]);
        assert_eq!(
            hex::encode(derived.public_key()),
            "fe6b3fd4458291b19605d92837ae1060cc0237e68022b2eb9faf01a118226212"
        );
        assert_eq!(
            derived.to_hex(),
            "b0f9552e4fedac7f2e750ae984e36a97cf2b24609f7ec43f35606ed65eec6e46db35f71c405fd5948ecffa2c512adafb35cc621f99a60ecb6ec8aef815a8c6e5"
        );
    }

    #[test]
    fn test_root_xpub() {
        let root = XPrv::from_hex(ROOT_XPRV).unwrap();
        assert_eq!(
            root.xpub().to_hex(),
            "f80a401807fde1ee5727ae032ee144e4b757e69431e68e6cd732eda3c8cd3936daedfdd0fd8f8df14e2084c7e8df4701db3062dded1c713e0aae734ac09c4afd"
        );
    }

    #[test]
    fn test_signature_verifies() {
        let key = XPrv::from_hex(ROOT_XPRV).unwrap().derive(&[44, 153, 1, 0, 1]);
        let message = [7u8; 32];
        let signature = Signature::from_bytes(&key.sign(&message).unwrap());
        let verifying_key = VerifyingKey::from_bytes(&key.public_key()).unwrap();
        assert!(verifying_key.verify(&message, &signature).is_ok());
    }

    #[test]
    fn test_paths() {
        assert_eq!(parse_path("m/44/153/1/0/1").unwrap(), vec![44, 153, 1, 0, 1]);
        assert!(parse_path("m/44'/153").is_err());
        assert!(parse_path("44/153").is_err());

        let indexes: Vec<String> = ["2c000000", "99000000", "01000000", "00000000", "01000000"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (path, values) = path_from_indexes(&indexes).unwrap();
        assert_eq!(path, "m/44/153/1/0/1");
        assert_eq!(values, vec![44, 153, 1, 0, 1]);
    }
}
