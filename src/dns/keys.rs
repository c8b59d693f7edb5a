//! DNSSEC private keys and the per-zone key store
//!
//! # Features
//!
//! * Key generation for ECDSA P-256/P-384, RSA and Ed25519
//! * RFC 4034 key tag computation over the DNSKEY RDATA
//! * DS digest production for parent-side comparison
//! * A key store keyed by tag with collision-checked insertion

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};
use serde_derive::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384};

use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::names;
use crate::dns::protocol::{DnsRecord, TransientTtl};

/// DNSSEC protocol field, always 3
pub const DNSKEY_PROTOCOL: u8 = 3;

/// Zone Key flag bit
pub const FLAG_ZONE_KEY: u16 = 0x0100;
/// Secure Entry Point flag bit
pub const FLAG_SEP: u16 = 0x0001;
/// RFC 5011 revocation flag bit
pub const FLAG_REVOKE: u16 = 0x0080;

/// Attempts made to generate a key before giving up on tag collisions
pub const KEY_TAG_COLLISION_RETRIES: u32 = 5;

/// DNSSEC signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnssecAlgorithm {
    /// RSA/SHA-256 (Algorithm 8)
    RsaSha256,
    /// RSA/SHA-512 (Algorithm 10)
    RsaSha512,
    /// ECDSA P-256 with SHA-256 (Algorithm 13)
    EcdsaP256Sha256,
    /// ECDSA P-384 with SHA-384 (Algorithm 14)
    EcdsaP384Sha384,
    /// ED25519 (Algorithm 15)
    Ed25519,
}

impl DnssecAlgorithm {
    pub fn to_num(&self) -> u8 {
        match self {
            DnssecAlgorithm::RsaSha256 => 8,
            DnssecAlgorithm::RsaSha512 => 10,
            DnssecAlgorithm::EcdsaP256Sha256 => 13,
            DnssecAlgorithm::EcdsaP384Sha384 => 14,
            DnssecAlgorithm::Ed25519 => 15,
        }
    }

    pub fn from_num(num: u8) -> ZoneResult<DnssecAlgorithm> {
        match num {
            8 => Ok(DnssecAlgorithm::RsaSha256),
            10 => Ok(DnssecAlgorithm::RsaSha512),
            13 => Ok(DnssecAlgorithm::EcdsaP256Sha256),
            14 => Ok(DnssecAlgorithm::EcdsaP384Sha384),
            15 => Ok(DnssecAlgorithm::Ed25519),
            other => Err(ZoneError::UnsupportedAlgorithm(format!(
                "algorithm number {}",
                other
            ))),
        }
    }
}

/// DS digest types used for parent-side comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestType {
    /// SHA-256 (Digest Type 2)
    Sha256,
    /// SHA-384 (Digest Type 4)
    Sha384,
}

impl DigestType {
    pub fn to_num(&self) -> u8 {
        match self {
            DigestType::Sha256 => 2,
            DigestType::Sha384 => 4,
        }
    }
}

/// DNSSEC key purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// Zone Signing Key
    Zsk,
    /// Key Signing Key
    Ksk,
}

impl KeyType {
    pub fn flags(&self) -> u16 {
        match self {
            KeyType::Zsk => FLAG_ZONE_KEY,
            KeyType::Ksk => FLAG_ZONE_KEY | FLAG_SEP,
        }
    }
}

/// Lifecycle state of a key. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    Generated,
    Published,
    Ready,
    Active,
    Retired,
    Revoked,
    Dead,
}

impl KeyState {
    /// Position in the lifecycle; used to refuse backwards transitions.
    pub fn rank(&self) -> u8 {
        match self {
            KeyState::Generated => 0,
            KeyState::Published => 1,
            KeyState::Ready => 2,
            KeyState::Active => 3,
            KeyState::Retired => 4,
            KeyState::Revoked => 5,
            KeyState::Dead => 6,
        }
    }
}

/// A private signing key together with its lifecycle bookkeeping.
#[derive(Clone)]
pub struct DnssecPrivateKey {
    /// RFC 4034 key tag computed over the DNSKEY RDATA
    pub key_tag: u16,
    pub key_type: KeyType,
    pub algorithm: DnssecAlgorithm,
    /// RSA modulus size in bits; zero for fixed-size curve algorithms
    pub key_size: u32,
    /// The DNSKEY public key field
    pub public_key: Vec<u8>,
    private_key: PKey<Private>,
    pub state: KeyState,
    pub state_changed_on: DateTime<Utc>,
    /// Automatic rollover age in days; zero disables rollover
    pub rollover_days: u16,
    /// Set on a predecessor key once its rollover successor exists
    pub is_retiring: bool,
}

impl DnssecPrivateKey {
    /// Generate a fresh key pair. The caller decides publication; a new
    /// key starts in `Generated`.
    pub fn generate(
        key_type: KeyType,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        rollover_days: u16,
        now: DateTime<Utc>,
    ) -> ZoneResult<DnssecPrivateKey> {
        let (private_key, key_size) = match algorithm {
            DnssecAlgorithm::EcdsaP256Sha256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
                let ec_key = EcKey::generate(&group)?;
                (PKey::from_ec_key(ec_key)?, 0)
            }
            DnssecAlgorithm::EcdsaP384Sha384 => {
                let group = EcGroup::from_curve_name(Nid::SECP384R1)?;
                let ec_key = EcKey::generate(&group)?;
                (PKey::from_ec_key(ec_key)?, 0)
            }
            DnssecAlgorithm::RsaSha256 | DnssecAlgorithm::RsaSha512 => {
                let bits = if key_size == 0 { 2048 } else { key_size };
                let rsa = Rsa::generate(bits)?;
                (PKey::from_rsa(rsa)?, bits)
            }
            DnssecAlgorithm::Ed25519 => (PKey::generate_ed25519()?, 0),
        };

        let public_key = extract_public_key(&private_key, algorithm)?;
        let key_tag = calculate_key_tag(key_type.flags(), algorithm.to_num(), &public_key);

        Ok(DnssecPrivateKey {
            key_tag,
            key_type,
            algorithm,
            key_size,
            public_key,
            private_key,
            state: KeyState::Generated,
            state_changed_on: now,
            rollover_days,
            is_retiring: false,
        })
    }

    /// Rebuild a key from persisted material.
    pub fn from_parts(
        key_type: KeyType,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        public_key: Vec<u8>,
        private_der: &[u8],
        state: KeyState,
        state_changed_on: DateTime<Utc>,
        rollover_days: u16,
        is_retiring: bool,
    ) -> ZoneResult<DnssecPrivateKey> {
        let private_key = PKey::private_key_from_pkcs8(private_der)?;
        let key_tag = calculate_key_tag(key_type.flags(), algorithm.to_num(), &public_key);
        Ok(DnssecPrivateKey {
            key_tag,
            key_type,
            algorithm,
            key_size,
            public_key,
            private_key,
            state,
            state_changed_on,
            rollover_days,
            is_retiring,
        })
    }

    /// The private key material in PKCS#8 DER form, for persistence.
    pub fn private_key_der(&self) -> ZoneResult<Vec<u8>> {
        Ok(self.private_key.private_key_to_pkcs8()?)
    }

    /// The DNSKEY flags as currently served: the revoke bit is raised
    /// while the key is in `Revoked`.
    pub fn served_flags(&self) -> u16 {
        let mut flags = self.key_type.flags();
        if self.state == KeyState::Revoked {
            flags |= FLAG_REVOKE;
        }
        flags
    }

    /// The DNSKEY record for this key.
    pub fn dnskey_record(&self, domain: &str, ttl: u32) -> DnsRecord {
        DnsRecord::Dnskey {
            domain: domain.to_string(),
            flags: self.served_flags(),
            protocol: DNSKEY_PROTOCOL,
            algorithm: self.algorithm.to_num(),
            public_key: self.public_key.clone(),
            ttl: TransientTtl(ttl),
        }
    }

    /// The DS digest over (owner wire form || DNSKEY RDATA), as the
    /// parent publishes it.
    pub fn ds_digest(&self, apex: &str, digest_type: DigestType) -> Vec<u8> {
        let mut data = names::to_wire(&names::normalize(apex));
        data.extend_from_slice(&(self.key_type.flags()).to_be_bytes());
        data.push(DNSKEY_PROTOCOL);
        data.push(self.algorithm.to_num());
        data.extend_from_slice(&self.public_key);

        match digest_type {
            DigestType::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(&data);
                hasher.finalize().to_vec()
            }
            DigestType::Sha384 => {
                let mut hasher = Sha384::new();
                hasher.update(&data);
                hasher.finalize().to_vec()
            }
        }
    }

    /// Advance the lifecycle state. Backwards transitions are refused.
    pub fn set_state(&mut self, state: KeyState, now: DateTime<Utc>) -> ZoneResult<()> {
        if state.rank() < self.state.rank() {
            return Err(ZoneError::InvalidInput(format!(
                "key {} cannot move backwards from {:?} to {:?}",
                self.key_tag, self.state, state
            )));
        }
        if state != self.state {
            self.state = state;
            self.state_changed_on = now;
        }
        Ok(())
    }

    /// Sign raw data, producing the fixed-width signature format DNSSEC
    /// records carry.
    pub fn sign(&self, data: &[u8]) -> ZoneResult<Vec<u8>> {
        match self.algorithm {
            DnssecAlgorithm::RsaSha256 => {
                let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)?;
                signer.update(data)?;
                Ok(signer.sign_to_vec()?)
            }
            DnssecAlgorithm::RsaSha512 => {
                let mut signer = Signer::new(MessageDigest::sha512(), &self.private_key)?;
                signer.update(data)?;
                Ok(signer.sign_to_vec()?)
            }
            DnssecAlgorithm::EcdsaP256Sha256 => {
                let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)?;
                signer.update(data)?;
                ecdsa_der_to_fixed(&signer.sign_to_vec()?, 32)
            }
            DnssecAlgorithm::EcdsaP384Sha384 => {
                let mut signer = Signer::new(MessageDigest::sha384(), &self.private_key)?;
                signer.update(data)?;
                ecdsa_der_to_fixed(&signer.sign_to_vec()?, 48)
            }
            DnssecAlgorithm::Ed25519 => {
                let mut signer = Signer::new_without_digest(&self.private_key)?;
                Ok(signer.sign_oneshot_to_vec(data)?)
            }
        }
    }

    /// Verify a signature produced by `sign`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> ZoneResult<bool> {
        match self.algorithm {
            DnssecAlgorithm::RsaSha256 | DnssecAlgorithm::RsaSha512 => {
                let digest = if self.algorithm == DnssecAlgorithm::RsaSha256 {
                    MessageDigest::sha256()
                } else {
                    MessageDigest::sha512()
                };
                let mut verifier = Verifier::new(digest, &self.private_key)?;
                verifier.update(data)?;
                Ok(verifier.verify(signature)?)
            }
            DnssecAlgorithm::EcdsaP256Sha256 | DnssecAlgorithm::EcdsaP384Sha384 => {
                let (digest, coord) = if self.algorithm == DnssecAlgorithm::EcdsaP256Sha256 {
                    (MessageDigest::sha256(), 32)
                } else {
                    (MessageDigest::sha384(), 48)
                };
                let der = ecdsa_fixed_to_der(signature, coord)?;
                let mut verifier = Verifier::new(digest, &self.private_key)?;
                verifier.update(data)?;
                Ok(verifier.verify(&der)?)
            }
            DnssecAlgorithm::Ed25519 => {
                let mut verifier = Verifier::new_without_digest(&self.private_key)?;
                Ok(verifier.verify_oneshot(signature, data)?)
            }
        }
    }
}

impl std::fmt::Debug for DnssecPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnssecPrivateKey")
            .field("key_tag", &self.key_tag)
            .field("key_type", &self.key_type)
            .field("algorithm", &self.algorithm)
            .field("state", &self.state)
            .field("state_changed_on", &self.state_changed_on)
            .field("rollover_days", &self.rollover_days)
            .field("is_retiring", &self.is_retiring)
            .finish()
    }
}

/// Extract the DNSKEY public key field from an openssl key.
fn extract_public_key(
    pkey: &PKey<Private>,
    algorithm: DnssecAlgorithm,
) -> ZoneResult<Vec<u8>> {
    match algorithm {
        DnssecAlgorithm::EcdsaP256Sha256 | DnssecAlgorithm::EcdsaP384Sha384 => {
            let ec = pkey.ec_key()?;
            let mut ctx = BigNumContext::new()?;
            let bytes =
                ec.public_key()
                    .to_bytes(ec.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)?;
            // strip the uncompressed-point marker, leaving X || Y
            Ok(bytes[1..].to_vec())
        }
        DnssecAlgorithm::RsaSha256 | DnssecAlgorithm::RsaSha512 => {
            let rsa = pkey.rsa()?;
            let e = rsa.e().to_vec();
            let n = rsa.n().to_vec();
            let mut out = Vec::with_capacity(e.len() + n.len() + 3);
            if e.len() < 256 {
                out.push(e.len() as u8);
            } else {
                out.push(0);
                out.extend_from_slice(&(e.len() as u16).to_be_bytes());
            }
            out.extend_from_slice(&e);
            out.extend_from_slice(&n);
            Ok(out)
        }
        DnssecAlgorithm::Ed25519 => Ok(pkey.raw_public_key()?),
    }
}

/// RFC 4034 Appendix B key tag over the DNSKEY RDATA.
pub fn calculate_key_tag(flags: u16, algorithm: u8, public_key: &[u8]) -> u16 {
    let mut rdata = Vec::with_capacity(public_key.len() + 4);
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(DNSKEY_PROTOCOL);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);

    let mut sum: u32 = 0;
    for (i, &byte) in rdata.iter().enumerate() {
        if i % 2 == 0 {
            sum += (byte as u32) << 8;
        } else {
            sum += byte as u32;
        }
    }
    sum += (sum >> 16) & 0xFFFF;
    (sum & 0xFFFF) as u16
}

/// Convert an openssl DER ECDSA signature to the fixed-width r || s form.
fn ecdsa_der_to_fixed(der: &[u8], coord_size: usize) -> ZoneResult<Vec<u8>> {
    let sig = EcdsaSig::from_der(der)?;
    let mut out = vec![0u8; coord_size * 2];
    let r = sig.r().to_vec();
    let s = sig.s().to_vec();
    out[coord_size - r.len()..coord_size].copy_from_slice(&r);
    out[coord_size * 2 - s.len()..].copy_from_slice(&s);
    Ok(out)
}

/// Convert a fixed-width r || s signature back to DER for verification.
fn ecdsa_fixed_to_der(fixed: &[u8], coord_size: usize) -> ZoneResult<Vec<u8>> {
    if fixed.len() != coord_size * 2 {
        return Err(ZoneError::InvalidInput(format!(
            "ECDSA signature length {} does not match curve",
            fixed.len()
        )));
    }
    let r = BigNum::from_slice(&fixed[0..coord_size])?;
    let s = BigNum::from_slice(&fixed[coord_size..])?;
    let sig = EcdsaSig::from_private_components(r, s)?;
    Ok(sig.to_der()?)
}

/// The zone's key store: tag -> private key. Guarded by its own mutex,
/// held only for map inspection and mutation, never across I/O.
#[derive(Default)]
pub struct KeyStore {
    keys: parking_lot::Mutex<HashMap<u16, DnssecPrivateKey>>,
}

impl KeyStore {
    pub fn new() -> KeyStore {
        KeyStore {
            keys: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Insert a key, refusing tag collisions.
    pub fn insert(&self, key: DnssecPrivateKey) -> ZoneResult<()> {
        let mut keys = self.keys.lock();
        if keys.contains_key(&key.key_tag) {
            return Err(ZoneError::KeyTagCollision);
        }
        keys.insert(key.key_tag, key);
        Ok(())
    }

    /// Generate a key and insert it, retrying generation on tag
    /// collisions up to the retry budget.
    pub fn generate_and_insert(
        &self,
        key_type: KeyType,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        rollover_days: u16,
        now: DateTime<Utc>,
    ) -> ZoneResult<u16> {
        for _ in 0..KEY_TAG_COLLISION_RETRIES {
            let key = DnssecPrivateKey::generate(key_type, algorithm, key_size, rollover_days, now)?;
            let tag = key.key_tag;
            match self.insert(key) {
                Ok(()) => return Ok(tag),
                Err(ZoneError::KeyTagCollision) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ZoneError::KeyTagCollision)
    }

    pub fn get(&self, tag: u16) -> Option<DnssecPrivateKey> {
        self.keys.lock().get(&tag).cloned()
    }

    pub fn remove(&self, tag: u16) -> Option<DnssecPrivateKey> {
        self.keys.lock().remove(&tag)
    }

    /// A snapshot of every key.
    pub fn all(&self) -> Vec<DnssecPrivateKey> {
        self.keys.lock().values().cloned().collect()
    }

    pub fn tags(&self) -> Vec<u16> {
        let mut tags: Vec<u16> = self.keys.lock().keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    /// Mutate one key in place under the store lock.
    pub fn update<F>(&self, tag: u16, f: F) -> ZoneResult<()>
    where
        F: FnOnce(&mut DnssecPrivateKey) -> ZoneResult<()>,
    {
        let mut keys = self.keys.lock();
        match keys.get_mut(&tag) {
            Some(key) => f(key),
            None => Err(ZoneError::KeyNotFound(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.ymd(2024, 6, 1).and_hms(12, 0, 0)
    }

    #[test]
    fn test_generate_ecdsa_p256() {
        let key = DnssecPrivateKey::generate(
            KeyType::Zsk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            90,
            now(),
        )
        .unwrap();
        assert_eq!(key.key_type, KeyType::Zsk);
        assert_eq!(key.state, KeyState::Generated);
        assert_eq!(key.public_key.len(), 64);
        assert_eq!(
            key.key_tag,
            calculate_key_tag(FLAG_ZONE_KEY, 13, &key.public_key)
        );
    }

    #[test]
    fn test_sign_verify_round_trip() {
        for algorithm in &[
            DnssecAlgorithm::EcdsaP256Sha256,
            DnssecAlgorithm::Ed25519,
        ] {
            let key =
                DnssecPrivateKey::generate(KeyType::Zsk, *algorithm, 0, 0, now()).unwrap();
            let data = b"signed rrset data";
            let sig = key.sign(data).unwrap();
            assert!(key.verify(data, &sig).unwrap());
            assert!(!key.verify(b"different data", &sig).unwrap());
        }
    }

    #[test]
    fn test_ecdsa_signature_is_fixed_width() {
        let key = DnssecPrivateKey::generate(
            KeyType::Zsk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            0,
            now(),
        )
        .unwrap();
        let sig = key.sign(b"data").unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_key_tag_known_vector() {
        // Computed by hand over a fixed RDATA: flags 256, protocol 3,
        // algorithm 13, public key 0x01 0x02 0x03 0x04.
        // Pairs: (0x01,0x00)=0x0100, (0x03,0x0d)=0x030d,
        //        (0x01,0x02)=0x0102, (0x03,0x04)=0x0304  => 0x0813
        assert_eq!(calculate_key_tag(256, 13, &[1, 2, 3, 4]), 0x0813);
    }

    #[test]
    fn test_revoked_flags() {
        let mut key = DnssecPrivateKey::generate(
            KeyType::Ksk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            0,
            now(),
        )
        .unwrap();
        assert_eq!(key.served_flags(), 257);
        key.state = KeyState::Revoked;
        assert_eq!(key.served_flags(), 257 | FLAG_REVOKE);
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let mut key = DnssecPrivateKey::generate(
            KeyType::Zsk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            0,
            now(),
        )
        .unwrap();
        key.set_state(KeyState::Published, now()).unwrap();
        key.set_state(KeyState::Ready, now()).unwrap();
        assert!(key.set_state(KeyState::Published, now()).is_err());
        assert_eq!(key.state, KeyState::Ready);
    }

    #[test]
    fn test_store_rejects_tag_collision() {
        let store = KeyStore::new();
        let key = DnssecPrivateKey::generate(
            KeyType::Zsk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            0,
            now(),
        )
        .unwrap();
        let duplicate = key.clone();
        store.insert(key).unwrap();
        assert!(matches!(
            store.insert(duplicate),
            Err(ZoneError::KeyTagCollision)
        ));
    }

    #[test]
    fn test_persist_round_trip() {
        let key = DnssecPrivateKey::generate(
            KeyType::Ksk,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            30,
            now(),
        )
        .unwrap();
        let der = key.private_key_der().unwrap();
        let restored = DnssecPrivateKey::from_parts(
            key.key_type,
            key.algorithm,
            key.key_size,
            key.public_key.clone(),
            &der,
            key.state,
            key.state_changed_on,
            key.rollover_days,
            key.is_retiring,
        )
        .unwrap();
        assert_eq!(restored.key_tag, key.key_tag);

        let sig = restored.sign(b"data").unwrap();
        assert!(key.verify(b"data", &sig).unwrap());
    }
}
