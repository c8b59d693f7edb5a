//! NSEC and NSEC3 chain construction and repair
//!
//! The denial chain is derived state: the desired chain is a pure
//! function of the record store, and both initial construction and
//! per-mutation repair work the same way. The planner computes the
//! desired chain, diffs it against the stored one, and returns only the
//! records that must change. The caller (the zone facade) holds the DNSSEC update lock,
//! signs the changed records and journals the delta, so intermediate
//! chain states are never observable and an untouched neighbourhood
//! never churns the journal.
//!
//! NSEC3 follows RFC 5155: SHA-1 only, iterations capped at 50, salt
//! capped at 32 octets, one record per authoritative owner and per empty
//! non-terminal, chained in the ordinal order of the hashed owner names.

use sha1::{Digest, Sha1};

use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::names;
use crate::dns::protocol::{DnsRecord, QueryType, TransientTtl};
use crate::dns::store::RecordStore;

/// NSEC3 hash algorithm number for SHA-1, the only one defined
pub const NSEC3_HASH_SHA1: u8 = 1;

/// Upper bound on NSEC3 iterations
pub const MAX_NSEC3_ITERATIONS: u16 = 50;

/// Upper bound on the NSEC3 salt length in octets
pub const MAX_NSEC3_SALT_LENGTH: usize = 32;

/// NSEC3 hashing parameters, as carried by the apex NSEC3PARAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3Params {
    pub iterations: u16,
    pub salt: Vec<u8>,
}

impl Nsec3Params {
    pub fn new(iterations: u16, salt: Vec<u8>) -> ZoneResult<Nsec3Params> {
        if iterations > MAX_NSEC3_ITERATIONS {
            return Err(ZoneError::OutOfRange {
                parameter: "iterations",
                detail: format!("{} exceeds the maximum of {}", iterations, MAX_NSEC3_ITERATIONS),
            });
        }
        if salt.len() > MAX_NSEC3_SALT_LENGTH {
            return Err(ZoneError::OutOfRange {
                parameter: "salt",
                detail: format!(
                    "{} octets exceeds the maximum of {}",
                    salt.len(),
                    MAX_NSEC3_SALT_LENGTH
                ),
            });
        }
        Ok(Nsec3Params { iterations, salt })
    }

    /// Read the parameters back from the apex NSEC3PARAM record.
    pub fn from_record(record: &DnsRecord) -> Option<Nsec3Params> {
        match record {
            DnsRecord::Nsec3Param {
                iterations, salt, ..
            } => Some(Nsec3Params {
                iterations: *iterations,
                salt: salt.clone(),
            }),
            _ => None,
        }
    }

    /// The apex NSEC3PARAM record for these parameters.
    pub fn to_record(&self, apex: &str, ttl: u32) -> DnsRecord {
        DnsRecord::Nsec3Param {
            domain: apex.to_string(),
            hash_algorithm: NSEC3_HASH_SHA1,
            flags: 0,
            iterations: self.iterations,
            salt: self.salt.clone(),
            ttl: TransientTtl(ttl),
        }
    }
}

/// Generate a random salt from the process-wide RNG.
pub fn random_salt(length: usize) -> Vec<u8> {
    (0..length).map(|_| rand::random::<u8>()).collect()
}

/// The iterated NSEC3 hash of an owner name (RFC 5155 section 5).
pub fn nsec3_hash(name: &str, salt: &[u8], iterations: u16) -> Vec<u8> {
    let mut input = names::to_wire(&names::normalize(name));
    for _ in 0..=iterations {
        input.extend_from_slice(salt);
        let mut hasher = Sha1::new();
        hasher.update(&input);
        input = hasher.finalize().to_vec();
    }
    input
}

/// Base32hex (RFC 4648 extended hex alphabet) without padding, in
/// lowercase as owner names are stored. The encoding preserves byte
/// order, which is what lets the chain sort hashed owners as strings.
pub fn base32hex_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    for &byte in data {
        bits = (bits << 8) | byte as u32;
        bit_count += 8;
        while bit_count >= 5 {
            bit_count -= 5;
            out.push(ALPHABET[((bits >> bit_count) & 0x1F) as usize] as char);
        }
    }
    if bit_count > 0 {
        out.push(ALPHABET[((bits << (5 - bit_count)) & 0x1F) as usize] as char);
    }
    out
}

/// The hashed owner name for `name`: base32hex of the NSEC3 hash,
/// prepended to the apex.
pub fn nsec3_owner(name: &str, apex: &str, params: &Nsec3Params) -> String {
    let hash = nsec3_hash(name, &params.salt, params.iterations);
    format!("{}.{}", base32hex_encode(&hash), apex)
}

/// A planned change to the denial chain: records to (re)write and
/// owners whose denial record must go. Records in `set` are unsigned;
/// the caller signs them before publication.
#[derive(Debug, Default)]
pub struct DenialDelta {
    pub set: Vec<DnsRecord>,
    pub remove: Vec<String>,
}

impl DenialDelta {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Type numbers that never count as owner content: the denial records
/// themselves and their signatures.
fn content_types(store: &RecordStore, owner: &str) -> Vec<u16> {
    store
        .types_at(owner)
        .into_iter()
        .filter(|t| {
            !matches!(
                QueryType::from_num(*t),
                QueryType::Rrsig | QueryType::Nsec | QueryType::Nsec3
            )
        })
        .collect()
}

/// Whether the owner is authoritative in this zone: at or below the
/// apex and not covered by a delegation between it and the apex.
fn is_authoritative(store: &RecordStore, apex: &str, owner: &str) -> bool {
    if !names::is_in_zone(owner, apex) {
        return false;
    }
    for ancestor in names::names_toward_apex(owner, apex).into_iter().skip(1) {
        if store.get(&ancestor, QueryType::Ns).is_some() {
            return false;
        }
    }
    true
}

/// The non-empty authoritative owners of the zone, in canonical order.
fn authoritative_owners(store: &RecordStore, apex: &str) -> Vec<String> {
    store
        .owners()
        .into_iter()
        .filter(|owner| !content_types(store, owner).is_empty())
        .filter(|owner| is_authoritative(store, apex, owner))
        .collect()
}

/// The type bitmap for an owner's NSEC record: present content types
/// plus RRSIG and NSEC themselves.
fn nsec_bitmap(store: &RecordStore, owner: &str) -> Vec<u16> {
    let mut types = content_types(store, owner);
    types.push(QueryType::Rrsig.to_num());
    types.push(QueryType::Nsec.to_num());
    types.sort_unstable();
    types.dedup();
    types
}

/// The type bitmap for an owner's NSEC3 record. The denial record lives
/// at the hashed name, so an unsigned delegation contributes no RRSIG
/// bit; everything else in a signed zone does.
fn nsec3_bitmap(store: &RecordStore, apex: &str, owner: &str) -> Vec<u16> {
    let mut types = content_types(store, owner);
    let is_delegation = owner != apex && types.contains(&QueryType::Ns.to_num());
    if !is_delegation || types.contains(&QueryType::Ds.to_num()) {
        types.push(QueryType::Rrsig.to_num());
    }
    types.sort_unstable();
    types.dedup();
    types
}

/// Compute the changes needed to make the stored NSEC chain match the
/// zone contents. Covers initial construction (no NSEC stored yet),
/// per-mutation repair and teardown alike.
pub fn plan_nsec_chain(store: &RecordStore, apex: &str, minimum_ttl: u32) -> DenialDelta {
    let apex = names::normalize(apex);
    let owners = authoritative_owners(store, &apex);

    let mut delta = DenialDelta::default();
    if owners.is_empty() {
        return delta;
    }

    for (idx, owner) in owners.iter().enumerate() {
        let next = &owners[(idx + 1) % owners.len()];
        let desired = DnsRecord::Nsec {
            domain: owner.clone(),
            next_domain: next.clone(),
            types: nsec_bitmap(store, owner),
            ttl: TransientTtl(minimum_ttl),
        };
        let current = store.get(owner, QueryType::Nsec);
        let matches = current
            .as_ref()
            .and_then(|slot| slot.first().cloned())
            .map(|r| r.data == desired && r.data.get_ttl() == minimum_ttl)
            .unwrap_or(false);
        if !matches {
            delta.set.push(desired);
        }
    }

    // NSEC records at owners that no longer warrant one
    for (key, _) in store.entries() {
        if key.rtype == QueryType::Nsec && !owners.contains(&key.owner) {
            delta.remove.push(key.owner);
        }
    }
    delta
}

/// Compute the changes needed to make the stored NSEC3 chain match the
/// zone contents under the given parameters.
pub fn plan_nsec3_chain(
    store: &RecordStore,
    apex: &str,
    params: &Nsec3Params,
    minimum_ttl: u32,
) -> DenialDelta {
    let apex = names::normalize(apex);
    let owners = authoritative_owners(store, &apex);

    let mut delta = DenialDelta::default();
    if owners.is_empty() {
        return delta;
    }

    // every authoritative owner plus the empty non-terminals between it
    // and the apex contributes a partial NSEC3
    let mut partials: Vec<(Vec<u8>, String, Vec<u16>)> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let push_name = |name: &str, types: Vec<u16>, partials: &mut Vec<(Vec<u8>, String, Vec<u16>)>| {
        let hash = nsec3_hash(name, &params.salt, params.iterations);
        let hashed_owner = format!("{}.{}", base32hex_encode(&hash), apex);
        if let Some(existing) = partials.iter_mut().find(|(_, o, _)| *o == hashed_owner) {
            // hash collision: union the bitmaps
            existing.2.extend(types);
            existing.2.sort_unstable();
            existing.2.dedup();
        } else {
            partials.push((hash, hashed_owner, types));
        }
    };

    for owner in &owners {
        push_name(owner, nsec3_bitmap(store, &apex, owner), &mut partials);
        seen.push(owner.clone());
        for ent in names::names_toward_apex(owner, &apex).into_iter().skip(1) {
            if seen.contains(&ent) || owners.contains(&ent) {
                continue;
            }
            seen.push(ent.clone());
            // empty non-terminal: no types at all
            push_name(&ent, Vec::new(), &mut partials);
        }
    }

    // chain in ordinal order of the hashed owner strings
    partials.sort_by(|a, b| a.1.cmp(&b.1));

    for idx in 0..partials.len() {
        let next_hash = partials[(idx + 1) % partials.len()].0.clone();
        let (_, ref hashed_owner, ref types) = partials[idx];
        let desired = DnsRecord::Nsec3 {
            domain: hashed_owner.clone(),
            hash_algorithm: NSEC3_HASH_SHA1,
            flags: 0,
            iterations: params.iterations,
            salt: params.salt.clone(),
            next_hashed: next_hash,
            types: types.clone(),
            ttl: TransientTtl(minimum_ttl),
        };
        let current = store.get(hashed_owner, QueryType::Nsec3);
        let matches = current
            .as_ref()
            .and_then(|slot| slot.first().cloned())
            .map(|r| r.data == desired && r.data.get_ttl() == minimum_ttl)
            .unwrap_or(false);
        if !matches {
            delta.set.push(desired);
        }
    }

    let desired_owners: Vec<&String> = partials.iter().map(|(_, o, _)| o).collect();
    for (key, _) in store.entries() {
        if key.rtype == QueryType::Nsec3 && !desired_owners.iter().any(|o| **o == key.owner) {
            delta.remove.push(key.owner);
        }
    }
    delta
}
