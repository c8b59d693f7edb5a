//! RRSIG production for a primary zone
//!
//! Signatures follow RFC 4034: the signing input is the RRSIG RDATA
//! (with the signature field absent) followed by the covered RRset in
//! canonical form, sorted by RDATA. Key selection implements the zone's
//! signing policy:
//!
//! * the DNSKEY RRset is signed by every KSK in Published, Ready,
//!   Active or Revoked state;
//! * every other RRset is signed by every ZSK in Ready or Active state;
//! * referral NS RRsets below the apex are not signed at all.

use chrono::{DateTime, Utc};

use crate::dns::buffer::{PacketBuffer, VectorPacketBuffer};
use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::keys::{DnssecPrivateKey, KeyState, KeyType};
use crate::dns::names;
use crate::dns::protocol::{DnsRecord, QueryType, TransientTtl, ZoneRecord};

/// Offset subtracted from `now` for the inception field, absorbing
/// clock skew between the primary and validating resolvers.
pub const INCEPTION_OFFSET_SECS: i64 = 3600;

/// Extra signature lifetime beyond the SOA EXPIRE
pub const VALIDITY_MARGIN_SECS: u32 = 3 * 86_400;

/// The RRSIG validity period for a zone: SOA EXPIRE plus three days.
pub fn validity_period(soa_expire: u32) -> u32 {
    soa_expire.saturating_add(VALIDITY_MARGIN_SECS)
}

/// How often stale signatures are checked for, and the remaining-life
/// threshold below which a signature is refreshed.
pub fn refresh_interval(validity_secs: u32) -> u32 {
    validity_secs / 10
}

/// Whether a key signs the given record type in its current state.
pub fn key_signs_type(key: &DnssecPrivateKey, rtype: QueryType) -> bool {
    match rtype {
        QueryType::Dnskey => {
            key.key_type == KeyType::Ksk
                && matches!(
                    key.state,
                    KeyState::Published | KeyState::Ready | KeyState::Active | KeyState::Revoked
                )
        }
        _ => {
            key.key_type == KeyType::Zsk
                && matches!(key.state, KeyState::Ready | KeyState::Active)
        }
    }
}

/// Produce the RRSIGs covering one RRset, one per eligible key.
///
/// Referral NS RRsets below the apex yield no signatures. ANAME and APP
/// records cannot exist under DNSSEC and fail the operation outright.
pub fn sign_rrset(
    apex: &str,
    owner: &str,
    rtype: QueryType,
    records: &[ZoneRecord],
    keys: &[DnssecPrivateKey],
    validity_secs: u32,
    now: DateTime<Utc>,
) -> ZoneResult<Vec<ZoneRecord>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    if matches!(rtype, QueryType::Aname | QueryType::App) {
        return Err(ZoneError::UnsupportedInSignedZone(format!(
            "{} records cannot be signed",
            rtype
        )));
    }

    let owner = names::normalize(owner);
    let apex = names::normalize(apex);

    // a delegation's NS set belongs to the child zone
    if rtype == QueryType::Ns && owner != apex {
        return Ok(Vec::new());
    }

    let eligible: Vec<&DnssecPrivateKey> =
        keys.iter().filter(|k| key_signs_type(k, rtype)).collect();
    if eligible.is_empty() {
        return Err(ZoneError::NoSigningKey(format!(
            "no eligible key for {} {}",
            owner, rtype
        )));
    }

    let original_ttl = records[0].data.get_ttl();
    let inception = (now.timestamp() - INCEPTION_OFFSET_SECS) as u32;
    let expiration = inception.wrapping_add(validity_secs);
    let labels = names::label_count(&owner);

    // canonical RRset order: sort by RDATA bytes
    let mut ordered: Vec<&ZoneRecord> = records.iter().collect();
    let mut rdata_cache: Vec<(Vec<u8>, &ZoneRecord)> = Vec::with_capacity(ordered.len());
    for record in ordered.drain(..) {
        rdata_cache.push((record.data.rdata_bytes()?, record));
    }
    rdata_cache.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sigs = Vec::with_capacity(eligible.len());
    for key in eligible {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_u16(rtype.to_num())?;
        buffer.write_u8(key.algorithm.to_num())?;
        buffer.write_u8(labels)?;
        buffer.write_u32(original_ttl)?;
        buffer.write_u32(expiration)?;
        buffer.write_u32(inception)?;
        buffer.write_u16(key.key_tag)?;
        buffer.write_qname(&apex)?;
        for (_, record) in &rdata_cache {
            record.data.write_canonical(&mut buffer, original_ttl)?;
        }

        let signature = key.sign(buffer.as_slice())?;
        sigs.push(ZoneRecord::new(DnsRecord::Rrsig {
            domain: owner.clone(),
            type_covered: rtype.to_num(),
            algorithm: key.algorithm.to_num(),
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag: key.key_tag,
            signer_name: apex.clone(),
            signature,
            ttl: TransientTtl(original_ttl),
        }));
    }
    Ok(sigs)
}

/// Verify one RRSIG against its RRset with the producing key. Used by
/// tests and diagnostic tooling; the serving path never verifies.
pub fn verify_rrsig(
    rrsig: &DnsRecord,
    records: &[ZoneRecord],
    key: &DnssecPrivateKey,
) -> ZoneResult<bool> {
    let (type_covered, algorithm, labels, original_ttl, expiration, inception, key_tag, signer_name, signature) =
        match rrsig {
            DnsRecord::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
                ..
            } => (
                *type_covered,
                *algorithm,
                *labels,
                *original_ttl,
                *expiration,
                *inception,
                *key_tag,
                signer_name.clone(),
                signature.clone(),
            ),
            _ => {
                return Err(ZoneError::InvalidInput(
                    "verify_rrsig requires an RRSIG record".to_string(),
                ))
            }
        };

    if key_tag != key.key_tag || algorithm != key.algorithm.to_num() {
        return Ok(false);
    }

    let mut rdata_cache: Vec<Vec<u8>> = Vec::with_capacity(records.len());
    for record in records {
        rdata_cache.push(record.data.rdata_bytes()?);
    }
    let mut indexed: Vec<(usize, &Vec<u8>)> = rdata_cache.iter().enumerate().collect();
    indexed.sort_by(|a, b| a.1.cmp(b.1));

    let mut buffer = VectorPacketBuffer::new();
    buffer.write_u16(type_covered)?;
    buffer.write_u8(algorithm)?;
    buffer.write_u8(labels)?;
    buffer.write_u32(original_ttl)?;
    buffer.write_u32(expiration)?;
    buffer.write_u32(inception)?;
    buffer.write_u16(key_tag)?;
    buffer.write_qname(&signer_name)?;
    for (idx, _) in indexed {
        records[idx].data.write_canonical(&mut buffer, original_ttl)?;
    }

    key.verify(buffer.as_slice(), &signature)
}

/// Whether a signature's remaining life is below the refresh threshold.
pub fn needs_refresh(rrsig: &DnsRecord, now: DateTime<Utc>, threshold_secs: u32) -> bool {
    match rrsig {
        DnsRecord::Rrsig { expiration, .. } => {
            let remaining = *expiration as i64 - now.timestamp();
            remaining < threshold_secs as i64
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::keys::DnssecAlgorithm;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn now() -> DateTime<Utc> {
        Utc.ymd(2024, 6, 1).and_hms(12, 0, 0)
    }

    fn make_key(key_type: KeyType, state: KeyState) -> DnssecPrivateKey {
        let mut key = DnssecPrivateKey::generate(
            key_type,
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            0,
            now(),
        )
        .unwrap();
        key.state = state;
        key
    }

    fn a_rrset() -> Vec<ZoneRecord> {
        vec![
            ZoneRecord::new(DnsRecord::A {
                domain: "web.example".to_string(),
                addr: Ipv4Addr::new(192, 0, 2, 2),
                ttl: TransientTtl(300),
            }),
            ZoneRecord::new(DnsRecord::A {
                domain: "web.example".to_string(),
                addr: Ipv4Addr::new(192, 0, 2, 1),
                ttl: TransientTtl(300),
            }),
        ]
    }

    #[test]
    fn test_sign_and_verify_rrset() {
        let zsk = make_key(KeyType::Zsk, KeyState::Active);
        let records = a_rrset();
        let sigs = sign_rrset(
            "example",
            "web.example",
            QueryType::A,
            &records,
            &[zsk.clone()],
            validity_period(604_800),
            now(),
        )
        .unwrap();
        assert_eq!(sigs.len(), 1);
        assert!(verify_rrsig(&sigs[0].data, &records, &zsk).unwrap());
    }

    #[test]
    fn test_signature_fields() {
        let zsk = make_key(KeyType::Zsk, KeyState::Ready);
        let records = a_rrset();
        let sigs = sign_rrset(
            "example",
            "web.example",
            QueryType::A,
            &records,
            &[zsk.clone()],
            validity_period(604_800),
            now(),
        )
        .unwrap();
        match &sigs[0].data {
            DnsRecord::Rrsig {
                type_covered,
                labels,
                original_ttl,
                inception,
                expiration,
                key_tag,
                signer_name,
                ..
            } => {
                assert_eq!(*type_covered, 1);
                assert_eq!(*labels, 2);
                assert_eq!(*original_ttl, 300);
                assert_eq!(*inception as i64, now().timestamp() - 3600);
                assert_eq!(
                    *expiration,
                    (now().timestamp() - 3600) as u32 + 604_800 + 3 * 86_400
                );
                assert_eq!(*key_tag, zsk.key_tag);
                assert_eq!(signer_name, "example");
            }
            other => panic!("expected RRSIG, got {:?}", other),
        }
    }

    #[test]
    fn test_dnskey_signed_by_ksks_only() {
        let ksk = make_key(KeyType::Ksk, KeyState::Active);
        let zsk = make_key(KeyType::Zsk, KeyState::Active);
        let dnskey = vec![ZoneRecord::new(ksk.dnskey_record("example", 3600))];

        let sigs = sign_rrset(
            "example",
            "example",
            QueryType::Dnskey,
            &dnskey,
            &[ksk.clone(), zsk],
            validity_period(604_800),
            now(),
        )
        .unwrap();
        assert_eq!(sigs.len(), 1);
        match &sigs[0].data {
            DnsRecord::Rrsig { key_tag, .. } => assert_eq!(*key_tag, ksk.key_tag),
            other => panic!("expected RRSIG, got {:?}", other),
        }
    }

    #[test]
    fn test_revoked_ksk_still_signs_dnskey() {
        let revoked = make_key(KeyType::Ksk, KeyState::Revoked);
        let dnskey = vec![ZoneRecord::new(revoked.dnskey_record("example", 3600))];
        let sigs = sign_rrset(
            "example",
            "example",
            QueryType::Dnskey,
            &dnskey,
            &[revoked],
            validity_period(604_800),
            now(),
        )
        .unwrap();
        assert_eq!(sigs.len(), 1);
    }

    #[test]
    fn test_published_zsk_does_not_sign() {
        let zsk = make_key(KeyType::Zsk, KeyState::Published);
        let result = sign_rrset(
            "example",
            "web.example",
            QueryType::A,
            &a_rrset(),
            &[zsk],
            validity_period(604_800),
            now(),
        );
        assert!(matches!(result, Err(ZoneError::NoSigningKey(_))));
    }

    #[test]
    fn test_referral_ns_not_signed() {
        let zsk = make_key(KeyType::Zsk, KeyState::Active);
        let referral = vec![ZoneRecord::new(DnsRecord::Ns {
            domain: "child.example".to_string(),
            host: "ns1.child.example".to_string(),
            ttl: TransientTtl(3600),
        })];
        let sigs = sign_rrset(
            "example",
            "child.example",
            QueryType::Ns,
            &referral,
            &[zsk],
            validity_period(604_800),
            now(),
        )
        .unwrap();
        assert!(sigs.is_empty());
    }

    #[test]
    fn test_aname_refused() {
        let zsk = make_key(KeyType::Zsk, KeyState::Active);
        let aname = vec![ZoneRecord::new(DnsRecord::Aname {
            domain: "example".to_string(),
            target: "cdn.example.net".to_string(),
            ttl: TransientTtl(300),
        })];
        let result = sign_rrset(
            "example",
            "example",
            QueryType::Aname,
            &aname,
            &[zsk],
            validity_period(604_800),
            now(),
        );
        assert!(matches!(result, Err(ZoneError::UnsupportedInSignedZone(_))));
    }

    fn rrsig_expiring_at(expiration: u32) -> DnsRecord {
        DnsRecord::Rrsig {
            domain: "web.example".to_string(),
            type_covered: 1,
            algorithm: 13,
            labels: 2,
            original_ttl: 300,
            expiration,
            inception: (now().timestamp() - 3600) as u32,
            key_tag: 1,
            signer_name: "example".to_string(),
            signature: vec![0],
            ttl: TransientTtl(300),
        }
    }

    #[test]
    fn test_needs_refresh() {
        let validity = validity_period(604_800);
        let threshold = refresh_interval(validity);

        let fresh = rrsig_expiring_at((now().timestamp() + 2 * threshold as i64) as u32);
        assert!(!needs_refresh(&fresh, now(), threshold));

        let stale = rrsig_expiring_at((now().timestamp() + threshold as i64 / 2) as u32);
        assert!(needs_refresh(&stale, now(), threshold));

        let expired = rrsig_expiring_at((now().timestamp() - 10) as u32);
        assert!(needs_refresh(&expired, now(), threshold));
    }
}
