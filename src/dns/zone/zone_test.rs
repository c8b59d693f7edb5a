use std::net::Ipv4Addr;

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::dns::context::ZoneHost;
use crate::dns::protocol::TransientTtl;

fn t0() -> DateTime<Utc> {
    Utc.ymd(2024, 6, 1).and_hms(12, 0, 0)
}

fn make_zone(internal: bool) -> PrimaryZone {
    PrimaryZone::create(
        "example",
        "ns1.example",
        "admin.example",
        internal,
        ZoneHost::detached(),
    )
    .unwrap()
}

fn a_record(domain: &str, last_octet: u8) -> ZoneRecord {
    ZoneRecord::new(DnsRecord::A {
        domain: domain.to_string(),
        addr: Ipv4Addr::new(192, 0, 2, last_octet),
        ttl: TransientTtl(300),
    })
}

#[test]
fn test_create_seeds_apex() {
    let zone = make_zone(false);
    assert_eq!(zone.name(), "example");
    assert_eq!(zone.serial(), 1);
    assert!(zone.records("example", QueryType::Ns).is_some());
    assert_eq!(zone.dnssec_status(), DnssecStatus::Unsigned);
}

#[test]
fn test_create_normalizes_and_validates_name() {
    let zone = PrimaryZone::create(
        "Example.",
        "NS1.Example.",
        "admin.example.",
        false,
        ZoneHost::detached(),
    )
    .unwrap();
    assert_eq!(zone.name(), "example");

    assert!(PrimaryZone::create("", "ns", "admin", false, ZoneHost::detached()).is_err());
    let long_label = "x".repeat(64);
    assert!(PrimaryZone::create(&long_label, "ns", "admin", false, ZoneHost::detached()).is_err());
}

#[test]
fn test_internal_zone_skips_journal_and_serial() {
    let zone = make_zone(true);
    zone.add_record_at(a_record("web.example", 1), t0()).unwrap();
    zone.add_record_at(a_record("mail.example", 2), t0()).unwrap();

    assert_eq!(zone.serial(), 1);
    assert!(zone.journal_commits().is_empty());
    assert!(zone.records("web.example", QueryType::A).is_some());
}

#[test]
fn test_records_outside_zone_rejected() {
    let zone = make_zone(false);
    let result = zone.add_record_at(a_record("web.elsewhere", 1), t0());
    assert!(matches!(result, Err(ZoneError::InvalidInput(_))));
}

#[test]
fn test_update_record_type_must_match() {
    let zone = make_zone(false);
    zone.add_record_at(a_record("web.example", 1), t0()).unwrap();

    let cname = ZoneRecord::new(DnsRecord::Cname {
        domain: "web.example".to_string(),
        host: "other.example".to_string(),
        ttl: TransientTtl(300),
    });
    let result = zone.update_record_at(&a_record("web.example", 1).data, cname, t0());
    assert!(matches!(result, Err(ZoneError::InvalidInput(_))));
}

#[test]
fn test_update_record_moves_owner() {
    let zone = make_zone(false);
    zone.add_record_at(a_record("old.example", 1), t0()).unwrap();

    zone.update_record_at(&a_record("old.example", 1).data, a_record("new.example", 1), t0())
        .unwrap();
    assert!(zone.records("old.example", QueryType::A).is_none());
    assert!(zone.records("new.example", QueryType::A).is_some());
}

#[test]
fn test_key_surface_errors() {
    let zone = make_zone(false);
    // key operations demand a signed zone
    assert!(matches!(
        zone.generate_key(KeyType::Zsk, DnssecAlgorithm::EcdsaP256Sha256, 0, 0),
        Err(ZoneError::NotSigned(_))
    ));

    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec,
        t0(),
    )
    .unwrap();

    assert!(matches!(zone.publish_key(12345), Err(ZoneError::KeyNotFound(12345))));
    assert!(matches!(zone.rollover_key(12345), Err(ZoneError::KeyNotFound(12345))));

    // publishing an already-published key is refused
    let tag = zone.dnssec_keys()[0].key_tag;
    assert!(matches!(zone.publish_key(tag), Err(ZoneError::DuplicatePublish(_))));

    // a published key cannot be deleted outright
    assert!(zone.delete_key(tag).is_err());

    // a generated key can
    let fresh = zone
        .generate_key(KeyType::Zsk, DnssecAlgorithm::EcdsaP256Sha256, 0, 0)
        .unwrap();
    zone.delete_key(fresh).unwrap();
    assert!(zone.dnssec_keys().iter().all(|k| k.key_tag != fresh));
}

#[test]
fn test_retire_sole_key_refused() {
    let zone = make_zone(false);
    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec,
        t0(),
    )
    .unwrap();

    let zsk_tag = zone
        .dnssec_keys()
        .into_iter()
        .find(|k| k.key_type == KeyType::Zsk)
        .unwrap()
        .key_tag;
    assert!(matches!(
        zone.retire_key_at(zsk_tag, t0()),
        Err(ZoneError::NoSuccessorKey(_))
    ));
}

#[test]
fn test_update_nsec3_params_requires_nsec3() {
    let zone = make_zone(false);
    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec,
        t0(),
    )
    .unwrap();
    assert!(zone.update_nsec3_params(10, vec![0xAA]).is_err());
}

#[test]
fn test_unsigned_zone_signed_ops_fail() {
    let zone = make_zone(false);
    assert!(matches!(zone.unsign_zone_at(t0()), Err(ZoneError::NotSigned(_))));
    assert!(matches!(
        zone.convert_to_nsec3_at(10, Vec::new(), t0()),
        Err(ZoneError::NotSigned(_))
    ));
}
