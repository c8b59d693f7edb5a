//! End-to-end tests for the primary zone manager
//!
//! These tests exercise full zone lifecycles through the facade:
//! journaled mutations on an unsigned zone, zone signing with NSEC and
//! NSEC3, incremental denial chain repair, ZSK rollover driven by an
//! injected clock, persistence round-trips and concurrent mutation.

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use stratum::dns::context::{CountingNotifier, NoopPersistence, UnreachableResolver, ZoneHost};
use stratum::dns::denial;
use stratum::dns::journal::JournalEntryKind;
use stratum::dns::keys::{DnssecAlgorithm, KeyState, KeyType};
use stratum::dns::persist;
use stratum::dns::protocol::{DnsRecord, QueryType, TransientTtl, ZoneRecord};
use stratum::dns::signer;
use stratum::dns::zone::{DenialKind, DnssecStatus, PrimaryZone};

fn t0() -> DateTime<Utc> {
    Utc.ymd(2024, 6, 1).and_hms(12, 0, 0)
}

fn detached_host() -> ZoneHost {
    ZoneHost {
        resolver: Box::new(UnreachableResolver),
        notifier: Box::new(CountingNotifier::new()),
        persistence: Box::new(NoopPersistence),
    }
}

fn new_zone() -> PrimaryZone {
    PrimaryZone::create("example", "ns1.example", "admin.example", false, detached_host())
        .unwrap()
}

fn a_record(domain: &str, last_octet: u8, ttl: u32) -> ZoneRecord {
    ZoneRecord::new(DnsRecord::A {
        domain: domain.to_string(),
        addr: Ipv4Addr::new(192, 0, 2, last_octet),
        ttl: TransientTtl(ttl),
    })
}

fn ns_record(domain: &str, host: &str) -> ZoneRecord {
    ZoneRecord::new(DnsRecord::Ns {
        domain: domain.to_string(),
        host: host.to_string(),
        ttl: TransientTtl(3600),
    })
}

/// Walk the NSEC chain from the apex; assert it is a single closed
/// cycle and return the owners in traversal order.
fn walk_nsec_chain(zone: &PrimaryZone) -> Vec<String> {
    let mut owners = Vec::new();
    let mut current = "example".to_string();
    loop {
        let slot = zone
            .records(&current, QueryType::Nsec)
            .unwrap_or_else(|| panic!("no NSEC at {}", current));
        assert_eq!(slot.len(), 1, "more than one NSEC at {}", current);
        owners.push(current.clone());
        let next = match &slot[0].data {
            DnsRecord::Nsec { next_domain, .. } => next_domain.clone(),
            other => panic!("expected NSEC, got {:?}", other),
        };
        if next == "example" {
            break;
        }
        assert!(
            !owners.contains(&next),
            "NSEC chain revisited {} before closing",
            next
        );
        current = next;
    }
    owners
}

// -- scenario 1: unsigned zone journal flow ---------------------------------

#[test]
fn test_unsigned_mutation_journals_soa_and_records() {
    let zone = new_zone();
    let soa = zone.soa().unwrap();
    assert_eq!(soa.serial, 1);
    assert_eq!(soa.refresh, 900);
    assert_eq!(soa.retry, 300);
    assert_eq!(soa.expire, 604_800);
    assert_eq!(soa.minimum, 900);

    zone.set_records_at(
        QueryType::Ns,
        vec![ns_record("example", "ns1.example"), ns_record("example", "ns2.example")],
        t0(),
    )
    .unwrap();

    assert_eq!(zone.serial(), 2);
    let commits = zone.journal_commits();
    assert_eq!(commits.len(), 1);
    let entries = &commits[0].entries;

    // old SOA, new SOA, then the NS; no RRSIG anywhere
    assert_eq!(entries[0].kind, JournalEntryKind::OldSoa);
    match &entries[0].record.data {
        DnsRecord::Soa { serial, .. } => assert_eq!(*serial, 1),
        other => panic!("expected SOA, got {:?}", other),
    }
    assert_eq!(entries[1].kind, JournalEntryKind::NewSoa);
    match &entries[1].record.data {
        DnsRecord::Soa { serial, .. } => assert_eq!(*serial, 2),
        other => panic!("expected SOA, got {:?}", other),
    }
    assert_eq!(entries[2].kind, JournalEntryKind::Added);
    assert_eq!(entries[2].record.data.get_querytype(), QueryType::Ns);
    assert!(entries
        .iter()
        .all(|e| e.record.data.get_querytype() != QueryType::Rrsig));
}

#[test]
fn test_repeated_mutation_is_noop() {
    let zone = new_zone();
    zone.add_record_at(a_record("web.example", 1, 300), t0()).unwrap();
    let serial = zone.serial();
    let commits = zone.journal_commits().len();

    zone.add_record_at(a_record("web.example", 1, 300), t0()).unwrap();
    assert_eq!(zone.serial(), serial);
    assert_eq!(zone.journal_commits().len(), commits);

    // identical RRset replacement is also a no-op
    zone.set_records_at(QueryType::A, vec![a_record("web.example", 1, 300)], t0())
        .unwrap();
    assert_eq!(zone.serial(), serial);
    assert_eq!(zone.journal_commits().len(), commits);
}

// -- scenario 2: signing with NSEC ------------------------------------------

#[test]
fn test_sign_zone_with_nsec() {
    let zone = new_zone();
    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec,
        t0(),
    )
    .unwrap();

    assert_eq!(zone.dnssec_status(), DnssecStatus::SignedWithNsec);
    assert_eq!(zone.serial(), 2);

    let keys = zone.dnssec_keys();
    assert_eq!(keys.len(), 2);
    let ksk = keys.iter().find(|k| k.key_type == KeyType::Ksk).unwrap();
    let zsk = keys.iter().find(|k| k.key_type == KeyType::Zsk).unwrap();
    assert_eq!(ksk.state, KeyState::Published);
    assert_eq!(zsk.state, KeyState::Ready);

    // DNSKEY RRset signed by the KSK
    let dnskey_sigs: Vec<u16> = zone
        .records("example", QueryType::Rrsig)
        .unwrap()
        .iter()
        .filter_map(|r| match &r.data {
            DnsRecord::Rrsig {
                type_covered,
                key_tag,
                ..
            } if *type_covered == QueryType::Dnskey.to_num() => Some(*key_tag),
            _ => None,
        })
        .collect();
    assert_eq!(dnskey_sigs, vec![ksk.key_tag]);

    // every other RRset signed by the ZSK, and the signatures verify
    let dnskey_rrset = zone.records("example", QueryType::Dnskey).unwrap();
    assert_eq!(dnskey_rrset.len(), 2);
    for rtype in &[QueryType::Ns, QueryType::Soa, QueryType::Nsec] {
        let rrset = zone.records("example", *rtype).unwrap();
        let sigs = zone.records("example", QueryType::Rrsig).unwrap();
        let sig = sigs
            .iter()
            .find(|r| {
                matches!(&r.data, DnsRecord::Rrsig { type_covered, .. }
                    if *type_covered == rtype.to_num())
            })
            .unwrap_or_else(|| panic!("no RRSIG covering {:?}", rtype));
        match &sig.data {
            DnsRecord::Rrsig { key_tag, .. } => assert_eq!(*key_tag, zsk.key_tag),
            _ => unreachable!(),
        }
        assert!(signer::verify_rrsig(&sig.data, &rrset, zsk).unwrap());
    }

    // one NSEC per owner, chain closed
    assert_eq!(walk_nsec_chain(&zone), vec!["example"]);
}

#[test]
fn test_sign_zone_twice_fails() {
    let zone = new_zone();
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();
    let result =
        zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0());
    assert!(result.is_err());
}

#[test]
fn test_sign_zone_rejects_aname_and_disabled() {
    let zone = new_zone();
    zone.add_record_at(
        ZoneRecord::new(DnsRecord::Aname {
            domain: "example".to_string(),
            target: "cdn.example.net".to_string(),
            ttl: TransientTtl(300),
        }),
        t0(),
    )
    .unwrap();
    assert!(zone
        .sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .is_err());

    let zone = new_zone();
    let mut disabled = a_record("off.example", 1, 300);
    disabled.info.disabled = true;
    zone.add_record_at(disabled, t0()).unwrap();
    assert!(zone
        .sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .is_err());
}

// -- scenario 3: incremental NSEC repair ------------------------------------

#[test]
fn test_add_record_extends_nsec_chain() {
    let zone = new_zone();
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();
    let serial_before = zone.serial();

    zone.add_record_at(a_record("web.example", 1, 300), t0() + Duration::minutes(1))
        .unwrap();
    assert_eq!(zone.serial(), serial_before + 1);

    // the A RRset exists and is signed by the ZSK
    assert!(zone.records("web.example", QueryType::A).is_some());
    let zsk = zone
        .dnssec_keys()
        .into_iter()
        .find(|k| k.key_type == KeyType::Zsk)
        .unwrap();
    let sigs = zone.records("web.example", QueryType::Rrsig).unwrap();
    assert!(sigs.iter().any(|r| {
        matches!(&r.data, DnsRecord::Rrsig { type_covered, key_tag, .. }
            if *type_covered == QueryType::A.to_num() && *key_tag == zsk.key_tag)
    }));

    // new NSEC with bitmap {A, RRSIG, NSEC}; predecessor relinked
    let nsec = zone.records("web.example", QueryType::Nsec).unwrap();
    match &nsec[0].data {
        DnsRecord::Nsec {
            next_domain, types, ..
        } => {
            assert_eq!(next_domain, "example");
            assert_eq!(types, &vec![1, 46, 47]);
        }
        other => panic!("expected NSEC, got {:?}", other),
    }
    let apex_nsec = zone.records("example", QueryType::Nsec).unwrap();
    match &apex_nsec[0].data {
        DnsRecord::Nsec { next_domain, .. } => assert_eq!(next_domain, "web.example"),
        other => panic!("expected NSEC, got {:?}", other),
    }
    assert_eq!(walk_nsec_chain(&zone), vec!["example", "web.example"]);
}

// -- scenario 4: ZSK rollover ------------------------------------------------

#[test]
fn test_zsk_rollover_lifecycle() {
    let zone = new_zone();
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();

    // first tick: the initial ZSK goes Active
    zone.run_maintenance(t0() + Duration::seconds(30)).unwrap();
    let old_tag = zone
        .dnssec_keys()
        .into_iter()
        .find(|k| k.key_type == KeyType::Zsk)
        .unwrap()
        .key_tag;
    assert_eq!(zone.dnssec_keys().iter().find(|k| k.key_tag == old_tag).unwrap().state, KeyState::Active);

    // operator-initiated rollover publishes a successor and flags the
    // old key retiring
    let roll_time = t0() + Duration::minutes(5);
    let new_tag = zone.rollover_key_at(old_tag, roll_time).unwrap();
    let keys = zone.dnssec_keys();
    assert_eq!(keys.len(), 3);
    let old_key = keys.iter().find(|k| k.key_tag == old_tag).unwrap();
    let new_key = keys.iter().find(|k| k.key_tag == new_tag).unwrap();
    assert!(old_key.is_retiring);
    assert_eq!(new_key.state, KeyState::Published);
    assert_eq!(new_key.algorithm, old_key.algorithm);
    assert_eq!(new_key.key_type, KeyType::Zsk);
    let serial_after_roll = zone.serial();

    // after DNSKEY TTL + propagation delay the successor goes Ready,
    // then Active on the following tick
    let ready_time = roll_time + Duration::seconds(3600 + 1200 + 10);
    zone.run_maintenance(ready_time).unwrap();
    assert_eq!(
        zone.dnssec_keys().iter().find(|k| k.key_tag == new_tag).unwrap().state,
        KeyState::Ready
    );

    let active_time = ready_time + Duration::minutes(15);
    zone.run_maintenance(active_time).unwrap();
    assert_eq!(
        zone.dnssec_keys().iter().find(|k| k.key_tag == new_tag).unwrap().state,
        KeyState::Active
    );

    // the retiring key moves to Retired once the successor is Active
    let retire_time = active_time + Duration::minutes(15);
    zone.run_maintenance(retire_time).unwrap();
    assert_eq!(
        zone.dnssec_keys().iter().find(|k| k.key_tag == old_tag).unwrap().state,
        KeyState::Retired
    );

    // after max RRSIG TTL + propagation delay the old key dies and is
    // removed together with its signatures
    let dead_time = retire_time + Duration::seconds(3600 + 1200 + 10);
    zone.run_maintenance(dead_time).unwrap();
    assert!(zone.dnssec_keys().iter().all(|k| k.key_tag != old_tag));

    for (key, slot) in zone.record_store().entries() {
        if key.rtype == QueryType::Rrsig {
            for record in slot.iter() {
                match &record.data {
                    DnsRecord::Rrsig { key_tag, .. } => assert_ne!(*key_tag, old_tag),
                    _ => {}
                }
            }
        }
    }

    // content-changing transitions bumped the serial along the way
    assert!(zone.serial() > serial_after_roll);

    // every remaining RRset is still covered by the successor
    let sigs = zone.records("web.example", QueryType::Rrsig);
    assert!(sigs.is_none()); // owner never existed in this zone
    let apex_sigs = zone.records("example", QueryType::Rrsig).unwrap();
    assert!(apex_sigs.iter().any(|r| {
        matches!(&r.data, DnsRecord::Rrsig { key_tag, .. } if *key_tag == new_tag)
    }));
}

// -- scenario 5: NSEC3 add/delete and persistence round-trip -----------------

#[test]
fn test_nsec3_add_delete_and_round_trip() {
    let zone = new_zone();
    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec3 {
            iterations: 10,
            salt: vec![0xAA, 0xBB],
        },
        t0(),
    )
    .unwrap();
    assert_eq!(zone.dnssec_status(), DnssecStatus::SignedWithNsec3);

    let params = denial::Nsec3Params::new(10, vec![0xAA, 0xBB]).unwrap();
    let hashed_a = denial::nsec3_owner("a.example", "example", &params);
    let hashed_apex = denial::nsec3_owner("example", "example", &params);

    zone.add_record_at(a_record("a.example", 1, 300), t0() + Duration::minutes(1))
        .unwrap();
    assert!(zone.records(&hashed_a, QueryType::Nsec3).is_some());

    zone.delete_records_at("a.example", QueryType::A, t0() + Duration::minutes(2))
        .unwrap();
    assert!(zone.records(&hashed_a, QueryType::Nsec3).is_none());

    // with only the apex left the chain points back at itself
    let apex_nsec3 = zone.records(&hashed_apex, QueryType::Nsec3).unwrap();
    match &apex_nsec3[0].data {
        DnsRecord::Nsec3 { next_hashed, .. } => {
            assert_eq!(
                format!("{}.example", denial::base32hex_encode(next_hashed)),
                hashed_apex
            );
        }
        other => panic!("expected NSEC3, got {:?}", other),
    }

    // the zone round-trips through save/load unchanged
    let bytes = persist::save_zone(&zone).unwrap();
    let restored = persist::load_zone(&bytes, detached_host()).unwrap();
    assert_eq!(restored.serial(), zone.serial());
    assert_eq!(restored.dnssec_status(), zone.dnssec_status());
    assert_eq!(
        restored.record_store().entries().len(),
        zone.record_store().entries().len()
    );
    assert_eq!(restored.dnssec_keys().len(), zone.dnssec_keys().len());
    assert_eq!(restored.journal_commits().len(), zone.journal_commits().len());
    for (key, slot) in zone.record_store().entries() {
        let restored_slot = restored
            .records(&key.owner, key.rtype)
            .unwrap_or_else(|| panic!("missing {}/{:?} after reload", key.owner, key.rtype));
        assert_eq!(slot.as_ref(), restored_slot.as_ref());
    }
}

#[test]
fn test_nsec3_iteration_bounds_via_facade() {
    let zone = new_zone();
    assert!(zone
        .sign_zone_at(
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            3600,
            DenialKind::Nsec3 {
                iterations: 51,
                salt: Vec::new(),
            },
            t0(),
        )
        .is_err());

    // 0 and 50 iterations, empty salt: all fine
    assert!(zone
        .sign_zone_at(
            DnssecAlgorithm::EcdsaP256Sha256,
            0,
            3600,
            DenialKind::Nsec3 {
                iterations: 0,
                salt: Vec::new(),
            },
            t0(),
        )
        .is_ok());
    assert!(zone.convert_to_nsec3_at(50, Vec::new(), t0()).is_ok());
}

#[test]
fn test_nsec3_same_params_noop_and_conversion() {
    let zone = new_zone();
    zone.sign_zone_at(
        DnssecAlgorithm::EcdsaP256Sha256,
        0,
        3600,
        DenialKind::Nsec3 {
            iterations: 10,
            salt: vec![0xAA, 0xBB],
        },
        t0(),
    )
    .unwrap();
    let serial = zone.serial();

    // re-applying identical parameters changes nothing
    zone.convert_to_nsec3_at(10, vec![0xAA, 0xBB], t0()).unwrap();
    assert_eq!(zone.serial(), serial);

    // converting to NSEC drops every NSEC3 and the NSEC3PARAM
    zone.convert_to_nsec_at(t0() + Duration::minutes(1)).unwrap();
    assert_eq!(zone.dnssec_status(), DnssecStatus::SignedWithNsec);
    assert!(zone.records("example", QueryType::Nsec3Param).is_none());
    assert!(zone
        .record_store()
        .entries()
        .iter()
        .all(|(k, _)| k.rtype != QueryType::Nsec3));
    walk_nsec_chain(&zone);
}

// -- scenario 6: concurrent mutation -----------------------------------------

#[test]
fn test_concurrent_adds_keep_zone_consistent() {
    let zone = Arc::new(new_zone());
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();
    let serial_before = zone.serial();

    let zone_a = Arc::clone(&zone);
    let handle_a = std::thread::spawn(move || {
        zone_a.add_record(a_record("alpha.example", 1, 300)).unwrap();
    });
    let zone_b = Arc::clone(&zone);
    let handle_b = std::thread::spawn(move || {
        zone_b.add_record(a_record("beta.example", 2, 300)).unwrap();
    });
    handle_a.join().unwrap();
    handle_b.join().unwrap();

    assert_eq!(zone.serial(), serial_before + 2);
    assert!(zone.records("alpha.example", QueryType::A).is_some());
    assert!(zone.records("beta.example", QueryType::A).is_some());

    // both commits journaled, serials one apart
    let commits = zone.journal_commits();
    let serials: Vec<u32> = commits.iter().map(|c| c.serial).collect();
    assert!(serials.contains(&(serial_before + 1)));
    assert!(serials.contains(&(serial_before + 2)));

    // the denial chain is one cycle covering both new owners
    let chain = walk_nsec_chain(&zone);
    assert!(chain.contains(&"alpha.example".to_string()));
    assert!(chain.contains(&"beta.example".to_string()));
}

// -- serial wrap --------------------------------------------------------------

#[test]
fn test_serial_wrap_via_seeded_soa() {
    let zone = new_zone();
    let soa = zone.soa().unwrap();
    zone.set_records_at(
        QueryType::Soa,
        vec![ZoneRecord::new(DnsRecord::Soa {
            domain: "example".to_string(),
            m_name: soa.m_name.clone(),
            r_name: soa.r_name.clone(),
            serial: u32::MAX,
            refresh: soa.refresh,
            retry: soa.retry,
            expire: soa.expire,
            minimum: soa.minimum,
            ttl: TransientTtl(soa.ttl),
        })],
        t0(),
    )
    .unwrap();
    assert_eq!(zone.serial(), u32::MAX);

    zone.add_record_at(a_record("web.example", 1, 300), t0() + Duration::minutes(1))
        .unwrap();
    assert_eq!(zone.serial(), 1);
}

// -- facade restrictions -------------------------------------------------------

#[test]
fn test_facade_restrictions() {
    let zone = new_zone();

    // CNAME and DS cannot live at the apex
    assert!(zone
        .add_record(ZoneRecord::new(DnsRecord::Cname {
            domain: "example".to_string(),
            host: "other.example.net".to_string(),
            ttl: TransientTtl(300),
        }))
        .is_err());
    assert!(zone
        .add_record(ZoneRecord::new(DnsRecord::Ds {
            domain: "example".to_string(),
            key_tag: 1,
            algorithm: 13,
            digest_type: 2,
            digest: vec![0],
            ttl: TransientTtl(300),
        }))
        .is_err());

    // DNSSEC-internal types are not caller-settable
    assert!(zone
        .set_records(
            QueryType::Dnskey,
            vec![ZoneRecord::new(DnsRecord::Dnskey {
                domain: "example".to_string(),
                flags: 256,
                protocol: 3,
                algorithm: 13,
                public_key: vec![0],
                ttl: TransientTtl(3600),
            })],
        )
        .is_err());

    // FWD is not supported by a primary
    assert!(zone
        .add_record(ZoneRecord::new(DnsRecord::Fwd {
            domain: "fwd.example".to_string(),
            protocol: 0,
            forwarder: "192.0.2.53".to_string(),
            ttl: TransientTtl(0),
        }))
        .is_err());

    // the SOA cannot be deleted
    assert!(zone.delete_records("example", QueryType::Soa).is_err());

    // SOA timer discipline: TTL <= EXPIRE and RETRY <= REFRESH <= EXPIRE
    let soa = zone.soa().unwrap();
    assert!(zone
        .set_records(
            QueryType::Soa,
            vec![ZoneRecord::new(DnsRecord::Soa {
                domain: "example".to_string(),
                m_name: soa.m_name.clone(),
                r_name: soa.r_name.clone(),
                serial: soa.serial,
                refresh: soa.refresh,
                retry: soa.retry,
                expire: soa.expire,
                minimum: soa.minimum,
                ttl: TransientTtl(soa.expire + 1),
            })],
        )
        .is_err());
    assert!(zone
        .set_records(
            QueryType::Soa,
            vec![ZoneRecord::new(DnsRecord::Soa {
                domain: "example".to_string(),
                m_name: soa.m_name.clone(),
                r_name: soa.r_name,
                serial: soa.serial,
                refresh: 300,
                retry: 900,
                expire: soa.expire,
                minimum: soa.minimum,
                ttl: TransientTtl(900),
            })],
        )
        .is_err());

    // TTL at exactly EXPIRE is accepted
    zone.add_record(a_record("edge.example", 1, 604_800)).unwrap();
}

#[test]
fn test_signed_zone_rejects_aname_and_disabled_mutations() {
    let zone = new_zone();
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();

    assert!(zone
        .add_record(ZoneRecord::new(DnsRecord::Aname {
            domain: "example".to_string(),
            target: "cdn.example.net".to_string(),
            ttl: TransientTtl(300),
        }))
        .is_err());

    let mut disabled = a_record("off.example", 1, 300);
    disabled.info.disabled = true;
    assert!(zone.add_record(disabled).is_err());
}

// -- unsigning -----------------------------------------------------------------

#[test]
fn test_unsign_zone_removes_dnssec_state() {
    let zone = new_zone();
    zone.sign_zone_at(DnssecAlgorithm::EcdsaP256Sha256, 0, 3600, DenialKind::Nsec, t0())
        .unwrap();
    zone.add_record_at(a_record("web.example", 1, 300), t0()).unwrap();

    zone.unsign_zone_at(t0() + Duration::minutes(1)).unwrap();
    assert_eq!(zone.dnssec_status(), DnssecStatus::Unsigned);
    assert!(zone.dnssec_keys().is_empty());
    for (key, _) in zone.record_store().entries() {
        assert!(
            !key.rtype.is_dnssec_internal(),
            "{:?} record survived unsigning",
            key.rtype
        );
    }
    // the plain data is untouched
    assert!(zone.records("web.example", QueryType::A).is_some());
}

// -- IXFR ranges ---------------------------------------------------------------

#[test]
fn test_changes_since_serves_ixfr_ranges() {
    let zone = new_zone();
    zone.add_record_at(a_record("a.example", 1, 300), t0()).unwrap();
    zone.add_record_at(a_record("b.example", 2, 300), t0()).unwrap();

    let changes = zone.changes_since(2).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0]
        .added
        .iter()
        .any(|r| r.get_domain().as_deref() == Some("b.example")));

    // an unknown serial means the consumer needs a full transfer
    assert!(zone.changes_since(99).is_none());
}
