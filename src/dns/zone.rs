//! the primary zone facade
//!
//! `PrimaryZone` owns the record store, the key store and the journal of
//! one authoritative zone, and orchestrates every mutation: validation,
//! store update, re-signing, denial chain repair, journaling with the
//! serial bump, and notification. Readers go straight to the record
//! store and observe either the pre-commit or the post-commit RRset,
//! never an intermediate one.
//!
//! Lock order is fixed: the DNSSEC update lock (chain construction,
//! mode switches, per-owner chain repair) is taken before the journal
//! lock (commits and history cleanup), and the key store lock is only
//! ever held for map access, never across I/O.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_derive::{Deserialize, Serialize};

use crate::dns::context::ZoneHost;
use crate::dns::denial::{self, DenialDelta, Nsec3Params};
use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::journal::{self, JournalCommit, ZoneChange, ZoneJournal};
use crate::dns::key_lifecycle::{self, TickPlan, ZoneTimings};
use crate::dns::keys::{DnssecAlgorithm, DnssecPrivateKey, KeyState, KeyStore, KeyType};
use crate::dns::names;
use crate::dns::protocol::{DnsRecord, QueryType, TransientTtl, ZoneRecord};
use crate::dns::signer;
use crate::dns::store::RecordStore;

/// Default TTL for the apex DNSKEY RRset when none is specified
pub const DEFAULT_DNSKEY_TTL: u32 = 3600;

/// DNSSEC state of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnssecStatus {
    Unsigned,
    SignedWithNsec,
    SignedWithNsec3,
}

impl DnssecStatus {
    pub fn is_signed(&self) -> bool {
        !matches!(self, DnssecStatus::Unsigned)
    }
}

/// Denial mode requested when signing a zone
#[derive(Debug, Clone)]
pub enum DenialKind {
    Nsec,
    Nsec3 { iterations: u16, salt: Vec<u8> },
}

/// Zone policy knobs; opaque to the core, carried and persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonePolicy {
    pub zone_transfer: String,
    pub notify: String,
    pub update: String,
}

/// The SOA fields of the zone, extracted for timing arithmetic.
#[derive(Debug, Clone)]
pub struct SoaFields {
    pub m_name: String,
    pub r_name: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    pub ttl: u32,
}

impl SoaFields {
    fn from_record(record: &DnsRecord) -> Option<SoaFields> {
        match record {
            DnsRecord::Soa {
                m_name,
                r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ttl,
                ..
            } => Some(SoaFields {
                m_name: m_name.clone(),
                r_name: r_name.clone(),
                serial: *serial,
                refresh: *refresh,
                retry: *retry,
                expire: *expire,
                minimum: *minimum,
                ttl: ttl.0,
            }),
            _ => None,
        }
    }

    fn to_record(&self, apex: &str) -> DnsRecord {
        DnsRecord::Soa {
            domain: apex.to_string(),
            m_name: self.m_name.clone(),
            r_name: self.r_name.clone(),
            serial: self.serial,
            refresh: self.refresh,
            retry: self.retry,
            expire: self.expire,
            minimum: self.minimum,
            ttl: TransientTtl(self.ttl),
        }
    }
}

/// An authoritative primary zone.
pub struct PrimaryZone {
    name: String,
    /// Internal zones skip journaling and serial bumps entirely
    internal: bool,
    status: RwLock<DnssecStatus>,
    policy: RwLock<ZonePolicy>,
    store: RecordStore,
    keys: KeyStore,
    journal: Mutex<ZoneJournal>,
    /// Serialises denial chain construction, mode switches and
    /// per-owner chain repair
    dnssec_update: Mutex<()>,
    host: ZoneHost,
    last_resign_check: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for PrimaryZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryZone")
            .field("name", &self.name)
            .field("internal", &self.internal)
            .finish_non_exhaustive()
    }
}

impl PrimaryZone {
    /// Create a zone from scratch: apex SOA and NS.
    pub fn create(
        name: &str,
        primary_ns: &str,
        responsible: &str,
        internal: bool,
        host: ZoneHost,
    ) -> ZoneResult<PrimaryZone> {
        let apex = names::normalize(name);
        names::validate(&apex).map_err(ZoneError::InvalidInput)?;
        if apex.is_empty() {
            return Err(ZoneError::InvalidInput("zone name cannot be the root".to_string()));
        }

        let zone = PrimaryZone {
            name: apex.clone(),
            internal,
            status: RwLock::new(DnssecStatus::Unsigned),
            policy: RwLock::new(ZonePolicy::default()),
            store: RecordStore::new(),
            keys: KeyStore::new(),
            journal: Mutex::new(ZoneJournal::new()),
            dnssec_update: Mutex::new(()),
            host,
            last_resign_check: Mutex::new(None),
        };

        zone.store.set(
            &apex,
            QueryType::Soa,
            vec![ZoneRecord::new(DnsRecord::Soa {
                domain: apex.clone(),
                m_name: names::normalize(primary_ns),
                r_name: names::normalize(responsible),
                serial: 1,
                refresh: 900,
                retry: 300,
                expire: 604_800,
                minimum: 900,
                ttl: TransientTtl(900),
            })],
        );
        zone.store.set(
            &apex,
            QueryType::Ns,
            vec![ZoneRecord::new(DnsRecord::Ns {
                domain: apex.clone(),
                host: names::normalize(primary_ns),
                ttl: TransientTtl(3600),
            })],
        );
        Ok(zone)
    }

    /// Reassemble a zone from persisted parts.
    pub(crate) fn from_parts(
        name: String,
        internal: bool,
        status: DnssecStatus,
        policy: ZonePolicy,
        store: RecordStore,
        keys: KeyStore,
        journal: ZoneJournal,
        host: ZoneHost,
    ) -> PrimaryZone {
        PrimaryZone {
            name,
            internal,
            status: RwLock::new(status),
            policy: RwLock::new(policy),
            store,
            keys,
            journal: Mutex::new(journal),
            dnssec_update: Mutex::new(()),
            host,
            last_resign_check: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn dnssec_status(&self) -> DnssecStatus {
        *self.status.read()
    }

    pub fn policy(&self) -> ZonePolicy {
        self.policy.read().clone()
    }

    pub fn set_policy(&self, policy: ZonePolicy) {
        *self.policy.write() = policy;
    }

    /// Read an RRset; the query path of the server reads through here.
    pub fn records(&self, owner: &str, rtype: QueryType) -> Option<std::sync::Arc<Vec<ZoneRecord>>> {
        self.store.get(owner, rtype)
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    pub fn soa(&self) -> ZoneResult<SoaFields> {
        let slot = self
            .store
            .get(&self.name, QueryType::Soa)
            .ok_or_else(|| ZoneError::InvalidInput(format!("zone {} has no SOA", self.name)))?;
        SoaFields::from_record(&slot[0].data)
            .ok_or_else(|| ZoneError::InvalidInput("apex SOA slot holds a non-SOA record".to_string()))
    }

    pub fn serial(&self) -> u32 {
        self.soa().map(|soa| soa.serial).unwrap_or(0)
    }

    /// A snapshot of the zone's keys (private material stays inside).
    pub fn dnssec_keys(&self) -> Vec<DnssecPrivateKey> {
        self.keys.all()
    }

    /// The journal commits retained for IXFR.
    pub fn journal_commits(&self) -> Vec<JournalCommit> {
        self.journal.lock().commits().to_vec()
    }

    /// IXFR difference runs for a secondary at `serial`.
    pub fn changes_since(&self, serial: u32) -> Option<Vec<ZoneChange>> {
        self.journal.lock().changes_since(serial)
    }

    // ---- mutation surface -------------------------------------------------

    /// Replace the RRset at (owner, type).
    pub fn set_records(&self, rtype: QueryType, records: Vec<ZoneRecord>) -> ZoneResult<()> {
        self.set_records_at(rtype, records, Utc::now())
    }

    pub fn set_records_at(
        &self,
        rtype: QueryType,
        records: Vec<ZoneRecord>,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        if records.is_empty() {
            return Err(ZoneError::InvalidInput("cannot set an empty RRset".to_string()));
        }
        let owner = names::normalize(&records[0].data.get_domain().unwrap_or_default());
        for record in &records {
            let record_owner = names::normalize(&record.data.get_domain().unwrap_or_default());
            if record_owner != owner || record.data.get_querytype() != rtype {
                return Err(ZoneError::InvalidInput(
                    "records of one RRset must share owner and type".to_string(),
                ));
            }
        }
        self.check_mutation_allowed(&owner, rtype, &records)?;

        if rtype == QueryType::Soa {
            return self.set_soa(records, now);
        }

        // applying an identical RRset is a no-op
        let current = self
            .store
            .get(&owner, rtype)
            .map(|slot| slot.as_ref().clone())
            .unwrap_or_default();
        if rrsets_equal(&current, &records) {
            return Ok(());
        }

        let signed = self.dnssec_status().is_signed();
        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        self.store.set(&owner, rtype, records.clone());
        // journal only what actually changed hands
        let same = |a: &ZoneRecord, b: &ZoneRecord| {
            a.data == b.data && a.data.get_ttl() == b.data.get_ttl()
        };
        let mut deleted: Vec<ZoneRecord> = current
            .iter()
            .filter(|old| !records.iter().any(|new| same(old, new)))
            .cloned()
            .collect();
        let mut added: Vec<ZoneRecord> = records
            .into_iter()
            .filter(|new| !current.iter().any(|old| same(old, new)))
            .collect();
        if signed {
            self.update_dnssec_records(&owner, rtype, now, &mut deleted, &mut added)?;
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    /// Merge one record into the zone.
    pub fn add_record(&self, record: ZoneRecord) -> ZoneResult<()> {
        self.add_record_at(record, Utc::now())
    }

    pub fn add_record_at(&self, record: ZoneRecord, now: DateTime<Utc>) -> ZoneResult<()> {
        let rtype = record.data.get_querytype();
        let owner = names::normalize(&record.data.get_domain().unwrap_or_default());
        if rtype == QueryType::Soa {
            return Err(ZoneError::InvalidApexOperation(
                "the SOA is replaced with SetRecords, never added".to_string(),
            ));
        }
        if rtype == QueryType::App {
            return Err(ZoneError::InvalidInput(
                "APP records must be set as a whole RRset, not added".to_string(),
            ));
        }
        self.check_mutation_allowed(&owner, rtype, std::slice::from_ref(&record))?;

        let signed = self.dnssec_status().is_signed();
        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        let (inserted, mut deleted) = self.store.add(record.clone());
        if !inserted {
            return Ok(());
        }
        let mut added = vec![record];
        if signed {
            self.update_dnssec_records(&owner, rtype, now, &mut deleted, &mut added)?;
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    /// Delete the whole RRset at (owner, type).
    pub fn delete_records(&self, owner: &str, rtype: QueryType) -> ZoneResult<()> {
        self.delete_records_at(owner, rtype, Utc::now())
    }

    pub fn delete_records_at(
        &self,
        owner: &str,
        rtype: QueryType,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        let owner = names::normalize(owner);
        self.check_deletion_allowed(rtype)?;

        let signed = self.dnssec_status().is_signed();
        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        let mut deleted = self.store.delete_type(&owner, rtype);
        if deleted.is_empty() {
            return Ok(());
        }
        let mut added = Vec::new();
        if signed {
            self.update_dnssec_records(&owner, rtype, now, &mut deleted, &mut added)?;
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    /// Delete one record, matched by (name, type, RDATA).
    pub fn delete_record(&self, record: &DnsRecord) -> ZoneResult<()> {
        self.delete_record_at(record, Utc::now())
    }

    pub fn delete_record_at(&self, record: &DnsRecord, now: DateTime<Utc>) -> ZoneResult<()> {
        let rtype = record.get_querytype();
        let owner = names::normalize(&record.get_domain().unwrap_or_default());
        self.check_deletion_allowed(rtype)?;

        let signed = self.dnssec_status().is_signed();
        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        let removed = match self.store.delete_record(record) {
            Some(removed) => removed,
            None => return Ok(()),
        };
        let mut deleted = vec![removed];
        let mut added = Vec::new();
        if signed {
            self.update_dnssec_records(&owner, rtype, now, &mut deleted, &mut added)?;
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    /// Replace one record with another of the same type.
    pub fn update_record(&self, old: &DnsRecord, new: ZoneRecord) -> ZoneResult<()> {
        self.update_record_at(old, new, Utc::now())
    }

    pub fn update_record_at(
        &self,
        old: &DnsRecord,
        new: ZoneRecord,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        let rtype = old.get_querytype();
        if rtype != new.data.get_querytype() {
            return Err(ZoneError::InvalidInput(
                "updated record must keep its type".to_string(),
            ));
        }
        let soa = self.soa()?;
        if new.data.get_ttl() > soa.expire {
            return Err(ZoneError::OutOfRange {
                parameter: "ttl",
                detail: format!("{} exceeds the SOA expire {}", new.data.get_ttl(), soa.expire),
            });
        }
        let signed = self.dnssec_status().is_signed();
        if signed && new.info.disabled {
            return Err(ZoneError::UnsupportedInSignedZone(
                "disabled records cannot exist in a signed zone".to_string(),
            ));
        }
        let old_owner = names::normalize(&old.get_domain().unwrap_or_default());
        let new_owner = names::normalize(&new.data.get_domain().unwrap_or_default());
        self.check_mutation_allowed(&new_owner, rtype, std::slice::from_ref(&new))?;

        if old_owner == new_owner && *old == new.data && old.get_ttl() == new.data.get_ttl() {
            return Ok(());
        }

        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        let removed = self
            .store
            .delete_record(old)
            .ok_or_else(|| ZoneError::InvalidInput("record to update not found".to_string()))?;
        let (_, displaced) = self.store.add(new.clone());

        let mut deleted = vec![removed];
        deleted.extend(displaced);
        let mut added = vec![new];
        if signed {
            self.update_dnssec_records(&old_owner, rtype, now, &mut deleted, &mut added)?;
            if new_owner != old_owner {
                self.update_dnssec_records(&new_owner, rtype, now, &mut deleted, &mut added)?;
            }
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    // ---- signing surface --------------------------------------------------

    /// Sign the zone: generate the initial key pair, publish DNSKEYs,
    /// build the denial chain and produce every signature.
    pub fn sign_zone(
        &self,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        dnskey_ttl: u32,
        denial_kind: DenialKind,
    ) -> ZoneResult<()> {
        self.sign_zone_at(algorithm, key_size, dnskey_ttl, denial_kind, Utc::now())
    }

    pub fn sign_zone_at(
        &self,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        dnskey_ttl: u32,
        denial_kind: DenialKind,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        if self.dnssec_status().is_signed() {
            return Err(ZoneError::AlreadySigned(self.name.clone()));
        }
        // records that cannot exist under DNSSEC are rejected up front
        // instead of failing mid-sign
        for (key, slot) in self.store.entries() {
            if matches!(key.rtype, QueryType::Aname | QueryType::App) {
                return Err(ZoneError::UnsupportedInSignedZone(format!(
                    "{} holds an {} record",
                    key.owner, key.rtype
                )));
            }
            if slot.iter().any(|r| r.info.disabled) {
                return Err(ZoneError::UnsupportedInSignedZone(format!(
                    "{} holds a disabled record",
                    key.owner
                )));
            }
        }
        let params = match &denial_kind {
            DenialKind::Nsec => None,
            DenialKind::Nsec3 { iterations, salt } => {
                Some(Nsec3Params::new(*iterations, salt.clone())?)
            }
        };

        let soa = self.soa()?;
        let _guard = self.dnssec_update.lock();

        let ksk_tag = self
            .keys
            .generate_and_insert(KeyType::Ksk, algorithm, key_size, 0, now)?;
        let zsk_tag = self
            .keys
            .generate_and_insert(KeyType::Zsk, algorithm, key_size, 0, now)?;
        self.keys.update(ksk_tag, |k| k.set_state(KeyState::Published, now))?;
        // a freshly signed zone has no resolver population holding an
        // older DNSKEY RRset, so the first ZSK skips the publication wait
        self.keys.update(zsk_tag, |k| k.set_state(KeyState::Ready, now))?;

        let mut added: Vec<ZoneRecord> = Vec::new();
        let mut deleted: Vec<ZoneRecord> = Vec::new();

        let dnskeys: Vec<ZoneRecord> = self
            .keys
            .all()
            .iter()
            .map(|k| ZoneRecord::new(k.dnskey_record(&self.name, dnskey_ttl)))
            .collect();
        self.store.set(&self.name, QueryType::Dnskey, dnskeys.clone());
        added.extend(dnskeys);

        if let Some(params) = &params {
            let param_record = ZoneRecord::new(params.to_record(&self.name, soa.minimum));
            self.store
                .set(&self.name, QueryType::Nsec3Param, vec![param_record.clone()]);
            added.push(param_record);
            *self.status.write() = DnssecStatus::SignedWithNsec3;
        } else {
            *self.status.write() = DnssecStatus::SignedWithNsec;
        }

        // denial chain over the full zone, then a signing sweep across
        // every RRset
        self.apply_denial_delta(&self.plan_denial(&soa)?, &soa, now, &mut deleted, &mut added)?;
        self.refresh_signatures(&soa, now, &mut deleted, &mut added)?;

        self.commit_and_increment_serial(deleted, added, now)?;
        self.flush_to_host();
        self.notify();
        log::info!(
            "zone {} signed with {:?} (KSK {}, ZSK {})",
            self.name,
            algorithm,
            ksk_tag,
            zsk_tag
        );
        Ok(())
    }

    /// Remove DNSSEC from the zone: every key, signature and denial
    /// record goes, in one commit.
    pub fn unsign_zone(&self) -> ZoneResult<()> {
        self.unsign_zone_at(Utc::now())
    }

    pub fn unsign_zone_at(&self, now: DateTime<Utc>) -> ZoneResult<()> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        let _guard = self.dnssec_update.lock();

        let mut deleted = Vec::new();
        for (key, _) in self.store.entries() {
            if key.rtype.is_dnssec_internal() {
                deleted.extend(self.store.delete_type(&key.owner, key.rtype));
            }
        }
        for tag in self.keys.tags() {
            self.keys.remove(tag);
        }
        *self.status.write() = DnssecStatus::Unsigned;

        self.commit_and_increment_serial(deleted, Vec::new(), now)?;
        self.flush_to_host();
        self.notify();
        log::info!("zone {} unsigned", self.name);
        Ok(())
    }

    /// Switch a signed zone to NSEC3 denial, or re-parameterise an
    /// NSEC3 zone. Applying the current parameters is a no-op.
    pub fn convert_to_nsec3(&self, iterations: u16, salt: Vec<u8>) -> ZoneResult<()> {
        self.convert_to_nsec3_at(iterations, salt, Utc::now())
    }

    pub fn convert_to_nsec3_at(
        &self,
        iterations: u16,
        salt: Vec<u8>,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        let params = Nsec3Params::new(iterations, salt)?;
        let soa = self.soa()?;
        let _guard = self.dnssec_update.lock();

        if let Some(slot) = self.store.get(&self.name, QueryType::Nsec3Param) {
            if Nsec3Params::from_record(&slot[0].data).as_ref() == Some(&params) {
                return Ok(());
            }
        }

        let mut deleted = Vec::new();
        let mut added = Vec::new();

        // tear down whichever chain is standing; the plan below builds
        // the replacement before anything is observable outside the lock
        for (key, _) in self.store.entries() {
            if matches!(key.rtype, QueryType::Nsec | QueryType::Nsec3) {
                let (old, old_sigs) =
                    self.store.swap_with_sigs(&key.owner, key.rtype, Vec::new(), Vec::new());
                deleted.extend(old);
                deleted.extend(old_sigs);
            }
        }

        let param_record = ZoneRecord::new(params.to_record(&self.name, soa.minimum));
        deleted.extend(self.store.set(
            &self.name,
            QueryType::Nsec3Param,
            vec![param_record.clone()],
        ));
        added.push(param_record);
        *self.status.write() = DnssecStatus::SignedWithNsec3;

        let delta = denial::plan_nsec3_chain(&self.store, &self.name, &params, soa.minimum);
        self.apply_denial_delta(&delta, &soa, now, &mut deleted, &mut added)?;
        self.refresh_signatures(&soa, now, &mut deleted, &mut added)?;

        self.commit_and_increment_serial(deleted, added, now)?;
        self.flush_to_host();
        self.notify();
        Ok(())
    }

    /// Re-parameterise the NSEC3 chain in place. The zone must already
    /// use NSEC3 denial.
    pub fn update_nsec3_params(&self, iterations: u16, salt: Vec<u8>) -> ZoneResult<()> {
        if self.dnssec_status() != DnssecStatus::SignedWithNsec3 {
            return Err(ZoneError::NotSigned(format!(
                "{} does not use NSEC3 denial",
                self.name
            )));
        }
        self.convert_to_nsec3(iterations, salt)
    }

    /// Switch a signed zone back to NSEC denial.
    pub fn convert_to_nsec(&self) -> ZoneResult<()> {
        self.convert_to_nsec_at(Utc::now())
    }

    pub fn convert_to_nsec_at(&self, now: DateTime<Utc>) -> ZoneResult<()> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        if self.dnssec_status() == DnssecStatus::SignedWithNsec {
            return Ok(());
        }
        let soa = self.soa()?;
        let _guard = self.dnssec_update.lock();

        let mut deleted = Vec::new();
        let mut added = Vec::new();

        for (key, _) in self.store.entries() {
            if key.rtype == QueryType::Nsec3 {
                let (old, old_sigs) =
                    self.store.swap_with_sigs(&key.owner, key.rtype, Vec::new(), Vec::new());
                deleted.extend(old);
                deleted.extend(old_sigs);
            }
        }
        let (old_params, old_param_sigs) =
            self.store
                .swap_with_sigs(&self.name, QueryType::Nsec3Param, Vec::new(), Vec::new());
        deleted.extend(old_params);
        deleted.extend(old_param_sigs);
        *self.status.write() = DnssecStatus::SignedWithNsec;

        let delta = denial::plan_nsec_chain(&self.store, &self.name, soa.minimum);
        self.apply_denial_delta(&delta, &soa, now, &mut deleted, &mut added)?;
        self.refresh_signatures(&soa, now, &mut deleted, &mut added)?;

        self.commit_and_increment_serial(deleted, added, now)?;
        self.flush_to_host();
        self.notify();
        Ok(())
    }

    // ---- key surface ------------------------------------------------------

    /// Generate a key; it sits in Generated until published.
    pub fn generate_key(
        &self,
        key_type: KeyType,
        algorithm: DnssecAlgorithm,
        key_size: u32,
        rollover_days: u16,
    ) -> ZoneResult<u16> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        self.keys
            .generate_and_insert(key_type, algorithm, key_size, rollover_days, Utc::now())
    }

    /// Publish one generated key into the DNSKEY RRset.
    pub fn publish_key(&self, tag: u16) -> ZoneResult<()> {
        self.publish_key_at(tag, Utc::now())
    }

    pub fn publish_key_at(&self, tag: u16, now: DateTime<Utc>) -> ZoneResult<()> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        let key = self.keys.get(tag).ok_or(ZoneError::KeyNotFound(tag))?;
        if key.state != KeyState::Generated {
            return Err(ZoneError::DuplicatePublish(tag));
        }
        let soa = self.soa()?;
        let _guard = self.dnssec_update.lock();
        self.keys.update(tag, |k| k.set_state(KeyState::Published, now))?;

        let mut deleted = Vec::new();
        let mut added = Vec::new();
        self.sync_dnskey_rrset(&soa, now, &mut deleted, &mut added)?;
        self.commit_and_increment_serial(deleted, added, now)?;
        self.flush_to_host();
        self.notify();
        Ok(())
    }

    /// Publish every generated key.
    pub fn publish_generated_keys(&self) -> ZoneResult<()> {
        let generated: Vec<u16> = self
            .keys
            .all()
            .iter()
            .filter(|k| k.state == KeyState::Generated)
            .map(|k| k.key_tag)
            .collect();
        for tag in generated {
            self.publish_key(tag)?;
        }
        Ok(())
    }

    /// Roll a key over: a successor of the same kind, algorithm and
    /// size is generated and published, and the old key is flagged
    /// retiring. Returns the successor's tag.
    pub fn rollover_key(&self, tag: u16) -> ZoneResult<u16> {
        self.rollover_key_at(tag, Utc::now())
    }

    pub fn rollover_key_at(&self, tag: u16, now: DateTime<Utc>) -> ZoneResult<u16> {
        if !self.dnssec_status().is_signed() {
            return Err(ZoneError::NotSigned(self.name.clone()));
        }
        let old = self.keys.get(tag).ok_or(ZoneError::KeyNotFound(tag))?;
        if !matches!(old.state, KeyState::Active | KeyState::Ready) {
            return Err(ZoneError::InvalidInput(format!(
                "key {} is {:?}; only a working key can roll over",
                tag, old.state
            )));
        }
        let soa = self.soa()?;
        let _guard = self.dnssec_update.lock();

        let successor = self.keys.generate_and_insert(
            old.key_type,
            old.algorithm,
            old.key_size,
            old.rollover_days,
            now,
        )?;
        self.keys
            .update(successor, |k| k.set_state(KeyState::Published, now))?;
        self.keys.update(tag, |k| {
            k.is_retiring = true;
            Ok(())
        })?;

        let mut deleted = Vec::new();
        let mut added = Vec::new();
        self.sync_dnskey_rrset(&soa, now, &mut deleted, &mut added)?;
        self.commit_and_increment_serial(deleted, added, now)?;
        self.flush_to_host();
        self.notify();
        log::info!(
            "zone {}: key {} rolling over to successor {}",
            self.name,
            tag,
            successor
        );
        Ok(successor)
    }

    /// Manually retire a key, subject to the coverage safety check.
    pub fn retire_key(&self, tag: u16) -> ZoneResult<()> {
        self.retire_key_at(tag, Utc::now())
    }

    pub fn retire_key_at(&self, tag: u16, now: DateTime<Utc>) -> ZoneResult<()> {
        let key = self.keys.get(tag).ok_or(ZoneError::KeyNotFound(tag))?;
        if !key_lifecycle::can_retire(&key, &self.keys.all(), true) {
            return Err(ZoneError::NoSuccessorKey(format!(
                "retiring key {} would leave the zone without coverage",
                tag
            )));
        }
        self.keys.update(tag, |k| {
            k.is_retiring = true;
            k.set_state(KeyState::Retired, now)
        })?;
        log::info!("zone {}: key {} retired by operator", self.name, tag);
        Ok(())
    }

    /// Delete a key that was never published.
    pub fn delete_key(&self, tag: u16) -> ZoneResult<()> {
        let key = self.keys.get(tag).ok_or(ZoneError::KeyNotFound(tag))?;
        if key.state != KeyState::Generated {
            return Err(ZoneError::InvalidInput(format!(
                "key {} is {:?}; published keys retire through the lifecycle",
                tag, key.state
            )));
        }
        self.keys.remove(tag);
        Ok(())
    }

    pub fn update_rollover_days(&self, tag: u16, rollover_days: u16) -> ZoneResult<()> {
        self.keys.update(tag, |k| {
            k.rollover_days = rollover_days;
            Ok(())
        })
    }

    // ---- maintenance ------------------------------------------------------

    /// One maintenance tick: advance the key lifecycle, refresh stale
    /// signatures, and flush + notify when anything changed. Returns
    /// whether the zone changed.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> ZoneResult<bool> {
        if !self.dnssec_status().is_signed() {
            return Ok(false);
        }
        let soa = self.soa()?;
        let timings = self.timings(&soa);

        // the work lists are computed under the key store lock alone;
        // probes and zone updates happen with it released
        let plan = key_lifecycle::plan_tick(&self.keys.all(), &timings, now);
        let mut zone_changed = false;

        zone_changed |= self.apply_tick_plan(&plan, &soa, now)?;

        // periodic signature refresh, on its own cadence
        let validity = signer::validity_period(soa.expire);
        let refresh_due = {
            let mut last = self.last_resign_check.lock();
            let interval = chrono::Duration::seconds(signer::refresh_interval(validity) as i64);
            match *last {
                Some(previous) if now < previous + interval => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if refresh_due {
            let _guard = self.dnssec_update.lock();
            let mut deleted = Vec::new();
            let mut added = Vec::new();
            self.refresh_signatures(&soa, now, &mut deleted, &mut added)?;
            if !deleted.is_empty() || !added.is_empty() {
                self.commit_and_increment_serial(deleted, added, now)?;
                zone_changed = true;
            }
        }

        if zone_changed {
            self.flush_to_host();
            self.notify();
        }
        Ok(zone_changed)
    }

    /// Apply one tick plan's work lists, in order. Split out so tests
    /// can drive the state machine with an injected clock.
    fn apply_tick_plan(
        &self,
        plan: &TickPlan,
        soa: &SoaFields,
        now: DateTime<Utc>,
    ) -> ZoneResult<bool> {
        if plan.is_empty() {
            return Ok(false);
        }
        let mut dnskey_set_changed = false;
        let mut signing_set_changed = false;

        for tag in &plan.to_ready {
            self.keys.update(*tag, |k| k.set_state(KeyState::Ready, now))?;
            signing_set_changed = true;
            log::info!("zone {}: key {} is ready", self.name, tag);
        }
        for tag in &plan.to_activate {
            self.keys.update(*tag, |k| k.set_state(KeyState::Active, now))?;
            signing_set_changed = true;
            log::info!("zone {}: key {} is active", self.name, tag);
        }
        for tag in &plan.to_probe {
            let key = match self.keys.get(*tag) {
                Some(key) => key,
                None => continue,
            };
            if key_lifecycle::probe_parent_ds(self.host.resolver.as_ref(), &self.name, &key) {
                let parent_delay =
                    key_lifecycle::parent_propagation_delay(self.host.resolver.as_ref(), &self.name);
                self.keys.update(*tag, |k| k.set_state(KeyState::Active, now))?;
                signing_set_changed = true;
                log::info!(
                    "zone {}: parent DS observed for KSK {}; active (parent-side propagation up to {}s)",
                    self.name,
                    tag,
                    parent_delay.num_seconds()
                );
            }
        }
        for tag in &plan.to_retire {
            self.keys.update(*tag, |k| k.set_state(KeyState::Retired, now))?;
            signing_set_changed = true;
            log::info!("zone {}: key {} retired", self.name, tag);
        }
        for tag in &plan.to_revoke {
            self.keys.update(*tag, |k| k.set_state(KeyState::Revoked, now))?;
            dnskey_set_changed = true;
            log::info!("zone {}: KSK {} revoked", self.name, tag);
        }
        for tag in &plan.to_unpublish {
            if self.keys.remove(*tag).is_some() {
                dnskey_set_changed = true;
                signing_set_changed = true;
                log::info!("zone {}: key {} removed", self.name, tag);
            }
        }
        // rollovers commit on their own, so the tick reports a change
        // even when the reconciliation below finds nothing further
        let rolled_over = !plan.to_rollover.is_empty();
        for tag in &plan.to_rollover {
            self.rollover_key_at(*tag, now)?;
        }

        if !dnskey_set_changed && !signing_set_changed {
            return Ok(rolled_over);
        }

        let _guard = self.dnssec_update.lock();
        let mut deleted = Vec::new();
        let mut added = Vec::new();
        self.sync_dnskey_rrset(soa, now, &mut deleted, &mut added)?;
        // purge signatures from keys that no longer exist, then bring
        // every RRset's signature set in line with the eligible keys
        for tag in &plan.to_unpublish {
            deleted.extend(self.store.remove_sigs_by_key_tag(*tag));
        }
        self.refresh_signatures(soa, now, &mut deleted, &mut added)?;
        self.apply_denial_delta(&self.plan_denial(soa)?, soa, now, &mut deleted, &mut added)?;

        if deleted.is_empty() && added.is_empty() {
            return Ok(rolled_over);
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        Ok(true)
    }

    // ---- internals --------------------------------------------------------

    fn timings(&self, soa: &SoaFields) -> ZoneTimings {
        let dnskey_ttl = self
            .store
            .get(&self.name, QueryType::Dnskey)
            .map(|slot| slot[0].data.get_ttl())
            .unwrap_or(DEFAULT_DNSKEY_TTL);
        ZoneTimings {
            dnskey_ttl,
            propagation_delay: soa.refresh + soa.retry,
            max_record_ttl: self.store.max_record_ttl(),
            max_rrsig_ttl: self.store.max_rrsig_ttl(),
        }
    }

    /// Restrictions shared by SetRecords, AddRecord and UpdateRecord.
    fn check_mutation_allowed(
        &self,
        owner: &str,
        rtype: QueryType,
        records: &[ZoneRecord],
    ) -> ZoneResult<()> {
        names::validate(owner).map_err(ZoneError::InvalidInput)?;
        if !names::is_in_zone(owner, &self.name) {
            return Err(ZoneError::InvalidInput(format!(
                "{} is outside zone {}",
                owner, self.name
            )));
        }
        if rtype.is_dnssec_internal() {
            return Err(ZoneError::InvalidInput(format!(
                "{} records are maintained by the zone itself",
                rtype
            )));
        }
        if rtype == QueryType::Fwd {
            return Err(ZoneError::InvalidInput(
                "FWD records are not supported by a primary zone".to_string(),
            ));
        }
        if owner == self.name && matches!(rtype, QueryType::Cname | QueryType::Ds) {
            return Err(ZoneError::InvalidApexOperation(format!(
                "{} cannot exist at the zone apex",
                rtype
            )));
        }
        let signed = self.dnssec_status().is_signed();
        if signed && matches!(rtype, QueryType::Aname | QueryType::App) {
            return Err(ZoneError::UnsupportedInSignedZone(format!(
                "{} records cannot exist in a signed zone",
                rtype
            )));
        }
        if signed && records.iter().any(|r| r.info.disabled) {
            return Err(ZoneError::UnsupportedInSignedZone(
                "disabled records cannot exist in a signed zone".to_string(),
            ));
        }
        Ok(())
    }

    fn check_deletion_allowed(&self, rtype: QueryType) -> ZoneResult<()> {
        if rtype == QueryType::Soa {
            return Err(ZoneError::InvalidApexOperation(
                "the SOA cannot be deleted".to_string(),
            ));
        }
        if rtype.is_dnssec_internal() {
            return Err(ZoneError::InvalidInput(format!(
                "{} records are maintained by the zone itself",
                rtype
            )));
        }
        Ok(())
    }

    /// SetRecords for the SOA: field validation, then a commit that
    /// adopts the supplied serial. A MINIMUM change refreshes the
    /// denial chain, whose records inherit it as their TTL.
    fn set_soa(&self, records: Vec<ZoneRecord>, now: DateTime<Utc>) -> ZoneResult<()> {
        if records.len() != 1 {
            return Err(ZoneError::InvalidInput("a zone has exactly one SOA".to_string()));
        }
        let owner = names::normalize(&records[0].data.get_domain().unwrap_or_default());
        if owner != self.name {
            return Err(ZoneError::InvalidApexOperation(
                "the SOA lives at the zone apex".to_string(),
            ));
        }
        let new_soa =
            SoaFields::from_record(&records[0].data).ok_or_else(|| {
                ZoneError::InvalidInput("SOA slot requires an SOA record".to_string())
            })?;
        if new_soa.ttl > new_soa.expire {
            return Err(ZoneError::OutOfRange {
                parameter: "ttl",
                detail: format!("{} exceeds the SOA expire {}", new_soa.ttl, new_soa.expire),
            });
        }
        if !(new_soa.retry <= new_soa.refresh && new_soa.refresh <= new_soa.expire) {
            return Err(ZoneError::OutOfRange {
                parameter: "soa timers",
                detail: "RETRY <= REFRESH <= EXPIRE must hold".to_string(),
            });
        }

        let old_soa = self.soa()?;
        if soa_fields_equal(&old_soa, &new_soa) {
            return Ok(());
        }

        let signed = self.dnssec_status().is_signed();
        let minimum_changed = old_soa.minimum != new_soa.minimum;
        let _guard = if signed { Some(self.dnssec_update.lock()) } else { None };

        let mut deleted = Vec::new();
        let mut added = records;
        if signed && minimum_changed {
            // the denial chain inherits MINIMUM as its TTL
            let delta = match self.dnssec_status() {
                DnssecStatus::SignedWithNsec => {
                    denial::plan_nsec_chain(&self.store, &self.name, new_soa.minimum)
                }
                DnssecStatus::SignedWithNsec3 => {
                    let params = self.nsec3_params()?;
                    denial::plan_nsec3_chain(&self.store, &self.name, &params, new_soa.minimum)
                }
                DnssecStatus::Unsigned => DenialDelta::default(),
            };
            self.apply_denial_delta(&delta, &new_soa, now, &mut deleted, &mut added)?;
        }
        self.commit_and_increment_serial(deleted, added, now)?;
        self.notify();
        Ok(())
    }

    fn nsec3_params(&self) -> ZoneResult<Nsec3Params> {
        let slot = self
            .store
            .get(&self.name, QueryType::Nsec3Param)
            .ok_or_else(|| ZoneError::NotSigned(format!("{} has no NSEC3PARAM", self.name)))?;
        Nsec3Params::from_record(&slot[0].data)
            .ok_or_else(|| ZoneError::InvalidInput("NSEC3PARAM slot corrupt".to_string()))
    }

    fn plan_denial(&self, soa: &SoaFields) -> ZoneResult<DenialDelta> {
        Ok(match self.dnssec_status() {
            DnssecStatus::SignedWithNsec => {
                denial::plan_nsec_chain(&self.store, &self.name, soa.minimum)
            }
            DnssecStatus::SignedWithNsec3 => {
                let params = self.nsec3_params()?;
                denial::plan_nsec3_chain(&self.store, &self.name, &params, soa.minimum)
            }
            DnssecStatus::Unsigned => DenialDelta::default(),
        })
    }

    /// Apply a planned denial chain change: removals first, then signed
    /// insertions, all recorded into the commit delta. Caller holds the
    /// DNSSEC update lock.
    fn apply_denial_delta(
        &self,
        delta: &DenialDelta,
        soa: &SoaFields,
        now: DateTime<Utc>,
        deleted: &mut Vec<ZoneRecord>,
        added: &mut Vec<ZoneRecord>,
    ) -> ZoneResult<()> {
        let denial_type = match self.dnssec_status() {
            DnssecStatus::SignedWithNsec => QueryType::Nsec,
            DnssecStatus::SignedWithNsec3 => QueryType::Nsec3,
            DnssecStatus::Unsigned => return Ok(()),
        };
        let validity = signer::validity_period(soa.expire);
        let keys = self.keys.all();

        for owner in &delta.remove {
            let (old, old_sigs) =
                self.store.swap_with_sigs(owner, denial_type, Vec::new(), Vec::new());
            deleted.extend(old);
            deleted.extend(old_sigs);
        }
        for record in &delta.set {
            let owner = names::normalize(&record.get_domain().unwrap_or_default());
            let rrset = vec![ZoneRecord::new(record.clone())];
            let sigs = signer::sign_rrset(
                &self.name,
                &owner,
                denial_type,
                &rrset,
                &keys,
                validity,
                now,
            )?;
            let (old, old_sigs) =
                self.store
                    .swap_with_sigs(&owner, denial_type, rrset.clone(), sigs.clone());
            deleted.extend(old);
            deleted.extend(old_sigs);
            added.extend(rrset);
            added.extend(sigs);
        }
        Ok(())
    }

    /// Re-sign the RRset at (owner, type) and repair the denial chain
    /// around the owner. Runs on every mutation of a signed zone.
    /// Caller holds the DNSSEC update lock.
    fn update_dnssec_records(
        &self,
        owner: &str,
        rtype: QueryType,
        now: DateTime<Utc>,
        deleted: &mut Vec<ZoneRecord>,
        added: &mut Vec<ZoneRecord>,
    ) -> ZoneResult<()> {
        let soa = self.soa()?;
        let validity = signer::validity_period(soa.expire);
        let keys = self.keys.all();

        match self.store.get(owner, rtype) {
            Some(slot) => {
                let rrset: Vec<ZoneRecord> = slot.as_ref().clone();
                let sigs =
                    signer::sign_rrset(&self.name, owner, rtype, &rrset, &keys, validity, now)?;
                let (_, old_sigs) =
                    self.store.swap_with_sigs(owner, rtype, rrset, sigs.clone());
                deleted.extend(old_sigs);
                added.extend(sigs);
            }
            None => {
                // RRset deleted outright; its signatures follow
                let (_, old_sigs) =
                    self.store.swap_with_sigs(owner, rtype, Vec::new(), Vec::new());
                deleted.extend(old_sigs);
            }
        }

        self.apply_denial_delta(&self.plan_denial(&soa)?, &soa, now, deleted, added)
    }

    /// Bring the apex DNSKEY RRset in line with the key store. Caller
    /// holds the DNSSEC update lock.
    fn sync_dnskey_rrset(
        &self,
        soa: &SoaFields,
        now: DateTime<Utc>,
        deleted: &mut Vec<ZoneRecord>,
        added: &mut Vec<ZoneRecord>,
    ) -> ZoneResult<()> {
        let dnskey_ttl = self
            .store
            .get(&self.name, QueryType::Dnskey)
            .map(|slot| slot[0].data.get_ttl())
            .unwrap_or(DEFAULT_DNSKEY_TTL);

        let desired: Vec<ZoneRecord> = self
            .keys
            .all()
            .iter()
            .filter(|k| !matches!(k.state, KeyState::Generated | KeyState::Dead))
            .map(|k| ZoneRecord::new(k.dnskey_record(&self.name, dnskey_ttl)))
            .collect();

        let current = self
            .store
            .get(&self.name, QueryType::Dnskey)
            .map(|slot| slot.as_ref().clone())
            .unwrap_or_default();
        if rrsets_equal(&current, &desired) {
            return Ok(());
        }

        let validity = signer::validity_period(soa.expire);
        let sigs = signer::sign_rrset(
            &self.name,
            &self.name,
            QueryType::Dnskey,
            &desired,
            &self.keys.all(),
            validity,
            now,
        )?;
        let (old, old_sigs) =
            self.store
                .swap_with_sigs(&self.name, QueryType::Dnskey, desired.clone(), sigs.clone());

        for record in old {
            if !desired.contains(&record) {
                deleted.push(record);
            }
        }
        for record in desired {
            if !current.contains(&record) {
                added.push(record);
            }
        }
        deleted.extend(old_sigs);
        added.extend(sigs);
        Ok(())
    }

    /// Make every RRset's signature set match the eligible key set, and
    /// regenerate signatures nearing expiry. Caller holds the DNSSEC
    /// update lock.
    fn refresh_signatures(
        &self,
        soa: &SoaFields,
        now: DateTime<Utc>,
        deleted: &mut Vec<ZoneRecord>,
        added: &mut Vec<ZoneRecord>,
    ) -> ZoneResult<()> {
        let validity = signer::validity_period(soa.expire);
        let threshold = signer::refresh_interval(validity);
        let keys = self.keys.all();

        for (key, slot) in self.store.entries() {
            // the SOA is re-signed by every commit; signatures never
            // carry signatures of their own
            if matches!(key.rtype, QueryType::Rrsig | QueryType::Soa) {
                continue;
            }
            let rrset: Vec<ZoneRecord> = slot.as_ref().clone();

            let mut desired_tags: Vec<u16> = keys
                .iter()
                .filter(|k| signer::key_signs_type(k, key.rtype))
                .map(|k| k.key_tag)
                .collect();
            desired_tags.sort_unstable();
            // referral NS RRsets stay unsigned
            if key.rtype == QueryType::Ns && key.owner != self.name {
                desired_tags.clear();
            }

            let existing: Vec<ZoneRecord> = self
                .store
                .get(&key.owner, QueryType::Rrsig)
                .map(|sigs| {
                    sigs.iter()
                        .filter(|r| {
                            matches!(r.data, DnsRecord::Rrsig { type_covered, .. }
                                if type_covered == key.rtype.to_num())
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let mut existing_tags: Vec<u16> = existing
                .iter()
                .filter_map(|r| match r.data {
                    DnsRecord::Rrsig { key_tag, .. } => Some(key_tag),
                    _ => None,
                })
                .collect();
            existing_tags.sort_unstable();

            let stale = existing
                .iter()
                .any(|r| signer::needs_refresh(&r.data, now, threshold));
            if existing_tags == desired_tags && !stale {
                continue;
            }

            if desired_tags.is_empty() {
                if !existing.is_empty() {
                    let (_, old_sigs) =
                        self.store
                            .swap_with_sigs(&key.owner, key.rtype, rrset, Vec::new());
                    deleted.extend(old_sigs);
                }
                continue;
            }

            let sigs = signer::sign_rrset(
                &self.name,
                &key.owner,
                key.rtype,
                &rrset,
                &keys,
                validity,
                now,
            )?;
            let (_, old_sigs) =
                self.store
                    .swap_with_sigs(&key.owner, key.rtype, rrset, sigs.clone());
            deleted.extend(old_sigs);
            added.extend(sigs);
        }
        Ok(())
    }

    /// The single commit path: adopt the next serial, replace and (when
    /// signed) re-sign the apex SOA, journal the delta in order, and
    /// bound the history. Internal zones skip all of it.
    fn commit_and_increment_serial(
        &self,
        deleted: Vec<ZoneRecord>,
        mut added: Vec<ZoneRecord>,
        now: DateTime<Utc>,
    ) -> ZoneResult<()> {
        if self.internal {
            // internal zones still take supplied SOA contents, but
            // neither bump serials nor journal
            if let Some(idx) = added.iter().position(|r| r.data.get_querytype() == QueryType::Soa) {
                let soa = added.remove(idx);
                self.store.set(&self.name, QueryType::Soa, vec![soa]);
            }
            return Ok(());
        }

        let mut journal = self.journal.lock();

        let old_slot = self
            .store
            .get(&self.name, QueryType::Soa)
            .ok_or_else(|| ZoneError::InvalidInput(format!("zone {} has no SOA", self.name)))?;
        let mut old_soa = old_slot[0].clone();
        let old_fields = SoaFields::from_record(&old_soa.data)
            .ok_or_else(|| ZoneError::InvalidInput("apex SOA slot corrupt".to_string()))?;

        // a supplied SOA contributes its fields and its serial floor
        let supplied = added
            .iter()
            .position(|r| r.data.get_querytype() == QueryType::Soa)
            .map(|idx| added.remove(idx));
        let supplied_fields = supplied
            .as_ref()
            .and_then(|r| SoaFields::from_record(&r.data));

        let mut new_fields = supplied_fields.unwrap_or_else(|| old_fields.clone());
        new_fields.serial =
            journal::commit_serial(old_fields.serial, supplied.as_ref().map(|_| new_fields.serial));

        let new_soa = ZoneRecord::new(new_fields.to_record(&self.name));

        let signed = self.dnssec_status().is_signed();
        let mut deleted = deleted;
        if signed {
            let validity = signer::validity_period(new_fields.expire);
            let sigs = signer::sign_rrset(
                &self.name,
                &self.name,
                QueryType::Soa,
                std::slice::from_ref(&new_soa),
                &self.keys.all(),
                validity,
                now,
            )?;
            let (_, old_sigs) = self.store.swap_with_sigs(
                &self.name,
                QueryType::Soa,
                vec![new_soa.clone()],
                sigs.clone(),
            );
            deleted.extend(old_sigs);
            added.extend(sigs);
        } else {
            self.store
                .set(&self.name, QueryType::Soa, vec![new_soa.clone()]);
        }

        old_soa.info.deleted_on = Some(now);
        journal.append(old_soa, new_soa, &deleted, &added, now);
        journal.truncate(new_fields.expire, now);
        Ok(())
    }

    fn notify(&self) {
        if !self.internal {
            self.host.notifier.trigger_notify();
        }
    }

    fn flush_to_host(&self) {
        if let Err(e) = self.host.persistence.save_zone_file(&self.name) {
            log::warn!("zone {}: persistence flush failed: {}", self.name, e);
        }
    }
}

fn rrsets_equal(a: &[ZoneRecord], b: &[ZoneRecord]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|ra| {
        b.iter()
            .any(|rb| ra.data == rb.data && ra.data.get_ttl() == rb.data.get_ttl())
    })
}

fn soa_fields_equal(a: &SoaFields, b: &SoaFields) -> bool {
    a.m_name == b.m_name
        && a.r_name == b.r_name
        && a.serial == b.serial
        && a.refresh == b.refresh
        && a.retry == b.retry
        && a.expire == b.expire
        && a.minimum == b.minimum
        && a.ttl == b.ttl
}

#[cfg(test)]
mod zone_test;
