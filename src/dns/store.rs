//! the per-owner RRset store backing a primary zone
//!
//! RRsets are published as `Arc` slots inside a tree keyed by
//! (owner, type). Readers clone the `Arc` under a short read lock and
//! never observe a partially updated RRset; writers replace whole slots.
//! Owner comparison is case-insensitive with lowercase as the canonical
//! form, and the tree is ordered canonically so the denial chain can walk
//! sibling names in DNS order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::names;
use crate::dns::protocol::{DnsRecord, QueryType, ZoneRecord};

/// Key of one RRset slot. Ordering is canonical DNS order over the
/// owner, then the numeric record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub owner: String,
    pub rtype: QueryType,
}

impl RecordKey {
    pub fn new(owner: &str, rtype: QueryType) -> RecordKey {
        RecordKey {
            owner: names::normalize(owner),
            rtype,
        }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &RecordKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &RecordKey) -> Ordering {
        names::canonical_cmp(&self.owner, &other.owner)
            .then_with(|| self.rtype.to_num().cmp(&other.rtype.to_num()))
    }
}

/// An RRset as handed to readers: immutable and atomically replaced.
pub type RrsetSlot = Arc<Vec<ZoneRecord>>;

#[derive(Default)]
pub struct RecordStore {
    entries: RwLock<BTreeMap<RecordKey, RrsetSlot>>,
}

impl RecordStore {
    pub fn new() -> RecordStore {
        RecordStore {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Fetch the RRset at (owner, type), if any.
    pub fn get(&self, owner: &str, rtype: QueryType) -> Option<RrsetSlot> {
        let entries = self.entries.read();
        entries.get(&RecordKey::new(owner, rtype)).cloned()
    }

    /// A snapshot of every slot, in canonical order.
    pub fn entries(&self) -> Vec<(RecordKey, RrsetSlot)> {
        let entries = self.entries.read();
        entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Replace the RRset at (owner, type), returning the displaced
    /// records for journaling.
    pub fn set(&self, owner: &str, rtype: QueryType, records: Vec<ZoneRecord>) -> Vec<ZoneRecord> {
        let key = RecordKey::new(owner, rtype);
        let mut entries = self.entries.write();
        let old = if records.is_empty() {
            entries.remove(&key)
        } else {
            entries.insert(key, Arc::new(records))
        };
        old.map(|slot| slot.as_ref().clone()).unwrap_or_default()
    }

    /// Replace the RRset at (owner, type) only if the caller's snapshot
    /// is still current. A losing race surfaces as `TransientConflict`
    /// so the caller can re-read and retry.
    pub fn try_set(
        &self,
        owner: &str,
        rtype: QueryType,
        expected: Option<&RrsetSlot>,
        records: Vec<ZoneRecord>,
    ) -> ZoneResult<Vec<ZoneRecord>> {
        let key = RecordKey::new(owner, rtype);
        let mut entries = self.entries.write();
        let current = entries.get(&key);
        let unchanged = match (current, expected) {
            (None, None) => true,
            (Some(cur), Some(exp)) => Arc::ptr_eq(cur, exp),
            _ => false,
        };
        if !unchanged {
            return Err(ZoneError::TransientConflict(format!(
                "RRset {}/{} changed underneath the update",
                key.owner, key.rtype
            )));
        }
        let old = if records.is_empty() {
            entries.remove(&key)
        } else {
            entries.insert(key, Arc::new(records))
        };
        Ok(old.map(|slot| slot.as_ref().clone()).unwrap_or_default())
    }

    /// Merge one record into its RRset. Returns (added, displaced):
    /// `added` is false when the record was already present with the same
    /// TTL, and `displaced` holds the pre-merge records whenever the
    /// incoming TTL overrode the RRset's TTL.
    pub fn add(&self, record: ZoneRecord) -> (bool, Vec<ZoneRecord>) {
        let owner = names::normalize(&record.data.get_domain().unwrap_or_default());
        let rtype = record.data.get_querytype();
        let new_ttl = record.data.get_ttl();
        let key = RecordKey::new(&owner, rtype);

        let mut entries = self.entries.write();
        let existing = entries.get(&key).map(|slot| slot.as_ref().clone());
        match existing {
            None => {
                entries.insert(key, Arc::new(vec![record]));
                (true, Vec::new())
            }
            Some(current) => {
                let ttl_matches = current
                    .first()
                    .map(|r| r.data.get_ttl() == new_ttl)
                    .unwrap_or(true);
                let already_present = current.iter().any(|r| r.data == record.data);

                if ttl_matches && already_present {
                    return (false, Vec::new());
                }

                let mut displaced = Vec::new();
                let mut merged = Vec::with_capacity(current.len() + 1);
                for mut existing_record in current {
                    if existing_record.data == record.data {
                        // replaced below by the incoming copy
                        displaced.push(existing_record);
                        continue;
                    }
                    if !ttl_matches {
                        displaced.push(existing_record.clone());
                        existing_record.data.set_ttl(new_ttl);
                    }
                    merged.push(existing_record);
                }
                merged.push(record);
                entries.insert(key, Arc::new(merged));
                (true, displaced)
            }
        }
    }

    /// Remove the whole RRset at (owner, type).
    pub fn delete_type(&self, owner: &str, rtype: QueryType) -> Vec<ZoneRecord> {
        let mut entries = self.entries.write();
        entries
            .remove(&RecordKey::new(owner, rtype))
            .map(|slot| slot.as_ref().clone())
            .unwrap_or_default()
    }

    /// Remove a single record, matched by identity (name, type, RDATA).
    pub fn delete_record(&self, record: &DnsRecord) -> Option<ZoneRecord> {
        let owner = names::normalize(&record.get_domain().unwrap_or_default());
        let key = RecordKey::new(&owner, record.get_querytype());
        let mut entries = self.entries.write();
        let current = entries.get(&key)?.as_ref().clone();
        let (removed, kept): (Vec<ZoneRecord>, Vec<ZoneRecord>) =
            current.into_iter().partition(|r| r.data == *record);
        if removed.is_empty() {
            return None;
        }
        if kept.is_empty() {
            entries.remove(&key);
        } else {
            entries.insert(key, Arc::new(kept));
        }
        removed.into_iter().next()
    }

    /// Atomically publish an RRset together with its covering RRSIGs:
    /// the (owner, type) slot and the matching signatures inside the
    /// owner's RRSIG slot are swapped under one lock so a reader never
    /// sees a record set paired with stale signatures. Pass an empty
    /// `records` to remove the RRset. Returns the displaced records and
    /// the displaced signatures.
    pub fn swap_with_sigs(
        &self,
        owner: &str,
        rtype: QueryType,
        records: Vec<ZoneRecord>,
        sigs: Vec<ZoneRecord>,
    ) -> (Vec<ZoneRecord>, Vec<ZoneRecord>) {
        let key = RecordKey::new(owner, rtype);
        let sig_key = RecordKey::new(owner, QueryType::Rrsig);
        let covered = rtype.to_num();

        let mut entries = self.entries.write();

        let old_records = if records.is_empty() {
            entries.remove(&key)
        } else {
            entries.insert(key, Arc::new(records))
        }
        .map(|slot| slot.as_ref().clone())
        .unwrap_or_default();

        let current_sigs = entries
            .get(&sig_key)
            .map(|slot| slot.as_ref().clone())
            .unwrap_or_default();
        let (old_sigs, mut kept): (Vec<ZoneRecord>, Vec<ZoneRecord>) =
            current_sigs.into_iter().partition(|r| {
                matches!(r.data, DnsRecord::Rrsig { type_covered, .. } if type_covered == covered)
            });
        kept.extend(sigs);
        if kept.is_empty() {
            entries.remove(&sig_key);
        } else {
            kept.sort();
            entries.insert(sig_key, Arc::new(kept));
        }

        (old_records, old_sigs)
    }

    /// Remove every RRSIG produced by the given key tag, across all
    /// owners. Used when a dead key is unpublished.
    pub fn remove_sigs_by_key_tag(&self, tag: u16) -> Vec<ZoneRecord> {
        let mut entries = self.entries.write();
        let sig_keys: Vec<RecordKey> = entries
            .keys()
            .filter(|k| k.rtype == QueryType::Rrsig)
            .cloned()
            .collect();
        let mut removed = Vec::new();
        for key in sig_keys {
            let current = entries.get(&key).unwrap().as_ref().clone();
            let (purged, kept): (Vec<ZoneRecord>, Vec<ZoneRecord>) =
                current.into_iter().partition(|r| {
                    matches!(r.data, DnsRecord::Rrsig { key_tag, .. } if key_tag == tag)
                });
            if purged.is_empty() {
                continue;
            }
            if kept.is_empty() {
                entries.remove(&key);
            } else {
                entries.insert(key, Arc::new(kept));
            }
            removed.extend(purged);
        }
        removed
    }

    /// Distinct owner names in canonical order.
    pub fn owners(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut out: Vec<String> = Vec::new();
        for key in entries.keys() {
            if out.last().map(|o| o != &key.owner).unwrap_or(true) {
                out.push(key.owner.clone());
            }
        }
        out
    }

    pub fn owner_exists(&self, owner: &str) -> bool {
        let owner = names::normalize(owner);
        let entries = self.entries.read();
        entries.keys().any(|k| k.owner == owner)
    }

    /// The canonically next owner after `owner`, if any.
    pub fn next_owner(&self, owner: &str) -> Option<String> {
        let owner = names::normalize(owner);
        self.owners()
            .into_iter()
            .find(|o| names::canonical_cmp(o, &owner) == Ordering::Greater)
    }

    /// The canonically previous owner before `owner`, if any.
    pub fn previous_owner(&self, owner: &str) -> Option<String> {
        let owner = names::normalize(owner);
        self.owners()
            .into_iter()
            .rev()
            .find(|o| names::canonical_cmp(o, &owner) == Ordering::Less)
    }

    /// The record type numbers present at an owner, sorted.
    pub fn types_at(&self, owner: &str) -> Vec<u16> {
        let owner = names::normalize(owner);
        let entries = self.entries.read();
        let mut out: Vec<u16> = entries
            .keys()
            .filter(|k| k.owner == owner)
            .map(|k| k.rtype.to_num())
            .collect();
        out.sort_unstable();
        out
    }

    /// The largest TTL across all records (RRSIGs excluded, since their
    /// TTL mirrors the RRset they cover).
    pub fn max_record_ttl(&self) -> u32 {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|(k, _)| k.rtype != QueryType::Rrsig)
            .flat_map(|(_, slot)| slot.iter().map(|r| r.data.get_ttl()))
            .max()
            .unwrap_or(0)
    }

    /// The largest TTL across the zone's RRSIG records.
    pub fn max_rrsig_ttl(&self) -> u32 {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|(k, _)| k.rtype == QueryType::Rrsig)
            .flat_map(|(_, slot)| slot.iter().map(|r| r.data.get_ttl()))
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
