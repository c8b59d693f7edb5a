//! the zone change journal and SOA serial discipline
//!
//! Every committed mutation is recorded as an ordered run of entries:
//! the outgoing SOA, the deleted records (with glue for NS), the deleted
//! signatures, the incoming SOA, the added records (with glue), the new
//! signatures. Commits are kept in serial order, which is exactly the
//! shape an IXFR response needs, and history is bounded by the zone's
//! SOA EXPIRE with whole commits evicted oldest-first.

use chrono::{DateTime, Duration, Utc};
use serde_derive::{Deserialize, Serialize};

use crate::dns::protocol::{DnsRecord, QueryType, ZoneRecord};

/// Wrapping serial increment: the successor of 2^32-1 is 1, never 0.
pub fn increment_serial(old: u32) -> u32 {
    if old == u32::MAX {
        1
    } else {
        old + 1
    }
}

/// The serial a commit adopts: max(old+1, supplied), where the
/// increment wraps 2^32-1 to 1. An operator can seed any serial ahead
/// of the current one, including 2^32-1 to exercise the wrap.
pub fn commit_serial(old: u32, supplied: Option<u32>) -> u32 {
    let bumped = increment_serial(old);
    match supplied {
        Some(s) if s > bumped => s,
        _ => bumped,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntryKind {
    OldSoa,
    Deleted,
    NewSoa,
    Added,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub kind: JournalEntryKind,
    pub record: ZoneRecord,
}

/// One committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalCommit {
    pub committed_on: DateTime<Utc>,
    /// The serial the zone adopted with this commit
    pub serial: u32,
    pub entries: Vec<JournalEntry>,
}

impl JournalCommit {
    /// The serial the zone had before this commit, read from the
    /// old-SOA entry.
    pub fn old_serial(&self) -> Option<u32> {
        self.entries.iter().find_map(|e| match (&e.kind, &e.record.data) {
            (JournalEntryKind::OldSoa, DnsRecord::Soa { serial, .. }) => Some(*serial),
            _ => None,
        })
    }
}

/// A deleted/added run extracted for one IXFR difference section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneChange {
    /// The serial the consumer is upgrading from
    pub serial: u32,
    pub deleted: Vec<DnsRecord>,
    pub added: Vec<DnsRecord>,
}

/// The journal of a single primary zone.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ZoneJournal {
    commits: Vec<JournalCommit>,
}

impl ZoneJournal {
    pub fn new() -> ZoneJournal {
        ZoneJournal {
            commits: Vec::new(),
        }
    }

    pub fn from_commits(commits: Vec<JournalCommit>) -> ZoneJournal {
        ZoneJournal { commits }
    }

    pub fn commits(&self) -> &[JournalCommit] {
        &self.commits
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Append one commit. Disabled records are not journaled; NS records
    /// carry their glue along, immediately after the NS entry itself.
    /// RRSIGs always trail the plain records of their half of the
    /// commit.
    pub fn append(
        &mut self,
        old_soa: ZoneRecord,
        new_soa: ZoneRecord,
        deleted: &[ZoneRecord],
        added: &[ZoneRecord],
        now: DateTime<Utc>,
    ) {
        let serial = match &new_soa.data {
            DnsRecord::Soa { serial, .. } => *serial,
            _ => return,
        };

        let mut entries = Vec::with_capacity(deleted.len() + added.len() + 2);
        entries.push(JournalEntry {
            kind: JournalEntryKind::OldSoa,
            record: old_soa,
        });
        push_half(&mut entries, JournalEntryKind::Deleted, deleted);
        entries.push(JournalEntry {
            kind: JournalEntryKind::NewSoa,
            record: new_soa,
        });
        push_half(&mut entries, JournalEntryKind::Added, added);

        self.commits.push(JournalCommit {
            committed_on: now,
            serial,
            entries,
        });
    }

    /// Evict history so the covered duration never exceeds the zone's
    /// SOA EXPIRE. Whole commits only; oldest first.
    pub fn truncate(&mut self, expire_secs: u32, now: DateTime<Utc>) {
        let horizon = now - Duration::seconds(expire_secs as i64);
        self.commits.retain(|c| c.committed_on >= horizon);
    }

    /// The difference runs a consumer at `serial` needs to converge.
    /// Returns None when the serial predates the retained history, in
    /// which case the consumer must fall back to a full transfer.
    pub fn changes_since(&self, serial: u32) -> Option<Vec<ZoneChange>> {
        let start = self
            .commits
            .iter()
            .position(|c| c.old_serial() == Some(serial))?;
        Some(
            self.commits[start..]
                .iter()
                .map(|commit| {
                    let mut change = ZoneChange {
                        serial: commit.old_serial().unwrap_or(0),
                        deleted: Vec::new(),
                        added: Vec::new(),
                    };
                    for entry in &commit.entries {
                        match entry.kind {
                            JournalEntryKind::OldSoa | JournalEntryKind::Deleted => {
                                change.deleted.push(entry.record.data.clone())
                            }
                            JournalEntryKind::NewSoa | JournalEntryKind::Added => {
                                change.added.push(entry.record.data.clone())
                            }
                        }
                    }
                    change
                })
                .collect(),
        )
    }
}

/// Append one half of a commit: plain records first (each NS followed by
/// its glue), signatures last.
fn push_half(entries: &mut Vec<JournalEntry>, kind: JournalEntryKind, records: &[ZoneRecord]) {
    for record in records {
        if record.info.disabled || record.data.get_querytype() == QueryType::Rrsig {
            continue;
        }
        entries.push(JournalEntry {
            kind,
            record: record.clone(),
        });
        if record.data.get_querytype() == QueryType::Ns {
            for glue in &record.info.glue {
                entries.push(JournalEntry {
                    kind,
                    record: ZoneRecord::new(glue.clone()),
                });
            }
        }
    }
    for record in records {
        if record.info.disabled || record.data.get_querytype() != QueryType::Rrsig {
            continue;
        }
        entries.push(JournalEntry {
            kind,
            record: record.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::{RecordInfo, TransientTtl};
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn now() -> DateTime<Utc> {
        Utc.ymd(2024, 6, 1).and_hms(12, 0, 0)
    }

    fn soa(serial: u32) -> ZoneRecord {
        ZoneRecord::new(DnsRecord::Soa {
            domain: "example".to_string(),
            m_name: "ns1.example".to_string(),
            r_name: "admin.example".to_string(),
            serial,
            refresh: 900,
            retry: 300,
            expire: 604_800,
            minimum: 900,
            ttl: TransientTtl(900),
        })
    }

    fn a_record(domain: &str, last_octet: u8) -> ZoneRecord {
        ZoneRecord::new(DnsRecord::A {
            domain: domain.to_string(),
            addr: Ipv4Addr::new(192, 0, 2, last_octet),
            ttl: TransientTtl(300),
        })
    }

    #[test]
    fn test_increment_serial_wraps_to_one() {
        assert_eq!(increment_serial(1), 2);
        assert_eq!(increment_serial(u32::MAX), 1);
    }

    #[test]
    fn test_commit_serial() {
        assert_eq!(commit_serial(1, None), 2);
        assert_eq!(commit_serial(1, Some(100)), 100);
        assert_eq!(commit_serial(100, Some(5)), 101);
        assert_eq!(commit_serial(u32::MAX, None), 1);
        // seeding the maximum serial readies the wrap
        assert_eq!(commit_serial(5, Some(u32::MAX)), u32::MAX);
    }

    #[test]
    fn test_entry_order() {
        let mut journal = ZoneJournal::new();
        let mut ns = ZoneRecord::with_info(
            DnsRecord::Ns {
                domain: "example".to_string(),
                host: "ns1.child.example".to_string(),
                ttl: TransientTtl(3600),
            },
            RecordInfo::default(),
        );
        ns.info.glue.push(a_record("ns1.child.example", 53).data);
        let sig = ZoneRecord::new(DnsRecord::Rrsig {
            domain: "example".to_string(),
            type_covered: 2,
            algorithm: 13,
            labels: 1,
            original_ttl: 3600,
            expiration: 2000,
            inception: 1000,
            key_tag: 1,
            signer_name: "example".to_string(),
            signature: vec![0],
            ttl: TransientTtl(3600),
        });

        journal.append(soa(1), soa(2), &[], &[ns, sig], now());
        let entries = &journal.commits()[0].entries;
        let kinds: Vec<JournalEntryKind> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                JournalEntryKind::OldSoa,
                JournalEntryKind::NewSoa,
                JournalEntryKind::Added, // NS
                JournalEntryKind::Added, // glue A
                JournalEntryKind::Added, // RRSIG trails
            ]
        );
        assert_eq!(entries[2].record.data.get_querytype(), QueryType::Ns);
        assert_eq!(entries[3].record.data.get_querytype(), QueryType::A);
        assert_eq!(entries[4].record.data.get_querytype(), QueryType::Rrsig);
    }

    #[test]
    fn test_disabled_records_not_journaled() {
        let mut journal = ZoneJournal::new();
        let mut disabled = a_record("web.example", 1);
        disabled.info.disabled = true;
        journal.append(soa(1), soa(2), &[], &[disabled], now());
        assert_eq!(journal.commits()[0].entries.len(), 2); // just the SOAs
    }

    #[test]
    fn test_truncate_whole_commits() {
        let mut journal = ZoneJournal::new();
        let old_time = now() - Duration::seconds(700_000);
        journal.append(soa(1), soa(2), &[], &[a_record("a.example", 1)], old_time);
        journal.append(soa(2), soa(3), &[], &[a_record("b.example", 2)], now());

        journal.truncate(604_800, now());
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.commits()[0].serial, 3);
    }

    #[test]
    fn test_changes_since() {
        let mut journal = ZoneJournal::new();
        journal.append(soa(1), soa(2), &[], &[a_record("a.example", 1)], now());
        journal.append(
            soa(2),
            soa(3),
            &[a_record("a.example", 1)],
            &[a_record("a.example", 9)],
            now(),
        );

        let changes = journal.changes_since(2).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].serial, 2);
        assert_eq!(changes[0].deleted.len(), 2); // old SOA + old A
        assert_eq!(changes[0].added.len(), 2); // new SOA + new A

        let from_start = journal.changes_since(1).unwrap();
        assert_eq!(from_start.len(), 2);

        assert!(journal.changes_since(77).is_none());
    }
}
