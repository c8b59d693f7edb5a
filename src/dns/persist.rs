//! versioned binary persistence for a primary zone
//!
//! The persisted form is a tagged little-endian blob: a version byte,
//! then explicit field-by-field encodings. Strings are length-prefixed
//! UTF-8, integers little-endian, IP addresses length + octets,
//! timestamps as 64-bit milliseconds since the Unix epoch (UTC). The
//! blob covers the records with their info blocks, the keys with their
//! private material and lifecycle state, and the journal, so that
//! save/load round-trips the zone exactly.

use chrono::{DateTime, TimeZone, Utc};

use crate::dns::context::ZoneHost;
use crate::dns::errors::{ZoneError, ZoneResult};
use crate::dns::journal::{JournalCommit, JournalEntry, JournalEntryKind, ZoneJournal};
use crate::dns::keys::{DnssecAlgorithm, DnssecPrivateKey, KeyState, KeyStore, KeyType};
use crate::dns::protocol::{DnsRecord, QueryType, RecordInfo, TransientTtl, ZoneRecord};
use crate::dns::store::RecordStore;
use crate::dns::zone::{DnssecStatus, PrimaryZone, ZonePolicy};

/// Current zone file format version
pub const FORMAT_VERSION: u8 = 1;

/// Serialize a zone into its persisted form.
pub fn save_zone(zone: &PrimaryZone) -> ZoneResult<Vec<u8>> {
    let mut w = ZoneWriter::new();
    w.write_u8(FORMAT_VERSION);
    w.write_str(zone.name());
    w.write_u8(zone.is_internal() as u8);
    w.write_u8(match zone.dnssec_status() {
        DnssecStatus::Unsigned => 0,
        DnssecStatus::SignedWithNsec => 1,
        DnssecStatus::SignedWithNsec3 => 2,
    });
    let policy = zone.policy();
    w.write_str(&policy.zone_transfer);
    w.write_str(&policy.notify);
    w.write_str(&policy.update);

    let entries = zone.record_store().entries();
    w.write_u32(entries.len() as u32);
    for (key, slot) in &entries {
        w.write_str(&key.owner);
        w.write_u16(key.rtype.to_num());
        w.write_u32(slot.len() as u32);
        for record in slot.iter() {
            write_zone_record(&mut w, record);
        }
    }

    let keys = zone.dnssec_keys();
    w.write_u32(keys.len() as u32);
    for key in &keys {
        write_key(&mut w, key)?;
    }

    let commits = zone.journal_commits();
    w.write_u32(commits.len() as u32);
    for commit in &commits {
        w.write_i64(commit.committed_on.timestamp_millis());
        w.write_u32(commit.serial);
        w.write_u32(commit.entries.len() as u32);
        for entry in &commit.entries {
            w.write_u8(match entry.kind {
                JournalEntryKind::OldSoa => 0,
                JournalEntryKind::Deleted => 1,
                JournalEntryKind::NewSoa => 2,
                JournalEntryKind::Added => 3,
            });
            write_zone_record(&mut w, &entry.record);
        }
    }

    Ok(w.into_bytes())
}

/// Rebuild a zone from its persisted form.
pub fn load_zone(data: &[u8], host: ZoneHost) -> ZoneResult<PrimaryZone> {
    let mut r = ZoneReader::new(data);
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(ZoneError::UnsupportedFormat(version));
    }

    let name = r.read_str()?;
    let internal = r.read_u8()? != 0;
    let status = match r.read_u8()? {
        0 => DnssecStatus::Unsigned,
        1 => DnssecStatus::SignedWithNsec,
        2 => DnssecStatus::SignedWithNsec3,
        other => {
            return Err(ZoneError::InvalidInput(format!(
                "unknown dnssec status tag {}",
                other
            )))
        }
    };
    let policy = ZonePolicy {
        zone_transfer: r.read_str()?,
        notify: r.read_str()?,
        update: r.read_str()?,
    };

    let store = RecordStore::new();
    let slot_count = r.read_u32()?;
    for _ in 0..slot_count {
        let owner = r.read_str()?;
        let rtype = QueryType::from_num(r.read_u16()?);
        let record_count = r.read_u32()?;
        let mut records = Vec::with_capacity(record_count as usize);
        for _ in 0..record_count {
            records.push(read_zone_record(&mut r)?);
        }
        store.set(&owner, rtype, records);
    }

    let keys = KeyStore::new();
    let key_count = r.read_u32()?;
    for _ in 0..key_count {
        keys.insert(read_key(&mut r)?)?;
    }

    let commit_count = r.read_u32()?;
    let mut commits = Vec::with_capacity(commit_count as usize);
    for _ in 0..commit_count {
        let committed_on = read_timestamp(&mut r)?;
        let serial = r.read_u32()?;
        let entry_count = r.read_u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let kind = match r.read_u8()? {
                0 => JournalEntryKind::OldSoa,
                1 => JournalEntryKind::Deleted,
                2 => JournalEntryKind::NewSoa,
                3 => JournalEntryKind::Added,
                other => {
                    return Err(ZoneError::InvalidInput(format!(
                        "unknown journal entry tag {}",
                        other
                    )))
                }
            };
            entries.push(JournalEntry {
                kind,
                record: read_zone_record(&mut r)?,
            });
        }
        commits.push(JournalCommit {
            committed_on,
            serial,
            entries,
        });
    }

    Ok(PrimaryZone::from_parts(
        name,
        internal,
        status,
        policy,
        store,
        keys,
        ZoneJournal::from_commits(commits),
        host,
    ))
}

fn write_key(w: &mut ZoneWriter, key: &DnssecPrivateKey) -> ZoneResult<()> {
    w.write_u8(match key.key_type {
        KeyType::Zsk => 0,
        KeyType::Ksk => 1,
    });
    w.write_u8(key.algorithm.to_num());
    w.write_u32(key.key_size);
    w.write_u8(key.state.rank());
    w.write_i64(key.state_changed_on.timestamp_millis());
    w.write_u16(key.rollover_days);
    w.write_u8(key.is_retiring as u8);
    w.write_bytes(&key.public_key);
    w.write_bytes(&key.private_key_der()?);
    Ok(())
}

fn read_key(r: &mut ZoneReader) -> ZoneResult<DnssecPrivateKey> {
    let key_type = match r.read_u8()? {
        0 => KeyType::Zsk,
        1 => KeyType::Ksk,
        other => {
            return Err(ZoneError::InvalidInput(format!(
                "unknown key type tag {}",
                other
            )))
        }
    };
    let algorithm = DnssecAlgorithm::from_num(r.read_u8()?)?;
    let key_size = r.read_u32()?;
    let state = match r.read_u8()? {
        0 => KeyState::Generated,
        1 => KeyState::Published,
        2 => KeyState::Ready,
        3 => KeyState::Active,
        4 => KeyState::Retired,
        5 => KeyState::Revoked,
        6 => KeyState::Dead,
        other => {
            return Err(ZoneError::InvalidInput(format!(
                "unknown key state tag {}",
                other
            )))
        }
    };
    let state_changed_on = read_timestamp(r)?;
    let rollover_days = r.read_u16()?;
    let is_retiring = r.read_u8()? != 0;
    let public_key = r.read_bytes()?;
    let private_der = r.read_bytes()?;
    DnssecPrivateKey::from_parts(
        key_type,
        algorithm,
        key_size,
        public_key,
        &private_der,
        state,
        state_changed_on,
        rollover_days,
        is_retiring,
    )
}

fn write_zone_record(w: &mut ZoneWriter, record: &ZoneRecord) {
    write_record(w, &record.data);

    let info = &record.info;
    let mut flags = 0u8;
    if info.disabled {
        flags |= 0x01;
    }
    if info.deleted_on.is_some() {
        flags |= 0x02;
    }
    if info.comments.is_some() {
        flags |= 0x04;
    }
    w.write_u8(flags);
    if let Some(deleted_on) = info.deleted_on {
        w.write_i64(deleted_on.timestamp_millis());
    }
    if let Some(comments) = &info.comments {
        w.write_str(comments);
    }
    w.write_u16(info.glue.len() as u16);
    for glue in &info.glue {
        write_record(w, glue);
    }
}

fn read_zone_record(r: &mut ZoneReader) -> ZoneResult<ZoneRecord> {
    let data = read_record(r)?;

    let flags = r.read_u8()?;
    let mut info = RecordInfo::default();
    info.disabled = flags & 0x01 != 0;
    if flags & 0x02 != 0 {
        info.deleted_on = Some(read_timestamp(r)?);
    }
    if flags & 0x04 != 0 {
        info.comments = Some(r.read_str()?);
    }
    let glue_count = r.read_u16()?;
    for _ in 0..glue_count {
        info.glue.push(read_record(r)?);
    }
    Ok(ZoneRecord::with_info(data, info))
}

fn write_record(w: &mut ZoneWriter, record: &DnsRecord) {
    w.write_u16(record.get_querytype().to_num());
    w.write_str(&record.get_domain().unwrap_or_default());
    w.write_u32(record.get_ttl());
    match record {
        DnsRecord::Unknown { rdata, .. } => {
            w.write_bytes(rdata);
        }
        DnsRecord::A { addr, .. } => {
            w.write_bytes(&addr.octets());
        }
        DnsRecord::Ns { host, .. } | DnsRecord::Cname { host, .. } => {
            w.write_str(host);
        }
        DnsRecord::Soa {
            m_name,
            r_name,
            serial,
            refresh,
            retry,
            expire,
            minimum,
            ..
        } => {
            w.write_str(m_name);
            w.write_str(r_name);
            w.write_u32(*serial);
            w.write_u32(*refresh);
            w.write_u32(*retry);
            w.write_u32(*expire);
            w.write_u32(*minimum);
        }
        DnsRecord::Mx { priority, host, .. } => {
            w.write_u16(*priority);
            w.write_str(host);
        }
        DnsRecord::Txt { data, .. } => {
            w.write_str(data);
        }
        DnsRecord::Aaaa { addr, .. } => {
            w.write_bytes(&addr.octets());
        }
        DnsRecord::Srv {
            priority,
            weight,
            port,
            host,
            ..
        } => {
            w.write_u16(*priority);
            w.write_u16(*weight);
            w.write_u16(*port);
            w.write_str(host);
        }
        DnsRecord::Ds {
            key_tag,
            algorithm,
            digest_type,
            digest,
            ..
        } => {
            w.write_u16(*key_tag);
            w.write_u8(*algorithm);
            w.write_u8(*digest_type);
            w.write_bytes(digest);
        }
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
        } => {
            w.write_u16(*type_covered);
            w.write_u8(*algorithm);
            w.write_u8(*labels);
            w.write_u32(*original_ttl);
            w.write_u32(*expiration);
            w.write_u32(*inception);
            w.write_u16(*key_tag);
            w.write_str(signer_name);
            w.write_bytes(signature);
        }
        DnsRecord::Nsec {
            next_domain, types, ..
        } => {
            w.write_str(next_domain);
            w.write_u16(types.len() as u16);
            for t in types {
                w.write_u16(*t);
            }
        }
        DnsRecord::Dnskey {
            flags,
            protocol,
            algorithm,
            public_key,
            ..
        } => {
            w.write_u16(*flags);
            w.write_u8(*protocol);
            w.write_u8(*algorithm);
            w.write_bytes(public_key);
        }
        DnsRecord::Nsec3 {
            hash_algorithm,
            flags,
            iterations,
            salt,
            next_hashed,
            types,
            ..
        } => {
            w.write_u8(*hash_algorithm);
            w.write_u8(*flags);
            w.write_u16(*iterations);
            w.write_bytes(salt);
            w.write_bytes(next_hashed);
            w.write_u16(types.len() as u16);
            for t in types {
                w.write_u16(*t);
            }
        }
        DnsRecord::Nsec3Param {
            hash_algorithm,
            flags,
            iterations,
            salt,
            ..
        } => {
            w.write_u8(*hash_algorithm);
            w.write_u8(*flags);
            w.write_u16(*iterations);
            w.write_bytes(salt);
        }
        DnsRecord::Aname { target, .. } => {
            w.write_str(target);
        }
        DnsRecord::Fwd {
            protocol,
            forwarder,
            ..
        } => {
            w.write_u8(*protocol);
            w.write_str(forwarder);
        }
        DnsRecord::App {
            class_path, data, ..
        } => {
            w.write_str(class_path);
            w.write_str(data);
        }
    }
}

fn read_record(r: &mut ZoneReader) -> ZoneResult<DnsRecord> {
    let qtype_num = r.read_u16()?;
    let domain = r.read_str()?;
    let ttl = TransientTtl(r.read_u32()?);
    let record = match QueryType::from_num(qtype_num) {
        QueryType::Unknown(qtype) => DnsRecord::Unknown {
            domain,
            qtype,
            rdata: r.read_bytes()?,
            ttl,
        },
        QueryType::A => {
            let octets = r.read_bytes()?;
            if octets.len() != 4 {
                return Err(ZoneError::InvalidInput("malformed A address".to_string()));
            }
            DnsRecord::A {
                domain,
                addr: std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]),
                ttl,
            }
        }
        QueryType::Ns => DnsRecord::Ns {
            domain,
            host: r.read_str()?,
            ttl,
        },
        QueryType::Cname => DnsRecord::Cname {
            domain,
            host: r.read_str()?,
            ttl,
        },
        QueryType::Soa => DnsRecord::Soa {
            domain,
            m_name: r.read_str()?,
            r_name: r.read_str()?,
            serial: r.read_u32()?,
            refresh: r.read_u32()?,
            retry: r.read_u32()?,
            expire: r.read_u32()?,
            minimum: r.read_u32()?,
            ttl,
        },
        QueryType::Mx => DnsRecord::Mx {
            domain,
            priority: r.read_u16()?,
            host: r.read_str()?,
            ttl,
        },
        QueryType::Txt => DnsRecord::Txt {
            domain,
            data: r.read_str()?,
            ttl,
        },
        QueryType::Aaaa => {
            let octets = r.read_bytes()?;
            if octets.len() != 16 {
                return Err(ZoneError::InvalidInput("malformed AAAA address".to_string()));
            }
            let mut segments = [0u16; 8];
            for (idx, segment) in segments.iter_mut().enumerate() {
                *segment = u16::from_be_bytes([octets[idx * 2], octets[idx * 2 + 1]]);
            }
            DnsRecord::Aaaa {
                domain,
                addr: std::net::Ipv6Addr::new(
                    segments[0], segments[1], segments[2], segments[3], segments[4], segments[5],
                    segments[6], segments[7],
                ),
                ttl,
            }
        }
        QueryType::Srv => DnsRecord::Srv {
            domain,
            priority: r.read_u16()?,
            weight: r.read_u16()?,
            port: r.read_u16()?,
            host: r.read_str()?,
            ttl,
        },
        QueryType::Ds => DnsRecord::Ds {
            domain,
            key_tag: r.read_u16()?,
            algorithm: r.read_u8()?,
            digest_type: r.read_u8()?,
            digest: r.read_bytes()?,
            ttl,
        },
        QueryType::Rrsig => DnsRecord::Rrsig {
            domain,
            type_covered: r.read_u16()?,
            algorithm: r.read_u8()?,
            labels: r.read_u8()?,
            original_ttl: r.read_u32()?,
            expiration: r.read_u32()?,
            inception: r.read_u32()?,
            key_tag: r.read_u16()?,
            signer_name: r.read_str()?,
            signature: r.read_bytes()?,
            ttl,
        },
        QueryType::Nsec => {
            let next_domain = r.read_str()?;
            let count = r.read_u16()?;
            let mut types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                types.push(r.read_u16()?);
            }
            DnsRecord::Nsec {
                domain,
                next_domain,
                types,
                ttl,
            }
        }
        QueryType::Dnskey => DnsRecord::Dnskey {
            domain,
            flags: r.read_u16()?,
            protocol: r.read_u8()?,
            algorithm: r.read_u8()?,
            public_key: r.read_bytes()?,
            ttl,
        },
        QueryType::Nsec3 => {
            let hash_algorithm = r.read_u8()?;
            let flags = r.read_u8()?;
            let iterations = r.read_u16()?;
            let salt = r.read_bytes()?;
            let next_hashed = r.read_bytes()?;
            let count = r.read_u16()?;
            let mut types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                types.push(r.read_u16()?);
            }
            DnsRecord::Nsec3 {
                domain,
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_hashed,
                types,
                ttl,
            }
        }
        QueryType::Nsec3Param => DnsRecord::Nsec3Param {
            domain,
            hash_algorithm: r.read_u8()?,
            flags: r.read_u8()?,
            iterations: r.read_u16()?,
            salt: r.read_bytes()?,
            ttl,
        },
        QueryType::Aname => DnsRecord::Aname {
            domain,
            target: r.read_str()?,
            ttl,
        },
        QueryType::Fwd => DnsRecord::Fwd {
            domain,
            protocol: r.read_u8()?,
            forwarder: r.read_str()?,
            ttl,
        },
        QueryType::App => DnsRecord::App {
            domain,
            class_path: r.read_str()?,
            data: r.read_str()?,
            ttl,
        },
        QueryType::Ixfr | QueryType::Axfr => {
            return Err(ZoneError::InvalidInput(format!(
                "meta query type {} cannot be persisted",
                qtype_num
            )))
        }
    };
    Ok(record)
}

fn read_timestamp(r: &mut ZoneReader) -> ZoneResult<DateTime<Utc>> {
    let millis = r.read_i64()?;
    Ok(Utc.timestamp_millis(millis))
}

struct ZoneWriter {
    buf: Vec<u8>,
}

impl ZoneWriter {
    fn new() -> ZoneWriter {
        ZoneWriter { buf: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    fn write_u16(&mut self, val: u16) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    fn write_u32(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    fn write_i64(&mut self, val: i64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    fn write_str(&mut self, val: &str) {
        self.write_u16(val.len() as u16);
        self.buf.extend_from_slice(val.as_bytes());
    }

    fn write_bytes(&mut self, val: &[u8]) {
        self.write_u32(val.len() as u32);
        self.buf.extend_from_slice(val);
    }
}

struct ZoneReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ZoneReader<'a> {
    fn new(data: &'a [u8]) -> ZoneReader<'a> {
        ZoneReader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ZoneResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(ZoneError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated zone file",
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> ZoneResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> ZoneResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> ZoneResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> ZoneResult<i64> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(arr))
    }

    fn read_str(&mut self) -> ZoneResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ZoneError::InvalidInput("persisted string is not UTF-8".to_string()))
    }

    fn read_bytes(&mut self) -> ZoneResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}
