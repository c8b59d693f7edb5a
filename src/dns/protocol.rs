//! record and RDATA definitions for the authoritative store

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

use crate::dns::buffer::{BufferError, PacketBuffer, VectorPacketBuffer};

type Result<T> = std::result::Result<T, BufferError>;

/// The DNS class used throughout the store. Only IN is supported.
pub const CLASS_IN: u16 = 1;

/// `QueryType` represents the record type of an RRset
///
/// The specific type Unknown retains the numeric id of an unrecognized
/// type. An integer can be converted to a querytype using the `from_num`
/// function, and back to an integer using the `to_num` method.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryType {
    Unknown(u16),
    A,          // 1
    Ns,         // 2
    Cname,      // 5
    Soa,        // 6
    Mx,         // 15
    Txt,        // 16
    Aaaa,       // 28
    Srv,        // 33
    Ds,         // 43
    Rrsig,      // 46
    Nsec,       // 47
    Dnskey,     // 48
    Nsec3,      // 50
    Nsec3Param, // 51
    Ixfr,       // 251
    Axfr,       // 252
    Aname,      // 65280 (private use)
    Fwd,        // 65281 (private use)
    App,        // 65282 (private use)
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::Unknown(x) => x,
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Cname => 5,
            QueryType::Soa => 6,
            QueryType::Mx => 15,
            QueryType::Txt => 16,
            QueryType::Aaaa => 28,
            QueryType::Srv => 33,
            QueryType::Ds => 43,
            QueryType::Rrsig => 46,
            QueryType::Nsec => 47,
            QueryType::Dnskey => 48,
            QueryType::Nsec3 => 50,
            QueryType::Nsec3Param => 51,
            QueryType::Ixfr => 251,
            QueryType::Axfr => 252,
            QueryType::Aname => 65280,
            QueryType::Fwd => 65281,
            QueryType::App => 65282,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::Ns,
            5 => QueryType::Cname,
            6 => QueryType::Soa,
            15 => QueryType::Mx,
            16 => QueryType::Txt,
            28 => QueryType::Aaaa,
            33 => QueryType::Srv,
            43 => QueryType::Ds,
            46 => QueryType::Rrsig,
            47 => QueryType::Nsec,
            48 => QueryType::Dnskey,
            50 => QueryType::Nsec3,
            51 => QueryType::Nsec3Param,
            251 => QueryType::Ixfr,
            252 => QueryType::Axfr,
            65280 => QueryType::Aname,
            65281 => QueryType::Fwd,
            65282 => QueryType::App,
            _ => QueryType::Unknown(num),
        }
    }

    /// Types the zone maintains itself; callers can neither set nor
    /// delete them through the facade.
    pub fn is_dnssec_internal(&self) -> bool {
        matches!(
            self,
            QueryType::Dnskey
                | QueryType::Rrsig
                | QueryType::Nsec
                | QueryType::Nsec3
                | QueryType::Nsec3Param
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Unknown(x) => write!(f, "TYPE{}", x),
            other => write!(f, "{}", format!("{:?}", other).to_uppercase()),
        }
    }
}

/// A TTL that takes no part in record identity: two records differing
/// only in TTL are the same record, which is what lets an incoming TTL
/// override an RRset in place.
#[derive(Copy, Clone, Debug, Eq, Serialize, Deserialize)]
pub struct TransientTtl(pub u32);

impl PartialEq<TransientTtl> for TransientTtl {
    fn eq(&self, _: &TransientTtl) -> bool {
        true
    }
}

impl PartialOrd<TransientTtl> for TransientTtl {
    fn partial_cmp(&self, other: &TransientTtl) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransientTtl {
    fn cmp(&self, _: &TransientTtl) -> Ordering {
        Ordering::Equal
    }
}

impl Hash for TransientTtl {
    fn hash<H>(&self, _: &mut H)
    where
        H: Hasher,
    {
        // purposely left empty
    }
}

/// `DnsRecord` is the primary representation of a DNS record
///
/// Identity is (name, type, RDATA); the TTL is excluded via
/// `TransientTtl` and the class is fixed to IN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DnsRecord {
    Unknown {
        domain: String,
        qtype: u16,
        rdata: Vec<u8>,
        ttl: TransientTtl,
    }, // 0
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: TransientTtl,
    }, // 1
    Ns {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 2
    Cname {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 5
    Soa {
        domain: String,
        m_name: String,
        r_name: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
        ttl: TransientTtl,
    }, // 6
    Mx {
        domain: String,
        priority: u16,
        host: String,
        ttl: TransientTtl,
    }, // 15
    Txt {
        domain: String,
        data: String,
        ttl: TransientTtl,
    }, // 16
    Aaaa {
        domain: String,
        addr: Ipv6Addr,
        ttl: TransientTtl,
    }, // 28
    Srv {
        domain: String,
        priority: u16,
        weight: u16,
        port: u16,
        host: String,
        ttl: TransientTtl,
    }, // 33
    Ds {
        domain: String,
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Vec<u8>,
        ttl: TransientTtl,
    }, // 43
    Rrsig {
        domain: String,
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: String,
        signature: Vec<u8>,
        ttl: TransientTtl,
    }, // 46
    Nsec {
        domain: String,
        next_domain: String,
        types: Vec<u16>,
        ttl: TransientTtl,
    }, // 47
    Dnskey {
        domain: String,
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Vec<u8>,
        ttl: TransientTtl,
    }, // 48
    Nsec3 {
        domain: String,
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_hashed: Vec<u8>,
        types: Vec<u16>,
        ttl: TransientTtl,
    }, // 50
    Nsec3Param {
        domain: String,
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        ttl: TransientTtl,
    }, // 51
    Aname {
        domain: String,
        target: String,
        ttl: TransientTtl,
    }, // 65280
    Fwd {
        domain: String,
        protocol: u8,
        forwarder: String,
        ttl: TransientTtl,
    }, // 65281
    App {
        domain: String,
        class_path: String,
        data: String,
        ttl: TransientTtl,
    }, // 65282
}

impl DnsRecord {
    pub fn get_domain(&self) -> Option<String> {
        match self {
            DnsRecord::Unknown { domain, .. }
            | DnsRecord::A { domain, .. }
            | DnsRecord::Ns { domain, .. }
            | DnsRecord::Cname { domain, .. }
            | DnsRecord::Soa { domain, .. }
            | DnsRecord::Mx { domain, .. }
            | DnsRecord::Txt { domain, .. }
            | DnsRecord::Aaaa { domain, .. }
            | DnsRecord::Srv { domain, .. }
            | DnsRecord::Ds { domain, .. }
            | DnsRecord::Rrsig { domain, .. }
            | DnsRecord::Nsec { domain, .. }
            | DnsRecord::Dnskey { domain, .. }
            | DnsRecord::Nsec3 { domain, .. }
            | DnsRecord::Nsec3Param { domain, .. }
            | DnsRecord::Aname { domain, .. }
            | DnsRecord::Fwd { domain, .. }
            | DnsRecord::App { domain, .. } => Some(domain.clone()),
        }
    }

    pub fn set_domain(&mut self, new_domain: String) {
        match self {
            DnsRecord::Unknown { domain, .. }
            | DnsRecord::A { domain, .. }
            | DnsRecord::Ns { domain, .. }
            | DnsRecord::Cname { domain, .. }
            | DnsRecord::Soa { domain, .. }
            | DnsRecord::Mx { domain, .. }
            | DnsRecord::Txt { domain, .. }
            | DnsRecord::Aaaa { domain, .. }
            | DnsRecord::Srv { domain, .. }
            | DnsRecord::Ds { domain, .. }
            | DnsRecord::Rrsig { domain, .. }
            | DnsRecord::Nsec { domain, .. }
            | DnsRecord::Dnskey { domain, .. }
            | DnsRecord::Nsec3 { domain, .. }
            | DnsRecord::Nsec3Param { domain, .. }
            | DnsRecord::Aname { domain, .. }
            | DnsRecord::Fwd { domain, .. }
            | DnsRecord::App { domain, .. } => *domain = new_domain,
        }
    }

    pub fn get_querytype(&self) -> QueryType {
        match self {
            DnsRecord::Unknown { qtype, .. } => QueryType::Unknown(*qtype),
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Ns { .. } => QueryType::Ns,
            DnsRecord::Cname { .. } => QueryType::Cname,
            DnsRecord::Soa { .. } => QueryType::Soa,
            DnsRecord::Mx { .. } => QueryType::Mx,
            DnsRecord::Txt { .. } => QueryType::Txt,
            DnsRecord::Aaaa { .. } => QueryType::Aaaa,
            DnsRecord::Srv { .. } => QueryType::Srv,
            DnsRecord::Ds { .. } => QueryType::Ds,
            DnsRecord::Rrsig { .. } => QueryType::Rrsig,
            DnsRecord::Nsec { .. } => QueryType::Nsec,
            DnsRecord::Dnskey { .. } => QueryType::Dnskey,
            DnsRecord::Nsec3 { .. } => QueryType::Nsec3,
            DnsRecord::Nsec3Param { .. } => QueryType::Nsec3Param,
            DnsRecord::Aname { .. } => QueryType::Aname,
            DnsRecord::Fwd { .. } => QueryType::Fwd,
            DnsRecord::App { .. } => QueryType::App,
        }
    }

    pub fn get_ttl(&self) -> u32 {
        match self {
            DnsRecord::Unknown { ttl, .. }
            | DnsRecord::A { ttl, .. }
            | DnsRecord::Ns { ttl, .. }
            | DnsRecord::Cname { ttl, .. }
            | DnsRecord::Soa { ttl, .. }
            | DnsRecord::Mx { ttl, .. }
            | DnsRecord::Txt { ttl, .. }
            | DnsRecord::Aaaa { ttl, .. }
            | DnsRecord::Srv { ttl, .. }
            | DnsRecord::Ds { ttl, .. }
            | DnsRecord::Rrsig { ttl, .. }
            | DnsRecord::Nsec { ttl, .. }
            | DnsRecord::Dnskey { ttl, .. }
            | DnsRecord::Nsec3 { ttl, .. }
            | DnsRecord::Nsec3Param { ttl, .. }
            | DnsRecord::Aname { ttl, .. }
            | DnsRecord::Fwd { ttl, .. }
            | DnsRecord::App { ttl, .. } => ttl.0,
        }
    }

    pub fn set_ttl(&mut self, new_ttl: u32) {
        match self {
            DnsRecord::Unknown { ttl, .. }
            | DnsRecord::A { ttl, .. }
            | DnsRecord::Ns { ttl, .. }
            | DnsRecord::Cname { ttl, .. }
            | DnsRecord::Soa { ttl, .. }
            | DnsRecord::Mx { ttl, .. }
            | DnsRecord::Txt { ttl, .. }
            | DnsRecord::Aaaa { ttl, .. }
            | DnsRecord::Srv { ttl, .. }
            | DnsRecord::Ds { ttl, .. }
            | DnsRecord::Rrsig { ttl, .. }
            | DnsRecord::Nsec { ttl, .. }
            | DnsRecord::Dnskey { ttl, .. }
            | DnsRecord::Nsec3 { ttl, .. }
            | DnsRecord::Nsec3Param { ttl, .. }
            | DnsRecord::Aname { ttl, .. }
            | DnsRecord::Fwd { ttl, .. }
            | DnsRecord::App { ttl, .. } => *ttl = TransientTtl(new_ttl),
        }
    }

    /// Serialize the RDATA portion in canonical form: embedded names
    /// lowercase and uncompressed.
    pub fn write_rdata<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        match *self {
            DnsRecord::Unknown { ref rdata, .. } => {
                buffer.write_bytes(rdata)?;
            }
            DnsRecord::A { ref addr, .. } => {
                buffer.write_bytes(&addr.octets())?;
            }
            DnsRecord::Ns { ref host, .. } | DnsRecord::Cname { ref host, .. } => {
                buffer.write_qname(host)?;
            }
            DnsRecord::Soa {
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ..
            } => {
                buffer.write_qname(m_name)?;
                buffer.write_qname(r_name)?;
                buffer.write_u32(serial)?;
                buffer.write_u32(refresh)?;
                buffer.write_u32(retry)?;
                buffer.write_u32(expire)?;
                buffer.write_u32(minimum)?;
            }
            DnsRecord::Mx {
                priority, ref host, ..
            } => {
                buffer.write_u16(priority)?;
                buffer.write_qname(host)?;
            }
            DnsRecord::Txt { ref data, .. } => {
                // character strings of up to 255 octets each
                for chunk in data.as_bytes().chunks(255) {
                    buffer.write_u8(chunk.len() as u8)?;
                    buffer.write_bytes(chunk)?;
                }
            }
            DnsRecord::Aaaa { ref addr, .. } => {
                buffer.write_bytes(&addr.octets())?;
            }
            DnsRecord::Srv {
                priority,
                weight,
                port,
                ref host,
                ..
            } => {
                buffer.write_u16(priority)?;
                buffer.write_u16(weight)?;
                buffer.write_u16(port)?;
                buffer.write_qname(host)?;
            }
            DnsRecord::Ds {
                key_tag,
                algorithm,
                digest_type,
                ref digest,
                ..
            } => {
                buffer.write_u16(key_tag)?;
                buffer.write_u8(algorithm)?;
                buffer.write_u8(digest_type)?;
                buffer.write_bytes(digest)?;
            }
            DnsRecord::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                ref signer_name,
                ref signature,
                ..
            } => {
                buffer.write_u16(type_covered)?;
                buffer.write_u8(algorithm)?;
                buffer.write_u8(labels)?;
                buffer.write_u32(original_ttl)?;
                buffer.write_u32(expiration)?;
                buffer.write_u32(inception)?;
                buffer.write_u16(key_tag)?;
                buffer.write_qname(signer_name)?;
                buffer.write_bytes(signature)?;
            }
            DnsRecord::Nsec {
                ref next_domain,
                ref types,
                ..
            } => {
                buffer.write_qname(next_domain)?;
                buffer.write_bytes(&encode_type_bitmap(types))?;
            }
            DnsRecord::Dnskey {
                flags,
                protocol,
                algorithm,
                ref public_key,
                ..
            } => {
                buffer.write_u16(flags)?;
                buffer.write_u8(protocol)?;
                buffer.write_u8(algorithm)?;
                buffer.write_bytes(public_key)?;
            }
            DnsRecord::Nsec3 {
                hash_algorithm,
                flags,
                iterations,
                ref salt,
                ref next_hashed,
                ref types,
                ..
            } => {
                buffer.write_u8(hash_algorithm)?;
                buffer.write_u8(flags)?;
                buffer.write_u16(iterations)?;
                buffer.write_u8(salt.len() as u8)?;
                buffer.write_bytes(salt)?;
                buffer.write_u8(next_hashed.len() as u8)?;
                buffer.write_bytes(next_hashed)?;
                buffer.write_bytes(&encode_type_bitmap(types))?;
            }
            DnsRecord::Nsec3Param {
                hash_algorithm,
                flags,
                iterations,
                ref salt,
                ..
            } => {
                buffer.write_u8(hash_algorithm)?;
                buffer.write_u8(flags)?;
                buffer.write_u16(iterations)?;
                buffer.write_u8(salt.len() as u8)?;
                buffer.write_bytes(salt)?;
            }
            DnsRecord::Aname { ref target, .. } => {
                buffer.write_qname(target)?;
            }
            DnsRecord::Fwd {
                protocol,
                ref forwarder,
                ..
            } => {
                buffer.write_u8(protocol)?;
                for chunk in forwarder.as_bytes().chunks(255) {
                    buffer.write_u8(chunk.len() as u8)?;
                    buffer.write_bytes(chunk)?;
                }
            }
            DnsRecord::App {
                ref class_path,
                ref data,
                ..
            } => {
                for value in [class_path, data].iter() {
                    for chunk in value.as_bytes().chunks(255) {
                        buffer.write_u8(chunk.len() as u8)?;
                        buffer.write_bytes(chunk)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Serialize the full record (owner, type, class, TTL, RDLENGTH,
    /// RDATA) in canonical form, with the supplied TTL substituted.
    /// This is the per-record layout RFC 4034 prescribes for signing
    /// input.
    pub fn write_canonical<T: PacketBuffer>(&self, buffer: &mut T, ttl: u32) -> Result<usize> {
        let start_pos = buffer.pos();
        let domain = self.get_domain().unwrap_or_default();
        buffer.write_qname(&domain)?;
        buffer.write_u16(self.get_querytype().to_num())?;
        buffer.write_u16(CLASS_IN)?;
        buffer.write_u32(ttl)?;

        let len_pos = buffer.pos();
        buffer.write_u16(0)?;
        self.write_rdata(buffer)?;
        let size = buffer.pos() - (len_pos + 2);
        buffer.set_u16(len_pos, size as u16)?;

        Ok(buffer.pos() - start_pos)
    }

    /// The canonical RDATA bytes alone; used for RDATA-order sorting
    /// within an RRset.
    pub fn rdata_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::new();
        self.write_rdata(&mut buffer)?;
        Ok(buffer.into_bytes())
    }
}

/// Encode a sorted list of type numbers into the NSEC/NSEC3 type bitmap
/// wire form: (window, length, bitmap) triples.
pub fn encode_type_bitmap(types: &[u16]) -> Vec<u8> {
    let mut sorted: Vec<u16> = types.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    let mut window_start = 0;
    while window_start < sorted.len() {
        let window = (sorted[window_start] >> 8) as u8;
        let mut bitmap = [0u8; 32];
        let mut max_octet = 0usize;
        let mut idx = window_start;
        while idx < sorted.len() && (sorted[idx] >> 8) as u8 == window {
            let low = (sorted[idx] & 0xFF) as usize;
            let octet = low / 8;
            bitmap[octet] |= 0x80 >> (low % 8);
            max_octet = max_octet.max(octet);
            idx += 1;
        }
        out.push(window);
        out.push((max_octet + 1) as u8);
        out.extend_from_slice(&bitmap[0..=max_octet]);
        window_start = idx;
    }
    out
}

/// `DnsQuestion` names what a lookup asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: QueryType) -> DnsQuestion {
        DnsQuestion { name, qtype }
    }
}

/// Side-band record metadata: mutable and excluded from record identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Disabled records are kept but not served; rejected under DNSSEC
    pub disabled: bool,
    /// Set when the record was superseded, for journal consumers
    pub deleted_on: Option<DateTime<Utc>>,
    /// Operator comments
    pub comments: Option<String>,
    /// Glue address records for NS targets, keyed by the target name
    /// they carry in their own owner field
    pub glue: Vec<DnsRecord>,
}

/// A record as stored in the zone: the wire-visible `DnsRecord` plus its
/// side-band info block. Identity (equality, ordering, hashing) is the
/// record data alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub data: DnsRecord,
    pub info: RecordInfo,
}

impl ZoneRecord {
    pub fn new(data: DnsRecord) -> ZoneRecord {
        ZoneRecord {
            data,
            info: RecordInfo::default(),
        }
    }

    pub fn with_info(data: DnsRecord, info: RecordInfo) -> ZoneRecord {
        ZoneRecord { data, info }
    }
}

impl PartialEq for ZoneRecord {
    fn eq(&self, other: &ZoneRecord) -> bool {
        self.data == other.data
    }
}

impl Eq for ZoneRecord {}

impl PartialOrd for ZoneRecord {
    fn partial_cmp(&self, other: &ZoneRecord) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ZoneRecord {
    fn cmp(&self, other: &ZoneRecord) -> Ordering {
        self.data.cmp(&other.data)
    }
}

impl Hash for ZoneRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_record(domain: &str, last_octet: u8, ttl: u32) -> DnsRecord {
        DnsRecord::A {
            domain: domain.to_string(),
            addr: Ipv4Addr::new(192, 0, 2, last_octet),
            ttl: TransientTtl(ttl),
        }
    }

    #[test]
    fn test_ttl_excluded_from_identity() {
        assert_eq!(a_record("web.example", 1, 300), a_record("web.example", 1, 900));
        assert_ne!(a_record("web.example", 1, 300), a_record("web.example", 2, 300));
    }

    #[test]
    fn test_info_excluded_from_identity() {
        let plain = ZoneRecord::new(a_record("web.example", 1, 300));
        let mut flagged = ZoneRecord::new(a_record("web.example", 1, 300));
        flagged.info.disabled = true;
        flagged.info.comments = Some("kept for reference".to_string());
        assert_eq!(plain, flagged);
    }

    #[test]
    fn test_type_bitmap_single_window() {
        // A (1), NS (2), SOA (6): all in window 0, highest octet 0
        let bitmap = encode_type_bitmap(&[1, 2, 6]);
        assert_eq!(bitmap, vec![0, 1, 0b0110_0010]);
    }

    #[test]
    fn test_type_bitmap_rrsig_nsec() {
        // A (1), RRSIG (46), NSEC (47)
        let bitmap = encode_type_bitmap(&[47, 1, 46]);
        assert_eq!(bitmap, vec![0, 6, 0x40, 0, 0, 0, 0, 0b0000_0011]);
    }

    #[test]
    fn test_type_bitmap_private_window() {
        // ANAME (65280) lives in window 255
        let bitmap = encode_type_bitmap(&[1, 65280]);
        assert_eq!(bitmap[0..3], [0, 1, 0x40]);
        assert_eq!(bitmap[3..], [255, 1, 0x80]);
    }

    #[test]
    fn test_canonical_rdata_lowercases_names() {
        let rec = DnsRecord::Ns {
            domain: "example".to_string(),
            host: "NS1.Example".to_string(),
            ttl: TransientTtl(3600),
        };
        let rdata = rec.rdata_bytes().unwrap();
        assert_eq!(
            rdata,
            vec![3, b'n', b's', b'1', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0]
        );
    }

    #[test]
    fn test_write_canonical_layout() {
        let rec = a_record("a.example", 1, 300);
        let mut buffer = VectorPacketBuffer::new();
        rec.write_canonical(&mut buffer, 300).unwrap();
        let bytes = buffer.as_slice();
        // owner name
        assert_eq!(&bytes[0..11], &[1, b'a', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0]);
        // type A, class IN
        assert_eq!(&bytes[11..15], &[0, 1, 0, 1]);
        // ttl 300
        assert_eq!(&bytes[15..19], &[0, 0, 1, 0x2C]);
        // rdlength 4, then the address
        assert_eq!(&bytes[19..25], &[0, 4, 192, 0, 2, 1]);
    }

    #[test]
    fn test_querytype_round_trip() {
        for num in &[1u16, 2, 5, 6, 15, 16, 28, 33, 43, 46, 47, 48, 50, 51, 251, 252, 65280, 65281, 65282, 9999] {
            assert_eq!(QueryType::from_num(*num).to_num(), *num);
        }
    }
}
