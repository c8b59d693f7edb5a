//! interfaces the zone manager consumes from its host
//!
//! The zone core performs no network or disk I/O of its own. Parent DS
//! and parent SOA lookups go through `DirectQuery`, change notification
//! through `Notifier` and zone flushing through `ZonePersistence`; the
//! host wires real implementations in, and every interface has a no-op
//! stand-in so a zone can run detached (absence is tolerated).

use std::collections::HashMap;
use std::io;

use derive_more::{Display, Error};
use parking_lot::Mutex;

use crate::dns::protocol::{DnsQuestion, DnsRecord, QueryType};

#[derive(Debug, Display, Error)]
pub enum LookupError {
    TimeOut,
    LookupFailed,
}

/// Resolver interface for the zone's own outbound lookups (parent DS,
/// parent SOA). Implementations must respect DNSSEC and must never let
/// the probe repopulate stale cache state for the queried name; the
/// zone flushes the cached entry before probing.
pub trait DirectQuery: Send + Sync {
    fn direct_query(
        &self,
        question: &DnsQuestion,
        timeout_ms: u64,
    ) -> Result<Vec<DnsRecord>, LookupError>;

    /// Drop the cached entry for (name, qtype) so the next query hits
    /// the network.
    fn flush_cached_entry(&self, name: &str, qtype: QueryType);
}

/// Notification interface toward secondaries.
pub trait Notifier: Send + Sync {
    fn trigger_notify(&self);
    fn disable_notify_timer(&self);
}

/// Zone flush interface toward the persistence layer.
pub trait ZonePersistence: Send + Sync {
    fn save_zone_file(&self, zone_name: &str) -> io::Result<()>;
}

/// The collaborators a zone runs against.
pub struct ZoneHost {
    pub resolver: Box<dyn DirectQuery>,
    pub notifier: Box<dyn Notifier>,
    pub persistence: Box<dyn ZonePersistence>,
}

impl ZoneHost {
    /// A host with no external collaborators: lookups fail, notify and
    /// persistence are no-ops.
    pub fn detached() -> ZoneHost {
        ZoneHost {
            resolver: Box::new(UnreachableResolver),
            notifier: Box::new(NoopNotifier),
            persistence: Box::new(NoopPersistence),
        }
    }
}

/// Resolver stand-in that fails every lookup.
pub struct UnreachableResolver;

impl DirectQuery for UnreachableResolver {
    fn direct_query(
        &self,
        _question: &DnsQuestion,
        _timeout_ms: u64,
    ) -> Result<Vec<DnsRecord>, LookupError> {
        Err(LookupError::LookupFailed)
    }

    fn flush_cached_entry(&self, _name: &str, _qtype: QueryType) {}
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn trigger_notify(&self) {}
    fn disable_notify_timer(&self) {}
}

pub struct NoopPersistence;

impl ZonePersistence for NoopPersistence {
    fn save_zone_file(&self, _zone_name: &str) -> io::Result<()> {
        Ok(())
    }
}

/// A resolver answering from canned records; used by tests and by hosts
/// that stage zone data without network access. Flushes are recorded so
/// cache-hygiene behaviour can be asserted.
#[derive(Default)]
pub struct StubResolver {
    answers: Mutex<HashMap<(String, u16), Vec<DnsRecord>>>,
    flushed: Mutex<Vec<(String, u16)>>,
}

impl StubResolver {
    pub fn new() -> StubResolver {
        StubResolver {
            answers: Mutex::new(HashMap::new()),
            flushed: Mutex::new(Vec::new()),
        }
    }

    pub fn stage(&self, name: &str, qtype: QueryType, records: Vec<DnsRecord>) {
        self.answers
            .lock()
            .insert((name.to_lowercase(), qtype.to_num()), records);
    }

    pub fn flushed_entries(&self) -> Vec<(String, u16)> {
        self.flushed.lock().clone()
    }
}

impl DirectQuery for StubResolver {
    fn direct_query(
        &self,
        question: &DnsQuestion,
        _timeout_ms: u64,
    ) -> Result<Vec<DnsRecord>, LookupError> {
        self.answers
            .lock()
            .get(&(question.name.to_lowercase(), question.qtype.to_num()))
            .cloned()
            .ok_or(LookupError::LookupFailed)
    }

    fn flush_cached_entry(&self, name: &str, qtype: QueryType) {
        self.flushed
            .lock()
            .push((name.to_lowercase(), qtype.to_num()));
    }
}

/// A notifier that counts triggers; used to assert that mutations
/// notify secondaries.
#[derive(Default)]
pub struct CountingNotifier {
    triggers: Mutex<usize>,
}

impl CountingNotifier {
    pub fn new() -> CountingNotifier {
        CountingNotifier {
            triggers: Mutex::new(0),
        }
    }

    pub fn trigger_count(&self) -> usize {
        *self.triggers.lock()
    }
}

impl Notifier for CountingNotifier {
    fn trigger_notify(&self) {
        *self.triggers.lock() += 1;
    }

    fn disable_notify_timer(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::TransientTtl;

    #[test]
    fn test_stub_resolver_answers_and_flushes() {
        let resolver = StubResolver::new();
        resolver.stage(
            "example",
            QueryType::Ds,
            vec![DnsRecord::Ds {
                domain: "example".to_string(),
                key_tag: 12345,
                algorithm: 13,
                digest_type: 2,
                digest: vec![0xAB],
                ttl: TransientTtl(3600),
            }],
        );

        let question = DnsQuestion::new("example".to_string(), QueryType::Ds);
        let answer = resolver.direct_query(&question, 10_000).unwrap();
        assert_eq!(answer.len(), 1);

        resolver.flush_cached_entry("example", QueryType::Ds);
        assert_eq!(resolver.flushed_entries(), vec![("example".to_string(), 43)]);

        let missing = DnsQuestion::new("other".to_string(), QueryType::Soa);
        assert!(resolver.direct_query(&missing, 10_000).is_err());
    }
}
