//! the DNSSEC key lifecycle state machine
//!
//! Keys advance Generated -> Published -> Ready -> Active -> Retired ->
//! Revoked -> Dead on wall-clock conditions involving the DNSKEY TTL,
//! the zone's propagation delay (SOA REFRESH + RETRY) and, for KSKs,
//! evidence that the parent zone publishes a matching DS. Each
//! maintenance tick partitions the key set into work lists under the key
//! store lock, then the zone applies the lists with the lock released so
//! no lock is ever held across the parent lookups.

use chrono::{DateTime, Duration, Utc};

use crate::dns::context::DirectQuery;
use crate::dns::keys::{DigestType, DnssecPrivateKey, KeyState, KeyType};
use crate::dns::names;
use crate::dns::protocol::{DnsQuestion, DnsRecord, QueryType};

/// Timeout for parent DS and parent SOA lookups
pub const PARENT_LOOKUP_TIMEOUT_MS: u64 = 10_000;

/// Fallback parent-side propagation delay when the parent SOA cannot be
/// fetched
pub const DEFAULT_PARENT_PROPAGATION_SECS: i64 = 86_400;

/// Fallback DS TTL when the parent DS carries none we can observe
pub const DEFAULT_DS_TTL_SECS: i64 = 86_400;

/// Timing inputs for one tick, snapshotted from the zone before
/// planning.
#[derive(Debug, Clone, Copy)]
pub struct ZoneTimings {
    /// TTL of the apex DNSKEY RRset
    pub dnskey_ttl: u32,
    /// SOA REFRESH + RETRY
    pub propagation_delay: u32,
    /// Largest TTL across the zone's records
    pub max_record_ttl: u32,
    /// Largest TTL across the zone's RRSIGs
    pub max_rrsig_ttl: u32,
}

/// The partitioned work lists of one maintenance tick, applied in field
/// order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickPlan {
    /// Published keys whose publication wait has elapsed
    pub to_ready: Vec<u16>,
    /// Ready ZSKs; they activate unconditionally
    pub to_activate: Vec<u16>,
    /// Ready KSKs awaiting a parent DS probe
    pub to_probe: Vec<u16>,
    /// Active retiring keys whose successor has taken over
    pub to_retire: Vec<u16>,
    /// Retired KSKs; they revoke immediately
    pub to_revoke: Vec<u16>,
    /// Keys whose hold-down has elapsed; removed from store and zone
    pub to_unpublish: Vec<u16>,
    /// Active ZSKs past their rollover age
    pub to_rollover: Vec<u16>,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.to_ready.is_empty()
            && self.to_activate.is_empty()
            && self.to_probe.is_empty()
            && self.to_retire.is_empty()
            && self.to_revoke.is_empty()
            && self.to_unpublish.is_empty()
            && self.to_rollover.is_empty()
    }
}

/// How long a revoked KSK stays published before removal:
/// max(1 hour, min(15 days, DNSKEY TTL / 2)). This follows the source
/// system rather than the RFC 7583 recommendation.
pub fn revoked_hold_down(dnskey_ttl: u32) -> Duration {
    let half_ttl = Duration::seconds(dnskey_ttl as i64 / 2);
    let capped = std::cmp::min(Duration::days(15), half_ttl);
    std::cmp::max(Duration::hours(1), capped)
}

/// Whether `successor` can take over from the retiring `key`.
fn is_successor(key: &DnssecPrivateKey, successor: &DnssecPrivateKey) -> bool {
    successor.key_tag != key.key_tag
        && successor.key_type == key.key_type
        && successor.algorithm == key.algorithm
        && !successor.is_retiring
        && match key.key_type {
            KeyType::Ksk => matches!(successor.state, KeyState::Ready | KeyState::Active),
            KeyType::Zsk => successor.state == KeyState::Active,
        }
}

/// Partition the key set into this tick's work lists. Pure function of
/// the snapshot; the caller holds the key store lock only long enough to
/// take it.
pub fn plan_tick(keys: &[DnssecPrivateKey], timings: &ZoneTimings, now: DateTime<Utc>) -> TickPlan {
    let mut plan = TickPlan::default();
    let propagation = Duration::seconds(timings.propagation_delay as i64);

    for key in keys {
        match key.state {
            KeyState::Generated => {
                // waits for an explicit operator publish
            }
            KeyState::Published => {
                let base_ttl = match key.key_type {
                    KeyType::Zsk => timings.dnskey_ttl,
                    KeyType::Ksk => {
                        let elder_ksk = keys.iter().any(|k| {
                            k.key_tag != key.key_tag
                                && k.key_type == KeyType::Ksk
                                && matches!(k.state, KeyState::Ready | KeyState::Active)
                        });
                        if elder_ksk {
                            timings.dnskey_ttl
                        } else {
                            // fresh zone: no resolver can hold an older
                            // DNSKEY, but cached negative answers may
                            // live as long as any record TTL
                            timings.max_record_ttl
                        }
                    }
                };
                let wait = Duration::seconds(base_ttl as i64) + propagation;
                if now > key.state_changed_on + wait {
                    plan.to_ready.push(key.key_tag);
                }
            }
            KeyState::Ready => match key.key_type {
                KeyType::Zsk => plan.to_activate.push(key.key_tag),
                KeyType::Ksk => plan.to_probe.push(key.key_tag),
            },
            KeyState::Active => {
                if key.is_retiring {
                    if keys.iter().any(|k| is_successor(key, k)) {
                        plan.to_retire.push(key.key_tag);
                    }
                } else if key.key_type == KeyType::Zsk && key.rollover_days > 0 {
                    let age = Duration::days(key.rollover_days as i64);
                    if now > key.state_changed_on + age {
                        plan.to_rollover.push(key.key_tag);
                    }
                }
            }
            KeyState::Retired => match key.key_type {
                KeyType::Ksk => plan.to_revoke.push(key.key_tag),
                KeyType::Zsk => {
                    let wait = Duration::seconds(timings.max_rrsig_ttl as i64) + propagation;
                    if now > key.state_changed_on + wait {
                        plan.to_unpublish.push(key.key_tag);
                    }
                }
            },
            KeyState::Revoked => {
                if now > key.state_changed_on + revoked_hold_down(timings.dnskey_ttl) {
                    plan.to_unpublish.push(key.key_tag);
                }
            }
            KeyState::Dead => plan.to_unpublish.push(key.key_tag),
        }
    }
    plan
}

/// Retire safety: a key may retire only if the zone keeps working
/// coverage without it. Manual retirement relaxes the same-algorithm
/// requirement but still demands a functioning KSK/ZSK pairing.
pub fn can_retire(key: &DnssecPrivateKey, keys: &[DnssecPrivateKey], manual: bool) -> bool {
    match key.key_type {
        KeyType::Zsk => {
            let same_algorithm_zsk = keys.iter().any(|k| {
                k.key_tag != key.key_tag
                    && k.key_type == KeyType::Zsk
                    && k.algorithm == key.algorithm
                    && k.state == KeyState::Active
            });
            if same_algorithm_zsk {
                return true;
            }
            if manual {
                // an active KSK paired with an active ZSK of another
                // algorithm keeps the zone verifiable
                return keys.iter().any(|ksk| {
                    ksk.key_tag != key.key_tag
                        && ksk.key_type == KeyType::Ksk
                        && ksk.state == KeyState::Active
                        && ksk.algorithm != key.algorithm
                        && keys.iter().any(|zsk| {
                            zsk.key_tag != key.key_tag
                                && zsk.key_type == KeyType::Zsk
                                && zsk.state == KeyState::Active
                                && zsk.algorithm == ksk.algorithm
                        })
                });
            }
            false
        }
        KeyType::Ksk => keys.iter().any(|k| {
            k.key_tag != key.key_tag
                && k.key_type == KeyType::Ksk
                && matches!(k.state, KeyState::Ready | KeyState::Active)
                && if manual {
                    keys.iter().any(|zsk| {
                        zsk.key_type == KeyType::Zsk
                            && zsk.state == KeyState::Active
                            && zsk.algorithm == k.algorithm
                    })
                } else {
                    k.algorithm == key.algorithm
                }
        }),
    }
}

/// Probe the parent zone for a DS matching this KSK. The cached DS
/// entry is flushed first so the probe cannot be satisfied by stale
/// state. Lookup failure logs and reports no match; the next tick
/// retries.
pub fn probe_parent_ds(resolver: &dyn DirectQuery, apex: &str, key: &DnssecPrivateKey) -> bool {
    let apex = names::normalize(apex);
    resolver.flush_cached_entry(&apex, QueryType::Ds);

    let question = DnsQuestion::new(apex.clone(), QueryType::Ds);
    let answers = match resolver.direct_query(&question, PARENT_LOOKUP_TIMEOUT_MS) {
        Ok(answers) => answers,
        Err(e) => {
            log::warn!("parent DS lookup for {} failed: {}", apex, e);
            return false;
        }
    };

    for answer in &answers {
        if let DnsRecord::Ds {
            key_tag,
            algorithm,
            digest_type,
            digest,
            ..
        } = answer
        {
            if *key_tag != key.key_tag || *algorithm != key.algorithm.to_num() {
                continue;
            }
            let expected = match digest_type {
                2 => key.ds_digest(&apex, DigestType::Sha256),
                4 => key.ds_digest(&apex, DigestType::Sha384),
                _ => continue,
            };
            if *digest == expected {
                return true;
            }
        }
    }
    false
}

/// The parent-side propagation delay: REFRESH + RETRY of the parent
/// zone's SOA, defaulting to 24 hours when the parent cannot be
/// queried. Advisory; logged alongside KSK activation so operators can
/// judge parent convergence.
pub fn parent_propagation_delay(resolver: &dyn DirectQuery, apex: &str) -> Duration {
    let parent = match names::parent(&names::normalize(apex)) {
        Some(parent) if !parent.is_empty() => parent,
        _ => return Duration::seconds(DEFAULT_PARENT_PROPAGATION_SECS),
    };

    let question = DnsQuestion::new(parent.clone(), QueryType::Soa);
    match resolver.direct_query(&question, PARENT_LOOKUP_TIMEOUT_MS) {
        Ok(answers) => {
            for answer in &answers {
                if let DnsRecord::Soa { refresh, retry, .. } = answer {
                    return Duration::seconds(*refresh as i64 + *retry as i64);
                }
            }
            Duration::seconds(DEFAULT_PARENT_PROPAGATION_SECS)
        }
        Err(e) => {
            log::warn!("parent SOA lookup for {} failed: {}", parent, e);
            Duration::seconds(DEFAULT_PARENT_PROPAGATION_SECS)
        }
    }
}
