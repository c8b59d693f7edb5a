//! Stratum DNS Zone Manager
//!
//! A DNSSEC-signed primary zone management library.
//!
//! # Features
//!
//! * Authoritative record store with atomic RRset updates
//! * Automated DNSSEC key lifecycle (generate, publish, rollover, retire, revoke)
//! * Zone signing with ECDSA, RSA and Ed25519 keys
//! * NSEC and NSEC3 authenticated denial of existence
//! * SOA-serial-disciplined change journal feeding IXFR
//! * Versioned binary zone persistence
//!
//! # Architecture
//!
//! The library is a single module tree under `dns`. There is no CLI, no
//! network listener and no environment handling: operator actions arrive
//! through the zone facade (`dns::zone::PrimaryZone`), queries read the
//! record store directly, and the external collaborators (resolver,
//! notifier, persistence) are consumed as traits (`dns::context`).

/// Primary zone management and DNSSEC signing
pub mod dns;
