// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port allocation policy.
//!
//! A claim without a preferred port scans the range in ascending order
//! from a deterministic per-identity seed, wrapping once, and takes the
//! first port that is not reserved, leased, or OS-occupied.

use std::collections::HashMap;
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use pd_core::{ApiError, Config, ErrorKind};

/// OS-level port occupancy probe.
pub trait OccupancyProbe: Send + Sync + 'static {
    fn is_occupied(&self, port: u16) -> bool;
}

/// Real probe: `listen`-and-close on the loopback interface, with a short
/// cache so a scan over a mostly-free range stays cheap.
pub struct TcpProbe {
    cache: Mutex<HashMap<u16, (Instant, bool)>>,
    ttl: Duration,
}

impl TcpProbe {
    pub fn new() -> Self {
        Self { cache: Mutex::new(HashMap::new()), ttl: Duration::from_secs(2) }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyProbe for TcpProbe {
    fn is_occupied(&self, port: u16) -> bool {
        {
            let cache = self.cache.lock();
            if let Some((at, occupied)) = cache.get(&port) {
                if at.elapsed() < self.ttl {
                    return *occupied;
                }
            }
        }
        // Misdetection is tolerated; the lease stands even if the port
        // later turns out busy.
        let occupied = TcpListener::bind(("127.0.0.1", port)).is_err();
        self.cache.lock().insert(port, (Instant::now(), occupied));
        occupied
    }
}

/// The allocator: policy over config, probe, and the current lease set.
pub struct PortAllocator {
    config: Arc<Config>,
    probe: Arc<dyn OccupancyProbe>,
}

impl PortAllocator {
    pub fn new(config: Arc<Config>, probe: Arc<dyn OccupancyProbe>) -> Self {
        Self { config, probe }
    }

    /// Choose a port for `identity`.
    ///
    /// `leased` is the set of currently leased ports, read inside the
    /// claim's transaction so competing claims are linearized by the
    /// store's write latch.
    pub fn allocate(
        &self,
        identity: &str,
        preferred: Option<u16>,
        range: Option<(u16, u16)>,
        leased: &HashSet<u16>,
    ) -> Result<u16, ApiError> {
        let (lo, hi) = match range {
            Some((lo, hi)) => {
                if lo > hi {
                    return Err(ApiError::validation(format!(
                        "invalid port range {}-{}",
                        lo, hi
                    )));
                }
                (lo, hi)
            }
            None => (self.config.ports.range_start, self.config.ports.range_end),
        };
        let reserved = &self.config.ports.reserved;

        if let Some(port) = preferred {
            if port < lo || port > hi {
                return Err(ApiError::new(
                    ErrorKind::PortOutOfRange,
                    format!("port {} is outside {}-{}", port, lo, hi),
                ));
            }
            if reserved.contains(&port) {
                return Err(ApiError::new(
                    ErrorKind::PortReserved,
                    format!("port {} is reserved", port),
                ));
            }
            if !leased.contains(&port) && !self.probe.is_occupied(port) {
                return Ok(port);
            }
            // Preferred port is busy: fall through to the scan.
        }

        let span = u32::from(hi - lo) + 1;
        let start = seed_offset(identity, span);
        for step in 0..span {
            let port = lo + ((start + step) % span) as u16;
            if reserved.contains(&port) || leased.contains(&port) {
                continue;
            }
            if self.probe.is_occupied(port) {
                continue;
            }
            return Ok(port);
        }
        Err(ApiError::new(
            ErrorKind::PortExhausted,
            format!("no free port in {}-{}", lo, hi),
        ))
    }
}

/// Deterministic scan seed: identity hash mapped into the range span.
fn seed_offset(identity: &str, span: u32) -> u32 {
    let digest = Sha256::digest(identity.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) % u64::from(span)) as u32
}

#[cfg(test)]
pub(crate) struct FakeProbe(pub parking_lot::Mutex<HashSet<u16>>);

#[cfg(test)]
impl FakeProbe {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self(parking_lot::Mutex::new(HashSet::new())))
    }

    pub fn occupied(ports: &[u16]) -> Arc<Self> {
        Arc::new(Self(parking_lot::Mutex::new(ports.iter().copied().collect())))
    }
}

#[cfg(test)]
impl OccupancyProbe for FakeProbe {
    fn is_occupied(&self, port: u16) -> bool {
        self.0.lock().contains(&port)
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
