//! Identifier and address generation
//!
//! Identifiers come from a [`fastrand::Rng`] that can be seeded, so a test that
//! pins `id_seed` sees the same ids on every run.

use crate::error::EmulatorError;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Random identifier source
pub struct IdGenerator {
    rng: fastrand::Rng,
}

impl IdGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self { rng }
    }

    /// `len` random lowercase ASCII letters
    pub fn lowercase(&mut self, len: usize) -> String {
        (0..len).map(|_| self.rng.lowercase()).collect()
    }

    /// `len` random decimal digits with no leading zero
    pub fn digits(&mut self, len: usize) -> String {
        (0..len)
            .map(|i| {
                let low = if i == 0 { 1 } else { 0 };
                char::from(b'0' + self.rng.u8(low..10))
            })
            .collect()
    }

    /// Random version 4 UUID
    pub fn uuid(&mut self) -> uuid::Uuid {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Sequential allocator of private IPv4 addresses within one network
pub struct AddressPool {
    network: u32,
    broadcast: u32,
    next: u32,
    used: HashSet<Ipv4Addr>,
    cidr: String,
}

impl AddressPool {
    /// Parse a `a.b.c.d/prefix` network
    pub fn parse(cidr: &str) -> Result<Self, EmulatorError> {
        let invalid = || EmulatorError::InvalidArgument(format!("invalid network CIDR '{}'", cidr));

        let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| invalid())?;
        let prefix: u32 = prefix.trim().parse().map_err(|_| invalid())?;
        if !(8..=30).contains(&prefix) {
            return Err(invalid());
        }

        let mask = u32::MAX << (32 - prefix);
        let network = u32::from(addr) & mask;
        let broadcast = network | !mask;

        Ok(Self {
            network,
            broadcast,
            // .1 is left for the gateway
            next: network + 2,
            used: HashSet::new(),
            cidr: cidr.to_string(),
        })
    }

    /// Hand out the next free host address
    pub fn allocate(&mut self) -> Result<Ipv4Addr, EmulatorError> {
        while self.next < self.broadcast {
            let ip = Ipv4Addr::from(self.next);
            self.next += 1;
            if self.used.insert(ip) {
                return Ok(ip);
            }
        }
        Err(EmulatorError::Internal(format!(
            "address pool {} exhausted",
            self.cidr
        )))
    }

    /// Mark a caller-chosen address as taken. The address must be an
    /// assignable host of this pool that nobody holds yet.
    pub fn reserve(&mut self, ip: Ipv4Addr) -> Result<(), EmulatorError> {
        if !self.contains(ip) {
            return Err(EmulatorError::InvalidArgument(format!(
                "address {} is not an assignable host of {}",
                ip, self.cidr
            )));
        }
        if !self.used.insert(ip) {
            return Err(EmulatorError::InvalidArgument(format!(
                "address {} is already in use",
                ip
            )));
        }
        Ok(())
    }

    /// Give an address back so it can be reserved or allocated again
    pub fn release(&mut self, ip: Ipv4Addr) {
        if self.used.remove(&ip) {
            self.next = self.next.min(u32::from(ip));
        }
    }

    /// Whether `ip` is an assignable host (not network, gateway or broadcast)
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let raw = u32::from(ip);
        raw > self.network + 1 && raw < self.broadcast
    }
}
