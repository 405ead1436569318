//! Country lookup using a MaxMind GeoLite2/GeoIP2 MMDB

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Memory-mapped country resolver, cheap to clone
#[derive(Clone)]
pub struct GeoIpService {
    reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Open a Country or City database
    pub fn open(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// ISO country code for `ip`, if the database knows it
    pub fn country_code(&self, ip: IpAddr) -> Option<String> {
        // City databases are a superset of Country data
        let result = self.reader.lookup(ip).ok()?;
        match result.decode::<geoip2::Country>() {
            Ok(Some(country)) => country.country.iso_code.map(|s| s.to_string()),
            _ => None,
        }
    }
}
