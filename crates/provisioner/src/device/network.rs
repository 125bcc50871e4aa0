//! Network identity: address, MAC and hostname.

use crate::config::AcaAddress;
use hirs_evidence_schema::{NetworkInfo, NOT_SPECIFIED};
use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// One network interface with the addresses bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
    pub mac_address: Option<String>,
    pub ipv4: Vec<Ipv4Addr>,
}

impl InterfaceInfo {
    fn owns(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.ipv4.contains(&v4),
            IpAddr::V6(_) => false,
        }
    }
}

/// Host network queries used to build [`NetworkInfo`].
pub trait NetworkProbe: Send {
    /// Local address the OS would use to reach `host:port`. No packet is sent.
    fn local_address_toward(&self, host: &str, port: u16) -> io::Result<IpAddr>;

    fn interfaces(&self) -> io::Result<Vec<InterfaceInfo>>;

    fn reverse_lookup(&self, addr: IpAddr) -> io::Result<String>;

    fn local_hostname(&self) -> io::Result<String>;
}

/// Probe backed by the running host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNetwork;

impl SystemNetwork {
    pub fn new() -> Self {
        Self
    }
}

impl NetworkProbe for SystemNetwork {
    fn local_address_toward(&self, host: &str, port: u16) -> io::Result<IpAddr> {
        let bind = if host.contains(':') { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind)?;
        socket.connect((host, port))?;
        let addr = socket.local_addr()?.ip();
        if addr.is_unspecified() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no local address selected",
            ));
        }
        Ok(addr)
    }

    fn interfaces(&self) -> io::Result<Vec<InterfaceInfo>> {
        let mut by_name: BTreeMap<String, InterfaceInfo> = BTreeMap::new();
        let mut order = Vec::new();

        for iface in if_addrs::get_if_addrs()? {
            let entry = by_name.entry(iface.name.clone()).or_insert_with(|| {
                order.push(iface.name.clone());
                InterfaceInfo {
                    name: iface.name.clone(),
                    is_up: interface_is_up(&iface.name),
                    is_loopback: iface.is_loopback(),
                    mac_address: interface_mac(&iface.name),
                    ipv4: Vec::new(),
                }
            });
            if let IpAddr::V4(v4) = iface.ip() {
                entry.ipv4.push(v4);
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|name| by_name.remove(&name))
            .collect())
    }

    fn reverse_lookup(&self, addr: IpAddr) -> io::Result<String> {
        dns_lookup::lookup_addr(&addr)
    }

    fn local_hostname(&self) -> io::Result<String> {
        Ok(hostname::get()?.to_string_lossy().into_owned())
    }
}

#[cfg(target_os = "linux")]
fn interface_is_up(name: &str) -> bool {
    const IFF_UP: u32 = 0x1;
    std::fs::read_to_string(format!("/sys/class/net/{}/flags", name))
        .ok()
        .and_then(|flags| u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16).ok())
        .map(|flags| flags & IFF_UP != 0)
        .unwrap_or(true)
}

/// Interfaces listed with an address are treated as up.
#[cfg(not(target_os = "linux"))]
fn interface_is_up(_name: &str) -> bool {
    true
}

#[cfg(target_os = "linux")]
fn interface_mac(name: &str) -> Option<String> {
    std::fs::read_to_string(format!("/sys/class/net/{}/address", name))
        .ok()
        .and_then(|mac| normalize_mac(&mac))
}

// TODO: read adapter MACs on Windows (GetAdaptersAddresses) so the identity claim carries one.
#[cfg(not(target_os = "linux"))]
fn interface_mac(_name: &str) -> Option<String> {
    None
}

/// Uppercase hex digits without separators; `None` for empty or all-zero
/// addresses.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if hex.is_empty() || hex.chars().all(|c| c == '0') {
        None
    } else {
        Some(hex)
    }
}

/// Resolve address, MAC and hostname.
///
/// The address is the one used to reach the attestation CA when it is
/// configured and routable, otherwise the first IPv4 address of the first up,
/// non-loopback interface.
pub fn resolve_network(probe: &dyn NetworkProbe, aca: Option<&AcaAddress>) -> NetworkInfo {
    let interfaces = probe.interfaces().unwrap_or_else(|e| {
        debug!("Could not list network interfaces: {}", e);
        Vec::new()
    });

    let toward_aca = aca.and_then(|aca| {
        probe
            .local_address_toward(aca.host(), aca.port())
            .map_err(|e| debug!("No route toward {}: {}", aca, e))
            .ok()
    });

    let (ip, iface) = match toward_aca {
        Some(ip) => (Some(ip), interfaces.iter().find(|i| i.owns(ip))),
        None => {
            let iface = interfaces
                .iter()
                .find(|i| i.is_up && !i.is_loopback && !i.ipv4.is_empty());
            (iface.map(|i| IpAddr::V4(i.ipv4[0])), iface)
        }
    };

    NetworkInfo {
        mac_address: iface
            .and_then(|i| i.mac_address.clone())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        ip_address: ip.map(|ip| ip.to_string()),
        hostname: resolve_hostname(probe, ip),
    }
}

fn resolve_hostname(probe: &dyn NetworkProbe, ip: Option<IpAddr>) -> String {
    let reverse = ip.and_then(|ip| {
        probe
            .reverse_lookup(ip)
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && *name != ip.to_string())
    });

    reverse
        .or_else(|| {
            probe
                .local_hostname()
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}
