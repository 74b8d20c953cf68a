//! lwIP ARP table access for the station interface.

use std::net::Ipv4Addr;

use airprox::arp::ArpTable;
use airprox::MacAddr;
use esp_idf_svc::sys::{eth_addr, etharp_find_addr, etharp_request, ip4_addr_t, netif_default};

use crate::STATION_IP;

/// The default netif's ARP table. Zero-sized; all state lives in lwIP.
pub struct EspArpTable;

fn lwip_addr(ip: Ipv4Addr) -> ip4_addr_t {
    // lwIP keeps addresses in network byte order
    ip4_addr_t {
        addr: u32::from_ne_bytes(ip.octets()),
    }
}

impl ArpTable for EspArpTable {
    fn is_connected(&self) -> bool {
        self.local_ip().is_some()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        STATION_IP.lock().ok().and_then(|ip| *ip)
    }

    fn find(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        let addr = lwip_addr(ip);
        let mut eth_ret: *mut eth_addr = std::ptr::null_mut();
        let mut ip_ret: *const ip4_addr_t = std::ptr::null();

        // Safety: lwIP only writes the out-pointers on success
        let index = unsafe { etharp_find_addr(netif_default, &addr, &mut eth_ret, &mut ip_ret) };
        if index < 0 || eth_ret.is_null() {
            return None;
        }
        Some(MacAddr(unsafe { (*eth_ret).addr }))
    }

    fn request(&mut self, ip: Ipv4Addr) {
        let addr = lwip_addr(ip);
        let err = unsafe { etharp_request(netif_default, &addr) };
        if err != 0 {
            log::debug!("ARP request for {} failed: {}", ip, err);
        }
    }
}
