//! mDNS address discovery for resolving partner handles on the local network

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use crate::host::AddressDiscovery;
use crate::protocol::constants::{DISCOVERY_TIMEOUT, SERVICE_TYPE};
use crate::{DeviceIdentity, Error, Result};

/// mDNS-backed discovery: advertises this device and resolves partner
/// handles to concrete endpoints.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    our_device_id: String,
}

impl MdnsDiscovery {
    /// Create a new discovery service
    pub fn new(identity: &DeviceIdentity) -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(|e| Error::Discovery(e.to_string()))?;

        Ok(Self {
            daemon,
            our_device_id: identity.id.to_string(),
        })
    }

    /// Register our data server endpoint for others to discover.
    ///
    /// The device name doubles as the discovery handle partners put in
    /// their configuration.
    pub fn register(&self, device_name: &str, port: u16) -> Result<()> {
        let instance_name = format!("{}-{}", device_name, &self.our_device_id[..8]);

        let mut properties = HashMap::new();
        properties.insert("id".to_string(), self.our_device_id.clone());
        properties.insert("name".to_string(), device_name.to_string());

        let service = ServiceInfo::new(
            SERVICE_TYPE,
            &instance_name,
            &format!(
                "{}.local.",
                hostname::get()
                    .map(|h| h.to_string_lossy().to_string())
                    .unwrap_or_else(|_| "shareclip".to_string())
            ),
            (),
            port,
            properties,
        )
        .map_err(|e| Error::Discovery(e.to_string()))?;

        self.daemon
            .register(service)
            .map_err(|e| Error::Discovery(e.to_string()))?;

        tracing::info!(instance = %instance_name, "registered mDNS service");
        Ok(())
    }

    /// Browse for the peer advertising `id` (device name or device id),
    /// blocking until it resolves or the timeout passes.
    fn browse_for(&self, id: &str, timeout: Duration) -> Result<SocketAddr> {
        let receiver = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| Error::Discovery(e.to_string()))?;

        let deadline = Instant::now() + timeout;
        let found = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break None;
            }
            match receiver.recv_timeout(remaining) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    let props = info.get_properties();
                    let peer_id = props.get("id").map(|v| v.val_str().to_string());
                    let peer_name = props.get("name").map(|v| v.val_str().to_string());

                    if peer_id.as_deref() == Some(&self.our_device_id) {
                        continue;
                    }
                    if peer_id.as_deref() != Some(id) && peer_name.as_deref() != Some(id) {
                        continue;
                    }
                    match info.get_addresses().iter().next() {
                        Some(addr) => break Some(SocketAddr::new(*addr, info.get_port())),
                        None => continue,
                    }
                }
                Ok(_) => continue,
                Err(_) => break None,
            }
        };

        let _ = self.daemon.stop_browse(SERVICE_TYPE);

        found.ok_or_else(|| Error::Discovery(format!("no peer found for handle {:?}", id)))
    }

    /// Shutdown the discovery daemon
    pub fn shutdown(self) -> Result<()> {
        self.daemon.shutdown().map_err(|e| Error::Discovery(e.to_string()))?;
        Ok(())
    }
}

impl AddressDiscovery for MdnsDiscovery {
    fn discover(&self, id: &str) -> Result<SocketAddr> {
        self.browse_for(id, DISCOVERY_TIMEOUT)
    }
}

/// Get local IP addresses (non-loopback)
pub fn get_local_ips() -> Vec<std::net::IpAddr> {
    let mut ips = Vec::new();

    if let Ok(interfaces) = get_if_addrs::get_if_addrs() {
        for iface in interfaces {
            if !iface.is_loopback() {
                ips.push(iface.ip());
            }
        }
    }

    ips
}
