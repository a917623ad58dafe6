// Copyright (c) 2024 Damir Jelić
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::{net::Ipv4Addr, process::Command, str::FromStr};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::persistence::Persistence;

/// How the ethernet interface of the controller is configured.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EthernetMode {
    /// The link is down.
    Down,
    /// Address, gateway and DNS server are configured manually.
    Static,
    DhcpClient,
    DhcpServer,
    /// The controller leaves the network configuration alone.
    #[default]
    Unmanaged,
}

/// The ethernet configuration as it travels over the API and onto disk.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetConfig {
    pub mode: EthernetMode,
    /// IP address and subnet in CIDR notation.
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("ethernet configuration is unmanaged")]
    Unmanaged,
    #[error("ethernet configuration has invalid mode")]
    InvalidMode,
    #[error("ethernet configuration has invalid ip address or subnet")]
    InvalidAddress,
    #[error("ethernet configuration has invalid gateway")]
    InvalidGateway,
    #[error("ethernet configuration has invalid DNS server")]
    InvalidDns,
    #[error("ethernet configuration with DHCP is not implemented yet")]
    DhcpUnimplemented,
}

#[derive(Debug, Default, Clone)]
struct EthernetState {
    mode: EthernetMode,
    ip: Option<(Ipv4Addr, u8)>,
    gateway: Option<Ipv4Addr>,
    dns: Option<Ipv4Addr>,
}

const ETHERNET_CONFIG: &str = "ethernet";

/// Controller-level hardware that is not the LED chain: the managed ethernet
/// interface and the power switch.
#[derive(Debug)]
pub struct System {
    interface: String,
    state: Mutex<EthernetState>,
}

impl System {
    /// Set up the system hardware. With a managed interface the stored
    /// ethernet configuration is loaded and applied; if that fails the link
    /// is taken down until an operator pushes a new configuration.
    pub fn new(interface: &str, persistence: &Persistence) -> Self {
        let system = Self {
            interface: interface.to_owned(),
            state: Mutex::new(EthernetState::default()),
        };

        if !interface.is_empty() {
            match persistence.load_config::<EthernetConfig>(ETHERNET_CONFIG) {
                Ok(config) => {
                    if let Err(error) = system.set_ethernet_config(config, persistence) {
                        warn!("Cannot load the stored ethernet configuration: {error}");
                        system.take_down();
                    }
                }
                Err(error) => {
                    warn!("Failed to read the stored ethernet configuration: {error}");
                    system.take_down();
                }
            }
        }

        system
    }

    /// Whether the controller manages the ethernet interface at all.
    pub fn is_managed(&self) -> bool {
        !self.interface.is_empty()
    }

    /// The currently active ethernet configuration.
    pub fn ethernet_config(&self) -> EthernetConfig {
        if !self.is_managed() {
            return EthernetConfig::default();
        }

        let state = self.state.lock();

        EthernetConfig {
            mode: state.mode,
            ip: state
                .ip
                .map(|(ip, prefix)| format!("{ip}/{prefix}"))
                .unwrap_or_default(),
            gateway: state.gateway.map(|g| g.to_string()).unwrap_or_default(),
            dns: state.dns.map(|d| d.to_string()).unwrap_or_default(),
        }
    }

    /// Validate, store and apply a new ethernet configuration.
    pub fn set_ethernet_config(
        &self,
        config: EthernetConfig,
        persistence: &Persistence,
    ) -> Result<(), SystemError> {
        if !self.is_managed() {
            return Err(SystemError::Unmanaged);
        }

        let mut new_state = EthernetState {
            mode: config.mode,
            ..Default::default()
        };

        // Address, gateway and DNS only matter for a static setup or when we
        // hand out leases ourselves.
        if matches!(config.mode, EthernetMode::Static | EthernetMode::DhcpServer) {
            new_state.ip = Some(parse_cidr(&config.ip).ok_or(SystemError::InvalidAddress)?);

            if !config.gateway.is_empty() {
                new_state.gateway =
                    Some(Ipv4Addr::from_str(&config.gateway).map_err(|_| {
                        SystemError::InvalidGateway
                    })?);
            }

            new_state.dns =
                Some(Ipv4Addr::from_str(&config.dns).map_err(|_| SystemError::InvalidDns)?);
        }

        if matches!(config.mode, EthernetMode::DhcpClient | EthernetMode::DhcpServer) {
            return Err(SystemError::DhcpUnimplemented);
        }

        if config.mode == EthernetMode::Unmanaged {
            return Err(SystemError::InvalidMode);
        }

        let changed = {
            let mut state = self.state.lock();

            let changed = state.mode != new_state.mode
                || state.ip != new_state.ip
                || state.gateway != new_state.gateway
                || state.dns != new_state.dns;

            if changed {
                *state = new_state;
            }

            changed
        };

        if changed {
            if let Err(error) = persistence.save_config(ETHERNET_CONFIG, &self.ethernet_config(), false)
            {
                warn!("Failed to store the ethernet configuration: {error}");
            }

            self.reconfigure();
        }

        Ok(())
    }

    /// Power the controller off. Only returns on failure.
    pub fn shutdown(&self) {
        if let Err(error) = Command::new("poweroff").status() {
            error!("Failed to power off the controller: {error}");
        }
    }

    fn take_down(&self) {
        self.state.lock().mode = EthernetMode::Down;
        self.reconfigure();
    }

    /// Apply the in-memory ethernet state to the actual interface with the
    /// `ip` tool. Failures are logged, there is nothing a caller could do
    /// about a half-configured interface anyway.
    fn reconfigure(&self) {
        let state = self.state.lock().clone();

        if state.mode == EthernetMode::Unmanaged {
            return;
        }

        run_ip(&["addr", "flush", "dev", &self.interface], "flush the network interface");
        run_ip(&["route", "del", "default"], "remove the default gateway");

        let link_state = if state.mode == EthernetMode::Down { "down" } else { "up" };
        run_ip(
            &["link", "set", "dev", &self.interface, link_state],
            "change the network interface state",
        );

        if matches!(state.mode, EthernetMode::Static | EthernetMode::DhcpServer) {
            if let Some((ip, prefix)) = state.ip {
                run_ip(
                    &["addr", "add", &format!("{ip}/{prefix}"), "dev", &self.interface],
                    "set the IP address",
                );
            }

            if let Some(gateway) = state.gateway {
                run_ip(
                    &[
                        "route",
                        "add",
                        "default",
                        "via",
                        &gateway.to_string(),
                        "dev",
                        &self.interface,
                    ],
                    "set the default gateway",
                );
            }

            if let Some(dns) = state.dns {
                if let Err(error) =
                    std::fs::write("/etc/resolv.conf", format!("nameserver {dns}\n"))
                {
                    warn!("Failed to set the DNS server: {error}");
                }
            }
        }
    }
}

fn run_ip(args: &[&str], what: &str) {
    match Command::new("ip").args(args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Failed to {what}: ip exited with {status}"),
        Err(error) => warn!("Failed to {what}: {error}"),
    }
}

/// Parse an IPv4 address with prefix in CIDR notation, like `10.0.0.2/24`.
fn parse_cidr(input: &str) -> Option<(Ipv4Addr, u8)> {
    let (ip, prefix) = input.split_once('/')?;

    let ip = Ipv4Addr::from_str(ip).ok()?;
    let prefix = u8::from_str(prefix).ok()?;

    (prefix <= 32).then_some((ip, prefix))
}
