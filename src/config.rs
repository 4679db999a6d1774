use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use tracing::{info, warn};

use crate::optimizer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "STOWPLAN_API_HOST";
    const PORT_VAR: &'static str = "STOWPLAN_API_PORT";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::HOST_VAR).as_deref(),
            env_string(Self::PORT_VAR).as_deref(),
        )
    }

    fn from_values(host: Option<&str>, port: Option<&str>) -> Self {
        let host_value = host.unwrap_or(Self::DEFAULT_HOST);
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value.to_string()),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = host_value,
                    %err,
                    "Could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = parse_with_default(
            Self::PORT_VAR,
            port,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Defaults for placement runs started through the API.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
}

impl OptimizerConfig {
    const RESOLUTION_VAR: &'static str = "STOWPLAN_RESOLUTION";
    const SUPPORT_RATIO_VAR: &'static str = "STOWPLAN_SUPPORT_RATIO";
    const FRONT_THRESHOLD_VAR: &'static str = "STOWPLAN_FRONT_PRIORITY_THRESHOLD";
    const MAX_GRID_CELLS_VAR: &'static str = "STOWPLAN_MAX_GRID_CELLS";
    const MAX_TOTAL_GRID_CELLS_VAR: &'static str = "STOWPLAN_MAX_TOTAL_GRID_CELLS";
    const ENFORCE_ZONES_VAR: &'static str = "STOWPLAN_ENFORCE_ZONES";

    fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let resolution = parse_with_default(
            Self::RESOLUTION_VAR,
            lookup(Self::RESOLUTION_VAR).as_deref(),
            PackingConfig::DEFAULT_RESOLUTION,
            |value| value > 0,
            "must be greater than 0",
        );

        let support_ratio = parse_with_default(
            Self::SUPPORT_RATIO_VAR,
            lookup(Self::SUPPORT_RATIO_VAR).as_deref(),
            PackingConfig::DEFAULT_SUPPORT_RATIO,
            |value: f64| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
        );

        let front_priority_threshold = parse_with_default(
            Self::FRONT_THRESHOLD_VAR,
            lookup(Self::FRONT_THRESHOLD_VAR).as_deref(),
            PackingConfig::DEFAULT_FRONT_PRIORITY_THRESHOLD,
            |value| (0..=10).contains(&value),
            "must be between 0 and 10",
        );

        let max_grid_cells = parse_with_default(
            Self::MAX_GRID_CELLS_VAR,
            lookup(Self::MAX_GRID_CELLS_VAR).as_deref(),
            PackingConfig::DEFAULT_MAX_GRID_CELLS,
            |value| value > 0,
            "must be greater than 0",
        );

        let max_total_grid_cells = parse_with_default(
            Self::MAX_TOTAL_GRID_CELLS_VAR,
            lookup(Self::MAX_TOTAL_GRID_CELLS_VAR).as_deref(),
            PackingConfig::DEFAULT_MAX_TOTAL_GRID_CELLS,
            |value| value > 0,
            "must be greater than 0",
        );

        let enforce_zones = lookup(Self::ENFORCE_ZONES_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ENFORCE_ZONES_VAR))
            .unwrap_or(PackingConfig::DEFAULT_ENFORCE_ZONES);

        let packing = PackingConfig::builder()
            .resolution(resolution)
            .support_ratio(support_ratio)
            .front_priority_threshold(front_priority_threshold)
            .max_grid_cells(max_grid_cells)
            .max_total_grid_cells(max_total_grid_cells)
            .enforce_zones(enforce_zones)
            .build();

        Self { packing }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(var = name, %err, "Access to variable failed, using default value");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                var = var_name,
                value = other,
                "Could not interpret value as boolean, using default value"
            );
            None
        }
    }
}

/// Parses `raw`, falling back to `default` when it is missing, malformed or rejected.
fn parse_with_default<T>(
    var_name: &str,
    raw: Option<&str>,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + PartialEq + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if validator(value) => {
            if value != default {
                info!(var = var_name, %value, "Using non-default setting");
            }
            value
        }
        Ok(_) => {
            warn!(
                var = var_name,
                value = raw,
                "Invalid value ({}), using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            warn!(var = var_name, value = raw, %err, "Could not parse value, using {}", default);
            default
        }
    }
}
