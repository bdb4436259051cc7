use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Proxy modes the kernel can be driven in.
///
/// `System` routes traffic by registering a system-wide proxy; `Tun`
/// captures traffic at the network-interface level and requires elevated
/// privileges to activate.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProxyMode {
    /// System-wide proxy registration.
    #[default]
    System,
    /// TUN-interface capture.
    Tun,
}

/// Errors encountered while parsing a [`ProxyMode`] from text.
pub type ProxyModeParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_text() {
        assert_eq!(ProxyMode::System.to_string(), "system");
        assert_eq!(ProxyMode::from_str("tun").ok(), Some(ProxyMode::Tun));
        assert_eq!(ProxyMode::from_str("TUN").ok(), Some(ProxyMode::Tun));
    }
}
