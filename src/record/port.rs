//! The port record: one way of reaching the outside world
// (c) 2025 Ross Younger

use serde::Serialize;

use super::dialer::{Dialer, DialerConf};
use super::Field;

/// The kind of connection a port makes
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Standard input/output (we were invoked on the connection)
    #[default]
    Stdin,
    /// A modem on a serial device
    Modem,
    /// A hard-wired serial line
    Direct,
    /// A TCP connection
    Tcp,
    /// A TLI transport endpoint
    Tli,
}

/// How a port reaches its dialer: by name, or defined inline
#[derive(Debug, Clone, PartialEq)]
pub enum DialerSel {
    /// Look the dialer up by name
    Named(String),
    /// An anonymous dialer defined inline
    Inline(Box<DialerConf>),
}

/// The resolved form of [`DialerSel`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DialerChoice {
    /// Look the dialer up by name
    Named(String),
    /// An anonymous dialer defined inline
    Inline(Box<Dialer>),
}

/// A port record under construction.
///
/// The three reliability flags are each independently
/// specifiable-or-unspecified; `Field<bool>` carries that extra bit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortConf {
    /// The port's name (for a legacy device table, the device type tag)
    pub name: String,
    /// What kind of connection this is
    pub port_type: Field<PortType>,
    /// Device node to open
    pub device: Field<String>,
    /// Line speed
    pub speed: Field<i64>,
    /// Whether to require carrier
    pub carrier: Field<bool>,
    /// Seven-bit line (parity stripped)
    pub seven_bit: Field<bool>,
    /// Whether the connection is error-free
    pub reliable: Field<bool>,
    /// Half-duplex line
    pub half_duplex: Field<bool>,
    /// Name to use for the lock file, when not the device name
    pub lockname: Field<String>,
    /// TCP service (port number or name)
    pub service: Field<String>,
    /// The dialer to use, by name or inline
    pub dialer: Field<DialerSel>,
}

impl PortConf {
    /// A fresh record with every field unset
    #[must_use]
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Field-wise default merge
    pub fn merge_defaults(&mut self, defaults: &PortConf) {
        self.port_type.or_inherit(&defaults.port_type);
        self.device.or_inherit(&defaults.device);
        self.speed.or_inherit(&defaults.speed);
        self.carrier.or_inherit(&defaults.carrier);
        self.seven_bit.or_inherit(&defaults.seven_bit);
        self.reliable.or_inherit(&defaults.reliable);
        self.half_duplex.or_inherit(&defaults.half_duplex);
        self.lockname.or_inherit(&defaults.lockname);
        self.service.or_inherit(&defaults.service);
        self.dialer.or_inherit(&defaults.dialer);
    }

    /// True if this port is compatible with the given name and speed
    /// constraints
    #[must_use]
    pub fn matches(&self, name: Option<&str>, speed: Option<i64>) -> bool {
        if let Some(n) = name {
            if self.name != n {
                return false;
            }
        }
        if let Some(s) = speed {
            if let Field::Set(ours) = self.speed {
                if ours != s {
                    return false;
                }
            }
        }
        true
    }

    /// Applies the final baselines and produces the concrete record
    #[must_use]
    pub fn finalize(self) -> Port {
        Port {
            name: self.name,
            port_type: self.port_type.resolve_or(PortType::Stdin),
            device: self.device.resolve_opt(None),
            speed: self.speed.resolve_opt(None),
            carrier: self.carrier.into_option(),
            seven_bit: self.seven_bit.into_option(),
            reliable: self.reliable.into_option(),
            half_duplex: self.half_duplex.into_option(),
            lockname: self.lockname.resolve_opt(None),
            service: self.service.resolve_opt(None),
            dialer: match self.dialer {
                Field::Set(DialerSel::Named(n)) => Some(DialerChoice::Named(n)),
                Field::Set(DialerSel::Inline(d)) => {
                    Some(DialerChoice::Inline(Box::new(d.finalize())))
                }
                _ => None,
            },
        }
    }
}

/// A fully-resolved port record.
///
/// The reliability flags stay `Option<bool>`: `None` means no source
/// specified them, which consumers treat differently from an explicit
/// answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    /// The port's name
    pub name: String,
    /// What kind of connection this is
    pub port_type: PortType,
    /// Device node to open
    pub device: Option<String>,
    /// Line speed
    pub speed: Option<i64>,
    /// Whether to require carrier
    pub carrier: Option<bool>,
    /// Seven-bit line (parity stripped)
    pub seven_bit: Option<bool>,
    /// Whether the connection is error-free
    pub reliable: Option<bool>,
    /// Half-duplex line
    pub half_duplex: Option<bool>,
    /// Lock file name override
    pub lockname: Option<String>,
    /// TCP service (port number or name)
    pub service: Option<String>,
    /// The dialer to use
    pub dialer: Option<DialerChoice>,
}

#[cfg(test)]
mod test {
    use super::{DialerSel, PortConf, PortType};
    use crate::record::Field;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn type_names() {
        assert_eq!(PortType::from_str("modem").unwrap(), PortType::Modem);
        assert_eq!(PortType::from_str("TCP").unwrap(), PortType::Tcp);
        assert!(PortType::from_str("wombat").is_err());
        assert_eq!(PortType::Direct.to_string(), "direct");
    }

    #[test]
    fn match_by_name_and_speed() {
        let mut p = PortConf::new("serial1");
        p.speed = Field::Set(9600);
        assert!(p.matches(None, None));
        assert!(p.matches(Some("serial1"), Some(9600)));
        assert!(!p.matches(Some("other"), None));
        assert!(!p.matches(None, Some(1200)));

        // a port with no speed set matches any speed constraint
        let p = PortConf::new("any-speed");
        assert!(p.matches(Some("any-speed"), Some(300)));
    }

    #[test]
    fn finalize_defaults_to_stdin() {
        let p = PortConf::new("p").finalize();
        assert_eq!(p.port_type, PortType::Stdin);
        assert_eq!(p.carrier, None);
        assert_eq!(p.reliable, None);
    }

    #[test]
    fn merge_respects_set_fields() {
        let mut p = PortConf::new("p");
        p.port_type = Field::Set(PortType::Modem);
        let mut d = PortConf::new("");
        d.port_type = Field::Set(PortType::Tcp);
        d.dialer = Field::Set(DialerSel::Named("hayes".to_string()));
        p.merge_defaults(&d);
        assert_eq!(p.port_type, Field::Set(PortType::Modem));
        assert_eq!(p.dialer, Field::Set(DialerSel::Named("hayes".to_string())));
    }
}
