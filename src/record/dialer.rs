//! The dialer record: how to drive a modem
// (c) 2025 Ross Younger

use serde::Serialize;

use super::{Chat, ChatConf, Field};

/// Baseline timeout for dialer conversations
pub const DEFAULT_DIALER_CHAT_TIMEOUT: u32 = 60;
/// Baseline seconds to wait for carrier after dialing
pub const DEFAULT_CARRIER_WAIT: u32 = 60;
/// Baseline substitution for a wait-for-dialtone marker in a phone number
pub const DEFAULT_DIALTONE: &str = ",";
/// Baseline substitution for a pause marker in a phone number
pub const DEFAULT_PAUSE: &str = ",";

/// A dialer record under construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialerConf {
    /// The dialer's name
    pub name: String,
    /// The conversation that places the call
    pub chat: ChatConf,
    /// Run after the call completes normally
    pub complete_chat: ChatConf,
    /// Run when the call is aborted
    pub abort_chat: ChatConf,
    /// Substitution for the wait-for-dialtone marker (`=`)
    pub dialtone: Field<String>,
    /// Substitution for the pause marker (`-`)
    pub pause: Field<String>,
    /// Whether to require carrier once connected
    pub carrier: Field<bool>,
    /// Seconds to wait for carrier
    pub carrier_wait: Field<i32>,
    /// Whether to toggle DTR before dialing
    pub dtr_toggle: Field<bool>,
}

impl DialerConf {
    /// A fresh record with every field unset
    #[must_use]
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Field-wise default merge
    pub fn merge_defaults(&mut self, defaults: &DialerConf) {
        self.chat.merge_defaults(&defaults.chat);
        self.complete_chat.merge_defaults(&defaults.complete_chat);
        self.abort_chat.merge_defaults(&defaults.abort_chat);
        self.dialtone.or_inherit(&defaults.dialtone);
        self.pause.or_inherit(&defaults.pause);
        self.carrier.or_inherit(&defaults.carrier);
        self.carrier_wait.or_inherit(&defaults.carrier_wait);
        self.dtr_toggle.or_inherit(&defaults.dtr_toggle);
    }

    /// Applies the final baselines and produces the concrete record
    #[must_use]
    pub fn finalize(self) -> Dialer {
        Dialer {
            name: self.name,
            chat: self.chat.resolve(&[], DEFAULT_DIALER_CHAT_TIMEOUT),
            complete_chat: self.complete_chat.resolve(&[], DEFAULT_DIALER_CHAT_TIMEOUT),
            abort_chat: self.abort_chat.resolve(&[], DEFAULT_DIALER_CHAT_TIMEOUT),
            dialtone: self.dialtone.resolve_or(DEFAULT_DIALTONE.to_string()),
            pause: self.pause.resolve_or(DEFAULT_PAUSE.to_string()),
            carrier: self.carrier.resolve_or(true),
            carrier_wait: self
                .carrier_wait
                .into_option()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(DEFAULT_CARRIER_WAIT),
            dtr_toggle: self.dtr_toggle.resolve_or(false),
        }
    }
}

/// A fully-resolved dialer record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dialer {
    /// The dialer's name
    pub name: String,
    /// The conversation that places the call
    pub chat: Chat,
    /// Run after the call completes normally
    pub complete_chat: Chat,
    /// Run when the call is aborted
    pub abort_chat: Chat,
    /// Substitution for the wait-for-dialtone marker (`=`)
    pub dialtone: String,
    /// Substitution for the pause marker (`-`)
    pub pause: String,
    /// Whether to require carrier once connected
    pub carrier: bool,
    /// Seconds to wait for carrier
    pub carrier_wait: u32,
    /// Whether to toggle DTR before dialing
    pub dtr_toggle: bool,
}

#[cfg(test)]
mod test {
    use super::DialerConf;
    use crate::record::Field;
    use pretty_assertions::assert_eq;

    #[test]
    fn finalize_baselines() {
        let d = DialerConf::new("hayes").finalize();
        assert_eq!(d.chat.timeout, 60);
        assert_eq!(d.dialtone, ",");
        assert_eq!(d.pause, ",");
        assert!(d.carrier);
        assert_eq!(d.carrier_wait, 60);
        assert!(!d.dtr_toggle);
    }

    #[test]
    fn merge_chats() {
        let mut d = DialerConf::new("hayes");
        let mut defs = DialerConf::new("");
        defs.chat.script = Field::Set(vec!["ATDT\\T".to_string()]);
        defs.carrier = Field::Set(false);
        d.merge_defaults(&defs);
        assert_eq!(d.chat.script, Field::Set(vec!["ATDT\\T".to_string()]));
        assert_eq!(d.carrier, Field::Set(false));
    }
}
