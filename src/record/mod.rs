//! Sentinel-tagged configuration records
//!
//! Every record field starts *unset*; a dialect reader may set it, or may
//! explicitly clear it. The three states are what make multi-source
//! default-merging correct: a later source may fill an unset field, but
//! must never override "the configuration said nothing goes here".
// (c) 2025 Ross Younger

mod dialer;
mod port;
mod system;

pub use dialer::{Dialer, DialerConf};
pub use port::{DialerChoice, DialerSel, Port, PortConf, PortType};
pub use system::{PortChoice, PortSel, ProtoParam, System, SystemConf};

use serde::Serialize;

use crate::cmdtab::CmdRet;
use crate::errors::{Error, ErrorKind, Result};

/// A tri-state record field.
///
/// This replaces the pointer-identity "unset" sentinel of older systems
/// with a tagged value: `Unset` (never touched; a merge step may fill it),
/// `Empty` (explicitly "nothing here"; a merge step must leave it alone),
/// `Set` (real data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Field<T> {
    /// Never touched by any configuration source
    #[default]
    Unset,
    /// Explicitly configured as absent
    Empty,
    /// Configured with a value
    Set(T),
}

impl<T> Field<T> {
    /// True when no source has touched this field
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    /// True when the field holds a value
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    /// Borrows the value, if one is set
    #[must_use]
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Field::Set(v) => Some(v),
            _ => None,
        }
    }

    /// `Set` becomes `Some`; `Unset` and `Empty` become `None`
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Final-defaulting for plain fields: `Unset` takes the baseline,
    /// `Empty` collapses to the baseline too (there is no "none" for a
    /// mandatory scalar), `Set` keeps its value.
    #[must_use]
    pub fn resolve_or(self, baseline: T) -> T {
        match self {
            Field::Set(v) => v,
            _ => baseline,
        }
    }

    /// Final-defaulting for optional fields: the baseline applies only to
    /// `Unset`; an explicit `Empty` stays `None`.
    #[must_use]
    pub fn resolve_opt(self, baseline: Option<T>) -> Option<T> {
        match self {
            Field::Set(v) => Some(v),
            Field::Empty => None,
            Field::Unset => baseline,
        }
    }
}

impl<T: Clone> Field<T> {
    /// The core merge step: if (and only if) this field is still unset,
    /// take the other side's state — including an explicit `Empty`.
    pub fn or_inherit(&mut self, defaults: &Field<T>) {
        if self.is_unset() {
            *self = defaults.clone();
        }
    }
}

/// An expect/send conversation, before final defaulting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatConf {
    /// Expect/send token pairs
    pub script: Field<Vec<String>>,
    /// Program to run instead of (or as part of) the conversation
    pub program: Field<Vec<String>>,
    /// Seconds to wait for each expect string
    pub timeout: Field<i32>,
    /// Strings which, if seen, abort the conversation
    pub fail: Field<Vec<String>>,
}

impl ChatConf {
    /// Field-wise default merge
    pub fn merge_defaults(&mut self, defaults: &ChatConf) {
        self.script.or_inherit(&defaults.script);
        self.program.or_inherit(&defaults.program);
        self.timeout.or_inherit(&defaults.timeout);
        self.fail.or_inherit(&defaults.fail);
    }

    /// Converts to the resolved form, applying baselines to fields no
    /// source touched
    #[must_use]
    pub fn resolve(self, baseline_script: &[&str], baseline_timeout: u32) -> Chat {
        Chat {
            script: self
                .script
                .resolve_or(baseline_script.iter().map(ToString::to_string).collect()),
            program: self.program.resolve_or(Vec::new()),
            timeout: self
                .timeout
                .into_option()
                .and_then(|t| u32::try_from(t).ok())
                .unwrap_or(baseline_timeout),
            fail: self.fail.resolve_or(Vec::new()),
        }
    }
}

/// A fully-resolved expect/send conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chat {
    /// Expect/send token pairs; empty means no conversation
    pub script: Vec<String>,
    /// Program to run, with arguments; empty means none
    pub program: Vec<String>,
    /// Seconds to wait for each expect string
    pub timeout: u32,
    /// Abort strings
    pub fail: Vec<String>,
}

/// The canonical login conversation used when a system specifies none:
/// wait for a login prompt (sending BREAK to hurry it along), send the
/// login name, wait for the password prompt, send the password.
pub const DEFAULT_LOGIN_SCRIPT: &[&str] = &[
    "",
    "\\r\\c",
    "ogin:-BREAK-ogin:-BREAK-ogin:",
    "\\L",
    "word:",
    "\\P",
];

/// Baseline timeout for conversations held while placing a call
pub const DEFAULT_CALL_CHAT_TIMEOUT: u32 = 10;
/// Baseline timeout for conversations held while being called
pub const DEFAULT_CALLED_CHAT_TIMEOUT: u32 = 60;

/// Shared handler for the `chat*` prefix-command family. `label` is the
/// matched prefix (for error messages); `rest` is the keyword remainder.
pub(crate) fn chat_command(
    label: &str,
    chat: &mut ChatConf,
    rest: &str,
    args: &[&str],
) -> Result<CmdRet> {
    let bad_count = |expected: &str| {
        Error::from(ErrorKind::BadArgCount {
            keyword: format!("{label}{rest}"),
            expected: expected.to_string(),
            got: args.len(),
        })
    };
    if rest.is_empty() {
        chat.script = Field::Set(args.iter().map(ToString::to_string).collect());
    } else if rest.eq_ignore_ascii_case("-timeout") {
        if args.len() != 1 {
            return Err(bad_count("exactly 1"));
        }
        let t: i32 = args[0]
            .parse()
            .map_err(|_| ErrorKind::BadNumber(args[0].to_string()))?;
        chat.timeout = Field::Set(t);
    } else if rest.eq_ignore_ascii_case("-program") {
        chat.program = Field::Set(args.iter().map(ToString::to_string).collect());
    } else if rest.eq_ignore_ascii_case("-fail") {
        if args.len() != 1 {
            return Err(bad_count("exactly 1"));
        }
        match &mut chat.fail {
            Field::Set(v) => v.push(args[0].to_string()),
            f => *f = Field::Set(vec![args[0].to_string()]),
        }
    }
    // unrecognised chat subcommands are skipped, like any unknown keyword
    Ok(CmdRet::Continue)
}

#[cfg(test)]
mod test {
    use super::{chat_command, Chat, ChatConf, Field, DEFAULT_LOGIN_SCRIPT};
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_fields_are_unset() {
        let f: Field<String> = Field::default();
        assert!(f.is_unset());
        assert!(!f.is_set());
        assert_eq!(f.as_set(), None);
    }

    #[test]
    fn inherit_fills_only_unset() {
        let mut f: Field<i32> = Field::Unset;
        f.or_inherit(&Field::Set(5));
        assert_eq!(f, Field::Set(5));

        let mut f = Field::Set(1);
        f.or_inherit(&Field::Set(5));
        assert_eq!(f, Field::Set(1));

        // an explicit Empty is never overridden...
        let mut f: Field<i32> = Field::Empty;
        f.or_inherit(&Field::Set(5));
        assert_eq!(f, Field::Empty);

        // ...and is itself inherited into an unset field
        let mut f: Field<i32> = Field::Unset;
        f.or_inherit(&Field::Empty);
        assert_eq!(f, Field::Empty);
    }

    #[test]
    fn resolve_opt_keeps_explicit_empty() {
        assert_eq!(Field::<i32>::Unset.resolve_opt(Some(9)), Some(9));
        assert_eq!(Field::<i32>::Empty.resolve_opt(Some(9)), None);
        assert_eq!(Field::Set(4).resolve_opt(Some(9)), Some(4));
    }

    #[test]
    fn chat_resolution_baselines() {
        let chat = ChatConf::default().resolve(DEFAULT_LOGIN_SCRIPT, 10);
        assert_eq!(
            chat,
            Chat {
                script: DEFAULT_LOGIN_SCRIPT.iter().map(ToString::to_string).collect(),
                program: vec![],
                timeout: 10,
                fail: vec![],
            }
        );

        // an explicitly empty script stays empty
        let conf = ChatConf {
            script: Field::Set(vec![]),
            ..ChatConf::default()
        };
        assert!(conf.resolve(DEFAULT_LOGIN_SCRIPT, 10).script.is_empty());
    }

    #[test]
    fn chat_subcommands() {
        let mut chat = ChatConf::default();
        chat_command("chat", &mut chat, "", &["ogin:", "\\L"]).unwrap();
        chat_command("chat", &mut chat, "-timeout", &["30"]).unwrap();
        chat_command("chat", &mut chat, "-fail", &["BUSY"]).unwrap();
        chat_command("chat", &mut chat, "-fail", &["NO CARRIER"]).unwrap();
        assert_eq!(
            chat.script,
            Field::Set(vec!["ogin:".to_string(), "\\L".to_string()])
        );
        assert_eq!(chat.timeout, Field::Set(30));
        assert_eq!(
            chat.fail,
            Field::Set(vec!["BUSY".to_string(), "NO CARRIER".to_string()])
        );
    }

    #[test]
    fn chat_timeout_argument_count() {
        let mut chat = ChatConf::default();
        let err = chat_command("called-chat", &mut chat, "-timeout", &["1", "2"]).unwrap_err();
        match err.kind {
            ErrorKind::BadArgCount { keyword, .. } => {
                assert_eq!(keyword, "called-chat-timeout");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(chat.timeout.is_unset());
    }
}
