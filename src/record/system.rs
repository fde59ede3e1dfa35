//! The system record: everything known about one remote system
// (c) 2025 Ross Younger

use serde::Serialize;

use super::port::{Port, PortConf};
use super::{
    Chat, ChatConf, Field, DEFAULT_CALLED_CHAT_TIMEOUT, DEFAULT_CALL_CHAT_TIMEOUT,
    DEFAULT_LOGIN_SCRIPT,
};
use crate::timespan::TimeSpanList;

/// Baseline maximum number of times to retry a failing call
pub const DEFAULT_MAX_RETRIES: u32 = 26;
/// Baseline command allow-list
pub const DEFAULT_COMMANDS: &[&str] = &["rnews", "rmail"];
/// Baseline public directory
pub const DEFAULT_PUBDIR: &str = "/usr/spool/uucppublic";

/// How a system selects its port: by name, or with an inline anonymous
/// port built from port commands given directly in the system entry
#[derive(Debug, Clone, PartialEq)]
pub enum PortSel {
    /// Look the port up by name
    Named(String),
    /// An anonymous port defined inline
    Inline(Box<PortConf>),
}

/// The resolved form of [`PortSel`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PortChoice {
    /// Look the port up by name
    Named(String),
    /// An anonymous port defined inline
    Inline(Box<Port>),
}

/// Parameters for one protocol, keyed by its single-character tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtoParam {
    /// The protocol's tag character
    pub protocol: char,
    /// Ordered argument vectors, one per `protocol-parameter` line
    pub entries: Vec<Vec<String>>,
}

/// Merge rule for protocol parameter tables: a tag present only in the
/// defaults is appended wholesale; a tag present in both sides is left as
/// the target's, with no sub-merge below the tag.
pub(crate) fn merge_proto_params(target: &mut Vec<ProtoParam>, defaults: &[ProtoParam]) {
    for d in defaults {
        if !target.iter().any(|t| t.protocol == d.protocol) {
            target.push(d.clone());
        }
    }
}

/// A system record under construction: every field tracks whether any
/// configuration source has touched it. Alternates are records of the
/// same shape, nested one level deep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemConf {
    /// The system's primary name
    pub name: String,
    /// Other names this record answers to
    pub aliases: Vec<String>,
    /// Login name to present when calling out
    pub call_login: Field<String>,
    /// Password to present when calling out
    pub call_password: Field<String>,
    /// Login name the remote system must use when calling us
    pub called_login: Field<String>,
    /// Conversation held after connecting, when calling out
    pub call_chat: ChatConf,
    /// Conversation held when the remote calls us
    pub called_chat: ChatConf,
    /// Port selection: a name to look up, or an inline anonymous port
    pub port: Field<PortSel>,
    /// Line speed constraint
    pub speed: Field<i64>,
    /// Phone number, or network address
    pub phone: Field<String>,
    /// When we may call, and what grade of work may flow
    pub timegrade: Field<TimeSpanList>,
    /// Maximum bytes for locally-queued work when we place the call
    pub call_local_size: Field<TimeSpanList>,
    /// Maximum bytes for remote requests when we place the call
    pub call_remote_size: Field<TimeSpanList>,
    /// Maximum bytes for locally-queued work when the remote calls
    pub called_local_size: Field<TimeSpanList>,
    /// Maximum bytes for remote requests when the remote calls
    pub called_remote_size: Field<TimeSpanList>,
    /// Commands the remote may execute here
    pub commands: Field<Vec<String>>,
    /// Directories local requests may be sent from
    pub local_send: Field<Vec<String>>,
    /// Directories the remote may request files from
    pub remote_send: Field<Vec<String>>,
    /// Directories local requests may receive into
    pub local_receive: Field<Vec<String>>,
    /// Directories the remote may send files into
    pub remote_receive: Field<Vec<String>>,
    /// Systems allowed to forward through us to this one
    pub forward_from: Field<Vec<String>>,
    /// Systems we will forward traffic onward to
    pub forward_to: Field<Vec<String>>,
    /// Protocol preference string
    pub protocols: Field<String>,
    /// Per-protocol parameter table
    pub proto_params: Vec<ProtoParam>,
    /// Whether we may request files when we placed the call
    pub call_request: Field<bool>,
    /// Whether the remote may request files
    pub called_request: Field<bool>,
    /// Whether we send queued work when we placed the call
    pub call_transfer: Field<bool>,
    /// Whether we send queued work when the remote called
    pub called_transfer: Field<bool>,
    /// Maximum call retries before giving up
    pub max_retries: Field<i32>,
    /// Seconds a call must stay up to count as a success
    pub success_wait: Field<i32>,
    /// Public directory, used to resolve `~` in path lists
    pub pubdir: Field<String>,
    /// Alternate credential/schedule/port combinations, tried in order
    pub alternates: Vec<SystemConf>,
}

impl SystemConf {
    /// A fresh record with every field unset
    #[must_use]
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// This record's base settings with the alternate chain stripped;
    /// used to seed new alternates
    #[must_use]
    pub fn base_only(&self) -> Self {
        let mut c = self.clone();
        c.alternates.clear();
        c
    }

    /// True if `name` is this record's name or one of its aliases
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    fn merge_fields(&mut self, defaults: &SystemConf) {
        self.call_login.or_inherit(&defaults.call_login);
        self.call_password.or_inherit(&defaults.call_password);
        self.called_login.or_inherit(&defaults.called_login);
        self.call_chat.merge_defaults(&defaults.call_chat);
        self.called_chat.merge_defaults(&defaults.called_chat);
        self.port.or_inherit(&defaults.port);
        self.speed.or_inherit(&defaults.speed);
        self.phone.or_inherit(&defaults.phone);
        self.timegrade.or_inherit(&defaults.timegrade);
        self.call_local_size.or_inherit(&defaults.call_local_size);
        self.call_remote_size.or_inherit(&defaults.call_remote_size);
        self.called_local_size.or_inherit(&defaults.called_local_size);
        self.called_remote_size.or_inherit(&defaults.called_remote_size);
        self.commands.or_inherit(&defaults.commands);
        self.local_send.or_inherit(&defaults.local_send);
        self.remote_send.or_inherit(&defaults.remote_send);
        self.local_receive.or_inherit(&defaults.local_receive);
        self.remote_receive.or_inherit(&defaults.remote_receive);
        self.forward_from.or_inherit(&defaults.forward_from);
        self.forward_to.or_inherit(&defaults.forward_to);
        self.protocols.or_inherit(&defaults.protocols);
        merge_proto_params(&mut self.proto_params, &defaults.proto_params);
        self.call_request.or_inherit(&defaults.call_request);
        self.called_request.or_inherit(&defaults.called_request);
        self.call_transfer.or_inherit(&defaults.call_transfer);
        self.called_transfer.or_inherit(&defaults.called_transfer);
        self.max_retries.or_inherit(&defaults.max_retries);
        self.success_wait.or_inherit(&defaults.success_wait);
        self.pubdir.or_inherit(&defaults.pubdir);
        if self.aliases.is_empty() {
            self.aliases.clone_from(&defaults.aliases);
        }
    }

    /// Merges `defaults` into this record: every field still unset takes
    /// the default side's state.
    ///
    /// With `add_missing_alternates`, a defaults side with a longer
    /// alternate chain first extends this record's chain with clones of
    /// its first alternate (or of the base, if it has none); then the
    /// chains merge pairwise, so the appended entries end up carrying the
    /// extra default alternates' settings over this record's values.
    pub fn merge_defaults(&mut self, defaults: &SystemConf, add_missing_alternates: bool) {
        self.merge_fields(defaults);
        if add_missing_alternates && defaults.alternates.len() > self.alternates.len() {
            let seed = self
                .alternates
                .first()
                .cloned()
                .unwrap_or_else(|| self.base_only());
            while self.alternates.len() < defaults.alternates.len() {
                self.alternates.push(seed.base_only());
            }
        }
        for (alt, def) in self.alternates.iter_mut().zip(defaults.alternates.iter()) {
            alt.merge_fields(def);
        }
    }

    /// Applies the final baselines, converting every field no source
    /// touched into its documented default, and producing the concrete
    /// record handed to callers. Runs exactly once per resolution.
    #[must_use]
    pub fn finalize(self) -> System {
        let alternates = self
            .alternates
            .into_iter()
            .map(SystemConf::finalize)
            .collect();
        System {
            name: self.name,
            aliases: self.aliases,
            call_login: self.call_login.resolve_opt(None),
            call_password: self.call_password.resolve_opt(None),
            called_login: self.called_login.resolve_opt(None),
            call_chat: self
                .call_chat
                .resolve(DEFAULT_LOGIN_SCRIPT, DEFAULT_CALL_CHAT_TIMEOUT),
            called_chat: self.called_chat.resolve(&[], DEFAULT_CALLED_CHAT_TIMEOUT),
            port: match self.port {
                Field::Set(PortSel::Named(n)) => Some(PortChoice::Named(n)),
                Field::Set(PortSel::Inline(p)) => {
                    Some(PortChoice::Inline(Box::new(p.finalize())))
                }
                _ => None,
            },
            speed: self.speed.resolve_opt(None),
            phone: self.phone.resolve_opt(None),
            timegrade: self.timegrade.resolve_or(TimeSpanList::new()),
            call_local_size: self.call_local_size.resolve_or(TimeSpanList::new()),
            call_remote_size: self.call_remote_size.resolve_or(TimeSpanList::new()),
            called_local_size: self.called_local_size.resolve_or(TimeSpanList::new()),
            called_remote_size: self.called_remote_size.resolve_or(TimeSpanList::new()),
            commands: self
                .commands
                .resolve_or(DEFAULT_COMMANDS.iter().map(ToString::to_string).collect()),
            local_send: self.local_send.resolve_or(vec!["/".to_string()]),
            remote_send: self.remote_send.resolve_or(vec!["~".to_string()]),
            local_receive: self.local_receive.resolve_or(vec!["~".to_string()]),
            remote_receive: self.remote_receive.resolve_or(vec!["~".to_string()]),
            forward_from: self.forward_from.resolve_or(Vec::new()),
            forward_to: self.forward_to.resolve_or(Vec::new()),
            protocols: self.protocols.resolve_opt(None),
            proto_params: self.proto_params,
            call_request: self.call_request.resolve_or(true),
            called_request: self.called_request.resolve_or(true),
            call_transfer: self.call_transfer.resolve_or(true),
            called_transfer: self.called_transfer.resolve_or(true),
            max_retries: self
                .max_retries
                .into_option()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            success_wait: self
                .success_wait
                .into_option()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            pubdir: self.pubdir.resolve_or(DEFAULT_PUBDIR.to_string()),
            alternates,
        }
    }
}

/// A fully-resolved system record. No field in here distinguishes "unset"
/// any more; the final defaulting pass has already run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct System {
    /// The system's primary name
    pub name: String,
    /// Other names this record answers to
    pub aliases: Vec<String>,
    /// Login name to present when calling out
    pub call_login: Option<String>,
    /// Password to present when calling out
    pub call_password: Option<String>,
    /// Login name the remote system must use when calling us
    pub called_login: Option<String>,
    /// Conversation held after connecting, when calling out
    pub call_chat: Chat,
    /// Conversation held when the remote calls us
    pub called_chat: Chat,
    /// Port selection, if any
    pub port: Option<PortChoice>,
    /// Line speed constraint
    pub speed: Option<i64>,
    /// Phone number, or network address
    pub phone: Option<String>,
    /// When we may call; empty means never
    pub timegrade: TimeSpanList,
    /// Size limits; empty means unlimited
    pub call_local_size: TimeSpanList,
    /// Size limits; empty means unlimited
    pub call_remote_size: TimeSpanList,
    /// Size limits; empty means unlimited
    pub called_local_size: TimeSpanList,
    /// Size limits; empty means unlimited
    pub called_remote_size: TimeSpanList,
    /// Commands the remote may execute here
    pub commands: Vec<String>,
    /// Directories local requests may be sent from
    pub local_send: Vec<String>,
    /// Directories the remote may request files from
    pub remote_send: Vec<String>,
    /// Directories local requests may receive into
    pub local_receive: Vec<String>,
    /// Directories the remote may send files into
    pub remote_receive: Vec<String>,
    /// Systems allowed to forward through us to this one
    pub forward_from: Vec<String>,
    /// Systems we will forward traffic onward to
    pub forward_to: Vec<String>,
    /// Protocol preference string; `None` means any
    pub protocols: Option<String>,
    /// Per-protocol parameter table
    pub proto_params: Vec<ProtoParam>,
    /// Whether we may request files when we placed the call
    pub call_request: bool,
    /// Whether the remote may request files
    pub called_request: bool,
    /// Whether we send queued work when we placed the call
    pub call_transfer: bool,
    /// Whether we send queued work when the remote called
    pub called_transfer: bool,
    /// Maximum call retries before giving up
    pub max_retries: u32,
    /// Seconds a call must stay up to count as a success
    pub success_wait: u32,
    /// Public directory, used to resolve `~` in path lists
    pub pubdir: String,
    /// Alternates, tried in declaration order
    pub alternates: Vec<System>,
}
