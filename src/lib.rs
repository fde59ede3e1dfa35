// (c) 2025 Ross Younger

//! Layered, format-agnostic UUCP configuration resolution.
//!
//! `uucfg` locates, parses, merges and defaults machine/port/dialer
//! records drawn from three mutually incompatible on-disk configuration
//! dialects: the structured "Taylor" format, the legacy "V2" format
//! (`L.sys`, `L-devices`), and the System V "HDB" format (`Systems`,
//! `Devices`, `Dialers`, `Permissions`).
//!
//! ## Overview
//!
//! * A [`Resolver`] holds the configuration context: which dialects are
//!   active, where their files live, timetable definitions, and the
//!   cached access-control entries.
//! * [`Resolver::system`] tries each dialect in priority order, merges
//!   partial records field-for-field (earlier dialects win), and applies
//!   the documented baselines exactly once. [`Resolver::port`] and
//!   [`Resolver::dialer`] are the analogous lookups for the other record
//!   kinds.
//! * Records under construction track, per field, whether any source has
//!   touched them — see [`record::Field`] — so "explicitly disabled"
//!   never gets clobbered by a lower-priority default.
//! * Call windows are held as sorted, non-overlapping minute intervals
//!   over a week; see [`timespan`].
//!
//! The library never prints; failures come back as [`Error`] values
//! carrying the file and line they arose from, and parse problems in one
//! source are reported through `tracing` and do not stop resolution from
//! consulting the remaining sources.
//!
//! ## Example
//!
//! ```no_run
//! use uucfg::ResolverBuilder;
//!
//! # fn main() -> uucfg::Result<()> {
//! let resolver = ResolverBuilder::new()
//!     .taylor_sys_file("/etc/uucp/sys")
//!     .hdb_directory("/usr/lib/uucp")
//!     .build();
//! let system = resolver.system("example")?;
//! println!("call {} at {:?}", system.name, system.phone);
//! # Ok(())
//! # }
//! ```

pub mod cmdtab;
mod dialect;
pub mod errors;
pub mod reader;
pub mod record;
pub mod resolver;
pub mod timespan;

pub use dialect::Dialect;
pub use errors::{Error, ErrorKind, Result};
pub use record::{
    Chat, Dialer, DialerChoice, DialerConf, Field, Port, PortChoice, PortConf, PortSel, PortType,
    ProtoParam, System, SystemConf,
};
pub use resolver::{Resolver, ResolverBuilder};
pub use timespan::{TimeSpan, TimeSpanList, Timetables};
