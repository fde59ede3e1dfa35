//! The resolution and merge engine
//!
//! A [`Resolver`] holds the process-wide configuration context: which
//! dialects are active, where their files live, the timetable
//! definitions, and the lazily-parsed access-control entries. Lookups
//! try each dialect in priority order, merge what they find, and apply
//! the final baselines exactly once.
// (c) 2025 Ross Younger

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::dialect::{hdb, taylor, v2, Dialect};
use crate::errors::{Error, ErrorKind, Result};
use crate::record::{Dialer, Port, System, SystemConf};
use crate::timespan::Timetables;

/// Where the structured-format configuration lives by default
pub const TAYLOR_CONFIG_DIR: &str = "/etc/uucp";
/// Where the legacy-format trees live by default
pub const LEGACY_CONFIG_DIR: &str = "/usr/lib/uucp";
/// The default main configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/uucp/config";
/// The default spool directory
pub const DEFAULT_SPOOL_DIR: &str = "/usr/spool/uucp";

#[derive(Debug)]
struct Inner {
    taylor_sys: Vec<PathBuf>,
    taylor_port: Vec<PathBuf>,
    taylor_dial: Vec<PathBuf>,
    v2_dir: Option<PathBuf>,
    hdb_dir: Option<PathBuf>,
    timetables: Timetables,
    unknown: Vec<Vec<String>>,
    nodename: Option<String>,
    spool: PathBuf,
    pubdir: Option<String>,
    // lazily-populated caches, shared between clones
    hdb_files: OnceLock<hdb::FileSet>,
    permissions: OnceLock<Vec<hdb::PermEntry>>,
}

/// Builds a [`Resolver`] with an explicit configuration, bypassing the
/// default search path. This is also how multiple independent
/// configurations coexist in one process.
#[derive(Debug, Default)]
pub struct ResolverBuilder {
    taylor_sys: Vec<PathBuf>,
    taylor_port: Vec<PathBuf>,
    taylor_dial: Vec<PathBuf>,
    v2_dir: Option<PathBuf>,
    hdb_dir: Option<PathBuf>,
    timetables: Timetables,
    unknown: Vec<Vec<String>>,
    nodename: Option<String>,
    spool: Option<PathBuf>,
    pubdir: Option<String>,
}

impl ResolverBuilder {
    /// Constructor: no dialects active, built-in timetables only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a structured-format system file
    #[must_use]
    pub fn taylor_sys_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.taylor_sys.push(path.into());
        self
    }

    /// Adds a structured-format port file
    #[must_use]
    pub fn taylor_port_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.taylor_port.push(path.into());
        self
    }

    /// Adds a structured-format dialer file
    #[must_use]
    pub fn taylor_dial_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.taylor_dial.push(path.into());
        self
    }

    /// Activates the V2 dialect, reading `L.sys`, `L-devices` and
    /// `L.aliases` from the given directory
    #[must_use]
    pub fn v2_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.v2_dir = Some(dir.into());
        self
    }

    /// Activates the HDB dialect, reading `Systems`, `Devices`,
    /// `Dialers`, `Permissions` (and optionally `Sysfiles`) from the
    /// given directory
    #[must_use]
    pub fn hdb_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.hdb_dir = Some(dir.into());
        self
    }

    /// Defines a timetable; the newest definition of a name wins
    #[must_use]
    pub fn timetable<N: Into<String>, E: Into<String>>(mut self, name: N, expansion: E) -> Self {
        self.timetables.define(name, expansion);
        self
    }

    /// Adds a system command applied to systems not in any file
    #[must_use]
    pub fn unknown_command(mut self, line: &str) -> Self {
        let tokens: Vec<String> = crate::reader::split_fields(line, None)
            .into_iter()
            .map(ToString::to_string)
            .collect();
        if !tokens.is_empty() {
            self.unknown.push(tokens);
        }
        self
    }

    /// Sets this node's name
    #[must_use]
    pub fn nodename<N: Into<String>>(mut self, name: N) -> Self {
        self.nodename = Some(name.into());
        self
    }

    /// Sets the spool directory
    #[must_use]
    pub fn spool_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.spool = Some(dir.into());
        self
    }

    /// Sets the public directory
    #[must_use]
    pub fn public_directory<P: Into<String>>(mut self, dir: P) -> Self {
        self.pubdir = Some(dir.into());
        self
    }

    /// Finishes the build
    #[must_use]
    pub fn build(self) -> Resolver {
        Resolver {
            inner: Arc::new(Inner {
                taylor_sys: self.taylor_sys,
                taylor_port: self.taylor_port,
                taylor_dial: self.taylor_dial,
                v2_dir: self.v2_dir,
                hdb_dir: self.hdb_dir,
                timetables: self.timetables,
                unknown: self.unknown,
                nodename: self.nodename,
                spool: self.spool.unwrap_or_else(|| PathBuf::from(DEFAULT_SPOOL_DIR)),
                pubdir: self.pubdir,
                hdb_files: OnceLock::new(),
                permissions: OnceLock::new(),
            }),
        }
    }
}

/// Resolves systems, ports and dialers across the configured dialects.
///
/// Cloning is cheap: clones share the immutable, already-parsed context
/// (file lists, timetables, cached access-control entries) and may be
/// used freely from multiple threads.
#[derive(Debug, Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

impl Resolver {
    /// Production constructor: reads the per-user configuration file if
    /// there is one, then the system-wide one, and otherwise falls back
    /// to the conventional locations for all three dialects.
    #[must_use]
    pub fn standard() -> Self {
        for path in Self::config_files() {
            let path = PathBuf::from(path);
            if path.exists() {
                match Self::from_config_file(&path) {
                    Ok(r) => return r,
                    Err(e) => warn!("{e}"),
                }
            } else {
                debug!("configuration file {} not present", path.display());
            }
        }
        let taylor = Path::new(TAYLOR_CONFIG_DIR);
        ResolverBuilder::new()
            .taylor_sys_file(taylor.join("sys"))
            .taylor_port_file(taylor.join("port"))
            .taylor_dial_file(taylor.join("dial"))
            .v2_directory(LEGACY_CONFIG_DIR)
            .hdb_directory(LEGACY_CONFIG_DIR)
            .build()
    }

    /// The main configuration files we look for, in order
    #[must_use]
    pub fn config_files() -> Vec<String> {
        let mut files = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            files.push(
                dir.join("uucfg")
                    .join("config")
                    .to_string_lossy()
                    .to_string(),
            );
        }
        files.push(DEFAULT_CONFIG_FILE.to_string());
        files
    }

    /// Builds a resolver from an explicit main configuration file.
    ///
    /// File lists default to `sys`/`port`/`dial` next to the
    /// configuration file; `v2-files` and `hdb-files` default to on,
    /// pointing at the conventional legacy tree.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = taylor::read_config(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let mut builder = ResolverBuilder::new();
        builder.taylor_sys = if config.sysfiles.is_empty() {
            vec![base.join("sys")]
        } else {
            config.sysfiles
        };
        builder.taylor_port = if config.portfiles.is_empty() {
            vec![base.join("port")]
        } else {
            config.portfiles
        };
        builder.taylor_dial = if config.dialfiles.is_empty() {
            vec![base.join("dial")]
        } else {
            config.dialfiles
        };
        if config.v2_files.unwrap_or(true) {
            builder.v2_dir = Some(PathBuf::from(LEGACY_CONFIG_DIR));
        }
        if config.hdb_files.unwrap_or(true) {
            builder.hdb_dir = Some(PathBuf::from(LEGACY_CONFIG_DIR));
        }
        for (name, expansion) in config.timetables {
            builder.timetables.define(name, expansion);
        }
        builder.unknown = config.unknown;
        builder.nodename = config.nodename;
        builder.spool = config.spool;
        builder.pubdir = config.pubdir;
        Ok(builder.build())
    }

    /// The dialects this resolver consults, in priority order
    #[must_use]
    pub fn active_dialects(&self) -> Vec<Dialect> {
        let mut out = Vec::new();
        if !self.inner.taylor_sys.is_empty()
            || !self.inner.taylor_port.is_empty()
            || !self.inner.taylor_dial.is_empty()
        {
            out.push(Dialect::Taylor);
        }
        if self.inner.v2_dir.is_some() {
            out.push(Dialect::V2);
        }
        if self.inner.hdb_dir.is_some() {
            out.push(Dialect::Hdb);
        }
        out
    }

    /// This node's name, if configured
    #[must_use]
    pub fn nodename(&self) -> Option<&str> {
        self.inner.nodename.as_deref()
    }

    /// The spool directory
    #[must_use]
    pub fn spool_directory(&self) -> &Path {
        &self.inner.spool
    }

    /// The public directory, if configured (systems may override it)
    #[must_use]
    pub fn public_directory(&self) -> Option<&str> {
        self.inner.pubdir.as_deref()
    }

    fn hdb_files(&self) -> Option<&hdb::FileSet> {
        self.inner
            .hdb_dir
            .as_ref()
            .map(|dir| self.inner.hdb_files.get_or_init(|| hdb::file_set(dir)))
    }

    fn permissions(&self) -> &[hdb::PermEntry] {
        self.inner.permissions.get_or_init(|| {
            let Some(dir) = self.inner.hdb_dir.as_ref() else {
                return Vec::new();
            };
            match hdb::read_permissions(&dir.join("Permissions")) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("{e}");
                    Vec::new()
                }
            }
        })
    }

    /// Resolves a system by name or alias.
    ///
    /// Dialects are tried in priority order; the first record found
    /// seeds the result and records from later dialects merge in as
    /// defaults, so an earlier dialect wins field-for-field. A source
    /// that fails to parse is reported and skipped. The final baselines
    /// are applied exactly once, after all dialects have been consulted.
    pub fn system(&self, name: &str) -> Result<System> {
        let inner = &*self.inner;
        let mut acc: Option<SystemConf> = None;
        let mut absorb = |rec: SystemConf| match &mut acc {
            None => acc = Some(rec),
            Some(a) => a.merge_defaults(&rec, true),
        };

        if !inner.taylor_sys.is_empty() {
            match taylor::read_system(&inner.taylor_sys, name, &inner.timetables) {
                Ok(Some(rec)) => absorb(rec),
                Ok(None) => debug!("{}: no record for {name}", Dialect::Taylor),
                Err(e) => warn!("reading {} configuration: {e}", Dialect::Taylor),
            }
        }
        if let Some(dir) = &inner.v2_dir {
            match v2::read_system(dir, name, &inner.timetables) {
                Ok(Some(rec)) => absorb(rec),
                Ok(None) => debug!("{}: no record for {name}", Dialect::V2),
                Err(e) => warn!("reading {} configuration: {e}", Dialect::V2),
            }
        }
        if let Some(files) = self.hdb_files() {
            let files = files.clone();
            let perms = self.permissions();
            match hdb::read_system(&files, name, &inner.timetables, perms) {
                Ok(Some(rec)) => absorb(rec),
                Ok(None) => debug!("{}: no record for {name}", Dialect::Hdb),
                Err(e) => warn!("reading {} configuration: {e}", Dialect::Hdb),
            }
        }

        match acc {
            Some(rec) => Ok(rec.finalize()),
            None => Err(Error::from(ErrorKind::NotFound)),
        }
    }

    /// Resolves a record for a system no file knows, from the `unknown`
    /// directives (if any) plus the usual baselines
    pub fn unknown_system(&self, name: &str) -> Result<System> {
        let rec = taylor::apply_system_commands(
            SystemConf::new(name),
            &self.inner.unknown,
            &self.inner.timetables,
        )?;
        Ok(rec.finalize())
    }

    /// Every system name any active dialect defines, sorted and
    /// de-duplicated
    pub fn system_names(&self) -> Result<Vec<String>> {
        let inner = &*self.inner;
        let mut names = Vec::new();
        if !inner.taylor_sys.is_empty() {
            names.extend(taylor::system_names(&inner.taylor_sys, &inner.timetables)?);
        }
        if let Some(dir) = &inner.v2_dir {
            names.extend(v2::system_names(dir)?);
        }
        if let Some(files) = self.hdb_files() {
            names.extend(hdb::system_names(files)?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Finds the first port compatible with the given name and speed
    /// constraints, trying dialects in priority order
    pub fn port(&self, name: Option<&str>, speed: Option<i64>) -> Result<Port> {
        let inner = &*self.inner;
        if !inner.taylor_port.is_empty() {
            if let Some(p) = taylor::read_port(&inner.taylor_port, name, speed)? {
                return Ok(p.finalize());
            }
        }
        if let Some(dir) = &inner.v2_dir {
            if let Some(p) = v2::read_port(dir, name, speed)? {
                return Ok(p.finalize());
            }
        }
        if let Some(files) = self.hdb_files() {
            if let Some(p) = hdb::read_port(files, name, speed)? {
                return Ok(p.finalize());
            }
        }
        Err(Error::from(ErrorKind::NotFound))
    }

    /// Finds a dialer by name
    pub fn dialer(&self, name: &str) -> Result<Dialer> {
        let inner = &*self.inner;
        if !inner.taylor_dial.is_empty() {
            if let Some(d) = taylor::read_dialer(&inner.taylor_dial, name)? {
                return Ok(d.finalize());
            }
        }
        if let Some(files) = self.hdb_files() {
            if let Some(d) = hdb::read_dialer(files, name)? {
                return Ok(d.finalize());
            }
        }
        Err(Error::from(ErrorKind::NotFound))
    }

    /// Checks a call-in login against the access-control entries: a
    /// machine listed in any VALIDATE entry must use one of that entry's
    /// LOGNAMEs
    #[must_use]
    pub fn validate_login(&self, login: &str, machine: &str) -> bool {
        hdb::validate_login(self.permissions(), login, machine)
    }
}
