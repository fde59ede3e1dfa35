//! Reader for the System V keyword=value dialect
//!
//! `Sysfiles` defines the per-service search order for `Systems`,
//! `Devices` and `Dialers`; `Permissions` carries the access-control
//! entries which are folded into system records at read time.
// (c) 2025 Ross Younger

use std::path::{Path, PathBuf};

use tracing::warn;

use super::{is_blank_or_comment, open_optional};
use crate::cmdtab::parse_bool;
use crate::errors::{Error, Result};
use crate::reader::{split_fields, LogicalLines};
use crate::record::{DialerConf, DialerSel, Field, PortConf, PortSel, PortType, SystemConf};
use crate::timespan::{grade_cmp, grade_value, Timetables, GRADE_LOW};

use super::taylor::insert_spans;

/// The service whose `Sysfiles` lists we honour
const SERVICE: &str = "uucico";

/// The file search order for one configuration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileSet {
    pub systems: Vec<PathBuf>,
    pub devices: Vec<PathBuf>,
    pub dialers: Vec<PathBuf>,
}

impl FileSet {
    fn conventional(dir: &Path) -> Self {
        Self {
            systems: vec![dir.join("Systems")],
            devices: vec![dir.join("Devices")],
            dialers: vec![dir.join("Dialers")],
        }
    }
}

/// Determines the file search order for `dir`, honouring a `Sysfiles`
/// redirection when one is present.
pub(crate) fn file_set(dir: &Path) -> FileSet {
    match read_sysfiles(dir) {
        Ok(Some(set)) => set,
        Ok(None) => FileSet::conventional(dir),
        Err(e) => {
            warn!("{e}");
            FileSet::conventional(dir)
        }
    }
}

fn read_sysfiles(dir: &Path) -> Result<Option<FileSet>> {
    let path = dir.join("Sysfiles");
    let Some(file) = open_optional(&path)? else {
        return Ok(None);
    };
    let mut systems: Vec<PathBuf> = Vec::new();
    let mut devices: Vec<PathBuf> = Vec::new();
    let mut dialers: Vec<PathBuf> = Vec::new();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(&path))?;
        let Some(line) = next else { break };
        if is_blank_or_comment(&line.text) {
            continue;
        }
        let mut for_us = false;
        let mut pending: Vec<(&str, &str)> = Vec::new();
        for field in split_fields(&line.text, None) {
            let Some((key, value)) = field.split_once('=') else {
                return Err(Error::syntax(format!("expected key=value, got `{field}`"))
                    .in_file(&path)
                    .at_line(line.number));
            };
            if key.eq_ignore_ascii_case("service") {
                for_us = split_fields(value, Some(':')).iter().any(|s| *s == SERVICE);
            } else {
                pending.push((key, value));
            }
        }
        if !for_us {
            continue;
        }
        for (key, value) in pending {
            let list = split_fields(value, Some(':'));
            let files = list.iter().filter(|s| !s.is_empty()).map(|s| dir.join(s));
            if key.eq_ignore_ascii_case("systems") {
                systems.extend(files);
            } else if key.eq_ignore_ascii_case("devices") {
                devices.extend(files);
            } else if key.eq_ignore_ascii_case("dialers") {
                dialers.extend(files);
            }
        }
    }
    if systems.is_empty() && devices.is_empty() && dialers.is_empty() {
        return Ok(None);
    }
    let conventional = FileSet::conventional(dir);
    Ok(Some(FileSet {
        systems: if systems.is_empty() {
            conventional.systems
        } else {
            systems
        },
        devices: if devices.is_empty() {
            conventional.devices
        } else {
            devices
        },
        dialers: if dialers.is_empty() {
            conventional.dialers
        } else {
            dialers
        },
    }))
}

// --------------------------------------------------------------- systems

fn parse_class(class: Option<&str>) -> Option<i64> {
    let class = class?;
    let digits: &str = class.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_line(tokens: &[&str], tables: &Timetables) -> Result<SystemConf> {
    let mut sys = SystemConf::new(tokens[0]);
    if let Some(time) = tokens.get(1) {
        let _ = insert_spans(
            tables,
            &mut sys.timegrade,
            time,
            grade_value(GRADE_LOW),
            grade_cmp,
        )?;
    }
    if let Some(device) = tokens.get(2) {
        // protocol flags may follow the device after a comma
        let device = device.split(',').next().unwrap_or("");
        if !device.is_empty() && device != "-" {
            sys.port = Field::Set(PortSel::Named(device.to_string()));
        }
    }
    if let Some(speed) = parse_class(tokens.get(3).copied()) {
        sys.speed = Field::Set(speed);
    }
    if let Some(phone) = tokens.get(4) {
        if *phone != "-" {
            sys.phone = Field::Set((*phone).to_string());
        }
    }
    if tokens.len() > 5 {
        sys.call_chat.script =
            Field::Set(tokens[5..].iter().map(ToString::to_string).collect());
    }
    Ok(sys)
}

/// Folds the matching access-control grants into a freshly-read record
fn apply_permissions(sys: &mut SystemConf, perms: &[PermEntry]) {
    if let Some(entry) = machine_entry(perms, &sys.name) {
        if !entry.commands.is_empty() {
            sys.commands = Field::Set(entry.commands.clone());
        }
        if let Some(req) = entry.request {
            sys.called_request = Field::Set(req);
        }
        if let Some(send) = entry.sendfiles {
            sys.called_transfer = Field::Set(send);
        }
        if !entry.read.is_empty() {
            sys.remote_send = Field::Set(entry.read.clone());
        }
        if !entry.write.is_empty() {
            sys.remote_receive = Field::Set(entry.write.clone());
        }
    }
    if let Some(login) = called_login_for(perms, &sys.name) {
        sys.called_login = Field::Set(login);
    }
}

/// Looks up a system. Each `Systems` line for the name is one alternate;
/// the first file defining the name wins.
pub(crate) fn read_system(
    files: &FileSet,
    wanted: &str,
    tables: &Timetables,
    perms: &[PermEntry],
) -> Result<Option<SystemConf>> {
    for path in &files.systems {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let mut records: Vec<SystemConf> = Vec::new();
        let mut lines = LogicalLines::new(file);
        loop {
            let next = lines.next_line().map_err(|e| e.in_file(path))?;
            let Some(line) = next else { break };
            if is_blank_or_comment(&line.text) {
                continue;
            }
            let tokens = split_fields(&line.text, None);
            if tokens.first() != Some(&wanted) {
                continue;
            }
            let rec =
                parse_line(&tokens, tables).map_err(|e| e.in_file(path).at_line(line.number))?;
            records.push(rec);
        }
        if records.is_empty() {
            continue;
        }
        let mut base = records.remove(0);
        base.alternates = records;
        apply_permissions(&mut base, perms);
        return Ok(Some(base));
    }
    Ok(None)
}

/// All system names defined across the `Systems` files
pub(crate) fn system_names(files: &FileSet) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for path in &files.systems {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let mut lines = LogicalLines::new(file);
        loop {
            let next = lines.next_line().map_err(|e| e.in_file(path))?;
            let Some(line) = next else { break };
            if is_blank_or_comment(&line.text) {
                continue;
            }
            if let Some(name) = split_fields(&line.text, None).first() {
                if !names.iter().any(|n| n == name) {
                    names.push((*name).to_string());
                }
            }
        }
    }
    Ok(names)
}

// --------------------------------------------------------------- devices

/// Finds the first `Devices` entry compatible with the constraints.
/// Device-table ports are named by their type field, which is what the
/// `Systems` device field refers to.
pub(crate) fn read_port(
    files: &FileSet,
    name: Option<&str>,
    speed: Option<i64>,
) -> Result<Option<PortConf>> {
    for path in &files.devices {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let mut lines = LogicalLines::new(file);
        loop {
            let next = lines.next_line().map_err(|e| e.in_file(path))?;
            let Some(line) = next else { break };
            if is_blank_or_comment(&line.text) {
                continue;
            }
            let tokens = split_fields(&line.text, None);
            if tokens.len() < 2 {
                continue;
            }
            let dtype = tokens[0].split(',').next().unwrap_or("");
            let device = tokens[1];
            if let Some(n) = name {
                if n != dtype {
                    continue;
                }
            }
            let line_speed = parse_class(tokens.get(3).copied());
            if let (Some(want), Some(have)) = (speed, line_speed) {
                if want != have {
                    continue;
                }
            }
            let mut port = PortConf::new(dtype);
            let port_type = if dtype.eq_ignore_ascii_case("ACU") {
                PortType::Modem
            } else if dtype.eq_ignore_ascii_case("TCP") {
                PortType::Tcp
            } else {
                PortType::Direct
            };
            port.port_type = Field::Set(port_type);
            if device != "-" {
                if port_type == PortType::Tcp {
                    port.service = Field::Set(device.to_string());
                } else {
                    port.device = Field::Set(device.to_string());
                }
            }
            if let Some(s) = line_speed {
                port.speed = Field::Set(s);
            }
            if let Some(dialer) = tokens.get(4) {
                if *dialer != "-" && !dialer.eq_ignore_ascii_case("direct") {
                    port.dialer = Field::Set(DialerSel::Named((*dialer).to_string()));
                }
            }
            return Ok(Some(port));
        }
    }
    Ok(None)
}

// --------------------------------------------------------------- dialers

/// Finds a dialer by name. The second field is the substitution string
/// for the dialtone (`=`) and pause (`-`) markers; the rest is the chat.
pub(crate) fn read_dialer(files: &FileSet, name: &str) -> Result<Option<DialerConf>> {
    for path in &files.dialers {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let mut lines = LogicalLines::new(file);
        loop {
            let next = lines.next_line().map_err(|e| e.in_file(path))?;
            let Some(line) = next else { break };
            if is_blank_or_comment(&line.text) {
                continue;
            }
            let tokens = split_fields(&line.text, None);
            if tokens.first() != Some(&name) {
                continue;
            }
            let mut dialer = DialerConf::new(name);
            if let Some(subst) = tokens.get(1) {
                let chars: Vec<char> = subst.chars().collect();
                for pair in chars.chunks(2) {
                    if let [from, to] = pair {
                        match from {
                            '=' => dialer.dialtone = Field::Set(to.to_string()),
                            '-' => dialer.pause = Field::Set(to.to_string()),
                            _ => {}
                        }
                    }
                }
            }
            if tokens.len() > 2 {
                dialer.chat.script =
                    Field::Set(tokens[2..].iter().map(ToString::to_string).collect());
            }
            return Ok(Some(dialer));
        }
    }
    Ok(None)
}

// ----------------------------------------------------------- permissions

/// One `Permissions` entry: which logins and machines it applies to, and
/// what it grants. Built once per resolver and then treated as read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PermEntry {
    pub logname: Vec<String>,
    pub machine: Vec<String>,
    pub request: Option<bool>,
    pub sendfiles: Option<bool>,
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub commands: Vec<String>,
    pub validate: Vec<String>,
}

fn string_list(value: &str) -> Vec<String> {
    split_fields(value, Some(':'))
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Reads a `Permissions` file into its entry list
pub(crate) fn read_permissions(path: &Path) -> Result<Vec<PermEntry>> {
    let Some(file) = open_optional(path)? else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(path))?;
        let Some(line) = next else { break };
        if is_blank_or_comment(&line.text) {
            continue;
        }
        let mut entry = PermEntry::default();
        for field in split_fields(&line.text, None) {
            let Some((key, value)) = field.split_once('=') else {
                return Err(Error::syntax(format!("expected KEY=value, got `{field}`"))
                    .in_file(path)
                    .at_line(line.number));
            };
            if key.eq_ignore_ascii_case("LOGNAME") {
                entry.logname = string_list(value);
            } else if key.eq_ignore_ascii_case("MACHINE") {
                entry.machine = string_list(value);
            } else if key.eq_ignore_ascii_case("REQUEST") {
                entry.request = Some(parse_bool(value).map_err(|e| {
                    e.in_file(path).at_line(line.number)
                })?);
            } else if key.eq_ignore_ascii_case("SENDFILES") {
                entry.sendfiles = Some(value.eq_ignore_ascii_case("yes"));
            } else if key.eq_ignore_ascii_case("READ") {
                entry.read = string_list(value);
            } else if key.eq_ignore_ascii_case("WRITE") {
                entry.write = string_list(value);
            } else if key.eq_ignore_ascii_case("COMMANDS") {
                entry.commands = string_list(value);
            } else if key.eq_ignore_ascii_case("VALIDATE") {
                entry.validate = string_list(value);
            }
            // remaining keys (CALLBACK, MYNAME, ...) are skipped, like
            // unknown keywords elsewhere
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// The grant entry applying to `name`: an explicit MACHINE match first,
/// falling back to a MACHINE=OTHER entry
pub(crate) fn machine_entry<'p>(perms: &'p [PermEntry], name: &str) -> Option<&'p PermEntry> {
    perms
        .iter()
        .find(|e| e.machine.iter().any(|m| m == name))
        .or_else(|| perms.iter().find(|e| e.machine.iter().any(|m| m == "OTHER")))
}

/// VALIDATE check: a machine listed in any VALIDATE entry must log in
/// with one of that entry's LOGNAMEs; an unvalidated machine may use any
/// login.
pub(crate) fn validate_login(perms: &[PermEntry], login: &str, machine: &str) -> bool {
    let mut validated = false;
    for entry in perms {
        if entry.validate.iter().any(|v| v == machine) {
            if entry.logname.iter().any(|l| l == login) {
                return true;
            }
            validated = true;
        }
    }
    !validated
}

/// The login a validated machine is required to use, if any
pub(crate) fn called_login_for(perms: &[PermEntry], machine: &str) -> Option<String> {
    perms
        .iter()
        .find(|e| e.validate.iter().any(|v| v == machine))
        .and_then(|e| e.logname.first().cloned())
}
