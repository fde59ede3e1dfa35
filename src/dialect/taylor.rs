//! Reader for the structured keyword/value dialect
//!
//! System files carry file-wide defaults (commands before the first
//! `system` line), one record per `system`, and `alternate` sub-records
//! which start as a snapshot of the base record so far. Port and dialer
//! files are flat record lists.
// (c) 2025 Ross Younger

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use super::open_optional;
use crate::cmdtab::{CmdEntry, CmdRet, CmdTable};
use crate::errors::{Error, ErrorKind, Result};
use crate::reader::{split_fields, LogicalLines};
use crate::record::{
    chat_command, DialerConf, DialerSel, Field, PortConf, PortSel, PortType, ProtoParam,
    SystemConf,
};
use crate::timespan::{
    grade_cmp, grade_value, parse_time_expression, size_cmp, valid_grade, PrecedenceCmp,
    TimeSpanList, Timetables, GRADE_LOW,
};

/// Removes an unescaped `#` and everything after it; `\#` yields a
/// literal hash.
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'#') {
            out.push('#');
            let _ = chars.next();
        } else if c == '#' {
            break;
        } else {
            out.push(c);
        }
    }
    out
}

fn single_char(arg: &str) -> Option<char> {
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Adds the spans described by `expr` to a span-list field, switching it
/// to explicitly-set first if no source had touched it. `Never` thus
/// leaves an explicitly empty list, which is distinct from unset.
pub(crate) fn insert_spans(
    tables: &Timetables,
    field: &mut Field<TimeSpanList>,
    expr: &str,
    value: i64,
    cmp: PrecedenceCmp,
) -> Result<CmdRet> {
    if !field.is_set() {
        *field = Field::Set(TimeSpanList::new());
    }
    if let Field::Set(list) = field {
        parse_time_expression(list, expr, value, cmp, tables)?;
    }
    Ok(CmdRet::Continue)
}

// ------------------------------------------------------------ main config

/// The directives read from the main configuration file
#[derive(Debug, Default)]
pub(crate) struct MainConfig {
    pub nodename: Option<String>,
    pub spool: Option<PathBuf>,
    pub pubdir: Option<String>,
    pub sysfiles: Vec<PathBuf>,
    pub portfiles: Vec<PathBuf>,
    pub dialfiles: Vec<PathBuf>,
    pub v2_files: Option<bool>,
    pub hdb_files: Option<bool>,
    pub timetables: Vec<(String, String)>,
    pub unknown: Vec<Vec<String>>,
    /// Directory relative file names are resolved against
    base: PathBuf,
}

impl MainConfig {
    fn resolve(&self, name: &str) -> PathBuf {
        let p = PathBuf::from(name);
        if p.is_absolute() {
            p
        } else {
            self.base.join(p)
        }
    }
}

fn mc_nodename(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.nodename = Some(args[0].to_string());
    Ok(CmdRet::Continue)
}

fn mc_spool(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.spool = Some(PathBuf::from(args[0]));
    Ok(CmdRet::Continue)
}

fn mc_pubdir(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.pubdir = Some(args[0].to_string());
    Ok(CmdRet::Continue)
}

macro_rules! file_list_callback {
    ($name:ident, $field:ident) => {
        fn $name(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
            let resolved: Vec<PathBuf> = args.iter().map(|a| t.resolve(a)).collect();
            t.$field.extend(resolved);
            Ok(CmdRet::Continue)
        }
    };
}

file_list_callback!(mc_sysfile, sysfiles);
file_list_callback!(mc_portfile, portfiles);
file_list_callback!(mc_dialfile, dialfiles);

fn mc_v2(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.v2_files = Some(crate::cmdtab::parse_bool(args[0])?);
    Ok(CmdRet::Continue)
}

fn mc_hdb(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.hdb_files = Some(crate::cmdtab::parse_bool(args[0])?);
    Ok(CmdRet::Continue)
}

fn mc_timetable(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.timetables.push((args[0].to_string(), args[1].to_string()));
    Ok(CmdRet::Continue)
}

fn mc_unknown(t: &mut MainConfig, args: &[&str]) -> Result<CmdRet> {
    t.unknown.push(args.iter().map(ToString::to_string).collect());
    Ok(CmdRet::Continue)
}

fn config_table() -> CmdTable<MainConfig> {
    CmdTable::new(vec![
        CmdEntry::callback("nodename", 1, Some(1), mc_nodename),
        CmdEntry::callback("hostname", 1, Some(1), mc_nodename),
        CmdEntry::callback("spool", 1, Some(1), mc_spool),
        CmdEntry::callback("pubdir", 1, Some(1), mc_pubdir),
        CmdEntry::callback("sysfile", 1, None, mc_sysfile),
        CmdEntry::callback("portfile", 1, None, mc_portfile),
        CmdEntry::callback("dialfile", 1, None, mc_dialfile),
        CmdEntry::callback("v2-files", 1, Some(1), mc_v2),
        CmdEntry::callback("hdb-files", 1, Some(1), mc_hdb),
        CmdEntry::callback("timetable", 2, Some(2), mc_timetable),
        CmdEntry::callback("unknown", 1, None, mc_unknown),
    ])
}

/// Reads the main configuration file. Unknown directives are skipped so
/// newer files still parse.
pub(crate) fn read_config(path: &Path) -> Result<MainConfig> {
    let mut config = MainConfig {
        base: path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
        ..MainConfig::default()
    };
    let Some(file) = open_optional(path)? else {
        return Err(Error::from(ErrorKind::NotFound).in_file(path));
    };
    let table = config_table();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(path))?;
        let Some(line) = next else { break };
        let text = strip_comment(&line.text);
        let tokens = split_fields(&text, None);
        if tokens.is_empty() {
            continue;
        }
        match table.dispatch(&mut config, &tokens, None) {
            Ok(_) => {}
            Err(e) => return Err(e.in_file(path).at_line(line.number)),
        }
    }
    Ok(config)
}

// ---------------------------------------------------------------- system

/// The system-file state machine: reading defaults until the first
/// `system` line, then one record at a time, with `alternate` opening a
/// sub-record seeded from the base.
#[derive(Debug)]
struct SysScan<'t> {
    tables: &'t Timetables,
    /// When set, the scan may stop early once this record is captured
    wanted: Option<String>,
    defaults: SystemConf,
    systems: Vec<SystemConf>,
    current: Option<SystemConf>,
    current_alt: Option<SystemConf>,
}

impl<'t> SysScan<'t> {
    fn new(tables: &'t Timetables, wanted: Option<&str>) -> Self {
        Self {
            tables,
            wanted: wanted.map(str::to_string),
            defaults: SystemConf::new(""),
            systems: Vec::new(),
            current: None,
            current_alt: None,
        }
    }

    /// The record commands currently apply to
    fn active(&mut self) -> &mut SystemConf {
        match (&mut self.current_alt, &mut self.current) {
            (Some(alt), _) => alt,
            (None, Some(cur)) => cur,
            (None, None) => &mut self.defaults,
        }
    }

    fn end_alternate(&mut self) {
        if let Some(alt) = self.current_alt.take() {
            match self.current.as_mut() {
                Some(cur) => cur.alternates.push(alt),
                None => self.defaults.alternates.push(alt),
            }
        }
    }

    fn end_system(&mut self) {
        self.end_alternate();
        if let Some(cur) = self.current.take() {
            self.systems.push(cur);
        }
    }

    fn captured_wanted(&self) -> bool {
        match &self.wanted {
            Some(w) => self.systems.iter().any(|s| s.answers_to(w)),
            None => false,
        }
    }
}

macro_rules! sys_accessor {
    ($name:ident, $field:ident, $ty:ty) => {
        fn $name<'r>(t: &'r mut SysScan<'_>) -> &'r mut Field<$ty> {
            &mut t.active().$field
        }
    };
}

sys_accessor!(f_call_login, call_login, String);
sys_accessor!(f_call_password, call_password, String);
sys_accessor!(f_called_login, called_login, String);
sys_accessor!(f_phone, phone, String);
sys_accessor!(f_speed, speed, i64);
sys_accessor!(f_commands, commands, Vec<String>);
sys_accessor!(f_local_send, local_send, Vec<String>);
sys_accessor!(f_remote_send, remote_send, Vec<String>);
sys_accessor!(f_local_receive, local_receive, Vec<String>);
sys_accessor!(f_remote_receive, remote_receive, Vec<String>);
sys_accessor!(f_forward_from, forward_from, Vec<String>);
sys_accessor!(f_forward_to, forward_to, Vec<String>);
sys_accessor!(f_protocols, protocols, String);
sys_accessor!(f_call_request, call_request, bool);
sys_accessor!(f_called_request, called_request, bool);
sys_accessor!(f_call_transfer, call_transfer, bool);
sys_accessor!(f_called_transfer, called_transfer, bool);
sys_accessor!(f_max_retries, max_retries, i32);
sys_accessor!(f_success_wait, success_wait, i32);
sys_accessor!(f_pubdir, pubdir, String);

fn cb_system(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    t.end_system();
    if t.captured_wanted() {
        // the record we came for is complete; stop scanning
        return Ok(CmdRet::Exit);
    }
    t.current = Some(SystemConf::new(args[0]));
    Ok(CmdRet::Continue)
}

fn cb_alternate(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    t.end_alternate();
    let mut alt = match &t.current {
        Some(cur) => cur.base_only(),
        None => t.defaults.base_only(),
    };
    if let Some(name) = args.first() {
        alt.name = (*name).to_string();
    }
    t.current_alt = Some(alt);
    Ok(CmdRet::Continue)
}

fn cb_alias(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let alias = args[0].to_string();
    t.active().aliases.push(alias);
    Ok(CmdRet::Continue)
}

fn cb_time(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let tables = t.tables;
    let expr = args[0];
    insert_spans(
        tables,
        &mut t.active().timegrade,
        expr,
        grade_value(GRADE_LOW),
        grade_cmp,
    )
}

fn cb_timegrade(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let grade = match single_char(args[0]) {
        Some(c) if valid_grade(c) => c,
        _ => return Err(ErrorKind::BadGrade(args[0].to_string()).into()),
    };
    let tables = t.tables;
    let expr = args[1];
    insert_spans(
        tables,
        &mut t.active().timegrade,
        expr,
        grade_value(grade),
        grade_cmp,
    )
}

macro_rules! size_callback {
    ($name:ident, $field:ident) => {
        fn $name(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
            let bytes: i64 = args[0]
                .parse()
                .map_err(|_| ErrorKind::BadNumber(args[0].to_string()))?;
            let tables = t.tables;
            let expr = args[1];
            insert_spans(tables, &mut t.active().$field, expr, bytes, size_cmp)
        }
    };
}

size_callback!(cb_call_local_size, call_local_size);
size_callback!(cb_call_remote_size, call_remote_size);
size_callback!(cb_called_local_size, called_local_size);
size_callback!(cb_called_remote_size, called_remote_size);

fn cb_chat(t: &mut SysScan<'_>, rest: &str, args: &[&str]) -> Result<CmdRet> {
    chat_command("chat", &mut t.active().call_chat, rest, args)
}

fn cb_called_chat(t: &mut SysScan<'_>, rest: &str, args: &[&str]) -> Result<CmdRet> {
    chat_command("called-chat", &mut t.active().called_chat, rest, args)
}

fn cb_port(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let field = &mut t.active().port;
    if args.len() == 1 && !matches!(field, Field::Set(PortSel::Inline(_))) {
        *field = Field::Set(PortSel::Named(args[0].to_string()));
        return Ok(CmdRet::Continue);
    }
    // more than one argument: a port command defining an inline port
    let mut port = match std::mem::take(field) {
        Field::Set(PortSel::Inline(p)) => p,
        _ => Box::new(PortConf::new("")),
    };
    let ret = port_table().dispatch(&mut port, args, None);
    *field = Field::Set(PortSel::Inline(port));
    ret
}

fn cb_forward(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let list: Vec<String> = args.iter().map(ToString::to_string).collect();
    t.active().forward_to = Field::Set(list.clone());
    t.active().forward_from = Field::Set(list);
    Ok(CmdRet::Continue)
}

fn cb_protocol_param(t: &mut SysScan<'_>, args: &[&str]) -> Result<CmdRet> {
    let Some(tag) = single_char(args[0]) else {
        return Err(Error::syntax(format!(
            "protocol tag `{}` must be a single character",
            args[0]
        )));
    };
    let entry: Vec<String> = args[1..].iter().map(ToString::to_string).collect();
    let rec = t.active();
    match rec.proto_params.iter_mut().find(|p| p.protocol == tag) {
        Some(p) => p.entries.push(entry),
        None => rec.proto_params.push(ProtoParam {
            protocol: tag,
            entries: vec![entry],
        }),
    }
    Ok(CmdRet::Continue)
}

fn sys_table<'t>() -> CmdTable<SysScan<'t>> {
    CmdTable::new(vec![
        CmdEntry::callback("system", 1, Some(1), cb_system),
        CmdEntry::callback("alternate", 0, Some(1), cb_alternate),
        CmdEntry::callback("alias", 1, Some(1), cb_alias),
        CmdEntry::string("call-login", f_call_login),
        CmdEntry::string("call-password", f_call_password),
        CmdEntry::string("called-login", f_called_login),
        CmdEntry::callback("time", 1, Some(1), cb_time),
        CmdEntry::callback("timegrade", 2, Some(2), cb_timegrade),
        CmdEntry::callback("call-local-size", 2, Some(2), cb_call_local_size),
        CmdEntry::callback("call-remote-size", 2, Some(2), cb_call_remote_size),
        CmdEntry::callback("called-local-size", 2, Some(2), cb_called_local_size),
        CmdEntry::callback("called-remote-size", 2, Some(2), cb_called_remote_size),
        CmdEntry::prefix("called-chat", 0, None, cb_called_chat),
        CmdEntry::prefix("chat", 0, None, cb_chat),
        CmdEntry::callback("port", 1, None, cb_port),
        CmdEntry::long("speed", f_speed),
        CmdEntry::long("baud", f_speed),
        CmdEntry::string("phone", f_phone),
        CmdEntry::string("address", f_phone),
        CmdEntry::full_string("commands", f_commands),
        CmdEntry::full_string("local-send", f_local_send),
        CmdEntry::full_string("remote-send", f_remote_send),
        CmdEntry::full_string("local-receive", f_local_receive),
        CmdEntry::full_string("remote-receive", f_remote_receive),
        CmdEntry::full_string("forward-from", f_forward_from),
        CmdEntry::full_string("forward-to", f_forward_to),
        CmdEntry::callback("forward", 0, None, cb_forward),
        CmdEntry::string("protocol", f_protocols),
        CmdEntry::callback("protocol-parameter", 2, None, cb_protocol_param),
        CmdEntry::boolean("call-request", f_call_request),
        CmdEntry::boolean("called-request", f_called_request),
        CmdEntry::boolean("call-transfer", f_call_transfer),
        CmdEntry::boolean("called-transfer", f_called_transfer),
        CmdEntry::int("max-retries", f_max_retries),
        CmdEntry::int("success-wait", f_success_wait),
        CmdEntry::string("pubdir", f_pubdir),
    ])
}

fn scan_sys_file(path: &Path, scan: &mut SysScan<'_>) -> Result<()> {
    let Some(file) = open_optional(path)? else {
        return Ok(());
    };
    let table = sys_table();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(path))?;
        let Some(line) = next else { break };
        let text = strip_comment(&line.text);
        let tokens = split_fields(&text, None);
        if tokens.is_empty() {
            continue;
        }
        match table.dispatch(scan, &tokens, None) {
            Ok(CmdRet::Continue) => {}
            Ok(CmdRet::Exit) => break,
            Err(e) => return Err(e.in_file(path).at_line(line.number)),
        }
    }
    scan.end_system();
    Ok(())
}

/// Looks `wanted` up across the given system files, in order. Each file's
/// own defaults (and their alternates) merge into a record found in it. A
/// file that fails to parse is reported and skipped; the search goes on.
pub(crate) fn read_system(
    paths: &[PathBuf],
    wanted: &str,
    tables: &Timetables,
) -> Result<Option<SystemConf>> {
    for path in paths {
        let mut scan = SysScan::new(tables, Some(wanted));
        if let Err(e) = scan_sys_file(path, &mut scan) {
            warn!("{e}");
            continue;
        }
        let defaults = std::mem::take(&mut scan.defaults);
        if let Some(mut sys) = scan.systems.into_iter().find(|s| s.answers_to(wanted)) {
            sys.merge_defaults(&defaults, true);
            return Ok(Some(sys));
        }
    }
    Ok(None)
}

/// All system names defined across the given files
pub(crate) fn system_names(paths: &[PathBuf], tables: &Timetables) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for path in paths {
        let mut scan = SysScan::new(tables, None);
        if let Err(e) = scan_sys_file(path, &mut scan) {
            warn!("{e}");
            continue;
        }
        names.extend(scan.systems.into_iter().map(|s| s.name));
    }
    Ok(names)
}

/// Applies free-standing system commands (the `unknown` directives from
/// the main configuration file) to a record.
pub(crate) fn apply_system_commands(
    sys: SystemConf,
    lines: &[Vec<String>],
    tables: &Timetables,
) -> Result<SystemConf> {
    let mut scan = SysScan::new(tables, None);
    scan.current = Some(sys);
    let table = sys_table();
    for tokens in lines {
        let toks: Vec<&str> = tokens.iter().map(String::as_str).collect();
        match table.dispatch(&mut scan, &toks, None)? {
            CmdRet::Continue => {}
            CmdRet::Exit => break,
        }
    }
    scan.end_system();
    Ok(scan.systems.into_iter().next().unwrap_or_default())
}

// ------------------------------------------------------------------ port

#[derive(Debug, Default)]
struct PortScan {
    wanted_name: Option<String>,
    wanted_speed: Option<i64>,
    ports: Vec<PortConf>,
    current: Option<PortConf>,
}

impl PortScan {
    fn end_port(&mut self) {
        if let Some(p) = self.current.take() {
            self.ports.push(p);
        }
    }

    fn stop_early(&self) -> bool {
        (self.wanted_name.is_some() || self.wanted_speed.is_some())
            && self
                .ports
                .iter()
                .any(|p| p.matches(self.wanted_name.as_deref(), self.wanted_speed))
    }
}

macro_rules! port_accessor {
    ($name:ident, $field:ident, $ty:ty) => {
        fn $name(p: &mut PortConf) -> &mut Field<$ty> {
            &mut p.$field
        }
    };
}

port_accessor!(p_device, device, String);
port_accessor!(p_speed, speed, i64);
port_accessor!(p_carrier, carrier, bool);
port_accessor!(p_seven_bit, seven_bit, bool);
port_accessor!(p_reliable, reliable, bool);
port_accessor!(p_half_duplex, half_duplex, bool);
port_accessor!(p_lockname, lockname, String);
port_accessor!(p_service, service, String);

fn pc_type(p: &mut PortConf, args: &[&str]) -> Result<CmdRet> {
    let t = PortType::from_str(args[0])
        .map_err(|_| Error::syntax(format!("unknown port type `{}`", args[0])))?;
    p.port_type = Field::Set(t);
    Ok(CmdRet::Continue)
}

fn pc_dialer(p: &mut PortConf, args: &[&str]) -> Result<CmdRet> {
    if args.len() == 1 && !matches!(p.dialer, Field::Set(DialerSel::Inline(_))) {
        p.dialer = Field::Set(DialerSel::Named(args[0].to_string()));
        return Ok(CmdRet::Continue);
    }
    let mut dialer = match std::mem::take(&mut p.dialer) {
        Field::Set(DialerSel::Inline(d)) => d,
        _ => Box::new(DialerConf::new("")),
    };
    let ret = dialer_table().dispatch(&mut dialer, args, None);
    p.dialer = Field::Set(DialerSel::Inline(dialer));
    ret
}

fn port_table() -> CmdTable<PortConf> {
    CmdTable::new(vec![
        CmdEntry::callback("type", 1, Some(1), pc_type),
        CmdEntry::string("device", p_device),
        CmdEntry::long("speed", p_speed),
        CmdEntry::long("baud", p_speed),
        CmdEntry::boolean("carrier", p_carrier),
        CmdEntry::boolean("seven-bit", p_seven_bit),
        CmdEntry::boolean("reliable", p_reliable),
        CmdEntry::boolean("half-duplex", p_half_duplex),
        CmdEntry::string("lockname", p_lockname),
        CmdEntry::string("service", p_service),
        CmdEntry::callback("dialer", 1, None, pc_dialer),
    ])
}

fn scan_port_file(path: &Path, scan: &mut PortScan) -> Result<()> {
    let Some(file) = open_optional(path)? else {
        return Ok(());
    };
    let table = port_table();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(path))?;
        let Some(line) = next else { break };
        let text = strip_comment(&line.text);
        let tokens = split_fields(&text, None);
        if tokens.is_empty() {
            continue;
        }
        if tokens[0].eq_ignore_ascii_case("port") {
            if tokens.len() != 2 {
                return Err(Error::from(ErrorKind::BadArgCount {
                    keyword: "port".to_string(),
                    expected: "exactly 1".to_string(),
                    got: tokens.len() - 1,
                })
                .in_file(path)
                .at_line(line.number));
            }
            scan.end_port();
            if scan.stop_early() {
                return Ok(());
            }
            scan.current = Some(PortConf::new(tokens[1]));
            continue;
        }
        let Some(cur) = scan.current.as_mut() else {
            return Err(Error::syntax(format!("`{}` before first port", tokens[0]))
                .in_file(path)
                .at_line(line.number));
        };
        if let Err(e) = table.dispatch(cur, &tokens, None) {
            return Err(e.in_file(path).at_line(line.number));
        }
    }
    scan.end_port();
    Ok(())
}

/// Finds the first port compatible with the given name and speed
/// constraints
pub(crate) fn read_port(
    paths: &[PathBuf],
    name: Option<&str>,
    speed: Option<i64>,
) -> Result<Option<PortConf>> {
    for path in paths {
        let mut scan = PortScan {
            wanted_name: name.map(str::to_string),
            wanted_speed: speed,
            ..PortScan::default()
        };
        if let Err(e) = scan_port_file(path, &mut scan) {
            warn!("{e}");
            continue;
        }
        if let Some(p) = scan.ports.into_iter().find(|p| p.matches(name, speed)) {
            return Ok(Some(p));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------- dialer

#[derive(Debug, Default)]
struct DialScan {
    wanted: Option<String>,
    dialers: Vec<DialerConf>,
    current: Option<DialerConf>,
}

impl DialScan {
    fn end_dialer(&mut self) {
        if let Some(d) = self.current.take() {
            self.dialers.push(d);
        }
    }

    fn stop_early(&self) -> bool {
        match &self.wanted {
            Some(w) => self.dialers.iter().any(|d| &d.name == w),
            None => false,
        }
    }
}

macro_rules! dialer_accessor {
    ($name:ident, $field:ident, $ty:ty) => {
        fn $name(d: &mut DialerConf) -> &mut Field<$ty> {
            &mut d.$field
        }
    };
}

dialer_accessor!(d_dialtone, dialtone, String);
dialer_accessor!(d_pause, pause, String);
dialer_accessor!(d_carrier, carrier, bool);
dialer_accessor!(d_carrier_wait, carrier_wait, i32);
dialer_accessor!(d_dtr_toggle, dtr_toggle, bool);

fn dc_chat(d: &mut DialerConf, rest: &str, args: &[&str]) -> Result<CmdRet> {
    chat_command("chat", &mut d.chat, rest, args)
}

fn dc_complete_chat(d: &mut DialerConf, rest: &str, args: &[&str]) -> Result<CmdRet> {
    chat_command("complete-chat", &mut d.complete_chat, rest, args)
}

fn dc_abort_chat(d: &mut DialerConf, rest: &str, args: &[&str]) -> Result<CmdRet> {
    chat_command("abort-chat", &mut d.abort_chat, rest, args)
}

fn dc_complete(d: &mut DialerConf, args: &[&str]) -> Result<CmdRet> {
    d.complete_chat.script = Field::Set(args.iter().map(ToString::to_string).collect());
    Ok(CmdRet::Continue)
}

fn dc_abort(d: &mut DialerConf, args: &[&str]) -> Result<CmdRet> {
    d.abort_chat.script = Field::Set(args.iter().map(ToString::to_string).collect());
    Ok(CmdRet::Continue)
}

fn dialer_table() -> CmdTable<DialerConf> {
    CmdTable::new(vec![
        CmdEntry::prefix("complete-chat", 0, None, dc_complete_chat),
        CmdEntry::prefix("abort-chat", 0, None, dc_abort_chat),
        CmdEntry::prefix("chat", 0, None, dc_chat),
        CmdEntry::callback("complete", 0, None, dc_complete),
        CmdEntry::callback("abort", 0, None, dc_abort),
        CmdEntry::string("dialtone", d_dialtone),
        CmdEntry::string("pause", d_pause),
        CmdEntry::boolean("carrier", d_carrier),
        CmdEntry::int("carrier-wait", d_carrier_wait),
        CmdEntry::boolean("dtr-toggle", d_dtr_toggle),
    ])
}

fn scan_dial_file(path: &Path, scan: &mut DialScan) -> Result<()> {
    let Some(file) = open_optional(path)? else {
        return Ok(());
    };
    let table = dialer_table();
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(path))?;
        let Some(line) = next else { break };
        let text = strip_comment(&line.text);
        let tokens = split_fields(&text, None);
        if tokens.is_empty() {
            continue;
        }
        if tokens[0].eq_ignore_ascii_case("dialer") {
            if tokens.len() != 2 {
                return Err(Error::from(ErrorKind::BadArgCount {
                    keyword: "dialer".to_string(),
                    expected: "exactly 1".to_string(),
                    got: tokens.len() - 1,
                })
                .in_file(path)
                .at_line(line.number));
            }
            scan.end_dialer();
            if scan.stop_early() {
                return Ok(());
            }
            scan.current = Some(DialerConf::new(tokens[1]));
            continue;
        }
        let Some(cur) = scan.current.as_mut() else {
            return Err(Error::syntax(format!("`{}` before first dialer", tokens[0]))
                .in_file(path)
                .at_line(line.number));
        };
        if let Err(e) = table.dispatch(cur, &tokens, None) {
            return Err(e.in_file(path).at_line(line.number));
        }
    }
    scan.end_dialer();
    Ok(())
}

/// Finds a dialer by name
pub(crate) fn read_dialer(paths: &[PathBuf], name: &str) -> Result<Option<DialerConf>> {
    for path in paths {
        let mut scan = DialScan {
            wanted: Some(name.to_string()),
            ..DialScan::default()
        };
        if let Err(e) = scan_dial_file(path, &mut scan) {
            warn!("{e}");
            continue;
        }
        if let Some(d) = scan.dialers.into_iter().find(|d| d.name == name) {
            return Ok(Some(d));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::{read_dialer, read_port, read_system, strip_comment};
    use crate::record::{Field, PortSel, PortType};
    use crate::timespan::{Timetables, MINUTES_PER_WEEK};
    use pretty_assertions::assert_eq;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn comments() {
        assert_eq!(strip_comment("a b # c"), "a b ");
        assert_eq!(strip_comment("a \\# b"), "a # b");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("plain"), "plain");
    }

    #[test]
    fn basic_system() {
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"# example
system foo
time Any
call-login ufoo
chat-timeout 30
",
        );
        let tables = Timetables::default();
        let got = read_system(&[sys], "foo", &tables).unwrap().unwrap();
        assert_eq!(got.name, "foo");
        assert_eq!(got.call_login, Field::Set("ufoo".to_string()));
        assert_eq!(got.call_chat.timeout, Field::Set(30));
        let spans = got.timegrade.as_set().unwrap().spans();
        assert_eq!((spans[0].start, spans[0].end), (0, MINUTES_PER_WEEK));
    }

    #[test]
    fn file_defaults_merge_into_records() {
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"call-password topsecret
max-retries 5
system foo
max-retries 7
system bar
",
        );
        let tables = Timetables::default();
        let foo = read_system(&[sys.clone()], "foo", &tables).unwrap().unwrap();
        assert_eq!(foo.call_password, Field::Set("topsecret".to_string()));
        assert_eq!(foo.max_retries, Field::Set(7));
        let bar = read_system(&[sys], "bar", &tables).unwrap().unwrap();
        assert_eq!(bar.max_retries, Field::Set(5));
    }

    #[test]
    fn alternates_snapshot_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"system foo
phone 111
speed 1200
alternate
phone 222
alternate night
speed 300
",
        );
        let tables = Timetables::default();
        let got = read_system(&[sys], "foo", &tables).unwrap().unwrap();
        assert_eq!(got.phone, Field::Set("111".to_string()));
        assert_eq!(got.alternates.len(), 2);
        // first alternate overrides phone, inherits speed
        assert_eq!(got.alternates[0].phone, Field::Set("222".to_string()));
        assert_eq!(got.alternates[0].speed, Field::Set(1200));
        // second alternate snapshots the base, not the first alternate
        assert_eq!(got.alternates[1].phone, Field::Set("111".to_string()));
        assert_eq!(got.alternates[1].speed, Field::Set(300));
        assert_eq!(got.alternates[1].name, "night");
    }

    #[test]
    fn alias_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"system foo
alias oldfoo
phone 111
",
        );
        let tables = Timetables::default();
        let got = read_system(&[sys], "oldfoo", &tables).unwrap().unwrap();
        assert_eq!(got.name, "foo");
    }

    #[test]
    fn scan_stops_after_capturing_the_wanted_record() {
        // garbage after the record we want must not affect the lookup
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"system foo
phone 111
system bar
max-retries notanumber
",
        );
        let tables = Timetables::default();
        let got = read_system(&[sys], "foo", &tables).unwrap().unwrap();
        assert_eq!(got.phone, Field::Set("111".to_string()));
    }

    #[test]
    fn inline_port() {
        let dir = tempfile::tempdir().unwrap();
        let sys = write_file(
            &dir,
            "sys",
            r"system foo
port type modem
port device /dev/cua0
port speed 2400
",
        );
        let tables = Timetables::default();
        let got = read_system(&[sys], "foo", &tables).unwrap().unwrap();
        let Field::Set(PortSel::Inline(port)) = got.port else {
            panic!("expected an inline port, got {:?}", got.port);
        };
        assert_eq!(port.port_type, Field::Set(PortType::Modem));
        assert_eq!(port.device, Field::Set("/dev/cua0".to_string()));
        assert_eq!(port.speed, Field::Set(2400));
    }

    #[test]
    fn port_file() {
        let dir = tempfile::tempdir().unwrap();
        let port = write_file(
            &dir,
            "port",
            r"port serial1
type modem
device /dev/cua0
speed 9600
dialer hayes
port net
type tcp
service 540
",
        );
        let got = read_port(&[port.clone()], Some("net"), None).unwrap().unwrap();
        assert_eq!(got.port_type, Field::Set(PortType::Tcp));
        assert_eq!(got.service, Field::Set("540".to_string()));

        // speed-constrained match
        assert!(read_port(&[port.clone()], None, Some(9600)).unwrap().is_some());
        assert!(read_port(&[port], Some("serial1"), Some(300)).unwrap().is_none());
    }

    #[test]
    fn dial_file_with_inline_chat() {
        let dir = tempfile::tempdir().unwrap();
        let dial = write_file(
            &dir,
            "dial",
            r#"dialer hayes
chat "" ATZ OK ATDT\T CONNECT
chat-timeout 45
complete-chat "" \d+++\dATH
carrier-wait 30
"#,
        );
        let got = read_dialer(&[dial], "hayes").unwrap().unwrap();
        assert_eq!(got.chat.timeout, Field::Set(45));
        assert_eq!(got.carrier_wait, Field::Set(30));
        assert!(got.chat.script.is_set());
        assert!(got.complete_chat.script.is_set());
    }
}
