//! Reader for the legacy fixed-field dialect
//!
//! `L.sys` holds one line per alternate (`name time device class phone
//! chat...`); `L-devices` describes ports; `L.aliases` maps old names to
//! current ones.
// (c) 2025 Ross Younger

use std::path::Path;

use super::{is_blank_or_comment, open_optional};
use crate::errors::Result;
use crate::reader::{split_fields, LogicalLines};
use crate::record::{Field, PortConf, PortSel, PortType, SystemConf};
use crate::timespan::{grade_cmp, grade_value, Timetables, GRADE_LOW};

use super::taylor::insert_spans;

const SYSTEMS_FILE: &str = "L.sys";
const DEVICES_FILE: &str = "L-devices";
const ALIASES_FILE: &str = "L.aliases";

/// Maps `name` through `L.aliases`, if an entry exists
fn resolve_alias(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(ALIASES_FILE);
    let Some(file) = open_optional(&path)? else {
        return Ok(name.to_string());
    };
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(&path))?;
        let Some(line) = next else { break };
        if is_blank_or_comment(&line.text) {
            continue;
        }
        let tokens = split_fields(&line.text, None);
        if tokens.len() == 2 && tokens[0] == name {
            return Ok(tokens[1].to_string());
        }
    }
    Ok(name.to_string())
}

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
    let device = tokens.get(2).copied().unwrap_or("");
    let speed = parse_class(tokens.get(3).copied());
    let phone = tokens.get(4).copied();

    match device.to_ascii_uppercase().as_str() {
        "" => {}
        "ACU" => {
            let mut port = PortConf::new("");
            port.port_type = Field::Set(PortType::Modem);
            if let Some(s) = speed {
                port.speed = Field::Set(s);
            }
            sys.port = Field::Set(PortSel::Inline(Box::new(port)));
            if let Some(p) = phone {
                sys.phone = Field::Set(p.to_string());
            }
        }
        "DIR" => {
            // hard-wired: the phone field names the line
            let mut port = PortConf::new("");
            port.port_type = Field::Set(PortType::Direct);
            if let Some(p) = phone {
                port.device = Field::Set(p.to_string());
            }
            if let Some(s) = speed {
                port.speed = Field::Set(s);
            }
            sys.port = Field::Set(PortSel::Inline(Box::new(port)));
            sys.phone = Field::Empty;
        }
        "TCP" => {
            let mut port = PortConf::new("");
            port.port_type = Field::Set(PortType::Tcp);
            if let Some(service) = tokens.get(3) {
                port.service = Field::Set((*service).to_string());
            }
            sys.port = Field::Set(PortSel::Inline(Box::new(port)));
            if let Some(p) = phone {
                sys.phone = Field::Set(p.to_string());
            }
        }
        _ => {
            sys.port = Field::Set(PortSel::Named(device.to_string()));
            if let Some(s) = speed {
                sys.speed = Field::Set(s);
            }
            if let Some(p) = phone {
                sys.phone = Field::Set(p.to_string());
            }
        }
    }

    if tokens.len() > 5 {
        sys.call_chat.script =
            Field::Set(tokens[5..].iter().map(ToString::to_string).collect());
    }
    Ok(sys)
}

/// Looks up a system. Every `L.sys` line for the name is one alternate;
/// the first line is the base record.
pub(crate) fn read_system(
    dir: &Path,
    wanted: &str,
    tables: &Timetables,
) -> Result<Option<SystemConf>> {
    let real = resolve_alias(dir, wanted)?;
    let path = dir.join(SYSTEMS_FILE);
    let Some(file) = open_optional(&path)? else {
        return Ok(None);
    };
    let mut lines = LogicalLines::new(file);
    let mut records: Vec<SystemConf> = Vec::new();
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(&path))?;
        let Some(line) = next else { break };
        if is_blank_or_comment(&line.text) {
            continue;
        }
        let tokens = split_fields(&line.text, None);
        if tokens.first() != Some(&real.as_str()) {
            continue;
        }
        let rec =
            parse_line(&tokens, tables).map_err(|e| e.in_file(&path).at_line(line.number))?;
        records.push(rec);
    }
    if records.is_empty() {
        return Ok(None);
    }
    let mut base = records.remove(0);
    base.alternates = records;
    if wanted != real {
        base.aliases.push(wanted.to_string());
    }
    Ok(Some(base))
}

/// All system names defined in `L.sys`
pub(crate) fn system_names(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join(SYSTEMS_FILE);
    let Some(file) = open_optional(&path)? else {
        return Ok(Vec::new());
    };
    let mut lines = LogicalLines::new(file);
    let mut names: Vec<String> = Vec::new();
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(&path))?;
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
    Ok(names)
}

/// Finds the first `L-devices` entry compatible with the constraints. A
/// name constraint matches either the device name or the type field.
pub(crate) fn read_port(
    dir: &Path,
    name: Option<&str>,
    speed: Option<i64>,
) -> Result<Option<PortConf>> {
    let path = dir.join(DEVICES_FILE);
    let Some(file) = open_optional(&path)? else {
        return Ok(None);
    };
    let mut lines = LogicalLines::new(file);
    loop {
        let next = lines.next_line().map_err(|e| e.in_file(&path))?;
        let Some(line) = next else { break };
        if is_blank_or_comment(&line.text) {
            continue;
        }
        let tokens = split_fields(&line.text, None);
        if tokens.len() < 2 {
            continue;
        }
        let (dtype, device) = (tokens[0], tokens[1]);
        if let Some(n) = name {
            if n != device && !n.eq_ignore_ascii_case(dtype) {
                continue;
            }
        }
        let line_speed = parse_class(tokens.get(3).copied());
        if let (Some(want), Some(have)) = (speed, line_speed) {
            if want != have {
                continue;
            }
        }
        let mut port = PortConf::new(device);
        port.port_type = Field::Set(match dtype.to_ascii_uppercase().as_str() {
            "ACU" => PortType::Modem,
            "TCP" => PortType::Tcp,
            _ => PortType::Direct,
        });
        port.device = Field::Set(device.to_string());
        if let Some(s) = line_speed {
            port.speed = Field::Set(s);
        }
        if let Some(dialer) = tokens.get(4) {
            if *dialer != "-" {
                port.dialer = Field::Set(crate::record::DialerSel::Named((*dialer).to_string()));
            }
        }
        return Ok(Some(port));
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::{read_port, read_system, system_names};
    use crate::record::{Field, PortSel, PortType};
    use crate::timespan::Timetables;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;

    fn setup(dir: &tempfile::TempDir, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn multiple_lines_become_alternates() {
        let dir = tempfile::tempdir().unwrap();
        setup(
            &dir,
            "L.sys",
            "# legacy systems\n\
             airs Any ACU 2400 5551212 ogin: uairs ssword: sesame\n\
             airs Night ACU 300 5551213\n\
             other Never ACU 1200 5550000\n",
        );
        let tables = Timetables::default();
        let got = read_system(dir.path(), "airs", &tables).unwrap().unwrap();
        assert_eq!(got.name, "airs");
        assert_eq!(got.alternates.len(), 1);
        assert_eq!(got.phone, Field::Set("5551212".to_string()));
        assert!(got.call_chat.script.is_set());
        // second line has no chat and a different phone
        assert_eq!(got.alternates[0].phone, Field::Set("5551213".to_string()));
        assert!(got.alternates[0].call_chat.script.is_unset());

        let names = system_names(dir.path()).unwrap();
        assert_eq!(names, vec!["airs".to_string(), "other".to_string()]);
    }

    #[test]
    fn acu_line_builds_an_inline_modem_port() {
        let dir = tempfile::tempdir().unwrap();
        setup(&dir, "L.sys", "sys1 Any ACU 2400 555\n");
        let got = read_system(dir.path(), "sys1", &Timetables::default())
            .unwrap()
            .unwrap();
        let Field::Set(PortSel::Inline(port)) = got.port else {
            panic!("expected inline port");
        };
        assert_eq!(port.port_type, Field::Set(PortType::Modem));
        assert_eq!(port.speed, Field::Set(2400));
    }

    #[test]
    fn alias_resolution() {
        let dir = tempfile::tempdir().unwrap();
        setup(&dir, "L.sys", "newname Any ACU 2400 555\n");
        setup(&dir, "L.aliases", "oldname newname\n");
        let got = read_system(dir.path(), "oldname", &Timetables::default())
            .unwrap()
            .unwrap();
        assert_eq!(got.name, "newname");
        assert!(got.answers_to("oldname"));
    }

    #[test]
    fn missing_files_are_absent_sources() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_system(dir.path(), "x", &Timetables::default())
            .unwrap()
            .is_none());
        assert!(read_port(dir.path(), None, None).unwrap().is_none());
    }

    #[test]
    fn device_lookup() {
        let dir = tempfile::tempdir().unwrap();
        setup(
            &dir,
            "L-devices",
            "# type device dial-device class dialer\n\
             ACU cul0 unused 1200 hayes\n\
             DIR tty9 unused 9600 -\n",
        );
        // look up by type
        let p = read_port(dir.path(), Some("ACU"), None).unwrap().unwrap();
        assert_eq!(p.port_type, Field::Set(PortType::Modem));
        assert_eq!(p.device, Field::Set("cul0".to_string()));
        // look up by device name with speed constraint
        let p = read_port(dir.path(), Some("tty9"), Some(9600)).unwrap().unwrap();
        assert_eq!(p.port_type, Field::Set(PortType::Direct));
        assert!(p.dialer.is_unset());
        // speed mismatch
        assert!(read_port(dir.path(), Some("cul0"), Some(300)).unwrap().is_none());
    }
}
