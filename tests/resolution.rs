//! End-to-end resolution over configuration trees on disk
// (c) 2025 Ross Younger

use std::io::Write as _;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use uucfg::timespan::{grade_value, MINUTES_PER_DAY, MINUTES_PER_WEEK};
use uucfg::{DialerChoice, PortChoice, PortType, ResolverBuilder};

fn setup(dir: &TempDir, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

#[test]
fn taylor_record_resolves_fully() {
    let dir = tempfile::tempdir().unwrap();
    setup(
        &dir,
        "sys",
        "# defaults for every system in this file\n\
         call-password filepass\n\
         system hub\n\
         call-login uhub\n\
         time Any\n\
         phone 5550001\n\
         chat-timeout 45\n\
         commands rmail rnews uux\n",
    );
    let r = ResolverBuilder::new()
        .taylor_sys_file(dir.path().join("sys"))
        .build();
    let sys = r.system("hub").unwrap();
    assert_eq!(sys.call_login.as_deref(), Some("uhub"));
    // file-wide default filled the password the record left unset
    assert_eq!(sys.call_password.as_deref(), Some("filepass"));
    assert_eq!(sys.phone.as_deref(), Some("5550001"));
    assert_eq!(sys.call_chat.timeout, 45);
    assert_eq!(sys.called_chat.timeout, 60);
    assert_eq!(sys.commands, vec!["rmail", "rnews", "uux"]);
    let spans = sys.timegrade.spans();
    assert_eq!((spans[0].start, spans[0].end), (0, MINUTES_PER_WEEK));
    assert_eq!(spans[0].value, grade_value('z'));
}

#[test]
fn alternate_inheritance_through_file_defaults() {
    // File-wide defaults carry two alternates; the system declares one.
    // The merged system must end up with two: its own, defaulted from
    // the first, plus one seeded from its first alternate and defaulted
    // from the second.
    let dir = tempfile::tempdir().unwrap();
    setup(
        &dir,
        "sys",
        "call-login udef\n\
         alternate\n\
         phone 911\n\
         alternate\n\
         phone 912\n\
         speed 300\n\
         system foo\n\
         phone 100\n\
         alternate\n\
         phone 200\n",
    );
    let r = ResolverBuilder::new()
        .taylor_sys_file(dir.path().join("sys"))
        .build();
    let sys = r.system("foo").unwrap();
    assert_eq!(sys.phone.as_deref(), Some("100"));
    assert_eq!(sys.call_login.as_deref(), Some("udef"));
    assert_eq!(sys.alternates.len(), 2);
    // the explicit alternate keeps its own phone
    assert_eq!(sys.alternates[0].phone.as_deref(), Some("200"));
    assert_eq!(sys.alternates[0].call_login.as_deref(), Some("udef"));
    // the inherited alternate is a clone of the first, with unset
    // fields filled from the defaults' second alternate
    assert_eq!(sys.alternates[1].phone.as_deref(), Some("200"));
    assert_eq!(sys.alternates[1].speed, Some(300));
}

#[test]
fn interval_precedence_across_config_lines() {
    // A later, lower-precedence window only survives outside the
    // higher-precedence one.
    let dir = tempfile::tempdir().unwrap();
    setup(
        &dir,
        "sys",
        "system graded\n\
         timegrade A Mo0000-0100\n\
         timegrade a Mo0030-0130\n",
    );
    let r = ResolverBuilder::new()
        .taylor_sys_file(dir.path().join("sys"))
        .build();
    let sys = r.system("graded").unwrap();
    let spans = sys.timegrade.spans();
    let monday = MINUTES_PER_DAY;
    assert_eq!(spans.len(), 2);
    assert_eq!(
        (spans[0].start, spans[0].end, spans[0].value),
        (monday, monday + 60, grade_value('A'))
    );
    assert_eq!(
        (spans[1].start, spans[1].end, spans[1].value),
        (monday + 60, monday + 90, grade_value('a'))
    );
}

#[test]
fn cross_dialect_fallback_and_field_priority() {
    let taylor = tempfile::tempdir().unwrap();
    setup(
        &taylor,
        "sys",
        "system both\n\
         phone taylor-phone\n",
    );
    let legacy = tempfile::tempdir().unwrap();
    setup(
        &legacy,
        "L.sys",
        "both Any ACU 2400 v2-phone ogin: uboth\n\
         v2only Wk1800-0700 ACU 1200 5551234\n",
    );
    let r = ResolverBuilder::new()
        .taylor_sys_file(taylor.path().join("sys"))
        .v2_directory(legacy.path())
        .build();

    // present only in V2: falls through, baselines applied
    let sys = r.system("v2only").unwrap();
    assert_eq!(sys.phone.as_deref(), Some("5551234"));
    assert_eq!(sys.max_retries, 26);
    assert_eq!(sys.call_chat.timeout, 10);
    let spans = sys.timegrade.spans();
    assert!(!spans.is_empty());

    // present in both: the earlier dialect wins field-for-field
    let sys = r.system("both").unwrap();
    assert_eq!(sys.phone.as_deref(), Some("taylor-phone"));
    // ...but V2 supplies what Taylor left unset
    assert!(matches!(sys.port, Some(PortChoice::Inline(_))));
    assert!(sys.call_chat.script.iter().any(|t| t == "ogin:"));
}

#[test]
fn explicit_disable_survives_lower_priority_sources() {
    // `time Never` leaves an explicitly empty span list; an HDB record
    // for the same system saying `Any` must not resurrect it. Same for
    // a bare `commands` line against a Permissions COMMANDS grant.
    let taylor = tempfile::tempdir().unwrap();
    setup(
        &taylor,
        "sys",
        "system locked\n\
         time Never\n\
         commands\n",
    );
    let legacy = tempfile::tempdir().unwrap();
    setup(&legacy, "Systems", "locked Any ACU 2400 5550000\n");
    setup(
        &legacy,
        "Permissions",
        "MACHINE=locked COMMANDS=rmail:uux REQUEST=yes\n",
    );
    let r = ResolverBuilder::new()
        .taylor_sys_file(taylor.path().join("sys"))
        .hdb_directory(legacy.path())
        .build();
    let sys = r.system("locked").unwrap();
    assert!(sys.timegrade.is_empty());
    assert!(sys.commands.is_empty());
    // the HDB side still contributes what Taylor left unset
    assert_eq!(sys.speed, Some(2400));
    // REQUEST=yes flowed through the permissions fold
    assert!(sys.called_request);
}

#[test]
fn v2_lines_become_alternates() {
    let legacy = tempfile::tempdir().unwrap();
    setup(
        &legacy,
        "L.sys",
        "multi Any ACU 2400 111 ogin: umulti\n\
         multi Night ACU 300 222\n",
    );
    let r = ResolverBuilder::new().v2_directory(legacy.path()).build();
    let sys = r.system("multi").unwrap();
    assert_eq!(sys.phone.as_deref(), Some("111"));
    assert_eq!(sys.alternates.len(), 1);
    assert_eq!(sys.alternates[0].phone.as_deref(), Some("222"));
    // the Night timetable expanded to real windows
    assert!(!sys.alternates[0].timegrade.is_empty());
}

#[test]
fn port_and_dialer_lookup_chain() {
    let dir = tempfile::tempdir().unwrap();
    setup(
        &dir,
        "port",
        "port serial1\n\
         type modem\n\
         device /dev/cua0\n\
         speed 9600\n\
         dialer hayes\n",
    );
    setup(
        &dir,
        "dial",
        "dialer hayes\n\
         chat \"\" ATZ OK\\r ATDT\\T CONNECT\n\
         carrier-wait 45\n",
    );
    let r = ResolverBuilder::new()
        .taylor_port_file(dir.path().join("port"))
        .taylor_dial_file(dir.path().join("dial"))
        .build();

    let port = r.port(Some("serial1"), None).unwrap();
    assert_eq!(port.port_type, PortType::Modem);
    assert_eq!(port.device.as_deref(), Some("/dev/cua0"));
    assert_eq!(port.speed, Some(9600));
    let Some(DialerChoice::Named(dialer_name)) = &port.dialer else {
        panic!("expected a named dialer, got {:?}", port.dialer);
    };

    let dialer = r.dialer(dialer_name).unwrap();
    assert_eq!(dialer.carrier_wait, 45);
    assert!(dialer.chat.script.iter().any(|t| t == "ATDT\\T"));
    assert!(dialer.carrier);

    // a speed constraint that nothing satisfies
    assert!(r.port(Some("serial1"), Some(300)).unwrap_err().is_not_found());
}

#[test]
fn hdb_tree_with_sysfiles_redirection() {
    let legacy = tempfile::tempdir().unwrap();
    setup(
        &legacy,
        "Sysfiles",
        "service=uucico systems=Systems.cico dialers=Dialers\n",
    );
    setup(&legacy, "Systems.cico", "remote Any ACU 1200 5559999 ogin: uremote\n");
    setup(&legacy, "Systems", "wrongfile Any ACU 300 0\n");
    setup(&legacy, "Devices", "ACU cul0 - 1200 hayes\n");
    setup(&legacy, "Dialers", "hayes =,-, \"\" ATDT\\T CONNECT\n");
    let r = ResolverBuilder::new().hdb_directory(legacy.path()).build();

    // Systems.cico is the active list; the conventional file is not
    let sys = r.system("remote").unwrap();
    assert_eq!(sys.phone.as_deref(), Some("5559999"));
    assert!(r.system("wrongfile").unwrap_err().is_not_found());

    // the devices table is untouched by the redirection
    let port = r.port(Some("ACU"), Some(1200)).unwrap();
    assert_eq!(port.port_type, PortType::Modem);
    let dialer = r.dialer("hayes").unwrap();
    assert_eq!(dialer.dialtone, ",");
}

#[test]
fn syntax_error_in_one_dialect_does_not_stop_resolution() {
    let taylor = tempfile::tempdir().unwrap();
    // bad argument count on a known keyword: a syntax error
    setup(&taylor, "sys", "system broken\nmax-retries 1 2 3\n");
    let legacy = tempfile::tempdir().unwrap();
    setup(&legacy, "Systems", "broken Any ACU 2400 5550202\n");
    let r = ResolverBuilder::new()
        .taylor_sys_file(taylor.path().join("sys"))
        .hdb_directory(legacy.path())
        .build();
    let sys = r.system("broken").unwrap();
    // the HDB record still resolved
    assert_eq!(sys.phone.as_deref(), Some("5550202"));
    assert_eq!(sys.speed, Some(2400));
}

#[test]
fn timetable_directives_reach_the_parser() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir, "sys", "system tt\ntime Weekend\n");
    let r = ResolverBuilder::new()
        .taylor_sys_file(dir.path().join("sys"))
        .timetable("Weekend", "Sa,Su")
        .build();
    let sys = r.system("tt").unwrap();
    let spans = sys.timegrade.spans();
    assert_eq!(spans.len(), 2);
    assert_eq!((spans[0].start, spans[0].end), (0, MINUTES_PER_DAY));
    assert_eq!(
        (spans[1].start, spans[1].end),
        (6 * MINUTES_PER_DAY, MINUTES_PER_WEEK)
    );
}
