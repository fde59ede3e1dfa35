//! Configuration checker: resolves records and dumps the result
// (c) 2025 Ross Younger

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use uucfg::timespan::TimeSpanList;
use uucfg::{Chat, PortChoice, Resolver, System};

#[derive(Debug, Parser)]
#[command(
    name = "uuchk",
    version,
    about = "Resolves UUCP configuration records and prints the result",
    long_about = "Resolves system, port and dialer records across the active \
configuration dialects, exactly as a calling program would see them, and \
prints the fully-defaulted result."
)]
struct Cli {
    /// Main configuration file to read instead of the default search path
    #[arg(short = 'I', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Resolve a single system (default: every known system)
    #[arg(short, long, value_name = "NAME")]
    system: Option<String>,

    /// List known system names and exit
    #[arg(long)]
    list: bool,

    /// Look up a port by name
    #[arg(long, value_name = "NAME")]
    port: Option<String>,

    /// Look up a dialer by name
    #[arg(long, value_name = "NAME")]
    dialer: Option<String>,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uucfg=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let resolver = match &args.config {
        Some(path) => Resolver::from_config_file(path)?,
        None => Resolver::standard(),
    };

    if args.list {
        for name in resolver.system_names()? {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(name) = &args.port {
        let port = resolver.port(Some(name.as_str()), None)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&port)?);
        } else {
            println!("port {name}: {port:#?}");
        }
        return Ok(());
    }

    if let Some(name) = &args.dialer {
        let dialer = resolver.dialer(name)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&dialer)?);
        } else {
            println!("dialer {name}: {dialer:#?}");
        }
        return Ok(());
    }

    let names = match &args.system {
        Some(name) => vec![name.clone()],
        None => resolver.system_names()?,
    };
    let mut first = true;
    for name in names {
        let system = resolver.system(&name)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&system)?);
        } else {
            if !first {
                println!();
            }
            print_system(&system, 0);
        }
        first = false;
    }
    Ok(())
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn grade_char(value: i64) -> char {
    u32::try_from(value)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or('?')
}

fn format_grade_spans(list: &TimeSpanList) -> String {
    if list.is_empty() {
        return "never".to_string();
    }
    list.spans()
        .iter()
        .map(|s| {
            let mut out = format!("{} grade {}", s.expression(), grade_char(s.value));
            if s.retry != 0 {
                out.push_str(&format!(" retry {}", s.retry));
            }
            out
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_size_spans(list: &TimeSpanList) -> String {
    list.spans()
        .iter()
        .map(|s| format!("{} max {} bytes", s.expression(), s.value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn print_chat(label: &str, chat: &Chat, depth: usize) {
    let pad = indent(depth);
    if chat.script.is_empty() && chat.program.is_empty() {
        println!("{pad}{label}: none (timeout {})", chat.timeout);
        return;
    }
    println!("{pad}{label}: {} (timeout {})", chat.script.join(" "), chat.timeout);
    if !chat.program.is_empty() {
        println!("{pad}{label}-program: {}", chat.program.join(" "));
    }
    if !chat.fail.is_empty() {
        println!("{pad}{label}-fail: {}", chat.fail.join(" "));
    }
}

fn print_system(sys: &System, depth: usize) {
    let pad = indent(depth);
    if depth == 0 {
        println!("system {}", sys.name);
    }
    if !sys.aliases.is_empty() {
        println!("{pad}  aliases: {}", sys.aliases.join(" "));
    }
    let pad = indent(depth + 1);
    if let Some(v) = &sys.call_login {
        println!("{pad}call-login: {v}");
    }
    if let Some(v) = &sys.call_password {
        println!("{pad}call-password: {v}");
    }
    if let Some(v) = &sys.called_login {
        println!("{pad}called-login: {v}");
    }
    match &sys.port {
        Some(PortChoice::Named(n)) => println!("{pad}port: {n}"),
        Some(PortChoice::Inline(p)) => {
            println!("{pad}port: ({} type, inline)", p.port_type);
        }
        None => {}
    }
    if let Some(v) = sys.speed {
        println!("{pad}speed: {v}");
    }
    if let Some(v) = &sys.phone {
        println!("{pad}phone: {v}");
    }
    println!("{pad}time: {}", format_grade_spans(&sys.timegrade));
    for (label, list) in [
        ("call-local-size", &sys.call_local_size),
        ("call-remote-size", &sys.call_remote_size),
        ("called-local-size", &sys.called_local_size),
        ("called-remote-size", &sys.called_remote_size),
    ] {
        if !list.is_empty() {
            println!("{pad}{label}: {}", format_size_spans(list));
        }
    }
    print_chat("chat", &sys.call_chat, depth + 1);
    print_chat("called-chat", &sys.called_chat, depth + 1);
    println!("{pad}commands: {}", sys.commands.join(" "));
    println!("{pad}local-send: {}", sys.local_send.join(" "));
    println!("{pad}remote-send: {}", sys.remote_send.join(" "));
    println!("{pad}local-receive: {}", sys.local_receive.join(" "));
    println!("{pad}remote-receive: {}", sys.remote_receive.join(" "));
    if !sys.forward_to.is_empty() {
        println!("{pad}forward-to: {}", sys.forward_to.join(" "));
    }
    if !sys.forward_from.is_empty() {
        println!("{pad}forward-from: {}", sys.forward_from.join(" "));
    }
    if let Some(v) = &sys.protocols {
        println!("{pad}protocols: {v}");
    }
    for p in &sys.proto_params {
        for entry in &p.entries {
            println!("{pad}protocol-parameter {}: {}", p.protocol, entry.join(" "));
        }
    }
    println!(
        "{pad}request: call {}, called {}",
        if sys.call_request { "yes" } else { "no" },
        if sys.called_request { "yes" } else { "no" }
    );
    println!(
        "{pad}transfer: call {}, called {}",
        if sys.call_transfer { "yes" } else { "no" },
        if sys.called_transfer { "yes" } else { "no" }
    );
    println!("{pad}max-retries: {}", sys.max_retries);
    if sys.success_wait != 0 {
        println!("{pad}success-wait: {}", sys.success_wait);
    }
    println!("{pad}pubdir: {}", sys.pubdir);
    for (i, alt) in sys.alternates.iter().enumerate() {
        println!("{pad}alternate {}:", i + 1);
        print_system(alt, depth + 1);
    }
}
