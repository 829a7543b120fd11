use std::fs;
use std::io::{BufRead, BufReader};

use idlink_rs::config::{ConfigOverrides, IoOverrides, LinkConfig};
use idlink_rs::{Contact, IdentifyRequest, MemoryStore, Reconciler};

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn print_help() {
    eprintln!(
        r#"idlink_identify - resolve identify requests against a contact store

USAGE:
    idlink_identify [OPTIONS]

Reads one identify request per line as JSON ({{"email": ..., "phoneNumber": ...}})
and prints the consolidated contact for each.

OPTIONS:
    -c, --config <FILE>     Path to config file (TOML)
    -i, --input <FILE>      JSON-lines file of identify requests (default: stdin)
    -s, --seed <FILE>       JSON array of contacts used to seed the store
    -p, --pretty            Pretty-print output
    -h, --help              Print help

ENVIRONMENT:
    IDLINK_CONFIG           Path to config file
    IDLINK_IO_INPUT         JSON-lines input file
    IDLINK_IO_SEED          Store seed file

CONFIG FILE (idlink.toml):
    pretty = true

    [io]
    input = "requests.jsonl"
    seed = "contacts.json"
"#
    );
}

fn load_seed(store: &mut MemoryStore, path: &std::path::Path) -> anyhow::Result<usize> {
    let raw = fs::read_to_string(path)?;
    let contacts: Vec<Contact> = serde_json::from_str(&raw)?;
    let count = contacts.len();
    for contact in contacts {
        store.insert_contact(contact);
    }
    Ok(count)
}

fn main() -> anyhow::Result<()> {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt::init();

    let mut overrides = ConfigOverrides::default();
    let mut io_overrides = IoOverrides::default();
    if let Some(input) = parse_arg("--input").or_else(|| parse_arg("-i")) {
        io_overrides.input = Some(input.into());
    }
    if let Some(seed) = parse_arg("--seed").or_else(|| parse_arg("-s")) {
        io_overrides.seed = Some(seed.into());
    }
    if io_overrides.input.is_some() || io_overrides.seed.is_some() {
        overrides.io = Some(io_overrides);
    }
    if has_flag("--pretty") || has_flag("-p") {
        overrides.pretty = Some(true);
    }

    let config_path = parse_arg("--config")
        .or_else(|| parse_arg("-c"))
        .or_else(|| std::env::var("IDLINK_CONFIG").ok());
    let config = LinkConfig::load(config_path.as_deref(), overrides)?;

    let mut store = MemoryStore::new();
    if let Some(seed_path) = &config.io.seed {
        let seeded = load_seed(&mut store, seed_path)?;
        tracing::info!(seeded, path = %seed_path.display(), "seeded contact store");
    }
    let mut reconciler = Reconciler::with_store(store);

    let reader: Box<dyn BufRead> = match &config.io.input {
        Some(path) => Box::new(BufReader::new(fs::File::open(path)?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: IdentifyRequest = serde_json::from_str(&line)?;
        match reconciler.identify(&request) {
            Ok(outcome) => {
                let rendered = if config.pretty {
                    serde_json::to_string_pretty(&outcome.contact)?
                } else {
                    serde_json::to_string(&outcome.contact)?
                };
                println!("{rendered}");
                for event in &outcome.events {
                    tracing::info!(event = %serde_json::to_string(event)?, "domain event");
                }
            }
            Err(err) => {
                tracing::error!(%err, "identify failed");
                eprintln!("error: {err}");
            }
        }
    }

    Ok(())
}
