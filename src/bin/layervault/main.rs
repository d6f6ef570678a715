//! layervault CLI - load, inspect and extract chunked assets.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use layervault::catalogue::Catalogue;
use layervault::config::VaultConfig;
use layervault::loader::{format_duration, LoadReport, Loader};
use layervault::store::{AssetStatus, AssetStore, JournalStore};
use layervault::trait_pack::{is_auxiliary_id, TraitSchema};
use layervault::Result;
use tracing_subscriber::EnvFilter;

/// Verbosity selected on the command line
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// `RUST_LOG` wins over the command-line flags.
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("layervault={}", verbosity.filter())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = Verbosity::Info;
    let mut config_path: Option<&str> = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = Verbosity::Debug,
            "-vv" | "--trace" => verbosity = Verbosity::Trace,
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            "-C" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path.as_str()),
                None => {
                    eprintln!("Error: --config needs a file");
                    std::process::exit(1);
                }
            },
            _ => filtered_args.push(arg.as_str()),
        }
    }
    init_logging(verbosity);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let config = match config_path.map(VaultConfig::load).transpose() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let config = config.as_ref();

    let result = match filtered_args[0] {
        // Load command - populate a journal from a config
        "load" | "l" => {
            require(&filtered_args, 2, "layervault load <vault.json> [--parallel]");
            let parallel = filtered_args.iter().any(|&s| s == "--parallel" || s == "-p");
            cmd_load(filtered_args[1], parallel)
        }

        // List command - show stored assets
        "list" | "ls" => {
            require(&filtered_args, 2, "layervault list <journal> [catalogue.json]");
            cmd_list(filtered_args[1], filtered_args.get(2).copied(), config)
        }

        // Extract command - write decoded content to a file
        "extract" | "x" => {
            require(&filtered_args, 4, "layervault extract <journal> <id> <output>");
            cmd_extract(filtered_args[1], filtered_args[2], filtered_args[3], config)
        }

        // URI command - print decoded content as a data URI
        "uri" | "u" => {
            require(&filtered_args, 3, "layervault uri <journal> <id>");
            cmd_uri(filtered_args[1], filtered_args[2], config)
        }

        // Encode command - pack trait choices into an identifier
        "encode" | "e" => {
            require(&filtered_args, 2, "layervault encode [--catalogue <file>] <Category=Option>...");
            cmd_encode(&filtered_args[1..], config)
        }

        // Decode command - unpack an identifier
        "decode" | "d" => {
            require(&filtered_args, 2, "layervault decode <id> [catalogue.json]");
            cmd_decode(filtered_args[1], filtered_args.get(2).copied(), config)
        }

        "version" | "--version" | "-V" => {
            println!(
                "layervault {} (built {})",
                env!("CARGO_PKG_VERSION"),
                env!("LAYERVAULT_BUILD_DATE")
            );
            Ok(())
        }

        // Help
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn require(args: &[&str], count: usize, usage: &str) {
    if args.len() < count {
        eprintln!("Error: missing arguments");
        eprintln!("Usage: {}", usage);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("layervault - chunked asset storage toolkit");
    println!();
    println!("USAGE:");
    println!("    layervault [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    l, load    <vault.json> [--parallel]   Load layers and auxiliary assets");
    println!("    ls, list   <journal> [catalogue]       List stored assets");
    println!("    x, extract <journal> <id> <output>     Write decoded asset to a file");
    println!("    u, uri     <journal> <id>              Print decoded asset as a data URI");
    println!("    e, encode  [--catalogue f] <Cat=Opt>.. Pack trait choices into an id");
    println!("    d, decode  <id> [catalogue]            Unpack a packed trait id");
    println!("    version                                Show version");
    println!("    h, help                                Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose  Debug output");
    println!("    -vv, --trace   Trace output (every write)");
    println!("    -q, --quiet    Errors only");
    println!("    -C, --config   Vault config supplying schema, catalogue and word width");
    println!();
    println!("Identifiers accept decimal or 0x-prefixed hex.");
}

fn parse_id(value: &str) -> Result<u64> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| layervault::Error::config(format!("invalid identifier: {}", value)))
}

fn print_report(title: &str, report: &LoadReport) {
    if report.assets.is_empty() {
        return;
    }
    println!("{}:", title);
    for asset in &report.assets {
        let name = asset
            .path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if asset.skipped {
            println!("  {:#018x}  {:<32} already loaded", asset.id, name);
            continue;
        }
        println!(
            "  {:#018x}  {:<32} {:>8} -> {:>8} bytes  {:>5} words  {:>3} ops  cost {}",
            asset.id, name, asset.bytes, asset.stored_bytes, asset.words, asset.operations, asset.cost
        );
    }
    println!(
        "  {} loaded, {} words, {} operations, total cost {} in {}",
        report.loaded(),
        report.total_words(),
        report.total_operations(),
        report.total_cost(),
        format_duration(report.elapsed)
    );
}

fn cmd_load(config_path: &str, parallel: bool) -> Result<()> {
    let config = VaultConfig::load(config_path)?;
    let parallel = parallel || config.parallel;
    let store = JournalStore::open_with(&config.journal, config.journal_options())?;
    let catalogue = config.catalogue.as_ref().map(|_| config.load_catalogue()).transpose()?;
    let loader = Loader::new(&store, config)?;

    let mut cumulative = 0u64;
    if let Some(catalogue) = &catalogue {
        let report = if parallel {
            loader.load_layers_parallel(catalogue)?
        } else {
            loader.load_layers(catalogue)?
        };
        print_report("Layers", &report);
        cumulative += report.total_cost();
    }

    let report = loader.load_configured_auxiliary()?;
    print_report("Auxiliary", &report);
    cumulative += report.total_cost();

    println!("Cumulative cost: {}", cumulative);
    Ok(())
}

/// Trait schema in effect: the config's, or the character schema.
fn trait_schema(config: Option<&VaultConfig>) -> TraitSchema {
    config.map_or_else(TraitSchema::banny, VaultConfig::trait_schema)
}

/// Catalogue named on the command line, else the one the config points at.
fn load_catalogue(path: Option<&str>, config: Option<&VaultConfig>) -> Result<Option<Catalogue>> {
    match (path, config) {
        (Some(path), _) => Catalogue::load(trait_schema(config), path).map(Some),
        (None, Some(config)) if config.catalogue.is_some() => config.load_catalogue().map(Some),
        _ => Ok(None),
    }
}

fn open_journal(journal: &str, config: Option<&VaultConfig>) -> Result<JournalStore> {
    if !Path::new(journal).exists() {
        return Err(layervault::Error::FileNotFound(journal.into()));
    }
    match config {
        Some(config) => JournalStore::open_with(journal, config.journal_options()),
        None => JournalStore::open(journal),
    }
}

fn cmd_list(journal: &str, catalogue: Option<&str>, config: Option<&VaultConfig>) -> Result<()> {
    let store = open_journal(journal, config)?;
    let catalogue = load_catalogue(catalogue, config)?;

    let ids = store.asset_ids();
    println!("{} assets in {}", ids.len(), journal);
    for id in ids {
        let record = store.read_asset(id)?;
        let status = match record.status {
            AssetStatus::Sealed(tag) => format!("{} ({})", tag.kind, if tag.encoding.is_compressed() { "deflate" } else { "raw" }),
            AssetStatus::Open => format!("OPEN {}/{} words", record.words.len(), record.expected_words()),
        };
        let label = if is_auxiliary_id(id) {
            "auxiliary".to_string()
        } else if let Some(catalogue) = &catalogue {
            catalogue
                .describe(id)?
                .into_iter()
                .map(|(c, o)| format!("{}={}", c, o))
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            String::new()
        };
        println!(
            "  {:#018x}  {:>8} bytes  {:>5} words  {:<24} {}",
            id,
            record.total_length,
            record.words.len(),
            status,
            label
        );
    }
    Ok(())
}

fn cmd_extract(journal: &str, id: &str, output: &str, config: Option<&VaultConfig>) -> Result<()> {
    let store = open_journal(journal, config)?;
    let content = store.read_content(parse_id(id)?)?;
    std::fs::write(output, &content.bytes)?;
    println!("Wrote {} bytes of {} to {}", content.bytes.len(), content.kind, output);
    Ok(())
}

fn cmd_uri(journal: &str, id: &str, config: Option<&VaultConfig>) -> Result<()> {
    let store = open_journal(journal, config)?;
    println!("{}", store.read_content(parse_id(id)?)?.data_uri());
    Ok(())
}

fn cmd_encode(args: &[&str], config: Option<&VaultConfig>) -> Result<()> {
    let mut catalogue_path = None;
    let mut pairs = Vec::new();
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        if arg == "--catalogue" || arg == "-c" {
            catalogue_path = iter.next().copied();
        } else {
            pairs.push(arg);
        }
    }
    let catalogue = load_catalogue(catalogue_path, config)?;
    let id = encode_pairs(&trait_schema(config), catalogue.as_ref(), &pairs)?;
    println!("{} ({:#x})", id, id);
    Ok(())
}

/// Pack `Category=Option` pairs; options are indexes or catalogue names.
fn encode_pairs(schema: &TraitSchema, catalogue: Option<&Catalogue>, pairs: &[&str]) -> Result<u64> {
    let mut choices = Vec::new();
    let mut named = BTreeMap::new();
    for pair in pairs {
        let (category, option) = pair
            .split_once('=')
            .ok_or_else(|| layervault::Error::config(format!("expected Category=Option, got {}", pair)))?;
        match option.parse::<u32>() {
            Ok(index) => choices.push((category.to_string(), index)),
            Err(_) => {
                named.insert(category.to_string(), option.to_string());
            }
        }
    }
    if !named.is_empty() {
        let catalogue = catalogue.ok_or_else(|| layervault::Error::config("option names need a catalogue"))?;
        let selection = catalogue.selection(&named)?;
        choices.extend(selection.iter().map(|(category, option)| (category.to_string(), option)));
    }
    Ok(schema.encode_choices(choices)?)
}

fn cmd_decode(id: &str, catalogue: Option<&str>, config: Option<&VaultConfig>) -> Result<()> {
    let id = parse_id(id)?;
    if is_auxiliary_id(id) {
        println!("{:#x} is an auxiliary identifier", id);
        return Ok(());
    }
    match load_catalogue(catalogue, config)? {
        Some(catalogue) => {
            for (category, option) in catalogue.describe(id)? {
                println!("{:<16} {}", category, option);
            }
        }
        None => {
            for (category, option) in trait_schema(config).decode_all(id)?.iter() {
                println!("{:<16} {}", category, option);
            }
        }
    }
    Ok(())
}
