use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use rosterlink::config::{EngineConfig, config_path, default_config_yaml, load_config};
use rosterlink::loader::{Loader, LoaderConfig, LoadError, RunSummary};
use rosterlink::matcher::best_match;
use rosterlink::records::{parse_jsonl_records, parse_jsonl_seeds};
use rosterlink::store::RosterStore;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

const WORK_DIR: &str = ".rosterlink";

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<rusqlite::Error> for CliError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new("sqlite_error", value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

impl From<rosterlink::config::ConfigError> for CliError {
    fn from(value: rosterlink::config::ConfigError) -> Self {
        Self::new("config_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "rosterlink")]
#[command(about = "Reconcile state roster records against the district reference registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init,
    Seed(SeedArgs),
    Load(LoadArgs),
    Match(MatchArgs),
    Batches,
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct SeedArgs {
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct LoadArgs {
    #[arg(long)]
    jurisdiction: String,
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct MatchArgs {
    #[arg(long)]
    jurisdiction: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct ShowArgs {
    batch_id: i64,
}

#[derive(Debug, Clone)]
struct WorkPaths {
    root: PathBuf,
    config: PathBuf,
    database: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    let (paths, config) = work_paths(&cwd)?;
    match cli.command {
        Command::Init => cmd_init(&paths),
        Command::Seed(args) => cmd_seed(&paths, args),
        Command::Load(args) => cmd_load(&paths, &config, args),
        Command::Match(args) => cmd_match(&paths, &config, args),
        Command::Batches => cmd_batches(&paths),
        Command::Show(args) => cmd_show(&paths, args),
    }
}

fn cmd_init(paths: &WorkPaths) -> Result<(), CliError> {
    fs::create_dir_all(&paths.root).map_err(|err| CliError::io("mkdir_error", err))?;
    let _ = RosterStore::open(&path_string(&paths.database))?;
    if !paths.config.exists() {
        fs::write(&paths.config, default_config_yaml())
            .map_err(|err| CliError::io("write_error", err))?;
    }

    print_json(&json!({
        "status": "ok",
        "root": paths.root,
        "database": paths.database,
        "config": paths.config,
    }))
}

fn cmd_seed(paths: &WorkPaths, args: SeedArgs) -> Result<(), CliError> {
    require_initialized(paths)?;
    let input = fs::read_to_string(&args.input).map_err(|err| CliError::io("read_error", err))?;
    let seeds = parse_jsonl_seeds(&input)?;

    let store = RosterStore::open(&path_string(&paths.database))?;
    let mut jurisdictions = Vec::new();
    for seed in &seeds {
        store.upsert_reference(seed)?;
        let jurisdiction = seed.jurisdiction.to_lowercase();
        if !jurisdictions.contains(&jurisdiction) {
            jurisdictions.push(jurisdiction);
        }
    }
    jurisdictions.sort();

    print_json(&json!({
        "status": "ok",
        "seeded": seeds.len(),
        "jurisdictions": jurisdictions,
    }))
}

fn cmd_load(paths: &WorkPaths, config: &EngineConfig, args: LoadArgs) -> Result<(), CliError> {
    require_initialized(paths)?;
    let input = fs::read_to_string(&args.input).map_err(|err| CliError::io("read_error", err))?;
    let records = parse_jsonl_records(&input)?;
    let jurisdiction = args.jurisdiction.to_lowercase();
    let source = args
        .source
        .unwrap_or_else(|| args.input.to_string_lossy().into_owned());

    let store = RosterStore::open(&path_string(&paths.database))?;
    let loader = Loader::new(
        &store,
        LoaderConfig {
            jurisdiction: jurisdiction.clone(),
            source,
            source_hash: sha256_hex(&input),
            vocabulary: config.vocabulary_for(&jurisdiction),
        },
    );

    match loader.run(&records) {
        Ok(summary) => {
            if args.pretty {
                print_pretty_summary(&summary);
                Ok(())
            } else {
                let mut payload = serde_json::to_value(&summary)?;
                if let Value::Object(map) = &mut payload {
                    map.insert("status".to_string(), json!("ok"));
                }
                print_json(&payload)
            }
        }
        // reported, not fatal to the calling process
        Err(LoadError::AlreadyLoaded {
            jurisdiction,
            existing,
        }) => print_json(&json!({
            "status": "aborted",
            "reason": "already_loaded",
            "jurisdiction": jurisdiction,
            "existing_records": existing,
        })),
        Err(LoadError::Store(err)) => Err(err.into()),
    }
}

fn cmd_match(paths: &WorkPaths, config: &EngineConfig, args: MatchArgs) -> Result<(), CliError> {
    require_initialized(paths)?;
    let jurisdiction = args.jurisdiction.to_lowercase();
    let store = RosterStore::open(&path_string(&paths.database))?;
    let candidates = store.reference_candidates(&jurisdiction)?;
    let vocabulary = config.vocabulary_for(&jurisdiction);

    match best_match(&args.name, &candidates, &vocabulary) {
        Some(decision) => print_json(&json!({
            "matched": true,
            "name": args.name,
            "ref_id": decision.ref_id,
            "canonical_name": decision.canonical_name,
            "normalized_incoming": decision.normalized_incoming,
            "normalized_candidate": decision.normalized_candidate,
            "method": decision.method.as_str(),
            "score": decision.score,
            "needs_review": decision.needs_review,
        })),
        None => print_json(&json!({
            "matched": false,
            "name": args.name,
            "candidates_scanned": candidates.len(),
        })),
    }
}

fn cmd_batches(paths: &WorkPaths) -> Result<(), CliError> {
    require_initialized(paths)?;
    let store = RosterStore::open(&path_string(&paths.database))?;
    let batches = store
        .batches()?
        .into_iter()
        .map(|batch| {
            json!({
                "batch_id": batch.batch_id,
                "jurisdiction": batch.jurisdiction,
                "source": batch.source,
                "source_hash": batch.source_hash,
                "record_count": batch.record_count,
                "success_count": batch.success_count,
                "error_count": batch.error_count,
                "created_at": batch.created_at,
            })
        })
        .collect::<Vec<_>>();
    print_json(&json!({ "batches": batches }))
}

fn cmd_show(paths: &WorkPaths, args: ShowArgs) -> Result<(), CliError> {
    require_initialized(paths)?;
    let store = RosterStore::open(&path_string(&paths.database))?;
    let Some(batch) = store.batch(args.batch_id)? else {
        return Err(CliError::new(
            "batch_not_found",
            format!("import batch `{}` not found", args.batch_id),
        ));
    };

    let records = store
        .batch_records(args.batch_id)?
        .into_iter()
        .map(|record| {
            json!({
                "record_id": record.record_id,
                "name": record.name,
                "matched": record.ref_id.is_some(),
                "ref_id": record.ref_id,
                "method": record.method,
                "confidence": record.confidence,
                "needs_review": record.needs_review,
            })
        })
        .collect::<Vec<_>>();

    print_json(&json!({
        "batch": {
            "batch_id": batch.batch_id,
            "jurisdiction": batch.jurisdiction,
            "source": batch.source,
            "source_hash": batch.source_hash,
            "record_count": batch.record_count,
            "success_count": batch.success_count,
            "error_count": batch.error_count,
            "created_at": batch.created_at,
        },
        "records": records,
    }))
}

fn print_pretty_summary(summary: &RunSummary) {
    println!("jurisdiction: {}", summary.jurisdiction);
    println!("batch: {} source: {}", summary.batch_id, summary.source);
    println!(
        "loaded: {} matched: {} unmatched: {} errors: {}",
        summary.loaded, summary.matched, summary.unmatched, summary.errors
    );
    println!(
        "methods: exact_name={} normalized_name={} fuzzy={}",
        summary.exact_name, summary.normalized_name, summary.fuzzy
    );
    println!("needs_review: {}", summary.needs_review);
    println!(
        "coverage: {:.1}% -> {:.1}%",
        summary.coverage_before * 100.0,
        summary.coverage_after * 100.0
    );
    if !summary.unmatched_sample.is_empty() {
        println!("unmatched sample:");
        for name in &summary.unmatched_sample {
            println!("- {name}");
        }
    }
}

fn work_paths(cwd: &Path) -> Result<(WorkPaths, EngineConfig), CliError> {
    let root = cwd.join(WORK_DIR);
    let config = load_config(&root)?;
    let database = config.resolve_database();
    Ok((
        WorkPaths {
            config: config_path(&root),
            root,
            database,
        },
        config,
    ))
}

fn require_initialized(paths: &WorkPaths) -> Result<(), CliError> {
    if !paths.root.exists() || !paths.database.exists() {
        return Err(CliError::new(
            "not_initialized",
            "store is not initialized; run `rosterlink init`",
        ));
    }
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
