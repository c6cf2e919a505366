// src/main.rs

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rpmtx::hash::verify_file_digests;
use rpmtx::{
    EngineConfig, Evr, OrderedTransaction, PackagePool, PkgId, RpmPackage, Transaction, Warning, compare_labels,
    order_transaction,
};
use serde_json::json;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rpmtx")]
#[command(author, version, about = "Read, verify and order RPM packages", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show package metadata and dependencies
    Query {
        /// Path to the package file
        package: PathBuf,
        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the files in a package payload
    List {
        /// Path to the package file
        package: PathBuf,
    },
    /// Compare two [epoch:]version[-release] labels
    Vercmp { a: String, b: String },
    /// Order a transaction over package files
    Order {
        /// Packages to install
        #[arg(short, long, num_args = 1..)]
        install: Vec<PathBuf>,
        /// Installed packages to erase; a same-named --install package updates it
        #[arg(short, long, num_args = 1..)]
        erase: Vec<PathBuf>,
        /// Print operations as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check header and file digests and header re-encoding
    Verify {
        /// Path to the package file
        package: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => Ok(EngineConfig::load(p)?),
        None => Ok(EngineConfig::default()),
    }
}

fn open_package(path: &Path) -> Result<RpmPackage> {
    let pkg = RpmPackage::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    for w in pkg.warnings() {
        warn!("{}: {}", path.display(), w);
    }
    Ok(pkg)
}

fn cmd_query(path: &Path, as_json: bool) -> Result<()> {
    let pkg = open_package(path)?;
    let record = pkg.record();
    if as_json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("{}", record.nevra());
    if !record.summary.is_empty() {
        println!("Summary: {}", record.summary);
    }
    println!("Provides:");
    for p in &record.provides {
        println!("  {}", p);
    }
    println!("Requires:");
    for r in &record.requires {
        println!("  {}", r);
    }
    Ok(())
}

fn cmd_list(path: &Path, config: &EngineConfig) -> Result<()> {
    let pkg = open_package(path)?;
    let archive = pkg.payload(&config.payload)?;
    for file in &archive.files {
        println!("{:06o} {:>10} {}", file.entry.mode, file.entry.size, file.path());
    }
    for w in &archive.warnings {
        warn!("{}", w);
    }
    Ok(())
}

fn cmd_vercmp(a: &str, b: &str) -> i32 {
    match compare_labels(&Evr::parse(a), &Evr::parse(b)) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Turn file lists into a request: an erased package with the same name as
/// an incoming one is updated by it, one matched by its obsoletes is obsoleted
fn build_request(pool: &PackagePool, install: &[PkgId], erase: &[PkgId]) -> Transaction {
    let mut tx = Transaction::new();
    let mut replaced = Vec::new();
    for &new in install {
        let record = &pool[new];
        let mut updates = false;
        for &old in erase {
            if pool[old].name == record.name {
                tx.update(new, old);
                replaced.push(old);
                updates = true;
            } else if record.obsoletes.iter().any(|o| {
                o.name == pool[old].name
                    && rpmtx::ranges_intersect(o.flags, &o.evr(), rpmtx::DepFlags::EQUAL, &pool[old].evr())
            }) {
                tx.obsolete(new, old);
                replaced.push(old);
                updates = true;
            }
        }
        if !updates {
            tx.install(new);
        }
    }
    for &old in erase {
        if !replaced.contains(&old) {
            tx.erase(old);
        }
    }
    tx
}

fn print_transaction(pool: &PackagePool, result: &OrderedTransaction, as_json: bool) -> Result<()> {
    if as_json {
        let ops: Vec<_> = result
            .operations
            .iter()
            .map(|op| {
                json!({
                    "kind": op.kind,
                    "package": pool[op.package].nevra(),
                    "supersedes": op.supersedes.iter().map(|p| pool[*p].nevra()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let warnings: Vec<String> = result.warnings.iter().map(|w| w.to_string()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "operations": ops, "warnings": warnings }))?
        );
        return Ok(());
    }

    for op in &result.operations {
        println!("{:<8} {}", op.kind.as_str(), pool[op.package].nevra());
    }
    for w in &result.warnings {
        eprintln!("warning: {}", w);
    }
    Ok(())
}

fn cmd_order(install: &[PathBuf], erase: &[PathBuf], config: &EngineConfig, as_json: bool) -> Result<()> {
    if install.is_empty() && erase.is_empty() {
        bail!("Nothing to order: pass --install and/or --erase packages");
    }

    let mut pool = PackagePool::new();
    let mut load = |paths: &[PathBuf]| -> Result<Vec<PkgId>> {
        paths
            .iter()
            .map(|p| -> Result<PkgId> { Ok(pool.add(open_package(p)?.record().clone())) })
            .collect()
    };
    let install_ids = load(install)?;
    let erase_ids = load(erase)?;

    let tx = build_request(&pool, &install_ids, &erase_ids);
    let result = order_transaction(&pool, &tx, &config.ordering)?;
    info!(
        "{} operations, {} dependency loops cut",
        result.operations.len(),
        result.warnings.len()
    );
    print_transaction(&pool, &result, as_json)
}

fn cmd_verify(path: &Path, config: &EngineConfig) -> Result<()> {
    let pkg = open_package(path)?;
    let mut problems: Vec<Warning> = pkg.verify_digests().into_iter().map(Warning::from).collect();

    let stable = pkg.header_is_stable()?;
    if stable {
        println!("ok   header re-encodes byte-identically");
    } else {
        println!("FAIL header does not re-encode byte-identically");
    }

    let archive = pkg.payload(&config.payload)?;
    problems.extend(archive.warnings.iter().cloned().map(Warning::from));
    problems.extend(verify_file_digests(pkg.record(), &archive.files)?.into_iter().map(Warning::from));
    for w in &problems {
        println!("FAIL {}", w);
    }

    let count = problems.len() + usize::from(!stable);
    if count > 0 {
        bail!("{}: {} problems found", path.display(), count);
    }
    println!("{}: {} files verified", pkg.record().nevra(), archive.files.len());
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Query { package, json } => cmd_query(&package, json),
        Commands::List { package } => cmd_list(&package, &config),
        Commands::Vercmp { a, b } => {
            println!("{}", cmd_vercmp(&a, &b));
            Ok(())
        }
        Commands::Order { install, erase, json } => cmd_order(&install, &erase, &config, json),
        Commands::Verify { package } => cmd_verify(&package, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpmtx::PackageRecord;
    use rpmtx::packages::Dependency;

    #[test]
    fn test_vercmp() {
        assert_eq!(cmd_vercmp("1.0-1", "1.0-2"), -1);
        assert_eq!(cmd_vercmp("2:1.0", "1:9.9"), 1);
        assert_eq!(cmd_vercmp("1.0", "1.0"), 0);
    }

    #[test]
    fn test_build_request() {
        let mut pool = PackagePool::new();
        let new = pool.add(PackageRecord::new("bash", "5.2", "1"));
        let mut merged = PackageRecord::new("coreutils", "9", "1");
        merged.obsoletes.push(Dependency::named("coreutils-single"));
        let merged = pool.add(merged);
        let old = pool.add(PackageRecord::new("bash", "5.1", "3"));
        let single = pool.add(PackageRecord::new("coreutils-single", "8", "1"));
        let gone = pool.add(PackageRecord::new("telnet", "1", "1"));

        let tx = build_request(&pool, &[new, merged], &[old, single, gone]);
        assert_eq!(tx.superseded(new), vec![old]);
        assert_eq!(tx.superseded(merged), vec![single]);
        assert_eq!(tx.erasures(), vec![gone]);
        assert!(tx.validate(&pool).is_ok());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(load_config(Some(Path::new("/nonexistent/rpmtx.toml"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
