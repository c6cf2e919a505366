// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package file path
fn package_arg() -> Arg {
    Arg::new("package").required(true).help("Path to the package file")
}

fn build_cli() -> Command {
    Command::new("rpmtx")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Read, verify and order RPM packages")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Engine configuration file (TOML)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("query")
                .about("Show package metadata and dependencies")
                .arg(package_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full record as JSON"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List the files in a package payload")
                .arg(package_arg()),
        )
        .subcommand(
            Command::new("vercmp")
                .about("Compare two [epoch:]version[-release] labels")
                .arg(Arg::new("a").required(true))
                .arg(Arg::new("b").required(true)),
        )
        .subcommand(
            Command::new("order")
                .about("Order a transaction over package files")
                .arg(
                    Arg::new("install")
                        .short('i')
                        .long("install")
                        .num_args(1..)
                        .help("Packages to install"),
                )
                .arg(
                    Arg::new("erase")
                        .short('e')
                        .long("erase")
                        .num_args(1..)
                        .help("Installed packages to erase; a same-named --install package updates it"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print operations as JSON"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Check header and file digests and header re-encoding")
                .arg(package_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rpmtx.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
