//! `anchor run` / `anchor ps` command-line front end (C5 CLI surface + the
//! out-of-scope-for-the-library `ps` listing, C11).

use std::path::PathBuf;

use anchor::ledger;
use anchor::LaunchOptions;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anchor", about = "Minimal Linux container runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch a command inside a fresh container.
    Run(RunArgs),
    /// List currently running containers.
    Ps,
}

#[derive(Parser)]
struct RunArgs {
    /// Image tarball basename.
    #[arg(short = 'i', long, default_value = "ubuntu-export")]
    image_name: String,

    /// Where `<name>.tar` lives.
    #[arg(long, default_value = ".")]
    image_dir: PathBuf,

    /// Base directory for per-container state.
    #[arg(long, default_value = "./build/containers")]
    container_dir: PathBuf,

    /// Written to `cpu.shares`; `0` inherits the parent's share.
    #[arg(long, default_value_t = 0)]
    cpu_shares: u64,

    /// Bytes for `memory.limit_in_bytes`.
    #[arg(long)]
    memory: Option<u64>,

    /// Bytes for `memory.memsw.limit_in_bytes`; `-1` means unlimited.
    #[arg(long)]
    memory_swap: Option<i64>,

    /// `UID` or `UID:GID` to drop to before exec. Omit to keep running as
    /// whichever user anchor itself was invoked as.
    #[arg(long)]
    user: Option<String>,

    /// Command and arguments to run inside the container.
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Ps => ps(),
    };

    if let Err(err) = result {
        eprintln!("anchor: {err}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> anchor::Result<()> {
    let options = LaunchOptions::new(args.image_name, args.image_dir, args.container_dir)
        .cpu_shares(args.cpu_shares)
        .memory(args.memory)
        .memory_swap(args.memory_swap)
        .user(args.user);

    options.launch(args.command)
}

fn ps() -> anchor::Result<()> {
    let rows = ledger::read_all(&PathBuf::from("."))?;
    println!(
        "{:<10} {:<34} {:<20} {:<30} {}",
        "PID", "Container ID", "Image", "Command", "Created"
    );
    for row in rows {
        println!(
            "{:<10} {:<34} {:<20} {:<30} {}",
            row.pid, row.container_id, row.image, row.command, row.created
        );
    }
    Ok(())
}
