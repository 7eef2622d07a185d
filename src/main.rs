use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use filament::{
    evaluate_with_limits, reference_program, reference_roots, Bits, ExecutionResult, Limits,
    ProgramBlob, ProgramBundle,
};

#[derive(Parser)]
#[command(
    name = "filament",
    version,
    about = "Merkle-ized combinator programs on a bit machine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the reference program's root triple
    Roots {
        /// Emit JSON instead of one root per line
        #[arg(long)]
        json: bool,
    },
    /// Execute the reference program on the bit machine
    Run {
        /// Step ceiling (default 2^22)
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Write a JSON bundle (name, roots, optional blob) for the reference program
    Bundle {
        /// Output path
        #[arg(short, long)]
        out: PathBuf,
        /// Attach a framed program blob read from this file
        #[arg(long)]
        blob: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Roots { json } => {
            let roots = reference_roots();
            if json {
                println!("{}", ProgramBundle::new("ctx8-reference", &roots).to_json());
            } else {
                println!("cmr  {}", roots.cmr);
                println!("imr  {}", roots.imr);
                println!("amr  {}", roots.amr);
            }
        }
        Command::Run { max_steps } => {
            let program = match reference_program() {
                Ok(program) => program,
                Err(e) => {
                    eprintln!("error: {e}");
                    process::exit(1);
                }
            };
            let mut limits = Limits::default();
            if let Some(max_steps) = max_steps {
                limits.max_steps = max_steps;
            }
            match evaluate_with_limits(&program, &Bits::new(), limits) {
                ExecutionResult::Succeeded(output) => {
                    if output.is_empty() {
                        println!("succeeded");
                    } else {
                        println!("succeeded: {output}");
                    }
                }
                ExecutionResult::Failed(failure) => {
                    println!("failed: {failure}");
                    process::exit(1);
                }
                ExecutionResult::Faulted(fault) => {
                    eprintln!("error: {fault}");
                    process::exit(1);
                }
            }
        }
        Command::Bundle { out, blob } => {
            let mut bundle = ProgramBundle::new("ctx8-reference", &reference_roots());
            if let Some(blob_path) = blob {
                let data = match std::fs::read(&blob_path) {
                    Ok(data) => data,
                    Err(e) => {
                        eprintln!("error: reading '{}': {e}", blob_path.display());
                        process::exit(1);
                    }
                };
                let blob = match ProgramBlob::decode(&data) {
                    Ok(blob) => blob,
                    Err(e) => {
                        eprintln!("error: '{}': {e}", blob_path.display());
                        process::exit(1);
                    }
                };
                bundle = bundle.with_blob(&blob);
            }
            if let Err(e) = bundle.write(&out) {
                eprintln!("error: writing '{}': {e}", out.display());
                process::exit(1);
            }
            println!("wrote {}", out.display());
        }
    }
}
