//! vecmul - run the GPU elementwise multiply once
//!
//! Multiplies `[0, 1, .., N)` by itself on the GPU and prints the result.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use vecmul_backend::{run_vector_multiply, Error, Outcome, PipelineConfig, Result, WgpuProbe};

const DEFAULT_LEN: u32 = 4;

fn main() -> ExitCode {
    // Skipped runs report themselves through `warn!`, so keep that visible.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<&str> = None;
    let mut len = DEFAULT_LEN;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--config" | "-c" => match iter.next() {
                Some(path) => config_path = Some(path.as_str()),
                None => {
                    eprintln!("[ERROR] --config needs a path");
                    return ExitCode::from(2);
                }
            },
            value => match value.parse::<u32>() {
                Ok(n) => len = n,
                Err(_) => {
                    eprintln!("[ERROR] Not an element count: {}", value);
                    print_usage();
                    return ExitCode::from(2);
                }
            },
        }
    }

    let config = match config_path {
        Some(path) => match PipelineConfig::from_file(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[ERROR] Failed to load config: {}", e);
                return ExitCode::from(2);
            }
        },
        None => PipelineConfig::default(),
    };

    let result = pollster::block_on(run_vector_multiply(&WgpuProbe, &config, len));
    let code = report(result, &mut io::stdout().lock(), &mut io::stderr().lock());
    ExitCode::from(code)
}

/// Write the run's outcome and return the process exit status.
///
/// A skipped run has already been reported by the library's `warn!`, so it
/// writes nothing here.
fn report<O: Write, E: Write>(result: Result<Outcome>, out: &mut O, err: &mut E) -> u8 {
    match result {
        Ok(Outcome::Completed(values)) => {
            let _ = writeln!(out, "{:?}", values);
            0
        }
        Ok(Outcome::Skipped(_)) => 0,
        Err(e) => {
            log::error!("pipeline failed: {}", e);
            let _ = writeln!(err, "[ERROR] {}", e);
            1
        }
    }
}

fn print_usage() {
    println!("USAGE:");
    println!("  vecmul [--config <CONFIG.json>] [ELEMENTS]");
    println!();
    println!("Multiplies [0, 1, .., ELEMENTS) by itself elementwise on the GPU.");
    println!("ELEMENTS defaults to {}. Each element is one GPU work-group, so", DEFAULT_LEN);
    println!("ELEMENTS is capped by the adapter's max work-groups per dimension");
    println!("(65535 on most adapters).");
    println!();
    println!("CONFIG keys (all optional):");
    println!("  backends               [\"vulkan\", \"metal\", \"dx12\", \"gl\"]");
    println!("  power_preference       \"high-performance\" | \"low-power\" | \"none\"");
    println!("  force_fallback_adapter true | false");
    println!("  readback_timeout_ms    milliseconds to wait for results");
    println!("  poll_interval_ms       milliseconds between device polls");
}
