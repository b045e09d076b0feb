use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "halo-bfs workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark the iterative and fused enactors and write a comparison
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

const BENCH: &str = "enactor_benchmark";
const VARIANTS: &[&str] = &["iterative", "fused"];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Compiling {BENCH}...");
    let status = Command::new("cargo")
        .args(["build", "--bench", BENCH, "--release"])
        .status()?;
    if !status.success() {
        anyhow::bail!("failed to compile {BENCH}");
    }

    let start = Instant::now();
    let mut cmd = Command::new("cargo");
    cmd.env("CARGO_INCREMENTAL", "0")
        .args(["bench", "--bench", BENCH, "--"]);
    if quick {
        cmd.args(["--measurement-time", "0.5", "--noplot", "--sample-size", "10"]);
    }
    let status = cmd.status().with_context(|| format!("failed to run {BENCH}"))?;
    if !status.success() {
        anyhow::bail!("{BENCH} exited with {status}");
    }
    println!("Finished in {:.2?}", start.elapsed());
    Ok(())
}

/// Edges traversed per second for each `(graph size, variant)`.
type Results = BTreeMap<u32, BTreeMap<String, f64>>;

fn generate_report() -> Result<()> {
    let criterion_dir = Path::new("target/criterion/bfs");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    for variant in VARIANTS {
        let variant_dir = criterion_dir.join(variant);
        let Ok(entries) = fs::read_dir(&variant_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Some(side) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if let Some(rate) = edges_per_second(&entry.path().join("new"))? {
                results
                    .entry(side)
                    .or_default()
                    .insert((*variant).to_owned(), rate);
            }
        }
    }

    let report_path = Path::new("benchmark_results/bfs_report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)?;

    writeln!(file, "# Iterative vs Fused BFS")?;
    writeln!(file)?;
    writeln!(file, "| Grid side | iterative (edges/s) | fused (edges/s) | fused vs iterative |")?;
    writeln!(file, "|---|---|---|---|")?;
    for (side, rates) in &results {
        let iterative = rates.get("iterative").copied();
        let fused = rates.get("fused").copied();
        let ratio = match (iterative, fused) {
            (Some(i), Some(f)) if i > 0.0 => format!("**{:.2}x**", f / i),
            _ => "-".to_owned(),
        };
        writeln!(
            file,
            "| {side} | {} | {} | {ratio} |",
            format_rate(iterative),
            format_rate(fused)
        )?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn edges_per_second(dir: &Path) -> Result<Option<f64>> {
    let read = |name: &str| -> Result<Option<serde_json::Value>> {
        let path = dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(serde_json::from_str(&content)?))
    };

    let (Some(benchmark), Some(estimates)) = (read("benchmark.json")?, read("estimates.json")?) else {
        return Ok(None);
    };
    let edges = benchmark
        .get("throughput")
        .and_then(|t| t.get("Elements"))
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(1.0);
    let mean_ns = estimates
        .get("mean")
        .and_then(|m| m.get("point_estimate"))
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0);
    Ok((mean_ns > 0.0).then(|| edges * 1e9 / mean_ns))
}

fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r > 1_000_000.0 => format!("{:.2}M", r / 1_000_000.0),
        Some(r) if r > 1_000.0 => format!("{:.2}K", r / 1_000.0),
        Some(r) => format!("{r:.0}"),
        None => "N/A".to_owned(),
    }
}
