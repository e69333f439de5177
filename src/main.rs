#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use flate2::read::GzDecoder;
use humantime::format_duration;
use linkrank::{Diagnostics, Graph, WeightConfig, WeightPolicy};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

/// Read ahead on the input stream; the lexer itself buffers one line.
const INPUT_READ_AHEAD: usize = 2 * 1024;

/// Calculate per-document weights from a stream of link declarations.
///
/// Each declaration describes the links of a document (left side) to other
/// documents (right side) with the syntax `* SOURCE = [-> TARGET] { TARGET } ;`,
/// where `->` marks a redirect. The weights of the declared documents are
/// written to stdout as tab-separated name/weight lines.
#[derive(Parser)]
struct Arguments {
    /// Input file to process, or '-' for stdin. Files ending in .gz are
    /// decompressed on the fly.
    input: String,
    /// Weighting policy to apply to the reduced graph.
    #[clap(long, value_enum, default_value_t = Policy::Pagerank)]
    policy: Policy,
    /// Number of damped power iterations (pagerank policy only).
    #[clap(long, default_value_t = 32)]
    iterations: u32,
    /// Damping factor in (0,1) (pagerank policy only).
    #[clap(long, default_value_t = 0.85)]
    damping: f64,
    /// File to write redirect definitions to, before reduction.
    #[clap(long)]
    redirects: Option<PathBuf>,
    /// Rescale each weight to log10(weight * pages + 1).
    #[clap(long)]
    logscale: bool,
    /// Normalize weights to integers between 0 and this value.
    #[clap(long)]
    norm: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    Pagerank,
    Indegree,
}

impl From<Policy> for WeightPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Pagerank => WeightPolicy::PageRank,
            Policy::Indegree => WeightPolicy::InDegree,
        }
    }
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::builder().format_target(false).init();

    let args = Arguments::parse();
    if let Err(e) = run(&args) {
        log::error!("{e:#}");
        std::process::exit(-1);
    }
}

fn run(args: &Arguments) -> Result<()> {
    if args.iterations == 0 {
        return Err(anyhow!("iterations needs a positive integer"));
    }
    if !(args.damping > 0.0 && args.damping < 1.0) {
        return Err(anyhow!("damping must lie in (0,1)"));
    }
    let config = WeightConfig {
        iterations: args.iterations,
        damping: args.damping,
        policy: args.policy.into(),
    };

    let start = Instant::now();
    let mut graph = Graph::new();
    let mut diagnostics = Diagnostics::new();

    log::info!("ingesting declarations from '{}'...", args.input);
    graph.ingest(open_input(&args.input)?, &mut diagnostics)?;
    if diagnostics.warning_count() > 0 {
        log::warn!(
            "{} malformed declarations skipped",
            diagnostics.warning_count()
        );
    }
    log::info!(
        "{} pages interned, {} declared, {} links, {} redirects",
        graph.page_count(),
        graph.declared_count(),
        graph.link_count(),
        graph.redirect_count()
    );

    if let Some(path) = &args.redirects {
        log::info!("writing redirects to '{}'...", path.display());
        let mut sink = BufWriter::new(File::create(path)?);
        graph.dump_redirects(&mut sink)?;
        sink.flush()?;
    }

    log::info!("reducing graph to declared pages...");
    let reduced = graph.reduce(config.policy)?;
    log::info!(
        "{} pages and {} links after reduction",
        reduced.page_count(),
        reduced.link_count()
    );

    log::info!("calculating weights...");
    let weights = config.compute(&reduced)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_weights(&mut out, &reduced, &weights, args.logscale, args.norm)?;
    out.flush()?;

    log::info!("done in {}", format_duration(start.elapsed()));
    Ok(())
}

fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        return Ok(Box::new(BufReader::with_capacity(
            INPUT_READ_AHEAD,
            io::stdin(),
        )));
    }
    let file = File::open(input)?;
    if input.ends_with(".gz") {
        Ok(Box::new(BufReader::with_capacity(
            INPUT_READ_AHEAD,
            GzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(INPUT_READ_AHEAD, file)))
    }
}

/// Write one `name<TAB>weight` line per page in id order. With `--norm` the
/// weights are scaled against their maximum to integers in 0..=norm.
fn write_weights(
    out: &mut impl Write,
    graph: &Graph,
    weights: &[f64],
    logscale: bool,
    norm: Option<u32>,
) -> Result<()> {
    let pages = weights.len() as f64;
    let scaled: Vec<f64> = weights
        .iter()
        .map(|&weight| {
            if logscale {
                (weight * pages + 1.0).log10()
            } else {
                weight
            }
        })
        .collect();
    let max = scaled.iter().copied().fold(0.0_f64, f64::max);

    for (idx, &value) in scaled.iter().enumerate() {
        out.write_all(graph.name_of(idx as u32 + 1)?)?;
        match norm {
            Some(norm) if max > 0.0 => {
                let normalized = (value.max(0.0) / max) * f64::from(norm);
                writeln!(out, "\t{}", normalized as u64)?;
            }
            Some(_) => writeln!(out, "\t0")?,
            None => writeln!(out, "\t{value}")?,
        }
    }
    Ok(())
}
