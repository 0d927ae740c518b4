use std::io::Write;

use anyhow::Result;
use clap::{ArgAction, Args, Parser};
use colored::*;
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use serde::Serialize;

use ff_energy::NucleotideVec;
use ff_partition::{demo::placeholder_params, FoldContext, ModelDetails, PfParamSet};

use fuzzyfold::input_parsers::{read_fasta_like_records_input, ruler};
use fuzzyfold::model_parsers::ModelArguments;

#[derive(Debug, Args)]
pub struct FoldInput {
    /// Input file (FASTA-like), or "-" for stdin. One or more records
    /// separated by blank lines; a structure line, if present, is
    /// ignored. More than one record is folded in parallel.
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,

    /// Draw this many stochastic Boltzmann samples instead of (in
    /// addition to) reporting the centroid.
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,

    /// Seed the sampler's RNG for reproducible draws. With multiple
    /// input records, each record's draws are seeded from `seed + index`
    /// so a batch run stays reproducible without every record sampling
    /// identically.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Emit machine-readable JSON instead of the colored plain-text report.
    #[arg(long)]
    pub json: bool,

    /// Verbosity (-v = info, -vv = debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Parser)]
#[command(name = "pf-fold")]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub fold: FoldInput,

    #[command(flatten, next_help_heading = "Model parameters")]
    pub model: ModelArguments,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn dot_bracket(pt: &ff_structure::PairTable, n: usize) -> String {
    let mut s = String::with_capacity(n);
    for i in 1..=n {
        s.push(match pt[i] {
            Some(j) if (j as usize) > i => '(',
            Some(_) => ')',
            None => '.',
        });
    }
    s
}

/// One record's fold result, independent of how it is eventually
/// rendered (colored plain text or JSON).
#[derive(Debug, Serialize)]
struct FoldOutcome {
    header: Option<String>,
    sequence: String,
    centroid: String,
    free_energy_kcal_mol: f64,
    z: f64,
    samples: Vec<String>,
}

/// Fold one record end to end. Pure computation, no formatting, so a
/// batch of records can be folded in parallel and rendered afterward
/// without interleaving output on stdout.
fn fold_one(
    header: Option<String>,
    sequence: &NucleotideVec,
    params: &PfParamSet,
    model: ModelDetails,
    sample: Option<usize>,
    seed: Option<u64>,
) -> Result<FoldOutcome> {
    let seq_string = sequence.to_string();
    let ctx = FoldContext::new(&seq_string, params, model)?;
    let tables = ctx.partition_function()?;

    let n = sequence.len();
    info!("{}", ruler(n).magenta());

    let centroid = ff_partition::reductions::centroid(&tables);
    let free_energy = ff_partition::reductions::ensemble_free_energy(&tables, &ctx.model);

    let samples = match sample {
        Some(count) => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            ctx.sample(&tables, count, &mut rng)?
                .into_iter()
                .map(|s| dot_bracket(&s, n))
                .collect()
        }
        None => Vec::new(),
    };

    Ok(FoldOutcome {
        header,
        sequence: seq_string,
        centroid: dot_bracket(&centroid, n),
        free_energy_kcal_mol: free_energy,
        z: tables.qo,
        samples,
    })
}

/// The colored plain-text report for one outcome, matching the format
/// this binary has always printed.
fn render_text(outcome: &FoldOutcome) -> String {
    let mut out = String::new();
    if let Some(h) = &outcome.header {
        out.push_str(&format!("{}\n", h.yellow()));
    }
    out.push_str(&format!("{}\n", outcome.sequence));
    out.push_str(&format!(
        "{} {}\n",
        outcome.centroid,
        format!("{:>6.2} kcal/mol", outcome.free_energy_kcal_mol).green()
    ));
    out.push_str(&format!("Z = {:.6e}\n", outcome.z));
    for s in &outcome.samples {
        out.push_str(&format!("{}\n", s));
    }
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.fold.verbose);

    // Parameter-file loading is out of scope for this binary (see
    // fuzzyfold::model_parsers); the demo placeholder set stands in for
    // a real Turner table.
    let params = placeholder_params();
    let model = cli.model.build_model();

    let records = read_fasta_like_records_input(&cli.fold.input)?;

    let pb = if records.len() > 1 {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    // Independent sequences carry no shared mutable state across their
    // DP fills, so a batch of records folds one `FoldContext` per
    // sequence on separate workers.
    let outcomes: Vec<Result<FoldOutcome>> = records
        .into_par_iter()
        .enumerate()
        .map_init(
            || pb.clone(),
            |pb, (idx, (header, sequence, _structure))| {
                let seed = cli.fold.seed.map(|s| s.wrapping_add(idx as u64));
                let outcome = fold_one(header, &sequence, &params, model.clone(), cli.fold.sample, seed);
                if let Some(pb) = pb {
                    pb.inc(1);
                }
                outcome
            },
        )
        .collect();

    if let Some(pb) = &pb {
        pb.finish_with_message("All folds complete!");
    }

    if cli.fold.json {
        let outcomes: Vec<FoldOutcome> = outcomes.into_iter().collect::<Result<_>>()?;
        let rendered = if outcomes.len() == 1 {
            serde_json::to_string_pretty(&outcomes[0])?
        } else {
            serde_json::to_string_pretty(&outcomes)?
        };
        println!("{}", rendered);
    } else {
        for outcome in outcomes {
            print!("{}", render_text(&outcome?));
        }
    }

    Ok(())
}
