use anyhow::{Context, bail};
use log::{info, warn};
use phq_dif::algorithm::projection::ProjectedCurve;
use phq_dif::{
    AnalysisConfig, Item, Pipeline, SimulationSpec, grid_to_batch, read_responses_parquet, report,
    simulate_responses, write_batch_parquet,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

const USAGE: &str = "usage: phq-dif <input.parquet> [output_dir]\n       phq-dif --simulate [n_per_group] [dif_item] [output_dir]";

/// Where the responses come from
enum Source {
    File(PathBuf),
    Simulated(SimulationSpec),
}

fn parse_args(args: &[String]) -> anyhow::Result<(Source, PathBuf)> {
    match args.first().map(String::as_str) {
        None | Some("-h" | "--help") => bail!("{USAGE}"),
        Some("--simulate") => {
            let mut spec = SimulationSpec::default();
            if let Some(n) = args.get(1) {
                spec.n_per_group = n
                    .parse()
                    .with_context(|| format!("invalid n_per_group '{n}'"))?;
            }
            if let Some(code) = args.get(2).filter(|c| c.as_str() != "none") {
                spec.dif_item = Some(Item::try_from(code.as_str()).map_err(anyhow::Error::msg)?);
            }
            let out = args.get(3).map_or_else(|| PathBuf::from("output"), PathBuf::from);
            Ok((Source::Simulated(spec), out))
        }
        Some(input) => {
            let out = args.get(1).map_or_else(|| PathBuf::from("output"), PathBuf::from);
            Ok((Source::File(PathBuf::from(input)), out))
        }
    }
}

fn write_grids(output_dir: &Path, report: &phq_dif::AnalysisReport) -> anyhow::Result<()> {
    for impact in &report.impacts {
        let curves: [&ProjectedCurve; 2] = [&impact.response_curve, &impact.elevated_curve];
        let batch = grid_to_batch(&curves)?;
        write_batch_parquet(
            &output_dir.join(format!("grid_{}.parquet", impact.item.code())),
            &batch,
        )?;
    }
    let batch = grid_to_batch(&[&report.sum_score.curve])?;
    write_batch_parquet(&output_dir.join("grid_sum_score.parquet"), &batch)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (source, output_dir) = parse_args(&args)?;

    let start = Instant::now();
    let data = match source {
        Source::File(path) => read_responses_parquet(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        Source::Simulated(spec) => {
            info!(
                "Simulating {} respondents per group (DIF item: {})",
                spec.n_per_group,
                spec.dif_item.map_or("none", Item::code)
            );
            simulate_responses(&spec)?
        }
    };

    let mut config = AnalysisConfig::new();
    config.batch.show_progress = true;
    info!("{config}");

    let report = Pipeline::run(&data, &config)?;
    println!("{}", report::render(&report));

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    report::write_json(&output_dir.join("report.json"), &report)?;
    write_grids(&output_dir, &report)?;

    if !report.failures.is_empty() {
        warn!("{} item stage(s) failed; see report.json", report.failures.len());
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
