use anyhow::{bail, Context, Result};
use clap::Parser;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use snrfetch::{
    archive::{eso_tap::EsoTapArchive, simbad::SimbadCatalog, transfer::EsoTransfer},
    campaign::Campaign,
    config::{CliArgs, Command, RunArgs, SampleArgs, SearchArgs},
    constants::StarId,
    env_state::FetchEnv,
    sample_list::load_sample_list,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn sample_stars(args: &SampleArgs) -> Result<Vec<StarId>> {
    match &args.sample {
        Some(path) => load_sample_list(path, &args.selection())
            .with_context(|| format!("loading the sample list {path}")),
        None => Ok(Vec::new()),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args
        .campaign_config()
        .context("invalid campaign configuration")?;

    let stars: Vec<StarId> = sample_stars(&args.sample)?
        .into_iter()
        .chain(args.stars.iter().cloned())
        .unique()
        .collect();
    if stars.is_empty() {
        bail!("no star to process: give a sample list or --star");
    }

    let env = FetchEnv::new(config.timeout, config.retry, config.token.clone())
        .context("building the HTTP client")?;
    let catalog = SimbadCatalog::new(env.clone())?;
    let archive = EsoTapArchive::new(env.clone());
    let transfer = EsoTransfer::new(env).with_ancillary(config.with_ancillary);

    let report = Campaign::new(&catalog, &archive, &transfer, &config)
        .run(&stars)
        .await;

    print!("{report}");
    println!("FINISHED");
    Ok(())
}

async fn search(args: SearchArgs) -> Result<()> {
    let since = args.since().context("invalid --since date")?;
    let config = args.campaign_config();

    let env = FetchEnv::new(config.timeout, config.retry, config.token.clone())
        .context("building the HTTP client")?;
    let catalog = SimbadCatalog::new(env.clone())?;
    let archive = EsoTapArchive::new(env.clone());
    let transfer = EsoTransfer::new(env);
    let campaign = Campaign::new(&catalog, &archive, &transfer, &config);

    for star in args.stars.iter().unique() {
        match campaign.search(star, since, args.snr_min).await {
            Ok((records, _)) => {
                println!("{star}: {} spectra", records.len());
                for rec in records {
                    println!(
                        "  {}   {}   {:?}",
                        rec.arcfile,
                        rec.date_obs.as_deref().unwrap_or("nan"),
                        rec.snr.unwrap_or(f64::NAN)
                    );
                }
            }
            Err(err) => println!("{star}: {err}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    match CliArgs::parse().command {
        Command::Run(args) => run(args).await,
        Command::Search(args) => search(args).await,
        Command::List(args) => {
            if args.sample.is_none() {
                bail!("the list subcommand needs a sample list");
            }
            for star in sample_stars(&args)? {
                println!("{star}");
            }
            Ok(())
        }
    }
}
