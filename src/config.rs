//! # Campaign configuration
//!
//! [`CampaignConfig`] gathers every tunable of a campaign; its [`Default`] reproduces the
//! HARPS survey setup (SNR goal 1000, "good enough" 400, SNR window [40, 500], 30″
//! radius, R = 115000, upgrade on 2015-06-03).
//!
//! The `snrfetch` binary builds it from the command line with [`CliArgs`]; options also
//! read `SNRFETCH_*` environment variables, and the ESO token comes from `ESO_TOKEN`.
//!
//! Subcommands: `run` (download campaign), `search` (list the spectra of stars since a
//! date, nothing downloaded) and `list` (star identifiers of a sample list).
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use hifitime::Epoch;

use crate::{
    constants::{
        Snr, StarId, DEFAULT_INSTRUMENT, EPOCH_SNR_MIN, GOOD_ENOUGH_SNR, HARPS_RESOLUTION,
        SEARCH_RADIUS, SNR_MAX, TARGET_CUMULATIVE_SNR,
    },
    observations::filter::FilterParams,
    retry::RetryPolicy,
    sample_list::SampleSelection,
    snrfetch_errors::SnrFetchError,
    time::parse_obs_date,
};

/// Default request timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignConfig {
    /// Destination root: spectra land in `root/<star>/<Before|After>/`
    pub root: Utf8PathBuf,
    pub instruments: Vec<String>,
    /// Cumulative SNR goal of one epoch
    pub target_snr: Snr,
    /// Cumulative SNR above which one epoch alone is downloaded
    pub good_enough_snr: Snr,
    /// Criteria of the per-epoch searches
    pub filter: FilterParams,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Number of stars processed at once, at least 1
    pub max_concurrent_stars: usize,
    /// ESO bearer token, for proprietary data
    pub token: Option<String>,
    /// Fetch the ancillary bundle along with each spectrum
    pub with_ancillary: bool,
    /// Plan only: resolve, query and select, but download nothing
    pub dry_run: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        CampaignConfig {
            root: Utf8PathBuf::from("spectra"),
            instruments: vec![DEFAULT_INSTRUMENT.to_string()],
            target_snr: TARGET_CUMULATIVE_SNR,
            good_enough_snr: GOOD_ENOUGH_SNR,
            filter: FilterParams::epoch_search(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            max_concurrent_stars: 1,
            token: None,
            with_ancillary: true,
            dry_run: false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "snrfetch",
    version,
    about = "Download archive spectra of a star list until a cumulative SNR goal is reached",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a download campaign
    Run(RunArgs),
    /// List the archive spectra of stars since a date, without downloading them
    Search(SearchArgs),
    /// Print the star identifiers read from a sample list
    List(SampleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// CSV sample list, first column holding Hipparcos numbers
    pub sample: Option<Utf8PathBuf>,

    /// Number of stars skipped at the start of the sample list
    #[arg(long, env = "SNRFETCH_START", default_value_t = 0)]
    pub start: usize,

    /// Stars never processed (comma separated)
    #[arg(long, value_delimiter = ',', env = "SNRFETCH_EXCLUDE")]
    pub exclude: Vec<StarId>,
}

impl SampleArgs {
    pub fn selection(&self) -> SampleSelection {
        SampleSelection {
            start: self.start,
            exclude: self.exclude.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// Star identifiers processed in addition to the sample list (repeatable)
    #[arg(long = "star")]
    pub stars: Vec<StarId>,

    /// Destination root directory
    #[arg(short, long, env = "SNRFETCH_ROOT", default_value = "spectra")]
    pub root: Utf8PathBuf,

    /// Instruments searched (comma separated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_INSTRUMENT)]
    pub instruments: Vec<String>,

    /// Cumulative SNR goal of one epoch
    #[arg(long, default_value_t = TARGET_CUMULATIVE_SNR)]
    pub target_snr: Snr,

    /// Cumulative SNR above which one epoch alone is downloaded
    #[arg(long, default_value_t = GOOD_ENOUGH_SNR)]
    pub good_enough_snr: Snr,

    /// Lower SNR bound of a single spectrum
    #[arg(long, default_value_t = EPOCH_SNR_MIN)]
    pub snr_min: Snr,

    /// Upper SNR bound of a single spectrum
    #[arg(long, default_value_t = SNR_MAX)]
    pub snr_max: Snr,

    /// Search radius around the catalog position, in arcseconds
    #[arg(long, default_value_t = SEARCH_RADIUS)]
    pub radius: f64,

    /// Required resolving power
    #[arg(long, default_value_t = HARPS_RESOLUTION)]
    pub resolution: f64,

    /// Instrument upgrade date splitting the two epochs (YYYY-MM-DD)
    #[arg(long, default_value = "2015-06-03")]
    pub upgrade_date: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Attempts per request, the first one included
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Number of stars processed at once
    #[arg(long, env = "SNRFETCH_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// ESO bearer token
    #[arg(long, env = "ESO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip the ancillary bundles
    #[arg(long)]
    pub no_ancillary: bool,

    /// Select the spectra without downloading them
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Build the campaign configuration from the command line.
    ///
    /// Return
    /// ----------
    /// * [`SnrFetchError::InvalidDate`] if the upgrade date cannot be parsed.
    pub fn campaign_config(&self) -> Result<CampaignConfig, SnrFetchError> {
        let defaults = RetryPolicy::default();
        Ok(CampaignConfig {
            root: self.root.clone(),
            instruments: self.instruments.clone(),
            target_snr: self.target_snr,
            good_enough_snr: self.good_enough_snr,
            filter: FilterParams {
                date_boundary: parse_obs_date(&self.upgrade_date)?,
                snr_min: self.snr_min,
                snr_max: self.snr_max,
                radius: self.radius,
                resolution: self.resolution,
            },
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy::new(self.attempts, defaults.base_delay, defaults.max_delay),
            max_concurrent_stars: self.concurrency.max(1),
            token: self.token.clone(),
            with_ancillary: !self.no_ancillary,
            dry_run: self.dry_run,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Star identifiers
    #[arg(required = true)]
    pub stars: Vec<StarId>,

    /// Earliest observation date (YYYY-MM-DD), 1990-01-23 when absent
    #[arg(long)]
    pub since: Option<String>,

    /// Lowest accepted SNR, 1 when absent
    #[arg(long)]
    pub snr_min: Option<Snr>,

    /// Instruments searched (comma separated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_INSTRUMENT)]
    pub instruments: Vec<String>,

    /// Search radius around the catalog position, in arcseconds
    #[arg(long, default_value_t = SEARCH_RADIUS)]
    pub radius: f64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// ESO bearer token
    #[arg(long, env = "ESO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl SearchArgs {
    /// Earliest observation date asked for, `None` for the default one.
    ///
    /// Return
    /// ----------
    /// * [`SnrFetchError::InvalidDate`] if `--since` cannot be parsed.
    pub fn since(&self) -> Result<Option<Epoch>, SnrFetchError> {
        self.since.as_deref().map(parse_obs_date).transpose()
    }

    /// Campaign configuration of a search: defaults plus the archive options.
    pub fn campaign_config(&self) -> CampaignConfig {
        let defaults = CampaignConfig::default();
        CampaignConfig {
            instruments: self.instruments.clone(),
            filter: FilterParams {
                radius: self.radius,
                ..defaults.filter
            },
            timeout: Duration::from_secs(self.timeout_secs),
            token: self.token.clone(),
            dry_run: true,
            ..defaults
        }
    }
}

#[cfg(test)]
mod config_test {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = CliArgs::try_parse_from(std::iter::once("snrfetch").chain(args.iter().copied()))
            .unwrap();
        match cli.command {
            Command::Run(run) => run,
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let args = run_args(&["run", "--star", "HIP1499"]);
        let mut config = args.campaign_config().unwrap();
        config.token = None;
        assert_eq!(config, CampaignConfig::default());
        assert_eq!(args.stars, vec!["HIP1499"]);
    }

    #[test]
    fn test_cli_overrides() {
        let args = run_args(&[
            "run",
            "sample.csv",
            "--start",
            "79",
            "--exclude",
            "HIP3311,HIP96160",
            "--instruments",
            "FEROS,HARPS",
            "--target-snr",
            "800",
            "--upgrade-date",
            "2014-01-01",
            "--concurrency",
            "0",
            "--attempts",
            "5",
            "--dry-run",
        ]);
        assert_eq!(args.sample.sample, Some(Utf8PathBuf::from("sample.csv")));
        assert_eq!(
            args.sample.selection(),
            SampleSelection {
                start: 79,
                exclude: vec!["HIP3311".into(), "HIP96160".into()]
            }
        );

        let config = args.campaign_config().unwrap();
        assert_eq!(config.instruments, vec!["FEROS", "HARPS"]);
        assert_eq!(config.target_snr, 800.0);
        assert_eq!(config.max_concurrent_stars, 1);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.dry_run);
        assert_eq!(
            config.filter.date_boundary,
            hifitime::Epoch::from_gregorian_utc_at_midnight(2014, 1, 1)
        );
    }

    #[test]
    fn test_invalid_upgrade_date() {
        let args = run_args(&["run", "--upgrade-date", "june"]);
        assert!(matches!(
            args.campaign_config(),
            Err(SnrFetchError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_search_subcommand() {
        let cli = CliArgs::try_parse_from([
            "snrfetch",
            "search",
            "HIP1499",
            "HIP3311",
            "--since",
            "2012-04-01",
            "--snr-min",
            "80",
            "--radius",
            "10",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected the search subcommand");
        };
        assert_eq!(args.stars, vec!["HIP1499", "HIP3311"]);
        assert_eq!(args.snr_min, Some(80.0));
        assert_eq!(
            args.since().unwrap(),
            Some(hifitime::Epoch::from_gregorian_utc_at_midnight(2012, 4, 1))
        );

        let config = args.campaign_config();
        assert_eq!(config.filter.radius, 10.0);
        assert_eq!(config.instruments, vec![DEFAULT_INSTRUMENT]);
        assert!(config.dry_run);
    }

    #[test]
    fn test_search_defaults_and_invalid_date() {
        let cli = CliArgs::try_parse_from(["snrfetch", "search", "HIP1", "--since", "soon"])
            .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected the search subcommand");
        };
        assert_eq!(args.snr_min, None);
        assert!(matches!(args.since(), Err(SnrFetchError::InvalidDate(_))));

        assert!(CliArgs::try_parse_from(["snrfetch", "search"]).is_err());
    }
}
