use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

use smartclima::history;
use smartclima::models::{ComfortProfile, TemperaturePreference, TimeWindow};
use smartclima::{
    ClimateReport, LocationParser, LocationQuery, SmartClima, SmartClimaConfig, SmartClimaError,
    cache, logging,
};

#[derive(Parser, Debug)]
#[command(name = "smartclima", version)]
#[command(about = "Clothing and climate-control advice for the weather where you are")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a location and print the comfort advisory
    Check(CheckArgs),
    /// List the most recently checked locations
    History,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// CEP ("01310-100"), coordinates ("-23.55,-46.63") or a city name
    #[arg(allow_hyphen_values = true)]
    location: String,

    /// Treat the input as a city name even if it looks like something else
    #[arg(long, default_value_t = false)]
    city: bool,

    /// cooler, neutral or warmer
    #[arg(long, default_value = "neutral", value_parser = parse_preference)]
    preference: TemperaturePreference,

    /// Arrive/leave home, e.g. 18:00-08:00
    #[arg(long, value_parser = TimeWindow::parse)]
    home: Option<TimeWindow>,

    /// Morning and evening car departures, e.g. 07:30,17:30
    #[arg(long, value_parser = TimeWindow::parse)]
    car: Option<TimeWindow>,

    /// Include infant-care guidance
    #[arg(long, default_value_t = false)]
    infant: bool,

    /// Print the full report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_preference(input: &str) -> Result<TemperaturePreference, String> {
    input.parse()
}

impl CheckArgs {
    fn query(&self) -> LocationQuery {
        if self.city {
            LocationQuery::CityName(self.location.trim().to_string())
        } else {
            LocationParser::parse(&self.location)
        }
    }

    fn profile(&self) -> ComfortProfile {
        let defaults = ComfortProfile::default();
        ComfortProfile {
            preference: self.preference,
            home_schedule: self.home.unwrap_or(defaults.home_schedule),
            car_schedule: self.car.unwrap_or(defaults.car_schedule),
            infant_care: self.infant,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SmartClimaError>() {
                Some(app_error) => eprintln!("Error: {}", app_error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = SmartClimaConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;
    for warning in &config.warnings {
        warn!("{}", warning);
    }

    if config.cache.enabled {
        match config.cache_path() {
            Some(path) => {
                if let Err(e) = cache::init(&path) {
                    warn!("Cache unavailable at {}: {}", path.display(), e);
                }
            }
            None => warn!("No cache directory available; running without cache"),
        }
    } else {
        debug!("Cache disabled by configuration");
    }

    match cli.command {
        Command::Check(args) => check(&config, &args).await,
        Command::History => show_history().await,
    }
}

async fn check(config: &SmartClimaConfig, args: &CheckArgs) -> Result<()> {
    let smartclima = SmartClima::from_config(config).context("Failed to build HTTP client")?;
    let report = smartclima
        .check(&args.query(), &args.profile())
        .await
        .map_err(SmartClimaError::from)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

async fn show_history() -> Result<()> {
    let recent = history::list().await?;
    if recent.is_empty() {
        println!("No locations checked yet.");
        return Ok(());
    }
    for entry in recent {
        println!(
            "{}  {}  ({})",
            entry.checked_at.format("%Y-%m-%d %H:%M"),
            entry.label,
            entry.coordinates
        );
    }
    Ok(())
}

fn render(report: &ClimateReport) -> String {
    let mut out = String::new();
    let obs = &report.observation;

    out.push_str(&format!(
        "{} ({})\n",
        report.location.label(),
        report.location.method.describe()
    ));
    if let Some(address) = &report.location.address {
        if let Some(street) = &address.street {
            out.push_str(&format!("  {street}\n"));
        }
        if let Some(provider) = report.location.context.provider() {
            out.push_str(&format!("  postal data from {provider}\n"));
        }
    }
    out.push('\n');

    out.push_str(&format!(
        "Now: {}, feels like {}, {}, humidity {:.0}%, wind {} [{}]\n",
        obs.format_temperature(),
        obs.format_apparent_temperature(),
        obs.description,
        obs.humidity,
        obs.format_wind(),
        obs.source
    ));

    if !report.forecast.is_empty() {
        out.push_str("\nNext hours:\n");
        for hour in &report.forecast {
            out.push_str(&format!(
                "  {}  {:>5.1}°C  {:<24} rain {:>3}%\n",
                hour.hour_label, hour.temperature, hour.description, hour.chance_of_rain
            ));
        }
    }

    out.push_str(&format!("\nAdvisory [{}]:\n", report.advisory.source));
    out.push_str(report.advisory.text.trim_end());
    out.push('\n');

    let notes = report.provenance_notes();
    if !notes.is_empty() {
        out.push('\n');
        for note in notes {
            out.push_str(&format!("* {note}\n"));
        }
    }
    out
}
