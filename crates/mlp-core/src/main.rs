use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use mlp_core::simulate::{run_simulation, SimulationConfig};
use mlp_core::EngineConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("mlp-engine")
        .version(mlp_core::VERSION)
        .about("Microlearning process engine")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded program for a demo organization and print its overview")
                .arg(
                    Arg::new("weeks")
                        .long("weeks")
                        .value_parser(value_parser!(u32))
                        .help("Program length; defaults to the configured default"),
                )
                .arg(
                    Arg::new("teams")
                        .long("teams")
                        .default_value("2")
                        .value_parser(value_parser!(usize))
                        .help("Number of teams"),
                )
                .arg(
                    Arg::new("members")
                        .long("members")
                        .default_value("8")
                        .value_parser(value_parser!(usize))
                        .help("Members per team"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("response-rate")
                        .long("response-rate")
                        .default_value("0.8")
                        .value_parser(value_parser!(f64))
                        .help("Chance that a member answers in a given week"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Validate a config file and print the effective configuration")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .help("Config file; defaults are printed when omitted"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let sim = SimulationConfig {
                weeks: args
                    .get_one::<u32>("weeks")
                    .copied()
                    .unwrap_or(config.default_total_weeks),
                teams: *args.get_one::<usize>("teams").context("teams")?,
                members: *args.get_one::<usize>("members").context("members")?,
                seed: *args.get_one::<u64>("seed").context("seed")?,
                response_rate: *args.get_one::<f64>("response-rate").context("response-rate")?,
                ..SimulationConfig::default()
            };
            let report = run_simulation(config, sim).await.context("simulation failed")?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let o = &report.overview;
                println!("Simulation (seed {}, {} weeks)", report.seed, report.weeks);
                println!("  Responses:            {}", report.responses);
                println!("  Participants:         {}/{}", o.total_participants, o.total_members);
                println!("  Participation:        {}%", o.participation_percent);
                println!("  Engagement:           {}%", o.engagement_percent);
                println!("  Reflections/person:   {:.1}", o.avg_reflections_per_participant);
                println!("  Audit events:         {} (verified: {})", report.audit_events, report.audit_verified);
                println!("  Top themes:");
                for theme in &o.top_themes {
                    println!(
                        "    {:<28} {:>4} responses  {:>3}% engagement",
                        theme.theme.as_str(),
                        theme.response_count,
                        theme.engagement_percent
                    );
                }
                println!("  Teams:");
                for team in &o.teams {
                    println!(
                        "    {:<28} {:>3}% participation  {} reflections",
                        team.name, team.participation_percent, team.reflections
                    );
                }
            }
            if !report.audit_verified {
                anyhow::bail!("audit chain failed verification");
            }
        }
        Some(("config", args)) => {
            let effective = match args.get_one::<String>("path") {
                Some(path) => EngineConfig::load(path).with_context(|| format!("loading {path}"))?,
                None => config,
            };
            print!("{}", effective.to_toml_string()?);
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
