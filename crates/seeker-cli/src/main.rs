//! `threat-seeker` command line

mod input;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use seeker_connectors::ConnectorRegistry;
use seeker_core::{CritiqueMerger, Plan, QueryApproval, SeekerConfig};
use seeker_engine::ExecutionEngine;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("threat-seeker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Execute analyst-approved threat hunt plans")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("execute")
                .about("Run the approved queries of a plan")
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Plan JSON file"),
                )
                .arg(
                    Arg::new("approve")
                        .long("approve")
                        .value_delimiter(',')
                        .action(ArgAction::Append)
                        .help("Query IDs to run (default: all)"),
                )
                .arg(
                    Arg::new("modify")
                        .long("modify")
                        .action(ArgAction::Append)
                        .value_name("QUERY_ID=QUERY")
                        .help("Replace a query string before execution"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the execution result as JSON"),
                ),
        )
        .subcommand(
            Command::new("merge-critique")
                .about("Merge a reviewer critique into a plan")
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Plan JSON file"),
                )
                .arg(
                    Arg::new("critique")
                        .long("critique")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Critique JSON file"),
                ),
        )
        .subcommand(Command::new("backends").about("List registered backend kinds"))
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

fn load_config(matches: &ArgMatches) -> anyhow::Result<SeekerConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SeekerConfig::from_toml_file(path)?,
        None => SeekerConfig::default(),
    }
    .apply_env();
    config.validate()?;
    Ok(config)
}

async fn execute(args: &ArgMatches, config: &SeekerConfig) -> anyhow::Result<ExitCode> {
    let plan_path = args
        .get_one::<PathBuf>("plan")
        .context("--plan is required")?;
    let plan = input::read_plan(plan_path)?;

    let mut approval = match args.get_many::<String>("approve") {
        Some(ids) => QueryApproval::new(plan.plan_id, ids.cloned()),
        None => QueryApproval::all(&plan),
    };
    for raw in args.get_many::<String>("modify").into_iter().flatten() {
        let (id, query) = input::parse_modification(raw)?;
        approval = approval.with_modification(id, query);
    }

    for id in unknown_ids(&plan, &approval) {
        tracing::warn!(query_id = %id, "Ignoring query id not in plan");
    }

    let engine = ExecutionEngine::new(ConnectorRegistry::from_config(config), config)?;
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = engine
        .execute_plan_until(&plan, &approval.query_ids, &approval.modifications, interrupted)
        .await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.digest());
    }

    for failed in result.failures() {
        tracing::warn!(
            query_id = %failed.query_id,
            error = failed.error_message.as_deref().unwrap_or_default(),
            "Query failed"
        );
    }

    Ok(if result.summary.all_succeeded() && !result.cancelled {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Approved or modified IDs that name no query in the plan
fn unknown_ids<'a>(plan: &Plan, approval: &'a QueryApproval) -> BTreeSet<&'a str> {
    approval
        .query_ids
        .iter()
        .chain(approval.modifications.keys())
        .map(String::as_str)
        .filter(|id| plan.query(id).is_none())
        .collect()
}

fn merge_critique(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let plan = input::read_plan(args.get_one::<PathBuf>("plan").context("--plan is required")?)?;
    let critique_path = args
        .get_one::<PathBuf>("critique")
        .context("--critique is required")?;
    let payload = input::read(critique_path)?;
    let merged = CritiqueMerger::new()
        .merge_json(plan, &payload)
        .with_context(|| format!("merging {}", critique_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(ExitCode::SUCCESS)
}

async fn run(matches: ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(&matches)?;
    match matches.subcommand() {
        Some(("execute", args)) => execute(args, &config).await,
        Some(("merge-critique", args)) => merge_critique(args),
        Some(("backends", _)) => {
            for kind in ConnectorRegistry::from_config(&config).kinds() {
                println!("{kind}");
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::from(2)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(matches).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "threat-seeker failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn execute_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "threat-seeker",
                "--log-json",
                "execute",
                "--plan",
                "plan.json",
                "--approve",
                "q1,q2",
                "--approve",
                "q3",
                "--modify",
                "q1=index=edr",
                "--json",
            ])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "execute");
        let approved: Vec<&String> = args.get_many::<String>("approve").unwrap().collect();
        assert_eq!(approved, ["q1", "q2", "q3"]);
        assert_eq!(args.get_many::<String>("modify").unwrap().count(), 1);
        assert!(args.get_flag("json"));
    }

    #[test]
    fn unknown_approval_ids_are_reported() {
        let plan = Plan::new(
            "WMI persistence",
            "a1",
            vec![seeker_core::Query::new("q1", "splunk", "index=wmi")],
        )
        .unwrap();
        let approval = QueryApproval::new(plan.plan_id, ["q1", "q7"])
            .with_modification("q9", "index=main");

        let unknown: Vec<&str> = unknown_ids(&plan, &approval).into_iter().collect();
        assert_eq!(unknown, ["q7", "q9"]);
    }

    #[test]
    fn execute_requires_plan() {
        assert!(cli().try_get_matches_from(["threat-seeker", "execute"]).is_err());
    }

    #[test]
    fn merge_critique_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "threat-seeker",
                "merge-critique",
                "--plan",
                "p.json",
                "--critique",
                "c.json",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(
            args.get_one::<PathBuf>("critique").unwrap(),
            &PathBuf::from("c.json")
        );
    }
}
