//! Run the standard SDLC workflow against a simulated broker

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use sdlc_core::{system_clock, BusinessContext, EngineConfig};
use sdlc_orchestrator::{standard_sdlc_workflow, SimulatedBroker, WorkflowOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("pipeline-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run an SDLC workflow against a simulated, unreliable knowledge broker")
        .arg(
            Arg::new("project")
                .long("project")
                .default_value("demo")
                .help("Project id used for cache keys and topic planning"),
        )
        .arg(
            Arg::new("domain")
                .long("domain")
                .default_value("ecommerce")
                .help("Business domain"),
        )
        .arg(
            Arg::new("tech")
                .long("tech")
                .action(ArgAction::Append)
                .help("Technology in the stack (repeatable)"),
        )
        .arg(
            Arg::new("failure-rate")
                .long("failure-rate")
                .default_value("0.2")
                .value_parser(value_parser!(f64))
                .help("Fraction of broker calls that fail"),
        )
        .arg(
            Arg::new("latency-ms")
                .long("latency-ms")
                .default_value("0")
                .value_parser(value_parser!(u64))
                .help("Upper bound on simulated broker latency"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value("42")
                .value_parser(value_parser!(u64))
                .help("Random seed for reproducibility"),
        )
        .arg(
            Arg::new("runs")
                .long("runs")
                .default_value("1")
                .value_parser(value_parser!(u32))
                .help("Execute the workflow this many times (later runs hit the cache)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the final result as JSON"),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let failure_rate = matches.get_one::<f64>("failure-rate").copied().unwrap_or(0.2);
    let latency_ms = matches.get_one::<u64>("latency-ms").copied().unwrap_or(0);
    let seed = matches.get_one::<u64>("seed").copied().unwrap_or(42);
    let runs = matches.get_one::<u32>("runs").copied().unwrap_or(1).max(1);
    let json = matches.get_flag("json");

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let project = matches.get_one::<String>("project").cloned().unwrap_or_default();
    let domain = matches.get_one::<String>("domain").cloned().unwrap_or_default();
    let tech: Vec<String> = matches
        .get_many::<String>("tech")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let context = BusinessContext::new(project, domain).with_tech_stack(tech);

    let broker = Arc::new(
        SimulatedBroker::new(seed, failure_rate).with_latency(Duration::from_millis(latency_ms)),
    );
    let orchestrator = WorkflowOrchestrator::new(config, broker.clone(), system_clock());

    let mut last = None;
    for run in 1..=runs {
        let workflow = standard_sdlc_workflow(context.clone());
        let result = orchestrator.execute_workflow(workflow, context.clone()).await;
        if !json {
            println!("Run {run}/{runs}: {}", if result.success { "SUCCESS" } else { "FAILED" });
            for phase in &result.phase_results {
                println!(
                    "  {:<16} {:<18} quality {:>5.1}  {}ms{}",
                    phase.phase_name,
                    phase.role,
                    phase.quality_metrics.overall,
                    phase.duration_ms,
                    if phase.used_fallback() { "  (fallback)" } else { "" },
                );
                for issue in &phase.issues {
                    println!("    - {issue}");
                }
            }
            for error in &result.errors {
                println!("  error: {error}");
            }
        }
        last = Some(result);
    }
    let result = last.context("no workflow was executed")?;

    let cache = orchestrator.cache_stats();
    let retry = orchestrator.retry_stats();
    let quality = orchestrator.quality_metrics(&result.workflow_id);

    if json {
        let report = serde_json::json!({
            "result": result,
            "cache": cache,
            "cache_healthy": orchestrator.is_cache_healthy(),
            "retry": retry,
            "quality": quality,
            "broker": { "calls": broker.calls(), "failures": broker.failures() },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("Business value:");
        println!("  Quality score:       {:.1}", result.business_value.quality_score);
        println!("  Delivery confidence: {:.1}", result.business_value.delivery_confidence);
        println!("  Risk reduction:      {:.1}", result.business_value.risk_reduction);
        println!("  Automation coverage: {:.1}", result.business_value.automation_coverage);
        println!();
        println!("Cache:");
        println!("  Entries:  {}", cache.total_entries());
        println!("  Hit rate: {:.1}%", cache.overall_hit_rate() * 100.0);
        println!("  Healthy:  {}", orchestrator.is_cache_healthy());
        println!();
        println!("Retry:");
        println!("  Calls:      {} ({} ok, {} failed)", retry.total_calls, retry.successful_calls, retry.failed_calls);
        println!("  Retries:    {}", retry.total_retries);
        println!("  Rejections: {}", retry.circuit_rejections);
        println!("  Open:       {}", retry.open_circuits);
        println!();
        println!("Broker: {} calls, {} failures", broker.calls(), broker.failures());
        if let Some(report) = quality {
            println!();
            println!("Quality:");
            if let Some(score) = report.current_score {
                println!("  Score: {score:.1} ({:?})", report.trend);
            }
            for (category, score) in &report.category_scores {
                println!("  {category:<22} {score:>5.1}");
            }
            for recommendation in &report.recommendations {
                println!("  * {recommendation}");
            }
        }
    }

    std::process::exit(if result.success { 0 } else { 1 });
}
