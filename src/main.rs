use std::env;
use std::process;

use camino::Utf8Path;
use console::style;
use tracing_subscriber::EnvFilter;

use kiln::config::BuildConfig;
use kiln::error::KilnError;
use kiln::graph::{RunReport, TaskContext, TaskGraph};
use kiln::paths::PathConfig;
use kiln::{manifest, serve, tasks, watch};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{}", style(err).red());
        process::exit(1);
    }
}

fn run() -> Result<(), KilnError> {
    let config = BuildConfig::resolve(env::args_os());
    let manifest = manifest::resolve(Utf8Path::new("."))?;
    let config = config.with_manifest(manifest);
    let paths = PathConfig::derive(&config);
    let graph = tasks::registry().finish()?;

    if config.list_tasks {
        for name in graph.names() {
            println!("{name}");
        }
        return Ok(());
    }

    banner(&config);

    for target in config.targets.clone() {
        dispatch(&target, &graph, &config, &paths)?;
    }

    Ok(())
}

fn dispatch(
    target: &str,
    graph: &TaskGraph,
    config: &BuildConfig,
    paths: &PathConfig,
) -> Result<(), KilnError> {
    match target {
        // The build portion runs through the graph; the server and watcher
        // block here until interrupted.
        "serve" | "release-serve" => {
            let (_port, reload) = serve::start_reload().map_err(KilnError::ReloadPort)?;
            let ctx = TaskContext {
                config,
                paths,
                reload: Some(reload),
            };

            let entry = if target == "release-serve" {
                "release"
            } else {
                "build"
            };
            summarize(graph.run(entry, &ctx)?);

            let _http = serve::start_http(config.dest_root.clone());
            serve::open_browser();
            watch::watch(graph, &ctx, &watch::default_rules(paths, config.release))?;
        }
        "watch" => {
            let ctx = TaskContext {
                config,
                paths,
                reload: None,
            };
            watch::watch(graph, &ctx, &watch::default_rules(paths, config.release))?;
        }
        _ => {
            let ctx = TaskContext {
                config,
                paths,
                reload: None,
            };
            summarize(graph.run(target, &ctx)?);
        }
    }

    Ok(())
}

/// Per-task failures were already logged; the process still exits 0 so that
/// interactive rebuilds keep going. Startup failures are the fatal ones.
fn summarize(report: RunReport) {
    if !report.is_success() {
        tracing::warn!(
            "{} task(s) failed, output may be incomplete",
            report.failures.len(),
        );
    }
}

fn banner(config: &BuildConfig) {
    const WIDTH: usize = 78;

    let line = "*".repeat(WIDTH);
    let row = |text: String| format!("* {text:<width$}*", width = WIDTH - 3);

    eprintln!("{}", style(&line).blue());
    eprintln!(
        "{}",
        style(row(format!(
            "Product Type:  {}",
            config.product.as_str().to_uppercase()
        )))
        .blue()
    );
    eprintln!(
        "{}",
        style(row(format!("Build Root  :  {}", config.dest_root))).blue()
    );
    eprintln!("{}", style(&line).blue());
}
