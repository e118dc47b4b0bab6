//! Filesystem watching.
//!
//! A [`WatchRule`] maps a source glob to the tasks to re-run when a matching
//! path changes. Events are debounced, so a burst of saves coalesces into at
//! least one re-run per affected task. Re-runs go through the regular graph
//! executor, prerequisites included, and failures never stop the loop.

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_full::new_debouncer;

use crate::error::WatchError;
use crate::graph::{TaskContext, TaskGraph};
use crate::paths::{AssetKind, PathConfig};
use crate::pipeline::split_glob_root;

const DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct WatchRule {
    pub pattern: String,
    pub tasks: Vec<&'static str>,
}

impl WatchRule {
    fn new(pattern: &str, tasks: &[&'static str]) -> Self {
        Self {
            pattern: pattern.to_string(),
            tasks: tasks.to_vec(),
        }
    }
}

/// The default rule set: each asset type re-triggers the task that builds
/// it. In release mode, partial templates re-render into the staging
/// directory instead of the destination.
pub fn default_rules(paths: &PathConfig, release: bool) -> Vec<WatchRule> {
    let mut rules = Vec::new();

    let mut add = |kind: AssetKind, tasks: &[&'static str]| {
        for pattern in paths.sources(kind) {
            rules.push(WatchRule::new(pattern, tasks));
        }
    };

    add(AssetKind::Styles, &["styles"]);
    add(AssetKind::Pages, &["templates:pages"]);
    add(
        AssetKind::Partials,
        if release {
            &["templates:cache"]
        } else {
            &["templates:partials"]
        },
    );
    add(AssetKind::Images, &["copy:images"]);
    add(AssetKind::Fonts, &["copy:fonts"]);
    add(AssetKind::Scripts, &["copy:scripts"]);
    add(AssetKind::Vendor, &["copy:vendor"]);

    rules
}

/// Reduce watch roots to a minimal set: a directory nested under another
/// watched directory adds nothing, the watcher is recursive.
pub fn collapse_roots(mut roots: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    roots.sort();
    roots.dedup();

    let mut kept: Vec<Utf8PathBuf> = Vec::new();
    for root in roots {
        if !kept.iter().any(|prefix| root.starts_with(prefix)) {
            kept.push(root);
        }
    }
    kept
}

struct CompiledRule {
    pattern: Pattern,
    tasks: Vec<&'static str>,
}

/// Watch the rule patterns and re-run the mapped tasks on every change
/// burst. Blocks until the watch channel closes.
pub fn watch(graph: &TaskGraph, ctx: &TaskContext, rules: &[WatchRule]) -> Result<(), WatchError> {
    let pwd = Utf8PathBuf::from_path_buf(env::current_dir()?)
        .map_err(|_| std::io::Error::other("working directory is not UTF-8"))?;

    let mut compiled = Vec::new();
    let mut roots = Vec::new();
    for rule in rules {
        let (root, pattern) = split_glob_root(&rule.pattern);
        compiled.push(CompiledRule {
            pattern: Pattern::new(pattern)?,
            tasks: rule.tasks.clone(),
        });
        if root.is_dir() {
            roots.push(root);
        }
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, None, tx)?;

    for root in collapse_roots(roots) {
        tracing::info!("watching {root}");
        debouncer.watch(&root, RecursiveMode::Recursive)?;
    }

    loop {
        match rx.recv()? {
            Ok(events) => {
                let changed: Vec<Utf8PathBuf> = events
                    .iter()
                    .flat_map(|de| &de.event.paths)
                    .filter_map(|path| Utf8Path::from_path(path))
                    .map(|path| {
                        path.strip_prefix(&pwd)
                            .map(Utf8Path::to_path_buf)
                            .unwrap_or_else(|_| path.to_path_buf())
                    })
                    .collect();

                let tasks = tasks_for(&compiled, &changed);
                if tasks.is_empty() {
                    continue;
                }

                tracing::info!("change detected, re-running {tasks:?}");
                for task in tasks {
                    match graph.run(task, ctx) {
                        Ok(report) if report.is_success() => {}
                        Ok(report) => {
                            tracing::warn!(
                                task,
                                "{} task(s) failed, still watching",
                                report.failures.len()
                            );
                        }
                        Err(err) => tracing::error!(task, "{err}"),
                    }
                }
            }
            Err(errors) => {
                for err in errors {
                    tracing::error!("watch error: {err}");
                }
            }
        }
    }
}

/// Tasks affected by a burst of changed paths, deduplicated.
fn tasks_for<'r>(rules: &'r [CompiledRule], changed: &[Utf8PathBuf]) -> BTreeSet<&'r str> {
    let mut tasks = BTreeSet::new();
    for rule in rules {
        if changed
            .iter()
            .any(|path| rule.pattern.matches(path.as_str()))
        {
            tasks.extend(rule.tasks.iter().copied());
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    #[test]
    fn roots_collapse_to_minimal_set() {
        let roots = vec![
            Utf8PathBuf::from("src/styles"),
            Utf8PathBuf::from("src/styles/nested"),
            Utf8PathBuf::from("src/pages"),
            Utf8PathBuf::from("vendor"),
        ];

        assert_eq!(
            collapse_roots(roots),
            vec![
                Utf8PathBuf::from("src/pages"),
                Utf8PathBuf::from("src/styles"),
                Utf8PathBuf::from("vendor"),
            ]
        );
    }

    #[test]
    fn sibling_roots_with_shared_prefix_both_survive() {
        let roots = vec![Utf8PathBuf::from("src/js"), Utf8PathBuf::from("src/js-old")];
        assert_eq!(collapse_roots(roots.clone()), roots);
    }

    #[test]
    fn changed_paths_map_to_tasks() {
        let rules = vec![
            CompiledRule {
                pattern: Pattern::new("src/styles/**/*.scss").unwrap(),
                tasks: vec!["styles"],
            },
            CompiledRule {
                pattern: Pattern::new("src/pages/*.j2").unwrap(),
                tasks: vec!["templates:pages"],
            },
        ];

        let changed = vec![Utf8PathBuf::from("src/styles/app/main.scss")];
        let tasks = tasks_for(&rules, &changed);
        assert_eq!(tasks.into_iter().collect::<Vec<_>>(), vec!["styles"]);

        assert!(tasks_for(&rules, &[Utf8PathBuf::from("README.md")]).is_empty());
    }

    #[test]
    fn release_mode_reroutes_partials() {
        let config = BuildConfig::resolve(["kiln"]);
        let paths = PathConfig::derive(&config);

        let dev = default_rules(&paths, false);
        assert!(dev.iter().any(|r| r.tasks == ["templates:partials"]));

        let release = default_rules(&paths, true);
        assert!(release.iter().any(|r| r.tasks == ["templates:cache"]));
    }
}
