//! The fixed task set: cleaning, style compilation, template rendering,
//! copies, vendoring, tool checks, and the composite entry points. This is
//! the single place where the build graph is declared.

use camino::Utf8Path;
use console::style;

use crate::graph::{Registry, TaskContext, TaskResult};
use crate::io;
use crate::paths::AssetKind;
use crate::pipeline::{Pipeline, PipelineReport, StageContext};
use crate::stages::{CompileStyles, OptimizeImages, RenderTemplate};
use crate::tools;

/// Declare every task. Validation happens in [`Registry::finish`].
pub fn registry() -> Registry {
    let mut reg = Registry::new();

    reg.group("default", &["build"]);

    reg.group(
        "clean",
        &[
            "clean:tmp",
            "clean:styles",
            "clean:pages",
            "clean:templates",
            "clean:images",
            "clean:fonts",
            "clean:scripts",
            "clean:vendor",
        ],
    );
    reg.task("clean:tmp", &[], |ctx| {
        clean(&[ctx.paths.temp.to_string()], "temporary")
    });
    reg.task("clean:styles", &[], |ctx| {
        clean_dest(ctx, AssetKind::Styles, "style")
    });
    reg.task("clean:pages", &[], |ctx| {
        clean(
            &[format!("{}/*.html", ctx.paths.dest(AssetKind::Pages))],
            "page",
        )
    });
    reg.task("clean:templates", &[], |ctx| {
        clean_dest(ctx, AssetKind::Partials, "template")
    });
    reg.task("clean:images", &[], |ctx| {
        clean_dest(ctx, AssetKind::Images, "image")
    });
    reg.task("clean:fonts", &[], |ctx| {
        clean_dest(ctx, AssetKind::Fonts, "font")
    });
    reg.task("clean:scripts", &[], |ctx| {
        clean_dest(ctx, AssetKind::Scripts, "script")
    });
    reg.task("clean:vendor", &[], |ctx| {
        clean_dest(ctx, AssetKind::Vendor, "vendor")
    });

    // Underscore-prefixed partials are imported by other sheets, never
    // compiled standalone.
    reg.task("styles", &["clean:styles"], |ctx| {
        let pipeline = Pipeline::select(ctx.paths.sources(AssetKind::Styles))
            .filter(|file| !is_style_partial(&file.rel))
            .stage(CompileStyles::new(ctx.config.source_root.join("styles")));
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Styles), ctx)
    });

    reg.task("templates:pages", &["clean:pages"], |ctx| {
        let pipeline =
            Pipeline::select(ctx.paths.sources(AssetKind::Pages)).stage(RenderTemplate);
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Pages), ctx)
    });

    reg.task("templates:partials", &["clean:templates"], |ctx| {
        let pipeline =
            Pipeline::select(ctx.paths.sources(AssetKind::Partials)).stage(RenderTemplate);
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Partials), ctx)
    });

    // Staging rendition of the partials, kept as intermediate output for the
    // release packaging step.
    reg.task("templates:cache", &["clean:tmp"], |ctx| {
        let pipeline =
            Pipeline::select(ctx.paths.sources(AssetKind::Partials)).stage(RenderTemplate);
        run_pipeline(pipeline, &ctx.paths.temp, ctx)
    });

    reg.group(
        "copy",
        &["copy:images", "copy:fonts", "copy:scripts", "copy:vendor"],
    );
    reg.task("copy:images", &["clean:images"], |ctx| {
        let pipeline =
            Pipeline::select(ctx.paths.sources(AssetKind::Images)).stage(OptimizeImages);
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Images), ctx)
    });
    reg.task("copy:fonts", &["clean:fonts"], |ctx| {
        let pipeline = Pipeline::select(ctx.paths.sources(AssetKind::Fonts));
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Fonts), ctx)
    });
    reg.task("copy:scripts", &["clean:scripts"], |ctx| {
        let pipeline = Pipeline::select(ctx.paths.sources(AssetKind::Scripts));
        run_pipeline(pipeline, ctx.paths.dest(AssetKind::Scripts), ctx)
    });
    reg.task("copy:vendor", &["clean:vendor"], copy_vendor);

    reg.group(
        "build",
        &["clean", "styles", "templates:pages", "templates:partials", "copy"],
    );
    reg.group(
        "release",
        &["clean", "styles", "templates:pages", "copy", "templates:cache"],
    );

    // The server and watcher block, so `main` drives them after running the
    // build portion of these targets.
    reg.group("serve", &["build"]);
    reg.group("release-serve", &["release"]);
    reg.group("watch", &[]);

    reg.task("tools:git", &[], |_| {
        tools::require("git", tools::GIT_HINT);
        Ok(())
    });
    reg.task("tools:packager", &[], |_| {
        tools::require("cordova", tools::PACKAGER_HINT);
        Ok(())
    });
    reg.task("install", &["tools:git"], |_| tools::vendor_install());

    reg
}

fn is_style_partial(rel: &Utf8Path) -> bool {
    rel.file_name().is_some_and(|name| name.starts_with('_'))
}

fn clean(globs: &[String], label: &str) -> TaskResult<()> {
    io::remove_globs(globs, label)?;
    Ok(())
}

fn clean_dest(ctx: &TaskContext, kind: AssetKind, label: &str) -> TaskResult<()> {
    clean(&[ctx.paths.dest(kind).to_string()], label)
}

/// Each vendored package is copied under its own subdirectory of the vendor
/// destination, so relative paths are computed per package.
fn copy_vendor(ctx: &TaskContext) -> TaskResult<()> {
    let dest = ctx.paths.dest(AssetKind::Vendor);
    let mut merged = PipelineReport::default();

    for name in ctx.config.packages.keys() {
        let sources = [format!("{}/{name}/**/*", crate::manifest::VENDOR_DIR)];
        let report = Pipeline::select(&sources).run(
            &dest.join(name),
            &StageContext { config: ctx.config },
        );
        merged.written.extend(report.written);
        merged.failures.extend(report.failures);
    }

    finish(merged, ctx)
}

fn run_pipeline(pipeline: Pipeline, dest: &Utf8Path, ctx: &TaskContext) -> TaskResult<()> {
    let report = pipeline.run(dest, &StageContext { config: ctx.config });
    finish(report, ctx)
}

/// Log every per-file failure, notify the dev server when anything was
/// written, and fold the report into the task result.
fn finish(report: PipelineReport, ctx: &TaskContext) -> TaskResult<()> {
    for failure in &report.failures {
        tracing::error!(
            "{} '{}': {}",
            style(failure.stage).red(),
            failure.path,
            failure.message,
        );
    }

    if !report.written.is_empty()
        && let Some(reload) = &ctx.reload
    {
        reload.send(()).ok();
    }

    if report.failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} file(s) failed, {} written",
            report.failures.len(),
            report.written.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prerequisite_resolves_and_graph_is_acyclic() {
        // `finish` validates both dangling prerequisites and cycles.
        registry().finish().unwrap();
    }

    #[test]
    fn entry_points_are_registered() {
        let graph = registry().finish().unwrap();
        for name in [
            "default",
            "build",
            "release",
            "serve",
            "release-serve",
            "watch",
            "clean",
            "install",
        ] {
            assert!(graph.contains(name), "missing task '{name}'");
        }
    }

    #[test]
    fn underscore_files_are_style_partials() {
        assert!(is_style_partial(Utf8Path::new("_variables.scss")));
        assert!(is_style_partial(Utf8Path::new("base/_mixins.scss")));
        assert!(!is_style_partial(Utf8Path::new("app.scss")));
        assert!(!is_style_partial(Utf8Path::new("base/theme.scss")));
    }

    #[test]
    fn fine_grained_tasks_are_registered() {
        let graph = registry().finish().unwrap();
        for name in [
            "clean:tmp",
            "clean:styles",
            "styles",
            "templates:pages",
            "templates:partials",
            "templates:cache",
            "copy:images",
            "copy:fonts",
            "copy:scripts",
            "copy:vendor",
            "tools:git",
            "tools:packager",
        ] {
            assert!(graph.contains(name), "missing task '{name}'");
        }
    }
}
