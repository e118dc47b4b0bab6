//! File pipelines: select a file set by glob, push every file through an
//! ordered list of transform stages, write the results under a destination
//! directory.
//!
//! Failure isolation is per file. A malformed input is recorded and skipped,
//! the rest of the set still goes through; all failures are aggregated into
//! the [`PipelineReport`] the owning task inspects when it completes. Files
//! within a set are processed in parallel and carry no ordering guarantee.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::BuildConfig;
use crate::io;

/// A single file flowing through a pipeline. `rel` is the path relative to
/// the static root of the glob that matched it; it decides where the file
/// lands under the destination directory and stages may rewrite it.
pub struct FileEntry {
    pub path: Utf8PathBuf,
    pub rel: Utf8PathBuf,
    pub contents: Vec<u8>,
}

impl FileEntry {
    pub fn text(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|_| anyhow::anyhow!("'{}' is not valid UTF-8", self.path))
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }
}

/// Split a glob pattern into its static root and the full pattern. The root
/// is every leading component without glob metacharacters; relative paths of
/// matched files are computed against it. A literal file path roots at its
/// parent so the file name survives as the relative part.
pub fn split_glob_root(pattern: &str) -> (Utf8PathBuf, &str) {
    let path = Utf8Path::new(pattern);
    let mut root: Utf8PathBuf = path
        .components()
        .take_while(|c| !io::is_glob(c.as_str()))
        .collect();
    if root == path {
        root.pop();
    }
    (root, pattern)
}

/// Context visible to every stage.
pub struct StageContext<'a> {
    pub config: &'a BuildConfig,
}

/// One transform applied to each file of a set, templating, style
/// compilation, image optimization and the like. Stages consume and re-emit
/// the same [`FileEntry`] shape, preserving per-file identity.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, file: FileEntry, ctx: &StageContext) -> anyhow::Result<FileEntry>;
}

/// A file that could not make it through the pipeline, with enough context
/// to locate the failing stage and input.
#[derive(Debug)]
pub struct PipelineFailure {
    pub path: Utf8PathBuf,
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub written: Vec<Utf8PathBuf>,
    pub failures: Vec<PipelineFailure>,
}

type FilterFn = Box<dyn Fn(&FileEntry) -> bool + Send + Sync>;

pub struct Pipeline {
    sources: Vec<String>,
    filters: Vec<FilterFn>,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn select(sources: &[String]) -> Self {
        Self {
            sources: sources.to_vec(),
            filters: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Keep only the files the predicate accepts. Rejected files are not
    /// failures, they simply leave the set.
    pub fn filter(mut self, predicate: impl Fn(&FileEntry) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append the stage only when `condition` holds. Used to gate
    /// release-only transforms.
    pub fn stage_if(self, condition: bool, stage: impl Stage + 'static) -> Self {
        if condition { self.stage(stage) } else { self }
    }

    /// Run the pipeline: read every matched file, apply the stages, write
    /// the survivors under `dest`.
    pub fn run(&self, dest: &Utf8Path, ctx: &StageContext) -> PipelineReport {
        let mut report = PipelineReport::default();
        let entries = self.read_sources(&mut report);

        let results: Vec<_> = entries
            .into_par_iter()
            .map(|file| self.process(file, dest, ctx))
            .collect();

        for result in results {
            match result {
                Ok(path) => report.written.push(path),
                Err(failure) => report.failures.push(failure),
            }
        }

        report
    }

    fn process(
        &self,
        mut file: FileEntry,
        dest: &Utf8Path,
        ctx: &StageContext,
    ) -> Result<Utf8PathBuf, PipelineFailure> {
        let path = file.path.clone();

        for stage in &self.stages {
            file = stage.apply(file, ctx).map_err(|err| PipelineFailure {
                path: path.clone(),
                stage: stage.name(),
                message: format!("{err:#}"),
            })?;
        }

        io::write_output(dest, &file.rel, &file.contents).map_err(|err| PipelineFailure {
            path,
            stage: "write",
            message: err.to_string(),
        })
    }

    fn read_sources(&self, report: &mut PipelineReport) -> Vec<FileEntry> {
        let mut entries = Vec::new();

        for source in &self.sources {
            let (root, pattern) = split_glob_root(source);

            let matched = match glob::glob(pattern) {
                Ok(matched) => matched,
                Err(err) => {
                    report.failures.push(PipelineFailure {
                        path: Utf8PathBuf::from(pattern),
                        stage: "read",
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for path in matched.flatten() {
                let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                    continue;
                };
                if !path.is_file() {
                    continue;
                }

                let rel = path
                    .strip_prefix(&root)
                    .map(Utf8Path::to_path_buf)
                    .unwrap_or_else(|_| path.clone());

                match fs::read(&path) {
                    Ok(contents) => {
                        let entry = FileEntry {
                            path,
                            rel,
                            contents,
                        };
                        if self.filters.iter().all(|keep| keep(&entry)) {
                            entries.push(entry);
                        }
                    }
                    Err(err) => report.failures.push(PipelineFailure {
                        path,
                        stage: "read",
                        message: err.to_string(),
                    }),
                }
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    struct Upper;

    impl Stage for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn apply(&self, mut file: FileEntry, _: &StageContext) -> anyhow::Result<FileEntry> {
            let text = file.text()?.to_uppercase();
            file.set_text(text);
            Ok(file)
        }
    }

    struct RejectNamed(&'static str);

    impl Stage for RejectNamed {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn apply(&self, file: FileEntry, _: &StageContext) -> anyhow::Result<FileEntry> {
            if file.rel.as_str() == self.0 {
                anyhow::bail!("rejected");
            }
            Ok(file)
        }
    }

    fn fixture() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("in/nested")).unwrap();
        fs::write(root.join("in/a.txt"), "alpha").unwrap();
        fs::write(root.join("in/nested/b.txt"), "beta").unwrap();
        (dir, root)
    }

    #[test]
    fn splits_static_root() {
        let (root, pattern) = split_glob_root("src/styles/**/*.scss");
        assert_eq!(root, Utf8PathBuf::from("src/styles"));
        assert_eq!(pattern, "src/styles/**/*.scss");
    }

    #[test]
    fn literal_path_roots_at_its_parent() {
        let (root, pattern) = split_glob_root("src/styles/app.scss");
        assert_eq!(root, Utf8PathBuf::from("src/styles"));
        assert_eq!(pattern, "src/styles/app.scss");
    }

    #[test]
    fn literal_path_is_copied_under_its_file_name() {
        let (_guard, root) = fixture();
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let report = Pipeline::select(&[format!("{root}/in/a.txt")]).run(&root.join("out"), &ctx);

        assert!(report.failures.is_empty());
        assert_eq!(fs::read_to_string(root.join("out/a.txt")).unwrap(), "alpha");
    }

    #[test]
    fn transforms_and_preserves_relative_paths() {
        let (_guard, root) = fixture();
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let report = Pipeline::select(&[format!("{root}/in/**/*.txt")])
            .stage(Upper)
            .run(&root.join("out"), &ctx);

        assert!(report.failures.is_empty());
        assert_eq!(report.written.len(), 2);
        assert_eq!(fs::read_to_string(root.join("out/a.txt")).unwrap(), "ALPHA");
        assert_eq!(
            fs::read_to_string(root.join("out/nested/b.txt")).unwrap(),
            "BETA"
        );
    }

    #[test]
    fn one_bad_file_does_not_block_the_rest() {
        let (_guard, root) = fixture();
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let report = Pipeline::select(&[format!("{root}/in/**/*.txt")])
            .stage(RejectNamed("a.txt"))
            .run(&root.join("out"), &ctx);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, "reject");
        assert_eq!(report.written.len(), 1);
        assert!(root.join("out/nested/b.txt").is_file());
    }

    #[test]
    fn filtered_files_leave_the_set_silently() {
        let (_guard, root) = fixture();
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let report = Pipeline::select(&[format!("{root}/in/**/*.txt")])
            .filter(|file| file.rel.as_str() != "a.txt")
            .run(&root.join("out"), &ctx);

        assert!(report.failures.is_empty());
        assert_eq!(report.written.len(), 1);
        assert!(!root.join("out/a.txt").exists());
    }

    #[test]
    fn conditional_stage_is_skipped() {
        let (_guard, root) = fixture();
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let report = Pipeline::select(&[format!("{root}/in/a.txt")])
            .stage_if(false, Upper)
            .run(&root.join("out"), &ctx);

        assert!(report.failures.is_empty());
        assert_eq!(fs::read_to_string(root.join("out/a.txt")).unwrap(), "alpha");
    }
}
