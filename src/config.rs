//! Build configuration resolved once at startup from command-line flags.
//!
//! The resolver is a pure function of the process arguments. It never fails:
//! malformed or unrecognized flags silently fall back to the defaults, which
//! keeps the tool usable from editor integrations that pass extra flags.

use std::collections::BTreeMap;
use std::ffi::OsString;

use camino::Utf8PathBuf;
use clap::{Arg, ArgAction, Command};

use crate::manifest::ResolvedManifest;

pub const DEFAULT_ROOT: &str = "src";
pub const DEFAULT_DEST: &str = "www";

/// The product flavor selected on the command line. The flavor is exposed to
/// templates so that pages can render platform-specific markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    Mobile,
    Web,
}

impl Product {
    pub fn as_str(self) -> &'static str {
        match self {
            Product::Mobile => "mobile",
            Product::Web => "web",
        }
    }
}

/// Immutable snapshot of everything the build needs to know. Constructed once
/// in `main` and passed by reference into every component.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub product: Product,
    pub release: bool,
    pub source_root: Utf8PathBuf,
    pub dest_root: Utf8PathBuf,
    pub list_tasks: bool,
    /// Invocation targets, in the order given. Defaults to `build`.
    pub targets: Vec<String>,
    /// Project version, taken from the dependency manifest.
    pub version: String,
    /// Resolved versions of every vendored dependency.
    pub packages: BTreeMap<String, String>,
}

impl BuildConfig {
    /// Resolve the configuration from raw process arguments.
    pub fn resolve<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().ignore_errors(true).get_matches_from(args);

        // `--mobile` wins when both flags are present.
        let product = if matches.get_flag("mobile") {
            Product::Mobile
        } else {
            Product::Web
        };

        let source_root = matches
            .get_one::<String>("root")
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_ROOT));

        let dest_root = matches
            .get_one::<String>("dest")
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DEST));

        let targets: Vec<String> = matches
            .get_many::<String>("target")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let release = targets
            .iter()
            .any(|t| t == "release" || t == "release-serve");

        let targets = if targets.is_empty() {
            vec![String::from("build")]
        } else {
            targets
        };

        Self {
            product,
            release,
            source_root,
            dest_root,
            list_tasks: matches.get_flag("tasks-simple"),
            targets,
            version: String::new(),
            packages: BTreeMap::new(),
        }
    }

    /// Merge the resolved dependency manifest into the configuration.
    pub fn with_manifest(mut self, manifest: ResolvedManifest) -> Self {
        self.version = manifest.version;
        self.packages = manifest.packages;
        self
    }
}

fn command() -> Command {
    Command::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Asset build orchestrator for hybrid web/mobile apps")
        .arg(
            Arg::new("mobile")
                .short('m')
                .long("mobile")
                .help("Build the mobile flavor")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("web")
                .short('w')
                .long("web")
                .help("Build the web flavor (default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("PATH")
                .help("Source root directory"),
        )
        .arg(
            Arg::new("dest")
                .short('d')
                .long("dest")
                .value_name("PATH")
                .help("Destination root directory"),
        )
        .arg(
            Arg::new("tasks-simple")
                .long("tasks-simple")
                .help("Print the task names and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("target")
                .value_name("TASK")
                .help("Tasks to run, in order")
                .num_args(0..),
        )
}
