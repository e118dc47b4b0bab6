//! Source globs and destination directories for every asset type, derived
//! deterministically from the build configuration at startup.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::BuildConfig;
use crate::manifest::VENDOR_DIR;

/// Staging directory for intermediate template output.
pub const TEMP_DIR: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetKind {
    Styles,
    Pages,
    Partials,
    Images,
    Fonts,
    Scripts,
    Vendor,
}

impl AssetKind {
    pub const ALL: [AssetKind; 7] = [
        AssetKind::Styles,
        AssetKind::Pages,
        AssetKind::Partials,
        AssetKind::Images,
        AssetKind::Fonts,
        AssetKind::Scripts,
        AssetKind::Vendor,
    ];

    /// Output subdirectory under the destination root. `None` means the
    /// destination root itself.
    fn dest_dir(self) -> Option<&'static str> {
        match self {
            AssetKind::Styles => Some("css"),
            AssetKind::Pages => None,
            AssetKind::Partials => Some("partials"),
            AssetKind::Images => Some("images"),
            AssetKind::Fonts => Some("fonts"),
            AssetKind::Scripts => Some("js"),
            AssetKind::Vendor => Some("lib"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathConfig {
    pub temp: Utf8PathBuf,
    sources: BTreeMap<AssetKind, Vec<String>>,
    dests: BTreeMap<AssetKind, Utf8PathBuf>,
}

impl PathConfig {
    pub fn derive(config: &BuildConfig) -> Self {
        let root = &config.source_root;

        let mut sources = BTreeMap::new();
        sources.insert(AssetKind::Styles, vec![format!("{root}/styles/**/*.scss")]);
        sources.insert(AssetKind::Pages, vec![format!("{root}/pages/*.j2")]);
        sources.insert(
            AssetKind::Partials,
            vec![format!("{root}/partials/**/*.j2")],
        );
        sources.insert(AssetKind::Images, vec![format!("{root}/images/**/*")]);
        sources.insert(AssetKind::Fonts, vec![format!("{root}/fonts/*")]);
        sources.insert(AssetKind::Scripts, vec![format!("{root}/js/**/*.js")]);
        sources.insert(
            AssetKind::Vendor,
            config
                .packages
                .keys()
                .map(|name| format!("{VENDOR_DIR}/{name}/**/*"))
                .collect(),
        );

        let dests = AssetKind::ALL
            .into_iter()
            .map(|kind| {
                let dest = match kind.dest_dir() {
                    Some(dir) => config.dest_root.join(dir),
                    None => config.dest_root.clone(),
                };
                (kind, dest)
            })
            .collect();

        Self {
            temp: Utf8PathBuf::from(TEMP_DIR),
            sources,
            dests,
        }
    }

    pub fn sources(&self, kind: AssetKind) -> &[String] {
        self.sources.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dest(&self, kind: AssetKind) -> &Utf8Path {
        &self.dests[&kind]
    }
}
