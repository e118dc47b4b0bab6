//! Dependency manifest introspection.
//!
//! The manifest (`vendor.json`) declares the project version and a mapping
//! from dependency name to the accepted version range. The concrete version
//! of each dependency comes from its installed descriptor under
//! `vendor/<name>/package.json`. Resolution is all-or-nothing: a missing or
//! malformed descriptor fails the whole process, there is no partial result.

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;

use crate::error::ManifestError;

pub const MANIFEST_FILE: &str = "vendor.json";
pub const VENDOR_DIR: &str = "vendor";

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    version: String,
}

/// The manifest with every declared dependency pinned to the version that is
/// actually installed.
#[derive(Debug, Default)]
pub struct ResolvedManifest {
    pub version: String,
    pub packages: BTreeMap<String, String>,
}

/// Read the manifest in `dir` and resolve the installed version of every
/// declared dependency.
pub fn resolve(dir: &Utf8Path) -> Result<ResolvedManifest, ManifestError> {
    let path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    let manifest: Manifest =
        serde_json::from_str(&raw).map_err(|source| ManifestError::Parse { path, source })?;

    let mut packages = BTreeMap::new();
    for name in manifest.dependencies.keys() {
        let descriptor = dir.join(VENDOR_DIR).join(name).join("package.json");
        let raw =
            fs::read_to_string(&descriptor).map_err(|_| ManifestError::MissingDescriptor {
                name: name.clone(),
                path: descriptor.clone(),
            })?;
        let parsed: Descriptor =
            serde_json::from_str(&raw).map_err(|source| ManifestError::MalformedDescriptor {
                name: name.clone(),
                source,
            })?;
        packages.insert(name.clone(), parsed.version);
    }

    Ok(ResolvedManifest {
        version: manifest.version,
        packages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn temp_project() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn write_manifest(dir: &Utf8Path, body: &str) {
        fs::write(dir.join(MANIFEST_FILE), body).unwrap();
    }

    fn install(dir: &Utf8Path, name: &str, version: &str) {
        let pkg = dir.join(VENDOR_DIR).join(name);
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("package.json"),
            format!(r#"{{"name": "{name}", "version": "{version}"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn resolves_installed_versions() {
        let (_guard, dir) = temp_project();
        write_manifest(
            &dir,
            r#"{"version": "1.2.0", "dependencies": {"chart": "^2.0.0", "router": "~0.4.0"}}"#,
        );
        install(&dir, "chart", "2.0.1");
        install(&dir, "router", "0.4.9");

        let resolved = resolve(&dir).unwrap();
        assert_eq!(resolved.version, "1.2.0");
        assert_eq!(resolved.packages["chart"], "2.0.1");
        assert_eq!(resolved.packages["router"], "0.4.9");
    }

    #[test]
    fn missing_descriptor_is_fatal() {
        let (_guard, dir) = temp_project();
        write_manifest(&dir, r#"{"version": "1.0.0", "dependencies": {"foo": "^1.0.0"}}"#);

        let err = resolve(&dir).unwrap_err();
        assert!(matches!(err, ManifestError::MissingDescriptor { ref name, .. } if name == "foo"));
    }

    #[test]
    fn malformed_descriptor_is_fatal() {
        let (_guard, dir) = temp_project();
        write_manifest(&dir, r#"{"dependencies": {"foo": "^1.0.0"}}"#);
        let pkg = dir.join(VENDOR_DIR).join("foo");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), "not json").unwrap();

        let err = resolve(&dir).unwrap_err();
        assert!(matches!(err, ManifestError::MalformedDescriptor { ref name, .. } if name == "foo"));
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let (_guard, dir) = temp_project();
        assert!(matches!(resolve(&dir), Err(ManifestError::Read { .. })));
    }
}
