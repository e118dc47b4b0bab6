//! The concrete transform stages wired into the build pipelines. Each one
//! delegates the actual work to an external capability: `grass` for SCSS,
//! `minijinja` for templates, `image` for raster re-encoding.

use std::io::Cursor;

use camino::Utf8PathBuf;
use image::ImageFormat;
use minijinja::{Environment, context};

use crate::pipeline::{FileEntry, Stage, StageContext};

/// Compile SCSS into CSS. In release mode the output is compressed and the
/// file is renamed to `.min.css`.
pub struct CompileStyles {
    load_path: Utf8PathBuf,
}

impl CompileStyles {
    pub fn new(load_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            load_path: load_path.into(),
        }
    }
}

impl Stage for CompileStyles {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn apply(&self, mut file: FileEntry, ctx: &StageContext) -> anyhow::Result<FileEntry> {
        let style = if ctx.config.release {
            grass::OutputStyle::Compressed
        } else {
            grass::OutputStyle::Expanded
        };
        let options = grass::Options::default()
            .style(style)
            .load_path(&self.load_path);

        let css = grass::from_string(file.text()?.to_owned(), &options)
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        let extension = if ctx.config.release { "min.css" } else { "css" };
        file.rel = file.rel.with_extension(extension);
        file.set_text(css);
        Ok(file)
    }
}

/// Render a `.j2` template into HTML. The build configuration is exposed to
/// templates as `product`, `release`, `version` and `packages`.
pub struct RenderTemplate;

impl Stage for RenderTemplate {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn apply(&self, mut file: FileEntry, ctx: &StageContext) -> anyhow::Result<FileEntry> {
        let env = Environment::new();
        let html = env.render_str(
            file.text()?,
            context! {
                product => ctx.config.product.as_str(),
                release => ctx.config.release,
                version => ctx.config.version,
                packages => ctx.config.packages,
            },
        )?;

        // "page.j2" and "page.html.j2" both land as "page.html".
        let stripped = file.rel.with_extension("");
        file.rel = if stripped.extension() == Some("html") {
            stripped
        } else {
            stripped.with_extension("html")
        };
        file.set_text(html);
        Ok(file)
    }
}

/// Re-encode PNG and JPEG images, keeping whichever rendition is smaller.
/// Every other format passes through untouched.
pub struct OptimizeImages;

impl Stage for OptimizeImages {
    fn name(&self) -> &'static str {
        "images"
    }

    fn apply(&self, mut file: FileEntry, _: &StageContext) -> anyhow::Result<FileEntry> {
        let format = match file.rel.extension() {
            Some("png") => ImageFormat::Png,
            Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
            _ => return Ok(file),
        };

        let decoded = image::load_from_memory(&file.contents)?;
        let mut encoded = Vec::new();
        decoded.write_to(&mut Cursor::new(&mut encoded), format)?;

        if encoded.len() < file.contents.len() {
            file.contents = encoded;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use camino::Utf8PathBuf;

    fn entry(rel: &str, contents: &str) -> FileEntry {
        FileEntry {
            path: Utf8PathBuf::from(rel),
            rel: Utf8PathBuf::from(rel),
            contents: contents.as_bytes().to_vec(),
        }
    }

    #[test]
    fn compiles_scss() {
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let out = CompileStyles::new("src/styles")
            .apply(entry("a.scss", "$c: red;\nbody { color: $c; }"), &ctx)
            .unwrap();

        assert_eq!(out.rel, Utf8PathBuf::from("a.css"));
        assert!(std::str::from_utf8(&out.contents)
            .unwrap()
            .contains("color: red"));
    }

    #[test]
    fn release_styles_are_minified_and_renamed() {
        let config = BuildConfig::resolve(["kiln", "release"]);
        let ctx = StageContext { config: &config };

        let out = CompileStyles::new("src/styles")
            .apply(entry("a.scss", "body { color: red; }"), &ctx)
            .unwrap();

        assert_eq!(out.rel, Utf8PathBuf::from("a.min.css"));
        let css = std::str::from_utf8(&out.contents).unwrap();
        assert!(!css.trim_end().contains('\n'));
    }

    #[test]
    fn malformed_scss_is_an_error() {
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let result = CompileStyles::new("src/styles")
            .apply(entry("bad.scss", "body { color: ; }"), &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn renders_template_with_config() {
        let mut config = BuildConfig::resolve(["kiln", "--mobile"]);
        config.version = String::from("1.2.0");
        let ctx = StageContext { config: &config };

        let out = RenderTemplate
            .apply(entry("index.j2", "<p>{{ product }} {{ version }}</p>"), &ctx)
            .unwrap();

        assert_eq!(out.rel, Utf8PathBuf::from("index.html"));
        assert_eq!(out.contents, b"<p>mobile 1.2.0</p>");
    }

    #[test]
    fn html_j2_suffix_collapses_once() {
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let out = RenderTemplate
            .apply(entry("page.html.j2", "ok"), &ctx)
            .unwrap();
        assert_eq!(out.rel, Utf8PathBuf::from("page.html"));
    }

    #[test]
    fn malformed_template_is_an_error() {
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        assert!(RenderTemplate
            .apply(entry("bad.j2", "{% if %}"), &ctx)
            .is_err());
    }

    #[test]
    fn unknown_image_formats_pass_through() {
        let config = BuildConfig::resolve(["kiln"]);
        let ctx = StageContext { config: &config };

        let out = OptimizeImages
            .apply(entry("logo.svg", "<svg/>"), &ctx)
            .unwrap();
        assert_eq!(out.contents, b"<svg/>");
    }
}
