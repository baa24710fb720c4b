//! Side-by-side HTML comparison of mask sets
//!
//! For every input image that has a mask in each compared set, writes the input
//! and one overlay per set as JPEGs under `<output>/results/`, then an HTML page
//! laying them out in rows.

pub mod overlay;

pub use overlay::overlay_mask;

use crate::{
    error::{MaskGenError, Result},
    services::ImageIOService,
};
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTML file name (without extension)
pub const DEFAULT_REPORT_NAME: &str = "segmentation-comparison";

/// Default page title
pub const DEFAULT_REPORT_TITLE: &str = "Dataset Evaluation";

/// A labelled directory of masks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSet {
    pub label: String,
    pub dir: PathBuf,
}

impl MaskSet {
    /// Parse a `LABEL=DIR` argument
    ///
    /// # Errors
    /// - Missing `=`, empty label or empty directory
    /// - Label with characters other than ASCII alphanumerics, `-`, `_` or `.`
    pub fn parse(value: &str) -> Result<Self> {
        let (label, dir) = value.split_once('=').ok_or_else(|| {
            MaskGenError::invalid_config(format!("Expected LABEL=DIR, got '{value}'"))
        })?;
        let set = Self {
            label: label.trim().to_string(),
            dir: PathBuf::from(dir.trim()),
        };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        if self.label.is_empty() {
            return Err(MaskGenError::invalid_config("Mask set label must not be empty"));
        }
        let label_ok = self
            .label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !label_ok {
            return Err(MaskGenError::invalid_config(format!(
                "Mask set label '{}' may only contain letters, digits, '-', '_' and '.'",
                self.label
            )));
        }
        if self.dir.as_os_str().is_empty() {
            return Err(MaskGenError::invalid_config(format!(
                "Mask set '{}' has an empty directory",
                self.label
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for MaskSet {
    type Err = MaskGenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// An input image with one mask per compared set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Input file stem
    pub name: String,
    pub input: PathBuf,
    /// One mask per mask set, in mask set order
    pub masks: Vec<PathBuf>,
}

/// Outcome of [`ComparisonReport::generate`]
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub html_path: PathBuf,
    /// Entries written to the page
    pub rendered: usize,
    /// Entries whose input could not be decoded
    pub skipped: usize,
}

/// HTML comparison report builder
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    images_dir: PathBuf,
    mask_sets: Vec<MaskSet>,
    output_dir: PathBuf,
    title: String,
    report_name: String,
}

impl ComparisonReport {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(images_dir: P, output_dir: Q) -> Self {
        Self {
            images_dir: images_dir.into(),
            mask_sets: Vec::new(),
            output_dir: output_dir.into(),
            title: DEFAULT_REPORT_TITLE.to_string(),
            report_name: DEFAULT_REPORT_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_mask_set(mut self, set: MaskSet) -> Self {
        self.mask_sets.push(set);
        self
    }

    #[must_use]
    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn report_name<S: Into<String>>(mut self, name: S) -> Self {
        self.report_name = name.into();
        self
    }

    #[must_use]
    pub fn mask_sets(&self) -> &[MaskSet] {
        &self.mask_sets
    }

    #[must_use]
    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.html", self.report_name))
    }

    fn results_dir(&self) -> PathBuf {
        self.output_dir.join("results")
    }

    fn validate(&self) -> Result<()> {
        if self.mask_sets.is_empty() {
            return Err(MaskGenError::report("At least one mask set is required"));
        }
        for (i, set) in self.mask_sets.iter().enumerate() {
            set.validate()?;
            if self.mask_sets.iter().skip(i + 1).any(|other| other.label == set.label) {
                return Err(MaskGenError::report(format!(
                    "Duplicate mask set label '{}'",
                    set.label
                )));
            }
        }
        if self.mask_sets.iter().any(|set| set.label == "input") {
            return Err(MaskGenError::report(
                "Mask set label 'input' collides with the input image file names",
            ));
        }
        Ok(())
    }

    /// Inputs (`.jpg`/`.jpeg`, any case) that have a `<stem>.png` in every mask set
    ///
    /// # Errors
    /// - No mask sets configured
    /// - Images directory missing or unreadable
    pub fn discover_entries(&self) -> Result<Vec<ReportEntry>> {
        self.validate()?;

        let dir_entries = std::fs::read_dir(&self.images_dir)
            .map_err(|e| MaskGenError::file_io_error("list images in", &self.images_dir, &e))?;

        let mut entries = Vec::new();
        for dir_entry in dir_entries {
            let path = dir_entry
                .map_err(|e| MaskGenError::file_io_error("list images in", &self.images_dir, &e))?
                .path();
            if !path.is_file() || !is_jpeg_name(&path) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let masks: Vec<PathBuf> = self
                .mask_sets
                .iter()
                .map(|set| set.dir.join(format!("{name}.png")))
                .collect();
            if masks.iter().all(|mask| mask.is_file()) {
                entries.push(ReportEntry {
                    name,
                    input: path,
                    masks,
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Render overlays and write the HTML page
    ///
    /// Unreadable inputs are skipped; an unreadable mask leaves its cell empty.
    ///
    /// # Errors
    /// - Invalid mask sets
    /// - Output directory cannot be created
    /// - Rendered images or the HTML page cannot be written
    pub fn generate(&self) -> Result<ReportSummary> {
        let entries = self.discover_entries()?;
        let results_dir = self.results_dir();
        ImageIOService::ensure_dir(&results_dir)?;

        info!(
            entries = entries.len(),
            sets = self.mask_sets.len(),
            "Generating comparison report"
        );

        let mut fragments = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for entry in &entries {
            info!("Processing {}...", entry.name);

            let input = match ImageIOService::load_image(&entry.input) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping {}: {e}", entry.name);
                    skipped += 1;
                    continue;
                },
            };
            ImageIOService::save_rgb(&input, results_dir.join(format!("{}_input.jpg", entry.name)))?;

            let mut rendered_labels = Vec::with_capacity(self.mask_sets.len());
            for (set, mask_path) in self.mask_sets.iter().zip(&entry.masks) {
                let mask = match ImageIOService::load_dynamic(mask_path) {
                    Ok(mask) => mask.to_luma8(),
                    Err(e) => {
                        warn!("Skipping {} overlay for {}: {e}", set.label, entry.name);
                        rendered_labels.push(None);
                        continue;
                    },
                };
                let overlay = overlay_mask(&input, &mask);
                ImageIOService::save_rgb(
                    &overlay,
                    results_dir.join(format!("{}_{}.jpg", entry.name, set.label)),
                )?;
                rendered_labels.push(Some(set.label.as_str()));
            }

            fragments.push(render_entry(&entry.name, &rendered_labels));
        }

        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let html = self.render_html(&fragments, &generated_at);
        let html_path = self.html_path();
        std::fs::write(&html_path, html)
            .map_err(|e| MaskGenError::write(&html_path, e.to_string()))?;

        info!(path = %html_path.display(), rendered = fragments.len(), skipped, "Report written");
        Ok(ReportSummary {
            html_path,
            rendered: fragments.len(),
            skipped,
        })
    }

    fn render_html(&self, fragments: &[String], generated_at: &str) -> String {
        let title = escape_html(&self.title);
        let mut header = String::from("<div class=\"row header\"><div>input</div>");
        for set in &self.mask_sets {
            let _ = write!(header, "<div>{}</div>", escape_html(&set.label));
        }
        header.push_str("</div>");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8" />
    <title>{title}</title>
    <style>
        body {{ font-family: sans-serif; padding: 20px; }}
        img {{ max-width: 400px; margin-right: 20px; }}
        .row {{ display: flex; gap: 20px; align-items: flex-start; }}
        .header div {{ width: 400px; font-weight: bold; }}
        .entry {{ margin-bottom: 40px; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>Generated {generated_at}</p>
    {header}
{body}
</body>
</html>
"#,
            body = fragments.join("\n")
        )
    }
}

fn render_entry(name: &str, labels: &[Option<&str>]) -> String {
    let name_html = escape_html(name);
    let mut cells = format!(
        "            <div>\n                <img src=\"results/{name_html}_input.jpg\" />\n            </div>\n"
    );
    for label in labels {
        match label {
            Some(label) => {
                let _ = write!(
                    cells,
                    "            <div>\n                <img src=\"results/{name_html}_{label}.jpg\" />\n            </div>\n"
                );
            },
            None => cells.push_str("            <div></div>\n"),
        }
    }
    format!(
        "    <div class=\"entry\">\n        <h3>{name_html}</h3>\n        <div class=\"row\">\n{cells}        </div>\n    </div>"
    )
}

fn is_jpeg_name(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_input(dir: &Path, name: &str) {
        RgbImage::from_pixel(16, 12, Rgb([180, 180, 180]))
            .save_with_format(dir.join(name), ImageFormat::Jpeg)
            .unwrap();
    }

    fn write_mask(dir: &Path, stem: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(4, 4, Luma([255]));
        mask.save(dir.join(format!("{stem}.png"))).unwrap();
    }

    #[test]
    fn test_mask_set_parse() {
        let set = MaskSet::parse("v1.2.0=masks/v1.2.0").unwrap();
        assert_eq!(set.label, "v1.2.0");
        assert_eq!(set.dir, PathBuf::from("masks/v1.2.0"));

        assert!(MaskSet::parse("no-separator").is_err());
        assert!(MaskSet::parse("=masks").is_err());
        assert!(MaskSet::parse("label=").is_err());
        assert!(MaskSet::parse("bad/label=masks").is_err());
        assert!("ok=dir".parse::<MaskSet>().is_ok());
    }

    #[test]
    fn test_discover_requires_mask_in_every_set() {
        let root = tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        for name in ["b.jpg", "a.JPEG", "c.jpg", "d.png"] {
            write_input(&images, name);
        }
        let set_a = root.path().join("masks_a");
        let set_b = root.path().join("masks_b");
        for stem in ["a", "b", "c", "d"] {
            write_mask(&set_a, stem);
        }
        for stem in ["a", "b", "d"] {
            write_mask(&set_b, stem);
        }

        let report = ComparisonReport::new(&images, root.path().join("out"))
            .with_mask_set(MaskSet::parse(&format!("A={}", set_a.display())).unwrap())
            .with_mask_set(MaskSet::parse(&format!("B={}", set_b.display())).unwrap());

        let names: Vec<String> = report
            .discover_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_generate_writes_images_and_html() {
        let root = tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        write_input(&images, "0001.jpg");
        std::fs::write(images.join("0002.jpg"), b"corrupt").unwrap();
        let masks = root.path().join("masks");
        write_mask(&masks, "0001");
        write_mask(&masks, "0002");

        let output = root.path().join("reports");
        let summary = ComparisonReport::new(&images, &output)
            .with_mask_set(MaskSet {
                label: "current".into(),
                dir: masks,
            })
            .title("Masks <v2>")
            .generate()
            .unwrap();

        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.html_path, output.join("segmentation-comparison.html"));
        assert!(output.join("results/0001_input.jpg").is_file());
        assert!(output.join("results/0001_current.jpg").is_file());
        assert!(!output.join("results/0002_input.jpg").exists());

        let html = std::fs::read_to_string(&summary.html_path).unwrap();
        assert!(html.contains("Masks &lt;v2&gt;"));
        assert!(html.contains("results/0001_current.jpg"));
        assert!(!html.contains("0002"));
    }

    #[test]
    fn test_validation_errors() {
        let root = tempdir().unwrap();
        let empty = ComparisonReport::new(root.path(), root.path());
        assert!(matches!(empty.discover_entries(), Err(MaskGenError::Report(_))));

        let duplicate = ComparisonReport::new(root.path(), root.path())
            .with_mask_set(MaskSet::parse("a=x").unwrap())
            .with_mask_set(MaskSet::parse("a=y").unwrap());
        assert!(duplicate.discover_entries().is_err());

        let reserved = ComparisonReport::new(root.path(), root.path())
            .with_mask_set(MaskSet::parse("input=x").unwrap());
        assert!(reserved.discover_entries().is_err());
    }
}
