//! Page image rendering through poppler's `pdftoppm`.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use ledgerscan_core::{Error, ImageFormat, Result};

pub const DEFAULT_RENDERER: &str = "pdftoppm";

/// Renders every page of a PDF to `{stem}_page-{n:04}.{ext}` images.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    program: String,
    dpi: u32,
    format: ImageFormat,
}

impl PageRenderer {
    pub fn new(dpi: u32, format: ImageFormat) -> Self {
        Self {
            program: DEFAULT_RENDERER.to_string(),
            dpi,
            format,
        }
    }

    /// Use a different `pdftoppm` binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Render `pdf_path` into `out_dir`, returning image paths in page order.
    pub fn render(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let stem = pdf_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("no file stem in {}", pdf_path.display())))?;

        // pdftoppm zero-pads page numbers by page count, so render into a
        // scratch directory and rename afterwards.
        let scratch = tempfile::Builder::new()
            .prefix(".render-")
            .tempdir_in(out_dir)?;
        let prefix = scratch.path().join("page");
        let format_flag = match self.format {
            ImageFormat::Jpg => "-jpeg",
            ImageFormat::Png => "-png",
        };

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(format_flag)
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::Render(format!("{} not found on PATH", self.program)),
                _ => Error::Render(format!("failed to run {}: {}", self.program, e)),
            })?;
        if !output.status.success() {
            return Err(Error::Render(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let ext = self.format.extension();
        let mut rendered: Vec<(u32, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(scratch.path())? {
            let path = entry?.path();
            let number = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| page_number(n, ext));
            match number {
                Some(n) => rendered.push((n, path)),
                None => debug!("Ignoring unexpected renderer output {}", path.display()),
            }
        }
        rendered.sort_by_key(|(n, _)| *n);

        let mut images = Vec::with_capacity(rendered.len());
        for (n, path) in rendered {
            let target = out_dir.join(image_name(stem, n, ext));
            std::fs::rename(&path, &target)?;
            info!("{} - page {} rendered to {}", stem, n, target.display());
            images.push(target);
        }
        Ok(images)
    }
}

/// Turns a PDF into one image per page.
pub trait PageRasterizer: Send + Sync {
    /// Render `pdf_path` into `out_dir`, returning image paths in page order.
    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

impl PageRasterizer for PageRenderer {
    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        self.render(pdf_path, out_dir)
    }
}

/// File name of the image of 1-based page `n`.
pub fn image_name(stem: &str, n: u32, ext: &str) -> String {
    format!("{}_page-{:04}.{}", stem, n, ext)
}

/// Parse the page number out of pdftoppm's `page-<n>.<ext>` output names.
fn page_number(file_name: &str, ext: &str) -> Option<u32> {
    let base = file_name.strip_suffix(ext)?.strip_suffix('.')?;
    let (_, number) = base.rsplit_once('-')?;
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number("page-1.jpg", "jpg"), Some(1));
        assert_eq!(page_number("page-012.png", "png"), Some(12));
        assert_eq!(page_number("page-1.png", "jpg"), None);
        assert_eq!(page_number("notes.txt", "jpg"), None);
    }

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("releve", 3, "jpg"), "releve_page-0003.jpg");
    }

    #[test]
    fn test_missing_program_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let renderer = PageRenderer::new(72, ImageFormat::Png).with_program("ledgerscan-no-such-renderer");
        let err = renderer.render(&pdf, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }
}
