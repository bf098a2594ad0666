//! Turns staged page images into a single PDF.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};
use crate::pdf::PdfStreamWriter;

pub struct DocumentAssembler {
    default_dir: PathBuf,
}

impl DocumentAssembler {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    /// Writes `{output_dir}/{output_name}.pdf` with one page per image, in
    /// order. Every page takes the pixel size of the first image and each
    /// image is stretched to fill its page.
    ///
    /// A missing or read-only directory fails with
    /// [`CaptureError::WriteFailed`] and leaves no file behind.
    pub async fn create_pdf(
        &self,
        image_paths: &[PathBuf],
        output_name: &str,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf> {
        if image_paths.is_empty() {
            return Err(CaptureError::EmptyInput);
        }

        let dir = output_dir.unwrap_or(&self.default_dir).to_path_buf();
        let pdf_path = dir.join(format!("{}.pdf", output_name));
        let images = image_paths.to_vec();
        let target = pdf_path.clone();

        tokio::task::spawn_blocking(move || write_document(&images, &dir, &target)).await??;

        info!(path = %pdf_path.display(), pages = image_paths.len(), "pdf written");
        Ok(pdf_path)
    }
}

fn is_unwritable(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::NotFound
            | io::ErrorKind::ReadOnlyFilesystem
            | io::ErrorKind::NotADirectory
    )
}

fn write_document(image_paths: &[PathBuf], dir: &Path, pdf_path: &Path) -> Result<()> {
    let (page_width, page_height) = image::image_dimensions(&image_paths[0])?;
    debug!(page_width, page_height, "page size taken from first image");

    let file = File::create(pdf_path).map_err(|e| {
        if is_unwritable(e.kind()) {
            CaptureError::WriteFailed {
                path: dir.to_path_buf(),
                source: e,
            }
        } else {
            CaptureError::Io(e)
        }
    })?;

    let result = stream_pages(BufWriter::new(file), image_paths, page_width, page_height);
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(pdf_path) {
            warn!(path = %pdf_path.display(), error = %e, "failed to remove partial pdf");
        }
    }
    result
}

fn stream_pages(
    sink: BufWriter<File>,
    image_paths: &[PathBuf],
    page_width: u32,
    page_height: u32,
) -> Result<()> {
    let mut writer = PdfStreamWriter::new(sink)?;
    for path in image_paths {
        let page = image::open(path)?.to_rgb8();
        writer.add_image_page(page_width, page_height, &page)?;
        debug!(path = %path.display(), page = writer.page_count(), "page appended");
    }

    let created = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    let sink = writer.finish(&created)?;
    sink.into_inner()
        .map_err(|e| CaptureError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}
