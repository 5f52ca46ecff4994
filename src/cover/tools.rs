//! Image inspection and re-encoding.
//!
//! JPEG quality probing and optimisation shell out to ImageMagick's
//! `identify` and to `jpegoptim`; PNG to JPEG conversion happens in-process
//! with the `image` crate.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;

use crate::error::{Error, Result};
use crate::external::ToolRunner;

/// Image collaborator used by cover processing.
pub trait ImageTools {
    /// Compression quality the JPEG was saved with (100 = uncompressed).
    fn jpeg_quality(&self, path: &Path) -> Result<u8>;

    /// Recompress a JPEG in place, capping its quality.
    fn optimize_jpeg(&self, path: &Path, max_quality: u8) -> Result<()>;

    /// Write `source` (PNG) as a full-quality JPEG at `dest`.
    fn png_to_jpeg(&self, source: &Path, dest: &Path) -> Result<()>;
}

const IDENTIFY: &str = "identify";
const JPEGOPTIM: &str = "jpegoptim";

/// [`ImageTools`] backed by external programs and the `image` crate.
pub struct ExternalImageTools<'a> {
    runner: &'a ToolRunner,
}

impl<'a> ExternalImageTools<'a> {
    pub fn new(runner: &'a ToolRunner) -> Self {
        Self { runner }
    }
}

impl ImageTools for ExternalImageTools<'_> {
    fn jpeg_quality(&self, path: &Path) -> Result<u8> {
        let args = [
            OsString::from("-format"),
            OsString::from("%Q"),
            path.as_os_str().to_owned(),
        ];
        let output = self.runner.output(IDENTIFY, args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse()
            .map_err(|_| Error::tool(IDENTIFY, format!("unexpected quality {:?}", stdout.trim())))
    }

    fn optimize_jpeg(&self, path: &Path, max_quality: u8) -> Result<()> {
        let args = [
            OsString::from(format!("-m{max_quality}")),
            path.as_os_str().to_owned(),
        ];
        self.runner.output(JPEGOPTIM, args).map(|_| ())
    }

    fn png_to_jpeg(&self, source: &Path, dest: &Path) -> Result<()> {
        let image = image::open(source)
            .map_err(|e| Error::tool("png decoder", format!("{}: {e}", source.display())))?;
        let writer = BufWriter::new(File::create(dest)?);
        let mut encoder = JpegEncoder::new_with_quality(writer, 100);
        encoder
            .encode_image(&image.to_rgb8())
            .map_err(|e| Error::tool("jpeg encoder", format!("{}: {e}", dest.display())))
    }
}
