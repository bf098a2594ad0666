//! Single-pass PDF emitter for image-only documents.
//!
//! Objects are written to the sink as soon as a page is added; only their
//! byte offsets are kept for the cross-reference table. Pixel data is
//! deflated straight into the sink, so memory use is bounded by the page
//! currently being written.
//!
//! Object numbers 1, 2 and 3 are reserved for the catalog, the page tree and
//! the info dictionary, which are written by [`PdfStreamWriter::finish`].

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbImage;
use std::io::{self, Write};

use crate::constants::pdf::PRODUCER;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const INFO_ID: usize = 3;

/// Counts bytes passed through to the inner writer.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct PdfStreamWriter<W: Write> {
    out: CountingWriter<W>,
    /// Byte offset of each object, indexed by object number - 1.
    offsets: Vec<Option<u64>>,
    pages: Vec<usize>,
}

impl<W: Write> PdfStreamWriter<W> {
    pub fn new(inner: W) -> io::Result<Self> {
        let mut out = CountingWriter { inner, written: 0 };
        out.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;
        Ok(Self {
            out,
            offsets: vec![None; INFO_ID],
            pages: Vec::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn allocate(&mut self) -> usize {
        self.offsets.push(None);
        self.offsets.len()
    }

    fn begin_object(&mut self, id: usize) -> io::Result<()> {
        self.offsets[id - 1] = Some(self.out.written);
        write!(self.out, "{} 0 obj\n", id)
    }

    fn write_object(&mut self, id: usize, body: &str) -> io::Result<()> {
        self.begin_object(id)?;
        write!(self.out, "{}\nendobj\n", body)
    }

    /// Appends a page of `page_width`x`page_height` units with `image`
    /// stretched to cover it exactly.
    pub fn add_image_page(
        &mut self,
        page_width: u32,
        page_height: u32,
        image: &RgbImage,
    ) -> io::Result<()> {
        let image_id = self.allocate();
        let length_id = self.allocate();
        let content_id = self.allocate();
        let page_id = self.allocate();

        self.begin_object(image_id)?;
        write!(
            self.out,
            "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /FlateDecode /Length {} 0 R >>\nstream\n",
            image.width(),
            image.height(),
            length_id
        )?;
        let start = self.out.written;
        let mut encoder = ZlibEncoder::new(&mut self.out, Compression::default());
        encoder.write_all(image.as_raw())?;
        encoder.finish()?;
        let length = self.out.written - start;
        self.out.write_all(b"\nendstream\nendobj\n")?;

        self.write_object(length_id, &length.to_string())?;

        let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", page_width, page_height);
        self.write_object(
            content_id,
            &format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ),
        )?;

        self.write_object(
            page_id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /XObject << /Im0 {} 0 R >> >> /Contents {} 0 R >>",
                PAGES_ID, page_width, page_height, image_id, content_id
            ),
        )?;

        self.pages.push(page_id);
        Ok(())
    }

    /// Writes the page tree, catalog, info dictionary and cross-reference
    /// table, and returns the inner writer.
    pub fn finish(mut self, creation_date: &str) -> io::Result<W> {
        let kids: Vec<String> = self.pages.iter().map(|id| format!("{} 0 R", id)).collect();
        self.write_object(
            PAGES_ID,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                self.pages.len()
            ),
        )?;
        self.write_object(
            CATALOG_ID,
            &format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID),
        )?;
        self.write_object(
            INFO_ID,
            &format!(
                "<< /Producer ({}) /CreationDate (D:{}) >>",
                PRODUCER, creation_date
            ),
        )?;

        let xref_offset = self.out.written;
        let size = self.offsets.len() + 1;
        write!(self.out, "xref\n0 {}\n0000000000 65535 f \n", size)?;
        for offset in &self.offsets {
            match offset {
                Some(offset) => write!(self.out, "{:010} 00000 n \n", offset)?,
                None => {
                    return Err(io::Error::other("pdf object allocated but never written"));
                }
            }
        }
        write!(
            self.out,
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, CATALOG_ID, INFO_ID, xref_offset
        )?;
        self.out.flush()?;
        Ok(self.out.inner)
    }
}
