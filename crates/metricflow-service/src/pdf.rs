//! Minimal PDF writer for text-only reports.
//!
//! Produces a PDF 1.4 file of A4 pages using the built-in Helvetica font.
//! Coordinates are in millimetres from the top-left corner of the page.

use std::fmt::Write as _;

const PAGE_WIDTH_PT: f64 = 595.28;
const PAGE_HEIGHT_PT: f64 = 841.89;
const PT_PER_MM: f64 = 72.0 / 25.4;

/// A document under construction.
#[derive(Debug)]
pub struct PdfDocument {
    pages: Vec<String>,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// Start a document with one empty page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: vec![String::new()],
        }
    }

    /// Start a new page; subsequent text goes there.
    pub fn add_page(&mut self) {
        self.pages.push(String::new());
    }

    /// Draw `text` at (`x`, `y`) millimetres in `size` points.
    pub fn text(&mut self, x: f64, y: f64, size: f64, text: &str) {
        let x_pt = x * PT_PER_MM;
        let y_pt = PAGE_HEIGHT_PT - y * PT_PER_MM;
        if let Some(page) = self.pages.last_mut() {
            let _ = writeln!(
                page,
                "BT /F1 {size:.1} Tf {x_pt:.2} {y_pt:.2} Td ({}) Tj ET",
                escape(text)
            );
        }
    }

    /// Serialize the document.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        // Objects: 1 catalog, 2 page tree, 3 font, then (page, content) pairs.
        let page_ids: Vec<usize> = (0..self.pages.len()).map(|i| 4 + i * 2).collect();

        let mut objects: Vec<String> = Vec::with_capacity(3 + self.pages.len() * 2);
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.pages.len()
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );

        for (content, page_id) in self.pages.iter().zip(&page_ids) {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH_PT} {PAGE_HEIGHT_PT}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page_id + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}endstream",
                content.len()
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
        }

        let xref_at = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        );

        out.into_bytes()
    }
}

/// Escape text for a PDF string literal.
///
/// Output is restricted to printable ASCII so byte offsets match character
/// offsets; anything else becomes `?`.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
