//! Programmatic PDF fixtures for integration tests.
//!
//! Objects are emitted in id order with a classic xref table whose offsets
//! are computed from the bytes actually written.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

/// JPEG-looking bytes. DCT payloads pass through undecoded.
pub const FAKE_JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00\xff\xd9";

#[derive(Debug, Default, Clone)]
pub struct PdfBuilder {
    objects: BTreeMap<u32, Vec<u8>>,
    trailer: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add object `id` with a textual body (`<< ... >>`, `[...]`, `42`, ...).
    pub fn obj(mut self, id: u32, body: impl AsRef<str>) -> Self {
        self.objects.insert(id, body.as_ref().as_bytes().to_vec());
        self
    }

    /// Add stream object `id`; `/Length` is appended to `dict_entries`.
    pub fn stream(mut self, id: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {dict_entries} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(id, body);
        self
    }

    /// Add a Flate-compressed stream object.
    pub fn flate_stream(self, id: u32, dict_entries: &str, data: &[u8]) -> Self {
        let compressed = zlib(data);
        self.stream(id, &format!("{dict_entries} /Filter /FlateDecode"), &compressed)
    }

    /// Catalog as object 1 and a flat page tree as object 2.
    pub fn page_tree(self, page_ids: &[u32]) -> Self {
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();
        self.obj(1, "<< /Type /Catalog /Pages 2 0 R >>").obj(
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_ids.len()
            ),
        )
    }

    /// Page `id` under object 2 with its content in stream `content_id`.
    pub fn page(self, id: u32, resources: &str, content_id: u32, content: &[u8]) -> Self {
        self.obj(
            id,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources {resources} /Contents {content_id} 0 R >>"
            ),
        )
        .stream(content_id, "", content)
    }

    /// Extra trailer entries (besides `/Size` and `/Root`).
    pub fn trailer(mut self, entries: &str) -> Self {
        self.trailer = entries.to_string();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let mut offsets = BTreeMap::new();
        for (id, body) in &self.objects {
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = self.objects.keys().max().map_or(1, |max| max + 1);
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        for id in 0..size {
            match offsets.get(&id) {
                Some(offset) => out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root 1 0 R {} >>\nstartxref\n{xref_pos}\n%%EOF\n",
                self.trailer
            )
            .as_bytes(),
        );
        out
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

/// One page painting the JPEG XObject `/Im0`.
pub fn single_jpeg_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .page_tree(&[3])
        .page(
            3,
            "<< /XObject << /Im0 5 0 R >> >>",
            4,
            b"q 100 0 0 50 10 20 cm /Im0 Do Q",
        )
        .stream(
            5,
            "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode",
            FAKE_JPEG,
        )
        .build()
}

/// `pages` pages, each painting its own raw gray image whose samples are
/// all equal to the page number.
pub fn multi_page_pdf(pages: u32) -> Vec<u8> {
    let page_ids: Vec<u32> = (0..pages).map(|i| 10 + i * 3).collect();
    let mut builder = PdfBuilder::new().page_tree(&page_ids);
    for (i, &id) in page_ids.iter().enumerate() {
        let number = i as u8 + 1;
        builder = builder
            .page(
                id,
                &format!("<< /XObject << /Im1 {} 0 R >> >>", id + 2),
                id + 1,
                b"q 4 0 0 4 0 0 cm /Im1 Do Q",
            )
            .stream(
                id + 2,
                "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceGray /BitsPerComponent 8",
                &[number; 4],
            );
    }
    builder.build()
}

/// Byte offset of the first occurrence of `needle`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
