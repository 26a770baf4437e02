//! End-to-end extraction benchmarks on generated documents.

use std::collections::BTreeMap;
use std::hint::black_box;
use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::ZlibEncoder;

use pluck_core::api::{
    ExtractConfig, ImageSink, PutOutcome, extract_document, list_document_images,
};
use pluck_core::document::PDFDocument;

/// Counts bytes, stores nothing.
#[derive(Default)]
struct NullSink {
    bytes: usize,
}

impl ImageSink for NullSink {
    fn put(&mut self, _identifier: &str, bytes: &[u8]) -> PutOutcome {
        self.bytes += bytes.len();
        PutOutcome::Written
    }
}

/// `pages` pages, each with a 256x256 Flate gray image painted twice and a
/// small form wrapping a JPEG.
fn generate_pdf(pages: usize) -> Vec<u8> {
    let mut objects: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    let samples: Vec<u8> = (0..256 * 256).map(|i| (i % 251) as u8).collect();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&samples).expect("zlib write");
    let image = encoder.finish().expect("zlib finish");
    let jpeg = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00\xff\xd9";

    let stream = |dict: &str, data: &[u8]| {
        let mut body = format!("<< {dict} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        body
    };

    objects.insert(
        3,
        stream(
            "/Subtype /Image /Width 256 /Height 256 /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode",
            &image,
        ),
    );
    objects.insert(
        4,
        stream("/Subtype /Image /Width 1 /Height 1 /Filter /DCTDecode", jpeg),
    );
    objects.insert(
        5,
        stream(
            "/Subtype /Form /BBox [0 0 1 1] /Resources << /XObject << /J 4 0 R >> >>",
            b"q 0.5 0 0 0.5 0 0 cm /J Do Q",
        ),
    );

    let content = b"q 1 0 0 RG 0 0 10 10 re S Q q 256 0 0 256 0 0 cm /Im0 Do Q q 128 0 0 128 300 0 cm /Im0 Do Q /Fm0 Do";
    let mut kids = Vec::with_capacity(pages);
    for i in 0..pages {
        let page_id = 10 + i * 2;
        kids.push(format!("{page_id} 0 R"));
        objects.insert(
            page_id,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /XObject << /Im0 3 0 R /Fm0 5 0 R >> >> /Contents {} 0 R >>",
                page_id + 1
            )
            .into_bytes(),
        );
        objects.insert(page_id + 1, stream("", content));
    }
    objects.insert(1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.insert(
        2,
        format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")).into_bytes(),
    );

    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = BTreeMap::new();
    for (id, body) in &objects {
        offsets.insert(*id, out.len());
        out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let size = objects.keys().max().map_or(1, |max| max + 1);
    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    for id in 0..size {
        match offsets.get(&id) {
            Some(offset) => out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes()),
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_pos}\n%%EOF\n").as_bytes(),
    );
    out
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_open");
    for pages in [10, 200] {
        let pdf = generate_pdf(pages);
        group.throughput(Throughput::Bytes(pdf.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pages), &pdf, |b, pdf| {
            b.iter(|| {
                let doc = PDFDocument::new(black_box(pdf)).expect("open");
                black_box(doc.page_count())
            })
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_document");
    group.sample_size(20);
    for pages in [10, 200] {
        let pdf = generate_pdf(pages);
        let doc = PDFDocument::new(&pdf).expect("open");
        group.throughput(Throughput::Elements(pages as u64));
        for threads in [1, 4] {
            let config = ExtractConfig {
                threads,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("threads_{threads}"), pages),
                &config,
                |b, config| {
                    b.iter(|| {
                        let mut sink = NullSink::default();
                        let report = extract_document(&doc, config, &mut sink).expect("extract");
                        black_box((report.count, sink.bytes))
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_list");
    let pdf = generate_pdf(200);
    let doc = PDFDocument::new(&pdf).expect("open");
    let config = ExtractConfig::default();
    group.throughput(Throughput::Elements(200));
    group.bench_function("200", |b| {
        b.iter(|| black_box(list_document_images(&doc, &config).len()))
    });
    group.finish();
}

criterion_group!(benches, bench_open, bench_extract, bench_list);
criterion_main!(benches);
