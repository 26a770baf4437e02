//! Extraction driver: identifiers, counters, report, failure handling.

mod common;

use common::{FAKE_JPEG, PdfBuilder, multi_page_pdf, single_jpeg_pdf};
use pluck_core::api::{
    CancelToken, ExtractConfig, ImageSink, MemorySink, PutOutcome, extract, extract_document,
    list_images, open_document,
};
use pluck_core::error::PdfError;
use pluck_core::filter::NativeType;

/// Records every call, stores nothing.
#[derive(Default)]
struct Recorder {
    calls: Vec<(String, Vec<u8>)>,
    accept: bool,
}

impl ImageSink for Recorder {
    fn put(&mut self, identifier: &str, bytes: &[u8]) -> PutOutcome {
        self.calls.push((identifier.to_string(), bytes.to_vec()));
        self.accept.into()
    }
}

fn running_index(identifier: &str) -> usize {
    let stem = identifier.rsplit_once('.').expect("extension").0;
    stem.rsplit('_').next().expect("index").parse().expect("number")
}

#[test]
fn test_single_jpeg_page() {
    let mut sink = MemorySink::default();
    let report = extract(single_jpeg_pdf(), &ExtractConfig::default(), &mut sink).expect("extract");

    assert_eq!(report.count, 1);
    assert_eq!(report.written, 1);
    assert_eq!(report.pages_visited, 1);
    assert_eq!(sink.get("image_1_0.jpg"), Some(FAKE_JPEG));
}

#[test]
fn test_count_equals_sink_calls_and_indices_increase() {
    let mut sink = Recorder {
        accept: true,
        ..Default::default()
    };
    let report = extract(multi_page_pdf(5), &ExtractConfig::default(), &mut sink).expect("extract");
    assert_eq!(report.count, sink.calls.len());
    assert_eq!(report.count, 5);

    let indices: Vec<usize> = sink.calls.iter().map(|(id, _)| running_index(id)).collect();
    assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");

    let ids: Vec<&str> = sink.calls.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "image_1_0.raw",
            "image_2_1.raw",
            "image_3_2.raw",
            "image_4_3.raw",
            "image_5_4.raw"
        ]
    );
    assert_eq!(sink.calls[2].1, [3u8; 4]);
}

#[test]
fn test_declined_puts_still_advance_the_counter() {
    let mut sink = Recorder::default();
    let report = extract(multi_page_pdf(3), &ExtractConfig::default(), &mut sink).expect("extract");
    assert_eq!(report.count, 3);
    assert_eq!(report.written, 0);
    assert_eq!(report.skipped_existing, 3);
    assert_eq!(report.write_failed, 0);
    assert_eq!(running_index(&sink.calls[2].0), 2);
}

#[test]
fn test_prefix_and_start_index() {
    let config = ExtractConfig {
        prefix: ExtractConfig::prefix_from_path("/scans/brochure.pdf"),
        start_index: 10,
        ..Default::default()
    };
    let mut sink = MemorySink::default();
    extract(multi_page_pdf(2), &config, &mut sink).expect("extract");
    let ids: Vec<&str> = sink.identifiers().collect();
    assert_eq!(ids, ["brochure_1_10.raw", "brochure_2_11.raw"]);
}

#[test]
fn test_second_run_without_overwrite_writes_nothing() {
    let pdf = multi_page_pdf(3);
    let config = ExtractConfig::default();
    let mut sink = MemorySink::new(config.overwrite);

    let first = extract(&pdf, &config, &mut sink).expect("first run");
    let second = extract(&pdf, &config, &mut sink).expect("second run");

    assert_eq!(first.written, 3);
    assert_eq!(second.count, first.count);
    assert_eq!(second.written, 0);
    assert_eq!(second.skipped_existing, 3);
}

#[test]
fn test_encrypted_document_yields_nothing() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3])
        .page(3, "<< /XObject << /Im0 5 0 R >> >>", 4, b"/Im0 Do")
        .stream(5, "/Subtype /Image /Width 1 /Height 1 /Filter /DCTDecode", FAKE_JPEG)
        .obj(9, "<< /Filter /Standard /V 2 /R 3 >>")
        .trailer("/Encrypt 9 0 R")
        .build();
    let mut sink = Recorder::default();
    let report = extract(pdf, &ExtractConfig::default(), &mut sink).expect("not an error");
    assert!(report.encrypted);
    assert_eq!(report.count, 0);
    assert_eq!(report.pages_visited, 0);
    assert!(sink.calls.is_empty());
}

#[test]
fn test_malformed_document_fails_before_any_sink_call() {
    let mut pdf = single_jpeg_pdf();
    let pos = common::find(&pdf, b"\nxref\n").expect("xref") + 1;
    pdf[pos..pos + 4].copy_from_slice(b"xxxx");

    let mut sink = Recorder::default();
    let err = extract(&pdf, &ExtractConfig::default(), &mut sink).expect_err("structural");
    assert!(matches!(err, PdfError::MalformedDocument(_)));
    assert!(err.is_structural());
    assert!(sink.calls.is_empty());

    let config = ExtractConfig {
        recover_xref: true,
        ..Default::default()
    };
    let report = extract(&pdf, &config, &mut sink).expect("recovered");
    assert_eq!(report.count, 1);
}

#[test]
fn test_image_failures_are_summarised_not_returned() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3])
        .page(
            3,
            "<< /XObject << /Good 5 0 R /Bad 6 0 R /Short 7 0 R >> >>",
            4,
            b"/Bad Do /Good Do /Missing Do /Short Do Q junk",
        )
        .stream(5, "/Subtype /Image /Width 2 /Height 2 /Filter /DCTDecode", FAKE_JPEG)
        .stream(6, "/Subtype /Image /Width 2 /Height 2 /Filter /WeirdDecode", b"??")
        .stream(
            7,
            "/Subtype /Image /Width 8 /Height 8 /ColorSpace /DeviceGray /BitsPerComponent 8",
            b"tiny",
        )
        .build();
    let mut sink = MemorySink::default();
    let report = extract(pdf, &ExtractConfig::default(), &mut sink).expect("extract");

    assert_eq!(report.count, 1);
    // Bad and Short fail to decode, Missing does not resolve
    assert_eq!(report.images_failed, 3);
    assert_eq!(report.unbalanced_restores, 1);
    assert_eq!(report.operators_skipped, 1);
    assert_eq!(sink.identifiers().collect::<Vec<_>>(), ["image_1_0.jpg"]);
}

#[test]
fn test_bad_predictor_image_does_not_stop_the_next() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3])
        .page(
            3,
            "<< /XObject << /Im0 5 0 R /Im1 6 0 R >> >>",
            4,
            b"/Im1 Do /Im0 Do",
        )
        .stream(5, "/Subtype /Image /Width 2 /Height 2 /Filter /DCTDecode", FAKE_JPEG)
        .flate_stream(
            6,
            "/Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceGray /BitsPerComponent 8 /DecodeParms << /Predictor 2 /Columns 2305843009213693952 >>",
            &[1, 2, 3, 4],
        )
        .build();
    let mut sink = MemorySink::default();
    let report = extract(pdf, &ExtractConfig::default(), &mut sink).expect("extract");

    assert_eq!(report.count, 1);
    assert_eq!(report.images_failed, 1);
    assert_eq!(sink.identifiers().collect::<Vec<_>>(), ["image_1_0.jpg"]);
    assert_eq!(sink.get("image_1_0.jpg"), Some(FAKE_JPEG));
}

#[test]
fn test_shared_image_is_dispatched_per_paint() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3, 6])
        .page(3, "<< /XObject << /Im0 5 0 R >> >>", 4, b"/Im0 Do")
        .stream(5, "/Subtype /Image /Width 2 /Height 2 /Filter /DCTDecode", FAKE_JPEG)
        .obj(6, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /XObject << /Im0 5 0 R >> >> >>")
        .build();
    let doc = open_document(&pdf, &ExtractConfig::default()).expect("open");
    assert_eq!(doc.page_count(), 2);
    let mut sink = MemorySink::default();
    let report = extract_document(&doc, &ExtractConfig::default(), &mut sink).expect("extract");
    assert_eq!(report.count, 2);
    assert_eq!(
        sink.identifiers().collect::<Vec<_>>(),
        ["image_1_0.jpg", "image_2_1.jpg"]
    );
}

#[test]
fn test_cancelled_run_returns_partial_report() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let config = ExtractConfig {
        cancel: Some(cancel),
        ..Default::default()
    };
    let mut sink = MemorySink::default();
    let report = extract(multi_page_pdf(3), &config, &mut sink).expect("extract");
    assert!(report.cancelled);
    assert_eq!(report.count, 0);
    assert!(sink.is_empty());
}

#[test]
fn test_report_serializes_to_json() {
    let mut sink = MemorySink::default();
    let report = extract(single_jpeg_pdf(), &ExtractConfig::default(), &mut sink).expect("extract");
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["count"], 1);
    assert_eq!(json["written"], 1);
    assert_eq!(json["encrypted"], false);
}

#[test]
fn test_list_images_reports_metadata() {
    let listing = list_images(single_jpeg_pdf(), &ExtractConfig::default()).expect("list");
    assert_eq!(listing.len(), 1);
    let row = &listing[0];
    assert_eq!(row.page, 1);
    assert_eq!(row.index, 0);
    assert_eq!(row.name.as_deref(), Some("Im0"));
    assert_eq!(row.objid, Some(5));
    assert_eq!(row.native, NativeType::Jpeg);
    assert_eq!((row.width, row.height), (2, 2));
    assert_eq!(row.color.as_deref(), Some("rgb"));
    assert_eq!(row.components, Some(3));
    assert_eq!(row.filters, ["DCTDecode"]);
    assert_eq!(row.raw_size, FAKE_JPEG.len());
    assert_eq!(row.bbox, (10.0, 20.0, 110.0, 70.0));
    assert!(!row.inline);

    let json = serde_json::to_value(row).expect("json");
    assert_eq!(json["type"], "jpeg");
}
