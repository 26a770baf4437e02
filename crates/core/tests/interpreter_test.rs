//! Content stream interpretation: image events, forms, graphics state.

mod common;

use common::{FAKE_JPEG, PdfBuilder};
use pluck_core::api::CancelToken;
use pluck_core::document::PDFDocument;
use pluck_core::interp::{ImageEvent, InterpreterOptions, PageDiagnostics, page_images};

const JPEG_DICT: &str =
    "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode";

fn run(pdf: &[u8], options: InterpreterOptions) -> (Vec<ImageEvent>, PageDiagnostics) {
    let doc = PDFDocument::new(pdf).expect("open");
    let page = doc.page(1).expect("page");
    let mut images = page_images(&doc, &page, options);
    let events: Vec<ImageEvent> = images.by_ref().collect();
    (events, images.diagnostics())
}

fn run_default(pdf: &[u8]) -> (Vec<ImageEvent>, PageDiagnostics) {
    run(pdf, InterpreterOptions::default())
}

/// Page with `/Im0` (object 5) and `/Fm0` (object 6) in its resources.
fn page_with(content: &[u8]) -> PdfBuilder {
    PdfBuilder::new()
        .page_tree(&[3])
        .page(
            3,
            "<< /XObject << /Im0 5 0 R /Fm0 6 0 R >> >>",
            4,
            content,
        )
        .stream(5, JPEG_DICT, FAKE_JPEG)
}

#[test]
fn test_cm_composes_and_q_restores() {
    let pdf = page_with(b"q 2 0 0 2 0 0 cm 1 0 0 1 10 10 cm /Im0 Do Q /Im0 Do")
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].ctm, (2.0, 0.0, 0.0, 2.0, 20.0, 20.0));
    assert_eq!(events[0].bbox(), (20.0, 20.0, 22.0, 22.0));
    assert_eq!(events[1].ctm, (1.0, 0.0, 0.0, 1.0, 0.0, 0.0));
    assert_eq!(events[0].name.as_deref(), Some("Im0"));
    assert_eq!(events[0].page, 1);
    assert_eq!(diag, PageDiagnostics::default());
}

#[test]
fn test_image_inside_nested_form_is_attributed_to_page() {
    let pdf = page_with(b"q 2 0 0 2 0 0 cm /Fm0 Do Q")
        .stream(
            6,
            "/Type /XObject /Subtype /Form /BBox [0 0 10 10] /Matrix [1 0 0 1 5 5] /Resources << /XObject << /Fm1 7 0 R >> >>",
            b"/Fm1 Do",
        )
        .stream(
            7,
            "/Type /XObject /Subtype /Form /BBox [0 0 10 10] /Resources << /XObject << /Inner 8 0 R >> >>",
            b"q 3 0 0 3 0 0 cm /Inner Do Q",
        )
        .stream(8, JPEG_DICT, FAKE_JPEG)
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.page, 1);
    assert_eq!(event.name.as_deref(), Some("Inner"));
    assert_eq!(event.form_depth, 2);
    assert_eq!(event.image.objid, Some(8));
    assert_eq!(event.ctm, (6.0, 0.0, 0.0, 6.0, 10.0, 10.0));
    assert_eq!(diag.depth_limited, 0);
}

#[test]
fn test_form_without_resources_uses_enclosing_scope() {
    let pdf = page_with(b"/Fm0 Do")
        .stream(6, "/Type /XObject /Subtype /Form /BBox [0 0 1 1]", b"/Im0 Do")
        .build();
    let (events, _) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].image.objid, Some(5));
}

#[test]
fn test_form_resources_shadow_page_resources() {
    let pdf = page_with(b"/Fm0 Do /Im0 Do")
        .stream(
            6,
            "/Type /XObject /Subtype /Form /BBox [0 0 1 1] /Resources << /XObject << /Im0 9 0 R >> >>",
            b"/Im0 Do",
        )
        .stream(9, JPEG_DICT, b"\xff\xd8other\xff\xd9")
        .build();
    let (events, _) = run_default(&pdf);
    let ids: Vec<_> = events.iter().map(|e| e.image.objid).collect();
    assert_eq!(ids, [Some(9), Some(5)]);
}

#[test]
fn test_self_referential_form_terminates() {
    let pdf = page_with(b"/Fm0 Do /Im0 Do")
        .stream(
            6,
            "/Type /XObject /Subtype /Form /BBox [0 0 1 1] /Resources << /XObject << /Fm0 6 0 R >> >>",
            b"/Fm0 Do",
        )
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(diag.depth_limited, 1);
}

#[test]
fn test_form_depth_bound_applies() {
    // Fm0 -> 10 -> 11 -> 12, image at the bottom
    let pdf = page_with(b"/Fm0 Do")
        .stream(
            6,
            "/Type /XObject /Subtype /Form /Resources << /XObject << /F 10 0 R >> >>",
            b"/F Do",
        )
        .stream(
            10,
            "/Type /XObject /Subtype /Form /Resources << /XObject << /F 11 0 R >> >>",
            b"/F Do",
        )
        .stream(
            11,
            "/Type /XObject /Subtype /Form /Resources << /XObject << /F 12 0 R >> >>",
            b"/F Do",
        )
        .stream(
            12,
            "/Type /XObject /Subtype /Form /Resources << /XObject << /I 5 0 R >> >>",
            b"/I Do",
        )
        .build();

    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].form_depth, 4);

    let shallow = InterpreterOptions {
        max_form_depth: 2,
        ..Default::default()
    };
    let (events, diag_shallow) = run(&pdf, shallow);
    assert!(events.is_empty());
    assert_eq!(diag_shallow.depth_limited, 1);
    assert_eq!(diag.depth_limited, 0);
}

#[test]
fn test_unbalanced_restore_is_counted_and_tolerated() {
    let pdf = page_with(b"Q 2 0 0 2 0 0 cm Q /Im0 Do").build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(diag.unbalanced_restores, 2);
    // the second Q resets to the page's initial state
    assert_eq!(events[0].ctm, (1.0, 0.0, 0.0, 1.0, 0.0, 0.0));
}

#[test]
fn test_form_cannot_restore_callers_state() {
    let pdf = page_with(b"q 2 0 0 2 0 0 cm /Fm0 Do /Im0 Do Q")
        .stream(
            6,
            "/Type /XObject /Subtype /Form /BBox [0 0 1 1]",
            b"Q Q 5 0 0 5 0 0 cm",
        )
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(diag.unbalanced_restores, 2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ctm, (2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
}

#[test]
fn test_inline_image_event() {
    let pdf = page_with(b"q 2 0 0 1 0 0 cm BI /W 2 /H 1 /CS /G /BPC 8 ID \x01\x02 EI Q").build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(event.is_inline());
    assert!(event.image.inline);
    assert_eq!(event.image.width, 2);
    assert_eq!(event.image.raw(), b"\x01\x02");
    assert_eq!(event.ctm, (2.0, 0.0, 0.0, 1.0, 0.0, 0.0));
    assert_eq!(diag, PageDiagnostics::default());
}

#[test]
fn test_inline_image_named_color_space_is_looked_up() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3])
        .page(
            3,
            "<< /ColorSpace << /CS0 [/Indexed /DeviceRGB 1 <FF000000FF00>] >> >>",
            4,
            b"BI /W 2 /H 1 /CS /CS0 /BPC 8 ID \x00\x01 EI",
        )
        .build();
    let (events, _) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    let cs = events[0].image.color_space.as_ref().expect("colour space");
    assert_eq!(cs.label(), "index");
}

#[test]
fn test_local_failures_are_counted() {
    let pdf = page_with(b"/Missing Do 1 2 cm bogus_op BX also_bogus EX /Im0 Do")
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(diag.images_skipped, 1);
    // short cm and the unknown operator outside BX/EX
    assert_eq!(diag.operators_skipped, 2);
}

#[test]
fn test_non_image_xobject_is_skipped() {
    let pdf = page_with(b"/Fm0 Do /Im0 Do")
        .stream(6, "/Type /XObject /Subtype /PS", b"")
        .build();
    let (events, diag) = run_default(&pdf);
    assert_eq!(events.len(), 1);
    assert_eq!(diag.operators_skipped, 1);
}

#[test]
fn test_rotated_page_initial_ctm() {
    let pdf = PdfBuilder::new()
        .page_tree(&[3])
        .obj(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] /Rotate 90 /Resources << /XObject << /Im0 5 0 R >> >> /Contents 4 0 R >>",
        )
        .stream(4, "", b"/Im0 Do")
        .stream(5, JPEG_DICT, FAKE_JPEG)
        .build();
    let (events, _) = run_default(&pdf);
    assert_eq!(events[0].ctm, (0.0, -1.0, 1.0, 0.0, 0.0, 200.0));
}

#[test]
fn test_cancelled_token_stops_interpretation() {
    let pdf = page_with(b"/Im0 Do /Im0 Do").build();
    let cancel = CancelToken::new();
    cancel.cancel();
    let options = InterpreterOptions {
        cancel: Some(cancel),
        ..Default::default()
    };
    let (events, diag) = run(&pdf, options);
    assert!(events.is_empty());
    assert!(diag.cancelled);
}

#[test]
fn test_iteration_is_lazy() {
    let pdf = page_with(b"/Im0 Do /Missing Do /Im0 Do").build();
    let doc = PDFDocument::new(pdf).expect("open");
    let page = doc.page(1).expect("page");
    let mut images = page_images(&doc, &page, InterpreterOptions::default());
    assert!(images.next().is_some());
    assert_eq!(images.diagnostics().images_skipped, 0);
    assert!(images.next().is_some());
    assert_eq!(images.diagnostics().images_skipped, 1);
    assert!(images.next().is_none());
}
