//! Text extraction and search over real PDF structures.

mod common;

use common::*;
use expunge::{find_matches, ExpungeError, TextExtractor};

#[test]
fn test_single_line_text_and_runs() {
    let bytes = letter_with_lines(&["Account: 12345, Contact: 12345"]);
    let extracted = TextExtractor::extract(&bytes).unwrap();

    assert_eq!(extracted.page_count(), 1);
    assert_eq!(extracted.pages()[0].text, "Account: 12345, Contact: 12345");

    let runs: Vec<_> = extracted.runs().collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].page, 1);
    assert_eq!(runs[0].font, "F1");
    assert_eq!(runs[0].font_size, 11.0);
    assert!((runs[0].x - 72.0).abs() < 1e-6);
    assert!((runs[0].height - 11.0).abs() < 1e-6);
}

#[test]
fn test_lines_are_separated() {
    let bytes = letter_with_lines(&["first line", "second line"]);
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "first line\nsecond line");
    assert_eq!(extracted.pages()[0].runs.len(), 2);
}

#[test]
fn test_text_split_across_show_operators_is_found() {
    let content = split_line(72.0, 700.0, 12.0, &["Ref", "erence: 98", "765"]);
    let bytes = PdfFixture::new().with_page(&content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();

    assert_eq!(extracted.pages()[0].text, "Reference: 98765");
    let matches = find_matches(extracted.pages(), "98765");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].context, "Reference: 98765");
}

#[test]
fn test_kerning_does_not_split_words() {
    let content = "BT /F1 12 Tf 72 700 Td [(Wo) 80 (rld) -30 (wide)] TJ ET";
    let bytes = PdfFixture::new().with_page(content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Worldwide");
    assert_eq!(find_matches(extracted.pages(), "World").len(), 1);
}

#[test]
fn test_positioning_gap_reads_as_space() {
    let content = "BT /F1 12 Tf 72 700 Td [(Hello) -600 (there)] TJ ET";
    let bytes = PdfFixture::new().with_page(content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Hello there");
    assert_eq!(find_matches(extracted.pages(), "Hello there").len(), 1);
}

#[test]
fn test_compressed_and_fragmented_contents() {
    let bytes = PdfFixture::new()
        .with_fragmented_page(&[
            "BT /F1 12 Tf 72 700 Td (Split) Tj",
            " ( across) Tj ( streams) Tj ET",
        ])
        .compressed()
        .build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Split across streams");
}

#[test]
fn test_courier_uses_monospace_metrics() {
    let content = "BT /F2 10 Tf 100 600 Td (iiii) Tj ET";
    let bytes = PdfFixture::new().with_page(content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    let run = &extracted.pages()[0].runs[0];
    assert!((run.width - 24.0).abs() < 1e-6);
    assert_eq!(run.font, "F2");
}

#[test]
fn test_multi_page_matches_are_ordered() {
    let bytes = PdfFixture::new()
        .with_page(&format!(
            "{}{}",
            text_line(300.0, 500.0, 12.0, "key"),
            text_line(72.0, 700.0, 12.0, "key")
        ))
        .with_page(&text_line(72.0, 700.0, 12.0, "key and key"))
        .build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    let matches = find_matches(extracted.pages(), "key");

    let order: Vec<(u32, i64, i64)> = matches
        .iter()
        .map(|m| (m.page, m.y.round() as i64, m.x.round() as i64))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    assert_eq!(matches.len(), 4);
    // the line drawn second sits higher on the page, so it comes first
    assert!((matches[0].x - 72.0).abs() < 1e-6);
    assert_eq!(matches[2].page, 2);
}

#[test]
fn test_display_coordinates_on_unrotated_page() {
    let bytes = letter_with_lines(&["needle"]);
    let extracted = TextExtractor::extract(&bytes).unwrap();
    let m = &find_matches(extracted.pages(), "needle")[0];
    // glyph boxes run from 0.2em below to 0.8em above the baseline at 720
    assert!((m.x - 72.0).abs() < 1e-6);
    assert!((m.y - (792.0 - 728.8)).abs() < 1e-6);
    assert!((m.height - 11.0).abs() < 1e-6);
}

#[test]
fn test_rotated_page_reports_display_coordinates() {
    let bytes = PdfFixture::new()
        .with_rotated_page(90, &text_line(72.0, 720.0, 12.0, "Rotated secret"))
        .build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].geometry.rotation, 90);

    let m = &find_matches(extracted.pages(), "secret")[0];
    // user y becomes display x, user x becomes display y
    assert!((m.x - 717.6).abs() < 1e-6);
    assert!(m.y > 72.0 && m.y < 200.0);
    assert!((m.width - 12.0).abs() < 1e-6);
    assert!(m.height > m.width);
}

#[test]
fn test_printpdf_document_is_searchable() {
    let bytes = printpdf_document("Invoice 4471 for ACME").unwrap();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert!(extracted.text().contains("Invoice 4471"));
    assert_eq!(find_matches(extracted.pages(), "4471").len(), 1);
}

#[test]
fn test_extraction_is_deterministic() {
    let bytes = letter_with_lines(&["same input", "same output", "same input"]);
    let first = find_matches(TextExtractor::extract(&bytes).unwrap().pages(), "same");
    let second = find_matches(TextExtractor::extract(&bytes).unwrap().pages(), "same");
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_encrypted_document_is_a_parse_error() {
    let bytes = PdfFixture::new()
        .with_page(&text_line(72.0, 700.0, 12.0, "hidden"))
        .encrypted()
        .build();
    let err = TextExtractor::extract(&bytes).err().unwrap();
    assert!(matches!(err, ExpungeError::DocumentParse { .. }));
}

#[test]
fn test_garbage_is_a_parse_error() {
    for bytes in [&b""[..], b"%PDF-1.4\nthis is not a pdf", b"\x00\x01\x02"] {
        let err = TextExtractor::extract(bytes).err().unwrap();
        assert!(err.is_document_error(), "unexpected error: {}", err);
    }
}

#[test]
fn test_page_without_text() {
    let bytes = PdfFixture::new().with_page("0 0 m 100 100 l S").build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "");
    assert!(find_matches(extracted.pages(), "x").is_empty());
}

#[test]
fn test_text_after_binary_inline_image_is_found() {
    let content = "q 10 0 0 10 72 720 cm BI /W 1 /H 1 /BPC 8 /CS /G ID \x7f EI Q \
                   BT /F1 12 Tf 72 700 Td (Secret 42) Tj ET";
    let bytes = PdfFixture::new().with_page(content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Secret 42");
    assert_eq!(find_matches(extracted.pages(), "Secret 42").len(), 1);
}

#[test]
fn test_unreadable_page_content_is_a_parse_error() {
    let bytes = PdfFixture::new()
        .with_page(&text_line(72.0, 700.0, 12.0, "first page"))
        .with_page("BT /F1 12 Tf 72 700 Td (never closed Tj ET")
        .build();
    let err = TextExtractor::extract(&bytes).err().unwrap();
    assert!(matches!(err, ExpungeError::DocumentParse { page: Some(2), .. }));
}

#[test]
fn test_text_inside_form_xobject_is_found() {
    let bytes = PdfFixture::new()
        .with_form_matrix(
            &text_line(72.0, 600.0, 12.0, "SSN 123-45-6789"),
            [1.0, 0.0, 0.0, 1.0, 0.0, -100.0],
        )
        .with_page(&format!("{}q /Fm0 Do Q", text_line(72.0, 700.0, 12.0, "Employee")))
        .build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Employee\nSSN 123-45-6789");

    let m = &find_matches(extracted.pages(), "123-45-6789")[0];
    // baseline 600 moved down by the form matrix to 500, box top 0.8em above
    assert!((m.y - (792.0 - 509.6)).abs() < 1e-6);
    assert!(m.x > 72.0);
}

#[test]
fn test_mixed_font_sizes_on_one_line_stay_in_reading_order() {
    let content = "BT /F1 12 Tf 72 700 Td (key) Tj /F1 30 Tf ( key) Tj /F1 12 Tf ( key) Tj ET";
    let bytes = PdfFixture::new().with_page(content).build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    let matches = find_matches(extracted.pages(), "key");

    assert_eq!(matches.len(), 3);
    assert!(matches[1].y < matches[0].y, "the larger match reaches higher");
    assert!(matches[0].x < matches[1].x);
    assert!(matches[1].x < matches[2].x);
}

#[test]
fn test_type0_font_with_two_byte_codes() {
    let bytes = PdfFixture::new()
        .with_page(&type0_line(72.0, 700.0, 12.0, "Card 4111 ok"))
        .build();
    let extracted = TextExtractor::extract(&bytes).unwrap();
    assert_eq!(extracted.pages()[0].text, "Card 4111 ok");
    assert_eq!(extracted.pages()[0].runs[0].font, "F3");

    let m = &find_matches(extracted.pages(), "4111")[0];
    // DW 600: each code advances 0.6em
    assert!((m.x - (72.0 + 5.0 * 7.2)).abs() < 1e-6);
    assert!((m.width - 4.0 * 7.2).abs() < 1e-6);
}
