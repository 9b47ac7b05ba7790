use hwpedit::parser::record::{tag, RecordStream};
use hwpedit::parser::FileHeader;
use hwpedit::reader::cfb::write_container;
use hwpedit::utils::compression::compress_stream;
use hwpedit::validate::{validate_bytes, validate_hwp_bytes, CheckKind};
use hwpedit::writer::builder::{blank_doc_info, blank_section};

fn container_from_streams(doc_info: &[u8], section: &[u8]) -> Vec<u8> {
    let entries = vec![
        ("FileHeader".to_string(), FileHeader::new_default().to_bytes()),
        ("DocInfo".to_string(), compress_stream(doc_info).unwrap()),
        (
            "BodyText/Section0".to_string(),
            compress_stream(section).unwrap(),
        ),
    ];
    write_container(&entries).unwrap()
}

#[test]
fn clean_document_passes_every_check() {
    let bytes = container_from_streams(&blank_doc_info(1), &blank_section(&["검증"]));
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn corrupted_n_chars_is_reported() {
    let section = blank_section(&["정상 문단"]);
    let mut stream = RecordStream::new(section);

    // Flip nChars of the first top-level paragraph to 99999.
    let target = stream
        .records()
        .unwrap()
        .into_iter()
        .find(|r| r.tag_id == tag::PARA_HEADER && r.level == 0)
        .unwrap();
    stream
        .patch_payload(target.offset, 0, &99_999u32.to_le_bytes())
        .unwrap();

    let bytes = container_from_streams(&blank_doc_info(1), stream.as_bytes());
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(!report.is_valid());
    assert!(
        report.has(CheckKind::ParaTextLength),
        "expected a para-text-length failure, got: {}",
        report
    );
    assert!(report.to_string().contains("99999"));
}

#[test]
fn dangling_char_shape_ref_is_reported() {
    let section = blank_section(&["문단"]);
    let mut stream = RecordStream::new(section);

    // Point the content paragraph's only shape pair at a shape that does
    // not exist (the blank DocInfo has exactly one).
    let views = stream.records().unwrap();
    let char_shape = views
        .iter()
        .filter(|r| r.tag_id == tag::PARA_CHAR_SHAPE)
        .nth(1)
        .copied()
        .unwrap();
    stream
        .patch_payload(char_shape.offset, 4, &7u32.to_le_bytes())
        .unwrap();

    let bytes = container_from_streams(&blank_doc_info(1), stream.as_bytes());
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.has(CheckKind::ShapeReference), "{}", report);
}

#[test]
fn count_table_disagreement_is_reported() {
    let doc_info = blank_doc_info(1);
    let mut stream = RecordStream::new(doc_info);

    // Declare one more style than the stream holds.
    let id_mappings = stream
        .records()
        .unwrap()
        .into_iter()
        .find(|r| r.tag_id == tag::ID_MAPPINGS)
        .unwrap();
    // Style count is the fifteenth u32 slot.
    stream
        .patch_payload(id_mappings.offset, 14 * 4, &9u32.to_le_bytes())
        .unwrap();

    let bytes = container_from_streams(stream.as_bytes(), &blank_section(&["x"]));
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.has(CheckKind::IdMappingCount), "{}", report);
}

#[test]
fn interleaved_char_shapes_are_reported() {
    let doc_info = blank_doc_info(1);
    let mut stream = RecordStream::new(doc_info);

    // Append a second CHAR_SHAPE after the PARA_SHAPE run, so the two
    // char shapes are no longer contiguous, and keep the count honest.
    let char_shape = stream
        .records()
        .unwrap()
        .into_iter()
        .find(|r| r.tag_id == tag::CHAR_SHAPE)
        .unwrap();
    let payload = stream.payload(&char_shape).to_vec();
    stream.append_record(tag::CHAR_SHAPE, 1, &payload);
    let id_mappings = stream
        .records()
        .unwrap()
        .into_iter()
        .find(|r| r.tag_id == tag::ID_MAPPINGS)
        .unwrap();
    stream
        .patch_payload(id_mappings.offset, 9 * 4, &2u32.to_le_bytes())
        .unwrap();

    let bytes = container_from_streams(stream.as_bytes(), &blank_section(&["x"]));
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.has(CheckKind::CharShapeContiguity), "{}", report);
}

#[test]
fn encrypted_documents_are_rejected() {
    let mut header = FileHeader::new_default();
    header.flags |= 0x02;
    let entries = vec![
        ("FileHeader".to_string(), header.to_bytes()),
        (
            "DocInfo".to_string(),
            compress_stream(&blank_doc_info(1)).unwrap(),
        ),
        (
            "BodyText/Section0".to_string(),
            compress_stream(&blank_section(&["x"])).unwrap(),
        ),
    ];
    let bytes = write_container(&entries).unwrap();
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.has(CheckKind::FileHeader), "{}", report);
}

#[test]
fn unrecognized_bytes_are_a_format_error() {
    let err = validate_bytes(b"neither format at all").unwrap_err();
    assert!(matches!(err, hwpedit::HwpError::Format(_)));
}

#[test]
fn truncated_record_stream_is_reported() {
    // A section whose last record declares more payload than exists.
    let mut section = blank_section(&["ok"]);
    section.extend(hwpedit::parser::record::encode_header(tag::PARA_TEXT, 1, 400));
    section.extend_from_slice(&[0u8; 4]);

    let bytes = container_from_streams(&blank_doc_info(1), &section);
    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.has(CheckKind::RecordStructure), "{}", report);
}
