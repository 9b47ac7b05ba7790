use hwpedit::model::CharFormat;
use hwpedit::parser::body_text::scan_section;
use hwpedit::parser::doc_info::scan_doc_info;
use hwpedit::refs::DocRef;
use hwpedit::validate::validate_hwp_bytes;
use hwpedit::writer::builder::blank_document;
use hwpedit::writer::{HwpFile, InsertPosition};
use pretty_assertions::assert_eq;

fn fixture(paragraphs: &[&str]) -> HwpFile {
    blank_document(paragraphs).unwrap()
}

/// Paragraph 0 is the section-definition paragraph, so the first content
/// paragraph is p1.
#[test]
fn blank_document_roundtrips_through_container() {
    let file = fixture(&["사업주는 다음과 같다", "둘째 문단"]);
    let bytes = file.to_bytes().unwrap();

    let reread = HwpFile::from_bytes(&bytes).unwrap();
    let document = reread.decode().unwrap();
    assert_eq!(document.sections.len(), 1);
    let texts: Vec<String> = document.sections[0]
        .paragraphs
        .iter()
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(texts, vec!["", "사업주는 다음과 같다", "둘째 문단"]);

    let report = validate_hwp_bytes(&bytes).unwrap();
    assert!(report.is_valid(), "blank document failed validation: {}", report);
}

#[test]
fn decode_reencode_preserves_model() {
    let file = fixture(&["모델 왕복", "second"]);
    let before = file.decode().unwrap();

    let bytes = file.to_bytes().unwrap();
    let after = HwpFile::from_bytes(&bytes).unwrap().decode().unwrap();

    assert_eq!(before.sections.len(), after.sections.len());
    for (a, b) in before.sections.iter().zip(&after.sections) {
        assert_eq!(a.paragraphs.len(), b.paragraphs.len());
        for (pa, pb) in a.paragraphs.iter().zip(&b.paragraphs) {
            assert_eq!(pa.plain_text(), pb.plain_text());
            assert_eq!(pa.style_ref, pb.style_ref);
            assert_eq!(pa.para_shape_ref, pb.para_shape_ref);
        }
    }
    assert_eq!(before.header.styles.len(), after.header.styles.len());
    assert_eq!(before.header.char_shapes.len(), after.header.char_shapes.len());
}

#[test]
fn set_text_updates_n_chars() {
    let mut file = fixture(&["사업주", "unchanged"]);
    let target = DocRef::parse("s0.p1").unwrap();
    let replacement = "(주)테스트코리아(이하 \"회사\")";
    file.set_text(&target, replacement).unwrap();

    let scan = scan_section(file.section(0).unwrap()).unwrap();
    let para = &scan.paragraphs[1];
    let expected_units = replacement.encode_utf16().count() as u32;
    assert_eq!(para.n_chars(), expected_units);
    assert_eq!(para.plain_text().unwrap(), replacement);

    // The neighbour paragraph is untouched.
    assert_eq!(scan.paragraphs[2].plain_text().unwrap(), "unchanged");

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn set_text_is_minimum_diff() {
    let mut file = fixture(&["first", "target paragraph", "third"]);
    let before = file.section(0).unwrap().as_bytes().to_vec();
    let span = {
        let scan = scan_section(file.section(0).unwrap()).unwrap();
        let para = &scan.paragraphs[2];
        (para.header.offset, para.span_end)
    };

    file.set_text(&DocRef::parse("s0.p2").unwrap(), "replaced!").unwrap();
    let after = file.section(0).unwrap().as_bytes().to_vec();

    // Bytes before the edited span are identical; bytes after it are the
    // same suffix, shifted by the length delta.
    assert_eq!(before[..span.0], after[..span.0]);
    let tail_before = &before[span.1..];
    let delta = after.len() as isize - before.len() as isize;
    let new_span_end = (span.1 as isize + delta) as usize;
    assert_eq!(tail_before, &after[new_span_end..]);
}

#[test]
fn empty_text_removes_para_text_record() {
    let mut file = fixture(&["will be emptied"]);
    let target = DocRef::parse("s0.p1").unwrap();
    file.set_text(&target, "").unwrap();

    let scan = scan_section(file.section(0).unwrap()).unwrap();
    let para = &scan.paragraphs[1];
    assert!(para.text.is_none(), "PARA_TEXT must be removed, not zero-sized");
    assert_eq!(para.n_chars(), 0);

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn n_chars_high_bit_survives_edits() {
    let mut file = fixture(&["alpha", "omega"]);
    // The builder marks the final paragraph with the reserved bit.
    let raw_before = {
        let scan = scan_section(file.section(0).unwrap()).unwrap();
        scan.paragraphs[2].n_chars_raw
    };
    assert_ne!(raw_before & 0x8000_0000, 0);

    file.set_text(&DocRef::parse("s0.p2").unwrap(), "new tail").unwrap();

    let scan = scan_section(file.section(0).unwrap()).unwrap();
    let raw_after = scan.paragraphs[2].n_chars_raw;
    assert_ne!(raw_after & 0x8000_0000, 0);
    assert_eq!(raw_after & 0x7FFF_FFFF, "new tail".encode_utf16().count() as u32);
}

#[test]
fn bold_format_appends_char_shape() {
    let mut file = fixture(&["Hello World"]);
    let target = DocRef::parse("s0.p1").unwrap();

    let shapes_before = scan_doc_info(file.doc_info()).unwrap().char_shapes.len();
    file.apply_format(
        &target,
        Some((0, 5)),
        &CharFormat {
            bold: Some(true),
            ..Default::default()
        },
    )
    .unwrap();

    let di = scan_doc_info(file.doc_info()).unwrap();
    assert_eq!(di.char_shapes.len(), shapes_before + 1);
    assert!(di.char_shapes.last().unwrap().1.is_bold());

    // Declared count follows the append.
    let (_, mappings) = di.id_mappings.as_ref().unwrap();
    assert_eq!(mappings.char_shape_count() as usize, di.char_shapes.len());

    // The paragraph now carries a shape transition at offset 5.
    let scan = scan_section(file.section(0).unwrap()).unwrap();
    let pairs = &scan.paragraphs[1].shape_pairs;
    assert!(pairs.len() >= 2, "expected split pairs, got {:?}", pairs);
    assert_eq!(pairs[0].0, 0);
    assert_eq!(pairs[1].0, 5);
    assert_eq!(scan.paragraphs[1].plain_text().unwrap(), "Hello World");

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn format_whole_paragraph_reuses_existing_shape() {
    let mut file = fixture(&["abc"]);
    let target = DocRef::parse("s0.p1").unwrap();
    let bold = CharFormat {
        bold: Some(true),
        ..Default::default()
    };

    file.apply_format(&target, None, &bold).unwrap();
    let count1 = scan_doc_info(file.doc_info()).unwrap().char_shapes.len();
    file.apply_format(&target, None, &bold).unwrap();
    let count2 = scan_doc_info(file.doc_info()).unwrap().char_shapes.len();
    assert_eq!(count1, count2);
}

#[test]
fn add_paragraph_positions() {
    let mut file = fixture(&["one", "three"]);
    file.add_paragraph(
        &InsertPosition::After(DocRef::parse("s0.p1").unwrap()),
        "two",
        None,
        None,
    )
    .unwrap();
    file.add_paragraph(&InsertPosition::End(0), "four", None, None)
        .unwrap();

    let document = file.decode().unwrap();
    let texts: Vec<String> = document.sections[0]
        .paragraphs
        .iter()
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(texts, vec!["", "one", "two", "three", "four"]);

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn add_heading_paragraph_resolves_outline_style() {
    let mut file = fixture(&["body"]);
    file.add_paragraph(&InsertPosition::End(0), "제1장 서론", Some(1), None)
        .unwrap();

    let document = file.decode().unwrap();
    let para = document.sections[0].paragraphs.last().unwrap();
    assert_eq!(para.plain_text(), "제1장 서론");
    assert_eq!(para.style_ref, 1);
    assert_eq!(document.heading_level(para), Some(1));
    assert_eq!(document.header.styles[1].name, "개요 1");

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn add_table_and_edit_cell() {
    let mut file = fixture(&["host"]);
    let data = vec![
        vec!["이름".to_string(), "값".to_string()],
        vec!["a".to_string(), "1".to_string()],
    ];
    file.add_table(&InsertPosition::End(0), 2, 2, Some(&data)).unwrap();

    let document = file.decode().unwrap();
    let table = &document.sections[0].tables[0];
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 1).unwrap().plain_text(), "값");

    file.set_text(&DocRef::parse("s0.t0.r0.c1").unwrap(), "새 값").unwrap();
    let document = file.decode().unwrap();
    assert_eq!(
        document.sections[0].tables[0].cell(0, 1).unwrap().plain_text(),
        "새 값"
    );

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn image_attachment_lifecycle() {
    let mut file = fixture(&["doc"]);
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
    let path = file.insert_image(&png).unwrap();
    assert_eq!(path, "BinData/BIN0001.png");

    let images = file.list_images().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].path, path);
    assert_eq!(file.image_data(&path).unwrap(), png.to_vec());

    let gif = b"GIF89a\x01\x00\x01\x00".to_vec();
    file.replace_image(&path, &gif).unwrap();
    assert_eq!(file.image_data(&path).unwrap(), gif);

    // The count table follows the new attachment.
    let di = scan_doc_info(file.doc_info()).unwrap();
    let (_, mappings) = di.id_mappings.as_ref().unwrap();
    assert_eq!(mappings.bin_data_count(), 1);

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn char_shapes_stay_contiguous_after_append() {
    let mut file = fixture(&["abc"]);
    file.apply_format(
        &DocRef::parse("s0.p1").unwrap(),
        Some((0, 1)),
        &CharFormat {
            italic: Some(true),
            ..Default::default()
        },
    )
    .unwrap();

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(
        report.is_valid(),
        "contiguity or counts broken after append: {}",
        report
    );
}

#[test]
fn save_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.hwp");
    let file = fixture(&["저장 테스트"]);
    file.save(&path).unwrap();

    assert!(path.exists());
    // No temp file left behind.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let document = hwpedit::open_document(&path).unwrap();
    assert_eq!(document.sections[0].paragraphs[1].plain_text(), "저장 테스트");
}

#[test]
fn text_box_paragraph_edit() {
    use hwpedit::parser::record::{ctrl_id, encode_record, tag};
    use hwpedit::reader::cfb::write_container;
    use hwpedit::utils::compression::compress_stream;
    use hwpedit::writer::builder;

    // A section holding one paragraph whose shape object carries a
    // rectangle with its own paragraph list.
    let mut section = builder::section_definition_records();
    let mut wire = builder::anchor_units(11, ctrl_id::SHAPE_OBJECT);
    wire.push(13);
    section.extend(encode_record(
        tag::PARA_HEADER,
        0,
        &builder::para_header_payload(wire.len() as u32, 0x04, 0, 0, 1),
    ));
    section.extend(encode_record(
        tag::PARA_TEXT,
        1,
        &hwpedit::utils::encoding::units_to_bytes(&wire),
    ));
    section.extend(encode_record(tag::PARA_CHAR_SHAPE, 1, &builder::shape_pair(0, 0)));
    section.extend(encode_record(
        tag::CTRL_HEADER,
        1,
        &builder::ctrl_header_payload(ctrl_id::SHAPE_OBJECT),
    ));
    section.extend(encode_record(tag::SHAPE_COMPONENT, 2, &[0u8; 32]));
    section.extend(encode_record(tag::SHAPE_COMPONENT_RECTANGLE, 3, &[0u8; 9]));
    section.extend(encode_record(tag::LIST_HEADER, 3, &[1, 0, 0, 0, 0, 0, 0, 0]));
    section.extend(builder::paragraph_records("상자 내용", 4, 0, 0, 0, true));

    let entries = vec![
        (
            "FileHeader".to_string(),
            hwpedit::parser::FileHeader::new_default().to_bytes(),
        ),
        (
            "DocInfo".to_string(),
            compress_stream(&builder::blank_doc_info(1)).unwrap(),
        ),
        (
            "BodyText/Section0".to_string(),
            compress_stream(&section).unwrap(),
        ),
    ];
    let bytes = write_container(&entries).unwrap();

    let mut file = HwpFile::from_bytes(&bytes).unwrap();
    let document = file.decode().unwrap();
    assert_eq!(document.sections[0].text_boxes.len(), 1);
    assert_eq!(
        document.sections[0].text_boxes[0].plain_text(),
        "상자 내용"
    );

    file.set_text(&DocRef::parse("s0.tb0.p0").unwrap(), "수정된 상자").unwrap();
    let document = file.decode().unwrap();
    assert_eq!(
        document.sections[0].text_boxes[0].plain_text(),
        "수정된 상자"
    );

    let report = validate_hwp_bytes(&file.to_bytes().unwrap()).unwrap();
    assert!(report.is_valid(), "{}", report);
}
