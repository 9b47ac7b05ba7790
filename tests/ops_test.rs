use hwpedit::model::CharFormat;
use hwpedit::ops::{apply_operations, Operation, Placement};
use hwpedit::writer::builder::blank_document;
use hwpedit::{create_document, open_document, StyleSelector};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn batch_edit_hwp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwp");
    blank_document(&["하나", "둘"]).unwrap().save(&path).unwrap();

    let outcomes = apply_operations(
        &path,
        &[
            Operation::SetText {
                target: "s0.p1".to_string(),
                text: "수정된 첫 문단".to_string(),
            },
            Operation::AddParagraph {
                section: 0,
                placement: Placement::End,
                text: "추가 문단".to_string(),
                heading: None,
                style: None,
            },
        ],
    )
    .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].description, "setText");
    assert_eq!(outcomes[0].target.as_deref(), Some("s0.p1"));

    let document = open_document(&path).unwrap();
    let texts: Vec<String> = document.sections[0]
        .paragraphs
        .iter()
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(texts, vec!["", "수정된 첫 문단", "둘", "추가 문단"]);
}

#[test]
fn batch_edit_hwpx_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwpx");
    create_document(&path).unwrap();

    apply_operations(
        &path,
        &[
            Operation::SetText {
                target: "s0.p0".to_string(),
                text: "Hello World".to_string(),
            },
            Operation::SetFormat {
                target: "s0.p0".to_string(),
                start: Some(0),
                end: Some(5),
                format: CharFormat {
                    bold: Some(true),
                    ..Default::default()
                },
            },
            Operation::AddTable {
                section: 0,
                rows: 1,
                cols: 2,
                data: Some(vec![vec!["a".to_string(), "b".to_string()]]),
                placement: Placement::End,
            },
            Operation::SetTableCell {
                target: "s0.t0.r0.c0".to_string(),
                text: "셀".to_string(),
            },
        ],
    )
    .unwrap();

    let document = open_document(&path).unwrap();
    let para = &document.sections[0].paragraphs[0];
    assert_eq!(para.plain_text(), "Hello World");
    assert!(para.runs.len() >= 2);
    assert_eq!(document.sections[0].tables[0].cell(0, 0).unwrap().plain_text(), "셀");
}

#[test]
fn conflicting_range_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwpx");
    create_document(&path).unwrap();

    let start_without_end = apply_operations(
        &path,
        &[Operation::SetFormat {
            target: "s0.p0".to_string(),
            start: Some(2),
            end: None,
            format: CharFormat::default(),
        }],
    )
    .unwrap_err();
    assert!(matches!(start_without_end, hwpedit::HwpError::Conflicting(_)));

    let inverted = apply_operations(
        &path,
        &[Operation::SetFormat {
            target: "s0.p0".to_string(),
            start: Some(5),
            end: Some(5),
            format: CharFormat::default(),
        }],
    )
    .unwrap_err();
    assert!(matches!(inverted, hwpedit::HwpError::Conflicting(_)));
}

#[test]
fn heading_and_style_conflict() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwpx");
    create_document(&path).unwrap();

    let err = apply_operations(
        &path,
        &[Operation::AddParagraph {
            section: 0,
            placement: Placement::End,
            text: "x".to_string(),
            heading: Some(2),
            style: Some(StyleSelector::Name("Normal".to_string())),
        }],
    )
    .unwrap_err();
    assert!(matches!(err, hwpedit::HwpError::Conflicting(_)));
}

#[test]
fn failed_operation_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwp");
    blank_document(&["원본 내용"]).unwrap().save(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let err = apply_operations(
        &path,
        &[
            Operation::SetText {
                target: "s0.p1".to_string(),
                text: "applied in memory".to_string(),
            },
            Operation::SetText {
                target: "s0.p99".to_string(),
                text: "out of bounds".to_string(),
            },
        ],
    )
    .unwrap_err();
    assert!(matches!(err, hwpedit::HwpError::Ref { .. }));

    // The first operation succeeded in memory, but nothing was flushed.
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn styled_paragraph_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.hwpx");
    create_document(&path).unwrap();

    apply_operations(
        &path,
        &[Operation::AddParagraph {
            section: 0,
            placement: Placement::End,
            text: "개요 추가".to_string(),
            heading: None,
            style: Some(StyleSelector::Name("개요 2".to_string())),
        }],
    )
    .unwrap();

    let document = open_document(&path).unwrap();
    let para = document.sections[0].paragraphs.last().unwrap();
    assert_eq!(para.style_ref, 2);
    assert_eq!(document.heading_level(para), Some(2));
}

#[test]
fn find_text_returns_references() {
    let file = blank_document(&["봄 여름 가을", "겨울 그리고 봄"]).unwrap();
    let document = file.decode().unwrap();
    let hits = document.find_text("봄");
    let refs: Vec<&str> = hits.iter().map(|(r, _)| r.as_str()).collect();
    assert_eq!(refs, vec!["s0.p1", "s0.p2"]);
}
