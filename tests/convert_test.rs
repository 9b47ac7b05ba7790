use hwpedit::convert::{convert_file, convert_to_package};
use hwpedit::hwpx::decode_package;
use hwpedit::refs::DocRef;
use hwpedit::validate::validate_hwpx_bytes;
use hwpedit::writer::builder::blank_document;
use pretty_assertions::assert_eq;

#[test]
fn converted_package_validates() {
    let file = blank_document(&["변환 테스트", "두 번째"]).unwrap();
    let package = convert_to_package(&file).unwrap();
    let bytes = package.to_bytes().unwrap();
    let report = validate_hwpx_bytes(&bytes).unwrap();
    assert!(report.is_valid(), "converted package invalid: {}", report);
}

#[test]
fn edited_marker_survives_conversion() {
    let mut file = blank_document(&["placeholder"]).unwrap();
    file.set_text(
        &DocRef::parse("s0.p1").unwrap(),
        "CROSSVAL_UNIQUE_MARKER",
    )
    .unwrap();

    let package = convert_to_package(&file).unwrap();
    let section_xml =
        String::from_utf8(package.part("Contents/section0.xml").unwrap().to_vec()).unwrap();
    assert!(
        section_xml.contains("CROSSVAL_UNIQUE_MARKER"),
        "marker missing from section XML"
    );
}

#[test]
fn text_agrees_across_formats() {
    let file = blank_document(&["첫 문단", "둘째 문단", "셋째"]).unwrap();
    let hwp_text = file.decode().unwrap().plain_text();

    let package = convert_to_package(&file).unwrap();
    let hwpx_text = decode_package(&package).unwrap().plain_text();

    let non_empty = |s: &str| -> Vec<String> {
        s.lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect()
    };
    assert_eq!(non_empty(&hwp_text), non_empty(&hwpx_text));
}

#[test]
fn attachments_are_copied() {
    let mut file = blank_document(&["with image"]).unwrap();
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 9, 9];
    let path = file.insert_image(&png).unwrap();

    let package = convert_to_package(&file).unwrap();
    assert_eq!(package.part(&path).unwrap(), &png[..]);

    let header_xml =
        String::from_utf8(package.part("Contents/header.xml").unwrap().to_vec()).unwrap();
    assert!(header_xml.contains("binDataItem"));
    assert!(header_xml.contains(&path));
}

#[test]
fn refuses_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.hwp");
    let dst = dir.path().join("out.hwpx");

    blank_document(&["원본"]).unwrap().save(&src).unwrap();
    std::fs::write(&dst, b"occupied").unwrap();

    let err = convert_file(&src, &dst, false).unwrap_err();
    assert!(matches!(err, hwpedit::HwpError::Conflicting(_)));
    assert_eq!(std::fs::read(&dst).unwrap(), b"occupied");

    convert_file(&src, &dst, true).unwrap();
    let document = hwpedit::open_document(&dst).unwrap();
    assert!(document.plain_text().contains("원본"));
}
