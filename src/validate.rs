//! Structural validator. Runs on demand and before every write; a
//! mutation that fails validation is never flushed to disk.

use crate::error::{HwpError, Result};
use crate::hwpx::{parse_head, parse_section};
use crate::parser::record::{tag, RecordStream};
use crate::reader::cfb::CFB_MAGIC;
use crate::reader::ZipPackage;
use crate::writer::HwpFile;
use std::fmt;
use std::path::Path;

/// The check families a validator failure is classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Required container entries present and readable.
    Container,
    /// FileHeader signature and feature flags.
    FileHeader,
    /// Record streams parse cleanly end to end.
    RecordStructure,
    /// PARA_HEADER.nChars equals the PARA_TEXT code-unit count.
    ParaTextLength,
    /// Every shape/style reference lands inside its table.
    ShapeReference,
    /// ID_MAPPINGS declared counts equal actual record counts.
    IdMappingCount,
    /// CHAR_SHAPE records form one contiguous run.
    CharShapeContiguity,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Container => "container",
            Self::FileHeader => "file-header",
            Self::RecordStructure => "record-structure",
            Self::ParaTextLength => "para-text-length",
            Self::ShapeReference => "shape-reference",
            Self::IdMappingCount => "id-mapping-count",
            Self::CharShapeContiguity => "char-shape-contiguity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub kind: CheckKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, kind: CheckKind, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            kind,
            message: message.into(),
        });
    }

    pub fn has(&self, kind: CheckKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return f.write_str("valid");
        }
        for issue in &self.issues {
            writeln!(f, "[{}] {}", issue.kind, issue.message)?;
        }
        Ok(())
    }
}

/// Validate HWP container bytes.
pub fn validate_hwp_bytes(bytes: &[u8]) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let file = match HwpFile::from_bytes(bytes) {
        Ok(file) => file,
        Err(HwpError::Unsupported(msg)) => {
            report.push(CheckKind::FileHeader, msg);
            return Ok(report);
        }
        Err(e) => {
            report.push(CheckKind::Container, e.to_string());
            return Ok(report);
        }
    };

    if file.file_header().is_encrypted() {
        report.push(
            CheckKind::FileHeader,
            "encryption flag is set".to_string(),
        );
    }

    let doc_info = file.doc_info();
    let di_scan = match crate::parser::doc_info::scan_doc_info(doc_info) {
        Ok(scan) => scan,
        Err(e) => {
            report.push(CheckKind::RecordStructure, format!("DocInfo: {}", e));
            return Ok(report);
        }
    };

    // Declared counts against actual records, for each id-mapped kind.
    if let Some((_, mappings)) = &di_scan.id_mappings {
        let pairs = [
            ("fonts", mappings.font_count(), di_scan.face_names.len()),
            (
                "char shapes",
                mappings.char_shape_count(),
                di_scan.char_shapes.len(),
            ),
            (
                "para shapes",
                mappings.para_shape_count(),
                di_scan.para_shapes.len(),
            ),
            ("styles", mappings.style_count(), di_scan.styles.len()),
            ("bin data", mappings.bin_data_count(), di_scan.bin_data.len()),
        ];
        for (label, declared, actual) in pairs {
            if declared as usize != actual {
                report.push(
                    CheckKind::IdMappingCount,
                    format!("{}: declared {} but {} records present", label, declared, actual),
                );
            }
        }
    } else {
        report.push(CheckKind::IdMappingCount, "DocInfo has no ID_MAPPINGS record");
    }

    // CHAR_SHAPE records must stay contiguous.
    {
        let mut positions = Vec::new();
        for (idx, view) in doc_info.iter().enumerate() {
            let view = match view {
                Ok(v) => v,
                Err(e) => {
                    report.push(CheckKind::RecordStructure, format!("DocInfo: {}", e));
                    break;
                }
            };
            if view.tag_id == tag::CHAR_SHAPE {
                positions.push(idx);
            }
        }
        if let (Some(first), Some(last)) = (positions.first(), positions.last()) {
            if last - first + 1 != positions.len() {
                report.push(
                    CheckKind::CharShapeContiguity,
                    format!(
                        "CHAR_SHAPE records are interleaved with other kinds ({} records across {} slots)",
                        positions.len(),
                        last - first + 1
                    ),
                );
            }
        }
    }

    // Style table cross-references.
    for (idx, (_, style)) in di_scan.styles.iter().enumerate() {
        if style.char_shape_id as usize >= di_scan.char_shapes.len() {
            report.push(
                CheckKind::ShapeReference,
                format!(
                    "style {} references char shape {} of {}",
                    idx,
                    style.char_shape_id,
                    di_scan.char_shapes.len()
                ),
            );
        }
        if style.para_shape_id as usize >= di_scan.para_shapes.len() {
            report.push(
                CheckKind::ShapeReference,
                format!(
                    "style {} references para shape {} of {}",
                    idx,
                    style.para_shape_id,
                    di_scan.para_shapes.len()
                ),
            );
        }
    }

    for section_idx in 0..file.section_count() {
        let stream = file.section(section_idx)?;
        validate_section_stream(section_idx, stream, &di_scan, &mut report);
    }

    Ok(report)
}

fn validate_section_stream(
    section_idx: usize,
    stream: &RecordStream,
    di_scan: &crate::parser::doc_info::DocInfoScan,
    report: &mut ValidationReport,
) {
    let records = match stream.records() {
        Ok(records) => records,
        Err(e) => {
            report.push(
                CheckKind::RecordStructure,
                format!("section {}: {}", section_idx, e),
            );
            return;
        }
    };

    let char_shape_count = di_scan.char_shapes.len();
    let para_shape_count = di_scan.para_shapes.len();
    let style_count = di_scan.styles.len();

    let mut para_ordinal = 0usize;
    for (i, record) in records.iter().enumerate() {
        if record.tag_id != tag::PARA_HEADER {
            continue;
        }
        let payload = stream.payload(record);
        if payload.len() < 14 {
            report.push(
                CheckKind::RecordStructure,
                format!(
                    "section {} paragraph {}: PARA_HEADER is {} bytes",
                    section_idx,
                    para_ordinal,
                    payload.len()
                ),
            );
            para_ordinal += 1;
            continue;
        }
        let declared =
            u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7FFF_FFFF;
        let para_shape_id = u16::from_le_bytes([payload[8], payload[9]]) as usize;
        let style_id = payload[10] as usize;

        // Subsidiary records of this paragraph.
        let mut actual_units: u32 = 0;
        let mut j = i + 1;
        while j < records.len() && records[j].level > record.level {
            let child = &records[j];
            if child.level == record.level + 1 {
                match child.tag_id {
                    tag::PARA_TEXT => {
                        if actual_units == 0 {
                            actual_units = child.size / 2;
                        }
                    }
                    tag::PARA_CHAR_SHAPE => {
                        for pair in stream.payload(child).chunks_exact(8) {
                            let shape_id =
                                u32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]) as usize;
                            if shape_id >= char_shape_count {
                                report.push(
                                    CheckKind::ShapeReference,
                                    format!(
                                        "section {} paragraph {}: charShapeRef {} of {}",
                                        section_idx, para_ordinal, shape_id, char_shape_count
                                    ),
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
            j += 1;
        }

        if declared != actual_units {
            report.push(
                CheckKind::ParaTextLength,
                format!(
                    "section {} paragraph {}: nChars declares {} code units but PARA_TEXT holds {}",
                    section_idx, para_ordinal, declared, actual_units
                ),
            );
        }
        if para_shape_id >= para_shape_count {
            report.push(
                CheckKind::ShapeReference,
                format!(
                    "section {} paragraph {}: paraShapeRef {} of {}",
                    section_idx, para_ordinal, para_shape_id, para_shape_count
                ),
            );
        }
        if style_id >= style_count {
            report.push(
                CheckKind::ShapeReference,
                format!(
                    "section {} paragraph {}: styleRef {} of {}",
                    section_idx, para_ordinal, style_id, style_count
                ),
            );
        }
        para_ordinal += 1;
    }
}

/// Validate HWPX package bytes.
pub fn validate_hwpx_bytes(bytes: &[u8]) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let package = match ZipPackage::from_bytes(bytes) {
        Ok(p) => p,
        Err(e) => {
            report.push(CheckKind::Container, e.to_string());
            return Ok(report);
        }
    };

    for required in [
        "mimetype",
        "version.xml",
        "META-INF/manifest.xml",
        "Contents/content.hpf",
        "Contents/header.xml",
        "Contents/section0.xml",
    ] {
        if !package.has_part(required) {
            report.push(
                CheckKind::Container,
                format!("missing required part '{}'", required),
            );
        }
    }
    if let Some(mime) = package.part("mimetype") {
        if mime != b"application/hwp+zip" {
            report.push(CheckKind::Container, "mimetype is not application/hwp+zip");
        }
    }
    if !report.is_valid() {
        return Ok(report);
    }

    let header_part = package.part("Contents/header.xml").unwrap_or_default();
    let header_xml = match std::str::from_utf8(header_part) {
        Ok(xml) => xml.to_string(),
        Err(_) => {
            report.push(CheckKind::RecordStructure, "header.xml is not valid UTF-8");
            return Ok(report);
        }
    };
    let head = match parse_head(&header_xml) {
        Ok(head) => head,
        Err(e) => {
            report.push(CheckKind::RecordStructure, format!("header.xml: {}", e));
            return Ok(report);
        }
    };
    let header = crate::hwpx::header_tables_from_xml(&head);

    for section_idx in 0..package.section_count() {
        let name = format!("Contents/section{}.xml", section_idx);
        let xml = match std::str::from_utf8(package.part(&name).unwrap_or_default()) {
            Ok(xml) => xml,
            Err(_) => {
                report.push(
                    CheckKind::RecordStructure,
                    format!("{} is not valid UTF-8", name),
                );
                continue;
            }
        };
        let section = match parse_section(xml) {
            Ok(section) => section,
            Err(e) => {
                report.push(CheckKind::RecordStructure, format!("{}: {}", name, e));
                continue;
            }
        };

        for (p_idx, para) in section.paragraphs.iter().enumerate() {
            if let Some(para_pr) = para.para_pr_id_ref {
                if para_pr as usize >= header.para_shapes.len() {
                    report.push(
                        CheckKind::ShapeReference,
                        format!(
                            "section {} paragraph {}: paraPrIDRef {} of {}",
                            section_idx,
                            p_idx,
                            para_pr,
                            header.para_shapes.len()
                        ),
                    );
                }
            }
            if let Some(style) = para.style_id_ref {
                if style as usize >= header.styles.len() {
                    report.push(
                        CheckKind::ShapeReference,
                        format!(
                            "section {} paragraph {}: styleIDRef {} of {}",
                            section_idx,
                            p_idx,
                            style,
                            header.styles.len()
                        ),
                    );
                }
            }
            for run in &para.runs {
                if let Some(char_pr) = run.char_pr_id_ref {
                    if char_pr as usize >= header.char_shapes.len() {
                        report.push(
                            CheckKind::ShapeReference,
                            format!(
                                "section {} paragraph {}: charPrIDRef {} of {}",
                                section_idx,
                                p_idx,
                                char_pr,
                                header.char_shapes.len()
                            ),
                        );
                    }
                }
            }
        }
    }

    Ok(report)
}

/// Validate a byte stream, sniffing the container format by magic.
pub fn validate_bytes(bytes: &[u8]) -> Result<ValidationReport> {
    if bytes.starts_with(&CFB_MAGIC) {
        validate_hwp_bytes(bytes)
    } else if bytes.starts_with(b"PK") {
        validate_hwpx_bytes(bytes)
    } else {
        Err(HwpError::Format(
            "Neither an HWP compound file nor an HWPX archive".to_string(),
        ))
    }
}

pub fn validate_file<P: AsRef<Path>>(path: P) -> Result<ValidationReport> {
    let bytes = std::fs::read(path)?;
    validate_bytes(&bytes)
}
