//! Edit executor: translates reference-addressed operations into codec
//! mutations, validates the result, and writes atomically. A failing
//! operation or a validator rejection leaves the original file untouched.

use crate::error::{HwpError, Result};
use crate::model::{CharFormat, DocFormat};
use crate::refs::{DocRef, RefTarget};
use crate::validate::validate_bytes;
use crate::writer::{HwpFile, InsertPosition, StyleSelector};
use crate::hwpx::HwpxEditor;
use crate::reader::cfb::CFB_MAGIC;
use log::debug;
use std::path::Path;

/// Where `addParagraph`/`addTable` place their insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Before(String),
    After(String),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SetText {
        target: String,
        text: String,
    },
    SetFormat {
        target: String,
        start: Option<usize>,
        end: Option<usize>,
        format: CharFormat,
    },
    SetTableCell {
        target: String,
        text: String,
    },
    AddTable {
        section: usize,
        rows: usize,
        cols: usize,
        data: Option<Vec<Vec<String>>>,
        placement: Placement,
    },
    AddParagraph {
        section: usize,
        placement: Placement,
        text: String,
        heading: Option<u8>,
        style: Option<StyleSelector>,
    },
}

/// Outcome of one executed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpOutcome {
    pub index: usize,
    pub target: Option<String>,
    pub description: String,
}

pub fn sniff_format(bytes: &[u8]) -> Result<DocFormat> {
    if bytes.starts_with(&CFB_MAGIC) {
        Ok(DocFormat::Hwp)
    } else if bytes.starts_with(b"PK") {
        Ok(DocFormat::Hwpx)
    } else {
        Err(HwpError::Format(
            "Neither an HWP compound file nor an HWPX archive".to_string(),
        ))
    }
}

fn resolve_placement(section: usize, placement: &Placement) -> Result<InsertPosition> {
    Ok(match placement {
        Placement::End => InsertPosition::End(section),
        Placement::Before(reference) => {
            let r = DocRef::parse(reference)?;
            ensure_same_section(section, &r)?;
            InsertPosition::Before(r)
        }
        Placement::After(reference) => {
            let r = DocRef::parse(reference)?;
            ensure_same_section(section, &r)?;
            InsertPosition::After(r)
        }
    })
}

fn ensure_same_section(section: usize, r: &DocRef) -> Result<()> {
    if r.section != section {
        return Err(HwpError::Conflicting(format!(
            "position reference {} addresses section {} but the operation targets section {}",
            r, r.section, section
        )));
    }
    Ok(())
}

fn check_format_range(start: Option<usize>, end: Option<usize>) -> Result<Option<(usize, usize)>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(HwpError::Conflicting(
            "start requires end".to_string(),
        )),
        (None, Some(_)) => Err(HwpError::Conflicting(
            "end requires start".to_string(),
        )),
        (Some(s), Some(e)) => {
            if s >= e {
                return Err(HwpError::Conflicting(format!(
                    "start {} must be less than end {}",
                    s, e
                )));
            }
            Ok(Some((s, e)))
        }
    }
}

fn cell_target(reference: &str) -> Result<DocRef> {
    let r = DocRef::parse(reference)?;
    match &r.target {
        RefTarget::Table { cell: Some(_), .. } => Ok(r),
        _ => Err(HwpError::bad_ref(
            reference,
            "a table-cell reference of the form s<i>.t<i>.r<i>.c<i> is required",
        )),
    }
}

enum Loaded {
    Hwp(HwpFile),
    Hwpx(HwpxEditor),
}

impl Loaded {
    fn apply(&mut self, index: usize, op: &Operation) -> Result<OpOutcome> {
        let (target, description) = match op {
            Operation::SetText { target, text } => {
                let r = DocRef::parse(target)?;
                match self {
                    Loaded::Hwp(file) => file.set_text(&r, text)?,
                    Loaded::Hwpx(editor) => editor.set_text(&r, text)?,
                }
                (Some(r.to_string()), "setText".to_string())
            }
            Operation::SetTableCell { target, text } => {
                let r = cell_target(target)?;
                match self {
                    Loaded::Hwp(file) => file.set_text(&r, text)?,
                    Loaded::Hwpx(editor) => editor.set_text(&r, text)?,
                }
                (Some(r.to_string()), "setTableCell".to_string())
            }
            Operation::SetFormat {
                target,
                start,
                end,
                format,
            } => {
                let r = DocRef::parse(target)?;
                let range = check_format_range(*start, *end)?;
                match self {
                    Loaded::Hwp(file) => file.apply_format(&r, range, format)?,
                    Loaded::Hwpx(editor) => editor.apply_format(&r, range, format)?,
                }
                (Some(r.to_string()), "setFormat".to_string())
            }
            Operation::AddParagraph {
                section,
                placement,
                text,
                heading,
                style,
            } => {
                if heading.is_some() && style.is_some() {
                    return Err(HwpError::Conflicting(
                        "heading and style are mutually exclusive".to_string(),
                    ));
                }
                let position = resolve_placement(*section, placement)?;
                match self {
                    Loaded::Hwp(file) => {
                        file.add_paragraph(&position, text, *heading, style.as_ref())?
                    }
                    Loaded::Hwpx(editor) => {
                        editor.add_paragraph(&position, text, *heading, style.as_ref())?
                    }
                }
                (Some(format!("s{}", section)), "addParagraph".to_string())
            }
            Operation::AddTable {
                section,
                rows,
                cols,
                data,
                placement,
            } => {
                let position = resolve_placement(*section, placement)?;
                match self {
                    Loaded::Hwp(file) => {
                        file.add_table(&position, *rows, *cols, data.as_deref())?
                    }
                    Loaded::Hwpx(editor) => {
                        editor.add_table(&position, *rows, *cols, data.as_deref())?
                    }
                }
                (Some(format!("s{}", section)), "addTable".to_string())
            }
        };

        Ok(OpOutcome {
            index,
            target,
            description,
        })
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        match self {
            Loaded::Hwp(file) => file.to_bytes(),
            Loaded::Hwpx(editor) => editor.to_bytes(),
        }
    }
}

/// Apply a batch of operations to the document at `path`. All operations
/// run against the in-memory document; the file is rewritten once, after
/// the mutated bytes pass validation.
pub fn apply_operations<P: AsRef<Path>>(path: P, ops: &[Operation]) -> Result<Vec<OpOutcome>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let format = sniff_format(&bytes)?;

    let mut loaded = match format {
        DocFormat::Hwp => Loaded::Hwp(HwpFile::from_bytes(&bytes)?),
        DocFormat::Hwpx => Loaded::Hwpx(HwpxEditor::from_bytes(&bytes)?),
    };

    let mut outcomes = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        outcomes.push(loaded.apply(index, op)?);
    }

    let out_bytes = loaded.to_bytes()?;
    let report = validate_bytes(&out_bytes)?;
    if !report.is_valid() {
        return Err(HwpError::Corrupt(format!(
            "mutation produced an invalid document, original left untouched: {}",
            report
        )));
    }

    crate::write_file_atomic(path, &out_bytes)?;
    debug!("applied {} operations to {}", ops.len(), path.display());
    Ok(outcomes)
}
