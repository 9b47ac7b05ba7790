//! Hierarchical locators addressing elements of the document model:
//! `s0`, `s0.p3`, `s0.p3.r1`, `s0.t0.r2.c1`, `s0.t0.r2.c1.p0`, `s0.img0`,
//! `s0.tb1.p2`. Indices are decimal and zero-based.

use crate::error::{HwpError, Result};
use crate::model::Document;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRef {
    pub section: usize,
    pub target: RefTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Section,
    Paragraph {
        index: usize,
        run: Option<usize>,
    },
    Table {
        index: usize,
        cell: Option<CellRef>,
    },
    TextBox {
        index: usize,
        paragraph: Option<usize>,
    },
    Image {
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
    pub paragraph: Option<usize>,
}

/// One `.`-separated component: an alphabetic kind tag plus a decimal index.
fn split_token<'a>(reference: &str, token: &'a str) -> Result<(&'a str, usize)> {
    let digit_start = token
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| HwpError::bad_ref(reference, format!("component '{}' has no index", token)))?;
    let (kind, digits) = token.split_at(digit_start);
    if kind.is_empty() {
        return Err(HwpError::bad_ref(
            reference,
            format!("component '{}' has no kind tag", token),
        ));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HwpError::bad_ref(
            reference,
            format!("component '{}' has a non-decimal index", token),
        ));
    }
    let index = digits.parse::<usize>().map_err(|_| {
        HwpError::bad_ref(reference, format!("index in '{}' is out of range", token))
    })?;
    Ok((kind, index))
}

impl DocRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(HwpError::bad_ref(reference, "empty reference"));
        }
        let mut tokens = reference.split('.');

        let (kind, section) = split_token(reference, tokens.next().unwrap())?;
        if kind != "s" {
            return Err(HwpError::bad_ref(
                reference,
                "reference must start with a section component 's<N>'",
            ));
        }

        let target = match tokens.next() {
            None => RefTarget::Section,
            Some(token) => {
                let (kind, index) = split_token(reference, token)?;
                match kind {
                    "p" => {
                        let run = match tokens.next() {
                            None => None,
                            Some(t) => {
                                let (k, i) = split_token(reference, t)?;
                                if k != "r" {
                                    return Err(HwpError::bad_ref(
                                        reference,
                                        format!("expected run component 'r<N>', found '{}'", t),
                                    ));
                                }
                                Some(i)
                            }
                        };
                        RefTarget::Paragraph { index, run }
                    }
                    "t" => {
                        let cell = match tokens.next() {
                            None => None,
                            Some(t) => {
                                let (k, row) = split_token(reference, t)?;
                                if k != "r" {
                                    return Err(HwpError::bad_ref(
                                        reference,
                                        format!("expected row component 'r<N>', found '{}'", t),
                                    ));
                                }
                                let col_token = tokens.next().ok_or_else(|| {
                                    HwpError::bad_ref(
                                        reference,
                                        "table row must be followed by a cell component 'c<N>'",
                                    )
                                })?;
                                let (k, col) = split_token(reference, col_token)?;
                                if k != "c" {
                                    return Err(HwpError::bad_ref(
                                        reference,
                                        format!(
                                            "expected cell component 'c<N>', found '{}'",
                                            col_token
                                        ),
                                    ));
                                }
                                let paragraph = match tokens.next() {
                                    None => None,
                                    Some(t) => {
                                        let (k, i) = split_token(reference, t)?;
                                        if k != "p" {
                                            return Err(HwpError::bad_ref(
                                                reference,
                                                format!(
                                                    "expected paragraph component 'p<N>', found '{}'",
                                                    t
                                                ),
                                            ));
                                        }
                                        Some(i)
                                    }
                                };
                                Some(CellRef {
                                    row,
                                    col,
                                    paragraph,
                                })
                            }
                        };
                        RefTarget::Table { index, cell }
                    }
                    "tb" => {
                        let paragraph = match tokens.next() {
                            None => None,
                            Some(t) => {
                                let (k, i) = split_token(reference, t)?;
                                if k != "p" {
                                    return Err(HwpError::bad_ref(
                                        reference,
                                        format!("expected paragraph component 'p<N>', found '{}'", t),
                                    ));
                                }
                                Some(i)
                            }
                        };
                        RefTarget::TextBox { index, paragraph }
                    }
                    "img" => RefTarget::Image { index },
                    other => {
                        return Err(HwpError::bad_ref(
                            reference,
                            format!("unknown component kind '{}'", other),
                        ))
                    }
                }
            }
        };

        if tokens.next().is_some() {
            return Err(HwpError::bad_ref(
                reference,
                "trailing components after a complete reference",
            ));
        }

        Ok(Self { section, target })
    }

    /// Check every index against the model, attaching the valid window to
    /// the error when a bound is exceeded.
    pub fn resolve_in(&self, document: &Document) -> Result<()> {
        let reference = self.to_string();
        let section = document.sections.get(self.section).ok_or_else(|| {
            HwpError::bad_ref(
                &reference,
                format!(
                    "section {} does not exist (document has sections 0..{})",
                    self.section,
                    document.sections.len()
                ),
            )
        })?;

        match &self.target {
            RefTarget::Section => Ok(()),
            RefTarget::Paragraph { index, run } => {
                let para = section.paragraphs.get(*index).ok_or_else(|| {
                    HwpError::bad_ref(
                        &reference,
                        format!(
                            "paragraph {} does not exist (section {} has paragraphs 0..{})",
                            index,
                            self.section,
                            section.paragraphs.len()
                        ),
                    )
                })?;
                if let Some(run) = run {
                    if *run >= para.runs.len() {
                        return Err(HwpError::bad_ref(
                            &reference,
                            format!(
                                "run {} does not exist (paragraph has runs 0..{})",
                                run,
                                para.runs.len()
                            ),
                        ));
                    }
                }
                Ok(())
            }
            RefTarget::Table { index, cell } => {
                let table = section.tables.get(*index).ok_or_else(|| {
                    HwpError::bad_ref(
                        &reference,
                        format!(
                            "table {} does not exist (section {} has tables 0..{})",
                            index,
                            self.section,
                            section.tables.len()
                        ),
                    )
                })?;
                if let Some(cell_ref) = cell {
                    let row = table.rows.get(cell_ref.row).ok_or_else(|| {
                        HwpError::bad_ref(
                            &reference,
                            format!(
                                "row {} does not exist (table has rows 0..{})",
                                cell_ref.row,
                                table.rows.len()
                            ),
                        )
                    })?;
                    let cell = row.cells.get(cell_ref.col).ok_or_else(|| {
                        HwpError::bad_ref(
                            &reference,
                            format!(
                                "cell {} does not exist (row has cells 0..{})",
                                cell_ref.col,
                                row.cells.len()
                            ),
                        )
                    })?;
                    if let Some(p) = cell_ref.paragraph {
                        if p >= cell.paragraphs.len() {
                            return Err(HwpError::bad_ref(
                                &reference,
                                format!(
                                    "paragraph {} does not exist (cell has paragraphs 0..{})",
                                    p,
                                    cell.paragraphs.len()
                                ),
                            ));
                        }
                    }
                }
                Ok(())
            }
            RefTarget::TextBox { index, paragraph } => {
                let text_box = section.text_boxes.get(*index).ok_or_else(|| {
                    HwpError::bad_ref(
                        &reference,
                        format!(
                            "text box {} does not exist (section {} has text boxes 0..{})",
                            index,
                            self.section,
                            section.text_boxes.len()
                        ),
                    )
                })?;
                if let Some(p) = paragraph {
                    if *p >= text_box.paragraphs.len() {
                        return Err(HwpError::bad_ref(
                            &reference,
                            format!(
                                "paragraph {} does not exist (text box has paragraphs 0..{})",
                                p,
                                text_box.paragraphs.len()
                            ),
                        ));
                    }
                }
                Ok(())
            }
            RefTarget::Image { index } => {
                if *index >= section.images.len() {
                    return Err(HwpError::bad_ref(
                        &reference,
                        format!(
                            "image {} does not exist (section {} has images 0..{})",
                            index,
                            self.section,
                            section.images.len()
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.section)?;
        match &self.target {
            RefTarget::Section => Ok(()),
            RefTarget::Paragraph { index, run } => {
                write!(f, ".p{}", index)?;
                if let Some(run) = run {
                    write!(f, ".r{}", run)?;
                }
                Ok(())
            }
            RefTarget::Table { index, cell } => {
                write!(f, ".t{}", index)?;
                if let Some(cell) = cell {
                    write!(f, ".r{}.c{}", cell.row, cell.col)?;
                    if let Some(p) = cell.paragraph {
                        write!(f, ".p{}", p)?;
                    }
                }
                Ok(())
            }
            RefTarget::TextBox { index, paragraph } => {
                write!(f, ".tb{}", index)?;
                if let Some(p) = paragraph {
                    write!(f, ".p{}", p)?;
                }
                Ok(())
            }
            RefTarget::Image { index } => write!(f, ".img{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) {
        assert_eq!(DocRef::parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn parses_every_form() {
        roundtrip("s0");
        roundtrip("s1.p12");
        roundtrip("s0.p3.r1");
        roundtrip("s0.t0");
        roundtrip("s0.t2.r1.c3");
        roundtrip("s0.t2.r1.c3.p0");
        roundtrip("s0.tb0");
        roundtrip("s0.tb1.p4");
        roundtrip("s3.img2");
    }

    #[test]
    fn distinguishes_table_from_text_box() {
        let table = DocRef::parse("s0.t1").unwrap();
        assert!(matches!(table.target, RefTarget::Table { index: 1, .. }));
        let text_box = DocRef::parse("s0.tb1").unwrap();
        assert!(matches!(
            text_box.target,
            RefTarget::TextBox { index: 1, .. }
        ));
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "", "p0", "s", "sx", "s0.", "s0.q1", "s0.p", "s0.p1.x2", "s0.t1.r2", "s0.t1.c2",
            "s0.p1.r2.p3", "s0.img", "s-1", "s0.p+1",
        ] {
            assert!(DocRef::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn resolve_reports_window() {
        use crate::model::{DocFormat, Document, Paragraph, Section};
        let mut doc = Document::new(DocFormat::Hwpx);
        let mut section = Section::default();
        section.paragraphs.push(Paragraph::from_text("only one", 0));
        doc.sections.push(section);

        DocRef::parse("s0.p0").unwrap().resolve_in(&doc).unwrap();

        let err = DocRef::parse("s0.p9")
            .unwrap()
            .resolve_in(&doc)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("paragraphs 0..1"), "message was {}", msg);
    }
}
