//! One-way HWP to HWPX conversion: decode to the unified model, re-emit
//! as a package, carry binary attachments across under their original
//! paths.

use crate::error::{HwpError, Result};
use crate::hwpx::writer::{
    emit_header_xml, emit_section_xml, MIMETYPE,
};
use crate::model::ImageFormat;
use crate::reader::ZipPackage;
use crate::validate::validate_hwpx_bytes;
use crate::writer::HwpFile;
use log::debug;
use std::path::Path;

/// Convert an in-memory HWP document into an HWPX package.
pub fn convert_to_package(file: &HwpFile) -> Result<ZipPackage> {
    let document = file.decode()?;

    // Attachments keep their HWP storage paths, so picture references in
    // the model resolve identically on the HWPX side.
    let mut bin_items = Vec::new();
    let mut attachment_parts = Vec::new();
    for (idx, entry) in file.list_images()?.iter().enumerate() {
        let data = file.image_data(&entry.path)?;
        let format = ImageFormat::from_bytes(&data)
            .or_else(|| ImageFormat::from_extension(&entry.extension));
        bin_items.push((format!("IMG{}", idx + 1), entry.path.clone(), format));
        attachment_parts.push((entry.path.clone(), data));
    }

    let mut package = ZipPackage::new();
    package.put_part("mimetype", MIMETYPE.to_vec());
    package.put_part(
        "version.xml",
        crate::hwpx::writer::generate_version_xml().into_bytes(),
    );
    package.put_part(
        "Contents/header.xml",
        emit_header_xml(&document.header, &bin_items, document.sections.len()).into_bytes(),
    );
    for (idx, section) in document.sections.iter().enumerate() {
        package.put_part(
            &format!("Contents/section{}.xml", idx),
            emit_section_xml(section, None, &bin_items).into_bytes(),
        );
    }
    package.put_part(
        "Contents/content.hpf",
        crate::hwpx::writer::generate_content_hpf(document.sections.len()).into_bytes(),
    );
    package.put_part(
        "settings.xml",
        crate::hwpx::writer::generate_settings_xml().into_bytes(),
    );
    package.put_part(
        "META-INF/container.xml",
        crate::hwpx::writer::generate_container_xml().into_bytes(),
    );
    package.put_part(
        "META-INF/manifest.xml",
        crate::hwpx::writer::generate_manifest_xml().into_bytes(),
    );
    for (path, data) in attachment_parts {
        package.put_part(&path, data);
    }

    debug!(
        "converted HWP -> HWPX: {} sections, {} attachments",
        document.sections.len(),
        bin_items.len()
    );
    Ok(package)
}

/// Convert `src` (HWP) to `dst` (HWPX). Refuses to overwrite an existing
/// destination unless `force` is set; the output is validated before it
/// touches disk.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, force: bool) -> Result<()> {
    let dst = dst.as_ref();
    if dst.exists() && !force {
        return Err(HwpError::Conflicting(format!(
            "destination '{}' exists; pass force to overwrite",
            dst.display()
        )));
    }

    let file = HwpFile::open(src)?;
    let package = convert_to_package(&file)?;
    let bytes = package.to_bytes()?;

    let report = validate_hwpx_bytes(&bytes)?;
    if !report.is_valid() {
        return Err(HwpError::Corrupt(format!(
            "conversion produced an invalid package: {}",
            report
        )));
    }

    crate::write_file_atomic(dst, &bytes)
}
