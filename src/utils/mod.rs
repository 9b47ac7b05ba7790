pub mod compression;
pub mod encoding;

/// Lengths on the wire are HWPUNITs: 1/7200 of an inch.
pub fn mm_to_hwpunit(mm: f64) -> u32 {
    (mm * 7200.0 / 25.4).round() as u32
}
