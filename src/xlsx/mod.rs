//! XLSX codec for [`Workbook`].
//!
//! Reading keeps only what the grid needs: sheet names, cell values and merge
//! ranges. Shared, inline and formula-cached strings all become
//! [`Value::Str`](crate::record::Value::Str); numbers become the narrowest of
//! integer, unsigned or float that parses. Writing produces a minimal package
//! with inline strings and two cell formats for header and body ranges.

mod reader;
mod writer;

use crate::backend::Workbook;
use crate::error::Result;

/// Load a workbook from XLSX bytes.
pub fn read(data: &[u8]) -> Result<Workbook> {
    reader::read_workbook(data)
}

/// Serialize a workbook to XLSX bytes.
pub fn write(workbook: &Workbook) -> Result<Vec<u8>> {
    writer::write_workbook(workbook)
}
