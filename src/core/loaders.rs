//! Readers for total-station field sheets.
//!
//! This module turns field sheets into an ordered list of [`MeasurementRecord`]s:
//! - Spreadsheets (`.xls`, `.xlsx`) with the measurements on one worksheet
//! - CSV exports of the same worksheet layout
//! - Word documents (`.docx`) holding the measurements in their first table
//!
//! Malformed numeric cells become `0.0` and rows without a station or target
//! are dropped. Only file-level problems are reported as errors.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::config::{DocumentLayout, SheetLayout};
use crate::processors::height::extract_height;

/// Errors that can occur while reading a field sheet.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Invalid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid document XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("No table found in document: {0}")]
    MissingTable(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Field sheet format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyFormat {
    /// Excel workbook (`.xls`, `.xlsx`)
    Spreadsheet,
    /// Comma-separated export of the worksheet layout
    Csv,
    /// Word document with a measurement table (`.docx`)
    Document,
}

impl SurveyFormat {
    /// Detect the format of `path` from its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xls" | "xlsx" => Some(SurveyFormat::Spreadsheet),
            "csv" => Some(SurveyFormat::Csv),
            "docx" => Some(SurveyFormat::Document),
            _ => None,
        }
    }
}

/// One total-station sight, as read from a field sheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Occupied point (EST)
    pub station_id: String,
    /// Sighted point (PV)
    pub target_id: String,
    /// Slope distance (DI)
    pub slope_distance: f64,
    /// Signed vertical angle in degrees
    pub vertical_angle_deg: f64,
    /// Target height (HT)
    pub target_height: f64,
    /// Instrument height (HB)
    pub instrument_height: f64,
    /// Observation notes, empty when the format has none
    pub raw_notes: String,
}

impl MeasurementRecord {
    /// Creates a record with zero heights and no notes.
    pub fn new(station_id: &str, target_id: &str, slope_distance: f64, vertical_angle_deg: f64) -> Self {
        Self {
            station_id: station_id.to_string(),
            target_id: target_id.to_string(),
            slope_distance,
            vertical_angle_deg,
            target_height: 0.0,
            instrument_height: 0.0,
            raw_notes: String::new(),
        }
    }

    /// Sets target and instrument heights.
    pub fn with_heights(mut self, target_height: f64, instrument_height: f64) -> Self {
        self.target_height = target_height;
        self.instrument_height = instrument_height;
        self
    }
}

/// Load measurement records from any supported field sheet.
///
/// # Errors
///
/// Returns [`LoaderError::UnsupportedFormat`] for unknown extensions, or the
/// underlying reader error when the file cannot be read.
pub fn load_survey<P: AsRef<Path>>(
    path: P,
    sheet: &SheetLayout,
    document: &DocumentLayout,
) -> Result<Vec<MeasurementRecord>> {
    let path = path.as_ref();
    match SurveyFormat::from_path(path) {
        Some(SurveyFormat::Spreadsheet) => load_spreadsheet(path, sheet),
        Some(SurveyFormat::Csv) => load_csv(path, sheet),
        Some(SurveyFormat::Document) => load_document(path, document),
        None => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Render an id cell as text. Whole numbers lose their fractional part.
fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => {
            format!("{}", *f as i64)
        }
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Read a numeric cell, substituting `0.0` for anything unusable.
fn cell_number(cell: Option<&Data>) -> f64 {
    match cell {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::Bool(b)) => f64::from(u8::from(*b)),
        Some(Data::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Parse a trimmed text field, `0.0` when empty or malformed.
fn text_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse().unwrap_or(0.0)
}

/// Build a record from worksheet-style cells.
///
/// `cell` returns the cell at an absolute column index. Returns `None` for
/// header rows and rows without station or target.
fn sheet_row_to_record<'a, F>(cell: F, layout: &SheetLayout) -> Option<MeasurementRecord>
where
    F: Fn(usize) -> Option<&'a Data>,
{
    let station = cell_text(cell(layout.station_col));
    if station == layout.header_marker {
        return None;
    }
    let target = cell_text(cell(layout.target_col));
    if station.is_empty() || target.is_empty() {
        return None;
    }

    let notes = cell_text(cell(layout.notes_col));
    let target_height = extract_height(&notes, &station, &target);

    Some(MeasurementRecord {
        slope_distance: cell_number(cell(layout.distance_col)),
        vertical_angle_deg: cell_number(cell(layout.angle_col)),
        target_height,
        instrument_height: cell_number(cell(layout.instrument_height_col)),
        raw_notes: notes,
        station_id: station,
        target_id: target,
    })
}

/// Convert a worksheet range to records, skipping its header row.
fn range_to_records(range: &Range<Data>, layout: &SheetLayout) -> Vec<MeasurementRecord> {
    // Ranges start at the first used cell, column indices are absolute
    let col_offset = range.start().map_or(0, |(_, col)| col as usize);

    range
        .rows()
        .skip(1)
        .enumerate()
        .filter_map(|(idx, row)| {
            let record = sheet_row_to_record(
                |col| col.checked_sub(col_offset).and_then(|c| row.get(c)),
                layout,
            );
            if record.is_none() {
                debug!("Skipping worksheet row {}", idx + 2);
            }
            record
        })
        .collect()
}

/// Load measurement records from an Excel workbook.
///
/// The worksheet named by `layout.sheet_name` is read; its first row is the
/// header. Target heights are extracted from the notes column.
///
/// # Errors
///
/// Returns an error if the workbook cannot be opened or the sheet is missing.
pub fn load_spreadsheet<P: AsRef<Path>>(path: P, layout: &SheetLayout) -> Result<Vec<MeasurementRecord>> {
    let mut workbook = open_workbook_auto(path.as_ref())?;
    let range = workbook.worksheet_range(&layout.sheet_name)?;
    Ok(range_to_records(&range, layout))
}

/// Load measurement records from a CSV export of the worksheet layout.
///
/// The first line is treated as the header. Rows may have any length;
/// missing cells read as empty.
pub fn load_csv<P: AsRef<Path>>(path: P, layout: &SheetLayout) -> Result<Vec<MeasurementRecord>> {
    let file = File::open(path.as_ref())?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let cells: Vec<Data> = row
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Data::Empty
                } else {
                    Data::String(field.to_string())
                }
            })
            .collect();

        if let Some(record) = sheet_row_to_record(|col| cells.get(col), layout) {
            records.push(record);
        }
    }

    Ok(records)
}

/// Read the `w:val` attribute of a `w:gridSpan` element.
fn grid_span(element: &BytesStart) -> usize {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"val")
        .and_then(|attr| std::str::from_utf8(&attr.value).ok()?.trim().parse().ok())
        .unwrap_or(1)
        .max(1)
}

/// Vertical merge role of a table cell (`w:vMerge`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerticalMerge {
    /// First cell of a merged block
    Restart,
    /// Cell covered by the block above it
    Continue,
}

fn vertical_merge(element: &BytesStart) -> VerticalMerge {
    let restart = element
        .attributes()
        .flatten()
        .any(|attr| attr.key.local_name().as_ref() == b"val" && attr.value.as_ref() == b"restart");
    if restart {
        VerticalMerge::Restart
    } else {
        VerticalMerge::Continue
    }
}

/// A table cell being read.
struct TableCell {
    text: String,
    span: usize,
    merge: Option<VerticalMerge>,
}

impl TableCell {
    fn new() -> Self {
        Self {
            text: String::new(),
            span: 1,
            merge: None,
        }
    }

    /// Record a `w:tcPr` child element.
    fn apply_property(&mut self, element: &BytesStart) {
        match element.local_name().as_ref() {
            b"gridSpan" => self.span = grid_span(element),
            b"vMerge" => self.merge = Some(vertical_merge(element)),
            _ => {}
        }
    }

    /// Append the cell to `row` once per grid column it covers.
    ///
    /// `merge_tops` holds the text of the open vertical merge per grid column.
    fn push_into(self, row: &mut Vec<String>, merge_tops: &mut HashMap<usize, String>) {
        let first_col = row.len();
        let text = match self.merge {
            Some(VerticalMerge::Continue) => merge_tops.get(&first_col).cloned().unwrap_or_default(),
            _ => self.text.trim().to_string(),
        };

        for col in first_col..first_col + self.span {
            match self.merge {
                Some(VerticalMerge::Restart) => {
                    merge_tops.insert(col, text.clone());
                }
                Some(VerticalMerge::Continue) => {}
                None => {
                    merge_tops.remove(&col);
                }
            }
            row.push(text.clone());
        }
    }
}

/// Extract the cell texts of the first top-level table in a WordprocessingML body.
///
/// Cells spanning several grid columns are repeated once per column, and
/// vertically merged cells repeat the text of the cell that opens the merge.
/// Only `w:t` run text counts: deleted revisions and field codes are left out.
/// Returns `None` when the document has no table.
pub fn parse_first_table(document_xml: &str) -> Result<Option<Vec<Vec<String>>>> {
    let mut reader = quick_xml::Reader::from_str(document_xml);

    let mut table_depth = 0usize;
    let mut found = false;
    let mut in_text = false;
    let mut deleted = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<TableCell> = None;
    let mut merge_tops: HashMap<usize, String> = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tbl" => {
                    found = true;
                    table_depth += 1;
                }
                _ if table_depth != 1 => {}
                b"tr" => row = Vec::new(),
                b"tc" => cell = Some(TableCell::new()),
                b"p" => {
                    if let Some(cell) = cell.as_mut() {
                        if !cell.text.is_empty() {
                            cell.text.push('\n');
                        }
                    }
                }
                b"t" => in_text = true,
                b"del" => deleted += 1,
                _ => {
                    if let Some(cell) = cell.as_mut() {
                        cell.apply_property(&e);
                    }
                }
            },
            Event::Empty(e) if table_depth == 1 => {
                if let Some(cell) = cell.as_mut() {
                    cell.apply_property(&e);
                }
            }
            Event::Text(t) if table_depth == 1 && in_text && deleted == 0 => {
                if let Some(cell) = cell.as_mut() {
                    cell.text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        break;
                    }
                }
                _ if table_depth != 1 => {}
                b"tr" => rows.push(std::mem::take(&mut row)),
                b"tc" => {
                    if let Some(cell) = cell.take() {
                        cell.push_into(&mut row, &mut merge_tops);
                    }
                }
                b"t" => in_text = false,
                b"del" => deleted = deleted.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found.then_some(rows))
}

/// Build a record from a document table row.
fn table_row_to_record(cells: &[String], layout: &DocumentLayout) -> Option<MeasurementRecord> {
    if cells.len() < layout.min_cells {
        return None;
    }

    let get = |idx: usize| cells.get(idx).map(|s| s.trim()).unwrap_or("");

    let station = get(layout.station_cell);
    let target = get(layout.target_cell);
    if station.is_empty() || target.is_empty() || station == layout.header_marker {
        return None;
    }

    // Upward sights fill the positive column, downward ones the negative
    let positive = get(layout.angle_positive_cell);
    let negative = get(layout.angle_negative_cell);
    let vertical_angle_deg = if !positive.is_empty() {
        positive.parse().unwrap_or(0.0)
    } else if !negative.is_empty() {
        negative.parse::<f64>().map(|v| -v).unwrap_or(0.0)
    } else {
        0.0
    };

    Some(MeasurementRecord {
        station_id: station.to_string(),
        target_id: target.to_string(),
        slope_distance: text_number(get(layout.distance_cell)),
        vertical_angle_deg,
        target_height: text_number(get(layout.target_height_cell)),
        instrument_height: text_number(get(layout.instrument_height_cell)),
        raw_notes: String::new(),
    })
}

/// Load measurement records from the first table of a `.docx` file.
///
/// The first table row is the header. Heights come straight from their
/// columns; the document layout carries no notes.
///
/// # Errors
///
/// Returns an error if the archive or its XML is invalid, or
/// [`LoaderError::MissingTable`] if the document has no table.
pub fn load_document<P: AsRef<Path>>(path: P, layout: &DocumentLayout) -> Result<Vec<MeasurementRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let rows = parse_first_table(&xml)?.ok_or_else(|| LoaderError::MissingTable(path.to_path_buf()))?;

    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|cells| table_row_to_record(cells, layout))
        .collect())
}
