use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Cell text by spreadsheet position: `rows[0]` is sheet row 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map(|r| r.iter().all(|c| c.trim().is_empty()))
            .unwrap_or(true)
    }
}

pub fn detect_format(bytes: &[u8]) -> SheetFormat {
    if bytes.starts_with(ZIP_MAGIC) {
        SheetFormat::Xlsx
    } else {
        SheetFormat::Csv
    }
}

pub fn read_sheet(bytes: &[u8]) -> anyhow::Result<Sheet> {
    match detect_format(bytes) {
        SheetFormat::Xlsx => read_xlsx(bytes),
        SheetFormat::Csv => {
            let text = std::str::from_utf8(bytes).context("spreadsheet is neither XLSX nor UTF-8 CSV")?;
            Ok(read_csv(text))
        }
    }
}

pub fn write_sheet(sheet: &Sheet, format: SheetFormat) -> anyhow::Result<Vec<u8>> {
    match format {
        SheetFormat::Csv => Ok(write_csv(sheet).into_bytes()),
        SheetFormat::Xlsx => write_xlsx(sheet),
    }
}

/// One record per spreadsheet row. Quoted fields may span line breaks
/// (Excel's Alt+Enter), so records are split on unquoted newlines only.
pub fn read_csv(text: &str) -> Sheet {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut open_record = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        open_record = true;
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && matches!(chars.peek(), Some(&'\n') | None) => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut record));
                open_record = false;
            }
            _ => field.push(ch),
        }
    }
    if open_record {
        record.push(field);
        rows.push(record);
    }
    Sheet { rows }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn write_csv(sheet: &Sheet) -> String {
    let mut out = String::new();
    for row in &sheet.rows {
        let line = row.iter().map(|c| csv_quote(c)).collect::<Vec<_>>().join(",");
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

fn read_xlsx(bytes: &[u8]) -> anyhow::Result<Sheet> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("failed to open workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .context("failed to read first worksheet")?;

    // Ranges start at the first used cell; re-anchor at A1 so row numbers
    // match what the operator sees.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows = vec![Vec::new(); row_offset];
    for data_row in range.rows() {
        let mut row = vec![String::new(); col_offset];
        row.extend(data_row.iter().map(cell_text));
        rows.push(row);
    }
    Ok(Sheet { rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Whole numbers come back as floats; ids like 1001 must not read "1001.0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Marks" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf/></cellStyleXfs><cellXfs count="1"><xf xfId="0"/></cellXfs></styleSheet>"#;

fn worksheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in sheet.rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_letters(c),
                r + 1,
                xml_escape(value)
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Minimal single-sheet workbook; every cell is an inline string.
fn write_xlsx(sheet: &Sheet) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", WORKBOOK_XML.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/styles.xml", STYLES_XML.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(sheet)),
    ];
    for (name, body) in parts {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write entry {name}"))?;
    }

    let cursor = zip.finish().context("failed to finalize workbook")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Sheet {
        Sheet {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn csv_handles_quotes_bom_and_crlf() {
        let sheet = read_csv("\u{feff}Student ID,Name\r\nU1,\"Smith, \"\"Jo\"\"\"\r\n\r\nU2,Lee");
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.cell(0, 0), "Student ID");
        assert_eq!(sheet.cell(1, 1), "Smith, \"Jo\"");
        assert!(sheet.row_is_blank(2));
        assert_eq!(sheet.cell(3, 0), "U2");
        assert_eq!(sheet.cell(3, 7), "");
    }

    #[test]
    fn quoted_line_breaks_stay_inside_one_row() {
        let sheet = read_csv("Student ID,Comment,Mid\nU1001,\"line1\r\nline2\",25\nU1002,ok,10\n");
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.cell(1, 1), "line1\r\nline2");
        assert_eq!(sheet.cell(1, 2), "25");
        assert_eq!(sheet.cell(2, 0), "U1002");
    }

    #[test]
    fn csv_writer_quotes_only_when_needed() {
        let out = write_csv(&grid(&[&["a", "b,c", "d\"e"]]));
        assert_eq!(out, "a,\"b,c\",\"d\"\"e\"\r\n");
    }

    #[test]
    fn format_is_detected_from_content() {
        assert_eq!(detect_format(b"PK\x03\x04rest"), SheetFormat::Xlsx);
        assert_eq!(detect_format(b"Student ID,Mid"), SheetFormat::Csv);
        assert_eq!(SheetFormat::parse("XLSX"), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::parse("ods"), None);
    }

    #[test]
    fn column_letters_cover_two_letter_columns() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(8), "I");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
    }

    #[test]
    fn written_workbook_reads_back_with_blank_cells_preserved() {
        let sheet = grid(&[
            &["Student ID", "First Name", "Mid Exam (/20)"],
            &["U1001", "Ada & Co", ""],
            &["U1002", "<Grace>", "17"],
        ]);
        let bytes = write_sheet(&sheet, SheetFormat::Xlsx).expect("write");
        assert_eq!(detect_format(&bytes), SheetFormat::Xlsx);

        let back = read_sheet(&bytes).expect("read");
        assert_eq!(back.cell(0, 2), "Mid Exam (/20)");
        assert_eq!(back.cell(1, 1), "Ada & Co");
        assert_eq!(back.cell(1, 2), "");
        assert_eq!(back.cell(2, 1), "<Grace>");
        assert_eq!(back.cell(2, 2), "17");
    }

    #[test]
    fn unreadable_bytes_are_an_error() {
        assert!(read_sheet(b"PK\x03\x04not really a zip").is_err());
        assert!(read_sheet(&[0xff, 0xfe, 0x00, 0x41]).is_err());
    }
}
