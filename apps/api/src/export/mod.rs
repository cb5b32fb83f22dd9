//! Aggregator / Exporter: parsed records → table → `.xlsx` bytes.
//!
//! Columns are the union of keys across records in first-seen order. Rows keep
//! processing order; a record without a column leaves that cell empty.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use thiserror::Error;

use crate::resumes::models::ResumeRecord;

pub const EXPORT_FILE_NAME: &str = "parsed_resumes.xlsx";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No records to export")]
    Empty,

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl ResumeTable {
    pub fn from_records(records: &[ResumeRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.fields().keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned())
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Serializes the table as a single-sheet workbook with a bold header row.
pub fn to_xlsx(table: &ResumeTable) -> Result<Vec<u8>, ExportError> {
    if table.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (col, header) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header.as_str(), &header_format)?;
    }

    for (row_index, row) in table.rows.iter().enumerate() {
        let row_num = (row_index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                write_cell(sheet, row_num, col as u16, value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::String(s) => {
            sheet.write_string(row, col, s.as_str())?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                sheet.write_number(row, col, f)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string().as_str())?;
            }
        },
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Array(_) | Value::Object(_) => {
            sheet.write_string(row, col, value.to_string().as_str())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use serde_json::{json, Map};

    fn record(file_name: &str, value: Value) -> ResumeRecord {
        let fields: Map<String, Value> = value.as_object().cloned().unwrap();
        ResumeRecord::new(file_name, fields).unwrap()
    }

    fn read_back(bytes: Vec<u8>) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let records = vec![
            record("a.pdf", json!({"Name": "A", "Email": "a@x.com"})),
            record("b.docx", json!({"Name": "B", "Phone": "123"})),
        ];
        let table = ResumeTable::from_records(&records);

        assert_eq!(table.columns, vec!["Name", "Email", "File Name", "Phone"]);
        assert_eq!(
            table.rows[1],
            vec![
                Some(json!("B")),
                None,
                Some(json!("b.docx")),
                Some(json!("123"))
            ]
        );
    }

    #[test]
    fn test_rows_keep_processing_order_without_dedup() {
        let records = vec![
            record("z.pdf", json!({"Name": "Same"})),
            record("a.pdf", json!({"Name": "Same"})),
        ];
        let table = ResumeTable::from_records(&records);
        let col = table.column_index("File Name").unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][col], Some(json!("z.pdf")));
        assert_eq!(table.rows[1][col], Some(json!("a.pdf")));
    }

    #[test]
    fn test_empty_table_is_not_exported() {
        let table = ResumeTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(matches!(to_xlsx(&table), Err(ExportError::Empty)));
    }

    #[test]
    fn test_xlsx_round_trips_header_and_cells() {
        let records = vec![
            record(
                "jane.pdf",
                json!({
                    "Name": "Jane Doe",
                    "Email": "jane@example.com",
                    "Years of Experience": 7
                }),
            ),
            record("john.docx", json!({"Name": "John Smith", "Location": "Austin"})),
        ];
        let bytes = to_xlsx(&ResumeTable::from_records(&records)).unwrap();
        let rows = read_back(bytes);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            vec![
                Data::String("Name".to_string()),
                Data::String("Email".to_string()),
                Data::String("Years of Experience".to_string()),
                Data::String("File Name".to_string()),
                Data::String("Location".to_string()),
            ]
        );
        assert_eq!(rows[1][0], Data::String("Jane Doe".to_string()));
        assert_eq!(rows[1][2], Data::Float(7.0));
        assert_eq!(rows[1][3], Data::String("jane.pdf".to_string()));
        assert_eq!(rows[2][1], Data::Empty);
        assert_eq!(rows[2][3], Data::String("john.docx".to_string()));
        assert_eq!(rows[2][4], Data::String("Austin".to_string()));
    }

    #[test]
    fn test_nested_values_are_written_as_json_text() {
        let records = vec![record("a.pdf", json!({"Skills": ["Rust", "SQL"], "Remote": true}))];
        let rows = read_back(to_xlsx(&ResumeTable::from_records(&records)).unwrap());

        assert_eq!(rows[1][0], Data::String(r#"["Rust","SQL"]"#.to_string()));
        assert_eq!(rows[1][1], Data::Bool(true));
    }
}
