use artist_splitter::downloader::to_xlsx;
use artist_splitter::loader::{from_excel, load_table};
use artist_splitter::regroup::{HeaderLocation, split_table};
use artist_splitter::table::{CellValue, RawTable};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

// Read one sheet of a generated workbook back into a table, A1-aligned
fn read_sheet(bytes: &[u8], name: &str) -> RawTable {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range(name).unwrap();
    let (first_row, first_col) = range.start().unwrap_or((0, 0));

    let mut table: RawTable = vec![Vec::new(); first_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; first_col as usize];
        cells.extend(row.iter().map(|d| match d {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::text(s.as_str()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime {
                serial: dt.as_f64(),
            },
            other => CellValue::Text(other.to_string()),
        }));
        table.push(cells);
    }
    table
}

fn sheet_names(bytes: &[u8]) -> Vec<String> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    workbook.sheet_names().to_vec()
}

// Title on A1, header on row 3 starting in column B
fn royalty_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Q3 royalties").unwrap();
    sheet.write_string(2, 1, "Track").unwrap();
    sheet.write_string(2, 2, "Artist").unwrap();
    sheet.write_string(2, 3, "Plays").unwrap();
    sheet.write_string(3, 1, "Song A").unwrap();
    sheet.write_string(3, 2, "Bob").unwrap();
    sheet.write_number(3, 3, 10.0).unwrap();
    sheet.write_string(4, 1, "Song B").unwrap();
    sheet.write_string(4, 2, "Ann").unwrap();
    sheet.write_number(4, 3, 5.0).unwrap();
    sheet.write_string(5, 1, "Song C").unwrap();
    sheet.write_string(5, 2, "Bob").unwrap();
    sheet.write_number(5, 3, 7.5).unwrap();
    sheet.write_string(6, 1, "Song D").unwrap();
    sheet.write_boolean(6, 3, true).unwrap();
    workbook.save_to_buffer().unwrap()
}

#[test]
fn test_excel_header_found_below_title() {
    let table = from_excel(royalty_workbook()).unwrap();
    let (location, blocks) = split_table(&table, "artist").unwrap();

    assert_eq!(location, HeaderLocation { row: 2, col: 2 });
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].name, "Bob");
    assert_eq!(blocks[0].rows.len(), 3);
    assert_eq!(blocks[1].name, "Ann");
}

#[test]
fn test_excel_used_range_offset_is_padded() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(2, 1, "id").unwrap();
    sheet.write_string(2, 2, "artist").unwrap();
    sheet.write_string(3, 1, "1").unwrap();
    sheet.write_string(3, 2, "Cher").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let table = load_table("offset.xlsx", bytes).unwrap();
    assert_eq!(table.len(), 4);
    assert!(table[0].is_empty() && table[1].is_empty());
    assert_eq!(table[2][0], CellValue::Empty);
    assert_eq!(table[2][2], CellValue::text("artist"));
}

#[test]
fn test_split_workbook_round_trip() {
    let table = from_excel(royalty_workbook()).unwrap();
    let (_, blocks) = split_table(&table, "artist").unwrap();
    let bytes = to_xlsx(&blocks).unwrap();

    assert_eq!(sheet_names(&bytes), vec!["Bob", "Ann"]);

    let bob = read_sheet(&bytes, "Bob");
    assert_eq!(bob.len(), 3);
    assert_eq!(bob[0][2], CellValue::text("Artist"));
    assert_eq!(bob[1][1], CellValue::text("Song A"));
    assert_eq!(bob[1][3], CellValue::Number(10.0));
    assert_eq!(bob[2][3], CellValue::Number(7.5));

    let ann = read_sheet(&bytes, "Ann");
    assert_eq!(ann.len(), 2);
    assert_eq!(ann[1][3], CellValue::Number(5.0));
}

#[test]
fn test_clashing_sheet_names_are_disambiguated() {
    let csv = concat!(
        "artist,n\n",
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcde-one,1\n",
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcde-two,2\n",
        "abc,3\n",
        "ABC,4\n",
    );
    let table = load_table("clash.csv", csv.as_bytes().to_vec()).unwrap();
    let (_, blocks) = split_table(&table, "artist").unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0].name, blocks[1].name);

    let bytes = to_xlsx(&blocks).unwrap();
    assert_eq!(
        sheet_names(&bytes),
        vec![
            "ABCDEFGHIJKLMNOPQRSTUVWXYZabcde",
            "ABCDEFGHIJKLMNOPQRSTUVWXYZabcd1",
            "abc",
            "ABC1",
        ]
    );
    assert_eq!(read_sheet(&bytes, "ABC1")[1][1], CellValue::text("4"));
}

#[test]
fn test_csv_cells_stay_text() {
    let table = load_table("plays.csv", b"artist,plays\nBob,0012\n".to_vec()).unwrap();
    let (_, blocks) = split_table(&table, "artist").unwrap();
    let bytes = to_xlsx(&blocks).unwrap();
    assert_eq!(read_sheet(&bytes, "Bob")[1][1], CellValue::text("0012"));
}

#[test]
fn test_dates_stay_dates() {
    let date = Format::new().set_num_format("dd/mm/yyyy");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Artist").unwrap();
    sheet.write_string(0, 1, "Released").unwrap();
    sheet.write_string(1, 0, "Bob").unwrap();
    sheet.write_number_with_format(1, 1, 45566.0, &date).unwrap();
    sheet.write_string(2, 0, "Ann").unwrap();
    sheet.write_number_with_format(2, 1, 45566.0, &date).unwrap();
    let table = from_excel(workbook.save_to_buffer().unwrap()).unwrap();
    assert_eq!(table[1][1], CellValue::DateTime { serial: 45566.0 });

    let (_, blocks) = split_table(&table, "artist").unwrap();
    let bytes = to_xlsx(&blocks).unwrap();
    assert_eq!(
        read_sheet(&bytes, "Bob")[1][1],
        CellValue::DateTime { serial: 45566.0 }
    );

    // grouping on the date column keys by the date text
    let (_, blocks) = split_table(&table, "released").unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "2024-10-01");
    assert_eq!(blocks[0].rows.len(), 3);
}
