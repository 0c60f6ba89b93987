// XML sheet format
//
// <?xml version="1.0" encoding="UTF-8"?>
// <spreadsheet IsValid="^.*$">
//   <cell name="A1" contents="3"/>
//   <cell name="B1" contents="=A1*2"/>
// </spreadsheet>
//
// IsValid is the sheet's name pattern. contents is the raw input that
// recreates the cell: a number, verbatim text, or "=" and the formula.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use cellgraph_engine::cell_name;
use cellgraph_engine::{NameValidator, SheetError, Spreadsheet};

const ROOT: &[u8] = b"spreadsheet";
const CELL: &[u8] = b"cell";

#[derive(Debug, thiserror::Error)]
pub enum SheetLoadError {
    #[error("cannot read sheet: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("not a sheet file: {0}")]
    Schema(String),

    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cell {name}: {source}")]
    Cell {
        name: String,
        #[source]
        source: SheetError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("cannot write sheet: {0}")]
    Io(#[from] std::io::Error),
}

fn schema(msg: impl Into<String>) -> SheetLoadError {
    SheetLoadError::Schema(msg.into())
}

/// Where the reader is relative to the root element.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeRoot,
    InRoot,
    InCell,
    AfterRoot,
}

/// Read a sheet, replaying every cell through `set_contents_of_cell` in
/// file order. The loaded sheet is not marked changed.
pub fn load_sheet<R: BufRead>(source: R) -> Result<Spreadsheet, SheetLoadError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut sheet: Option<Spreadsheet> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut position = Position::BeforeRoot;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match (e.name().as_ref(), position) {
                    (ROOT, Position::BeforeRoot) => {
                        let pattern = required_attr(e, b"IsValid", "<spreadsheet>")?;
                        let validator = NameValidator::new(&pattern)
                            .map_err(|source| SheetLoadError::InvalidPattern { pattern, source })?;
                        sheet = Some(Spreadsheet::with_validator(validator));
                        position = if is_empty { Position::AfterRoot } else { Position::InRoot };
                    }
                    (CELL, Position::InRoot) => {
                        let name = required_attr(e, b"name", "<cell>")?;
                        let contents = required_attr(e, b"contents", "<cell>")?;

                        if !seen.insert(cell_name::canonicalize(&name)) {
                            return Err(schema(format!("duplicate cell {}", name)));
                        }
                        if let Some(sheet) = sheet.as_mut() {
                            sheet
                                .set_contents_of_cell(&name, &contents)
                                .map_err(|source| SheetLoadError::Cell { name, source })?;
                        }
                        if !is_empty {
                            position = Position::InCell;
                        }
                    }
                    (other, _) => {
                        return Err(schema(format!(
                            "unexpected element <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                }
            }
            Event::End(ref e) => match (e.name().as_ref(), position) {
                (CELL, Position::InCell) => position = Position::InRoot,
                (ROOT, Position::InRoot) => position = Position::AfterRoot,
                (other, _) => {
                    return Err(schema(format!(
                        "unexpected </{}>",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Event::Eof => break,
            // Declaration, comments, whitespace
            _ => {}
        }
        buf.clear();
    }

    match (sheet, position) {
        (Some(mut sheet), Position::AfterRoot) => {
            sheet.mark_saved();
            log::info!("Loaded sheet with {} cells", sheet.len());
            Ok(sheet)
        }
        (None, _) => Err(schema("missing <spreadsheet> element")),
        (Some(_), _) => Err(schema("unterminated <spreadsheet> element")),
    }
}

/// Unescaped value of a required attribute.
fn required_attr(e: &BytesStart, key: &[u8], element: &str) -> Result<String, SheetLoadError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            let raw = String::from_utf8_lossy(&attr.value);
            let value = quick_xml::escape::unescape(&raw).map_err(quick_xml::Error::from)?;
            return Ok(value.into_owned());
        }
    }
    Err(schema(format!(
        "{} is missing the {} attribute",
        element,
        String::from_utf8_lossy(key)
    )))
}

pub fn load_from_path(path: &Path) -> Result<Spreadsheet, SheetLoadError> {
    let file = File::open(path)?;
    let sheet = load_sheet(BufReader::new(file))?;
    log::info!("Opened {}", path.display());
    Ok(sheet)
}

/// Write every non-empty cell, sorted by position, and clear the sheet's
/// `changed` flag. On failure the flag is left as it was.
pub fn save_sheet<W: Write>(sheet: &mut Spreadsheet, dest: W) -> Result<(), SaveError> {
    write_sheet(sheet, dest)?;
    sheet.mark_saved();
    Ok(())
}

fn write_sheet<W: Write>(sheet: &Spreadsheet, dest: W) -> Result<(), SaveError> {
    let mut writer = Writer::new_with_indent(dest, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("spreadsheet");
    root.push_attribute(("IsValid", sheet.validator().pattern()));
    writer.write_event(Event::Start(root))?;

    for (name, cell) in sheet.cells_by_position() {
        let contents = cell.contents.to_string();
        let mut elem = BytesStart::new("cell");
        elem.push_attribute(("name", name));
        elem.push_attribute(("contents", contents.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new("spreadsheet")))?;

    let mut dest = writer.into_inner();
    dest.write_all(b"\n")?;
    dest.flush()?;
    Ok(())
}

pub fn save_to_path(sheet: &mut Spreadsheet, path: &Path) -> Result<(), SaveError> {
    let file = File::create(path)?;
    save_sheet(sheet, BufWriter::new(file))?;
    log::info!("Saved {} cells to {}", sheet.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_engine::{CellContents, CellValue};

    fn to_xml(sheet: &mut Spreadsheet) -> String {
        let mut out = Vec::new();
        save_sheet(sheet, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn from_xml(xml: &str) -> Result<Spreadsheet, SheetLoadError> {
        load_sheet(xml.as_bytes())
    }

    #[test]
    fn test_save_format() {
        let mut sheet = Spreadsheet::new();
        sheet.set_contents_of_cell("B1", "=a1*2").unwrap();
        sheet.set_contents_of_cell("A1", "3").unwrap();

        let xml = to_xml(&mut sheet);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <spreadsheet IsValid=\"^.*$\">\n  \
             <cell name=\"A1\" contents=\"3\"/>\n  \
             <cell name=\"B1\" contents=\"=A1*2\"/>\n\
             </spreadsheet>\n"
        );
    }

    #[test]
    fn test_save_clears_changed() {
        let mut sheet = Spreadsheet::new();
        sheet.set_contents_of_cell("A1", "1").unwrap();
        assert!(sheet.changed());
        to_xml(&mut sheet);
        assert!(!sheet.changed());
    }

    /// Writer that fails after accepting `budget` bytes.
    struct FailingWriter {
        budget: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_save_keeps_changed() {
        let mut sheet = Spreadsheet::new();
        sheet.set_contents_of_cell("A1", "1").unwrap();
        sheet.set_contents_of_cell("B1", "=A1+1").unwrap();

        for budget in [0, 10, 60] {
            let result = save_sheet(&mut sheet, FailingWriter { budget });
            assert!(matches!(result, Err(SaveError::Io(_))), "budget {}", budget);
            assert!(sheet.changed());
        }
    }

    #[test]
    fn test_save_escapes_text() {
        let mut sheet = Spreadsheet::new();
        sheet.set_contents_of_cell("A1", "a < b & \"c\"").unwrap();
        let xml = to_xml(&mut sheet);
        assert!(xml.contains("&lt;"));
        assert!(xml.contains("&amp;"));

        let loaded = from_xml(&xml).unwrap();
        assert_eq!(
            loaded.cell_contents("A1").unwrap(),
            &CellContents::Text("a < b & \"c\"".to_string())
        );
    }

    #[test]
    fn test_load_replays_and_recalculates() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <spreadsheet IsValid="^.*$">
              <cell name="B1" contents="=A1*2"/>
              <cell name="A1" contents="4"/>
            </spreadsheet>"#;
        let sheet = from_xml(xml).unwrap();
        assert_eq!(sheet.cell_value("B1").unwrap(), &CellValue::Number(8.0));
        assert!(!sheet.changed());
    }

    #[test]
    fn test_load_restores_validator() {
        let xml = r#"<spreadsheet IsValid="^[A-B][0-9]$"><cell name="A1" contents="1"/></spreadsheet>"#;
        let mut sheet = from_xml(xml).unwrap();
        assert_eq!(sheet.validator().pattern(), "^[A-B][0-9]$");
        assert!(sheet.set_contents_of_cell("C1", "1").is_err());
    }

    #[test]
    fn test_load_accepts_open_close_cells() {
        let xml = r#"<spreadsheet IsValid="^.*$"><cell name="A1" contents="x"></cell></spreadsheet>"#;
        let sheet = from_xml(xml).unwrap();
        assert_eq!(sheet.cell_value("A1").unwrap(), &CellValue::Text("x".to_string()));
    }

    #[test]
    fn test_load_empty_sheet() {
        let sheet = from_xml(r#"<spreadsheet IsValid="^.*$"/>"#).unwrap();
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_load_rejects_cycle() {
        let xml = r#"<spreadsheet IsValid="^.*$">
              <cell name="A1" contents="=B1"/>
              <cell name="B1" contents="=A1"/>
            </spreadsheet>"#;
        match from_xml(xml) {
            Err(SheetLoadError::Cell { name, source }) => {
                assert_eq!(name, "B1");
                assert!(matches!(source, SheetError::CircularDependency(_)));
            }
            other => panic!("expected cell error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_load_rejects_bad_cells() {
        let bad_name = r#"<spreadsheet IsValid="^.*$"><cell name="1A" contents="1"/></spreadsheet>"#;
        assert!(matches!(from_xml(bad_name), Err(SheetLoadError::Cell { .. })));

        let bad_formula = r#"<spreadsheet IsValid="^.*$"><cell name="A1" contents="=1+"/></spreadsheet>"#;
        assert!(matches!(from_xml(bad_formula), Err(SheetLoadError::Cell { .. })));

        let duplicate = r#"<spreadsheet IsValid="^.*$">
              <cell name="A1" contents="1"/>
              <cell name="a1" contents="2"/>
            </spreadsheet>"#;
        assert!(matches!(from_xml(duplicate), Err(SheetLoadError::Schema(_))));
    }

    #[test]
    fn test_load_rejects_bad_structure() {
        let cases = [
            "",
            r#"<cell name="A1" contents="1"/>"#,
            r#"<spreadsheet><cell name="A1" contents="1"/></spreadsheet>"#,
            r#"<spreadsheet IsValid="^.*$"><cell contents="1"/></spreadsheet>"#,
            r#"<spreadsheet IsValid="^.*$"><row/></spreadsheet>"#,
            r#"<spreadsheet IsValid="^.*$"><cell name="A1" contents="1">"#,
            r#"<spreadsheet IsValid="^.*$"/><spreadsheet IsValid="^.*$"/>"#,
        ];
        for xml in cases {
            assert!(
                matches!(from_xml(xml), Err(SheetLoadError::Schema(_) | SheetLoadError::Xml(_))),
                "expected rejection of {:?}",
                xml
            );
        }
    }

    #[test]
    fn test_load_rejects_bad_pattern() {
        let xml = r#"<spreadsheet IsValid="["></spreadsheet>"#;
        assert!(matches!(from_xml(xml), Err(SheetLoadError::InvalidPattern { .. })));
    }

    #[test]
    fn test_load_rejects_malformed_xml() {
        let xml = r#"<spreadsheet IsValid="^.*$"><cell name="A1" contents="1"/></sheet>"#;
        assert!(matches!(from_xml(xml), Err(SheetLoadError::Xml(_))));
    }

    #[test]
    fn test_xml_errors_keep_their_source() {
        use std::error::Error as _;

        let bad_entity = r#"<spreadsheet IsValid="^.*$"><cell name="A1" contents="&bogus;"/></spreadsheet>"#;
        let bad_attr = r#"<spreadsheet IsValid="^.*$"><cell name="A1" name="B1" contents="1"/></spreadsheet>"#;
        for xml in [bad_entity, bad_attr] {
            let err = from_xml(xml).err().unwrap();
            assert!(matches!(err, SheetLoadError::Xml(_)), "{:?}", err);
            assert!(err.source().is_some(), "{:?}", err);
        }
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xml");

        let mut sheet = Spreadsheet::new();
        sheet.set_contents_of_cell("A1", "2.5").unwrap();
        sheet.set_contents_of_cell("A2", "=A1*4").unwrap();
        sheet.set_contents_of_cell("C7", "note").unwrap();
        save_to_path(&mut sheet, &path).unwrap();

        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.cell_value("A2").unwrap(), &CellValue::Number(10.0));
        assert_eq!(loaded.cell_contents("C7").unwrap(), &CellContents::Text("note".to_string()));
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_from_path(&dir.path().join("nope.xml"));
        assert!(matches!(result, Err(SheetLoadError::Io(_))));
    }
}
