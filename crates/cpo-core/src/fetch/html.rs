//! Availability table extraction built on `lol_html`.
//!
//! The HTML variant of the payload lays carparks out as
//! `.divTable > .divTableRow > .divTableCell`.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::errors::RewritingError;
use lol_html::{element, text, HtmlRewriter, OutputSink, Settings};

const TABLE: &str = ".divTable";
const ROW: &str = ".divTable .divTableRow";
const CELL: &str = ".divTable .divTableRow .divTableCell";

/// Cell text of every table row, or `None` when the document has no table.
#[derive(Debug, Default)]
struct TableCollector {
    saw_table: bool,
    rows: Vec<Vec<String>>,
}

/// Extract trimmed cell texts of each `.divTableRow`.
pub fn extract_table_rows(html: &str) -> Result<Option<Vec<Vec<String>>>, RewritingError> {
    let collector = Rc::new(RefCell::new(TableCollector::default()));

    let on_table = Rc::clone(&collector);
    let on_row = Rc::clone(&collector);
    let on_cell = Rc::clone(&collector);
    let on_text = Rc::clone(&collector);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!(TABLE, move |_el| {
                    on_table.borrow_mut().saw_table = true;
                    Ok(())
                }),
                element!(ROW, move |_el| {
                    on_row.borrow_mut().rows.push(Vec::new());
                    Ok(())
                }),
                element!(CELL, move |_el| {
                    if let Some(row) = on_cell.borrow_mut().rows.last_mut() {
                        row.push(String::new());
                    }
                    Ok(())
                }),
                text!(CELL, move |chunk| {
                    let mut collector = on_text.borrow_mut();
                    if let Some(cell) = collector.rows.last_mut().and_then(|r| r.last_mut()) {
                        cell.push_str(chunk.as_str());
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        NoopSink,
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    let collector = collector.take();
    if !collector.saw_table {
        return Ok(None);
    }

    let rows = collector
        .rows
        .into_iter()
        .map(|row| row.iter().map(|cell| squash(cell)).collect())
        .collect();
    Ok(Some(rows))
}

/// Trim and collapse whitespace the way a browser renders cell text.
fn squash(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}
