//! Dump command implementation.

use super::{open, CliResult};
use relsync_engine::{EngineConfig, LogProgress};
use relsync_testkit::{Author, Book, Library, Publisher};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// The loaded library, in load order.
#[derive(Debug, Serialize)]
pub struct DumpResult<'a> {
    /// Publishers by name.
    pub publishers: Vec<&'a Publisher>,
    /// Authors by name.
    pub authors: Vec<&'a Author>,
    /// Books by author, then title.
    pub books: Vec<&'a Book>,
}

impl<'a> DumpResult<'a> {
    /// Borrows every live item of `library`.
    pub fn new(library: &'a Library) -> Self {
        Self {
            publishers: library.publishers.live().collect(),
            authors: library.authors.live().collect(),
            books: library.books.live().collect(),
        }
    }
}

/// Loads the library and prints it.
pub fn run(path: &Path, config: EngineConfig, format: &str) -> CliResult {
    let mut engine = open(path, config)?;
    let Some(library) = engine.load_database(&mut LogProgress::new())? else {
        return Err("Load was cancelled".into());
    };
    let dump = DumpResult::new(&library);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&dump)?),
        "text" => print!("{}", render_text(&dump)),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn render_text(dump: &DumpResult<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "publisher ({})", dump.publishers.len());
    for p in &dump.publishers {
        let _ = writeln!(out, "  #{} {} [{}]", p.id, p.name, p.city.as_deref().unwrap_or("-"));
    }
    let _ = writeln!(out, "author ({})", dump.authors.len());
    for a in &dump.authors {
        let born = a.born.map_or_else(|| "-".to_owned(), |d| d.to_string());
        let _ = writeln!(out, "  #{} {}, {} (born {born})", a.id, a.last_name, a.first_name);
    }
    let _ = writeln!(out, "book ({})", dump.books.len());
    for b in &dump.books {
        let price = b.price.map_or_else(|| "-".to_owned(), |p| p.to_string());
        let _ = writeln!(
            out,
            "  #{} {} by #{}, {} pages, {price}{}",
            b.id,
            b.title,
            b.author,
            b.pages,
            if b.in_print { "" } else { ", out of print" }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_testkit::sample_library;

    #[test]
    fn text_lists_every_table() {
        let library = sample_library();
        let text = render_text(&DumpResult::new(&library));
        assert!(text.starts_with("publisher (2)\n  #1 Penguin [London]\n"));
        assert!(text.contains("  #2 Austen, Jane (born 1775-12-16)\n"));
        assert!(text.contains("  #3 Emma by #2, 474 pages, -, out of print\n"));
    }

    #[test]
    fn json_uses_plain_dates_and_prices() {
        let library = sample_library();
        let json = serde_json::to_value(DumpResult::new(&library)).unwrap();
        assert_eq!(json["books"][0]["published"], "1925-05-14");
        assert_eq!(json["books"][0]["price"], "9.99");
        assert_eq!(json["authors"][1]["publisher"], serde_json::Value::Null);
    }
}
