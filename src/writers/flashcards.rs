//! Flashcards as a two-column CSV with a `Term,Definition` header.

use std::path::Path;

use crate::error::{Result, StudyError};
use crate::models::Flashcard;

const HEADER: [&str; 2] = ["Term", "Definition"];

pub fn write_flashcards<P: AsRef<Path>>(path: P, cards: &[Flashcard]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    wtr.write_record(HEADER)?;
    for card in cards {
        wtr.write_record([card.term.as_str(), card.definition.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a file written by [`write_flashcards`], preserving row order.
pub fn read_flashcards<P: AsRef<Path>>(path: P) -> Result<Vec<Flashcard>> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;

    let headers = rdr.headers()?;
    if headers.iter().ne(HEADER) {
        return Err(StudyError::Document(format!(
            "unexpected flashcard header in {}",
            path.as_ref().display()
        )));
    }

    rdr.records()
        .map(|record| -> Result<Flashcard> {
            let record = record?;
            Ok(Flashcard {
                term: record.get(0).unwrap_or_default().to_string(),
                definition: record.get(1).unwrap_or_default().to_string(),
            })
        })
        .collect()
}
