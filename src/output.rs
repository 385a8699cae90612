//! Presentation of stop boards and catalogue listings.
//!
//! Boards render as plain text or as an HTML page; listings are written as
//! CSV rows.

use std::io::Write;

use anyhow::Result;
use askama::Template;
use csv::WriterBuilder;
use tracing::debug;

use crate::listing::Listing;
use crate::orderer::StopBoard;

/// Output theme for arrival boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Theme {
    #[default]
    Text,
    Html,
}

#[derive(Template)]
#[template(path = "arrivals.html")]
struct ArrivalsPage<'a> {
    title: &'a str,
    boards: &'a [StopBoard],
}

/// One block per stop: the label, then each line indented.
pub fn render_text(boards: &[StopBoard]) -> String {
    boards
        .iter()
        .map(|board| {
            let mut block = board.label.clone();
            for line in &board.lines {
                block.push_str("\n  ");
                block.push_str(line);
            }
            block.push('\n');
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_html(title: &str, boards: &[StopBoard]) -> Result<String> {
    Ok(ArrivalsPage { title, boards }.render()?)
}

pub fn render_boards(theme: Theme, title: &str, boards: &[StopBoard]) -> Result<String> {
    debug!(?theme, stops = boards.len(), "Rendering boards");
    match theme {
        Theme::Text => Ok(render_text(boards)),
        Theme::Html => render_html(title, boards),
    }
}

/// Writes listings as `id,name` CSV rows with a header.
pub fn write_listings<W: Write>(writer: W, listings: &[Listing]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush()?;
    Ok(())
}
