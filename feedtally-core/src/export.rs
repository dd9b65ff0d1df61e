//! CSV export and re-import
//!
//! Exports are UTF-8 with a leading byte-order mark and CRLF row separators,
//! one row per post. Embedded line breaks are written as the two characters
//! `\n` so every post stays on one physical line; [`parse_csv`] turns them back
//! into newlines.

use std::mem::take;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::types::{Metrics, PostRecord, PostType};

/// Column order of every export.
pub const HEADER: [&str; 13] = [
    "tweet_id",
    "url",
    "author_handle",
    "created_at",
    "tweet_type",
    "like_count",
    "retweet_count",
    "reply_count",
    "view_count",
    "bookmark_count",
    "has_photo",
    "has_video",
    "text",
];

const BOM: char = '\u{FEFF}';
const NEWLINE_MARKER: &str = "\\n";

// ============================================
// Writing
// ============================================

/// Escape one field: line breaks become `\n`, then quote if needed.
pub fn escape_field(value: &str) -> String {
    let flat = value
        .replace("\r\n", NEWLINE_MARKER)
        .replace(['\r', '\n'], NEWLINE_MARKER);
    if flat.contains(',') || flat.contains('"') || flat.contains(NEWLINE_MARKER) {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn record_row(r: &PostRecord) -> [String; 13] {
    [
        r.id.clone(),
        r.url.clone(),
        r.author_handle.clone(),
        r.created_at.clone(),
        r.post_type.as_str().to_string(),
        r.metrics.like.to_string(),
        r.metrics.retweet.to_string(),
        r.metrics.reply.to_string(),
        r.metrics.view.to_string(),
        r.metrics.bookmark.to_string(),
        flag(r.has_photo),
        flag(r.has_video),
        r.text.clone(),
    ]
}

/// Serialize records in the given order.
pub fn to_csv(records: &[PostRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(HEADER.join(","));
    for r in records {
        let row: Vec<String> = record_row(r).iter().map(|f| escape_field(f)).collect();
        lines.push(row.join(","));
    }

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\r\n"));
    out
}

/// `x-{profile}-tweets-{timestamp}.csv`, with `:` and `.` in the timestamp
/// replaced by `-`.
pub fn export_filename(profile: &str, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("x-{}-tweets-{}.csv", profile, stamp)
}

/// Write `records` to a new file in `dir`, creating the directory if needed.
///
/// Returns the path written.
pub fn write_export(
    dir: &Path,
    profile: &str,
    records: &[PostRecord],
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Export(format!("failed to create {}: {}", dir.display(), e))
    })?;

    let path = dir.join(export_filename(profile, now));
    std::fs::write(&path, to_csv(records))
        .map_err(|e| Error::Export(format!("failed to write {}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), count = records.len(), "export written");
    Ok(path)
}

// ============================================
// Reading
// ============================================

/// Split CSV text into rows of fields. Quote aware, CRLF tolerant.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Parse an export back into records, restoring newlines in text fields.
pub fn parse_csv(text: &str) -> Result<Vec<PostRecord>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rows = parse_rows(text).into_iter();

    let header = rows
        .next()
        .ok_or_else(|| Error::Export("export is empty".to_string()))?;
    if header != HEADER {
        return Err(Error::Export(format!(
            "unexpected header: {}",
            header.join(",")
        )));
    }

    rows.enumerate()
        .map(|(i, row)| parse_record(&row).map_err(|e| Error::Export(format!("row {}: {}", i + 2, e))))
        .collect()
}

/// Read an export file written by [`write_export`].
pub fn read_records(path: &Path) -> Result<Vec<PostRecord>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Export(format!("failed to read {}: {}", path.display(), e)))?;
    parse_csv(&text)
}

fn parse_record(row: &[String]) -> std::result::Result<PostRecord, String> {
    if row.len() != HEADER.len() {
        return Err(format!(
            "expected {} fields, found {}",
            HEADER.len(),
            row.len()
        ));
    }

    let count = |i: usize| {
        row[i]
            .parse::<u64>()
            .map_err(|_| format!("{} is not a count: {:?}", HEADER[i], row[i]))
    };
    let boolean = |i: usize| match row[i].as_str() {
        "1" => Ok(true),
        "0" | "" => Ok(false),
        other => Err(format!("{} is not 0 or 1: {:?}", HEADER[i], other)),
    };

    Ok(PostRecord {
        id: row[0].clone(),
        url: row[1].clone(),
        author_handle: row[2].clone(),
        created_at: row[3].clone(),
        post_type: row[4].parse::<PostType>()?,
        metrics: Metrics {
            like: count(5)?,
            retweet: count(6)?,
            reply: count(7)?,
            view: count(8)?,
            bookmark: count(9)?,
        },
        has_photo: boolean(10)?,
        has_video: boolean(11)?,
        text: row[12].replace(NEWLINE_MARKER, "\n"),
    })
}
