//! CSV reading and writing for file-backed tables.
//!
//! - **Delimiter resolution**: `.tsv` files default to tab, everything else to
//!   comma, unless overridden.
//! - **Encoding**: tables are decoded and re-encoded with `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Atomic replace**: a table is always rewritten in full into a temporary
//!   file beside the original and then renamed over it, so readers never see a
//!   half-written table.

use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use tempfile::NamedTempFile;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ));
    }
    Ok(text.into_owned())
}

/// Reads a header row and every following row. Rows may be shorter or longer
/// than the header; callers decide how to pad.
///
/// The csv reader skips empty lines, so each one is restored here as an empty
/// row. A hand-edited file may use one as its blank boundary row.
pub fn read_table<R>(
    mut reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(Vec<String>, Vec<Vec<String>>)>
where
    R: Read,
{
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .context("Reading table contents")?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(raw.as_slice());

    let mut record = csv::ByteRecord::new();
    let mut header = Vec::new();
    let mut rows = Vec::new();
    let mut line = 0usize;
    loop {
        let start = csv_reader.position().byte() as usize;
        if !csv_reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Reading row {}", line + 1))?
        {
            break;
        }
        let cells = record
            .iter()
            .map(|field| decode_field(field, encoding))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Decoding row {}", line + 1))?;
        if line == 0 {
            header = cells;
        } else {
            let skipped = empty_lines_at(&raw, start);
            rows.extend(std::iter::repeat_with(Vec::new).take(skipped));
            rows.push(cells);
        }
        line += 1;
    }
    Ok((header, rows))
}

/// Counts the empty lines between the previous record and the record starting
/// at or after byte `start`.
fn empty_lines_at(raw: &[u8], start: usize) -> usize {
    let mut rest = raw.get(start..).unwrap_or_default();
    // Whatever part of the previous record's terminator is still unread.
    let leftover = match (start.checked_sub(1).and_then(|idx| raw.get(idx)), rest) {
        (Some(b'\r'), [b'\n', ..]) => 1,
        (Some(b'\r' | b'\n'), _) | (None, _) => 0,
        (Some(_), [b'\r', b'\n', ..]) => 2,
        (Some(_), [b'\r' | b'\n', ..]) => 1,
        (Some(_), _) => 0,
    };
    rest = &rest[leftover..];
    let run = rest
        .iter()
        .take_while(|&&byte| byte == b'\n' || byte == b'\r')
        .copied()
        .collect::<Vec<_>>();
    run.iter()
        .enumerate()
        .filter(|&(idx, &byte)| byte == b'\n' || run.get(idx + 1) != Some(&b'\n'))
        .count()
}

pub fn read_table_from_path(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = File::open(path).with_context(|| format!("Opening table {path:?}"))?;
    read_table(BufReader::new(file), delimiter, encoding)
        .with_context(|| format!("Reading table {path:?}"))
}

pub fn render_table(
    header: &[String],
    rows: &[Vec<String>],
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(header)
        .context("Writing header row")?;
    for (idx, row) in rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Writing row {}", idx + 2))?;
    }
    let utf8 = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {}", err.error()))?;
    if encoding == UTF_8 {
        return Ok(utf8);
    }
    let text = String::from_utf8(utf8).context("CSV writer produced invalid UTF-8")?;
    let (encoded, _, had_errors) = encoding.encode(&text);
    if had_errors {
        return Err(anyhow!("Failed to encode table using {}", encoding.name()));
    }
    Ok(encoded.into_owned())
}

/// Replaces `path` with the rendered table in one rename.
pub fn write_table_atomic(
    path: &Path,
    header: &[String],
    rows: &[Vec<String>],
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let bytes = render_table(header, rows, delimiter, encoding)?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged =
        NamedTempFile::new_in(dir).with_context(|| format!("Staging write in {dir:?}"))?;
    staged
        .write_all(&bytes)
        .with_context(|| format!("Writing staged table for {path:?}"))?;
    staged.flush()?;
    staged
        .persist(path)
        .map_err(|err| anyhow!("Replacing {path:?}: {}", err.error))?;
    Ok(())
}
