//! Bulletin sources: CP932 decoding and archive naming
//!
//! Bulletins are published as LZH archives, one per day and kind, at
//! `http://www1.mbrace.or.jp/od2/{K|B}/{yyyymm}/{k|b}{yymmdd}.lzh`. Downloading
//! and unpacking them is left to external tools; this module reads the
//! extracted `K{yymmdd}.TXT` / `B{yymmdd}.TXT` members.

use chrono::NaiveDate;
use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};
use crate::grammar::DocumentKind;

const ARCHIVE_BASE_URL: &str = "http://www1.mbrace.or.jp/od2";

/// Decoded lines of one bulletin plus the date used for race identifiers
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub date: String,
    pub kind: DocumentKind,
    pub lines: Vec<String>,
}

impl Document {
    pub fn from_text(
        name: impl Into<String>,
        date: impl Into<String>,
        kind: DocumentKind,
        text: &str,
    ) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            kind,
            lines: text.lines().map(str::to_string).collect(),
        }
    }
}

/// Supplies decoded documents to the extraction engine
pub trait SourceProvider {
    fn document(&self, date: NaiveDate, kind: DocumentKind) -> Result<Document>;
}

/// Reads extracted archive members from a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Decode one bulletin file
    ///
    /// Bulletins are published in CP932; copies already converted to UTF-8
    /// are accepted as well.
    pub fn read_text(path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        let decoded = SHIFT_JIS
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(Cow::into_owned);

        match decoded {
            Some(text) => Ok(text),
            None => String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    /// Locate the member file, accepting either case for name and extension
    pub fn path_for(&self, date: NaiveDate, kind: DocumentKind) -> Option<PathBuf> {
        let name = member_name(date, kind);
        let lower = name.to_lowercase();
        [name.clone(), lower, name.replace(".TXT", ".txt")]
            .into_iter()
            .map(|candidate| self.dir.join(candidate))
            .find(|path| path.is_file())
    }
}

impl SourceProvider for DirectorySource {
    fn document(&self, date: NaiveDate, kind: DocumentKind) -> Result<Document> {
        let path = self
            .path_for(date, kind)
            .ok_or_else(|| ExtractError::MissingDocument {
                kind: kind.name(),
                date: format_date(date),
                dir: self.dir.clone(),
            })?;

        let text = Self::read_text(&path).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| member_name(date, kind));

        Ok(Document::from_text(name, format_date(date), kind, &text))
    }
}

/// Date string embedded in race identifiers (`YYYY-MM-DD`)
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Extracted member name, e.g. `K200915.TXT`
pub fn member_name(date: NaiveDate, kind: DocumentKind) -> String {
    format!("{}{}.TXT", kind.letter(), date.format("%y%m%d"))
}

/// Race day encoded in a member name such as `K200915.TXT`
pub fn date_from_member_name(name: &str) -> Option<NaiveDate> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let digits = stem.get(1..7)?;
    NaiveDate::parse_from_str(digits, "%y%m%d").ok()
}

/// Archive download URL for one day and bulletin kind
pub fn archive_url(date: NaiveDate, kind: DocumentKind) -> String {
    let letter = kind.letter();
    format!(
        "{}/{}/{}/{}{}.lzh",
        ARCHIVE_BASE_URL,
        letter,
        date.format("%Y%m"),
        letter.to_ascii_lowercase(),
        date.format("%y%m%d")
    )
}
