//! Capture-date extraction.
//!
//! A file's plausible date can come from EXIF metadata, from a date spelled
//! in its path or name, or (as a last resort) from its stat timestamps.
//! EXIF is authoritative for camera output; path and filename dates are
//! curator intent; stat times drift during copies and must never override
//! an intentional name. All candidates strictly after the configured
//! threshold are collected and the earliest wins.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use curator_core::FileEntry;

/// Extensions worth an EXIF probe: common image and RAW containers.
pub const EXIF_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "tif", "tiff", "heic", "heif", "cr2", "cr3", "nef", "arw", "dng", "raf",
    "rw2", "orf", "srw", "pef",
];

/// EXIF metadata lives near the start of the container; one read covers it.
const EXIF_READ_LIMIT: u64 = 64 * 1024;

static YMD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{4})-?(\d{2})-?(\d{2})(?:\D|$)").expect("static date pattern")
});
static DMY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{2})-?(\d{2})-?(\d{4})(?:\D|$)").expect("static date pattern")
});
static EPOCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{10})(?:\D|$)").expect("static epoch pattern")
});

/// Where an extracted date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateSource {
    Exif,
    Path,
    PathEpoch,
    Filename,
    FilenameEpoch,
    Mtime,
}

impl std::fmt::Display for DateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Exif => "exif",
            Self::Path => "path",
            Self::PathEpoch => "path (epoch)",
            Self::Filename => "filename",
            Self::FilenameEpoch => "filename (epoch)",
            Self::Mtime => "timestamps (mtime)",
        };
        f.write_str(label)
    }
}

/// A dated candidate plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

/// Extracts the earliest plausible date for a file.
#[derive(Debug, Clone)]
pub struct DateExtractor {
    threshold: NaiveDate,
}

impl DateExtractor {
    pub fn new(threshold: NaiveDate) -> Self {
        Self { threshold }
    }

    /// All sources considered, earliest post-threshold candidate wins;
    /// `None` when nothing plausible was found.
    pub fn extract(&self, entry: &FileEntry) -> Option<ExtractedDate> {
        let mut candidates: Vec<ExtractedDate> = Vec::new();

        if EXIF_EXTENSIONS.contains(&entry.ext.as_str()) {
            if let Some(date) = read_exif_date(&entry.path) {
                candidates.push(ExtractedDate {
                    date,
                    source: DateSource::Exif,
                });
            }
        }

        let dir_text = entry.dir.to_string_lossy();
        collect_text_dates(&dir_text, DateSource::Path, DateSource::PathEpoch, &mut candidates);
        collect_text_dates(
            &entry.name,
            DateSource::Filename,
            DateSource::FilenameEpoch,
            &mut candidates,
        );

        candidates.retain(|c| c.date > self.threshold);
        if let Some(best) = candidates.into_iter().min_by_key(|c| c.date) {
            return Some(best);
        }

        // Last resort: the modification time, still threshold-checked.
        let mtime = DateTime::from_timestamp_millis(entry.stat.mtime_ms)?.date_naive();
        (mtime > self.threshold).then_some(ExtractedDate {
            date: mtime,
            source: DateSource::Mtime,
        })
    }
}

/// Scan a text fragment for the supported date spellings, in pattern order.
fn collect_text_dates(
    text: &str,
    date_source: DateSource,
    epoch_source: DateSource,
    out: &mut Vec<ExtractedDate>,
) {
    for caps in YMD.captures_iter(text) {
        if let Some(date) = ymd(&caps[1], &caps[2], &caps[3]) {
            out.push(ExtractedDate {
                date,
                source: date_source,
            });
        }
    }
    for caps in DMY.captures_iter(text) {
        if let Some(date) = ymd(&caps[3], &caps[2], &caps[1]) {
            out.push(ExtractedDate {
                date,
                source: date_source,
            });
        }
    }
    for caps in EPOCH.captures_iter(text) {
        let Ok(secs) = caps[1].parse::<i64>() else {
            continue;
        };
        if let Some(stamp) = DateTime::from_timestamp(secs, 0) {
            out.push(ExtractedDate {
                date: stamp.date_naive(),
                source: epoch_source,
            });
        }
    }
}

/// Validate components and build a date. Rejects years outside 1900..=2099
/// and anything the calendar itself refuses.
fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if !(1900..=2099).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Pull `DateTimeOriginal` out of the first 64 KiB. Every failure mode is
/// treated as "no EXIF date": most files simply do not carry one.
fn read_exif_date(path: &Path) -> Option<NaiveDate> {
    let mut file = File::open(path).ok()?;
    let mut buf = Vec::with_capacity(EXIF_READ_LIMIT as usize);
    file.take(EXIF_READ_LIMIT).read_to_end(&mut buf).ok()?;

    let mut cursor = std::io::Cursor::new(buf);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;

    let exif::Value::Ascii(ref groups) = field.value else {
        return None;
    };
    let raw = groups.first()?;
    let text = std::str::from_utf8(raw).ok()?;
    parse_exif_datetime(text.trim())
}

fn parse_exif_datetime(text: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S") {
        return Some(stamp.date());
    }
    NaiveDate::parse_from_str(text, "%Y:%m:%d").ok()
}
