//! Strict parser for Unix-style `LIST -al` output.
//!
//! Each line carries eight whitespace-delimited fields followed by the
//! entry name:
//!
//! ```text
//! -rw-r--r--   1 user group     4096 Jan  5 12:30 notes.txt
//! drwxr-xr-x   2 user group     4096 Jan  5  2019 archive
//! ```
//!
//! permission string (10 chars), link count, owner (ignored), group
//! (ignored), size, month abbreviation, day, and either `HH:MM`
//! (implying the current year) or a bare year (implying 00:00). The
//! remainder of the line is the name, taken verbatim — embedded spaces
//! are kept, and a symlink's ` -> target` suffix is not split off.
//!
//! A malformed field anywhere aborts the whole listing: the filesystem
//! layer must never see a truncated directory.

use crate::error::{FtpError, FtpResult};
use crate::types::{mode, FileEntry};
use chrono::{DateTime, TimeZone, Utc};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Take the next whitespace-delimited field, advancing `rest`.
fn next_field<'a>(rest: &mut &'a str) -> FtpResult<&'a str> {
    let trimmed = rest.trim_start_matches(' ');
    if trimmed.is_empty() {
        return Err(FtpError::parse("listing line ended early"));
    }
    let end = trimmed.find(' ').unwrap_or(trimmed.len());
    let (field, tail) = trimmed.split_at(end);
    *rest = tail;
    Ok(field)
}

/// Translate the 10-character permission string into POSIX mode bits.
///
/// Byte 0 selects the file type; bytes 1..=9 are checked literally for
/// `r`, `w`, `x` — anything else (including setuid markers) simply
/// leaves the bit clear.
fn parse_permissions(field: &str) -> FtpResult<u32> {
    let b = field.as_bytes();
    if b.len() != 10 {
        return Err(FtpError::parse(format!(
            "permission field must be 10 characters: '{}'",
            field
        )));
    }
    let mut bits = match b[0] {
        b'd' => mode::S_IFDIR,
        b'l' => mode::S_IFLNK,
        _ => mode::S_IFREG,
    };
    const PERMS: [u32; 9] = [
        mode::S_IRUSR,
        mode::S_IWUSR,
        mode::S_IXUSR,
        mode::S_IRGRP,
        mode::S_IWGRP,
        mode::S_IXGRP,
        mode::S_IROTH,
        mode::S_IWOTH,
        mode::S_IXOTH,
    ];
    const FLAGS: [u8; 3] = [b'r', b'w', b'x'];
    for (i, &bit) in PERMS.iter().enumerate() {
        if b[i + 1] == FLAGS[i % 3] {
            bits |= bit;
        }
    }
    Ok(bits)
}

/// The `Jan` → 1 month lookup; exact three-letter abbreviation only.
fn parse_month(field: &str) -> FtpResult<u32> {
    if field.len() == 3 {
        if let Some(idx) = MONTHS.iter().position(|m| *m == field) {
            return Ok(idx as u32 + 1);
        }
    }
    Err(FtpError::parse(format!("unknown month: '{}'", field)))
}

fn parse_unsigned<T: std::str::FromStr>(field: &str, what: &str) -> FtpResult<T> {
    field
        .parse::<T>()
        .map_err(|_| FtpError::parse(format!("bad {}: '{}'", what, field)))
}

/// Parse one listing line into a [`FileEntry`].
///
/// `current_year` substitutes for the missing year of `HH:MM` stamps;
/// the caller fixes it once per listing.
pub fn parse_listing_line(line: &str, current_year: i32) -> FtpResult<FileEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut rest = line;

    let mode = parse_permissions(next_field(&mut rest)?)?;
    let nlink: u32 = parse_unsigned(next_field(&mut rest)?, "link count")?;
    next_field(&mut rest)?; // owner, ignored
    next_field(&mut rest)?; // group, ignored
    let size: u64 = parse_unsigned(next_field(&mut rest)?, "size")?;
    let month = parse_month(next_field(&mut rest)?)?;
    let day: u32 = parse_unsigned(next_field(&mut rest)?, "day of month")?;

    let stamp = next_field(&mut rest)?;
    let (year, hour, minute) = match stamp.split_once(':') {
        Some((h, m)) => (
            current_year,
            parse_unsigned::<u32>(h, "hour")?,
            parse_unsigned::<u32>(m, "minute")?,
        ),
        None => (parse_unsigned::<i32>(stamp, "year")?, 0, 0),
    };
    let mtime = make_mtime(year, month, day, hour, minute)?;

    let name = rest.trim_start_matches(' ');
    if name.is_empty() {
        return Err(FtpError::parse("listing line has no name field"));
    }

    Ok(FileEntry {
        mode,
        nlink,
        size,
        mtime,
        name: name.to_string(),
    })
}

fn make_mtime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> FtpResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| {
            FtpError::parse(format!(
                "invalid timestamp: {:04}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ))
        })
}
