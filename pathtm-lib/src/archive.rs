//! Archive access: record framing, directory browsing, and the destination
//! layout for promoted window files.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use hifitime::{Duration, Epoch};
use tracing::{debug, trace};

use crate::packet::{Apid, PthHeader};
use crate::time;
use crate::{Error, Result};

/// Reads one length-prefixed archive record per call.
///
/// Records begin with the transport header, whose leading u32 (little endian)
/// declares the number of bytes that follow the header. The prefix is part of
/// the record and is kept in the output.
pub struct RecordReader<R> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        RecordReader { inner }
    }

    /// Read the next framed record into `buf` and return its total length,
    /// or `None` on a clean end of stream.
    ///
    /// # Errors
    /// [`Error::ShortBuffer`] if `buf` cannot hold the declared record;
    /// [`Error::Invalid`] if the source ends inside a record.
    pub fn next_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut prefix = [0u8; 4];
        match read_full(&mut self.inner, &mut prefix)? {
            0 => return Ok(None),
            n if n < prefix.len() => return Err(Error::Invalid),
            _ => {}
        }
        let size = u32::from_le_bytes(prefix) as usize;
        let total = PthHeader::LEN + size;
        if buf.len() < total {
            return Err(Error::ShortBuffer {
                actual: buf.len(),
                minimum: total,
            });
        }
        buf[..4].copy_from_slice(&prefix);
        let rest = &mut buf[4..total];
        if read_full(&mut self.inner, rest)? < rest.len() {
            return Err(Error::Invalid);
        }
        Ok(Some(total))
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut offset = 0;
    while offset < buf.len() {
        let n = reader.read(&mut buf[offset..])?;
        if n == 0 {
            break;
        }
        offset += n;
    }
    Ok(offset)
}

/// Byte-concatenation of a fixed list of files, opened lazily in order.
pub struct MultiReader {
    paths: std::vec::IntoIter<PathBuf>,
    current: Option<File>,
}

impl MultiReader {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        MultiReader {
            paths: paths.into_iter(),
            current: None,
        }
    }
}

impl Read for MultiReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.current {
                Some(ref mut file) => {
                    let n = file.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    self.current = None;
                }
                None => match self.paths.next() {
                    Some(path) => {
                        trace!(?path, "opening archive file");
                        self.current = Some(File::open(path)?);
                    }
                    None => return Ok(0),
                },
            }
        }
    }
}

/// Walk `roots` and yield the byte-concatenation of the archive files found,
/// in lexicographic filename order. File roots are taken as-is; directory
/// roots are walked, descending when `recursive` is set.
pub fn browse<P: AsRef<Path>>(roots: &[P], recursive: bool) -> Result<MultiReader> {
    let mut files = Vec::new();
    for root in roots {
        let root = root.as_ref();
        if fs::metadata(root)?.is_file() {
            files.push(root.to_path_buf());
        } else {
            walk(root, recursive, &mut files)?;
        }
    }
    debug!(count = files.len(), "browsing archive files");
    Ok(MultiReader::new(files))
}

fn walk(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            if recursive {
                walk(&path, recursive, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Destination policy for promoted window files.
pub trait Builder {
    /// Materialize the bytes from `reader` under the layout slot for
    /// `(apid, when)`.
    fn copy(&self, reader: &mut dyn Read, apid: Option<Apid>, when: Epoch) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Year,
    Month,
    Day,
    DayOfYear,
    /// Hour, truncated to a multiple of the resolution when non-zero.
    Hour(u32),
    Minute(u32),
    Apid,
}

/// Archive layout builder driven by a directory format string.
///
/// The format string names one path component per specifier: `%Y` year, `%M`
/// month, `%d` day of month, `%D` day of year, `%h` hour, `%m` minute, `%A`
/// apid. Digits between `%` and the letter set a truncation resolution for
/// `%h`/`%m`, e.g. `%6h` buckets into 6-hour directories. An empty format
/// writes directly under the root.
///
/// Window files are named `<prefix>_<day-of-year>.dat`.
pub struct ArchiveBuilder {
    root: PathBuf,
    prefix: Option<String>,
    segments: Vec<Segment>,
}

impl ArchiveBuilder {
    pub fn new<P: Into<PathBuf>>(root: P, format: &str) -> Result<Self> {
        Ok(ArchiveBuilder {
            root: root.into(),
            prefix: None,
            segments: parse_format(format)?,
        })
    }

    /// Override the file-name prefix; trailing separators are dropped. The
    /// default prefix is the APID, or `rt` for unfiltered streams.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches(['_', '-']);
        if !prefix.is_empty() {
            self.prefix = Some(prefix.to_string());
        }
        self
    }

    fn dir_for(&self, apid: Option<Apid>, when: Epoch) -> PathBuf {
        let mut dir = self.root.clone();
        let (year, month, day, ..) = when.to_gregorian_utc();
        for segment in &self.segments {
            let part = match segment {
                Segment::Year => format!("{year:04}"),
                Segment::Month => format!("{month:02}"),
                Segment::Day => format!("{day:02}"),
                Segment::DayOfYear => format!("{:03}", time::day_of_year(year, month, day)),
                Segment::Hour(resolution) => {
                    format!("{:02}", component(when, *resolution, 3600.0).3)
                }
                Segment::Minute(resolution) => {
                    format!("{:02}", component(when, *resolution, 60.0).4)
                }
                Segment::Apid => match apid {
                    Some(apid) => apid.to_string(),
                    None => "pathtm".to_string(),
                },
            };
            dir.push(part);
        }
        dir
    }

    fn file_for(&self, apid: Option<Apid>, when: Epoch) -> PathBuf {
        let prefix = match (&self.prefix, apid) {
            (Some(prefix), _) => prefix.clone(),
            (None, Some(apid)) => apid.to_string(),
            (None, None) => "rt".to_string(),
        };
        let (year, month, day, ..) = when.to_gregorian_utc();
        let doy = time::day_of_year(year, month, day);
        self.dir_for(apid, when).join(format!("{prefix}_{doy:03}.dat"))
    }
}

/// Gregorian components of `when`, truncated to `resolution` units of
/// `unit_secs` when the resolution is non-zero.
fn component(when: Epoch, resolution: u32, unit_secs: f64) -> (i32, u8, u8, u8, u8, u8, u32) {
    let when = if resolution > 0 {
        time::truncate(when, Duration::from_seconds(f64::from(resolution) * unit_secs))
    } else {
        when
    };
    when.to_gregorian_utc()
}

impl Builder for ArchiveBuilder {
    fn copy(&self, reader: &mut dyn Read, apid: Option<Apid>, when: Epoch) -> Result<()> {
        let path = self.file_for(apid, when);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        debug!(?path, "promoting window file");
        let mut dest = File::create(&path)?;
        io::copy(reader, &mut dest)?;
        Ok(())
    }
}

fn parse_format(format: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let bytes = format.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let resolution = if i > start {
            format[start..i]
                .parse::<u32>()
                .map_err(|_| Error::Format(format.to_string()))?
        } else {
            0
        };
        let Some(&spec) = bytes.get(i) else {
            return Err(Error::Format(format.to_string()));
        };
        i += 1;
        segments.push(match spec {
            b'Y' => Segment::Year,
            b'M' => Segment::Month,
            b'd' => Segment::Day,
            b'D' => Segment::DayOfYear,
            b'h' => Segment::Hour(resolution),
            b'm' => Segment::Minute(resolution),
            b'A' => Segment::Apid,
            _ => return Err(Error::Format(format.to_string())),
        });
    }
    Ok(segments)
}
