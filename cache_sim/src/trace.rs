//! Valgrind lackey traces: `I 0400d7d4,8`, ` L 7ff0005c8,8`, ...

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use nom::{
    bytes::complete::tag,
    character::complete::{anychar, hex_digit1, space0, space1, u32},
    combinator::{all_consuming, map_opt, map_res},
    IResult,
};
use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::addr::Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessKind {
    /// instruction fetch, never simulated
    Instr = b'I',
    Load = b'L',
    Store = b'S',
    /// load followed by a store to the same address
    Modify = b'M',
}

impl AccessKind {
    /// number of simulated accesses a record of this kind dispatches.
    pub fn accesses(self) -> usize {
        match self {
            AccessKind::Instr => 0,
            AccessKind::Load | AccessKind::Store => 1,
            AccessKind::Modify => 2,
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8 as char)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub kind: AccessKind,
    pub addr: Addr,
    /// access size in bytes; carried through but not simulated
    pub len: u32,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {},{}", self.kind, self.addr, self.len)
    }
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("{}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to read trace: {0}")]
    Read(#[from] io::Error),
}

fn kind(input: &str) -> IResult<&str, AccessKind> {
    map_opt(anychar, |c| {
        u8::try_from(c)
            .ok()
            .and_then(|b| AccessKind::try_from(b).ok())
    })(input)
}

fn address(input: &str) -> IResult<&str, Addr> {
    map_res(hex_digit1, |h| u64::from_str_radix(h, 16).map(Addr::new))(input)
}

fn record(input: &str) -> IResult<&str, AccessRecord> {
    let (input, _) = space0(input)?;
    let (input, kind) = kind(input)?;
    let (input, _) = space1(input)?;
    let (input, addr) = address(input)?;
    let (input, _) = tag(",")(input)?;
    let (input, len) = u32(input)?;
    let (input, _) = space0(input)?;
    Ok((input, AccessRecord { kind, addr, len }))
}

/// parses one trace line. `Ok(None)` for blank lines, `Err` with the
/// reason for malformed ones.
fn parse_line(line: &str) -> Result<Option<AccessRecord>, String> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    all_consuming(record)(line)
        .map(|(_, r)| Some(r))
        .map_err(|e| format!("{line:?}: {e}"))
}

/// Yields the well-formed records of a trace in order, skipping the rest.
pub struct TraceReader<R> {
    inner: R,
    buf: Vec<u8>,
    line_no: usize,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            line_no: 0,
        }
    }
    /// number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<AccessRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let parsed = std::str::from_utf8(&self.buf)
                        .map_err(|e| format!("not utf-8: {e}"))
                        .and_then(parse_line);
                    match parsed {
                        Ok(Some(r)) => return Some(Ok(r)),
                        Ok(None) => {}
                        Err(why) => {
                            log::debug!("line {}: skipping malformed trace line {why}", self.line_no)
                        }
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
