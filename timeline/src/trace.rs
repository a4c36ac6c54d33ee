// trace.rs — Retirement trace rows and the JSON trace loader
//
// A trace is a JSON array of rows, one per retired instruction. Rows may use
// the column names of the CSV traces produced by the simulator (`inst`,
// `type`, `start cycle`, `end cycle`, `pc`) or the field names below.
//
// Preconditions: none.
// Postconditions: `load_trace` returns rows in program-counter order when
//                 every row carries a `pc`, otherwise in file order.
// Failure modes: unreadable files and malformed JSON produce `TraceError`.
// Side effects: `load_trace_file` reads one file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

// ── Execution units ─────────────────────────────────────────────────────────

/// Execution-unit group an instruction retired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Scalar,
    Fp,
    Vector,
}

impl Unit {
    /// All units in display order.
    pub const ALL: [Unit; 3] = [Unit::Scalar, Unit::Fp, Unit::Vector];

    pub fn name(self) -> &'static str {
        match self {
            Unit::Scalar => "scalar",
            Unit::Fp => "fp",
            Unit::Vector => "vector",
        }
    }

    /// Row label used by timeline renderers, e.g. `Vector Row 2`.
    pub fn lane_label(self, lane: u32) -> String {
        let title = match self {
            Unit::Scalar => "Scalar",
            Unit::Fp => "Fp",
            Unit::Vector => "Vector",
        };
        format!("{} Row {}", title, lane)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Cycle intervals ─────────────────────────────────────────────────────────

/// Half-open cycle interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        Interval { start, end }
    }

    pub fn overlaps(self, other: Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ── Trace rows ──────────────────────────────────────────────────────────────

/// One retired instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(alias = "inst")]
    pub mnemonic: String,
    #[serde(alias = "type")]
    pub unit: Unit,
    #[serde(alias = "start cycle")]
    pub start_cycle: u64,
    #[serde(alias = "end cycle")]
    pub end_cycle: u64,
    /// Program counter; either a number or a hex string such as `"0x80000120"`.
    #[serde(default, deserialize_with = "deserialize_pc", skip_serializing_if = "Option::is_none")]
    pub pc: Option<u64>,
}

impl TraceRecord {
    pub fn new(mnemonic: impl Into<String>, unit: Unit, start_cycle: u64, end_cycle: u64) -> Self {
        TraceRecord {
            mnemonic: mnemonic.into(),
            unit,
            start_cycle,
            end_cycle,
            pc: None,
        }
    }

    pub fn with_pc(mut self, pc: u64) -> Self {
        self.pc = Some(pc);
        self
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start_cycle, self.end_cycle)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PcValue {
    Number(u64),
    Text(String),
}

fn deserialize_pc<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<PcValue>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(PcValue::Number(n)) => Ok(Some(n)),
        Some(PcValue::Text(s)) => parse_pc_text(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid pc value: {:?}", s))),
    }
}

fn parse_pc_text(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Errors that can occur while loading a trace.
#[derive(Debug)]
pub enum TraceError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    JsonError {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::IoError { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            TraceError::JsonError {
                path: Some(path),
                source,
            } => {
                write!(f, "{}: invalid trace: {}", path.display(), source)
            }
            TraceError::JsonError { path: None, source } => {
                write!(f, "invalid trace: {}", source)
            }
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::IoError { source, .. } => Some(source),
            TraceError::JsonError { source, .. } => Some(source),
        }
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

/// Parse a JSON trace and put it in program order.
pub fn load_trace(json: &str) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records: Vec<TraceRecord> =
        serde_json::from_str(json).map_err(|e| TraceError::JsonError {
            path: None,
            source: e,
        })?;
    sort_by_pc(&mut records);
    Ok(records)
}

/// Read and parse a JSON trace file.
pub fn load_trace_file(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let json = std::fs::read_to_string(path).map_err(|e| TraceError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_trace(&json).map_err(|e| match e {
        TraceError::JsonError { source, .. } => TraceError::JsonError {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}

/// Stable-sort rows by program counter. Rows are left untouched unless every
/// row has a `pc`. Returns whether a sort happened.
pub fn sort_by_pc(records: &mut [TraceRecord]) -> bool {
    if records.is_empty() || records.iter().any(|r| r.pc.is_none()) {
        return false;
    }
    records.sort_by_key(|r| r.pc);
    true
}

// ── Tests ───────────────────────────────────────────────────────────────────
