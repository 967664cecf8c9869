//! LCOV tracefile adapter.
//!
//! The reader loop is the imperative shell; each record type is dispatched to
//! a small handler that only mutates [`LcovParserState`].

use ::lcov::{Reader, Record};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::facts::{ExecutionFacts, FileFacts};
use crate::errors::{Error, Result, ResultExt};

pub(crate) struct LcovParserState {
    root: Option<PathBuf>,
    facts: ExecutionFacts,
    current_file: Option<PathBuf>,
    current: FileFacts,
    file_count: usize,
}

impl LcovParserState {
    fn new(root: Option<&Path>) -> Self {
        Self {
            root: root.map(Path::to_path_buf),
            facts: ExecutionFacts::new(),
            current_file: None,
            current: FileFacts::new(),
            file_count: 0,
        }
    }
}

/// Strip `root` from absolute tracefile paths so they match repository-relative units.
pub fn relativize(path: &Path, root: Option<&Path>) -> PathBuf {
    root.and_then(|root| path.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

fn handle_source_file(state: &mut LcovParserState, path: PathBuf) {
    handle_end_of_record(state);
    state.current_file = Some(relativize(&path, state.root.as_deref()));
}

fn handle_line_data(state: &mut LcovParserState, line: u32, count: u64) {
    state.current.record_line(line as usize, count);
}

fn handle_branch_data(state: &mut LcovParserState, line: u32, taken: Option<u64>) {
    state
        .current
        .record_branch(line as usize, taken.is_some_and(|hits| hits > 0));
}

fn handle_end_of_record(state: &mut LcovParserState) {
    let facts = std::mem::take(&mut state.current);
    if let Some(file) = state.current_file.take() {
        state.facts.insert(file, facts);
        state.file_count += 1;
    }
}

fn dispatch(state: &mut LcovParserState, record: Record) {
    match record {
        Record::SourceFile { path } => handle_source_file(state, path),
        Record::LineData { line, count, .. } => handle_line_data(state, line, count),
        Record::BranchData { line, taken, .. } => handle_branch_data(state, line, taken),
        Record::EndOfRecord => handle_end_of_record(state),
        _ => {}
    }
}

fn read_records<R: BufRead>(
    reader: Reader<R>,
    source: &Path,
    root: Option<&Path>,
) -> Result<ExecutionFacts> {
    use anyhow::Context as _;

    let mut state = LcovParserState::new(root);
    for record in reader {
        let record = record
            .with_context(|| format!("Failed to parse LCOV record in {}", source.display()))?;
        dispatch(&mut state, record);
    }

    // Tolerate a trailing record without end_of_record.
    handle_end_of_record(&mut state);
    debug!(files = state.file_count, source = %source.display(), "parsed lcov records");
    Ok(state.facts)
}

/// Parse LCOV records from any buffered reader.
pub fn parse_lcov<R: BufRead>(input: R, root: Option<&Path>) -> Result<ExecutionFacts> {
    read_records(Reader::new(input), Path::new("<lcov>"), root)
}

pub fn parse_lcov_str(content: &str, root: Option<&Path>) -> Result<ExecutionFacts> {
    parse_lcov(content.as_bytes(), root)
}

pub fn parse_lcov_file(path: &Path, root: Option<&Path>) -> Result<ExecutionFacts> {
    let reader = Reader::open_file(path)
        .map_err(|e| Error::file_system("Failed to open LCOV file", path, e))?;
    read_records(reader, path, root).context(format!("Loading LCOV report {}", path.display()))
}
