//! Line-oriented `key=value` input
//!
//! Blank lines and lines starting with `#` are skipped. Every other line
//! must contain `=`; it becomes the record `{"key": .., "value": ..}`.

use futures::stream::{self, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::{Record, RecordStream};
use crate::blob::BlobStream;
use crate::error::ParseError;

struct State {
    lines: Lines<BufReader<BlobStream>>,
    line_no: usize,
}

pub fn records(input: BlobStream) -> RecordStream {
    let state = State {
        lines: BufReader::new(input).lines(),
        line_no: 0,
    };

    stream::try_unfold(state, |mut state| async move {
        while let Some(line) = state
            .lines
            .next_line()
            .await
            .map_err(|e| line_error(e, state.line_no + 1))?
        {
            state.line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ParseError::MalformedLine {
                line: state.line_no,
                content: line.to_string(),
            })?;

            let record = Record::from_iter([("key", key.trim()), ("value", value.trim())]);
            return Ok(Some((record, state)));
        }
        Ok::<_, ParseError>(None)
    })
    .boxed()
}

/// Undecodable bytes are bad input, not a failed read.
fn line_error(err: std::io::Error, line: usize) -> ParseError {
    match err.kind() {
        std::io::ErrorKind::InvalidData => ParseError::InvalidUtf8 { line },
        _ => ParseError::Io(err),
    }
}
