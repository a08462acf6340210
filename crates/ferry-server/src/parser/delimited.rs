//! Comma and tab delimited input
//!
//! The first line is the header. Each following row is zipped against it
//! by position: surplus cells or surplus header names are dropped. Header
//! names and cell values are whitespace-trimmed.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};

use super::{Record, RecordStream};
use crate::blob::BlobStream;
use crate::error::ParseError;

struct State {
    reader: AsyncReader<BlobStream>,
    header: StringRecord,
    row: StringRecord,
}

/// Stream records from delimited input.
pub fn records(input: BlobStream, delimiter: u8) -> RecordStream {
    let mut reader = AsyncReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .create_reader(input);

    stream::once(async move {
        let header = reader.headers().await?.clone();
        Ok::<_, ParseError>(rows(State {
            reader,
            header,
            row: StringRecord::new(),
        }))
    })
    .try_flatten()
    .boxed()
}

fn rows(state: State) -> impl Stream<Item = Result<Record, ParseError>> {
    stream::try_unfold(state, |mut state| async move {
        if !state.reader.read_record(&mut state.row).await? {
            return Ok::<_, ParseError>(None);
        }

        let record = state.header.iter().zip(state.row.iter()).collect::<Record>();
        Ok(Some((record, state)))
    })
}
