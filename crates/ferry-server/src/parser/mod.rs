//! Record stream parser
//!
//! Turns a blob's byte stream into a lazy stream of [`Record`]s, optionally
//! grouped into batches. The format is chosen from the blob name's extension:
//!
//! | Extension     | Content type                      | Parser            |
//! |---------------|-----------------------------------|-------------------|
//! | `.csv`        | `text/csv`                        | comma delimited   |
//! | `.tsv` `.tab` | `text/tab-separated-values`       | tab delimited     |
//! | `.xlsx`       | spreadsheetml                     | none, always fails |
//! | anything else | `text/plain`                      | `key=value` lines |
//!
//! Parsers live in a [`ParserRegistry`] keyed by content type. A new format is
//! a new registration, nothing else changes.

pub mod delimited;
pub mod key_value;
pub mod record;

use futures::stream::{BoxStream, StreamExt, TryChunksError, TryStreamExt};
use mime::Mime;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::blob::BlobStream;
use crate::error::ParseError;

pub use record::Record;

/// Batch size used when none (or zero) is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub type RecordStream = BoxStream<'static, Result<Record, ParseError>>;

pub type BatchStream = BoxStream<'static, Result<Batch, ParseError>>;

/// A parsing function registered for one content type.
pub type ParseFn = Arc<dyn Fn(BlobStream) -> RecordStream + Send + Sync>;

/// Consecutive records from one file. `offset` is the file-wide index of
/// the first record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub offset: usize,
    pub records: Vec<Record>,
}

/// Map a blob name to the content type that selects its parser.
pub fn content_type_for(name: &str) -> Mime {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => mime::TEXT_CSV,
        Some("tsv") | Some("tab") => mime::TEXT_TAB_SEPARATED_VALUES,
        Some("xlsx") => XLSX_CONTENT_TYPE
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::TEXT_PLAIN,
    }
}

pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(&mime::TEXT_CSV, |input| delimited::records(input, b','));
        registry.register(&mime::TEXT_TAB_SEPARATED_VALUES, |input| {
            delimited::records(input, b'\t')
        });
        registry.register(&mime::TEXT_PLAIN, key_value::records);
        registry
    }
}

impl ParserRegistry {
    /// Registry with no formats; everything is unsupported.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register (or replace) the parser for a content type.
    pub fn register<F>(&mut self, content_type: &Mime, parse: F)
    where
        F: Fn(BlobStream) -> RecordStream + Send + Sync + 'static,
    {
        self.parsers
            .insert(content_type.essence_str().to_string(), Arc::new(parse));
    }

    pub fn supports(&self, content_type: &Mime) -> bool {
        self.parsers.contains_key(content_type.essence_str())
    }

    /// Lazy record stream for a named blob.
    pub fn records(&self, name: &str, input: BlobStream) -> Result<RecordStream, ParseError> {
        let content_type = content_type_for(name);
        let parse = self
            .parsers
            .get(content_type.essence_str())
            .ok_or_else(|| ParseError::UnsupportedFormat(content_type.essence_str().to_string()))?;

        tracing::debug!(name, content_type = %content_type, "Selected parser");
        Ok(parse(input))
    }

    /// Whole-file mode: read every record into memory.
    pub async fn parse(&self, name: &str, input: BlobStream) -> Result<Vec<Record>, ParseError> {
        self.records(name, input)?.try_collect().await
    }

    /// Group the record stream into batches of `batch_size` (0 means
    /// [`DEFAULT_BATCH_SIZE`]). The last batch may be shorter; an empty
    /// tail is never emitted.
    pub fn batches(
        &self,
        name: &str,
        input: BlobStream,
        batch_size: usize,
    ) -> Result<BatchStream, ParseError> {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };

        let mut offset = 0;
        let stream = self
            .records(name, input)?
            .try_chunks(batch_size)
            .map_err(|TryChunksError(_, err)| err)
            .map_ok(move |records| {
                let batch = Batch { offset, records };
                offset += batch.records.len();
                batch
            })
            .boxed();

        Ok(stream)
    }

    /// Streaming mode: invoke `on_batch` for each batch in order. An error
    /// from the callback stops parsing and is returned as is. Returns the
    /// number of records handed to the callback.
    pub async fn parse_batches<F, Fut, E>(
        &self,
        name: &str,
        input: BlobStream,
        batch_size: usize,
        mut on_batch: F,
    ) -> Result<usize, E>
    where
        F: FnMut(Batch) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<ParseError>,
    {
        let mut batches = self.batches(name, input, batch_size)?;
        let mut total = 0;

        while let Some(batch) = batches.try_next().await? {
            total += batch.records.len();
            on_batch(batch).await?;
        }

        Ok(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn blob(content: &'static str) -> BlobStream {
        Box::pin(content.as_bytes())
    }

    const FIVE_ROWS: &str = "id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n";

    #[test]
    fn test_content_type_detection() {
        assert_eq!(content_type_for("users.csv"), mime::TEXT_CSV);
        assert_eq!(content_type_for("s3://bucket/in/USERS.CSV"), mime::TEXT_CSV);
        assert_eq!(content_type_for("a.tsv"), mime::TEXT_TAB_SEPARATED_VALUES);
        assert_eq!(content_type_for("a.tab"), mime::TEXT_TAB_SEPARATED_VALUES);
        assert_eq!(content_type_for("a.xlsx").essence_str(), XLSX_CONTENT_TYPE);
        assert_eq!(content_type_for("settings.conf"), mime::TEXT_PLAIN);
        assert_eq!(content_type_for("no_extension"), mime::TEXT_PLAIN);
    }

    #[tokio::test]
    async fn test_users_csv_parses_in_order() {
        let registry = ParserRegistry::default();
        let records = registry
            .parse("users.csv", blob("id,email,name\n1,a@x.com,A\n2,b@x.com,B\n"))
            .await
            .unwrap();

        assert_eq!(
            records,
            vec![
                Record::from_iter([("id", "1"), ("email", "a@x.com"), ("name", "A")]),
                Record::from_iter([("id", "2"), ("email", "b@x.com"), ("name", "B")]),
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_of_two_over_five_rows() {
        let registry = ParserRegistry::default();
        let mut seen = Vec::new();

        let total = registry
            .parse_batches("rows.csv", blob(FIVE_ROWS), 2, |batch| {
                seen.push((batch.offset, batch.records.len()));
                async { Ok::<_, ParseError>(()) }
            })
            .await
            .unwrap();

        assert_eq!(total, 5);
        assert_eq!(seen, vec![(0, 2), (2, 2), (4, 1)]);
    }

    #[tokio::test]
    async fn test_zero_batch_size_uses_default() {
        let registry = ParserRegistry::default();
        let mut sizes = Vec::new();

        registry
            .parse_batches("rows.csv", blob(FIVE_ROWS), 0, |batch| {
                sizes.push(batch.records.len());
                async { Ok::<_, ParseError>(()) }
            })
            .await
            .unwrap();

        assert_eq!(sizes, vec![5]);
    }

    #[tokio::test]
    async fn test_callback_error_stops_parsing() {
        #[derive(Debug)]
        enum Stop {
            Callback,
            Parse,
        }
        impl From<ParseError> for Stop {
            fn from(_: ParseError) -> Self {
                Stop::Parse
            }
        }

        let registry = ParserRegistry::default();
        let mut calls = 0;

        let result = registry
            .parse_batches("rows.csv", blob(FIVE_ROWS), 2, |_| {
                calls += 1;
                let outcome = if calls == 2 { Err(Stop::Callback) } else { Ok(()) };
                async move { outcome }
            })
            .await;

        assert!(matches!(result, Err(Stop::Callback)));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_empty_file_yields_no_batches() {
        let registry = ParserRegistry::default();
        let mut calls = 0;

        let total = registry
            .parse_batches("empty.csv", blob(""), 10, |_| {
                calls += 1;
                async { Ok::<_, ParseError>(()) }
            })
            .await
            .unwrap();

        assert_eq!(total, 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_xlsx_is_unsupported_in_both_modes() {
        let registry = ParserRegistry::default();

        let err = registry.parse("report.xlsx", blob("PK")).await.unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));

        let err = registry
            .parse_batches("report.xlsx", blob("PK"), 10, |_| async {
                Ok::<_, ParseError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_registering_a_new_format() {
        let mut registry = ParserRegistry::empty();
        assert!(!registry.supports(&mime::TEXT_CSV));
        assert!(registry.parse("a.csv", blob("x\n1\n")).await.is_err());

        registry.register(&mime::TEXT_CSV, |input| delimited::records(input, b';'));
        let records = registry.parse("a.csv", blob("x;y\n1;2\n")).await.unwrap();
        assert_eq!(records[0].get("y"), Some("2"));
    }

    #[tokio::test]
    async fn test_key_value_parse_error_propagates() {
        let registry = ParserRegistry::default();
        let err = registry
            .parse("settings.txt", blob("ok=1\nbroken\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 2, .. }));
    }
}
