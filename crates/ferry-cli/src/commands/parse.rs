//! `ferry parse` command implementation
//!
//! Streams a local file through the same parser registry and schema
//! validator the workers use. Nothing is written anywhere.

use ferry_server::blob::{BlobSource, FileBlobSource};
use ferry_server::error::ImportError;
use ferry_server::parser::{Batch, ParserRegistry, Record};
use ferry_server::schema::{ProductSchema, ProductType};
use std::path::Path;

use crate::error::{CliError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseSummary {
    pub records: usize,
    pub batches: usize,
}

pub async fn run(file: &Path, product: Option<&str>, batch_size: usize, print: bool) -> Result<()> {
    let summary = check(file, product, batch_size, |record| {
        if print {
            println!("{}", serde_json::to_string(record)?);
        }
        Ok(())
    })
    .await?;

    println!(
        "{}: {} records in {} batches{}",
        file.display(),
        summary.records,
        summary.batches,
        product
            .map(|p| format!(", valid {p}"))
            .unwrap_or_default()
    );
    Ok(())
}

/// Parse `file` batch by batch, validating against `product` when given,
/// and hand each record to `on_record`. Stops at the first error.
pub async fn check<F>(
    file: &Path,
    product: Option<&str>,
    batch_size: usize,
    mut on_record: F,
) -> Result<ParseSummary>
where
    F: FnMut(&Record) -> Result<()>,
{
    let schema: Option<&ProductSchema> = product
        .map(|p| p.parse::<ProductType>().map(|p| p.schema()))
        .transpose()
        .map_err(ImportError::from)?;

    let locator = file.to_string_lossy();
    let input = FileBlobSource::new()
        .open(&locator)
        .await
        .map_err(|source| CliError::Open {
            path: locator.to_string(),
            source,
        })?;

    let mut batches = 0;
    let records = ParserRegistry::default()
        .parse_batches(&locator, input, batch_size, |batch: Batch| {
            batches += 1;
            let result = visit(schema, &batch, &mut on_record);
            async move { result }
        })
        .await?;

    Ok(ParseSummary { records, batches })
}

fn visit<F>(schema: Option<&ProductSchema>, batch: &Batch, on_record: &mut F) -> Result<()>
where
    F: FnMut(&Record) -> Result<()>,
{
    if let Some(schema) = schema {
        schema
            .validate(batch.offset, &batch.records)
            .map_err(ImportError::from)?;
    }
    batch.records.iter().try_for_each(on_record)
}
