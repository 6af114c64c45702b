//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::pin::pin;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dynaq_aws::{BatchWriter, DynamoClient, key_of};
use dynaq_core::{
    CompiledQuery, DynaqConfig, KeySchemaProvider, QueryTokens, ReadOptions, compile, plan_read,
    traverse,
};
use dynaq_model::TableSchema;
use futures::{Stream, TryStreamExt};
use tracing::{info, warn};

use crate::records::{ArrayWriter, read_records, write_line};

/// Which records a command operates on.
#[derive(Debug, Clone, Args)]
pub struct Selection {
    /// Table to read.
    #[arg(short, long)]
    pub table: String,

    /// Partition key value.
    #[arg(long)]
    pub pk: Option<String>,

    /// Sort key condition, e.g. `>=2024`, `begins_with(A#)`, `between(1,9)`.
    #[arg(long, allow_hyphen_values = true)]
    pub sk: Option<String>,

    /// Secondary index to read from.
    #[arg(short, long)]
    pub index: Option<String>,

    /// Shorthand filter, e.g. `age > 18 AND status IN ('a','b')`.
    #[arg(short, long)]
    pub filter: Option<String>,
}

impl Selection {
    fn tokens(&self) -> QueryTokens {
        QueryTokens {
            partition: self.pk.clone(),
            sort: self.sk.clone(),
            index: self.index.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// dynaq subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print matching records as JSON lines.
    Query(Selection),

    /// Print the number of matching records.
    Count(Selection),

    /// Print the read request without executing it.
    Plan(Selection),

    /// Write matching records to a JSON array file.
    Export {
        #[command(flatten)]
        selection: Selection,

        /// Output file; `-` for stdout.
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Put records from a JSON array or JSON-lines file.
    Import {
        /// Destination table.
        #[arg(short, long)]
        table: String,

        /// Input file.
        #[arg(long)]
        input: PathBuf,
    },

    /// Copy matching records into another table.
    Copy {
        #[command(flatten)]
        selection: Selection,

        /// Destination table.
        #[arg(long)]
        to: String,
    },

    /// Delete matching records, in write batches as they are read.
    Delete {
        #[command(flatten)]
        selection: Selection,

        /// Actually delete; otherwise only count what would be deleted.
        #[arg(long)]
        yes: bool,
    },
}

/// Run `command` against `client`.
pub async fn run(command: Command, client: &DynamoClient, config: &DynaqConfig) -> Result<()> {
    let options = ReadOptions {
        page_size: config.page_size,
    };
    match command {
        Command::Query(selection) => query(client, &selection, options).await,
        Command::Count(selection) => count(client, &selection, options).await,
        Command::Plan(selection) => plan(client, &selection, options).await,
        Command::Export { selection, output } => {
            export(client, &selection, options, &output).await
        }
        Command::Import { table, input } => {
            import(client, config.write_batch_size, &table, &input).await
        }
        Command::Copy { selection, to } => {
            copy(client, &selection, options, config.write_batch_size, &to).await
        }
        Command::Delete { selection, yes } => {
            delete(client, &selection, options, config.write_batch_size, yes).await
        }
    }
}

/// Describe the table and compile the selection against the right key schema.
async fn prepare(
    client: &DynamoClient,
    selection: &Selection,
) -> Result<(TableSchema, CompiledQuery)> {
    let schema = client.table_schema(&selection.table).await?;
    let key_schema = schema.key_schema_for(selection.index.as_deref())?;
    let query = compile(&selection.tokens(), key_schema)
        .with_context(|| format!("cannot build a read on {}", selection.table))?;
    Ok((schema, query))
}

async fn query(client: &DynamoClient, selection: &Selection, options: ReadOptions) -> Result<()> {
    let (_, compiled) = prepare(client, selection).await?;
    let mut records = pin!(traverse(client, &selection.table, &compiled, options)?);
    let mut out = BufWriter::new(io::stdout().lock());
    while let Some(item) = records.try_next().await? {
        write_line(&mut out, &item)?;
    }
    out.flush()?;
    Ok(())
}

async fn count(client: &DynamoClient, selection: &Selection, options: ReadOptions) -> Result<()> {
    let (_, compiled) = prepare(client, selection).await?;
    let total = traverse(client, &selection.table, &compiled, options)?
        .try_fold(0usize, |n, _| async move { Ok(n + 1) })
        .await?;
    println!("{total}");
    Ok(())
}

async fn plan(client: &DynamoClient, selection: &Selection, options: ReadOptions) -> Result<()> {
    let (_, compiled) = prepare(client, selection).await?;
    let request = plan_read(&selection.table, &compiled, options)?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

async fn export(
    client: &DynamoClient,
    selection: &Selection,
    options: ReadOptions,
    output: &Path,
) -> Result<()> {
    let (_, compiled) = prepare(client, selection).await?;
    let sink: Box<dyn Write> = if output == Path::new("-") {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        Box::new(file)
    };

    let mut writer = ArrayWriter::new(BufWriter::new(sink))?;
    let mut records = pin!(traverse(client, &selection.table, &compiled, options)?);
    while let Some(item) = records.try_next().await? {
        writer.push(&item)?;
    }
    let total = writer.finish()?;
    info!(table = %selection.table, count = total, output = %output.display(), "export complete");
    Ok(())
}

async fn import(client: &DynamoClient, batch_size: usize, table: &str, input: &Path) -> Result<()> {
    let items = read_records(input)?;
    let written = BatchWriter::new(client, batch_size)
        .put_items(table, items)
        .await
        .with_context(|| format!("failed to import into {table}"))?;
    info!(table, count = written, "import complete");
    println!("{written}");
    Ok(())
}

async fn copy(
    client: &DynamoClient,
    selection: &Selection,
    options: ReadOptions,
    batch_size: usize,
    to: &str,
) -> Result<()> {
    let (_, compiled) = prepare(client, selection).await?;
    let records = traverse(client, &selection.table, &compiled, options)?;
    let writer = &BatchWriter::new(client, batch_size);

    let copied = in_batches(
        records.map_err(anyhow::Error::from),
        writer.batch_size(),
        move |batch| async move { Ok::<_, anyhow::Error>(writer.put_items(to, batch).await?) },
    )
    .await?;

    info!(from = %selection.table, to, count = copied, "copy complete");
    println!("{copied}");
    Ok(())
}

async fn delete(
    client: &DynamoClient,
    selection: &Selection,
    options: ReadOptions,
    batch_size: usize,
    confirmed: bool,
) -> Result<()> {
    let (schema, compiled) = prepare(client, selection).await?;
    let key_schema = &schema.key_schema;
    let keys = traverse(client, &selection.table, &compiled, options)?
        .map_err(anyhow::Error::from)
        .and_then(move |item| {
            let key = key_of(&item, key_schema).map_err(anyhow::Error::from);
            async move { key }
        });

    if !confirmed {
        let total = keys.try_fold(0usize, |n, _| async move { Ok(n + 1) }).await?;
        warn!(table = %selection.table, count = total, "dry run, pass --yes to delete");
        println!("{total}");
        return Ok(());
    }

    // Cursors are key positions, so removing records already read does not
    // disturb the rest of the traversal.
    let writer = &BatchWriter::new(client, batch_size);
    let table = selection.table.as_str();
    let deleted = in_batches(keys, writer.batch_size(), move |batch| async move {
        Ok::<_, anyhow::Error>(writer.delete_keys(table, batch).await?)
    })
    .await?;
    info!(table = %selection.table, count = deleted, "delete complete");
    println!("{deleted}");
    Ok(())
}

/// Hand `records` to `flush` in batches of at most `batch_size`, stopping at
/// the first error. Returns the sum of what `flush` reports.
async fn in_batches<T, S, F, Fut>(records: S, batch_size: usize, mut flush: F) -> Result<usize>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    let batch_size = batch_size.max(1);
    let mut records = pin!(records);
    let mut pending = Vec::with_capacity(batch_size);
    let mut total = 0;
    while let Some(record) = records.try_next().await? {
        pending.push(record);
        if pending.len() == batch_size {
            total += flush(std::mem::take(&mut pending)).await?;
        }
    }
    if !pending.is_empty() {
        total += flush(pending).await?;
    }
    Ok(total)
}
