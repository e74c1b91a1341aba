//! PowerSheet CLI - A1 addressing, column-name formulas and backing-store sheets

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use powersheet::prelude::*;
use powersheet::{column_index_to_letters, resolve_for_display, resolve_for_storage, Resolution};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "psheet")]
#[command(
    author,
    version,
    about = "Spreadsheet addressing and formula tool for table-backed sheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Backend API root
    #[arg(long, env = "POWERSHEET_API_URL")]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "POWERSHEET_API_TIMEOUT_SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a cell (B3) or range (A1:C10) into zero-based indices
    Cell {
        reference: String,
    },

    /// Encode zero-based indices as an A1 address
    Address {
        row: u32,
        col: u32,
    },

    /// Rewrite column names in a formula to letter references (or back)
    Resolve {
        formula: String,

        /// Column names in table order, comma separated
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// 1-based row the formula lives in
        #[arg(short, long, default_value = "1")]
        row: u32,

        /// Letters to names instead of names to letters
        #[arg(long)]
        reverse: bool,
    },

    /// Evaluate a formula over rows given on the command line
    Eval {
        formula: String,

        /// Column names in table order, comma separated
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// One row of comma separated values; repeat for more rows
        #[arg(short = 'r', long = "row")]
        rows: Vec<String>,

        /// Cell the formula is placed in (default: first free column of row 1)
        #[arg(long)]
        at: Option<String>,
    },

    /// Check that the backend is reachable
    Health {
        #[command(flatten)]
        connection: Connection,
    },

    /// List the sheets known to the backend
    Sheets {
        #[command(flatten)]
        connection: Connection,
    },

    /// Show a table's columns and types
    Schema {
        table: String,

        #[command(flatten)]
        connection: Connection,
    },

    /// Print a table with formulas evaluated
    Show {
        table: String,

        /// Separator between values
        #[arg(short, long, default_value = "\t")]
        delimiter: String,

        #[command(flatten)]
        connection: Connection,
    },

    /// Write a value or formula into one cell of a table
    Set {
        table: String,

        /// Target cell, e.g. D2
        cell: String,

        /// Literal value, or formula starting with '='
        content: String,

        #[command(flatten)]
        connection: Connection,
    },

    /// Copy one cell over a range of a table
    Fill {
        table: String,

        /// Source cell, e.g. D1
        source: String,

        /// Target range, e.g. D1:D20
        target: String,

        #[command(flatten)]
        connection: Connection,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Cell { reference } => decode(&reference),
        Commands::Address { row, col } => {
            println!("{}", CellAddress::new(row, col));
            Ok(())
        }
        Commands::Resolve {
            formula,
            columns,
            row,
            reverse,
        } => resolve(&formula, &columns, row, reverse),
        Commands::Eval {
            formula,
            columns,
            rows,
            at,
        } => eval(&formula, columns, &rows, at.as_deref()),
        Commands::Health { connection } => health(&connection).await,
        Commands::Sheets { connection } => list_sheets(&connection).await,
        Commands::Schema { table, connection } => show_schema(&connection, &table).await,
        Commands::Show {
            table,
            delimiter,
            connection,
        } => show_table(&connection, &table, &delimiter).await,
        Commands::Set {
            table,
            cell,
            content,
            connection,
        } => set_cell(&connection, &table, &cell, &content).await,
        Commands::Fill {
            table,
            source,
            target,
            connection,
        } => fill(&connection, &table, &source, &target).await,
    }
}

fn decode(reference: &str) -> Result<()> {
    if reference.contains(':') {
        let range = CellRange::parse(reference)
            .with_context(|| format!("Invalid range '{}'", reference))?;
        let bounds = range.bounds();
        println!(
            "{}: rows {}..={}, cols {}..={} ({} cells)",
            range.normalized(),
            bounds.min_row,
            bounds.max_row,
            bounds.min_col,
            bounds.max_col,
            range.cell_count()
        );
    } else {
        let addr = CellAddress::parse(reference)
            .with_context(|| format!("Invalid cell reference '{}'", reference))?;
        println!("{}: row {}, col {}", addr, addr.row, addr.col);
    }
    Ok(())
}

fn row_index(row: u32) -> Result<u32> {
    match row.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Rows are numbered from 1"),
    }
}

fn report_unknown(resolution: &Resolution) {
    for unknown in &resolution.unknown {
        eprintln!("Warning: {}", unknown);
    }
}

fn resolve(formula: &str, columns: &[String], row: u32, reverse: bool) -> Result<()> {
    let row = row_index(row)?;
    let resolution = if reverse {
        resolve_for_display(formula, columns, row)
    } else {
        resolve_for_storage(formula, columns, row)
    };
    report_unknown(&resolution);
    println!("{}", resolution.formula);
    Ok(())
}

fn parse_rows(rows: &[String]) -> Vec<Vec<Scalar>> {
    rows.iter()
        .map(|row| row.split(',').map(|v| Scalar::from_input(v.trim())).collect())
        .collect()
}

fn eval(formula: &str, columns: Vec<String>, rows: &[String], at: Option<&str>) -> Result<()> {
    let rows = parse_rows(rows);
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(columns.len());
    let target = match at {
        Some(a1) => CellAddress::parse(a1).with_context(|| format!("Invalid cell reference '{}'", a1))?,
        None => CellAddress::new(0, width as u32),
    };

    let mut registry = FormulaRegistry::new();
    registry.open_sheet("cli", "cli", columns);
    registry
        .initialize_sheet("cli", rows)
        .context("Failed to load rows")?;

    let content = CellContent::parse(formula);
    let outcome = registry
        .set_cell("cli", target.row, target.col, content)
        .with_context(|| format!("Failed to set {}", target))?;

    for unknown in &outcome.unknown_columns {
        eprintln!("Warning: {}", unknown);
    }
    if let Some(failure) = &outcome.evaluation_failure {
        eprintln!("Evaluation failed: {}", failure);
    }
    if let Some(entry) = &outcome.entry {
        eprintln!("{} {}", target, entry.resolved_formula);
    }
    println!("{}", outcome.value);
    Ok(())
}

fn connect(connection: &Connection) -> Result<HttpStore> {
    let mut config = StoreConfig::default();
    if let Some(url) = &connection.url {
        config.base_url = url.clone();
    }
    if let Some(secs) = connection.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    let base_url = config.base_url.clone();
    HttpStore::new(config).with_context(|| format!("Failed to configure backend at '{}'", base_url))
}

async fn health(connection: &Connection) -> Result<()> {
    let store = connect(connection)?;
    let status = store.health().await.context("Health check failed")?;
    println!("{} ({})", status.status, status.service);
    if !status.is_healthy() {
        bail!("Backend reports '{}'", status.status);
    }
    Ok(())
}

async fn list_sheets(connection: &Connection) -> Result<()> {
    let store = connect(connection)?;
    let sheets = store.list_sheets().await.context("Failed to list sheets")?;

    if sheets.is_empty() {
        println!("No sheets");
        return Ok(());
    }
    println!("{:<24} {:<24} {:>8} {:>8}", "NAME", "TABLE", "ROWS", "COLUMNS");
    for sheet in &sheets {
        println!(
            "{:<24} {:<24} {:>8} {:>8}",
            sheet.name, sheet.table_name, sheet.row_count, sheet.column_count
        );
    }
    Ok(())
}

async fn show_schema(connection: &Connection, table: &str) -> Result<()> {
    let store = connect(connection)?;
    let schema = store
        .schema(table)
        .await
        .with_context(|| format!("Failed to read schema of '{}'", table))?;

    println!("Table: {} ({} rows)", schema.table_name, schema.row_count);
    for (i, column) in schema.columns.iter().enumerate() {
        println!(
            "  {:>3}  {:<24} {}{}",
            column_index_to_letters(i as u32),
            column.name,
            column.data_type,
            if column.nullable { "" } else { " NOT NULL" }
        );
    }
    Ok(())
}

async fn open(connection: &Connection, table: &str) -> Result<Document<HttpStore>> {
    let mut doc = Document::new(connect(connection)?);
    doc.open_sheet(table, table, table)
        .await
        .with_context(|| format!("Failed to open '{}'", table))?;
    Ok(doc)
}

async fn show_table(connection: &Connection, table: &str, delimiter: &str) -> Result<()> {
    let doc = open(connection, table).await?;
    let registry = doc.registry();
    let (rows, cols) = registry.dimensions(table).unwrap_or((0, 0));

    if let Some(columns) = registry.backing_columns(table) {
        println!("{}", columns.join(delimiter));
    }
    for row in 0..rows as u32 {
        let line: Vec<String> = (0..cols as u32)
            .map(|col| {
                registry
                    .get_cell_value(table, row, col)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", line.join(delimiter));
    }
    Ok(())
}

async fn set_cell(connection: &Connection, table: &str, cell: &str, content: &str) -> Result<()> {
    let target =
        CellAddress::parse(cell).with_context(|| format!("Invalid cell reference '{}'", cell))?;
    let mut doc = open(connection, table).await?;

    let outcome = doc
        .set_cell(table, target.row, target.col, CellContent::parse(content))
        .await
        .with_context(|| format!("Failed to write {}", target))?;

    for unknown in &outcome.unknown_columns {
        eprintln!("Warning: {}", unknown);
    }
    match &outcome.entry {
        Some(entry) => println!("{} = {} ({})", target, outcome.value, entry.raw_formula),
        None => println!("{} = {}", target, outcome.value),
    }
    Ok(())
}

async fn fill(connection: &Connection, table: &str, source: &str, target: &str) -> Result<()> {
    let source =
        CellAddress::parse(source).with_context(|| format!("Invalid cell reference '{}'", source))?;
    let target =
        CellRange::parse(target).with_context(|| format!("Invalid range '{}'", target))?;
    let mut doc = open(connection, table).await?;

    let report = doc
        .fill(table, FillOperation::new(source, target))
        .await
        .context("Fill failed")?;

    for failed in &report.failures {
        eprintln!("Failed to persist {}: {}", failed.address, failed.error);
    }
    eprintln!(
        "Filled {} cells ({} not persisted)",
        report.outcomes.len(),
        report.failures.len()
    );
    if !report.is_complete() {
        bail!("Some cells were not persisted; reload the sheet to see the stored values");
    }
    Ok(())
}
