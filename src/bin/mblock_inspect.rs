//! Binary entry point for the micro block inspector.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sombra_microblock::storage::{
    BlockView, ColumnMap, ColumnType, ExistState, MicroBlockGetReader, MicroBlockReader,
    MultiVersionGetReader, MultiVersionInfo, MultiVersionLayout, ReaderOptions, RowHeader,
    Rowkey, StoreRow, Value,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mblock-inspect",
    version,
    about = "Inspect the header and rows of a micro block file",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        help = "Skip the full row index check when opening the block"
    )]
    no_verify: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Show the block header")]
    Header {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    #[command(about = "Decode rows by position")]
    Rows(RowsCmd),

    #[command(about = "Point lookup by key")]
    Get(GetCmd),

    #[command(about = "Find the lower or upper bound of a key")]
    Bound(BoundCmd),

    #[command(about = "Show version metadata of one row")]
    Mvcc(MvccCmd),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[arg(value_name = "FILE")]
    path: PathBuf,

    #[arg(
        long,
        value_name = "TYPE,TYPE",
        value_delimiter = ',',
        required = true,
        value_parser = parse_column_type,
        help = "Stored column types in order (bool, int, uint, float, str, bytes)"
    )]
    types: Vec<ColumnType>,
}

#[derive(Args, Debug)]
struct RowsCmd {
    #[command(flatten)]
    schema: SchemaArgs,

    #[arg(long, default_value_t = 0, help = "First row position")]
    begin: usize,

    #[arg(long, help = "Row position to stop before (defaults to the row count)")]
    end: Option<usize>,

    #[arg(long, help = "Walk from the last row toward the first")]
    reverse: bool,

    #[arg(long, default_value_t = 1024, help = "Maximum rows to print")]
    limit: usize,
}

#[derive(Args, Debug)]
struct GetCmd {
    #[command(flatten)]
    schema: SchemaArgs,

    #[arg(
        long,
        value_name = "CELL,CELL",
        value_delimiter = ',',
        required = true,
        allow_hyphen_values = true,
        help = "Key cells; bytes are hex, `min`/`max` are open bounds"
    )]
    key: Vec<String>,

    #[arg(long, help = "Treat the block as multi-version (newest version wins)")]
    multi_version: bool,
}

#[derive(Args, Debug)]
struct BoundCmd {
    #[command(flatten)]
    schema: SchemaArgs,

    #[arg(
        long,
        value_name = "CELL,CELL",
        value_delimiter = ',',
        required = true,
        allow_hyphen_values = true,
        help = "Key cells; bytes are hex, `min`/`max` are open bounds"
    )]
    key: Vec<String>,

    #[arg(long, help = "Search for the upper bound instead of the lower bound")]
    upper: bool,
}

#[derive(Args, Debug)]
struct MvccCmd {
    #[command(flatten)]
    schema: SchemaArgs,

    #[arg(long, help = "Number of user key columns, excluding version columns")]
    rowkey_count: usize,

    #[arg(long, help = "Row position")]
    row: usize,

    #[arg(long, value_enum, default_value_t = LayoutArg::V3, help = "Version column layout")]
    layout: LayoutArg,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LayoutArg {
    Legacy,
    V3,
}

impl From<LayoutArg> for MultiVersionLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Legacy => MultiVersionLayout::Legacy,
            LayoutArg::V3 => MultiVersionLayout::V3,
        }
    }
}

#[derive(Serialize)]
struct RowReport {
    position: usize,
    row_flag: String,
    mv_flag: u8,
    trans_id: u64,
    micro_first: bool,
    cells: Vec<String>,
}

#[derive(Serialize)]
struct GetReport {
    key: String,
    exists: ExistState,
    row_index: Option<usize>,
    row: Option<RowReport>,
}

#[derive(Serialize)]
struct BoundReport {
    key: String,
    lower_bound: bool,
    row_index: usize,
    equal: bool,
}

#[derive(Serialize)]
struct MvccReport {
    row: usize,
    header: RowHeader,
    info: MultiVersionInfo,
    magic: bool,
    compacted: bool,
    first: bool,
    last: bool,
}

/// Owned form of a key cell parsed from the command line.
enum KeyCell {
    Min,
    Max,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl KeyCell {
    fn as_value(&self) -> Value<'_> {
        match self {
            KeyCell::Min => Value::Min,
            KeyCell::Max => Value::Max,
            KeyCell::Null => Value::Null,
            KeyCell::Bool(v) => Value::Bool(*v),
            KeyCell::Int(v) => Value::Int(*v),
            KeyCell::UInt(v) => Value::UInt(*v),
            KeyCell::Float(v) => Value::Float(*v),
            KeyCell::Str(v) => Value::Str(v),
            KeyCell::Bytes(v) => Value::Bytes(v),
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let options = ReaderOptions::new().verify_row_index(!cli.no_verify);

    match cli.command {
        Command::Header { path } => {
            let buf = std::fs::read(&path)?;
            let view = BlockView::parse(&buf, options.verify_row_index)?;
            let header = *view.header();
            emit(&cli.format, &header, |_| {
                println!("version:          {}", header.version);
                println!("header_size:      {}", header.header_size);
                println!("column_count:     {}", header.column_count);
                println!("row_store:        {:?}", header.row_store);
                println!("multi_version:    {}", header.multi_version);
                println!("row_count:        {}", header.row_count);
                println!("row_index_offset: {}", header.row_index_offset);
                println!("data_len:         {}", header.data_len());
            })?;
        }
        Command::Rows(cmd) => {
            let buf = std::fs::read(&cmd.schema.path)?;
            let column_map = ColumnMap::full(cmd.schema.types.clone(), 0)?;
            let reports = run_rows(&cmd, &buf, &column_map, options)?;
            emit(&cli.format, &reports, |_| {
                for report in &reports {
                    print_row_text(report);
                }
            })?;
        }
        Command::Get(cmd) => {
            let buf = std::fs::read(&cmd.schema.path)?;
            let report = run_get(&cmd, &buf, options)?;
            emit(&cli.format, &report, |_| print_get_text(&report))?;
        }
        Command::Bound(cmd) => {
            let buf = std::fs::read(&cmd.schema.path)?;
            let report = run_bound(&cmd, &buf, options)?;
            emit(&cli.format, &report, |_| {
                let kind = if report.lower_bound { "lower" } else { "upper" };
                println!(
                    "{kind} bound of {} => row {} (equal={})",
                    report.key, report.row_index, report.equal
                );
            })?;
        }
        Command::Mvcc(cmd) => {
            let buf = std::fs::read(&cmd.schema.path)?;
            let report = run_mvcc(&cmd, &buf, options)?;
            emit(&cli.format, &report, |_| print_mvcc_text(&report))?;
        }
    }

    Ok(())
}

fn run_rows(
    cmd: &RowsCmd,
    buf: &[u8],
    column_map: &ColumnMap,
    options: ReaderOptions,
) -> Result<Vec<RowReport>, Box<dyn Error>> {
    let mut reader = MicroBlockReader::new(options);
    reader.init(buf, column_map)?;
    let row_count = reader.row_count()?;
    if row_count == 0 || cmd.limit == 0 {
        return Ok(Vec::new());
    }
    let (begin, end) = if cmd.reverse {
        let begin = cmd.end.unwrap_or(row_count).min(row_count) as i64 - 1;
        (begin, cmd.begin as i64 - 1)
    } else {
        (cmd.begin as i64, cmd.end.unwrap_or(row_count) as i64)
    };
    let mut rows = Vec::new();
    reader.get_rows(begin, end, cmd.limit, &mut rows)?;
    let step: i64 = if cmd.reverse { -1 } else { 1 };
    Ok(rows
        .iter()
        .enumerate()
        .map(|(offset, row)| row_report((begin + step * offset as i64) as usize, row))
        .collect())
}

fn run_get(cmd: &GetCmd, buf: &[u8], options: ReaderOptions) -> Result<GetReport, Box<dyn Error>> {
    let types = &cmd.schema.types;
    let cells = parse_key(&cmd.key, types)?;
    let rowkey = Rowkey::new(cells.iter().map(KeyCell::as_value));
    let (exists, row_index, row) = if cmd.multi_version {
        let mut reader = MultiVersionGetReader::new(options);
        let exists = reader.exists_row(buf, &rowkey, types, None)?;
        let row = lookup_full(exists, || reader.get_full_row(buf, &rowkey, types, None))?;
        (exists, reader.last_row_index(), row)
    } else {
        let mut reader = MicroBlockGetReader::new(options);
        let exists = reader.exists_row(buf, &rowkey, types, None)?;
        let row = lookup_full(exists, || reader.get_full_row(buf, &rowkey, types, None))?;
        (exists, reader.last_row_index(), row)
    };
    Ok(GetReport {
        key: rowkey.to_string(),
        exists,
        row: row.map(|row| row_report(row_index.unwrap_or_default(), &row)),
        row_index,
    })
}

fn lookup_full<'a, F>(
    exists: ExistState,
    fetch: F,
) -> Result<Option<StoreRow<'a>>, Box<dyn Error>>
where
    F: FnOnce() -> sombra_microblock::Result<StoreRow<'a>>,
{
    if !exists.found {
        return Ok(None);
    }
    Ok(Some(fetch()?))
}

fn run_bound(
    cmd: &BoundCmd,
    buf: &[u8],
    options: ReaderOptions,
) -> Result<BoundReport, Box<dyn Error>> {
    let cells = parse_key(&cmd.key, &cmd.schema.types)?;
    let rowkey = Rowkey::new(cells.iter().map(KeyCell::as_value));
    let column_map = ColumnMap::full(cmd.schema.types.clone(), rowkey.len())?;
    let mut reader = MicroBlockReader::new(options);
    reader.init(buf, &column_map)?;
    let end = reader.end()?;
    let lower_bound = !cmd.upper;
    let (row_index, equal) = if end == 0 {
        (0, false)
    } else {
        reader.find_bound(&rowkey, lower_bound, 0, end)?
    };
    Ok(BoundReport {
        key: rowkey.to_string(),
        lower_bound,
        row_index,
        equal,
    })
}

fn run_mvcc(cmd: &MvccCmd, buf: &[u8], options: ReaderOptions) -> Result<MvccReport, Box<dyn Error>> {
    let layout = MultiVersionLayout::from(cmd.layout);
    let column_map = ColumnMap::full(
        cmd.schema.types.clone(),
        cmd.rowkey_count + layout.extra_rowkey_count(),
    )?;
    let mut reader = MicroBlockReader::new(options.multi_version_layout(layout));
    reader.init(buf, &column_map)?;
    let header = reader.row_header(cmd.row)?;
    let info = reader.multi_version_info(
        cmd.row,
        layout.trans_version_col_idx(cmd.rowkey_count),
        layout.sql_sequence_col_idx(cmd.rowkey_count),
    )?;
    Ok(MvccReport {
        row: cmd.row,
        header,
        magic: info.flag.is_magic_row(),
        compacted: info.flag.is_compacted(),
        first: info.flag.is_first_multi_version_row(),
        last: info.flag.is_last_multi_version_row(),
        info,
    })
}

fn parse_column_type(name: &str) -> Result<ColumnType, String> {
    ColumnType::from_name(&name.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown column type `{name}`"))
}

fn parse_key(raw: &[String], types: &[ColumnType]) -> Result<Vec<KeyCell>, Box<dyn Error>> {
    if raw.len() > types.len() {
        return Err(format!(
            "key has {} cells but only {} column types were given",
            raw.len(),
            types.len()
        )
        .into());
    }
    raw.iter()
        .zip(types)
        .map(|(text, ty)| parse_key_cell(text, *ty))
        .collect()
}

fn parse_key_cell(text: &str, ty: ColumnType) -> Result<KeyCell, Box<dyn Error>> {
    match text {
        "min" => return Ok(KeyCell::Min),
        "max" => return Ok(KeyCell::Max),
        "null" => return Ok(KeyCell::Null),
        _ => {}
    }
    let cell = match ty {
        ColumnType::Bool => KeyCell::Bool(text.parse()?),
        ColumnType::Int => KeyCell::Int(text.parse()?),
        ColumnType::UInt => KeyCell::UInt(text.parse()?),
        ColumnType::Float => KeyCell::Float(text.parse()?),
        ColumnType::Str => KeyCell::Str(text.to_owned()),
        ColumnType::Bytes => KeyCell::Bytes(hex::decode(text)?),
    };
    Ok(cell)
}

fn render_cell(value: &Value<'_>) -> String {
    match value {
        Value::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        Value::Str(text) => (*text).to_owned(),
        other => other.to_string(),
    }
}

fn row_report(position: usize, row: &StoreRow<'_>) -> RowReport {
    RowReport {
        position,
        row_flag: format!("{:?}", row.row_flag),
        mv_flag: row.mv_flag.bits(),
        trans_id: row.trans_id.0,
        micro_first: row.micro_first,
        cells: row.cells.iter().map(render_cell).collect(),
    }
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_row_text(report: &RowReport) {
    println!(
        "#{:<5} {:<8} mv=0x{:02x} trans={} {}[{}]",
        report.position,
        report.row_flag,
        report.mv_flag,
        report.trans_id,
        if report.micro_first { "first " } else { "" },
        report.cells.join(", ")
    );
}

fn print_get_text(report: &GetReport) {
    match (&report.row, report.exists.exists) {
        (None, _) => println!("{} not found", report.key),
        (Some(row), true) => {
            println!("{} found at row {}", report.key, row.position);
            print_row_text(row);
        }
        (Some(row), false) => {
            println!("{} deleted at row {}", report.key, row.position);
            print_row_text(row);
        }
    }
}

fn print_mvcc_text(report: &MvccReport) {
    println!("row:           {}", report.row);
    println!("row_flag:      {:?}", report.header.row_flag);
    println!("trans_id:      {}", report.info.trans_id);
    println!("uncommitted:   {}", report.info.flag.is_uncommitted());
    println!("trans_version: {}", report.info.trans_version);
    println!("sql_sequence:  {}", report.info.sql_sequence);
    println!(
        "flags:         magic={} compacted={} first={} last={}",
        report.magic, report.compacted, report.first, report.last
    );
}
