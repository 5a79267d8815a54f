//! Pilotage CLI - load, inspect and save the HR workbook
//!
//! # Main Commands
//!
//! ```bash
//! pilotage serve                        # Start HTTP server (port 3000)
//! pilotage load -o dataset.json         # Load and normalize the workbook
//! pilotage kpis --service RH --raise 2  # Dashboard figures
//! pilotage employee "Dupont"            # One employee card
//! pilotage save export.csv --sheet Salaires
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! pilotage parse input.csv              # Just parse a file to JSON
//! pilotage headers input.csv            # Show header rewrites
//! ```

use clap::{Args, Parser, Subcommand};
use pilotage::{
    canonical_header, kpi, load_dataset, logging, normalize_headers, parse_csv_file_auto,
    parse_upload, save_table, source, AppConfig, Dataset, DepartmentFilter, SourceConfig,
};
use pilotage::parser::is_workbook_name;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pilotage")]
#[command(about = "Load, normalize and save HR/Sales workbook data", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `PILOTAGE_*` environment
#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// Workbook file, CSV directory or sheet service URL
    #[arg(long)]
    source: Option<String>,

    /// Workbook name (remote sources)
    #[arg(long)]
    workbook: Option<String>,

    /// Reference date for ages and tenure (DD/MM/YYYY)
    #[arg(long)]
    reference_date: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV or workbook file and output JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Sheet to read from a workbook (default: first)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how the headers of a file are normalized
    Headers {
        /// Input file
        input: PathBuf,

        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Load the whole workbook and output the normalized dataset
    Load {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute dashboard figures
    Kpis {
        #[command(flatten)]
        source: SourceArgs,

        /// Department filter ("Tous" for all)
        #[arg(long)]
        service: Option<String>,

        /// Raise percentage for the simulation
        #[arg(long, default_value = "0")]
        raise: f64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show one employee card
    Employee {
        name: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Replace a sheet with the content of a CSV or workbook file
    Save {
        /// Input file
        input: PathBuf,

        /// Target sheet
        #[arg(short, long)]
        sheet: String,

        /// Sheet to read from an input workbook (default: first)
        #[arg(long)]
        from_sheet: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: PILOTAGE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Parse { input, sheet, output } => cmd_parse(&input, sheet.as_deref(), output.as_deref()),

        Commands::Headers { input, sheet } => cmd_headers(&input, sheet.as_deref()),

        Commands::Load { source, output } => cmd_load(&source, output.as_deref()).await,

        Commands::Kpis {
            source,
            service,
            raise,
            output,
        } => cmd_kpis(&source, service.as_deref(), raise, output.as_deref()).await,

        Commands::Employee { name, source } => cmd_employee(&source, &name).await,

        Commands::Save {
            input,
            sheet,
            from_sheet,
            source,
        } => cmd_save(&source, &input, &sheet, from_sheet.as_deref()).await,

        Commands::Serve { port, source } => cmd_serve(&source, port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment configuration with the CLI overrides applied.
fn config(args: &SourceArgs) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(workbook) = &args.workbook {
        config.layout.workbook = workbook.clone();
    }
    if args.source.is_some() || args.workbook.is_some() {
        let location = args
            .source
            .clone()
            .unwrap_or_else(|| format!("{}.xlsx", config.layout.workbook));
        let token = match &config.source {
            SourceConfig::Http { token, .. } => token.clone(),
            _ => None,
        };
        config.source = SourceConfig::from_location(&location, &config.layout.workbook).with_token(token);
    }
    if let Some(date) = &args.reference_date {
        config.reference_date = Some(
            pilotage::normalize::parse_date_str(date)
                .ok_or_else(|| format!("invalid reference date '{}', expected DD/MM/YYYY", date))?,
        );
    }
    Ok(config)
}

async fn load(config: &AppConfig) -> Result<Dataset, Box<dyn std::error::Error>> {
    let source = source::open(&config.source);
    Ok(load_dataset(source.as_ref(), &config.pipeline_options()).await?)
}

fn read_file(input: &Path, sheet: Option<&str>) -> Result<pilotage::RawTable, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let file_name = input.file_name().and_then(|n| n.to_str()).unwrap_or("input.csv");
    Ok(parse_upload(bytes, file_name, sheet)?)
}

fn is_csv(input: &Path) -> bool {
    !is_workbook_name(&input.to_string_lossy())
}

fn cmd_parse(input: &Path, sheet: Option<&str>, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = if is_csv(input) {
        let parsed = parse_csv_file_auto(input)?;
        eprintln!("   Encoding: {}", parsed.encoding);
        eprintln!("   Delimiter: '{}'", format_delimiter(parsed.delimiter));
        parsed.table
    } else {
        read_file(input, sheet)?
    };
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.len());

    let json = serde_json::to_string_pretty(&table)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_headers(input: &Path, sheet: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_file(input, sheet)?;
    for header in &table.headers {
        let normalized = canonical_header(header);
        if normalized == *header {
            println!("  {}", header);
        } else {
            println!("  {:?} -> {}", header, normalized);
        }
    }
    Ok(())
}

async fn cmd_load(args: &SourceArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(args)?;
    let dataset = load(&config).await?;

    eprintln!("📊 {} employees loaded on {}", dataset.employees.len(), dataset.loaded_on);
    for warning in &dataset.warnings {
        eprintln!("   ⚠️  {}", warning);
    }

    let json = serde_json::to_string_pretty(&dataset)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_kpis(
    args: &SourceArgs,
    service: Option<&str>,
    raise: f64,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(args)?;
    let dataset = load(&config).await?;
    let filter = DepartmentFilter::from_param(service);

    let kpis = kpi::dashboard(&dataset, &filter, raise);
    eprintln!("👥 Headcount: {}", kpis.workforce.headcount);
    eprintln!("💶 Payroll: {:.0} €", kpis.workforce.payroll);
    eprintln!("⚖️  Pay gap index: {:.1} %", kpis.workforce.pay_gap_index);
    eprintln!("💰 Budget: {:.0} €", kpis.budget.total);

    let json = serde_json::to_string_pretty(&kpis)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_employee(args: &SourceArgs, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(args)?;
    let dataset = load(&config).await?;
    let card = kpi::employee_card_for(&dataset, name).ok_or_else(|| format!("Employee not found: {}", name))?;

    if card.minimum_wage_alert {
        eprintln!("⚠️  {} is at minimum wage", card.name);
    }
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

async fn cmd_save(
    args: &SourceArgs,
    input: &Path,
    sheet: &str,
    from_sheet: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(args)?;
    let mut table = read_file(input, from_sheet)?;
    normalize_headers(&mut table);

    let source = source::open(&config.source);
    let saved = save_table(source.as_ref(), sheet, &table).await?;
    eprintln!("💾 {} rows written to '{}' in '{}'", saved.len(), sheet, source.workbook());
    Ok(())
}

async fn cmd_serve(args: &SourceArgs, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config(args)?;
    if let Some(port) = port {
        config.port = port;
    }
    pilotage::server::start_server(config).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
