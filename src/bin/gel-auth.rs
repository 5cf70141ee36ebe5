//! gel-auth — inspect what the Gel adapter generates
//!
//! # Usage
//!
//! ```bash
//! # Write dbschema/auth.gel from a logical schema
//! gel-auth --module auth schema --schema auth-schema.json
//!
//! # Show the EdgeQL a findMany call composes
//! gel-auth --module auth query find-many --schema auth-schema.json \
//!     --model session --where "userId=7a1b3c4d-0000-4000-8000-000000000001" \
//!     --sort createdAt:desc --limit 10
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use gel_auth::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gel-auth")]
#[command(version)]
#[command(about = "Gel adapter toolkit: EdgeQL statements and SDL schemas", long_about = None)]
#[command(after_help = "EXAMPLES:
    gel-auth --module auth schema --schema auth.json --stdout
    gel-auth --module auth query create --schema auth.json --model user --data '{\"email\":\"a@b.com\"}'
    gel-auth explain \"email=a@b.com | name~ada\"")]
struct Cli {
    /// Adapter config file (defaults to ./gel-auth.toml, then the user config dir)
    #[arg(short, long, global = true, env = "GEL_AUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Gel module name, overrides the config file
    #[arg(short, long, global = true)]
    module: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the Gel schema file for a logical schema
    Schema {
        /// Logical schema (.json or .toml)
        #[arg(short, long)]
        schema: PathBuf,

        /// Output path (defaults to dbschema/<module>.gel)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print instead of writing the file
        #[arg(long)]
        stdout: bool,
    },
    /// Show the statement and parameters composed for one operation
    Query {
        #[arg(value_enum)]
        operation: Operation,

        /// Logical schema (.json or .toml)
        #[arg(short, long)]
        schema: PathBuf,

        /// Model key
        #[arg(long)]
        model: String,

        /// Filter expression, e.g. "email=a@b.com & name~ada"
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        /// JSON object for create / update payloads
        #[arg(short, long)]
        data: Option<String>,

        /// Fields to project
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Sort as field[:asc|desc]
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Parse and explain a filter expression
    Explain {
        /// The expression to explain
        expression: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Create,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    Count,
    FindOne,
    FindMany,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Explain { expression } => {
            explain_expression(expression);
            Ok(())
        }
        Commands::Schema {
            schema,
            output,
            stdout,
        } => generate_schema(&cli, schema, output.as_deref(), *stdout),
        Commands::Query { .. } => run_query(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("GEL_AUTH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "gel_auth=debug" } else { "gel_auth=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit `--config`, then a discovered file, then `--module` alone.
fn resolve_config(cli: &Cli) -> Result<AdapterConfig> {
    let path = cli.config.clone().or_else(AdapterConfig::discover);
    let mut config = match (path, &cli.module) {
        (Some(path), _) => {
            tracing::debug!(path = %path.display(), "loading adapter config");
            AdapterConfig::load(&path)?
        }
        (None, Some(module)) => AdapterConfig::new(module.clone()),
        (None, None) => bail!("no config file found; pass --config or --module"),
    };
    if let Some(module) = &cli.module {
        config.module_name = module.clone();
    }
    if cli.verbose {
        config.debug_logs = true;
    }
    Ok(config)
}

fn load_schema(path: &Path) -> Result<Schema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    let schema = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid schema {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid schema {}", path.display()))?,
    };
    Ok(schema)
}

fn generate_schema(cli: &Cli, schema: &Path, output: Option<&Path>, stdout: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let schema = load_schema(schema)?;
    let adapter = GelAdapter::new(DryRunClient::new(), config);
    let file = adapter.create_schema(&schema, output)?;

    if stdout {
        print!("{}", file.code);
        return Ok(());
    }

    let path = file.write(Path::new("."))?;
    println!(
        "{} Wrote schema to {}",
        "✓".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn parse_sort(input: &str) -> Result<SortBy> {
    let (field, direction) = input.split_once(':').unwrap_or((input, "asc"));
    match direction.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortBy::asc(field)),
        "desc" => Ok(SortBy::desc(field)),
        other => bail!("invalid sort direction '{other}'"),
    }
}

fn parse_data(data: Option<&str>) -> Result<Record> {
    let Some(data) = data else {
        bail!("this operation needs --data");
    };
    match serde_json::from_str(data).context("Invalid --data")? {
        Value::Object(record) => Ok(record),
        _ => bail!("--data must be a JSON object"),
    }
}

async fn run_query(cli: &Cli) -> Result<()> {
    let Commands::Query {
        operation,
        schema,
        model,
        filter,
        data,
        select,
        sort,
        limit,
        offset,
        format,
    } = &cli.command
    else {
        return Ok(());
    };

    let config = resolve_config(cli)?;
    let schema = load_schema(schema)?;
    let conditions = match filter {
        Some(expr) => gel_auth::parse_filter(expr)?,
        None => Vec::new(),
    };
    let select = (!select.is_empty()).then_some(select.as_slice());
    let adapter = GelAdapter::new(DryRunClient::new(), config);

    match operation {
        Operation::Create => {
            let data = parse_data(data.as_deref())?;
            // The dry-run client answers no rows; only the composed statement matters.
            match adapter.create(&schema, model, &data, select).await {
                Ok(_) | Err(GelError::NoResult(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Operation::Update => {
            let data = parse_data(data.as_deref())?;
            adapter.update(&schema, model, &conditions, &data).await?;
        }
        Operation::UpdateMany => {
            let data = parse_data(data.as_deref())?;
            adapter.update_many(&schema, model, &conditions, &data).await?;
        }
        Operation::Delete => adapter.delete(&schema, model, &conditions).await?,
        Operation::DeleteMany => {
            adapter.delete_many(&schema, model, &conditions).await?;
        }
        Operation::Count => {
            adapter.count(&schema, model, &conditions).await?;
        }
        Operation::FindOne => {
            adapter.find_one(&schema, model, &conditions, select).await?;
        }
        Operation::FindMany => {
            let options = FindMany {
                limit: *limit,
                offset: *offset,
                sort_by: sort.as_deref().map(parse_sort).transpose()?,
                select: select.map(<[String]>::to_vec),
            };
            adapter.find_many(&schema, model, &conditions, &options).await?;
        }
    }

    let Some(statement) = adapter.client().last() else {
        bail!("no statement was composed");
    };
    print_statement(&statement, *format)
}

fn print_statement(statement: &Statement, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "query": statement.text,
                "params": statement.params,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{}", "Generated EdgeQL:".green().bold());
            println!("{}", statement.text.white());
            if !statement.params.is_empty() {
                println!();
                println!("{}", "Parameters:".cyan());
                for (name, value) in &statement.params {
                    println!("  ${} = {}", name, value.to_string().yellow());
                }
            }
        }
    }
    Ok(())
}

fn explain_expression(expression: &str) {
    println!("{}", "Filter Explanation".cyan().bold());
    println!();
    println!("{} {}", "Expression:".dimmed(), expression.yellow());
    println!();

    match gel_auth::parse_filter(expression) {
        Ok(conditions) if conditions.is_empty() => {
            println!("{}", "(no conditions)".dimmed());
        }
        Ok(conditions) => {
            println!("{}", "Conditions:".green().bold());
            for (i, cond) in conditions.iter().enumerate() {
                let connector = if i == 0 { "" } else { cond.connector.to_edgeql() };
                println!(
                    "  {:3} {} {} {}",
                    connector.dimmed(),
                    cond.field.white(),
                    cond.operator.to_string().cyan(),
                    cond.value.to_string().yellow()
                );
            }
        }
        Err(e) => {
            eprintln!("{} {}", "Parse Error:".red().bold(), e);
        }
    }
}
