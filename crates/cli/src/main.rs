// cellgraph CLI - edit and inspect sheet files from the shell

mod exit_codes;
mod repl;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use cellgraph_config::Settings;
use cellgraph_engine::formula::Formula;
use cellgraph_engine::{CellValue, NameValidator, Spreadsheet};
use cellgraph_io::SHEET_EXTENSION;

use exit_codes::{EXIT_ERROR, EXIT_LOAD, EXIT_REJECTED, EXIT_SAVE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "cellgraph")]
#[command(about = "Spreadsheet cells with formulas and automatic recalculation")]
#[command(version)]
struct Cli {
    /// Log filter, e.g. "debug" (RUST_LOG takes precedence)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set one cell and save the sheet
    #[command(after_help = "\
Examples:
  cellgraph set budget.ss A1 3
  cellgraph set budget.ss B1 '=A1*2'
  cellgraph set budget.ss A1 ''        # clear A1

Prints every recalculated cell with its new value. The file is created if
it does not exist. A file name without an extension gets .ss appended.")]
    Set {
        file: PathBuf,
        cell: String,
        /// Number, text, or '=' followed by a formula
        #[arg(allow_hyphen_values = true)]
        contents: String,
    },

    /// Print a cell's contents and value
    Get {
        file: PathBuf,
        cell: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every non-empty cell, by column then row
    Show {
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cells that read a cell, and the cells it reads
    Deps { file: PathBuf, cell: String },

    /// Evaluate a standalone formula
    #[command(after_help = "\
Examples:
  cellgraph eval '(5 * 2) + 8'
  cellgraph eval 'x / y + 1' --var x=10 --var y=4")]
    Eval {
        formula: String,
        /// Variable value, repeatable
        #[arg(long = "var", value_name = "NAME=NUMBER")]
        vars: Vec<String>,
    },

    /// Interactive editing session
    #[command(after_help = "\
Commands:
  A1 = <contents>   set a cell (empty contents clears it)
  A1                show a cell
  :w [FILE]         save
  :q                quit (refuses with unsaved changes)
  :q!               quit without saving")]
    Repl { file: Option<PathBuf> },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::new(EXIT_LOAD, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(EXIT_REJECTED, msg)
    }

    pub fn save(msg: impl Into<String>) -> Self {
        Self::new(EXIT_SAVE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn init_logging(cli_level: Option<&str>, settings: &Settings) {
    let level = cli_level.unwrap_or(settings.log_level.as_str());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();
    init_logging(cli.log_level.as_deref(), &settings);

    let result = match cli.command {
        Commands::Set { file, cell, contents } => cmd_set(&settings, &file, &cell, &contents),
        Commands::Get { file, cell, json } => cmd_get(&settings, &file, &cell, json),
        Commands::Show { file, json } => cmd_show(&settings, &file, json),
        Commands::Deps { file, cell } => cmd_deps(&settings, &file, &cell),
        Commands::Eval { formula, vars } => cmd_eval(&formula, &vars),
        Commands::Repl { file } => repl::run_stdio(&settings, file.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Append the default extension to paths that have none.
pub fn sheet_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(SHEET_EXTENSION)
    }
}

/// Empty sheet using the name pattern from settings.
pub fn new_sheet(settings: &Settings) -> Result<Spreadsheet, CliError> {
    let validator = NameValidator::new(&settings.name_pattern).map_err(|e| {
        CliError::usage(format!("invalid sheet.namePattern in settings: {}", e))
            .with_hint(Settings::config_path_display())
    })?;
    Ok(Spreadsheet::with_validator(validator))
}

/// Load `path`, or start a new sheet when it does not exist and `create` is set.
pub fn open_sheet(settings: &Settings, path: &Path, create: bool) -> Result<Spreadsheet, CliError> {
    if !path.exists() {
        if create {
            log::info!("{} does not exist, starting a new sheet", path.display());
            return new_sheet(settings);
        }
        return Err(CliError::load(format!("{}: no such file", path.display())));
    }
    cellgraph_io::load_from_path(path)
        .map_err(|e| CliError::load(format!("{}: {}", path.display(), e)))
}

pub fn save_sheet(sheet: &mut Spreadsheet, path: &Path) -> Result<(), CliError> {
    cellgraph_io::save_to_path(sheet, path)
        .map_err(|e| CliError::save(format!("{}: {}", path.display(), e)))
}

/// Text shown for a value: a short marker or the full reason for errors.
pub fn display_value(value: &CellValue, error_markers: bool) -> String {
    if error_markers {
        value.to_string()
    } else {
        value.describe()
    }
}

fn cmd_set(settings: &Settings, file: &Path, cell: &str, contents: &str) -> Result<(), CliError> {
    let path = sheet_path(file);
    let mut sheet = open_sheet(settings, &path, true)?;

    let affected = sheet
        .set_contents_of_cell(cell, contents)
        .map_err(|e| CliError::rejected(e.to_string()))?;

    for name in &affected {
        let value = sheet
            .cell_value(name)
            .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{} = {}", name, display_value(value, settings.error_markers));
    }

    save_sheet(&mut sheet, &path)
}

#[derive(Serialize)]
struct CellRow {
    cell: String,
    contents: String,
    value: String,
}

fn cmd_get(settings: &Settings, file: &Path, cell: &str, json: bool) -> Result<(), CliError> {
    let sheet = open_sheet(settings, &sheet_path(file), false)?;
    let contents = sheet
        .cell_contents(cell)
        .map_err(|e| CliError::usage(e.to_string()))?;
    let value = sheet
        .cell_value(cell)
        .map_err(|e| CliError::usage(e.to_string()))?;

    if json {
        let row = CellRow {
            cell: cell.to_ascii_uppercase(),
            contents: contents.to_string(),
            value: display_value(value, settings.error_markers),
        };
        println!("{}", to_json(&row)?);
    } else {
        println!("contents: {}", contents);
        println!("value:    {}", display_value(value, settings.error_markers));
    }
    Ok(())
}

fn cmd_show(settings: &Settings, file: &Path, json: bool) -> Result<(), CliError> {
    let sheet = open_sheet(settings, &sheet_path(file), false)?;

    let rows: Vec<CellRow> = sheet
        .cells_by_position()
        .into_iter()
        .map(|(name, cell)| CellRow {
            cell: name.to_string(),
            contents: cell.contents.to_string(),
            value: display_value(&cell.value, settings.error_markers),
        })
        .collect();

    if json {
        println!("{}", to_json(&rows)?);
    } else {
        for row in rows {
            println!("{}\t{}\t{}", row.cell, row.contents, row.value);
        }
    }
    Ok(())
}

fn cmd_deps(settings: &Settings, file: &Path, cell: &str) -> Result<(), CliError> {
    let sheet = open_sheet(settings, &sheet_path(file), false)?;
    let dependents = sheet
        .direct_dependents(cell)
        .map_err(|e| CliError::usage(e.to_string()))?;
    let precedents = sheet
        .direct_precedents(cell)
        .map_err(|e| CliError::usage(e.to_string()))?;

    println!("dependents: {}", dependents.join(", "));
    println!("precedents: {}", precedents.join(", "));
    Ok(())
}

/// Parse `NAME=NUMBER` pairs from --var.
fn parse_vars(vars: &[String]) -> Result<HashMap<String, f64>, CliError> {
    let mut out = HashMap::new();
    for var in vars {
        let (name, value) = var
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("--var expects NAME=NUMBER, got \"{}\"", var)))?;
        let value: f64 = value.trim().parse().map_err(|_| {
            CliError::usage(format!("--var {}: \"{}\" is not a number", name, value))
        })?;
        out.insert(name.trim().to_string(), value);
    }
    Ok(out)
}

fn cmd_eval(formula: &str, vars: &[String]) -> Result<(), CliError> {
    let vars = parse_vars(vars)?;
    let formula = Formula::parse(formula).map_err(|e| CliError::rejected(e.to_string()))?;

    match formula.evaluate(|name| vars.get(name).copied()) {
        Ok(n) => {
            println!("{}", n);
            Ok(())
        }
        Err(e) => Err(CliError::new(EXIT_ERROR, e.to_string())),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))
}
