// Interactive editing session (cellgraph repl)

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use cellgraph_config::Settings;
use cellgraph_engine::Spreadsheet;

use crate::exit_codes::EXIT_ERROR;
use crate::{display_value, new_sheet, open_sheet, save_sheet, sheet_path, CliError};

pub struct Session {
    sheet: Spreadsheet,
    path: Option<PathBuf>,
    error_markers: bool,
}

enum Flow {
    Continue,
    Quit,
}

impl Session {
    pub fn open(settings: &Settings, file: Option<&Path>) -> Result<Self, CliError> {
        let path = file.map(sheet_path);
        let sheet = match &path {
            Some(path) => open_sheet(settings, path, true)?,
            None => new_sheet(settings)?,
        };
        Ok(Self {
            sheet,
            path,
            error_markers: settings.error_markers,
        })
    }

    /// Handle one input line, writing any output to `out`.
    fn handle<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let line = line.trim();

        match line {
            "" => {}
            ":q!" => return Ok(Flow::Quit),
            ":q" => {
                if !self.sheet.changed() {
                    return Ok(Flow::Quit);
                }
                writeln!(out, "unsaved changes (:w to save, :q! to discard)")?;
            }
            _ if line == ":w" || line.starts_with(":w ") => {
                let target = line[2..].trim();
                if !target.is_empty() {
                    self.path = Some(sheet_path(Path::new(target)));
                }
                match &self.path {
                    Some(path) => match save_sheet(&mut self.sheet, path) {
                        Ok(()) => writeln!(out, "saved {}", path.display())?,
                        Err(e) => writeln!(out, "error: {}", e.message)?,
                    },
                    None => writeln!(out, "error: no file name (use :w FILE)")?,
                }
            }
            _ => match line.split_once('=') {
                Some((name, contents)) => {
                    match self.sheet.set_contents_of_cell(name.trim(), contents.trim()) {
                        Ok(affected) => {
                            for name in &affected {
                                self.print_value(name, out)?;
                            }
                        }
                        Err(e) => writeln!(out, "error: {}", e)?,
                    }
                }
                None => match self.sheet.cell_contents(line) {
                    Ok(contents) => {
                        writeln!(out, "{}: {}", line.to_ascii_uppercase(), contents)?;
                        self.print_value(line, out)?;
                    }
                    Err(e) => writeln!(out, "error: {}", e)?,
                },
            },
        }
        Ok(Flow::Continue)
    }

    fn print_value<W: Write>(&self, name: &str, out: &mut W) -> io::Result<()> {
        if let Ok(value) = self.sheet.cell_value(name) {
            writeln!(
                out,
                "{} = {}",
                name.to_ascii_uppercase(),
                display_value(value, self.error_markers)
            )?;
        }
        Ok(())
    }

    /// Read commands until `:q`, `:q!` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W, prompt: bool) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            if prompt {
                write!(out, "> ")?;
                out.flush()?;
            }
            let Some(line) = lines.next() else {
                break;
            };
            if let Flow::Quit = self.handle(&line?, &mut out)? {
                break;
            }
        }
        if self.sheet.changed() {
            log::warn!("Session ended with unsaved changes");
        }
        Ok(())
    }
}

pub fn run_stdio(settings: &Settings, file: Option<&Path>) -> Result<(), CliError> {
    let mut session = Session::open(settings, file)?;
    let stdin = io::stdin();
    let prompt = stdin.is_terminal();
    session
        .run(stdin.lock(), io::stdout().lock(), prompt)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))
}
