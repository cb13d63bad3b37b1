use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;

use crate::console::events::{Event, Events};
use crate::console::views::{render_message, render_update};
use crate::debugger::core::{absolute_path, DebugSession, SessionEvent};
use crate::debugger::error::DebugError;

/// Console commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a breakpoint; `file` defaults to the current buffer
    Break { file: Option<String>, line: u32 },
    Continue,                // Resume the simulator
    Files,                   // List files with breakpoints
    Open(String),            // Make a file the current buffer
    Lines,                   // Breakpoint lines of the current buffer
    Connect,                 // Re-send the callback address
    Status,                  // Show session state
    Help,
    Quit,
    Unknown(String),
}

const HELP: &str = "\
Commands:
  b, break <file>:<line>   Set a breakpoint
  b, break <line>          Set a breakpoint in the current file
  c, continue              Resume the simulator
  f, files                 List files with breakpoints
  o, open <file>           Make <file> the current file
  l, lines                 List breakpoint lines of the current file
  connect                  Re-send the callback address to the simulator
  s, status                Show session state
  h, help                  Show this help
  q, quit                  Quit";

fn location_regex() -> &'static Regex {
    static LOCATION: OnceLock<Regex> = OnceLock::new();
    LOCATION.get_or_init(|| {
        Regex::new(r"^(?P<file>.+?)(?::|\s+)(?P<line>\d+)$").expect("location pattern is valid")
    })
}

fn parse_line(text: &str) -> Option<u32> {
    text.parse::<u32>().ok().filter(|line| *line > 0)
}

fn parse_break(rest: &str) -> Command {
    if rest.is_empty() {
        return Command::Unknown("break requires <file>:<line> or <line>".to_string());
    }

    if let Some(line) = parse_line(rest) {
        return Command::Break { file: None, line };
    }

    if let Some(caps) = location_regex().captures(rest) {
        let file = caps["file"].trim();
        if let Some(line) = parse_line(&caps["line"]) {
            if !file.is_empty() {
                return Command::Break {
                    file: Some(file.to_string()),
                    line,
                };
            }
        }
    }

    Command::Unknown(format!("Invalid breakpoint location: {rest}"))
}

/// Parse one line of console input
pub fn parse_command(cmd_str: &str) -> Command {
    let cmd_str = cmd_str.trim();
    if cmd_str.is_empty() {
        return Command::Unknown(String::new());
    }

    let (name, rest) = match cmd_str.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (cmd_str, ""),
    };

    match name {
        "b" | "break" => parse_break(rest),
        "c" | "continue" => Command::Continue,
        "f" | "files" => Command::Files,
        "o" | "open" => {
            if rest.is_empty() {
                Command::Unknown("open requires a file name".to_string())
            } else {
                Command::Open(rest.to_string())
            }
        }
        "l" | "lines" => Command::Lines,
        "connect" => Command::Connect,
        "s" | "status" => Command::Status,
        "h" | "help" => Command::Help,
        "q" | "quit" => Command::Quit,
        other => Command::Unknown(format!("Unknown command: {other}")),
    }
}

/// Line-oriented front end driving a [`DebugSession`]
pub struct Console<W: Write> {
    session: DebugSession,
    /// Location of the current buffer
    current_file: Option<PathBuf>,
    out: W,
    color: bool,
}

impl<W: Write> Console<W> {
    pub fn new(session: DebugSession, out: W, color: bool) -> Self {
        Self {
            session,
            current_file: None,
            out,
            color,
        }
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    /// List the breakpoint files and open the first one
    pub fn load_initial_files(&mut self) -> Result<()> {
        let files = self
            .session
            .get_all_files()
            .context("reading breakpoint files")?;

        if files.is_empty() {
            writeln!(self.out, "The debug database has no breakpoints")?;
            return Ok(());
        }

        writeln!(self.out, "Files with breakpoints:")?;
        for file in &files {
            writeln!(self.out, "  {}", file)?;
        }
        self.current_file = files.first().map(PathBuf::from);
        self.show_current()?;
        Ok(())
    }

    /// Process events until the user quits or input ends
    pub fn run(&mut self, events: &Events) -> Result<()> {
        self.prompt()?;
        while let Ok(event) = events.next() {
            match event {
                Event::Input(line) => {
                    if !self.execute(parse_command(&line))? {
                        break;
                    }
                    self.prompt()?;
                }
                Event::Session(event) => self.show_session_event(&event)?,
                Event::InputClosed => break,
            }
        }
        info!("Console loop finished");
        Ok(())
    }

    /// Run one command; `false` means quit
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        debug!("Executing {:?}", command);
        match command {
            Command::Break { file, line } => {
                let file = match file {
                    Some(file) => absolute_path(&file),
                    None => self
                        .current_file
                        .as_ref()
                        .map(|path| path.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                };
                if let Ok(id) = self.session.set_break_point(&file, line) {
                    writeln!(self.out, "Breakpoint {} set at {}:{}", id, file, line)?;
                }
            }
            Command::Continue => {
                if self.session.continue_().is_ok() {
                    writeln!(self.out, "Continuing")?;
                }
            }
            Command::Files => match self.session.get_all_files() {
                Ok(files) => {
                    for file in files {
                        writeln!(self.out, "  {}", file)?;
                    }
                }
                Err(err) => self.report(err)?,
            },
            Command::Open(file) => {
                self.current_file = Some(PathBuf::from(absolute_path(&file)));
                self.show_current()?;
            }
            Command::Lines => self.show_current()?,
            Command::Connect => {
                if self.session.reconnect().is_ok() {
                    writeln!(self.out, "Connected")?;
                }
            }
            Command::Status => {
                let info = self.session.info();
                writeln!(
                    self.out,
                    "Simulator {}:{} ({}), callbacks on port {}",
                    info.host,
                    info.port,
                    if info.connected { "connected" } else { "not connected" },
                    info.callback_port
                )?;
            }
            Command::Help => writeln!(self.out, "{}", HELP)?,
            Command::Quit => return Ok(false),
            Command::Unknown(reason) => {
                if !reason.is_empty() {
                    writeln!(self.out, "{}", reason)?;
                }
            }
        }
        Ok(true)
    }

    /// Print a display update or message coming from the session
    pub fn show_session_event(&mut self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Update(update) => write!(self.out, "{}", render_update(update, self.color))?,
            SessionEvent::Message(text) => writeln!(self.out, "{}", render_message(text, self.color))?,
        }
        self.out.flush()?;
        Ok(())
    }

    /// Print a recoverable error and keep going; anything else ends the console
    fn report(&mut self, err: DebugError) -> Result<()> {
        if !err.is_recoverable() {
            return Err(err.into());
        }
        warn!("{}", err);
        writeln!(self.out, "{}", err)?;
        Ok(())
    }

    fn show_current(&mut self) -> Result<()> {
        let lines = match self
            .session
            .get_available_breakpoints(self.current_file.as_deref())
        {
            Ok(lines) => lines,
            Err(err) => return self.report(err),
        };
        match &self.current_file {
            Some(file) if lines.is_empty() => {
                writeln!(self.out, "{}: no breakpoints", file.display())?;
            }
            Some(file) => {
                let lines: Vec<String> = lines.iter().map(u32::to_string).collect();
                writeln!(self.out, "{}: lines {}", file.display(), lines.join(", "))?;
            }
            None => writeln!(self.out, "No current file")?,
        }
        Ok(())
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "(simcat) ")?;
        self.out.flush()?;
        Ok(())
    }

    /// Stop the session and hand back the output
    pub fn into_output(self) -> W {
        let Self { mut session, out, .. } = self;
        session.stop();
        out
    }
}
