use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use incr_ingestion::{
    CleanupResponse, DeleteMarksResponse, ProviderPurgeResponse, ProviderStatusResponse,
    StatusKind,
};

use crate::admin::{
    format_next_action, status_label, truncate_error, HealthBanner, MarksPanel, Notification,
    NotificationLevel, ProviderRow, NO_MARKS,
};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const PROMPT: Color = Color::Green;
    const OK: Color = Color::Green;
    const RUNNING: Color = Color::Cyan;
    const WARNING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn status_style(kind: StatusKind) -> (Color, &'static str) {
    match kind {
        StatusKind::Ok => (Colors::OK, "✔"),
        StatusKind::Running => (Colors::RUNNING, "↻"),
        StatusKind::Warning => (Colors::WARNING, "!"),
        StatusKind::Error => (Colors::ERROR, "✖"),
        StatusKind::Unknown => (Colors::DIM, "?"),
    }
}

/// Terminal I/O for one-shot commands and the dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print the dashboard banner.
    pub fn print_banner(&self, backend: &str, refresh_delay_ms: u64) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("incr-cli"),
            ResetColor,
            Print(" - Incremental Ingestion\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Backend: {} | Refresh delay: {}ms\n", backend, refresh_delay_ms)),
            Print("Type 'help' for commands, 'exit' or 'quit' to leave.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input with prompt.
    /// Returns None if the user wants to exit or stdin is closed.
    pub fn read_input(&self) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::PROMPT),
            Print("incr> "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let trimmed = input.trim().to_string();

        if trimmed == "exit" || trimmed == "quit" {
            return Ok(None);
        }

        Ok(Some(trimmed))
    }

    pub fn print_health(&self, banner: &HealthBanner) -> Result<()> {
        let mut stdout = io::stdout();
        let (color, icon) = if banner.healthy {
            (Colors::OK, "✔")
        } else {
            (Colors::ERROR, "✖")
        };
        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("{} {}\n", icon, banner.title)),
            ResetColor,
        )?;
        for provider in &banner.providers {
            execute!(stdout, Print(format!("  - {}\n", provider)))?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the providers table. Rows are numbered from 1 for dashboard commands.
    pub fn print_providers(&self, rows: &[ProviderRow]) -> Result<()> {
        let mut stdout = io::stdout();
        if rows.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No incremental providers found.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Incremental Providers:\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{:<4} {:<30} {:<16} {:<20} {}\n",
                "#", "PROVIDER", "STATUS", "NEXT ACTION", "LAST ERROR"
            )),
            Print(format!("{}\n", "-".repeat(100))),
            ResetColor,
        )?;

        for (i, row) in rows.iter().enumerate() {
            let (color, icon) = status_style(row.kind());
            execute!(
                stdout,
                Print(format!("{:<4} {:<30} ", i + 1, row.name)),
                SetForegroundColor(color),
                Print(format!("{} {:<14} ", icon, row.status)),
                ResetColor,
                Print(format!(
                    "{:<20} {}\n",
                    format_next_action(row.next_action_at.as_deref()),
                    truncate_error(row.last_error.as_deref()),
                )),
            )?;
        }

        stdout.flush()?;
        Ok(())
    }

    pub fn print_status(&self, provider: &str, resp: &ProviderStatusResponse) -> Result<()> {
        let mut stdout = io::stdout();
        let status = status_label(&resp.status.current_action);
        let (color, icon) = status_style(StatusKind::classify(&status));
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("{}\n", provider)),
            ResetColor,
            Print("  status:      "),
            SetForegroundColor(color),
            Print(format!("{} {}\n", icon, status)),
            ResetColor,
            Print(format!(
                "  next action: {}\n  last error:  {}\n",
                format_next_action(resp.status.next_action_at.as_deref()),
                resp.last_error.as_deref().unwrap_or("—"),
            )),
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_marks(&self, provider: &str, panel: &MarksPanel) -> Result<()> {
        let mut stdout = io::stdout();
        match panel {
            MarksPanel::Unavailable(message) => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::WARNING),
                    Print(format!("{}: {}\n", provider, message)),
                    ResetColor,
                )?;
            }
            MarksPanel::Empty => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("{}\n", NO_MARKS)),
                    ResetColor,
                )?;
            }
            MarksPanel::Marks { title, lines } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::HEADER),
                    Print(format!("{} - {}\n", provider, title)),
                    ResetColor,
                )?;
                for line in lines {
                    execute!(
                        stdout,
                        SetForegroundColor(Colors::RUNNING),
                        Print(format!("{:<6}", line.sequence)),
                        SetForegroundColor(Colors::DIM),
                        Print(format!("{}\n", line.created_at)),
                        ResetColor,
                    )?;
                    for cursor_line in line.cursor.lines() {
                        execute!(stdout, Print(format!("      {}\n", cursor_line)))?;
                    }
                }
            }
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_purge(&self, purge: &ProviderPurgeResponse) -> Result<()> {
        self.print_success(&format!(
            "Purged {}: {} ingestions, {} marks, {} mark entities deleted",
            purge.provider,
            purge.ingestions_deleted,
            purge.marks_deleted,
            purge.mark_entities_deleted
        ))
    }

    pub fn print_delete_marks(&self, provider: &str, resp: &DeleteMarksResponse) -> Result<()> {
        if resp.success {
            self.print_success(&format!("{} ({} deleted)", resp.message, resp.deletions))
        } else {
            self.print_error(&format!("{}: {}", provider, resp.message))
        }
    }

    pub fn print_cleanup(&self, resp: &CleanupResponse) -> Result<()> {
        self.print_success(&format!(
            "Cleanup complete: {} ingestions, {} marks, {} mark entities deleted",
            resp.ingestions_deleted, resp.ingestion_marks_deleted, resp.mark_entities_deleted
        ))
    }

    pub fn print_notification(&self, notification: &Notification) -> Result<()> {
        match notification.level {
            NotificationLevel::Success => self.print_success(&notification.message),
            NotificationLevel::Error => self.print_error(&notification.message),
        }
    }

    /// Prompt the user for a yes/no decision. Defaults to no.
    pub fn confirm(&self, question: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::WARNING),
            Print(format!("{} ", question)),
            ResetColor,
            SetForegroundColor(Colors::PROMPT),
            Print("[y/N] "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let trimmed = input.trim().to_lowercase();

        Ok(trimmed == "y" || trimmed == "yes")
    }

    pub fn print_success(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::OK),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}
