//! Interactive dashboard: health banner, providers table and per-row actions.
//!
//! Actions run in background tasks so the prompt stays usable; their
//! outcomes arrive as notifications, and a successful action schedules a
//! table refresh after the configured delay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use incr_ingestion::IncrementalIngestionApi;

use crate::admin::{
    load_rows, perform_action, Action, ActionTracker, HealthBanner, MarksPanel, Notification,
    NotificationLevel, Notifications, ProviderRow,
};
use crate::terminal::Terminal;

/// How long a notification stays on screen.
const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

const HELP: &str = "\
Commands:
  refresh | r                 reload health and providers
  trigger <provider|#>        run the provider's next action now
  start <provider|#>          abandon the cycle and start a new one now
  cancel <provider|#>         abandon the cycle, next start in 24 hours
  marks <provider|#>          show ingestion marks for the current cycle
  help                        show this help
  exit | quit                 leave the dashboard
Press Enter on an empty line to show pending notifications.";

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCommand {
    Refresh,
    Help,
    Act(Action, String),
    Marks(String),
}

impl DashboardCommand {
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parts = input.split_whitespace();
        let command = parts.next().ok_or_else(|| "empty command".to_string())?;
        // Provider names may contain spaces.
        let arg = parts.collect::<Vec<_>>().join(" ");
        let need_arg = |arg: String| {
            if arg.is_empty() {
                Err(format!("'{command}' needs a provider name or row number"))
            } else {
                Ok(arg)
            }
        };
        match command {
            "refresh" | "r" => Ok(Self::Refresh),
            "help" | "?" => Ok(Self::Help),
            "trigger" => Ok(Self::Act(Action::Trigger, need_arg(arg)?)),
            "start" => Ok(Self::Act(Action::Start, need_arg(arg)?)),
            "cancel" => Ok(Self::Act(Action::Cancel, need_arg(arg)?)),
            "marks" => Ok(Self::Marks(need_arg(arg)?)),
            other => Err(format!("unknown command '{other}', type 'help'")),
        }
    }
}

/// Resolve an exact provider name, else a 1-based row number.
pub fn resolve_provider<'a>(rows: &'a [ProviderRow], arg: &str) -> Option<&'a str> {
    if let Some(row) = rows.iter().find(|r| r.name == arg) {
        return Some(&row.name);
    }
    let index: usize = arg.parse().ok()?;
    rows.get(index.checked_sub(1)?).map(|r| r.name.as_str())
}

#[derive(Debug)]
enum Event {
    Notify(Notification),
    Refresh,
}

enum Wake {
    Event(Event),
    /// `None` once stdin is closed or the user typed exit.
    Input(Option<Result<String>>),
}

/// Forward prompt input until the user leaves; dropping `tx` signals exit.
fn read_lines(terminal: Terminal, tx: UnboundedSender<Result<String>>) {
    loop {
        match terminal.read_input() {
            Ok(Some(line)) => {
                if tx.send(Ok(line)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

pub struct Dashboard {
    api: Arc<dyn IncrementalIngestionApi>,
    terminal: Terminal,
    tracker: ActionTracker,
    refresh_delay: Duration,
    notifications: Notifications,
    rows: Vec<ProviderRow>,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn IncrementalIngestionApi>, refresh_delay: Duration) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            api,
            terminal: Terminal::new(),
            tracker: ActionTracker::new(),
            refresh_delay,
            notifications: Notifications::new(NOTIFICATION_TTL),
            rows: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    pub async fn run(mut self, backend: &str) -> Result<()> {
        self.terminal
            .print_banner(backend, self.refresh_delay.as_millis() as u64)?;
        self.refresh().await?;

        // A plain thread: a blocked stdin read must not hold up runtime shutdown.
        let (input_tx, mut input_rx) = unbounded_channel();
        let terminal = self.terminal;
        std::thread::spawn(move || read_lines(terminal, input_tx));

        while self.step(&mut input_rx).await? {}
        Ok(())
    }

    /// Handle the next input line or background event, whichever comes
    /// first. Returns false once the user leaves.
    async fn step(&mut self, input_rx: &mut UnboundedReceiver<Result<String>>) -> Result<bool> {
        let wake = tokio::select! {
            Some(event) = self.events_rx.recv() => Wake::Event(event),
            line = input_rx.recv() => Wake::Input(line),
        };

        match wake {
            Wake::Event(Event::Notify(notification)) => {
                self.terminal.print_notification(&notification)?;
                self.notifications.push(notification);
            }
            Wake::Event(Event::Refresh) => self.refresh().await?,
            Wake::Input(None) => {
                self.terminal.print_info("Goodbye.")?;
                return Ok(false);
            }
            Wake::Input(Some(line)) => {
                let input = line?;
                if input.is_empty() {
                    for notification in self.notifications.active() {
                        self.terminal.print_notification(&notification)?;
                    }
                    return Ok(true);
                }
                match DashboardCommand::parse(&input) {
                    Ok(command) => self.dispatch(command).await?,
                    Err(msg) => self.terminal.print_error(&msg)?,
                }
            }
        }
        Ok(true)
    }

    async fn dispatch(&mut self, command: DashboardCommand) -> Result<()> {
        match command {
            DashboardCommand::Refresh => self.refresh().await,
            DashboardCommand::Help => self.terminal.print_info(HELP),
            DashboardCommand::Act(action, arg) => {
                let Some(provider) = resolve_provider(&self.rows, &arg).map(str::to_string) else {
                    return self.terminal.print_error(&format!("no provider '{arg}'"));
                };
                if self.tracker.is_busy(&provider) {
                    return self.terminal.print_error(&format!(
                        "An action is already in progress for {provider}"
                    ));
                }
                self.spawn_action(action, provider.clone());
                self.terminal
                    .print_info(&format!("{} requested for {}", action.verb(), provider))
            }
            DashboardCommand::Marks(arg) => {
                let Some(provider) = resolve_provider(&self.rows, &arg).map(str::to_string) else {
                    return self.terminal.print_error(&format!("no provider '{arg}'"));
                };
                match self.api.get_provider_marks(&provider).await {
                    Ok(resp) => self
                        .terminal
                        .print_marks(&provider, &MarksPanel::from_response(&resp)),
                    Err(e) => self
                        .terminal
                        .print_error(&format!("Failed to load marks for {provider}: {e}")),
                }
            }
        }
    }

    /// Run `action` in the background; report and schedule a refresh.
    fn spawn_action(&self, action: Action, provider: String) {
        let api = self.api.clone();
        let tracker = self.tracker.clone();
        let tx = self.events_tx.clone();
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            let notification = perform_action(api.as_ref(), &tracker, action, &provider).await;
            let succeeded = notification.level == NotificationLevel::Success;
            // The receiver is gone once the dashboard exits.
            let _ = tx.send(Event::Notify(notification));
            if succeeded {
                debug!(
                    provider = %provider,
                    delay_ms = delay.as_millis() as u64,
                    "refresh scheduled"
                );
                tokio::time::sleep(delay).await;
                let _ = tx.send(Event::Refresh);
            }
        });
    }

    /// Reload and print health and the providers table. Failures are shown,
    /// not returned.
    async fn refresh(&mut self) -> Result<()> {
        match self.api.get_health().await {
            Ok(health) => self
                .terminal
                .print_health(&HealthBanner::from_response(&health))?,
            Err(e) => self
                .terminal
                .print_error(&format!("Failed to load health: {e}"))?,
        }
        match load_rows(self.api.as_ref()).await {
            Ok(rows) => {
                info!(providers = rows.len(), "dashboard refreshed");
                self.rows = rows;
                self.terminal.print_providers(&self.rows)?;
            }
            Err(e) => self
                .terminal
                .print_error(&format!("Failed to load providers: {e}"))?,
        }
        Ok(())
    }
}
