use chrono::{Datelike, Weekday};
use std::str::FromStr;

use crate::core::console::ConsoleLog;
use crate::core::domain::{RunningStack, ScanRecord, ScanResults, SonarSnapshot, StackSummary, TrivySnapshot};
use crate::core::form::StackForm;
use crate::core::sequencer::RequestSequencer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Dashboard,
    Stacks,
    Security,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Dashboard, Screen::Stacks, Screen::Security];

    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Dashboard => "dashboard",
            Screen::Stacks => "stacks",
            Screen::Security => "security",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Stacks => "Stacks",
            Screen::Security => "Segurança",
        }
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Screen::ALL
            .into_iter()
            .find(|screen| screen.as_str() == s)
            .ok_or_else(|| format!("unknown screen: {}", s))
    }
}

/// Action waiting for the user to confirm it in the modal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Deploy(String),
    Remove(String),
    StartLab,
    DestroyLab,
}

impl PendingAction {
    pub fn prompt(&self) -> (String, String) {
        match self {
            PendingAction::Deploy(name) => (
                "Deploy de Stack".into(),
                format!("Deseja fazer o deploy do stack \"{}\"?", name),
            ),
            PendingAction::Remove(name) => (
                "Remover Stack".into(),
                format!(
                    "Deseja remover o stack \"{}\"? Esta ação irá parar todos os serviços e deletar o arquivo YAML.",
                    name
                ),
            ),
            PendingAction::StartLab => (
                "🚀 Iniciar Lab Completo".into(),
                "Deseja iniciar todo o ambiente do lab? Isso pode levar alguns minutos.".into(),
            ),
            PendingAction::DestroyLab => (
                "⚠️ Destruir Lab".into(),
                "ATENÇÃO: Esta ação irá destruir todo o ambiente do lab, incluindo todos os stacks e volumes. Deseja continuar?".into(),
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmModal {
    pub title: String,
    pub message: String,
    pub action: PendingAction,
}

impl ConfirmModal {
    pub fn for_action(action: PendingAction) -> Self {
        let (title, message) = action.prompt();
        Self { title, message, action }
    }
}

/// The one stack loaded into the YAML editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YamlEditor {
    pub stack: String,
    pub yaml: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Listing<T> {
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Listing::Loading
    }
}

impl<T> Listing<T> {
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Listing::Loaded(items) => Some(items),
            _ => None,
        }
    }
}

/// State of a read-only scanner feed.
#[derive(Clone, Debug, PartialEq)]
pub enum Feed<T> {
    Loading,
    Online(T),
    Offline(String),
    Error(String),
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Feed::Loading
    }
}

impl<T> Feed<T> {
    pub fn status(&self) -> &'static str {
        match self {
            Feed::Loading => "loading",
            Feed::Online(_) => "online",
            Feed::Offline(_) => "offline",
            Feed::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum ImageScan {
    #[default]
    Idle,
    Scanning { image: String },
    Finished { image: String, results: ScanResults },
    Failed { image: String, reason: String },
}

#[derive(Clone, Debug, Default)]
pub struct SecurityPanel {
    pub sonar: Feed<SonarSnapshot>,
    pub trivy: Feed<TrivySnapshot>,
    pub scan: ImageScan,
    pub history: Listing<ScanRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub total_stacks: usize,
    pub active_stacks: usize,
    pub total_services: usize,
    /// Deploys and creations in this session, Monday first.
    pub activity: [u32; 7],
}

impl Metrics {
    pub fn recompute(&mut self, available: &[StackSummary], running: &[RunningStack]) {
        self.total_stacks = available.len();
        self.active_stacks = running.len();
        self.total_services = available.iter().map(|s| s.services.len()).sum();
    }

    /// Doughnut data: `[active, idle]`.
    pub fn stacks_chart(&self) -> [usize; 2] {
        [self.active_stacks, self.total_stacks.saturating_sub(self.active_stacks)]
    }

    pub fn record_deploy(&mut self, day: Weekday) {
        self.activity[day.num_days_from_monday() as usize] += 1;
    }

    pub fn record_deploy_now(&mut self) {
        self.record_deploy(chrono::Local::now().weekday());
    }
}

/// Parts of the page that can be re-rendered independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Layout,
    Actions,
    Available,
    Running,
    Metrics,
    Console,
    Modal,
    Editor,
    CreateForm,
    Security,
}

impl Region {
    pub const ALL: [Region; 10] = [
        Region::Layout,
        Region::Actions,
        Region::Available,
        Region::Running,
        Region::Metrics,
        Region::Console,
        Region::Modal,
        Region::Editor,
        Region::CreateForm,
        Region::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Layout => "layout",
            Region::Actions => "actions",
            Region::Available => "available",
            Region::Running => "running",
            Region::Metrics => "metrics",
            Region::Console => "console",
            Region::Modal => "modal",
            Region::Editor => "editor",
            Region::CreateForm => "create-form",
            Region::Security => "security",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown region: {}", s))
    }
}

/// Everything the dashboard shows, owned in one place.
#[derive(Debug)]
pub struct DashboardState {
    pub screen: Screen,
    pub sidebar_collapsed: bool,
    pub console_open: bool,
    pub console: ConsoleLog,
    pub modal: Option<ConfirmModal>,
    pub editor: Option<YamlEditor>,
    pub create_form: Option<StackForm>,
    pub buttons_enabled: bool,
    pub available: Listing<StackSummary>,
    pub running: Listing<RunningStack>,
    pub metrics: Metrics,
    pub security: SecurityPanel,
    pub requests: RequestSequencer,
}

impl Default for DashboardState {
    fn default() -> Self {
        let mut console = ConsoleLog::default();
        console.info("Aguardando comandos...");
        Self {
            screen: Screen::default(),
            sidebar_collapsed: false,
            console_open: false,
            console,
            modal: None,
            editor: None,
            create_form: None,
            buttons_enabled: true,
            available: Listing::Loading,
            running: Listing::Loading,
            metrics: Metrics::default(),
            security: SecurityPanel::default(),
            requests: RequestSequencer::default(),
        }
    }
}

impl DashboardState {
    pub fn refresh_metrics(&mut self) {
        if let (Some(available), Some(running)) = (self.available.items(), self.running.items()) {
            self.metrics.recompute(available, running);
        }
    }
}
