//! HTML fragments for every dashboard region.
//!
//! Templates live in `templates/` and are compiled by askama with HTML
//! escaping on; the view models below only hold plain, already-derived values
//! so the templates stay free of logic.

use askama::Template;

use crate::core::console::ConsoleLog;
use crate::core::domain::{RunningStack, ScanRecord, ScanResults, StackSummary, Vulnerability, Severity};
use crate::core::form::StackForm;
use crate::core::state::{
    ConfirmModal, DashboardState, Feed, ImageScan, Listing, Metrics, Region, Screen, SecurityPanel, YamlEditor,
};

pub const NO_AVAILABLE_STACKS: &str = "Nenhum stack disponível";
pub const NO_RUNNING_STACKS: &str = "Nenhum stack ativo no momento";
pub const MAX_SCAN_ENTRIES: usize = 10;

const WEEKDAYS: [&str; 7] = ["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Only plain web links are rendered as anchors.
fn web_links(urls: &[String]) -> Vec<String> {
    urls.iter()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .cloned()
        .collect()
}

// --- Stack lists ---

pub struct StackCard {
    pub name: String,
    pub title: String,
    pub service_count: usize,
    pub services: Vec<String>,
    pub ports: Vec<u16>,
    pub urls: Vec<String>,
}

#[derive(Template)]
#[template(path = "available_stacks.html")]
pub struct AvailableStacksView {
    pub cards: Vec<StackCard>,
    pub placeholder: String,
    pub disabled: bool,
}

pub fn render_available_stacks(stacks: &[StackSummary], buttons_enabled: bool) -> askama::Result<String> {
    AvailableStacksView {
        cards: stacks
            .iter()
            .map(|s| StackCard {
                name: s.name.clone(),
                title: capitalize_first(&s.name),
                service_count: s.services.len(),
                services: s.services.clone(),
                ports: s.ports.clone(),
                urls: web_links(&s.urls),
            })
            .collect(),
        placeholder: NO_AVAILABLE_STACKS.into(),
        disabled: !buttons_enabled,
    }
    .render()
}

fn render_available(listing: &Listing<StackSummary>, buttons_enabled: bool) -> askama::Result<String> {
    match listing {
        Listing::Loaded(stacks) => render_available_stacks(stacks, buttons_enabled),
        Listing::Loading => placeholder_list::<AvailableStacksView>("Carregando stacks..."),
        Listing::Failed(reason) => placeholder_list::<AvailableStacksView>(reason),
    }
}

pub struct RunningRow {
    pub name: String,
    pub title: String,
    pub services: String,
    pub ports: Vec<u16>,
    pub urls: Vec<String>,
}

#[derive(Template)]
#[template(path = "running_stacks.html")]
pub struct RunningStacksView {
    pub rows: Vec<RunningRow>,
    pub placeholder: String,
    pub disabled: bool,
}

pub fn render_running_stacks(stacks: &[RunningStack], buttons_enabled: bool) -> askama::Result<String> {
    RunningStacksView {
        rows: stacks
            .iter()
            .map(|s| RunningRow {
                name: s.name.clone(),
                title: capitalize_first(&s.name),
                services: s.services.to_string(),
                ports: s.ports.clone(),
                urls: web_links(&s.urls),
            })
            .collect(),
        placeholder: NO_RUNNING_STACKS.into(),
        disabled: !buttons_enabled,
    }
    .render()
}

fn render_running(listing: &Listing<RunningStack>, buttons_enabled: bool) -> askama::Result<String> {
    match listing {
        Listing::Loaded(stacks) => render_running_stacks(stacks, buttons_enabled),
        Listing::Loading => placeholder_list::<RunningStacksView>("Carregando status..."),
        Listing::Failed(reason) => placeholder_list::<RunningStacksView>(reason),
    }
}

trait PlaceholderList: Template {
    fn with_placeholder(text: String) -> Self;
}

impl PlaceholderList for AvailableStacksView {
    fn with_placeholder(placeholder: String) -> Self {
        Self { cards: Vec::new(), placeholder, disabled: false }
    }
}

impl PlaceholderList for RunningStacksView {
    fn with_placeholder(placeholder: String) -> Self {
        Self { rows: Vec::new(), placeholder, disabled: false }
    }
}

fn placeholder_list<T: PlaceholderList>(text: &str) -> askama::Result<String> {
    T::with_placeholder(text.to_string()).render()
}

// --- Metrics ---

pub struct DayBar {
    pub day: &'static str,
    pub count: u32,
    pub height: u32,
}

#[derive(Template)]
#[template(path = "metrics.html")]
pub struct MetricsView {
    pub total_stacks: usize,
    pub active_stacks: usize,
    pub total_services: usize,
    pub chart_active: usize,
    pub chart_idle: usize,
    pub active_percent: usize,
    pub days: Vec<DayBar>,
}

pub fn render_metrics(metrics: &Metrics) -> askama::Result<String> {
    let [active, idle] = metrics.stacks_chart();
    let busiest = metrics.activity.iter().copied().max().unwrap_or(0).max(1);
    MetricsView {
        total_stacks: metrics.total_stacks,
        active_stacks: metrics.active_stacks,
        total_services: metrics.total_services,
        chart_active: active,
        chart_idle: idle,
        active_percent: if active + idle == 0 { 0 } else { active * 100 / (active + idle) },
        days: WEEKDAYS
            .iter()
            .zip(metrics.activity.iter())
            .map(|(&day, &count)| DayBar { day, count, height: count * 100 / busiest })
            .collect(),
    }
    .render()
}

// --- Console, modal, editor ---

pub struct ConsoleRow {
    pub class: &'static str,
    pub text: String,
}

#[derive(Template)]
#[template(path = "console.html")]
pub struct ConsoleView {
    pub open: bool,
    pub rows: Vec<ConsoleRow>,
}

pub fn render_console(console: &ConsoleLog, open: bool) -> askama::Result<String> {
    ConsoleView {
        open,
        rows: console
            .lines()
            .map(|l| ConsoleRow { class: l.level.as_str(), text: l.stamped() })
            .collect(),
    }
    .render()
}

#[derive(Template)]
#[template(path = "modal.html")]
pub struct ModalView {
    pub open: bool,
    pub title: String,
    pub message: String,
}

pub fn render_modal(modal: Option<&ConfirmModal>) -> askama::Result<String> {
    ModalView {
        open: modal.is_some(),
        title: modal.map(|m| m.title.clone()).unwrap_or_default(),
        message: modal.map(|m| m.message.clone()).unwrap_or_default(),
    }
    .render()
}

#[derive(Template)]
#[template(path = "editor.html")]
pub struct EditorView {
    pub open: bool,
    pub stack: String,
    pub yaml: String,
    pub disabled: bool,
}

pub fn render_editor(editor: Option<&YamlEditor>, buttons_enabled: bool) -> askama::Result<String> {
    EditorView {
        open: editor.is_some(),
        stack: editor.map(|e| e.stack.clone()).unwrap_or_default(),
        yaml: editor.map(|e| e.yaml.clone()).unwrap_or_default(),
        disabled: !buttons_enabled,
    }
    .render()
}

pub struct EnvRowView {
    pub index: usize,
    pub key: String,
    pub value: String,
}

#[derive(Template)]
#[template(path = "create_form.html")]
pub struct CreateFormView {
    pub open: bool,
    pub form: StackForm,
    pub rows: Vec<EnvRowView>,
    pub disabled: bool,
}

pub fn render_create_form(form: Option<&StackForm>, buttons_enabled: bool) -> askama::Result<String> {
    let form = form.cloned();
    let open = form.is_some();
    let form = form.unwrap_or_else(StackForm::blank);
    let rows = form
        .env_rows
        .iter()
        .enumerate()
        .map(|(index, r)| EnvRowView { index, key: r.key.clone(), value: r.value.clone() })
        .collect();
    CreateFormView { open, form, rows, disabled: !buttons_enabled }.render()
}

// --- Security ---

#[derive(Default)]
pub struct SonarPanel {
    pub status: &'static str,
    pub online: bool,
    pub message: String,
    pub bugs: u64,
    pub vulnerabilities: u64,
    pub code_smells: u64,
    pub coverage: String,
    pub quality_gate: String,
    pub projects: Vec<String>,
}

#[derive(Default)]
pub struct TrivyPanel {
    pub status: &'static str,
    pub online: bool,
    pub message: String,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub last_scan: String,
}

pub struct VulnEntry {
    pub id: String,
    pub severity: String,
    pub class: &'static str,
    pub title: String,
    pub description: String,
    pub fixed_version: String,
}

impl VulnEntry {
    fn from_finding(v: &Vulnerability) -> Self {
        let severity = v.severity.clone().unwrap_or_default();
        Self {
            id: v.id.clone().unwrap_or_default(),
            class: Severity::parse(&severity).css_class(),
            severity,
            title: v.title.clone().unwrap_or_default(),
            description: v.description.clone().unwrap_or_default(),
            fixed_version: v.fixed_version.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "scan_result.html")]
pub struct ScanResultView {
    pub image: String,
    pub label: &'static str,
    pub class: &'static str,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub entries: Vec<VulnEntry>,
    pub overflow: usize,
}

/// Result panel for one image scan: counts, worst-severity label and at most
/// ten findings.
pub fn render_scan_result(image: &str, results: &ScanResults) -> askama::Result<String> {
    let worst = results.counts().worst();
    ScanResultView {
        image: image.to_string(),
        label: worst.label(),
        class: worst.css_class(),
        critical: results.critical,
        high: results.high,
        medium: results.medium,
        low: results.low,
        entries: results.vulnerabilities.iter().take(MAX_SCAN_ENTRIES).map(VulnEntry::from_finding).collect(),
        overflow: results.vulnerabilities.len().saturating_sub(MAX_SCAN_ENTRIES),
    }
    .render()
}

pub struct HistoryEntry {
    pub kind: String,
    pub timestamp: String,
    pub summary: String,
}

impl HistoryEntry {
    fn from_record(r: &ScanRecord) -> Self {
        Self { kind: r.kind.clone(), timestamp: r.timestamp.clone().unwrap_or_default(), summary: r.summary_text() }
    }
}

#[derive(Template)]
#[template(path = "security.html")]
pub struct SecurityView {
    pub sonar: SonarPanel,
    pub trivy: TrivyPanel,
    pub scan_state: &'static str,
    pub scan_image: String,
    pub scan_message: String,
    pub scan_result: String,
    pub history: Vec<HistoryEntry>,
    pub history_message: String,
    pub disabled: bool,
}

fn feed_message<T>(feed: &Feed<T>) -> String {
    match feed {
        Feed::Loading => "Carregando...".into(),
        Feed::Online(_) => String::new(),
        Feed::Offline(reason) => format!("Offline: {}", reason),
        Feed::Error(reason) => format!("Erro: {}", reason),
    }
}

fn sonar_panel(feed: &Feed<crate::core::domain::SonarSnapshot>) -> SonarPanel {
    let mut panel = SonarPanel { status: feed.status(), message: feed_message(feed), ..Default::default() };
    if let Feed::Online(s) = feed {
        panel.online = true;
        panel.bugs = s.bugs;
        panel.vulnerabilities = s.vulnerabilities;
        panel.code_smells = s.code_smells;
        panel.coverage = format!("{:.1}%", s.coverage);
        panel.quality_gate = s.quality_gate.clone().unwrap_or_else(|| "N/A".into());
        panel.projects = s.projects.clone();
    }
    panel
}

fn trivy_panel(feed: &Feed<crate::core::domain::TrivySnapshot>) -> TrivyPanel {
    let mut panel = TrivyPanel { status: feed.status(), message: feed_message(feed), ..Default::default() };
    if let Feed::Online(t) = feed {
        panel.online = true;
        panel.critical = t.critical;
        panel.high = t.high;
        panel.medium = t.medium;
        panel.low = t.low;
        panel.last_scan = t.last_scan.clone().unwrap_or_else(|| "Nunca".into());
    }
    panel
}

pub fn render_security(panel: &SecurityPanel, buttons_enabled: bool) -> askama::Result<String> {
    let (scan_state, scan_image, scan_message, scan_result) = match &panel.scan {
        ImageScan::Idle => ("idle", String::new(), String::new(), String::new()),
        ImageScan::Scanning { image } => ("scanning", image.clone(), format!("🔍 Escaneando {}...", image), String::new()),
        ImageScan::Finished { image, results } => ("finished", image.clone(), String::new(), render_scan_result(image, results)?),
        ImageScan::Failed { image, reason } => ("failed", image.clone(), format!("❌ {}", reason), String::new()),
    };
    let (history, history_message) = match &panel.history {
        Listing::Loading => (Vec::new(), "Carregando histórico...".to_string()),
        Listing::Failed(reason) => (Vec::new(), format!("Erro: {}", reason)),
        Listing::Loaded(scans) if scans.is_empty() => (Vec::new(), "Nenhum scan registrado".to_string()),
        Listing::Loaded(scans) => (scans.iter().map(HistoryEntry::from_record).collect(), String::new()),
    };
    SecurityView {
        sonar: sonar_panel(&panel.sonar),
        trivy: trivy_panel(&panel.trivy),
        scan_state,
        scan_image,
        scan_message,
        scan_result,
        history,
        history_message,
        disabled: !buttons_enabled,
    }
    .render()
}

// --- Whole page ---

#[derive(Template)]
#[template(path = "actions.html")]
pub struct ActionsView {
    pub disabled: bool,
}

pub fn render_actions(buttons_enabled: bool) -> askama::Result<String> {
    ActionsView { disabled: !buttons_enabled }.render()
}

pub struct NavItem {
    pub name: &'static str,
    pub title: &'static str,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageView {
    pub sidebar_collapsed: bool,
    pub screen: &'static str,
    pub nav: Vec<NavItem>,
    pub actions: String,
    pub available: String,
    pub running: String,
    pub metrics: String,
    pub console: String,
    pub modal: String,
    pub editor: String,
    pub create_form: String,
    pub security: String,
}

pub fn render_region(state: &DashboardState, region: Region) -> askama::Result<String> {
    let enabled = state.buttons_enabled;
    match region {
        Region::Layout => render_page(state),
        Region::Actions => render_actions(enabled),
        Region::Available => render_available(&state.available, enabled),
        Region::Running => render_running(&state.running, enabled),
        Region::Metrics => render_metrics(&state.metrics),
        Region::Console => render_console(&state.console, state.console_open),
        Region::Modal => render_modal(state.modal.as_ref()),
        Region::Editor => render_editor(state.editor.as_ref(), enabled),
        Region::CreateForm => render_create_form(state.create_form.as_ref(), enabled),
        Region::Security => render_security(&state.security, enabled),
    }
}

pub fn render_page(state: &DashboardState) -> askama::Result<String> {
    let enabled = state.buttons_enabled;
    PageView {
        sidebar_collapsed: state.sidebar_collapsed,
        screen: state.screen.as_str(),
        nav: Screen::ALL
            .iter()
            .map(|s| NavItem { name: s.as_str(), title: s.title(), active: *s == state.screen })
            .collect(),
        actions: render_actions(enabled)?,
        available: render_available(&state.available, enabled)?,
        running: render_running(&state.running, enabled)?,
        metrics: render_metrics(&state.metrics)?,
        console: render_console(&state.console, state.console_open)?,
        modal: render_modal(state.modal.as_ref())?,
        editor: render_editor(state.editor.as_ref(), enabled)?,
        create_form: render_create_form(state.create_form.as_ref(), enabled)?,
        security: render_security(&state.security, enabled)?,
    }
    .render()
}
