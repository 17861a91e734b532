//! Dashboard controller: owns the dashboard state, talks to the lab backend
//! and tells connected browsers which regions changed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::adapters::backend::{validate_stack_name, LabBackend};
use crate::adapters::prefs::{Preferences, PrefsStore};
use crate::config::Timings;
use crate::core::console::Level;
use crate::core::domain::CreateStackReply;
use crate::core::form::StackForm;
use crate::core::sequencer::Operation;
use crate::core::state::{
    ConfirmModal, DashboardState, Feed, ImageScan, Listing, PendingAction, Region, Screen, YamlEditor,
};
use crate::core::timers::{TimerName, Timers};
use crate::error::ApiError;

pub const NO_STACKS_ERROR: &str = "⚠️ Erro ao carregar stacks disponíveis";
pub const NO_DOCKER_ERROR: &str = "⚠️ Erro ao conectar com o Docker. O lab está rodando?";

#[derive(Clone)]
pub struct Dashboard {
    backend: Arc<dyn LabBackend>,
    state: Arc<Mutex<DashboardState>>,
    timers: Arc<Timers>,
    prefs: PrefsStore,
    tx: Arc<broadcast::Sender<String>>,
    timings: Timings,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn LabBackend>, prefs: PrefsStore, timings: Timings) -> Self {
        let (tx, _) = broadcast::channel::<String>(100);
        Self {
            backend,
            state: Arc::new(Mutex::new(DashboardState::default())),
            timers: Arc::new(Timers::default()),
            prefs,
            tx: Arc::new(tx),
            timings,
        }
    }

    pub fn state(&self) -> &Arc<Mutex<DashboardState>> {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    fn notify(&self, regions: &[Region]) {
        let names: Vec<&str> = regions.iter().map(|r| r.as_str()).collect();
        let _ = self.tx.send(serde_json::json!({ "type": "view_update", "regions": names }).to_string());
    }

    async fn log(&self, level: Level, message: impl Into<String>) {
        self.state.lock().await.console.push(level, message);
        self.notify(&[Region::Console]);
    }

    // --- Bootstrap & polling ---

    /// Loads preferences and both stack lists, then starts the refresh timer.
    pub async fn bootstrap(&self) {
        let prefs = self.prefs.load();
        self.state.lock().await.sidebar_collapsed = prefs.sidebar_collapsed;
        self.refresh_lists().await;
        self.start_polling();
        info!(event = "DASHBOARD_READY", sidebar.collapsed = prefs.sidebar_collapsed, "Dashboard state initialised");
    }

    pub fn start_polling(&self) {
        let dash = self.clone();
        self.timers.start(TimerName::Refresh, self.timings.refresh_every, move || {
            let dash = dash.clone();
            async move { dash.refresh_lists().await }
        });
    }

    pub fn shutdown(&self) {
        self.timers.stop_all();
        info!(event = "DASHBOARD_SHUTDOWN", "Timers cancelled");
    }

    pub fn is_polling(&self, name: TimerName) -> bool {
        self.timers.is_running(name)
    }

    /// Fetches both lists concurrently and recomputes the chart data.
    pub async fn refresh_lists(&self) {
        tokio::join!(self.load_available_stacks(), self.refresh_status());
        self.state.lock().await.refresh_metrics();
        self.notify(&[Region::Metrics]);
    }

    pub async fn load_available_stacks(&self) {
        let token = self.state.lock().await.requests.issue(Operation::AvailableStacks);
        let result = self.backend.list_stacks().await;

        let mut st = self.state.lock().await;
        if !st.requests.is_latest(Operation::AvailableStacks, token) {
            debug!(event = "STALE_RESPONSE_DROPPED", operation = "available_stacks", "Newer request in flight");
            return;
        }
        match result {
            Ok(stacks) => st.available = Listing::Loaded(stacks),
            Err(e) => {
                warn!(event = "STACKS_FETCH_FAIL", error = %e, "Could not load available stacks");
                st.console.error("Erro ao carregar stacks disponíveis");
                st.available = Listing::Failed(NO_STACKS_ERROR.into());
            }
        }
        drop(st);
        self.notify(&[Region::Available, Region::Console]);
    }

    pub async fn refresh_status(&self) {
        let token = self.state.lock().await.requests.issue(Operation::RunningStacks);
        let result = self.backend.status().await;

        let mut st = self.state.lock().await;
        if !st.requests.is_latest(Operation::RunningStacks, token) {
            debug!(event = "STALE_RESPONSE_DROPPED", operation = "running_stacks", "Newer request in flight");
            return;
        }
        match result {
            Ok(report) => st.running = Listing::Loaded(report.running_stacks),
            Err(e) => {
                warn!(event = "STATUS_FETCH_FAIL", error = %e, "Could not load running stacks");
                st.running = Listing::Failed(NO_DOCKER_ERROR.into());
            }
        }
        drop(st);
        self.notify(&[Region::Running]);
    }

    /// One extra refresh after a fixed delay, for work the backend finishes
    /// after it has already replied.
    fn schedule_refresh(&self, delay: Duration) {
        let dash = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            dash.refresh_lists().await;
        });
    }

    // --- Layout ---

    pub async fn switch_screen(&self, screen: Screen) {
        let previous = {
            let mut st = self.state.lock().await;
            std::mem::replace(&mut st.screen, screen)
        };
        self.notify(&[Region::Layout]);

        if previous == Screen::Security && screen != Screen::Security {
            self.timers.stop(TimerName::Security);
        }
        if screen == Screen::Security {
            self.state.lock().await.security.history = Listing::Loading;
            self.start_security_polling();
            tokio::join!(self.poll_security(), self.load_scan_history());
        }
    }

    pub async fn toggle_sidebar(&self) -> bool {
        let collapsed = {
            let mut st = self.state.lock().await;
            st.sidebar_collapsed = !st.sidebar_collapsed;
            st.sidebar_collapsed
        };
        if let Err(e) = self.prefs.save(&Preferences { sidebar_collapsed: collapsed }) {
            warn!(event = "PREFS_SAVE_FAIL", error = %e, "Sidebar state not persisted");
        }
        self.notify(&[Region::Layout]);
        collapsed
    }

    pub async fn toggle_console(&self) {
        let mut st = self.state.lock().await;
        st.console_open = !st.console_open;
        drop(st);
        self.notify(&[Region::Console]);
    }

    pub async fn clear_console(&self) {
        self.state.lock().await.console.clear();
        self.notify(&[Region::Console]);
    }

    // --- Confirmation modal ---

    pub async fn request(&self, action: PendingAction) {
        self.state.lock().await.modal = Some(ConfirmModal::for_action(action));
        self.notify(&[Region::Modal]);
    }

    pub async fn cancel_modal(&self) {
        self.state.lock().await.modal = None;
        self.notify(&[Region::Modal]);
    }

    /// Closes the modal and runs the action it was holding, if any.
    pub async fn confirm(&self) {
        let modal = self.state.lock().await.modal.take();
        self.notify(&[Region::Modal]);
        let Some(modal) = modal else { return };
        match modal.action {
            PendingAction::Deploy(name) => self.deploy(name).await,
            PendingAction::Remove(name) => self.remove(name).await,
            PendingAction::StartLab => self.start_lab().await,
            PendingAction::DestroyLab => self.destroy_lab().await,
        }
    }

    // --- Actions ---

    /// Shared shape of every mutating action: log the start line, disable
    /// buttons, run the request, report transport failures, re-enable.
    async fn run_action<F, Fut>(&self, level: Level, intro: String, body: F)
    where
        F: FnOnce(Dashboard) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        {
            let mut st = self.state.lock().await;
            st.console.push(level, intro);
            st.buttons_enabled = false;
        }
        self.notify(&Region::ALL);

        if let Err(e) = body(self.clone()).await {
            warn!(event = "ACTION_TRANSPORT_FAIL", error = %e, "Backend unreachable");
            self.state.lock().await.console.error(format!("❌ Erro ao comunicar com o servidor: {}", e));
        }

        self.state.lock().await.buttons_enabled = true;
        self.notify(&Region::ALL);
    }

    async fn accept_name(&self, name: &str) -> bool {
        match validate_stack_name(name) {
            Ok(_) => true,
            Err(e) => {
                self.log(Level::Error, format!("❌ {}", e)).await;
                false
            }
        }
    }

    async fn report_failure(&self, headline: String, detail: Option<&str>) {
        let mut st = self.state.lock().await;
        st.console.error(headline);
        if let Some(detail) = detail {
            st.console.error(detail);
        }
    }

    pub async fn deploy(&self, stack: String) {
        if !self.accept_name(&stack).await {
            return;
        }
        info!(event = "STACK_DEPLOY_REQUESTED", stack = %stack, "Deploy requested");
        let intro = format!("🚀 Iniciando deploy do stack \"{}\"...", stack);
        self.run_action(Level::Info, intro, move |dash| async move {
            let reply = dash.backend.deploy(&stack).await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    st.console.success(format!("✅ Stack \"{}\" deployado com sucesso!", stack));
                    if let Some(out) = reply.output() {
                        st.console.info(out);
                    }
                    st.metrics.record_deploy_now();
                }
                dash.refresh_lists().await;
                dash.schedule_refresh(dash.timings.deploy_settle);
            } else {
                dash.report_failure(format!("❌ Erro ao deployar stack \"{}\"", stack), reply.error()).await;
            }
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, stack: String) {
        if !self.accept_name(&stack).await {
            return;
        }
        info!(event = "STACK_REMOVE_REQUESTED", stack = %stack, "Removal requested");
        let intro = format!("🗑️ Removendo stack \"{}\"...", stack);
        self.run_action(Level::Warning, intro, move |dash| async move {
            let reply = dash.backend.remove(&stack).await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    st.console.success(format!("✅ Stack \"{}\" removido com sucesso!", stack));
                    if let Some(out) = reply.output() {
                        st.console.info(out);
                    }
                }
                dash.refresh_lists().await;
            } else {
                dash.report_failure(format!("❌ Erro ao remover stack \"{}\"", stack), reply.error()).await;
            }
            Ok(())
        })
        .await
    }

    pub async fn start_lab(&self) {
        info!(event = "LAB_START_REQUESTED", "Lab start requested");
        let intro = "🚀 Iniciando lab completo... Por favor, aguarde.".to_string();
        self.run_action(Level::Info, intro, |dash| async move {
            let reply = dash.backend.start_lab().await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    st.console.success("✅ Lab iniciado com sucesso!");
                    if let Some(out) = reply.output() {
                        st.console.info(out);
                    }
                }
                dash.refresh_lists().await;
                dash.schedule_refresh(dash.timings.lab_start_settle);
            } else {
                dash.report_failure("❌ Erro ao iniciar o lab".into(), reply.error()).await;
            }
            Ok(())
        })
        .await
    }

    pub async fn destroy_lab(&self) {
        info!(event = "LAB_DESTROY_REQUESTED", "Lab destroy requested");
        let intro = "💥 Destruindo lab... Por favor, aguarde.".to_string();
        self.run_action(Level::Warning, intro, |dash| async move {
            let reply = dash.backend.destroy_lab().await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    st.console.success("✅ Lab destruído com sucesso!");
                    if let Some(out) = reply.output() {
                        st.console.info(out);
                    }
                }
                dash.refresh_lists().await;
                dash.schedule_refresh(dash.timings.lab_destroy_settle);
            } else {
                dash.report_failure("❌ Erro ao destruir o lab".into(), reply.error()).await;
            }
            Ok(())
        })
        .await
    }

    // --- Stack creation ---

    pub async fn open_create_form(&self) {
        self.state.lock().await.create_form = Some(StackForm::blank());
        self.notify(&[Region::CreateForm]);
    }

    pub async fn close_create_form(&self) {
        self.state.lock().await.create_form = None;
        self.notify(&[Region::CreateForm]);
    }

    /// Keeps what the user already typed and appends an empty row.
    pub async fn add_env_row(&self, mut form: StackForm) {
        form.add_env_row();
        self.state.lock().await.create_form = Some(form);
        self.notify(&[Region::CreateForm]);
    }

    pub async fn remove_env_row(&self, mut form: StackForm, index: usize) {
        form.remove_env_row(index);
        self.state.lock().await.create_form = Some(form);
        self.notify(&[Region::CreateForm]);
    }

    pub async fn create_stack(&self, form: StackForm) {
        let request = form.to_request();
        self.state.lock().await.create_form = Some(form);
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                self.log(Level::Error, format!("❌ Erro ao criar stack: {}", e)).await;
                return;
            }
        };
        if !self.accept_name(&request.name).await {
            return;
        }

        info!(event = "STACK_CREATE_REQUESTED", stack = %request.name, image = %request.image, "Stack creation requested");
        let intro = format!("➕ Criando nova stack \"{}\"...", request.name);
        self.run_action(Level::Info, intro, move |dash| async move {
            let reply = dash.backend.create_stack(&request).await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    for (level, line) in creation_report(&request.name, &reply) {
                        st.console.push(level, line);
                    }
                    st.create_form = None;
                    st.metrics.record_deploy_now();
                }
                dash.refresh_lists().await;
            } else {
                let reason = reply.error.unwrap_or_default();
                dash.state.lock().await.console.error(format!("❌ Erro ao criar stack: {}", reason));
            }
            Ok(())
        })
        .await
    }

    // --- YAML editor ---

    pub async fn open_editor(&self, stack: String) {
        if !self.accept_name(&stack).await {
            return;
        }
        let token = self.state.lock().await.requests.issue(Operation::StackYaml);
        let result = self.backend.stack_yaml(&stack).await;

        let mut st = self.state.lock().await;
        if !st.requests.is_latest(Operation::StackYaml, token) {
            debug!(event = "STALE_RESPONSE_DROPPED", operation = "stack_yaml", stack = %stack, "Another editor was opened");
            return;
        }
        match result {
            Ok(reply) if reply.success => {
                st.editor = Some(YamlEditor { stack, yaml: reply.yaml.unwrap_or_default() });
            }
            Ok(reply) => st.console.error(format!("❌ Erro ao carregar YAML: {}", reply.error.unwrap_or_default())),
            Err(e) => st.console.error(format!("❌ Erro ao carregar YAML: {}", e)),
        }
        drop(st);
        self.notify(&[Region::Editor, Region::Console]);
    }

    pub async fn close_editor(&self) {
        self.state.lock().await.editor = None;
        self.notify(&[Region::Editor]);
    }

    /// Sends the edited text back for the stack currently in the editor.
    pub async fn save_editor(&self, yaml: String) {
        let target = {
            let mut st = self.state.lock().await;
            st.editor.as_mut().map(|editor| {
                // textarea submissions use CRLF line breaks
                let yaml = if editor.yaml.contains('\r') { yaml } else { yaml.replace("\r\n", "\n") };
                editor.yaml = yaml.clone();
                (editor.stack.clone(), yaml)
            })
        };
        let Some((stack, yaml)) = target else {
            self.log(Level::Error, "❌ Erro: Nenhuma stack selecionada").await;
            return;
        };

        info!(event = "STACK_UPDATE_REQUESTED", stack = %stack, bytes = yaml.len(), "YAML update requested");
        let intro = format!("💾 Salvando e reaplicando stack \"{}\"...", stack);
        self.run_action(Level::Info, intro, move |dash| async move {
            let reply = dash.backend.update_stack(&stack, &yaml).await?;
            if reply.success {
                {
                    let mut st = dash.state.lock().await;
                    st.console.success(format!("✅ Stack \"{}\" atualizada e redeployada com sucesso!", stack));
                    if let Some(out) = reply.output() {
                        st.console.info(out);
                    }
                    if st.editor.as_ref().map(|e| e.stack == stack).unwrap_or(false) {
                        st.editor = None;
                    }
                }
                dash.refresh_lists().await;
            } else {
                let reason = reply.error.unwrap_or_default();
                dash.state.lock().await.console.error(format!("❌ Erro ao atualizar stack: {}", reason));
            }
            Ok(())
        })
        .await
    }

    // --- Security panel ---

    pub fn start_security_polling(&self) {
        let dash = self.clone();
        self.timers.start(TimerName::Security, self.timings.security_every, move || {
            let dash = dash.clone();
            async move { dash.poll_security().await }
        });
    }

    pub async fn poll_security(&self) {
        tokio::join!(self.load_sonar(), self.load_trivy());
    }

    pub async fn load_sonar(&self) {
        let token = self.state.lock().await.requests.issue(Operation::Sonar);
        let feed = match self.backend.sonarqube().await {
            Ok(reply) if reply.success => Feed::Online(reply.metrics),
            Ok(reply) => Feed::Offline(reply.error.unwrap_or_else(|| "SonarQube indisponível".into())),
            Err(e) => {
                warn!(event = "SONAR_FETCH_FAIL", error = %e, "SonarQube feed unreachable");
                Feed::Error(e.to_string())
            }
        };
        let mut st = self.state.lock().await;
        if st.requests.is_latest(Operation::Sonar, token) {
            st.security.sonar = feed;
            drop(st);
            self.notify(&[Region::Security]);
        }
    }

    pub async fn load_trivy(&self) {
        let token = self.state.lock().await.requests.issue(Operation::Trivy);
        let feed = match self.backend.trivy().await {
            Ok(reply) if reply.success => Feed::Online(reply.metrics),
            Ok(reply) => Feed::Offline(reply.error.unwrap_or_else(|| "Trivy indisponível".into())),
            Err(e) => {
                warn!(event = "TRIVY_FETCH_FAIL", error = %e, "Trivy feed unreachable");
                Feed::Error(e.to_string())
            }
        };
        let mut st = self.state.lock().await;
        if st.requests.is_latest(Operation::Trivy, token) {
            st.security.trivy = feed;
            drop(st);
            self.notify(&[Region::Security]);
        }
    }

    pub async fn load_scan_history(&self) {
        let token = self.state.lock().await.requests.issue(Operation::History);
        let listing = match self.backend.scan_history().await {
            Ok(reply) if reply.success => Listing::Loaded(reply.scans),
            Ok(reply) => Listing::Failed(reply.error.unwrap_or_else(|| "Histórico indisponível".into())),
            Err(e) => Listing::Failed(e.to_string()),
        };
        let mut st = self.state.lock().await;
        if st.requests.is_latest(Operation::History, token) {
            st.security.history = listing;
            drop(st);
            self.notify(&[Region::Security]);
        }
    }

    pub async fn scan_image(&self, image: String) {
        let image = image.trim().to_string();
        if image.is_empty() {
            self.log(Level::Warning, "⚠️ Informe o nome da imagem para escanear").await;
            return;
        }

        let token = {
            let mut st = self.state.lock().await;
            st.security.scan = ImageScan::Scanning { image: image.clone() };
            st.console.info(format!("🔍 Escaneando imagem {}...", image));
            st.requests.issue(Operation::ScanImage)
        };
        self.notify(&[Region::Security, Region::Console]);
        info!(event = "IMAGE_SCAN_REQUESTED", image = %image, "Trivy image scan requested");

        let result = self.backend.scan_image(&image).await;

        let mut st = self.state.lock().await;
        if !st.requests.is_latest(Operation::ScanImage, token) {
            debug!(event = "STALE_RESPONSE_DROPPED", operation = "scan_image", image = %image, "Newer scan requested");
            return;
        }
        st.security.scan = match result {
            Ok(reply) if reply.success => {
                let results = reply.results.unwrap_or_default();
                st.console.success(format!("✅ Scan de {} concluído", image));
                ImageScan::Finished { image, results }
            }
            Ok(reply) => {
                let reason = reply.error.unwrap_or_else(|| "Falha no scan".into());
                st.console.error(format!("❌ Erro no scan de {}: {}", image, reason));
                ImageScan::Failed { image, reason }
            }
            Err(e) => {
                st.console.error(format!("❌ Erro ao comunicar com o servidor: {}", e));
                ImageScan::Failed { image, reason: e.to_string() }
            }
        };
        drop(st);
        self.notify(&[Region::Security, Region::Console]);
    }

    /// Backend-side Trivy scan of its default target, then a feed re-poll.
    pub async fn start_trivy_scan(&self) {
        let intro = "🔍 Iniciando scan Trivy...".to_string();
        self.run_action(Level::Info, intro, |dash| async move {
            let reply = dash.backend.trivy_scan().await?;
            if reply.success {
                dash.state.lock().await.console.success("✅ Scan Trivy concluído");
                dash.load_trivy().await;
            } else {
                dash.report_failure("❌ Erro ao iniciar scan Trivy".into(), reply.error()).await;
            }
            Ok(())
        })
        .await
    }
}

/// Console lines for a successful stack creation.
pub fn creation_report(name: &str, reply: &CreateStackReply) -> Vec<(Level, String)> {
    let mut lines = vec![(Level::Success, format!("✅ Stack \"{}\" criada e deployed com sucesso!", name))];
    if let Some(file) = &reply.file {
        lines.push((Level::Info, format!("📄 Arquivo criado: {}", file)));
    }
    if let Some(info) = &reply.info {
        let unknown = || "?".to_string();
        lines.push((Level::Info, format!("🔍 Porta do container: {}", info.container_port.clone().unwrap_or_else(unknown))));
        lines.push((Level::Info, format!("🌐 Porta pública: {}", info.public_port.clone().unwrap_or_else(unknown))));
        if let Some(url) = &info.url {
            lines.push((Level::Success, format!("🔗 Acesse em: {}", url)));
        }
    }
    if let Some(out) = reply.deploy_output.as_deref().filter(|s| !s.trim().is_empty()) {
        lines.push((Level::Info, format!("📦 Deploy: {}", out)));
    }
    if let Some(jenkins) = &reply.jenkins {
        if jenkins.success {
            lines.push((Level::Success, format!("🔄 Pipeline Jenkins criada: {}", jenkins.job_name.as_deref().unwrap_or(""))));
            lines.push((Level::Info, format!("🔗 Acesse a pipeline em: {}", jenkins.job_url.as_deref().unwrap_or(""))));
        } else {
            lines.push((Level::Warning, format!("⚠️ Aviso Jenkins: {}", jenkins.error.as_deref().unwrap_or(""))));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::*;
    use crate::core::de::ServiceCount;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// In-memory backend. `None` replies simulate an unreachable server.
    #[derive(Default)]
    struct FakeBackend {
        stacks: StdMutex<Option<Vec<StackSummary>>>,
        running: StdMutex<Option<Vec<RunningStack>>>,
        action: StdMutex<Option<ActionReply>>,
        create: StdMutex<Option<CreateStackReply>>,
        yaml: StdMutex<HashMap<String, String>>,
        sonar: StdMutex<Option<SonarReply>>,
        trivy: StdMutex<Option<TrivyReply>>,
        scan: StdMutex<Option<ScanImageReply>>,
        history: StdMutex<Option<HistoryReply>>,
        sent_create: StdMutex<Vec<CreateStackRequest>>,
        sent_update: StdMutex<Vec<(String, String)>>,
        sent_deploy: StdMutex<Vec<String>>,
        status_calls: AtomicUsize,
        stacks_calls: AtomicUsize,
    }

    fn unreachable() -> ApiError {
        ApiError::Decode { endpoint: "/api".into(), reason: "connection refused".into() }
    }

    fn take<T: Clone>(slot: &StdMutex<Option<T>>) -> Result<T, ApiError> {
        slot.lock().unwrap().clone().ok_or_else(unreachable)
    }

    #[async_trait]
    impl LabBackend for FakeBackend {
        async fn list_stacks(&self) -> Result<Vec<StackSummary>, ApiError> {
            self.stacks_calls.fetch_add(1, Ordering::SeqCst);
            take(&self.stacks)
        }
        async fn status(&self) -> Result<StatusReport, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            take(&self.running).map(|running_stacks| StatusReport { running_stacks, ..Default::default() })
        }
        async fn create_stack(&self, request: &CreateStackRequest) -> Result<CreateStackReply, ApiError> {
            self.sent_create.lock().unwrap().push(request.clone());
            take(&self.create)
        }
        async fn deploy(&self, stack: &str) -> Result<ActionReply, ApiError> {
            self.sent_deploy.lock().unwrap().push(stack.to_string());
            take(&self.action)
        }
        async fn remove(&self, _stack: &str) -> Result<ActionReply, ApiError> {
            take(&self.action)
        }
        async fn stack_yaml(&self, stack: &str) -> Result<YamlReply, ApiError> {
            Ok(match self.yaml.lock().unwrap().get(stack) {
                Some(yaml) => YamlReply { success: true, yaml: Some(yaml.clone()), error: None },
                None => YamlReply { success: false, yaml: None, error: Some("Arquivo não encontrado".into()) },
            })
        }
        async fn update_stack(&self, stack: &str, yaml: &str) -> Result<ActionReply, ApiError> {
            self.sent_update.lock().unwrap().push((stack.to_string(), yaml.to_string()));
            take(&self.action)
        }
        async fn start_lab(&self) -> Result<ActionReply, ApiError> {
            take(&self.action)
        }
        async fn destroy_lab(&self) -> Result<ActionReply, ApiError> {
            take(&self.action)
        }
        async fn sonarqube(&self) -> Result<SonarReply, ApiError> {
            take(&self.sonar)
        }
        async fn trivy(&self) -> Result<TrivyReply, ApiError> {
            take(&self.trivy)
        }
        async fn trivy_scan(&self) -> Result<ActionReply, ApiError> {
            take(&self.action)
        }
        async fn scan_image(&self, _image: &str) -> Result<ScanImageReply, ApiError> {
            take(&self.scan)
        }
        async fn scan_history(&self) -> Result<HistoryReply, ApiError> {
            take(&self.history)
        }
    }

    fn dashboard(backend: Arc<FakeBackend>) -> (Dashboard, tempfile::TempDir) {
        dashboard_with(backend, Timings { deploy_settle: Duration::from_secs(3600), ..Timings::default() })
    }

    fn dashboard_with(backend: Arc<FakeBackend>, timings: Timings) -> (Dashboard, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PrefsStore::new(dir.path().join("prefs.json"));
        (Dashboard::new(backend, prefs, timings), dir)
    }

    fn calls(backend: &FakeBackend) -> (usize, usize) {
        (backend.stacks_calls.load(Ordering::SeqCst), backend.status_calls.load(Ordering::SeqCst))
    }

    /// Confirms `action` with default timings and checks the list fetches
    /// around `settle`, or that no delayed fetch happens when `settle` is None.
    async fn assert_settle_refresh(action: PendingAction, settle: Option<Duration>) {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![]);
        *backend.running.lock().unwrap() = Some(vec![]);
        *backend.action.lock().unwrap() = Some(ok(""));
        let (dash, _dir) = dashboard_with(backend.clone(), Timings::default());

        dash.request(action).await;
        dash.confirm().await;
        assert_eq!(calls(&backend), (1, 1), "immediate refresh");

        if let Some(settle) = settle {
            tokio::time::sleep(settle - Duration::from_millis(100)).await;
            assert_eq!(calls(&backend), (1, 1), "refreshed before the settle delay");
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(calls(&backend), (2, 2), "no refresh after the settle delay");
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        let expected = if settle.is_some() { (2, 2) } else { (1, 1) };
        assert_eq!(calls(&backend), expected, "delayed refresh must happen at most once");
    }

    fn ok(output: &str) -> ActionReply {
        ActionReply { success: true, output: Some(output.into()), error: None }
    }

    async fn console_tail(dash: &Dashboard, skip: usize) -> Vec<(Level, String)> {
        let st = dash.state().lock().await;
        st.console.lines().skip(skip).map(|l| (l.level, l.message.clone())).collect()
    }

    #[tokio::test]
    async fn bootstrap_loads_lists_and_starts_refresh_timer() {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![StackSummary {
            name: "wiki".into(),
            services: vec!["app".into(), "db".into()],
            ..Default::default()
        }]);
        *backend.running.lock().unwrap() = Some(vec![]);
        let (dash, _dir) = dashboard(backend.clone());

        dash.bootstrap().await;

        let st = dash.state().lock().await;
        assert_eq!(st.available.items().map(|s| s.len()), Some(1));
        assert_eq!(st.running.items().map(|s| s.len()), Some(0));
        assert_eq!(st.metrics.total_services, 2);
        drop(st);
        assert!(dash.is_polling(TimerName::Refresh));
        dash.shutdown();
        assert!(!dash.is_polling(TimerName::Refresh));
    }

    #[tokio::test]
    async fn failed_status_renders_inline_error() {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![]);
        let (dash, _dir) = dashboard(backend);

        dash.refresh_lists().await;

        let st = dash.state().lock().await;
        assert_eq!(st.running, Listing::Failed(NO_DOCKER_ERROR.into()));
        assert_eq!(st.available, Listing::Loaded(vec![]));
    }

    #[tokio::test]
    async fn confirmed_deploy_logs_and_refetches() {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![]);
        *backend.running.lock().unwrap() = Some(vec![RunningStack {
            name: "wiki".into(),
            services: ServiceCount::Count(1),
            ..Default::default()
        }]);
        *backend.action.lock().unwrap() = Some(ok("done"));
        let (dash, _dir) = dashboard(backend.clone());
        let before = dash.state().lock().await.console.len();

        dash.request(PendingAction::Deploy("wiki".into())).await;
        assert!(dash.state().lock().await.modal.is_some());
        dash.confirm().await;

        assert_eq!(
            console_tail(&dash, before).await,
            vec![
                (Level::Info, "🚀 Iniciando deploy do stack \"wiki\"...".to_string()),
                (Level::Success, "✅ Stack \"wiki\" deployado com sucesso!".to_string()),
                (Level::Info, "done".to_string()),
            ]
        );
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 1);
        let st = dash.state().lock().await;
        assert!(st.modal.is_none());
        assert!(st.buttons_enabled);
        assert_eq!(st.running.items().map(|r| r.len()), Some(1));
        assert_eq!(st.metrics.activity.iter().sum::<u32>(), 1);
    }

    #[tokio::test]
    async fn cancelled_modal_has_no_side_effects() {
        let backend = Arc::new(FakeBackend::default());
        *backend.action.lock().unwrap() = Some(ok("done"));
        let (dash, _dir) = dashboard(backend.clone());

        dash.request(PendingAction::Remove("wiki".into())).await;
        dash.cancel_modal().await;
        dash.confirm().await;

        assert!(backend.sent_deploy.lock().unwrap().is_empty());
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
        assert_eq!(dash.state().lock().await.console.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_refreshes_again_after_two_seconds() {
        assert_settle_refresh(PendingAction::Deploy("wiki".into()), Some(Duration::from_secs(2))).await;
    }

    #[tokio::test(start_paused = true)]
    async fn lab_start_refreshes_again_after_three_seconds() {
        assert_settle_refresh(PendingAction::StartLab, Some(Duration::from_secs(3))).await;
    }

    #[tokio::test(start_paused = true)]
    async fn lab_destroy_refreshes_again_after_two_seconds() {
        assert_settle_refresh(PendingAction::DestroyLab, Some(Duration::from_secs(2))).await;
    }

    #[tokio::test(start_paused = true)]
    async fn remove_has_no_delayed_refresh() {
        assert_settle_refresh(PendingAction::Remove("wiki".into()), None).await;
    }

    #[tokio::test]
    async fn transport_failure_logs_one_error_and_reenables_buttons() {
        for action in ["deploy", "remove", "create", "update", "start_lab", "destroy_lab", "trivy_scan"] {
            let backend = Arc::new(FakeBackend::default());
            backend.yaml.lock().unwrap().insert("wiki".into(), "a: 1\n".into());
            let (dash, _dir) = dashboard(backend.clone());
            let mut rx = dash.subscribe();

            match action {
                "deploy" => dash.deploy("wiki".into()).await,
                "remove" => dash.remove("wiki".into()).await,
                "create" => {
                    let form = StackForm::from_pairs(&[("stackName", "wiki"), ("dockerImage", "nginx")]);
                    dash.create_stack(form).await
                }
                "update" => {
                    dash.open_editor("wiki".into()).await;
                    dash.save_editor("a: 2\n".into()).await
                }
                "start_lab" => dash.start_lab().await,
                "destroy_lab" => dash.destroy_lab().await,
                "trivy_scan" => dash.start_trivy_scan().await,
                other => unreachable!("{}", other),
            }

            let st = dash.state().lock().await;
            assert_eq!(st.console.count(Level::Error), 1, "{}", action);
            let last = st.console.lines().last().map(|l| l.message.clone()).unwrap_or_default();
            assert!(last.starts_with("❌ Erro ao comunicar com o servidor: "), "{}: {}", action, last);
            assert!(st.buttons_enabled, "{}", action);
            drop(st);
            assert_eq!(calls(&backend), (0, 0), "{}", action);

            let mut final_update = String::new();
            while let Ok(msg) = rx.try_recv() {
                final_update = msg;
            }
            let regions: serde_json::Value = serde_json::from_str(&final_update).unwrap();
            assert!(regions["regions"].as_array().unwrap().contains(&json!("actions")), "{}", action);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_timers_still_holding_the_dashboard() {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![]);
        *backend.running.lock().unwrap() = Some(vec![]);
        let (dash, _dir) = dashboard(backend.clone());

        dash.bootstrap().await;
        dash.switch_screen(Screen::Security).await;
        assert!(dash.is_polling(TimerName::Refresh));
        assert!(dash.is_polling(TimerName::Security));

        dash.shutdown();
        let before = calls(&backend);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls(&backend), before);
        assert!(!dash.is_polling(TimerName::Security));
    }

    #[tokio::test]
    async fn application_error_reports_server_message_without_refetch() {
        let backend = Arc::new(FakeBackend::default());
        *backend.action.lock().unwrap() =
            Some(ActionReply { success: false, output: None, error: Some("Stack not found".into()) });
        let (dash, _dir) = dashboard(backend.clone());
        let before = dash.state().lock().await.console.len();

        dash.remove("ghost".into()).await;

        let tail = console_tail(&dash, before).await;
        assert_eq!(tail[0].0, Level::Warning);
        assert_eq!(tail[1], (Level::Error, "❌ Erro ao remover stack \"ghost\"".to_string()));
        assert_eq!(tail[2], (Level::Error, "Stack not found".to_string()));
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_stack_name_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        *backend.action.lock().unwrap() = Some(ok("done"));
        let (dash, _dir) = dashboard(backend.clone());

        dash.deploy("../../etc".into()).await;

        assert!(backend.sent_deploy.lock().unwrap().is_empty());
        assert_eq!(dash.state().lock().await.console.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn unchanged_yaml_round_trips_exactly() {
        let backend = Arc::new(FakeBackend::default());
        let original = "version: '3.8'\nservices:\n  app:\n    image: nginx\n";
        backend.yaml.lock().unwrap().insert("wiki".into(), original.into());
        *backend.action.lock().unwrap() = Some(ok(""));
        *backend.stacks.lock().unwrap() = Some(vec![]);
        *backend.running.lock().unwrap() = Some(vec![]);
        let (dash, _dir) = dashboard(backend.clone());

        dash.open_editor("wiki".into()).await;
        let loaded = dash.state().lock().await.editor.clone().unwrap();
        assert_eq!(loaded.stack, "wiki");

        // the browser posts the textarea back with CRLF line breaks
        dash.save_editor(loaded.yaml.replace('\n', "\r\n")).await;

        assert_eq!(backend.sent_update.lock().unwrap().as_slice(), &[("wiki".to_string(), original.to_string())]);
        assert!(dash.state().lock().await.editor.is_none());
    }

    #[tokio::test]
    async fn second_editor_replaces_first() {
        let backend = Arc::new(FakeBackend::default());
        backend.yaml.lock().unwrap().insert("a".into(), "a: 1\n".into());
        backend.yaml.lock().unwrap().insert("b".into(), "b: 2\n".into());
        let (dash, _dir) = dashboard(backend);

        dash.open_editor("a".into()).await;
        dash.open_editor("b".into()).await;

        let editor = dash.state().lock().await.editor.clone().unwrap();
        assert_eq!(editor, YamlEditor { stack: "b".into(), yaml: "b: 2\n".into() });
    }

    #[tokio::test]
    async fn saving_without_editor_is_an_error() {
        let backend = Arc::new(FakeBackend::default());
        let (dash, _dir) = dashboard(backend.clone());

        dash.save_editor("x: 1".into()).await;

        assert!(backend.sent_update.lock().unwrap().is_empty());
        let tail = console_tail(&dash, 1).await;
        assert_eq!(tail, vec![(Level::Error, "❌ Erro: Nenhuma stack selecionada".to_string())]);
    }

    #[tokio::test]
    async fn create_reports_ports_and_pipeline() {
        let backend = Arc::new(FakeBackend::default());
        *backend.stacks.lock().unwrap() = Some(vec![]);
        *backend.running.lock().unwrap() = Some(vec![]);
        *backend.create.lock().unwrap() = Some(
            serde_json::from_value(json!({
                "success": true,
                "file": "./stacks/api-stack.yaml",
                "info": {"containerPort": 80, "publicPort": 8085, "url": "http://localhost:8085"},
                "jenkins": {"success": false, "error": "Jenkins offline"}
            }))
            .unwrap(),
        );
        let (dash, _dir) = dashboard(backend.clone());
        dash.open_create_form().await;

        let form = StackForm::from_pairs(&[("stackName", "api"), ("dockerImage", "api:1"), ("replicas", "2")]);
        dash.create_stack(form).await;

        let sent = backend.sent_create.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].replicas, Some(2));
        let st = dash.state().lock().await;
        assert!(st.create_form.is_none());
        let messages: Vec<String> = st.console.lines().map(|l| l.message.clone()).collect();
        assert!(messages.contains(&"🔍 Porta do container: 80".to_string()));
        assert!(messages.contains(&"🌐 Porta pública: 8085".to_string()));
        assert_eq!(st.console.count(Level::Warning), 1);
    }

    #[tokio::test]
    async fn invalid_form_keeps_draft_and_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let (dash, _dir) = dashboard(backend.clone());

        let form = StackForm::from_pairs(&[("stackName", "api"), ("dockerImage", "api"), ("publicPort", "80a")]);
        dash.create_stack(form.clone()).await;

        assert!(backend.sent_create.lock().unwrap().is_empty());
        let st = dash.state().lock().await;
        assert_eq!(st.create_form.as_ref(), Some(&form));
        assert_eq!(st.console.count(Level::Error), 1);
        assert!(st.buttons_enabled);
    }

    #[tokio::test]
    async fn security_screen_owns_its_timer() {
        let backend = Arc::new(FakeBackend::default());
        *backend.sonar.lock().unwrap() = Some(SonarReply { success: false, error: Some("down".into()), ..Default::default() });
        *backend.history.lock().unwrap() = Some(HistoryReply { success: true, ..Default::default() });
        let (dash, _dir) = dashboard(backend);

        dash.switch_screen(Screen::Security).await;
        assert!(dash.is_polling(TimerName::Security));
        {
            let st = dash.state().lock().await;
            assert_eq!(st.security.sonar, Feed::Offline("down".into()));
            assert_eq!(st.security.trivy.status(), "error");
            assert_eq!(st.security.history, Listing::Loaded(vec![]));
        }

        dash.switch_screen(Screen::Stacks).await;
        assert!(!dash.is_polling(TimerName::Security));
    }

    #[tokio::test]
    async fn image_scan_moves_to_finished() {
        let backend = Arc::new(FakeBackend::default());
        *backend.scan.lock().unwrap() = Some(ScanImageReply {
            success: true,
            results: Some(ScanResults { high: 2, ..Default::default() }),
            error: None,
        });
        let (dash, _dir) = dashboard(backend);

        dash.scan_image("  nginx:1.25 ".into()).await;

        let st = dash.state().lock().await;
        match &st.security.scan {
            ImageScan::Finished { image, results } => {
                assert_eq!(image, "nginx:1.25");
                assert_eq!(results.high, 2);
            }
            other => panic!("unexpected scan state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_image_is_not_scanned() {
        let backend = Arc::new(FakeBackend::default());
        let (dash, _dir) = dashboard(backend);

        dash.scan_image("   ".into()).await;

        let st = dash.state().lock().await;
        assert_eq!(st.security.scan, ImageScan::Idle);
        assert_eq!(st.console.count(Level::Warning), 1);
    }

    #[tokio::test]
    async fn sidebar_toggle_is_persisted() {
        let backend = Arc::new(FakeBackend::default());
        let (dash, dir) = dashboard(backend);

        assert!(dash.toggle_sidebar().await);
        let stored = PrefsStore::new(dir.path().join("prefs.json")).load();
        assert!(stored.sidebar_collapsed);
        assert!(!dash.toggle_sidebar().await);
    }

    #[tokio::test]
    async fn changes_are_broadcast_to_subscribers() {
        let backend = Arc::new(FakeBackend::default());
        let (dash, _dir) = dashboard(backend);
        let mut rx = dash.subscribe();

        dash.toggle_console().await;

        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg, json!({"type": "view_update", "regions": ["console"]}));
    }

    #[test]
    fn creation_report_without_extras_is_one_line() {
        let reply = CreateStackReply { success: true, ..Default::default() };
        let lines = creation_report("web", &reply);
        assert_eq!(lines, vec![(Level::Success, "✅ Stack \"web\" criada e deployed com sucesso!".to_string())]);
    }
}
