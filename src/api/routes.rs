use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::controller::Dashboard;
use crate::core::form::StackForm;
use crate::core::state::{PendingAction, Region, Screen};
use crate::views;
use crate::AppState;

#[derive(Deserialize)]
pub struct StackParams {
    pub stack: String,
}

#[derive(Deserialize)]
pub struct YamlParams {
    pub yaml: String,
}

#[derive(Deserialize)]
pub struct ImageParams {
    #[serde(default)]
    pub image: String,
}

type FormPairs = Form<Vec<(String, String)>>;

pub fn create_router(state: Arc<AppState>, ui_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/fragments/:region", get(fragment_handler))
        .route("/ws", get(ws_handler))
        .route("/ui/screen/:name", post(screen_handler))
        .route("/ui/sidebar", post(sidebar_handler))
        .route("/ui/console/toggle", post(console_toggle_handler))
        .route("/ui/console/clear", post(console_clear_handler))
        .route("/ui/stacks/deploy", post(deploy_handler))
        .route("/ui/stacks/remove", post(remove_handler))
        .route("/ui/stacks/edit", post(edit_handler))
        .route("/ui/lab/start", post(lab_start_handler))
        .route("/ui/lab/destroy", post(lab_destroy_handler))
        .route("/ui/modal/confirm", post(confirm_handler))
        .route("/ui/modal/cancel", post(cancel_handler))
        .route("/ui/create/open", post(create_open_handler))
        .route("/ui/create/close", post(create_close_handler))
        .route("/ui/create", post(create_handler))
        .route("/ui/create/env/add", post(env_add_handler))
        .route("/ui/create/env/remove/:index", post(env_remove_handler))
        .route("/ui/editor/save", post(editor_save_handler))
        .route("/ui/editor/close", post(editor_close_handler))
        .route("/ui/security/scan-image", post(scan_image_handler))
        .route("/ui/security/scan", post(trivy_scan_handler))
        .nest_service("/static", ServeDir::new(ui_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn back_to_page() -> Redirect {
    Redirect::to("/")
}

fn render_failure(e: askama::Error) -> Response {
    error!(event = "RENDER_FAIL", error = %e, "Template rendering failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "render error").into_response()
}

/// Actions that wait on the backend run detached; browsers follow their
/// progress through `/ws`.
fn spawn_action<F, Fut>(state: &AppState, action: F)
where
    F: FnOnce(Dashboard) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(action(state.dashboard.clone()));
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let st = state.dashboard.state().lock().await;
    match views::render_page(&st) {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failure(e),
    }
}

async fn fragment_handler(State(state): State<Arc<AppState>>, Path(region): Path<String>) -> Response {
    let Ok(region) = region.parse::<Region>() else {
        return (StatusCode::NOT_FOUND, "unknown region").into_response();
    };
    let st = state.dashboard.state().lock().await;
    match views::render_region(&st, region) {
        Ok(html) => Html(html).into_response(),
        Err(e) => render_failure(e),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.dashboard.subscribe();
    debug!(event = "WS_CONNECTED", "Browser subscribed to view updates");

    let mut forward = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }
    debug!(event = "WS_DISCONNECTED", "Browser left");
}

async fn screen_handler(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match name.parse::<Screen>() {
        Ok(screen) => {
            state.dashboard.switch_screen(screen).await;
            back_to_page().into_response()
        }
        Err(e) => (StatusCode::NOT_FOUND, e).into_response(),
    }
}

async fn sidebar_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.toggle_sidebar().await;
    back_to_page()
}

async fn console_toggle_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.toggle_console().await;
    back_to_page()
}

async fn console_clear_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.clear_console().await;
    back_to_page()
}

async fn deploy_handler(State(state): State<Arc<AppState>>, Form(p): Form<StackParams>) -> Redirect {
    state.dashboard.request(PendingAction::Deploy(p.stack)).await;
    back_to_page()
}

async fn remove_handler(State(state): State<Arc<AppState>>, Form(p): Form<StackParams>) -> Redirect {
    state.dashboard.request(PendingAction::Remove(p.stack)).await;
    back_to_page()
}

async fn edit_handler(State(state): State<Arc<AppState>>, Form(p): Form<StackParams>) -> Redirect {
    state.dashboard.open_editor(p.stack).await;
    back_to_page()
}

async fn lab_start_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.request(PendingAction::StartLab).await;
    back_to_page()
}

async fn lab_destroy_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.request(PendingAction::DestroyLab).await;
    back_to_page()
}

async fn confirm_handler(State(state): State<Arc<AppState>>) -> Redirect {
    spawn_action(&state, |dash| async move { dash.confirm().await });
    back_to_page()
}

async fn cancel_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.cancel_modal().await;
    back_to_page()
}

async fn create_open_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.open_create_form().await;
    back_to_page()
}

async fn create_close_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.close_create_form().await;
    back_to_page()
}

async fn create_handler(State(state): State<Arc<AppState>>, Form(pairs): FormPairs) -> Redirect {
    let form = StackForm::from_pairs(&pairs);
    spawn_action(&state, |dash| async move { dash.create_stack(form).await });
    back_to_page()
}

async fn env_add_handler(State(state): State<Arc<AppState>>, Form(pairs): FormPairs) -> Redirect {
    state.dashboard.add_env_row(StackForm::from_pairs(&pairs)).await;
    back_to_page()
}

async fn env_remove_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Form(pairs): FormPairs,
) -> Redirect {
    state.dashboard.remove_env_row(StackForm::from_pairs(&pairs), index).await;
    back_to_page()
}

async fn editor_save_handler(State(state): State<Arc<AppState>>, Form(p): Form<YamlParams>) -> Redirect {
    spawn_action(&state, |dash| async move { dash.save_editor(p.yaml).await });
    back_to_page()
}

async fn editor_close_handler(State(state): State<Arc<AppState>>) -> Redirect {
    state.dashboard.close_editor().await;
    back_to_page()
}

async fn scan_image_handler(State(state): State<Arc<AppState>>, Form(p): Form<ImageParams>) -> Redirect {
    spawn_action(&state, |dash| async move { dash.scan_image(p.image).await });
    back_to_page()
}

async fn trivy_scan_handler(State(state): State<Arc<AppState>>) -> Redirect {
    spawn_action(&state, |dash| async move { dash.start_trivy_scan().await });
    back_to_page()
}
