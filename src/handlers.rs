use crate::config::ExplorerOverrides;
use crate::explorer::{Explorer, Intent};
use crate::models::{AppState, DirectoryQuery, EntryResult, IntentResult, SessionResult};
use crate::tree::NodePath;
use actix_web::{delete, get, post, web, HttpResponse};
use log::{debug, info, warn};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::MutexGuard;

fn root_path(state: &AppState) -> NodePath {
    NodePath::from_segments(&[state.snapshot.name()])
}

fn lock_sessions(state: &AppState) -> MutexGuard<'_, BTreeMap<u64, Explorer>> {
    // Intents run to completion under the lock, so a poisoned map is still consistent.
    state
        .sessions
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn session_not_found(id: u64) -> HttpResponse {
    warn!("Unknown session {}", id);
    HttpResponse::NotFound().json(json!({ "success": false, "error": "Session not found" }))
}

#[get("/api/connect")]
pub async fn connect() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": "Connection successful" }))
}

#[get("/api/tree")]
pub async fn get_directory_contents(
    state: web::Data<AppState>,
    query: web::Query<DirectoryQuery>,
) -> HttpResponse {
    let path = query
        .path
        .as_deref()
        .map(NodePath::parse)
        .unwrap_or_else(|| root_path(&state));
    debug!("Received request for directory contents: {}", path);

    match state.snapshot.lookup(&path) {
        Some(node) if node.is_dir() => {
            let entries: Vec<EntryResult> = node
                .sorted_children()
                .into_iter()
                .map(|child| EntryResult {
                    name: child.name().to_string(),
                    path: path.join(child.name()).to_string(),
                    node_type: if child.is_dir() { "directory" } else { "file" },
                })
                .collect();
            HttpResponse::Ok().json(json!({
                "success": true,
                "path": path,
                "entries": entries,
            }))
        }
        Some(_) => HttpResponse::Ok().json(json!({ "success": false, "error": "Not a directory" })),
        None => HttpResponse::Ok().json(json!({ "success": false, "error": "Path not found" })),
    }
}

#[get("/api/file")]
pub async fn get_file_content(
    state: web::Data<AppState>,
    query: web::Query<DirectoryQuery>,
) -> HttpResponse {
    let path = match &query.path {
        Some(p) => NodePath::parse(p),
        None => {
            warn!("Received file content request with no path.");
            return HttpResponse::BadRequest()
                .json(json!({"success": false, "error": "Path is required"}));
        }
    };
    debug!("Resolving file: {}", path);
    match state.snapshot.resolve(&path) {
        Some(file) => HttpResponse::Ok().json(json!({
            "success": true,
            "content": file.content,
            "language": file.language,
            "binary": file.binary,
        })),
        None => HttpResponse::Ok().json(json!({"success": false, "error": "File not found"})),
    }
}

/// The body is optional. Fields it carries replace the server defaults; a body
/// that does not parse is a 400.
#[post("/api/sessions")]
pub async fn create_session(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        ExplorerOverrides::default()
    } else {
        match serde_json::from_slice::<ExplorerOverrides>(&body) {
            Ok(overrides) => overrides,
            Err(e) => {
                warn!("Rejected session options: {}", e);
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": format!("Invalid session options: {}", e),
                }));
            }
        }
    };
    let config = overrides.apply_to(&state.defaults);
    let explorer = Explorer::new(state.snapshot.clone(), &config);
    let view = explorer.view();

    let id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let mut sessions = lock_sessions(&state);
    sessions.insert(id, explorer);
    while sessions.len() > state.max_sessions {
        if let Some((evicted, _)) = sessions.pop_first() {
            info!("Evicted session {} (limit {})", evicted, state.max_sessions);
        }
    }
    info!("Created session {} ({} live)", id, sessions.len());

    HttpResponse::Ok().json(SessionResult {
        success: true,
        session_id: id,
        view,
    })
}

#[get("/api/sessions/{id}")]
pub async fn get_session(state: web::Data<AppState>, id: web::Path<u64>) -> HttpResponse {
    let id = id.into_inner();
    let sessions = lock_sessions(&state);
    match sessions.get(&id) {
        Some(explorer) => HttpResponse::Ok().json(SessionResult {
            success: true,
            session_id: id,
            view: explorer.view(),
        }),
        None => session_not_found(id),
    }
}

#[post("/api/sessions/{id}/intents")]
pub async fn apply_intent(
    state: web::Data<AppState>,
    id: web::Path<u64>,
    intent: web::Json<Intent>,
) -> HttpResponse {
    let id = id.into_inner();
    let mut sessions = lock_sessions(&state);
    match sessions.get_mut(&id) {
        Some(explorer) => {
            let events = explorer.apply(intent.into_inner());
            HttpResponse::Ok().json(IntentResult {
                success: true,
                events,
                view: explorer.view(),
            })
        }
        None => session_not_found(id),
    }
}

#[delete("/api/sessions/{id}")]
pub async fn delete_session(state: web::Data<AppState>, id: web::Path<u64>) -> HttpResponse {
    let id = id.into_inner();
    match lock_sessions(&state).remove(&id) {
        Some(_) => {
            info!("Closed session {}", id);
            HttpResponse::Ok().json(json!({ "success": true }))
        }
        None => session_not_found(id),
    }
}

/// Registers every route; shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(connect)
        .service(get_directory_contents)
        .service(get_file_content)
        .service(create_session)
        .service(get_session)
        .service(apply_intent)
        .service(delete_session);
}
