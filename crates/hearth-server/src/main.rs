use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hearth_api::middleware::require_auth;
use hearth_api::{AppState, AppStateInner, approvals, auth, messages, rules, settings};
use hearth_core::{Auth, Config, Household};
use hearth_db::{DocumentStore, LocalStore, SqliteStore};
use hearth_gateway::connection;

const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";

#[derive(Clone)]
struct ServerState {
    household: Household,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HEARTH_JWT_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.into());
    let host = std::env::var("HEARTH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HEARTH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let config = Config::from_env();

    if jwt_secret == PLACEHOLDER_SECRET {
        warn!("HEARTH_JWT_SECRET is not set, using the development secret");
    }
    if config.uses_default_password() {
        warn!("HEARTH_ADMIN_PASSWORD is not set, using the default admin password");
    }

    // Init storage
    let store = open_store()?;
    let household = Household::with_admin(store, config.admin_username.clone());
    info!("Using {:?} storage", household.mode());

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        auth: Auth::new(household.clone(), config),
        household: household.clone(),
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        household,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/agree", post(auth::agree))
        .route("/auth/me", get(auth::me))
        .route("/rules", get(rules::list_rules).post(rules::create_rule))
        .route("/rules/defaults", post(rules::seed_defaults))
        .route("/rules/{rule_id}", patch(rules::update_rule).delete(rules::delete_rule))
        .route("/messages", get(messages::get_messages).post(messages::send_message))
        .route("/messages/{message_id}/read", post(messages::mark_read))
        .route("/approvals", get(approvals::list_approvals))
        .route("/settings", get(settings::get_settings))
        .route("/settings/max-users", put(settings::set_max_users))
        .route("/settings/users", post(settings::add_user))
        .route("/settings/users/{username}", delete(settings::remove_user))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Hearth server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `HEARTH_STORE` picks `sqlite` (the default) or `local`, which keeps every
/// collection as JSON files on this machine.
fn open_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let kind = std::env::var("HEARTH_STORE").unwrap_or_else(|_| "sqlite".into());
    match kind.as_str() {
        "local" => {
            let dir = std::env::var("HEARTH_LOCAL_DIR").unwrap_or_else(|_| "hearth-data".into());
            Ok(Arc::new(LocalStore::open(&PathBuf::from(dir))?))
        }
        "sqlite" => {
            let db_path = std::env::var("HEARTH_DB_PATH").unwrap_or_else(|_| "hearth.db".into());
            Ok(Arc::new(SqliteStore::open(&PathBuf::from(db_path))?))
        }
        other => anyhow::bail!("unknown HEARTH_STORE '{}', expected 'sqlite' or 'local'", other),
    }
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.household, state.jwt_secret)
    })
}
