use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod dto;
mod error;
mod handlers;
mod models;
mod services;
mod store;

use config::Config;
use services::catalog::ResourceCatalog;
use services::classifier::{EmotionClassifier, InferenceApiLoader, ModelLoader};
use services::conversations::ConversationService;
use services::crisis::CrisisDetector;
use services::generator::{ClaudeGenerator, ResponseGenerator, RetryPolicy};
use services::moods::MoodService;
use services::pipeline::TriagePipeline;
use services::triage::TriagePolicy;
use store::Stores;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub moods: Arc<MoodService>,
    pub conversations: Arc<ConversationService>,
    pub policy: Arc<TriagePolicy>,
    pub pipeline: Arc<TriagePipeline>,
    pub classifier: Arc<EmotionClassifier>,
    pub catalog: Arc<ResourceCatalog>,
}

/// Wires the triage services over the chosen stores and collaborators.
/// Fails if a bundled artifact or lookup table is malformed.
pub fn build_state(
    config: Config,
    stores: Stores,
    loader: Arc<dyn ModelLoader>,
    generator: Arc<dyn ResponseGenerator>,
) -> anyhow::Result<AppState> {
    let detector = Arc::new(CrisisDetector::bundled()?);
    let catalog = Arc::new(ResourceCatalog::bundled()?);
    let classifier = Arc::new(EmotionClassifier::new(loader));

    tracing::info!(
        keywords_version = %detector.keywords().version,
        resources_version = %catalog.version,
        "Triage artifacts loaded"
    );

    let policy = Arc::new(TriagePolicy::new(
        detector,
        classifier.clone(),
        catalog.clone(),
    )?);
    let pipeline = Arc::new(TriagePipeline::new(
        policy.clone(),
        stores.moods.clone(),
        stores.events.clone(),
        generator,
        RetryPolicy::from_config(&config),
    ));
    let moods = Arc::new(MoodService::new(stores.moods.clone())?);
    let conversations = Arc::new(ConversationService::new(
        stores.conversations.clone(),
        pipeline.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        stores,
        moods,
        conversations,
        policy,
        pipeline,
        classifier,
        catalog,
    })
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/resources", get(handlers::resources::list_resources));

    let protected_routes = Router::new()
        // Messages
        .route("/api/messages", post(handlers::messages::send_message))
        .route("/api/triage", post(handlers::messages::triage_message))
        .route("/api/classify", post(handlers::messages::classify_texts))
        // Chat sessions
        .route(
            "/api/chats",
            get(handlers::conversations::list_conversations)
                .post(handlers::conversations::create_conversation),
        )
        .route(
            "/api/chats/:id",
            get(handlers::conversations::get_conversation)
                .delete(handlers::conversations::delete_conversation),
        )
        .route(
            "/api/chats/:id/messages",
            post(handlers::conversations::send_message),
        )
        // Mood history
        .route(
            "/api/moods",
            get(handlers::moods::list_moods).post(handlers::moods::create_mood),
        )
        .route("/api/moods/summary", get(handlers::moods::mood_summary))
        .route(
            "/api/moods/:id",
            get(handlers::moods::get_mood)
                .put(handlers::moods::update_mood)
                .delete(handlers::moods::delete_mood),
        )
        // Emotion events
        .route("/api/emotions", get(handlers::emotions::recent_emotions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let allowed_origins: Vec<axum::http::HeaderValue> =
        std::iter::once(&state.config.frontend_url)
            .chain(state.config.cors_extra_origins.iter())
            .filter_map(|o| match o.parse::<axum::http::HeaderValue>() {
                Ok(hv) => Some(hv),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodwell_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Config::from_env()?;
    let stores = store::connect(&config).await?;

    let loader = Arc::new(InferenceApiLoader::from_config(&config));
    let generator = Arc::new(ClaudeGenerator::from_config(&config)?);
    if config.claude_api_key.is_empty() {
        tracing::warn!("CLAUDE_API_KEY is not set; replies will use the fallback message");
    }

    let addr = config.listen_addr();
    let state = build_state(config, stores, loader, generator)?;

    // Load the emotion model in the background so the first message doesn't
    // pay for it. Concurrent callers wait on the same initialisation.
    let classifier = state.classifier.clone();
    tokio::spawn(async move {
        let mood = classifier.classify("hello").await;
        tracing::info!(%mood, "Emotion model warm-up finished");
    });

    let app = build_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
