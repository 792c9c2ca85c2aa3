//! StataForge Server
//!
//! Axum API over a single wizard session, plus a headless CLI that walks the
//! whole wizard from the command line.

mod api;

use axum::{
    body::Body,
    extract::State,
    http::{header, Response},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use stataforge_core::models::{LlmProvider, ModelConfig};
use stataforge_core::state::io;
use stataforge_core::wizard::{LlmCollaborator, WizardConfig, WizardCoordinator, WizardEvent};
use stataforge_core::{Category, RoleConfiguration};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use api::wizard;

/// Application state
pub struct AppState {
    wizard: WizardCoordinator,
    event_tx: broadcast::Sender<WizardEvent>,
}

pub type SharedState = Arc<AppState>;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse {
    success: bool,
    message: String,
}

#[derive(Parser, Clone)]
#[command(author, version, about = "StataForge - Stata do-file wizard for empirical studies")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the StataForge server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Walk the wizard headlessly and export the resulting do-file
    Run {
        /// Research topic
        #[arg(long)]
        topic: String,
        /// Research field
        #[arg(long, default_value = "")]
        field: String,
        /// Analysis category: basic, benchmark, robust, endo, hetero
        #[arg(long, default_value = "benchmark")]
        category: String,
        /// Method name or catalog index; repeat for several sections
        #[arg(long = "method", required = true)]
        methods: Vec<String>,
    },
    /// Print the method catalog
    Catalog {
        /// Only this category
        #[arg(long)]
        category: Option<String>,
    },
}

// === Config API Types ===

/// Persisted configuration (`.stataforge/config.json`), merged over defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commentary_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    control_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_effect_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mechanism_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hetero_count: Option<u8>,
}

impl PersistedConfig {
    const FILE: &'static str = "config.json";

    async fn load() -> Self {
        match io::read_file(Self::FILE).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring malformed config.json");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    async fn save(&self) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        io::write_runtime_file(Self::FILE, &content).await?;
        Ok(())
    }

    fn merge(&mut self, other: PersistedConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.commentary_language.is_some() {
            self.commentary_language = other.commentary_language;
        }
        if other.control_count.is_some() {
            self.control_count = other.control_count;
        }
        if other.fixed_effect_count.is_some() {
            self.fixed_effect_count = other.fixed_effect_count;
        }
        if other.mechanism_count.is_some() {
            self.mechanism_count = other.mechanism_count;
        }
        if other.hetero_count.is_some() {
            self.hetero_count = other.hetero_count;
        }
    }

    /// Resolve into the coordinator config, falling back to defaults
    fn to_wizard_config(&self) -> WizardConfig {
        let defaults = WizardConfig::default();

        let provider = match self.provider.as_deref() {
            Some(id) => LlmProvider::from_id(id).unwrap_or_else(|| {
                warn!(provider = id, "Unknown provider in config, using default");
                LlmProvider::default()
            }),
            None => LlmProvider::default(),
        };
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let mut model_config = ModelConfig::with_provider(provider, model);
        if let Some(url) = &self.base_url {
            model_config = model_config.with_base_url(url.clone());
        }

        let base = defaults.default_roles;
        let default_roles = RoleConfiguration::new(
            self.control_count.unwrap_or(base.control_count),
            self.fixed_effect_count.unwrap_or(base.fixed_effect_count),
            self.mechanism_count.unwrap_or(base.mechanism_count),
            self.hetero_count.unwrap_or(base.hetero_count),
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "Invalid role counts in config, using defaults");
            base
        });

        WizardConfig {
            model: model_config,
            commentary_language: self
                .commentary_language
                .clone()
                .unwrap_or(defaults.commentary_language),
            default_roles,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigResponse {
    config: PersistedConfig,
    defaults: ConfigDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigDefaults {
    provider: &'static str,
    commentary_language: &'static str,
    control_count: u8,
    fixed_effect_count: u8,
    mechanism_count: u8,
    hetero_count: u8,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        let roles = RoleConfiguration::default();
        Self {
            provider: LlmProvider::default().id(),
            commentary_language: "English",
            control_count: roles.control_count,
            fixed_effect_count: roles.fixed_effect_count,
            mechanism_count: roles.mechanism_count,
            hetero_count: roles.hetero_count,
        }
    }
}

// === Provider API Types ===

#[derive(Debug, Serialize, ToSchema)]
struct ProviderInfo {
    id: String,
    name: String,
    default_model: String,
    supports_base_url: bool,
    env_var: String,
    /// Whether the API key is present in the environment
    configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
}

fn get_provider_info() -> Vec<ProviderInfo> {
    LlmProvider::all()
        .into_iter()
        .map(|provider| ProviderInfo {
            id: provider.id().to_string(),
            name: provider.display_name().to_string(),
            default_model: provider.default_model().to_string(),
            supports_base_url: provider.supports_base_url(),
            env_var: provider.env_var().to_string(),
            configured: ModelConfig::with_provider(provider, provider.default_model())
                .has_credentials(),
        })
        .collect()
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StataForge API",
        version = "1.0.0",
        description = "API for the StataForge econometric do-file wizard"
    ),
    paths(
        wizard::get_state,
        wizard::set_topic,
        wizard::set_roles,
        wizard::suggest,
        wizard::return_to_topic,
        wizard::confirm,
        wizard::edit_variable,
        wizard::taxonomy,
        wizard::catalog,
        wizard::select_category,
        wizard::generate,
        wizard::abandon,
        wizard::list_notices,
        wizard::dismiss_notice,
        wizard::export,
        get_config,
        update_config,
        get_providers
    ),
    components(
        schemas(
            ApiResponse,
            ConfigResponse,
            ConfigDefaults,
            PersistedConfig,
            ProvidersResponse,
            ProviderInfo,
            wizard::RoleConfigBody,
            wizard::VariableItem,
            wizard::SectionItem,
            wizard::CategoryHistory,
            wizard::NoticeItem,
            wizard::WizardStateResponse,
            wizard::RoleBucketItem,
            wizard::TaxonomyResponse,
            wizard::MethodItem,
            wizard::CategoryItem,
            wizard::CatalogResponse,
            wizard::TopicRequest,
            wizard::SuggestRequest,
            wizard::VariableEditRequest,
            wizard::CategoryRequest,
            wizard::GenerateRequest,
            wizard::GenerateResponse,
            wizard::AbandonResponse,
            wizard::NoticeListResponse,
            wizard::ExportResponse
        )
    ),
    tags(
        (name = "wizard", description = "Topic intake, variable review, and code generation"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
struct ApiDoc;

// === Handlers ===

/// SSE endpoint for wizard events with heartbeat
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    // Heartbeat every 15 seconds while idle
    let stream = stream::unfold(rx, |mut rx| async move {
        let timeout = tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;

        match timeout {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().event("wizard").data(json)), rx))
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => Some((
                Ok(Event::default().comment(format!("lagged {}", skipped))),
                rx,
            )),
            Ok(Err(broadcast::error::RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse)
    )
)]
async fn get_config() -> Json<ConfigResponse> {
    let config = PersistedConfig::load().await;
    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Update configuration (partial merge); applies to the next session
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse)
    )
)]
async fn update_config(Json(updates): Json<PersistedConfig>) -> Json<ConfigResponse> {
    let mut config = PersistedConfig::load().await;
    config.merge(updates);

    if let Err(e) = config.save().await {
        warn!(error = %e, "Failed to save config");
    }

    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Get available LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: get_provider_info(),
    })
}

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    let mut response = Response::new(Body::from(spec));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

// === Entry points ===

fn build_coordinator(config: WizardConfig) -> WizardCoordinator {
    let collaborator = Arc::new(LlmCollaborator::new(config.model.clone()));
    WizardCoordinator::new(config, collaborator)
}

async fn run_server(port: u16, config: WizardConfig) -> anyhow::Result<()> {
    let (event_tx, _) = broadcast::channel::<WizardEvent>(100);

    info!(
        provider = config.model.provider.id(),
        model = %config.model.model,
        "Starting wizard session"
    );
    if !config.model.has_credentials() {
        warn!(
            env_var = config.model.provider.env_var(),
            "No API key found; suggestion and generation requests will fail"
        );
    }

    let state: SharedState = Arc::new(AppState {
        wizard: build_coordinator(config).with_event_channel(event_tx.clone()),
        event_tx,
    });

    let app = Router::new()
        .nest("/api/v1/wizard", wizard::routes())
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, "StataForge server listening");
    info!("Wizard:    /api/v1/wizard/state, /suggest, /confirm, /generate, /events");
    info!("Config:    /api/v1/config (GET, PATCH)");
    info!("Providers: /api/v1/providers (GET)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Resolve a `--method` value as a catalog index or a method name
fn resolve_method(category: Category, value: &str) -> anyhow::Result<usize> {
    if let Ok(index) = value.parse::<usize>() {
        if category.method(index).is_some() {
            return Ok(index);
        }
    }
    category
        .methods()
        .iter()
        .position(|m| m.name.eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| anyhow::anyhow!("no method '{}' in category {}", value, category))
}

async fn run_headless(
    config: WizardConfig,
    topic: String,
    field: String,
    category: String,
    methods: Vec<String>,
) -> anyhow::Result<()> {
    let category = Category::from_str(&category)
        .ok_or_else(|| anyhow::anyhow!("unknown category '{}'", category))?;
    let indices = methods
        .iter()
        .map(|m| resolve_method(category, m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let roles = config.default_roles;
    let wizard = build_coordinator(config);

    println!("Requesting variables for: {}", topic);
    wizard.request_suggestions(&topic, &field, roles).await?;
    for bucket in wizard.group_by_role() {
        if !bucket.is_empty() {
            println!("  {:<26} {}", bucket.role.display_name(), bucket.names().join(" "));
        }
    }

    wizard.confirm_taxonomy()?;
    wizard.select_category(category)?;

    for index in indices {
        let (_, section) = wizard.generate(index).await?;
        println!("Generated: {}", section.title);
    }

    let content = wizard.render_do_file(category);
    let path = io::export_do_file(category, &content).await?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_catalog(category: Option<String>) -> anyhow::Result<()> {
    let categories = match category {
        Some(id) => vec![Category::from_str(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown category '{}'", id))?],
        None => Category::all().to_vec(),
    };
    for category in categories {
        println!("{} ({})", category.title(), category.as_str());
        for (i, method) in category.methods().iter().enumerate() {
            println!("  {:>2}. {:<36} {}", i, method.name, method.hint);
        }
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // API keys live in .stataforge/.env
    let env_path = io::get_runtime_path().join(".env");
    if dotenvy::from_path(&env_path).is_ok() {
        info!(path = %env_path.display(), "Loaded environment");
    }

    let args = Args::parse();
    let config = PersistedConfig::load().await.to_wizard_config();

    match args.command {
        Some(CliCommand::Run {
            topic,
            field,
            category,
            methods,
        }) => run_headless(config, topic, field, category, methods).await,
        Some(CliCommand::Catalog { category }) => print_catalog(category),
        Some(CliCommand::Serve { port }) => run_server(port, config).await,
        None => run_server(8080, config).await,
    }
}
