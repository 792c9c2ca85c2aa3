//! # Wizard API
//!
//! Endpoints for driving the wizard session: topic intake, variable review,
//! and the code-generation workbench.

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stataforge_core::state::io;
use stataforge_core::state::RoleBucket;
use stataforge_core::wizard::Notice;
use stataforge_core::{
    Category, CodeSection, RequestKind, RoleConfiguration, VariableDefinition, WorkflowState,
};

use super::ApiError;
use crate::{ApiResponse, SharedState};

// === API Types ===

/// Role counts as sent over the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RoleConfigBody {
    pub control_count: u8,
    pub fixed_effect_count: u8,
    pub mechanism_count: u8,
    pub hetero_count: u8,
}

impl From<RoleConfiguration> for RoleConfigBody {
    fn from(config: RoleConfiguration) -> Self {
        Self {
            control_count: config.control_count,
            fixed_effect_count: config.fixed_effect_count,
            mechanism_count: config.mechanism_count,
            hetero_count: config.hetero_count,
        }
    }
}

impl RoleConfigBody {
    fn validate(self) -> Result<RoleConfiguration, ApiError> {
        Ok(RoleConfiguration::new(
            self.control_count,
            self.fixed_effect_count,
            self.mechanism_count,
            self.hetero_count,
        )?)
    }
}

#[derive(Serialize, ToSchema)]
pub struct VariableItem {
    /// Position in the taxonomy; used to address edits
    index: usize,
    name: String,
    label: String,
    role: String,
}

impl VariableItem {
    fn new(index: usize, variable: &VariableDefinition) -> Self {
        Self {
            index,
            name: variable.name.clone(),
            label: variable.label.clone(),
            role: format!("{:?}", variable.role),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SectionItem {
    title: String,
    code: String,
    explanation: String,
    generated_at: String,
}

impl From<&CodeSection> for SectionItem {
    fn from(section: &CodeSection) -> Self {
        Self {
            title: section.title.clone(),
            code: section.code.clone(),
            explanation: section.explanation.clone(),
            generated_at: section.generated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CategoryHistory {
    category: String,
    title: String,
    /// Newest first
    sections: Vec<SectionItem>,
}

#[derive(Serialize, ToSchema)]
pub struct NoticeItem {
    id: u64,
    kind: String,
    message: String,
    raised_at: String,
}

impl From<&Notice> for NoticeItem {
    fn from(notice: &Notice) -> Self {
        Self {
            id: notice.id,
            kind: notice.kind.as_str().to_string(),
            message: notice.message.clone(),
            raised_at: notice.raised_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WizardStateResponse {
    stage: String,
    step: u8,
    topic: String,
    field: String,
    role_config: RoleConfigBody,
    variables: Vec<VariableItem>,
    active_category: String,
    history: Vec<CategoryHistory>,
    suggesting: bool,
    generating: bool,
    notices: Vec<NoticeItem>,
}

#[derive(Serialize, ToSchema)]
pub struct RoleBucketItem {
    role: String,
    title: String,
    variables: Vec<VariableItem>,
}

impl From<&RoleBucket> for RoleBucketItem {
    fn from(bucket: &RoleBucket) -> Self {
        Self {
            role: format!("{:?}", bucket.role),
            title: bucket.role.display_name().to_string(),
            variables: bucket
                .variables
                .iter()
                .map(|(i, v)| VariableItem::new(*i, v))
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TaxonomyResponse {
    buckets: Vec<RoleBucketItem>,
}

#[derive(Serialize, ToSchema)]
pub struct MethodItem {
    index: usize,
    name: String,
    hint: String,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryItem {
    id: String,
    title: String,
    methods: Vec<MethodItem>,
}

#[derive(Serialize, ToSchema)]
pub struct CatalogResponse {
    categories: Vec<CategoryItem>,
}

#[derive(Deserialize, ToSchema)]
pub struct TopicRequest {
    topic: String,
    #[serde(default)]
    field: String,
}

/// Omitted fields fall back to the values already in the session
#[derive(Deserialize, ToSchema)]
pub struct SuggestRequest {
    topic: Option<String>,
    field: Option<String>,
    roles: Option<RoleConfigBody>,
}

#[derive(Deserialize, ToSchema)]
pub struct VariableEditRequest {
    name: Option<String>,
    label: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CategoryRequest {
    category: String,
}

/// Pick the method by position or by name within the active category
#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    method_index: Option<usize>,
    method: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    category: String,
    section: SectionItem,
}

#[derive(Serialize, ToSchema)]
pub struct AbandonResponse {
    kind: String,
    /// Whether a request was actually outstanding
    abandoned: bool,
}

#[derive(Serialize, ToSchema)]
pub struct NoticeListResponse {
    notices: Vec<NoticeItem>,
}

#[derive(Serialize, ToSchema)]
pub struct ExportResponse {
    category: String,
    path: String,
    content: String,
}

fn parse_category(id: &str) -> Result<Category, ApiError> {
    Category::from_str(id).ok_or_else(|| ApiError::BadRequest(format!("unknown category '{}'", id)))
}

fn state_response(state: &SharedState, workflow: WorkflowState) -> WizardStateResponse {
    let busy = state.wizard.busy();
    let notices = state.wizard.notices();
    WizardStateResponse {
        stage: workflow.stage.as_str().to_string(),
        step: workflow.stage.step(),
        topic: workflow.topic.clone(),
        field: workflow.field.clone(),
        role_config: workflow.role_config.into(),
        variables: workflow
            .variables
            .iter()
            .enumerate()
            .map(|(i, v)| VariableItem::new(i, v))
            .collect(),
        active_category: workflow.active_category.as_str().to_string(),
        history: Category::all()
            .into_iter()
            .map(|category| CategoryHistory {
                category: category.as_str().to_string(),
                title: category.title().to_string(),
                sections: workflow
                    .store
                    .sections(category)
                    .iter()
                    .map(SectionItem::from)
                    .collect(),
            })
            .collect(),
        suggesting: busy.suggesting,
        generating: busy.generating,
        notices: notices.iter().map(NoticeItem::from).collect(),
    }
}

// === Handlers ===

/// Get the full session state
#[utoipa::path(
    get,
    path = "/api/v1/wizard/state",
    tag = "wizard",
    responses(
        (status = 200, description = "Current session", body = WizardStateResponse)
    )
)]
pub async fn get_state(State(state): State<SharedState>) -> Json<WizardStateResponse> {
    let workflow = state.wizard.snapshot();
    Json(state_response(&state, workflow))
}

/// Set topic and field
#[utoipa::path(
    put,
    path = "/api/v1/wizard/topic",
    tag = "wizard",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Topic stored", body = WizardStateResponse),
        (status = 409, description = "Not in topic intake", body = ApiResponse)
    )
)]
pub async fn set_topic(
    State(state): State<SharedState>,
    Json(req): Json<TopicRequest>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let workflow = state.wizard.set_topic(&req.topic, &req.field)?;
    Ok(Json(state_response(&state, workflow)))
}

/// Set role counts
#[utoipa::path(
    put,
    path = "/api/v1/wizard/roles",
    tag = "wizard",
    request_body = RoleConfigBody,
    responses(
        (status = 200, description = "Role counts stored", body = WizardStateResponse),
        (status = 422, description = "Count out of range", body = ApiResponse)
    )
)]
pub async fn set_roles(
    State(state): State<SharedState>,
    Json(req): Json<RoleConfigBody>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let workflow = state.wizard.set_role_config(req.validate()?)?;
    Ok(Json(state_response(&state, workflow)))
}

/// Ask the collaborator for a variable taxonomy
#[utoipa::path(
    post,
    path = "/api/v1/wizard/suggest",
    tag = "wizard",
    request_body = SuggestRequest,
    responses(
        (status = 200, description = "Taxonomy accepted; session is in variable review", body = WizardStateResponse),
        (status = 409, description = "Wrong stage, busy, or superseded", body = ApiResponse),
        (status = 502, description = "Suggestion failed or did not match the schema", body = ApiResponse)
    )
)]
pub async fn suggest(
    State(state): State<SharedState>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let current = state.wizard.snapshot();
    let topic = req.topic.unwrap_or(current.topic);
    let field = req.field.unwrap_or(current.field);
    let roles = match req.roles {
        Some(body) => body.validate()?,
        None => current.role_config,
    };

    state
        .wizard
        .request_suggestions(&topic, &field, roles)
        .await?;
    let workflow = state.wizard.snapshot();
    Ok(Json(state_response(&state, workflow)))
}

/// Return to topic intake, keeping the taxonomy
#[utoipa::path(
    post,
    path = "/api/v1/wizard/return",
    tag = "wizard",
    responses(
        (status = 200, description = "Back in topic intake", body = WizardStateResponse),
        (status = 409, description = "Not in variable review", body = ApiResponse)
    )
)]
pub async fn return_to_topic(
    State(state): State<SharedState>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let workflow = state.wizard.return_to_topic()?;
    Ok(Json(state_response(&state, workflow)))
}

/// Confirm the taxonomy and open the workbench
#[utoipa::path(
    post,
    path = "/api/v1/wizard/confirm",
    tag = "wizard",
    responses(
        (status = 200, description = "Workbench open", body = WizardStateResponse),
        (status = 409, description = "Not in variable review", body = ApiResponse)
    )
)]
pub async fn confirm(
    State(state): State<SharedState>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let workflow = state.wizard.confirm_taxonomy()?;
    Ok(Json(state_response(&state, workflow)))
}

/// Rename and/or relabel a variable
#[utoipa::path(
    patch,
    path = "/api/v1/wizard/variables/{index}",
    tag = "wizard",
    params(
        ("index" = usize, Path, description = "Position of the variable in the taxonomy")
    ),
    request_body = VariableEditRequest,
    responses(
        (status = 200, description = "Variable updated", body = WizardStateResponse),
        (status = 404, description = "No variable at index", body = ApiResponse),
        (status = 422, description = "Invalid variable name", body = ApiResponse)
    )
)]
pub async fn edit_variable(
    State(state): State<SharedState>,
    Path(index): Path<usize>,
    Json(req): Json<VariableEditRequest>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    if req.name.is_none() && req.label.is_none() {
        return Err(ApiError::BadRequest(
            "expected a name or a label to change".to_string(),
        ));
    }
    let workflow = state
        .wizard
        .edit_variable(index, req.name.as_deref(), req.label.as_deref())?;
    Ok(Json(state_response(&state, workflow)))
}

/// Variables grouped into the six role buckets
#[utoipa::path(
    get,
    path = "/api/v1/wizard/taxonomy",
    tag = "wizard",
    responses(
        (status = 200, description = "Role buckets in display order", body = TaxonomyResponse)
    )
)]
pub async fn taxonomy(State(state): State<SharedState>) -> Json<TaxonomyResponse> {
    let buckets = state.wizard.group_by_role();
    Json(TaxonomyResponse {
        buckets: buckets.iter().map(RoleBucketItem::from).collect(),
    })
}

/// The method catalog
#[utoipa::path(
    get,
    path = "/api/v1/wizard/catalog",
    tag = "wizard",
    responses(
        (status = 200, description = "All categories with their methods", body = CatalogResponse)
    )
)]
pub async fn catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        categories: Category::all()
            .into_iter()
            .map(|category| CategoryItem {
                id: category.as_str().to_string(),
                title: category.title().to_string(),
                methods: category
                    .methods()
                    .iter()
                    .enumerate()
                    .map(|(index, m)| MethodItem {
                        index,
                        name: m.name.to_string(),
                        hint: m.hint.to_string(),
                    })
                    .collect(),
            })
            .collect(),
    })
}

/// Switch the active workbench category
#[utoipa::path(
    put,
    path = "/api/v1/wizard/category",
    tag = "wizard",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category selected", body = WizardStateResponse),
        (status = 400, description = "Unknown category", body = ApiResponse)
    )
)]
pub async fn select_category(
    State(state): State<SharedState>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<WizardStateResponse>, ApiError> {
    let category = parse_category(&req.category)?;
    let workflow = state.wizard.select_category(category)?;
    Ok(Json(state_response(&state, workflow)))
}

/// Generate code for a method of the active category
#[utoipa::path(
    post,
    path = "/api/v1/wizard/generate",
    tag = "wizard",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Section recorded at the head of the category history", body = GenerateResponse),
        (status = 404, description = "Unknown method", body = ApiResponse),
        (status = 409, description = "Not in the workbench, busy, or superseded", body = ApiResponse),
        (status = 502, description = "Generation failed", body = ApiResponse)
    )
)]
pub async fn generate(
    State(state): State<SharedState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let (category, section) = match (req.method_index, req.method.as_deref()) {
        (Some(index), _) => state.wizard.generate(index).await?,
        (None, Some(name)) => state.wizard.generate_named(name).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "expected method_index or method".to_string(),
            ))
        }
    };
    Ok(Json(GenerateResponse {
        category: category.as_str().to_string(),
        section: SectionItem::from(&section),
    }))
}

/// Abandon the outstanding request of a kind
#[utoipa::path(
    post,
    path = "/api/v1/wizard/abandon/{kind}",
    tag = "wizard",
    params(
        ("kind" = String, Path, description = "suggestion or generation")
    ),
    responses(
        (status = 200, description = "Busy flag cleared", body = AbandonResponse),
        (status = 400, description = "Unknown request kind", body = ApiResponse)
    )
)]
pub async fn abandon(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<Json<AbandonResponse>, ApiError> {
    let kind = RequestKind::from_str(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown request kind '{}'", kind)))?;
    let abandoned = state.wizard.abandon(kind);
    Ok(Json(AbandonResponse {
        kind: kind.as_str().to_string(),
        abandoned,
    }))
}

/// List outstanding notices
#[utoipa::path(
    get,
    path = "/api/v1/wizard/notices",
    tag = "wizard",
    responses(
        (status = 200, description = "Failures not yet dismissed", body = NoticeListResponse)
    )
)]
pub async fn list_notices(State(state): State<SharedState>) -> Json<NoticeListResponse> {
    let notices = state.wizard.notices();
    Json(NoticeListResponse {
        notices: notices.iter().map(NoticeItem::from).collect(),
    })
}

/// Dismiss a notice
#[utoipa::path(
    delete,
    path = "/api/v1/wizard/notices/{id}",
    tag = "wizard",
    params(
        ("id" = u64, Path, description = "Notice ID")
    ),
    responses(
        (status = 200, description = "Notice dismissed", body = ApiResponse)
    )
)]
pub async fn dismiss_notice(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Json<ApiResponse> {
    if state.wizard.dismiss_notice(id) {
        Json(ApiResponse {
            success: true,
            message: format!("Notice {} dismissed", id),
        })
    } else {
        Json(ApiResponse {
            success: false,
            message: format!("No notice with id {}", id),
        })
    }
}

/// Write a category's history to `.stataforge/exports/<category>.do`
#[utoipa::path(
    post,
    path = "/api/v1/wizard/export/{category}",
    tag = "wizard",
    params(
        ("category" = String, Path, description = "basic, benchmark, robust, endo, or hetero")
    ),
    responses(
        (status = 200, description = "Do-file written", body = ExportResponse),
        (status = 400, description = "Unknown category", body = ApiResponse)
    )
)]
pub async fn export(
    State(state): State<SharedState>,
    Path(category): Path<String>,
) -> Result<Json<ExportResponse>, ApiError> {
    let category = parse_category(&category)?;
    let content = state.wizard.render_do_file(category);
    let path = io::export_do_file(category, &content).await?;
    Ok(Json(ExportResponse {
        category: category.as_str().to_string(),
        path: path.display().to_string(),
        content,
    }))
}

/// Routes nested under `/api/v1/wizard`
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/topic", put(set_topic))
        .route("/roles", put(set_roles))
        .route("/suggest", post(suggest))
        .route("/return", post(return_to_topic))
        .route("/confirm", post(confirm))
        .route("/variables/:index", patch(edit_variable))
        .route("/taxonomy", get(taxonomy))
        .route("/catalog", get(catalog))
        .route("/category", put(select_category))
        .route("/generate", post(generate))
        .route("/abandon/:kind", post(abandon))
        .route("/notices", get(list_notices))
        .route("/notices/:id", delete(dismiss_notice))
        .route("/export/:category", post(export))
        .route("/events", get(crate::events))
}
