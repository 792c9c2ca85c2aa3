//! # Wizard Coordinator
//!
//! Owns a single wizard session and runs every operation against it.
//!
//! The session sits behind one `std::sync::Mutex` that is never held across
//! an `.await`; the two collaborator calls are the only suspension points.
//! Each call kind has its own busy flag and request token. A response whose
//! token was superseded (by `abandon`) is dropped without touching state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::catalog::{AnalysisMethod, Category};
use crate::error::{RequestKind, WizardError};
use crate::models::ModelConfig;
use crate::state::store::CodeSection;
use crate::state::taxonomy::{
    role_counts, Role, RoleBucket, RoleConfiguration, VariableDefinition,
};
use crate::state::workflow::{WorkflowAction, WorkflowState};

use super::collaborator::Collaborator;
use super::events::{WizardEvent, WizardEventKind};
use super::request::{CodeGenerationRequest, SuggestionRequest};
use super::stage::WizardStage;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardConfig {
    /// Model used by the LLM collaborator
    #[serde(default)]
    pub model: ModelConfig,
    /// Language of inline commentary in generated scripts
    #[serde(default = "default_commentary_language")]
    pub commentary_language: String,
    /// Role counts a fresh session starts with
    #[serde(default)]
    pub default_roles: RoleConfiguration,
}

fn default_commentary_language() -> String {
    "English".to_string()
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            commentary_language: default_commentary_language(),
            default_roles: RoleConfiguration::default(),
        }
    }
}

/// A surfaced failure kept until the operator dismisses it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: u64,
    pub kind: RequestKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Busy flags of both call kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyState {
    pub suggesting: bool,
    pub generating: bool,
}

#[derive(Debug, Default)]
struct InFlight {
    busy: bool,
    token: u64,
}

impl InFlight {
    fn begin(&mut self) -> u64 {
        self.token += 1;
        self.busy = true;
        self.token
    }

    fn is_current(&self, token: u64) -> bool {
        self.busy && self.token == token
    }

    fn finish(&mut self, token: u64) {
        if self.token == token {
            self.busy = false;
        }
    }

    /// Returns whether a call was outstanding
    fn abandon(&mut self) -> bool {
        let was_busy = self.busy;
        self.busy = false;
        self.token += 1;
        was_busy
    }
}

#[derive(Debug)]
struct Session {
    state: WorkflowState,
    suggestion: InFlight,
    generation: InFlight,
    notices: Vec<Notice>,
    next_notice_id: u64,
}

impl Session {
    fn new(state: WorkflowState) -> Self {
        Self {
            state,
            suggestion: InFlight::default(),
            generation: InFlight::default(),
            notices: Vec::new(),
            next_notice_id: 1,
        }
    }

    fn flight_mut(&mut self, kind: RequestKind) -> &mut InFlight {
        match kind {
            RequestKind::Suggestion => &mut self.suggestion,
            RequestKind::Generation => &mut self.generation,
        }
    }

    fn flight(&self, kind: RequestKind) -> &InFlight {
        match kind {
            RequestKind::Suggestion => &self.suggestion,
            RequestKind::Generation => &self.generation,
        }
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the busy flag when a dispatch ends, including when the awaiting
/// future is dropped. Must not be dropped while the session lock is held.
struct InFlightGuard {
    session: Arc<Mutex<Session>>,
    kind: RequestKind,
    token: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.session).flight_mut(self.kind).finish(self.token);
    }
}

/// `state` with the suggestion inputs applied
fn with_inputs(
    state: &WorkflowState,
    topic: &str,
    field: &str,
    roles: RoleConfiguration,
) -> Result<WorkflowState, WizardError> {
    state
        .apply(WorkflowAction::SetTopic {
            topic: topic.to_string(),
            field: field.to_string(),
        })?
        .apply(WorkflowAction::SetRoleConfig(roles))
}

/// Warn about every role whose suggested count differs from the request
fn log_role_mismatches(roles: &RoleConfiguration, variables: &[VariableDefinition]) -> usize {
    let counts = role_counts(variables);
    let mut mismatches = 0;
    for (role, received) in Role::ORDER.iter().zip(counts) {
        let expected = roles.count_for(*role);
        if received != expected {
            warn!(
                ?role,
                expected,
                received,
                "Suggested taxonomy does not match requested role count"
            );
            mismatches += 1;
        }
    }
    mismatches
}

/// Drives one wizard session
pub struct WizardCoordinator {
    config: WizardConfig,
    collaborator: Arc<dyn Collaborator>,
    session: Arc<Mutex<Session>>,
    event_tx: Option<broadcast::Sender<WizardEvent>>,
}

impl WizardCoordinator {
    pub fn new(config: WizardConfig, collaborator: Arc<dyn Collaborator>) -> Self {
        let state = WorkflowState::new(config.default_roles);
        Self {
            config,
            collaborator,
            session: Arc::new(Mutex::new(Session::new(state))),
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: broadcast::Sender<WizardEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    fn emit(&self, event: WizardEvent) {
        if let Some(tx) = &self.event_tx {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Copy of the current workflow state
    pub fn snapshot(&self) -> WorkflowState {
        lock(&self.session).state.clone()
    }

    pub fn stage(&self) -> WizardStage {
        lock(&self.session).state.stage
    }

    /// The six role buckets in display order
    pub fn group_by_role(&self) -> Vec<RoleBucket> {
        lock(&self.session).state.group_by_role()
    }

    pub fn is_busy(&self, kind: RequestKind) -> bool {
        lock(&self.session).flight(kind).busy
    }

    pub fn busy(&self) -> BusyState {
        let session = lock(&self.session);
        BusyState {
            suggesting: session.suggestion.busy,
            generating: session.generation.busy,
        }
    }

    /// Outstanding notices, oldest first
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.session).notices.clone()
    }

    /// Render a category's history as a do-file
    pub fn render_do_file(&self, category: Category) -> String {
        lock(&self.session).state.render_do_file(category)
    }

    // ========================================================================
    // Synchronous edits
    // ========================================================================

    /// Apply a reducer action and report stage changes
    fn dispatch(&self, action: WorkflowAction) -> Result<WorkflowState, WizardError> {
        let name = action.name();
        let mut session = lock(&self.session);
        let previous = session.state.stage;
        let next = session.state.apply(action)?;
        session.state = next.clone();
        drop(session);

        debug!(action = name, stage = %next.stage, "Applied workflow action");
        if next.stage != previous {
            info!(from = %previous, to = %next.stage, "Stage changed");
            self.emit(
                WizardEvent::new(WizardEventKind::StageChanged, next.stage)
                    .with_data(serde_json::json!({ "from": previous })),
            );
        }
        Ok(next)
    }

    pub fn set_topic(&self, topic: &str, field: &str) -> Result<WorkflowState, WizardError> {
        self.dispatch(WorkflowAction::SetTopic {
            topic: topic.to_string(),
            field: field.to_string(),
        })
    }

    pub fn set_role_config(&self, config: RoleConfiguration) -> Result<WorkflowState, WizardError> {
        self.dispatch(WorkflowAction::SetRoleConfig(config))
    }

    /// Go back to topic intake; the taxonomy is kept
    pub fn return_to_topic(&self) -> Result<WorkflowState, WizardError> {
        self.dispatch(WorkflowAction::ReturnToTopic)
    }

    /// Accept the taxonomy and open the workbench
    pub fn confirm_taxonomy(&self) -> Result<WorkflowState, WizardError> {
        self.dispatch(WorkflowAction::ConfirmTaxonomy)
    }

    pub fn rename_variable(&self, index: usize, name: &str) -> Result<WorkflowState, WizardError> {
        self.edit_variable(index, Some(name), None)
    }

    pub fn relabel_variable(&self, index: usize, label: &str) -> Result<WorkflowState, WizardError> {
        self.edit_variable(index, None, Some(label))
    }

    /// Rename and relabel in one step; nothing is committed unless every
    /// requested change applies.
    pub fn edit_variable(
        &self,
        index: usize,
        name: Option<&str>,
        label: Option<&str>,
    ) -> Result<WorkflowState, WizardError> {
        let mut actions = Vec::new();
        if let Some(name) = name {
            actions.push(WorkflowAction::RenameVariable {
                index,
                name: name.to_string(),
            });
        }
        if let Some(label) = label {
            actions.push(WorkflowAction::RelabelVariable {
                index,
                label: label.to_string(),
            });
        }

        let next = {
            let mut session = lock(&self.session);
            let next = actions
                .into_iter()
                .try_fold(session.state.clone(), |state, action| state.apply(action))?;
            session.state = next.clone();
            next
        };

        if let Some(variable) = next.variables.get(index) {
            debug!(index, name = %variable.name, "Edited variable");
            self.emit(
                WizardEvent::new(WizardEventKind::TaxonomyEdited, next.stage).with_data(
                    serde_json::json!({
                        "index": index,
                        "name": variable.name,
                        "label": variable.label,
                    }),
                ),
            );
        }
        Ok(next)
    }

    pub fn select_category(&self, category: Category) -> Result<WorkflowState, WizardError> {
        let next = self.dispatch(WorkflowAction::SelectCategory(category))?;
        self.emit(
            WizardEvent::new(WizardEventKind::CategorySelected, next.stage)
                .with_data(serde_json::json!({ "category": category })),
        );
        Ok(next)
    }

    /// Clear the busy flag of `kind` and invalidate its outstanding request.
    ///
    /// Returns whether a request was outstanding.
    pub fn abandon(&self, kind: RequestKind) -> bool {
        let mut session = lock(&self.session);
        let was_busy = session.flight_mut(kind).abandon();
        let stage = session.state.stage;
        drop(session);

        if was_busy {
            info!(kind = %kind, "Abandoned in-flight request");
            self.emit(
                WizardEvent::new(WizardEventKind::RequestAbandoned, stage)
                    .with_data(serde_json::json!({ "kind": kind })),
            );
        }
        was_busy
    }

    /// Remove a notice; returns whether it existed
    pub fn dismiss_notice(&self, id: u64) -> bool {
        let mut session = lock(&self.session);
        let before = session.notices.len();
        session.notices.retain(|n| n.id != id);
        let removed = session.notices.len() != before;
        let stage = session.state.stage;
        drop(session);

        if removed {
            self.emit(
                WizardEvent::new(WizardEventKind::NoticeDismissed, stage)
                    .with_data(serde_json::json!({ "id": id })),
            );
        }
        removed
    }

    // ========================================================================
    // Collaborator exchanges
    // ========================================================================

    /// Record a surfaced failure as a notice and broadcast it
    fn surface(&self, session: &mut Session, kind: RequestKind, error: &WizardError) {
        let notice = Notice {
            id: session.next_notice_id,
            kind,
            message: error.to_string(),
            raised_at: Utc::now(),
        };
        session.next_notice_id += 1;
        warn!(kind = %kind, notice_id = notice.id, error = %error, "Request failed");

        let event_kind = match kind {
            RequestKind::Suggestion => WizardEventKind::SuggestionFailed,
            RequestKind::Generation => WizardEventKind::GenerationFailed,
        };
        self.emit(
            WizardEvent::new(event_kind, session.state.stage)
                .with_data(serde_json::json!({ "notice": &notice })),
        );
        session.notices.push(notice);
    }

    /// Mark `kind` busy and hand out the guard that clears it
    fn begin(&self, session: &mut Session, kind: RequestKind) -> Result<InFlightGuard, WizardError> {
        let flight = session.flight_mut(kind);
        if flight.busy {
            return Err(WizardError::Busy(kind));
        }
        let token = flight.begin();
        Ok(InFlightGuard {
            session: Arc::clone(&self.session),
            kind,
            token,
        })
    }

    /// Drop a response whose request was superseded
    fn discard(&self, session: &Session, kind: RequestKind) -> WizardError {
        warn!(kind = %kind, "Discarding response for superseded request");
        self.emit(
            WizardEvent::new(WizardEventKind::ResponseDiscarded, session.state.stage)
                .with_data(serde_json::json!({ "kind": kind })),
        );
        WizardError::StaleResponse(kind)
    }

    /// Ask the collaborator for a taxonomy and move to variable review.
    ///
    /// Topic, field and role counts are committed together with the
    /// suggested variables; on any failure the session is left as it was.
    #[tracing::instrument(skip(self, roles))]
    pub async fn request_suggestions(
        &self,
        topic: &str,
        field: &str,
        roles: RoleConfiguration,
    ) -> Result<Vec<VariableDefinition>, WizardError> {
        let (request, guard) = {
            let mut session = lock(&self.session);
            if session.state.stage != WizardStage::TopicIntake {
                return Err(WizardError::InvalidTransition {
                    operation: "request variable suggestions",
                    stage: session.state.stage,
                });
            }
            if topic.trim().is_empty() {
                let error = WizardError::SuggestionFetch("research topic is empty".to_string());
                self.surface(&mut session, RequestKind::Suggestion, &error);
                return Err(error);
            }

            let staged = with_inputs(&session.state, topic, field, roles)?;
            let guard = self.begin(&mut session, RequestKind::Suggestion)?;
            let request = SuggestionRequest::new(&staged.topic, &staged.field, &staged.role_config);
            (request, guard)
        };

        info!(
            expected = roles.expected_total(),
            "Dispatching variable suggestion request"
        );
        self.emit(
            WizardEvent::new(WizardEventKind::SuggestionStarted, WizardStage::TopicIntake)
                .with_data(serde_json::to_value(&request).unwrap_or_default()),
        );

        let outcome = self.collaborator.suggest_variables(&request).await;

        let result = {
            let mut session = lock(&self.session);
            if !session.suggestion.is_current(guard.token) {
                return Err(self.discard(&session, RequestKind::Suggestion));
            }
            session.suggestion.finish(guard.token);

            // Rebuilt from the live state so edits made during the call survive
            let applied = match outcome {
                Ok(variables) => with_inputs(&session.state, topic, field, roles)
                    .and_then(|s| s.apply(WorkflowAction::ApplySuggestions(variables.clone())))
                    .map(|next| (next, variables)),
                Err(e) => Err(WizardError::SuggestionFetch(format!("{:#}", e))),
            };

            match applied {
                Ok((next, variables)) => {
                    log_role_mismatches(&roles, &variables);
                    session.state = next;
                    Ok(variables)
                }
                Err(error) => {
                    self.surface(&mut session, RequestKind::Suggestion, &error);
                    Err(error)
                }
            }
        };

        if let Ok(variables) = &result {
            info!(count = variables.len(), "Taxonomy accepted");
            self.emit(
                WizardEvent::new(WizardEventKind::SuggestionCompleted, WizardStage::VariableReview)
                    .with_data(serde_json::json!({ "count": variables.len() })),
            );
            self.emit(
                WizardEvent::new(WizardEventKind::StageChanged, WizardStage::VariableReview)
                    .with_data(serde_json::json!({ "from": WizardStage::TopicIntake })),
            );
        }
        result
    }

    /// Generate code for the method at `method_index` of the active category.
    ///
    /// Returns the category the section was recorded under.
    pub async fn generate(
        &self,
        method_index: usize,
    ) -> Result<(Category, CodeSection), WizardError> {
        let category = lock(&self.session).state.active_category;
        let method = category
            .method(method_index)
            .ok_or_else(|| WizardError::UnknownMethod {
                category,
                method: format!("#{}", method_index),
            })?;
        self.generate_method(category, *method).await
    }

    /// Generate code for a method of the active category looked up by name
    pub async fn generate_named(&self, name: &str) -> Result<(Category, CodeSection), WizardError> {
        let category = lock(&self.session).state.active_category;
        let method = category
            .method_by_name(name)
            .ok_or_else(|| WizardError::UnknownMethod {
                category,
                method: name.to_string(),
            })?;
        self.generate_method(category, *method).await
    }

    #[tracing::instrument(skip(self, category, method), fields(category = %category, method = method.name))]
    async fn generate_method(
        &self,
        category: Category,
        method: AnalysisMethod,
    ) -> Result<(Category, CodeSection), WizardError> {
        let (request, guard) = {
            let mut session = lock(&self.session);
            if session.state.stage != WizardStage::Workbench {
                return Err(WizardError::InvalidTransition {
                    operation: "generate code",
                    stage: session.state.stage,
                });
            }
            let guard = self.begin(&mut session, RequestKind::Generation)?;
            let request = CodeGenerationRequest::new(
                &session.state.topic,
                category,
                method,
                &session.state.variables,
                &self.config.commentary_language,
            );
            (request, guard)
        };

        info!("Dispatching code generation request");
        self.emit(
            WizardEvent::new(WizardEventKind::GenerationStarted, WizardStage::Workbench)
                .with_data(serde_json::json!({ "category": category, "method": method.name })),
        );

        let outcome = self.collaborator.generate_code(&request).await;

        let result = {
            let mut session = lock(&self.session);
            if !session.generation.is_current(guard.token) {
                return Err(self.discard(&session, RequestKind::Generation));
            }
            session.generation.finish(guard.token);

            let section = match outcome {
                Ok(code) if !code.trim().is_empty() => {
                    Ok(CodeSection::new(method.name, code, request.caption()))
                }
                Ok(_) => Err(WizardError::CodeGeneration(
                    "collaborator returned an empty script".to_string(),
                )),
                Err(e) => Err(WizardError::CodeGeneration(format!("{:#}", e))),
            };

            match section.and_then(|section| {
                let next = session.state.apply(WorkflowAction::RecordSection {
                    category,
                    section: section.clone(),
                })?;
                Ok((next, section))
            }) {
                Ok((next, section)) => {
                    session.state = next;
                    Ok(section)
                }
                Err(error) => {
                    self.surface(&mut session, RequestKind::Generation, &error);
                    Err(error)
                }
            }
        };

        if let Ok(section) = &result {
            info!(bytes = section.code.len(), "Code section recorded");
            self.emit(
                WizardEvent::new(WizardEventKind::GenerationCompleted, WizardStage::Workbench)
                    .with_data(serde_json::json!({ "category": category, "title": section.title })),
            );
        }
        result.map(|section| (category, section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Returns a fixed taxonomy and a fixed script
    struct StubCollaborator {
        variables: Vec<VariableDefinition>,
        code: String,
        calls: AtomicUsize,
    }

    impl StubCollaborator {
        fn new(code: &str) -> Self {
            Self {
                variables: vec![
                    VariableDefinition::new("tfp", "Total factor productivity", Role::Y),
                    VariableDefinition::new("dig", "Digital transformation", Role::X),
                    VariableDefinition::new("size", "Firm size", Role::Control),
                    VariableDefinition::new("year", "Year", Role::FixedEffect),
                ],
                code: code.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Collaborator for StubCollaborator {
        async fn suggest_variables(
            &self,
            _request: &SuggestionRequest,
        ) -> anyhow::Result<Vec<VariableDefinition>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.variables.clone())
        }

        async fn generate_code(&self, _request: &CodeGenerationRequest) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.code == "fail" {
                anyhow::bail!("connection reset");
            }
            Ok(self.code.clone())
        }
    }

    /// Holds every call until released
    struct GatedCollaborator {
        gate: Notify,
        entered: Notify,
    }

    #[async_trait]
    impl Collaborator for GatedCollaborator {
        async fn suggest_variables(
            &self,
            _request: &SuggestionRequest,
        ) -> anyhow::Result<Vec<VariableDefinition>> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(vec![
                VariableDefinition::new("tfp", "TFP", Role::Y),
                VariableDefinition::new("dig", "Digitalization", Role::X),
            ])
        }

        async fn generate_code(&self, _request: &CodeGenerationRequest) -> anyhow::Result<String> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok("reg tfp dig".to_string())
        }
    }

    fn coordinator(code: &str) -> (WizardCoordinator, Arc<StubCollaborator>) {
        let stub = Arc::new(StubCollaborator::new(code));
        let coordinator = WizardCoordinator::new(WizardConfig::default(), stub.clone());
        (coordinator, stub)
    }

    async fn to_workbench(coordinator: &WizardCoordinator) {
        coordinator
            .request_suggestions("Digitalization and TFP", "Economics", RoleConfiguration::default())
            .await
            .unwrap();
        coordinator.confirm_taxonomy().unwrap();
    }

    #[tokio::test]
    async fn test_suggestions_commit_inputs_and_advance() {
        let (coordinator, _) = coordinator("reg tfp dig");
        let roles = RoleConfiguration::new(3, 1, 2, 0).unwrap();
        let variables = coordinator
            .request_suggestions("  Digitalization and TFP ", "Economics", roles)
            .await
            .unwrap();

        assert_eq!(variables.len(), 4);
        let state = coordinator.snapshot();
        assert_eq!(state.stage, WizardStage::VariableReview);
        assert_eq!(state.topic, "Digitalization and TFP");
        assert_eq!(state.role_config, roles);
        assert!(!coordinator.is_busy(RequestKind::Suggestion));
    }

    #[tokio::test]
    async fn test_empty_topic_is_surfaced_without_dispatch() {
        let (coordinator, stub) = coordinator("reg tfp dig");
        let err = coordinator
            .request_suggestions("   ", "", RoleConfiguration::default())
            .await
            .unwrap_err();

        assert!(matches!(err, WizardError::SuggestionFetch(_)));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.stage(), WizardStage::TopicIntake);

        let notices = coordinator.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, RequestKind::Suggestion);
        assert!(coordinator.dismiss_notice(notices[0].id));
        assert!(coordinator.notices().is_empty());
        assert!(!coordinator.dismiss_notice(notices[0].id));
    }

    #[tokio::test]
    async fn test_generation_prepends_to_dispatch_category() {
        let (coordinator, _) = coordinator("reghdfe tfp dig size, absorb(year)");
        to_workbench(&coordinator).await;
        coordinator.select_category(Category::Benchmark).unwrap();

        let (category, first) = coordinator.generate(0).await.unwrap();
        let (_, second) = coordinator.generate_named("ols baseline").await.unwrap();
        assert_eq!(category, Category::Benchmark);

        let state = coordinator.snapshot();
        let sections = state.store.sections(Category::Benchmark);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], second);
        assert_eq!(sections[1], first);
        assert_eq!(first.title, "OLS Baseline");
        assert!(first.explanation.starts_with("Benchmark Regression: "));
        assert_eq!(state.store.len(Category::Basic), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_store_untouched() {
        let (coordinator, _) = coordinator("fail");
        to_workbench(&coordinator).await;

        let err = coordinator.generate(0).await.unwrap_err();
        assert!(matches!(err, WizardError::CodeGeneration(_)));
        assert!(coordinator.snapshot().store.is_empty());
        assert!(!coordinator.is_busy(RequestKind::Generation));
        assert_eq!(coordinator.notices()[0].kind, RequestKind::Generation);
    }

    #[tokio::test]
    async fn test_blank_script_is_a_generation_failure() {
        let (coordinator, _) = coordinator("  \n ");
        to_workbench(&coordinator).await;

        assert!(matches!(
            coordinator.generate(1).await,
            Err(WizardError::CodeGeneration(_))
        ));
        assert!(coordinator.snapshot().store.is_empty());
    }

    #[tokio::test]
    async fn test_generate_outside_workbench_is_rejected() {
        let (coordinator, stub) = coordinator("reg tfp dig");
        let err = coordinator.generate(0).await.unwrap_err();
        assert!(matches!(err, WizardError::InvalidTransition { .. }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);

        assert!(matches!(
            coordinator.generate(12).await,
            Err(WizardError::UnknownMethod { .. })
        ));
    }

    #[tokio::test]
    async fn test_busy_and_abandon() {
        let collaborator = Arc::new(GatedCollaborator {
            gate: Notify::new(),
            entered: Notify::new(),
        });
        let coordinator = Arc::new(WizardCoordinator::new(
            WizardConfig::default(),
            collaborator.clone(),
        ));

        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .request_suggestions("Green credit", "", RoleConfiguration::default())
                    .await
            })
        };
        collaborator.entered.notified().await;

        assert!(coordinator.is_busy(RequestKind::Suggestion));
        assert!(matches!(
            coordinator
                .request_suggestions("Green credit", "", RoleConfiguration::default())
                .await,
            Err(WizardError::Busy(RequestKind::Suggestion))
        ));

        assert!(coordinator.abandon(RequestKind::Suggestion));
        assert!(!coordinator.is_busy(RequestKind::Suggestion));
        collaborator.gate.notify_one();

        let result = pending.await.unwrap();
        assert_eq!(result, Err(WizardError::StaleResponse(RequestKind::Suggestion)));
        let state = coordinator.snapshot();
        assert_eq!(state.stage, WizardStage::TopicIntake);
        assert!(state.variables.is_empty());
        assert!(coordinator.notices().is_empty());
    }

    fn gated() -> (Arc<WizardCoordinator>, Arc<GatedCollaborator>) {
        let collaborator = Arc::new(GatedCollaborator {
            gate: Notify::new(),
            entered: Notify::new(),
        });
        let coordinator = Arc::new(WizardCoordinator::new(
            WizardConfig::default(),
            collaborator.clone(),
        ));
        (coordinator, collaborator)
    }

    async fn gated_workbench() -> (Arc<WizardCoordinator>, Arc<GatedCollaborator>) {
        let (coordinator, collaborator) = gated();
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .request_suggestions("Green credit", "", RoleConfiguration::default())
                    .await
            })
        };
        collaborator.entered.notified().await;
        collaborator.gate.notify_one();
        pending.await.unwrap().unwrap();
        coordinator.confirm_taxonomy().unwrap();
        (coordinator, collaborator)
    }

    #[tokio::test]
    async fn test_selection_during_suggestion_survives_completion() {
        let (coordinator, collaborator) = gated();
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .request_suggestions("Green credit", "Finance", RoleConfiguration::default())
                    .await
            })
        };
        collaborator.entered.notified().await;

        coordinator.select_category(Category::Endo).unwrap();
        collaborator.gate.notify_one();
        pending.await.unwrap().unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.stage, WizardStage::VariableReview);
        assert_eq!(state.active_category, Category::Endo);
        assert_eq!(state.topic, "Green credit");
        assert_eq!(state.variables.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_generation_is_discarded() {
        let (coordinator, collaborator) = gated_workbench().await;
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.generate(0).await })
        };
        collaborator.entered.notified().await;

        assert!(coordinator.abandon(RequestKind::Generation));
        assert!(!coordinator.abandon(RequestKind::Generation));
        collaborator.gate.notify_one();

        let result = pending.await.unwrap();
        assert!(matches!(
            result,
            Err(WizardError::StaleResponse(RequestKind::Generation))
        ));
        assert!(coordinator.snapshot().store.is_empty());
        assert!(!coordinator.is_busy(RequestKind::Generation));
        assert!(coordinator.notices().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_generation_clears_busy() {
        let (coordinator, collaborator) = gated_workbench().await;
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.generate(0).await })
        };
        collaborator.entered.notified().await;
        assert!(coordinator.is_busy(RequestKind::Generation));

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(!coordinator.is_busy(RequestKind::Generation));
        assert!(coordinator.snapshot().store.is_empty());

        collaborator.gate.notify_one();
        let (_, section) = coordinator.generate(0).await.unwrap();
        assert_eq!(section.code, "reg tfp dig");
    }

    #[tokio::test]
    async fn test_generation_reports_dispatch_category() {
        let (coordinator, collaborator) = gated_workbench().await;
        coordinator.select_category(Category::Benchmark).unwrap();
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.generate(0).await })
        };
        collaborator.entered.notified().await;

        coordinator.select_category(Category::Robust).unwrap();
        collaborator.gate.notify_one();

        let (category, _) = pending.await.unwrap().unwrap();
        assert_eq!(category, Category::Benchmark);
        let state = coordinator.snapshot();
        assert_eq!(state.active_category, Category::Robust);
        assert_eq!(state.store.len(Category::Benchmark), 1);
        assert_eq!(state.store.len(Category::Robust), 0);
    }

    #[test]
    fn test_role_mismatches_counted_per_role() {
        let roles = RoleConfiguration::default();
        let mut variables = vec![
            VariableDefinition::new("tfp", "TFP", Role::Y),
            VariableDefinition::new("dig", "Digitalization", Role::X),
            VariableDefinition::new("het_1", "State ownership", Role::Hetero),
            VariableDefinition::new("fe_1", "Firm", Role::FixedEffect),
            VariableDefinition::new("fe_2", "Year", Role::FixedEffect),
        ];
        for i in 1..=5 {
            variables.push(VariableDefinition::new(format!("ctrl_{}", i), "Control", Role::Control));
        }
        assert_eq!(variables.len(), roles.expected_total());
        assert_eq!(log_role_mismatches(&roles, &variables), 2);

        variables.pop();
        variables.push(VariableDefinition::new("mech_1", "Financing constraint", Role::Mechanism));
        assert_eq!(log_role_mismatches(&roles, &variables), 0);
    }

    #[tokio::test]
    async fn test_combined_edit_applies_both_or_neither() {
        let (coordinator, _) = coordinator("reg tfp dig");
        coordinator
            .request_suggestions("Digitalization and TFP", "", RoleConfiguration::default())
            .await
            .unwrap();

        let next = coordinator
            .edit_variable(2, Some("ln_size"), Some("Log of total assets"))
            .unwrap();
        assert_eq!(next.variables[2].name, "ln_size");
        assert_eq!(next.variables[2].label, "Log of total assets");
        assert_eq!(next.variables[2].role, Role::Control);

        assert!(matches!(
            coordinator.edit_variable(2, Some("Ln Size"), Some("Something else")),
            Err(WizardError::InvalidIdentifier(_))
        ));
        let state = coordinator.snapshot();
        assert_eq!(state.variables[2].name, "ln_size");
        assert_eq!(state.variables[2].label, "Log of total assets");
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (tx, mut rx) = broadcast::channel(32);
        let stub = Arc::new(StubCollaborator::new("reg tfp dig"));
        let coordinator =
            WizardCoordinator::new(WizardConfig::default(), stub).with_event_channel(tx);

        coordinator
            .request_suggestions("Digitalization and TFP", "", RoleConfiguration::default())
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                WizardEventKind::SuggestionStarted,
                WizardEventKind::SuggestionCompleted,
                WizardEventKind::StageChanged,
            ]
        );
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: WizardConfig = serde_json::from_str(r#"{"commentaryLanguage":"Chinese"}"#).unwrap();
        assert_eq!(config.commentary_language, "Chinese");
        assert_eq!(config.default_roles, RoleConfiguration::default());
    }
}
