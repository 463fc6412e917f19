//! API Routes
//!
//! HTTP endpoint definitions.

use std::future::Future;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, Expense, ExpenseFilter, LedgerEntry, OperationContext, Reconciliation, Transfer,
};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    AccountHandler, CreateAccountCommand, CreateExpenseCommand, ExpenseHandler, ExpenseSummary,
    ReportHandler, TransferCommand, TransferHandler, UpdateExpenseCommand,
};
use crate::idempotency::{IdempotencyService, StoredResponse};
use crate::storage::SharedStorage;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
pub const REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// Shared state of every route
#[derive(Clone)]
pub struct AppState {
    pub storage: SharedStorage,
    pub idempotency: IdempotencyService,
}

impl AppState {
    pub fn new(storage: SharedStorage, idempotency_ttl_hours: i64) -> Self {
        Self {
            idempotency: IdempotencyService::new(storage.clone(), idempotency_ttl_hours),
            storage,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct AccountListResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Serialize)]
pub struct StatementResponse {
    pub account_id: Uuid,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseListResponse {
    pub expenses: Vec<Expense>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TransferListResponse {
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/:account_id", get(get_account).delete(delete_account))
        .route("/accounts/:account_id/entries", get(get_account_entries))
        .route(
            "/accounts/:account_id/reconciliation",
            get(get_account_reconciliation),
        )
        // Expenses
        .route("/expenses", post(create_expense).get(list_expenses))
        .route(
            "/expenses/:expense_id",
            get(get_expense).patch(update_expense).delete(delete_expense),
        )
        // Reports
        .route("/reports/expenses", get(expense_report))
        // Transfers
        .route("/transfers", post(create_transfer).get(list_transfers))
}

// =========================================================================
// Body and idempotency helpers
// =========================================================================

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// `Idempotency-Key` header, which must be a UUID when present
fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<Uuid>> {
    match headers.get(IDEMPOTENCY_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("{} must be a UUID", IDEMPOTENCY_HEADER))
            }),
    }
}

fn replayed(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(stored.body)).into_response();
    response
        .headers_mut()
        .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
    response
}

/// Run a creating command at most once per `Idempotency-Key`.
///
/// A retry with the same key and body replays the stored `201` response;
/// the same key with another body is a conflict. Failed commands are not
/// remembered.
async fn create_idempotent<C, R, F, Fut>(
    state: &AppState,
    context: &OperationContext,
    headers: &HeaderMap,
    body: &Bytes,
    execute: F,
) -> AppResult<Response>
where
    C: DeserializeOwned,
    R: Serialize,
    F: FnOnce(C) -> Fut,
    Fut: Future<Output = AppResult<R>>,
{
    let user_id = context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))?;
    let key = idempotency_key(headers)?;
    let request_hash = IdempotencyService::compute_request_hash(body);

    if let Some(key) = key {
        if let Some(stored) = state.idempotency.replay(user_id, key, &request_hash).await? {
            return Ok(replayed(stored));
        }
    }

    let command: C = parse_json(body)?;
    let result = execute(command).await?;
    let value = serde_json::to_value(&result).map_err(|e| AppError::Internal(e.to_string()))?;

    if let Some(key) = key {
        state
            .idempotency
            .remember(
                user_id,
                key,
                request_hash,
                StatusCode::CREATED.as_u16(),
                value.clone(),
            )
            .await?;
    }

    Ok((StatusCode::CREATED, Json(value)).into_response())
}

// =========================================================================
// Accounts
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let command: CreateAccountCommand = parse_json(&body)?;
    let account = AccountHandler::new(state.storage)
        .create(command, &context)
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<AccountListResponse>, AppError> {
    let accounts = AccountHandler::new(state.storage).list(&context).await?;
    Ok(Json(AccountListResponse { accounts }))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Account>, AppError> {
    let account = AccountHandler::new(state.storage)
        .get(account_id, &context)
        .await?;
    Ok(Json(account))
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    AccountHandler::new(state.storage)
        .delete(account_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_account_entries(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<StatementResponse>, AppError> {
    let entries = AccountHandler::new(state.storage)
        .statement(account_id, &context)
        .await?;
    Ok(Json(StatementResponse {
        account_id,
        entries,
    }))
}

async fn get_account_reconciliation(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Reconciliation>, AppError> {
    let reconciliation = AccountHandler::new(state.storage)
        .reconcile(account_id, &context)
        .await?;
    Ok(Json(reconciliation))
}

// =========================================================================
// Expenses
// =========================================================================

async fn create_expense(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let handler = ExpenseHandler::new(state.storage.clone());
    create_idempotent(&state, &context, &headers, &body, |command: CreateExpenseCommand| {
        handler.create(command, &context)
    })
    .await
}

async fn list_expenses(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(filter): Query<ExpenseFilter>,
) -> Result<Json<ExpenseListResponse>, AppError> {
    let expenses = ExpenseHandler::new(state.storage)
        .list(&filter, &context)
        .await?;
    Ok(Json(ExpenseListResponse {
        count: expenses.len(),
        expenses,
    }))
}

async fn get_expense(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<Expense>, AppError> {
    let expense = ExpenseHandler::new(state.storage)
        .get(expense_id, &context)
        .await?;
    Ok(Json(expense))
}

async fn update_expense(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(expense_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Expense>, AppError> {
    let command: UpdateExpenseCommand = parse_json(&body)?;
    let expense = ExpenseHandler::new(state.storage)
        .update(expense_id, command, &context)
        .await?;
    Ok(Json(expense))
}

async fn delete_expense(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ExpenseHandler::new(state.storage)
        .delete(expense_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Reports
// =========================================================================

async fn expense_report(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ExpenseSummary>, AppError> {
    let summary = ReportHandler::new(state.storage)
        .expense_summary(query.from, query.to, &context)
        .await?;
    Ok(Json(summary))
}

// =========================================================================
// Transfers
// =========================================================================

async fn create_transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let handler = TransferHandler::new(state.storage.clone());
    create_idempotent(&state, &context, &headers, &body, |command: TransferCommand| {
        handler.execute(command, &context)
    })
    .await
}

async fn list_transfers(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<TransferListResponse>, AppError> {
    let transfers = TransferHandler::new(state.storage)
        .history(&context)
        .await?;
    Ok(Json(TransferListResponse { transfers }))
}
