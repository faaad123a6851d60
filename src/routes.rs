use actix::{Addr, MailboxError};
use actix_web::{delete, get, http::StatusCode, post, put, web, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::ledger::{
    AddExpense, AddParticipant, DeleteExpense, EditExpense, LedgerError, LedgerKeeper,
    ListExpenses, ListParticipants,
};
use crate::profile::{ProfileError, ProfileSource};
use crate::schemas::{ExpenseDraft, NewParticipant};

type Keeper = web::Data<Addr<LedgerKeeper>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("ledger is unavailable: {0}")]
    Mailbox(#[from] MailboxError),
    #[error("malformed request body: {0}")]
    Malformed(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(LedgerError::ExpenseNotFound(_)) => "not_found",
            ApiError::Ledger(LedgerError::Store(_)) => "store_error",
            ApiError::Ledger(LedgerError::Balance(_)) => "balance_error",
            ApiError::Ledger(_) => "validation_error",
            ApiError::Profile(_) => "profile_error",
            ApiError::Mailbox(_) => "unavailable",
            ApiError::Malformed(_) => "malformed_request",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(LedgerError::ExpenseNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ledger(LedgerError::Store(_) | LedgerError::Balance(_))
            | ApiError::Mailbox(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Ledger(_) | ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::Profile(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }))
    }
}

#[get("/participants")]
async fn list_participants(keeper: Keeper) -> Result<HttpResponse, ApiError> {
    let participants = keeper.send(ListParticipants).await??;
    Ok(HttpResponse::Ok().json(json!({ "participants": participants })))
}

// An empty body draws the new participant's profile from the profile source.
#[post("/participants")]
async fn add_participant(
    keeper: Keeper,
    profiles: web::Data<dyn ProfileSource>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let profile = if body.iter().all(u8::is_ascii_whitespace) {
        profiles.fetch_profile().await?
    } else {
        serde_json::from_slice::<NewParticipant>(&body)
            .map_err(|err| ApiError::Malformed(err.to_string()))?
    };
    let participant = keeper.send(AddParticipant(profile)).await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "participant added",
        "participant": participant,
    })))
}

#[get("/expenses")]
async fn list_expenses(keeper: Keeper) -> Result<HttpResponse, ApiError> {
    let expenses = keeper.send(ListExpenses).await??;
    Ok(HttpResponse::Ok().json(json!({ "expenses": expenses })))
}

#[post("/expenses")]
async fn add_expense(
    keeper: Keeper,
    draft: web::Json<ExpenseDraft>,
) -> Result<HttpResponse, ApiError> {
    let expense = keeper.send(AddExpense(draft.into_inner())).await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "expense added",
        "expense": expense,
    })))
}

#[put("/expenses/{id}")]
async fn edit_expense(
    keeper: Keeper,
    id: web::Path<String>,
    draft: web::Json<ExpenseDraft>,
) -> Result<HttpResponse, ApiError> {
    let expense = keeper
        .send(EditExpense {
            id: id.into_inner(),
            draft: draft.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Ok().json(json!({
        "message": "expense updated",
        "expense": expense,
    })))
}

#[delete("/expenses/{id}")]
async fn delete_expense(keeper: Keeper, id: web::Path<String>) -> Result<HttpResponse, ApiError> {
    keeper.send(DeleteExpense(id.into_inner())).await??;
    Ok(HttpResponse::Ok().json(json!({ "message": "expense deleted" })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::Malformed(err.to_string()).into()),
    )
    .service(list_participants)
    .service(add_participant)
    .service(list_expenses)
    .service(add_expense)
    .service(edit_expense)
    .service(delete_expense);
}
