use std::{future::Future, sync::Arc};

use actix::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::balance::{recompute_balances, totals, BalanceError};
use crate::notify::Notifier;
use crate::schemas::{
    Expense, ExpenseDraft, ExpenseId, NewParticipant, Participant, ParticipantId,
};
use crate::store::{LedgerStore, StoreError};

// Keeps every running balance far below `Decimal::MAX`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be greater than 0 and at most {max}, got {0}", max = MAX_AMOUNT)]
    InvalidAmount(Decimal),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("no participant with id {0}")]
    UnknownPayer(ParticipantId),
    #[error("expense {0} not found")]
    ExpenseNotFound(ExpenseId),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the ledger store; each message runs to completion before the next starts.
pub struct LedgerKeeper {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl LedgerKeeper {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        LedgerKeeper { store, notifier }
    }

    fn serialized<T, F>(&self, work: F) -> AtomicResponse<Self, T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        AtomicResponse::new(Box::pin(work.into_actor(self)))
    }
}

impl Actor for LedgerKeeper {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("ledger keeper started");
    }
}

#[derive(Message)]
#[rtype(result = "Result<Vec<Participant>, LedgerError>")]
pub struct ListParticipants;

#[derive(Message)]
#[rtype(result = "Result<Vec<Expense>, LedgerError>")]
pub struct ListExpenses;

#[derive(Message)]
#[rtype(result = "Result<Participant, LedgerError>")]
pub struct AddParticipant(pub NewParticipant);

#[derive(Message)]
#[rtype(result = "Result<Expense, LedgerError>")]
pub struct AddExpense(pub ExpenseDraft);

#[derive(Message)]
#[rtype(result = "Result<Expense, LedgerError>")]
pub struct EditExpense {
    pub id: ExpenseId,
    pub draft: ExpenseDraft,
}

#[derive(Message)]
#[rtype(result = "Result<(), LedgerError>")]
pub struct DeleteExpense(pub ExpenseId);

#[derive(Message)]
#[rtype(result = "Result<Vec<Participant>, LedgerError>")]
pub struct Recalculate;

impl Handler<ListParticipants> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Vec<Participant>, LedgerError>>;

    fn handle(&mut self, _: ListParticipants, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move {
            store.load_participants().await.map_err(LedgerError::from)
        })
    }
}

impl Handler<ListExpenses> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Vec<Expense>, LedgerError>>;

    fn handle(&mut self, _: ListExpenses, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move {
            store.load_expenses().await.map_err(LedgerError::from)
        })
    }
}

impl Handler<AddParticipant> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Participant, LedgerError>>;

    fn handle(&mut self, msg: AddParticipant, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move { add_participant(store.as_ref(), msg.0).await })
    }
}

impl Handler<AddExpense> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Expense, LedgerError>>;

    fn handle(&mut self, msg: AddExpense, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        self.serialized(async move {
            add_expense(store.as_ref(), notifier.as_ref(), msg.0).await
        })
    }
}

impl Handler<EditExpense> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Expense, LedgerError>>;

    fn handle(&mut self, msg: EditExpense, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move { edit_expense(store.as_ref(), &msg.id, msg.draft).await })
    }
}

impl Handler<DeleteExpense> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<(), LedgerError>>;

    fn handle(&mut self, msg: DeleteExpense, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move { delete_expense(store.as_ref(), &msg.0).await })
    }
}

impl Handler<Recalculate> for LedgerKeeper {
    type Result = AtomicResponse<Self, Result<Vec<Participant>, LedgerError>>;

    fn handle(&mut self, _: Recalculate, _: &mut Context<Self>) -> Self::Result {
        let store = self.store.clone();
        self.serialized(async move {
            let participants = store.load_participants().await?;
            let expenses = store.load_expenses().await?;
            rebalance(store.as_ref(), participants, &expenses).await
        })
    }
}

fn validate_profile(profile: &NewParticipant) -> Result<(), LedgerError> {
    if profile.display_name.trim().is_empty() {
        return Err(LedgerError::MissingField("display_name"));
    }
    Ok(())
}

fn validate_draft(draft: &ExpenseDraft) -> Result<(), LedgerError> {
    if draft.payer_id.trim().is_empty() {
        return Err(LedgerError::MissingField("payer_id"));
    }
    if draft.description.trim().is_empty() {
        return Err(LedgerError::MissingField("description"));
    }
    if draft.amount <= Decimal::ZERO || draft.amount > Decimal::from(MAX_AMOUNT) {
        return Err(LedgerError::InvalidAmount(draft.amount));
    }
    Ok(())
}

fn ensure_payer(participants: &[Participant], payer_id: &str) -> Result<(), LedgerError> {
    if participants.iter().any(|p| p.id == payer_id) {
        Ok(())
    } else {
        Err(LedgerError::UnknownPayer(payer_id.to_string()))
    }
}

async fn rebalance(
    store: &dyn LedgerStore,
    participants: Vec<Participant>,
    expenses: &[Expense],
) -> Result<Vec<Participant>, LedgerError> {
    let participants = recompute_balances(participants, expenses)?;
    store.save_participants(&participants).await?;
    log_totals(&participants, expenses.len());
    Ok(participants)
}

// Balances are computed before either collection is written, so a failed
// recompute leaves the store untouched.
async fn commit_expenses(
    store: &dyn LedgerStore,
    participants: Vec<Participant>,
    expenses: &[Expense],
) -> Result<Vec<Participant>, LedgerError> {
    let participants = recompute_balances(participants, expenses)?;
    store.save_expenses(expenses).await?;
    store.save_participants(&participants).await?;
    log_totals(&participants, expenses.len());
    Ok(participants)
}

fn log_totals(participants: &[Participant], expenses: usize) {
    if let Some((owed, receivable)) = totals(participants) {
        tracing::debug!(
            participants = participants.len(),
            expenses,
            %owed,
            %receivable,
            "balances recomputed"
        );
    }
}

async fn add_participant(
    store: &dyn LedgerStore,
    profile: NewParticipant,
) -> Result<Participant, LedgerError> {
    validate_profile(&profile)?;
    let mut participants = store.load_participants().await?;
    let participant = Participant::new(profile);
    participants.push(participant.clone());

    let expenses = store.load_expenses().await?;
    let participants = rebalance(store, participants, &expenses).await?;
    tracing::info!(
        participant = %participant.id,
        roster = participants.len(),
        "participant added"
    );
    Ok(participants
        .into_iter()
        .find(|p| p.id == participant.id)
        .unwrap_or(participant))
}

async fn add_expense(
    store: &dyn LedgerStore,
    notifier: &dyn Notifier,
    draft: ExpenseDraft,
) -> Result<Expense, LedgerError> {
    validate_draft(&draft)?;
    let participants = store.load_participants().await?;
    ensure_payer(&participants, &draft.payer_id)?;

    let mut expenses = store.load_expenses().await?;
    let expense = Expense::new(draft);
    expenses.push(expense.clone());

    let participants = commit_expenses(store, participants, &expenses).await?;
    tracing::info!(expense = %expense.id, amount = %expense.amount, "expense added");
    notifier.expense_recorded(&expense, &participants);
    Ok(expense)
}

async fn edit_expense(
    store: &dyn LedgerStore,
    id: &str,
    draft: ExpenseDraft,
) -> Result<Expense, LedgerError> {
    validate_draft(&draft)?;
    let participants = store.load_participants().await?;
    ensure_payer(&participants, &draft.payer_id)?;

    let mut expenses = store.load_expenses().await?;
    let expense = expenses
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| LedgerError::ExpenseNotFound(id.to_string()))?;
    expense.apply(draft);
    let edited = expense.clone();

    commit_expenses(store, participants, &expenses).await?;
    tracing::info!(expense = %edited.id, amount = %edited.amount, "expense updated");
    Ok(edited)
}

async fn delete_expense(store: &dyn LedgerStore, id: &str) -> Result<(), LedgerError> {
    let mut expenses = store.load_expenses().await?;
    let index = expenses
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| LedgerError::ExpenseNotFound(id.to_string()))?;
    expenses.remove(index);

    let participants = store.load_participants().await?;
    commit_expenses(store, participants, &expenses).await?;
    tracing::info!(expense = %id, "expense deleted");
    Ok(())
}
