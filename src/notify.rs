use crate::schemas::{Expense, Participant};

/// Fired after an expense is recorded. Must not fail the mutation.
pub trait Notifier: Send + Sync {
    fn expense_recorded(&self, expense: &Expense, recipients: &[Participant]);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn expense_recorded(&self, expense: &Expense, recipients: &[Participant]) {
        let addresses = recipients
            .iter()
            .map(|p| p.contact_address.as_str())
            .filter(|address| !address.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            expense = %expense.id,
            payer = %expense.payer_id,
            amount = %expense.amount,
            description = %expense.description,
            recipients = %addresses,
            "new expense recorded"
        );
    }
}
