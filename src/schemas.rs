use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ParticipantId = String;
pub type ExpenseId = String;

// `owed` and `receivable` are only ever written by the balance engine.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub owed: Decimal,
    pub receivable: Decimal,
    pub contact_address: String,
}

impl Participant {
    pub fn new(profile: NewParticipant) -> Self {
        Participant {
            id: new_id(),
            display_name: profile.display_name,
            owed: Decimal::ZERO,
            receivable: Decimal::ZERO,
            contact_address: profile.contact_address,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub payer_id: ParticipantId,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(draft: ExpenseDraft) -> Self {
        Expense {
            id: new_id(),
            payer_id: draft.payer_id,
            description: draft.description,
            amount: draft.amount,
            created_at: Utc::now(),
        }
    }

    /// Overwrites the editable fields, keeping id and creation time.
    pub fn apply(&mut self, draft: ExpenseDraft) {
        self.payer_id = draft.payer_id;
        self.description = draft.description;
        self.amount = draft.amount;
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewParticipant {
    pub display_name: String,
    #[serde(default)]
    pub contact_address: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseDraft {
    pub payer_id: ParticipantId,
    pub description: String,
    pub amount: Decimal,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
