use serde_json::Value;

use crate::api::endpoints;
use crate::api::types::{with_branch, Expense, ExpenseInput};
use crate::cache::{keys, Id};
use crate::graph::{Entity, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, post, put, Update};

pub fn use_expenses(session: &Session) -> Query<Vec<Expense>> {
  branch_query(session, keys::expenses, endpoints::expenses)
}

/// Expense totals by category. The report shape is left to the caller.
pub fn use_expense_reports(session: &Session) -> Query<Value> {
  branch_query(session, keys::expense_reports, endpoints::expense_reports)
}

pub fn use_create_expense(
  session: &Session,
  options: MutationOptions<ExpenseInput, Expense>,
) -> Mutation<ExpenseInput, Expense> {
  session
    .mutation(
      Entity::Expense,
      MutationKind::Create,
      options,
      |session, input: &ExpenseInput| {
        post(
          session,
          endpoints::expense_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(ExpenseInput::validate)
    .with_messages("Recording expense...", "Expense recorded")
}

pub fn use_update_expense(
  session: &Session,
  options: MutationOptions<Update<ExpenseInput>, Expense>,
) -> Mutation<Update<ExpenseInput>, Expense> {
  session
    .mutation(
      Entity::Expense,
      MutationKind::Update,
      options,
      |session, update: &Update<ExpenseInput>| {
        put(
          session,
          endpoints::expense(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_messages("Updating expense...", "Expense updated")
}

pub fn use_delete_expense(
  session: &Session,
  options: MutationOptions<Id, Value>,
) -> Mutation<Id, Value> {
  session
    .mutation(
      Entity::Expense,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::expense(id)),
    )
    .with_messages("Deleting expense...", "Expense deleted")
}
