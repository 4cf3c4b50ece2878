use serde_json::Value;

use crate::api::endpoints;
use crate::api::types::{with_branch, Payment, PaymentInput, Student};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, InvalidationContext, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, post, put, Update};

/// Identifies a payment to delete, with the student and period it was for.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRef {
  pub id: Id,
  pub student_id: Id,
  pub year: Option<i32>,
  pub month: Option<u32>,
}

pub fn use_payments(session: &Session) -> Query<Vec<Payment>> {
  branch_query(session, keys::payments, endpoints::payments)
}

pub fn use_payments_by_month(
  session: &Session,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Vec<Payment>> {
  let (year, month) = (Param::from(year), Param::from(month));
  branch_query(
    session,
    |branch| keys::payments_by_month(branch, year.clone(), month.clone()),
    |branch| endpoints::payments_by_month(branch, &year, &month),
  )
}

pub fn use_unpaid_students(
  session: &Session,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Vec<Student>> {
  let (year, month) = (Param::from(year), Param::from(month));
  branch_query(
    session,
    |branch| keys::unpaid_students(branch, year.clone(), month.clone()),
    |branch| endpoints::unpaid_students(branch, &year, &month),
  )
}

fn payment_scope(input: &PaymentInput, ctx: &mut InvalidationContext) {
  ctx.student = input.student_id.as_ref().map(Param::from);
  ctx.year = Some(Param::from(input.year));
  ctx.month = Some(Param::from(input.month));
}

pub fn use_create_payment(
  session: &Session,
  options: MutationOptions<PaymentInput, Payment>,
) -> Mutation<PaymentInput, Payment> {
  session
    .mutation(
      Entity::Payment,
      MutationKind::Create,
      options,
      |session, input: &PaymentInput| {
        post(
          session,
          endpoints::payment_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(PaymentInput::validate)
    .with_scope(|input, _, ctx| payment_scope(input, ctx))
    .with_messages("Recording payment...", "Payment recorded")
}

pub fn use_update_payment(
  session: &Session,
  options: MutationOptions<Update<PaymentInput>, Payment>,
) -> Mutation<Update<PaymentInput>, Payment> {
  session
    .mutation(
      Entity::Payment,
      MutationKind::Update,
      options,
      |session, update: &Update<PaymentInput>| {
        put(
          session,
          endpoints::payment(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_scope(|update, _, ctx| payment_scope(&update.data, ctx))
    .with_messages("Updating payment...", "Payment updated")
}

pub fn use_delete_payment(
  session: &Session,
  options: MutationOptions<PaymentRef, Value>,
) -> Mutation<PaymentRef, Value> {
  session
    .mutation(
      Entity::Payment,
      MutationKind::Delete,
      options,
      |session, payment: &PaymentRef| delete(session, endpoints::payment(&payment.id)),
    )
    .with_scope(|payment, _, ctx| {
      ctx.student = Some(Param::from(&payment.student_id));
      ctx.year = payment.year.map(Param::from);
      ctx.month = payment.month.map(Param::from);
    })
    .with_messages("Deleting payment...", "Payment deleted")
}
