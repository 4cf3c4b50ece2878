use serde_json::{json, Value};

use crate::api::endpoints;
use crate::api::types::{response_id, SalaryCalculation, SalaryPeriod};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, item_query, post, put};

/// Variables for a salary calculation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryRequest {
  pub teacher_id: Id,
  pub period: SalaryPeriod,
}

pub fn use_teacher_salary_history(
  session: &Session,
  teacher_id: Option<&Id>,
) -> Query<Vec<SalaryCalculation>> {
  item_query(
    session,
    teacher_id,
    keys::teacher_salary_history,
    endpoints::teacher_salary_history,
  )
}

pub fn use_branch_salary_history(
  session: &Session,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Vec<SalaryCalculation>> {
  let (year, month) = (Param::from(year), Param::from(month));
  branch_query(
    session,
    |branch| keys::salary_history_branch(branch, year.clone(), month.clone()),
    |branch| endpoints::salary_history_branch(branch, &year, &month),
  )
}

pub fn use_salary_reports(session: &Session) -> Query<Value> {
  branch_query(session, keys::salary_reports, endpoints::salary_reports)
}

pub fn use_calculate_salary(
  session: &Session,
  options: MutationOptions<SalaryRequest, SalaryCalculation>,
) -> Mutation<SalaryRequest, SalaryCalculation> {
  session
    .mutation(
      Entity::SalaryCalculation,
      MutationKind::Create,
      options,
      |session, request: &SalaryRequest| {
        post(
          session,
          endpoints::calculate_salary(&request.teacher_id),
          serde_json::to_value(&request.period).map_err(Into::into),
        )
      },
    )
    .with_validation(|request| request.period.validate())
    .with_scope(|request, _, ctx| {
      ctx.teacher = Some(Param::from(&request.teacher_id));
      ctx.year = Some(Param::from(request.period.year));
      ctx.month = Some(Param::from(request.period.month));
    })
    .with_messages("Calculating salary...", "Salary calculated")
}

/// Mark a calculated salary as paid. Teacher and period come from the response.
pub fn use_mark_salary_paid(
  session: &Session,
  options: MutationOptions<Id, SalaryCalculation>,
) -> Mutation<Id, SalaryCalculation> {
  session
    .mutation(
      Entity::SalaryCalculation,
      MutationKind::Update,
      options,
      |session, id: &Id| put(session, endpoints::mark_salary_paid(id), Ok(json!({}))),
    )
    .with_scope(|_, payload, ctx| {
      ctx.teacher = response_id(payload, "teacherId").map(Param::from);
      ctx.year = payload.get("year").and_then(Value::as_i64).map(Param::Int);
      ctx.month = payload.get("month").and_then(Value::as_i64).map(Param::Int);
    })
    .with_message_id("salary:mark-paid")
    .with_messages("Marking salary as paid...", "Salary marked as paid")
}
