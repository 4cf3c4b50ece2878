use crate::api::endpoints;
use crate::api::types::FinancialSummary;
use crate::cache::{keys, Param};
use crate::query::Query;
use crate::session::Session;

use super::branch_query;

/// Income, expenses and salaries of the selected branch for a month.
pub fn use_financial_summary(
  session: &Session,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<FinancialSummary> {
  let (year, month) = (Param::from(year), Param::from(month));
  branch_query(
    session,
    |branch| keys::financial_summary(branch, year.clone(), month.clone()),
    |branch| endpoints::financial_summary(branch, &year, &month),
  )
}
