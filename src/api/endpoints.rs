//! REST paths consumed by the hooks.

use url::form_urlencoded;

use crate::cache::{Id, Param};

/// Append a query string. Absent parameters are sent with an empty value.
fn with_query(path: &str, params: &[(&str, &Param)]) -> String {
  let mut query = form_urlencoded::Serializer::new(String::new());
  for (name, value) in params {
    query.append_pair(name, &value.to_string());
  }
  format!("{}?{}", path, query.finish())
}

pub fn branches() -> String {
  "/branches".to_string()
}

pub fn branch(id: &Id) -> String {
  format!("/branches/{}", id)
}

pub fn users(branch_id: &Param) -> String {
  with_query("/users", &[("branchId", branch_id)])
}

pub fn courses(branch_id: &Param) -> String {
  with_query("/courses", &[("branchId", branch_id)])
}

pub fn course(id: &Id) -> String {
  format!("/courses/{}", id)
}

/// Collection path for course writes.
pub fn course_collection() -> String {
  "/courses".to_string()
}

pub fn groups(branch_id: &Param) -> String {
  with_query("/groups", &[("branchId", branch_id)])
}

pub fn group_collection() -> String {
  "/groups".to_string()
}

/// Write path for a single group.
pub fn group_item(id: &Id) -> String {
  format!("/groups/{}", id)
}

pub fn group(id: &Id, year: &Param, month: &Param) -> String {
  with_query(
    &format!("/groups/{}", id),
    &[("year", year), ("month", month)],
  )
}

pub fn groups_by_course(course_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/groups/by-course",
    &[("courseId", course_id), ("year", year), ("month", month)],
  )
}

pub fn group_student(group_id: &Id, student_id: &Id) -> String {
  format!("/groups/{}/students/{}", group_id, student_id)
}

pub fn students(branch_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/students",
    &[("branchId", branch_id), ("year", year), ("month", month)],
  )
}

pub fn student_collection() -> String {
  "/students".to_string()
}

pub fn student_item(id: &Id) -> String {
  format!("/students/{}", id)
}

pub fn student(id: &Id, year: &Param, month: &Param) -> String {
  with_query(
    &format!("/students/{}", id),
    &[("year", year), ("month", month)],
  )
}

pub fn payment_history(student_id: &Id) -> String {
  format!("/students/{}/payment-history", student_id)
}

pub fn teachers(branch_id: &Param) -> String {
  with_query("/teachers", &[("branchId", branch_id)])
}

pub fn teacher_collection() -> String {
  "/teachers".to_string()
}

pub fn teacher(id: &Id) -> String {
  format!("/teachers/{}", id)
}

pub fn payments(branch_id: &Param) -> String {
  with_query("/payments", &[("branchId", branch_id)])
}

pub fn payment_collection() -> String {
  "/payments".to_string()
}

pub fn payment(id: &Id) -> String {
  format!("/payments/{}", id)
}

pub fn payments_by_month(branch_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/payments/by-month",
    &[("branchId", branch_id), ("year", year), ("month", month)],
  )
}

pub fn unpaid_students(branch_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/payments/unpaid",
    &[("branchId", branch_id), ("year", year), ("month", month)],
  )
}

pub fn expenses(branch_id: &Param) -> String {
  with_query("/expenses", &[("branchId", branch_id)])
}

pub fn expense_collection() -> String {
  "/expenses".to_string()
}

pub fn expense(id: &Id) -> String {
  format!("/expenses/{}", id)
}

pub fn expense_reports(branch_id: &Param) -> String {
  with_query("/reports/expenses", &[("branchId", branch_id)])
}

pub fn calculate_salary(teacher_id: &Id) -> String {
  format!("/salaries/calculate/teacher/{}", teacher_id)
}

pub fn mark_salary_paid(salary_id: &Id) -> String {
  format!("/salaries/{}/mark-paid", salary_id)
}

pub fn teacher_salary_history(teacher_id: &Id) -> String {
  format!("/salaries/teacher/{}/history", teacher_id)
}

pub fn salary_history_branch(branch_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/salaries/branch",
    &[("branchId", branch_id), ("year", year), ("month", month)],
  )
}

pub fn salary_reports(branch_id: &Param) -> String {
  with_query("/reports/salaries", &[("branchId", branch_id)])
}

pub fn financial_summary(branch_id: &Param, year: &Param, month: &Param) -> String {
  with_query(
    "/reports/financial/summary",
    &[("branchId", branch_id), ("year", year), ("month", month)],
  )
}
