//! Query key registry: the single place where cache keys are built.

use super::key::{Param, QueryKey, Resource};

fn key(resource: Resource, params: Vec<Param>) -> QueryKey {
  QueryKey::new(resource, params)
}

pub fn branches() -> QueryKey {
  key(Resource::Branches, Vec::new())
}

pub fn branch(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Branch, vec![branch_id.into()])
}

pub fn users(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Users, vec![branch_id.into()])
}

pub fn courses(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Courses, vec![branch_id.into()])
}

pub fn course(course_id: impl Into<Param>) -> QueryKey {
  key(Resource::Course, vec![course_id.into()])
}

pub fn groups(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Groups, vec![branch_id.into()])
}

pub fn group(
  group_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::Group,
    vec![group_id.into(), year.into(), month.into()],
  )
}

pub fn groups_by_course(
  course_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::GroupsByCourse,
    vec![course_id.into(), year.into(), month.into()],
  )
}

pub fn students(
  branch_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::Students,
    vec![branch_id.into(), year.into(), month.into()],
  )
}

pub fn student(
  student_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::Student,
    vec![student_id.into(), year.into(), month.into()],
  )
}

pub fn payment_history(student_id: impl Into<Param>) -> QueryKey {
  key(Resource::PaymentHistory, vec![student_id.into()])
}

pub fn teachers(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Teachers, vec![branch_id.into()])
}

pub fn teacher(teacher_id: impl Into<Param>) -> QueryKey {
  key(Resource::Teacher, vec![teacher_id.into()])
}

pub fn payments(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Payments, vec![branch_id.into()])
}

pub fn payments_by_month(
  branch_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::PaymentsByMonth,
    vec![branch_id.into(), year.into(), month.into()],
  )
}

pub fn unpaid_students(
  branch_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::UnpaidStudents,
    vec![branch_id.into(), year.into(), month.into()],
  )
}

pub fn expenses(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::Expenses, vec![branch_id.into()])
}

pub fn expense_reports(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::ExpenseReports, vec![branch_id.into()])
}

pub fn financial_summary(
  branch_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::FinancialSummary,
    vec![branch_id.into(), year.into(), month.into()],
  )
}

pub fn teacher_salary_history(teacher_id: impl Into<Param>) -> QueryKey {
  key(Resource::TeacherSalaryHistory, vec![teacher_id.into()])
}

pub fn salary_history_branch(
  branch_id: impl Into<Param>,
  year: impl Into<Param>,
  month: impl Into<Param>,
) -> QueryKey {
  key(
    Resource::SalaryHistoryBranch,
    vec![branch_id.into(), year.into(), month.into()],
  )
}

pub fn salary_reports(branch_id: impl Into<Param>) -> QueryKey {
  key(Resource::SalaryReports, vec![branch_id.into()])
}
