//! Domain models returned by the admin API and the inputs sent to it.
//!
//! Field names follow the API's camelCase JSON. Optional fields default so a
//! list endpoint that omits details still decodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Id;
use crate::error::{Error, Result};

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
  pub id: Id,
  pub name: String,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: Id,
  pub username: String,
  #[serde(default)]
  pub full_name: Option<String>,
  #[serde(default)]
  pub role: Option<String>,
  #[serde(default)]
  pub branch_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
  pub id: Id,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub price: Option<f64>,
  #[serde(default)]
  pub duration_months: Option<u32>,
  #[serde(default)]
  pub branch_id: Option<Id>,
  /// Number of groups running this course
  #[serde(default)]
  pub group_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub id: Id,
  pub name: String,
  #[serde(default)]
  pub course_id: Option<Id>,
  #[serde(default)]
  pub course_name: Option<String>,
  #[serde(default)]
  pub teacher_id: Option<Id>,
  #[serde(default)]
  pub teacher_name: Option<String>,
  #[serde(default)]
  pub branch_id: Option<Id>,
  #[serde(default)]
  pub days: Vec<String>,
  #[serde(default)]
  pub start_time: Option<String>,
  #[serde(default)]
  pub end_time: Option<String>,
  #[serde(default)]
  pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
  pub id: Id,
  pub first_name: String,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub salary_percentage: Option<f64>,
  #[serde(default)]
  pub branch_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id: Id,
  pub first_name: String,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub parent_phone: Option<String>,
  #[serde(default)]
  pub branch_id: Option<Id>,
  #[serde(default)]
  pub group_ids: Vec<Id>,
  /// Payment status for the requested month, when the list was queried by month
  #[serde(default)]
  pub payment_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: Id,
  pub student_id: Id,
  #[serde(default)]
  pub group_id: Option<Id>,
  pub amount: f64,
  pub year: i32,
  pub month: u32,
  #[serde(default)]
  pub method: Option<String>,
  #[serde(default)]
  pub paid_at: Option<String>,
  #[serde(default)]
  pub branch_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
  pub id: Id,
  pub category: String,
  pub amount: f64,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub date: Option<String>,
  #[serde(default)]
  pub branch_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryCalculation {
  pub id: Id,
  pub teacher_id: Id,
  pub year: i32,
  pub month: u32,
  pub amount: f64,
  #[serde(default)]
  pub is_paid: bool,
  #[serde(default)]
  pub branch_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
  #[serde(default)]
  pub total_income: f64,
  #[serde(default)]
  pub total_expenses: f64,
  #[serde(default)]
  pub total_salaries: f64,
  #[serde(default)]
  pub net_profit: f64,
}

fn default_true() -> bool {
  true
}

// ============================================================================
// Inputs
// ============================================================================

fn require_text(field: &'static str, value: &str, label: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, format!("{} is required", label)));
  }
  Ok(())
}

fn require_positive(field: &'static str, value: f64, label: &str) -> Result<()> {
  if !(value > 0.0) {
    return Err(Error::validation(
      field,
      format!("{} must be greater than zero", label),
    ));
  }
  Ok(())
}

fn require_month(month: u32) -> Result<()> {
  if !(1..=12).contains(&month) {
    return Err(Error::validation("month", "Month must be between 1 and 12"));
  }
  Ok(())
}

/// Serialize an input and attach the active branch id.
pub fn with_branch<T: Serialize>(input: &T, branch_id: Option<&Id>) -> Result<Value> {
  let mut body = serde_json::to_value(input)?;
  if let (Some(branch_id), Value::Object(map)) = (branch_id, &mut body) {
    map.insert("branchId".to_string(), serde_json::to_value(branch_id)?);
  }
  Ok(body)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInput {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

impl BranchInput {
  pub fn validate(&self) -> Result<()> {
    require_text("name", &self.name, "Branch name")
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_months: Option<u32>,
}

impl CourseInput {
  pub fn validate(&self) -> Result<()> {
    require_text("name", &self.name, "Course name")?;
    if let Some(price) = self.price {
      if price < 0.0 {
        return Err(Error::validation("price", "Price cannot be negative"));
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInput {
  pub name: String,
  pub course_id: Option<Id>,
  pub teacher_id: Option<Id>,
  #[serde(default)]
  pub days: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end_time: Option<String>,
}

impl GroupInput {
  pub fn validate(&self) -> Result<()> {
    require_text("name", &self.name, "Group name")?;
    if self.course_id.is_none() {
      return Err(Error::validation("courseId", "Course is required"));
    }
    if self.teacher_id.is_none() {
      return Err(Error::validation("teacherId", "Teacher is required"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherInput {
  pub first_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  pub phone: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salary_percentage: Option<f64>,
}

impl TeacherInput {
  pub fn validate(&self) -> Result<()> {
    require_text("firstName", &self.first_name, "First name")?;
    require_text("phone", &self.phone, "Phone number")?;
    if let Some(pct) = self.salary_percentage {
      if !(0.0..=100.0).contains(&pct) {
        return Err(Error::validation(
          "salaryPercentage",
          "Salary percentage must be between 0 and 100",
        ));
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
  pub first_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  pub phone: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_phone: Option<String>,
  #[serde(default)]
  pub group_ids: Vec<Id>,
}

impl StudentInput {
  pub fn validate(&self) -> Result<()> {
    require_text("firstName", &self.first_name, "First name")?;
    require_text("phone", &self.phone, "Phone number")
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
  pub student_id: Option<Id>,
  pub group_id: Option<Id>,
  pub amount: f64,
  pub year: i32,
  pub month: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
}

impl PaymentInput {
  pub fn validate(&self) -> Result<()> {
    if self.student_id.is_none() {
      return Err(Error::validation("studentId", "Student is required"));
    }
    if self.group_id.is_none() {
      return Err(Error::validation("groupId", "Group is required"));
    }
    require_positive("amount", self.amount, "Amount")?;
    require_month(self.month)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
  pub category: String,
  pub amount: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
}

impl ExpenseInput {
  pub fn validate(&self) -> Result<()> {
    require_text("category", &self.category, "Category")?;
    require_positive("amount", self.amount, "Amount")
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryPeriod {
  pub year: i32,
  pub month: u32,
}

impl SalaryPeriod {
  pub fn validate(&self) -> Result<()> {
    require_month(self.month)
  }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Read an id field from a response payload, looking at `name` and at a
/// nested `{ "<object>": { "id": .. } }` form (e.g. `courseId` or `course.id`).
pub fn response_id(payload: &Value, name: &str) -> Option<Id> {
  if let Some(v) = payload.get(name) {
    if let Ok(id) = serde_json::from_value::<Id>(v.clone()) {
      return Some(id);
    }
  }
  let object = name.strip_suffix("Id")?;
  let nested = payload.get(object)?.get("id")?;
  serde_json::from_value::<Id>(nested.clone()).ok()
}

/// Read an id list from a response payload, looking at `name` and at the
/// matching object array (e.g. `groupIds` or `groups: [{ "id": .. }]`).
pub fn response_ids(payload: &Value, name: &str) -> Option<Vec<Id>> {
  if let Some(v) = payload.get(name) {
    if let Ok(ids) = serde_json::from_value::<Vec<Id>>(v.clone()) {
      return Some(ids);
    }
  }
  let objects = format!("{}s", name.strip_suffix("Ids")?);
  payload
    .get(objects.as_str())?
    .as_array()?
    .iter()
    .map(|object| response_id(object, "id"))
    .collect()
}
