//! Query keys and invalidation patterns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque entity identifier. The backend uses numeric ids for most entities
/// but some (users) are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
  Int(i64),
  Str(String),
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Id::Int(n) => write!(f, "{}", n),
      Id::Str(s) => f.write_str(s),
    }
  }
}

impl From<i64> for Id {
  fn from(n: i64) -> Self {
    Id::Int(n)
  }
}

impl From<i32> for Id {
  fn from(n: i32) -> Self {
    Id::Int(n.into())
  }
}

impl From<u32> for Id {
  fn from(n: u32) -> Self {
    Id::Int(n.into())
  }
}

impl From<&str> for Id {
  fn from(s: &str) -> Self {
    // Ids read back from session storage come in as strings
    s.parse::<i64>()
      .map(Id::Int)
      .unwrap_or_else(|_| Id::Str(s.to_string()))
  }
}

impl From<String> for Id {
  fn from(s: String) -> Self {
    Id::from(s.as_str())
  }
}

/// A single position of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
  Int(i64),
  Str(String),
  /// Parameter not chosen yet (e.g. no month selected). Distinct from any value.
  Absent,
}

impl fmt::Display for Param {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Param::Int(n) => write!(f, "{}", n),
      Param::Str(s) => f.write_str(s),
      Param::Absent => Ok(()),
    }
  }
}

impl From<Id> for Param {
  fn from(id: Id) -> Self {
    match id {
      Id::Int(n) => Param::Int(n),
      Id::Str(s) => Param::Str(s),
    }
  }
}

impl From<&Id> for Param {
  fn from(id: &Id) -> Self {
    id.clone().into()
  }
}

impl From<i64> for Param {
  fn from(n: i64) -> Self {
    Param::Int(n)
  }
}

impl From<i32> for Param {
  fn from(n: i32) -> Self {
    Param::Int(n.into())
  }
}

impl From<u32> for Param {
  fn from(n: u32) -> Self {
    Param::Int(n.into())
  }
}

impl From<&str> for Param {
  fn from(s: &str) -> Self {
    Param::Str(s.to_string())
  }
}

impl<T: Into<Param>> From<Option<T>> for Param {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(Param::Absent)
  }
}

/// Every cached resource the console reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
  Branches,
  Branch,
  Users,
  Courses,
  Course,
  Groups,
  Group,
  GroupsByCourse,
  Students,
  Student,
  PaymentHistory,
  Teachers,
  Teacher,
  Payments,
  PaymentsByMonth,
  UnpaidStudents,
  Expenses,
  ExpenseReports,
  FinancialSummary,
  TeacherSalaryHistory,
  SalaryHistoryBranch,
  SalaryReports,
}

impl Resource {
  pub fn name(&self) -> &'static str {
    match self {
      Resource::Branches => "branches",
      Resource::Branch => "branch",
      Resource::Users => "users",
      Resource::Courses => "courses",
      Resource::Course => "course",
      Resource::Groups => "groups",
      Resource::Group => "group",
      Resource::GroupsByCourse => "groups-by-course",
      Resource::Students => "students",
      Resource::Student => "student",
      Resource::PaymentHistory => "payment-history",
      Resource::Teachers => "teachers",
      Resource::Teacher => "teacher",
      Resource::Payments => "payments",
      Resource::PaymentsByMonth => "payments-by-month",
      Resource::UnpaidStudents => "unpaid-students",
      Resource::Expenses => "expenses",
      Resource::ExpenseReports => "expense-reports",
      Resource::FinancialSummary => "financial-summary",
      Resource::TeacherSalaryHistory => "teacher-salary-history",
      Resource::SalaryHistoryBranch => "salary-history-branch",
      Resource::SalaryReports => "salary-reports",
    }
  }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Canonical identifier of a cached read: resource name plus ordered params.
///
/// Equality is by value over the resource and every parameter, in order.
/// Build keys through [`crate::cache::keys`] so parameter order stays the
/// same across call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  resource: Resource,
  params: Vec<Param>,
}

impl QueryKey {
  pub fn new(resource: Resource, params: Vec<Param>) -> Self {
    Self { resource, params }
  }

  pub fn resource(&self) -> Resource {
    self.resource
  }

  pub fn params(&self) -> &[Param] {
    &self.params
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.resource)?;
    if !self.params.is_empty() {
      let params: Vec<String> = self
        .params
        .iter()
        .map(|p| match p {
          Param::Absent => "-".to_string(),
          other => other.to_string(),
        })
        .collect();
      write!(f, "({})", params.join(","))?;
    }
    Ok(())
  }
}

/// A query key template. `None` positions are wildcards, and positions past
/// the end of the pattern are wildcards too, so `groups-by-course(7)` matches
/// `groups-by-course(7, 2024, 5)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
  resource: Resource,
  params: Vec<Option<Param>>,
}

impl KeyPattern {
  /// Every key of a resource.
  pub fn all(resource: Resource) -> Self {
    Self {
      resource,
      params: Vec::new(),
    }
  }

  /// Exactly one key.
  pub fn exact(key: &QueryKey) -> Self {
    Self {
      resource: key.resource,
      params: key.params.iter().cloned().map(Some).collect(),
    }
  }

  pub fn new(resource: Resource, params: Vec<Option<Param>>) -> Self {
    Self { resource, params }
  }

  /// Append a fixed position.
  pub fn param(mut self, value: impl Into<Param>) -> Self {
    self.params.push(Some(value.into()));
    self
  }

  /// Append a wildcard position.
  pub fn any(mut self) -> Self {
    self.params.push(None);
    self
  }

  pub fn resource(&self) -> Resource {
    self.resource
  }

  pub fn matches(&self, key: &QueryKey) -> bool {
    if self.resource != key.resource {
      return false;
    }
    self.params.iter().enumerate().all(|(i, slot)| match slot {
      None => true,
      Some(expected) => key.params.get(i) == Some(expected),
    })
  }
}

impl From<&QueryKey> for KeyPattern {
  fn from(key: &QueryKey) -> Self {
    KeyPattern::exact(key)
  }
}

impl From<QueryKey> for KeyPattern {
  fn from(key: QueryKey) -> Self {
    KeyPattern::exact(&key)
  }
}

impl fmt::Display for KeyPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.resource)?;
    let params: Vec<String> = self
      .params
      .iter()
      .map(|p| match p {
        None => "*".to_string(),
        Some(Param::Absent) => "-".to_string(),
        Some(v) => v.to_string(),
      })
      .collect();
    write!(f, "({})", params.join(","))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  fn key(resource: Resource, params: Vec<Param>) -> QueryKey {
    QueryKey::new(resource, params)
  }

  #[test]
  fn test_keys_equal_by_value() {
    let a = key(Resource::Group, vec![12.into(), 2024.into(), 5.into()]);
    let b = key(Resource::Group, vec![12.into(), 2024.into(), 5.into()]);
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
  }

  #[test]
  fn test_keys_differ_when_any_param_differs() {
    let base = key(Resource::Group, vec![12.into(), 2024.into(), 5.into()]);
    assert_ne!(base, key(Resource::Group, vec![13.into(), 2024.into(), 5.into()]));
    assert_ne!(base, key(Resource::Group, vec![12.into(), 2023.into(), 5.into()]));
    assert_ne!(base, key(Resource::Group, vec![12.into(), 2024.into(), Param::Absent]));
    assert_ne!(base, key(Resource::Student, vec![12.into(), 2024.into(), 5.into()]));
  }

  #[test]
  fn test_param_order_is_identity() {
    let a = key(Resource::Students, vec![3.into(), 2024.into(), 5.into()]);
    let b = key(Resource::Students, vec![3.into(), 5.into(), 2024.into()]);
    assert_ne!(a, b);
  }

  #[test]
  fn test_int_and_string_ids_are_distinct() {
    assert_ne!(Param::Int(7), Param::Str("7".into()));
    assert_eq!(Id::from("7"), Id::Int(7));
    assert_eq!(Id::from("abc"), Id::Str("abc".into()));
  }

  #[test]
  fn test_pattern_wildcards() {
    let pattern = KeyPattern::all(Resource::GroupsByCourse).param(7).any().any();
    assert!(pattern.matches(&key(
      Resource::GroupsByCourse,
      vec![7.into(), 2024.into(), 5.into()]
    )));
    assert!(pattern.matches(&key(
      Resource::GroupsByCourse,
      vec![7.into(), Param::Absent, Param::Absent]
    )));
    assert!(!pattern.matches(&key(
      Resource::GroupsByCourse,
      vec![9.into(), 2024.into(), 5.into()]
    )));
    assert!(!pattern.matches(&key(Resource::Course, vec![7.into()])));
  }

  #[test]
  fn test_short_pattern_is_prefix() {
    let pattern = KeyPattern::all(Resource::FinancialSummary).param(3);
    assert!(pattern.matches(&key(
      Resource::FinancialSummary,
      vec![3.into(), 2024.into(), 5.into()]
    )));
    assert!(!pattern.matches(&key(
      Resource::FinancialSummary,
      vec![4.into(), 2024.into(), 5.into()]
    )));
  }

  #[test]
  fn test_exact_pattern() {
    let k = key(Resource::Course, vec![7.into()]);
    let pattern = KeyPattern::exact(&k);
    assert!(pattern.matches(&k));
    assert!(!pattern.matches(&key(Resource::Course, vec![9.into()])));
  }

  #[test]
  fn test_display() {
    let k = key(Resource::Student, vec![42.into(), 2024.into(), Param::Absent]);
    assert_eq!(k.to_string(), "student(42,2024,-)");
    let p = KeyPattern::all(Resource::Students).param(3).any();
    assert_eq!(p.to_string(), "students(3,*)");
  }
}
