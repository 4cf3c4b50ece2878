//! Dependency graph: which cached queries a mutation can make stale.
//!
//! Each `(Entity, MutationKind)` maps to a fixed list of key templates. A
//! template names a resource and, per position, either a wildcard or a field
//! of the [`InvalidationContext`] collected from the mutation's variables and
//! the server's response.

use std::fmt;
use tracing::debug;

use crate::cache::{KeyPattern, Param, Resource};

/// Entity types the console can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
  Branch,
  Course,
  Group,
  Teacher,
  Student,
  Payment,
  Expense,
  SalaryCalculation,
}

impl Entity {
  pub fn name(&self) -> &'static str {
    match self {
      Entity::Branch => "branch",
      Entity::Course => "course",
      Entity::Group => "group",
      Entity::Teacher => "teacher",
      Entity::Student => "student",
      Entity::Payment => "payment",
      Entity::Expense => "expense",
      Entity::SalaryCalculation => "salary",
    }
  }
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
  /// Membership change, e.g. adding a student to a group
  RelationChange,
}

impl MutationKind {
  pub fn name(&self) -> &'static str {
    match self {
      MutationKind::Create => "create",
      MutationKind::Update => "update",
      MutationKind::Delete => "delete",
      MutationKind::RelationChange => "relation",
    }
  }
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Ids known about a mutation once it has succeeded.
///
/// Each slot has a primary value. A mutation that moves a record between
/// parents adds the other parent with [`also`](Self::also); one whose old
/// parent can't be determined marks the slot with [`widen`](Self::widen).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationContext {
  pub branch: Option<Param>,
  pub course: Option<Param>,
  pub group: Option<Param>,
  pub student: Option<Param>,
  pub teacher: Option<Param>,
  pub year: Option<Param>,
  pub month: Option<Param>,
  also: Vec<(Slot, Param)>,
  widened: Vec<Slot>,
}

impl InvalidationContext {
  pub fn for_branch(branch: Option<Param>) -> Self {
    Self {
      branch,
      ..Self::default()
    }
  }

  /// Add another id for `slot`. Fills the primary value when it is empty.
  pub fn also(&mut self, slot: Slot, value: impl Into<Param>) {
    let value = value.into();
    if slot == Slot::Any || value == Param::Absent {
      return;
    }
    match self.slot_mut(slot).clone() {
      None | Some(Param::Absent) => *self.slot_mut(slot) = Some(value),
      Some(current) if current == value => {}
      Some(_) => {
        if !self.also.contains(&(slot, value.clone())) {
          self.also.push((slot, value));
        }
      }
    }
  }

  /// Every id of `slot` may be affected: its templates match all ids and
  /// conditional templates on it still apply.
  pub fn widen(&mut self, slot: Slot) {
    if slot != Slot::Any && !self.widened.contains(&slot) {
      self.widened.push(slot);
    }
  }

  pub fn is_widened(&self, slot: Slot) -> bool {
    self.widened.contains(&slot)
  }

  fn slot_mut(&mut self, slot: Slot) -> &mut Option<Param> {
    match slot {
      // Any carries no value; callers filter it out first
      Slot::Any | Slot::Branch => &mut self.branch,
      Slot::Course => &mut self.course,
      Slot::Group => &mut self.group,
      Slot::Student => &mut self.student,
      Slot::Teacher => &mut self.teacher,
      Slot::Year => &mut self.year,
      Slot::Month => &mut self.month,
    }
  }

  fn value(&self, slot: Slot) -> Option<&Param> {
    let value = match slot {
      Slot::Any => None,
      Slot::Branch => self.branch.as_ref(),
      Slot::Course => self.course.as_ref(),
      Slot::Group => self.group.as_ref(),
      Slot::Student => self.student.as_ref(),
      Slot::Teacher => self.teacher.as_ref(),
      Slot::Year => self.year.as_ref(),
      Slot::Month => self.month.as_ref(),
    };
    value.filter(|p| **p != Param::Absent)
  }

  /// One context per extra id, each with that id as the primary value.
  fn variants(&self) -> Vec<InvalidationContext> {
    let mut variants = vec![self.clone()];
    for (slot, value) in &self.also {
      let mut variant = self.clone();
      *variant.slot_mut(*slot) = Some(value.clone());
      variants.push(variant);
    }
    variants
  }
}

/// A position in a key template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
  Any,
  Branch,
  Course,
  Group,
  Student,
  Teacher,
  Year,
  Month,
}

/// One invalidation target of a rule.
#[derive(Debug, Clone, Copy)]
pub struct Template {
  pub resource: Resource,
  pub slots: &'static [Slot],
  /// Only applies when this slot is known; otherwise the template is skipped.
  pub requires: Option<Slot>,
}

const fn on(resource: Resource, slots: &'static [Slot]) -> Template {
  Template {
    resource,
    slots,
    requires: None,
  }
}

const fn when(requires: Slot, resource: Resource, slots: &'static [Slot]) -> Template {
  Template {
    resource,
    slots,
    requires: Some(requires),
  }
}

use Slot::{Any, Branch, Course, Group, Month, Student, Teacher, Year};

const COURSE: &[Template] = &[
  on(Resource::Courses, &[Branch]),
  on(Resource::Course, &[Course]),
];

const GROUP: &[Template] = &[
  on(Resource::Groups, &[Branch]),
  on(Resource::Group, &[Group, Any, Any]),
  on(Resource::GroupsByCourse, &[Course, Any, Any]),
  on(Resource::Students, &[Branch, Any, Any]),
  on(Resource::Course, &[Course]),
];

const STUDENT_MEMBERSHIP: &[Template] = &[
  on(Resource::Group, &[Group, Any, Any]),
  on(Resource::Groups, &[Branch]),
  on(Resource::Students, &[Branch, Any, Any]),
  when(Course, Resource::Course, &[Course]),
  when(Course, Resource::GroupsByCourse, &[Course, Any, Any]),
];

const STUDENT: &[Template] = &[
  on(Resource::Students, &[Branch, Any, Any]),
  on(Resource::Student, &[Student, Any, Any]),
  on(Resource::Groups, &[Branch]),
  on(Resource::UnpaidStudents, &[Branch, Any, Any]),
  when(Group, Resource::Group, &[Group, Any, Any]),
];

const TEACHER: &[Template] = &[
  on(Resource::Teachers, &[Branch]),
  on(Resource::Teacher, &[Teacher]),
  on(Resource::Users, &[Branch]),
  on(Resource::Groups, &[Branch]),
];

const PAYMENT: &[Template] = &[
  on(Resource::Payments, &[Branch]),
  on(Resource::PaymentHistory, &[Student]),
  on(Resource::Students, &[Branch, Any, Any]),
  on(Resource::UnpaidStudents, &[Branch, Year, Month]),
  on(Resource::FinancialSummary, &[Branch]),
  on(Resource::PaymentsByMonth, &[Branch, Year, Month]),
];

const EXPENSE: &[Template] = &[
  on(Resource::Expenses, &[Branch]),
  on(Resource::FinancialSummary, &[Branch]),
  on(Resource::ExpenseReports, &[Branch]),
];

const SALARY: &[Template] = &[
  on(Resource::TeacherSalaryHistory, &[Teacher]),
  on(Resource::SalaryHistoryBranch, &[Branch, Year, Month]),
  on(Resource::SalaryReports, &[Branch]),
];

const BRANCH_CREATE: &[Template] = &[on(Resource::Branches, &[])];

// Branch id is a join key for nearly every list, so dependents go wholesale.
const BRANCH: &[Template] = &[
  on(Resource::Branches, &[]),
  on(Resource::Branch, &[Branch]),
  on(Resource::Users, &[]),
  on(Resource::Teachers, &[]),
  on(Resource::Students, &[]),
];

/// Static table from mutation events to invalidation templates.
pub struct DependencyGraph;

impl DependencyGraph {
  pub fn rules(entity: Entity, kind: MutationKind) -> &'static [Template] {
    use MutationKind::*;
    match (entity, kind) {
      (Entity::Course, _) => COURSE,
      (Entity::Group, _) => GROUP,
      (Entity::Student, RelationChange) => STUDENT_MEMBERSHIP,
      (Entity::Student, _) => STUDENT,
      (Entity::Teacher, _) => TEACHER,
      (Entity::Payment, _) => PAYMENT,
      (Entity::Expense, _) => EXPENSE,
      (Entity::SalaryCalculation, _) => SALARY,
      (Entity::Branch, Create) => BRANCH_CREATE,
      (Entity::Branch, _) => BRANCH,
    }
  }

  /// Resolve the patterns to invalidate for a successful mutation.
  ///
  /// Unknown ids widen to wildcards, except for templates that require a
  /// specific id, which are dropped unless the slot was explicitly widened.
  pub fn resolve(
    entity: Entity,
    kind: MutationKind,
    ctx: &InvalidationContext,
  ) -> Vec<KeyPattern> {
    let mut patterns = Vec::new();
    for variant in ctx.variants() {
      Self::resolve_into(entity, kind, &variant, &mut patterns);
    }
    patterns
  }

  fn resolve_into(
    entity: Entity,
    kind: MutationKind,
    ctx: &InvalidationContext,
    patterns: &mut Vec<KeyPattern>,
  ) {
    for template in Self::rules(entity, kind) {
      if let Some(required) = template.requires {
        if ctx.value(required).is_none() && !ctx.is_widened(required) {
          debug!(
            entity = %entity,
            kind = %kind,
            resource = %template.resource,
            slot = ?required,
            "required id unknown, skipping"
          );
          continue;
        }
      }

      let params = template
        .slots
        .iter()
        .map(|slot| {
          if ctx.is_widened(*slot) {
            return None;
          }
          let value = ctx.value(*slot).cloned();
          if value.is_none() && *slot != Any {
            debug!(
              entity = %entity,
              kind = %kind,
              resource = %template.resource,
              slot = ?slot,
              "unknown id, widening to wildcard"
            );
          }
          value
        })
        .collect();
      let pattern = KeyPattern::new(template.resource, params);
      if !patterns.contains(&pattern) {
        patterns.push(pattern);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::keys;

  fn ctx() -> InvalidationContext {
    InvalidationContext::for_branch(Some(3.into()))
  }

  fn names(patterns: &[KeyPattern]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
  }

  #[test]
  fn test_course_rules() {
    let mut c = ctx();
    c.course = Some(7.into());
    for kind in [
      MutationKind::Create,
      MutationKind::Update,
      MutationKind::Delete,
    ] {
      let patterns = DependencyGraph::resolve(Entity::Course, kind, &c);
      assert_eq!(names(&patterns), vec!["courses(3)", "course(7)"]);
    }
  }

  #[test]
  fn test_group_rules() {
    let mut c = ctx();
    c.course = Some(7.into());
    c.group = Some(12.into());
    let patterns = DependencyGraph::resolve(Entity::Group, MutationKind::Create, &c);
    assert_eq!(
      names(&patterns),
      vec![
        "groups(3)",
        "group(12,*,*)",
        "groups-by-course(7,*,*)",
        "students(3,*,*)",
        "course(7)",
      ]
    );
  }

  #[test]
  fn test_membership_without_course_skips_course_targets() {
    let mut c = ctx();
    c.group = Some(12.into());
    c.student = Some(5.into());
    let patterns =
      DependencyGraph::resolve(Entity::Student, MutationKind::RelationChange, &c);
    assert_eq!(
      names(&patterns),
      vec!["group(12,*,*)", "groups(3)", "students(3,*,*)"]
    );

    c.course = Some(7.into());
    let patterns =
      DependencyGraph::resolve(Entity::Student, MutationKind::RelationChange, &c);
    assert!(patterns.iter().any(|p| p.matches(&keys::course(7))));
    assert!(patterns
      .iter()
      .any(|p| p.matches(&keys::groups_by_course(7, 2024, 5))));
  }

  #[test]
  fn test_payment_rules() {
    let mut c = ctx();
    c.student = Some(5.into());
    c.year = Some(2024.into());
    c.month = Some(5.into());
    let patterns = DependencyGraph::resolve(Entity::Payment, MutationKind::Delete, &c);
    assert_eq!(
      names(&patterns),
      vec![
        "payments(3)",
        "payment-history(5)",
        "students(3,*,*)",
        "unpaid-students(3,2024,5)",
        "financial-summary(3)",
        "payments-by-month(3,2024,5)",
      ]
    );
  }

  #[test]
  fn test_expense_rules() {
    let patterns = DependencyGraph::resolve(Entity::Expense, MutationKind::Update, &ctx());
    assert_eq!(
      names(&patterns),
      vec!["expenses(3)", "financial-summary(3)", "expense-reports(3)"]
    );
  }

  #[test]
  fn test_salary_rules() {
    let mut c = ctx();
    c.teacher = Some(8.into());
    c.year = Some(2024.into());
    c.month = Some(5.into());
    let patterns =
      DependencyGraph::resolve(Entity::SalaryCalculation, MutationKind::Create, &c);
    assert_eq!(
      names(&patterns),
      vec![
        "teacher-salary-history(8)",
        "salary-history-branch(3,2024,5)",
        "salary-reports(3)",
      ]
    );
  }

  #[test]
  fn test_branch_update_invalidates_dependents_wholesale() {
    let patterns = DependencyGraph::resolve(Entity::Branch, MutationKind::Update, &ctx());
    assert_eq!(
      names(&patterns),
      vec!["branches()", "branch(3)", "users()", "teachers()", "students()"]
    );
    assert!(patterns.iter().any(|p| p.matches(&keys::students(4, 2024, 5))));
    assert!(patterns.iter().any(|p| p.matches(&keys::teachers(9))));
  }

  #[test]
  fn test_unknown_id_widens() {
    let patterns = DependencyGraph::resolve(Entity::Course, MutationKind::Update, &ctx());
    assert!(patterns.iter().any(|p| p.matches(&keys::course(7))));
    assert!(patterns.iter().any(|p| p.matches(&keys::course(9))));
  }

  #[test]
  fn test_absent_param_counts_as_unknown() {
    let mut c = ctx();
    c.year = Some(Param::Absent);
    c.month = Some(Param::Absent);
    let patterns = DependencyGraph::resolve(Entity::Payment, MutationKind::Create, &c);
    assert!(patterns
      .iter()
      .any(|p| p.matches(&keys::unpaid_students(3, 2024, 6))));
  }

  #[test]
  fn test_moved_group_stales_both_courses() {
    let mut c = ctx();
    c.group = Some(12.into());
    c.course = Some(9.into());
    c.also(Slot::Course, 7);
    let patterns = DependencyGraph::resolve(Entity::Group, MutationKind::Update, &c);

    for key in [
      keys::course(7),
      keys::course(9),
      keys::groups_by_course(7, 2024, 5),
      keys::groups_by_course(9, 2024, 5),
    ] {
      assert!(patterns.iter().any(|p| p.matches(&key)), "{} missed", key);
    }
    assert!(!patterns.iter().any(|p| p.matches(&keys::course(8))));
    // Shared targets are not repeated per course
    assert_eq!(
      patterns.iter().filter(|p| p.to_string() == "groups(3)").count(),
      1
    );
  }

  #[test]
  fn test_also_fills_empty_primary_and_skips_duplicates() {
    let mut c = ctx();
    c.also(Slot::Group, 12);
    c.also(Slot::Group, 12);
    c.also(Slot::Group, Param::Absent);
    assert_eq!(c.group, Some(Param::Int(12)));
    assert_eq!(c, {
      let mut expected = ctx();
      expected.group = Some(12.into());
      expected
    });
  }

  #[test]
  fn test_widened_slot_keeps_conditional_template() {
    let mut c = ctx();
    c.student = Some(5.into());
    let patterns = DependencyGraph::resolve(Entity::Student, MutationKind::Delete, &c);
    assert!(!patterns.iter().any(|p| p.matches(&keys::group(12, 2024, 5))));

    c.widen(Slot::Group);
    let patterns = DependencyGraph::resolve(Entity::Student, MutationKind::Delete, &c);
    assert!(patterns.iter().any(|p| p.matches(&keys::group(12, 2024, 5))));
    assert!(patterns.iter().any(|p| p.matches(&keys::group(13, 2024, 4))));
  }

  #[test]
  fn test_widen_overrides_known_value() {
    let mut c = ctx();
    c.course = Some(9.into());
    c.widen(Slot::Course);
    let patterns = DependencyGraph::resolve(Entity::Group, MutationKind::Update, &c);
    assert!(patterns.iter().any(|p| p.matches(&keys::course(7))));
  }

  #[test]
  fn test_no_rule_touches_other_branch() {
    let mut c = ctx();
    c.course = Some(7.into());
    c.group = Some(12.into());
    c.student = Some(5.into());
    c.teacher = Some(8.into());
    c.year = Some(2024.into());
    c.month = Some(5.into());

    let other_branch = [
      keys::courses(4),
      keys::groups(4),
      keys::students(4, 2024, 5),
      keys::payments(4),
      keys::unpaid_students(4, 2024, 5),
      keys::financial_summary(4, 2024, 5),
      keys::expenses(4),
      keys::expense_reports(4),
      keys::salary_history_branch(4, 2024, 5),
      keys::salary_reports(4),
      keys::teachers(4),
    ];

    for entity in [
      Entity::Course,
      Entity::Group,
      Entity::Student,
      Entity::Teacher,
      Entity::Payment,
      Entity::Expense,
      Entity::SalaryCalculation,
    ] {
      for kind in [
        MutationKind::Create,
        MutationKind::Update,
        MutationKind::Delete,
        MutationKind::RelationChange,
      ] {
        let patterns = DependencyGraph::resolve(entity, kind, &c);
        for key in &other_branch {
          assert!(
            !patterns.iter().any(|p| p.matches(key)),
            "{} {} touched {}",
            entity,
            kind,
            key
          );
        }
      }
    }
  }
}
