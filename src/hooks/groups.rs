use serde_json::{json, Value};

use crate::api::endpoints;
use crate::api::types::{response_id, with_branch, Group, GroupInput};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, InvalidationContext, MutationKind, Slot};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, item_query, post, put, Update};

/// A student joining or leaving a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
  pub group_id: Id,
  pub student_id: Id,
}

pub fn use_groups(session: &Session) -> Query<Vec<Group>> {
  branch_query(session, keys::groups, endpoints::groups)
}

/// A group with per-student payment state for the given month.
pub fn use_group(
  session: &Session,
  group_id: Option<&Id>,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Group> {
  let (year, month) = (Param::from(year), Param::from(month));
  item_query(
    session,
    group_id,
    |group| keys::group(group, year.clone(), month.clone()),
    |id| endpoints::group(id, &year, &month),
  )
}

/// Idle until a course is chosen.
pub fn use_groups_by_course(
  session: &Session,
  course_id: Option<&Id>,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Vec<Group>> {
  let (year, month) = (Param::from(year), Param::from(month));
  item_query(
    session,
    course_id,
    |course| keys::groups_by_course(course, year.clone(), month.clone()),
    |id| endpoints::groups_by_course(&Param::from(id), &year, &month),
  )
}

pub fn use_create_group(
  session: &Session,
  options: MutationOptions<GroupInput, Group>,
) -> Mutation<GroupInput, Group> {
  session
    .mutation(
      Entity::Group,
      MutationKind::Create,
      options,
      |session, input: &GroupInput| {
        post(
          session,
          endpoints::group_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(GroupInput::validate)
    .with_scope(|input, payload, ctx| {
      ctx.group = response_id(payload, "id").map(Param::from);
      ctx.course = input
        .course_id
        .clone()
        .or_else(|| response_id(payload, "courseId"))
        .map(Param::from);
    })
    .with_messages("Creating group...", "Group created")
}

pub fn use_update_group(
  session: &Session,
  options: MutationOptions<Update<GroupInput>, Group>,
) -> Mutation<Update<GroupInput>, Group> {
  session
    .mutation(
      Entity::Group,
      MutationKind::Update,
      options,
      |session, update: &Update<GroupInput>| {
        put(
          session,
          endpoints::group_item(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_scope(|update, payload, ctx| {
      ctx.group = Some(Param::from(&update.id));
      ctx.course = update
        .data
        .course_id
        .clone()
        .or_else(|| response_id(payload, "courseId"))
        .map(Param::from);
      // The group may have moved; its old course lists it too
      let previous = response_id(payload, "previousCourseId").or_else(|| {
        update
          .previous
          .as_ref()
          .and_then(|previous| previous.course_id.clone())
      });
      match previous {
        Some(course) => ctx.also(Slot::Course, course),
        None if update.previous.is_none() => ctx.widen(Slot::Course),
        None => {}
      }
    })
    .with_messages("Updating group...", "Group updated")
}

pub fn use_delete_group(
  session: &Session,
  options: MutationOptions<Id, Value>,
) -> Mutation<Id, Value> {
  session
    .mutation(
      Entity::Group,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::group_item(id)),
    )
    .with_scope(|id, payload, ctx| {
      ctx.group = Some(Param::from(id));
      ctx.course = response_id(payload, "courseId").map(Param::from);
    })
    .with_messages("Deleting group...", "Group deleted")
}

fn membership_scope(
  membership: &Membership,
  payload: &Value,
  ctx: &mut InvalidationContext,
) {
  ctx.group = Some(Param::from(&membership.group_id));
  ctx.student = Some(Param::from(&membership.student_id));
  ctx.course = response_id(payload, "courseId").map(Param::from);
}

pub fn use_add_student_to_group(
  session: &Session,
  options: MutationOptions<Membership, Value>,
) -> Mutation<Membership, Value> {
  session
    .mutation(
      Entity::Student,
      MutationKind::RelationChange,
      options,
      |session, m: &Membership| {
        post(
          session,
          endpoints::group_student(&m.group_id, &m.student_id),
          Ok(json!({})),
        )
      },
    )
    .with_scope(membership_scope)
    .with_message_id("student:add-to-group")
    .with_messages("Adding student to group...", "Student added to group")
}

pub fn use_remove_student_from_group(
  session: &Session,
  options: MutationOptions<Membership, Value>,
) -> Mutation<Membership, Value> {
  session
    .mutation(
      Entity::Student,
      MutationKind::RelationChange,
      options,
      |session, m: &Membership| {
        delete(
          session,
          endpoints::group_student(&m.group_id, &m.student_id),
        )
      },
    )
    .with_scope(membership_scope)
    .with_message_id("student:remove-from-group")
    .with_messages("Removing student from group...", "Student removed from group")
}
