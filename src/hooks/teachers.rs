use serde_json::Value;

use crate::api::endpoints;
use crate::api::types::{response_id, with_branch, Teacher, TeacherInput, User};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, item_query, post, put, Update};

pub fn use_teachers(session: &Session) -> Query<Vec<Teacher>> {
  branch_query(session, keys::teachers, endpoints::teachers)
}

pub fn use_teacher(session: &Session, teacher_id: Option<&Id>) -> Query<Teacher> {
  item_query(session, teacher_id, keys::teacher, endpoints::teacher)
}

/// Login accounts of the selected branch.
pub fn use_users(session: &Session) -> Query<Vec<User>> {
  branch_query(session, keys::users, endpoints::users)
}

pub fn use_create_teacher(
  session: &Session,
  options: MutationOptions<TeacherInput, Teacher>,
) -> Mutation<TeacherInput, Teacher> {
  session
    .mutation(
      Entity::Teacher,
      MutationKind::Create,
      options,
      |session, input: &TeacherInput| {
        post(
          session,
          endpoints::teacher_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(TeacherInput::validate)
    .with_scope(|_, payload, ctx| ctx.teacher = response_id(payload, "id").map(Param::from))
    .with_messages("Creating teacher...", "Teacher created")
}

pub fn use_update_teacher(
  session: &Session,
  options: MutationOptions<Update<TeacherInput>, Teacher>,
) -> Mutation<Update<TeacherInput>, Teacher> {
  session
    .mutation(
      Entity::Teacher,
      MutationKind::Update,
      options,
      |session, update: &Update<TeacherInput>| {
        put(
          session,
          endpoints::teacher(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_scope(|update, _, ctx| ctx.teacher = Some(Param::from(&update.id)))
    .with_messages("Updating teacher...", "Teacher updated")
}

pub fn use_delete_teacher(
  session: &Session,
  options: MutationOptions<Id, Value>,
) -> Mutation<Id, Value> {
  session
    .mutation(
      Entity::Teacher,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::teacher(id)),
    )
    .with_scope(|id, _, ctx| ctx.teacher = Some(Param::from(id)))
    .with_messages("Deleting teacher...", "Teacher deleted")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hooks::fixtures::fixture;
  use crate::testing::Method;
  use serde_json::json;

  #[tokio::test]
  async fn test_users_for_branch() {
    let f = fixture();
    f.transport.respond(
      Method::Get,
      "/users?branchId=3",
      json!([{"id": "u-1", "username": "admin"}]),
    );

    let mut query = use_users(&f.session);
    query.settled().await;
    let users = query.data().unwrap();
    assert_eq!(users[0].id, Id::Str("u-1".into()));
  }

  #[tokio::test]
  async fn test_delete_teacher_stales_teacher_and_groups() {
    let f = fixture();
    let client = f.session.client();
    for key in [
      keys::teachers(3),
      keys::teacher(8),
      keys::teacher(9),
      keys::groups(3),
      keys::users(3),
    ] {
      client.set_query_data(&key, json!({}));
    }

    let on_success_seen = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen = on_success_seen.clone();
    let store = client.store().clone();
    let options = MutationOptions::default().on_success(move |_: &Value, _: &Id| {
      // Invalidation has already happened when callbacks run
      let stale = store.get(&keys::teacher(8)).map(|e| e.is_stale());
      seen.store(stale == Some(true), std::sync::atomic::Ordering::SeqCst);
    });

    use_delete_teacher(&f.session, options)
      .mutate(Id::Int(8))
      .await
      .unwrap();

    let store = client.store();
    assert!(on_success_seen.load(std::sync::atomic::Ordering::SeqCst));
    assert!(store.get(&keys::teachers(3)).unwrap().is_stale());
    assert!(store.get(&keys::groups(3)).unwrap().is_stale());
    assert!(store.get(&keys::users(3)).unwrap().is_stale());
    assert!(!store.get(&keys::teacher(9)).unwrap().is_stale());
  }
}
