use crate::api::endpoints;
use crate::api::types::{response_id, with_branch, Course, CourseInput};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, item_query, post, put, Update};

pub fn use_courses(session: &Session) -> Query<Vec<Course>> {
  branch_query(session, keys::courses, endpoints::courses)
}

pub fn use_course(session: &Session, course_id: Option<&Id>) -> Query<Course> {
  item_query(session, course_id, keys::course, endpoints::course)
}

pub fn use_create_course(
  session: &Session,
  options: MutationOptions<CourseInput, Course>,
) -> Mutation<CourseInput, Course> {
  session
    .mutation(
      Entity::Course,
      MutationKind::Create,
      options,
      |session, input: &CourseInput| {
        post(
          session,
          endpoints::course_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(CourseInput::validate)
    .with_scope(|_, payload, ctx| ctx.course = response_id(payload, "id").map(Param::from))
    .with_messages("Creating course...", "Course created")
}

pub fn use_update_course(
  session: &Session,
  options: MutationOptions<Update<CourseInput>, Course>,
) -> Mutation<Update<CourseInput>, Course> {
  session
    .mutation(
      Entity::Course,
      MutationKind::Update,
      options,
      |session, update: &Update<CourseInput>| {
        put(
          session,
          endpoints::course(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_scope(|update, _, ctx| ctx.course = Some(Param::from(&update.id)))
    .with_messages("Updating course...", "Course updated")
}

pub fn use_delete_course(
  session: &Session,
  options: MutationOptions<Id, serde_json::Value>,
) -> Mutation<Id, serde_json::Value> {
  session
    .mutation(
      Entity::Course,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::course(id)),
    )
    .with_scope(|id, _, ctx| ctx.course = Some(Param::from(id)))
    .with_messages("Deleting course...", "Course deleted")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hooks::fixtures::fixture;
  use crate::testing::Method;
  use serde_json::json;

  #[tokio::test]
  async fn test_courses_for_selected_branch() {
    let f = fixture();
    f.transport.respond(
      Method::Get,
      "/courses?branchId=3",
      json!([{"id": 7, "name": "IELTS", "price": 500000.0}]),
    );

    let mut query = use_courses(&f.session);
    assert_eq!(query.key(), &keys::courses(3));
    query.settled().await;

    let courses = query.data().unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].name, "IELTS");
  }

  #[tokio::test]
  async fn test_create_sends_branch_and_stales_list() {
    let f = fixture();
    f.session.client().set_query_data(&keys::courses(3), json!([]));
    f.transport
      .respond(Method::Post, "/courses", json!({"id": 8, "name": "SAT"}));

    let create = use_create_course(&f.session, MutationOptions::default());
    let course = create
      .mutate(CourseInput {
        name: "SAT".into(),
        price: Some(400000.0),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(course.id, Id::Int(8));

    let calls = f.transport.calls();
    let body = calls[0].body.as_ref().unwrap();
    assert_eq!(body["branchId"], json!(3));
    assert_eq!(body["name"], json!("SAT"));
    assert!(f
      .session
      .client()
      .store()
      .get(&keys::courses(3))
      .unwrap()
      .is_stale());
  }

  #[tokio::test]
  async fn test_empty_name_rejected_locally() {
    let f = fixture();
    let create = use_create_course(&f.session, MutationOptions::default());
    assert!(create.mutate(CourseInput::default()).await.is_err());
    assert!(f.transport.calls().is_empty());
  }

  #[tokio::test]
  async fn test_delete_course_stales_only_that_course() {
    let f = fixture();
    let client = f.session.client();
    client.set_query_data(&keys::course(7), json!({"id": 7}));
    client.set_query_data(&keys::course(9), json!({"id": 9}));

    use_delete_course(&f.session, MutationOptions::default())
      .mutate(Id::Int(7))
      .await
      .unwrap();

    assert_eq!(f.transport.count(Method::Delete, "/courses/7"), 1);
    assert!(client.store().get(&keys::course(7)).unwrap().is_stale());
    assert!(!client.store().get(&keys::course(9)).unwrap().is_stale());
  }

  #[tokio::test]
  async fn test_branch_switch_after_building_handle() {
    let f = fixture();
    let client = f.session.client();
    client.set_query_data(&keys::courses(3), json!([]));
    client.set_query_data(&keys::courses(5), json!([]));
    f.transport
      .respond(Method::Post, "/courses", json!({"id": 8, "name": "SAT"}));

    let create = use_create_course(&f.session, MutationOptions::default());
    f.session.set_branch(Some(&Id::Int(5)));
    create
      .mutate(CourseInput {
        name: "SAT".into(),
        ..Default::default()
      })
      .await
      .unwrap();

    let calls = f.transport.calls();
    assert_eq!(calls[0].body.as_ref().unwrap()["branchId"], json!(5));
    assert!(client.store().get(&keys::courses(5)).unwrap().is_stale());
    assert!(!client.store().get(&keys::courses(3)).unwrap().is_stale());
  }
}
