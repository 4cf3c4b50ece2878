use serde_json::Value;

use crate::api::endpoints;
use crate::api::types::{response_id, response_ids, with_branch, Payment, Student, StudentInput};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, InvalidationContext, MutationKind, Slot};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{branch_query, delete, item_query, post, put, Update};

/// Students of the selected branch with payment state for the given month.
pub fn use_students(
  session: &Session,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Vec<Student>> {
  let (year, month) = (Param::from(year), Param::from(month));
  branch_query(
    session,
    |branch| keys::students(branch, year.clone(), month.clone()),
    |branch| endpoints::students(branch, &year, &month),
  )
}

pub fn use_student(
  session: &Session,
  student_id: Option<&Id>,
  year: Option<i32>,
  month: Option<u32>,
) -> Query<Student> {
  let (year, month) = (Param::from(year), Param::from(month));
  item_query(
    session,
    student_id,
    |student| keys::student(student, year.clone(), month.clone()),
    |id| endpoints::student(id, &year, &month),
  )
}

pub fn use_payment_history(session: &Session, student_id: Option<&Id>) -> Query<Vec<Payment>> {
  item_query(
    session,
    student_id,
    keys::payment_history,
    endpoints::payment_history,
  )
}

fn student_scope(student: Option<Param>, group_ids: &[Id], ctx: &mut InvalidationContext) {
  ctx.student = student;
  for group in group_ids {
    ctx.also(Slot::Group, group);
  }
}

/// Groups the student belonged to before the mutation. Unknown groups widen
/// the group slot so no group detail keeps the student.
fn former_groups(former: Option<Vec<Id>>, ctx: &mut InvalidationContext) {
  match former {
    Some(groups) => groups.iter().for_each(|group| ctx.also(Slot::Group, group)),
    None => ctx.widen(Slot::Group),
  }
}

pub fn use_create_student(
  session: &Session,
  options: MutationOptions<StudentInput, Student>,
) -> Mutation<StudentInput, Student> {
  session
    .mutation(
      Entity::Student,
      MutationKind::Create,
      options,
      |session, input: &StudentInput| {
        post(
          session,
          endpoints::student_collection(),
          with_branch(input, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(StudentInput::validate)
    .with_scope(|input, payload, ctx| {
      student_scope(
        response_id(payload, "id").map(Param::from),
        &input.group_ids,
        ctx,
      )
    })
    .with_messages("Creating student...", "Student created")
}

pub fn use_update_student(
  session: &Session,
  options: MutationOptions<Update<StudentInput>, Student>,
) -> Mutation<Update<StudentInput>, Student> {
  session
    .mutation(
      Entity::Student,
      MutationKind::Update,
      options,
      |session, update: &Update<StudentInput>| {
        put(
          session,
          endpoints::student_item(&update.id),
          with_branch(&update.data, session.branch_id().as_ref()),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    .with_scope(|update, payload, ctx| {
      student_scope(Some(Param::from(&update.id)), &update.data.group_ids, ctx);
      let former = response_ids(payload, "previousGroupIds").or_else(|| {
        update
          .previous
          .as_ref()
          .map(|previous| previous.group_ids.clone())
      });
      former_groups(former, ctx);
    })
    .with_messages("Updating student...", "Student updated")
}

pub fn use_delete_student(
  session: &Session,
  options: MutationOptions<Id, Value>,
) -> Mutation<Id, Value> {
  session
    .mutation(
      Entity::Student,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::student_item(id)),
    )
    .with_scope(|id, payload, ctx| {
      student_scope(Some(Param::from(id)), &[], ctx);
      former_groups(response_ids(payload, "groupIds"), ctx);
    })
    .with_messages("Deleting student...", "Student deleted")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hooks::fixtures::{fixture, Fixture};
  use crate::testing::Method;
  use serde_json::json;

  #[tokio::test]
  async fn test_students_without_month_send_empty_params() {
    let f = fixture();
    let path = "/students?branchId=3&year=&month=";
    f.transport
      .respond(Method::Get, path, json!([{"id": 5, "firstName": "Aziz"}]));

    let mut query = use_students(&f.session, None, None);
    assert_eq!(query.key(), &keys::students(3, Param::Absent, Param::Absent));
    query.settled().await;
    assert_eq!(f.transport.count(Method::Get, path), 1);
    assert_eq!(query.data().map(Vec::len), Some(1));
  }

  #[tokio::test]
  async fn test_payment_history_idle_without_student() {
    let f = fixture();
    let query = use_payment_history(&f.session, None);
    assert!(query.is_idle());
    assert!(f.transport.calls().is_empty());
  }

  fn seed(f: &Fixture, keys: impl IntoIterator<Item = crate::cache::QueryKey>) {
    for key in keys {
      f.session.client().set_query_data(&key, json!({}));
    }
  }

  fn is_stale(f: &Fixture, key: &crate::cache::QueryKey) -> bool {
    f.session.client().store().get(key).unwrap().is_stale()
  }

  fn aziz(group_ids: Vec<Id>) -> StudentInput {
    StudentInput {
      first_name: "Aziz".into(),
      phone: "+998901234567".into(),
      group_ids,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_update_student_in_one_group_stales_that_group() {
    let f = fixture();
    seed(
      &f,
      [
        keys::student(42, 2024, 5),
        keys::student(43, 2024, 5),
        keys::group(12, 2024, 5),
        keys::group(13, 2024, 5),
        keys::unpaid_students(3, 2024, 5),
      ],
    );
    f.transport.respond(
      Method::Put,
      "/students/42",
      json!({"id": 42, "firstName": "Aziz"}),
    );

    use_update_student(&f.session, MutationOptions::default())
      .mutate(
        Update::new(42, aziz(vec![Id::Int(12)])).with_previous(aziz(vec![Id::Int(12)])),
      )
      .await
      .unwrap();

    assert!(is_stale(&f, &keys::student(42, 2024, 5)));
    assert!(is_stale(&f, &keys::group(12, 2024, 5)));
    assert!(is_stale(&f, &keys::unpaid_students(3, 2024, 5)));
    assert!(!is_stale(&f, &keys::student(43, 2024, 5)));
    assert!(!is_stale(&f, &keys::group(13, 2024, 5)));
  }

  #[tokio::test]
  async fn test_student_moved_between_groups_stales_both() {
    let f = fixture();
    seed(
      &f,
      [
        keys::group(12, 2024, 5),
        keys::group(13, 2024, 5),
        keys::group(14, 2024, 5),
      ],
    );
    f.transport.respond(
      Method::Put,
      "/students/42",
      json!({"id": 42, "firstName": "Aziz"}),
    );

    use_update_student(&f.session, MutationOptions::default())
      .mutate(
        Update::new(42, aziz(vec![Id::Int(13)])).with_previous(aziz(vec![Id::Int(12)])),
      )
      .await
      .unwrap();

    assert!(is_stale(&f, &keys::group(12, 2024, 5)));
    assert!(is_stale(&f, &keys::group(13, 2024, 5)));
    assert!(!is_stale(&f, &keys::group(14, 2024, 5)));
  }

  #[tokio::test]
  async fn test_student_move_reported_by_server() {
    let f = fixture();
    seed(&f, [keys::group(12, 2024, 5), keys::group(14, 2024, 5)]);
    f.transport.respond(
      Method::Put,
      "/students/42",
      json!({"id": 42, "firstName": "Aziz", "previousGroupIds": [12]}),
    );

    use_update_student(&f.session, MutationOptions::default())
      .mutate(Update::new(42, aziz(vec![Id::Int(13)])))
      .await
      .unwrap();

    assert!(is_stale(&f, &keys::group(12, 2024, 5)));
    assert!(!is_stale(&f, &keys::group(14, 2024, 5)));
  }

  #[tokio::test]
  async fn test_student_move_without_former_groups_widens() {
    let f = fixture();
    seed(&f, [keys::group(12, 2024, 5), keys::group(14, 2024, 4)]);
    f.transport.respond(
      Method::Put,
      "/students/42",
      json!({"id": 42, "firstName": "Aziz"}),
    );

    use_update_student(&f.session, MutationOptions::default())
      .mutate(Update::new(42, aziz(vec![Id::Int(13)])))
      .await
      .unwrap();

    assert!(is_stale(&f, &keys::group(12, 2024, 5)));
    assert!(is_stale(&f, &keys::group(14, 2024, 4)));
  }

  #[tokio::test]
  async fn test_delete_student_stales_every_group_when_unreported() {
    let f = fixture();
    let stale = [
      keys::student(42, 2024, 5),
      keys::students(3, 2024, 5),
      keys::unpaid_students(3, 2024, 5),
      keys::groups(3),
      keys::group(12, 2024, 5),
      keys::group(13, 2024, 4),
    ];
    seed(&f, stale.iter().cloned());
    let fresh = [
      keys::student(43, 2024, 5),
      keys::students(4, 2024, 5),
      keys::groups(4),
      keys::courses(3),
      keys::payments(3),
    ];
    seed(&f, fresh.iter().cloned());

    use_delete_student(&f.session, MutationOptions::default())
      .mutate(Id::Int(42))
      .await
      .unwrap();

    assert_eq!(f.transport.count(Method::Delete, "/students/42"), 1);
    for key in &stale {
      assert!(is_stale(&f, key), "{} should be stale", key);
    }
    for key in &fresh {
      assert!(!is_stale(&f, key), "{} should stay fresh", key);
    }
  }

  #[tokio::test]
  async fn test_delete_student_scopes_reported_groups() {
    let f = fixture();
    seed(&f, [keys::group(12, 2024, 5), keys::group(13, 2024, 5)]);
    f.transport.respond(
      Method::Delete,
      "/students/42",
      json!({"id": 42, "groupIds": [12]}),
    );

    use_delete_student(&f.session, MutationOptions::default())
      .mutate(Id::Int(42))
      .await
      .unwrap();

    assert!(is_stale(&f, &keys::group(12, 2024, 5)));
    assert!(!is_stale(&f, &keys::group(13, 2024, 5)));
  }
}
