//! Per-entity queries and mutations bound to a [`Session`].
//!
//! Each hook pairs a key from [`crate::cache::keys`] with its REST path, and
//! each mutation with its dependency-graph event, validation, notification
//! texts and the ids it contributes to invalidation.

pub mod branches;
pub mod courses;
pub mod expenses;
pub mod groups;
pub mod payments;
pub mod reports;
pub mod salaries;
pub mod students;
pub mod teachers;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{FetchFuture, Id, Param, QueryKey};
use crate::error::Result;
use crate::query::Query;
use crate::session::Session;

/// Variables of an update mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Update<T> {
  pub id: Id,
  pub data: T,
  /// The record as it was before the edit. Used to stale relations the
  /// edit moves away from when the server does not report them.
  pub previous: Option<T>,
}

impl<T> Update<T> {
  pub fn new(id: impl Into<Id>, data: T) -> Self {
    Self {
      id: id.into(),
      data,
      previous: None,
    }
  }

  pub fn with_previous(mut self, previous: T) -> Self {
    self.previous = Some(previous);
    self
  }
}

/// Query scoped to the selected branch; idle while none is selected.
fn branch_query<T: DeserializeOwned>(
  session: &Session,
  key: impl FnOnce(Param) -> QueryKey,
  path: impl FnOnce(&Param) -> String,
) -> Query<T> {
  match session.branch_param() {
    Some(branch) => {
      let path = path(&branch);
      session.query(key(branch), path, true)
    }
    None => session.query(key(Param::Absent), String::new(), false),
  }
}

/// Query that depends on a parent id; idle while the id is unknown.
fn item_query<T: DeserializeOwned>(
  session: &Session,
  id: Option<&Id>,
  key: impl FnOnce(Param) -> QueryKey,
  path: impl FnOnce(&Id) -> String,
) -> Query<T> {
  match id {
    Some(id) => session.query(key(Param::from(id)), path(id), true),
    None => session.query(key(Param::Absent), String::new(), false),
  }
}

fn post(session: &Session, path: String, body: Result<Value>) -> FetchFuture {
  let transport = session.transport().clone();
  async move { transport.post(&path, body?).await }.boxed()
}

fn put(session: &Session, path: String, body: Result<Value>) -> FetchFuture {
  let transport = session.transport().clone();
  async move { transport.put(&path, body?).await }.boxed()
}

fn delete(session: &Session, path: String) -> FetchFuture {
  let transport = session.transport().clone();
  async move { transport.delete(&path).await }.boxed()
}
