use serde_json::Value;

use crate::api::endpoints;
use crate::api::types::{Branch, BranchInput};
use crate::cache::{keys, Id, Param};
use crate::graph::{Entity, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::Query;
use crate::session::Session;

use super::{delete, item_query, post, put, Update};

/// All branches. Not branch scoped: this is what the branch picker reads.
pub fn use_branches(session: &Session) -> Query<Vec<Branch>> {
  session.query(keys::branches(), endpoints::branches(), true)
}

pub fn use_branch(session: &Session, branch_id: Option<&Id>) -> Query<Branch> {
  item_query(session, branch_id, keys::branch, endpoints::branch)
}

pub fn use_create_branch(
  session: &Session,
  options: MutationOptions<BranchInput, Branch>,
) -> Mutation<BranchInput, Branch> {
  session
    .mutation(
      Entity::Branch,
      MutationKind::Create,
      options,
      |session, input: &BranchInput| {
        post(
          session,
          endpoints::branches(),
          serde_json::to_value(input).map_err(Into::into),
        )
      },
    )
    .with_validation(BranchInput::validate)
    .with_messages("Creating branch...", "Branch created")
}

pub fn use_update_branch(
  session: &Session,
  options: MutationOptions<Update<BranchInput>, Branch>,
) -> Mutation<Update<BranchInput>, Branch> {
  session
    .mutation(
      Entity::Branch,
      MutationKind::Update,
      options,
      |session, update: &Update<BranchInput>| {
        put(
          session,
          endpoints::branch(&update.id),
          serde_json::to_value(&update.data).map_err(Into::into),
        )
      },
    )
    .with_validation(|update| update.data.validate())
    // The edited branch, not the selected one
    .with_scope(|update, _, ctx| ctx.branch = Some(Param::from(&update.id)))
    .with_messages("Updating branch...", "Branch updated")
}

pub fn use_delete_branch(
  session: &Session,
  options: MutationOptions<Id, Value>,
) -> Mutation<Id, Value> {
  session
    .mutation(
      Entity::Branch,
      MutationKind::Delete,
      options,
      |session, id: &Id| delete(session, endpoints::branch(id)),
    )
    .with_scope(|id, _, ctx| ctx.branch = Some(Param::from(id)))
    .with_messages("Deleting branch...", "Branch deleted")
}
