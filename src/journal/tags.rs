use std::collections::{HashMap, HashSet};

use super::JournalError;
use super::store::{StoreError, TagStore};
use crate::models::Tag;

/// Maps tag names to tag ids in input order, creating the tags that do not exist yet.
///
/// Duplicated names come back as duplicated ids, so the output always has the same
/// length as `names`. Names are expected to be normalized already.
///
/// If a concurrent writer creates one of the missing tags first, the batch insert
/// fails on the unique index and none of its rows land. The missing names are then
/// fetched once more and the winner's ids are used; names nobody else created are
/// inserted with conflicts ignored and fetched back. There is exactly one
/// reconciliation pass.
pub async fn resolve_tag_ids<S>(store: &S, names: &[String]) -> Result<Vec<String>, JournalError>
where
    S: TagStore + ?Sized,
{
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let unique: Vec<String> = names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect();

    let mut ids: HashMap<String, String> = store
        .find_tags_by_names(&unique)
        .await?
        .into_iter()
        .map(|tag| (tag.name, tag.id))
        .collect();

    let missing: Vec<String> = unique
        .into_iter()
        .filter(|name| !ids.contains_key(name))
        .collect();

    if !missing.is_empty() {
        let created: Vec<Tag> = missing.iter().map(|name| Tag::new(name.clone())).collect();

        match store.insert_tags(&created).await {
            Ok(()) => {
                ids.extend(created.into_iter().map(|tag| (tag.name, tag.id)));
            }
            Err(StoreError::UniqueViolation(reason)) => {
                tracing::debug!(%reason, missing = ?missing, "lost tag creation race, refetching");
                let winners = store.find_tags_by_names(&missing).await?;
                ids.extend(winners.into_iter().map(|tag| (tag.name, tag.id)));

                // The failed batch also dropped names only this request was creating.
                let leftover: Vec<Tag> = missing
                    .iter()
                    .filter(|name| !ids.contains_key(*name))
                    .map(|name| Tag::new(name.clone()))
                    .collect();
                if !leftover.is_empty() {
                    store.insert_tags_if_absent(&leftover).await?;
                    let names: Vec<String> = leftover.into_iter().map(|tag| tag.name).collect();
                    let found = store.find_tags_by_names(&names).await?;
                    ids.extend(found.into_iter().map(|tag| (tag.name, tag.id)));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    names
        .iter()
        .map(|name| {
            ids.get(name)
                .cloned()
                .ok_or_else(|| JournalError::Inconsistent(format!("tag '{name}' could not be resolved")))
        })
        .collect()
}
