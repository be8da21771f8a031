//! The Merge Stage (C8, `spec.md` §4.8): folds a run's new-document action
//! log against the existing authoritative document set.

use gcse_core::{Action, DocInfo, NewDocAction, PackagePath};
use std::collections::BTreeMap;

/// Fold `actions` (the run's append-only new-document log, sorted by key
/// before folding per `spec.md` §4.8) against `old` (the existing document
/// set, keyed by canonical package path).
///
/// Returns the updated document set plus the action stream handed to the
/// indexer. Rules, per key:
/// - In both, new is `Update` → emit `Update`, replace.
/// - In both, new is `Stars` → emit `Stars`, patch star count only.
/// - In both, new is `Del` → emit `Del`, remove.
/// - In old only → emit `Original`, carry through unchanged.
/// - In new only, `Update` → emit `Update`, insert.
#[must_use]
pub fn merge(
    old: &BTreeMap<PackagePath, DocInfo>,
    mut actions: Vec<NewDocAction>,
) -> (BTreeMap<PackagePath, DocInfo>, Vec<NewDocAction>) {
    actions.sort_by(|a, b| a.path.cmp(&b.path));

    let mut new_by_key: BTreeMap<PackagePath, NewDocAction> = BTreeMap::new();
    for action in actions {
        new_by_key.insert(action.path.clone(), action);
    }

    let mut result = BTreeMap::new();
    let mut stream = Vec::new();

    let mut keys: Vec<&PackagePath> = old.keys().chain(new_by_key.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (old.get(key), new_by_key.get(key)) {
            (Some(_), Some(new_action)) => match new_action.action {
                Action::Update => {
                    let doc = new_action.doc.clone().expect("Update action carries a doc");
                    result.insert(key.clone(), doc.clone());
                    stream.push(NewDocAction::update(key.clone(), doc));
                }
                Action::Stars => {
                    let mut doc = old[key].clone();
                    if let Some(new_doc) = &new_action.doc {
                        doc.stars = new_doc.stars;
                    }
                    result.insert(key.clone(), doc.clone());
                    stream.push(NewDocAction::stars(key.clone(), doc));
                }
                Action::Del => {
                    stream.push(NewDocAction::deleted(key.clone()));
                }
                Action::Original => {
                    let doc = old[key].clone();
                    result.insert(key.clone(), doc);
                }
            },
            (Some(doc), None) => {
                result.insert(key.clone(), doc.clone());
                stream.push(NewDocAction {
                    path: key.clone(),
                    action: Action::Original,
                    doc: Some(doc.clone()),
                });
            }
            (None, Some(new_action)) => {
                if new_action.action == Action::Update {
                    if let Some(doc) = &new_action.doc {
                        result.insert(key.clone(), doc.clone());
                        stream.push(NewDocAction::update(key.clone(), doc.clone()));
                    }
                }
                // Stars/Del/Original with no prior document is a no-op:
                // there is nothing to patch, delete, or carry through.
            }
            (None, None) => unreachable!("key came from one of the two maps"),
        }
    }

    (result, stream)
}
