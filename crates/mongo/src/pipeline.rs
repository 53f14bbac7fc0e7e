//! Server-side prefilter for the change stream
//!
//! Mirrors `FeedFilter::should_forward` as an aggregation `$match`, so pure
//! write-back updates never leave the server. Non-update operations always
//! pass. The watcher re-applies the filter locally either way.

use mongodb::bson::{doc, Bson, Document};
use watcher::FilterRule;

/// Changed paths of an update: updated keys followed by removed fields
fn changed_paths() -> Bson {
    Bson::Document(doc! {
        "$concatArrays": [
            {
                "$map": {
                    "input": { "$objectToArray": { "$ifNull": ["$updateDescription.updatedFields", {}] } },
                    "as": "field",
                    "in": "$$field.k",
                }
            },
            { "$ifNull": ["$updateDescription.removedFields", []] },
        ]
    })
}

/// True when `$$path` matches no rule
fn not_ignorable(rules: &[FilterRule]) -> Document {
    let matchers: Vec<Bson> = rules
        .iter()
        .map(|rule| {
            Bson::Document(doc! {
                "$regexMatch": { "input": "$$path", "regex": rule.to_regex() }
            })
        })
        .collect();

    doc! { "$not": [{ "$or": matchers }] }
}

/// Build the `watch` pipeline for `collection` under `rules`
pub fn change_stream_pipeline(collection: &str, rules: &[FilterRule]) -> Vec<Document> {
    if rules.is_empty() {
        return vec![doc! { "$match": { "ns.coll": collection } }];
    }

    let forward_update = doc! {
        "$let": {
            "vars": { "paths": changed_paths() },
            "in": {
                "$or": [
                    // No field-level diff is never mistaken for no change
                    { "$eq": [{ "$size": "$$paths" }, 0] },
                    {
                        "$gt": [
                            {
                                "$size": {
                                    "$filter": {
                                        "input": "$$paths",
                                        "as": "path",
                                        "cond": not_ignorable(rules),
                                    }
                                }
                            },
                            0,
                        ]
                    },
                ]
            }
        }
    };

    vec![doc! {
        "$match": {
            "ns.coll": collection,
            "$or": [
                { "operationType": { "$ne": "update" } },
                { "$expr": forward_update },
            ],
        }
    }]
}
