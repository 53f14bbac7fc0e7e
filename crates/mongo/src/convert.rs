//! Translation between driver values and feed types

use feed_core::{
    ConnectionError, Document, DocumentId, MutationEvent, OperationKind, Position, ProcessingError,
};
use mongodb::bson::{self, Bson, Timestamp};
use mongodb::change_stream::event::ResumeToken;
use std::collections::BTreeSet;

pub fn to_json(document: bson::Document) -> Document {
    Bson::Document(document).into_relaxed_extjson()
}

/// Convert an id back into its BSON form for a query
pub fn id_to_bson(id: &DocumentId) -> Result<Bson, ProcessingError> {
    Bson::try_from(id.0.clone())
        .map_err(|e| ProcessingError::new(format!("cannot convert id {} to BSON: {}", id, e)))
}

/// Where to reopen a stream for a stored position.
///
/// The resume token is preferred; positions without one restart just after
/// their cluster timestamp.
pub enum ResumePoint {
    After(ResumeToken),
    At(Timestamp),
}

pub fn resume_point(position: &Position) -> Result<ResumePoint, ConnectionError> {
    if let Some(token) = &position.resume_token {
        let raw = Bson::try_from(token.clone())
            .map_err(|e| ConnectionError::Malformed(format!("resume token: {}", e)))?;
        let token: ResumeToken = bson::from_bson(raw)
            .map_err(|e| ConnectionError::Malformed(format!("resume token: {}", e)))?;
        return Ok(ResumePoint::After(token));
    }

    let next = match position.ordinal.checked_add(1) {
        Some(increment) => Timestamp {
            time: position.seconds,
            increment,
        },
        None => Timestamp {
            time: position.seconds.saturating_add(1),
            increment: 0,
        },
    };
    Ok(ResumePoint::At(next))
}

/// Build a [`MutationEvent`] from a raw change event.
///
/// Returns `Ok(None)` for operations that carry no document mutation
/// (drop, rename, invalidate, ...).
pub fn mutation_from_change(change: &bson::Document) -> Result<Option<MutationEvent>, ConnectionError> {
    let operation = change
        .get_str("operationType")
        .map_err(|e| ConnectionError::Malformed(format!("operationType: {}", e)))?;

    let kind = match operation {
        "insert" => OperationKind::Insert,
        "update" => OperationKind::Update,
        "replace" => OperationKind::Replace,
        "delete" => OperationKind::Delete,
        _ => return Ok(None),
    };

    let key = change
        .get_document("documentKey")
        .ok()
        .and_then(|key| key.get("_id"))
        .cloned()
        .ok_or_else(|| ConnectionError::Malformed(format!("{} event without documentKey._id", kind)))?;

    let position = position_of(change)?;

    let full_document = match change.get("fullDocument") {
        Some(Bson::Document(doc)) => Some(to_json(doc.clone())),
        _ => None,
    };

    Ok(Some(MutationEvent {
        kind,
        document_id: DocumentId(key.into_relaxed_extjson()),
        full_document,
        changed_fields: changed_fields(change),
        position,
    }))
}

/// Cluster time plus the event's resume token
fn position_of(change: &bson::Document) -> Result<Position, ConnectionError> {
    let cluster_time = change
        .get_timestamp("clusterTime")
        .map_err(|e| ConnectionError::Malformed(format!("clusterTime: {}", e)))?;

    let position = Position::new(cluster_time.time, cluster_time.increment);
    Ok(match change.get("_id") {
        Some(token) => position.with_resume_token(token.clone().into_relaxed_extjson()),
        None => position,
    })
}

/// Updated keys and removed fields; empty without an update description
fn changed_fields(change: &bson::Document) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    let Ok(description) = change.get_document("updateDescription") else {
        return fields;
    };

    if let Ok(updated) = description.get_document("updatedFields") {
        fields.extend(updated.keys().cloned());
    }
    if let Ok(removed) = description.get_array("removedFields") {
        fields.extend(removed.iter().filter_map(|f| f.as_str().map(str::to_string)));
    }
    fields
}
