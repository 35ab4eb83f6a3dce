//! Contact handlers.
//!
//! Route extractors hand their raw input here; these functions validate it
//! and talk to the repository.

use crate::db::{parse_contact_id, ContactRepository};
use crate::error::{AppError, Result};
use offsync_engine::{Fields, Record};
use serde_json::Value;

/// Request bodies must be JSON objects.
fn into_fields(body: Value) -> Result<Fields> {
    match body {
        Value::Object(fields) => Ok(fields),
        other => Err(AppError::BadRequest(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Path ids that are not integers can never name a contact.
fn contact_id(raw: &str) -> Result<i64> {
    parse_contact_id(raw).ok_or_else(AppError::contact_not_found)
}

pub fn list_contacts(repo: &ContactRepository) -> Vec<Record> {
    repo.list()
}

pub fn get_contact(repo: &ContactRepository, raw_id: &str) -> Result<Record> {
    let id = contact_id(raw_id)?;
    repo.get(id).ok_or_else(AppError::contact_not_found)
}

pub fn create_contact(repo: &ContactRepository, body: Value) -> Result<Record> {
    let fields = into_fields(body)?;
    let record = repo.create(fields);
    tracing::info!(contact_id = %record.id, "Created contact");
    Ok(record)
}

pub fn update_contact(repo: &ContactRepository, raw_id: &str, body: Value) -> Result<Record> {
    let id = contact_id(raw_id)?;
    let changes = into_fields(body)?;
    repo.update(id, changes)
        .ok_or_else(AppError::contact_not_found)
}

pub fn delete_contact(repo: &ContactRepository, raw_id: &str) -> Result<()> {
    let id = contact_id(raw_id)?;
    if repo.delete(id) {
        Ok(())
    } else {
        Err(AppError::contact_not_found())
    }
}

pub fn generate_contacts(repo: &ContactRepository, count: usize) -> Vec<Record> {
    let created = repo.generate(count);
    tracing::info!(count = created.len(), "Generated contacts");
    created
}
