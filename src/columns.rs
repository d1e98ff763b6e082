use clap::ValueEnum;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::attributes::ColumnSpec;
use crate::attributes::ColumnType;
use crate::engine::GisEngine;
use crate::errors::CommandError;
use crate::workspace::vector::KEY_COLUMN;

// Attribute tables are often written out to formats that truncate field names at 10 characters.
const MAX_COLUMN_NAME_LENGTH: usize = 10;

/// What to do with a requested column that already exists in the attribute table.
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,ValueEnum,Serialize,Deserialize,JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ConflictPolicy {
    /// Replace the column with one of the requested type
    Overwrite,
    /// Use the existing column, with its existing type
    Keep,
    /// Fail without changing the table
    #[default]
    Abort
}

/// Decides, for each requested column that already exists, whether to overwrite it, keep it or abort.
pub(crate) trait ConflictResolver {

    fn resolve(&mut self, column: &str, existing: ColumnType, requested: ColumnType) -> ConflictPolicy;

}

impl ConflictResolver for ConflictPolicy {

    fn resolve(&mut self, _: &str, _: ColumnType, _: ColumnType) -> ConflictPolicy {
        *self
    }
}

impl<Callback: FnMut(&str,ColumnType,ColumnType) -> ConflictPolicy> ConflictResolver for Callback {

    fn resolve(&mut self, column: &str, existing: ColumnType, requested: ColumnType) -> ConflictPolicy {
        self(column, existing, requested)
    }
}

pub(crate) fn validate_column_name(name: &str) -> Result<(),CommandError> {
    if name.chars().count() > MAX_COLUMN_NAME_LENGTH {
        return Err(CommandError::ColumnNameTooLong(name.to_owned()))
    }
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|first| first.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !starts_with_letter || !rest_valid || name.eq_ignore_ascii_case(KEY_COLUMN) {
        return Err(CommandError::InvalidColumnName(name.to_owned()))
    }
    Ok(())
}

/// Parses and checks the whole batch of requested columns. Nothing is returned unless every one of them is valid.
pub(crate) fn validate_columns(specs: &[ColumnSpec]) -> Result<Vec<(String,ColumnType)>,CommandError> {
    let mut result: Vec<(String,ColumnType)> = Vec::with_capacity(specs.len());
    for spec in specs {
        validate_column_name(&spec.name)?;
        if result.iter().any(|(name,_)| name.eq_ignore_ascii_case(&spec.name)) {
            return Err(CommandError::DuplicateColumnName(spec.name.clone()))
        }
        let column_type = spec.type_tag.parse()?;
        result.push((spec.name.clone(),column_type));
    }
    Ok(result)
}

/**
Makes sure the attribute table of the vector has every requested column, and returns the type each column ended up with,
in request order. Column names are matched without regard to case, as most attribute table formats do, and an
existing column that is kept is returned under its existing name.

Every name and type is validated, and every conflict resolved, before the table is touched. The table then sees at most
one batch of column drops (for overwritten columns whose type changes) and one batch of additions.
*/
pub(crate) fn ensure_columns<Engine: GisEngine + ?Sized, Resolver: ConflictResolver>(engine: &mut Engine, vector: &str, specs: &[ColumnSpec], resolver: &mut Resolver) -> Result<IndexMap<String,ColumnType>,CommandError> {

    let requested = validate_columns(specs)?;
    let existing: IndexMap<String,ColumnType> = engine.vector_columns(vector)?.into_iter().collect();

    let mut drops = Vec::new();
    let mut additions = Vec::new();
    let mut result = IndexMap::new();

    for (name,requested_type) in requested {
        let (name,effective_type) = match existing.iter().find(|(existing_name,_)| existing_name.eq_ignore_ascii_case(&name)) {
            None => {
                additions.push((name.clone(),requested_type));
                (name,requested_type)
            },
            Some((existing_name,existing_type)) => match resolver.resolve(existing_name, *existing_type, requested_type) {
                ConflictPolicy::Keep => (existing_name.clone(),*existing_type),
                ConflictPolicy::Overwrite if *existing_type == requested_type => (existing_name.clone(),requested_type),
                ConflictPolicy::Overwrite => {
                    drops.push(existing_name.clone());
                    additions.push((name.clone(),requested_type));
                    (name,requested_type)
                },
                ConflictPolicy::Abort => return Err(CommandError::ColumnOverwriteDeclined(existing_name.clone()))
            }
        };
        _ = result.insert(name, effective_type);
    }

    if !drops.is_empty() {
        engine.drop_columns(vector, &drops)?;
    }
    if !additions.is_empty() {
        engine.add_columns(vector, &additions)?;
    }

    Ok(result)
}
