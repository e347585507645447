//! Persistence schema definitions and their registration-time validation.

use std::collections::{HashMap, HashSet};

use crate::api::DatabaseLockingType;
use crate::error::{ProcessError, ProcessResult};
use crate::serdes::DbHint;

/// Binding of a global attribute key to a table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColumnDef {
    pub key: String,
    pub column: String,
    /// Passed to the [`DbConverter`](crate::serdes::DbConverter)
    pub hint: Option<DbHint>,
    /// Loaded by the table's default policy
    pub default_loading: bool,
}

impl DbColumnDef {
    pub fn new(key: impl Into<String>, column: impl Into<String>, default_loading: bool) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            hint: None,
            default_loading,
        }
    }

    pub fn with_hint(mut self, hint: DbHint) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// Keys to load from one table and the row lock to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoadingPolicy {
    pub table_name: String,
    pub loading_keys: Vec<String>,
    pub locking_type: DatabaseLockingType,
}

impl TableLoadingPolicy {
    pub fn new<I, S>(table_name: impl Into<String>, locking_type: DatabaseLockingType, loading_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table_name: table_name.into(),
            loading_keys: loading_keys.into_iter().map(Into::into).collect(),
            locking_type,
        }
    }
}

/// A database table backing global attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTableSchema {
    pub table_name: String,
    pub primary_key: String,
    pub columns: Vec<DbColumnDef>,
    pub default_policy: TableLoadingPolicy,
}

impl DbTableSchema {
    /// Creates a table schema. The default policy loads every column marked
    /// `default_loading` with `default_locking`.
    pub fn new(
        table_name: impl Into<String>,
        primary_key: impl Into<String>,
        default_locking: DatabaseLockingType,
        columns: Vec<DbColumnDef>,
    ) -> Self {
        let table_name = table_name.into();
        let default_policy = TableLoadingPolicy::new(
            table_name.clone(),
            default_locking,
            columns
                .iter()
                .filter(|c| c.default_loading)
                .map(|c| c.key.clone()),
        );
        Self {
            table_name,
            primary_key: primary_key.into(),
            columns,
            default_policy,
        }
    }
}

/// Attributes shared across process executions, stored in database tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalAttributesSchema {
    pub tables: Vec<DbTableSchema>,
}

impl GlobalAttributesSchema {
    pub fn new(tables: Vec<DbTableSchema>) -> Self {
        Self { tables }
    }
}

/// How the default policy loads a local attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAttributeLoadingType {
    NotLoad,
    LoadWithLock,
    LoadNoLock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAttributeDef {
    pub key: String,
    pub default_loading: LocalAttributeLoadingType,
}

impl LocalAttributeDef {
    pub fn new(key: impl Into<String>, default_loading: LocalAttributeLoadingType) -> Self {
        Self {
            key: key.into(),
            default_loading,
        }
    }
}

/// Local attribute keys to load, with and without lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAttributeLoadingPolicy {
    pub keys_no_lock: Vec<String>,
    pub keys_with_lock: Vec<String>,
    /// Required when `keys_with_lock` is not empty
    pub locking_type: Option<DatabaseLockingType>,
}

impl LocalAttributeLoadingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys_no_lock<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys_no_lock.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_keys_with_lock<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys_with_lock.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_locking_type(mut self, locking_type: DatabaseLockingType) -> Self {
        self.locking_type = Some(locking_type);
        self
    }
}

/// Attributes scoped to a single process execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAttributesSchema {
    pub keys: Vec<String>,
    pub default_policy: LocalAttributeLoadingPolicy,
}

impl LocalAttributesSchema {
    /// Creates a local attribute schema; the default policy is derived from
    /// each definition's loading type.
    pub fn new(locking_type: Option<DatabaseLockingType>, defs: Vec<LocalAttributeDef>) -> Self {
        let mut default_policy = LocalAttributeLoadingPolicy {
            locking_type,
            ..Default::default()
        };
        let mut keys = Vec::with_capacity(defs.len());
        for def in defs {
            match def.default_loading {
                LocalAttributeLoadingType::NotLoad => {}
                LocalAttributeLoadingType::LoadWithLock => default_policy.keys_with_lock.push(def.key.clone()),
                LocalAttributeLoadingType::LoadNoLock => default_policy.keys_no_lock.push(def.key.clone()),
            }
            keys.push(def.key);
        }
        Self { keys, default_policy }
    }
}

/// A loading policy a state can select by name instead of the defaults.
///
/// Tables without an entry keep their default policy. A missing local policy
/// keeps the local default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPersistencePolicy {
    pub name: String,
    pub table_policies: Vec<TableLoadingPolicy>,
    pub local_policy: Option<LocalAttributeLoadingPolicy>,
}

impl NamedPersistencePolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_policies: Vec::new(),
            local_policy: None,
        }
    }

    pub fn with_table_policy(mut self, policy: TableLoadingPolicy) -> Self {
        self.table_policies.push(policy);
        self
    }

    pub fn with_local_policy(mut self, policy: LocalAttributeLoadingPolicy) -> Self {
        self.local_policy = Some(policy);
        self
    }

    pub(crate) fn table_policy(&self, table_name: &str) -> Option<&TableLoadingPolicy> {
        self.table_policies.iter().find(|p| p.table_name == table_name)
    }
}

/// Persistence schema of a process.
///
/// # Example
///
/// ```
/// use durable_process_sdk::persistence::*;
/// use durable_process_sdk::api::DatabaseLockingType;
///
/// let schema = PersistenceSchema::new(
///     Some(GlobalAttributesSchema::new(vec![DbTableSchema::new(
///         "orders",
///         "order_id",
///         DatabaseLockingType::NoLocking,
///         vec![
///             DbColumnDef::new("orderStatus", "status", true),
///             DbColumnDef::new("orderTotal", "total", false),
///         ],
///     )])),
///     Some(LocalAttributesSchema::new(
///         None,
///         vec![LocalAttributeDef::new("attempts", LocalAttributeLoadingType::LoadNoLock)],
///     )),
/// )
/// .with_override_policy(
///     NamedPersistencePolicy::new("lockOrder").with_table_policy(TableLoadingPolicy::new(
///         "orders",
///         DatabaseLockingType::ExclusiveLock,
///         ["orderStatus", "orderTotal"],
///     )),
/// );
///
/// assert!(schema.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceSchema {
    pub global_attributes: Option<GlobalAttributesSchema>,
    pub local_attributes: Option<LocalAttributesSchema>,
    pub override_policies: Vec<NamedPersistencePolicy>,
}

impl PersistenceSchema {
    /// A schema without attributes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        global_attributes: Option<GlobalAttributesSchema>,
        local_attributes: Option<LocalAttributesSchema>,
    ) -> Self {
        Self {
            global_attributes,
            local_attributes,
            override_policies: Vec::new(),
        }
    }

    pub fn with_override_policy(mut self, policy: NamedPersistencePolicy) -> Self {
        self.override_policies.push(policy);
        self
    }

    pub fn tables(&self) -> &[DbTableSchema] {
        self.global_attributes
            .as_ref()
            .map(|g| g.tables.as_slice())
            .unwrap_or_default()
    }

    pub fn override_policy(&self, name: &str) -> Option<&NamedPersistencePolicy> {
        self.override_policies.iter().find(|p| p.name == name)
    }

    /// Checks the schema and builds its attribute lookup tables.
    ///
    /// Fails with [`ProcessError::ProcessDefinition`] when:
    /// - a table name, primary key, attribute key, or column is empty;
    /// - a table or override policy is declared twice;
    /// - an attribute key is declared twice, across all tables and local keys;
    /// - a column is bound twice within one table;
    /// - a policy names an unknown table, or a key outside its table or the
    ///   local keys;
    /// - a local policy loads a key both with and without lock, or loads keys
    ///   with lock without a locking type.
    pub fn validate(&self) -> ProcessResult<SchemaIndex> {
        let mut index = SchemaIndex::default();
        let mut table_names = HashSet::new();

        for table in self.tables() {
            if table.table_name.is_empty() {
                return Err(definition_error("global attribute table name is empty"));
            }
            if !table_names.insert(table.table_name.as_str()) {
                return Err(definition_error(format!(
                    "global attribute table '{}' is declared twice",
                    table.table_name
                )));
            }
            if table.primary_key.is_empty() {
                return Err(definition_error(format!(
                    "primary key of table '{}' is empty",
                    table.table_name
                )));
            }
            for column in &table.columns {
                index.add_global_attribute(&table.table_name, column)?;
            }
        }
        for table in self.tables() {
            validate_table_policy(&index, &table.default_policy)?;
        }

        if let Some(local) = &self.local_attributes {
            for key in &local.keys {
                if key.is_empty() {
                    return Err(definition_error("local attribute key is empty"));
                }
                if index.global.contains_key(key) || !index.local_keys.insert(key.clone()) {
                    return Err(definition_error(format!(
                        "attribute key '{}' is declared twice",
                        key
                    )));
                }
            }
            validate_local_policy(&index, &local.default_policy, "default")?;
        }

        let mut policy_names = HashSet::new();
        for policy in &self.override_policies {
            if policy.name.is_empty() {
                return Err(definition_error("persistence policy name is empty"));
            }
            if !policy_names.insert(policy.name.as_str()) {
                return Err(definition_error(format!(
                    "persistence policy '{}' is declared twice",
                    policy.name
                )));
            }
            let mut policy_tables = HashSet::new();
            for table_policy in &policy.table_policies {
                if !table_names.contains(table_policy.table_name.as_str()) {
                    return Err(definition_error(format!(
                        "persistence policy '{}' refers to unknown table '{}'",
                        policy.name, table_policy.table_name
                    )));
                }
                if !policy_tables.insert(table_policy.table_name.as_str()) {
                    return Err(definition_error(format!(
                        "persistence policy '{}' declares table '{}' twice",
                        policy.name, table_policy.table_name
                    )));
                }
                validate_table_policy(&index, table_policy)?;
            }
            if let Some(local_policy) = &policy.local_policy {
                validate_local_policy(&index, local_policy, &policy.name)?;
            }
        }

        Ok(index)
    }
}

/// Where a global attribute lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalAttributeDef {
    pub table_name: String,
    pub column: String,
    pub hint: Option<DbHint>,
}

/// Lookup tables derived from a validated [`PersistenceSchema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    global: HashMap<String, GlobalAttributeDef>,
    column_to_key: HashMap<(String, String), String>,
    local_keys: HashSet<String>,
}

impl SchemaIndex {
    fn add_global_attribute(&mut self, table_name: &str, column: &DbColumnDef) -> ProcessResult<()> {
        if column.key.is_empty() {
            return Err(definition_error(format!(
                "attribute key of a column in table '{}' is empty",
                table_name
            )));
        }
        if column.column.is_empty() {
            return Err(definition_error(format!(
                "column of attribute '{}' is empty",
                column.key
            )));
        }
        if self.global.contains_key(&column.key) {
            return Err(definition_error(format!(
                "attribute key '{}' is declared twice",
                column.key
            )));
        }
        let table_column = (table_name.to_string(), column.column.clone());
        if self.column_to_key.contains_key(&table_column) {
            return Err(definition_error(format!(
                "column '{}#{}' is bound twice",
                table_name, column.column
            )));
        }
        self.column_to_key.insert(table_column, column.key.clone());
        self.global.insert(
            column.key.clone(),
            GlobalAttributeDef {
                table_name: table_name.to_string(),
                column: column.column.clone(),
                hint: column.hint.clone(),
            },
        );
        Ok(())
    }

    pub fn global_attribute(&self, key: &str) -> Option<&GlobalAttributeDef> {
        self.global.get(key)
    }

    /// Attribute key bound to a table column.
    pub fn key_for_column(&self, table_name: &str, column: &str) -> Option<&str> {
        self.column_to_key
            .get(&(table_name.to_string(), column.to_string()))
            .map(String::as_str)
    }

    pub fn has_local_attribute(&self, key: &str) -> bool {
        self.local_keys.contains(key)
    }
}

fn validate_table_policy(index: &SchemaIndex, policy: &TableLoadingPolicy) -> ProcessResult<()> {
    for key in &policy.loading_keys {
        match index.global_attribute(key) {
            Some(def) if def.table_name == policy.table_name => {}
            _ => {
                return Err(definition_error(format!(
                    "loading policy of table '{}' refers to unknown attribute '{}'",
                    policy.table_name, key
                )))
            }
        }
    }
    Ok(())
}

fn validate_local_policy(
    index: &SchemaIndex,
    policy: &LocalAttributeLoadingPolicy,
    policy_name: &str,
) -> ProcessResult<()> {
    if !policy.keys_with_lock.is_empty() && policy.locking_type.is_none() {
        return Err(definition_error(format!(
            "local attribute policy '{}' loads keys with lock but has no locking type",
            policy_name
        )));
    }
    for key in policy.keys_with_lock.iter().chain(&policy.keys_no_lock) {
        if !index.has_local_attribute(key) {
            return Err(definition_error(format!(
                "local attribute policy '{}' refers to unknown key '{}'",
                policy_name, key
            )));
        }
    }
    if let Some(key) = policy
        .keys_no_lock
        .iter()
        .find(|key| policy.keys_with_lock.contains(*key))
    {
        return Err(definition_error(format!(
            "local attribute policy '{}' loads key '{}' both with and without lock",
            policy_name, key
        )));
    }
    Ok(())
}

fn definition_error(message: impl Into<String>) -> ProcessError {
    ProcessError::process_definition(message)
}
