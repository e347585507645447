//! Attribute load requests attached to a state's configuration.
//!
//! The server loads (and locks) attributes before invoking `execute`, using
//! the requests derived here from the state's selected policy.

use crate::api::{
    LoadGlobalAttributesRequest, LoadLocalAttributesRequest, TableColumnDef, TableReadRequest,
};
use crate::error::{ProcessError, ProcessResult};

use super::schema::{NamedPersistencePolicy, PersistenceSchema, SchemaIndex};

impl PersistenceSchema {
    /// Resolves the override policy a state selects by name.
    ///
    /// `None` selects the defaults. An unknown name is a definition error.
    pub fn resolve_policy(&self, policy_name: Option<&str>) -> ProcessResult<Option<&NamedPersistencePolicy>> {
        match policy_name {
            None => Ok(None),
            Some(name) => self.override_policy(name).map(Some).ok_or_else(|| {
                ProcessError::process_definition(format!("persistence policy '{}' is not defined", name))
            }),
        }
    }

    /// Builds the global attribute load request for the given policy.
    ///
    /// Every table is read: with the override policy's entry for that table
    /// when present, with the table's default policy otherwise. Returns `None`
    /// when the schema declares no tables.
    pub fn load_global_attributes_request(
        &self,
        index: &SchemaIndex,
        policy: Option<&NamedPersistencePolicy>,
    ) -> Option<LoadGlobalAttributesRequest> {
        let table_requests: Vec<TableReadRequest> = self
            .tables()
            .iter()
            .map(|table| {
                let table_policy = policy
                    .and_then(|p| p.table_policy(&table.table_name))
                    .unwrap_or(&table.default_policy);
                TableReadRequest {
                    table_name: table.table_name.clone(),
                    locking_type: Some(table_policy.locking_type),
                    columns: table_policy
                        .loading_keys
                        .iter()
                        .filter_map(|key| index.global_attribute(key))
                        .map(|def| TableColumnDef {
                            db_column: def.column.clone(),
                        })
                        .collect(),
                }
            })
            .collect();
        if table_requests.is_empty() {
            return None;
        }
        Some(LoadGlobalAttributesRequest { table_requests })
    }

    /// Builds the local attribute load request for the given policy.
    ///
    /// Uses the override policy's local policy when present, the schema's
    /// default otherwise. Returns `None` when neither exists.
    pub fn load_local_attributes_request(
        &self,
        policy: Option<&NamedPersistencePolicy>,
    ) -> Option<LoadLocalAttributesRequest> {
        let local_policy = policy
            .and_then(|p| p.local_policy.as_ref())
            .or_else(|| self.local_attributes.as_ref().map(|l| &l.default_policy))?;
        Some(LoadLocalAttributesRequest {
            locking_type: local_policy.locking_type,
            keys_to_load_no_lock: local_policy.keys_no_lock.clone(),
            keys_to_load_with_lock: local_policy.keys_with_lock.clone(),
        })
    }
}
