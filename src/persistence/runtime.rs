//! Per-invocation attribute access for `execute`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::api::{
    EncodedObject, GlobalAttributeTableRowUpdate, KeyValue, LoadGlobalAttributeResponse,
    LoadLocalAttributesResponse, TableColumnValue,
};
use crate::error::{ProcessError, ProcessResult};
use crate::serdes::{SharedDbConverter, SharedObjectEncoder};

use super::schema::SchemaIndex;

/// Attribute view of one `execute` invocation.
///
/// Built from the attributes the server loaded for the state. Reads see the
/// loaded value or an earlier write of the same invocation; writes are
/// collected and returned to the server with the response.
///
/// Accessing a key the persistence schema does not declare is a programming
/// error and panics. The worker turns the panic into a worker execution error.
pub struct Persistence {
    db_converter: SharedDbConverter,
    encoder: SharedObjectEncoder,
    index: Arc<SchemaIndex>,
    current_global: HashMap<String, TableColumnValue>,
    updated_global: Vec<(String, TableColumnValue)>,
    current_local: HashMap<String, EncodedObject>,
    updated_local: Vec<KeyValue>,
}

impl Persistence {
    /// Builds the view from loaded attributes.
    ///
    /// Fails with [`ProcessError::ProcessDefinition`] if a loaded column or
    /// local key is not part of the schema.
    pub fn new(
        db_converter: SharedDbConverter,
        encoder: SharedObjectEncoder,
        index: Arc<SchemaIndex>,
        loaded_global: Option<&LoadGlobalAttributeResponse>,
        loaded_local: Option<&LoadLocalAttributesResponse>,
    ) -> ProcessResult<Self> {
        let mut current_global = HashMap::new();
        for table in loaded_global.map(|g| g.table_responses.as_slice()).unwrap_or_default() {
            for column in &table.columns {
                let key = index
                    .key_for_column(&table.table_name, &column.db_column)
                    .ok_or_else(|| {
                        ProcessError::process_definition(format!(
                            "loaded column '{}#{}' is not bound to a global attribute",
                            table.table_name, column.db_column
                        ))
                    })?;
                current_global.insert(key.to_string(), column.clone());
            }
        }

        let mut current_local = HashMap::new();
        for attribute in loaded_local.map(|l| l.attributes.as_slice()).unwrap_or_default() {
            if !index.has_local_attribute(&attribute.key) {
                return Err(ProcessError::process_definition(format!(
                    "loaded local attribute '{}' is not declared",
                    attribute.key
                )));
            }
            current_local.insert(attribute.key.clone(), attribute.value.clone());
        }

        Ok(Self {
            db_converter,
            encoder,
            index,
            current_global,
            updated_global: Vec::new(),
            current_local,
            updated_local: Vec::new(),
        })
    }

    /// Reads a global attribute, `Ok(None)` if it was not loaded or written.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a declared global attribute.
    pub fn get_global_attribute<T: DeserializeOwned>(&self, key: &str) -> ProcessResult<Option<T>> {
        let Some(def) = self.index.global_attribute(key) else {
            panic!("global attribute '{}' is not declared in the persistence schema", key);
        };
        match self.current_global.get(key) {
            Some(value) => Ok(self
                .db_converter
                .from_db(&value.db_query_value, def.hint.as_ref())?),
            None => Ok(None),
        }
    }

    /// Writes a global attribute.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a declared global attribute.
    pub fn set_global_attribute<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> ProcessResult<()> {
        let Some(def) = self.index.global_attribute(key) else {
            panic!("global attribute '{}' is not declared in the persistence schema", key);
        };
        let column_value = TableColumnValue {
            db_column: def.column.clone(),
            db_query_value: self.db_converter.to_db(value, def.hint.as_ref())?,
        };
        self.current_global.insert(key.to_string(), column_value.clone());
        match self.updated_global.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = column_value,
            None => self.updated_global.push((key.to_string(), column_value)),
        }
        Ok(())
    }

    /// Reads a local attribute, `Ok(None)` if it was not loaded or written.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a declared local attribute.
    pub fn get_local_attribute<T: DeserializeOwned>(&self, key: &str) -> ProcessResult<Option<T>> {
        if !self.index.has_local_attribute(key) {
            panic!("local attribute '{}' is not declared in the persistence schema", key);
        }
        match self.current_local.get(key) {
            Some(value) => Ok(self.encoder.decode(value)?),
            None => Ok(None),
        }
    }

    /// Writes a local attribute.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a declared local attribute.
    pub fn set_local_attribute<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> ProcessResult<()> {
        if !self.index.has_local_attribute(key) {
            panic!("local attribute '{}' is not declared in the persistence schema", key);
        }
        let encoded = self.encoder.encode(value)?;
        self.current_local.insert(key.to_string(), encoded.clone());
        match self.updated_local.iter_mut().find(|kv| kv.key == key) {
            Some(existing) => existing.value = encoded,
            None => self.updated_local.push(KeyValue {
                key: key.to_string(),
                value: encoded,
            }),
        }
        Ok(())
    }

    /// Global attribute writes, one row update per table.
    ///
    /// Tables appear in the order of their first write; columns within a
    /// table in the order their keys were first written.
    pub fn global_attributes_to_update(&self) -> Vec<GlobalAttributeTableRowUpdate> {
        let mut updates: Vec<GlobalAttributeTableRowUpdate> = Vec::new();
        for (key, value) in &self.updated_global {
            let Some(def) = self.index.global_attribute(key) else {
                continue;
            };
            match updates.iter_mut().find(|u| u.table_name == def.table_name) {
                Some(update) => update.update_columns.push(value.clone()),
                None => updates.push(GlobalAttributeTableRowUpdate {
                    table_name: def.table_name.clone(),
                    update_columns: vec![value.clone()],
                }),
            }
        }
        updates
    }

    /// Local attribute writes in the order their keys were first written.
    pub fn local_attributes_to_update(&self) -> Vec<KeyValue> {
        self.updated_local.clone()
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("loaded_global", &self.current_global.len())
            .field("updated_global", &self.updated_global.len())
            .field("loaded_local", &self.current_local.len())
            .field("updated_local", &self.updated_local.len())
            .finish()
    }
}
