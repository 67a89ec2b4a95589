//! Content-keyed cache of planned schemas

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use log::{debug, trace};

use super::{RecordSchema, SchemaDef};
use crate::{error::SchemaError, layout::LayoutPlanner};

/// Plans each distinct [`SchemaDef`] once and hands out shared results
#[derive(Debug)]
pub struct SchemaCache {
    planner: LayoutPlanner,
    schemas: RwLock<HashMap<SchemaDef, Arc<RecordSchema>>>,
}

static GLOBAL_CACHE: OnceLock<SchemaCache> = OnceLock::new();

impl SchemaCache {
    /// Create an empty cache planning with `planner`
    pub fn new(planner: LayoutPlanner) -> Self {
        Self {
            planner,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide cache using the default planner
    pub fn global() -> &'static SchemaCache {
        GLOBAL_CACHE.get_or_init(|| SchemaCache::new(LayoutPlanner::default()))
    }

    /// Get the planned schema for `def`, planning it on first use
    pub fn get_or_plan(&self, def: &SchemaDef) -> Result<Arc<RecordSchema>, SchemaError> {
        {
            let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(schema) = schemas.get(def) {
                trace!("Schema cache hit for {}", def.name);
                return Ok(schema.clone());
            }
        }

        let planned = Arc::new(self.planner.plan(def)?);
        debug!(
            "Schema cache miss for {}: planned {} bytes",
            def.name,
            planned.size_in_bytes()
        );

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have planned the same definition meanwhile
        Ok(schemas.entry(def.clone()).or_insert(planned).clone())
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached schema
    pub fn clear(&self) {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
