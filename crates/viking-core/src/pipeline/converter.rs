//! Context to embedding message conversion.
//!
//! The converter is the last point before content enters the shared queue, so
//! it repairs tenant attribution: a record that reaches it without
//! `account_id`/`owner_space` gets them re-derived from its identity and uri
//! with the same rules [`Context::new`] uses. Fields that are already set are
//! left alone.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::msg::EmbeddingMsg;
use crate::context::{derive_account_id, derive_owner_space, Context, ContextLevel};
use crate::errors::VikingResult;

/// Converts contexts into [`EmbeddingMsg`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingMsgConverter;

impl EmbeddingMsgConverter {
    /// Convert a context, or `None` when it has no vectorizable text.
    pub fn from_context(context: &Context) -> Option<EmbeddingMsg> {
        let text = context.vectorizable_text();
        if text.is_empty() {
            trace!(uri = %context.uri, "skipping context with empty vectorizable text");
            return None;
        }

        let mut record = context.clone();
        Self::backfill_tenant(&mut record);
        record.level = ContextLevel::from_uri(&record.uri);
        Some(EmbeddingMsg::new(text, record))
    }

    /// Like [`from_context`](Self::from_context), then applies `overrides`
    /// to the record. Null overrides are ignored.
    pub fn with_overrides(
        context: &Context,
        overrides: &Map<String, Value>,
    ) -> VikingResult<Option<EmbeddingMsg>> {
        let Some(mut msg) = Self::from_context(context) else {
            return Ok(None);
        };
        if overrides.values().all(Value::is_null) {
            return Ok(Some(msg));
        }

        let mut record = msg.context.to_record()?;
        if let Value::Object(map) = &mut record {
            for (key, value) in overrides.iter().filter(|(_, v)| !v.is_null()) {
                map.insert(key.clone(), value.clone());
            }
        }
        msg.context = Context::from_record(record)?;
        debug!(uri = %msg.context.uri, keys = overrides.len(), "applied record overrides");
        Ok(Some(msg))
    }

    /// Fill missing `account_id`/`owner_space` from identity and uri.
    ///
    /// Idempotent: non-empty values are never changed.
    pub fn backfill_tenant(context: &mut Context) {
        if context.account_id.is_empty() {
            context.account_id = derive_account_id(context.user.as_ref());
        }
        if context.owner_space.is_empty() {
            context.owner_space = derive_owner_space(&context.uri, context.user.as_ref());
        }
    }
}
