// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dirty marker (C11): a Redis set of encoded cache keys awaiting flush to
//! the store, a straight port of `mark.SimpleMarker[T]`. The encoded form
//! wraps the cache-key field values in braces (`{f1:f2}`) so `drain` can
//! losslessly split them back apart.

use std::marker::PhantomData;

use redis::{AsyncCommands, aio::ConnectionManager};

use super::{error::SyncError, field_meta::RowMeta};

pub struct Marker<T> {
    conn: ConnectionManager,
    set_key: String,
    _marker: PhantomData<T>,
}

fn encode(cache_values: &[String]) -> String {
    format!("{{{}}}", cache_values.join(":"))
}

fn decode(encoded: &str, expected_fields: usize) -> Option<Vec<String>> {
    let inner = encoded.strip_prefix('{')?.strip_suffix('}')?;
    let parts: Vec<String> = inner.split(':').map(str::to_string).collect();
    if parts.len() != expected_fields { None } else { Some(parts) }
}

impl<T> Marker<T>
where
    T: RowMeta + Send + Sync,
{
    pub fn new(conn: ConnectionManager, set_key: impl Into<String>) -> Self {
        Self { conn, set_key: set_key.into(), _marker: PhantomData }
    }

    pub async fn mark(&self, cache_values: &[String]) -> Result<(), SyncError> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(&self.set_key, encode(cache_values)).await?;
        Ok(())
    }

    pub async fn unmark(&self, cache_values: &[String]) -> Result<(), SyncError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(&self.set_key, encode(cache_values)).await?;
        Ok(())
    }

    /// Samples up to `max` dirty keys (sampling, not popping — a key may be
    /// re-sampled by a concurrent flusher before it is unmarked).
    pub async fn drain(&self, max: isize) -> Result<Vec<Vec<String>>, SyncError> {
        let mut conn = self.conn.clone();
        let encoded: Vec<String> = conn.srandmember_multiple(&self.set_key, max.max(0) as usize).await?;
        let expected_fields = T::row_meta().cache_names.len();
        Ok(encoded.iter().filter_map(|e| decode(e, expected_fields)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wraps_in_braces_and_joins_with_colons() {
        assert_eq!(encode(&["3".into(), "42".into()]), "{3:42}");
    }

    #[test]
    fn decode_reverses_encode() {
        let values = vec!["3".to_string(), "42".to_string()];
        let encoded = encode(&values);
        assert_eq!(decode(&encoded, 2), Some(values));
    }

    #[test]
    fn decode_rejects_mismatched_field_count() {
        assert_eq!(decode("{3:42}", 3), None);
    }

    #[test]
    fn decode_rejects_unwrapped_input() {
        assert_eq!(decode("3:42", 2), None);
    }
}
