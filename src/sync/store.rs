// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Store handler (C10): MySQL-backed durable storage for one row type.
//! Statements are precomputed once from [`RowMeta`], mirroring
//! `db_impl/mysql.go`'s `MysqlHandler.Init` building the four SQL strings up
//! front instead of on every call.

use std::marker::PhantomData;

use serde_json::Value;
use sqlx::{MySql, MySqlPool, mysql::MySqlRow};

use super::{error::SyncError, field_meta::RowMeta};

pub struct StoreHandler<T> {
    pool: MySqlPool,
    load_one_sql: String,
    save_one_sql: String,
    del_one_sql: String,
    load_batch_prefix: String,
    load_batch_clause: String,
    _marker: PhantomData<T>,
}

impl<T> StoreHandler<T>
where
    T: RowMeta + for<'r> sqlx::FromRow<'r, MySqlRow> + Send + Unpin,
{
    pub fn new(pool: MySqlPool) -> Self {
        let meta = T::row_meta();

        let load_one_sql =
            format!("select * from `{}` where {}", meta.table, where_clause(meta.primary_names));

        let update_names: Vec<&str> = meta.all_names.iter().copied().filter(|n| !meta.primary_names.contains(n)).collect();
        let save_one_sql = format!(
            "insert into `{}` ({}) values ({}) on duplicate key update {}",
            meta.table,
            columns_list(meta.all_names),
            placeholders(meta.all_names.len()),
            update_list(&update_names),
        );

        let del_one_sql = format!("delete from `{}` where {}", meta.table, where_clause(meta.primary_names));

        let load_batch_prefix = format!("select * from `{}` where ", meta.table);
        let load_batch_clause = format!("({})", where_clause(meta.primary_names));

        Self { pool, load_one_sql, save_one_sql, del_one_sql, load_batch_prefix, load_batch_clause, _marker: PhantomData }
    }

    pub async fn load_one(&self, primary_values: &[String]) -> Result<Option<T>, SyncError> {
        let mut query = sqlx::query_as::<_, T>(&self.load_one_sql);
        for v in primary_values {
            query = query.bind(v.as_str());
        }
        match query.fetch_optional(&self.pool).await {
            Ok(row) => Ok(row),
            Err(err) => Err(SyncError::Store(err)),
        }
    }

    pub async fn save_one(&self, data: &T) -> Result<(), SyncError> {
        let meta = T::row_meta();
        let values = data.all_values();
        let update_values: Vec<&(&'static str, Value)> =
            values.iter().filter(|(name, _)| !meta.primary_names.contains(name)).collect();

        let mut query = sqlx::query(&self.save_one_sql);
        for (_, v) in &values {
            query = bind_json(query, v);
        }
        for (_, v) in update_values {
            query = bind_json(query, v);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    pub async fn del_one(&self, primary_values: &[String]) -> Result<(), SyncError> {
        let mut query = sqlx::query(&self.del_one_sql);
        for v in primary_values {
            query = query.bind(v.as_str());
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    pub async fn load_batch(&self, keys: &[Vec<String>]) -> Result<Vec<T>, SyncError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = self.load_batch_prefix.clone();
        for (idx, _) in keys.iter().enumerate() {
            if idx != 0 {
                sql.push_str(" or ");
            }
            sql.push_str(&self.load_batch_clause);
        }

        let mut query = sqlx::query_as::<_, T>(&sql);
        for key in keys {
            for v in key {
                query = query.bind(v.as_str());
            }
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

fn where_clause(names: &[&str]) -> String {
    names.iter().map(|n| format!("`{n}`=?")).collect::<Vec<_>>().join(" and ")
}

fn columns_list(names: &[&str]) -> String {
    names.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(",")
}

fn update_list(names: &[&str]) -> String {
    names.iter().map(|n| format!("`{n}`=?")).collect::<Vec<_>>().join(",")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn bind_json<'q>(query: sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments>, value: &'q Value) -> sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => query.bind(i),
            (None, Some(u), _) => query.bind(u as i64),
            (None, None, f) => query.bind(f.unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_fragments_match_the_precomputed_shape() {
        assert_eq!(where_clause(&["a", "b"]), "`a`=? and `b`=?");
        assert_eq!(columns_list(&["a", "b", "c"]), "`a`,`b`,`c`");
        assert_eq!(update_list(&["b", "c"]), "`b`=?,`c`=?");
        assert_eq!(placeholders(3), "?,?,?");
    }
}
