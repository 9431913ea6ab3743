//! Static registry of every SQL statement the durable backend executes,
//! together with the typed shape of its bind parameters and result columns.
//! The execution helpers refuse descriptors that are not registry members,
//! which keeps ad-hoc SQL out of the backend.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;

use crate::error::{IndexError, Result};

// ─── Typed shapes ────────────────────────────────────────────────────

/// Shape of one bind parameter or result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    /// An integer column that may be NULL (member base types).
    IntNull,
    Text,
}

/// One value crossing the driver boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Null,
    Text(String),
}

impl Value {
    fn fits(&self, kind: Kind) -> bool {
        match (self, kind) {
            (Value::Int(_), Kind::Int | Kind::IntNull) => true,
            (Value::Null, Kind::IntNull) => true,
            (Value::Text(_), Kind::Text) => true,
            _ => false,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Int(v) => v.to_sql(),
            Value::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            Value::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

// ─── Statement registry ──────────────────────────────────────────────

/// A statement plus the declared shapes of its parameters and columns.
pub struct QueryDesc {
    pub sql: &'static str,
    pub params: &'static [Kind],
    pub cols: &'static [Kind],
}

use Kind::{Int, IntNull, Text};

pub static INSERT_FILE: QueryDesc = QueryDesc {
    sql: "INSERT INTO file (path) VALUES (?1)",
    params: &[Text],
    cols: &[],
};

pub static SELECT_FILE_BY_PATH: QueryDesc = QueryDesc {
    sql: "SELECT id FROM file WHERE path = ?1",
    params: &[Text],
    cols: &[Int],
};

pub static SELECT_FILE_BY_ID: QueryDesc = QueryDesc {
    sql: "SELECT path FROM file WHERE id = ?1",
    params: &[Int],
    cols: &[Text],
};

pub static INSERT_TYPE: QueryDesc = QueryDesc {
    sql: "INSERT INTO type (kind, complete, file, func, scope, line, \"column\") \
          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params: &[Int, Int, Int, Int, Int, Int, Int],
    cols: &[],
};

pub static SELECT_TYPE_BY_ID: QueryDesc = QueryDesc {
    sql: "SELECT kind, complete, file, func, scope, line, \"column\" \
          FROM type WHERE id = ?1",
    params: &[Int],
    cols: &[Int, Int, Int, Int, Int, Int, Int],
};

pub static INSERT_TYPENAME: QueryDesc = QueryDesc {
    sql: "INSERT INTO typename (name, kind, base_type, file, func, scope, line, \"column\") \
          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params: &[Text, Int, Int, Int, Int, Int, Int, Int],
    cols: &[],
};

// Scope is pinned to 0: nested-scope lookup behavior is undefined and the
// indexer only writes global-scope typenames.
pub static SELECT_TYPENAME_MATCH: QueryDesc = QueryDesc {
    sql: "SELECT base_type FROM typename \
          WHERE file = ?1 AND scope = 0 AND name = ?2 AND kind = ?3",
    params: &[Int, Text, Int],
    cols: &[Int],
};

// Keyset-paginated search step: one row per call, anchored on rowid, so the
// cursor never holds a statement open across calls.
pub static SELECT_TYPENAME_FIND: QueryDesc = QueryDesc {
    sql: "SELECT rowid, name, kind, base_type, file, func, scope, line, \"column\" \
          FROM typename WHERE name LIKE ?1 AND rowid > ?2 ORDER BY rowid LIMIT 1",
    params: &[Text, Int],
    cols: &[Int, Text, Int, Int, Int, Int, Int, Int, Int],
};

pub static INSERT_MEMBER: QueryDesc = QueryDesc {
    sql: "INSERT INTO member (parent, base_type, name, file, line, \"column\") \
          VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params: &[Int, IntNull, Text, Int, Int, Int],
    cols: &[],
};

pub static SELECT_MEMBER: QueryDesc = QueryDesc {
    sql: "SELECT parent, base_type, name, file, line, \"column\" \
          FROM member WHERE parent = ?1 AND name LIKE ?2 LIMIT 1",
    params: &[Int, Text],
    cols: &[Int, IntNull, Text, Int, Int, Int],
};

pub static INSERT_TYPE_USE: QueryDesc = QueryDesc {
    sql: "INSERT INTO type_use (base_type, kind, file, line, \"column\") \
          VALUES (?1, ?2, ?3, ?4, ?5)",
    params: &[Int, Int, Int, Int, Int],
    cols: &[],
};

/// Every descriptor the backend may execute.
pub static REGISTRY: &[&QueryDesc] = &[
    &INSERT_FILE,
    &SELECT_FILE_BY_PATH,
    &SELECT_FILE_BY_ID,
    &INSERT_TYPE,
    &SELECT_TYPE_BY_ID,
    &INSERT_TYPENAME,
    &SELECT_TYPENAME_MATCH,
    &SELECT_TYPENAME_FIND,
    &INSERT_MEMBER,
    &SELECT_MEMBER,
    &INSERT_TYPE_USE,
];

/// Table creation, executed once per read-write open. `IF NOT EXISTS`
/// makes reopening an existing database a no-op.
pub static CREATE_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS type (
    id INTEGER PRIMARY KEY,
    kind INTEGER NOT NULL,
    complete INTEGER NOT NULL,
    file INTEGER NOT NULL,
    func INTEGER NOT NULL,
    scope INTEGER NOT NULL,
    line INTEGER NOT NULL,
    \"column\" INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS typename (
    name TEXT NOT NULL,
    kind INTEGER NOT NULL,
    base_type INTEGER NOT NULL,
    file INTEGER NOT NULL,
    func INTEGER NOT NULL,
    scope INTEGER NOT NULL,
    line INTEGER NOT NULL,
    \"column\" INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS incomplete_type (
    name TEXT NOT NULL,
    kind INTEGER NOT NULL,
    base_type INTEGER NOT NULL,
    file INTEGER NOT NULL,
    line INTEGER NOT NULL,
    \"column\" INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS type_use (
    base_type INTEGER NOT NULL,
    kind INTEGER NOT NULL,
    file INTEGER NOT NULL,
    line INTEGER NOT NULL,
    \"column\" INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS member (
    parent INTEGER NOT NULL,
    base_type INTEGER,
    name TEXT NOT NULL,
    file INTEGER NOT NULL,
    line INTEGER NOT NULL,
    \"column\" INTEGER NOT NULL
);
";

/// Membership check for the registry: descriptors are compared by address,
/// so only the statics above pass.
pub fn assert_registered(desc: &'static QueryDesc) {
    assert!(
        REGISTRY.iter().any(|d| std::ptr::eq(*d, desc)),
        "statement not in the query registry: {}",
        desc.sql
    );
}

// ─── Serialization boundary ──────────────────────────────────────────

/// Check a bind vector against the declared parameter shape.
pub fn check_params(desc: &QueryDesc, values: &[Value]) -> Result<()> {
    if values.len() != desc.params.len() {
        return Err(IndexError::Range(format!(
            "statement expects {} parameters, got {}",
            desc.params.len(),
            values.len()
        )));
    }
    for (i, (value, kind)) in values.iter().zip(desc.params).enumerate() {
        if !value.fits(*kind) {
            return Err(IndexError::Range(format!(
                "parameter {} has wrong shape for {:?}",
                i + 1,
                kind
            )));
        }
    }
    Ok(())
}

/// Read one driver row into a typed value vector, reporting corruption on
/// any column whose stored type violates the declared shape.
pub fn read_row(row: &Row<'_>, desc: &QueryDesc) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(desc.cols.len());
    for (i, kind) in desc.cols.iter().enumerate() {
        let value = row.get_ref(i).map_err(IndexError::from)?;
        let value = match (value, kind) {
            (ValueRef::Integer(v), Kind::Int | Kind::IntNull) => Value::Int(v),
            (ValueRef::Null, Kind::IntNull) => Value::Null,
            (ValueRef::Text(bytes), Kind::Text) => match std::str::from_utf8(bytes) {
                Ok(s) => Value::Text(s.to_string()),
                Err(_) => {
                    return Err(IndexError::Corruption(format!(
                        "column {} holds invalid UTF-8",
                        i
                    )))
                }
            },
            (other, kind) => {
                return Err(IndexError::Corruption(format!(
                    "column {} holds {:?}, expected {:?}",
                    i,
                    other.data_type(),
                    kind
                )))
            }
        };
        out.push(value);
    }
    Ok(out)
}

/// Decode a durable id column, rejecting negatives read back from disk.
pub fn id_from(value: &Value, what: &str) -> Result<i64> {
    match value {
        Value::Int(v) if *v >= 0 => Ok(*v),
        Value::Int(v) => Err(IndexError::Range(format!("negative {what}: {v}"))),
        _ => Err(IndexError::Corruption(format!("{what} is not an integer"))),
    }
}

/// Decode a line/column/scope counter into `u32`.
pub fn counter_from(value: &Value, what: &str) -> Result<u32> {
    let v = id_from(value, what)?;
    u32::try_from(v).map_err(|_| IndexError::Range(format!("{what} out of range: {v}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_all_statics() {
        assert_registered(&INSERT_FILE);
        assert_registered(&SELECT_TYPENAME_FIND);
        assert_registered(&INSERT_TYPE_USE);
    }

    #[test]
    #[should_panic(expected = "not in the query registry")]
    fn test_foreign_descriptor_rejected() {
        static ROGUE: QueryDesc = QueryDesc {
            sql: "DROP TABLE type",
            params: &[],
            cols: &[],
        };
        assert_registered(&ROGUE);
    }

    #[test]
    fn test_check_params_arity() {
        let err = check_params(&INSERT_FILE, &[]).unwrap_err();
        assert!(matches!(err, IndexError::Range(_)));
    }

    #[test]
    fn test_check_params_shape() {
        assert!(check_params(&INSERT_FILE, &[Value::Text("a.c".into())]).is_ok());
        assert!(check_params(&INSERT_FILE, &[Value::Int(1)]).is_err());
        // NULL only fits nullable slots.
        assert!(check_params(&SELECT_FILE_BY_ID, &[Value::Null]).is_err());
        assert!(check_params(
            &INSERT_MEMBER,
            &[
                Value::Int(1),
                Value::Null,
                Value::Text("a".into()),
                Value::Int(1),
                Value::Int(1),
                Value::Int(14),
            ],
        )
        .is_ok());
    }

    #[test]
    fn test_id_from_rejects_negative() {
        assert_eq!(id_from(&Value::Int(7), "type id").unwrap(), 7);
        assert!(matches!(
            id_from(&Value::Int(-1), "type id"),
            Err(IndexError::Range(_))
        ));
        assert!(matches!(
            id_from(&Value::Text("x".into()), "type id"),
            Err(IndexError::Corruption(_))
        ));
    }
}
