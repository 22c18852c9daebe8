//! Identifier quoting and relation naming
//! --------------------------------------
//! Single source of truth for rendering schema/table/sequence identifiers
//! into SQL text. An identifier may be emitted bare only if it begins with a
//! lowercase letter or underscore and contains only lowercase letters,
//! digits, and underscores; everything else is double-quoted with internal
//! quotes doubled, like quote_ident in Postgres.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static UNQUOTED_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap());

/// Quote an identifier (schema, table, or sequence name) if it cannot be
/// used bare in a Postgres query.
pub fn quote_ident(ident: &str) -> String {
    if UNQUOTED_IDENTIFIER.is_match(ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// One dumpable relation as discovered from the catalog. Oids are stable for
/// the duration of the backup transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub schema_oid: u32,
    pub table_oid: u32,
    pub schema_name: String,
    pub table_name: String,
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", quote_ident(&self.schema_name), quote_ident(&self.table_name))
    }
}

/// Any named catalog object with an oid; mostly schemas and sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaObject {
    pub oid: u32,
    pub name: String,
}

impl Display for SchemaObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", quote_ident(&self.name))
    }
}

/// Given the discovered relations, return the distinct schemas they live in,
/// sorted by name. `public` is excluded since it never needs explicit DDL.
pub fn unique_schemas(tables: &[Relation]) -> Vec<SchemaObject> {
    let mut schemas: Vec<SchemaObject> = Vec::new();
    for table in tables {
        if table.schema_name == "public" {
            continue;
        }
        let schema = SchemaObject { oid: table.schema_oid, name: table.schema_name.clone() };
        if !schemas.contains(&schema) {
            schemas.push(schema);
        }
    }
    schemas.sort_by(|a, b| a.name.cmp(&b.name));
    schemas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(schema: &str, table: &str) -> Relation {
        Relation {
            schema_oid: 0,
            table_oid: 0,
            schema_name: schema.to_string(),
            table_name: table.to_string(),
        }
    }

    #[test]
    fn plain_identifiers_stay_bare() {
        assert_eq!(quote_ident("tablename"), "tablename");
        assert_eq!(quote_ident("_private"), "_private");
        assert_eq!(quote_ident("t2"), "t2");
    }

    #[test]
    fn mixed_case_and_digit_leading_get_quoted() {
        assert_eq!(quote_ident("TableName"), "\"TableName\"");
        assert_eq!(quote_ident("2fast"), "\"2fast\"");
        assert_eq!(quote_ident("has space"), "\"has space\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident("tricky\"name"), "\"tricky\"\"name\"");
    }

    #[test]
    fn relation_display_quotes_each_part() {
        assert_eq!(rel("public", "foo").to_string(), "public.foo");
        assert_eq!(rel("Caps", "foo bar").to_string(), "\"Caps\".\"foo bar\"");
    }

    #[test]
    fn unique_schemas_sorted_and_public_excluded() {
        let tables = vec![rel("zoo", "a"), rel("public", "b"), rel("app", "c"), rel("zoo", "d")];
        let schemas = unique_schemas(&tables);
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["app", "zoo"]);
    }
}
