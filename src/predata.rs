//! DDL synthesis
//! -------------
//! Deterministic, byte-exact SQL text generation. Every function here is
//! pure text-in/text-out over fully consolidated metadata, so the whole
//! rendering surface is unit-testable without a catalog connection.
//! Statements are separated by a blank line for diff-compatibility with
//! reference dumps.

use crate::catalog::SequenceDefinition;
use crate::ident::{quote_ident, SchemaObject};
use crate::metadata::{ColumnDefinition, TableDefinition};

/// Natural bounds of a bigint sequence; MAXVALUE/MINVALUE clauses collapse
/// to NO MAXVALUE/NO MINVALUE at these values.
const SEQ_MAX_VAL: i64 = 9223372036854775807;
const SEQ_MIN_VAL: i64 = -9223372036854775807;

/// Append one CREATE TABLE statement. Dropped columns are omitted entirely;
/// optional per-column clauses always appear in the order DEFAULT, NOT NULL,
/// ENCODING. An empty column list still renders the parenthesized block.
pub fn create_table_statement(
    buf: &mut String,
    tablename: &str,
    column_defs: &[ColumnDefinition],
    table_def: &TableDefinition,
) {
    buf.push_str(&format!("\n\nCREATE TABLE {} (\n", tablename));
    let mut lines: Vec<String> = Vec::new();
    for col in column_defs {
        if col.is_dropped {
            continue;
        }
        let mut line = format!("\t{} {}", quote_ident(&col.name), col.type_name);
        if col.has_default {
            line.push_str(&format!(" DEFAULT {}", col.def_val));
        }
        if col.not_null {
            line.push_str(" NOT NULL");
        }
        if let Some(encoding) = &col.encoding {
            line.push_str(&format!(" ENCODING ({})", encoding));
        }
        lines.push(line);
    }
    if !lines.is_empty() {
        buf.push_str(&lines.join(",\n"));
        buf.push('\n');
    }
    buf.push_str(") ");
    if !table_def.storage_opts.is_empty() {
        buf.push_str(&format!("WITH ({}) ", table_def.storage_opts));
    }
    buf.push_str(&table_def.dist_policy);
    let part_def = table_def.part_def.trim();
    if !part_def.is_empty() {
        buf.push_str(&format!(" {}", part_def));
    }
    buf.push_str(";\n");
    let part_template_def = table_def.part_template_def.trim();
    if !part_template_def.is_empty() {
        buf.push_str(&format!("{};\n", part_template_def));
    }
}

/// Append one CREATE SCHEMA statement per schema. The default schema never
/// gets explicit creation DDL; callers filter it already, but the guard here
/// keeps the invariant local.
pub fn create_schema_statements(buf: &mut String, schemas: &[SchemaObject]) {
    for schema in schemas {
        if schema.name != "public" {
            buf.push_str(&format!("\n\nCREATE SCHEMA {};", schema));
        }
    }
}

pub fn create_database_statement(buf: &mut String, dbname: &str) {
    buf.push_str(&format!("\n\nCREATE DATABASE {};", quote_ident(dbname)));
}

/// Append all constraint statements: the plain block first, then the
/// foreign-key block, each sorted lexicographically by final rendered
/// string. The global alphabetical sort keeps dumps identical across runs
/// even when catalog enumeration order varies.
pub fn constraint_statements(buf: &mut String, cons: &[String], fk_cons: &[String]) {
    let mut cons = cons.to_vec();
    let mut fk_cons = fk_cons.to_vec();
    cons.sort();
    fk_cons.sort();
    for con in &cons {
        buf.push_str(con);
        buf.push('\n');
    }
    for con in &fk_cons {
        buf.push_str(con);
        buf.push('\n');
    }
}

/// Append CREATE SEQUENCE plus a setval call per sequence. CREATE SEQUENCE
/// alone cannot encode "already consumed up to N", so the setval call pins
/// the restored sequence to its captured position exactly.
pub fn create_sequence_statements(buf: &mut String, sequences: &[SequenceDefinition]) {
    for sequence in sequences {
        buf.push_str(&format!("\n\nCREATE SEQUENCE {}\n", quote_ident(&sequence.name)));
        if !sequence.is_called {
            buf.push_str(&format!("\tSTART WITH {}\n", sequence.last_val));
        }
        buf.push_str(&format!("\tINCREMENT BY {}\n", sequence.increment));

        let no_max = (sequence.max_val == SEQ_MAX_VAL && sequence.increment > 0)
            || (sequence.max_val == -1 && sequence.increment < 0);
        if no_max {
            buf.push_str("\tNO MAXVALUE\n");
        } else {
            buf.push_str(&format!("\tMAXVALUE {}\n", sequence.max_val));
        }
        let no_min = (sequence.min_val == SEQ_MIN_VAL && sequence.increment < 0)
            || (sequence.min_val == 1 && sequence.increment > 0);
        if no_min {
            buf.push_str("\tNO MINVALUE\n");
        } else {
            buf.push_str(&format!("\tMINVALUE {}\n", sequence.min_val));
        }
        let cycle_str = if sequence.is_cycled { "\n\tCYCLE" } else { "" };
        buf.push_str(&format!("\tCACHE {}{};", sequence.cache_val, cycle_str));

        buf.push_str(&format!(
            "\n\nSELECT pg_catalog.setval('{}', {}, {});\n",
            sequence.name, sequence.last_val, sequence.is_called
        ));
    }
}
