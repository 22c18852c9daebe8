//! Metadata consolidation
//! ----------------------
//! Pure merging of catalog query rows into the per-column and per-constraint
//! shapes the DDL renderers consume. Nothing here touches the database.

use crate::catalog::{ColumnAttribute, ColumnDefault, ConstraintRow};
use crate::ident::Relation;

/// One fully consolidated column. Dropped columns are retained here and
/// filtered only at render time, so downstream logic that references
/// original attribute numbers still lines up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub num: i32,
    pub name: String,
    pub not_null: bool,
    pub has_default: bool,
    pub is_dropped: bool,
    pub type_name: String,
    pub encoding: Option<String>,
    pub def_val: String,
}

/// Table-level structural facts gathered from the per-table queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    pub dist_policy: String,
    pub part_def: String,
    pub part_template_def: String,
    pub storage_opts: String,
}

/// Merge attribute rows with default-expression rows into column
/// definitions. Both input lists are ordered by attribute number (the
/// queries ORDER BY oid then attnum), so this is a two-pointer merge:
/// defaults are consumed in order and never re-scanned from the start.
/// Attributes drive the merge; the defaults list is sparse.
pub fn consolidate_columns(
    atts: &[ColumnAttribute],
    defaults: &[ColumnDefault],
) -> Vec<ColumnDefinition> {
    let mut col_defs = Vec::with_capacity(atts.len());
    let mut j = 0;
    for att in atts {
        let mut def_val = String::new();
        if att.has_default {
            while j < defaults.len() {
                if att.att_num == defaults[j].att_num {
                    def_val = defaults[j].def_val.clone();
                    break;
                }
                j += 1;
            }
        }
        col_defs.push(ColumnDefinition {
            num: att.att_num,
            name: att.name.clone(),
            not_null: att.not_null,
            has_default: att.has_default,
            is_dropped: att.is_dropped,
            type_name: att.type_name.clone(),
            encoding: att.encoding.clone(),
            def_val,
        });
    }
    col_defs
}

/// Build ALTER TABLE ... ADD CONSTRAINT statements for one table and split
/// them into (plain, foreign-key) lists. Foreign keys go in a separate list
/// since they must be printed after all other constraints.
pub fn split_constraints(table: &Relation, constraints: &[ConstraintRow]) -> (Vec<String>, Vec<String>) {
    let alter_str = format!("\n\nALTER TABLE ONLY {} ADD CONSTRAINT", table);
    let mut cons = Vec::new();
    let mut fk_cons = Vec::new();
    for constraint in constraints {
        let con_str = format!("{} {} {};", alter_str, constraint.name, constraint.definition);
        if constraint.con_type == "f" {
            fk_cons.push(con_str);
        } else {
            cons.push(con_str);
        }
    }
    (cons, fk_cons)
}
