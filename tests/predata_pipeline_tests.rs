//! End-to-end tests over the pure render pipeline: fixture catalog rows in,
//! SQL text out, no database connection involved.

use gpmetadump::catalog::{ColumnAttribute, ColumnDefault, ConstraintRow, SequenceDefinition};
use gpmetadump::ident::{unique_schemas, Relation};
use gpmetadump::metadata::{consolidate_columns, split_constraints, TableDefinition};
use gpmetadump::predata;

fn rel(schema: &str, table: &str) -> Relation {
    Relation {
        schema_oid: 0,
        table_oid: 0,
        schema_name: schema.to_string(),
        table_name: table.to_string(),
    }
}

fn att(num: i32, name: &str, type_name: &str) -> ColumnAttribute {
    ColumnAttribute {
        att_num: num,
        name: name.to_string(),
        not_null: false,
        has_default: false,
        is_dropped: false,
        type_name: type_name.to_string(),
        encoding: None,
    }
}

fn random_dist() -> TableDefinition {
    TableDefinition { dist_policy: "DISTRIBUTED RANDOMLY".to_string(), ..Default::default() }
}

/// Assemble a full predata + postdata rendering from fixture rows, the way
/// the orchestrator does.
fn render_all(
    tables: &[(Relation, Vec<ColumnAttribute>, Vec<ColumnDefault>, TableDefinition, Vec<ConstraintRow>)],
    sequences: &[SequenceDefinition],
) -> (String, String) {
    let relations: Vec<Relation> = tables.iter().map(|t| t.0.clone()).collect();
    let schemas = unique_schemas(&relations);

    let mut predata_buf = String::new();
    predata::create_schema_statements(&mut predata_buf, &schemas);
    predata::create_sequence_statements(&mut predata_buf, sequences);

    let mut all_cons = Vec::new();
    let mut all_fk_cons = Vec::new();
    for (table, atts, defaults, table_def, constraints) in tables {
        let columns = consolidate_columns(atts, defaults);
        predata::create_table_statement(&mut predata_buf, &table.to_string(), &columns, table_def);
        let (cons, fk_cons) = split_constraints(table, constraints);
        all_cons.extend(cons);
        all_fk_cons.extend(fk_cons);
    }

    let mut postdata_buf = String::new();
    predata::constraint_statements(&mut postdata_buf, &all_cons, &all_fk_cons);
    (predata_buf, postdata_buf)
}

fn sample_fixture() -> (
    Vec<(Relation, Vec<ColumnAttribute>, Vec<ColumnDefault>, TableDefinition, Vec<ConstraintRow>)>,
    Vec<SequenceDefinition>,
) {
    let mut enc = att(2, "j", "character varying(20)");
    enc.encoding = Some("compresstype=zlib,blocksize=65536,compresslevel=1".to_string());
    let mut with_default = att(1, "i", "int");
    with_default.has_default = true;

    let tables = vec![
        (
            rel("app", "events"),
            vec![with_default, enc],
            vec![ColumnDefault { att_num: 1, def_val: "nextval('event_id_seq'::regclass)".to_string() }],
            TableDefinition {
                dist_policy: "DISTRIBUTED BY (i)".to_string(),
                storage_opts: "appendonly=true".to_string(),
                ..Default::default()
            },
            vec![
                ConstraintRow {
                    name: "events_pkey".to_string(),
                    con_type: "p".to_string(),
                    definition: "PRIMARY KEY (i)".to_string(),
                },
                ConstraintRow {
                    name: "events_owner_fkey".to_string(),
                    con_type: "f".to_string(),
                    definition: "FOREIGN KEY (i) REFERENCES public.owners(id)".to_string(),
                },
            ],
        ),
        (
            rel("public", "owners"),
            vec![att(1, "id", "int"), att(2, "name", "text")],
            vec![],
            random_dist(),
            vec![ConstraintRow {
                name: "owners_pkey".to_string(),
                con_type: "p".to_string(),
                definition: "PRIMARY KEY (id)".to_string(),
            }],
        ),
    ];
    let sequences = vec![SequenceDefinition {
        name: "event_id_seq".to_string(),
        last_val: 42,
        increment: 1,
        max_val: 9223372036854775807,
        min_val: 1,
        cache_val: 1,
        is_cycled: false,
        is_called: true,
    }];
    (tables, sequences)
}

#[test]
fn rendering_is_deterministic() {
    let (tables, sequences) = sample_fixture();
    let (predata_one, postdata_one) = render_all(&tables, &sequences);
    let (predata_two, postdata_two) = render_all(&tables, &sequences);
    assert_eq!(predata_one, predata_two);
    assert_eq!(postdata_one, postdata_two);
}

#[test]
fn predata_contains_all_objects_in_order() {
    let (tables, sequences) = sample_fixture();
    let (predata_buf, _) = render_all(&tables, &sequences);

    let schema = predata_buf.find("CREATE SCHEMA app;").unwrap();
    let sequence = predata_buf.find("CREATE SEQUENCE event_id_seq").unwrap();
    let first_table = predata_buf.find("CREATE TABLE app.events (").unwrap();
    let second_table = predata_buf.find("CREATE TABLE public.owners (").unwrap();
    assert!(schema < sequence);
    assert!(sequence < first_table);
    assert!(first_table < second_table);

    // The called sequence pins its position via setval, not START WITH.
    assert!(predata_buf.contains("SELECT pg_catalog.setval('event_id_seq', 42, true);"));
    assert!(!predata_buf.contains("START WITH"));
}

#[test]
fn table_rendering_matches_reference_format() {
    let (tables, _) = sample_fixture();
    let (predata_buf, _) = render_all(&tables, &[]);
    assert!(predata_buf.contains(
        "\n\nCREATE TABLE app.events (\n\ti int DEFAULT nextval('event_id_seq'::regclass),\n\tj character varying(20) ENCODING (compresstype=zlib,blocksize=65536,compresslevel=1)\n) WITH (appendonly=true) DISTRIBUTED BY (i);\n"
    ));
    assert!(predata_buf.contains(
        "\n\nCREATE TABLE public.owners (\n\tid int,\n\tname text\n) DISTRIBUTED RANDOMLY;\n"
    ));
}

#[test]
fn postdata_keeps_foreign_keys_last() {
    let (tables, _) = sample_fixture();
    let (_, postdata_buf) = render_all(&tables, &[]);
    let events_pkey = postdata_buf.find("events_pkey").unwrap();
    let owners_pkey = postdata_buf.find("owners_pkey").unwrap();
    let fkey = postdata_buf.find("events_owner_fkey").unwrap();
    // Plain block alphabetical by rendered string, FK block strictly after.
    assert!(events_pkey < owners_pkey);
    assert!(owners_pkey < fkey);
    assert!(postdata_buf
        .contains("ALTER TABLE ONLY app.events ADD CONSTRAINT events_owner_fkey FOREIGN KEY (i) REFERENCES public.owners(id);"));
}

#[test]
fn dump_files_round_trip_through_disk() {
    use gpmetadump::backup::write_dump_files;
    use gpmetadump::config::DumpConfig;

    let (tables, sequences) = sample_fixture();
    let (predata_buf, postdata_buf) = render_all(&tables, &sequences);

    let dir = tempfile::tempdir().unwrap();
    let config = DumpConfig {
        dbname: "testdb".to_string(),
        host: "localhost".to_string(),
        port: 5432,
        user: "tester".to_string(),
        output_dir: dir.path().to_string_lossy().into_owned(),
        include_database: false,
    };
    let (predata_path, postdata_path) =
        write_dump_files(&config, "20260824000000", &predata_buf, &postdata_buf).unwrap();
    assert_eq!(std::fs::read_to_string(predata_path).unwrap(), predata_buf);
    assert_eq!(std::fs::read_to_string(postdata_path).unwrap(), postdata_buf);
}
