//! Backup orchestrator
//! -------------------
//! Drives the whole run: connect, open one serializable read-only
//! transaction, discover dumpable tables, pull per-table metadata, render
//! the predata and postdata SQL, write the output files, commit, close.
//! Any failure inside the bracketed region propagates up without
//! committing; partial output files are invalid in their entirety.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_postgres::{IsolationLevel, NoTls, Transaction};
use tracing::{debug, error, info, warn};

use crate::catalog::{self, SequenceDefinition};
use crate::config::{current_timestamp, DumpConfig};
use crate::error::{BackupError, BackupResult};
use crate::ident::{unique_schemas, Relation};
use crate::metadata::{consolidate_columns, split_constraints, ColumnDefinition, TableDefinition};
use crate::predata;

/// Fetch and consolidate everything needed to render one table: column
/// attributes merged with defaults, plus distribution, partitioning, and
/// storage facts.
async fn construct_table_definition(
    tx: &Transaction<'_>,
    table: &Relation,
) -> BackupResult<(Vec<ColumnDefinition>, TableDefinition)> {
    let attributes = catalog::get_column_attributes(tx, table.table_oid).await?;
    let defaults = catalog::get_column_defaults(tx, table.table_oid).await?;

    let dist_policy = catalog::get_distribution_policy(tx, table.table_oid).await?;
    let part_def = catalog::get_partition_definition(tx, table.table_oid).await?;
    let part_template_def = catalog::get_partition_template_definition(tx, table.table_oid).await?;
    let storage_opts = catalog::get_storage_options(tx, table.table_oid).await?;

    let column_defs = consolidate_columns(&attributes, &defaults);
    let table_def = TableDefinition { dist_policy, part_def, part_template_def, storage_opts };
    Ok((column_defs, table_def))
}

/// Gather ALTER TABLE ... ADD CONSTRAINT statements for every table, split
/// into the plain and foreign-key lists. Foreign keys are kept separate
/// since they must be printed after all primary-key constraints.
async fn construct_constraints_for_all_tables(
    tx: &Transaction<'_>,
    tables: &[Relation],
) -> BackupResult<(Vec<String>, Vec<String>)> {
    let mut all_constraints = Vec::new();
    let mut all_fk_constraints = Vec::new();
    for table in tables {
        let rows = catalog::get_constraints(tx, table.table_oid).await?;
        let (cons, fk_cons) = split_constraints(table, &rows);
        all_constraints.extend(cons);
        all_fk_constraints.extend(fk_cons);
    }
    Ok((all_constraints, all_fk_constraints))
}

/// One definition row per sequence object, in list order.
async fn all_sequence_definitions(tx: &Transaction<'_>) -> BackupResult<Vec<SequenceDefinition>> {
    let sequences = catalog::list_sequences(tx).await?;
    let mut seq_defs = Vec::with_capacity(sequences.len());
    for sequence in sequences {
        seq_defs.push(catalog::get_sequence(tx, &sequence.name).await?);
    }
    Ok(seq_defs)
}

fn check_aborted(aborted: &AtomicBool) -> BackupResult<()> {
    if aborted.load(Ordering::SeqCst) {
        return Err(BackupError::Interrupted);
    }
    Ok(())
}

/// Spawn the interrupt escape hatch: on ctrl-c, flip the abort flag so the
/// run unwinds at the next checkpoint, and force exit with the interrupt
/// code if it has not unwound after a grace period.
fn spawn_interrupt_listener(aborted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, aborting backup");
        aborted.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        error!("backup did not unwind after interrupt, forcing exit");
        std::process::exit(BackupError::Interrupted.exit_code());
    });
}

/// Run the full metadata backup described by `config`. Returns only after
/// both output files are written and the snapshot transaction committed.
pub async fn run(config: &DumpConfig) -> BackupResult<()> {
    let conn_str = format!(
        "host={} port={} user={} dbname={}",
        config.host, config.port, config.user, config.dbname
    );
    let (mut client, connection) = tokio_postgres::connect(&conn_str, NoTls).await.map_err(|e| {
        let msg = e.to_string();
        if msg.contains("does not exist") {
            BackupError::connect(format!("database {} does not exist", config.dbname))
        } else {
            BackupError::connect(msg)
        }
    })?;
    // The connection task owns the socket; it ends when the client drops.
    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("connection error: {}", e);
        }
    });

    let aborted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(aborted.clone());

    let timestamp = current_timestamp();
    let result = dump_metadata(&mut client, config, &aborted, &timestamp).await;
    drop(client);
    driver.abort();
    result
}

async fn dump_metadata(
    client: &mut tokio_postgres::Client,
    config: &DumpConfig,
    aborted: &AtomicBool,
    timestamp: &str,
) -> BackupResult<()> {
    let tx = client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .read_only(true)
        .start()
        .await?;

    let tables = catalog::list_dumpable_tables(&tx).await?;
    let schemas = unique_schemas(&tables);
    info!("backing up metadata for {} tables in {} schemas", tables.len(), schemas.len());

    let mut predata_buf = String::new();
    if config.include_database {
        predata::create_database_statement(&mut predata_buf, &config.dbname);
    }
    predata::create_schema_statements(&mut predata_buf, &schemas);

    // Sequences come before tables so column DEFAULT nextval(...) expressions
    // reference objects that already exist on restore.
    let seq_defs = all_sequence_definitions(&tx).await?;
    predata::create_sequence_statements(&mut predata_buf, &seq_defs);

    for table in &tables {
        check_aborted(aborted)?;
        debug!("dumping table {}", table);
        let (column_defs, table_def) = construct_table_definition(&tx, table).await?;
        predata::create_table_statement(&mut predata_buf, &table.to_string(), &column_defs, &table_def);
    }

    let (cons, fk_cons) = construct_constraints_for_all_tables(&tx, &tables).await?;
    let mut postdata_buf = String::new();
    predata::constraint_statements(&mut postdata_buf, &cons, &fk_cons);

    check_aborted(aborted)?;
    let (predata_path, postdata_path) = write_dump_files(config, timestamp, &predata_buf, &postdata_buf)?;
    tx.commit().await?;

    info!(
        "wrote predata to {} and postdata to {}",
        predata_path.display(),
        postdata_path.display()
    );
    Ok(())
}

/// Write the rendered SQL to the timestamped predata and postdata files.
pub fn write_dump_files(
    config: &DumpConfig,
    timestamp: &str,
    predata_buf: &str,
    postdata_buf: &str,
) -> BackupResult<(PathBuf, PathBuf)> {
    let dir = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&dir)?;
    let predata_path = dir.join(format!("gpmetadump_{}_predata.sql", timestamp));
    let postdata_path = dir.join(format!("gpmetadump_{}_postdata.sql", timestamp));
    std::fs::write(&predata_path, predata_buf)?;
    std::fs::write(&postdata_path, postdata_buf)?;
    Ok((predata_path, postdata_path))
}
