//! Sequential-access cursor for DuckDB
//!
//! DuckDB's results borrow their `Statement`, which borrows its `Connection`,
//! so a streaming result cannot be handed out directly. The cursor instead
//! moves a cloned connection onto a producer thread that executes the
//! statement in streaming mode and sends rows over a bounded channel. DuckDB
//! produces one chunk at a time and at most `CURSOR_CHANNEL_CAPACITY` rows are
//! buffered on our side.
//!
//! The cursor keeps the connection's interrupt handle. A timeout or an early
//! close interrupts the running statement, and closing joins the producer, so
//! the connection is released when the cursor is gone.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::thread::JoinHandle;

use duckdb::arrow::array::Array;
use duckdb::{Connection, InterruptHandle, ToSql};

use super::sql_types::{cell_from_value, value_at};
use crate::core::constants::CURSOR_CHANNEL_CAPACITY;
use crate::data::error::DataError;
use crate::data::executor::{CommandTimeout, RowCursor};
use crate::data::types::{CellValue, QueryParam};

enum Message {
    Columns(Vec<String>),
    Row(Vec<CellValue>),
    Done,
    Failed(duckdb::Error),
}

pub struct DuckdbCursor {
    rx: Option<Receiver<Message>>,
    columns: Vec<String>,
    current: Vec<CellValue>,
    timeout: CommandTimeout,
    finished: bool,
    interrupt: Arc<InterruptHandle>,
    producer: Option<JoinHandle<()>>,
}

impl DuckdbCursor {
    /// Start the producer and wait for the result's column names.
    ///
    /// `sql` must already use positional `?` markers matching `params`.
    pub(super) fn open(
        conn: Connection,
        sql: String,
        params: Vec<QueryParam>,
        timeout: CommandTimeout,
    ) -> Result<Self, DataError> {
        let interrupt = conn.interrupt_handle();
        let (tx, rx) = sync_channel(CURSOR_CHANNEL_CAPACITY);
        let producer = std::thread::Builder::new()
            .name("duckdb-cursor".to_string())
            .spawn(move || produce(conn, &sql, &params, &tx))?;

        let mut cursor = Self {
            rx: Some(rx),
            columns: Vec::new(),
            current: Vec::new(),
            timeout,
            finished: false,
            interrupt,
            producer: Some(producer),
        };

        match cursor.recv()? {
            Message::Columns(columns) => cursor.columns = columns,
            Message::Failed(e) => {
                cursor.finished = true;
                return Err(DataError::Database(e));
            }
            Message::Done | Message::Row(_) => {
                return Err(DataError::Cursor(
                    "result columns were not reported".to_string(),
                ));
            }
        }

        Ok(cursor)
    }

    fn recv(&self) -> Result<Message, DataError> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(DataError::Cursor("cursor is closed".to_string()));
        };
        match rx.recv_timeout(self.timeout.duration()) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "DuckDB cursor timed out waiting for rows"
                );
                self.interrupt.interrupt();
                Err(DataError::timeout(self.timeout.as_secs()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(DataError::Cursor(
                "producer stopped before the end of the result set".to_string(),
            )),
        }
    }
}

impl RowCursor for DuckdbCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn advance(&mut self) -> Result<bool, DataError> {
        if self.finished {
            return Ok(false);
        }
        match self.recv() {
            Ok(Message::Row(cells)) => {
                self.current = cells;
                Ok(true)
            }
            Ok(Message::Done) => {
                self.finished = true;
                self.current.clear();
                Ok(false)
            }
            Ok(Message::Failed(e)) => {
                self.finished = true;
                Err(DataError::Database(e))
            }
            Ok(Message::Columns(_)) => Err(DataError::Cursor(
                "columns reported twice".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    fn row(&self) -> &[CellValue] {
        &self.current
    }
}

impl Drop for DuckdbCursor {
    fn drop(&mut self) {
        let Some(handle) = self.producer.take() else {
            return;
        };
        if !handle.is_finished() {
            self.interrupt.interrupt();
        }
        // Unblocks a producer waiting on a full channel
        self.rx.take();
        if handle.join().is_err() {
            tracing::warn!("DuckDB cursor producer panicked");
        }
    }
}

fn produce(conn: Connection, sql: &str, params: &[QueryParam], tx: &SyncSender<Message>) {
    if let Err(e) = stream_rows(&conn, sql, params, tx) {
        // Receiver may be gone already
        let _ = tx.send(Message::Failed(e));
    }
}

fn stream_rows(
    conn: &Connection,
    sql: &str,
    params: &[QueryParam],
    tx: &SyncSender<Message>,
) -> Result<(), duckdb::Error> {
    let mut stmt = conn.prepare(sql)?;
    let bound: Vec<&dyn ToSql> = params.iter().map(|p| &p.value as &dyn ToSql).collect();
    // Chunks are pulled with `step` so fetch errors surface as `Err`
    let schema = stmt.stream_arrow(bound.as_slice())?.get_schema();

    let columns = schema.fields().iter().map(|f| f.name().clone()).collect();
    if tx.send(Message::Columns(columns)).is_err() {
        return Ok(());
    }

    while let Some(batch) = stmt.step()? {
        let arrays = batch.columns();
        for row in 0..batch.len() {
            let cells = arrays
                .iter()
                .map(|column| cell_from_value(value_at(column, row)))
                .collect();
            if tx.send(Message::Row(cells)).is_err() {
                // Cursor closed early
                return Ok(());
            }
        }
    }

    let _ = tx.send(Message::Done);
    Ok(())
}
