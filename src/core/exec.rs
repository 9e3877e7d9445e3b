//! Purpose: Run one prepared query against a single target database file.
//! Exports: `QueryExecutor`.
//! Role: Core open/compile/bind/step/render loop over SQLite.
//! Invariants: Binding is best-effort; only the placeholder-count check is fatal.
//! Invariants: Statement and connection handles are released on every exit path.

use std::io::{self, Write};
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::escape;
use crate::core::params::{Param, ParamList};
use crate::core::settings::{OpenMode, Settings};

/// Executes the query read from standard input against one target at a time.
///
/// Holds the query text, the ordered parameter list, and the run settings by
/// reference; the caller iterates targets and decides the continuation policy
/// from the returned error kinds.
pub struct QueryExecutor<'a> {
    query: &'a str,
    params: &'a ParamList,
    settings: &'a Settings,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(query: &'a str, params: &'a ParamList, settings: &'a Settings) -> Self {
        Self {
            query,
            params,
            settings,
        }
    }

    /// Open `path`, compile the query, bind the parameter list, and stream
    /// every result row to `out`.
    ///
    /// `Open`, `Compile`, and `Exec` errors describe this target only; a
    /// `Mismatch` error describes the statement itself and holds for every
    /// target. Bind failures are logged per position and never interrupt the
    /// statement.
    pub fn run_target(&self, path: &Path, out: &mut impl Write) -> Result<(), Error> {
        debug!("executing query against {}", path.display());
        let conn = Connection::open_with_flags(path, open_flags(self.settings.open_mode))
            .map_err(|source| {
                Error::new(ErrorKind::Open)
                    .with_message("cannot open database")
                    .with_path(path)
                    .with_source(source)
            })?;
        let mut stmt = conn.prepare(self.query).map_err(|source| {
            Error::new(ErrorKind::Compile)
                .with_message("cannot compile query")
                .with_path(path)
                .with_source(source)
        })?;

        for (index, param) in self.params.iter().enumerate() {
            let position = index + 1;
            let bound = match param {
                Param::Null => stmt.raw_bind_parameter(position, rusqlite::types::Null),
                Param::Integer(value) => stmt.raw_bind_parameter(position, value),
                Param::Real(value) => stmt.raw_bind_parameter(position, value),
                Param::Text(value) => stmt.raw_bind_parameter(position, value),
            };
            if let Err(source) = bound {
                let report = Error::new(ErrorKind::Bind)
                    .with_message("cannot bind parameter")
                    .with_flag(param.flag())
                    .with_value(param.render())
                    .with_position(position)
                    .with_source(source);
                warn!("{report}");
            }
        }

        let expected = stmt.parameter_count();
        if expected != self.params.len() {
            return Err(Error::new(ErrorKind::Mismatch).with_message(format!(
                "statement expects {expected} parameters, {} provided",
                self.params.len()
            )));
        }

        let columns = stmt.column_count();
        let mut rows = stmt.raw_query();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(source) => {
                    return Err(Error::new(ErrorKind::Exec)
                        .with_message("query step failed")
                        .with_path(path)
                        .with_source(source));
                }
            };
            for index in 0..columns {
                if index > 0 {
                    write_bytes(out, &self.settings.field_sep)?;
                }
                let value = row.get_ref(index).map_err(|source| {
                    Error::new(ErrorKind::Exec)
                        .with_message("cannot read result column")
                        .with_path(path)
                        .with_position(index)
                        .with_source(source)
                })?;
                self.write_value(value, out)?;
            }
            write_bytes(out, &self.settings.record_sep)?;
        }
        out.flush().map_err(io_error)
    }

    fn write_value(&self, value: ValueRef<'_>, out: &mut impl Write) -> Result<(), Error> {
        match value {
            ValueRef::Null => write_bytes(out, &self.settings.null_stand_in),
            ValueRef::Integer(value) => write_bytes(out, value.to_string().as_bytes()),
            ValueRef::Real(value) => write_bytes(out, format!("{value:.6}").as_bytes()),
            ValueRef::Text(text) => write_bytes(out, text),
            ValueRef::Blob(blob) => match &self.settings.blob_stand_in {
                Some(stand_in) => write_bytes(out, stand_in),
                None => write_bytes(out, &escape::encode(blob)),
            },
        }
    }
}

fn open_flags(mode: OpenMode) -> OpenFlags {
    let base = match mode {
        OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::ReadWriteCreate => {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        }
    };
    base | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn write_bytes(out: &mut impl Write, bytes: &[u8]) -> Result<(), Error> {
    out.write_all(bytes).map_err(io_error)
}

fn io_error(source: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("cannot write result row")
        .with_source(source)
}
