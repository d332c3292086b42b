//! Safe wrappers over the libpq handles
//!
//! [`PqSession`] owns one `PGconn*` and implements [`PgTransport`] for the
//! worker; [`PqResult`] owns one `PGresult*`. Both release their handle on
//! drop.

use std::ffi::{CStr, CString};
use std::os::fd::RawFd;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use weir_core::ConnectionError;

use crate::error::PgError;
use crate::ffi;
use crate::transport::{FlushStatus, PgTransport, ResetPolling, ResultSet};

/// A libpq connection, finished on drop.
pub struct PqSession {
    conn: NonNull<ffi::PGconn>,
}

// One thread drives the session at a time: the caller during connect, the
// worker afterwards.
unsafe impl Send for PqSession {}

impl PqSession {
    /// Connect synchronously with `conninfo`.
    pub fn connect(conninfo: &str) -> Result<Self, ConnectionError> {
        let c_conninfo = CString::new(conninfo).map_err(|_| {
            ConnectionError::ConnectionFailed("connection string contains a NUL byte".into())
        })?;

        let raw = unsafe { ffi::PQconnectdb(c_conninfo.as_ptr()) };
        let Some(conn) = NonNull::new(raw) else {
            return Err(ConnectionError::ConnectionFailed(
                "PQconnectdb returned null".into(),
            ));
        };

        let session = Self { conn };
        if unsafe { ffi::PQstatus(session.conn.as_ptr()) } != ffi::ConnStatusType::ConnectionOk {
            return Err(ConnectionError::ConnectionFailed(session.last_error()));
        }
        Ok(session)
    }

    /// Connection-level error message.
    pub fn last_error(&self) -> String {
        unsafe { cstr_to_string(ffi::PQerrorMessage(self.conn.as_ptr())) }
    }
}

impl PgTransport for PqSession {
    fn socket(&self) -> Option<RawFd> {
        let fd = unsafe { ffi::PQsocket(self.conn.as_ptr()) };
        (fd >= 0).then_some(fd)
    }

    fn send_query(&mut self, sql: &str, params: &[String]) -> Result<(), PgError> {
        let c_sql = CString::new(sql)
            .map_err(|_| PgError::QueryFailed("query contains a NUL byte".into()))?;
        let c_params = params
            .iter()
            .map(|p| CString::new(p.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PgError::QueryFailed("parameter contains a NUL byte".into()))?;
        let values: Vec<*const c_char> = c_params.iter().map(|p| p.as_ptr()).collect();
        let lengths: Vec<c_int> = params.iter().map(|p| p.len() as c_int).collect();

        let accepted = unsafe {
            ffi::PQsendQueryParams(
                self.conn.as_ptr(),
                c_sql.as_ptr(),
                params.len() as c_int,
                ptr::null(), // let the server infer parameter types
                values.as_ptr(),
                lengths.as_ptr(),
                ptr::null(), // all parameters in text format
                0,           // text results
            )
        };
        if accepted == 0 {
            return Err(PgError::BadConnection(self.last_error()));
        }
        Ok(())
    }

    fn flush(&mut self) -> FlushStatus {
        match unsafe { ffi::PQflush(self.conn.as_ptr()) } {
            0 => FlushStatus::Sent,
            1 => FlushStatus::Pending,
            _ => FlushStatus::Failed,
        }
    }

    fn consume_input(&mut self) -> Result<(), PgError> {
        if unsafe { ffi::PQconsumeInput(self.conn.as_ptr()) } == 0 {
            return Err(PgError::BadConnection(self.last_error()));
        }
        Ok(())
    }

    fn is_busy(&mut self) -> bool {
        unsafe { ffi::PQisBusy(self.conn.as_ptr()) != 0 }
    }

    fn next_record(&mut self) -> Option<Box<dyn ResultSet>> {
        NonNull::new(unsafe { ffi::PQgetResult(self.conn.as_ptr()) })
            .map(|res| Box::new(PqResult { res }) as Box<dyn ResultSet>)
    }

    fn is_healthy(&self) -> bool {
        unsafe { ffi::PQstatus(self.conn.as_ptr()) == ffi::ConnStatusType::ConnectionOk }
    }

    fn reset_start(&mut self) -> bool {
        unsafe { ffi::PQresetStart(self.conn.as_ptr()) != 0 }
    }

    fn reset_poll(&mut self) -> ResetPolling {
        match unsafe { ffi::PQresetPoll(self.conn.as_ptr()) } {
            ffi::PostgresPollingStatusType::PollingOk => ResetPolling::Ok,
            ffi::PostgresPollingStatusType::PollingReading => ResetPolling::Reading,
            ffi::PostgresPollingStatusType::PollingWriting => ResetPolling::Writing,
            _ => ResetPolling::Failed,
        }
    }

    fn set_nonblocking(&mut self) -> Result<(), String> {
        if unsafe { ffi::PQsetnonblocking(self.conn.as_ptr(), 1) } != 0 {
            return Err(self.last_error());
        }
        Ok(())
    }
}

impl Drop for PqSession {
    fn drop(&mut self) {
        unsafe { ffi::PQfinish(self.conn.as_ptr()) };
    }
}

/// One libpq result record, cleared on drop.
#[derive(Debug)]
pub struct PqResult {
    res: NonNull<ffi::PGresult>,
}

unsafe impl Send for PqResult {}

impl ResultSet for PqResult {
    fn is_ok(&self) -> bool {
        matches!(
            unsafe { ffi::PQresultStatus(self.res.as_ptr()) },
            ffi::ExecStatusType::CommandOk | ffi::ExecStatusType::TuplesOk
        )
    }

    fn error_message(&self) -> String {
        unsafe { cstr_to_string(ffi::PQresultErrorMessage(self.res.as_ptr())) }
    }

    fn num_rows(&self) -> usize {
        unsafe { ffi::PQntuples(self.res.as_ptr()) }.max(0) as usize
    }

    fn num_columns(&self) -> usize {
        unsafe { ffi::PQnfields(self.res.as_ptr()) }.max(0) as usize
    }

    fn value(&self, row: usize, column: usize) -> Option<Vec<u8>> {
        if row >= self.num_rows() || column >= self.num_columns() {
            return None;
        }
        let (row, column) = (row as c_int, column as c_int);
        unsafe {
            if ffi::PQgetisnull(self.res.as_ptr(), row, column) != 0 {
                return None;
            }
            let data = ffi::PQgetvalue(self.res.as_ptr(), row, column);
            if data.is_null() {
                return Some(Vec::new());
            }
            let len = ffi::PQgetlength(self.res.as_ptr(), row, column).max(0) as usize;
            Some(std::slice::from_raw_parts(data.cast::<u8>(), len).to_vec())
        }
    }

    fn affected_rows(&self) -> u64 {
        unsafe { cstr_to_string(ffi::PQcmdTuples(self.res.as_ptr())) }
            .parse()
            .unwrap_or(0)
    }
}

impl Drop for PqResult {
    fn drop(&mut self) {
        unsafe { ffi::PQclear(self.res.as_ptr()) };
    }
}

/// Copy a libpq-owned C string; null maps to the empty string.
unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
