//! Raw FFI bindings to libpq
//!
//! Hand-declared against `libpq-fe.h`; only the entry points the driver
//! needs. The library itself is linked by `build.rs` when the `libpq`
//! feature is enabled.

#![allow(dead_code)]

use std::os::raw::{c_char, c_int};

/// Opaque connection handle.
#[repr(C)]
pub struct PGconn {
    _private: [u8; 0],
}

/// Opaque result handle.
#[repr(C)]
pub struct PGresult {
    _private: [u8; 0],
}

/// PostgreSQL object id.
pub type Oid = u32;

/// Connection status (`ConnStatusType` in libpq-fe.h).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatusType {
    ConnectionOk = 0,
    ConnectionBad = 1,
    ConnectionStarted = 2,
    ConnectionMade = 3,
    ConnectionAwaitingResponse = 4,
    ConnectionAuthOk = 5,
    ConnectionSetenv = 6,
    ConnectionSslStartup = 7,
    ConnectionNeeded = 8,
    ConnectionCheckWritable = 9,
    ConnectionConsume = 10,
    ConnectionGssStartup = 11,
    ConnectionCheckTarget = 12,
    ConnectionCheckStandby = 13,
}

/// Result status (`ExecStatusType` in libpq-fe.h).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatusType {
    EmptyQuery = 0,
    CommandOk = 1,
    TuplesOk = 2,
    CopyOut = 3,
    CopyIn = 4,
    BadResponse = 5,
    NonfatalError = 6,
    FatalError = 7,
    CopyBoth = 8,
    SingleTuple = 9,
    PipelineSync = 10,
    PipelineAborted = 11,
}

/// Reset/connect progress (`PostgresPollingStatusType` in libpq-fe.h).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostgresPollingStatusType {
    PollingFailed = 0,
    PollingReading = 1,
    PollingWriting = 2,
    PollingOk = 3,
    PollingActive = 4,
}

unsafe extern "C" {
    // ── Connection ──────────────────────────────────────────────
    pub fn PQconnectdb(conninfo: *const c_char) -> *mut PGconn;
    pub fn PQfinish(conn: *mut PGconn);
    pub fn PQstatus(conn: *const PGconn) -> ConnStatusType;
    pub fn PQerrorMessage(conn: *const PGconn) -> *const c_char;
    pub fn PQsetnonblocking(conn: *mut PGconn, arg: c_int) -> c_int;
    pub fn PQsocket(conn: *const PGconn) -> c_int;
    pub fn PQresetStart(conn: *mut PGconn) -> c_int;
    pub fn PQresetPoll(conn: *mut PGconn) -> PostgresPollingStatusType;

    // ── Query submission ────────────────────────────────────────
    pub fn PQsendQueryParams(
        conn: *mut PGconn,
        command: *const c_char,
        n_params: c_int,
        param_types: *const Oid,
        param_values: *const *const c_char,
        param_lengths: *const c_int,
        param_formats: *const c_int,
        result_format: c_int,
    ) -> c_int;
    pub fn PQflush(conn: *mut PGconn) -> c_int;
    pub fn PQconsumeInput(conn: *mut PGconn) -> c_int;
    pub fn PQisBusy(conn: *mut PGconn) -> c_int;
    pub fn PQgetResult(conn: *mut PGconn) -> *mut PGresult;

    // ── Result accessors ────────────────────────────────────────
    pub fn PQresultStatus(res: *const PGresult) -> ExecStatusType;
    pub fn PQresultErrorMessage(res: *const PGresult) -> *const c_char;
    pub fn PQntuples(res: *const PGresult) -> c_int;
    pub fn PQnfields(res: *const PGresult) -> c_int;
    pub fn PQgetvalue(res: *const PGresult, tup_num: c_int, field_num: c_int) -> *const c_char;
    pub fn PQgetlength(res: *const PGresult, tup_num: c_int, field_num: c_int) -> c_int;
    pub fn PQgetisnull(res: *const PGresult, tup_num: c_int, field_num: c_int) -> c_int;
    pub fn PQcmdTuples(res: *mut PGresult) -> *const c_char;
    pub fn PQclear(res: *mut PGresult);
}
