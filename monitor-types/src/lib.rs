#![deny(missing_docs)]
//! Wire type definitions for the Seele monitoring daemon.
//!
//! This crate groups together the message structures exchanged by the
//! telemetry system. It provides:
//!
//! * The `{"emit": [<topic>, <payload>]}` envelope used on every websocket
//!   message, both outbound (strongly typed, see [`report::ReportFrame`]) and
//!   inbound (loosely typed, see [`report::InboundFrame`]).
//! * The report payloads the stats server expects (see [`report`] module).
//! * The response types of the node's JSON-RPC interface (see [`rpc`] module).
//!
//! Everything here is plain data; the reporting logic lives in the
//! `seele-monitor-reporter` crate.

pub mod report;
pub mod rpc;
