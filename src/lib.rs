//! Core library for the equipment-reports command line application.
//!
//! The library turns a spreadsheet of equipment lines per store into priced
//! store workbooks and a consolidated summary. Input parsing and workbook
//! output live under [`equipment::reports::io`], the suggested price cascade in
//! [`equipment::reports::pricing`], the persisted realized-price history in
//! [`equipment::reports::history`], and the end-to-end orchestration under
//! [`equipment::reports::pipeline`].

pub mod equipment;

pub use equipment::reports::{
    ReportError, Result, config, error, history, io, model, pipeline, pricing, report,
};
