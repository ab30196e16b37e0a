#![forbid(unsafe_code)]

//! Persistence for courses, question pools and exam history.
//!
//! Services depend only on the traits in [`repository`]; the in-memory and
//! `SQLite` backends are interchangeable behind [`repository::Storage`].

pub mod repository;
pub mod sqlite;
