//! # crewtask
//!
//! Shared task tracking: tasks assigned to one or several people, broken into
//! ordered steps and, for composite tasks, into per-person subtasks.
//!
//! The interesting part is [`completion`], which derives the completion state
//! of every task, subtask and step from raw check/uncheck actions and records
//! when and by whom each unit was completed. [`store::Store`] applies commands
//! one at a time and persists a snapshot after each.

pub mod clock;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod ordering;
pub mod storage;
pub mod store;
pub mod subtasks;
