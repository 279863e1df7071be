//! Kindred: taste-affinity colleague matching and a conversational
//! relocation assistant.
//!
//! Two flows share one knowledge-graph client and one text generator:
//! - **Introductions** ([`introductions`]): gather taste signals for an
//!   employee and each candidate colleague, score commonalities, rank, and
//!   deliver introductions through a fallback chain ([`dispatch`]).
//! - **Relocation dialogue** ([`conversation`]): a short-lived state machine
//!   that collects a location (and optionally preferences) and then asks
//!   [`housing`] for recommendations.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod db;
pub mod logging;
pub mod prompts;
pub mod providers;

pub mod demographics;
pub mod profile;
pub mod signals;
pub mod taste;

pub mod scoring;

pub mod conversation;
pub mod directory;
pub mod dispatch;
pub mod housing;
pub mod introductions;
