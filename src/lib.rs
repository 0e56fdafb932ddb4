//! Hanging protocol matching engine.
//!
//! Given a loaded imaging study and a library of declarative hanging
//! protocols, the engine picks the protocol that fits the study best, walks
//! its stages, and decides which display sets each viewport slot shows.
//!
//! - **Attributes** ([`attribute`]): a registry of named extractors that read
//!   values from study, series and image metadata, including URL-driven
//!   selection and mammography position detection.
//! - **Rules** ([`rule`]): weighted, optionally required constraints on one
//!   attribute, scored into a [`rule::MatchResult`] and ranked with
//!   deterministic tie-breaking.
//! - **Protocols** ([`protocol`]): the JSON document model, validated once
//!   at load time.
//! - **Selection** ([`selection`]): ranks protocols against the study and
//!   falls back to a default protocol when none qualifies.
//! - **Stages** ([`stage`]): bounded stage navigation.
//! - **Assignment** ([`assign`]): fills each viewport slot of a stage from
//!   the study's series and display sets.
//! - **Engine** ([`engine`]): per-session orchestration with a cached
//!   assignment.
//!
//! # Architecture
//!
//! All matching is synchronous and pure over immutable snapshots of the
//! study and the protocol library. Errors in individual rules are converted
//! into rule failures; only structurally invalid protocol documents and
//! invalid configuration surface as errors.

pub mod assign;
pub mod attribute;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod rule;
pub mod selection;
pub mod stage;
pub mod study;

#[cfg(feature = "wasm")]
pub mod wasm;
