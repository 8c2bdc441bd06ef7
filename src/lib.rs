//! Email-to-content intake pipeline.
//!
//! Turns inbound RFC 5322 messages into content entities in a host
//! repository. A message flows through a sequence of analyzers —
//! PGP signature handling, subject-prefix parsing, footer stripping,
//! body normalization, sender resolution — building up a shared
//! [`result::AnalyzerResult`], then through handlers that authenticate
//! the sender and create standalone content or comments.
//!
//! The host system is abstracted behind the traits in [`services`];
//! [`processor::Processor::standard`] wires the default pipeline
//! against a set of implementations.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod processor;
pub mod result;
pub mod services;
