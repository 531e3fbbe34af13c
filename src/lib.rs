//! # plcmod - PLC module builder
//!
//! plcmod turns the C code an IEC-61131 compiler front end generates for a
//! project into one relocatable binary module for a microcontroller runtime.
//!
//! ## Pipeline
//!
//! 1. Render `plc_main.c` (location init/cleanup/retrieve/publish calls) and
//!    `plc_debugger.c` (debug descriptor table) from the target templates
//! 2. Compile every generated source with the ARM module flags
//! 3. Rename local symbols in each object so modules never collide
//! 4. Link, package into the module format, and record the module's MD5
//!
//! ## Module Organization
//!
//! - [`codegen`] - Template rendering and call sequencing
//! - [`build`] - Compile/link/package orchestration
//! - [`store`] - Binary path and hash side-car
//! - [`config`] - Project file parsing (`plcmod.toml`)

/// Compile, link and package orchestration.
pub mod build;

/// C glue code generation from target templates.
pub mod codegen;

/// Project file parsing (`plcmod.toml`).
pub mod config;

/// Error types.
pub mod error;

/// MD5 content identity.
pub mod hash;

/// Logger sinks.
pub mod log;

/// Locations, programs and debug variables.
pub mod model;

/// Build directory state across invocations.
pub mod store;
