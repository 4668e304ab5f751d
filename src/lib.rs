//! # Docsmith
//!
//! Repository documentation backed by per-repository knowledge agents.
//!
//! For each source repository Docsmith provisions one conversational agent on
//! an external agent service: it snapshots the repository into a text
//! document, ingests it into a knowledge source, and binds a new agent to
//! that source. The agent is asked to write internal documentation, the
//! reply is stored, and clients retrieve it split into titled sections.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Snapshot │──▶│  Provision   │──▶│ Agent factory│──▶│ Registry  │
//! │ git / fs │   │ source + job │   │   persona    │   │ repo→agent│
//! └──────────┘   └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                                            │
//!                  ┌──────────┐   ┌──────────┐   ┌───────────▼─┐
//!                  │ Sections │◀──│  Store   │◀──│  Aggregate  │
//!                  └────┬─────┘   └──────────┘   └─────────────┘
//!                       ▼
//!                 CLI · HTTP server
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export LETTA_API_KEY=...
//! docsmith generate https://github.com/org/repo
//! docsmith serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy and HTTP status mapping |
//! | [`models`] | Core data types |
//! | [`client`] | Agent service trait and HTTP client |
//! | [`snapshot`] | Repository snapshots for ingestion |
//! | [`provision`] | Knowledge source creation and ingestion polling |
//! | [`agents`] | Persona and agent creation |
//! | [`registry`] | Repository → agent bindings |
//! | [`aggregate`] | Streamed reply reconstruction |
//! | [`store`] | Generated document storage |
//! | [`sections`] | Heading-based section segmentation |
//! | [`pipeline`] | The end-to-end documentation service |
//! | [`server`] | HTTP server |

pub mod agents;
pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod provision;
pub mod registry;
pub mod sections;
pub mod server;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
