//! # Job Harvester
//!
//! A scheduled job-listing harvester. It searches applicant-tracking-system
//! (ATS) domains through a web search API, normalizes each hit into a fixed
//! spreadsheet row, and appends only listings that are not already recorded.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────────┐
//! │ Query Builder│──▶│ Search Client│──▶│ Normalizer │──▶│ Dedup+Append │
//! │  site × role │   │  ≤ 3 pages   │   │ company/   │   │ one tab per  │
//! │              │   │              │   │ platform   │   │ category     │
//! └──────────────┘   └──────────────┘   └────────────┘   └──────────────┘
//!                         ▲                                     ▲
//!                    Serper.dev                          Google Sheets
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export SERPER_API_KEY=...
//! export SPREADSHEET_ID=...
//! export GOOGLE_APPLICATION_CREDENTIALS=service_account_credentials.json
//! jobscan queries               # preview the queries for this run
//! jobscan run --dry-run         # count new listings without writing
//! jobscan run                   # harvest and append
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`credentials`] | Service-account key sources and OAuth tokens |
//! | [`models`] | Raw hits and persisted job records |
//! | [`query`] | Search query composition and recency cutoffs |
//! | [`search`] | Paginated search client |
//! | [`normalize`] | Hit → record normalization |
//! | [`store`] | Tabular store trait, dedup and append |
//! | [`sheets`] | Google Sheets store backend |
//! | [`pipeline`] | Per-category orchestration |

pub mod config;
pub mod credentials;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod search;
pub mod sheets;
pub mod store;
