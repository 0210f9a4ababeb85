//! GTM Reverse-ETL Library
//!
//! This library provides the building blocks for two batch jobs: loading
//! synthetic go-to-market data into the warehouse, and scoring warehouse
//! accounts with a locally hosted language model, writing the scores back
//! ("reverse ETL").
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Warehouse connection handling.
//! - `enrichment`: Lead scoring orchestration.
//! - `errors`: Error handling types.
//! - `generator`: Synthetic GTM data generation and loading.
//! - `llm_client`: Ollama chat client and score parsing.
//! - `models`: Core data models.
//! - `prompt`: Scoring prompt template.
//! - `warehouse`: Named-column bulk inserts, DDL and the warehouse seam.

pub mod config;
pub mod db;
pub mod enrichment;
pub mod errors;
pub mod generator;
pub mod llm_client;
pub mod models;
pub mod prompt;
pub mod warehouse;
