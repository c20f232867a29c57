//! FareLab Core: data ingestion, validation, features and models for
//! flight fare prediction.
//!
//! This crate holds everything below the pipeline orchestration:
//! - Domain types (raw CSV rows, typed flight records, dataset references)
//! - Credentials, the Kaggle provider and idempotent ingestion
//! - Staged `data/` layout with content-named, never-overwritten outputs
//! - Schema/business-rule validation and the data-quality summary
//! - Feature encoding and Parquet persistence of feature matrices
//! - Linear, random forest and gradient boosting regressors

pub mod data;
pub mod domain;
pub mod features;
pub mod models;
pub mod rng;
pub mod stats;
pub mod summary;
pub mod synthetic;
pub mod validation;
