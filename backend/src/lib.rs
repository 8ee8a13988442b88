//! Chest X-ray pneumonia classifier served over HTTP.
//!
//! An [`inference::Ensemble`] of models is provisioned and loaded once at
//! startup, then shared by every request to `POST /predict`.

pub mod config;
pub mod inference;
pub mod provision;
pub mod routes;
