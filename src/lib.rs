//! placecode - Batch geocode place names with Google Maps or OpenStreetMap Nominatim

pub mod api;
pub mod batch;
pub mod config;
pub mod demo;
pub mod domain;
pub mod rate_limit;
