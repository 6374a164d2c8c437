//! Printing API handlers

pub mod handler;
