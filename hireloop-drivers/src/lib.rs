//! WebDriver-backed implementation of the engine's browser seam.
//!
//! - [`browser::driver::EasyApplyDriver`]: search, detail extraction and the Easy Apply form
//! - [`browser::page::BrowserPage`]: DOM helpers that report failures as engine faults
//! - [`browser::behavioral::BehavioralEngine`]: human-like timings and typing
//! - [`browser::stealth`]: launch arguments and page-load evasions per stealth level
//! - [`extract`]: pure parsers for detail page text
pub mod browser;
pub mod extract;

pub use browser::driver::{search_url, EasyApplyDriver};
