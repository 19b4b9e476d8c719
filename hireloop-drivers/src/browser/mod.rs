//! WebDriver-backed browser session for the job platform.
pub mod behavioral;
pub mod driver;
pub mod page;
pub mod stealth;
