//! Job postings and search facets as surfaced by a browser driver.
use hireloop_common::{DatePosted, ExperienceLevel, JobType, SortBy, WorkplaceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Disclosed yearly pay range. A single advertised figure has `low == high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub low: u64,
    pub high: u64,
}

/// Applicant-count band such as "25 applicants" or "Over 200 applicants".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantBand {
    pub low: u32,
    /// `None` for open-ended bands ("over 200").
    pub high: Option<u32>,
}

/// A posting with every attribute the platform may or may not disclose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    /// Stable platform-assigned identifier.
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub experience_level: Option<ExperienceLevel>,
    pub job_type: Option<JobType>,
    pub workplace: Option<WorkplaceType>,
    pub salary: Option<SalaryRange>,
    pub applicants: Option<ApplicantBand>,
    pub company_description: Option<String>,
    pub description: Option<String>,
    /// Years of experience the description asks for, when stated.
    pub required_years: Option<u32>,
    pub easy_apply: bool,
}

/// One concrete search query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFacet {
    pub term: String,
    pub date_posted: DatePosted,
    pub sort_by: SortBy,
    /// Cycler pass that produced this facet, starting at 1.
    pub pass: u32,
}

impl fmt::Display for SearchFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} / {}] pass {}",
            self.term, self.date_posted, self.sort_by, self.pass
        )
    }
}
