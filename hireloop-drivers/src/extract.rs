//! Pure parsers for the text a job detail page renders.
//!
//! Kept free of any WebDriver types so they can be tested without a browser.
use hireloop_common::{ExperienceLevel, JobType, WorkplaceType};
use hireloop_engine::{ApplicantBand, SalaryRange};
use regex::Regex;

/// Requirements above this many years are treated as noise ("since 1998").
const MAX_PLAUSIBLE_YEARS: u32 = 12;

/// Paid hours in a full-time year, for hourly rates.
const HOURS_PER_YEAR: f64 = 2_080.0;

/// Largest plausible "N years" requirement mentioned in a description.
pub fn required_years(description: &str) -> Option<u32> {
    let re = Regex::new(r"(?i)[(]?\s*(\d+)\s*[)]?\s*[-to]*\s*\d*[+]*\s*years?").ok()?;
    re.captures_iter(description)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|years| *years <= MAX_PLAUSIBLE_YEARS)
        .max()
}

/// Yearly pay range from text like `$120K/yr - $150K/yr` or `$55/hr`.
pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let hourly = text.to_ascii_lowercase().contains("/hr");
    let re = Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)\s?([kK])?").ok()?;
    let amounts: Vec<u64> = re
        .captures_iter(text)
        .filter_map(|caps| {
            let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let mut value = if caps.get(2).is_some() {
                number * 1_000.0
            } else {
                number
            };
            if hourly {
                value *= HOURS_PER_YEAR;
            }
            Some(value.round() as u64)
        })
        .collect();

    let low = *amounts.first()?;
    let high = amounts.get(1).copied().unwrap_or(low);
    Some(SalaryRange {
        low: low.min(high),
        high: low.max(high),
    })
}

/// Applicant band from `Over 200 applicants`, `85 applicants` or
/// `Be among the first 25 applicants`.
pub fn parse_applicants(text: &str) -> Option<ApplicantBand> {
    let re = Regex::new(r"(?i)(over|first)?\s*(\d[\d,]*)\s+applicants?").ok()?;
    let caps = re.captures(text)?;
    let count: u32 = caps.get(2)?.as_str().replace(',', "").parse().ok()?;
    let band = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(q) if q == "over" => ApplicantBand {
            low: count,
            high: None,
        },
        Some(_) => ApplicantBand {
            low: 0,
            high: Some(count),
        },
        None => ApplicantBand {
            low: count,
            high: Some(count),
        },
    };
    Some(band)
}

/// Posting attributes found among the insight pills of a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Insights {
    pub workplace: Option<WorkplaceType>,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
}

/// Each pill is matched as a whole label, so free text never yields a value.
pub fn parse_insights<'a>(pills: impl IntoIterator<Item = &'a str>) -> Insights {
    let mut insights = Insights::default();
    for segment in pills
        .into_iter()
        .flat_map(|pill| pill.split(['·', '\n']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if insights.workplace.is_none() {
            insights.workplace = segment.parse().ok();
        }
        if insights.job_type.is_none() {
            insights.job_type = segment.parse().ok();
        }
        if insights.experience_level.is_none() {
            insights.experience_level = segment.parse().ok();
        }
    }
    insights
}

/// Location from a primary description line such as
/// `Berlin, Germany · 3 days ago · 85 applicants`.
pub fn location_from_primary(text: &str) -> String {
    text.split('·').next().unwrap_or_default().trim().to_string()
}

/// Whether a toast or inline notice is the platform refusing more
/// applications for today.
pub fn is_daily_limit_notice(text: &str) -> bool {
    let text = text.to_lowercase();
    if text.contains("too many applications") {
        return true;
    }
    text.contains("limit") && ["today", "daily", "tomorrow"].iter().any(|w| text.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_years_takes_the_largest_plausible_match() {
        let text = "You have 3+ years of Rust and (5) years with distributed systems. \
                    Founded 25 years ago.";
        assert_eq!(required_years(text), Some(5));
        assert_eq!(required_years("2-4 Years of experience"), Some(2));
        assert_eq!(required_years("Experience with Kubernetes"), None);
    }

    #[test]
    fn salaries_become_yearly_ranges() {
        assert_eq!(
            parse_salary("$120K/yr - $150K/yr"),
            Some(SalaryRange {
                low: 120_000,
                high: 150_000
            })
        );
        assert_eq!(
            parse_salary("$95,000/yr"),
            Some(SalaryRange {
                low: 95_000,
                high: 95_000
            })
        );
        assert_eq!(
            parse_salary("$50/hr - $60/hr"),
            Some(SalaryRange {
                low: 104_000,
                high: 124_800
            })
        );
        assert_eq!(parse_salary("Competitive pay"), None);
    }

    #[test]
    fn applicant_bands() {
        assert_eq!(
            parse_applicants("2 weeks ago · Over 200 applicants"),
            Some(ApplicantBand {
                low: 200,
                high: None
            })
        );
        assert_eq!(
            parse_applicants("85 applicants"),
            Some(ApplicantBand {
                low: 85,
                high: Some(85)
            })
        );
        assert_eq!(
            parse_applicants("Be among the first 25 applicants"),
            Some(ApplicantBand {
                low: 0,
                high: Some(25)
            })
        );
        assert_eq!(parse_applicants("Reposted 1 day ago"), None);
    }

    #[test]
    fn insights_match_whole_labels_only() {
        let insights = parse_insights(["Hybrid · Full-time", "Mid-Senior level", "Other duties"]);
        assert_eq!(
            insights,
            Insights {
                workplace: Some(WorkplaceType::Hybrid),
                job_type: Some(JobType::FullTime),
                experience_level: Some(ExperienceLevel::MidSenior),
            }
        );
        assert_eq!(parse_insights(["Remote-first culture"]), Insights::default());
    }

    #[test]
    fn location_is_the_first_segment() {
        assert_eq!(
            location_from_primary("Berlin, Germany · 3 days ago · 85 applicants"),
            "Berlin, Germany"
        );
        assert_eq!(location_from_primary(""), "");
    }

    #[test]
    fn daily_limit_notices() {
        assert!(is_daily_limit_notice(
            "You've reached the Easy Apply application limit for today. Save this job and come back tomorrow."
        ));
        assert!(is_daily_limit_notice("Too many applications submitted"));
        assert!(is_daily_limit_notice("Daily limit reached"));
        assert!(!is_daily_limit_notice("Your application was sent to Acme"));
        assert!(!is_daily_limit_notice("Character limit exceeded"));
    }
}
