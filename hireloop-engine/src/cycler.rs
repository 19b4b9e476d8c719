//! Search facet sequencing.
//!
//! Each term owns a grid of `(date bucket, sort order)` cells. Sort orders
//! form the outer loop and buckets the inner one, so the sort changes each
//! time the bucket list runs out. A term is retired once its grid is used up
//! or it reaches its application quota.
use crate::posting::SearchFacet;
use hireloop_common::{DatePosted, SortBy};
use hireloop_config::SearchConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclerStep {
    Facet(SearchFacet),
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct FacetCycler {
    terms: Vec<String>,
    buckets: Vec<DatePosted>,
    sorts: Vec<SortBy>,
    /// Applications per term before rotating; 0 disables the quota.
    switch_threshold: u32,
    run_non_stop: bool,
    narrow_after_first_pass: bool,
    pass: u32,
    position: usize,
    visited: HashSet<(DatePosted, SortBy)>,
    applied_this_term: u32,
}

impl FacetCycler {
    /// Build a cycler over terms in the given order.
    pub fn new(
        terms: Vec<String>,
        buckets: Vec<DatePosted>,
        sorts: Vec<SortBy>,
        switch_threshold: u32,
    ) -> Self {
        Self {
            terms,
            buckets,
            sorts,
            switch_threshold,
            run_non_stop: false,
            narrow_after_first_pass: false,
            pass: 1,
            position: 0,
            visited: HashSet::new(),
            applied_this_term: 0,
        }
    }

    /// Wrap to the first term forever instead of reporting exhaustion.
    pub fn non_stop(mut self, narrow_after_first_pass: bool) -> Self {
        self.run_non_stop = true;
        self.narrow_after_first_pass = narrow_after_first_pass;
        self
    }

    /// Build from configuration. The term permutation is fixed here; `seed`
    /// is the seed used when randomization is on.
    pub fn from_config(search: &SearchConfig) -> (Self, Option<u64>) {
        let mut terms: Vec<String> = search
            .terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let seed = search.randomize_search_order.then(|| {
            let seed = search.seed.unwrap_or_else(rand::random);
            terms.shuffle(&mut StdRng::seed_from_u64(seed));
            seed
        });

        let buckets = if search.cycle_date_posted {
            search.date_posted.narrowing_from()
        } else {
            vec![search.date_posted]
        };
        let mut sorts = vec![search.sort_by];
        if search.alternate_sort_by {
            sorts.push(search.sort_by.other());
        }

        let mut cycler = Self::new(terms, buckets, sorts, search.switch_threshold);
        if search.run_non_stop {
            cycler = cycler.non_stop(search.stop_date_cycle_at_24hr);
        }
        info!(
            terms = ?cycler.terms,
            buckets = cycler.buckets.len(),
            sorts = cycler.sorts.len(),
            seed = ?seed,
            "cycler.ready"
        );
        (cycler, seed)
    }

    pub fn next(&mut self) -> CyclerStep {
        loop {
            if self.position >= self.terms.len() {
                if !self.run_non_stop || self.terms.is_empty() {
                    return CyclerStep::Exhausted;
                }
                self.pass += 1;
                self.position = 0;
                self.reset_term();
                info!(pass = self.pass, "cycler.pass.start");
            }

            if self.term_quota_met() {
                debug!(term = %self.terms[self.position], "cycler.term.quota_met");
                self.advance_term();
                continue;
            }

            let cell = self
                .grid()
                .into_iter()
                .find(|cell| !self.visited.contains(cell));
            match cell {
                Some((date_posted, sort_by)) => {
                    self.visited.insert((date_posted, sort_by));
                    return CyclerStep::Facet(SearchFacet {
                        term: self.terms[self.position].clone(),
                        date_posted,
                        sort_by,
                        pass: self.pass,
                    });
                }
                None => {
                    debug!(term = %self.terms[self.position], "cycler.term.grid_exhausted");
                    self.advance_term();
                }
            }
        }
    }

    /// Count a submitted application against the current term.
    pub fn record_application(&mut self) {
        self.applied_this_term += 1;
    }

    /// Whether the current term has produced its quota of applications.
    pub fn term_quota_met(&self) -> bool {
        self.switch_threshold > 0 && self.applied_this_term >= self.switch_threshold
    }

    pub fn applications_this_term(&self) -> u32 {
        self.applied_this_term
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }

    fn grid(&self) -> Vec<(DatePosted, SortBy)> {
        let buckets: &[DatePosted] = match self.buckets.last() {
            Some(narrowest) if self.pass > 1 && self.narrow_after_first_pass => {
                std::slice::from_ref(narrowest)
            }
            _ => &self.buckets,
        };
        self.sorts
            .iter()
            .flat_map(|sort| buckets.iter().map(move |bucket| (*bucket, *sort)))
            .collect()
    }

    fn advance_term(&mut self) {
        self.position += 1;
        self.reset_term();
    }

    fn reset_term(&mut self) {
        self.visited.clear();
        self.applied_this_term = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(cycler: &mut FacetCycler) -> Vec<SearchFacet> {
        let mut out = Vec::new();
        while let CyclerStep::Facet(facet) = cycler.next() {
            out.push(facet);
            assert!(out.len() < 1_000, "cycler never exhausted");
        }
        out
    }

    fn search(terms: &[&str]) -> SearchConfig {
        SearchConfig {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            location: None,
            date_posted: DatePosted::AnyTime,
            sort_by: SortBy::MostRecent,
            cycle_date_posted: true,
            stop_date_cycle_at_24hr: true,
            alternate_sort_by: true,
            randomize_search_order: false,
            seed: None,
            switch_threshold: 0,
            run_non_stop: false,
            cycle_pause_min_secs: 0,
            cycle_pause_max_secs: 0,
            easy_apply_only: true,
        }
    }

    #[test]
    fn every_facet_is_visited_exactly_once() {
        let (mut cycler, _) = FacetCycler::from_config(&search(&["A", "B", "C"]));
        let facets = drain(&mut cycler);

        assert_eq!(facets.len(), 3 * 4 * 2);
        let distinct: HashSet<_> = facets
            .iter()
            .map(|f| (f.term.clone(), f.date_posted, f.sort_by))
            .collect();
        assert_eq!(distinct.len(), facets.len());
        assert_eq!(cycler.next(), CyclerStep::Exhausted);
        assert_eq!(cycler.next(), CyclerStep::Exhausted);
    }

    #[test]
    fn buckets_narrow_before_the_sort_changes() {
        let (mut cycler, _) = FacetCycler::from_config(&search(&["A"]));
        let order: Vec<_> = drain(&mut cycler)
            .into_iter()
            .map(|f| (f.date_posted, f.sort_by))
            .collect();
        assert_eq!(
            order,
            vec![
                (DatePosted::AnyTime, SortBy::MostRecent),
                (DatePosted::PastMonth, SortBy::MostRecent),
                (DatePosted::PastWeek, SortBy::MostRecent),
                (DatePosted::Past24Hours, SortBy::MostRecent),
                (DatePosted::AnyTime, SortBy::MostRelevant),
                (DatePosted::PastMonth, SortBy::MostRelevant),
                (DatePosted::PastWeek, SortBy::MostRelevant),
                (DatePosted::Past24Hours, SortBy::MostRelevant),
            ]
        );
    }

    #[test]
    fn quota_of_one_moves_to_the_next_term() {
        let mut cycler = FacetCycler::new(
            vec!["A".into(), "B".into()],
            vec![DatePosted::PastWeek, DatePosted::Past24Hours],
            vec![SortBy::MostRecent],
            1,
        );
        match cycler.next() {
            CyclerStep::Facet(f) => assert_eq!(f.term, "A"),
            other => panic!("unexpected {other:?}"),
        }
        cycler.record_application();
        match cycler.next() {
            CyclerStep::Facet(f) => {
                assert_eq!(f.term, "B");
                assert_eq!(f.date_posted, DatePosted::PastWeek);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn without_cycling_only_the_configured_bucket_is_used() {
        let mut config = search(&["A"]);
        config.cycle_date_posted = false;
        config.alternate_sort_by = false;
        config.date_posted = DatePosted::Past24Hours;
        let (mut cycler, _) = FacetCycler::from_config(&config);
        let facets = drain(&mut cycler);
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].date_posted, DatePosted::Past24Hours);
    }

    #[test]
    fn seeded_permutations_are_reproducible() {
        let mut config = search(&["A", "B", "C", "D", "E", "F"]);
        config.randomize_search_order = true;
        config.seed = Some(42);
        config.cycle_date_posted = false;
        config.alternate_sort_by = false;

        let terms = |cfg: &SearchConfig| {
            let (mut cycler, seed) = FacetCycler::from_config(cfg);
            assert_eq!(seed, Some(42));
            drain(&mut cycler).into_iter().map(|f| f.term).collect::<Vec<_>>()
        };
        let first = terms(&config);
        assert_eq!(first, terms(&config));

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn non_stop_wraps_and_narrows_after_the_first_pass() {
        let mut config = search(&["A", "B"]);
        config.alternate_sort_by = false;
        config.date_posted = DatePosted::PastWeek;
        config.run_non_stop = true;
        let (mut cycler, _) = FacetCycler::from_config(&config);

        let mut facets = Vec::new();
        for _ in 0..8 {
            match cycler.next() {
                CyclerStep::Facet(f) => facets.push(f),
                CyclerStep::Exhausted => panic!("non-stop cycler exhausted"),
            }
        }
        let first_pass: Vec<_> = facets.iter().filter(|f| f.pass == 1).collect();
        assert_eq!(first_pass.len(), 4);
        assert!(facets
            .iter()
            .filter(|f| f.pass > 1)
            .all(|f| f.date_posted == DatePosted::Past24Hours));
        assert_eq!(cycler.pass(), 3);
    }
}
