//! Company-side scheduling: deployment windows, due-site triage, and the
//! split of the day's pool among working crews.

use chrono::{Datelike, NaiveDate};

use ldar_core::{MethodParams, MethodSiteStats, SimSettings};

use crate::context::DayContext;

/// Resolve the configured deployment years/months; empty means the whole
/// simulation range and all twelve months.
pub fn deployment_window(cfg: &MethodParams, settings: &SimSettings) -> (Vec<i32>, Vec<u32>) {
    let years = if cfg.scheduling.deployment_years.is_empty() {
        (settings.start_date.year()..=settings.end_date.year()).collect()
    } else {
        cfg.scheduling.deployment_years.clone()
    };
    let months = if cfg.scheduling.deployment_months.is_empty() {
        (1..=12).collect()
    } else {
        cfg.scheduling.deployment_months.clone()
    };
    (years, months)
}

pub fn in_deployment_period(date: NaiveDate, years: &[i32], months: &[u32]) -> bool {
    years.contains(&date.year()) && months.contains(&date.month())
}

/// Sites due for survey today, most neglected first (stable on ties).
///
/// Screening methods take sites that still owe surveys this year and have
/// ripened past the minimum interval. Follow-up methods take flagged sites
/// whose flag has aged past the flagging method's reporting delay.
pub fn get_due_sites(
    cfg: &MethodParams,
    ctx: &DayContext,
    stats: &[MethodSiteStats],
) -> Vec<usize> {
    let mut due: Vec<usize> = if cfg.is_follow_up {
        ctx.sites
            .iter()
            .enumerate()
            .filter(|(_, site)| {
                if !site.currently_flagged {
                    return false;
                }
                let Some(flagged) = site.date_flagged else {
                    return false;
                };
                let delay = site
                    .flagged_by
                    .as_deref()
                    .map(|m| ctx.program.reporting_delay_of(m))
                    .unwrap_or(0);
                (ctx.date - flagged).num_days() >= delay as i64
            })
            .map(|(i, _)| i)
            .collect()
    } else {
        ctx.sites
            .iter()
            .enumerate()
            .filter(|(i, site)| {
                let Some(params) = site.params_for(&cfg.label) else {
                    return false;
                };
                let st = &stats[*i];
                st.surveys_done_this_year < params.required_surveys
                    && st.days_since_survey >= params.min_interval_days
            })
            .map(|(i, _)| i)
            .collect()
    };
    due.sort_by(|a, b| stats[*b].days_since_survey.cmp(&stats[*a].days_since_survey));
    due
}

/// How many crews to field for the day's pool, assuming a crew clears
/// about `sites_per_crew` sites per day.
pub fn get_working_crews(pool_len: usize, n_crews: usize, sites_per_crew: usize) -> usize {
    if n_crews == 0 {
        return 0;
    }
    let needed = pool_len.div_ceil(n_crews * sites_per_crew);
    needed.min(n_crews)
}

/// Triage the pool to one crew: its cluster under route planning,
/// otherwise a stride slice so neglect order interleaves evenly.
pub fn crew_site_list(
    pool: &[usize],
    crew_idx: usize,
    n_crews: usize,
    route_planning: bool,
    stats: &[MethodSiteStats],
) -> Vec<usize> {
    if route_planning {
        pool.iter()
            .copied()
            .filter(|site_idx| stats[*site_idx].cluster == crew_idx)
            .collect()
    } else {
        pool.iter()
            .copied()
            .skip(crew_idx)
            .step_by(n_crews.max(1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_crews_scales_with_pool() {
        // 3 sites/crew/day: 9 sites need 1 crew of 3? No: ceil(9/(3*3)) = 1
        assert_eq!(get_working_crews(9, 3, 3), 1);
        assert_eq!(get_working_crews(10, 3, 3), 2);
        assert_eq!(get_working_crews(100, 3, 3), 3);
        assert_eq!(get_working_crews(0, 3, 3), 0);
        assert_eq!(get_working_crews(100, 0, 3), 0);
    }

    #[test]
    fn stride_slice_offsets_by_crew() {
        let pool = vec![10, 11, 12, 13, 14, 15, 16];
        let stats = vec![MethodSiteStats::default(); 20];
        assert_eq!(crew_site_list(&pool, 0, 3, false, &stats), vec![10, 13, 16]);
        assert_eq!(crew_site_list(&pool, 1, 3, false, &stats), vec![11, 14]);
        assert_eq!(crew_site_list(&pool, 2, 3, false, &stats), vec![12, 15]);
    }

    #[test]
    fn cluster_filter_respects_labels() {
        let pool = vec![0, 1, 2, 3];
        let mut stats = vec![MethodSiteStats::default(); 4];
        stats[1].cluster = 1;
        stats[3].cluster = 1;
        assert_eq!(crew_site_list(&pool, 1, 2, true, &stats), vec![1, 3]);
        assert_eq!(crew_site_list(&pool, 0, 2, true, &stats), vec![0, 2]);
    }

    #[test]
    fn deployment_period_membership() {
        let years = vec![2020, 2021];
        let months = vec![6, 7, 8];
        let date = |y, m| NaiveDate::from_ymd_opt(y, m, 15).unwrap();
        assert!(in_deployment_period(date(2020, 7), &years, &months));
        assert!(!in_deployment_period(date(2020, 1), &years, &months));
        assert!(!in_deployment_period(date(2022, 7), &years, &months));
    }
}
