//! Crew-level day planning.
//!
//! A mobile crew's day: finish yesterday's rollover first, then repeatedly
//! pick the next site (nearest under route planning, most neglected
//! otherwise), check the travel and survey times against the minutes left
//! in the work window, and either visit fully, start and roll the
//! remainder over, or head home. Stationary crews are the degenerate case:
//! pinned to one site, surveyed on every deployment day.

use rand::rngs::StdRng;
use tracing::warn;

use ldar_core::{DeploymentType, MethodParams, MethodSiteStats, Site};
use ldar_weather::DeploymentGrid;

use crate::context::DayContext;
use crate::routing::{
    find_homebase, find_homebase_opt, haversine_km, sample_offsite_minutes, travel_minutes,
};
use crate::sensor::{Sensor, SiteSurvey};

/// Partially finished survey carried to the next day.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverPlan {
    pub site_idx: usize,
    pub remaining_min: f64,
}

/// Mutable per-crew state.
#[derive(Debug, Clone)]
pub struct CrewState {
    pub id: u32,
    pub lon: f64,
    pub lat: f64,
    pub worked_today: bool,
    pub rollover: Option<RolloverPlan>,
}

impl CrewState {
    pub fn new(id: u32, lon: f64, lat: f64) -> Self {
        CrewState {
            id,
            lon,
            lat,
            worked_today: false,
            rollover: None,
        }
    }
}

/// What one crew accomplished in a day.
#[derive(Debug, Default)]
pub struct CrewDayReport {
    pub surveys: Vec<SiteSurvey>,
    /// Sites whose flag this (follow-up, component-scale) visit resolved
    pub resolved_flags: Vec<usize>,
    pub sites_visited: u32,
    pub travel_min: f64,
    pub survey_min: f64,
    pub worked: bool,
}

/// Work window in minutes from local midnight, centered on noon.
#[derive(Debug, Clone, Copy)]
pub struct WorkWindow {
    pub start_min: f64,
    pub end_min: f64,
}

/// Resolve today's work window: daylight-capped max workday, centered in
/// the day. An infeasible window (zero or 24+ hours) is logged and falls
/// back to the configured maximum.
pub fn work_window(cfg: &MethodParams, ctx: &DayContext, crew_id: u32) -> WorkWindow {
    let mut hours = if cfg.consider_daylight {
        match ctx.daylight {
            Some(table) => table.get(ctx.timestep).min(cfg.max_workday),
            None => cfg.max_workday,
        }
    } else {
        cfg.max_workday
    };
    if hours <= 0.0 || hours >= 24.0 {
        warn!(
            method = %cfg.label,
            crew = crew_id,
            hours,
            "infeasible work window, falling back to max workday"
        );
        hours = cfg.max_workday.clamp(0.0, 23.0);
    }
    let start = (24.0 - hours) / 2.0 * 60.0;
    WorkWindow {
        start_min: start,
        end_min: start + hours * 60.0,
    }
}

enum VisitOutcome {
    /// Not enough time to reach the site (or reach it and get home)
    NoTime,
    /// Full survey fits today
    Full,
    /// Travel fits but the survey does not; start and roll the rest over
    Partial { onsite_min: f64, remaining_min: f64 },
}

/// The four-way time check for a prospective visit.
fn check_visit_time(
    survey_min: f64,
    travel_to_min: f64,
    travel_home_min: f64,
    mins_left: f64,
) -> VisitOutcome {
    if travel_to_min >= mins_left {
        VisitOutcome::NoTime
    } else if travel_to_min + travel_home_min >= mins_left {
        VisitOutcome::NoTime
    } else if travel_to_min + travel_home_min + survey_min <= mins_left
        || travel_to_min + survey_min <= mins_left
    {
        // The drive home may run past the window; overtime travel is
        // accepted rather than splitting the survey.
        VisitOutcome::Full
    } else {
        let onsite = mins_left - travel_to_min;
        VisitOutcome::Partial {
            onsite_min: onsite,
            remaining_min: survey_min - onsite,
        }
    }
}

fn travel_to_site(
    cfg: &MethodParams,
    crew: &CrewState,
    site: &Site,
    ctx: &DayContext,
    rng: &mut StdRng,
) -> f64 {
    match cfg.deployment_type {
        DeploymentType::Orbit => 0.0,
        _ if cfg.scheduling.route_planning => {
            let d = haversine_km(crew.lon, crew.lat, site.lon, site.lat);
            travel_minutes(d, &cfg.scheduling.speed_list, rng)
        }
        _ => {
            let table = if cfg.t_bw_sites.is_empty() {
                ctx.offsite_times
            } else {
                &cfg.t_bw_sites
            };
            sample_offsite_minutes(table, rng)
        }
    }
}

/// Travel-home leg from a site; under route planning this also picks the
/// home base the crew sleeps at.
fn travel_home(
    cfg: &MethodParams,
    from: (f64, f64),
    next_site: Option<&Site>,
    home_bases: &[(f64, f64)],
    ctx: &DayContext,
    rng: &mut StdRng,
) -> (f64, Option<(f64, f64)>) {
    match cfg.deployment_type {
        DeploymentType::Orbit => (0.0, None),
        _ if cfg.scheduling.route_planning => {
            let found = match next_site {
                Some(s) => find_homebase_opt(from.0, from.1, s.lon, s.lat, home_bases),
                None => find_homebase(from.0, from.1, home_bases),
            };
            match found {
                Some((base, dist_km)) => (
                    travel_minutes(dist_km, &cfg.scheduling.speed_list, rng),
                    Some(base),
                ),
                None => (0.0, None),
            }
        }
        _ => {
            let table = if cfg.t_bw_sites.is_empty() {
                ctx.offsite_times
            } else {
                &cfg.t_bw_sites
            };
            (sample_offsite_minutes(table, rng), None)
        }
    }
}

/// Run a mobile (or orbital) crew through one day over its triaged site
/// list. `crew_sites` is neglect-sorted by the company; `stats` is the
/// company's per-site statistics table.
#[allow(clippy::too_many_arguments)]
pub fn mobile_work_a_day(
    crew: &mut CrewState,
    crew_sites: &[usize],
    cfg: &MethodParams,
    stats: &mut [MethodSiteStats],
    dd: &DeploymentGrid,
    sensor: &dyn Sensor,
    home_bases: &[(f64, f64)],
    ctx: &DayContext,
    rng: &mut StdRng,
) -> CrewDayReport {
    let mut report = CrewDayReport::default();
    crew.worked_today = false;

    let window = work_window(cfg, ctx, crew.id);
    let mut now = window.start_min;
    let mut last_home_leg: Option<(f64, Option<(f64, f64)>)> = None;
    let mut pool: Vec<usize> = crew_sites.to_vec();

    // Finish yesterday's partial site first; capture the plan before
    // clearing so the remaining minutes are not lost.
    if let Some(plan) = crew.rollover.take() {
        pool.retain(|s| *s != plan.site_idx);
        let site = &ctx.sites[plan.site_idx];
        let travel_to = travel_to_site(cfg, crew, site, ctx, rng);
        let home = travel_home(cfg, (site.lon, site.lat), None, home_bases, ctx, rng);
        match check_visit_time(plan.remaining_min, travel_to, home.0, window.end_min - now) {
            VisitOutcome::NoTime => {
                // Day too short to even resume; keep the rollover and
                // try again tomorrow rather than starting another site
                crew.rollover = Some(plan);
                report.worked = false;
                return report;
            }
            VisitOutcome::Full => {
                now += travel_to + plan.remaining_min;
                report.travel_min += travel_to;
                report.survey_min += plan.remaining_min;
                complete_survey(plan.site_idx, cfg, sensor, ctx, rng, &mut report);
                crew.worked_today = true;
                last_home_leg = Some(home);
                move_crew(cfg, crew, site);
            }
            VisitOutcome::Partial {
                onsite_min,
                remaining_min,
            } => {
                report.travel_min += travel_to;
                report.survey_min += onsite_min;
                crew.rollover = Some(RolloverPlan {
                    site_idx: plan.site_idx,
                    remaining_min,
                });
                crew.worked_today = true;
                now = window.end_min;
                last_home_leg = Some(home);
                move_crew(cfg, crew, site);
            }
        }
    }

    while now < window.end_min {
        // Candidate pass: the pool is neglect-sorted, so an unripe site at
        // the head means nothing is ripe and the day ends.
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        let mut day_over = false;
        for &site_idx in &pool {
            let st = &stats[site_idx];
            if st.attempted_today {
                continue;
            }
            let site = &ctx.sites[site_idx];
            let Some(params) = site.params_for(&cfg.label) else {
                continue;
            };
            if st.days_since_survey < params.min_interval_days {
                day_over = true;
                break;
            }
            if st.surveys_done_this_year >= params.required_surveys {
                continue;
            }
            if !dd.is_deployable(site.lon_idx, site.lat_idx, ctx.timestep) {
                stats[site_idx].attempted_today = true;
                continue;
            }
            let travel_to = travel_to_site(cfg, crew, site, ctx, rng);
            candidates.push((site_idx, travel_to));
            if !cfg.scheduling.route_planning {
                break; // neglect order: first ripe site wins
            }
        }
        if day_over {
            now = window.end_min;
            break;
        }
        let Some(&(site_idx, travel_to)) = (if cfg.scheduling.route_planning {
            candidates
                .iter()
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        } else {
            candidates.first()
        }) else {
            break;
        };

        let site = &ctx.sites[site_idx];
        let survey_min = site
            .params_for(&cfg.label)
            .map(|p| p.survey_time_min)
            .unwrap_or(0.0);
        let home = travel_home(cfg, (site.lon, site.lat), None, home_bases, ctx, rng);

        match check_visit_time(survey_min, travel_to, home.0, window.end_min - now) {
            VisitOutcome::NoTime => break,
            VisitOutcome::Full => {
                now += travel_to + survey_min;
                report.travel_min += travel_to;
                report.survey_min += survey_min;
                stats[site_idx].record_survey();
                stats[site_idx].attempted_today = true;
                complete_survey(site_idx, cfg, sensor, ctx, rng, &mut report);
                crew.worked_today = true;
                last_home_leg = Some(home);
                move_crew(cfg, crew, site);
                pool.retain(|s| *s != site_idx);
            }
            VisitOutcome::Partial {
                onsite_min,
                remaining_min,
            } => {
                report.travel_min += travel_to;
                report.survey_min += onsite_min;
                stats[site_idx].record_survey();
                stats[site_idx].attempted_today = true;
                crew.rollover = Some(RolloverPlan {
                    site_idx,
                    remaining_min,
                });
                crew.worked_today = true;
                now = window.end_min;
                last_home_leg = Some(home);
                move_crew(cfg, crew, site);
                break;
            }
        }
    }

    // Head home on the last computed leg; the crew overnights there.
    if crew.worked_today {
        let (home_min, base) = match last_home_leg {
            Some(leg) => leg,
            None => travel_home(cfg, (crew.lon, crew.lat), None, home_bases, ctx, rng),
        };
        report.travel_min += home_min;
        if let Some((lon, lat)) = base {
            crew.lon = lon;
            crew.lat = lat;
        }
    }
    report.worked = crew.worked_today;
    report
}

/// Pinned-site day for a stationary monitor.
pub fn stationary_work_a_day(
    site_idx: usize,
    cfg: &MethodParams,
    stats: &mut [MethodSiteStats],
    dd: &DeploymentGrid,
    sensor: &dyn Sensor,
    ctx: &DayContext,
    rng: &mut StdRng,
) -> CrewDayReport {
    let mut report = CrewDayReport::default();
    let site = &ctx.sites[site_idx];
    if !dd.is_deployable(site.lon_idx, site.lat_idx, ctx.timestep) {
        return report;
    }
    let st = &stats[site_idx];
    if let Some(params) = site.params_for(&cfg.label) {
        if st.surveys_done_this_year >= params.required_surveys {
            return report;
        }
    }
    stats[site_idx].record_survey();
    stats[site_idx].attempted_today = true;
    complete_survey(site_idx, cfg, sensor, ctx, rng, &mut report);
    report.worked = true;
    report
}

fn complete_survey(
    site_idx: usize,
    cfg: &MethodParams,
    sensor: &dyn Sensor,
    ctx: &DayContext,
    rng: &mut StdRng,
    report: &mut CrewDayReport,
) {
    let snap = ctx.snapshot(site_idx, rng);
    let survey = sensor.detect(&snap, rng);
    // A follow-up visit that tags leaks individually resolves the flag
    if cfg.is_follow_up
        && cfg.measurement_scale == ldar_core::MeasurementScale::Component
        && ctx.sites[site_idx].currently_flagged
    {
        report.resolved_flags.push(site_idx);
    }
    report.sites_visited += 1;
    report.surveys.push(survey);
}

fn move_crew(cfg: &MethodParams, crew: &mut CrewState, site: &Site) {
    // Without route planning the crew's geography is only used for weather
    // lookup, never travel, so position updates are skipped.
    if cfg.scheduling.route_planning {
        crew.lon = site.lon;
        crew.lat = site.lat;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_visit_time_outcomes() {
        // No time to reach the site
        assert!(matches!(
            check_visit_time(60.0, 500.0, 10.0, 480.0),
            VisitOutcome::NoTime
        ));
        // Travel there and back eats the window
        assert!(matches!(
            check_visit_time(60.0, 250.0, 250.0, 480.0),
            VisitOutcome::NoTime
        ));
        // Everything fits
        assert!(matches!(
            check_visit_time(60.0, 30.0, 30.0, 480.0),
            VisitOutcome::Full
        ));
        // Survey longer than the day: start and roll over
        match check_visit_time(500.0, 30.0, 30.0, 480.0) {
            VisitOutcome::Partial {
                onsite_min,
                remaining_min,
            } => {
                assert!((onsite_min - 450.0).abs() < 1e-9);
                assert!((remaining_min - 50.0).abs() < 1e-9);
            }
            _ => panic!("expected partial visit"),
        }
    }

    #[test]
    fn partial_minutes_conserve_survey_time() {
        for mins_left in [100.0, 200.0, 400.0] {
            if let VisitOutcome::Partial {
                onsite_min,
                remaining_min,
            } = check_visit_time(500.0, 20.0, 20.0, mins_left)
            {
                assert!((onsite_min + remaining_min - 500.0).abs() < 1e-9);
            }
        }
    }
}
