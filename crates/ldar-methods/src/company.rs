//! Per-method companies.
//!
//! A company owns its crews, its deployment-day grid, its per-site survey
//! statistics and its follow-up watchlist. Each day the simulation hands
//! it a read-only context; the company triages due sites, dispatches
//! crews, decides flags, and returns the day's events for the simulation
//! to apply.

use std::collections::HashMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use tracing::debug;

use ldar_core::{
    empirical_quantile, units::GS_TO_KG_PER_DAY, DeploymentType, InteractionPriority, LdarResult,
    MeasurementScale, MethodParams, MethodSiteStats, RedundancyFilter, SimSettings, Site,
    ThresholdType,
};
use ldar_weather::{DeploymentGrid, WeatherGrid};

use crate::context::{CompanyReport, DayContext, FlagEvent, TagEvent};
use crate::crew::{mobile_work_a_day, stationary_work_a_day, CrewDayReport, CrewState};
use crate::kmeans::kmeans_labels;
use crate::schedule::{
    crew_site_list, deployment_window, get_due_sites, get_working_crews, in_deployment_period,
};
use crate::sensor::{build_sensor, Sensor, SiteSurvey};

/// Per-day, per-method timeseries a company records.
#[derive(Debug, Clone)]
pub struct MethodTimeseries {
    pub cost: Vec<f64>,
    pub sites_visited: Vec<u32>,
    pub travel_time: Vec<f64>,
    pub survey_time: Vec<f64>,
    pub prop_sites_avail: Vec<f64>,
    pub eff_flags: Vec<u32>,
    pub flags_redund1: Vec<u32>,
    pub flags_redund2: Vec<u32>,
    pub flag_wo_vent: Vec<u32>,
    pub redund_tags: Vec<u32>,
}

impl MethodTimeseries {
    fn new(n: usize) -> Self {
        MethodTimeseries {
            cost: vec![0.0; n],
            sites_visited: vec![0; n],
            travel_time: vec![0.0; n],
            survey_time: vec![0.0; n],
            prop_sites_avail: vec![0.0; n],
            eff_flags: vec![0; n],
            flags_redund1: vec![0; n],
            flags_redund2: vec![0; n],
            flag_wo_vent: vec![0; n],
            redund_tags: vec![0; n],
        }
    }
}

/// One watched site pending a flag decision.
#[derive(Debug, Clone, Default)]
pub struct WatchEntry {
    pub dates: Vec<NaiveDate>,
    pub measured_rates: Vec<f64>,
    pub effective_rate: f64,
    /// True site rate and venting draw from the latest screening, kept
    /// for the venting-redundancy accounting at flag time
    pub site_true_rate: f64,
    pub vent_rate: f64,
}

pub struct Company {
    cfg: MethodParams,
    crews: Vec<CrewState>,
    /// Site pinned to each crew, stationary deployments only
    crew_sites: Vec<usize>,
    home_bases: Vec<(f64, f64)>,
    dd: DeploymentGrid,
    sensor: Box<dyn Sensor>,
    site_stats: Vec<MethodSiteStats>,
    watchlist: HashMap<usize, WatchEntry>,
    timeseries: MethodTimeseries,
    deployment_years: Vec<i32>,
    deployment_months: Vec<u32>,
    /// Resolved follow-up threshold, g/s
    follow_up_thresh_g_s: f64,
    instant_thresh_g_s: Option<f64>,
}

impl Company {
    /// Build a company for one method: validate the sensor, compute the
    /// deployment-day grid, resolve thresholds, cluster sites to crews,
    /// and charge the upfront cost.
    pub fn new(
        cfg: MethodParams,
        sites: &[Site],
        weather: &WeatherGrid,
        settings: &SimSettings,
        empirical_leaks_g_s: &[f64],
        home_bases: Vec<(f64, f64)>,
        rng: &mut StdRng,
    ) -> LdarResult<Self> {
        let sensor = build_sensor(&cfg)?;
        let timesteps = settings.timesteps();
        let dd = DeploymentGrid::compute(weather, &cfg.weather_limits, timesteps);
        let mut site_stats = vec![MethodSiteStats::default(); sites.len()];

        // Sites start ripe: the neglect clock opens at the minimum
        // interval so first-year surveys are not delayed by it
        for (stats, site) in site_stats.iter_mut().zip(sites) {
            if let Some(params) = site.params_for(&cfg.label) {
                stats.days_since_survey = params.min_interval_days;
            }
        }

        // Agent assignment: cluster sites geographically when several crews
        // route-plan; otherwise everyone shares label 0.
        if cfg.scheduling.route_planning && cfg.n_crews >= 2 {
            let points: Vec<(f64, f64)> = sites.iter().map(|s| (s.lat, s.lon)).collect();
            let labels = kmeans_labels(&points, cfg.n_crews, rng);
            for (stats, label) in site_stats.iter_mut().zip(labels) {
                stats.cluster = label;
            }
        }

        let (crews, crew_sites) = match cfg.deployment_type {
            DeploymentType::Stationary => {
                // One monitor per site carrying this method's parameters
                let pinned: Vec<usize> = sites
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.params_for(&cfg.label).is_some())
                    .map(|(i, _)| i)
                    .collect();
                let crews: Vec<CrewState> = pinned
                    .iter()
                    .enumerate()
                    .map(|(i, site_idx)| {
                        CrewState::new(i as u32 + 1, sites[*site_idx].lon, sites[*site_idx].lat)
                    })
                    .collect();
                (crews, pinned)
            }
            _ => {
                let (lon0, lat0) = initial_location(&cfg, &home_bases, sites);
                let crews = (0..cfg.n_crews)
                    .map(|i| CrewState::new(i as u32 + 1, lon0, lat0))
                    .collect();
                (crews, Vec::new())
            }
        };

        let (deployment_years, deployment_months) = deployment_window(&cfg, settings);

        let follow_up_thresh_g_s = resolve_threshold(
            cfg.follow_up.threshold,
            cfg.follow_up.threshold_type,
            cfg.follow_up.proportion,
            empirical_leaks_g_s,
        );
        let instant_thresh_g_s = cfg.follow_up.instant_threshold.map(|thresh| {
            resolve_threshold(
                thresh,
                cfg.follow_up.instant_threshold_type,
                cfg.follow_up.proportion,
                empirical_leaks_g_s,
            )
        });

        let mut timeseries = MethodTimeseries::new(timesteps);
        if timesteps > 0 {
            timeseries.cost[0] += cfg.cost.upfront * crews.len() as f64;
        }

        debug!(
            method = %cfg.label,
            crews = crews.len(),
            follow_up_thresh_g_s,
            "initialized company"
        );

        Ok(Company {
            cfg,
            crews,
            crew_sites,
            home_bases,
            dd,
            sensor,
            site_stats,
            watchlist: HashMap::new(),
            timeseries,
            deployment_years,
            deployment_months,
            follow_up_thresh_g_s,
            instant_thresh_g_s,
        })
    }

    pub fn label(&self) -> &str {
        &self.cfg.label
    }

    pub fn config(&self) -> &MethodParams {
        &self.cfg
    }

    pub fn site_stats(&self) -> &[MethodSiteStats] {
        &self.site_stats
    }

    pub fn timeseries(&self) -> &MethodTimeseries {
        &self.timeseries
    }

    pub fn deployment_grid(&self) -> &DeploymentGrid {
        &self.dd
    }

    /// Dispatch crews for the day and return the events to apply.
    pub fn deploy_crews(&mut self, ctx: &DayContext, rng: &mut StdRng) -> CompanyReport {
        let t = ctx.timestep;
        let mut report = CompanyReport::default();

        if in_deployment_period(ctx.date, &self.deployment_years, &self.deployment_months) {
            let pool = get_due_sites(&self.cfg, ctx, &self.site_stats);
            let n_working = match self.cfg.deployment_type {
                DeploymentType::Stationary => self.crews.len(),
                // Route-planned crews each own a cluster and deploy together
                _ if self.cfg.scheduling.route_planning => self.crews.len(),
                _ => get_working_crews(pool.len(), self.cfg.n_crews, 3),
            };

            let mut candidates: Vec<SiteSurvey> = Vec::new();
            let mut worked_crews = 0u32;
            for crew_idx in 0..n_working {
                let crew_report = match self.cfg.deployment_type {
                    DeploymentType::Stationary => {
                        let site_idx = self.crew_sites[crew_idx];
                        stationary_work_a_day(
                            site_idx,
                            &self.cfg,
                            &mut self.site_stats,
                            &self.dd,
                            self.sensor.as_ref(),
                            ctx,
                            rng,
                        )
                    }
                    _ => {
                        let list = crew_site_list(
                            &pool,
                            crew_idx,
                            n_working,
                            self.cfg.scheduling.route_planning,
                            &self.site_stats,
                        );
                        if list.is_empty() {
                            continue;
                        }
                        mobile_work_a_day(
                            &mut self.crews[crew_idx],
                            &list,
                            &self.cfg,
                            &mut self.site_stats,
                            &self.dd,
                            self.sensor.as_ref(),
                            &self.home_bases,
                            ctx,
                            rng,
                        )
                    }
                };
                if crew_report.worked {
                    worked_crews += 1;
                }
                let crew_id = crew_idx as u32 + 1;
                self.absorb_crew_report(crew_report, crew_id, t, &mut report, &mut candidates);
            }

            if !candidates.is_empty() {
                self.flag_sites(candidates, ctx, &mut report);
            }

            self.timeseries.prop_sites_avail[t] = self.dd.prop_sites_available(ctx.sites, t);

            // Cost accrual for the day's work
            let day_cost = worked_crews as f64 * self.cfg.cost.per_day
                + self.timeseries.sites_visited[t] as f64 * self.cfg.cost.per_site
                + (self.timeseries.travel_time[t] + self.timeseries.survey_time[t]) / 60.0
                    * self.cfg.cost.per_hour;
            self.timeseries.cost[t] += day_cost;
        } else {
            self.timeseries.prop_sites_avail[t] = 0.0;
        }

        report.cost_today = self.timeseries.cost[t];

        // Day-boundary bookkeeping for every site
        for stats in &mut self.site_stats {
            stats.roll_day(ctx.date);
        }

        report
    }

    fn absorb_crew_report(
        &mut self,
        crew_report: CrewDayReport,
        crew_id: u32,
        t: usize,
        report: &mut CompanyReport,
        candidates: &mut Vec<SiteSurvey>,
    ) {
        self.timeseries.sites_visited[t] += crew_report.sites_visited;
        self.timeseries.travel_time[t] += crew_report.travel_min;
        self.timeseries.survey_time[t] += crew_report.survey_min;
        report.unflags.extend(crew_report.resolved_flags);

        for survey in crew_report.surveys {
            match self.cfg.measurement_scale {
                MeasurementScale::Component => {
                    self.timeseries.redund_tags[t] += survey.redundant_tags;
                    self.site_stats[survey.site_idx].missed_leaks += survey.missed_leaks;
                    for leak_idx in &survey.new_tags {
                        report.tags.push(TagEvent {
                            leak_idx: *leak_idx,
                            site_idx: survey.site_idx,
                            company: self.cfg.label.clone(),
                            crew_id,
                        });
                    }
                }
                _ => {
                    self.site_stats[survey.site_idx].missed_leaks += survey.missed_leaks;
                    if survey.found_leak {
                        candidates.push(survey);
                    }
                }
            }
        }
    }

    /// Flag the most important watched sites for follow-up.
    fn flag_sites(
        &mut self,
        candidates: Vec<SiteSurvey>,
        ctx: &DayContext,
        report: &mut CompanyReport,
    ) {
        let mut instant: Vec<SiteSurvey> = Vec::new();
        for survey in candidates {
            if let Some(instant_thresh) = self.instant_thresh_g_s {
                if survey.site_measured_rate > instant_thresh {
                    instant.push(survey);
                    continue;
                }
            }
            let passes = match self.cfg.follow_up.interaction_priority {
                InteractionPriority::Threshold => {
                    survey.site_measured_rate > self.follow_up_thresh_g_s
                }
                InteractionPriority::Proportion => true,
            };
            if !passes {
                continue;
            }
            let entry = self.watchlist.entry(survey.site_idx).or_default();
            entry.dates.push(ctx.date);
            entry.measured_rates.push(survey.site_measured_rate);
            entry.site_true_rate = survey.site_true_rate;
            entry.vent_rate = survey.vent_rate;
            entry.effective_rate = match self.cfg.follow_up.redundancy_filter {
                RedundancyFilter::Recent => *entry.measured_rates.last().unwrap_or(&0.0),
                RedundancyFilter::Max => entry
                    .measured_rates
                    .iter()
                    .cloned()
                    .fold(f64::NEG_INFINITY, f64::max),
                RedundancyFilter::Mean => {
                    entry.measured_rates.iter().sum::<f64>() / entry.measured_rates.len() as f64
                }
            };
        }

        // Instant-threshold candidates bypass the watchlist entirely
        for survey in instant {
            self.raise_flag(survey.site_idx, &survey, ctx, report);
        }

        // Measurements may only sit on the watchlist for the configured delay
        if self.cfg.follow_up.delay > 0 {
            let horizon = self.cfg.follow_up.delay as i64;
            self.watchlist.retain(|_, entry| {
                entry
                    .dates
                    .last()
                    .map(|d| (ctx.date - *d).num_days() <= horizon)
                    .unwrap_or(false)
            });
        }

        let n_flag =
            (self.watchlist.len() as f64 * self.cfg.follow_up.ratio).ceil() as usize;
        if n_flag == 0 {
            return;
        }
        let mut ranked: Vec<(usize, f64)> = self
            .watchlist
            .iter()
            .map(|(site_idx, entry)| (*site_idx, entry.effective_rate))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let chosen: Vec<usize> = ranked.into_iter().take(n_flag).map(|(i, _)| i).collect();
        for site_idx in chosen {
            let entry = self.watchlist.remove(&site_idx).unwrap_or_default();
            // Reconstruct the survey view from the watch entry for the
            // redundancy accounting
            let survey = SiteSurvey {
                site_idx,
                found_leak: true,
                site_true_rate: entry.site_true_rate,
                site_measured_rate: entry.effective_rate,
                equip_measured_rates: Vec::new(),
                vent_rate: entry.vent_rate,
                leaks_present: ctx.active_by_site[site_idx].clone(),
                new_tags: Vec::new(),
                redundant_tags: 0,
                missed_leaks: 0,
            };
            self.raise_flag(site_idx, &survey, ctx, report);
        }
    }

    fn raise_flag(
        &mut self,
        site_idx: usize,
        survey: &SiteSurvey,
        ctx: &DayContext,
        report: &mut CompanyReport,
    ) {
        let t = ctx.timestep;
        let site = &ctx.sites[site_idx];
        let already_flagged = site.currently_flagged
            || report.flags.iter().any(|f| f.site_idx == site_idx);
        if already_flagged {
            self.timeseries.flags_redund1[t] += 1;
            return;
        }
        report.flags.push(FlagEvent {
            site_idx,
            company: self.cfg.label.clone(),
        });
        self.timeseries.eff_flags[t] += 1;

        // Does the chosen site already have tagged leaks?
        let has_tagged = survey
            .leaks_present
            .iter()
            .any(|leak_idx| ctx.leaks[*leak_idx].tagged);
        if has_tagged {
            self.timeseries.flags_redund2[t] += 1;
        }

        // Would the site have been chosen without venting?
        if ctx.consider_venting
            && (survey.site_true_rate - survey.vent_rate) < self.follow_up_thresh_g_s
        {
            self.timeseries.flag_wo_vent[t] += 1;
        }
    }

    /// Write per-site deployment-day fraction and blackout length from the
    /// company's weather maps into its site statistics.
    pub fn finalize_site_stats(&mut self, sites: &[Site]) {
        let dd_map = self.dd.dd_fraction_map();
        let mcb_map = self.dd.mcb_map();
        for (stats, site) in self.site_stats.iter_mut().zip(sites) {
            stats.prop_deploy_days = dd_map[site.lon_idx][site.lat_idx];
            stats.max_blackout = mcb_map[site.lon_idx][site.lat_idx];
        }
    }
}

fn initial_location(cfg: &MethodParams, home_bases: &[(f64, f64)], sites: &[Site]) -> (f64, f64) {
    if let Some([lon, lat]) = cfg.scheduling.crew_init_location {
        return (lon, lat);
    }
    if let Some(base) = home_bases.first() {
        return *base;
    }
    if sites.is_empty() {
        return (0.0, 0.0);
    }
    let n = sites.len() as f64;
    (
        sites.iter().map(|s| s.lon).sum::<f64>() / n,
        sites.iter().map(|s| s.lat).sum::<f64>() / n,
    )
}

/// Resolve a follow-up threshold to g/s: absolute thresholds arrive in
/// kg/day, proportion thresholds are a quantile of the empirical leak-rate
/// sample (already g/s).
fn resolve_threshold(
    threshold: f64,
    threshold_type: ThresholdType,
    proportion: f64,
    empirical_leaks_g_s: &[f64],
) -> f64 {
    match threshold_type {
        ThresholdType::Absolute => threshold / GS_TO_KG_PER_DAY,
        ThresholdType::Proportion => {
            if empirical_leaks_g_s.is_empty() {
                0.0
            } else {
                empirical_quantile(empirical_leaks_g_s, proportion)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_threshold_converts_to_g_s() {
        // 86.4 kg/day is exactly 1 g/s
        let thresh = resolve_threshold(86.4, ThresholdType::Absolute, 1.0, &[]);
        assert!((thresh - 1.0).abs() < 1e-12);
    }

    #[test]
    fn proportion_threshold_is_sample_quantile() {
        let leaks = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let thresh = resolve_threshold(0.0, ThresholdType::Proportion, 0.5, &leaks);
        assert!((thresh - 0.3).abs() < 1e-12);
    }
}
