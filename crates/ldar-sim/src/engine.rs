//! The daily simulation engine.
//!
//! Owns the authoritative site, leak and tag state and drives one
//! simulation forward a day at a time in a fixed order: leak aging, new
//! leak spawn, method companies in declared order, the operator, repairs,
//! then daily reporting. Companies see read-only views and return events;
//! the engine is the only writer, so a later company observes the tags an
//! earlier company produced the same day and nothing else mutates under
//! anyone's feet.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use ldar_core::{
    units::GS_TO_KG_PER_DAY, GeneratedWorld, LdarResult, Leak, LeakStatus, MethodSiteStats,
    ProgramParams, SimSettings, Site,
};
use ldar_methods::{Company, CompanyReport, DayContext, MethodTimeseries};
use ldar_weather::{DaylightTable, WeatherGrid};

use crate::operator::{OperatorAgent, OPERATOR_COMPANY};
use crate::world::gen_empirical_vents;
use ldar_io::ProgramInputs;

/// Per-day program-level timeseries.
#[derive(Debug, Clone, Default)]
pub struct DailyTimeseries {
    pub datetime: Vec<NaiveDate>,
    pub active_leaks: Vec<u32>,
    pub new_leaks: Vec<u32>,
    pub cum_repaired_leaks: Vec<u32>,
    pub daily_emissions_kg: Vec<f64>,
    pub n_tags: Vec<u32>,
    pub total_daily_cost: Vec<f64>,
}

/// Everything a finished method contributes to the outputs.
#[derive(Debug, Clone)]
pub struct MethodOutput {
    pub label: String,
    pub timeseries: MethodTimeseries,
    pub site_stats: Vec<MethodSiteStats>,
    pub dd_map: Vec<Vec<f64>>,
    pub mcb_map: Vec<Vec<u32>>,
}

/// Result of one finished simulation.
#[derive(Debug, Clone)]
pub struct SimOutput {
    pub program_name: String,
    pub sim_idx: usize,
    pub timeseries: DailyTimeseries,
    pub leaks: Vec<Leak>,
    pub sites: Vec<Site>,
    pub methods: Vec<MethodOutput>,
}

pub struct Simulation {
    settings: SimSettings,
    program: ProgramParams,
    sim_idx: usize,
    sites: Vec<Site>,
    leaks: Vec<Leak>,
    /// Active leak indices per site
    active_by_site: Vec<Vec<usize>>,
    /// Tagged, still-active leaks awaiting repair
    tags: Vec<usize>,
    companies: Vec<Company>,
    operator: Option<OperatorAgent>,
    weather: Arc<WeatherGrid>,
    daylight: Option<DaylightTable>,
    offsite_times: Vec<f64>,
    empirical_vents: Vec<f64>,
    leak_series: Vec<Vec<Option<Leak>>>,
    seed_series: Option<Vec<u64>>,
    ts: DailyTimeseries,
    rng: StdRng,
}

impl Simulation {
    /// Assemble a simulation from a generated world and loaded inputs.
    pub fn new(
        settings: SimSettings,
        program: ProgramParams,
        world: GeneratedWorld,
        inputs: &ProgramInputs,
        weather: Arc<WeatherGrid>,
        sim_idx: usize,
        seed: u64,
    ) -> LdarResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sites = world.sites;
        let n_sites = sites.len();

        let mut leaks: Vec<Leak> = Vec::new();
        let mut active_by_site: Vec<Vec<usize>> = vec![Vec::new(); n_sites];
        for (site_idx, initial) in world.initial_leaks.into_iter().enumerate() {
            for leak in initial {
                active_by_site[site_idx].push(leaks.len());
                leaks.push(leak);
            }
        }

        let daylight = if program.consider_daylight && n_sites > 0 {
            let mean_lat = sites.iter().map(|s| s.lat).sum::<f64>() / n_sites as f64;
            Some(DaylightTable::new(
                mean_lat,
                settings.start_date,
                settings.timesteps().max(1),
            ))
        } else {
            None
        };

        let empirical_vents = if program.consider_venting {
            gen_empirical_vents(inputs, &mut rng)
        } else {
            Vec::new()
        };

        let operator = if program.consider_operator {
            Some(OperatorAgent::new(
                program.operator_strength,
                &inputs.empirical_leaks,
            ))
        } else {
            None
        };

        let mut companies = Vec::with_capacity(program.methods.len());
        for method in &program.methods {
            let home_bases = inputs
                .home_bases
                .get(&method.label)
                .cloned()
                .unwrap_or_default();
            companies.push(Company::new(
                method.clone(),
                &sites,
                &weather,
                &settings,
                &inputs.empirical_leaks,
                home_bases,
                &mut rng,
            )?);
        }

        // Clear flag state carried in from a cached world
        for site in &mut sites {
            site.currently_flagged = false;
            site.date_flagged = None;
            site.flagged_by = None;
        }

        info!(
            program = %program.program_name,
            sim = sim_idx,
            sites = n_sites,
            initial_leaks = leaks.len(),
            "simulation initialized"
        );

        Ok(Simulation {
            settings,
            program,
            sim_idx,
            sites,
            leaks,
            active_by_site,
            tags: Vec::new(),
            companies,
            operator,
            weather,
            daylight,
            offsite_times: inputs.offsite_times.clone(),
            empirical_vents,
            leak_series: world.leak_timeseries,
            seed_series: world.seed_timeseries,
            ts: DailyTimeseries::default(),
            rng,
        })
    }

    /// Run every day and produce the simulation output.
    pub fn run(mut self) -> LdarResult<SimOutput> {
        let n_days = self.settings.timesteps();
        for t in 0..n_days {
            self.step(t);
        }
        Ok(self.finalize())
    }

    fn step(&mut self, t: usize) {
        let date = self.settings.start_date + Duration::days(t as i64);
        if let Some(seeds) = &self.seed_series {
            // Preseeded runs restore a known stream each day
            self.rng = StdRng::seed_from_u64(seeds[t % seeds.len()]);
        }

        // 1. Leak aging
        for leak in &mut self.leaks {
            if leak.is_active() {
                leak.days_active += 1;
            }
        }
        let active_count = self.leaks.iter().filter(|l| l.is_active()).count() as u32;
        self.ts.datetime.push(date);
        self.ts.active_leaks.push(active_count);

        // 2. New-leak spawn from the pre-generated timeseries
        let mut new_leaks = 0u32;
        for site_idx in 0..self.sites.len() {
            if let Some(leak) = self
                .leak_series
                .get(site_idx)
                .and_then(|series| series.get(t))
                .and_then(|slot| slot.clone())
            {
                self.active_by_site[site_idx].push(self.leaks.len());
                self.leaks.push(leak);
                new_leaks += 1;
            }
        }
        self.ts.new_leaks.push(new_leaks);

        // 3. Companies, in declared order
        let mut cost_today = 0.0;
        for i in 0..self.companies.len() {
            let report = {
                let ctx = DayContext {
                    date,
                    timestep: t,
                    sites: &self.sites,
                    leaks: &self.leaks,
                    active_by_site: &self.active_by_site,
                    weather: &self.weather,
                    daylight: self.daylight.as_ref(),
                    offsite_times: &self.offsite_times,
                    empirical_vents: &self.empirical_vents,
                    consider_venting: self.program.consider_venting,
                    program: &self.program,
                };
                self.companies[i].deploy_crews(&ctx, &mut self.rng)
            };
            cost_today += report.cost_today;
            self.apply_report(report, date);
        }

        // 4. Operator, Mondays only
        if date.weekday() == Weekday::Mon {
            if let Some(operator) = &self.operator {
                let found = operator.work_a_day(&self.leaks, &mut self.rng);
                for leak_idx in found {
                    self.apply_tag(leak_idx, OPERATOR_COMPANY.to_string(), 0, date);
                }
            }
        }

        // 5. Repairs
        cost_today += self.repair_sweep(date);

        // 6. Daily aggregates
        self.ts.cum_repaired_leaks.push(
            self.leaks
                .iter()
                .filter(|l| l.status == LeakStatus::Repaired)
                .count() as u32,
        );
        self.ts.daily_emissions_kg.push(
            self.leaks
                .iter()
                .filter(|l| l.is_active())
                .map(|l| l.rate_g_s * GS_TO_KG_PER_DAY)
                .sum(),
        );
        self.ts.n_tags.push(self.tags.len() as u32);
        self.ts.total_daily_cost.push(cost_today);
    }

    fn apply_report(&mut self, report: CompanyReport, date: NaiveDate) {
        for tag in report.tags {
            self.apply_tag(tag.leak_idx, tag.company, tag.crew_id, date);
        }
        for flag in report.flags {
            let site = &mut self.sites[flag.site_idx];
            site.currently_flagged = true;
            site.date_flagged = Some(date);
            site.flagged_by = Some(flag.company);
        }
        for site_idx in report.unflags {
            self.sites[site_idx].currently_flagged = false;
        }
    }

    fn apply_tag(&mut self, leak_idx: usize, company: String, crew_id: u32, date: NaiveDate) {
        let site = &self.sites[self.leaks[leak_idx].site_idx];
        let (init_by, init_date) = if site.currently_flagged && site.flagged_by.is_some() {
            // Credit first detection to the flagging company
            (site.flagged_by.clone(), site.date_flagged)
        } else {
            (Some(company.clone()), Some(date))
        };

        let leak = &mut self.leaks[leak_idx];
        if leak.tagged || !leak.is_active() {
            return;
        }
        leak.tagged = true;
        leak.date_tagged = Some(date);
        leak.tagged_by_company = Some(company);
        leak.tagged_by_crew = Some(crew_id);
        leak.init_detect_by = init_by;
        leak.init_detect_date = init_date;
        self.tags.push(leak_idx);
    }

    /// Repair due tags and expire leaks past their natural lifetime.
    /// Returns the day's repair cost.
    fn repair_sweep(&mut self, date: NaiveDate) -> f64 {
        let mut cost = 0.0;
        let mut still_tagged = Vec::with_capacity(self.tags.len());
        let tags = std::mem::take(&mut self.tags);
        for leak_idx in tags {
            let leak = &self.leaks[leak_idx];
            let Some(date_tagged) = leak.date_tagged else {
                continue;
            };
            let company = leak.tagged_by_company.as_deref().unwrap_or("");
            let reporting_delay = if company == OPERATOR_COMPANY {
                0
            } else {
                self.program.reporting_delay_of(company)
            };
            let due = self.program.repair_delay + reporting_delay;
            if (date - date_tagged).num_days() >= due as i64 {
                self.repair_leak(leak_idx, date);
                cost += self.program.repair_cost;
            } else {
                still_tagged.push(leak_idx);
            }
        }
        self.tags = still_tagged;

        // Natural end-of-life: a leak that survives NRd days gets fixed in
        // the normal course of operations, tagged or not.
        let nrd = self.program.nrd;
        for leak_idx in 0..self.leaks.len() {
            let leak = &self.leaks[leak_idx];
            if leak.is_active() && leak.days_active >= nrd {
                if !leak.tagged {
                    self.apply_tag(leak_idx, "natural".to_string(), 0, date);
                }
                self.tags.retain(|i| *i != leak_idx);
                self.repair_leak(leak_idx, date);
            }
        }
        cost
    }

    fn repair_leak(&mut self, leak_idx: usize, date: NaiveDate) {
        let leak = &mut self.leaks[leak_idx];
        leak.status = LeakStatus::Repaired;
        leak.tagged = false;
        leak.date_repaired = Some(date);
        leak.repair_delay_days = leak
            .date_tagged
            .map(|tagged| (date - tagged).num_days().max(0) as u32);
        let site_idx = leak.site_idx;
        self.active_by_site[site_idx].retain(|i| *i != leak_idx);
    }

    fn finalize(mut self) -> SimOutput {
        // Attribute lifetime emissions to sites and count leak outcomes
        for leak in &self.leaks {
            let site = &mut self.sites[leak.site_idx];
            site.total_emissions_kg += leak.lifetime_emissions_kg();
            match leak.status {
                LeakStatus::Active => site.active_leaks += 1,
                LeakStatus::Repaired => site.repaired_leaks += 1,
            }
        }

        let sites = self.sites;
        let methods = self
            .companies
            .iter_mut()
            .map(|company| {
                company.finalize_site_stats(&sites);
                MethodOutput {
                    label: company.label().to_string(),
                    timeseries: company.timeseries().clone(),
                    site_stats: company.site_stats().to_vec(),
                    dd_map: company.deployment_grid().dd_fraction_map(),
                    mcb_map: company.deployment_grid().mcb_map(),
                }
            })
            .collect();

        debug!(
            program = %self.program.program_name,
            sim = self.sim_idx,
            leaks = self.leaks.len(),
            "simulation finalized"
        );

        SimOutput {
            program_name: self.program.program_name.clone(),
            sim_idx: self.sim_idx,
            timeseries: self.ts,
            leaks: self.leaks,
            sites,
            methods,
        }
    }
}
