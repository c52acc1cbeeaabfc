//! Virtual-world generation.
//!
//! Builds the site table from the facility CSV (sampling, deterministic
//! shuffle, subtype parameter attachment, weather-cell resolution), draws
//! initial leaks and the per-day new-leak timeseries, and derives the
//! empirical vented-emissions distribution. `regenerate_sites` swaps only
//! per-method site parameters so a second program replays the first
//! program's leak realisations.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use ldar_core::{
    leak_rvs, DistKind, GeneratedWorld, LdarError, LdarResult, Leak, LeakDistribution,
    LeakFileUse, ProgramParams, SimSettings, Site, SiteMethodParams,
    units::{MassUnit, TimeUnit},
};
use ldar_io::{FacilityRow, ProgramInputs};

/// Where a site's leak rates come from: the empirical sample column or a
/// per-subtype fitted/parameterized distribution.
pub struct LeakSampler {
    empirical: Vec<f64>,
    dists: HashMap<u32, (LeakDistribution, (MassUnit, TimeUnit))>,
    fallback: Option<(LeakDistribution, (MassUnit, TimeUnit))>,
    max_rate_g_s: Option<f64>,
    use_empirical: bool,
}

impl LeakSampler {
    pub fn new(program: &ProgramParams, inputs: &ProgramInputs) -> LdarResult<Self> {
        let units = (
            MassUnit::parse(&program.leak_rate_units.0)?,
            TimeUnit::parse(&program.leak_rate_units.1)?,
        );

        let mut dists = HashMap::new();
        for (code, row) in &inputs.subtype_dists {
            let kind = DistKind::parse(&row.dist_type)?;
            let dist = LeakDistribution::from_params(kind, row.dist_sigma, row.dist_mu)?;
            let row_units = (
                MassUnit::parse(&row.dist_metric)?,
                TimeUnit::parse(&row.dist_increment)?,
            );
            dists.insert(*code, (dist, row_units));
        }

        let use_empirical = program.leak_file.is_some()
            && program.leak_file_use == LeakFileUse::Sample
            && !inputs.empirical_leaks.is_empty();

        let fallback = if use_empirical {
            None
        } else if program.leak_file.is_some() && program.leak_file_use == LeakFileUse::Fit {
            Some((
                LeakDistribution::fit(program.leak_dist_type, &inputs.empirical_leaks)?,
                (MassUnit::Gram, TimeUnit::Second),
            ))
        } else {
            Some((
                LeakDistribution::from_params(
                    program.leak_dist_type,
                    program.leak_dist_sigma,
                    program.leak_dist_mu,
                )?,
                units,
            ))
        };

        Ok(LeakSampler {
            empirical: inputs.empirical_leaks.clone(),
            dists,
            fallback,
            max_rate_g_s: program.max_leak_rate,
            use_empirical,
        })
    }

    /// Draw one leak rate in g/s for a site of the given subtype.
    pub fn sample_rate(&self, subtype_code: u32, rng: &mut StdRng) -> f64 {
        if self.use_empirical {
            return self.empirical[rng.gen_range(0..self.empirical.len())];
        }
        // Construction guarantees a fallback whenever sampling is not
        // empirical, so the else arm is unreachable in practice
        match self.dists.get(&subtype_code).or(self.fallback.as_ref()) {
            Some((dist, units)) => leak_rvs(dist, self.max_rate_g_s, *units, rng),
            None => 0.0,
        }
    }
}

/// Build the site table for a program: sample, shuffle, attach subtype
/// survey times, and resolve each site's weather cell (fatal when a site
/// falls off the grid).
pub fn build_sites(
    program: &ProgramParams,
    inputs: &ProgramInputs,
    rng: &mut StdRng,
) -> LdarResult<Vec<Site>> {
    let mut rows: Vec<FacilityRow> = inputs.facilities.clone();
    if rows.is_empty() {
        return Err(LdarError::Parameter(format!(
            "program '{}' has an empty facility table",
            program.program_name
        )));
    }
    if let Some(n) = program.site_samples {
        if n < rows.len() {
            rows = rows
                .choose_multiple(rng, n)
                .cloned()
                .collect();
        }
    }
    // Shuffle so equal neglect ranks break ties in a random but
    // reproducible order
    rows.shuffle(rng);

    let mut sites = Vec::with_capacity(rows.len());
    for row in rows {
        let (lat_idx, lon_idx) = inputs
            .weather
            .cell_for(&row.facility_id, row.lat, row.lon)?;
        let mut method_params = row.method_params;
        // Subtype survey-time table fills any per-method gaps
        if let Some(cols) = inputs.subtype_times.get(&row.subtype_code) {
            for method in &program.methods {
                let entry = method_params.entry(method.label.clone());
                let time = cols.get(&format!("{}_time", method.label)).copied();
                let rs = cols.get(&format!("{}_RS", method.label)).copied();
                let min_int = cols.get(&format!("{}_min_int", method.label)).copied();
                if let (Some(t), Some(r), Some(m)) = (time, rs, min_int) {
                    entry.or_insert(SiteMethodParams {
                        survey_time_min: t,
                        required_surveys: r as u32,
                        min_interval_days: m as u32,
                    });
                }
            }
        }
        sites.push(Site {
            facility_id: row.facility_id,
            lat: row.lat,
            lon: row.lon,
            lat_idx,
            lon_idx,
            subtype_code: row.subtype_code,
            equipment_groups: row.equipment_groups.max(1),
            method_params,
            currently_flagged: false,
            date_flagged: None,
            flagged_by: None,
            initial_leak_count: 0,
            cum_leaks: 0,
            total_emissions_kg: 0.0,
            active_leaks: 0,
            repaired_leaks: 0,
        });
    }
    Ok(sites)
}

fn generate_leak(
    site: &mut Site,
    site_idx: usize,
    sampler: &LeakSampler,
    date_began: NaiveDate,
    days_active: u32,
    rng: &mut StdRng,
) -> Leak {
    let rate = sampler.sample_rate(site.subtype_code, rng);
    let equipment_group = rng.gen_range(1..=site.equipment_groups.max(1));
    let leak_id = site.next_leak_id();
    Leak::new(
        leak_id,
        site.facility_id.clone(),
        site_idx,
        equipment_group,
        rate,
        site.lat,
        site.lon,
        date_began,
        days_active,
    )
}

/// Initial leaks at one site. The count comes from the empirical count
/// column when present, otherwise Binomial(NRd, LPR); each leak is
/// back-dated by a uniform age below NRd.
fn gen_initial_leaks(
    site: &mut Site,
    site_idx: usize,
    program: &ProgramParams,
    inputs: &ProgramInputs,
    sampler: &LeakSampler,
    start_date: NaiveDate,
    rng: &mut StdRng,
) -> Vec<Leak> {
    let n_leaks = if inputs.empirical_counts.is_empty() {
        let mut n = 0u32;
        for _ in 0..program.nrd {
            if rng.gen_bool(program.lpr.clamp(0.0, 1.0)) {
                n += 1;
            }
        }
        n
    } else {
        inputs.empirical_counts[rng.gen_range(0..inputs.empirical_counts.len())]
    };
    site.initial_leak_count = n_leaks;

    (0..n_leaks)
        .map(|_| {
            let days_active = rng.gen_range(0..program.nrd.max(1));
            let date_began = start_date - Duration::days(days_active as i64);
            generate_leak(site, site_idx, sampler, date_began, days_active, rng)
        })
        .collect()
}

/// Per-day new-leak draws for one site: Bernoulli(LPR) per day, one leak
/// on a hit.
fn gen_leak_timeseries(
    site: &mut Site,
    site_idx: usize,
    program: &ProgramParams,
    sampler: &LeakSampler,
    start_date: NaiveDate,
    n_days: usize,
    rng: &mut StdRng,
) -> Vec<Option<Leak>> {
    (0..n_days)
        .map(|t| {
            if rng.gen_bool(program.lpr.clamp(0.0, 1.0)) {
                let date = start_date + Duration::days(t as i64);
                Some(generate_leak(site, site_idx, sampler, date, 0, rng))
            } else {
                None
            }
        })
        .collect()
}

/// Generate the full world for one simulation index.
pub fn generate_world(
    settings: &SimSettings,
    program: &ProgramParams,
    inputs: &ProgramInputs,
    rng: &mut StdRng,
) -> LdarResult<GeneratedWorld> {
    let sampler = LeakSampler::new(program, inputs)?;
    let mut sites = build_sites(program, inputs, rng)?;
    let n_days = settings.timesteps();

    let mut initial_leaks = Vec::with_capacity(sites.len());
    let mut leak_timeseries = Vec::with_capacity(sites.len());
    for site_idx in 0..sites.len() {
        let leaks = gen_initial_leaks(
            &mut sites[site_idx],
            site_idx,
            program,
            inputs,
            &sampler,
            settings.start_date,
            rng,
        );
        initial_leaks.push(leaks);
        let series = gen_leak_timeseries(
            &mut sites[site_idx],
            site_idx,
            program,
            &sampler,
            settings.start_date,
            n_days,
            rng,
        );
        leak_timeseries.push(series);
    }

    let seed_timeseries = if settings.preseed_random {
        Some((0..n_days).map(|_| rng.gen::<u64>()).collect())
    } else {
        None
    };

    Ok(GeneratedWorld {
        sites,
        initial_leaks,
        leak_timeseries,
        seed_timeseries,
    })
}

/// Re-evaluate a pre-generated world's sites against another program's
/// facility table: site identity, positions and leak realisations are
/// preserved, only the per-method survey parameters change.
pub fn regenerate_sites(
    base: &GeneratedWorld,
    program: &ProgramParams,
    inputs: &ProgramInputs,
) -> LdarResult<GeneratedWorld> {
    let by_id: HashMap<&str, &FacilityRow> = inputs
        .facilities
        .iter()
        .map(|row| (row.facility_id.as_str(), row))
        .collect();

    let mut sites = base.sites.clone();
    for site in &mut sites {
        let row = by_id.get(site.facility_id.as_str()).ok_or_else(|| {
            LdarError::Parameter(format!(
                "program '{}' facility table is missing site '{}'",
                program.program_name, site.facility_id
            ))
        })?;
        site.method_params = row.method_params.clone();
        if let Some(cols) = inputs.subtype_times.get(&site.subtype_code) {
            for method in &program.methods {
                let time = cols.get(&format!("{}_time", method.label)).copied();
                let rs = cols.get(&format!("{}_RS", method.label)).copied();
                let min_int = cols.get(&format!("{}_min_int", method.label)).copied();
                if let (Some(t), Some(r), Some(m)) = (time, rs, min_int) {
                    site.method_params
                        .entry(method.label.clone())
                        .or_insert(SiteMethodParams {
                            survey_time_min: t,
                            required_surveys: r as u32,
                            min_interval_days: m as u32,
                        });
                }
            }
        }
    }

    Ok(GeneratedWorld {
        sites,
        initial_leaks: base.initial_leaks.clone(),
        leak_timeseries: base.leak_timeseries.clone(),
        seed_timeseries: base.seed_timeseries.clone(),
    })
}

/// Empirical vented-emission distribution by Monte Carlo: for each draw,
/// a site's total emissions minus a drawn set of leaks; negatives clamp
/// to zero. Empty when the program does not consider venting.
pub fn gen_empirical_vents(inputs: &ProgramInputs, rng: &mut StdRng) -> Vec<f64> {
    if inputs.empirical_sites.is_empty()
        || inputs.empirical_leaks.is_empty()
        || inputs.empirical_counts.is_empty()
    {
        return Vec::new();
    }
    const DRAWS: usize = 1000;
    (0..DRAWS)
        .map(|_| {
            let n_leaks = inputs.empirical_counts[rng.gen_range(0..inputs.empirical_counts.len())];
            let leak_total: f64 = (0..n_leaks)
                .map(|_| inputs.empirical_leaks[rng.gen_range(0..inputs.empirical_leaks.len())])
                .sum();
            let site_total =
                inputs.empirical_sites[rng.gen_range(0..inputs.empirical_sites.len())];
            (site_total - leak_total).max(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldar_weather::WeatherGrid;
    use rand::SeedableRng;

    fn inputs(n_sites: usize) -> ProgramInputs {
        let facilities = (0..n_sites)
            .map(|i| {
                let mut method_params = HashMap::new();
                method_params.insert(
                    "OGI".to_string(),
                    SiteMethodParams {
                        survey_time_min: 120.0,
                        required_surveys: 2,
                        min_interval_days: 30,
                    },
                );
                FacilityRow {
                    facility_id: format!("F{i:03}"),
                    lat: 55.0 + i as f64 * 0.1,
                    lon: -110.0 - i as f64 * 0.1,
                    subtype_code: 0,
                    equipment_groups: 3,
                    method_params,
                }
            })
            .collect();
        let days = 30;
        ProgramInputs {
            facilities,
            empirical_leaks: vec![0.1, 0.5, 1.0, 2.0],
            empirical_counts: vec![0, 1, 2],
            empirical_sites: vec![1.0, 3.0],
            offsite_times: vec![15.0, 30.0],
            subtype_dists: HashMap::new(),
            subtype_times: HashMap::new(),
            home_bases: HashMap::new(),
            weather: WeatherGrid::from_daily(
                vec![54.0, 56.0],
                vec![249.0, 251.0],
                vec![10.0; 4 * days],
                vec![2.0; 4 * days],
                vec![0.0; 4 * days],
            )
            .unwrap(),
        }
    }

    fn program() -> ProgramParams {
        serde_json::from_value(serde_json::json!({
            "program_name": "P_test",
            "leak_file": "leaks.csv",
            "lpr": 0.05,
            "methods": [{"label": "OGI"}]
        }))
        .unwrap()
    }

    fn settings() -> SimSettings {
        serde_json::from_value(serde_json::json!({
            "start_date": "2020-01-01",
            "end_date": "2020-03-01"
        }))
        .unwrap()
    }

    #[test]
    fn world_generation_is_seed_deterministic() {
        let inputs = inputs(5);
        let a = generate_world(&settings(), &program(), &inputs, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = generate_world(&settings(), &program(), &inputs, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.sites.len(), b.sites.len());
        for (sa, sb) in a.sites.iter().zip(&b.sites) {
            assert_eq!(sa.facility_id, sb.facility_id);
        }
        for (la, lb) in a.initial_leaks.iter().zip(&b.initial_leaks) {
            assert_eq!(la.len(), lb.len());
            for (x, y) in la.iter().zip(lb) {
                assert_eq!(x.leak_id, y.leak_id);
                assert_eq!(x.rate_g_s, y.rate_g_s);
            }
        }
    }

    #[test]
    fn leak_timeseries_covers_every_day() {
        let world = generate_world(
            &settings(),
            &program(),
            &inputs(3),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert!(world.is_consistent());
        for series in &world.leak_timeseries {
            assert_eq!(series.len(), settings().timesteps());
        }
    }

    #[test]
    fn zero_lpr_spawns_no_new_leaks() {
        let mut p = program();
        p.lpr = 0.0;
        let world =
            generate_world(&settings(), &p, &inputs(4), &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(world
            .leak_timeseries
            .iter()
            .all(|series| series.iter().all(Option::is_none)));
    }

    #[test]
    fn regenerate_preserves_ids_and_timeseries() {
        let inputs = inputs(4);
        let base = generate_world(
            &settings(),
            &program(),
            &inputs,
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        let regen = regenerate_sites(&base, &program(), &inputs).unwrap();
        assert_eq!(base.sites.len(), regen.sites.len());
        for (a, b) in base.sites.iter().zip(&regen.sites) {
            assert_eq!(a.facility_id, b.facility_id);
        }
        for (a, b) in base.leak_timeseries.iter().zip(&regen.leak_timeseries) {
            assert_eq!(a.len(), b.len());
        }
    }

    #[test]
    fn vents_are_non_negative() {
        let inputs = inputs(2);
        let vents = gen_empirical_vents(&inputs, &mut StdRng::seed_from_u64(4));
        assert_eq!(vents.len(), 1000);
        assert!(vents.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn site_sampling_respects_requested_count() {
        let mut p = program();
        p.site_samples = Some(2);
        let world =
            generate_world(&settings(), &p, &inputs(6), &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(world.sites.len(), 2);
    }
}
