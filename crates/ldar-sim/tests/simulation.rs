//! End-to-end engine behavior over hand-built worlds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use ldar_core::{
    GeneratedWorld, Leak, LeakStatus, ProgramParams, SimSettings, Site, SiteMethodParams,
};
use ldar_io::ProgramInputs;
use ldar_sim::{SimOutput, Simulation};
use ldar_weather::WeatherGrid;

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn settings(days: i64) -> SimSettings {
    serde_json::from_value(serde_json::json!({
        "start_date": "2020-01-01",
        "end_date": (start_date() + Duration::days(days)).to_string(),
        "write_data": false,
    }))
    .unwrap()
}

fn friendly_weather(days: usize) -> WeatherGrid {
    WeatherGrid::from_daily(
        vec![55.0],
        vec![248.0],
        vec![10.0; days],
        vec![2.0; days],
        vec![0.0; days],
    )
    .unwrap()
}

fn site_with(methods: &[(&str, f64, u32, u32)]) -> Site {
    let mut method_params = HashMap::new();
    for (label, time, rs, min_int) in methods {
        method_params.insert(
            label.to_string(),
            SiteMethodParams {
                survey_time_min: *time,
                required_surveys: *rs,
                min_interval_days: *min_int,
            },
        );
    }
    Site {
        facility_id: "F001".to_string(),
        lat: 55.0,
        lon: -112.0,
        lat_idx: 0,
        lon_idx: 0,
        subtype_code: 0,
        equipment_groups: 1,
        method_params,
        currently_flagged: false,
        date_flagged: None,
        flagged_by: None,
        initial_leak_count: 1,
        cum_leaks: 1,
        total_emissions_kg: 0.0,
        active_leaks: 0,
        repaired_leaks: 0,
    }
}

fn world_with_one_leak(site: Site, rate: f64, days: usize) -> GeneratedWorld {
    let leak = Leak::new(
        "F001_00001".to_string(),
        "F001".to_string(),
        0,
        1,
        rate,
        site.lat,
        site.lon,
        start_date(),
        0,
    );
    GeneratedWorld {
        sites: vec![site],
        initial_leaks: vec![vec![leak]],
        leak_timeseries: vec![vec![None; days]],
        seed_timeseries: None,
    }
}

fn inputs(weather: WeatherGrid) -> ProgramInputs {
    ProgramInputs {
        facilities: Vec::new(),
        empirical_leaks: vec![0.1, 0.5, 1.0],
        empirical_counts: vec![1],
        empirical_sites: vec![2.0],
        offsite_times: vec![15.0],
        subtype_dists: HashMap::new(),
        subtype_times: HashMap::new(),
        home_bases: HashMap::new(),
        weather,
    }
}

fn run(
    settings: &SimSettings,
    program: ProgramParams,
    world: GeneratedWorld,
    seed: u64,
) -> SimOutput {
    let days = settings.timesteps();
    let inputs = inputs(friendly_weather(days));
    let weather = Arc::new(inputs.weather.clone());
    Simulation::new(
        settings.clone(),
        program,
        world,
        &inputs,
        weather,
        0,
        seed,
    )
    .unwrap()
    .run()
    .unwrap()
}

#[test]
fn ogi_finds_and_repairs_a_conspicuous_leak() {
    // One site, one OGI crew, a 1 g/s leak: detection probability on the
    // standard curve is essentially certain, so the first survey tags it
    // and repair lands exactly repair_delay + reporting_delay days later.
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "nrd": 3650,
        "repair_delay": 14,
        "methods": [{
            "label": "OGI",
            "mdl": [0.01, 2.78e-6],
            "reporting_delay": 2,
        }],
    }))
    .unwrap();
    let settings = settings(60);
    let world = world_with_one_leak(site_with(&[("OGI", 120.0, 12, 0)]), 1.0, 60);

    let output = run(&settings, program, world, 11);

    let leak = &output.leaks[0];
    assert!(leak.tagged_by_company.as_deref() == Some("OGI"));
    let tagged = leak.date_tagged.expect("leak tagged");
    let repaired = leak.date_repaired.expect("leak repaired");
    assert_eq!(repaired, tagged + Duration::days(16));
    assert_eq!(leak.repair_delay_days, Some(16));
    assert_eq!(leak.status, LeakStatus::Repaired);
    assert_eq!(leak.init_detect_by.as_deref(), Some("OGI"));
}

#[test]
fn same_seed_reproduces_the_run_bit_for_bit() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "methods": [{"label": "OGI", "mdl": [0.01, 2.78e-6]}],
    }))
    .unwrap();
    let settings = settings(40);
    let world = world_with_one_leak(site_with(&[("OGI", 120.0, 12, 7)]), 0.3, 40);

    let a = run(&settings, program.clone(), world.clone(), 99);
    let b = run(&settings, program, world, 99);

    assert_eq!(a.timeseries.daily_emissions_kg, b.timeseries.daily_emissions_kg);
    assert_eq!(a.timeseries.n_tags, b.timeseries.n_tags);
    assert_eq!(a.timeseries.total_daily_cost, b.timeseries.total_daily_cost);
    assert_eq!(a.leaks.len(), b.leaks.len());
    for (la, lb) in a.leaks.iter().zip(&b.leaks) {
        assert_eq!(la.leak_id, lb.leak_id);
        assert_eq!(la.date_tagged, lb.date_tagged);
        assert_eq!(la.date_repaired, lb.date_repaired);
    }
}

#[test]
fn zero_lpr_means_only_initial_leaks() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_base",
        "lpr": 0.0,
        "methods": [],
    }))
    .unwrap();
    let settings = settings(30);
    let world = world_with_one_leak(site_with(&[]), 0.5, 30);

    let output = run(&settings, program, world, 1);
    assert!(output.timeseries.new_leaks.iter().all(|n| *n == 0));
    assert_eq!(output.leaks.len(), 1);
}

#[test]
fn forbidding_weather_stops_all_surveys() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "methods": [{
            "label": "OGI",
            "mdl": [0.01, 2.78e-6],
            "weather_limits": {"temp": [100.0, 120.0]},
        }],
    }))
    .unwrap();
    let settings = settings(20);
    let world = world_with_one_leak(site_with(&[("OGI", 60.0, 12, 0)]), 1.0, 20);

    let output = run(&settings, program, world, 2);
    let method = &output.methods[0];
    assert!(method.timeseries.sites_visited.iter().all(|v| *v == 0));
    assert!(method.timeseries.prop_sites_avail.iter().all(|p| *p == 0.0));
    assert!(!output.leaks[0].tagged);
}

#[test]
fn emissions_attribution_balances_at_finalize() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "methods": [{"label": "OGI", "mdl": [0.01, 2.78e-6]}],
    }))
    .unwrap();
    let settings = settings(45);
    let world = world_with_one_leak(site_with(&[("OGI", 120.0, 12, 0)]), 0.7, 45);

    let output = run(&settings, program, world, 5);
    let from_leaks: f64 = output.leaks.iter().map(|l| l.lifetime_emissions_kg()).sum();
    let from_sites: f64 = output.sites.iter().map(|s| s.total_emissions_kg).sum();
    assert!((from_leaks - from_sites).abs() < 1e-9);
}

#[test]
fn monotone_counters_never_decrease() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "repair_delay": 3,
        "methods": [{"label": "OGI", "mdl": [0.01, 2.78e-6], "reporting_delay": 0}],
    }))
    .unwrap();
    let settings = settings(30);
    let world = world_with_one_leak(site_with(&[("OGI", 60.0, 12, 0)]), 1.0, 30);

    let output = run(&settings, program, world, 8);
    let ts = &output.timeseries;
    let mut cum_cost = 0.0;
    for t in 1..ts.cum_repaired_leaks.len() {
        assert!(ts.cum_repaired_leaks[t] >= ts.cum_repaired_leaks[t - 1]);
        assert!(ts.total_daily_cost[t] >= 0.0);
        cum_cost += ts.total_daily_cost[t];
        assert!(cum_cost >= 0.0);
    }
}

#[test]
fn screening_flag_feeds_follow_up_and_clears() {
    // Aircraft flags the site; after the aircraft's reporting delay, the
    // OGI follow-up visits, tags the leak individually and resolves the
    // flag. First-detection credit goes to the flagging company.
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_screen",
        "lpr": 0.0,
        "nrd": 3650,
        "repair_delay": 14,
        "methods": [
            {
                "label": "aircraft",
                "measurement_scale": "equipment",
                "mdl": [1e-6],
                "qe": 0.0,
                "reporting_delay": 2,
                "follow_up": {"threshold": 0.0, "ratio": 1.0},
            },
            {
                "label": "OGI_FU",
                "method_type": "OGI_FU",
                "is_follow_up": true,
                "mdl": [0.01, 2.78e-6],
                "reporting_delay": 2,
            },
        ],
    }))
    .unwrap();
    let settings = settings(30);
    let world = world_with_one_leak(
        site_with(&[("aircraft", 10.0, 12, 0), ("OGI_FU", 60.0, 12, 0)]),
        2.0,
        30,
    );

    let output = run(&settings, program, world, 21);

    let leak = &output.leaks[0];
    assert_eq!(leak.tagged_by_company.as_deref(), Some("OGI_FU"));
    assert_eq!(
        leak.init_detect_by.as_deref(),
        Some("aircraft"),
        "flagging company gets first-detection credit"
    );
    let flagged_ts = &output.methods[0].timeseries.eff_flags;
    assert!(flagged_ts.iter().sum::<u32>() >= 1, "aircraft raised a flag");
    // The follow-up tagged the leak at least two days after the flag
    let tagged = leak.date_tagged.unwrap();
    assert!(tagged >= start_date() + Duration::days(2));
    // The flag resolved once the leak was individually tagged
    assert!(!output.sites[0].currently_flagged);
}

#[test]
fn satellite_passes_flag_sites_when_wind_allows() {
    // Orbit + site scale: the wind-dependent limit at 2 m/s is about
    // 4 g/s, so a 2 g/s leak hides; at 10 m/s the limit drops to 0.8 g/s
    // and the site gets flagged.
    let program_for = |label: &str| -> ProgramParams {
        serde_json::from_value(serde_json::json!({
            "program_name": "P_sat",
            "lpr": 0.0,
            "methods": [{
                "label": label,
                "deployment_type": "orbit",
                "measurement_scale": "site",
                "mdl": [0.0],
                "qe": 0.0,
                "follow_up": {"threshold": 0.0, "ratio": 1.0},
            }],
        }))
        .unwrap()
    };
    let settings = settings(10);

    let run_with_wind = |wind: f64| {
        let days = settings.timesteps();
        let weather = WeatherGrid::from_daily(
            vec![55.0],
            vec![248.0],
            vec![10.0; days],
            vec![wind; days],
            vec![0.0; days],
        )
        .unwrap();
        let mut inputs = inputs(weather.clone());
        inputs.weather = weather.clone();
        let world = world_with_one_leak(site_with(&[("satellite", 5.0, 365, 0)]), 2.0, days);
        Simulation::new(
            settings.clone(),
            program_for("satellite"),
            world,
            &inputs,
            Arc::new(weather),
            0,
            3,
        )
        .unwrap()
        .run()
        .unwrap()
    };

    let calm = run_with_wind(2.0);
    let windy = run_with_wind(10.0);
    let flags = |o: &SimOutput| o.methods[0].timeseries.eff_flags.iter().sum::<u32>();
    assert_eq!(flags(&calm), 0, "calm winds hide the plume");
    assert!(flags(&windy) >= 1, "strong winds tighten the detection limit");
    assert!(windy.sites[0].currently_flagged || flags(&windy) >= 1);
}

#[test]
fn stationary_monitors_screen_their_site_daily() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_cont",
        "lpr": 0.0,
        "methods": [{
            "label": "continuous",
            "deployment_type": "stationary",
            "measurement_scale": "site",
            "mdl": [0.1],
            "qe": 0.0,
            "cost": {"upfront": 10000.0, "per_day": 15.0},
            "follow_up": {"threshold": 0.0, "ratio": 1.0},
        }],
    }))
    .unwrap();
    let settings = settings(10);
    let world = world_with_one_leak(site_with(&[("continuous", 0.0, 365, 0)]), 1.0, 10);

    let output = run(&settings, program, world, 4);
    let mts = &output.methods[0].timeseries;
    assert_eq!(mts.sites_visited[0], 1);
    assert!(mts.sites_visited.iter().all(|v| *v == 1), "one reading every day");
    assert!(mts.eff_flags.iter().sum::<u32>() >= 1);
    // Upfront cost lands on day zero, the monitor fee accrues daily
    assert!(mts.cost[0] >= 10000.0);
    assert!(mts.cost[1] >= 15.0);
}

#[test]
fn deployment_months_gate_the_survey_season() {
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_summer",
        "lpr": 0.0,
        "methods": [{
            "label": "OGI",
            "mdl": [0.01, 2.78e-6],
            "scheduling": {"deployment_months": [6, 7, 8]},
        }],
    }))
    .unwrap();
    let settings = settings(240);
    let world = world_with_one_leak(site_with(&[("OGI", 60.0, 12, 0)]), 0.5, 240);

    let output = run(&settings, program, world, 7);
    let visited = &output.methods[0].timeseries.sites_visited;
    let june_1 = (NaiveDate::from_ymd_opt(2020, 6, 1).unwrap() - start_date()).num_days() as usize;
    assert!(visited[..june_1].iter().all(|v| *v == 0), "idle before June");
    assert!(
        visited[june_1..].iter().sum::<u32>() >= 1,
        "the summer season opens on June 1"
    );
}

#[test]
fn preseeded_days_make_runs_agree_across_engine_seeds() {
    // With a per-day seed timeseries restored at every step, two runs
    // that differ only in their engine seed replay the same days.
    let program: ProgramParams = serde_json::from_value(serde_json::json!({
        "program_name": "P_ogi",
        "lpr": 0.0,
        "methods": [{"label": "OGI", "mdl": [0.01, 2.78e-6]}],
    }))
    .unwrap();
    let settings = settings(30);
    let mut world = world_with_one_leak(site_with(&[("OGI", 120.0, 12, 7)]), 0.4, 30);
    world.seed_timeseries = Some((0..30).map(|t| 1000 + t as u64).collect());

    let a = run(&settings, program.clone(), world.clone(), 1);
    let b = run(&settings, program, world, 2);
    assert_eq!(a.timeseries.n_tags, b.timeseries.n_tags);
    assert_eq!(a.timeseries.total_daily_cost, b.timeseries.total_daily_cost);
}
