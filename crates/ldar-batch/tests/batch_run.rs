//! Whole-batch runs over a temporary input directory.

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;

use ldar_core::{Paths, SimSettings};
use ldar_batch::run_batch;
use ldar_io::inputs::save_weather;
use ldar_weather::WeatherGrid;

fn write_fixture_inputs(dir: &TempDir) {
    let input_dir = dir.path().join("inputs");
    fs::create_dir_all(&input_dir).unwrap();

    fs::write(
        input_dir.join("facilities.csv"),
        "facility_ID,lat,lon,subtype_code,equipment_groups,OGI_time,OGI_RS,OGI_min_int\n\
         F001,55.0,248.0,0,2,60,12,0\n\
         F002,55.2,248.2,0,1,60,12,0\n\
         F003,54.8,247.8,0,3,60,12,0\n",
    )
    .unwrap();
    fs::write(input_dir.join("leaks.csv"), "rate\n0.05\n0.2\n0.8\n1.5\n").unwrap();
    fs::write(input_dir.join("counts.csv"), "count\n0\n1\n2\n").unwrap();
    fs::write(input_dir.join("offsite.csv"), "minutes\n10\n20\n").unwrap();

    let days = 60;
    let weather = WeatherGrid::from_daily(
        vec![54.0, 56.0],
        vec![247.0, 249.0],
        vec![5.0; 4 * days],
        vec![2.0; 4 * days],
        vec![0.0; 4 * days],
    )
    .unwrap();
    save_weather(&input_dir.join("weather.bin"), &weather).unwrap();
}

fn settings(dir: &TempDir) -> SimSettings {
    let program = |name: &str, n_crews: usize| {
        serde_json::json!({
            "program_name": name,
            "weather_file": "weather.bin",
            "infrastructure_file": "facilities.csv",
            "leak_file": "leaks.csv",
            "count_file": "counts.csv",
            "t_offsite_file": "offsite.csv",
            "lpr": 0.05,
            "methods": [{
                "label": "OGI",
                "mdl": [0.01, 2.78e-6],
                "n_crews": n_crews,
            }],
        })
    };
    serde_json::from_value(serde_json::json!({
        "n_simulations": 2,
        "n_processes": 2,
        "start_date": "2020-01-01",
        "end_date": "2020-03-01",
        "input_directory": dir.path().join("inputs"),
        "output_directory": dir.path().join("outputs"),
        "baseline_program": "P_one",
        "reference_program": "P_two",
        "pregenerate_leaks": true,
        "random_seed": 13,
        "programs": [program("P_one", 1), program("P_two", 2)],
    }))
    .unwrap()
}

#[test]
fn pregenerated_worlds_are_identical_across_programs() {
    let dir = TempDir::new().unwrap();
    write_fixture_inputs(&dir);
    let settings = settings(&dir);
    let paths = Paths::new(
        settings.input_directory.clone(),
        settings.output_directory.clone(),
    );

    let summary = run_batch(&settings, &paths).unwrap();
    assert_eq!(summary.success, 4);
    assert_eq!(summary.failure, 0);
    assert!(summary.manifest_path.exists());

    // Group new-leak timeseries by (program, sim)
    let mut by_key: BTreeMap<(String, usize), Vec<u32>> = BTreeMap::new();
    for output in &summary.results {
        by_key.insert(
            (output.program_name.clone(), output.sim_idx),
            output.timeseries.new_leaks.clone(),
        );
    }
    for sim in 0..2 {
        let one = &by_key[&("P_one".to_string(), sim)];
        let two = &by_key[&("P_two".to_string(), sim)];
        assert_eq!(one, two, "sim {sim}: leak realisations must match");
    }

    // Per-simulation outputs landed under each program directory
    for prog in ["P_one", "P_two"] {
        for sim in 0..2 {
            let dir = paths.output_dir.join(prog);
            assert!(dir.join(format!("leaks_output_{sim}.csv")).exists());
            assert!(dir.join(format!("timeseries_output_{sim}.csv")).exists());
            assert!(dir.join(format!("sites_output_{sim}.csv")).exists());
        }
    }
    assert!(paths.output_dir.join("parameters.yaml").exists());
}

#[test]
fn rerun_reuses_the_cached_worlds() {
    let dir = TempDir::new().unwrap();
    write_fixture_inputs(&dir);
    let settings = settings(&dir);
    let paths = Paths::new(
        settings.input_directory.clone(),
        settings.output_directory.clone(),
    );

    let first = run_batch(&settings, &paths).unwrap();
    let second = run_batch(&settings, &paths).unwrap();

    let collect = |summary: &ldar_batch::BatchSummary| {
        let mut map: BTreeMap<(String, usize), Vec<u32>> = BTreeMap::new();
        for output in &summary.results {
            map.insert(
                (output.program_name.clone(), output.sim_idx),
                output.timeseries.new_leaks.clone(),
            );
        }
        map
    };
    assert_eq!(
        collect(&first),
        collect(&second),
        "a rerun on the same cache replays identical worlds"
    );
}

#[test]
fn site_outside_grid_fails_the_batch() {
    let dir = TempDir::new().unwrap();
    write_fixture_inputs(&dir);
    // Push one facility far north of the weather grid
    fs::write(
        dir.path().join("inputs/facilities.csv"),
        "facility_ID,lat,lon,subtype_code,equipment_groups,OGI_time,OGI_RS,OGI_min_int\n\
         F001,80.0,248.0,0,2,60,12,0\n",
    )
    .unwrap();
    let settings = settings(&dir);
    let paths = Paths::new(
        settings.input_directory.clone(),
        settings.output_directory.clone(),
    );

    let err = run_batch(&settings, &paths).unwrap_err();
    assert!(err.to_string().contains("weather grid") || format!("{err:?}").contains("north"));
}
