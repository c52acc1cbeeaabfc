//! Built-in default parameter library.
//!
//! Defaults exist at three levels: global settings, program parameters and
//! a library of method archetypes (OGI, OGI follow-up, aircraft, truck,
//! continuous monitors, satellite). User files override these; the type
//! checker in the manager treats these values as the schema of record.

use serde_json::{json, Value};

/// Default global (simulation-level) parameters.
pub fn default_global() -> Value {
    json!({
        "parameter_level": "global",
        "n_simulations": 1,
        "n_processes": 0,
        "start_date": "2017-01-01",
        "end_date": "2019-01-01",
        "input_directory": "inputs",
        "output_directory": "outputs",
        "reference_program": "",
        "baseline_program": "",
        "pregenerate_leaks": false,
        "preseed_random": false,
        "write_data": true,
        "make_maps": false,
        "random_seed": 0,
        "programs": []
    })
}

/// Default per-program parameters.
pub fn default_program() -> Value {
    json!({
        "parameter_level": "program",
        "program_name": "",
        "weather_file": "",
        "infrastructure_file": "",
        "leak_file": null,
        "leak_file_use": "sample",
        "count_file": null,
        "vent_file": null,
        "t_offsite_file": null,
        "subtype_distributions_file": null,
        "subtype_times_file": null,
        "site_samples": null,
        "leak_dist_type": "lognorm",
        "leak_dist_mu": -2.776,
        "leak_dist_sigma": 1.462,
        "leak_rate_units": ["gram", "second"],
        "max_leak_rate": null,
        "lpr": 0.0065,
        "nrd": 365,
        "repair_delay": 14,
        "repair_cost": 350.0,
        "consider_daylight": false,
        "consider_venting": false,
        "consider_operator": false,
        "operator_strength": 1.0,
        "methods": [],
        "method_labels": []
    })
}

fn base_method(label: &str) -> Value {
    json!({
        "parameter_level": "method",
        "label": label,
        "method_type": label,
        "deployment_type": "mobile",
        "measurement_scale": "component",
        "sensor": "default",
        "is_follow_up": false,
        "n_crews": 1,
        "max_workday": 8.0,
        "reporting_delay": 2,
        "mdl": [0.01],
        "qe": 0.0,
        "consider_daylight": false,
        "t_bw_sites": [],
        "cost": {"upfront": 0.0, "per_day": 0.0, "per_hour": 0.0, "per_site": 0.0},
        "follow_up": {
            "threshold": 0.0,
            "threshold_type": "absolute",
            "proportion": 1.0,
            "ratio": 1.0,
            "interaction_priority": "threshold",
            "redundancy_filter": "recent",
            "delay": 0,
            "instant_threshold": null,
            "instant_threshold_type": "absolute"
        },
        "scheduling": {
            "route_planning": false,
            "home_bases_file": null,
            "speed_list": [],
            "crew_init_location": null,
            "deployment_years": [],
            "deployment_months": []
        },
        "weather_limits": {
            "temp": [-30.0, 40.0],
            "wind": [0.0, 10.0],
            "precip": [0.0, 1.0]
        }
    })
}

fn override_method(mut base: Value, overrides: Value) -> Value {
    merge_value(&mut base, &overrides);
    base
}

/// Shallow-recursive merge of `src` object into `dst`.
pub fn merge_value(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, value) in src_map {
                match dst_map.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        dst_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (dst_slot, src_value) => *dst_slot = src_value.clone(),
    }
}

/// Default parameters for a method archetype, or `None` for an unknown
/// type. The archetype key is matched case-insensitively.
pub fn default_method(method_type: &str) -> Option<Value> {
    let m = match method_type.to_ascii_lowercase().as_str() {
        "ogi" => override_method(
            base_method("OGI"),
            json!({
                "mdl": [0.01, 2.78e-6],
                "cost": {"per_day": 2500.0},
                "max_workday": 8.0
            }),
        ),
        "ogi_fu" => override_method(
            base_method("OGI_FU"),
            json!({
                "method_type": "OGI_FU",
                "is_follow_up": true,
                "mdl": [0.01, 2.78e-6],
                "cost": {"per_day": 2500.0}
            }),
        ),
        "aircraft" => override_method(
            base_method("aircraft"),
            json!({
                "measurement_scale": "equipment",
                "mdl": [0.1],
                "cost": {"per_day": 10000.0},
                "t_bw_sites": [10.0]
            }),
        ),
        "truck" => override_method(
            base_method("truck"),
            json!({
                "measurement_scale": "equipment",
                "mdl": [0.05],
                "cost": {"per_day": 4500.0}
            }),
        ),
        "continuous" => override_method(
            base_method("continuous"),
            json!({
                "deployment_type": "stationary",
                "measurement_scale": "site",
                "mdl": [0.02],
                "cost": {"upfront": 10000.0, "per_day": 15.0}
            }),
        ),
        "satellite" => override_method(
            base_method("satellite"),
            json!({
                "deployment_type": "orbit",
                "measurement_scale": "site",
                "mdl": [0.0],
                "cost": {"per_site": 100.0}
            }),
        ),
        _ => return None,
    };
    Some(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldar_core::{DeploymentType, MeasurementScale, MethodParams};

    #[test]
    fn archetypes_deserialize_to_typed_params() {
        for key in ["OGI", "OGI_FU", "aircraft", "truck", "continuous", "satellite"] {
            let value = default_method(key).unwrap();
            let typed: MethodParams = serde_json::from_value(value).unwrap();
            assert!(!typed.label.is_empty(), "{key}");
        }
    }

    #[test]
    fn satellite_is_orbital_site_scale() {
        let typed: MethodParams =
            serde_json::from_value(default_method("satellite").unwrap()).unwrap();
        assert_eq!(typed.deployment_type, DeploymentType::Orbit);
        assert_eq!(typed.measurement_scale, MeasurementScale::Site);
    }

    #[test]
    fn unknown_archetype_is_none() {
        assert!(default_method("zeppelin").is_none());
    }

    #[test]
    fn merge_overrides_nested_keys_only() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": 3});
        merge_value(&mut base, &json!({"a": {"b": 10}}));
        assert_eq!(base, json!({"a": {"b": 10, "c": 2}, "d": 3}));
    }
}
