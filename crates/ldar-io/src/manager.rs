//! Layered parameter loading and validation.
//!
//! Parameter files carry a `parameter_level` of `global`, `program` or
//! `method`. Each file merges over the matching defaults: a missing key
//! inherits, an unknown key is reported as a warning, and a type mismatch
//! against the default is fatal. Orphan method files attach to programs by
//! label through the program's `method_labels` list; their defaults come
//! from the method library keyed by `method_type` and are deep-copied
//! before the overrides merge in.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use ldar_core::{LdarError, LdarResult, SimSettings};

use crate::defaults::{default_global, default_method, default_program, merge_value};

/// Read a parameter file as a JSON value; YAML and JSON are chosen by
/// extension, with YAML as the fallback parser.
pub fn read_parameter_file(path: &Path) -> LdarResult<Value> {
    let data = fs::read_to_string(path)?;
    let parsed: Value = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&data)
            .map_err(|e| LdarError::Parameter(format!("{}: {e}", path.display())))?,
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            yaml_to_value(&data, path)?
        }
        _ => yaml_to_value(&data, path)?,
    };
    if !parsed.is_object() {
        return Err(LdarError::Parameter(format!(
            "{}: parameter file must be a mapping",
            path.display()
        )));
    }
    Ok(parsed)
}

fn yaml_to_value(data: &str, path: &Path) -> LdarResult<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(data)
        .map_err(|e| LdarError::Parameter(format!("{}: {e}", path.display())))?;
    serde_json::to_value(yaml)
        .map_err(|e| LdarError::Parameter(format!("{}: {e}", path.display())))
}

/// Read, layer and validate a set of parameter files into typed settings.
pub fn read_and_validate_parameters(paths: &[impl AsRef<Path>]) -> LdarResult<SimSettings> {
    let mut globals: Vec<Value> = Vec::new();
    let mut programs: Vec<Value> = Vec::new();
    let mut orphan_methods: Vec<Value> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let value = read_parameter_file(path)?;
        let level = match value.get("parameter_level").and_then(Value::as_str) {
            Some(l) => l.to_string(),
            None => {
                warn!(
                    file = %path.display(),
                    "parameter_level not supplied, interpreting file as global"
                );
                "global".to_string()
            }
        };
        match level.as_str() {
            "global" => globals.push(value),
            "program" => programs.push(value),
            "method" => orphan_methods.push(value),
            other => {
                return Err(LdarError::Parameter(format!(
                    "{}: unknown parameter_level '{other}'",
                    path.display()
                )))
            }
        }
    }

    // Global layer: merge every global file over the defaults
    let mut global = default_global();
    for value in globals {
        // Programs defined inline inside a global file join the pool
        if let Some(inline) = value.get("programs").and_then(Value::as_array) {
            programs.extend(inline.iter().cloned());
        }
        let mut trimmed = value;
        if let Some(m) = trimmed.as_object_mut() {
            m.remove("programs");
        }
        check_types(&global, &trimmed, "global", &["programs", "methods"])?;
        merge_value(&mut global, &trimmed);
    }

    // Program layer
    let mut resolved_programs: Vec<Value> = Vec::new();
    for program in programs {
        let mut base = default_program();
        let mut trimmed = program.clone();
        if let Some(m) = trimmed.as_object_mut() {
            m.remove("methods");
        }
        check_types(&base, &trimmed, "program", &["methods"])?;
        merge_value(&mut base, &trimmed);

        // Method layer: inline methods first, then adopted orphans
        let mut methods: Vec<Value> = Vec::new();
        if let Some(inline) = program.get("methods").and_then(Value::as_array) {
            for method in inline {
                methods.push(resolve_method(method)?);
            }
        }
        if let Some(labels) = program.get("method_labels").and_then(Value::as_array) {
            for label in labels.iter().filter_map(Value::as_str) {
                let orphan = orphan_methods
                    .iter()
                    .find(|m| m.get("label").and_then(Value::as_str) == Some(label));
                match orphan {
                    Some(orphan) => methods.push(resolve_method(orphan)?),
                    None => warn!(label, "method was named by a program but not supplied"),
                }
            }
        }
        if let Some(m) = base.as_object_mut() {
            m.insert("methods".to_string(), Value::Array(methods));
        }
        resolved_programs.push(base);
    }

    if let Some(m) = global.as_object_mut() {
        m.insert("programs".to_string(), Value::Array(resolved_programs));
    }

    serde_json::from_value(global)
        .map_err(|e| LdarError::Parameter(format!("resolved parameters: {e}")))
}

/// Merge one method definition over its archetype defaults.
fn resolve_method(method: &Value) -> LdarResult<Value> {
    let label = method
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| LdarError::Parameter("method definition is missing 'label'".into()))?;
    let method_type = method
        .get("method_type")
        .and_then(Value::as_str)
        .unwrap_or(label);
    let mut base = default_method(method_type).ok_or_else(|| {
        LdarError::Parameter(format!(
            "method '{label}': unknown method_type '{method_type}'"
        ))
    })?;
    check_types(&base, method, &format!("method '{label}'"), &[])?;
    merge_value(&mut base, method);
    Ok(base)
}

/// Recursive type check of a parameter value against its default.
///
/// Unknown keys warn; a type mismatch against a non-null default is fatal.
fn check_types(default: &Value, test: &Value, path: &str, omit: &[&str]) -> LdarResult<()> {
    match (default, test) {
        (Value::Object(d), Value::Object(t)) => {
            for (key, value) in t {
                if omit.contains(&key.as_str()) || key == "parameter_level" {
                    continue;
                }
                match d.get(key) {
                    Some(default_value) => {
                        check_types(default_value, value, &format!("{path}.{key}"), omit)?
                    }
                    None => warn!(
                        key = %format!("{path}.{key}"),
                        "parameter not present in defaults, ignoring"
                    ),
                }
            }
            Ok(())
        }
        (Value::Array(d), Value::Array(t)) => {
            if let Some(first) = d.first() {
                for (i, value) in t.iter().enumerate() {
                    check_types(first, value, &format!("{path}[{i}]"), omit)?;
                }
            }
            Ok(())
        }
        // A null default carries no type information
        (Value::Null, _) | (_, Value::Null) => Ok(()),
        (d, t) if discriminant(d) == discriminant(t) => Ok(()),
        (d, t) => Err(LdarError::Parameter(format!(
            "{path}: type mismatch, default is {} but supplied value is {}",
            type_name(d),
            type_name(t)
        ))),
    }
}

fn discriminant(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Echo the resolved parameters into the output directory for provenance.
pub fn write_resolved_parameters(path: &Path, settings: &SimSettings) -> LdarResult<()> {
    let yaml = serde_yaml::to_string(settings)
        .map_err(|e| LdarError::Parameter(format!("serializing resolved parameters: {e}")))?;
    fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn global_and_program_files_layer() {
        let global = write_yaml(
            "parameter_level: global\n\
             n_simulations: 3\n\
             start_date: 2020-01-01\n\
             end_date: 2020-12-31\n",
        );
        let program = write_yaml(
            "parameter_level: program\n\
             program_name: P_ogi\n\
             lpr: 0.01\n\
             methods:\n\
             - label: OGI\n\
             \x20 n_crews: 2\n",
        );
        let settings =
            read_and_validate_parameters(&[global.path(), program.path()]).unwrap();
        assert_eq!(settings.n_simulations, 3);
        assert_eq!(settings.programs.len(), 1);
        let p = &settings.programs[0];
        assert_eq!(p.program_name, "P_ogi");
        assert!((p.lpr - 0.01).abs() < 1e-12);
        // Method defaults filled in around the override
        let m = p.method("OGI").unwrap();
        assert_eq!(m.n_crews, 2);
        assert_eq!(m.mdl, vec![0.01, 2.78e-6]);
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let global = write_yaml(
            "parameter_level: global\n\
             n_simulations: 'three'\n\
             start_date: 2020-01-01\n\
             end_date: 2020-12-31\n",
        );
        let err = read_and_validate_parameters(&[global.path()]).unwrap_err();
        assert!(matches!(err, LdarError::Parameter(_)));
        assert!(err.to_string().contains("type mismatch"));
    }

    #[test]
    fn unknown_level_is_fatal() {
        let f = write_yaml("parameter_level: galaxy\n");
        assert!(read_and_validate_parameters(&[f.path()]).is_err());
    }

    #[test]
    fn orphan_methods_attach_by_label() {
        let global = write_yaml(
            "parameter_level: global\n\
             start_date: 2020-01-01\n\
             end_date: 2020-06-30\n",
        );
        let program = write_yaml(
            "parameter_level: program\n\
             program_name: P_air\n\
             method_labels: [aircraft]\n",
        );
        let method = write_yaml(
            "parameter_level: method\n\
             label: aircraft\n\
             n_crews: 4\n",
        );
        let settings =
            read_and_validate_parameters(&[global.path(), program.path(), method.path()])
                .unwrap();
        let m = settings.programs[0].method("aircraft").unwrap();
        assert_eq!(m.n_crews, 4);
        // Archetype defaults came along with the orphan
        assert_eq!(m.measurement_scale, ldar_core::MeasurementScale::Equipment);
    }

    #[test]
    fn unknown_method_type_is_fatal() {
        let program = write_yaml(
            "parameter_level: program\n\
             program_name: P_x\n\
             methods:\n\
               - label: blimp\n",
        );
        let global = write_yaml(
            "parameter_level: global\n\
             start_date: 2020-01-01\n\
             end_date: 2020-06-30\n",
        );
        assert!(read_and_validate_parameters(&[global.path(), program.path()]).is_err());
    }
}
