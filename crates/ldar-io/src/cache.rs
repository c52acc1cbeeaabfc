//! Versioned world cache.
//!
//! Pre-generated worlds are persisted under `<input_dir>/generator/` as
//! `pregen_{sim}_{prog}.bin` blobs next to a `params.fingerprint` file
//! holding a hash of the resolved parameters and the facility table. A
//! fingerprint mismatch means the cache was built from different inputs
//! and fails closed: the caller regenerates and overwrites. Writers hold
//! an exclusive lock file so parallel workers do not clobber each other.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use ldar_core::{GeneratedWorld, LdarError, LdarResult, Paths, SimSettings};

const CACHE_VERSION: u32 = 1;

/// Cache fingerprint: resolved parameters plus the facility tables.
pub fn compute_fingerprint(settings: &SimSettings, paths: &Paths) -> LdarResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(CACHE_VERSION.to_le_bytes());
    let params = serde_json::to_vec(settings)?;
    hasher.update(&params);
    for program in &settings.programs {
        let infra = paths.input_dir.join(&program.infrastructure_file);
        if let Ok(bytes) = fs::read(&infra) {
            hasher.update(&bytes);
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn fingerprint_path(paths: &Paths) -> PathBuf {
    paths.generator_dir.join("params.fingerprint")
}

fn world_path(paths: &Paths, sim_idx: usize, program_idx: usize) -> PathBuf {
    paths
        .generator_dir
        .join(format!("pregen_{sim_idx}_{program_idx}.bin"))
}

/// Ensure the generator directory matches the fingerprint; a stale
/// directory is cleared so old worlds cannot leak into a new run.
pub fn prepare_generator_dir(paths: &Paths, fingerprint: &str) -> LdarResult<()> {
    fs::create_dir_all(&paths.generator_dir)?;
    let fp_path = fingerprint_path(paths);
    match fs::read_to_string(&fp_path) {
        Ok(existing) if existing.trim() == fingerprint => {
            debug!("world cache fingerprint matches, reusing pregenerated worlds");
        }
        Ok(_) => {
            info!("world cache is stale, clearing generator directory");
            clear_generated(paths)?;
            fs::write(&fp_path, fingerprint)?;
        }
        Err(_) => {
            fs::write(&fp_path, fingerprint)?;
        }
    }
    Ok(())
}

fn clear_generated(paths: &Paths) -> LdarResult<()> {
    for entry in fs::read_dir(&paths.generator_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("pregen_") && name.ends_with(".bin") {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Load a cached world, verifying the fingerprint first.
pub fn load_world(
    paths: &Paths,
    fingerprint: &str,
    sim_idx: usize,
    program_idx: usize,
) -> LdarResult<Option<GeneratedWorld>> {
    let fp_path = fingerprint_path(paths);
    let on_disk = fs::read_to_string(&fp_path).unwrap_or_default();
    if on_disk.trim() != fingerprint {
        return Err(LdarError::WorldCacheStale(format!(
            "fingerprint mismatch in {}",
            paths.generator_dir.display()
        )));
    }
    let path = world_path(paths, sim_idx, program_idx);
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(&path)?;
    let world: GeneratedWorld = bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| LdarError::WorldCacheStale(format!("{}: {e}", path.display())))?;
    if !world.is_consistent() {
        return Err(LdarError::WorldCacheStale(format!(
            "{}: per-site tables do not match the site list",
            path.display()
        )));
    }
    Ok(Some(world))
}

/// Persist a generated world under an exclusive lock.
pub fn store_world(
    paths: &Paths,
    sim_idx: usize,
    program_idx: usize,
    world: &GeneratedWorld,
) -> LdarResult<()> {
    let _lock = GeneratorLock::acquire(&paths.generator_dir)?;
    let path = world_path(paths, sim_idx, program_idx);
    let file = File::create(&path)?;
    bincode::serialize_into(BufWriter::new(file), world)
        .map_err(|e| LdarError::Other(format!("encoding {}: {e}", path.display())))?;
    Ok(())
}

/// Exclusive lock on the generator directory, held while writing. The
/// lock file is removed on drop; a crashed writer leaves it behind and a
/// later writer with the same fingerprint simply rewrites the blob.
struct GeneratorLock {
    path: PathBuf,
}

impl GeneratorLock {
    fn acquire(dir: &Path) -> LdarResult<Self> {
        let path = dir.join(".lock");
        const MAX_WAIT_MS: u64 = 30_000;
        let mut waited = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(GeneratorLock { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if waited >= MAX_WAIT_MS {
                        return Err(LdarError::Other(format!(
                            "timed out waiting for generator lock '{}'",
                            path.display()
                        )));
                    }
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    waited += 50;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for GeneratorLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn settings() -> SimSettings {
        serde_json::from_value(serde_json::json!({
            "start_date": "2020-01-01",
            "end_date": "2020-03-01"
        }))
        .unwrap()
    }

    fn paths(tmp: &TempDir) -> Paths {
        Paths::new(tmp.path().to_path_buf(), tmp.path().join("out"))
    }

    fn world() -> GeneratedWorld {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let site = ldar_core::Site {
            facility_id: "F1".into(),
            lat: 55.0,
            lon: -110.0,
            lat_idx: 0,
            lon_idx: 0,
            subtype_code: 0,
            equipment_groups: 1,
            method_params: Default::default(),
            currently_flagged: false,
            date_flagged: None,
            flagged_by: None,
            initial_leak_count: 1,
            cum_leaks: 1,
            total_emissions_kg: 0.0,
            active_leaks: 0,
            repaired_leaks: 0,
        };
        let leak = ldar_core::Leak::new(
            "F1_00001".into(),
            "F1".into(),
            0,
            1,
            0.5,
            55.0,
            -110.0,
            date,
            0,
        );
        GeneratedWorld {
            sites: vec![site],
            initial_leaks: vec![vec![leak]],
            leak_timeseries: vec![vec![None, None, None]],
            seed_timeseries: None,
        }
    }

    #[test]
    fn store_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let fp = compute_fingerprint(&settings(), &paths).unwrap();
        prepare_generator_dir(&paths, &fp).unwrap();
        store_world(&paths, 0, 0, &world()).unwrap();
        let loaded = load_world(&paths, &fp, 0, 0).unwrap().unwrap();
        assert_eq!(loaded.sites[0].facility_id, "F1");
        assert_eq!(loaded.initial_leaks[0].len(), 1);
    }

    #[test]
    fn missing_world_is_none() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let fp = compute_fingerprint(&settings(), &paths).unwrap();
        prepare_generator_dir(&paths, &fp).unwrap();
        assert!(load_world(&paths, &fp, 3, 1).unwrap().is_none());
    }

    #[test]
    fn stale_fingerprint_fails_closed() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let fp = compute_fingerprint(&settings(), &paths).unwrap();
        prepare_generator_dir(&paths, &fp).unwrap();
        store_world(&paths, 0, 0, &world()).unwrap();
        let err = load_world(&paths, "deadbeef", 0, 0).unwrap_err();
        assert!(matches!(err, LdarError::WorldCacheStale(_)));
    }

    #[test]
    fn stale_dir_is_cleared_on_prepare() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        prepare_generator_dir(&paths, "fp-one").unwrap();
        store_world(&paths, 0, 0, &world()).unwrap();
        prepare_generator_dir(&paths, "fp-two").unwrap();
        assert!(load_world(&paths, "fp-two", 0, 0).unwrap().is_none());
    }

    #[test]
    fn fingerprint_tracks_parameter_changes() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let a = compute_fingerprint(&settings(), &paths).unwrap();
        let mut changed = settings();
        changed.n_simulations = 7;
        let b = compute_fingerprint(&changed, &paths).unwrap();
        assert_ne!(a, b);
    }
}
