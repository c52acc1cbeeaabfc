//! Travel geometry for mobile crews.
//!
//! Under route planning, travel times come from haversine distances and a
//! sampled road speed, and crews overnight at home bases. Without route
//! planning, geography is ignored for travel and times are drawn from the
//! empirical offsite-time table (site coordinates still drive the weather
//! lookup).

use rand::rngs::StdRng;
use rand::Rng;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in km between two (lon, lat) points.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Travel minutes for a distance at a speed drawn from the method's list.
pub fn travel_minutes(distance_km: f64, speed_list: &[f64], rng: &mut StdRng) -> f64 {
    let speed = sample_speed(speed_list, rng);
    distance_km / speed * 60.0
}

fn sample_speed(speed_list: &[f64], rng: &mut StdRng) -> f64 {
    if speed_list.is_empty() {
        80.0
    } else {
        speed_list[rng.gen_range(0..speed_list.len())]
    }
}

/// Random draw from the empirical offsite-time table (minutes).
pub fn sample_offsite_minutes(offsite_times: &[f64], rng: &mut StdRng) -> f64 {
    if offsite_times.is_empty() {
        0.0
    } else {
        offsite_times[rng.gen_range(0..offsite_times.len())]
    }
}

/// Nearest home base to the crew's position. Returns the base (lon, lat)
/// and the distance to it in km.
pub fn find_homebase(
    crew_lon: f64,
    crew_lat: f64,
    home_bases: &[(f64, f64)],
) -> Option<((f64, f64), f64)> {
    home_bases
        .iter()
        .map(|hb| (*hb, haversine_km(crew_lon, crew_lat, hb.0, hb.1)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Home base minimizing tonight's leg plus tomorrow's leg to the next
/// site. Used when the crew must keep moving toward far-off work.
pub fn find_homebase_opt(
    crew_lon: f64,
    crew_lat: f64,
    next_lon: f64,
    next_lat: f64,
    home_bases: &[(f64, f64)],
) -> Option<((f64, f64), f64)> {
    home_bases
        .iter()
        .map(|hb| {
            let tonight = haversine_km(crew_lon, crew_lat, hb.0, hb.1);
            let tomorrow = haversine_km(hb.0, hb.1, next_lon, next_lat);
            (*hb, tonight, tonight + tomorrow)
        })
        .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(hb, tonight, _)| (hb, tonight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn haversine_known_distance() {
        // Calgary to Edmonton is roughly 280 km
        let d = haversine_km(-114.07, 51.05, -113.49, 53.55);
        assert!((d - 280.0).abs() < 15.0, "d = {d}");
    }

    #[test]
    fn nearest_homebase_wins() {
        let bases = vec![(-114.0, 51.0), (-110.0, 55.0)];
        let ((lon, _), dist) = find_homebase(-113.9, 51.1, &bases).unwrap();
        assert_eq!(lon, -114.0);
        assert!(dist < 20.0);
    }

    #[test]
    fn opt_homebase_considers_next_site() {
        // Two bases equidistant from the crew; the one toward the next site
        // should win.
        let bases = vec![(-114.0, 51.0), (-112.0, 51.0)];
        let crew = (-113.0, 51.0);
        let next = (-111.0, 51.0);
        let ((lon, _), _) = find_homebase_opt(crew.0, crew.1, next.0, next.1, &bases).unwrap();
        assert_eq!(lon, -112.0);
    }

    #[test]
    fn offsite_sampling_is_from_table() {
        let mut rng = StdRng::seed_from_u64(1);
        let table = vec![10.0, 20.0, 30.0];
        for _ in 0..50 {
            let t = sample_offsite_minutes(&table, &mut rng);
            assert!(table.contains(&t));
        }
        assert_eq!(sample_offsite_minutes(&[], &mut rng), 0.0);
    }
}
