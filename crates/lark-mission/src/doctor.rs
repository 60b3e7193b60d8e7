use anyhow::Result;

use crate::nav::NavPolicy;
use crate::plan::MissionPlan;
use crate::waypoint::build_waypoint;

pub fn check_policy(p: &NavPolicy) -> Result<()> {
    anyhow::ensure!(p.dispatch_attempts >= 1, "nav.dispatch_attempts must be >= 1");
    anyhow::ensure!(p.poll_period_s >= 1, "nav.poll_period_s must be >= 1");
    anyhow::ensure!(
        p.travel_timeout_s >= p.poll_period_s,
        "nav.travel_timeout_s must be >= nav.poll_period_s"
    );
    anyhow::ensure!(
        p.reach_radius_m > 0.0,
        "nav.reach_radius_m must be positive"
    );
    Ok(())
}

pub fn check_plan(plan: &MissionPlan) -> Result<()> {
    anyhow::ensure!(!plan.is_empty(), "mission file has no legs");
    for (name, records) in plan.legs() {
        anyhow::ensure!(!records.is_empty(), "mission leg {:?} is empty", name);
        for (idx, rec) in records.iter().enumerate() {
            if let Err(e) = build_waypoint(rec) {
                anyhow::bail!("mission leg {:?} waypoint {}: {}", name, idx, e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_passes() {
        check_policy(&NavPolicy::default()).unwrap();
    }

    #[test]
    fn bad_record_caught() {
        let plan: MissionPlan =
            serde_json::from_str(r#"{"A": [{"latitude": 95.0, "longitude": 0.0}]}"#).unwrap();
        assert!(check_plan(&plan).is_err());
    }
}
