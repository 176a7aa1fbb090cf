//! C5: five-factor weighted risk scoring. Pure; never fails, never touches
//! the network or filesystem.

use serde::Serialize;

const SUSPICIOUS_PORTS: &[u16] = &[4444, 5555, 6666, 8888, 9999, 31337, 12345, 65535];
const COMMON_PORTS: &[u16] = &[80, 443, 53, 22, 123, 25, 993, 143, 3389, 21, 445, 8080];

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    pub name: String,
    pub score: f64,
    pub max: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskScore {
    pub score: f64,
    pub level: String,
    pub factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskInput {
    pub alert_count: u64,
    pub connection_count: f64,
    pub network_avg: f64,
    pub network_stddev: f64,
    pub external: f64,
    pub total: f64,
    pub ports: Vec<u16>,
    pub orig_bytes: f64,
    pub resp_bytes: f64,
}

pub fn level_for(score: f64) -> &'static str {
    match score as i64 {
        0..=24 => "low",
        25..=49 => "medium",
        50..=74 => "high",
        _ => "critical",
    }
}

fn alert_count_factor(count: u64) -> f64 {
    match count {
        0 => 0.0,
        1..=2 => 10.0,
        3..=5 => 20.0,
        6..=10 => 30.0,
        _ => 35.0,
    }
}

fn connection_anomaly_factor(count: f64, avg: f64, stddev: f64) -> f64 {
    if stddev <= 0.0 || avg <= 0.0 {
        return 0.0;
    }
    let d = (count - avg) / stddev;
    if d <= 1.0 {
        0.0
    } else if d <= 2.0 {
        10.0
    } else if d <= 3.0 {
        15.0
    } else {
        20.0
    }
}

fn external_ratio_factor(external: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let r = external / total;
    if r < 0.3 {
        0.0
    } else if r < 0.6 {
        5.0
    } else if r < 0.8 {
        10.0
    } else {
        15.0
    }
}

fn suspicious_ports_factor(ports: &[u16]) -> f64 {
    if ports.iter().any(|p| SUSPICIOUS_PORTS.contains(p)) {
        15.0
    } else if ports.iter().any(|p| !COMMON_PORTS.contains(p)) {
        8.0
    } else {
        0.0
    }
}

fn data_exfiltration_factor(orig_bytes: f64, resp_bytes: f64) -> f64 {
    let total = orig_bytes + resp_bytes;
    if total == 0.0 {
        return 0.0;
    }
    let u = orig_bytes / total;
    if u < 0.1 {
        0.0
    } else if u < 0.3 {
        5.0
    } else if u < 0.5 {
        10.0
    } else {
        15.0
    }
}

pub fn score(input: &RiskInput) -> RiskScore {
    let alert = alert_count_factor(input.alert_count);
    let anomaly = connection_anomaly_factor(
        input.connection_count,
        input.network_avg,
        input.network_stddev,
    );
    let external = external_ratio_factor(input.external, input.total);
    let ports = suspicious_ports_factor(&input.ports);
    let exfil = data_exfiltration_factor(input.orig_bytes, input.resp_bytes);

    let factors = vec![
        RiskFactor {
            name: "alert_count".to_string(),
            score: alert,
            max: 35.0,
            description: format!("{} alerts observed", input.alert_count),
        },
        RiskFactor {
            name: "connection_anomaly".to_string(),
            score: anomaly,
            max: 20.0,
            description: "deviation from baseline connection volume".to_string(),
        },
        RiskFactor {
            name: "external_ratio".to_string(),
            score: external,
            max: 15.0,
            description: "share of traffic to external hosts".to_string(),
        },
        RiskFactor {
            name: "suspicious_ports".to_string(),
            score: ports,
            max: 15.0,
            description: "use of known-suspicious or uncommon ports".to_string(),
        },
        RiskFactor {
            name: "data_exfiltration".to_string(),
            score: exfil,
            max: 15.0,
            description: "outbound-heavy byte ratio".to_string(),
        },
    ];

    let total: f64 = factors.iter().map(|f| f.score).sum();
    let final_score = total.min(100.0);

    RiskScore {
        score: final_score,
        level: level_for(final_score).to_string(),
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s2_risk_scorer_critical_case() {
        let input = RiskInput {
            alert_count: 50,
            connection_count: 5000.0,
            network_avg: 100.0,
            network_stddev: 50.0,
            external: 90.0,
            total: 100.0,
            ports: vec![4444, 31337],
            orig_bytes: 80_000.0,
            resp_bytes: 20_000.0,
        };
        let result = score(&input);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, "critical");
        let sum: f64 = result.factors.iter().map(|f| f.score).sum();
        assert_eq!(sum.min(100.0), 100.0);
        assert_eq!(result.factors.len(), 5);
    }

    #[test]
    fn banding_matches_declared_ranges() {
        assert_eq!(level_for(0.0), "low");
        assert_eq!(level_for(24.0), "low");
        assert_eq!(level_for(25.0), "medium");
        assert_eq!(level_for(49.0), "medium");
        assert_eq!(level_for(50.0), "high");
        assert_eq!(level_for(74.0), "high");
        assert_eq!(level_for(75.0), "critical");
        assert_eq!(level_for(100.0), "critical");
    }

    #[test]
    fn weights_sum_to_one_hundred() {
        let input = RiskInput {
            alert_count: 11,
            connection_count: 10_000.0,
            network_avg: 1.0,
            network_stddev: 1.0,
            external: 100.0,
            total: 100.0,
            ports: vec![4444],
            orig_bytes: 100.0,
            resp_bytes: 0.0,
        };
        let result = score(&input);
        let max_sum: f64 = result.factors.iter().map(|f| f.max).sum();
        assert_eq!(max_sum, 100.0);
    }

    #[test]
    fn zero_denominators_never_panic_and_score_zero() {
        let input = RiskInput::default();
        let result = score(&input);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.level, "low");
    }
}
