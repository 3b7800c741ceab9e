// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scan::Profile;

#[test]
fn stealth_profile_disables_noisy_tools() {
    let config = ScanConfig::for_profile(Profile::Stealth);
    assert!(!config.subdomain.use_amass);
    assert!(!config.fuzzing.enabled);
    assert_eq!(config.rate_limit, 10);
}

#[test]
fn aggressive_profile_widens_port_scan() {
    let config = ScanConfig::for_profile(Profile::Aggressive);
    assert_eq!(config.ports.scan_type, PortScanType::Full);
    assert_eq!(config.ports.port_spec(), "1-65535");
    assert!(config.subdomain.brute_force);
}

#[test]
fn default_config_is_normal() {
    let config = ScanConfig::default();
    assert_eq!(config.profile, Profile::Normal);
    assert!(!config.stop_on_error);
    assert!(config.subdomain.use_amass);
}

#[test]
fn fast_port_spec_lists_top_ports() {
    let config = ScanConfig::for_profile(Profile::Normal);
    let spec = config.ports.port_spec();
    assert!(spec.starts_with("80,443,"));
    assert_eq!(spec.split(',').count(), TOP_PORTS.len());
}

#[test]
fn custom_scan_uses_configured_ports() {
    let mut config = ScanConfig::default();
    config.ports.scan_type = PortScanType::Custom;
    config.ports.ports = Some("80,8080".to_string());
    assert_eq!(config.ports.port_spec(), "80,8080");
}

#[test]
fn config_serde_round_trips() {
    let config = ScanConfig::for_profile(Profile::Aggressive);
    let json = serde_json::to_string(&config).unwrap();
    let back: ScanConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
