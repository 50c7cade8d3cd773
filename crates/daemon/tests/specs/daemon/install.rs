//! `lcloudd install` specs

use crate::prelude::*;

#[test]
fn install_without_enable_only_writes_unit() {
    let fleet = Fleet::host_only();
    let unit_dir = fleet.path().join("units");

    fleet
        .lcloudd()
        .args(&["install", "--unit-dir", &unit_dir.display().to_string(), "--no-enable", "--user", "builder"])
        .passes()
        .stdout_has("lcloudd.service");

    let unit = std::fs::read_to_string(unit_dir.join("lcloudd.service")).unwrap();
    assert!(unit.contains("Restart=always"));
    assert!(unit.contains("User=builder"));
    assert!(unit.contains(&format!("--config {} run", fleet.config_path().display())));
    assert!(unit.contains(&format!("LCLOUD_STATE_DIR={}", fleet.state_dir().display())));
}
