#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str = "op, identity, affiliate, name, phone, store, customer, customer_phone, address, city, country, product, product_code, cost_price, selling_price, amount, target, admin";

#[test]
fn test_rocksdb_ledger_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    // 1. First run: register, create an order and confirm delivery.
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{}", HEADER).unwrap();
    writeln!(
        csv1,
        "register, 555, , Mona, +201234567890, Mona Store, , , , , , , , , , , , "
    )
    .unwrap();
    writeln!(
        csv1,
        "order, , 1, , , , Ahmed, +966123456789, 12 King Fahd Rd, Riyadh, Saudi Arabia, Blender, BL-200, 100, 200, , , "
    )
    .unwrap();
    writeln!(csv1, "delivered, , , , , , , , , , , , , , , , 1, ").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("affiliate-ledger"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,Mona,Mona Store,26.65,26.65,53.30,1,1"));

    // 2. Second run: withdraw and approve against the recovered balance.
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{}", HEADER).unwrap();
    writeln!(
        csv2,
        "withdraw, , 1, , +201234567890, , , , , , , , , , , 26.65, , "
    )
    .unwrap();
    writeln!(csv2, "approve, , , , , , , , , , , , , , , , 1, 9").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("affiliate-ledger"));
    cmd2.arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--min-withdrawal")
        .arg("5");

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // Balance drained by the approved withdrawal; history intact.
    assert!(stdout2.contains("1,Mona,Mona Store,0.00,26.65,53.30,1,1"));
}

#[test]
fn test_duplicate_delivery_across_runs() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{}", HEADER).unwrap();
    writeln!(
        csv1,
        "register, 555, , Mona, +201234567890, Mona Store, , , , , , , , , , , , "
    )
    .unwrap();
    writeln!(
        csv1,
        "order, , 1, , , , Ahmed, +966123456789, 12 King Fahd Rd, Riyadh, Saudi Arabia, Blender, BL-200, 100, 200, , , "
    )
    .unwrap();
    writeln!(csv1, "delivered, , , , , , , , , , , , , , , , 1, ").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("affiliate-ledger"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);
    assert!(cmd1.output().unwrap().status.success());

    // Retrying the delivery in a later run reports the terminal state and
    // leaves the ledger unchanged.
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{}", HEADER).unwrap();
    writeln!(csv2, "delivered, , , , , , , , , , , , , , , , 1, ").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("affiliate-ledger"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stderr2 = String::from_utf8_lossy(&output2.stderr);
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stderr2.contains("already processed (delivered)"));
    assert!(stdout2.contains("1,Mona,Mona Store,26.65,26.65,53.30,1,1"));
}
