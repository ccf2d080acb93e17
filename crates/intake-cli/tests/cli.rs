//! Command-line tests for the `intake` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<p:FatturaElettronica versione="FPR12" xmlns:p="http://ivaservizi.agenziaentrate.gov.it/docs/xsd/fatture/v1.2">
  <FatturaElettronicaHeader>
    <CedentePrestatore><DatiAnagrafici><Anagrafica>
      <Denominazione>Molino Rossi S.r.l.</Denominazione>
    </Anagrafica></DatiAnagrafici></CedentePrestatore>
  </FatturaElettronicaHeader>
  <FatturaElettronicaBody>
    <DatiGenerali><DatiGeneraliDocumento>
      <Data>2024-03-15</Data><Numero>FT/118</Numero>
    </DatiGeneraliDocumento></DatiGenerali>
    <DatiBeniServizi>
      <DettaglioLinee>
        <Descrizione>FARINA TIPO 00 KG 25</Descrizione>
        <Quantita>25.00</Quantita>
        <PrezzoUnitario>0.80</PrezzoUnitario>
        <PrezzoTotale>20.00</PrezzoTotale>
      </DettaglioLinee>
      <DettaglioLinee>
        <CodiceArticolo><CodiceTipo>INTERNO</CodiceTipo><CodiceValore>SC-99</CodiceValore></CodiceArticolo>
        <Descrizione>ARTICOLO VARIO XYZ</Descrizione>
        <Quantita>5</Quantita>
      </DettaglioLinee>
    </DatiBeniServizi>
  </FatturaElettronicaBody>
</p:FatturaElettronica>"#;

/// Temporary workspace with its own config file.
struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        let content = serde_json::json!({
            "watch": { "inbox_dir": dir.path().join("inbox") },
            "store": { "data_dir": dir.path().join("data") },
        });
        std::fs::write(&config, content.to_string()).unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn intake(&self) -> Command {
        let mut cmd = Command::cargo_bin("intake").unwrap();
        cmd.current_dir(self.path()).arg("--config").arg(&self.config);
        cmd
    }

    fn drop_invoice(&self, name: &str, content: &str) -> PathBuf {
        let inbox = self.path().join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        let path = inbox.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn seed_catalog(&self) {
        self.intake()
            .args(["catalog", "add", "farina-00", "Farina 00", "--unit", "kg", "--quantity", "10"])
            .assert()
            .success();
    }
}

#[test]
fn test_config_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    Command::cargo_bin("intake")
        .unwrap()
        .arg("--config")
        .arg(&missing)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"debounce_ms\": 2000"))
        .stdout(predicate::str::contains("\"skip_duplicate_invoices\": true"));
}

#[test]
fn test_config_init_set_get() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intake").join("config.json");

    let intake = || {
        let mut cmd = Command::cargo_bin("intake").unwrap();
        cmd.arg("--config").arg(&path);
        cmd
    };

    intake().args(["config", "init"]).assert().success();
    assert!(path.exists());

    intake()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    intake()
        .args(["config", "set", "watch.debounce_ms", "500"])
        .assert()
        .success();

    intake()
        .args(["config", "get", "watch.debounce_ms"])
        .assert()
        .success()
        .stdout(predicate::str::contains("500"));

    intake()
        .args(["config", "set", "watch.no_such_key", "1"])
        .assert()
        .failure();

    intake()
        .args(["config", "set", "watch.debounce_ms", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value"));
}

#[test]
fn test_process_reconciles_and_relocates() {
    let ws = Workspace::new();
    ws.seed_catalog();
    let invoice = ws.drop_invoice("ft118.xml", INVOICE);

    let pattern = ws.path().join("inbox").join("*.xml");
    ws.intake()
        .args(["process", pattern.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"reconciled\""))
        .stdout(predicate::str::contains("\"matched_count\": 1"));

    assert!(!invoice.exists());
    assert!(ws.path().join("inbox/processed/ft118.xml").exists());

    ws.intake()
        .args(["catalog", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("farina-00"))
        .stdout(predicate::str::contains("35"));

    ws.intake()
        .args(["unmatched", "list", "--csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARTICOLO VARIO XYZ"))
        .stdout(predicate::str::contains("SC-99"));

    ws.intake()
        .args(["catalog", "movements", "--csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("farina-00,25.00,kg"));
}

#[test]
fn test_process_writes_summary_csv() {
    let ws = Workspace::new();
    ws.seed_catalog();
    ws.drop_invoice("ft118.xml", INVOICE);
    let summary = ws.path().join("summary.csv");

    let pattern = ws.path().join("inbox").join("*.xml");
    ws.intake()
        .args(["process", pattern.to_str().unwrap(), "--summary"])
        .arg(&summary)
        .assert()
        .success();

    let content = std::fs::read_to_string(&summary).unwrap();
    assert!(content.starts_with("filename,status,"));
    assert!(content.contains("ft118.xml,reconciled,Molino Rossi S.r.l.,FT/118,2024-03-15,2,1,1,0,"));
}

#[test]
fn test_process_rejects_malformed_document() {
    let ws = Workspace::new();
    ws.drop_invoice("broken.xml", "<FatturaElettronica></FatturaElettronica>");

    let pattern = ws.path().join("inbox").join("*.xml");
    ws.intake()
        .args(["process", pattern.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("rejected"))
        .stderr(predicate::str::contains("1 of 1 files could not be reconciled"));

    assert!(ws.path().join("inbox/quarantine/broken.xml").exists());
}

#[test]
fn test_process_without_matches() {
    let ws = Workspace::new();
    let pattern = ws.path().join("inbox").join("*.xml");

    ws.intake()
        .args(["process", pattern.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_catalog_add_rejects_bad_code() {
    let ws = Workspace::new();

    ws.intake()
        .args(["catalog", "add", "sale", "Sale fino", "--code", "no-separator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUPPLIER=CODE"));
}

#[test]
fn test_unmatched_list_empty() {
    let ws = Workspace::new();

    ws.intake()
        .args(["unmatched", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing waiting for review"));
}
