// tests/pipeline.rs

//! End-to-end reconciliation runs over the file:// transport.

mod common;

use acldiff::acl::Acl;
use acldiff::bundle::{self, KeyStore, SigningError, VerifyError};
use acldiff::{Config, Error, Pipeline, ReportOutput, SnapshotSource, Verification};
use chrono::{TimeZone, Utc};
use common::{current_acl, file_transports, MemorySource, TestEnv, AUTHORITATIVE_TSV, CURRENT_TSV};

fn pipeline(config: Config) -> Pipeline<MemorySource> {
    Pipeline::new(config, file_transports(), MemorySource(current_acl()))
}

#[test]
fn test_signed_acl_produces_report() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);

    let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    let summary = pipeline(env.config()).run_at(&uri, None, timestamp).unwrap();

    assert_eq!(summary.verification, Verification::Verified { signer: "hq".to_string() });
    assert_eq!(summary.rejected_rows, 0);

    let entrance = summary.devices[&405419896];
    assert_eq!((entrance.unchanged, entrance.updated, entrance.added, entrance.deleted), (0, 1, 1, 1));
    assert_eq!(summary.devices[&303986753].unchanged, 1);
    assert_eq!(summary.total_changes(), 3);

    let ReportOutput::File(path) = &summary.report else {
        panic!("expected a local report file");
    };
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "acl-2024-03-01T083000.000.rpt"
    );

    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.starts_with("ACL DIFF REPORT 2024-03-01 08:30:00 UTC"));
    assert!(text.contains("DEVICE 303986753\n    No differences"));
    assert!(text.contains(
        "Incorrect:  8165538 2024-01-01:2024-12-31 Great Hall -> 2024-01-01:2024-12-31 Great Hall,Kitchen"
    ));
    assert!(text.contains("Missing:    8165539 2024-01-01:2024-12-31 Kitchen"));
    assert!(text.contains("Unexpected: 8165540 2024-01-01:2024-06-30 Great Hall"));

    // Devices appear in ascending ID order
    let low = text.find("DEVICE 303986753").unwrap();
    let high = text.find("DEVICE 405419896").unwrap();
    assert!(low < high);
}

#[test]
fn test_runs_are_deterministic() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);
    let config = Config {
        no_report: true,
        ..env.config()
    };

    let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    let first = pipeline(config.clone()).run_at(&uri, None, timestamp).unwrap();
    let second = pipeline(config).run_at(&uri, None, timestamp).unwrap();

    assert_eq!(first.report, ReportOutput::Stdout);
    assert_eq!(first.report_text, second.report_text);
    assert_eq!(env.report_count(), 0);
}

#[test]
fn test_tampered_payload_is_rejected_before_diff() {
    let env = TestEnv::new();
    let signature = env.keypair.sign(AUTHORITATIVE_TSV.as_bytes());
    let tampered = AUTHORITATIVE_TSV.replace("\tN\tN\tY", "\tY\tY\tY");
    let uri = env.publish_raw("acl.tar.gz", "hq.acl", &tampered, &signature);

    let err = pipeline(env.config()).run(&uri, None).unwrap_err();

    assert!(matches!(err, Error::Verify(VerifyError::SignatureMismatch { ref signer, .. }) if signer == "hq"));
    assert!(err.to_string().contains("hq"));
    assert_eq!(env.report_count(), 0);
}

#[test]
fn test_unknown_signer_is_distinct_from_mismatch() {
    let env = TestEnv::new();
    let signature = env.keypair.sign(AUTHORITATIVE_TSV.as_bytes());
    let uri = env.publish_raw("acl.tar.gz", "branch-office.acl", AUTHORITATIVE_TSV, &signature);

    let err = pipeline(env.config()).run(&uri, None).unwrap_err();

    assert!(matches!(err, Error::Verify(VerifyError::UnknownSigner { ref signer, .. }) if signer == "branch-office"));
    assert!(err.is_integrity_failure());
    assert_eq!(env.report_count(), 0);
}

#[test]
fn test_bypass_diffs_unverified_payload() {
    let env = TestEnv::new();
    let uri = env.publish_raw("acl.tar.gz", "stranger.acl", AUTHORITATIVE_TSV, b"garbage");
    let config = Config {
        no_verify: true,
        ..env.config()
    };

    let summary = pipeline(config).run(&uri, None).unwrap();

    assert_eq!(summary.verification, Verification::Bypassed { signer: "stranger".to_string() });
    assert_eq!(env.report_count(), 1);
}

#[test]
fn test_missing_archive_is_transport_error() {
    let env = TestEnv::new();
    let err = pipeline(env.config()).run(&env.uri("absent.tar.gz"), None).unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert!(err.to_string().contains("absent.tar.gz"));
    assert_eq!(env.report_count(), 0);
}

#[test]
fn test_unsupported_scheme() {
    let env = TestEnv::new();
    let err = pipeline(env.config()).run("gopher://example.com/acl", None).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[test]
fn test_rejected_rows_are_counted() {
    let env = TestEnv::new();
    let table = format!("{AUTHORITATIVE_TSV}999\t1\t2024-01-01\t2024-12-31\tY\tY\tY\n405419896\tabc\t2024-01-01\t2024-12-31\tY\tY\tY\n");
    let uri = env.publish_signed("acl.tar.gz", &table);

    let summary = pipeline(env.config()).run(&uri, None).unwrap();

    assert_eq!(summary.rejected_rows, 2);
    assert_eq!(summary.devices[&405419896].added, 1);
}

#[test]
fn test_report_upload_is_verifiable() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);
    let report_uri = env.uri("outbox/report.tar.gz");

    let summary = pipeline(env.config()).run(&uri, Some(&report_uri)).unwrap();
    assert_eq!(summary.uploaded_to.as_deref(), Some(report_uri.as_str()));

    let bytes = std::fs::read(env.path("outbox/report.tar.gz")).unwrap();
    let unpacked = bundle::unpack(&bytes).unwrap();
    assert_eq!(unpacked.payload_name, "hq.rpt");
    assert_eq!(unpacked.payload, summary.report_text.as_bytes());

    KeyStore::new(env.path("keys"))
        .verify(&unpacked.signer, &unpacked.payload, &unpacked.signature)
        .unwrap();
}

#[test]
fn test_signing_failure_keeps_local_report() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);

    // A key without a key ID cannot name the report payload
    let anonymous = acldiff::bundle::SigningKeyPair::generate();
    anonymous
        .save_to_files(&env.path("keys/anon.private"), &env.path("keys/anon.pub"))
        .unwrap();
    let config = Config {
        signing_key: env.path("keys/anon.private"),
        ..env.config()
    };

    let err = pipeline(config)
        .run(&uri, Some(&env.uri("outbox/report.tar.gz")))
        .unwrap_err();

    assert!(matches!(err, Error::Signing(SigningError::MissingKeyId(_))));
    assert_eq!(env.report_count(), 1);
    assert!(!env.path("outbox/report.tar.gz").exists());
}

#[test]
fn test_snapshot_source_end_to_end() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);
    std::fs::write(env.path("current.tsv"), CURRENT_TSV).unwrap();

    let pipeline = Pipeline::new(env.config(), file_transports(), SnapshotSource::new(env.path("current.tsv")));
    let summary = pipeline.run(&uri, None).unwrap();

    assert_eq!(summary.total_changes(), 3);
}

#[test]
fn test_device_absent_from_current_is_all_added() {
    let env = TestEnv::new();
    let uri = env.publish_signed("acl.tar.gz", AUTHORITATIVE_TSV);

    let pipeline = Pipeline::new(env.config(), file_transports(), MemorySource(Acl::new()));
    let summary = pipeline.run(&uri, None).unwrap();

    let entrance = summary.devices[&405419896];
    assert_eq!((entrance.added, entrance.updated, entrance.deleted), (2, 0, 0));
    assert_eq!(summary.devices[&303986753].added, 1);
}
