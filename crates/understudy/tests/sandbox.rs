// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sandbox teardown and process-wide defaults.
#![allow(clippy::unwrap_used, clippy::panic)]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use understudy::config::{DirStore, Profiles, SandboxPrefs};
use understudy::net::Request;
use understudy::{json, Matcher, PatchManager, Sandbox, Surface, VirtualClock};

fn mailer() -> Arc<Surface> {
    Surface::builder("mail-sender")
        .member("send", |_| Ok(json!({"delivered": "for-real"})))
        .build()
}

fn blocking() -> Sandbox {
    Sandbox::with_prefs(SandboxPrefs::default())
}

#[test]
fn drop_restores_members_rules_and_clock() {
    let mail = mailer();
    {
        let sb = blocking();
        let stub = sb.stub(&mail, "send").unwrap();
        stub.returns(json!({"delivered": "stubbed"})).unwrap();
        sb.intercept("http://like-youtube.com")
            .post("/upload")
            .reply(200, json!({}));
        sb.install_clock(Utc.with_ymd_and_hms(2023, 12, 22, 17, 0, 0).unwrap())
            .unwrap();

        assert_eq!(mail.call("send", &[]), Ok(json!({"delivered": "stubbed"})));
        assert!(sb.net().real_requests_blocked());
    }

    assert_eq!(mail.call("send", &[]), Ok(json!({"delivered": "for-real"})));
    let _sb = blocking();
    assert_eq!(PatchManager::global().active_count(), 0);
    assert!(understudy::net::Interceptor::global().rules().is_empty());
    assert!(!VirtualClock::global().is_installed());
}

#[test]
fn teardown_runs_when_the_test_panics() {
    let mail = mailer();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let sb = blocking();
        sb.spy(&mail, "send").unwrap();
        sb.install_clock(Utc::now()).unwrap();
        panic!("assertion failed inside the sandbox");
    }));
    assert!(outcome.is_err());

    let sb = blocking();
    assert!(!sb.patches().is_patched(&mail, "send"));
    assert!(!sb.clock().is_installed());
    sb.install_clock(Utc::now()).unwrap();
}

#[tokio::test]
async fn default_posture_blocks_unmatched_requests() {
    let sb = blocking();
    let err = sb
        .net()
        .send(Request::get("http://api.weather.test/today").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.name(), "network-blocked");
}

#[test]
fn sandbox_enters_a_stored_profile() {
    let dir = tempfile::tempdir().unwrap();
    let profiles = Profiles::new(DirStore::at(dir.path()));
    let prefs = SandboxPrefs {
        block_real_requests: false,
        log_filter: "understudy=debug".into(),
    };
    profiles.save("online", &prefs).unwrap();

    let sb = Sandbox::from_profile(&profiles, "online").unwrap();
    assert_eq!(sb.prefs().log_filter, "understudy=debug");
    assert!(!sb.net().real_requests_blocked());
    drop(sb);

    let err = Sandbox::from_profile(&profiles, "../online").unwrap_err();
    assert!(err.to_string().contains("invalid profile name"));
}

#[test]
fn plain_sandbox_reads_the_discovered_profile() {
    let sb = Sandbox::new();
    let expected = Profiles::discover().map_or_else(
        |_| SandboxPrefs::default().with_env_overrides(),
        |p| p.load_or_default(&understudy::config::selected_profile()),
    );
    assert_eq!(sb.prefs(), &expected);
}

#[test]
fn allow_net_prefs_leave_requests_open() {
    let sb = Sandbox::with_prefs(SandboxPrefs::default().with_allow_net(Some("1")));
    assert!(!sb.net().real_requests_blocked());
}

#[test]
fn mocks_created_in_a_sandbox_are_restored_on_drop() {
    let mail = mailer();
    {
        let sb = blocking();
        let mock = sb.mock(&mail);
        mock.expects("send")
            .unwrap()
            .once()
            .with_args(vec![Matcher::exact("ada@example.com"), Matcher::string()]);
        mail.call("send", &[json!("ada@example.com"), json!("hi")]).unwrap();
        mock.verify().unwrap();
    }
    assert_eq!(mail.call("send", &[]), Ok(json!({"delivered": "for-real"})));
}
