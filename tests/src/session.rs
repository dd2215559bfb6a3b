use futures::executor::{block_on, LocalPool};
use talkback_client::{
    api::{AuthData, ServiceError},
    texts, AuthError, DialogError, InactivityChoice, LoginOutcome, PseudonymDialog, SessionEvent,
};
use talkback_mock_service::Call;

use crate::harness::*;

fn drain(sub: &mut talkback_client::Subscription<SessionEvent>) -> Vec<SessionEvent> {
    let mut res = Vec::new();
    while let Some(e) = sub.try_next() {
        res.push(e);
    }
    res
}

#[test]
fn login_with_token_emits_login() {
    let h = Harness::new();
    let mut events = h.session().subscribe();
    h.service.set_auth(Some(logged_in("alice")));
    let outcome = block_on(h.session().login());
    assert!(outcome.logged_in);
    assert_eq!(outcome.auth, Some(logged_in("alice")));
    assert!(h.session().is_logged_in());
    assert_eq!(
        h.session().current().display_name.as_deref(),
        Some("alice")
    );
    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], SessionEvent::Login(a) if a.display_name.as_deref() == Some("alice")));
}

#[test]
fn login_without_pseudonym_flags_it() {
    let h = Harness::new();
    let mut events = h.session().subscribe();
    h.service.set_auth(Some(AuthData::without_pseudonym()));
    let outcome = block_on(h.session().login());
    assert!(!outcome.logged_in);
    assert_eq!(outcome.auth, Some(AuthData::without_pseudonym()));
    assert!(h.session().current().pseudonym_missing);
    assert!(drain(&mut events).is_empty());
}

#[test]
fn login_transport_error_is_not_logged_in() {
    let h = Harness::new();
    h.service
        .set_auth_error(Some(ServiceError::Transport(String::from("offline"))));
    assert_eq!(block_on(h.session().login()), LoginOutcome::default());
    h.service.set_auth_error(None);
    assert_eq!(
        block_on(h.session().login()),
        LoginOutcome {
            logged_in: false,
            auth: None
        }
    );
}

#[test]
fn logout_twice_is_logout_once() {
    let h = Harness::new();
    h.service.set_auth(Some(logged_in("alice")));
    block_on(h.session().login());
    let mut events = h.session().subscribe();

    h.session().logout();
    let after_one = (h.session().current(), drain(&mut events).len());
    h.session().logout();
    let after_two = (h.session().current(), drain(&mut events).len());

    assert_eq!(after_one.0, after_two.0);
    assert!(!after_one.0.logged_in);
    assert_eq!(after_one.1, 1);
    assert_eq!(after_two.1, 0);
}

#[test]
fn login_required_asks_the_host() {
    let mut pool = LocalPool::new();
    let h = Harness::new();
    h.host_answers_login(&pool.spawner(), Some(logged_in("alice")));
    let auth = pool
        .run_until(h.session().login_required(false))
        .expect("host logged the user in");
    assert_eq!(auth.display_name.as_deref(), Some("alice"));
    assert!(h.session().is_logged_in());
    // The check after the host's answer bypasses the auth cache
    assert!(h
        .service
        .test_calls()
        .iter()
        .any(|c| matches!(c, Call::GetAuth(q) if q.force)));
}

#[test]
fn login_required_host_failure_is_cancelled() {
    let mut pool = LocalPool::new();
    let h = Harness::new();
    h.host_answers_login(&pool.spawner(), None);
    let res = pool.run_until(h.session().login_required(false));
    assert_eq!(res, Err(AuthError::Cancelled));
    assert!(!h.session().is_logged_in());
}

#[test]
fn login_required_without_any_listener_is_cancelled() {
    let h = Harness::new();
    // Nobody but the widget listens, and the widget does not answer
    h.widget.destroy();
    let res = block_on(h.session().login_required(false));
    assert_eq!(res, Err(AuthError::Cancelled));
}

#[test]
fn login_required_host_answer_without_token() {
    let mut pool = LocalPool::new();
    let h = Harness::new();
    h.host_answers_login(&pool.spawner(), Some(AuthData::anonymous()));
    let res = pool.run_until(h.session().login_required(false));
    assert_eq!(res, Err(AuthError::NotAuthenticated));
}

#[test]
fn expired_session_offers_to_sign_in_again() {
    let h = Harness::new();
    let mut events = h.session().subscribe();
    h.service.set_auth(Some(AuthData {
        session_expired: true,
        ..AuthData::anonymous()
    }));
    h.dialogs.push_inactivity_choice(InactivityChoice::SignIn);
    let res = block_on(h.session().login_required(false));
    assert_eq!(res, Err(AuthError::Redirecting));
    assert_eq!(h.dialogs.test_num_inactivity_prompts(), 1);
    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::LoginRedirect { url } if url == "/login")));
}

#[test]
fn dismissed_expiry_prompt_is_an_error() {
    let h = Harness::new();
    h.service.set_auth(Some(logged_in("alice")));
    block_on(h.session().login());
    h.service.set_auth(None);
    let res = block_on(h.session().login_required(true));
    assert_eq!(res, Err(AuthError::SessionExpired));
    assert!(!h.session().is_logged_in());
    assert_eq!(h.service.test_num_forget_auth(), 1);
}

#[test]
fn pseudonym_prompt_repeats_until_accepted() {
    let h = Harness::new();
    h.service.set_auth(Some(AuthData::without_pseudonym()));
    h.service
        .push_update_result(Err(talkback_client::api::UpdateUserError::Rejected(
            String::from("pseudonym_taken"),
        )));
    h.dialogs.push_pseudonym(Some("   "));
    h.dialogs.push_pseudonym(Some("alice"));
    h.dialogs.push_pseudonym(Some("carol"));

    let auth = block_on(h.session().login_required(false)).expect("pseudonym was set");
    assert_eq!(auth.display_name.as_deref(), Some("carol"));
    assert!(h.session().is_logged_in());

    let prompts = h.dialogs.test_pseudonym_prompts();
    assert_eq!(
        prompts,
        vec![
            (PseudonymDialog::Set, None),
            (
                PseudonymDialog::Set,
                Some(String::from(texts::PSEUDONYM_BLANK))
            ),
            (PseudonymDialog::Set, Some(String::from("pseudonym_taken"))),
        ]
    );
}

#[test]
fn pseudonym_rejection_uses_the_override_table() {
    let mut config = config();
    config
        .message_overrides
        .push(talkback_client::MessageOverride {
            pattern: String::from("pseudonym_taken"),
            message: String::from("Someone already uses this pseudonym"),
        });
    let h = Harness::with(config, talkback_client::MemoryStorage::new());
    h.service.set_auth(Some(AuthData::without_pseudonym()));
    h.service
        .push_update_result(Err(talkback_client::api::UpdateUserError::Rejected(
            String::from("pseudonym_taken"),
        )));
    h.dialogs.push_pseudonym(Some("alice"));
    h.dialogs.push_pseudonym(Some("carol"));
    block_on(h.session().login_required(false)).expect("pseudonym was set");
    assert_eq!(
        h.dialogs.test_pseudonym_prompts()[1].1.as_deref(),
        Some("Someone already uses this pseudonym")
    );
}

#[test]
fn closing_the_pseudonym_prompt_fails_the_login() {
    let h = Harness::new();
    h.service.set_auth(Some(AuthData::without_pseudonym()));
    h.dialogs.push_pseudonym(None);
    let res = block_on(h.session().login_required(false));
    assert_eq!(res, Err(AuthError::Dialog(DialogError::Closed)));
    assert!(!h.session().is_logged_in());
}
