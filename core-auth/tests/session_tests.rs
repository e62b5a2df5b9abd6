mod common;

use bridge_traits::http::HttpMethod;
use common::{auth_response, leak, CountingCache, Harness, Reply, NOW};
use core_auth::{SessionStatus, UserUpdate};
use core_runtime::events::{AuthEvent, CoreEvent, SignInMethod, SignOutReason};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_bootstrap_empty_store_is_anonymous() {
    let h = Harness::new();
    assert_eq!(h.session.status(), SessionStatus::Bootstrapping);
    assert!(h.session.state().is_loading());

    let state = h.session.bootstrap().await.unwrap();

    assert_eq!(state.status, SessionStatus::Anonymous);
    assert!(h.http.requests().is_empty());
}

#[tokio::test]
async fn test_bootstrap_restores_valid_session_without_network() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let mut events = h.bus.subscribe();

    let state = h.session.bootstrap().await.unwrap();

    assert!(state.is_authenticated());
    assert_eq!(state.user.unwrap().email, "me@example.com");
    assert!(h.http.requests().is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SignedIn {
            user_id: "u-1".to_string(),
            method: SignInMethod::Restored,
        })
    );
}

#[tokio::test]
async fn test_bootstrap_refreshes_expired_session() {
    let h = Harness::new();
    h.seed_session("stale", "refresh-1", -1_000);
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/refresh",
        vec![Reply::Json(200, leak(auth_response("access-2", "refresh-2", 900)))],
    );

    let state = h.session.bootstrap().await.unwrap();

    assert!(state.is_authenticated());
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.access_token.as_deref(), Some("access-2"));
    assert_eq!(snapshot.expires_at, Some(NOW + 900_000));
}

#[tokio::test]
async fn test_bootstrap_with_rejected_refresh_is_anonymous() {
    let h = Harness::new();
    h.seed_session("stale", "revoked", -1_000);
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/refresh",
        vec![Reply::Json(401, r#"{"detail":"Invalid refresh token"}"#)],
    );

    let state = h.session.bootstrap().await.unwrap();

    assert_eq!(state.status, SessionStatus::Anonymous);
    assert!(h.secure.data.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_persists_and_publishes() {
    let h = Harness::new();
    h.session.bootstrap().await.unwrap();
    let mut watcher = h.session.subscribe();
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/login",
        vec![Reply::Json(200, leak(auth_response("access-1", "refresh-1", 900)))],
    );

    let user = h.session.login("me@example.com", "hunter22").await.unwrap();

    assert_eq!(user.id, "u-1");
    assert!(watcher.has_changed().unwrap());
    assert!(watcher.borrow_and_update().is_authenticated());
    assert_eq!(h.secure.get("auth.accessToken").as_deref(), Some("access-1"));
    assert_eq!(
        h.secure.get("auth.expiresAt"),
        Some((NOW + 900_000).to_string())
    );
    let body: serde_json::Value =
        serde_json::from_slice(h.http.requests()[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(body["email"], "me@example.com");
}

#[tokio::test]
async fn test_failed_login_reports_error_and_stays_anonymous() {
    let h = Harness::new();
    h.session.bootstrap().await.unwrap();
    let mut events = h.bus.subscribe();
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/login",
        vec![Reply::Json(401, r#"{"detail":"Invalid credentials"}"#)],
    );

    let err = h.session.login("me@example.com", "wrong").await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(h.session.status(), SessionStatus::Anonymous);
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::AuthError {
            message: "Invalid credentials".to_string(),
            status: 401,
        })
    );
}

#[tokio::test]
async fn test_register_and_google_sign_in() {
    let h = Harness::new();
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/register",
        vec![Reply::Json(201, leak(auth_response("a-reg", "r-reg", 900)))],
    );
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/google",
        vec![Reply::Json(200, leak(auth_response("a-google", "r-google", 900)))],
    );

    h.session.register("me@example.com", "hunter22").await.unwrap();
    assert_eq!(h.secure.get("auth.accessToken").as_deref(), Some("a-reg"));

    h.session.login_with_google("google-id-token").await.unwrap();
    assert_eq!(h.secure.get("auth.accessToken").as_deref(), Some("a-google"));
    assert!(h.session.state().is_authenticated());
}

#[tokio::test]
async fn test_logout_while_offline_clears_session_and_caches() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let cache = Arc::new(CountingCache::default());
    h.session.register_cache(cache.clone()).await;
    h.session.bootstrap().await.unwrap();
    h.http
        .on(HttpMethod::Post, "/v1/auth/logout", vec![Reply::Offline]);
    let mut events = h.bus.subscribe();

    h.session.logout().await.expect("network failure is swallowed");

    assert_eq!(h.session.status(), SessionStatus::Anonymous);
    assert!(h.secure.data.lock().unwrap().is_empty());
    assert_eq!(cache.clears(), 1);
    assert_eq!(h.http.calls_to("/v1/auth/logout"), 1);
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SignedOut {
            user_id: Some("u-1".to_string()),
            reason: SignOutReason::Logout,
        })
    );
}

#[tokio::test]
async fn test_logout_without_refresh_token_skips_server() {
    let h = Harness::new();
    h.session.bootstrap().await.unwrap();

    h.session.logout().await.unwrap();

    assert!(h.http.requests().is_empty());
}

#[tokio::test]
async fn test_delete_with_wrong_password_keeps_session() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let cache = Arc::new(CountingCache::default());
    h.session.register_cache(cache.clone()).await;
    h.session.bootstrap().await.unwrap();
    h.http.on(
        HttpMethod::Delete,
        "/v1/auth/account",
        vec![Reply::Json(400, r#"{"detail":"invalid password"}"#)],
    );

    let err = h.session.delete_account(Some("wrong")).await.unwrap_err();

    assert_eq!(err.to_string(), "invalid password");
    assert_eq!(err.status(), Some(400));
    assert!(h.session.state().is_authenticated());
    assert_eq!(h.secure.get("auth.accessToken").as_deref(), Some("access-1"));
    assert_eq!(cache.clears(), 0);
}

#[tokio::test]
async fn test_delete_account_signs_out() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let cache = Arc::new(CountingCache::default());
    h.session.register_cache(cache.clone()).await;
    h.session.bootstrap().await.unwrap();
    h.http
        .on(HttpMethod::Delete, "/v1/auth/account", vec![Reply::Json(204, "")]);

    h.session.delete_account(None).await.unwrap();

    let request = &h.http.requests()[0];
    assert!(request.body.is_none());
    assert_eq!(request.authorization_token(), Some("access-1"));
    assert_eq!(h.session.status(), SessionStatus::Anonymous);
    assert_eq!(cache.clears(), 1);
}

#[tokio::test]
async fn test_update_user_merges_and_persists() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    h.session.bootstrap().await.unwrap();

    let user = h
        .session
        .update_user(UserUpdate::email("new@example.com"))
        .await
        .unwrap()
        .expect("user present");

    assert_eq!(user.email, "new@example.com");
    assert!(user.has_password);
    assert_eq!(h.session.current_user(), Some(user.clone()));
    let stored: core_auth::AuthUser =
        serde_json::from_str(&h.secure.get("auth.user").unwrap()).unwrap();
    assert_eq!(stored, user);
}

#[tokio::test]
async fn test_update_user_without_user_is_noop() {
    let h = Harness::new();
    h.session.bootstrap().await.unwrap();

    let result = h
        .session
        .update_user(UserUpdate::has_password(true))
        .await
        .unwrap();

    assert_eq!(result, None);
    assert!(h.secure.data.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_reset_password_marks_user_as_having_password() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    h.secure.put(
        "auth.user",
        r#"{"id":"u-1","email":"me@example.com","has_password":false}"#,
    );
    h.session.bootstrap().await.unwrap();
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/reset-password/confirm",
        vec![Reply::Json(200, r#"{"message":"ok"}"#)],
    );

    h.session
        .confirm_reset_password("123456", "n3w-password")
        .await
        .unwrap();

    assert!(h.session.current_user().unwrap().has_password);
}

#[tokio::test]
async fn test_reconcile_after_refresh_failure_ends_session() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let cache = Arc::new(CountingCache::default());
    h.session.register_cache(cache.clone()).await;
    h.session.bootstrap().await.unwrap();

    // Refresh token revoked elsewhere; the pipeline's refresh clears the store.
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/refresh",
        vec![Reply::Json(401, r#"{"detail":"revoked"}"#)],
    );
    assert_eq!(h.refresher.refresh().await.unwrap(), None);
    assert!(h.session.state().is_authenticated());

    let state = h.session.reconcile().await.unwrap();

    assert_eq!(state.status, SessionStatus::Anonymous);
    assert_eq!(cache.clears(), 1);
}

#[tokio::test]
async fn test_reconcile_adopts_refreshed_tokens_silently() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    let cache = Arc::new(CountingCache::default());
    h.session.register_cache(cache.clone()).await;
    h.session.bootstrap().await.unwrap();
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/refresh",
        vec![Reply::Json(200, leak(auth_response("access-2", "refresh-2", 900)))],
    );
    h.refresher.refresh().await.unwrap();

    let state = h.session.reconcile().await.unwrap();

    assert!(state.is_authenticated());
    assert_eq!(
        h.session.snapshot().await.access_token.as_deref(),
        Some("access-2")
    );
    assert_eq!(cache.clears(), 0);
}

#[tokio::test]
async fn test_update_user_failed_save_keeps_previous_user() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    h.session.bootstrap().await.unwrap();
    h.secure.fail_writes.store(true, Ordering::SeqCst);

    let result = h
        .session
        .update_user(UserUpdate::email("new@example.com"))
        .await;

    assert!(result.is_err());
    assert_eq!(h.session.current_user().unwrap().email, "me@example.com");
    assert_eq!(
        h.session.snapshot().await.user.unwrap().email,
        "me@example.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_overlapping_logout_does_not_sign_back_in() {
    let h = Harness::new();
    h.seed_session("access-1", "refresh-1", 600_000);
    h.session.bootstrap().await.unwrap();
    h.http.set_delay(Duration::from_millis(50));
    h.http
        .on(HttpMethod::Post, "/v1/auth/logout", vec![Reply::Json(204, "")]);
    h.http.on(
        HttpMethod::Post,
        "/v1/auth/refresh",
        vec![Reply::Json(200, leak(auth_response("access-2", "refresh-2", 900)))],
    );
    let mut events = h.bus.subscribe();

    let (logout, refreshed) = tokio::join!(h.session.logout(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.refresher.refresh().await
    });

    logout.unwrap();
    assert_eq!(refreshed.unwrap(), None);
    assert_eq!(h.http.calls_to("/v1/auth/refresh"), 1);
    assert!(h.store.load().await.unwrap().is_empty());
    assert!(h.secure.data.lock().unwrap().is_empty());

    let state = h.session.reconcile().await.unwrap();
    assert_eq!(state.status, SessionStatus::Anonymous);
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })));
    }
}

#[tokio::test]
async fn test_reconcile_discards_tokens_found_after_sign_out() {
    let h = Harness::new();
    h.session.bootstrap().await.unwrap();
    let response: core_auth::AuthResponse =
        serde_json::from_str(&auth_response("access-2", "refresh-2", 900)).unwrap();
    h.store.set_from_response(&response).await.unwrap();

    let state = h.session.reconcile().await.unwrap();

    assert_eq!(state.status, SessionStatus::Anonymous);
    assert!(h.store.load().await.unwrap().is_empty());
    assert!(h.secure.data.lock().unwrap().is_empty());
}
