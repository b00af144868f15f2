use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use konty_portal::admin::AdminService;
use konty_portal::datastore::{DataStore, MemoryDataStore, Profile, Role, RestDataStore};
use konty_portal::permissions::{active_module_keys, Grant, IdentityId};
use konty_portal::session::{Identity, Session};
use konty_portal::PortalError;

mod common;
use common::{sample_modules, MockBackend, MockState, ALICE, BOB};

fn profile(id: &str, email: &str, role: Role) -> Profile {
    Profile {
        id: IdentityId::from(id),
        email: Some(email.to_string()),
        full_name: None,
        role,
    }
}

fn memory_admin(identity: &str) -> (AdminService, Arc<MemoryDataStore>) {
    let store = Arc::new(
        MemoryDataStore::new(sample_modules())
            .with_profile(profile(ALICE, "alice@konty.com.br", Role::Admin))
            .with_profile(profile(BOB, "bob@konty.com.br", Role::User))
            .with_grant(Grant::active(BOB, "conciliacao")),
    );
    let session = Arc::new(Session::signed_in(Identity::new(identity)));
    (AdminService::new(store.clone(), session), store)
}

#[tokio::test]
async fn admin_sees_the_permission_matrix() -> Result<()> {
    let (admin, _) = memory_admin(ALICE);

    let matrix = admin.user_permissions(&IdentityId::from(BOB)).await?;

    let rows: Vec<(&str, bool)> = matrix.iter().map(|p| (p.module.key.as_str(), p.active)).collect();
    assert_eq!(
        rows,
        vec![("separador-pdf", false), ("conciliacao", true), ("relatorios", false)]
    );
    Ok(())
}

#[tokio::test]
async fn grant_and_revoke_round_through_the_store() -> Result<()> {
    let (admin, store) = memory_admin(ALICE);
    let bob = IdentityId::from(BOB);

    admin.grant(&bob, "relatorios").await?;
    admin.revoke(&bob, "conciliacao").await?;

    let grants = store.fetch_grants(&bob).await?;
    let mut active: Vec<&str> = active_module_keys(&grants, &bob).into_iter().collect();
    active.sort();
    assert_eq!(active, vec!["relatorios"]);

    let err = admin.grant(&bob, "inexistente").await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidInput(_)));
    Ok(())
}

#[tokio::test]
async fn non_admin_is_forbidden() -> Result<()> {
    let (admin, store) = memory_admin(BOB);

    assert!(matches!(admin.list_users().await, Err(PortalError::Forbidden(_))));
    assert!(matches!(
        admin.grant(&IdentityId::from(BOB), "relatorios").await,
        Err(PortalError::Forbidden(_))
    ));
    assert_eq!(store.grants().len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_profile_or_session_denies() -> Result<()> {
    let (admin, _) = memory_admin("someone-without-profile");
    assert!(matches!(admin.list_users().await, Err(PortalError::Forbidden(_))));

    let store = Arc::new(MemoryDataStore::new(sample_modules()));
    let anonymous = AdminService::new(store, Arc::new(Session::anonymous()));
    assert!(matches!(anonymous.list_users().await, Err(PortalError::Unauthenticated)));
    Ok(())
}

#[tokio::test]
async fn invite_validates_the_email() -> Result<()> {
    let (admin, _) = memory_admin(ALICE);

    for bad in ["", "sem-arroba", "@konty.com.br", "fulano@", "fulano@.com"] {
        assert!(
            matches!(admin.invite(bad).await, Err(PortalError::InvalidInput(_))),
            "accepted {bad:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn admin_cannot_delete_themselves() -> Result<()> {
    let (admin, _) = memory_admin(ALICE);

    let err = admin.delete_user(&IdentityId::from(ALICE)).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidInput(_)));
    Ok(())
}

#[tokio::test]
async fn admin_flows_over_rest() -> Result<()> {
    let backend = MockBackend::start(MockState {
        modules: vec![json!({ "chave": "relatorios", "nome": "Relatórios" })],
        profiles: vec![
            json!({ "id": ALICE, "email": "alice@konty.com.br", "role": "admin" }),
            json!({ "id": BOB, "email": "bob@konty.com.br", "role": "user" }),
        ],
        ..MockState::default()
    })
    .await?;
    let session = Arc::new(Session::signed_in(Identity::new(ALICE)));
    let store = Arc::new(RestDataStore::new(&backend.store_config(), session.clone())?);
    let admin = AdminService::new(store, session);

    assert_eq!(admin.list_users().await?.len(), 2);

    let invited = admin.invite("carla@konty.com.br").await?;
    assert_eq!(invited, IdentityId::from("7a7a7a7a-0000-4000-8000-000000000001"));

    admin.revoke(&IdentityId::from(BOB), "relatorios").await?;
    admin.delete_user(&IdentityId::from(BOB)).await?;

    let state = backend.state();
    assert_eq!(
        state.upserts,
        vec![json!([{ "user_id": BOB, "modulo_nome": "relatorios", "ativo": false }])]
    );
    assert_eq!(state.deleted, vec![BOB.to_string()]);
    Ok(())
}
